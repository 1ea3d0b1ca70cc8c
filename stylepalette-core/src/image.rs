//! Palette Image - square RGBA8 bitmap, one 2x2 block per slot

use crate::error::PaletteError;
use crate::model::Color;

const CHANNELS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteImage {
    side: u32,
    pixels: Vec<u8>,
}

impl PaletteImage {
    /// Fully transparent image.
    pub fn new(side: u32) -> Self {
        let len = side as usize * side as usize * CHANNELS;
        Self { side, pixels: vec![0; len] }
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.side || y >= self.side {
            return None;
        }
        Some((y as usize * self.side as usize + x as usize) * CHANNELS)
    }

    /// Color at `(x, y)`, `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        let at = self.offset(x, y)?;
        let mut rgba = [0u8; CHANNELS];
        rgba.copy_from_slice(&self.pixels[at..at + CHANNELS]);
        Some(Color::from_rgba(rgba))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if let Some(at) = self.offset(x, y) {
            self.pixels[at..at + CHANNELS].copy_from_slice(&color.to_rgba());
        }
    }

    /// Paints all four pixels of the block that holds `slot`.
    pub fn fill_block(&mut self, slot: usize, color: Color) {
        let half = (self.side / 2) as usize;
        if half == 0 {
            return;
        }
        let bx = (slot % half) as u32 * 2;
        let by = (slot / half) as u32 * 2;
        for dy in 0..2 {
            for dx in 0..2 {
                self.set_pixel(bx + dx, by + dy, color);
            }
        }
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, PaletteError> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.side, self.side);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.pixels)?;
            writer.finish()?;
        }
        Ok(out)
    }

    /// Decodes an RGBA8 PNG. Rejects other pixel formats and non-square or
    /// odd-sided images.
    pub fn decode_png(bytes: &[u8]) -> Result<Self, PaletteError> {
        let decoder = png::Decoder::new(bytes);
        let mut reader = decoder.read_info()?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf)?;

        if info.color_type != png::ColorType::Rgba || info.bit_depth != png::BitDepth::Eight {
            return Err(PaletteError::Image(format!(
                "expected RGBA8, got {:?}/{:?}",
                info.color_type, info.bit_depth
            )));
        }
        if info.width != info.height || info.width % 2 != 0 {
            return Err(PaletteError::Image(format!(
                "palette must be square with an even side, got {}x{}",
                info.width, info.height
            )));
        }

        buf.truncate(info.buffer_size());
        Ok(Self { side: info.width, pixels: buf })
    }
}
