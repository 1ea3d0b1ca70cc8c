//! Palette Compiler - color signatures to texture slots
//!
//! For N documents every color leaf gets a canonical key. Per key we build
//! the N-tuple of its colors (`None` where a document lacks the key), and
//! keys with identical tuples share one slot. Slot count is therefore
//! bounded by the number of distinct variation patterns, not by the number
//! of colored elements.
//!
//! Each slot is a 2x2 block in a square texture. Coordinates written back
//! into a document name texel `(2c+1, 2r+1)` of block `(c, r)`.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::PaletteError;
use crate::image::PaletteImage;
use crate::keys::{self, CanonicalKey};
use crate::model::{is_color_field, Color, Scalar, StyleDocument, StyleNode, X_SUFFIX, Y_SUFFIX};

pub type ColorExtraction = BTreeMap<CanonicalKey, Color>;

/// Colors of one key across all documents, in document order.
pub type ColorSignature = Vec<Option<Color>>;

pub const DEFAULT_MIN_HALF: usize = 8;
pub const DEFAULT_MAX_SIDE: usize = 4096;

/// Every color leaf of `document`, keyed canonically.
///
/// Two leaves that land on the same key are a collision; the first value is
/// never silently overwritten.
pub fn extract_colors(document: &StyleDocument, index: usize) -> Result<ColorExtraction, PaletteError> {
    let mut colors = ColorExtraction::new();
    keys::walk(&document.root, &mut |scope, node| {
        for (field, color) in node.color_fields() {
            let key = scope.key(field);
            if let Some(&first) = colors.get(&key) {
                return Err(PaletteError::Collision {
                    key,
                    document: index,
                    expected: first,
                    actual: Some(color),
                });
            }
            colors.insert(key, color);
        }
        Ok(())
    })?;
    Ok(colors)
}

/// Signature <-> slot bijection plus key -> slot lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndirectionTable {
    documents: usize,
    signatures: Vec<ColorSignature>,
    slots: BTreeMap<CanonicalKey, usize>,
}

impl IndirectionTable {
    pub fn slot_count(&self) -> usize {
        self.signatures.len()
    }

    pub fn document_count(&self) -> usize {
        self.documents
    }

    pub fn slot_of(&self, key: &CanonicalKey) -> Option<usize> {
        self.slots.get(key).copied()
    }

    pub fn signature(&self, slot: usize) -> Option<&ColorSignature> {
        self.signatures.get(slot)
    }

    pub fn key_count(&self) -> usize {
        self.slots.len()
    }

    /// Slot -> color for one document.
    pub fn colors_for(&self, document: usize) -> Vec<Option<Color>> {
        self.signatures
            .iter()
            .map(|sig| sig.get(document).copied().flatten())
            .collect()
    }
}

/// Groups keys by signature. Keys are visited in lexical order and slots are
/// numbered by first appearance, so identical inputs give identical tables.
pub fn build_table(extractions: &[ColorExtraction]) -> IndirectionTable {
    let all_keys: BTreeSet<&CanonicalKey> = extractions.iter().flat_map(|e| e.keys()).collect();

    let mut signatures: Vec<ColorSignature> = vec![];
    let mut by_signature: HashMap<ColorSignature, usize> = HashMap::new();
    let mut slots = BTreeMap::new();

    for key in all_keys {
        let signature: ColorSignature = extractions.iter().map(|e| e.get(key).copied()).collect();
        let slot = match by_signature.get(&signature) {
            Some(&slot) => slot,
            None => {
                let slot = signatures.len();
                by_signature.insert(signature.clone(), slot);
                signatures.push(signature);
                slot
            }
        };
        slots.insert(key.clone(), slot);
    }

    IndirectionTable {
        documents: extractions.len(),
        signatures,
        slots,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutLimits {
    /// Smallest allowed half side, a power of two.
    pub min_half: usize,
    pub max_side: usize,
}

impl Default for LayoutLimits {
    fn default() -> Self {
        Self {
            min_half: DEFAULT_MIN_HALF,
            max_side: DEFAULT_MAX_SIDE,
        }
    }
}

/// Side length for `slot_count` slots: `2P`, with `P` the smallest power of
/// two (not below `min_half`) such that `P * P >= slot_count`.
pub fn layout(slot_count: usize, limits: LayoutLimits) -> Result<usize, PaletteError> {
    let half = ceil_sqrt(slot_count)
        .max(1)
        .next_power_of_two()
        .max(limits.min_half);
    let side = half.saturating_mul(2);
    if side > limits.max_side {
        return Err(PaletteError::Capacity {
            slot_count,
            side,
            max_side: limits.max_side,
        });
    }
    Ok(side)
}

fn ceil_sqrt(n: usize) -> usize {
    let mut r = (n as f64).sqrt() as usize;
    while r > 0 && r * r > n {
        r -= 1;
    }
    while r * r < n {
        r += 1;
    }
    r
}

/// Center texel of the slot's 2x2 block.
pub fn slot_to_coords(slot: usize, side: usize) -> (u32, u32) {
    let half = side / 2;
    let x = (slot % half) * 2 + 1;
    let y = (slot / half) * 2 + 1;
    (x as u32, y as u32)
}

/// Palette for one document. Slots the document has no color for stay
/// transparent.
pub fn render(table: &IndirectionTable, document: usize, side: usize) -> PaletteImage {
    let mut image = PaletteImage::new(side as u32);
    for (slot, color) in table.colors_for(document).into_iter().enumerate() {
        if let Some(color) = color {
            image.fill_block(slot, color);
        }
    }
    image
}

/// Replaces each color leaf that has a slot with `<field>_x` / `<field>_y`.
/// Returns the number of leaves rewritten.
pub fn write_back(document: &mut StyleDocument, table: &IndirectionTable, side: usize) -> Result<usize, PaletteError> {
    let mut rewritten = 0;
    keys::walk_mut(&mut document.root, &mut |scope, node| {
        let fields: Vec<String> = node.color_fields().iter().map(|(f, _)| f.to_string()).collect();
        for field in fields {
            let Some(slot) = table.slot_of(&scope.key(&field)) else {
                continue;
            };
            let (x, y) = slot_to_coords(slot, side);
            node.fields.remove(&field);
            node.fields.insert(format!("{}{}", field, X_SUFFIX), Scalar::Int(i64::from(x)));
            node.fields.insert(format!("{}{}", field, Y_SUFFIX), Scalar::Int(i64::from(y)));
            rewritten += 1;
        }
        Ok(())
    })?;
    Ok(rewritten)
}

/// Reads every coordinate pair of a rewritten document back out of `image`
/// and checks it against the color captured before the rewrite.
/// Returns the number of coordinates checked.
pub fn verify(
    document: &StyleDocument,
    index: usize,
    originals: &ColorExtraction,
    image: &PaletteImage,
) -> Result<usize, PaletteError> {
    let mut checked = 0;
    keys::walk(&document.root, &mut |scope, node| {
        for (name, value) in &node.fields {
            let Some(field) = name.strip_suffix(X_SUFFIX).filter(|f| is_color_field(f)) else {
                continue;
            };
            let key = scope.key(field);
            let expected = *originals.get(&key).ok_or_else(|| PaletteError::Unmapped {
                key: key.clone(),
                document: index,
            })?;

            let y = node.fields.get(&format!("{}{}", field, Y_SUFFIX));
            let actual = match (coordinate(Some(value)), coordinate(y)) {
                (Some(x), Some(y)) => image.pixel(x, y),
                _ => None,
            };
            if actual != Some(expected) {
                return Err(PaletteError::Collision {
                    key,
                    document: index,
                    expected,
                    actual,
                });
            }
            checked += 1;
        }
        Ok(())
    })?;
    Ok(checked)
}

fn coordinate(value: Option<&Scalar>) -> Option<u32> {
    match value {
        Some(Scalar::Int(v)) => u32::try_from(*v).ok(),
        _ => None,
    }
}
