//! Run Configuration - naming and texture limits

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PaletteError;
use crate::palette::{LayoutLimits, DEFAULT_MAX_SIDE, DEFAULT_MIN_HALF};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteConfig {
    /// Stripped from input file stems to get the style name.
    #[serde(default = "default_document_prefix")]
    pub document_prefix: String,
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,
    #[serde(default = "default_min_half")]
    pub min_half: usize,
    #[serde(default = "default_max_side")]
    pub max_side: usize,
    #[serde(default = "default_report_name")]
    pub report_name: String,
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,
    #[serde(default = "default_true")]
    pub write_text_dump: bool,
}

fn default_document_prefix() -> String { "drules_proto".to_string() }
fn default_image_prefix() -> String { "static_colors".to_string() }
fn default_min_half() -> usize { DEFAULT_MIN_HALF }
fn default_max_side() -> usize { DEFAULT_MAX_SIDE }
fn default_report_name() -> String { "style_diff.txt".to_string() }
fn default_manifest_name() -> String { "palette_manifest.json".to_string() }
fn default_true() -> bool { true }

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            document_prefix: default_document_prefix(),
            image_prefix: default_image_prefix(),
            min_half: default_min_half(),
            max_side: default_max_side(),
            report_name: default_report_name(),
            manifest_name: default_manifest_name(),
            write_text_dump: true,
        }
    }
}

impl PaletteConfig {
    pub fn load(path: &Path) -> Result<Self, PaletteError> {
        let content = fs::read_to_string(path).map_err(|e| PaletteError::io(path, e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| PaletteError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PaletteError> {
        if !self.min_half.is_power_of_two() {
            return Err(PaletteError::Config(format!("minHalf must be a power of two, got {}", self.min_half)));
        }
        if self.max_side < 2 || self.max_side % 2 != 0 {
            return Err(PaletteError::Config(format!("maxSide must be even and at least 2, got {}", self.max_side)));
        }
        if self.min_half * 2 > self.max_side {
            return Err(PaletteError::Config(format!(
                "minHalf {} does not fit in maxSide {}",
                self.min_half, self.max_side
            )));
        }
        Ok(())
    }

    pub fn limits(&self) -> LayoutLimits {
        LayoutLimits {
            min_half: self.min_half,
            max_side: self.max_side,
        }
    }

    /// `<dir>/<imagePrefix><style>.png`, where `<style>` is the input stem
    /// without the document prefix.
    pub fn image_path(&self, document: &Path) -> PathBuf {
        let stem = document
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let style = stem.strip_prefix(&self.document_prefix).unwrap_or(&stem);
        sibling(document, &format!("{}{}.png", self.image_prefix, style))
    }

    pub fn text_dump_path(&self, document: &Path) -> PathBuf {
        document.with_extension("txt")
    }

    /// Report path: beside the first document unless overridden.
    pub fn report_path(&self, first_document: &Path) -> PathBuf {
        sibling(first_document, &self.report_name)
    }

    pub fn manifest_path(&self, report: &Path) -> PathBuf {
        sibling(report, &self.manifest_name)
    }
}

fn sibling(path: &Path, name: &str) -> PathBuf {
    match path.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: PaletteConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PaletteConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let config: PaletteConfig = serde_json::from_str(r#"{"minHalf": 1, "writeTextDump": false}"#).unwrap();
        assert_eq!(config.min_half, 1);
        assert!(!config.write_text_dump);
        assert_eq!(config.max_side, 4096);
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let config = PaletteConfig { min_half: 6, ..PaletteConfig::default() };
        assert!(config.validate().is_err());
        let config = PaletteConfig { max_side: 15, ..PaletteConfig::default() };
        assert!(config.validate().is_err());
        let config = PaletteConfig { min_half: 4096, ..PaletteConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_names() {
        let config = PaletteConfig::default();
        let doc = Path::new("styles/drules_proto_dark.json");
        assert_eq!(config.image_path(doc), PathBuf::from("styles/static_colors_dark.png"));
        assert_eq!(config.text_dump_path(doc), PathBuf::from("styles/drules_proto_dark.txt"));
        assert_eq!(config.report_path(doc), PathBuf::from("styles/style_diff.txt"));
        assert_eq!(config.image_path(Path::new("clear.json")), PathBuf::from("static_colorsclear.png"));
    }
}
