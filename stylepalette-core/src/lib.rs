//! Style Palette Compiler
//!
//! Rewrites a set of drawing-rule documents so that literal colors become
//! coordinates into one small palette texture per style, and reports which
//! rule classes differ structurally between every pair of styles.
//!
//! # Guarantees
//! 1. Keys are independent of list order and raw priority numbers
//! 2. Identical color signatures share a slot, different ones never do
//! 3. Deterministic output for identical input
//! 4. Every rewritten coordinate is read back and checked before anything is written
//! 5. Any collision, capacity or identity failure aborts the whole run

pub mod error;
pub mod model;
pub mod keys;
pub mod image;
pub mod palette;
pub mod compare;
pub mod config;
pub mod hashing;
pub mod pipeline;

pub use error::PaletteError;
pub use model::{Color, NodeKind, RuleClass, RuleNode, Scalar, StyleDocument, StyleNode};
pub use keys::CanonicalKey;
pub use image::PaletteImage;
pub use palette::{build_table, extract_colors, layout, render, slot_to_coords, verify, write_back, IndirectionTable, LayoutLimits};
pub use compare::{compare, compare_all, extract_structure, DiffMask, PairDiff};
pub use config::PaletteConfig;
pub use hashing::{compute_table_hash, sha256_hex};
pub use pipeline::{CompiledPalette, PalettePipeline, RunManifest, RunOptions, RunSummary};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
