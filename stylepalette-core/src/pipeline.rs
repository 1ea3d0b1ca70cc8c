//! Compilation Pipeline - Single Entry Point
//!
//! CRITICAL: compile() verifies every rewritten document against its palette
//! before returning. Nothing is published from an unverified run, and any
//! error aborts before the first file is written.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::compare::{compare_all, extract_structure, format_report, PairDiff, StructureExtraction};
use crate::config::PaletteConfig;
use crate::error::PaletteError;
use crate::hashing::{compute_table_hash, sha256_hex};
use crate::image::PaletteImage;
use crate::model::StyleDocument;
use crate::palette::{build_table, extract_colors, layout, render, verify, write_back, ColorExtraction, IndirectionTable};
use crate::ENGINE_VERSION;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VERIFY_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_verify_call_count() -> u32 {
    VERIFY_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_verify_call_count() {
    VERIFY_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Overrides the default report location.
    pub report: Option<PathBuf>,
    pub compare: bool,
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            report: None,
            compare: true,
            dry_run: false,
        }
    }
}

/// Result of the in-memory stages, ready to publish.
#[derive(Debug, Clone)]
pub struct CompiledPalette {
    pub documents: Vec<StyleDocument>,
    pub images: Vec<PaletteImage>,
    pub table: IndirectionTable,
    pub side: usize,
    pub rewritten: usize,
    pub diffs: Option<Vec<PairDiff>>,
}

impl CompiledPalette {
    pub fn names(&self) -> Vec<String> {
        self.documents.iter().map(StyleDocument::basename).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub document: PathBuf,
    pub image: PathBuf,
    pub document_hash: String,
    pub image_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub engine_version: String,
    pub slot_count: usize,
    pub side: usize,
    pub table_hash: String,
    pub documents: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub slot_count: usize,
    pub side: usize,
    pub rewritten: usize,
    pub diffs: Option<Vec<PairDiff>>,
    pub report: Option<PathBuf>,
    pub manifest: Option<RunManifest>,
}

/// The palette pipeline - single entry point for a run
pub struct PalettePipeline {
    config: PaletteConfig,
}

impl PalettePipeline {
    pub fn new(config: PaletteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PaletteConfig {
        &self.config
    }

    /// Parses every document, one task per file.
    pub fn load_documents(&self, paths: &[PathBuf]) -> Result<Vec<StyleDocument>, PaletteError> {
        paths
            .par_iter()
            .map(|path| -> Result<StyleDocument, PaletteError> {
                let doc = StyleDocument::load(path)?;
                debug!(path = %path.display(), "parsed style document");
                Ok(doc)
            })
            .collect()
    }

    /// Runs every in-memory stage: extract, build table, lay out, render,
    /// write back, verify and (optionally) compare.
    pub fn compile(&self, mut documents: Vec<StyleDocument>, compare: bool) -> Result<CompiledPalette, PaletteError> {
        let extracted: Vec<(ColorExtraction, Option<StructureExtraction>)> = documents
            .par_iter()
            .enumerate()
            .map(|(i, doc)| -> Result<_, PaletteError> {
                let colors = extract_colors(doc, i)?;
                let structure = if compare { Some(extract_structure(doc, i)?) } else { None };
                if colors.is_empty() {
                    warn!(document = %doc.path.display(), "document has no color fields");
                }
                debug!(document = %doc.path.display(), colors = colors.len(), "extracted keys");
                Ok((colors, structure))
            })
            .collect::<Result<_, PaletteError>>()?;
        let (colors, structures): (Vec<_>, Vec<_>) = extracted.into_iter().unzip();

        let table = build_table(&colors);
        let side = layout(table.slot_count(), self.config.limits())?;
        info!(
            keys = table.key_count(),
            slots = table.slot_count(),
            side,
            "built indirection table"
        );

        let rendered: Vec<(PaletteImage, usize)> = documents
            .par_iter_mut()
            .enumerate()
            .map(|(i, doc)| -> Result<_, PaletteError> {
                let image = render(&table, i, side);
                let rewritten = write_back(doc, &table, side)?;
                let checked = verify_document(doc, i, &colors[i], &image)?;
                debug!(document = %doc.path.display(), rewritten, checked, "verified palette coordinates");
                Ok((image, rewritten))
            })
            .collect::<Result<_, PaletteError>>()?;
        let (images, counts): (Vec<_>, Vec<_>) = rendered.into_iter().unzip();

        let diffs = if compare {
            let structures: Vec<StructureExtraction> = structures.into_iter().flatten().collect();
            let diffs = compare_all(&structures);
            info!(pairs = diffs.len(), "compared document structure");
            Some(diffs)
        } else {
            None
        };

        Ok(CompiledPalette {
            documents,
            images,
            table,
            side,
            rewritten: counts.into_iter().sum(),
            diffs,
        })
    }

    /// Writes every output. All bytes are produced before the first write.
    pub fn publish(&self, compiled: &CompiledPalette, report: &Path) -> Result<RunManifest, PaletteError> {
        let inputs: Vec<&Path> = compiled.documents.iter().map(|d| d.path.as_path()).collect();
        let manifest_path = self.config.manifest_path(report);
        self.check_outputs(&inputs, compiled.diffs.is_some().then_some(report), &manifest_path)?;

        let mut outputs: Vec<(PathBuf, Vec<u8>)> = vec![];
        let mut entries = vec![];

        for (doc, image) in compiled.documents.iter().zip(&compiled.images) {
            let json = doc.to_json()?.into_bytes();
            let png = image.encode_png()?;
            let image_path = self.config.image_path(&doc.path);

            entries.push(ManifestEntry {
                document: doc.path.clone(),
                image: image_path.clone(),
                document_hash: sha256_hex(&json),
                image_hash: sha256_hex(&png),
            });

            if self.config.write_text_dump {
                outputs.push((self.config.text_dump_path(&doc.path), doc.text_dump().into_bytes()));
            }
            outputs.push((image_path, png));
            outputs.push((doc.path.clone(), json));
        }

        if let Some(diffs) = &compiled.diffs {
            outputs.push((report.to_path_buf(), format_report(diffs, &compiled.names()).into_bytes()));
        }

        let manifest = RunManifest {
            engine_version: ENGINE_VERSION.to_string(),
            slot_count: compiled.table.slot_count(),
            side: compiled.side,
            table_hash: compute_table_hash(&compiled.table)?,
            documents: entries,
        };
        let manifest_json = serde_json::to_string_pretty(&manifest)?;
        outputs.push((manifest_path, manifest_json.into_bytes()));

        for (path, bytes) in &outputs {
            write_atomic(path, bytes)?;
            debug!(path = %path.display(), bytes = bytes.len(), "wrote output");
        }
        info!(files = outputs.len(), "published palette outputs");

        Ok(manifest)
    }

    /// Load, compile and (unless dry-running) publish.
    pub fn run(&self, paths: &[PathBuf], options: &RunOptions) -> Result<RunSummary, PaletteError> {
        let Some(first) = paths.first() else {
            return Err(PaletteError::Config("no style documents given".into()));
        };

        let report = options
            .report
            .clone()
            .unwrap_or_else(|| self.config.report_path(first));
        let inputs: Vec<&Path> = paths.iter().map(PathBuf::as_path).collect();
        self.check_outputs(
            &inputs,
            options.compare.then_some(report.as_path()),
            &self.config.manifest_path(&report),
        )?;

        let documents = self.load_documents(paths)?;
        info!(documents = documents.len(), "loaded style documents");

        let compiled = self.compile(documents, options.compare)?;

        let manifest = if options.dry_run {
            info!("dry run, nothing written");
            None
        } else {
            Some(self.publish(&compiled, &report)?)
        };

        let report = match (&compiled.diffs, &manifest) {
            (Some(_), Some(_)) => Some(report),
            _ => None,
        };

        Ok(RunSummary {
            slot_count: compiled.table.slot_count(),
            side: compiled.side,
            rewritten: compiled.rewritten,
            diffs: compiled.diffs,
            report,
            manifest,
        })
    }

    /// Fails when two outputs of one run land on the same path.
    fn check_outputs(&self, documents: &[&Path], report: Option<&Path>, manifest: &Path) -> Result<(), PaletteError> {
        let mut claimed: BTreeMap<PathBuf, String> = BTreeMap::new();
        let mut claim = |path: PathBuf, role: String| -> Result<(), PaletteError> {
            if let Some(first) = claimed.get(&path) {
                return Err(PaletteError::OutputClash {
                    path,
                    first: first.clone(),
                    second: role,
                });
            }
            claimed.insert(path, role);
            Ok(())
        };

        for doc in documents {
            claim(doc.to_path_buf(), format!("rewritten {}", doc.display()))?;
            if self.config.write_text_dump {
                claim(self.config.text_dump_path(doc), format!("text dump of {}", doc.display()))?;
            }
            claim(self.config.image_path(doc), format!("palette of {}", doc.display()))?;
        }
        if let Some(report) = report {
            claim(report.to_path_buf(), "diff report".to_string())?;
        }
        claim(manifest.to_path_buf(), "run manifest".to_string())
    }
}

impl Default for PalettePipeline {
    fn default() -> Self {
        Self::new(PaletteConfig::default())
    }
}

fn verify_document(
    document: &StyleDocument,
    index: usize,
    originals: &ColorExtraction,
    image: &PaletteImage,
) -> Result<usize, PaletteError> {
    #[cfg(feature = "test-hooks")]
    VERIFY_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

    verify(document, index, originals, image)
}

/// Temp file in the target directory, renamed into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PaletteError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| PaletteError::io(path, e))?;
    file.write_all(bytes).map_err(|e| PaletteError::io(path, e))?;
    file.persist(path).map_err(|e| PaletteError::io(path, e.error))?;
    Ok(())
}
