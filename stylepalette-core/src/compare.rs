//! Structural Comparator - which rule classes differ between two styles
//!
//! Uses the same canonical keys as the palette compiler, but over non-color
//! leaves. Priority is an identity attribute, already folded into the key,
//! so it never shows up as a difference on its own.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::PaletteError;
use crate::keys::{self, CanonicalKey};
use crate::model::{RuleClass, Scalar, StyleDocument, StyleNode};

pub type StructureExtraction = BTreeMap<CanonicalKey, Scalar>;

/// Every non-color leaf of `document`, keyed canonically.
pub fn extract_structure(document: &StyleDocument, index: usize) -> Result<StructureExtraction, PaletteError> {
    let mut values = StructureExtraction::new();
    keys::walk(&document.root, &mut |scope, node| {
        for (field, value) in node.non_color_fields() {
            let key = scope.key(field);
            if values.contains_key(&key) {
                return Err(PaletteError::DuplicateKey { key, document: index });
            }
            values.insert(key, value.clone());
        }
        Ok(())
    })?;
    Ok(values)
}

/// Set of rule classes, one bit each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiffMask(pub u32);

impl DiffMask {
    pub fn insert(&mut self, class: RuleClass) {
        self.0 |= class.bit();
    }

    pub fn contains(self, class: RuleClass) -> bool {
        self.0 & class.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn classes(self) -> Vec<RuleClass> {
        RuleClass::ALL.into_iter().filter(|c| self.contains(*c)).collect()
    }
}

impl fmt::Display for DiffMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rule classes with at least one key that differs or exists on one side only.
pub fn compare(a: &StructureExtraction, b: &StructureExtraction) -> DiffMask {
    let mut mask = DiffMask::default();
    let all_keys: BTreeSet<&CanonicalKey> = a.keys().chain(b.keys()).collect();
    for key in all_keys {
        if a.get(key) == b.get(key) {
            continue;
        }
        if let Some(class) = key.rule_class() {
            mask.insert(class);
        }
    }
    mask
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairDiff {
    pub left: usize,
    pub right: usize,
    pub mask: DiffMask,
}

/// Every unordered pair `(i, j)`, `i < j`, in index order.
pub fn compare_all(extractions: &[StructureExtraction]) -> Vec<PairDiff> {
    let mut diffs = vec![];
    for i in 0..extractions.len() {
        for j in i + 1..extractions.len() {
            diffs.push(PairDiff {
                left: i,
                right: j,
                mask: compare(&extractions[i], &extractions[j]),
            });
        }
    }
    diffs
}

/// One `<name_i> <name_j> <mask>` line per pair.
pub fn format_report(diffs: &[PairDiff], names: &[String]) -> String {
    let mut out = String::new();
    for diff in diffs {
        out.push_str(&format!("{} {} {}\n", names[diff.left], names[diff.right], diff.mask));
    }
    out
}
