//! Canonical Keys - order-independent identity for (node, field) pairs
//!
//! A key is the chain of identity tokens from the root down to a node, the
//! leaf field name, and the rule-class tag:
//!
//! ```text
//! cont[highway]/element@17/lines~0/color|line
//! ```
//!
//! List indices never appear. List members are told apart by name, scale,
//! predicate and a priority *rank*: siblings sharing the same non-priority
//! token are sorted by raw priority and numbered 0, 1, 2... so documents
//! that store the same alternatives in a different order or with shifted
//! priority numbers still line up.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::PaletteError;
use crate::model::{Child, RuleClass, RuleNode, StyleNode};

const TAG_SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Wraps a string already in key form. No checking is done; keys from a
    /// document always come from walking it.
    pub fn from_raw(raw: &str) -> Self {
        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rule class embedded in the key, if any.
    pub fn rule_class(&self) -> Option<RuleClass> {
        let (_, tag) = self.0.rsplit_once(TAG_SEPARATOR)?;
        RuleClass::from_tag(tag)
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a node sits, both canonically and physically.
#[derive(Debug, Clone)]
pub struct KeyScope {
    path: String,
    class: Option<RuleClass>,
    location: String,
}

impl KeyScope {
    fn root(node: &RuleNode) -> Self {
        Self {
            path: String::new(),
            class: node.kind().rule_class(),
            location: node.kind().as_str().to_string(),
        }
    }

    fn descend(&self, segment: &str, child: &RuleNode, location: String) -> Self {
        let path = if self.path.is_empty() {
            segment.to_string()
        } else {
            format!("{}/{}", self.path, segment)
        };
        Self {
            path,
            class: child.kind().rule_class().or(self.class),
            location,
        }
    }

    /// Key for a leaf field of the node at this scope.
    pub fn key(&self, field: &str) -> CanonicalKey {
        let mut key = if self.path.is_empty() {
            field.to_string()
        } else {
            format!("{}/{}", self.path, field)
        };
        if let Some(class) = self.class {
            key.push(TAG_SEPARATOR);
            key.push_str(class.tag());
        }
        CanonicalKey(key)
    }

    pub fn rule_class(&self) -> Option<RuleClass> {
        self.class
    }

    /// Physical path, used in diagnostics.
    pub fn location(&self) -> &str {
        &self.location
    }
}

/// Canonical segments for every member of a child list, in list order.
pub fn member_segments(field: &str, members: &[RuleNode], parent: &str) -> Result<Vec<String>, PaletteError> {
    let mut bases = Vec::with_capacity(members.len());
    // base token -> [(raw priority, list index)]
    let mut ranked: BTreeMap<String, Vec<(i64, usize)>> = BTreeMap::new();

    for (i, member) in members.iter().enumerate() {
        let identity = member.identity();
        if identity.is_anonymous() {
            return Err(PaletteError::Identity {
                location: format!("{}.{}[{}]", parent, field, i),
            });
        }
        let base = identity.base_token();
        if let Some(priority) = identity.priority {
            ranked.entry(base.clone()).or_default().push((priority, i));
        }
        bases.push(base);
    }

    let mut ranks = vec![None; members.len()];
    for group in ranked.values_mut() {
        group.sort();
        for (rank, &(_, i)) in group.iter().enumerate() {
            ranks[i] = Some(rank);
        }
    }

    Ok(bases
        .into_iter()
        .zip(ranks)
        .map(|(base, rank)| match rank {
            Some(rank) => format!("{}{}~{}", field, base, rank),
            None => format!("{}{}", field, base),
        })
        .collect())
}

/// Visits every node, parents before children, with its key scope.
pub fn walk<F>(root: &RuleNode, visit: &mut F) -> Result<(), PaletteError>
where
    F: FnMut(&KeyScope, &RuleNode) -> Result<(), PaletteError>,
{
    walk_node(&KeyScope::root(root), root, visit)
}

fn walk_node<F>(scope: &KeyScope, node: &RuleNode, visit: &mut F) -> Result<(), PaletteError>
where
    F: FnMut(&KeyScope, &RuleNode) -> Result<(), PaletteError>,
{
    visit(scope, node)?;
    for (field, child) in node.children() {
        match child {
            Child::One(inner) => {
                let location = format!("{}.{}", scope.location, field);
                walk_node(&scope.descend(field, inner, location), inner, visit)?;
            }
            Child::Many(list) => {
                let segments = member_segments(field, list, &scope.location)?;
                for (i, (member, segment)) in list.iter().zip(&segments).enumerate() {
                    let location = format!("{}.{}[{}]", scope.location, field, i);
                    walk_node(&scope.descend(segment, member, location), member, visit)?;
                }
            }
        }
    }
    Ok(())
}

/// Same traversal as [`walk`], handing out mutable nodes.
///
/// The visitor may rewrite leaf fields but must leave identity attributes and
/// children alone; keys for the subtree are computed from the state the node
/// had before the visit.
pub fn walk_mut<F>(root: &mut RuleNode, visit: &mut F) -> Result<(), PaletteError>
where
    F: FnMut(&KeyScope, &mut RuleNode) -> Result<(), PaletteError>,
{
    let scope = KeyScope::root(root);
    walk_node_mut(&scope, root, visit)
}

fn walk_node_mut<F>(scope: &KeyScope, node: &mut RuleNode, visit: &mut F) -> Result<(), PaletteError>
where
    F: FnMut(&KeyScope, &mut RuleNode) -> Result<(), PaletteError>,
{
    visit(scope, node)?;
    for (field, child) in node.children.iter_mut() {
        match child {
            Child::One(inner) => {
                let location = format!("{}.{}", scope.location, field);
                let child_scope = scope.descend(field, inner, location);
                walk_node_mut(&child_scope, inner, visit)?;
            }
            Child::Many(list) => {
                let segments = member_segments(field, list, &scope.location)?;
                for (i, (member, segment)) in list.iter_mut().zip(&segments).enumerate() {
                    let location = format!("{}.{}[{}]", scope.location, field, i);
                    let child_scope = scope.descend(segment, member, location);
                    walk_node_mut(&child_scope, member, visit)?;
                }
            }
        }
    }
    Ok(())
}
