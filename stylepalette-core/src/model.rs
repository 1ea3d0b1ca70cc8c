//! Rule Tree Model - typed nodes for drawing-rule documents
//!
//! A document is a tree of [`RuleNode`]s. Leaf fields whose names end in
//! [`COLOR_SUFFIX`] are colors; everything else is structure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PaletteError;

/// Reserved suffix marking a leaf field as a color.
pub const COLOR_SUFFIX: &str = "color";

/// Coordinate suffixes written in place of a color leaf.
pub const X_SUFFIX: &str = "_x";
pub const Y_SUFFIX: &str = "_y";

pub fn is_color_field(name: &str) -> bool {
    name.ends_with(COLOR_SUFFIX)
}

/// True for `<color field>_x` / `<color field>_y`.
pub fn is_coordinate_field(name: &str) -> bool {
    name.strip_suffix(X_SUFFIX)
        .or_else(|| name.strip_suffix(Y_SUFFIX))
        .map_or(false, is_color_field)
}

/// Opaque 32-bit ARGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    /// Pixel bytes in RGBA order.
    pub fn to_rgba(self) -> [u8; 4] {
        let [a, r, g, b] = self.0.to_be_bytes();
        [r, g, b, a]
    }

    pub fn from_rgba([r, g, b, a]: [u8; 4]) -> Self {
        Self(u32::from_be_bytes([a, r, g, b]))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Leaf value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Interpret as a color. Only integers in `u32` range qualify.
    pub fn as_color(&self) -> Option<Color> {
        match self {
            Scalar::Int(v) => u32::try_from(*v).ok().map(Color),
            _ => None,
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self { Scalar::Int(v) }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self { Scalar::Int(i64::from(v)) }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self { Scalar::Int(i64::from(v)) }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self { Scalar::Float(v) }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self { Scalar::Bool(v) }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self { Scalar::Text(v.to_string()) }
}

impl From<Color> for Scalar {
    fn from(c: Color) -> Self { Scalar::Int(i64::from(c.0)) }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(v) => write!(f, "{:?}", v),
        }
    }
}

/// Category of drawing rule. Doubles as key disambiguator and diff category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleClass {
    Line,
    Area,
    Symbol,
    Caption,
    Circle,
    PathText,
    Shield,
}

impl RuleClass {
    pub const ALL: [RuleClass; 7] = [
        RuleClass::Line,
        RuleClass::Area,
        RuleClass::Symbol,
        RuleClass::Caption,
        RuleClass::Circle,
        RuleClass::PathText,
        RuleClass::Shield,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            RuleClass::Line => "line",
            RuleClass::Area => "area",
            RuleClass::Symbol => "symbol",
            RuleClass::Caption => "caption",
            RuleClass::Circle => "circle",
            RuleClass::PathText => "path-text",
            RuleClass::Shield => "shield",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }

    /// Bit used in pairwise diff masks.
    pub fn bit(self) -> u32 {
        match self {
            RuleClass::Line => 1 << 2,
            RuleClass::Area => 1 << 3,
            RuleClass::Symbol => 1 << 4,
            RuleClass::Caption => 1 << 5,
            RuleClass::Circle => 1 << 6,
            RuleClass::PathText => 1 << 7,
            RuleClass::Shield => 1 << 8,
        }
    }
}

impl fmt::Display for RuleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Container,
    Class,
    Element,
    CaptionDef,
    LineDef,
    DashDot,
    PathSym,
    Line,
    Area,
    Symbol,
    Caption,
    Circle,
    PathText,
    Shield,
}

impl NodeKind {
    /// Rule class carried by this kind, if it is a rule.
    pub fn rule_class(self) -> Option<RuleClass> {
        match self {
            NodeKind::Line => Some(RuleClass::Line),
            NodeKind::Area => Some(RuleClass::Area),
            NodeKind::Symbol => Some(RuleClass::Symbol),
            NodeKind::Caption => Some(RuleClass::Caption),
            NodeKind::Circle => Some(RuleClass::Circle),
            NodeKind::PathText => Some(RuleClass::PathText),
            NodeKind::Shield => Some(RuleClass::Shield),
            NodeKind::Container
            | NodeKind::Class
            | NodeKind::Element
            | NodeKind::CaptionDef
            | NodeKind::LineDef
            | NodeKind::DashDot
            | NodeKind::PathSym => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Container => "container",
            NodeKind::Class => "class",
            NodeKind::Element => "element",
            NodeKind::CaptionDef => "caption-def",
            NodeKind::LineDef => "line-def",
            NodeKind::DashDot => "dash-dot",
            NodeKind::PathSym => "path-sym",
            NodeKind::Line => "line",
            NodeKind::Area => "area",
            NodeKind::Symbol => "symbol",
            NodeKind::Caption => "caption",
            NodeKind::Circle => "circle",
            NodeKind::PathText => "path-text",
            NodeKind::Shield => "shield",
        }
    }
}

/// Child field: a single node or an ordered list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Child {
    One(Box<RuleNode>),
    Many(Vec<RuleNode>),
}

impl Child {
    pub fn nodes(&self) -> &[RuleNode] {
        match self {
            Child::One(node) => std::slice::from_ref(&**node),
            Child::Many(list) => list,
        }
    }
}

/// Identity attributes of a node, excluding its physical position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity<'a> {
    pub name: Option<&'a str>,
    pub scale: Option<i32>,
    pub priority: Option<i64>,
    /// Predicate terms, sorted.
    pub predicate: Vec<&'a str>,
}

impl Identity<'_> {
    /// Token from every identity attribute except priority.
    pub fn base_token(&self) -> String {
        let mut token = String::new();
        if let Some(name) = self.name {
            token.push('[');
            token.push_str(name);
            token.push(']');
        }
        if let Some(scale) = self.scale {
            token.push('@');
            token.push_str(&scale.to_string());
        }
        if !self.predicate.is_empty() {
            token.push('{');
            token.push_str(&self.predicate.join("&"));
            token.push('}');
        }
        token
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_none() && self.scale.is_none() && self.priority.is_none() && self.predicate.is_empty()
    }
}

/// Explicit field access used by the key builder and both extractors.
pub trait StyleNode {
    fn kind(&self) -> NodeKind;
    fn identity(&self) -> Identity<'_>;
    fn color_fields(&self) -> Vec<(&str, Color)>;
    fn non_color_fields(&self) -> Vec<(&str, &Scalar)>;
    fn children(&self) -> Vec<(&str, &Child)>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleNode {
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apply_if: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Scalar>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, Child>,
}

impl RuleNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            name: None,
            scale: None,
            priority: None,
            apply_if: vec![],
            fields: BTreeMap::new(),
            children: BTreeMap::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_scale(mut self, scale: i32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_predicate(mut self, term: &str) -> Self {
        self.apply_if.push(term.to_string());
        self
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Scalar>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with_child(mut self, field: &str, node: RuleNode) -> Self {
        self.children.insert(field.to_string(), Child::One(Box::new(node)));
        self
    }

    /// Appends to the list under `field`, creating it if needed.
    pub fn with_item(mut self, field: &str, node: RuleNode) -> Self {
        let slot = self.children.entry(field.to_string()).or_insert_with(|| Child::Many(vec![]));
        if matches!(slot, Child::One(_)) {
            if let Child::One(prev) = std::mem::replace(slot, Child::Many(vec![])) {
                *slot = Child::Many(vec![*prev]);
            }
        }
        if let Child::Many(list) = slot {
            list.push(node);
        }
        self
    }

    pub fn field(&self, name: &str) -> Option<&Scalar> {
        self.fields.get(name)
    }

    fn write_text(&self, out: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        if let Some(name) = &self.name {
            writeln!(out, "{}name: {:?}", pad, name)?;
        }
        if let Some(scale) = self.scale {
            writeln!(out, "{}scale: {}", pad, scale)?;
        }
        if let Some(priority) = self.priority {
            writeln!(out, "{}priority: {}", pad, priority)?;
        }
        for term in &self.apply_if {
            writeln!(out, "{}apply_if: {:?}", pad, term)?;
        }
        for (field, value) in &self.fields {
            writeln!(out, "{}{}: {}", pad, field, value)?;
        }
        for (field, child) in &self.children {
            for node in child.nodes() {
                writeln!(out, "{}{} {{", pad, field)?;
                node.write_text(out, depth + 1)?;
                writeln!(out, "{}}}", pad)?;
            }
        }
        Ok(())
    }
}

impl StyleNode for RuleNode {
    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn identity(&self) -> Identity<'_> {
        let mut predicate: Vec<&str> = self.apply_if.iter().map(String::as_str).collect();
        predicate.sort_unstable();
        Identity {
            name: self.name.as_deref(),
            scale: self.scale,
            priority: self.priority,
            predicate,
        }
    }

    fn color_fields(&self) -> Vec<(&str, Color)> {
        self.fields
            .iter()
            .filter(|(name, _)| is_color_field(name))
            .filter_map(|(name, value)| value.as_color().map(|c| (name.as_str(), c)))
            .collect()
    }

    fn non_color_fields(&self) -> Vec<(&str, &Scalar)> {
        self.fields
            .iter()
            .filter(|(name, _)| !is_color_field(name) && !is_coordinate_field(name))
            .map(|(name, value)| (name.as_str(), value))
            .collect()
    }

    fn children(&self) -> Vec<(&str, &Child)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }
}

/// Dumps the node in an indented, protobuf-text-like form.
impl fmt::Display for RuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_text(f, 0)
    }
}

/// One parsed rule tree and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDocument {
    pub path: PathBuf,
    pub root: RuleNode,
}

impl StyleDocument {
    pub fn new(path: impl Into<PathBuf>, root: RuleNode) -> Self {
        Self { path: path.into(), root }
    }

    pub fn load(path: &Path) -> Result<Self, PaletteError> {
        let text = fs::read_to_string(path).map_err(|e| PaletteError::io(path, e))?;
        Self::from_json(path, &text)
    }

    pub fn from_json(path: impl Into<PathBuf>, text: &str) -> Result<Self, PaletteError> {
        let path = path.into();
        let root: RuleNode = serde_json::from_str(text).map_err(|e| PaletteError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        if let Err(message) = check_node(&root, root.kind.as_str()) {
            return Err(PaletteError::Parse { path, message });
        }
        Ok(Self { path, root })
    }

    pub fn to_json(&self) -> Result<String, PaletteError> {
        Ok(serde_json::to_string_pretty(&self.root)?)
    }

    pub fn text_dump(&self) -> String {
        self.root.to_string()
    }

    /// File name used in reports.
    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Characters with a meaning inside canonical keys.
const KEY_SYNTAX: &[char] = &['/', '|', '[', ']', '{', '}', '&', '~', '@'];

fn check_identifier(what: &str, text: &str, location: &str) -> Result<(), String> {
    match text.chars().find(|c| KEY_SYNTAX.contains(c)) {
        Some(c) => Err(format!("{} `{}` at {} contains reserved character `{}`", what, text, location, c)),
        None => Ok(()),
    }
}

/// Colors must fit in 32 bits, and names that end up in keys must not
/// contain key syntax.
fn check_node(node: &RuleNode, location: &str) -> Result<(), String> {
    if let Some(name) = &node.name {
        check_identifier("name", name, location)?;
    }
    for term in &node.apply_if {
        check_identifier("predicate", term, location)?;
    }
    for (name, value) in &node.fields {
        check_identifier("field", name, location)?;
        if is_color_field(name) && value.as_color().is_none() {
            return Err(format!("field `{}` at {} is not a 32-bit color: {}", name, location, value));
        }
    }
    for (field, child) in &node.children {
        check_identifier("child field", field, location)?;
        for (i, n) in child.nodes().iter().enumerate() {
            check_node(n, &format!("{}.{}[{}]", location, field, i))?;
        }
    }
    Ok(())
}
