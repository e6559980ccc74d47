//! Column label parsing

use serde::{Deserialize, Serialize};

/// Separator between path segments in a column label
pub const PATH_SEPARATOR: char = '/';

/// Case folding applied to every path segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelCase {
    #[default]
    Preserve,
    Lower,
    Upper,
}

impl LabelCase {
    /// Fold a segment (or a whole label) to this case
    pub fn apply(self, segment: &str) -> String {
        match self {
            LabelCase::Preserve => segment.to_string(),
            LabelCase::Lower => segment.to_lowercase(),
            LabelCase::Upper => segment.to_uppercase(),
        }
    }
}

/// A column label split into path segments, e.g. `invoice/total` → `["invoice", "total"]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPath {
    segments: Vec<String>,
}

impl ColumnPath {
    /// Split a label on `/`, dropping empty segments.
    ///
    /// Returns `None` when no segment remains (e.g. `""` or `"//"`).
    pub fn parse(label: &str, case: LabelCase) -> Option<Self> {
        let segments: Vec<String> = label
            .split(PATH_SEPARATOR)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| case.apply(segment))
            .collect();

        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    /// Intermediate segments and the leaf segment
    pub fn split_leaf(&self) -> (&[String], &str) {
        let (leaf, parents) = self
            .segments
            .split_last()
            .expect("parse guarantees at least one segment");
        (parents, leaf.as_str())
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl std::fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
