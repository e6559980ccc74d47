//! Merging path-valued columns into a nested record
//!
//! Rules applied at each column path:
//! - intermediate segments descend into (or create) nested records
//! - a new leaf is set directly
//! - a leaf that already holds a different value becomes a list, in arrival order
//! - a value equal to the one already stored (or to the last list item) is not repeated
//! - a shape clash (scalar where a record is needed, or the reverse) is a
//!   [`MergeConflict`]: it is logged and the incoming shape wins

use super::path::ColumnPath;
use crate::types::{NestedRecord, Node, ScalarValue};
use std::fmt;
use tracing::warn;

/// A path whose existing value had a different shape than the incoming one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
    /// Column path being merged
    pub path: String,
    /// Segment at which the clash occurred
    pub segment: String,
    /// Shape already stored at the segment
    pub existing: &'static str,
    /// Shape the incoming column required
    pub incoming: &'static str,
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column '{}' needs a {} at '{}' but a {} is already there; overwriting",
            self.path, self.incoming, self.segment, self.existing
        )
    }
}

/// Merge one scalar value into `record` at `path`.
///
/// Conflicts are logged, resolved in favour of the incoming value, and pushed
/// onto `conflicts`.
pub fn merge_value(
    record: &mut NestedRecord,
    path: &ColumnPath,
    value: ScalarValue,
    conflicts: &mut Vec<MergeConflict>,
) {
    let (parents, leaf) = path.split_leaf();

    let mut current = record;
    for segment in parents {
        current = descend(current, segment, path, conflicts);
    }

    merge_leaf(current, leaf, value, path, conflicts);
}

/// Nested record reachable from a node: the node itself, or the last item of a list
fn record_mut(node: &mut Node) -> Option<&mut NestedRecord> {
    match node {
        Node::Record(inner) => Some(inner),
        Node::List(items) => match items.last_mut() {
            Some(Node::Record(inner)) => Some(inner),
            _ => None,
        },
        Node::Scalar(_) => None,
    }
}

fn descend<'a>(
    record: &'a mut NestedRecord,
    segment: &str,
    path: &ColumnPath,
    conflicts: &mut Vec<MergeConflict>,
) -> &'a mut NestedRecord {
    let slot = record
        .entry(segment.to_string())
        .or_insert_with(|| Node::Record(NestedRecord::new()));

    if record_mut(slot).is_none() {
        report(conflicts, path, segment, slot.kind(), "record");
        *slot = Node::Record(NestedRecord::new());
    }

    record_mut(slot).expect("slot holds a record after reset")
}

fn merge_leaf(
    record: &mut NestedRecord,
    leaf: &str,
    value: ScalarValue,
    path: &ColumnPath,
    conflicts: &mut Vec<MergeConflict>,
) {
    let Some(slot) = record.get_mut(leaf) else {
        record.insert(leaf.to_string(), Node::Scalar(value));
        return;
    };

    match slot {
        Node::Scalar(existing) if *existing == value => {}
        Node::Scalar(_) => {
            let previous = std::mem::replace(slot, Node::List(Vec::new()));
            *slot = Node::List(vec![previous, Node::Scalar(value)]);
        }
        Node::List(items) => {
            let repeated = matches!(items.last(), Some(Node::Scalar(last)) if *last == value);
            if !repeated {
                items.push(Node::Scalar(value));
            }
        }
        Node::Record(_) => {
            report(conflicts, path, leaf, "record", "scalar");
            *slot = Node::Scalar(value);
        }
    }
}

fn report(
    conflicts: &mut Vec<MergeConflict>,
    path: &ColumnPath,
    segment: &str,
    existing: &'static str,
    incoming: &'static str,
) {
    let conflict = MergeConflict {
        path: path.to_string(),
        segment: segment.to_string(),
        existing,
        incoming,
    };
    warn!("Merge conflict: {}", conflict);
    conflicts.push(conflict);
}
