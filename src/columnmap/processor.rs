//! Path-aware row processor
//!
//! Converts flat rows into nested records and groups contiguous rows that share
//! an identifier. The in-progress group lives in an explicit [`GroupState`] that
//! the caller owns, so the state survives chunk boundaries and the final
//! [`GroupState::flush`] is a visible step rather than a side effect.

use super::merge::{merge_value, MergeConflict};
use super::path::{ColumnPath, LabelCase};
use crate::types::{CompletedRecord, Identifier, NestedRecord, Row, ScalarValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How rows are identified and turned into fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Column holding the group identifier (`None` = first column of each row)
    pub identifier_column: Option<String>,
    /// Keep the identifier column as a regular field of the record
    pub retain_identifier: bool,
    /// Case folding applied to path segments
    pub label_case: LabelCase,
}

/// In-progress nested record for one identifier
#[derive(Debug, Clone)]
pub struct GroupAccumulator {
    identifier: Identifier,
    record: NestedRecord,
    row_count: usize,
    conflicts: Vec<MergeConflict>,
}

impl GroupAccumulator {
    fn new(identifier: Identifier) -> Self {
        Self {
            identifier,
            record: NestedRecord::new(),
            row_count: 0,
            conflicts: Vec::new(),
        }
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn record(&self) -> &NestedRecord {
        &self.record
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn conflicts(&self) -> &[MergeConflict] {
        &self.conflicts
    }

    fn complete(self) -> CompletedRecord {
        let identifier = match self.identifier {
            Identifier::Value(v) => Some(v),
            Identifier::Anonymous => None,
        };
        CompletedRecord {
            identifier,
            row_count: self.row_count,
            conflicts: self.conflicts.len(),
            record: self.record,
        }
    }
}

/// Carry-over state between [`PathAwareProcessor::process`] calls.
///
/// Must be flushed once the row stream is exhausted; otherwise the last group
/// is lost.
#[derive(Debug, Default)]
pub struct GroupState {
    current: Option<GroupAccumulator>,
}

impl GroupState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit the in-flight record, if any, and reset the state
    #[must_use = "the flushed record is the last group of the stream"]
    pub fn flush(&mut self) -> Option<CompletedRecord> {
        self.current.take().map(GroupAccumulator::complete)
    }

    /// The group currently being built
    pub fn in_flight(&self) -> Option<&GroupAccumulator> {
        self.current.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}

/// Stateless row processor; all grouping state is held by [`GroupState`]
#[derive(Debug, Clone, Default)]
pub struct PathAwareProcessor {
    config: ProcessorConfig,
}

impl PathAwareProcessor {
    pub fn new(config: ProcessorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Merge one row into `state`.
    ///
    /// Returns the previous group's record when `row` starts a new group, and
    /// `None` while rows keep arriving for the in-flight identifier.
    #[must_use = "a returned record is complete and will not be emitted again"]
    pub fn process(&self, state: &mut GroupState, row: &Row) -> Option<CompletedRecord> {
        let (identifier, id_column) = self.identify(row);

        let same_group = state
            .current
            .as_ref()
            .is_some_and(|current| current.identifier.same_group(&identifier));
        let completed = if same_group { None } else { state.flush() };

        let accumulator = state
            .current
            .get_or_insert_with(|| GroupAccumulator::new(identifier));
        self.merge_row(accumulator, row, id_column.as_deref());

        if let Some(ref record) = completed {
            debug!(
                "Completed record {:?} from {} rows",
                record.identifier, record.row_count
            );
        }
        completed
    }

    /// Convert a single row into a nested record without any grouping
    pub fn row_to_record(&self, row: &Row) -> NestedRecord {
        let (identifier, id_column) = self.identify(row);
        let mut accumulator = GroupAccumulator::new(identifier);
        self.merge_row(&mut accumulator, row, id_column.as_deref());
        accumulator.record
    }

    /// Resolve the row's identifier and the label of the identifier column
    fn identify(&self, row: &Row) -> (Identifier, Option<String>) {
        let (label, value) = match self.config.identifier_column.as_deref() {
            Some(column) => match self.find_column(row, column) {
                Some((label, value)) => (Some(label.to_string()), Some(value)),
                None => (Some(column.to_string()), None),
            },
            None => match row.first() {
                Some((label, value)) => (Some(label.to_string()), Some(value)),
                None => (None, None),
            },
        };

        let identifier = match value.and_then(ScalarValue::as_text) {
            Some(text) => Identifier::Value(text),
            None => {
                warn!(
                    "Row has no usable identifier in column {:?}; it will not be grouped",
                    label
                );
                Identifier::Anonymous
            }
        };

        (identifier, label)
    }

    /// Row column matching `column` once both labels are case folded
    fn find_column<'r>(&self, row: &'r Row, column: &str) -> Option<(&'r str, &'r ScalarValue)> {
        let case = self.config.label_case;
        let wanted = case.apply(column.trim());
        row.iter()
            .find(|(label, _)| *label == column)
            .or_else(|| row.iter().find(|(label, _)| case.apply(label.trim()) == wanted))
    }

    fn merge_row(&self, accumulator: &mut GroupAccumulator, row: &Row, id_column: Option<&str>) {
        accumulator.row_count += 1;

        for (label, value) in row.iter() {
            if !self.config.retain_identifier && Some(label) == id_column {
                continue;
            }
            if value.is_null() {
                continue;
            }
            let Some(path) = ColumnPath::parse(label, self.config.label_case) else {
                warn!("Skipping column with empty label {:?}", label);
                continue;
            };
            merge_value(
                &mut accumulator.record,
                &path,
                value.clone(),
                &mut accumulator.conflicts,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Node;

    fn processor() -> PathAwareProcessor {
        PathAwareProcessor::new(ProcessorConfig {
            identifier_column: Some("id".to_string()),
            ..ProcessorConfig::default()
        })
    }

    fn scalar(value: impl Into<ScalarValue>) -> Node {
        Node::Scalar(value.into())
    }

    #[test]
    fn test_round_trip_requires_explicit_flush() {
        let rows = vec![
            Row::new().with("id", 1).with("name", "A").with("addr/city", "X"),
            Row::new().with("id", 1).with("name", "A").with("addr/zip", "1"),
            Row::new().with("id", 2).with("name", "B").with("addr/city", "Y"),
        ];

        let processor = processor();
        let mut state = GroupState::new();
        let emitted: Vec<CompletedRecord> = rows
            .iter()
            .filter_map(|row| processor.process(&mut state, row))
            .collect();

        assert_eq!(emitted.len(), 1, "second group must stay in flight");
        let first = &emitted[0];
        assert_eq!(first.identifier.as_deref(), Some("1"));
        assert_eq!(first.row_count, 2);
        assert_eq!(first.record.get("name"), Some(&scalar("A")));
        let mut addr = NestedRecord::new();
        addr.insert("city".into(), scalar("X"));
        addr.insert("zip".into(), scalar("1"));
        assert_eq!(first.record.get("addr"), Some(&Node::Record(addr)));
        assert!(first.record.get("id").is_none());

        let last = state.flush().expect("second record is in flight");
        assert_eq!(last.identifier.as_deref(), Some("2"));
        let mut addr = NestedRecord::new();
        addr.insert("city".into(), scalar("Y"));
        assert_eq!(last.record.get("name"), Some(&scalar("B")));
        assert_eq!(last.record.get("addr"), Some(&Node::Record(addr)));

        assert!(state.flush().is_none(), "flush empties the state");
    }

    #[test]
    fn test_same_label_across_rows_builds_list() {
        let processor = processor();
        let mut state = GroupState::new();
        assert!(processor
            .process(&mut state, &Row::new().with("id", 7).with("invoice/total", 3215))
            .is_none());
        assert!(processor
            .process(&mut state, &Row::new().with("id", 7).with("invoice/total", 1376))
            .is_none());

        let record = state.flush().unwrap();
        let Some(Node::Record(invoice)) = record.record.get("invoice") else {
            panic!("invoice should be a nested record");
        };
        assert_eq!(
            invoice.get("total"),
            Some(&Node::List(vec![scalar(3215), scalar(1376)]))
        );
    }

    #[test]
    fn test_first_column_is_default_identifier() {
        let processor = PathAwareProcessor::default();
        let mut state = GroupState::new();
        assert!(processor
            .process(&mut state, &Row::new().with("ID", 1).with("x", "a"))
            .is_none());
        let done = processor
            .process(&mut state, &Row::new().with("ID", 2).with("x", "b"))
            .unwrap();
        assert_eq!(done.identifier.as_deref(), Some("1"));
        assert!(done.record.get("ID").is_none());
    }

    #[test]
    fn test_retain_identifier_keeps_column() {
        let processor = PathAwareProcessor::new(ProcessorConfig {
            retain_identifier: true,
            ..ProcessorConfig::default()
        });
        let record = processor.row_to_record(&Row::new().with("id", 5).with("name", "E"));
        assert_eq!(record.get("id"), Some(&scalar(5)));
        assert_eq!(record.get("name"), Some(&scalar("E")));
    }

    #[test]
    fn test_missing_identifier_is_never_grouped() {
        let processor = processor();
        let mut state = GroupState::new();
        assert!(processor
            .process(&mut state, &Row::new().with("name", "orphan"))
            .is_none());
        let orphan = processor
            .process(&mut state, &Row::new().with("name", "orphan"))
            .expect("anonymous group is flushed by the next row");
        assert_eq!(orphan.identifier, None);
        assert_eq!(orphan.row_count, 1);

        let second = state.flush().unwrap();
        assert_eq!(second.identifier, None);
    }

    #[test]
    fn test_null_identifier_is_anonymous() {
        let processor = processor();
        let record = processor.row_to_record(&Row::new().with("id", ScalarValue::Null).with("x", "1"));
        assert_eq!(record.get("x"), Some(&scalar("1")));
    }

    #[test]
    fn test_null_values_contribute_no_field() {
        let processor = processor();
        let record = processor.row_to_record(
            &Row::new()
                .with("id", 1)
                .with("invoice/id", ScalarValue::Null)
                .with("name", "A"),
        );
        assert!(record.get("invoice").is_none());
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_conflicts_are_counted_not_fatal() {
        let processor = processor();
        let mut state = GroupState::new();
        let _ = processor.process(&mut state, &Row::new().with("id", 1).with("a", "flat"));
        let _ = processor.process(&mut state, &Row::new().with("id", 1).with("a/b", "deep"));
        assert_eq!(state.in_flight().unwrap().conflicts().len(), 1);

        let record = state.flush().unwrap();
        assert_eq!(record.conflicts, 1);
        assert!(matches!(record.record.get("a"), Some(Node::Record(_))));
    }

    #[test]
    fn test_label_case_folding() {
        let processor = PathAwareProcessor::new(ProcessorConfig {
            label_case: LabelCase::Lower,
            ..ProcessorConfig::default()
        });
        let record = processor.row_to_record(&Row::new().with("ID", 13).with("LASTNAME", "Ringer"));
        assert_eq!(record.get("lastname"), Some(&scalar("Ringer")));
    }

    #[test]
    fn test_identifier_column_matches_after_case_folding() {
        let processor = PathAwareProcessor::new(ProcessorConfig {
            identifier_column: Some("id".to_string()),
            label_case: LabelCase::Lower,
            ..ProcessorConfig::default()
        });
        let mut state = GroupState::new();
        assert!(processor
            .process(&mut state, &Row::new().with("ID", 1).with("X", "a"))
            .is_none());
        assert!(processor
            .process(&mut state, &Row::new().with("ID", 1).with("X", "b"))
            .is_none());

        let record = state.flush().expect("both rows share one group");
        assert_eq!(record.identifier.as_deref(), Some("1"));
        assert_eq!(record.row_count, 2);
        assert!(record.record.get("id").is_none());
        assert!(record.record.get("ID").is_none());
        assert_eq!(
            record.record.get("x"),
            Some(&Node::List(vec![scalar("a"), scalar("b")]))
        );
    }
}
