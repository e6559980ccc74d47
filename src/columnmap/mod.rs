//! Row-to-record conversion
//!
//! Column labels containing `/` are treated as paths into a nested record, and
//! contiguous rows sharing an identifier are merged into one record.

pub mod merge;
pub mod path;
pub mod processor;

pub use merge::MergeConflict;
pub use path::{ColumnPath, LabelCase, PATH_SEPARATOR};
pub use processor::{GroupAccumulator, GroupState, PathAwareProcessor, ProcessorConfig};
