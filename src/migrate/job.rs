//! Chunked migration job

use super::progress::MigrationProgress;
use super::{MigrationError, MigrationStats};
use crate::columnmap::{GroupState, PathAwareProcessor, ProcessorConfig};
use crate::source::RowSource;
use crate::types::CompletedRecord;
use crate::writer::BatchWriter;
use tracing::{debug, info};

/// Rows per chunk unless configured otherwise
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Reads rows, folds them into records and writes one batch per chunk of rows.
///
/// The group accumulator lives for the whole run, so a record whose rows
/// straddle a chunk boundary is emitted in the chunk where its group ends.
/// The last in-flight group is flushed explicitly once the source is drained.
pub struct MigrationJob {
    processor: PathAwareProcessor,
    writer: BatchWriter,
    chunk_size: usize,
    max_records: Option<usize>,
    quiet: bool,
}

impl MigrationJob {
    pub fn processor(&self) -> &PathAwareProcessor {
        &self.processor
    }

    pub fn writer(&self) -> &BatchWriter {
        &self.writer
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Run the migration to completion. Any error aborts the run.
    pub fn run<S: RowSource + ?Sized>(&self, source: &mut S) -> Result<MigrationStats, MigrationError> {
        let source_name = source.source_name().to_string();
        info!(
            "Starting migration from: {} (chunk size {})",
            source_name, self.chunk_size
        );

        let progress = MigrationProgress::new(&source_name, self.quiet);
        let result = self.drive(source, &progress);

        match result {
            Ok(()) => {
                progress.finish();
                if !self.quiet {
                    progress.print_summary();
                }
                let stats = progress.get_stats();
                info!(
                    "Migration finished: {} rows, {} documents, {} batches",
                    stats.rows_read, stats.records_written, stats.batches_written
                );
                Ok(stats)
            }
            Err(e) => {
                progress.abandon(&e.to_string());
                Err(e)
            }
        }
    }

    fn drive<S: RowSource + ?Sized>(
        &self,
        source: &mut S,
        progress: &MigrationProgress,
    ) -> Result<(), MigrationError> {
        let mut state = GroupState::new();
        let mut pending: Vec<CompletedRecord> = Vec::new();
        let mut rows_in_chunk = 0usize;
        let mut emitted = 0usize;

        for row in source.rows() {
            let row = row?;
            progress.row_read();
            rows_in_chunk += 1;

            if let Some(record) = self.processor.process(&mut state, &row) {
                pending.push(record);
                emitted += 1;
            }

            if self.limit_reached(emitted) {
                info!("Reached max records limit: {}", emitted);
                if let Some(group) = state.in_flight() {
                    debug!(
                        "Dropping in-flight group {} ({} rows)",
                        group.identifier(),
                        group.row_count()
                    );
                }
                return self.write_chunk(&mut pending, progress);
            }

            if rows_in_chunk == self.chunk_size {
                self.write_chunk(&mut pending, progress)?;
                rows_in_chunk = 0;
            }
        }

        if let Some(record) = state.flush() {
            debug!("Flushed final record {:?}", record.identifier);
            pending.push(record);
        }
        self.write_chunk(&mut pending, progress)
    }

    fn limit_reached(&self, emitted: usize) -> bool {
        self.max_records.is_some_and(|max| emitted >= max)
    }

    fn write_chunk(
        &self,
        pending: &mut Vec<CompletedRecord>,
        progress: &MigrationProgress,
    ) -> Result<(), MigrationError> {
        if pending.is_empty() {
            return Ok(());
        }

        let conflicts = pending.iter().map(|r| r.conflicts).sum();
        let report = self.writer.write(pending)?;
        debug!("Wrote batch of {} documents ({} bytes)", report.documents, report.bytes);
        progress.batch_written(&report, conflicts);
        pending.clear();
        Ok(())
    }
}

/// Builder for MigrationJob
pub struct MigrationJobBuilder {
    writer: BatchWriter,
    processor_config: ProcessorConfig,
    chunk_size: usize,
    max_records: Option<usize>,
    quiet: bool,
}

impl MigrationJobBuilder {
    pub fn new(writer: BatchWriter) -> Self {
        Self {
            writer,
            processor_config: ProcessorConfig::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_records: None,
            quiet: false,
        }
    }

    pub fn with_processor_config(mut self, config: ProcessorConfig) -> Self {
        self.processor_config = config;
        self
    }

    /// Set the number of rows per chunk
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Stop after this many records have been emitted
    pub fn with_max_records(mut self, max_records: Option<usize>) -> Self {
        self.max_records = max_records;
        self
    }

    /// Set quiet mode (no progress output)
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn build(self) -> Result<MigrationJob, MigrationError> {
        if self.chunk_size == 0 {
            return Err(MigrationError::Config("chunk_size must be positive".into()));
        }
        if self.max_records == Some(0) {
            return Err(MigrationError::Config("max_records must be positive".into()));
        }

        Ok(MigrationJob {
            processor: PathAwareProcessor::new(self.processor_config),
            writer: self.writer,
            chunk_size: self.chunk_size,
            max_records: self.max_records,
            quiet: self.quiet,
        })
    }
}
