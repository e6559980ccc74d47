//! Progress tracking for migrations

use super::MigrationStats;
use crate::writer::BatchReport;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Progress tracker for a migration run
pub struct MigrationProgress {
    /// Spinner (None in quiet mode)
    progress_bar: Option<ProgressBar>,
    start_time: Instant,
    rows_read: AtomicUsize,
    records_written: AtomicUsize,
    batches_written: AtomicUsize,
    bytes_written: AtomicU64,
    conflicts: AtomicUsize,
}

impl MigrationProgress {
    pub fn new(source_name: &str, quiet: bool) -> Self {
        let progress_bar = if !quiet {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {pos} rows {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message(format!("from {}", source_name));
            Some(pb)
        } else {
            None
        };

        Self {
            progress_bar,
            start_time: Instant::now(),
            rows_read: AtomicUsize::new(0),
            records_written: AtomicUsize::new(0),
            batches_written: AtomicUsize::new(0),
            bytes_written: AtomicU64::new(0),
            conflicts: AtomicUsize::new(0),
        }
    }

    /// Count one row pulled from the source
    pub fn row_read(&self) {
        let rows = self.rows_read.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(ref pb) = self.progress_bar {
            pb.set_position(rows as u64);
        }
    }

    /// Account for a written batch
    pub fn batch_written(&self, report: &BatchReport, conflicts: usize) {
        let written = self
            .records_written
            .fetch_add(report.documents, Ordering::Relaxed)
            + report.documents;
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(report.bytes, Ordering::Relaxed);
        self.conflicts.fetch_add(conflicts, Ordering::Relaxed);

        if let Some(ref pb) = self.progress_bar {
            let elapsed = self.start_time.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                written as f64 / elapsed
            } else {
                0.0
            };
            pb.set_message(format!("| {} documents | {:.1} docs/s", written, rate));
        }
    }

    pub fn get_stats(&self) -> MigrationStats {
        let mut stats = MigrationStats {
            rows_read: self.rows_read.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
            records_per_second: 0.0,
        };
        stats.update_rate();
        stats
    }

    /// Stop the spinner after a failure
    pub fn abandon(&self, reason: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.abandon_with_message(format!("Failed: {}", reason));
        }
    }

    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            let stats = self.get_stats();
            pb.finish_with_message(format!(
                "Done! {} documents in {} batches, {:.1} docs/s",
                stats.records_written, stats.batches_written, stats.records_per_second
            ));
        }
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        let stats = self.get_stats();

        println!("\nMigration Summary");
        println!("=================");
        println!("Rows read:          {}", stats.rows_read);
        println!("Documents written:  {}", stats.records_written);
        println!("Batches written:    {}", stats.batches_written);
        println!("Merge conflicts:    {}", stats.conflicts);
        println!("Bytes written:      {} KB", stats.bytes_written / 1_000);
        println!("Elapsed time:       {:.1}s", stats.elapsed_seconds);
        println!("Processing rate:    {:.1} docs/s", stats.records_per_second);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracking() {
        let progress = MigrationProgress::new("fixture.db", true);

        for _ in 0..5 {
            progress.row_read();
        }
        progress.batch_written(
            &BatchReport {
                documents: 2,
                bytes: 120,
                uris: vec!["/item/a.xml".into(), "/item/b.xml".into()],
            },
            1,
        );
        progress.batch_written(
            &BatchReport {
                documents: 1,
                bytes: 30,
                uris: vec!["/item/c.xml".into()],
            },
            0,
        );

        let stats = progress.get_stats();
        assert_eq!(stats.rows_read, 5);
        assert_eq!(stats.records_written, 3);
        assert_eq!(stats.batches_written, 2);
        assert_eq!(stats.bytes_written, 150);
        assert_eq!(stats.conflicts, 1);
    }
}
