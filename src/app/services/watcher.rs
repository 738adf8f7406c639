//! Inbound folder watcher
//!
//! Polls the inbound directory on a fixed interval and runs every matching
//! file through the pipeline, one at a time. Discovery is stateless: a file
//! is a candidate exactly as long as it still sits in the inbound directory,
//! so a crash before relocation makes the next scan retry it from scratch.

use crate::app::models::{FileOutcome, WatchStats};
use crate::app::services::pipeline::Pipeline;
use crate::error::{PcrError, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Polling watcher driving the pipeline
#[derive(Debug)]
pub struct FolderWatcher {
    pipeline: Pipeline,
}

impl FolderWatcher {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// List matching inbound files, sorted for a deterministic processing
    /// order (directory enumeration order is unspecified)
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        let config = self.pipeline.config();
        let pattern = config.raw_dir().join(&config.watcher.file_pattern);
        let pattern = pattern.to_string_lossy();

        let mut files = Vec::new();
        for entry in glob::glob(&pattern)? {
            files.push(entry.map_err(|e| PcrError::Io(e.into_error()))?);
        }
        files.sort();
        Ok(files)
    }

    /// One scan-and-process cycle over the inbound directory
    pub fn run_once(&self) -> Result<WatchStats> {
        let mut stats = WatchStats::default();
        for file in self.scan()? {
            debug!("Found file: {}", file.display());
            match self.pipeline.handle_file(&file)? {
                FileOutcome::Processed(_) => stats.files_processed += 1,
                FileOutcome::Quarantined { .. } => stats.files_quarantined += 1,
            }
        }
        Ok(stats)
    }

    /// Poll until cancelled
    ///
    /// The token is checked before each scan and during the inter-scan
    /// sleep, so shutdown latency is bounded by one poll interval while an
    /// in-flight file always runs to completion.
    pub async fn watch(&self, token: CancellationToken) -> Result<WatchStats> {
        let config = self.pipeline.config();
        let interval = Duration::from_secs(config.watcher.poll_interval_seconds);
        info!(
            "Watching {} for '{}' every {}s",
            config.raw_dir().display(),
            config.watcher.file_pattern,
            interval.as_secs()
        );

        let mut totals = WatchStats::default();
        while !token.is_cancelled() {
            let stats = self.run_once()?;
            totals.files_processed += stats.files_processed;
            totals.files_quarantined += stats.files_quarantined;

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(
            "Folder watcher stopped ({} processed, {} quarantined)",
            totals.files_processed, totals.files_quarantined
        );
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;
    use tempfile::TempDir;

    const GOOD_EXPORT: &str = "\
* File Name = plate42.eds
* Instrument Type = QuantStudio
* Block Type = 96-Well
* Experiment Run End Time = 2025-06-10 14:32:00
[Results]
Well Position\tSample Name\tTarget Name\tReporter\tCt Threshold\tBaseline Start\tBaseline End\tCt
A1\tS1@7\tTargetX\tFAM\t0.2\t3\t15\t21.3
";

    fn watcher(dir: &TempDir) -> FolderWatcher {
        let mut config = Config::default();
        config.directories.base_dir = dir.path().to_path_buf();
        config.ensure_directories().unwrap();
        FolderWatcher::new(Pipeline::new(config).unwrap())
    }

    #[test]
    fn test_scan_matches_pattern_only_and_sorts() {
        let dir = TempDir::new().unwrap();
        let watcher = watcher(&dir);
        let raw = watcher.pipeline().config().raw_dir();
        fs::write(raw.join("b.txt"), "x").unwrap();
        fs::write(raw.join("a.txt"), "x").unwrap();
        fs::write(raw.join("ignore.csv"), "x").unwrap();

        let files = watcher.scan().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.txt"));
        assert!(files[1].ends_with("b.txt"));
    }

    #[test]
    fn test_run_once_mixed_outcomes() {
        let dir = TempDir::new().unwrap();
        let watcher = watcher(&dir);
        let raw = watcher.pipeline().config().raw_dir();
        fs::write(raw.join("good.txt"), GOOD_EXPORT).unwrap();
        fs::write(raw.join("bad.txt"), "not an export").unwrap();

        let stats = watcher.run_once().unwrap();
        assert_eq!(stats.files_processed, 1);
        assert_eq!(stats.files_quarantined, 1);

        // both files left the inbound directory, next scan sees nothing
        assert!(watcher.scan().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_watch_stops_on_cancellation() {
        let dir = TempDir::new().unwrap();
        let watcher = watcher(&dir);
        let token = CancellationToken::new();
        token.cancel();

        let stats = watcher.watch(token).await.unwrap();
        assert_eq!(stats.files_processed, 0);
    }

    #[tokio::test]
    async fn test_watch_processes_then_stops_within_one_interval() {
        let dir = TempDir::new().unwrap();
        let watcher = watcher(&dir);
        let raw = watcher.pipeline().config().raw_dir();
        fs::write(raw.join("good.txt"), GOOD_EXPORT).unwrap();

        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let stats = watcher.watch(token).await.unwrap();
        assert_eq!(stats.files_processed, 1);
    }
}
