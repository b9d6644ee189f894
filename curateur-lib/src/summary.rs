//! Per-platform summary artifact.
//!
//! A grep-stable text file written into the platform's catalog directory
//! at the end of each platform run.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local};

/// Throttle figures for one endpoint.
#[derive(Debug, Clone, Default)]
pub struct EndpointSummary {
    pub endpoint: &'static str,
    pub total_wait_s: f64,
    pub events_429: u32,
    pub max_multiplier: u32,
}

/// Everything the summary artifact reports for one platform.
#[derive(Debug, Clone)]
pub struct PlatformSummary {
    pub platform: String,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub scanned: usize,
    pub skipped: usize,
    pub full_scraped: usize,
    pub media_only: usize,
    pub updated: usize,
    pub failed: usize,
    pub not_found: usize,
    pub conflicts: Vec<String>,
    pub endpoints: Vec<EndpointSummary>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub error_counts: HashMap<String, usize>,
    pub change_lines: Vec<String>,
    pub cleanup_moves: Vec<String>,
    /// Items still pending when the run was cancelled.
    pub pending_on_cancel: Vec<String>,
}

impl PlatformSummary {
    pub fn new(platform: &str, started: DateTime<Local>) -> Self {
        Self {
            platform: platform.to_string(),
            started,
            finished: started,
            scanned: 0,
            skipped: 0,
            full_scraped: 0,
            media_only: 0,
            updated: 0,
            failed: 0,
            not_found: 0,
            conflicts: Vec::new(),
            endpoints: Vec::new(),
            cache_hits: 0,
            cache_misses: 0,
            error_counts: HashMap::new(),
            change_lines: Vec::new(),
            cleanup_moves: Vec::new(),
            pending_on_cancel: Vec::new(),
        }
    }

    /// The artifact's file name: `curateur_summary_<date>_<time>.log`.
    pub fn filename(&self) -> String {
        format!(
            "curateur_summary_{}.log",
            self.started.format("%Y%m%d_%H%M%S")
        )
    }

    /// Error reasons ordered by frequency, most common first.
    pub fn top_errors(&self, n: usize) -> Vec<(String, usize)> {
        let mut errors: Vec<(String, usize)> = self
            .error_counts
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        errors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        errors.truncate(n);
        errors
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;

        writeln!(file, "=== curateur platform summary ===")?;
        writeln!(file, "Platform: {}", self.platform)?;
        writeln!(file, "Started:  {}", self.started.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(file, "Finished: {}", self.finished.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(file)?;

        writeln!(file, "--- Counts ---")?;
        writeln!(file, "Scanned:      {}", self.scanned)?;
        writeln!(file, "Skipped:      {}", self.skipped)?;
        writeln!(file, "Full scraped: {}", self.full_scraped)?;
        writeln!(file, "Media only:   {}", self.media_only)?;
        writeln!(file, "Updated:      {}", self.updated)?;
        writeln!(file, "Failed:       {}", self.failed)?;
        writeln!(file, "Not found:    {}", self.not_found)?;
        writeln!(file)?;

        writeln!(file, "--- Throttle ---")?;
        for endpoint in &self.endpoints {
            writeln!(
                file,
                "{}: waited {:.1}s, 429 events: {}, max backoff: {}x",
                endpoint.endpoint,
                endpoint.total_wait_s,
                endpoint.events_429,
                endpoint.max_multiplier,
            )?;
        }
        writeln!(
            file,
            "Response cache: {} hits, {} misses",
            self.cache_hits, self.cache_misses
        )?;
        writeln!(file)?;

        if !self.conflicts.is_empty() {
            writeln!(file, "--- Conflicts ---")?;
            for conflict in &self.conflicts {
                writeln!(file, "Conflict: {conflict}")?;
            }
            writeln!(file)?;
        }

        let top = self.top_errors(5);
        if !top.is_empty() {
            writeln!(file, "--- Top errors ---")?;
            for (reason, count) in top {
                writeln!(file, "{count}x {reason}")?;
            }
            writeln!(file)?;
        }

        if !self.change_lines.is_empty() {
            writeln!(file, "--- Changes ---")?;
            for line in &self.change_lines {
                writeln!(file, "{line}")?;
            }
            writeln!(file)?;
        }

        if !self.cleanup_moves.is_empty() {
            writeln!(file, "--- Cleanup moves ---")?;
            for line in &self.cleanup_moves {
                writeln!(file, "{line}")?;
            }
            writeln!(file)?;
        }

        if !self.pending_on_cancel.is_empty() {
            writeln!(file, "--- Pending at cancellation ---")?;
            for name in &self.pending_on_cancel {
                writeln!(file, "{name}")?;
            }
            writeln!(file)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_embeds_timestamp() {
        let started = Local::now();
        let summary = PlatformSummary::new("nes", started);
        let name = summary.filename();
        assert!(name.starts_with("curateur_summary_"));
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn top_errors_ordered_by_count() {
        let mut summary = PlatformSummary::new("nes", Local::now());
        summary.error_counts.insert("timeout".into(), 5);
        summary.error_counts.insert("rate limited".into(), 9);
        summary.error_counts.insert("dns".into(), 1);
        let top = summary.top_errors(2);
        assert_eq!(top[0].0, "rate limited");
        assert_eq!(top[1].0, "timeout");
        assert_eq!(top.len(), 2);
    }

    #[test]
    fn artifact_is_greppable() {
        let dir = tempfile::tempdir().unwrap();
        let mut summary = PlatformSummary::new("nes", Local::now());
        summary.scanned = 10;
        summary.skipped = 7;
        summary.not_found = 1;
        summary.conflicts.push("Title: playlist vs disc folder".into());
        summary.endpoints.push(EndpointSummary {
            endpoint: "jeuInfos",
            total_wait_s: 4.5,
            events_429: 2,
            max_multiplier: 4,
        });
        summary.change_lines.push("./Game.zip: modified desc".into());

        let path = dir.path().join(summary.filename());
        summary.write_to(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Platform: nes"));
        assert!(content.contains("Scanned:      10"));
        assert!(content.contains("jeuInfos: waited 4.5s, 429 events: 2, max backoff: 4x"));
        assert!(content.contains("Conflict: Title: playlist vs disc folder"));
        assert!(content.contains("./Game.zip: modified desc"));
    }
}
