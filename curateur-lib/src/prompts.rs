//! Operator interaction points.
//!
//! Three prompt hooks, serialized so at most one prompt is in flight.
//! Non-interactive runs resolve every prompt to its safe default
//! (no / skip).

use std::sync::Arc;

/// Operator's answer to a search-candidate prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateChoice {
    /// Index into the presented candidate list.
    Select(usize),
    /// Leave the entity unmatched.
    Skip,
    /// Cancel the whole run.
    Cancel,
}

/// Prompt surface implemented by the UI layer.
///
/// Implementations may block on stdin; the engine calls them from a
/// blocking task, one at a time.
pub trait PromptHandler: Send + Sync {
    /// Pre-scrape integrity cleanup: prune orphan entries and move their
    /// media to the CLEANUP tree? Default answer is no.
    fn confirm_integrity_cleanup(
        &self,
        platform: &str,
        missing: usize,
        total: usize,
        ratio: f64,
    ) -> bool;

    /// Pick a search candidate when none met the threshold. Candidates
    /// arrive best-first as (display name, confidence).
    fn select_search_candidate(
        &self,
        rom_name: &str,
        candidates: &[(String, f64)],
    ) -> CandidateChoice;

    /// A previously-enabled media type is now disabled: move its files to
    /// the CLEANUP tree? Default answer is no.
    fn confirm_media_cleanup(&self, platform: &str, type_dir: &str, files: usize) -> bool;
}

/// Default handler for non-TTY runs: every prompt resolves to no / skip.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive;

impl PromptHandler for NonInteractive {
    fn confirm_integrity_cleanup(
        &self,
        platform: &str,
        missing: usize,
        total: usize,
        ratio: f64,
    ) -> bool {
        log::warn!(
            "Integrity check on {platform}: {missing}/{total} entries missing \
             ({:.1}% present); skipping cleanup in non-interactive mode",
            ratio * 100.0
        );
        false
    }

    fn select_search_candidate(
        &self,
        _rom_name: &str,
        _candidates: &[(String, f64)],
    ) -> CandidateChoice {
        CandidateChoice::Skip
    }

    fn confirm_media_cleanup(&self, _platform: &str, _type_dir: &str, _files: usize) -> bool {
        false
    }
}

/// Serialized gateway in front of a [`PromptHandler`]: one prompt in
/// flight, dispatched on the blocking pool so stdin reads don't stall
/// the runtime.
pub struct PromptGate {
    handler: Arc<dyn PromptHandler>,
    lock: tokio::sync::Mutex<()>,
}

impl PromptGate {
    pub fn new(handler: Arc<dyn PromptHandler>) -> Self {
        Self {
            handler,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn confirm_integrity_cleanup(
        &self,
        platform: String,
        missing: usize,
        total: usize,
        ratio: f64,
    ) -> bool {
        let _guard = self.lock.lock().await;
        let handler = self.handler.clone();
        tokio::task::spawn_blocking(move || {
            handler.confirm_integrity_cleanup(&platform, missing, total, ratio)
        })
        .await
        .unwrap_or(false)
    }

    pub async fn select_search_candidate(
        &self,
        rom_name: String,
        candidates: Vec<(String, f64)>,
    ) -> CandidateChoice {
        let _guard = self.lock.lock().await;
        let handler = self.handler.clone();
        tokio::task::spawn_blocking(move || {
            handler.select_search_candidate(&rom_name, &candidates)
        })
        .await
        .unwrap_or(CandidateChoice::Skip)
    }

    pub async fn confirm_media_cleanup(
        &self,
        platform: String,
        type_dir: String,
        files: usize,
    ) -> bool {
        let _guard = self.lock.lock().await;
        let handler = self.handler.clone();
        tokio::task::spawn_blocking(move || {
            handler.confirm_media_cleanup(&platform, &type_dir, files)
        })
        .await
        .unwrap_or(false)
    }
}
