//! The MR Readiness Tracker: an explicit, injectable service replacing
//! what would otherwise be an implicit module-level shared map (see
//! SPEC_FULL.md §9 — "hidden cyclic references").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Independent pass/fail signals gathered for one merge request.
#[derive(Debug, Clone, Default)]
pub struct ReadinessRecord {
    /// Set from the correlated `security_scan_complete.passed`.
    pub security_passed: bool,
    /// Set true on `test_report_created`.
    pub tests_passed: bool,
    /// LLM-assessed judgment from the review summary; forced false
    /// whenever complexity is high.
    pub auto_merge_eligible: bool,
    /// Set atomically, under the per-key lock, the first time this MR
    /// is judged ready. Prevents two concurrently-arriving signals
    /// (e.g. a duplicate `security_scan_complete` racing
    /// `test_report_created`) from both calling `vcs.merge`.
    pub merge_attempted: bool,
    /// Wall-clock milliseconds when this record was first created.
    pub opened_at: u64,
}

impl ReadinessRecord {
    fn new() -> Self {
        Self {
            opened_at: now_millis(),
            ..Default::default()
        }
    }

    /// True iff every signal required for auto-merge is set.
    pub fn ready_for_merge(&self, auto_merge_enabled: bool) -> bool {
        auto_merge_enabled && self.security_passed && self.tests_passed && self.auto_merge_eligible
    }
}

fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Concurrent map keyed by `(project, mr_id)`. Per-key updates are
/// serialized via an entry-level lock so that `security_scan_complete`
/// and `test_report_created` handlers racing on the same MR cannot
/// both observe a not-yet-ready state and skip the merge.
#[derive(Clone)]
pub struct MrReadinessTracker {
    records: Arc<Mutex<HashMap<(Option<i64>, i64), Arc<Mutex<ReadinessRecord>>>>>,
}

impl MrReadinessTracker {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the per-key lock for `(project, mr_id)`, creating a
    /// fresh record if this is the first signal seen for this MR.
    pub async fn entry(&self, project: Option<i64>, mr_id: i64) -> Arc<Mutex<ReadinessRecord>> {
        let mut records = self.records.lock().await;
        records
            .entry((project, mr_id))
            .or_insert_with(|| Arc::new(Mutex::new(ReadinessRecord::new())))
            .clone()
    }

    /// Removes the record after a successful auto-merge.
    pub async fn remove(&self, project: Option<i64>, mr_id: i64) {
        self.records.lock().await.remove(&(project, mr_id));
    }
}

impl Default for MrReadinessTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn arrival_order_does_not_change_readiness() {
        let tracker = MrReadinessTracker::new();

        let entry = tracker.entry(Some(1), 42).await;
        entry.lock().await.auto_merge_eligible = true;
        entry.lock().await.security_passed = true;
        entry.lock().await.tests_passed = true;
        assert!(entry.lock().await.ready_for_merge(true));

        tracker.remove(Some(1), 42).await;
        let entry2 = tracker.entry(Some(1), 42).await;
        entry2.lock().await.auto_merge_eligible = true;
        entry2.lock().await.tests_passed = true;
        entry2.lock().await.security_passed = true;
        assert!(entry2.lock().await.ready_for_merge(true));
    }

    #[tokio::test]
    async fn missing_flag_blocks_merge() {
        let tracker = MrReadinessTracker::new();
        let entry = tracker.entry(None, 1).await;
        entry.lock().await.security_passed = true;
        assert!(!entry.lock().await.ready_for_merge(true));
    }

    #[tokio::test]
    async fn same_key_returns_shared_record() {
        let tracker = MrReadinessTracker::new();
        let a = tracker.entry(Some(1), 1).await;
        a.lock().await.security_passed = true;
        let b = tracker.entry(Some(1), 1).await;
        assert!(b.lock().await.security_passed);
    }
}
