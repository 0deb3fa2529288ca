use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Admission policy of an upload queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueOptions {
    /// Maximum concurrently uploading units; 0 means unlimited.
    pub max_parallel: usize,
    /// Milliseconds between admission bursts; 0 disables staggering.
    pub batch_offset_ms: u64,
    /// Start queued units automatically whenever the queue changes.
    pub auto_start: bool,
    /// Drop uploaded and cancelled units from the queue after each change.
    pub auto_remove: bool,
}

impl QueueOptions {
    pub fn batch_offset(&self) -> Duration {
        Duration::from_millis(self.batch_offset_ms)
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_batch_offset(mut self, offset: Duration) -> Self {
        self.batch_offset_ms = offset.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn with_auto_remove(mut self, auto_remove: bool) -> Self {
        self.auto_remove = auto_remove;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unlimited_and_manual() {
        let opts = QueueOptions::default();
        assert_eq!(opts.max_parallel, 0);
        assert!(opts.batch_offset().is_zero());
        assert!(!opts.auto_start);
        assert!(!opts.auto_remove);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let opts: QueueOptions =
            serde_json::from_str(r#"{"max_parallel": 3, "auto_start": true}"#).unwrap();
        assert_eq!(opts.max_parallel, 3);
        assert!(opts.auto_start);
        assert_eq!(opts.batch_offset_ms, 0);
    }

    #[test]
    fn builder_sets_offset_in_millis() {
        let opts = QueueOptions::default().with_batch_offset(Duration::from_millis(250));
        assert_eq!(opts.batch_offset_ms, 250);
        assert_eq!(opts.batch_offset(), Duration::from_millis(250));
    }
}
