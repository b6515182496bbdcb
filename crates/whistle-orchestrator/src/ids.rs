//! Report id generation
use std::sync::atomic::{AtomicU64, Ordering};

/// Session-unique ids: wall-clock millis plus a monotonic counter, so two
/// submissions in the same millisecond still differ.
pub struct ReportIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl ReportIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}-{}-{}",
            self.prefix,
            chrono::Utc::now().timestamp_millis(),
            seq
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let ids = ReportIdGenerator::new("report");
        let generated: HashSet<_> = (0..1_000).map(|_| ids.next_id()).collect();
        assert_eq!(generated.len(), 1_000);
        assert!(generated.iter().all(|id| id.starts_with("report-")));
    }
}
