//! Snapshots, statistics and search over the store
use serde::{Deserialize, Serialize};
use whistle_core::Report;

/// Immutable view handed to readers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u64,
    pub reports: Vec<Report>,
}

/// Aggregate figures shown on the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportStats {
    pub total_reports: usize,
    pub verified_reports: usize,
    pub pending_reports: usize,
    pub average_risk: f64,
}

impl StoreSnapshot {
    pub fn stats(&self) -> ReportStats {
        let total = self.reports.len();
        let verified = self.reports.iter().filter(|r| r.is_verified()).count();
        let risk_sum: u64 = self.reports.iter().map(|r| r.public_risk_level as u64).sum();

        ReportStats {
            total_reports: total,
            verified_reports: verified,
            pending_reports: total - verified,
            average_risk: if total > 0 { risk_sum as f64 / total as f64 } else { 0.0 },
        }
    }

    /// Case-insensitive match on title or description
    pub fn search(&self, term: &str) -> Vec<&Report> {
        let needle = term.to_lowercase();
        self.reports
            .iter()
            .filter(|r| {
                r.title.to_lowercase().contains(&needle)
                    || r.description.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Report> {
        self.reports.iter().find(|r| r.id == id)
    }
}
