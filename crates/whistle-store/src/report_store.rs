//! Report Store
use parking_lot::RwLock;
use std::collections::HashMap;
use whistle_core::{Category, Report};

use crate::snapshot::StoreSnapshot;

#[derive(Default)]
struct Inner {
    reports: HashMap<String, Report>,
    /// Display order: first insertion wins
    order: Vec<String>,
    /// Store version at each report's latest upsert
    upserted_at: HashMap<String, u64>,
    version: u64,
}

/// In-memory report cache keyed by report id
#[derive(Default)]
pub struct ReportStore {
    inner: RwLock<Inner>,
}

/// Fold `incoming` onto `existing` without losing verification state or
/// ledger-assigned fields.
fn reconcile(existing: &Report, mut incoming: Report) -> Report {
    incoming.disclosure = existing.disclosure.merge(incoming.disclosure);
    if incoming.created_at.is_none() {
        incoming.created_at = existing.created_at;
    }
    if incoming.creator.is_none() {
        incoming.creator = existing.creator.clone();
    }
    incoming
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge one report; returns the stored result
    pub fn upsert(&self, report: Report) -> Report {
        let mut inner = self.inner.write();
        let merged = match inner.reports.get(&report.id) {
            Some(existing) => reconcile(existing, report),
            None => {
                inner.order.push(report.id.clone());
                report
            }
        };
        inner.reports.insert(merged.id.clone(), merged.clone());
        inner.version += 1;
        let version = inner.version;
        inner.upserted_at.insert(merged.id.clone(), version);
        tracing::debug!(
            report_id = %merged.id,
            verified = merged.is_verified(),
            version = inner.version,
            "store upsert"
        );
        merged
    }

    /// Replace the whole store with a ledger listing taken at `listed_at`
    /// (a value of [`ReportStore::version`]).
    ///
    /// Reports missing from `reports` are dropped, except those upserted
    /// after `listed_at`: the listing predates them. Reports already
    /// revealed locally stay revealed even if the listing was read before
    /// the flip.
    pub fn replace_all(&self, reports: Vec<Report>, listed_at: u64) {
        let mut inner = self.inner.write();
        let mut next = HashMap::with_capacity(reports.len());
        let mut order = Vec::with_capacity(reports.len());

        for report in reports {
            let report = match inner.reports.get(&report.id) {
                Some(existing) => reconcile(existing, report),
                None => report,
            };
            if !next.contains_key(&report.id) {
                order.push(report.id.clone());
            }
            next.insert(report.id.clone(), report);
        }

        let newer: Vec<String> = inner
            .order
            .iter()
            .filter(|id| !next.contains_key(*id))
            .filter(|id| inner.upserted_at.get(*id).is_some_and(|v| *v > listed_at))
            .cloned()
            .collect();
        for id in newer {
            if let Some(report) = inner.reports.get(&id) {
                tracing::debug!(report_id = %id, listed_at, "keeping report newer than listing");
                next.insert(id.clone(), report.clone());
                order.push(id);
            }
        }

        inner.upserted_at.retain(|id, _| next.contains_key(id));
        inner.reports = next;
        inner.order = order;
        inner.version += 1;
        tracing::debug!(count = inner.order.len(), version = inner.version, "store replaced");
    }

    pub fn get(&self, id: &str) -> Option<Report> {
        self.inner.read().reports.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().reports.contains_key(id)
    }

    /// Category recorded locally; the ledger does not keep one
    pub fn category_of(&self, id: &str) -> Option<Category> {
        self.inner.read().reports.get(id).map(|r| r.category)
    }

    pub fn len(&self) -> usize {
        self.inner.read().reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Point-in-time copy in display order
    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.read();
        let reports = inner
            .order
            .iter()
            .filter_map(|id| inner.reports.get(id).cloned())
            .collect();
        StoreSnapshot {
            version: inner.version,
            reports,
        }
    }
}
