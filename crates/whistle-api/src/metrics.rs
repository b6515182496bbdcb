//! Prometheus metrics for `/v1/metrics`
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct ApiMetrics {
    registry: Registry,
    /// Labelled `operation` and `outcome`
    operations: IntCounterVec,
    reports_loaded: IntGauge,
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let operations = IntCounterVec::new(
            Opts::new("whistle_operations_total", "Orchestrator operations by outcome"),
            &["operation", "outcome"],
        )?;
        let reports_loaded =
            IntGauge::new("whistle_reports_loaded", "Reports in the session store")?;
        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(reports_loaded.clone()))?;
        Ok(Self {
            registry,
            operations,
            reports_loaded,
        })
    }

    pub fn observe<T, E>(&self, operation: &str, result: &Result<T, E>) {
        let outcome = if result.is_ok() { "ok" } else { "error" };
        self.operations.with_label_values(&[operation, outcome]).inc();
    }

    pub fn operation_count(&self, operation: &str, outcome: &str) -> u64 {
        self.operations.with_label_values(&[operation, outcome]).get()
    }

    pub fn set_reports_loaded(&self, count: usize) {
        self.reports_loaded.set(count as i64);
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_counts_by_outcome() {
        let metrics = ApiMetrics::new().unwrap();
        metrics.observe::<(), ()>("refresh", &Ok(()));
        metrics.observe::<(), ()>("refresh", &Err(()));
        metrics.observe::<(), ()>("refresh", &Ok(()));

        assert_eq!(metrics.operation_count("refresh", "ok"), 2);
        assert_eq!(metrics.operation_count("refresh", "error"), 1);
        assert!(metrics.encode().unwrap().contains("whistle_operations_total"));
    }
}
