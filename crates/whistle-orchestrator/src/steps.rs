//! Step trace: per-operation latency and outcome of every external call
use serde::Serialize;
use std::future::Future;
use std::time::Instant;
use whistle_core::SessionContext;

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: &'static str,
    pub latency_ms: u64,
    pub ok: bool,
}

pub struct StepTrace {
    operation: &'static str,
    trace_id: String,
    started: Instant,
    steps: Vec<StepRecord>,
}

impl StepTrace {
    pub fn new(operation: &'static str, ctx: &SessionContext) -> Self {
        Self {
            operation,
            trace_id: ctx.trace_id.clone(),
            started: Instant::now(),
            steps: Vec::new(),
        }
    }

    /// Await one external call and record how it went
    pub async fn step<T, E, F>(&mut self, step: &'static str, call: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start = Instant::now();
        let result = call.await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => tracing::debug!(
                operation = self.operation,
                trace_id = %self.trace_id,
                step,
                latency_ms,
                "step done"
            ),
            Err(e) => tracing::debug!(
                operation = self.operation,
                trace_id = %self.trace_id,
                step,
                latency_ms,
                error = %e,
                "step failed"
            ),
        }
        self.steps.push(StepRecord {
            step,
            latency_ms,
            ok: result.is_ok(),
        });
        result
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Log the whole operation once it is over
    pub fn finish(&self, outcome: &str) {
        let path = self
            .steps
            .iter()
            .map(|s| if s.ok { s.step.to_string() } else { format!("{}!", s.step) })
            .collect::<Vec<_>>()
            .join("→");
        tracing::info!(
            operation = self.operation,
            trace_id = %self.trace_id,
            outcome,
            steps = %path,
            total_ms = self.started.elapsed().as_millis() as u64,
            "operation finished"
        );
    }
}
