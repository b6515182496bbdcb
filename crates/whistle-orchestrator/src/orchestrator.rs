//! Lifecycle Orchestrator
//!
//! Sequences encryption, ledger submission, multi-party decryption and
//! reconciliation. Every public operation ends with exactly one terminal
//! status update, and the store only ever changes from confirmed ledger
//! state.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use whistle_core::{
    CreateReportRequest, EncryptionGateway, GatewayError, LedgerClient, LedgerRecord,
    OrchestratorConfig, Rejection, Report, ReportDraft, SessionContext, WhistleError,
};
use whistle_status::{HistoryAction, HistoryEntry, HistoryLog, Status, StatusChannel};
use whistle_store::{ReportStore, StoreSnapshot};

use crate::gate::{EngineGate, GateState};
use crate::ids::ReportIdGenerator;
use crate::steps::StepTrace;
use crate::submitter::VerificationSubmitter;

/// Outcome of a refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub loaded: usize,
    /// Ids whose record could not be read or mapped
    pub skipped: Vec<String>,
}

pub struct Orchestrator {
    ledger: Arc<dyn LedgerClient>,
    gateway: Arc<dyn EncryptionGateway>,
    gate: Arc<EngineGate>,
    store: Arc<ReportStore>,
    status: StatusChannel,
    history: Mutex<HistoryLog>,
    ids: ReportIdGenerator,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        gateway: Arc<dyn EncryptionGateway>,
        config: OrchestratorConfig,
    ) -> Self {
        Self::with_gate(ledger, gateway, Arc::new(EngineGate::new()), config)
    }

    /// Share one gate between orchestrators that use the same engine
    pub fn with_gate(
        ledger: Arc<dyn LedgerClient>,
        gateway: Arc<dyn EncryptionGateway>,
        gate: Arc<EngineGate>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            ledger,
            gateway,
            gate,
            store: Arc::new(ReportStore::new()),
            status: StatusChannel::new(),
            history: Mutex::new(HistoryLog::with_limits(
                config.history_capacity,
                config.history_view,
            )),
            ids: ReportIdGenerator::new(config.id_prefix.clone()),
            config,
        }
    }

    // === Read side for the UI ===

    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    pub fn report(&self, id: &str) -> Option<Report> {
        self.store.get(id)
    }

    pub fn current_status(&self) -> Option<Status> {
        self.status.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Option<Status>> {
        self.status.subscribe()
    }

    /// Most recent history entries, oldest first
    pub fn recent_history(&self) -> Vec<HistoryEntry> {
        self.history.lock().recent().to_vec()
    }

    pub fn history_tail(&self, n: usize) -> Vec<HistoryEntry> {
        self.history.lock().tail(n).to_vec()
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Session for `identity`, targeting the configured contract or, if
    /// none is configured, the ledger client's own.
    pub fn session(&self, identity: Option<String>) -> SessionContext {
        let contract = self
            .config
            .contract_address
            .clone()
            .map(Into::into)
            .unwrap_or_else(|| self.ledger.contract_address());
        SessionContext::new(identity.map(Into::into), Some(contract))
    }

    // === Operations ===

    /// Identity became available: run the engine handshake and load reports
    pub async fn connect(&self, ctx: &SessionContext) -> Result<(), WhistleError> {
        let gate_result = self.gate.ensure_ready(self.gateway.as_ref(), ctx).await;
        if let Err(e) = &gate_result {
            self.report_failure("encryption engine initialization", e);
            return gate_result;
        }

        // The engine is ready either way; a failed load only stales the list
        let mut trace = StepTrace::new("connect", ctx);
        match self.reload(&mut trace).await {
            Ok(_) => trace.finish("ok"),
            Err(e) => {
                tracing::warn!(trace_id = %ctx.trace_id, error = %e, "initial report load failed");
                self.report_failure("loading reports", &e);
                trace.finish("failed");
            }
        }
        Ok(())
    }

    pub async fn submit_report(
        &self,
        ctx: &SessionContext,
        draft: ReportDraft,
    ) -> Result<Report, WhistleError> {
        let mut trace = StepTrace::new("submit_report", ctx);
        let result = self.try_submit(ctx, draft, &mut trace).await;
        self.conclude(&trace, "submission", &result);
        result
    }

    pub async fn verify_and_decrypt(
        &self,
        ctx: &SessionContext,
        report_id: &str,
    ) -> Result<u64, WhistleError> {
        let mut trace = StepTrace::new("verify_and_decrypt", ctx);
        let result = self.try_verify(ctx, report_id, &mut trace).await;
        self.conclude(&trace, "decryption", &result);
        result
    }

    pub async fn refresh(&self, ctx: &SessionContext) -> Result<RefreshSummary, WhistleError> {
        let mut trace = StepTrace::new("refresh", ctx);
        let result = match ctx.require_identity() {
            Ok(_) => self.reload(&mut trace).await,
            Err(e) => Err(e),
        };
        if let Ok(summary) = &result {
            let message = match summary.skipped.len() {
                0 => format!("loaded {} reports", summary.loaded),
                n => format!("loaded {} reports, {n} unreadable", summary.loaded),
            };
            self.status.success(message, self.config.success_display());
        }
        self.conclude(&trace, "refresh", &result);
        result
    }

    /// Ask the ledger whether the contract is accepting calls
    pub async fn check_liveness(&self, ctx: &SessionContext) -> Result<bool, WhistleError> {
        let mut trace = StepTrace::new("check_liveness", ctx);
        let result = trace
            .step("check_liveness", self.ledger.check_liveness())
            .await
            .map_err(WhistleError::from_read);
        if let Ok(available) = result {
            let message = if available {
                "system status: operational"
            } else {
                "system status: under maintenance"
            };
            self.status.success(message, self.config.success_display());
        }
        self.conclude(&trace, "status check", &result);
        result
    }

    // === Internals ===

    async fn try_submit(
        &self,
        ctx: &SessionContext,
        draft: ReportDraft,
        trace: &mut StepTrace,
    ) -> Result<Report, WhistleError> {
        // Preconditions: nothing external happens before these pass
        let submitter = ctx.require_identity()?.clone();
        let contract = ctx.require_contract()?.clone();
        self.gate.check()?;
        draft.validate()?;

        let id = self.ids.next_id();
        self.status.pending("encrypting report value");
        let encrypted = trace
            .step("encrypt", self.gateway.encrypt(&contract, &submitter, draft.value))
            .await
            .map_err(WhistleError::from_gateway)?;
        let handle = encrypted.handle.clone();

        let tx = trace
            .step(
                "create_report",
                self.ledger.create_report(CreateReportRequest {
                    from: submitter,
                    id: id.clone(),
                    title: draft.title.clone(),
                    encrypted,
                    risk_level: draft.risk_level,
                    initial_value2: 0,
                    description: draft.description.clone(),
                }),
            )
            .await
            .map_err(WhistleError::from_write)?;

        self.status.pending("waiting for transaction confirmation");
        trace
            .step("await_finality", self.ledger.await_finality(&tx))
            .await
            .map_err(WhistleError::from_write)?;

        self.store.upsert(Report {
            id: id.clone(),
            title: draft.title.clone(),
            description: draft.description,
            category: draft.category,
            encrypted_handle: handle,
            public_risk_level: draft.risk_level,
            disclosure: Default::default(),
            created_at: None,
            creator: None,
        });
        self.history.lock().record(
            HistoryAction::SubmitReport,
            &id,
            format!("Submitted report: {}", draft.title),
        );
        self.status.success("report submitted", self.config.success_display());

        // Picks up createdAt and creator, which only exist once mined
        if let Err(e) = self.reload(trace).await {
            tracing::warn!(report_id = %id, error = %e, "post-submit refresh failed");
        }

        self.store
            .get(&id)
            .ok_or_else(|| WhistleError::LedgerReadFailure(format!("report {id} vanished from store")))
    }

    async fn try_verify(
        &self,
        ctx: &SessionContext,
        report_id: &str,
        trace: &mut StepTrace,
    ) -> Result<u64, WhistleError> {
        ctx.require_identity()?;
        let contract = ctx.require_contract()?.clone();
        self.gate.check()?;

        // Authoritative flag; another party may have verified already
        self.status.pending("checking on-chain verification state");
        let record = trace
            .step("get_report", self.ledger.get_report(report_id))
            .await
            .map_err(WhistleError::from_read)?;
        if record.is_verified {
            return self.settle_already_verified(report_id, record);
        }

        let handle = trace
            .step("get_encrypted_handle", self.ledger.get_encrypted_handle(report_id))
            .await
            .map_err(WhistleError::from_read)?;

        self.status.pending("running multi-party decryption");
        let submitter = VerificationSubmitter::new(self.ledger.clone(), report_id);
        let decrypted = match trace
            .step(
                "request_decryption",
                self.gateway
                    .request_decryption(std::slice::from_ref(&handle), &contract, &submitter),
            )
            .await
        {
            Ok(result) => result,
            Err(GatewayError::Continuation(e)) if e.is_already_verified() => {
                return self.settle_race(report_id, trace).await;
            }
            Err(e) => return Err(WhistleError::from_gateway(e)),
        };

        let tx = submitter.submitted().ok_or_else(|| {
            WhistleError::DecryptionFailure("protocol finished without submitting a proof".into())
        })?;

        self.status.pending("verifying decryption on-chain");
        match trace
            .step("await_finality", self.ledger.await_finality(&tx))
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_already_verified() => return self.settle_race(report_id, trace).await,
            Err(e) => return Err(WhistleError::from_write(e)),
        }

        let value = decrypted.clear_values.get(&handle).copied().ok_or_else(|| {
            WhistleError::DecryptionFailure(format!("no clear value returned for handle {handle}"))
        })?;

        self.reconcile_report(report_id, trace).await;
        self.history.lock().record(
            HistoryAction::VerifyReport,
            report_id,
            format!("Decrypted report evidence: {report_id}"),
        );
        self.status
            .success("evidence decrypted and verified", self.config.success_display());
        Ok(value)
    }

    /// The ledger already holds the clear value; adopt it without decrypting
    fn settle_already_verified(
        &self,
        report_id: &str,
        record: LedgerRecord,
    ) -> Result<u64, WhistleError> {
        let report = Report::from_ledger(report_id, record, self.store.category_of(report_id))?;
        let value = report.clear_value().ok_or_else(|| {
            WhistleError::LedgerReadFailure(format!("report {report_id} verified without a value"))
        })?;
        self.store.upsert(report);
        self.status
            .success("data already verified on-chain", self.config.success_display());
        Ok(value)
    }

    /// Our verification lost to someone else's: read back the winner's value
    async fn settle_race(&self, report_id: &str, trace: &mut StepTrace) -> Result<u64, WhistleError> {
        tracing::info!(report_id, "verification raced by another party");
        let record = trace
            .step("get_report", self.ledger.get_report(report_id))
            .await
            .map_err(WhistleError::from_read)?;
        if !record.is_verified {
            return Err(WhistleError::LedgerWriteRejected {
                reason: Rejection::AlreadyVerified,
                message: format!("ledger rejected {report_id} as verified but reads it as sealed"),
            });
        }
        let value = self.settle_already_verified(report_id, record)?;
        if let Err(e) = self.reload(trace).await {
            tracing::warn!(report_id, error = %e, "post-race refresh failed");
        }
        Ok(value)
    }

    /// Refresh after a confirmed verification; if the listing fails, at
    /// least re-read the one report so its flip is observed.
    async fn reconcile_report(&self, report_id: &str, trace: &mut StepTrace) {
        let Err(e) = self.reload(trace).await else {
            return;
        };
        tracing::warn!(report_id, error = %e, "post-verify refresh failed, reading report alone");

        let read = trace
            .step("get_report", self.ledger.get_report(report_id))
            .await
            .map_err(WhistleError::from_read)
            .and_then(|record| {
                Report::from_ledger(report_id, record, self.store.category_of(report_id))
            });
        match read {
            Ok(report) => {
                self.store.upsert(report);
            }
            Err(e) => tracing::warn!(report_id, error = %e, "report re-read failed"),
        }
    }

    /// Enumerate, fetch and replace. Unreadable records are skipped; a
    /// failed enumeration leaves the previous snapshot in place.
    async fn reload(&self, trace: &mut StepTrace) -> Result<RefreshSummary, WhistleError> {
        // Reports upserted while this listing is read must survive the replace
        let listed_at = self.store.version();
        let ids = trace
            .step("list_report_ids", self.ledger.list_report_ids())
            .await
            .map_err(WhistleError::from_read)?;

        let mut reports = Vec::with_capacity(ids.len());
        let mut skipped = Vec::new();
        for id in ids {
            let mapped = trace
                .step("get_report", self.ledger.get_report(&id))
                .await
                .map_err(WhistleError::from_read)
                .and_then(|record| Report::from_ledger(&id, record, self.store.category_of(&id)));
            match mapped {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::warn!(report_id = %id, error = %e, "skipping unreadable report");
                    skipped.push(id);
                }
            }
        }

        let summary = RefreshSummary {
            loaded: reports.len(),
            skipped,
        };
        self.store.replace_all(reports, listed_at);
        Ok(summary)
    }

    /// Turn a failure into the single terminal status update
    fn report_failure(&self, operation: &str, err: &WhistleError) {
        match err {
            WhistleError::UserDeclinedSignature => {
                self.status
                    .cancelled("transaction cancelled by user", self.config.cancel_display());
            }
            WhistleError::GatewayInitFailure(reason) => {
                self.status.error(
                    format!("encryption engine unavailable, check identity connection: {reason}"),
                    self.config.error_display(),
                );
            }
            other => {
                self.status
                    .error(format!("{operation} failed: {other}"), self.config.error_display());
            }
        }
    }

    fn conclude<T>(&self, trace: &StepTrace, operation: &str, result: &Result<T, WhistleError>) {
        match result {
            Ok(_) => trace.finish("ok"),
            Err(e) => {
                self.report_failure(operation, e);
                trace.finish(if e.is_cancellation() { "cancelled" } else { "failed" });
            }
        }
    }
}
