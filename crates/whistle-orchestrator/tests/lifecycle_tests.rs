//! Lifecycle tests for the orchestrator against the sandbox ledger and gateway.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use whistle_core::{
    Category, ContractAddress, CreateReportRequest, EncryptedHandle, LedgerClient, LedgerError,
    LedgerRecord, OrchestratorConfig, Rejection, ReportDraft, SessionContext, TxHandle, TxReceipt,
    VerificationRequest, WhistleError,
};
use whistle_orchestrator::{GateState, Orchestrator};
use whistle_sandbox::{GatewayFaults, Sandbox, SandboxGateway, SandboxLedger, SANDBOX_CONTRACT};
use whistle_status::StatusTag;

const SUBMITTER: &str = "0x00000000000000000000000000000000000a11ce";

fn orchestrator(sandbox: &Sandbox) -> Orchestrator {
    Orchestrator::new(
        sandbox.ledger.clone(),
        sandbox.gateway.clone(),
        OrchestratorConfig::default(),
    )
}

async fn connected(sandbox: &Sandbox) -> (Orchestrator, SessionContext) {
    let orch = orchestrator(sandbox);
    let ctx = orch.session(Some(SUBMITTER.to_string()));
    orch.connect(&ctx).await.unwrap();
    (orch, ctx)
}

fn draft(value: u64, risk_level: u8) -> ReportDraft {
    ReportDraft {
        title: "Inflated invoices".to_string(),
        category: Category::Fraud,
        value,
        risk_level,
        description: "Supplier invoices padded by 30%".to_string(),
    }
}

fn status_tag(orch: &Orchestrator) -> Option<StatusTag> {
    orch.current_status().map(|s| s.tag)
}

fn assert_invariant(orch: &Orchestrator) {
    for report in orch.snapshot().reports {
        assert_eq!(
            report.is_verified(),
            report.clear_value().is_some(),
            "clear value must exist iff verified: {}",
            report.id
        );
    }
}

// =============================================================================
// submitReport
// =============================================================================

#[tokio::test]
async fn test_submit_creates_sealed_report() {
    let sandbox = Sandbox::new();
    let (orch, ctx) = connected(&sandbox).await;

    let report = orch.submit_report(&ctx, draft(42, 7)).await.unwrap();

    let snapshot = orch.snapshot();
    assert_eq!(snapshot.reports.len(), 1);
    let stored = &snapshot.reports[0];
    assert_eq!(stored.id, report.id);
    assert!(!stored.is_verified());
    assert_eq!(stored.public_risk_level, 7);
    assert_eq!(stored.clear_value(), None);
    assert_eq!(stored.category, Category::Fraud);
    // filled in by the post-submit refresh
    assert!(stored.created_at.is_some());
    assert_eq!(stored.creator.as_ref().map(|c| c.as_str()), Some(SUBMITTER));

    assert_eq!(status_tag(&orch), Some(StatusTag::Success));
    assert_eq!(orch.recent_history().len(), 1);
    assert_eq!(sandbox.ledger.record(&report.id).unwrap().public_value2, 0);
}

#[tokio::test]
async fn test_submit_before_engine_ready_makes_no_calls() {
    let sandbox = Sandbox::new();
    let orch = orchestrator(&sandbox);
    let ctx = orch.session(Some(SUBMITTER.to_string()));

    let err = orch.submit_report(&ctx, draft(42, 7)).await.unwrap_err();

    assert!(matches!(err, WhistleError::NotReady(_)));
    assert_eq!(sandbox.ledger.calls().total(), 0);
    assert_eq!(sandbox.gateway.calls().total(), 0);
    assert!(orch.snapshot().reports.is_empty());
    assert_eq!(status_tag(&orch), Some(StatusTag::Error));
}

#[tokio::test]
async fn test_submit_without_identity_is_not_ready() {
    let sandbox = Sandbox::new();
    let (orch, _) = connected(&sandbox).await;
    let before = (sandbox.ledger.calls(), sandbox.gateway.calls());

    let err = orch
        .submit_report(&orch.session(None), draft(1, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, WhistleError::NotReady(_)));
    assert_eq!((sandbox.ledger.calls(), sandbox.gateway.calls()), before);
}

#[tokio::test]
async fn test_invalid_draft_is_refused_before_encryption() {
    let sandbox = Sandbox::new();
    let (orch, ctx) = connected(&sandbox).await;

    let err = orch.submit_report(&ctx, draft(5, 0)).await.unwrap_err();

    assert!(matches!(err, WhistleError::InvalidDraft(_)));
    assert_eq!(sandbox.gateway.calls().encrypt, 0);
}

#[tokio::test]
async fn test_encryption_failure_inserts_nothing() {
    let sandbox = Sandbox::new();
    let (orch, ctx) = connected(&sandbox).await;
    sandbox.gateway.set_faults(GatewayFaults {
        fail_encrypt: Some("proof generation crashed".into()),
        ..Default::default()
    });

    let err = orch.submit_report(&ctx, draft(42, 7)).await.unwrap_err();

    assert!(matches!(err, WhistleError::EncryptionFailure(_)));
    assert!(orch.snapshot().reports.is_empty());
    assert_eq!(sandbox.ledger.calls().create_report, 0);
    assert_eq!(status_tag(&orch), Some(StatusTag::Error));
    assert!(orch.recent_history().is_empty());
}

#[tokio::test]
async fn test_declined_signature_is_soft_cancellation() {
    let sandbox = Sandbox::new();
    let (orch, ctx) = connected(&sandbox).await;
    sandbox.ledger.update_faults(|f| f.decline_next_signature = true);

    let err = orch.submit_report(&ctx, draft(42, 7)).await.unwrap_err();

    assert_eq!(err, WhistleError::UserDeclinedSignature);
    assert_eq!(status_tag(&orch), Some(StatusTag::Cancelled));
    assert!(orch.snapshot().reports.is_empty());
}

#[tokio::test]
async fn test_reverted_create_aborts_submission() {
    let sandbox = Sandbox::new();
    let (orch, ctx) = connected(&sandbox).await;
    sandbox
        .ledger
        .update_faults(|f| f.revert_next_finality = Some("execution reverted: out of gas".into()));

    let err = orch.submit_report(&ctx, draft(42, 7)).await.unwrap_err();

    assert!(matches!(
        err,
        WhistleError::LedgerWriteRejected { reason: Rejection::Other, .. }
    ));
    assert!(orch.snapshot().reports.is_empty());
    assert_eq!(sandbox.ledger.report_count(), 0);
    let status = orch.current_status().unwrap();
    assert_eq!(status.tag, StatusTag::Error);
    assert!(status.message.contains("out of gas"));
}

#[tokio::test]
async fn test_concurrent_submissions_do_not_collide() {
    let sandbox = Sandbox::new();
    let (orch, ctx) = connected(&sandbox).await;

    let (a, b) = tokio::join!(
        orch.submit_report(&ctx, draft(1, 2)),
        orch.submit_report(&ctx, draft(2, 3)),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.id, b.id);
    assert_eq!(orch.snapshot().reports.len(), 2);
    assert_invariant(&orch);
}

/// Sandbox ledger whose first report read is slow and later reads fast
struct SlowFirstRead {
    inner: Arc<SandboxLedger>,
    reads: AtomicUsize,
}

#[async_trait]
impl LedgerClient for SlowFirstRead {
    fn contract_address(&self) -> ContractAddress {
        self.inner.contract_address()
    }

    async fn list_report_ids(&self) -> Result<Vec<String>, LedgerError> {
        self.inner.list_report_ids().await
    }

    async fn get_report(&self, id: &str) -> Result<LedgerRecord, LedgerError> {
        let delay = match self.reads.fetch_add(1, Ordering::SeqCst) {
            0 => Duration::from_millis(100),
            _ => Duration::from_millis(10),
        };
        tokio::time::sleep(delay).await;
        self.inner.get_report(id).await
    }

    async fn get_encrypted_handle(&self, id: &str) -> Result<EncryptedHandle, LedgerError> {
        self.inner.get_encrypted_handle(id).await
    }

    async fn check_liveness(&self) -> Result<bool, LedgerError> {
        self.inner.check_liveness().await
    }

    async fn create_report(&self, request: CreateReportRequest) -> Result<TxHandle, LedgerError> {
        self.inner.create_report(request).await
    }

    async fn submit_verification(
        &self,
        request: VerificationRequest,
    ) -> Result<TxHandle, LedgerError> {
        self.inner.submit_verification(request).await
    }

    async fn await_finality(&self, tx: &TxHandle) -> Result<TxReceipt, LedgerError> {
        self.inner.await_finality(tx).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_submissions_keep_both_reports() {
    let sandbox = Sandbox::from_parts(
        SandboxLedger::new(SANDBOX_CONTRACT).with_finality_delay(Duration::from_millis(100)),
        SandboxGateway::new(b"overlap"),
    );
    let ledger = Arc::new(SlowFirstRead {
        inner: sandbox.ledger.clone(),
        reads: AtomicUsize::new(0),
    });
    let orch = Orchestrator::new(ledger, sandbox.gateway.clone(), OrchestratorConfig::default());
    let ctx = orch.session(Some(SUBMITTER.to_string()));
    orch.connect(&ctx).await.unwrap();

    // the first refresh lists only its own report and finishes last
    let (a, b) = tokio::join!(
        orch.submit_report(&ctx, draft(1, 2)),
        orch.submit_report(&ctx, draft(2, 3)),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(sandbox.ledger.report_count(), 2);
    assert!(orch.report(&a.id).is_some(), "lost {}", a.id);
    assert!(orch.report(&b.id).is_some(), "lost {}", b.id);
    assert_eq!(orch.snapshot().reports.len(), 2);
}

// =============================================================================
// verifyAndDecrypt
// =============================================================================

#[tokio::test]
async fn test_verify_reveals_submitted_value() {
    let sandbox = Sandbox::new();
    let (orch, ctx) = connected(&sandbox).await;
    let report = orch.submit_report(&ctx, draft(42, 7)).await.unwrap();

    let value = orch.verify_and_decrypt(&ctx, &report.id).await.unwrap();

    assert_eq!(value, 42);
    let stored = orch.report(&report.id).unwrap();
    assert!(stored.is_verified());
    assert_eq!(stored.clear_value(), Some(42));
    assert_eq!(stored.category, Category::Fraud);
    assert_eq!(status_tag(&orch), Some(StatusTag::Success));
    assert_eq!(orch.recent_history().len(), 2);
    assert_eq!(sandbox.gateway.calls().request_decryption, 1);
}

#[tokio::test]
async fn test_verify_twice_decrypts_once() {
    let sandbox = Sandbox::new();
    let (orch, ctx) = connected(&sandbox).await;
    let report = orch.submit_report(&ctx, draft(42, 7)).await.unwrap();

    let first = orch.verify_and_decrypt(&ctx, &report.id).await.unwrap();
    let second = orch.verify_and_decrypt(&ctx, &report.id).await.unwrap();

    assert_eq!(first, 42);
    assert_eq!(second, 42);
    assert_eq!(sandbox.gateway.calls().request_decryption, 1);
    assert_eq!(sandbox.ledger.calls().submit_verification, 1);
}

#[tokio::test]
async fn test_already_verified_report_skips_protocol() {
    let sandbox = Sandbox::new();
    sandbox.seed_report("0xb0b", "r-seeded", "Toxic runoff", 17, 9);
    sandbox.ledger.verify_externally("r-seeded", 17);
    let (orch, ctx) = connected(&sandbox).await;

    let value = orch.verify_and_decrypt(&ctx, "r-seeded").await.unwrap();

    assert_eq!(value, 17);
    assert_eq!(sandbox.gateway.calls().request_decryption, 0);
    assert_eq!(orch.report("r-seeded").unwrap().clear_value(), Some(17));
    assert!(orch.current_status().unwrap().message.contains("already verified"));
}

#[tokio::test]
async fn test_verify_reads_unknown_local_report_from_ledger() {
    let sandbox = Sandbox::new();
    let (orch, ctx) = connected(&sandbox).await;
    // appears on the ledger after the initial load
    sandbox.seed_report("0xb0b", "r-late", "Late filing", 8, 3);
    assert!(orch.report("r-late").is_none());

    let value = orch.verify_and_decrypt(&ctx, "r-late").await.unwrap();

    assert_eq!(value, 8);
    assert_eq!(orch.report("r-late").unwrap().clear_value(), Some(8));
}

#[tokio::test]
async fn test_race_at_submission_returns_winner_value() {
    let sandbox = Sandbox::new();
    sandbox.seed_report("0xb0b", "r-race", "Double booking", 99, 4);
    let (orch, ctx) = connected(&sandbox).await;
    sandbox.ledger.update_faults(|f| f.external_verify_on_submit = true);

    let value = orch.verify_and_decrypt(&ctx, "r-race").await.unwrap();

    assert_eq!(value, 99);
    assert_eq!(status_tag(&orch), Some(StatusTag::Success));
    assert_eq!(orch.report("r-race").unwrap().clear_value(), Some(99));
    assert_invariant(&orch);
}

#[tokio::test]
async fn test_race_before_finality_returns_winner_value() {
    let sandbox = Sandbox::new();
    sandbox.seed_report("0xb0b", "r-race", "Double booking", 99, 4);
    let (orch, ctx) = connected(&sandbox).await;
    sandbox
        .ledger
        .update_faults(|f| f.external_verify_before_finality = true);

    let value = orch.verify_and_decrypt(&ctx, "r-race").await.unwrap();

    assert_eq!(value, 99);
    assert_eq!(sandbox.ledger.calls().await_finality, 1);
    assert_eq!(orch.report("r-race").unwrap().clear_value(), Some(99));
}

#[tokio::test]
async fn test_decryption_failure_leaves_report_sealed() {
    let sandbox = Sandbox::new();
    sandbox.seed_report("0xb0b", "r-1", "Kickbacks", 5, 5);
    let (orch, ctx) = connected(&sandbox).await;
    sandbox.gateway.set_faults(GatewayFaults {
        fail_decrypt: Some("threshold not reached".into()),
        ..Default::default()
    });

    let err = orch.verify_and_decrypt(&ctx, "r-1").await.unwrap_err();

    assert!(matches!(err, WhistleError::DecryptionFailure(_)));
    assert!(!orch.report("r-1").unwrap().is_verified());
    assert_eq!(sandbox.ledger.calls().submit_verification, 0);
    assert_eq!(status_tag(&orch), Some(StatusTag::Error));
}

#[tokio::test]
async fn test_rejected_proof_submission_is_attributed_to_ledger() {
    let sandbox = Sandbox::new();
    sandbox.seed_report("0xb0b", "r-1", "Kickbacks", 5, 5);
    let (orch, ctx) = connected(&sandbox).await;
    sandbox.ledger.update_faults(|f| f.decline_next_signature = true);

    let err = orch.verify_and_decrypt(&ctx, "r-1").await.unwrap_err();

    // the protocol itself succeeded; the continuation's signature was declined
    assert_eq!(err, WhistleError::UserDeclinedSignature);
    assert_eq!(sandbox.gateway.calls().request_decryption, 1);
    assert!(!orch.report("r-1").unwrap().is_verified());
    assert_eq!(status_tag(&orch), Some(StatusTag::Cancelled));
}

#[tokio::test]
async fn test_verify_unknown_report_fails_read() {
    let sandbox = Sandbox::new();
    let (orch, ctx) = connected(&sandbox).await;

    let err = orch.verify_and_decrypt(&ctx, "r-missing").await.unwrap_err();

    assert!(matches!(err, WhistleError::LedgerReadFailure(_)));
    assert!(orch.snapshot().reports.is_empty());
}

// =============================================================================
// refresh
// =============================================================================

#[tokio::test]
async fn test_refresh_skips_one_bad_record() {
    let sandbox = Sandbox::new();
    for i in 0..10 {
        sandbox.seed_report("0xb0b", &format!("r-{i}"), &format!("Report {i}"), i, 5);
    }
    sandbox
        .ledger
        .update_faults(|f| {
            f.fail_reads.insert("r-3".to_string());
        });
    let (orch, ctx) = connected(&sandbox).await;

    let summary = orch.refresh(&ctx).await.unwrap();

    assert_eq!(summary.loaded, 9);
    assert_eq!(summary.skipped, vec!["r-3".to_string()]);
    assert_eq!(orch.snapshot().reports.len(), 9);
    assert!(orch.report("r-3").is_none());
    assert_eq!(status_tag(&orch), Some(StatusTag::Success));
}

#[tokio::test]
async fn test_refresh_keeps_snapshot_when_listing_fails() {
    let sandbox = Sandbox::new();
    sandbox.seed_report("0xb0b", "r-1", "One", 1, 1);
    sandbox.seed_report("0xb0b", "r-2", "Two", 2, 2);
    let (orch, ctx) = connected(&sandbox).await;
    assert_eq!(orch.snapshot().reports.len(), 2);

    sandbox.seed_report("0xb0b", "r-3", "Three", 3, 3);
    sandbox.ledger.update_faults(|f| f.fail_listing = true);
    let err = orch.refresh(&ctx).await.unwrap_err();

    assert!(matches!(err, WhistleError::LedgerReadFailure(_)));
    assert_eq!(orch.snapshot().reports.len(), 2);
    assert_eq!(status_tag(&orch), Some(StatusTag::Error));
}

#[tokio::test]
async fn test_failed_initial_load_reports_error() {
    let sandbox = Sandbox::new();
    sandbox.seed_report("0xb0b", "r-1", "One", 1, 1);
    sandbox.ledger.update_faults(|f| f.fail_listing = true);
    let orch = orchestrator(&sandbox);
    let ctx = orch.session(Some(SUBMITTER.to_string()));

    orch.connect(&ctx).await.unwrap();

    assert_eq!(orch.gate_state(), GateState::Ready);
    assert!(orch.snapshot().reports.is_empty());
    let status = orch.current_status().unwrap();
    assert_eq!(status.tag, StatusTag::Error);
    assert!(status.message.contains("loading reports"));
}

#[tokio::test]
async fn test_refresh_requires_identity() {
    let sandbox = Sandbox::new();
    let orch = orchestrator(&sandbox);

    let err = orch.refresh(&orch.session(None)).await.unwrap_err();

    assert!(matches!(err, WhistleError::NotReady(_)));
    assert_eq!(sandbox.ledger.calls().list_report_ids, 0);
}

// =============================================================================
// Engine gate and liveness
// =============================================================================

#[tokio::test]
async fn test_failed_handshake_blocks_confidential_operations() {
    let sandbox = Sandbox::new();
    sandbox.gateway.set_faults(GatewayFaults {
        fail_init: Some("relayer unreachable".into()),
        ..Default::default()
    });
    let orch = orchestrator(&sandbox);
    let ctx = orch.session(Some(SUBMITTER.to_string()));

    let err = orch.connect(&ctx).await.unwrap_err();
    assert!(matches!(err, WhistleError::GatewayInitFailure(_)));
    assert!(matches!(orch.gate_state(), GateState::Failed(_)));
    assert_eq!(status_tag(&orch), Some(StatusTag::Error));

    let err = orch.submit_report(&ctx, draft(1, 1)).await.unwrap_err();
    assert!(matches!(err, WhistleError::GatewayInitFailure(_)));
    let err = orch.verify_and_decrypt(&ctx, "r-1").await.unwrap_err();
    assert!(matches!(err, WhistleError::GatewayInitFailure(_)));
    assert_eq!(sandbox.gateway.calls().encrypt, 0);
    assert_eq!(sandbox.ledger.calls().get_report, 0);
}

#[tokio::test]
async fn test_shared_gate_initializes_once() {
    let sandbox = Sandbox::new();
    let gate = Arc::new(whistle_orchestrator::EngineGate::new());
    let a = Orchestrator::with_gate(
        sandbox.ledger.clone(),
        sandbox.gateway.clone(),
        gate.clone(),
        OrchestratorConfig::default(),
    );
    let b = Orchestrator::with_gate(
        sandbox.ledger.clone(),
        sandbox.gateway.clone(),
        gate,
        OrchestratorConfig::default(),
    );
    let ctx = a.session(Some(SUBMITTER.to_string()));

    a.connect(&ctx).await.unwrap();
    b.connect(&ctx).await.unwrap();

    assert_eq!(sandbox.gateway.calls().initialize, 1);
    assert_eq!(b.gate_state(), GateState::Ready);
}

#[tokio::test]
async fn test_history_view_follows_config() {
    let sandbox = Sandbox::new();
    let config = OrchestratorConfig {
        history_view: 1,
        ..Default::default()
    };
    let orch = Orchestrator::new(sandbox.ledger.clone(), sandbox.gateway.clone(), config);
    let ctx = orch.session(Some(SUBMITTER.to_string()));
    orch.connect(&ctx).await.unwrap();

    let report = orch.submit_report(&ctx, draft(42, 7)).await.unwrap();
    orch.verify_and_decrypt(&ctx, &report.id).await.unwrap();

    let recent = orch.recent_history();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].report_id.as_deref(), Some(report.id.as_str()));
    assert_eq!(orch.history_tail(10).len(), 2);
}

#[tokio::test]
async fn test_liveness_check() {
    let sandbox = Sandbox::new();
    let orch = orchestrator(&sandbox);
    let ctx = orch.session(None);

    assert!(orch.check_liveness(&ctx).await.unwrap());
    sandbox.ledger.set_available(false);
    assert!(!orch.check_liveness(&ctx).await.unwrap());
    assert!(orch.current_status().unwrap().message.contains("maintenance"));

    sandbox.ledger.update_faults(|f| f.fail_liveness = true);
    assert!(orch.check_liveness(&ctx).await.is_err());
    assert_eq!(status_tag(&orch), Some(StatusTag::Error));
}

#[tokio::test]
async fn test_configured_contract_overrides_ledger_address() {
    let sandbox = Sandbox::new();
    let config = OrchestratorConfig {
        contract_address: Some("0xdeadbeef".to_string()),
        ..Default::default()
    };
    let orch = Orchestrator::new(sandbox.ledger.clone(), sandbox.gateway.clone(), config);
    let ctx = orch.session(Some(SUBMITTER.to_string()));
    orch.connect(&ctx).await.unwrap();

    assert_eq!(ctx.contract.as_ref().unwrap().as_str(), "0xdeadbeef");
    // the sandbox ledger binds input proofs to its own address
    let err = orch.submit_report(&ctx, draft(1, 1)).await.unwrap_err();
    assert!(matches!(err, WhistleError::LedgerWriteRejected { .. }));
}
