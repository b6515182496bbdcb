//! Encryption-engine lifecycle gate
//!
//! Confidential operations are refused until the engine handshake has
//! succeeded. The handshake runs at most once at a time; a failed handshake
//! blocks every confidential operation until a later attempt succeeds.

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use whistle_core::{EncryptionGateway, SessionContext, WhistleError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum GateState {
    Idle,
    Initializing,
    Ready,
    Failed(String),
}

pub struct EngineGate {
    state: RwLock<GateState>,
    /// Serializes handshakes
    handshake: Mutex<()>,
}

impl EngineGate {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GateState::Idle),
            handshake: Mutex::new(()),
        }
    }

    pub fn state(&self) -> GateState {
        self.state.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.state.read() == GateState::Ready
    }

    /// Fail fast unless the handshake already succeeded
    pub fn check(&self) -> Result<(), WhistleError> {
        match &*self.state.read() {
            GateState::Ready => Ok(()),
            GateState::Failed(reason) => Err(WhistleError::GatewayInitFailure(reason.clone())),
            GateState::Initializing => Err(WhistleError::NotReady(
                "encryption engine is still initializing".into(),
            )),
            GateState::Idle => Err(WhistleError::NotReady(
                "encryption engine not initialized".into(),
            )),
        }
    }

    /// Run the handshake if it has not succeeded yet. Concurrent callers
    /// wait for the one in flight instead of starting another.
    pub async fn ensure_ready(
        &self,
        gateway: &dyn EncryptionGateway,
        ctx: &SessionContext,
    ) -> Result<(), WhistleError> {
        ctx.require_identity()?;
        if self.is_ready() {
            return Ok(());
        }

        let _guard = self.handshake.lock().await;
        if self.is_ready() {
            return Ok(());
        }

        *self.state.write() = GateState::Initializing;
        tracing::info!(trace_id = %ctx.trace_id, "initializing encryption engine");

        match gateway.initialize().await {
            Ok(()) => {
                *self.state.write() = GateState::Ready;
                tracing::info!(trace_id = %ctx.trace_id, "encryption engine ready");
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(trace_id = %ctx.trace_id, error = %reason, "encryption engine handshake failed");
                *self.state.write() = GateState::Failed(reason.clone());
                Err(WhistleError::GatewayInitFailure(reason))
            }
        }
    }
}

impl Default for EngineGate {
    fn default() -> Self {
        Self::new()
    }
}
