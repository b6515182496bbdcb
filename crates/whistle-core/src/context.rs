//! Session Context: identity and target contract for one UI session
use crate::data_model::{ContractAddress, Identity};
use crate::error::WhistleError;

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub identity: Option<Identity>,
    pub contract: Option<ContractAddress>,
    pub trace_id: String,
}

impl SessionContext {
    pub fn new(identity: Option<Identity>, contract: Option<ContractAddress>) -> Self {
        Self {
            identity,
            contract,
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Session with no connected identity
    pub fn disconnected() -> Self {
        Self::new(None, None)
    }

    pub fn with_identity(mut self, identity: impl Into<Identity>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_contract(mut self, contract: impl Into<ContractAddress>) -> Self {
        self.contract = Some(contract.into());
        self
    }

    pub fn is_connected(&self) -> bool {
        self.identity.is_some()
    }

    pub fn require_identity(&self) -> Result<&Identity, WhistleError> {
        self.identity
            .as_ref()
            .ok_or_else(|| WhistleError::NotReady("no identity connected".into()))
    }

    pub fn require_contract(&self) -> Result<&ContractAddress, WhistleError> {
        self.contract
            .as_ref()
            .ok_or_else(|| WhistleError::NotReady("target contract address unresolved".into()))
    }
}
