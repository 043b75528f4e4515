//! Integration with the external approval/ticketing system: ticket creation
//! on submission and background reconciliation of its decisions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::leave_request::TicketRef;
use crate::store::StoreError;

pub mod bridge;
pub mod client;
pub mod poller;

pub use bridge::WorkflowBridge;
pub use client::{HttpTicketingClient, HttpTokenProvider};
pub use poller::{PollExit, PollerConfig, PollerSupervisor, ReconciliationPoller};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("token unavailable: {0}")]
    Token(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("ticketing API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed ticketing response: {0}")]
    Malformed(String),
    #[error("leave request {0} is already linked to a ticket or no longer exists")]
    AlreadyLinked(u64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BridgeError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BridgeError::Status { status: 401, .. })
    }
}

/// Body of a ticket-creation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketPayload {
    pub requester: String,
    pub title: String,
    pub summary: String,
    pub correlation_key: String,
    pub leave_type: String,
    pub days: i32,
    pub dates: Vec<String>,
    pub reason: String,
}

/// One step of a ticket's decision history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub stage: String,
    pub action: String,
    #[serde(default)]
    pub operator: String,
    #[serde(default)]
    pub message: String,
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self) -> Result<String, BridgeError>;

    /// Drops a cached token the ticketing API no longer accepts.
    async fn invalidate(&self) {}
}

#[async_trait]
pub trait TicketingApi: Send + Sync {
    async fn create_ticket(
        &self,
        payload: &TicketPayload,
        token: &str,
    ) -> Result<TicketRef, BridgeError>;

    async fn get_decisions(
        &self,
        ticket_id: &str,
        token: &str,
    ) -> Result<Vec<DecisionEntry>, BridgeError>;
}
