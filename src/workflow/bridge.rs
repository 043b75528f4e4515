use std::sync::Arc;

use tracing::{info, warn};

use super::{BridgeError, TicketPayload, TicketingApi, TokenProvider};
use crate::model::leave_request::{LeaveRequest, TicketRef};
use crate::store::LeaveStore;

/// Opens an external ticket for a freshly submitted request and links the
/// returned ids back onto it.
pub struct WorkflowBridge {
    store: Arc<dyn LeaveStore>,
    api: Arc<dyn TicketingApi>,
    tokens: Arc<dyn TokenProvider>,
}

impl WorkflowBridge {
    pub fn new(
        store: Arc<dyn LeaveStore>,
        api: Arc<dyn TicketingApi>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self { store, api, tokens }
    }

    pub fn payload_for(request: &LeaveRequest) -> TicketPayload {
        let days = request.used_days();
        TicketPayload {
            requester: request.employee_name.clone(),
            title: format!("{} leave request from {}", request.leave_type, request.employee_name),
            summary: format!(
                "{}: {} day(s). Reason: {}",
                request.leave_type, days, request.reason
            ),
            correlation_key: format!("leave-request:{}", request.id),
            leave_type: request.leave_type.to_string(),
            days,
            dates: request
                .requested_dates
                .iter()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect(),
            reason: request.reason.clone(),
        }
    }

    pub async fn create_ticket(&self, request: &LeaveRequest) -> Result<TicketRef, BridgeError> {
        if request.external_ticket_id.is_some() {
            return Err(BridgeError::AlreadyLinked(request.id));
        }

        let token = self.tokens.get_token().await?;
        let payload = Self::payload_for(request);
        let ticket = match self.api.create_ticket(&payload, &token).await {
            Ok(ticket) => ticket,
            Err(e) => {
                if e.is_unauthorized() {
                    self.tokens.invalidate().await;
                }
                return Err(e);
            }
        };

        if !self.store.attach_ticket(request.id, &ticket).await? {
            return Err(BridgeError::AlreadyLinked(request.id));
        }
        info!(
            leave_id = request.id,
            ticket_id = %ticket.ticket_id,
            task_id = %ticket.task_id,
            "external ticket linked"
        );
        Ok(ticket)
    }

    /// Fire-and-forget variant used by submission. Failures are logged; the
    /// request stays pending and can still be decided by an approver.
    pub async fn register(&self, request: &LeaveRequest) -> Option<TicketRef> {
        match self.create_ticket(request).await {
            Ok(ticket) => Some(ticket),
            Err(e) => {
                warn!(leave_id = request.id, error = %e, "external ticket creation failed");
                None
            }
        }
    }
}
