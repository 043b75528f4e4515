use std::sync::Arc;

use crate::config::Config;
use crate::leave::{ApprovalEngine, ConfiguredEligibility, LeaveService, QuotaBook, Workflow};
use crate::store::LeaveStore;
use crate::workflow::{
    PollerSupervisor, ReconciliationPoller, TicketingApi, TokenProvider, WorkflowBridge,
};

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub leaves: LeaveService,
    pub approvals: ApprovalEngine,
    pub quota: QuotaBook,
    pub poller: Option<Arc<PollerSupervisor>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LeaveStore>,
        config: &Config,
        ticketing: Option<(Arc<dyn TicketingApi>, Arc<dyn TokenProvider>)>,
    ) -> Self {
        let approvals = ApprovalEngine::new(store.clone());
        let eligibility = Arc::new(ConfiguredEligibility::new(&config.family_leave_eligible));

        let workflow = ticketing.map(|(api, tokens)| {
            let bridge = Arc::new(WorkflowBridge::new(store.clone(), api.clone(), tokens.clone()));
            let poller = PollerSupervisor::new(ReconciliationPoller::new(
                store.clone(),
                approvals.clone(),
                api,
                tokens,
                config.poller(),
            ));
            Workflow { bridge, poller }
        });

        Self {
            leaves: LeaveService::new(store.clone(), eligibility, workflow.clone()),
            approvals,
            quota: QuotaBook::new(store),
            poller: workflow.map(|w| w.poller),
        }
    }
}
