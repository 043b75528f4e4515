use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DecisionEntry, TicketingApi, TokenProvider};
use crate::error::{LeaveError, LeaveResult};
use crate::leave::{ApprovalEngine, DecisionSource, Verdict};
use crate::model::leave_request::LeaveRequest;
use crate::store::LeaveStore;

const LEASE_NAME: &str = "leave-reconciliation";
const FALLBACK_OPERATOR: &str = "workflow";

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Upper bound on how long one poller run may live.
    pub window: Duration,
    /// Must outlive `interval` plus one cycle, or another process may take over.
    pub lease_ttl: Duration,
    pub approval_stage: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            window: Duration::from_secs(72 * 3600),
            lease_ttl: Duration::from_secs(180),
            approval_stage: "approval".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    /// Nothing pending anymore.
    Drained,
    WindowElapsed,
    /// Another process holds the lease.
    LeaseHeld,
    Shutdown,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub pending: usize,
    pub unticketed: usize,
    pub decided: usize,
    pub conflicts: usize,
    pub failed: usize,
}

/// Reconciles pending requests with decisions recorded in the ticketing system.
pub struct ReconciliationPoller {
    store: Arc<dyn LeaveStore>,
    engine: ApprovalEngine,
    api: Arc<dyn TicketingApi>,
    tokens: Arc<dyn TokenProvider>,
    config: PollerConfig,
    holder: String,
}

impl ReconciliationPoller {
    pub fn new(
        store: Arc<dyn LeaveStore>,
        engine: ApprovalEngine,
        api: Arc<dyn TicketingApi>,
        tokens: Arc<dyn TokenProvider>,
        config: PollerConfig,
    ) -> Self {
        Self {
            store,
            engine,
            api,
            tokens,
            config,
            holder: Uuid::new_v4().to_string(),
        }
    }

    /// Polls until nothing is pending, the window closes, the lease is lost,
    /// or `stop` flips to true.
    pub async fn run(&self, stop: &mut watch::Receiver<bool>) -> PollExit {
        let started = Instant::now();
        info!(holder = %self.holder, "reconciliation poller started");

        let exit = loop {
            if *stop.borrow() {
                break PollExit::Shutdown;
            }
            if started.elapsed() >= self.config.window {
                break PollExit::WindowElapsed;
            }

            match self.renew_lease().await {
                Ok(true) => match self.run_cycle().await {
                    Ok(report) if report.pending == 0 => break PollExit::Drained,
                    Ok(report) => debug!(?report, "reconciliation cycle finished"),
                    Err(e) => warn!(error = %e, "reconciliation cycle failed"),
                },
                Ok(false) => {
                    info!("reconciliation lease held elsewhere");
                    return PollExit::LeaseHeld;
                }
                Err(e) => warn!(error = %e, "reconciliation lease unavailable, skipping cycle"),
            }

            tokio::select! {
                _ = sleep(self.config.interval) => {}
                _ = stop.wait_for(|stopped| *stopped) => break PollExit::Shutdown,
            }
        };

        if let Err(e) = self.store.release_lease(LEASE_NAME, &self.holder).await {
            warn!(error = %e, "failed to release reconciliation lease");
        }
        info!(?exit, "reconciliation poller stopped");
        exit
    }

    async fn renew_lease(&self) -> LeaveResult<bool> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.config.lease_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(180));
        Ok(self
            .store
            .try_acquire_lease(LEASE_NAME, &self.holder, now, now + ttl)
            .await?)
    }

    /// One pass over all pending requests. Per-request failures are logged
    /// and counted; they never abort the pass.
    pub async fn run_cycle(&self) -> LeaveResult<CycleReport> {
        let pending = self.store.pending_requests().await?;
        let mut report = CycleReport {
            pending: pending.len(),
            ..Default::default()
        };

        let ticketed: Vec<&LeaveRequest> = pending
            .iter()
            .filter(|r| r.external_ticket_id.is_some())
            .collect();
        report.unticketed = pending.len() - ticketed.len();
        if ticketed.is_empty() {
            return Ok(report);
        }

        let token = match self.tokens.get_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "no ticketing token, skipping cycle");
                report.failed = ticketed.len();
                return Ok(report);
            }
        };

        for request in ticketed {
            match self.reconcile(request, &token).await {
                Ok(true) => report.decided += 1,
                Ok(false) => {}
                Err(LeaveError::Conflict { id, status }) => {
                    debug!(leave_id = id, %status, "already decided locally");
                    report.conflicts += 1;
                }
                Err(e) => {
                    warn!(leave_id = request.id, error = %e, "reconciliation failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn reconcile(&self, request: &LeaveRequest, token: &str) -> LeaveResult<bool> {
        let Some(ticket_id) = request.external_ticket_id.as_deref() else {
            return Ok(false);
        };
        let history = match self.api.get_decisions(ticket_id, token).await {
            Ok(history) => history,
            Err(e) => {
                if e.is_unauthorized() {
                    self.tokens.invalidate().await;
                }
                return Err(LeaveError::ExternalService(e.to_string()));
            }
        };

        let Some((verdict, entry)) = history
            .iter()
            .find_map(|entry| self.verdict_for(entry).map(|v| (v, entry)))
        else {
            return Ok(false);
        };

        let operator = match entry.operator.trim() {
            "" => FALLBACK_OPERATOR,
            name => name,
        };
        let comment = (!entry.message.trim().is_empty()).then(|| entry.message.clone());
        self.engine
            .decide(
                request.id,
                verdict,
                operator,
                comment,
                DecisionSource::Reconciliation,
            )
            .await?;
        Ok(true)
    }

    fn verdict_for(&self, entry: &DecisionEntry) -> Option<Verdict> {
        if entry.stage.trim() != self.config.approval_stage {
            return None;
        }
        match entry.action.trim().to_lowercase().as_str() {
            "agree" => Some(Verdict::Approve),
            "reject" => Some(Verdict::Reject),
            _ => None,
        }
    }
}

/// Keeps at most one poller alive in this process.
pub struct PollerSupervisor {
    poller: ReconciliationPoller,
    running: AtomicBool,
    /// Set by every `ensure_running`; a run that ends while it is set starts over.
    rearm: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl PollerSupervisor {
    pub fn new(poller: ReconciliationPoller) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            poller,
            running: AtomicBool::new(false),
            rearm: AtomicBool::new(false),
            shutdown,
        })
    }

    /// Starts the poller unless one is already alive. Returns whether a new
    /// task was spawned.
    pub fn ensure_running(self: &Arc<Self>) -> bool {
        if *self.shutdown.borrow() {
            return false;
        }
        self.rearm.store(true, Ordering::SeqCst);
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("reconciliation poller already running");
            return false;
        }

        let supervisor = Arc::clone(self);
        actix_web::rt::spawn(async move {
            supervisor.supervise().await;
        });
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    async fn supervise(self: Arc<Self>) {
        loop {
            self.rearm.store(false, Ordering::SeqCst);
            let mut stop = self.shutdown.subscribe();
            let exit = self.poller.run(&mut stop).await;
            self.running.store(false, Ordering::SeqCst);

            let again = matches!(exit, PollExit::Drained | PollExit::WindowElapsed)
                && self.rearm.load(Ordering::SeqCst)
                && self
                    .running
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok();
            if !again {
                break;
            }
            debug!("submission arrived while winding down, restarting poller");
        }
    }
}
