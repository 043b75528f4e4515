#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use tokio::sync::Mutex;

use hrm_leave::config::{Config, StoreBackend};
use hrm_leave::leave::SubmitLeave;
use hrm_leave::model::leave_request::{LeaveType, TicketRef};
use hrm_leave::model::quota_ledger::{NewQuotaLedger, QuotaLedger};
use hrm_leave::state::AppState;
use hrm_leave::store::{LeaveStore, MemoryLeaveStore};
use hrm_leave::workflow::{
    BridgeError, DecisionEntry, PollerConfig, TicketPayload, TicketingApi, TokenProvider,
};

pub fn this_year() -> i32 {
    Utc::now().year()
}

pub fn dates(count: u32) -> Vec<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(this_year(), 3, 2).expect("valid date");
    (0..count)
        .map(|i| first + chrono::Duration::days(i as i64))
        .collect()
}

pub fn submission(employee: &str, leave_type: &str, days: u32) -> SubmitLeave {
    SubmitLeave {
        employee_name: employee.to_string(),
        leave_type: LeaveType::from(leave_type.to_string()),
        requested_dates: dates(days),
        reason: "Family trip".to_string(),
    }
}

pub async fn seed_ledger(store: &dyn LeaveStore, employee: &str, available: i32) -> QuotaLedger {
    store
        .insert_ledger(NewQuotaLedger {
            employee_name: employee.to_string(),
            year: this_year(),
            available_days: available,
            used_days: 0,
            work_year: 3,
            anniversary_year: 1,
        })
        .await
        .expect("ledger inserted")
}

pub fn test_config() -> Config {
    Config {
        server_addr: "127.0.0.1:0".to_string(),
        store_backend: StoreBackend::Memory,
        database_url: None,
        api_prefix: "/api".to_string(),
        log_dir: "logs".to_string(),
        rate_protected_per_min: 10_000,
        family_leave_eligible: vec!["carol".to_string()],
        poll_interval: Duration::from_millis(10),
        poll_window: Duration::from_secs(5),
        poll_lease: Duration::from_secs(5),
        ticketing: None,
    }
}

pub fn poller_config() -> PollerConfig {
    PollerConfig {
        interval: Duration::from_millis(10),
        window: Duration::from_secs(5),
        lease_ttl: Duration::from_secs(5),
        approval_stage: "approval".to_string(),
    }
}

pub fn manual_state() -> (Arc<MemoryLeaveStore>, AppState) {
    let store = Arc::new(MemoryLeaveStore::new());
    let state = AppState::new(store.clone(), &test_config(), None);
    (store, state)
}

pub fn ticketed_state(
    api: Arc<FakeTicketing>,
    tokens: Arc<FakeTokens>,
) -> (Arc<MemoryLeaveStore>, AppState) {
    let store = Arc::new(MemoryLeaveStore::new());
    let ticketing: (Arc<dyn TicketingApi>, Arc<dyn TokenProvider>) = (api, tokens);
    let state = AppState::new(store.clone(), &test_config(), Some(ticketing));
    (store, state)
}

pub fn entry(stage: &str, action: &str, operator: &str, message: &str) -> DecisionEntry {
    DecisionEntry {
        stage: stage.to_string(),
        action: action.to_string(),
        operator: operator.to_string(),
        message: message.to_string(),
    }
}

#[derive(Default)]
pub struct FakeTokens {
    pub failing: AtomicBool,
    pub issued: AtomicUsize,
    pub invalidated: AtomicUsize,
}

#[async_trait]
impl TokenProvider for FakeTokens {
    async fn get_token(&self) -> Result<String, BridgeError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::Token("token service down".into()));
        }
        self.issued.fetch_add(1, Ordering::SeqCst);
        Ok("test-token".to_string())
    }

    async fn invalidate(&self) {
        self.invalidated.fetch_add(1, Ordering::SeqCst);
    }
}

/// Ticketing API double: hands out sequential ticket ids and serves
/// whatever decision history a test scripts for a ticket.
#[derive(Default)]
pub struct FakeTicketing {
    pub created: Mutex<Vec<TicketPayload>>,
    pub histories: Mutex<HashMap<String, Vec<DecisionEntry>>>,
    pub broken_tickets: Mutex<Vec<String>>,
    pub fail_create: AtomicBool,
    /// Every call answers 401, as after an early token revocation.
    pub unauthorized: AtomicBool,
    pub history_calls: AtomicUsize,
}

impl FakeTicketing {
    pub async fn script(&self, ticket_id: &str, entries: Vec<DecisionEntry>) {
        self.histories
            .lock()
            .await
            .insert(ticket_id.to_string(), entries);
    }

    pub async fn break_ticket(&self, ticket_id: &str) {
        self.broken_tickets.lock().await.push(ticket_id.to_string());
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    fn check_token(&self) -> Result<(), BridgeError> {
        if self.unauthorized.load(Ordering::SeqCst) {
            return Err(BridgeError::Status {
                status: 401,
                body: "invalid token".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TicketingApi for FakeTicketing {
    async fn create_ticket(
        &self,
        payload: &TicketPayload,
        token: &str,
    ) -> Result<TicketRef, BridgeError> {
        assert_eq!(token, "test-token");
        self.check_token()?;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(BridgeError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        let mut created = self.created.lock().await;
        created.push(payload.clone());
        let n = created.len();
        Ok(TicketRef {
            ticket_id: format!("T-{n}"),
            task_id: format!("K-{n}"),
        })
    }

    async fn get_decisions(
        &self,
        ticket_id: &str,
        _token: &str,
    ) -> Result<Vec<DecisionEntry>, BridgeError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.check_token()?;
        if self.broken_tickets.lock().await.iter().any(|t| t == ticket_id) {
            return Err(BridgeError::Malformed("unexpected payload".into()));
        }
        Ok(self
            .histories
            .lock()
            .await
            .get(ticket_id)
            .cloned()
            .unwrap_or_default())
    }
}
