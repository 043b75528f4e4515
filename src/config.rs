use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use dotenvy::dotenv;

use crate::workflow::PollerConfig;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    MySql,
    Memory,
}

#[derive(Clone, Debug)]
pub struct TicketingConfig {
    pub base_url: String,
    pub token_url: String,
    pub app_id: String,
    pub app_secret: String,
    pub approval_stage: String,
    pub token_ttl: Duration,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub api_prefix: String,
    pub log_dir: String,

    // Rate limiting
    pub rate_protected_per_min: u32,

    /// Employees cleared for parental/childcare leave
    pub family_leave_eligible: Vec<String>,

    pub poll_interval: Duration,
    pub poll_window: Duration,
    pub poll_lease: Duration,

    /// Present only when every TICKETING_* connection variable is set
    pub ticketing: Option<TicketingConfig>,
}

fn var_or<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{key} is not valid"))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "mysql".to_string())
            .to_lowercase()
            .as_str()
        {
            "mysql" => StoreBackend::MySql,
            "memory" => StoreBackend::Memory,
            other => bail!("STORE_BACKEND must be mysql or memory, got {other}"),
        };
        let database_url = optional("DATABASE_URL");
        if store_backend == StoreBackend::MySql && database_url.is_none() {
            bail!("DATABASE_URL must be set");
        }

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").context("SERVER_ADDR must be set")?,
            store_backend,
            database_url,
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", "1000")?,
            family_leave_eligible: env::var("FAMILY_LEAVE_ELIGIBLE")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            poll_interval: Duration::from_secs(var_or("POLL_INTERVAL_SECS", "60")?),
            poll_window: Duration::from_secs(var_or::<u64>("POLL_WINDOW_HOURS", "72")? * 3600),
            poll_lease: Duration::from_secs(var_or("POLL_LEASE_SECS", "180")?),
            ticketing: Self::ticketing_from_env()?,
        })
    }

    fn ticketing_from_env() -> Result<Option<TicketingConfig>> {
        let (Some(base_url), Some(token_url), Some(app_id), Some(app_secret)) = (
            optional("TICKETING_BASE_URL"),
            optional("TICKETING_TOKEN_URL"),
            optional("TICKETING_APP_ID"),
            optional("TICKETING_APP_SECRET"),
        ) else {
            return Ok(None);
        };

        Ok(Some(TicketingConfig {
            base_url,
            token_url,
            app_id,
            app_secret,
            approval_stage: env::var("TICKETING_APPROVAL_STAGE")
                .unwrap_or_else(|_| "approval".to_string()),
            token_ttl: Duration::from_secs(var_or("TICKETING_TOKEN_TTL_SECS", "3000")?),
            timeout: Duration::from_secs(var_or("TICKETING_TIMEOUT_SECS", "30")?),
        }))
    }

    pub fn poller(&self) -> PollerConfig {
        PollerConfig {
            interval: self.poll_interval,
            window: self.poll_window,
            lease_ttl: self.poll_lease,
            approval_stage: self
                .ticketing
                .as_ref()
                .map(|t| t.approval_stage.clone())
                .unwrap_or_else(|| PollerConfig::default().approval_stage),
        }
    }
}
