//! reqwest implementations of the token provider and ticketing API.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BridgeError, DecisionEntry, TicketPayload, TicketingApi, TokenProvider};
use crate::config::TicketingConfig;
use crate::model::leave_request::TicketRef;

const TOKEN_KEY: &str = "access_token";

fn http_client(timeout: Duration) -> Result<Client, BridgeError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

async fn read_body(response: Response) -> Result<String, BridgeError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(BridgeError::Status {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }
    Ok(body)
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct CreateTicketResponse {
    ticket_id: String,
    task_id: String,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    entries: Vec<DecisionEntry>,
}

pub(crate) fn parse_token(body: &str) -> Result<String, BridgeError> {
    let parsed: TokenResponse =
        serde_json::from_str(body).map_err(|e| BridgeError::Malformed(e.to_string()))?;
    if parsed.access_token.is_empty() {
        return Err(BridgeError::Malformed("empty access_token".into()));
    }
    Ok(parsed.access_token)
}

pub(crate) fn parse_ticket(body: &str) -> Result<TicketRef, BridgeError> {
    let parsed: CreateTicketResponse =
        serde_json::from_str(body).map_err(|e| BridgeError::Malformed(e.to_string()))?;
    if parsed.ticket_id.is_empty() || parsed.task_id.is_empty() {
        return Err(BridgeError::Malformed("ticket_id/task_id missing".into()));
    }
    Ok(TicketRef {
        ticket_id: parsed.ticket_id,
        task_id: parsed.task_id,
    })
}

pub(crate) fn parse_history(body: &str) -> Result<Vec<DecisionEntry>, BridgeError> {
    serde_json::from_str::<HistoryResponse>(body)
        .map(|h| h.entries)
        .map_err(|e| BridgeError::Malformed(e.to_string()))
}

/// Issues bearer tokens for the ticketing API and keeps the last one cached.
pub struct HttpTokenProvider {
    http: Client,
    token_url: String,
    app_id: String,
    app_secret: String,
    cache: Cache<&'static str, String>,
}

impl HttpTokenProvider {
    pub fn new(config: &TicketingConfig) -> Result<Self, BridgeError> {
        Ok(Self {
            http: http_client(config.timeout)?,
            token_url: config.token_url.clone(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(config.token_ttl)
                .build(),
        })
    }

    async fn fetch(&self) -> Result<String, BridgeError> {
        debug!(url = %self.token_url, "requesting ticketing token");
        let response = self
            .http
            .post(&self.token_url)
            .json(&TokenRequest {
                app_id: &self.app_id,
                app_secret: &self.app_secret,
            })
            .send()
            .await?;
        parse_token(&read_body(response).await?)
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn get_token(&self) -> Result<String, BridgeError> {
        self.cache
            .try_get_with(TOKEN_KEY, self.fetch())
            .await
            .map_err(|e| BridgeError::Token(e.to_string()))
    }

    async fn invalidate(&self) {
        debug!("dropping cached ticketing token");
        self.cache.invalidate(TOKEN_KEY).await;
    }
}

pub struct HttpTicketingClient {
    http: Client,
    base_url: String,
}

impl HttpTicketingClient {
    pub fn new(config: &TicketingConfig) -> Result<Self, BridgeError> {
        Ok(Self {
            http: http_client(config.timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TicketingApi for HttpTicketingClient {
    async fn create_ticket(
        &self,
        payload: &TicketPayload,
        token: &str,
    ) -> Result<TicketRef, BridgeError> {
        let response = self
            .http
            .post(format!("{}/tickets", self.base_url))
            .bearer_auth(token)
            .json(payload)
            .send()
            .await?;
        parse_ticket(&read_body(response).await?)
    }

    async fn get_decisions(
        &self,
        ticket_id: &str,
        token: &str,
    ) -> Result<Vec<DecisionEntry>, BridgeError> {
        let response = self
            .http
            .get(format!("{}/tickets/{}/history", self.base_url, ticket_id))
            .bearer_auth(token)
            .send()
            .await?;
        parse_history(&read_body(response).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_response_needs_both_ids() {
        let ticket = parse_ticket(r#"{"ticket_id":"T-1","task_id":"K-9"}"#).unwrap();
        assert_eq!(ticket.ticket_id, "T-1");
        assert!(matches!(
            parse_ticket(r#"{"ticket_id":"T-1","task_id":""}"#),
            Err(BridgeError::Malformed(_))
        ));
        assert!(matches!(parse_ticket("<html>"), Err(BridgeError::Malformed(_))));
    }

    #[test]
    fn history_defaults_missing_fields() {
        let entries =
            parse_history(r#"{"entries":[{"stage":"approval","action":"agree"}]}"#).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operator, "");
        assert!(parse_history("{}").unwrap().is_empty());
    }

    fn ticketing_config() -> TicketingConfig {
        TicketingConfig {
            base_url: "http://127.0.0.1:9".into(),
            token_url: "http://127.0.0.1:9/token".into(),
            app_id: "app".into(),
            app_secret: "secret".into(),
            approval_stage: "approval".into(),
            token_ttl: Duration::from_secs(3000),
            timeout: Duration::from_millis(200),
        }
    }

    #[actix_web::test]
    async fn invalidate_drops_the_cached_token() {
        let provider = HttpTokenProvider::new(&ticketing_config()).unwrap();
        provider.cache.insert(TOKEN_KEY, "cached".to_string()).await;
        assert_eq!(provider.get_token().await.unwrap(), "cached");

        provider.invalidate().await;
        assert!(provider.cache.get(TOKEN_KEY).await.is_none());
    }

    #[test]
    fn only_401_counts_as_unauthorized() {
        let rejected = BridgeError::Status {
            status: 401,
            body: "token expired".into(),
        };
        let unavailable = BridgeError::Status {
            status: 503,
            body: String::new(),
        };
        assert!(rejected.is_unauthorized());
        assert!(!unavailable.is_unauthorized());
    }

    #[test]
    fn token_must_not_be_empty() {
        assert_eq!(parse_token(r#"{"access_token":"abc","expires_in":7200}"#).unwrap(), "abc");
        assert!(parse_token(r#"{"access_token":""}"#).is_err());
    }
}
