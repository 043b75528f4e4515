use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Lifecycle of a leave request. Every state except `Pending` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Revoked,
}

impl LeaveStatus {
    pub fn is_terminal(&self) -> bool {
        match self {
            LeaveStatus::Pending => false,
            LeaveStatus::Approved | LeaveStatus::Rejected | LeaveStatus::Revoked => true,
        }
    }
}

/// Leave categories. Unknown categories are kept verbatim so the store never
/// loses what was submitted; only the known ones drive business rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LeaveType {
    Annual,
    /// maternity / paternity
    Parental,
    Sick,
    Eldercare,
    Marriage,
    Childcare,
    Other(String),
}

impl LeaveType {
    pub fn as_str(&self) -> &str {
        match self {
            LeaveType::Annual => "annual",
            LeaveType::Parental => "parental",
            LeaveType::Sick => "sick",
            LeaveType::Eldercare => "eldercare",
            LeaveType::Marriage => "marriage",
            LeaveType::Childcare => "childcare",
            LeaveType::Other(value) => value,
        }
    }

    /// Annual leave is the only category drawn from the yearly quota.
    pub fn consumes_quota(&self) -> bool {
        matches!(self, LeaveType::Annual)
    }

    /// Categories gated behind an eligibility precondition.
    pub fn is_restricted(&self) -> bool {
        matches!(self, LeaveType::Parental | LeaveType::Childcare)
    }
}

impl From<String> for LeaveType {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "annual" => LeaveType::Annual,
            "parental" | "maternity" | "paternity" => LeaveType::Parental,
            "sick" => LeaveType::Sick,
            "eldercare" => LeaveType::Eldercare,
            "marriage" => LeaveType::Marriage,
            "childcare" => LeaveType::Childcare,
            _ => LeaveType::Other(value),
        }
    }
}

impl From<LeaveType> for String {
    fn from(value: LeaveType) -> Self {
        match value {
            LeaveType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for LeaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers handed back by the external ticketing system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRef {
    pub ticket_id: String,
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: u64,
    pub employee_name: String,
    pub leave_type: LeaveType,
    pub requested_dates: Vec<NaiveDate>,
    pub reason: String,
    pub status: LeaveStatus,
    pub approver_name: Option<String>,
    pub approver_comment: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub external_ticket_id: Option<String>,
    pub external_task_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LeaveRequest {
    pub fn used_days(&self) -> i32 {
        self.requested_dates.len() as i32
    }

    /// Quota rows are looked up by the year the request was submitted in,
    /// not by the requested dates.
    pub fn quota_year(&self) -> i32 {
        self.created_at.year()
    }

    pub fn is_pending(&self) -> bool {
        self.status == LeaveStatus::Pending
    }
}

/// A validated request ready to be persisted as `Pending`.
#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub employee_name: String,
    pub leave_type: LeaveType,
    pub requested_dates: Vec<NaiveDate>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Stored form of the requested dates: `2024-04-01,2024-04-02`.
pub fn join_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn split_dates(raw: &str) -> Result<Vec<NaiveDate>, chrono::ParseError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn leave_type_keeps_unknown_values() {
        assert_eq!(LeaveType::from("Annual".to_string()), LeaveType::Annual);
        assert_eq!(LeaveType::from("maternity".to_string()), LeaveType::Parental);
        let other = LeaveType::from("sabbatical".to_string());
        assert_eq!(other, LeaveType::Other("sabbatical".into()));
        assert_eq!(String::from(other), "sabbatical");
    }

    #[test]
    fn only_annual_consumes_quota() {
        assert!(LeaveType::Annual.consumes_quota());
        assert!(!LeaveType::Sick.consumes_quota());
        assert!(LeaveType::Childcare.is_restricted());
        assert!(!LeaveType::Marriage.is_restricted());
    }

    #[test]
    fn status_parses_lowercase() {
        assert_eq!(LeaveStatus::from_str("revoked").unwrap(), LeaveStatus::Revoked);
        assert_eq!(LeaveStatus::Approved.as_ref(), "approved");
        assert!(LeaveStatus::from_str("2").is_err());
        assert!(!LeaveStatus::Pending.is_terminal());
    }

    #[test]
    fn dates_survive_storage_format() {
        let dates = split_dates("2024-04-01, 2024-04-02,2024-04-03").unwrap();
        assert_eq!(dates.len(), 3);
        assert_eq!(join_dates(&dates), "2024-04-01,2024-04-02,2024-04-03");
        assert!(split_dates("2024-13-01").is_err());
    }
}
