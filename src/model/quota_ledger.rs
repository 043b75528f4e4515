use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// One employee's leave balance for one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct QuotaLedger {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "alice")]
    pub employee_name: String,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 10)]
    pub available_days: i32,
    #[schema(example = 0)]
    pub used_days: i32,
    #[schema(example = 3)]
    pub work_year: i32,
    #[schema(example = 2)]
    pub anniversary_year: i32,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerRuleError {
    #[error("leave days must be positive, got {0}")]
    NonPositive(i32),
    #[error("{requested} day(s) requested but only {available} available")]
    Insufficient { requested: i32, available: i32 },
}

impl QuotaLedger {
    /// Non-mutating check used at submission time.
    pub fn can_cover(&self, days: i32) -> bool {
        self.available_days >= days
    }

    /// Moves `days` from available to used. Never leaves `available_days`
    /// negative.
    pub fn commit_consumption(&mut self, days: i32) -> Result<(), LedgerRuleError> {
        if days <= 0 {
            return Err(LedgerRuleError::NonPositive(days));
        }
        if !self.can_cover(days) {
            return Err(LedgerRuleError::Insufficient {
                requested: days,
                available: self.available_days,
            });
        }
        self.available_days -= days;
        self.used_days += days;
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: &QuotaPatch) {
        if let Some(year) = patch.year {
            self.year = year;
        }
        if let Some(days) = patch.available_days {
            self.available_days = days;
        }
        if let Some(days) = patch.used_days {
            self.used_days = days;
        }
        if let Some(work_year) = patch.work_year {
            self.work_year = work_year;
        }
        if let Some(anniversary_year) = patch.anniversary_year {
            self.anniversary_year = anniversary_year;
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewQuotaLedger {
    #[schema(example = "alice")]
    pub employee_name: String,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 10)]
    pub available_days: i32,
    /// Defaults to 0 when omitted
    #[serde(default)]
    #[schema(example = 0)]
    pub used_days: i32,
    #[schema(example = 3)]
    pub work_year: i32,
    #[schema(example = 2)]
    pub anniversary_year: i32,
}

/// Administrative correction of a ledger row. Only provided fields change.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct QuotaPatch {
    #[schema(example = 2026)]
    pub year: Option<i32>,
    #[schema(example = 12)]
    pub available_days: Option<i32>,
    #[schema(example = 1)]
    pub used_days: Option<i32>,
    pub work_year: Option<i32>,
    pub anniversary_year: Option<i32>,
}

impl QuotaPatch {
    pub fn is_empty(&self) -> bool {
        self.year.is_none()
            && self.available_days.is_none()
            && self.used_days.is_none()
            && self.work_year.is_none()
            && self.anniversary_year.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(available: i32) -> QuotaLedger {
        QuotaLedger {
            id: 1,
            employee_name: "alice".into(),
            year: 2024,
            available_days: available,
            used_days: 0,
            work_year: 1,
            anniversary_year: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn consumption_moves_days_from_available_to_used() {
        let mut row = ledger(10);
        row.commit_consumption(3).unwrap();
        assert_eq!((row.available_days, row.used_days), (7, 3));
    }

    #[test]
    fn consumption_refuses_to_overdraw() {
        let mut row = ledger(2);
        assert_eq!(
            row.commit_consumption(3),
            Err(LedgerRuleError::Insufficient {
                requested: 3,
                available: 2
            })
        );
        assert_eq!((row.available_days, row.used_days), (2, 0));
        assert!(row.can_cover(2));
    }

    #[test]
    fn consumption_requires_positive_days() {
        let mut row = ledger(5);
        assert_eq!(row.commit_consumption(0), Err(LedgerRuleError::NonPositive(0)));
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let mut row = ledger(5);
        let patch = QuotaPatch {
            available_days: Some(8),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        row.apply_patch(&patch);
        assert_eq!(row.available_days, 8);
        assert_eq!(row.year, 2024);
        assert!(QuotaPatch::default().is_empty());
    }
}
