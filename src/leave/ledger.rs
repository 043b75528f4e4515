use std::sync::Arc;

use tracing::info;

use crate::error::{LeaveError, LeaveResult};
use crate::model::quota_ledger::{NewQuotaLedger, QuotaLedger, QuotaPatch};
use crate::store::{LeaveStore, LedgerQuery};

/// Reads and administers quota ledger rows. Consumption itself is applied by
/// the store together with the Approved transition, never from here.
#[derive(Clone)]
pub struct QuotaBook {
    store: Arc<dyn LeaveStore>,
}

impl QuotaBook {
    pub fn new(store: Arc<dyn LeaveStore>) -> Self {
        Self { store }
    }

    /// Whether the employee still has `used_days` available in `year`.
    /// Does not mutate: the request may still be rejected or revoked.
    pub async fn check_and_reserve(
        &self,
        employee_name: &str,
        year: i32,
        used_days: i32,
    ) -> LeaveResult<bool> {
        let ledger = self
            .store
            .find_ledger(employee_name, year)
            .await?
            .ok_or_else(|| {
                LeaveError::not_found(format!(
                    "No quota ledger for {employee_name} in {year}"
                ))
            })?;
        Ok(ledger.can_cover(used_days))
    }

    pub async fn create(&self, new: NewQuotaLedger) -> LeaveResult<QuotaLedger> {
        if new.employee_name.trim().is_empty() {
            return Err(LeaveError::validation("Missing required field: employee_name"));
        }
        if new.available_days < 0 || new.used_days < 0 {
            return Err(LeaveError::validation("Leave days cannot be negative"));
        }
        let ledger = self.store.insert_ledger(new).await?;
        info!(
            ledger_id = ledger.id,
            employee = %ledger.employee_name,
            year = ledger.year,
            available_days = ledger.available_days,
            "quota ledger created"
        );
        Ok(ledger)
    }

    pub async fn get(&self, id: u64) -> LeaveResult<QuotaLedger> {
        self.store
            .get_ledger(id)
            .await?
            .ok_or_else(|| LeaveError::not_found("Quota ledger not found"))
    }

    pub async fn list(&self, query: &LedgerQuery) -> LeaveResult<Vec<QuotaLedger>> {
        Ok(self.store.list_ledgers(query).await?)
    }

    /// Administrative correction.
    pub async fn adjust(&self, id: u64, patch: &QuotaPatch) -> LeaveResult<QuotaLedger> {
        if patch.is_empty() {
            return Err(LeaveError::validation("No valid fields provided for update"));
        }
        if patch.available_days.is_some_and(|d| d < 0) || patch.used_days.is_some_and(|d| d < 0) {
            return Err(LeaveError::validation("Leave days cannot be negative"));
        }
        let ledger = self
            .store
            .update_ledger(id, patch)
            .await?
            .ok_or_else(|| LeaveError::not_found("Quota ledger not found"))?;
        info!(ledger_id = id, ?patch, "quota ledger adjusted");
        Ok(ledger)
    }

    /// Deletes a row, but only when the caller names its owner.
    pub async fn delete(&self, id: u64, employee_name: &str) -> LeaveResult<()> {
        let ledger = self.get(id).await?;
        if ledger.employee_name != employee_name {
            return Err(LeaveError::validation("User does not match"));
        }
        if !self.store.delete_ledger(id).await? {
            return Err(LeaveError::not_found("Quota ledger not found"));
        }
        info!(ledger_id = id, employee = %employee_name, "quota ledger deleted");
        Ok(())
    }
}
