use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, MySqlPool};

use super::{
    LeaveQuery, LeaveStore, LedgerQuery, StoreError, StoreResult, Transition, TransitionOutcome,
};
use crate::model::leave_request::{
    LeaveRequest, LeaveStatus, NewLeaveRequest, TicketRef, join_dates, split_dates,
};
use crate::model::quota_ledger::{NewQuotaLedger, QuotaLedger, QuotaPatch};

const LEAVE_COLUMNS: &str = r#"
    id, employee_name, leave_type, requested_dates, reason, status,
    approver_name, approver_comment, decided_at,
    external_ticket_id, external_task_id, created_at
"#;

const LEDGER_COLUMNS: &str = r#"
    id, employee_name, year, available_days, used_days,
    work_year, anniversary_year, created_at
"#;

#[derive(FromRow)]
struct LeaveRow {
    id: u64,
    employee_name: String,
    leave_type: String,
    requested_dates: String,
    reason: String,
    status: String,
    approver_name: Option<String>,
    approver_comment: Option<String>,
    decided_at: Option<DateTime<Utc>>,
    external_ticket_id: Option<String>,
    external_task_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = StoreError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        let requested_dates = split_dates(&row.requested_dates).map_err(|e| {
            StoreError::Corrupt(format!("leave request {} dates: {e}", row.id))
        })?;
        Ok(LeaveRequest {
            id: row.id,
            employee_name: row.employee_name,
            leave_type: row.leave_type.into(),
            requested_dates,
            reason: row.reason,
            status: parse_status(row.id, &row.status)?,
            approver_name: row.approver_name,
            approver_comment: row.approver_comment,
            decided_at: row.decided_at,
            external_ticket_id: row.external_ticket_id,
            external_task_id: row.external_task_id,
            created_at: row.created_at,
        })
    }
}

fn parse_status(id: u64, raw: &str) -> StoreResult<LeaveStatus> {
    LeaveStatus::from_str(raw)
        .map_err(|_| StoreError::Corrupt(format!("leave request {id} status `{raw}`")))
}

fn is_duplicate_key(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23000"))
}

// Helper enum for typed SQLx binding
enum FilterValue {
    Str(String),
    I32(i32),
}

/// MySQL-backed store. Status transitions rely on InnoDB row locks taken by
/// the conditional `UPDATE ... AND status = 'pending'`.
#[derive(Clone)]
pub struct MySqlLeaveStore {
    pool: MySqlPool,
}

impl MySqlLeaveStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_request(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?");
        sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(LeaveRequest::try_from)
            .transpose()
    }
}

#[async_trait]
impl LeaveStore for MySqlLeaveStore {
    async fn insert_request(&self, new: NewLeaveRequest) -> StoreResult<LeaveRequest> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (employee_name, leave_type, requested_dates, reason, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.employee_name)
        .bind(new.leave_type.as_str())
        .bind(join_dates(&new.requested_dates))
        .bind(&new.reason)
        .bind(LeaveStatus::Pending.as_ref())
        .bind(new.created_at)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_id();
        self.fetch_request(id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("leave request {id} vanished after insert")))
    }

    async fn get_request(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        self.fetch_request(id).await
    }

    async fn list_requests(&self, query: &LeaveQuery) -> StoreResult<(Vec<LeaveRequest>, i64)> {
        let mut where_sql = String::from(" WHERE 1=1");
        let mut args: Vec<FilterValue> = Vec::new();

        if let Some(name) = &query.employee_name {
            where_sql.push_str(" AND employee_name = ?");
            args.push(FilterValue::Str(name.clone()));
        }
        if let Some(status) = query.status {
            where_sql.push_str(" AND status = ?");
            args.push(FilterValue::Str(status.to_string()));
        }
        if let Some(year) = query.year {
            where_sql.push_str(" AND YEAR(created_at) = ?");
            args.push(FilterValue::I32(year));
        }

        let count_sql = format!("SELECT COUNT(*) FROM leave_requests{where_sql}");
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_q = match arg {
                FilterValue::Str(s) => count_q.bind(s.as_str()),
                FilterValue::I32(v) => count_q.bind(*v),
            };
        }
        let total = count_q.fetch_one(&self.pool).await?;

        let data_sql = format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_requests{where_sql} \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let mut data_q = sqlx::query_as::<_, LeaveRow>(&data_sql);
        for arg in &args {
            data_q = match arg {
                FilterValue::Str(s) => data_q.bind(s.as_str()),
                FilterValue::I32(v) => data_q.bind(*v),
            };
        }
        let rows = data_q
            .bind(query.per_page)
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        let requests = rows
            .into_iter()
            .map(LeaveRequest::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok((requests, total))
    }

    async fn pending_requests(&self) -> StoreResult<Vec<LeaveRequest>> {
        let sql = format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE status = ? ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(LeaveStatus::Pending.as_ref())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(LeaveRequest::try_from)
            .collect()
    }

    async fn delete_request(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM leave_requests WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn attach_ticket(&self, id: u64, ticket: &TicketRef) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE leave_requests
            SET external_ticket_id = ?, external_task_id = ?
            WHERE id = ?
            AND external_ticket_id IS NULL
            "#,
        )
        .bind(&ticket.ticket_id)
        .bind(&ticket.task_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_transition(&self, transition: &Transition) -> StoreResult<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, approver_name = ?, approver_comment = ?, decided_at = ?
            WHERE id = ?
            AND status = ?
            "#,
        )
        .bind(transition.to.as_ref())
        .bind(&transition.approver_name)
        .bind(&transition.approver_comment)
        .bind(transition.decided_at)
        .bind(transition.request_id)
        .bind(LeaveStatus::Pending.as_ref())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let current = sqlx::query_scalar::<_, String>(
                "SELECT status FROM leave_requests WHERE id = ?",
            )
            .bind(transition.request_id)
            .fetch_optional(&mut *tx)
            .await?;
            tx.rollback().await?;
            return match current {
                None => Ok(TransitionOutcome::Missing),
                Some(raw) => Ok(TransitionOutcome::NotPending(parse_status(
                    transition.request_id,
                    &raw,
                )?)),
            };
        }

        if let Some(consume) = &transition.consume {
            let result = sqlx::query(
                r#"
                UPDATE quota_ledgers
                SET available_days = available_days - ?, used_days = used_days + ?
                WHERE employee_name = ?
                AND year = ?
                AND available_days >= ?
                "#,
            )
            .bind(consume.days)
            .bind(consume.days)
            .bind(&consume.employee_name)
            .bind(consume.year)
            .bind(consume.days)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let available = sqlx::query_scalar::<_, i32>(
                    "SELECT available_days FROM quota_ledgers WHERE employee_name = ? AND year = ?",
                )
                .bind(&consume.employee_name)
                .bind(consume.year)
                .fetch_optional(&mut *tx)
                .await?;
                tx.rollback().await?;
                return Ok(match available {
                    None => TransitionOutcome::LedgerMissing,
                    Some(available) => TransitionOutcome::InsufficientQuota { available },
                });
            }
        }

        let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?");
        let row = sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(transition.request_id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(TransitionOutcome::Applied(row.try_into()?))
    }

    async fn insert_ledger(&self, new: NewQuotaLedger) -> StoreResult<QuotaLedger> {
        let result = sqlx::query(
            r#"
            INSERT INTO quota_ledgers
                (employee_name, year, available_days, used_days, work_year, anniversary_year)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.employee_name)
        .bind(new.year)
        .bind(new.available_days)
        .bind(new.used_days)
        .bind(new.work_year)
        .bind(new.anniversary_year)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_duplicate_key(&e) {
                StoreError::Duplicate(format!(
                    "quota ledger for {} in {}",
                    new.employee_name, new.year
                ))
            } else {
                StoreError::Database(e)
            }
        })?;

        let id = result.last_insert_id();
        self.get_ledger(id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("quota ledger {id} vanished after insert")))
    }

    async fn get_ledger(&self, id: u64) -> StoreResult<Option<QuotaLedger>> {
        let sql = format!("SELECT {LEDGER_COLUMNS} FROM quota_ledgers WHERE id = ?");
        Ok(sqlx::query_as::<_, QuotaLedger>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_ledger(&self, employee_name: &str, year: i32) -> StoreResult<Option<QuotaLedger>> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM quota_ledgers WHERE employee_name = ? AND year = ?"
        );
        Ok(sqlx::query_as::<_, QuotaLedger>(&sql)
            .bind(employee_name)
            .bind(year)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_ledgers(&self, query: &LedgerQuery) -> StoreResult<Vec<QuotaLedger>> {
        let mut where_sql = String::from(" WHERE 1=1");
        let mut args: Vec<FilterValue> = Vec::new();
        if let Some(name) = &query.employee_name {
            where_sql.push_str(" AND employee_name = ?");
            args.push(FilterValue::Str(name.clone()));
        }
        if let Some(year) = query.year {
            where_sql.push_str(" AND year = ?");
            args.push(FilterValue::I32(year));
        }

        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM quota_ledgers{where_sql} ORDER BY created_at DESC, id DESC"
        );
        let mut q = sqlx::query_as::<_, QuotaLedger>(&sql);
        for arg in &args {
            q = match arg {
                FilterValue::Str(s) => q.bind(s.as_str()),
                FilterValue::I32(v) => q.bind(*v),
            };
        }
        Ok(q.fetch_all(&self.pool).await?)
    }

    async fn update_ledger(&self, id: u64, patch: &QuotaPatch) -> StoreResult<Option<QuotaLedger>> {
        // COALESCE keeps columns the patch leaves out
        let result = sqlx::query(
            r#"
            UPDATE quota_ledgers
            SET year = COALESCE(?, year),
                available_days = COALESCE(?, available_days),
                used_days = COALESCE(?, used_days),
                work_year = COALESCE(?, work_year),
                anniversary_year = COALESCE(?, anniversary_year)
            WHERE id = ?
            "#,
        )
        .bind(patch.year)
        .bind(patch.available_days)
        .bind(patch.used_days)
        .bind(patch.work_year)
        .bind(patch.anniversary_year)
        .bind(id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => self.get_ledger(id).await,
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate(format!(
                "quota ledger {id} would clash with an existing year"
            ))),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    async fn delete_ledger(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM quota_ledgers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        // MySQL evaluates the assignments left to right, so once `holder` is
        // taken over the second IF sees the new holder and moves the expiry too.
        sqlx::query(
            r#"
            INSERT INTO poller_leases (name, holder, expires_at)
            VALUES (?, ?, ?)
            ON DUPLICATE KEY UPDATE
                holder = IF(expires_at < ? OR holder = ?, VALUES(holder), holder),
                expires_at = IF(holder = ?, VALUES(expires_at), expires_at)
            "#,
        )
        .bind(name)
        .bind(holder)
        .bind(expires_at)
        .bind(now)
        .bind(holder)
        .bind(holder)
        .execute(&self.pool)
        .await?;

        let current = sqlx::query_scalar::<_, String>(
            "SELECT holder FROM poller_leases WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(current.as_deref() == Some(holder))
    }

    async fn release_lease(&self, name: &str, holder: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM poller_leases WHERE name = ? AND holder = ?")
            .bind(name)
            .bind(holder)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
