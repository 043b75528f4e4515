mod common;

use chrono::Utc;
use futures::future::join_all;

use common::*;
use hrm_leave::error::LeaveError;
use hrm_leave::leave::{DecisionSource, Verdict};
use hrm_leave::model::leave_request::{LeaveStatus, LeaveType, NewLeaveRequest};
use hrm_leave::store::LeaveStore;

#[actix_web::test]
async fn approval_round_trip_consumes_quota_once() {
    let (store, state) = manual_state();
    let ledger = seed_ledger(store.as_ref(), "alice", 10).await;

    let request = state
        .leaves
        .submit(submission("alice", "annual", 3))
        .await
        .expect("submission accepted");
    assert_eq!(request.used_days(), 3);

    let approved = state
        .approvals
        .decide(
            request.id,
            Verdict::Approve,
            "bob",
            Some("enjoy".into()),
            DecisionSource::Approver,
        )
        .await
        .expect("first approval succeeds");
    assert_eq!(approved.status, LeaveStatus::Approved);
    assert_eq!(approved.approver_name.as_deref(), Some("bob"));
    assert_eq!(approved.approver_comment.as_deref(), Some("enjoy"));
    assert!(approved.decided_at.is_some());

    let after = store.get_ledger(ledger.id).await.unwrap().unwrap();
    assert_eq!((after.available_days, after.used_days), (7, 3));

    match state
        .approvals
        .decide(request.id, Verdict::Approve, "bob", None, DecisionSource::Approver)
        .await
    {
        Err(LeaveError::Conflict { id, status }) => {
            assert_eq!(id, request.id);
            assert_eq!(status, LeaveStatus::Approved);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    let unchanged = store.get_ledger(ledger.id).await.unwrap().unwrap();
    assert_eq!((unchanged.available_days, unchanged.used_days), (7, 3));
}

#[actix_web::test]
async fn competing_approvals_through_engine_decrement_once() {
    let (store, state) = manual_state();
    let ledger = seed_ledger(store.as_ref(), "alice", 10).await;
    let request = state
        .leaves
        .submit(submission("alice", "annual", 2))
        .await
        .unwrap();

    let attempts = (0..8).map(|i| {
        let engine = state.approvals.clone();
        async move {
            engine
                .decide(
                    request.id,
                    Verdict::Approve,
                    &format!("approver-{i}"),
                    None,
                    DecisionSource::Approver,
                )
                .await
        }
    });
    let results = join_all(attempts).await;

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(LeaveError::Conflict { .. })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);

    let after = store.get_ledger(ledger.id).await.unwrap().unwrap();
    assert_eq!((after.available_days, after.used_days), (8, 2));
}

#[actix_web::test]
async fn approval_without_ledger_is_an_invariant_violation() {
    let (store, state) = manual_state();
    // ledger removed after submission, e.g. by an administrator
    let request = store
        .insert_request(NewLeaveRequest {
            employee_name: "dave".into(),
            leave_type: LeaveType::Annual,
            requested_dates: dates(2),
            reason: "rest".into(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let result = state
        .approvals
        .decide(request.id, Verdict::Approve, "bob", None, DecisionSource::Approver)
        .await;
    assert!(matches!(result, Err(LeaveError::InvariantViolation(_))));

    let stored = store.get_request(request.id).await.unwrap().unwrap();
    assert_eq!(stored.status, LeaveStatus::Pending);
    assert!(stored.approver_name.is_none());
}

#[actix_web::test]
async fn approval_never_overdraws_the_ledger() {
    let (store, state) = manual_state();
    let ledger = seed_ledger(store.as_ref(), "alice", 5).await;
    let first = state.leaves.submit(submission("alice", "annual", 3)).await.unwrap();
    let second = state.leaves.submit(submission("alice", "annual", 3)).await.unwrap();

    state
        .approvals
        .decide(first.id, Verdict::Approve, "bob", None, DecisionSource::Approver)
        .await
        .unwrap();
    let result = state
        .approvals
        .decide(second.id, Verdict::Approve, "bob", None, DecisionSource::Approver)
        .await;
    assert!(matches!(result, Err(LeaveError::InvariantViolation(_))));

    let stored = store.get_request(second.id).await.unwrap().unwrap();
    assert_eq!(stored.status, LeaveStatus::Pending);
    let after = store.get_ledger(ledger.id).await.unwrap().unwrap();
    assert_eq!((after.available_days, after.used_days), (2, 3));
}

#[actix_web::test]
async fn rejection_and_non_annual_approval_leave_quota_alone() {
    let (store, state) = manual_state();
    let ledger = seed_ledger(store.as_ref(), "alice", 10).await;
    let annual = state.leaves.submit(submission("alice", "annual", 4)).await.unwrap();
    let sick = state.leaves.submit(submission("alice", "sick", 2)).await.unwrap();

    let rejected = state
        .approvals
        .decide(annual.id, Verdict::Reject, "bob", None, DecisionSource::Approver)
        .await
        .unwrap();
    assert_eq!(rejected.status, LeaveStatus::Rejected);
    state
        .approvals
        .decide(sick.id, Verdict::Approve, "bob", None, DecisionSource::Approver)
        .await
        .unwrap();

    let after = store.get_ledger(ledger.id).await.unwrap().unwrap();
    assert_eq!((after.available_days, after.used_days), (10, 0));
}

#[actix_web::test]
async fn revoke_only_from_pending_and_only_by_submitter() {
    let (store, state) = manual_state();
    let pending = state.leaves.submit(submission("erin", "sick", 1)).await.unwrap();

    assert!(matches!(
        state.approvals.revoke(pending.id, "mallory").await,
        Err(LeaveError::Validation(_))
    ));

    let revoked = state.approvals.revoke(pending.id, "erin").await.unwrap();
    assert_eq!(revoked.status, LeaveStatus::Revoked);
    assert!(revoked.approver_name.is_none());

    for status_source in [LeaveStatus::Approved, LeaveStatus::Rejected] {
        let request = state.leaves.submit(submission("erin", "sick", 1)).await.unwrap();
        let verdict = match status_source {
            LeaveStatus::Approved => Verdict::Approve,
            _ => Verdict::Reject,
        };
        state
            .approvals
            .decide(request.id, verdict, "bob", None, DecisionSource::Approver)
            .await
            .unwrap();
        let before = store.get_request(request.id).await.unwrap().unwrap();

        match state.approvals.revoke(request.id, "erin").await {
            Err(LeaveError::Conflict { status, .. }) => assert_eq!(status, status_source),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(store.get_request(request.id).await.unwrap().unwrap(), before);
    }

    assert!(matches!(
        state.approvals.revoke(pending.id, "erin").await,
        Err(LeaveError::Conflict {
            status: LeaveStatus::Revoked,
            ..
        })
    ));
}

#[actix_web::test]
async fn deciding_unknown_or_anonymous_requests_fails() {
    let (_store, state) = manual_state();
    assert!(matches!(
        state
            .approvals
            .decide(404, Verdict::Approve, "bob", None, DecisionSource::Approver)
            .await,
        Err(LeaveError::NotFound(_))
    ));

    let request = state.leaves.submit(submission("erin", "sick", 1)).await.unwrap();
    assert!(matches!(
        state
            .approvals
            .decide(request.id, Verdict::Approve, "  ", None, DecisionSource::Approver)
            .await,
        Err(LeaveError::Validation(_))
    ));
}
