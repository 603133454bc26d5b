//! Workflow tests for join, bump, and rank.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;

use ductline_core::config::WaitlistConfig;

use super::{BumpRequest, JoinRequest, WaitlistService};
use crate::error::ServiceError;
use crate::storage::ServerDatabase;

async fn service() -> WaitlistService {
    let db = ServerDatabase::open_in_memory().await.unwrap();
    WaitlistService::new(db, WaitlistConfig::default())
}

fn join_req(first: &str, last: &str, email: &str) -> JoinRequest {
    JoinRequest {
        first_name: first.into(),
        last_name: last.into(),
        email: email.into(),
        ..JoinRequest::default()
    }
}

fn bump_req(entry_id: &str, n: i64, reference: &str) -> BumpRequest {
    BumpRequest {
        entry_id: entry_id.into(),
        positions_to_move: n,
        payment_reference: reference.into(),
        amount_paid_cents: 2500,
    }
}

/// Place a single entry at an arbitrary position.
async fn entry_at(svc: &WaitlistService, position: i64) -> String {
    let cfg = WaitlistConfig {
        baseline_position: position,
        ..WaitlistConfig::default()
    };
    let seeded = WaitlistService::new(svc.db().clone(), cfg);
    seeded
        .join(join_req("Pat", "Lee", &format!("pat{position}@x.com")))
        .await
        .unwrap()
        .id
}

// === Join ===

#[tokio::test]
async fn empty_list_starts_at_baseline() {
    let svc = service().await;
    let first = svc.join(join_req("Jane", "Doe", "jane@x.com")).await.unwrap();
    let second = svc.join(join_req("John", "Roe", "john@x.com")).await.unwrap();

    assert_eq!(first.position, 1344);
    assert_eq!(second.position, 1345);
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn duplicate_email_returns_original_position() {
    let svc = service().await;
    let original = svc.join(join_req("X", "Y", "dup@x.com")).await.unwrap();

    let err = svc
        .join(join_req("X", "Y", "DUP@x.com "))
        .await
        .unwrap_err();
    match err {
        ServiceError::DuplicateEntry { position } => assert_eq!(position, original.position),
        other => panic!("expected DuplicateEntry, got {other:?}"),
    }
    assert_eq!(svc.db().count_entries().await.unwrap(), 1);
}

#[tokio::test]
async fn missing_fields_are_rejected_without_writing() {
    let svc = service().await;
    let err = svc.join(join_req("Jane", "", "jane@x.com")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(svc.db().count_entries().await.unwrap(), 0);
}

#[tokio::test]
async fn join_mirrors_into_mailing_list_and_counter() {
    let svc = service().await;
    svc.join(join_req("Jane", "Doe", "jane@x.com")).await.unwrap();

    assert_eq!(svc.db().count_mailing_contacts().await.unwrap(), 1);
    let contact = svc
        .db()
        .get_mailing_contact("jane@x.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!((contact.first_name.as_str(), contact.last_name.as_str()), ("Jane", "Doe"));
    assert_eq!(svc.db().get_stats().await.unwrap().total_signups, 1);
}

#[tokio::test]
async fn join_keeps_linked_account() {
    let svc = service().await;
    let mut req = join_req("Jane", "Doe", "jane@x.com");
    req.account_id = Some("acct-9".into());
    let joined = svc.join(req).await.unwrap();

    let rank = svc.rank_for_account("acct-9").await.unwrap();
    assert_eq!(rank.entry_id, joined.id);
}

#[tokio::test]
async fn mailing_list_failure_does_not_fail_join() {
    let svc = service().await;
    sqlx::query("DROP TABLE mailing_list")
        .execute(svc.db().pool())
        .await
        .unwrap();

    let joined = svc.join(join_req("Jane", "Doe", "jane@x.com")).await.unwrap();
    assert_eq!(joined.position, 1344);
}

#[tokio::test]
async fn counter_failure_does_not_fail_join() {
    let svc = service().await;
    sqlx::query("DROP TABLE waitlist_stats")
        .execute(svc.db().pool())
        .await
        .unwrap();

    let joined = svc.join(join_req("Jane", "Doe", "jane@x.com")).await.unwrap();
    assert_eq!(joined.position, 1344);
    assert_eq!(svc.db().count_entries().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_never_share_a_position() {
    let dir = tempfile::tempdir().unwrap();
    let db = ServerDatabase::open(&dir.path().join("waitlist.db"))
        .await
        .unwrap();
    let svc = WaitlistService::new(db, WaitlistConfig::default());

    let handles: Vec<_> = (0..24)
        .map(|i| {
            let svc = svc.clone();
            tokio::spawn(async move {
                svc.join(join_req("Racer", "Test", &format!("racer{i}@x.com")))
                    .await
            })
        })
        .collect();

    let mut positions = HashSet::new();
    for handle in handles {
        let joined = handle.await.unwrap().expect("join failed");
        assert!(positions.insert(joined.position), "position reused");
    }

    assert_eq!(positions.len(), 24);
    assert_eq!(positions.iter().min(), Some(&1344));
    assert_eq!(positions.iter().max(), Some(&(1344 + 23)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_joins_create_one_row() {
    let svc = service().await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let svc = svc.clone();
            tokio::spawn(async move { svc.join(join_req("Same", "Person", "same@x.com")).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(ServiceError::DuplicateEntry { position }) => assert_eq!(position, 1344),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(svc.db().count_entries().await.unwrap(), 1);
}

// === Bump ===

#[tokio::test]
async fn bump_subtracts_when_smaller_than_position() {
    let svc = service().await;
    svc.join(join_req("Jane", "Doe", "jane@x.com")).await.unwrap();
    let second = svc.join(join_req("John", "Roe", "john@x.com")).await.unwrap();
    assert_eq!(second.position, 1345);

    let bumped = svc.bump(bump_req(&second.id, 50, "PAY-50")).await.unwrap();
    assert_eq!(bumped.previous_position, 1345);
    assert_eq!(bumped.new_position, 1295);
    assert!(!bumped.already_applied);

    let ledger = svc.db().list_bumps_for_entry(&second.id, 10).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].positions_moved, 50);
    assert_eq!(ledger[0].payment_id, "PAY-50");
}

#[tokio::test]
async fn bump_larger_than_position_caps_at_front() {
    let svc = service().await;
    let id = entry_at(&svc, 30).await;

    let bumped = svc.bump(bump_req(&id, 50, "PAY-1")).await.unwrap();
    assert_eq!(bumped.new_position, 1);
}

#[tokio::test]
async fn bump_equal_to_position_caps_at_front() {
    let svc = service().await;
    let id = entry_at(&svc, 30).await;

    let bumped = svc.bump(bump_req(&id, 30, "PAY-1")).await.unwrap();
    assert_eq!(bumped.new_position, 1);
}

#[tokio::test]
async fn retried_payment_does_not_bump_twice() {
    let svc = service().await;
    let id = entry_at(&svc, 500).await;

    let first = svc.bump(bump_req(&id, 100, "PAY-RETRY")).await.unwrap();
    let retry = svc.bump(bump_req(&id, 100, "PAY-RETRY")).await.unwrap();

    assert_eq!(first.new_position, 400);
    assert_eq!(retry.new_position, 400);
    assert!(retry.already_applied);
    assert_eq!(svc.db().count_bumps().await.unwrap(), 1);
}

#[tokio::test]
async fn payment_reused_for_another_entry_is_rejected() {
    let svc = service().await;
    let a = svc.join(join_req("Jane", "Doe", "jane@x.com")).await.unwrap();
    let b = svc.join(join_req("John", "Roe", "john@x.com")).await.unwrap();

    svc.bump(bump_req(&a.id, 10, "PAY-1")).await.unwrap();
    let err = svc.bump(bump_req(&b.id, 10, "PAY-1")).await.unwrap_err();

    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(svc.db().get_entry(&b.id).await.unwrap().position, 1345);
}

#[tokio::test]
async fn bump_unknown_entry_is_not_found() {
    let svc = service().await;
    let err = svc.bump(bump_req("nope", 5, "PAY-1")).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn each_bump_writes_one_matching_ledger_row() {
    let svc = service().await;
    let id = entry_at(&svc, 1000).await;

    for (i, n) in [3_i64, 7, 11].iter().enumerate() {
        svc.bump(bump_req(&id, *n, &format!("PAY-{i}"))).await.unwrap();
    }

    let mut ledger = svc.db().list_bumps_for_entry(&id, 10).await.unwrap();
    ledger.sort_by_key(|b| b.payment_id.clone());
    let moved: Vec<(i64, &str)> = ledger
        .iter()
        .map(|b| (b.positions_moved, b.payment_id.as_str()))
        .collect();
    assert_eq!(moved, vec![(3, "PAY-0"), (7, "PAY-1"), (11, "PAY-2")]);
    assert_eq!(svc.db().get_entry(&id).await.unwrap().position, 1000 - 21);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bumps_on_one_entry_are_not_lost() {
    let svc = service().await;
    let id = entry_at(&svc, 1000).await;

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let svc = svc.clone();
            let id = id.clone();
            tokio::spawn(async move { svc.bump(bump_req(&id, 10, &format!("PAY-{i}"))).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(svc.db().get_entry(&id).await.unwrap().position, 900);
    assert_eq!(svc.db().count_bumps().await.unwrap(), 10);
}

// === Rank ===

#[tokio::test]
async fn people_ahead_counts_lower_positions() {
    let svc = service().await;
    let a = svc.join(join_req("A", "A", "a@x.com")).await.unwrap();
    let b = svc.join(join_req("B", "B", "b@x.com")).await.unwrap();
    let c = svc.join(join_req("C", "C", "c@x.com")).await.unwrap();

    assert_eq!(svc.rank(&a.id).await.unwrap().people_ahead, 0);
    assert_eq!(svc.rank(&c.id).await.unwrap().people_ahead, 2);

    svc.bump(bump_req(&c.id, 500, "PAY-1")).await.unwrap();
    let rank_c = svc.rank(&c.id).await.unwrap();
    assert_eq!(rank_c.people_ahead, 0);
    assert_eq!(rank_c.total_entries, 3);
    assert_eq!(rank_c.recent_bumps.len(), 1);
    assert_eq!(svc.rank(&b.id).await.unwrap().people_ahead, 2);
}

#[tokio::test]
async fn rank_of_unknown_entry_is_not_found() {
    let svc = service().await;
    assert!(matches!(
        svc.rank("missing").await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        svc.rank_for_account("acct-missing").await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn recent_activity_is_clamped() {
    let svc = service().await;
    let id = entry_at(&svc, 1000).await;
    for i in 0..3 {
        svc.bump(bump_req(&id, 1, &format!("PAY-{i}"))).await.unwrap();
    }

    assert_eq!(svc.recent_activity(None).await.unwrap().len(), 3);
    assert_eq!(svc.recent_activity(Some(2)).await.unwrap().len(), 2);
    assert_eq!(svc.recent_activity(Some(0)).await.unwrap().len(), 1);

    let latest = &svc.recent_activity(Some(1)).await.unwrap()[0];
    assert_eq!(latest.display_name, "Pat L.");
}
