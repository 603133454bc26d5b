//! Storage layer tests for the Ductline server.

#![allow(clippy::unwrap_used)]

use super::db::{DatabaseError, ServerDatabase};
use super::models::PaymentStatus;
use super::queries_payments::NewPayment;
use super::queries_waitlist::{BumpOutcome, BumpParams, NewEntry};

const BASELINE: i64 = 1344;

async fn test_db() -> ServerDatabase {
    ServerDatabase::open_in_memory().await.unwrap()
}

fn entry<'a>(id: &'a str, email: &'a str) -> NewEntry<'a> {
    NewEntry {
        id,
        account_id: None,
        first_name: "Jane",
        last_name: "Doe",
        email,
        phone: None,
        address: None,
    }
}

fn bump<'a>(bump_id: &'a str, entry_id: &'a str, n: i64, payment_id: &'a str) -> BumpParams<'a> {
    BumpParams {
        bump_id,
        entry_id,
        positions_to_move: n,
        payment_id,
        amount_paid_cents: 2500,
    }
}

// === Entry tests ===

#[tokio::test]
async fn first_entry_gets_baseline_then_increments() {
    let db = test_db().await;
    let a = db.insert_entry(&entry("e1", "a@x.com"), BASELINE).await.unwrap();
    let b = db.insert_entry(&entry("e2", "b@x.com"), BASELINE).await.unwrap();

    assert_eq!(a.position, 1344);
    assert_eq!(b.position, 1345);
    assert_eq!(db.count_entries().await.unwrap(), 2);
}

#[tokio::test]
async fn duplicate_email_is_conflict() {
    let db = test_db().await;
    db.insert_entry(&entry("e1", "a@x.com"), BASELINE).await.unwrap();

    let err = db
        .insert_entry(&entry("e2", "a@x.com"), BASELINE)
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Conflict(_)), "got: {err}");
    assert_eq!(db.count_entries().await.unwrap(), 1);
}

#[tokio::test]
async fn insert_updates_signup_counter() {
    let db = test_db().await;
    assert_eq!(db.get_stats().await.unwrap().total_signups, 0);

    db.insert_entry(&entry("e1", "a@x.com"), BASELINE).await.unwrap();
    db.insert_entry(&entry("e2", "b@x.com"), BASELINE).await.unwrap();

    assert_eq!(db.get_stats().await.unwrap().total_signups, 2);
}

#[tokio::test]
async fn lookups_by_email_and_account() {
    let db = test_db().await;
    let mut params = entry("e1", "a@x.com");
    params.account_id = Some("acct-1");
    db.insert_entry(&params, BASELINE).await.unwrap();

    assert_eq!(
        db.find_entry_by_email("a@x.com").await.unwrap().unwrap().id,
        "e1"
    );
    assert!(db.find_entry_by_email("z@x.com").await.unwrap().is_none());
    assert_eq!(
        db.find_entry_by_account("acct-1").await.unwrap().unwrap().id,
        "e1"
    );
    assert!(matches!(
        db.get_entry("missing").await,
        Err(DatabaseError::NotFound(_))
    ));
}

#[tokio::test]
async fn count_ahead_counts_lower_positions() {
    let db = test_db().await;
    db.insert_entry(&entry("e1", "a@x.com"), BASELINE).await.unwrap();
    db.insert_entry(&entry("e2", "b@x.com"), BASELINE).await.unwrap();
    db.insert_entry(&entry("e3", "c@x.com"), BASELINE).await.unwrap();

    assert_eq!(db.count_ahead(1344).await.unwrap(), 0);
    assert_eq!(db.count_ahead(1346).await.unwrap(), 2);
    assert_eq!(db.count_ahead(1).await.unwrap(), 0);
}

#[tokio::test]
async fn list_entries_in_rank_order() {
    let db = test_db().await;
    db.insert_entry(&entry("e1", "a@x.com"), BASELINE).await.unwrap();
    db.insert_entry(&entry("e2", "b@x.com"), BASELINE).await.unwrap();
    db.apply_bump(&bump("b1", "e2", 10, "PAY-1")).await.unwrap();

    let ids: Vec<String> = db
        .list_entries(10, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, vec!["e2", "e1"]);

    let page = db.list_entries(1, 1).await.unwrap();
    assert_eq!(page[0].id, "e1");
}

// === Bump tests ===

#[tokio::test]
async fn bump_moves_entry_and_records_ledger() {
    let db = test_db().await;
    db.insert_entry(&entry("e1", "a@x.com"), BASELINE).await.unwrap();
    db.insert_entry(&entry("e2", "b@x.com"), BASELINE).await.unwrap();

    let outcome = db.apply_bump(&bump("b1", "e2", 50, "PAY-1")).await.unwrap();
    let BumpOutcome::Applied(row) = outcome else {
        panic!("expected Applied, got {outcome:?}");
    };
    assert_eq!(row.from_position, 1345);
    assert_eq!(row.to_position, 1295);
    assert_eq!(row.positions_moved, 50);
    assert_eq!(row.payment_id, "PAY-1");

    assert_eq!(db.get_entry("e2").await.unwrap().position, 1295);
    // Other entries keep their positions.
    assert_eq!(db.get_entry("e1").await.unwrap().position, 1344);
    assert_eq!(db.list_bumps_for_entry("e2", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn same_payment_is_applied_once() {
    let db = test_db().await;
    db.insert_entry(&entry("e1", "a@x.com"), BASELINE).await.unwrap();

    db.apply_bump(&bump("b1", "e1", 10, "PAY-1")).await.unwrap();
    let again = db.apply_bump(&bump("b2", "e1", 10, "PAY-1")).await.unwrap();

    match again {
        BumpOutcome::AlreadyApplied { bump, position } => {
            assert_eq!(bump.id, "b1");
            assert_eq!(position, 1334);
        }
        BumpOutcome::Applied(_) => panic!("payment applied twice"),
    }
    assert_eq!(db.get_entry("e1").await.unwrap().position, 1334);
    assert_eq!(db.count_bumps().await.unwrap(), 1);
}

#[tokio::test]
async fn bump_unknown_entry_is_not_found() {
    let db = test_db().await;
    let err = db
        .apply_bump(&bump("b1", "missing", 5, "PAY-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound(_)));
    assert_eq!(db.count_bumps().await.unwrap(), 0);
}

#[tokio::test]
async fn bump_onto_occupied_slot_keeps_positions_unique() {
    let db = test_db().await;
    db.insert_entry(&entry("e1", "a@x.com"), BASELINE).await.unwrap(); // 1344
    db.insert_entry(&entry("e2", "b@x.com"), BASELINE).await.unwrap(); // 1345

    db.apply_bump(&bump("b1", "e2", 1, "PAY-1")).await.unwrap();

    // 1344 is taken, and nothing is free between 1344 and 1345, so the
    // nearest free slot ahead of the target is used.
    assert_eq!(db.get_entry("e2").await.unwrap().position, 1343);
    assert_eq!(db.get_entry("e1").await.unwrap().position, 1344);
}

#[tokio::test]
async fn bump_skips_occupied_target_to_nearest_free_slot_behind() {
    let db = test_db().await;
    db.insert_entry(&entry("e1", "a@x.com"), 95).await.unwrap();
    db.insert_entry(&entry("e2", "b@x.com"), 95).await.unwrap(); // 96
    db.insert_entry(&entry("e3", "c@x.com"), 95).await.unwrap(); // 97
    sqlx::query("UPDATE waitlist SET position = 100 WHERE id = 'e3'")
        .execute(db.pool())
        .await
        .unwrap();

    db.apply_bump(&bump("b1", "e3", 5, "PAY-1")).await.unwrap();
    assert_eq!(db.get_entry("e3").await.unwrap().position, 97);
}

#[tokio::test]
async fn bump_with_full_window_takes_nearest_free_slot_ahead() {
    let db = test_db().await;
    for i in 0..7 {
        let (id, email) = (format!("e{i}"), format!("{i}@x.com"));
        db.insert_entry(&entry(&id, &email), 94).await.unwrap(); // 94..=100
    }

    db.apply_bump(&bump("b1", "e6", 5, "PAY-1")).await.unwrap();
    assert_eq!(db.get_entry("e6").await.unwrap().position, 93);
}

#[tokio::test]
async fn ledger_rows_cannot_be_changed() {
    let db = test_db().await;
    db.insert_entry(&entry("e1", "a@x.com"), BASELINE).await.unwrap();
    db.apply_bump(&bump("b1", "e1", 5, "PAY-1")).await.unwrap();

    let update = sqlx::query("UPDATE waitlist_bumps SET positions_moved = 99")
        .execute(db.pool())
        .await;
    assert!(update.is_err());
    let delete = sqlx::query("DELETE FROM waitlist_bumps")
        .execute(db.pool())
        .await;
    assert!(delete.is_err());
    assert_eq!(db.count_bumps().await.unwrap(), 1);
}

#[tokio::test]
async fn recent_activity_is_newest_first() {
    let db = test_db().await;
    db.insert_entry(&entry("e1", "a@x.com"), BASELINE).await.unwrap();
    db.apply_bump(&bump("b1", "e1", 5, "PAY-1")).await.unwrap();
    db.apply_bump(&bump("b2", "e1", 7, "PAY-2")).await.unwrap();

    let activity = db.recent_activity(10).await.unwrap();
    assert_eq!(activity.len(), 2);
    assert_eq!(activity[0].positions_moved, 7);
    assert_eq!(activity[0].first_name, "Jane");

    assert_eq!(db.recent_activity(1).await.unwrap().len(), 1);
}

// === Mailing list tests ===

#[tokio::test]
async fn mailing_contact_upsert_is_keyed_by_email() {
    let db = test_db().await;
    db.upsert_mailing_contact("a@x.com", "Jane", "Doe", "waitlist")
        .await
        .unwrap();
    db.upsert_mailing_contact("a@x.com", "Janet", "Doe", "waitlist")
        .await
        .unwrap();

    assert_eq!(db.count_mailing_contacts().await.unwrap(), 1);
    let contact = db.get_mailing_contact("a@x.com").await.unwrap().unwrap();
    assert_eq!(contact.first_name, "Janet");
    assert_eq!(contact.source, "waitlist");
    assert!(db.get_mailing_contact("b@x.com").await.unwrap().is_none());
}

// === Payment tests ===

fn payment<'a>(id: &'a str) -> NewPayment<'a> {
    NewPayment {
        id,
        account_id: Some("acct-1"),
        amount_cents: 2500,
        currency: "USD",
        method: "paypal",
        description: "Fast Track: 50 spots",
        entry_id: None,
        positions_to_move: None,
    }
}

#[tokio::test]
async fn payment_starts_pending() {
    let db = test_db().await;
    let p = db.create_payment(&payment("p1")).await.unwrap();
    assert_eq!(p.status(), Some(PaymentStatus::Pending));
    assert!(p.payment_id.is_none());
    assert!(p.bump_intent().is_none());
}

#[tokio::test]
async fn payment_reference_lookup() {
    let db = test_db().await;
    db.create_payment(&payment("p1")).await.unwrap();
    db.set_payment_reference("p1", "PAYID-123").await.unwrap();

    let p = db.get_payment_by_reference("PAYID-123").await.unwrap();
    assert_eq!(p.id, "p1");
    assert!(matches!(
        db.get_payment_by_reference("nope").await,
        Err(DatabaseError::NotFound(_))
    ));
    assert!(matches!(
        db.set_payment_reference("missing", "X").await,
        Err(DatabaseError::NotFound(_))
    ));
}

#[tokio::test]
async fn payment_transition_is_one_shot() {
    let db = test_db().await;
    db.create_payment(&payment("p1")).await.unwrap();

    assert!(db
        .transition_payment("p1", PaymentStatus::Pending, PaymentStatus::Completed)
        .await
        .unwrap());
    assert!(!db
        .transition_payment("p1", PaymentStatus::Pending, PaymentStatus::Failed)
        .await
        .unwrap());
    assert_eq!(
        db.get_payment("p1").await.unwrap().status(),
        Some(PaymentStatus::Completed)
    );
}

#[tokio::test]
async fn payment_totals_by_status() {
    let db = test_db().await;
    db.create_payment(&payment("p1")).await.unwrap();
    db.create_payment(&payment("p2")).await.unwrap();
    db.transition_payment("p1", PaymentStatus::Pending, PaymentStatus::Completed)
        .await
        .unwrap();

    assert_eq!(
        db.payment_totals(PaymentStatus::Completed).await.unwrap(),
        (1, 2500)
    );
    assert_eq!(
        db.payment_totals(PaymentStatus::Pending).await.unwrap(),
        (1, 2500)
    );
    assert_eq!(db.list_payments_for_account("acct-1").await.unwrap().len(), 2);
}
