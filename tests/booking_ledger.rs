//! Booking ledger behaviour over the in-memory backend.
//!
//! Run with: `cargo test --test booking_ledger`

#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use cine_booker::error::{LedgerError, StoreError};
use cine_booker::models::{Gender, Identity, SeatAssignment, SeatRequest, ShowKey};
use cine_booker::services::ledger::BookingLedger;
use cine_booker::services::notification::{Notifier, NotifyError};
use cine_booker::store::{BookingStore, MemoryStore};

fn ledger() -> BookingLedger {
    BookingLedger::in_memory().with_bcrypt_cost(4)
}

fn kanguva(time: &str) -> ShowKey {
    ShowKey::new("Kanguva", "AGS Cinemas", Some("Chennai".into()), "4 Feb", time)
}

fn seats(list: &[(&str, Gender)]) -> Vec<SeatRequest> {
    list.iter().map(|(id, g)| SeatRequest::new(*id, *g)).collect()
}

fn occupancy(list: &[(&str, Gender)]) -> BTreeMap<String, Gender> {
    list.iter().map(|(id, g)| (id.to_string(), *g)).collect()
}

struct ChannelNotifier(mpsc::UnboundedSender<String>);

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), NotifyError> {
        let _ = self.0.send(format!("{subject}|{message}"));
        Ok(())
    }
}

struct BrokenNotifier;

#[async_trait]
impl Notifier for BrokenNotifier {
    async fn publish(&self, _subject: &str, _message: &str) -> Result<(), NotifyError> {
        Err(NotifyError::Encode(serde_json::from_str::<u8>("x").unwrap_err()))
    }
}

/// Store that never answers in time.
struct StalledStore;

#[async_trait]
impl BookingStore for StalledStore {
    async fn occupancy(&self, _show: &ShowKey) -> Result<Vec<SeatAssignment>, StoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Vec::new())
    }

    async fn insert_assignments(&self, _: &ShowKey, _: &[SeatAssignment]) -> Result<(), StoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    }
}

/// Store that counts calls and fails them all.
#[derive(Default)]
struct CountingStore {
    calls: AtomicUsize,
}

#[async_trait]
impl BookingStore for CountingStore {
    async fn occupancy(&self, _show: &ShowKey) -> Result<Vec<SeatAssignment>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn insert_assignments(&self, _: &ShowKey, _: &[SeatAssignment]) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn show_without_bookings_is_empty() {
    let ledger = ledger();
    assert!(ledger.get_occupancy(&kanguva("10:30 AM")).await.unwrap().is_empty());
}

#[tokio::test]
async fn confirmed_seats_show_up_alongside_existing_ones() {
    let ledger = ledger();
    let show = kanguva("06:15 PM");

    ledger
        .confirm_booking(&show, &seats(&[("C7", Gender::Other)]), None)
        .await
        .unwrap();
    ledger
        .confirm_booking(&show, &seats(&[("A1", Gender::Male), ("A2", Gender::Female)]), None)
        .await
        .unwrap();

    assert_eq!(
        ledger.get_occupancy(&show).await.unwrap(),
        occupancy(&[("A1", Gender::Male), ("A2", Gender::Female), ("C7", Gender::Other)])
    );
}

#[tokio::test]
async fn each_seat_gets_its_own_booking_id_and_owner() {
    let ledger = ledger();
    let user = Identity { email: "a@x.com".into(), name: "Anu".into() };

    let booked = ledger
        .confirm_booking(
            &kanguva("10:30 AM"),
            &seats(&[("A1", Gender::Male), ("A2", Gender::Female)]),
            Some(&user),
        )
        .await
        .unwrap();

    assert_eq!(booked.len(), 2);
    assert_ne!(booked[0].booking_id, booked[1].booking_id);
    assert!(booked.iter().all(|a| a.user_email.as_deref() == Some("a@x.com")));
    assert_eq!(booked[0].booked_at, booked[1].booked_at);
}

#[tokio::test]
async fn taken_seat_rejects_the_whole_batch() {
    let ledger = ledger();
    let show = kanguva("02:45 PM");
    ledger
        .confirm_booking(&show, &seats(&[("B3", Gender::Female)]), None)
        .await
        .unwrap();

    let err = ledger
        .confirm_booking(&show, &seats(&[("B2", Gender::Male), ("B3", Gender::Male)]), None)
        .await
        .unwrap_err();

    match err {
        LedgerError::SeatsTaken { seats } => assert_eq!(seats, vec!["B3".to_string()]),
        other => panic!("expected SeatsTaken, got {other:?}"),
    }
    // B2 must not have been written
    assert_eq!(
        ledger.get_occupancy(&show).await.unwrap(),
        occupancy(&[("B3", Gender::Female)])
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_claims_on_one_seat_have_a_single_winner() {
    let ledger = ledger();
    let show = kanguva("10:30 AM");

    let first = {
        let (ledger, show) = (ledger.clone(), show.clone());
        tokio::spawn(async move {
            ledger.confirm_booking(&show, &seats(&[("A1", Gender::Male)]), None).await
        })
    };
    let second = {
        let (ledger, show) = (ledger.clone(), show.clone());
        tokio::spawn(async move {
            ledger.confirm_booking(&show, &seats(&[("A1", Gender::Female)]), None).await
        })
    };
    let results = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(loser, LedgerError::SeatsTaken { seats } if seats == &["A1".to_string()]));
    assert_eq!(ledger.get_occupancy(&show).await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_requests_never_reach_storage() {
    let store = Arc::new(CountingStore::default());
    let ledger = BookingLedger::new(
        store.clone(),
        Arc::new(MemoryStore::new()),
        Arc::new(BrokenNotifier),
    );

    let empty = ledger.confirm_booking(&kanguva("10:30 AM"), &[], None).await;
    assert!(matches!(empty, Err(LedgerError::Validation(_))));

    let no_time = ShowKey::new("Kanguva", "AGS Cinemas", None, "4 Feb", "");
    let missing = ledger
        .confirm_booking(&no_time, &seats(&[("A1", Gender::Male)]), None)
        .await;
    assert!(matches!(missing, Err(LedgerError::Validation(ref m)) if m == "time is required"));

    assert_eq!(store.calls.load(Ordering::SeqCst), 0);

    // a valid request does hit the (failing) store and surfaces as transient
    let err = ledger
        .confirm_booking(&kanguva("10:30 AM"), &seats(&[("A1", Gender::Male)]), None)
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn slow_storage_times_out_as_unavailable() {
    let ledger = BookingLedger::new(
        Arc::new(StalledStore),
        Arc::new(MemoryStore::new()),
        Arc::new(BrokenNotifier),
    )
    .with_storage_timeout(Duration::from_millis(50));

    let err = ledger.get_occupancy(&kanguva("10:30 AM")).await.unwrap_err();
    assert!(matches!(err, LedgerError::Unavailable(ref m) if m == "occupancy timed out"));
}

#[tokio::test]
async fn failing_notifications_do_not_fail_bookings() {
    let ledger = ledger().with_notifier(Arc::new(BrokenNotifier));
    let booked = ledger
        .confirm_booking(&kanguva("10:30 AM"), &seats(&[("D4", Gender::Male)]), None)
        .await
        .unwrap();
    assert_eq!(booked.len(), 1);
}

#[tokio::test]
async fn confirmed_booking_is_announced() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let ledger = ledger().with_notifier(Arc::new(ChannelNotifier(tx)));
    let user = Identity { email: "a@x.com".into(), name: "Anu".into() };

    ledger
        .confirm_booking(
            &kanguva("10:30 AM"),
            &seats(&[("E1", Gender::Female), ("E2", Gender::Male)]),
            Some(&user),
        )
        .await
        .unwrap();

    let sent = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(sent.starts_with("Booking Confirmed!|User Anu booked tickets."));
    assert!(sent.contains("Seats: E1, E2"));
}

#[tokio::test]
async fn registering_twice_reports_duplicate() {
    let ledger = ledger();
    ledger.register_user("a@x.com", "Anu", "secret").await.unwrap();

    let again = ledger.register_user("a@x.com", "Someone Else", "different").await;
    assert!(matches!(again, Err(LedgerError::DuplicateEmail)));
    let again = ledger.register_user("a@x.com", "Anu", "secret").await;
    assert!(matches!(again, Err(LedgerError::DuplicateEmail)));
}

#[tokio::test]
async fn registration_rejects_malformed_input() {
    let ledger = ledger();
    let bad_email = ledger.register_user("not-an-email", "Anu", "secret").await;
    assert!(matches!(bad_email, Err(LedgerError::Validation(_))));
    let blank_name = ledger.register_user("a@x.com", "   ", "secret").await;
    assert!(matches!(blank_name, Err(LedgerError::Validation(_))));
    let no_password = ledger.register_user("a@x.com", "Anu", "").await;
    assert!(matches!(no_password, Err(LedgerError::Validation(_))));
}

#[tokio::test]
async fn authentication_outcomes() {
    let ledger = ledger();
    ledger.register_user("a@x.com", "Anu", "secret").await.unwrap();

    let ok = ledger.authenticate("a@x.com", "secret").await.unwrap();
    assert_eq!(ok, Identity { email: "a@x.com".into(), name: "Anu".into() });

    let wrong_password = ledger.authenticate("a@x.com", "Secret").await.unwrap_err();
    let unknown_email = ledger.authenticate("b@x.com", "secret").await.unwrap_err();
    assert!(matches!(wrong_password, LedgerError::InvalidCredentials));
    assert!(matches!(unknown_email, LedgerError::InvalidCredentials));
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
}

#[tokio::test]
async fn password_must_match_past_the_bcrypt_limit() {
    let ledger = ledger();
    let password = "a".repeat(72);
    ledger.register_user("a@x.com", "Anu", &password).await.unwrap();

    assert!(ledger.authenticate("a@x.com", &password).await.is_ok());
    let longer = ledger
        .authenticate("a@x.com", &format!("{password}WRONG"))
        .await
        .unwrap_err();
    assert!(matches!(longer, LedgerError::InvalidCredentials));
    assert!(matches!(
        ledger.login("a@x.com", &format!("{password}b")).await,
        Err(LedgerError::InvalidCredentials)
    ));
}

async fn next_notification(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn signup_is_announced() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let ledger = ledger().with_notifier(Arc::new(ChannelNotifier(tx)));

    ledger.register_user("a@x.com", "Anu", "secret").await.unwrap();
    assert_eq!(next_notification(&mut rx).await, "New Signup|User Anu joined.");
}

#[tokio::test]
async fn only_login_announces_a_login() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let ledger = ledger().with_notifier(Arc::new(ChannelNotifier(tx)));
    ledger.register_user("a@x.com", "Anu", "secret").await.unwrap();
    next_notification(&mut rx).await;

    ledger.authenticate("a@x.com", "secret").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());

    ledger.login("a@x.com", "secret").await.unwrap();
    assert_eq!(next_notification(&mut rx).await, "User Login|User Anu logged in.");

    // failed logins stay quiet
    assert!(ledger.login("a@x.com", "nope").await.is_err());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn end_to_end_kanguva_at_ags() {
    let ledger = ledger();
    let user = ledger.register_user("a@x.com", "Anu", "secret").await.unwrap();

    ledger
        .confirm_booking(&kanguva("10:30 AM"), &seats(&[("B3", Gender::Female)]), Some(&user))
        .await
        .unwrap();

    assert_eq!(
        ledger.get_occupancy(&kanguva("10:30 AM")).await.unwrap(),
        occupancy(&[("B3", Gender::Female)])
    );
    assert!(ledger.get_occupancy(&kanguva("02:45 PM")).await.unwrap().is_empty());
}

#[tokio::test]
async fn city_is_part_of_the_show_key() {
    let ledger = ledger();
    let with_city = kanguva("10:30 AM");
    let without_city = ShowKey::new("Kanguva", "AGS Cinemas", None, "4 Feb", "10:30 AM");

    ledger
        .confirm_booking(&with_city, &seats(&[("A1", Gender::Male)]), None)
        .await
        .unwrap();

    assert!(ledger.get_occupancy(&without_city).await.unwrap().is_empty());
    ledger
        .confirm_booking(&without_city, &seats(&[("A1", Gender::Female)]), None)
        .await
        .unwrap();
}
