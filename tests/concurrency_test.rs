//! Concurrent access tests for the ledger.
//!
//! Several threads, each with its own connection to one database file,
//! debit the same sender at once. The store's transactions must serialize
//! them: allowance never goes negative, the monthly limit is never passed,
//! and every committed transfer is reflected exactly once.

use std::sync::{Arc, Barrier};
use std::thread;

use recognition_ledger::{
    DatabaseConfig, Ledger, LedgerConfig, LedgerError, RecognitionFilter,
};

fn settings() -> DatabaseConfig {
    DatabaseConfig {
        path: String::new(),
        busy_timeout_ms: 2_000,
        max_conflict_retries: 5,
    }
}

#[test]
fn test_concurrent_recognitions_never_overdraw_sender() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ledger.db");
    let cfg = LedgerConfig::default();

    let (sender_id, recipient_ids) = {
        let mut ledger = Ledger::open(&db_path, &settings(), cfg).unwrap();
        let sender = ledger.create_student("Sender").unwrap();
        let recipients: Vec<i64> = (0..4)
            .map(|i| ledger.create_student(&format!("Recipient{}", i)).unwrap().id)
            .collect();
        (sender.id, recipients)
    };

    let threads = 8;
    let attempts_per_thread = 10;
    let amount = 3;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let barrier = barrier.clone();
            let db_path = db_path.clone();
            let recipient = recipient_ids[t % recipient_ids.len()];
            thread::spawn(move || {
                let mut ledger = Ledger::open(&db_path, &settings(), cfg).unwrap();
                barrier.wait();

                let mut committed = 0i64;
                for _ in 0..attempts_per_thread {
                    match ledger.recognize(sender_id, recipient, amount, None) {
                        Ok(_) => committed += amount,
                        Err(LedgerError::InsufficientCredits { .. })
                        | Err(LedgerError::LimitExceeded { .. })
                        | Err(LedgerError::Conflict { .. }) => {}
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
                committed
            })
        })
        .collect();

    let committed: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    let mut ledger = Ledger::open(&db_path, &settings(), cfg).unwrap();
    let sender = ledger.get_student(sender_id).unwrap();

    // 8 threads x 10 x 3 = 240 attempted, only 100 can ever fit
    assert!(committed <= cfg.monthly_sending_limit);
    assert!(sender.is_consistent(&cfg));
    assert_eq!(sender.monthly_sent, committed);
    assert_eq!(sender.available_credits, cfg.monthly_base_credits - committed);

    let total_received: i64 = recipient_ids
        .iter()
        .map(|id| ledger.get_student(*id).unwrap().received_balance)
        .sum();
    assert_eq!(total_received, committed);

    let recorded: i64 = ledger
        .list_recognitions(RecognitionFilter::sent_by(sender_id))
        .unwrap()
        .iter()
        .map(|e| e.recognition.amount)
        .sum();
    assert_eq!(recorded, committed);
}

#[test]
fn test_concurrent_duplicate_endorsements_commit_once() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ledger.db");
    let cfg = LedgerConfig::default();

    let (recognition_id, endorser_id) = {
        let mut ledger = Ledger::open(&db_path, &settings(), cfg).unwrap();
        let a = ledger.create_student("A").unwrap();
        let b = ledger.create_student("B").unwrap();
        let c = ledger.create_student("C").unwrap();
        let rec = ledger.recognize(a.id, b.id, 10, None).unwrap().recognition;
        (rec.id, c.id)
    };

    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let barrier = barrier.clone();
            let db_path = db_path.clone();
            thread::spawn(move || {
                let mut ledger = Ledger::open(&db_path, &settings(), cfg).unwrap();
                barrier.wait();
                match ledger.endorse(recognition_id, endorser_id) {
                    Ok(_) => 1,
                    Err(LedgerError::DuplicateEndorsement { .. })
                    | Err(LedgerError::Conflict { .. }) => 0,
                    Err(other) => panic!("unexpected error: {other}"),
                }
            })
        })
        .collect();

    let successes: i32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(successes, 1);

    let mut ledger = Ledger::open(&db_path, &settings(), cfg).unwrap();
    assert_eq!(ledger.get_recognition(recognition_id).unwrap().endorsements, 1);
}

#[test]
fn test_concurrent_redemptions_never_overdraw_balance() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ledger.db");
    let cfg = LedgerConfig::default();

    let student_id = {
        let mut ledger = Ledger::open(&db_path, &settings(), cfg).unwrap();
        let a = ledger.create_student("A").unwrap();
        let b = ledger.create_student("B").unwrap();
        ledger.recognize(a.id, b.id, 50, None).unwrap();
        b.id
    };

    let threads = 5;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let barrier = barrier.clone();
            let db_path = db_path.clone();
            thread::spawn(move || {
                let mut ledger = Ledger::open(&db_path, &settings(), cfg).unwrap();
                barrier.wait();
                let mut redeemed = 0i64;
                for _ in 0..5 {
                    match ledger.redeem(student_id, 4) {
                        Ok(r) => redeemed += r.amount,
                        Err(LedgerError::InsufficientBalance { .. })
                        | Err(LedgerError::Conflict { .. }) => {}
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
                redeemed
            })
        })
        .collect();

    let redeemed: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    let mut ledger = Ledger::open(&db_path, &settings(), cfg).unwrap();
    let student = ledger.get_student(student_id).unwrap();
    assert!(redeemed <= 50);
    assert!(student.is_consistent(&cfg));
    assert_eq!(student.received_balance, 50 - redeemed);

    let vouchers: i64 = ledger
        .redemptions_for(student_id)
        .unwrap()
        .iter()
        .map(|r| r.voucher_value)
        .sum();
    assert_eq!(vouchers, redeemed * cfg.redemption_rate);
}

#[test]
fn test_recognition_blocked_by_held_lock_reports_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ledger.db");
    let cfg = LedgerConfig::default();
    let impatient = DatabaseConfig {
        path: String::new(),
        busy_timeout_ms: 0,
        max_conflict_retries: 2,
    };

    let mut ledger = Ledger::open(&db_path, &impatient, cfg).unwrap();
    let a = ledger.create_student("A").unwrap();
    let b = ledger.create_student("B").unwrap();

    let blocker = rusqlite::Connection::open(&db_path).unwrap();
    blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

    let err = ledger.recognize(a.id, b.id, 10, None).unwrap_err();
    assert!(matches!(err, LedgerError::Conflict { attempts: 3 }));
    assert!(err.is_retryable());
    assert_eq!(err.status_code(), 503);

    blocker.execute_batch("ROLLBACK").unwrap();

    let sender = ledger.get_student(a.id).unwrap();
    assert_eq!(sender.available_credits, 100);
    assert_eq!(sender.monthly_sent, 0);
    assert_eq!(ledger.get_student(b.id).unwrap().received_balance, 0);
    assert!(ledger
        .list_recognitions(RecognitionFilter::sent_by(a.id))
        .unwrap()
        .is_empty());
}
