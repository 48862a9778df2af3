use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use bonus_accrual::models::{Order, OrderStatus, SubmitOutcome, Verdict, WithdrawOutcome};
use bonus_accrual::store::{MemoryOrderStore, OrderStore};
use bonus_accrual::BonusService;

const ORDER_A: &str = "79927398713";
const ORDER_B: &str = "4561261212345467";
const ORDER_C: &str = "18";
const SPEND_ON: &str = "12345678903";

/// Helper to seed a PROCESSED order `minutes` after a fixed start
fn processed(number: &str, owner: &str, accrual: Decimal, minutes: i64) -> Order {
    let t0 = Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap();
    Order {
        status: OrderStatus::Processed,
        accrual,
        ..Order::new(number, owner, t0 + Duration::minutes(minutes))
    }
}

fn setup(orders: Vec<Order>) -> (Arc<MemoryOrderStore>, BonusService) {
    let store = Arc::new(MemoryOrderStore::new());
    for order in orders {
        store.put_order(order).unwrap();
    }
    (store.clone(), BonusService::new(store))
}

#[tokio::test]
async fn qa_tc_withdraw_spends_oldest_order_first() {
    let (store, svc) = setup(vec![
        processed(ORDER_B, "alice", dec!(300), 2),
        processed(ORDER_A, "alice", dec!(500), 1),
    ]);

    let outcome = svc.withdraw("alice", SPEND_ON, dec!(700)).await.unwrap();

    // A (older) is drained completely, B covers the rest
    let WithdrawOutcome::Success(rows) = outcome else {
        panic!("expected success, got {:?}", outcome);
    };
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].order_number, ORDER_A);
    assert_eq!(rows[0].amount, dec!(500));
    assert_eq!(rows[1].order_number, ORDER_B);
    assert_eq!(rows[1].amount, dec!(200));
    assert!(rows.iter().all(|r| r.withdrawal_ref == SPEND_ON));

    let balance = svc.balance("alice").await.unwrap();
    assert_eq!(balance.current, dec!(100));
    assert_eq!(balance.withdrawn, dec!(700));
    assert_eq!(store.spent_on(ORDER_B).unwrap(), dec!(200));
}

#[tokio::test]
async fn qa_tc_withdraw_over_balance_records_nothing() {
    let (store, svc) = setup(vec![processed(ORDER_A, "alice", dec!(500), 1)]);

    let outcome = svc.withdraw("alice", SPEND_ON, dec!(600)).await.unwrap();
    assert_eq!(
        outcome,
        WithdrawOutcome::InsufficientFunds {
            available: dec!(500),
            requested: dec!(600),
        }
    );
    assert_eq!(store.writeoff_count().unwrap(), 0);

    let balance = svc.balance("alice").await.unwrap();
    assert_eq!(balance.current, dec!(500));
    assert_eq!(balance.withdrawn, Decimal::ZERO);
}

#[tokio::test]
async fn qa_tc_other_users_points_are_not_spendable() {
    let (_, svc) = setup(vec![
        processed(ORDER_A, "alice", dec!(500), 1),
        processed(ORDER_B, "bob", dec!(300), 2),
    ]);

    let outcome = svc.withdraw("bob", SPEND_ON, dec!(400)).await.unwrap();
    assert!(matches!(outcome, WithdrawOutcome::InsufficientFunds { .. }));
    assert_eq!(svc.balance("alice").await.unwrap().current, dec!(500));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn qa_tc_concurrent_overcommit_single_success() {
    let (store, svc) = setup(vec![processed(ORDER_A, "alice", dec!(500), 1)]);

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let svc = svc.clone();
            tokio::spawn(async move { svc.withdraw("alice", SPEND_ON, dec!(400)).await })
        })
        .collect();

    let mut successes = 0;
    for task in tasks {
        if let WithdrawOutcome::Success(_) = task.await.unwrap().unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1, "exactly one over-committing withdrawal may win");
    assert_eq!(store.writeoff_count().unwrap(), 1);
    assert_eq!(svc.balance("alice").await.unwrap().current, dec!(100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn qa_tc_balance_never_negative_under_load() {
    let (store, svc) = setup(vec![
        processed(ORDER_A, "alice", dec!(250), 1),
        processed(ORDER_B, "alice", dec!(150.50), 2),
        processed(ORDER_C, "alice", dec!(99.50), 3),
    ]);

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let svc = svc.clone();
            tokio::spawn(async move { svc.withdraw("alice", SPEND_ON, dec!(30)).await })
        })
        .collect();

    let mut successes = 0u32;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            WithdrawOutcome::Success(_) => successes += 1,
            WithdrawOutcome::InsufficientFunds { .. } => {}
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    // 500 points cover 16 withdrawals of 30
    assert_eq!(successes, 16);
    let balance = svc.balance("alice").await.unwrap();
    assert_eq!(balance.current, dec!(20));
    assert_eq!(balance.withdrawn, dec!(480));

    // No order is overdrawn
    assert!(store.spent_on(ORDER_A).unwrap() <= dec!(250));
    assert!(store.spent_on(ORDER_B).unwrap() <= dec!(150.50));
    assert!(store.spent_on(ORDER_C).unwrap() <= dec!(99.50));
}

#[tokio::test]
async fn qa_tc_verdict_applied_twice_is_idempotent() {
    let store = Arc::new(MemoryOrderStore::new());
    let svc = BonusService::new(store.clone());
    assert_eq!(
        svc.submit_order("alice", ORDER_A).await.unwrap(),
        SubmitOutcome::Accepted
    );

    let verdict = Verdict::new(ORDER_A, OrderStatus::Processed, dec!(42));
    store.apply_verdict(&verdict).await.unwrap();
    let once = svc.balance("alice").await.unwrap();
    store.apply_verdict(&verdict).await.unwrap();
    let twice = svc.balance("alice").await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(twice.current, dec!(42));
}

#[tokio::test]
async fn qa_tc_new_order_not_spendable_until_processed() {
    let store = Arc::new(MemoryOrderStore::new());
    let svc = BonusService::new(store.clone());
    svc.submit_order("alice", ORDER_A).await.unwrap();

    for status in [OrderStatus::Registered, OrderStatus::Processing] {
        store
            .apply_verdict(&Verdict::new(ORDER_A, status, dec!(10)))
            .await
            .unwrap();
        let outcome = svc.withdraw("alice", SPEND_ON, dec!(1)).await.unwrap();
        assert!(matches!(outcome, WithdrawOutcome::InsufficientFunds { .. }));
    }

    store
        .apply_verdict(&Verdict::new(ORDER_A, OrderStatus::Processed, dec!(10)))
        .await
        .unwrap();
    let outcome = svc.withdraw("alice", SPEND_ON, dec!(10)).await.unwrap();
    assert!(matches!(outcome, WithdrawOutcome::Success(_)));
    assert_eq!(svc.balance("alice").await.unwrap().current, Decimal::ZERO);
}

#[tokio::test]
async fn qa_tc_invalid_order_never_contributes() {
    let store = Arc::new(MemoryOrderStore::new());
    let svc = BonusService::new(store.clone());
    svc.submit_order("alice", ORDER_A).await.unwrap();

    store
        .apply_verdict(&Verdict::new(ORDER_A, OrderStatus::Invalid, Decimal::ZERO))
        .await
        .unwrap();
    // Terminal: a late PROCESSED verdict is ignored
    let written = store
        .apply_verdict(&Verdict::new(ORDER_A, OrderStatus::Processed, dec!(10)))
        .await
        .unwrap();
    assert!(!written);

    let orders = svc.list_orders("alice").await.unwrap();
    assert_eq!(orders[0].status, OrderStatus::Invalid);
    assert_eq!(svc.balance("alice").await.unwrap().current, Decimal::ZERO);
}
