//! Integration tests for the order transaction engine over the in-memory store.

use chrono::Duration;
use common::{CustomerId, IdempotencyKey, Money, OrderId, OrderStatus, ProductId};
use domain::{CreateOrder, LineRequest, ORDER_CONFIRM, OrderEngine, OrderError};
use futures_util::future::join_all;
use store::{Database, IdempotencyScope, InMemoryDatabase, OrderQuery, ProductRow, StoreError};

struct TestHarness {
    engine: OrderEngine<InMemoryDatabase>,
    db: InMemoryDatabase,
}

impl TestHarness {
    async fn new() -> Self {
        let db = InMemoryDatabase::new();
        db.put_product(ProductRow::new(ProductId::new(7), Money::from_cents(500), 5))
            .await;
        db.put_product(ProductRow::new(ProductId::new(8), Money::from_cents(1250), 10))
            .await;

        Self {
            engine: OrderEngine::new(db.clone()),
            db,
        }
    }

    async fn stock(&self, id: i64) -> i32 {
        self.db
            .fetch_product(ProductId::new(id))
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    async fn status(&self, id: OrderId) -> OrderStatus {
        self.db.fetch_order(id).await.unwrap().unwrap().status
    }

    async fn create(&self, items: Vec<LineRequest>) -> OrderId {
        self.engine
            .create_order(CreateOrder::new(CustomerId::new(1), items))
            .await
            .unwrap()
            .order
            .id
    }
}

fn key(raw: &str) -> Option<IdempotencyKey> {
    IdempotencyKey::parse(Some(raw))
}

fn body_json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn create_reserves_stock_and_prices_lines() {
    let h = TestHarness::new().await;

    let view = h
        .engine
        .create_order(CreateOrder::new(
            CustomerId::new(1),
            vec![LineRequest::new(7, 2)],
        ))
        .await
        .unwrap();

    assert_eq!(view.order.status, OrderStatus::Created);
    assert_eq!(view.order.total, Money::from_cents(1000));
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].unit_price, Money::from_cents(500));
    assert_eq!(h.stock(7).await, 3);
}

#[tokio::test]
async fn create_total_sums_every_line() {
    let h = TestHarness::new().await;

    let view = h
        .engine
        .create_order(CreateOrder::new(
            CustomerId::new(1),
            vec![LineRequest::new(7, 1), LineRequest::new(8, 3)],
        ))
        .await
        .unwrap();

    assert_eq!(view.order.total, Money::from_cents(500 + 3 * 1250));
    assert_eq!(h.stock(7).await, 4);
    assert_eq!(h.stock(8).await, 7);
}

#[tokio::test]
async fn create_failure_writes_nothing() {
    let h = TestHarness::new().await;

    let err = h
        .engine
        .create_order(CreateOrder::new(
            CustomerId::new(1),
            vec![LineRequest::new(8, 2), LineRequest::new(7, 6)],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::OutOfStock(id) if id == ProductId::new(7)));

    let err = h
        .engine
        .create_order(CreateOrder::new(
            CustomerId::new(1),
            vec![LineRequest::new(8, 2), LineRequest::new(99, 1)],
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_PRODUCT");

    assert_eq!(h.stock(7).await, 5);
    assert_eq!(h.stock(8).await, 10);
    assert!(h.db.list_orders(&OrderQuery::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_with_out_of_range_amount_is_rejected_and_rolled_back() {
    let h = TestHarness::new().await;
    h.db.put_product(ProductRow::new(
        ProductId::new(20),
        Money::from_cents(5_000_000_000_000),
        3_000_000,
    ))
    .await;
    h.db.put_product(ProductRow::new(
        ProductId::new(21),
        Money::from_cents(5_000_000_000_000_000_000),
        5,
    ))
    .await;

    let err = h
        .engine
        .create_order(CreateOrder::new(
            CustomerId::new(1),
            vec![LineRequest::new(7, 1), LineRequest::new(20, 2_000_000)],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::AmountOverflow(id) if id == ProductId::new(20)));
    assert_eq!(err.code(), "VALIDATION");

    // Each subtotal fits, their sum does not.
    let err = h
        .engine
        .create_order(CreateOrder::new(
            CustomerId::new(1),
            vec![LineRequest::new(21, 1), LineRequest::new(21, 1)],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::AmountOverflow(id) if id == ProductId::new(21)));

    assert_eq!(h.stock(7).await, 5);
    assert_eq!(h.stock(20).await, 3_000_000);
    assert_eq!(h.stock(21).await, 5);
    assert!(h.db.list_orders(&OrderQuery::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_validation_happens_before_any_transaction() {
    let h = TestHarness::new().await;
    h.db.set_fail_on_commit(true);

    let err = h
        .engine
        .create_order(CreateOrder::new(CustomerId::new(1), vec![]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");

    let err = h
        .engine
        .create_order(CreateOrder::new(
            CustomerId::new(1),
            vec![LineRequest::new(7, -1)],
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION");
}

#[tokio::test]
async fn concurrent_creates_never_oversell() {
    let h = TestHarness::new().await;

    let attempts = (0..8).map(|_| {
        h.engine.create_order(CreateOrder::new(
            CustomerId::new(1),
            vec![LineRequest::new(7, 2)],
        ))
    });
    let results = join_all(attempts).await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let out_of_stock = results
        .iter()
        .filter(|r| matches!(r, Err(OrderError::OutOfStock(_))))
        .count();

    assert_eq!(succeeded, 2);
    assert_eq!(out_of_stock, 6);
    assert_eq!(h.stock(7).await, 1);
}

#[tokio::test]
async fn confirm_requires_a_key() {
    let h = TestHarness::new().await;
    let order_id = h.create(vec![LineRequest::new(7, 1)]).await;

    let err = h.engine.confirm_order(order_id, None).await.unwrap_err();
    assert!(matches!(err, OrderError::Validation(ref m) if m == "X-Idempotency-Key required"));
    assert_eq!(h.status(order_id).await, OrderStatus::Created);
}

#[tokio::test]
async fn confirm_twice_with_same_key_replays_identical_body() {
    let h = TestHarness::new().await;
    let order_id = h.create(vec![LineRequest::new(7, 2)]).await;

    let first = h.engine.confirm_order(order_id, key("k1")).await.unwrap();
    let second = h.engine.confirm_order(order_id, key("k1")).await.unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.body, second.body);
    assert_eq!(body_json(&first.body)["status"], "CONFIRMED");
    assert!(body_json(&first.body).get("alreadyConfirmed").is_none());
    assert_eq!(h.db.status_write_count(), 1);
}

#[tokio::test]
async fn concurrent_confirms_apply_one_transition() {
    let h = TestHarness::new().await;
    let order_id = h.create(vec![LineRequest::new(7, 1)]).await;

    let attempts = (0..6).map(|_| h.engine.confirm_order(order_id, key("k1")));
    let receipts: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(receipts.iter().filter(|r| !r.replayed).count(), 1);
    assert_eq!(receipts.iter().filter(|r| r.transitioned).count(), 1);
    assert!(receipts.iter().all(|r| r.body == receipts[0].body));
    assert_eq!(h.db.status_write_count(), 1);
}

#[tokio::test]
async fn second_key_on_confirmed_order_reports_already_confirmed() {
    let h = TestHarness::new().await;
    let order_id = h.create(vec![LineRequest::new(7, 1)]).await;

    h.engine.confirm_order(order_id, key("k1")).await.unwrap();
    let other = h.engine.confirm_order(order_id, key("k2")).await.unwrap();
    let again = h.engine.confirm_order(order_id, key("k2")).await.unwrap();

    let json = body_json(&other.body);
    assert_eq!(json["status"], "CONFIRMED");
    assert_eq!(json["alreadyConfirmed"], true);
    assert!(again.replayed);
    assert_eq!(other.body, again.body);
    assert_eq!(h.db.status_write_count(), 1);
}

#[tokio::test]
async fn only_the_committed_transition_is_reported() {
    let h = TestHarness::new().await;
    let order_id = h.create(vec![LineRequest::new(7, 1)]).await;

    h.db.set_fail_on_commit(true);
    let err = h.engine.confirm_order(order_id, key("k1")).await.unwrap_err();
    assert!(err.is_infrastructure());
    assert_eq!(h.status(order_id).await, OrderStatus::Created);

    h.db.set_fail_on_commit(false);
    let first = h.engine.confirm_order(order_id, key("k1")).await.unwrap();
    let replay = h.engine.confirm_order(order_id, key("k1")).await.unwrap();
    let other = h.engine.confirm_order(order_id, key("k2")).await.unwrap();

    assert!(first.transitioned);
    assert!(!replay.transitioned);
    assert!(!other.transitioned);
    assert_eq!(h.status(order_id).await, OrderStatus::Confirmed);
}

#[tokio::test]
async fn replay_returns_frozen_body_after_later_cancel() {
    let h = TestHarness::new().await;
    let order_id = h.create(vec![LineRequest::new(7, 1)]).await;

    let first = h.engine.confirm_order(order_id, key("k1")).await.unwrap();
    h.engine.cancel_order(order_id).await.unwrap();
    let replay = h.engine.confirm_order(order_id, key("k1")).await.unwrap();

    assert_eq!(replay.body, first.body);
    assert_eq!(body_json(&replay.body)["status"], "CONFIRMED");
    assert_eq!(h.status(order_id).await, OrderStatus::Canceled);
}

#[tokio::test]
async fn confirm_on_canceled_order_fails_and_leaves_no_record() {
    let h = TestHarness::new().await;
    let order_id = h.create(vec![LineRequest::new(7, 1)]).await;
    h.engine.cancel_order(order_id).await.unwrap();

    for _ in 0..2 {
        let err = h.engine.confirm_order(order_id, key("k1")).await.unwrap_err();
        assert!(matches!(err, OrderError::OrderCanceled(id) if id == order_id));
    }

    assert_eq!(h.status(order_id).await, OrderStatus::Canceled);
    let scope = IdempotencyScope::new(
        IdempotencyKey::parse(Some("k1")).unwrap(),
        ORDER_CONFIRM,
        order_id.as_i64(),
    );
    assert!(h.db.fetch_idempotency(&scope).await.unwrap().is_none());
}

#[tokio::test]
async fn confirm_unknown_order_is_not_found() {
    let h = TestHarness::new().await;

    let err = h
        .engine
        .confirm_order(OrderId::new(404), key("k1"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn keys_are_scoped_per_order() {
    let h = TestHarness::new().await;
    let first = h.create(vec![LineRequest::new(7, 1)]).await;
    let second = h.create(vec![LineRequest::new(7, 1)]).await;

    let a = h.engine.confirm_order(first, key("shared")).await.unwrap();
    let b = h.engine.confirm_order(second, key("shared")).await.unwrap();

    assert!(!b.replayed);
    assert_ne!(a.body, b.body);
    assert_eq!(h.status(second).await, OrderStatus::Confirmed);
}

#[tokio::test]
async fn cancel_created_order_restores_stock() {
    let h = TestHarness::new().await;
    let order_id = h
        .create(vec![LineRequest::new(7, 2), LineRequest::new(8, 4)])
        .await;
    assert_eq!(h.stock(7).await, 3);

    let canceled = h.engine.cancel_order(order_id).await.unwrap();

    assert_eq!(canceled.status, OrderStatus::Canceled);
    assert_eq!(h.stock(7).await, 5);
    assert_eq!(h.stock(8).await, 10);
}

#[tokio::test]
async fn cancel_confirmed_order_inside_window() {
    let h = TestHarness::new().await;
    let order_id = h.create(vec![LineRequest::new(7, 2)]).await;
    h.engine.confirm_order(order_id, key("k1")).await.unwrap();

    let created_at = h.db.fetch_order(order_id).await.unwrap().unwrap().created_at;
    let canceled = h
        .engine
        .cancel_order_at(order_id, created_at + Duration::minutes(9))
        .await
        .unwrap();

    assert_eq!(canceled.status, OrderStatus::Canceled);
    assert_eq!(h.stock(7).await, 5);
}

#[tokio::test]
async fn cancel_confirmed_order_after_window_is_refused() {
    let h = TestHarness::new().await;
    let order_id = h.create(vec![LineRequest::new(7, 2)]).await;
    h.engine.confirm_order(order_id, key("k1")).await.unwrap();

    let created_at = h.db.fetch_order(order_id).await.unwrap().unwrap().created_at;
    let err = h
        .engine
        .cancel_order_at(order_id, created_at + Duration::minutes(11))
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::CannotCancel { status: OrderStatus::Confirmed, .. }));
    assert_eq!(h.status(order_id).await, OrderStatus::Confirmed);
    assert_eq!(h.stock(7).await, 3);
}

#[tokio::test]
async fn cancel_twice_is_refused() {
    let h = TestHarness::new().await;
    let order_id = h.create(vec![LineRequest::new(7, 2)]).await;

    h.engine.cancel_order(order_id).await.unwrap();
    let err = h.engine.cancel_order(order_id).await.unwrap_err();

    assert_eq!(err.code(), "CANNOT_CANCEL");
    assert_eq!(h.stock(7).await, 5);
}

#[tokio::test]
async fn cancel_unknown_order_is_not_found() {
    let h = TestHarness::new().await;
    let err = h.engine.cancel_order(OrderId::new(9)).await.unwrap_err();
    assert!(matches!(err, OrderError::NotFound(_)));
}

#[tokio::test]
async fn failed_cancel_commit_leaves_no_partial_state() {
    let h = TestHarness::new().await;
    let order_id = h.create(vec![LineRequest::new(7, 2)]).await;

    h.db.set_fail_on_commit(true);
    let err = h.engine.cancel_order(order_id).await.unwrap_err();
    h.db.set_fail_on_commit(false);

    assert!(matches!(err, OrderError::Store(StoreError::CommitFailed(_))));
    assert_eq!(h.status(order_id).await, OrderStatus::Created);
    assert_eq!(h.stock(7).await, 3);
}

#[tokio::test]
async fn cancel_tolerates_deleted_products() {
    let h = TestHarness::new().await;
    let order_id = h
        .create(vec![LineRequest::new(7, 1), LineRequest::new(8, 1)])
        .await;
    h.db.remove_product(ProductId::new(8)).await;

    let canceled = h.engine.cancel_order(order_id).await.unwrap();

    assert_eq!(canceled.status, OrderStatus::Canceled);
    assert_eq!(h.stock(7).await, 5);
}

#[tokio::test]
async fn line_prices_are_snapshots() {
    let h = TestHarness::new().await;
    let order_id = h.create(vec![LineRequest::new(7, 2)]).await;

    h.db.put_product(ProductRow::new(ProductId::new(7), Money::from_cents(9999), 3))
        .await;
    h.engine.confirm_order(order_id, key("k1")).await.unwrap();

    let view = h.engine.get_order(order_id).await.unwrap();
    assert_eq!(view.order.total, Money::from_cents(1000));
    assert_eq!(view.items[0].unit_price, Money::from_cents(500));
}

#[tokio::test]
async fn get_and_list_orders() {
    let h = TestHarness::new().await;
    for _ in 0..3 {
        h.create(vec![LineRequest::new(8, 1)]).await;
    }

    let view = h.engine.get_order(OrderId::new(2)).await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert!(matches!(
        h.engine.get_order(OrderId::new(42)).await,
        Err(OrderError::NotFound(_))
    ));

    let page = h
        .engine
        .list_orders(OrderQuery::new().limit(2))
        .await
        .unwrap();
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.next_cursor, Some(2));

    let rest = h
        .engine
        .list_orders(OrderQuery::new().offset(2).limit(2))
        .await
        .unwrap();
    assert_eq!(rest.data.len(), 1);
    assert_eq!(rest.next_cursor, None);
}
