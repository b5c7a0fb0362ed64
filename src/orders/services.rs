//! Checkout: turn a user's cart into an order.
//!
//! Runs under the user's lock. The validation pass reads every line and its
//! item without mutating anything; the commit step then takes the stock,
//! stores the order and empties the cart as one unit. On any failure the
//! cart, the stock and the order history are left as they were.

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::commit::CommitOutcome;
use super::repo_types::{Order, OrderLine};
use crate::{catalog::repo_types::StockChange, error::AppError, state::AppState};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Item {item_id} in cart no longer exists")]
    ItemNotFound { item_id: Uuid },

    #[error("Insufficient stock for {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: String,
        item_id: Uuid,
        available: i32,
        requested: i32,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<CheckoutError> for AppError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::EmptyCart => AppError::EmptyCart,
            CheckoutError::ItemNotFound { .. } => AppError::NotFound(e.to_string()),
            CheckoutError::InsufficientStock { .. } => AppError::InsufficientStock(e.to_string()),
            CheckoutError::Storage(inner) => AppError::Internal(inner),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub delivery_address: String,
    pub contact_phone: String,
}

pub async fn checkout(st: &AppState, req: CheckoutRequest) -> Result<Order, CheckoutError> {
    let _guard = st.user_locks.acquire(&req.user_id).await;

    let cart = st.carts.list_by_user(&req.user_id).await?;
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mut lines = Vec::with_capacity(cart.len());
    for cart_line in &cart {
        let item = st
            .catalog
            .find_by_id(cart_line.item_id)
            .await?
            .ok_or(CheckoutError::ItemNotFound {
                item_id: cart_line.item_id,
            })?;
        if item.stock < cart_line.quantity {
            warn!(
                user_id = %req.user_id,
                item_id = %item.id,
                stock = item.stock,
                requested = cart_line.quantity,
                "checkout refused: insufficient stock"
            );
            return Err(CheckoutError::InsufficientStock {
                item: item.name,
                item_id: item.id,
                available: item.stock,
                requested: cart_line.quantity,
            });
        }
        lines.push(OrderLine::snapshot(&item, cart_line.quantity));
    }

    let order = Order::pending(
        req.user_id.clone(),
        lines,
        req.delivery_address,
        req.contact_phone,
    );

    let outcome = st.checkout.commit(&order, &cart).await.map_err(|e| {
        warn!(user_id = %req.user_id, order_id = %order.id, error = ?e, "checkout commit failed");
        CheckoutError::Storage(e)
    })?;

    if let CommitOutcome::Refused { item_id, change } = outcome {
        let failure = refusal(&order, item_id, change);
        warn!(user_id = %req.user_id, %item_id, error = %failure, "checkout aborted during commit");
        return Err(failure);
    }

    info!(
        user_id = %order.user_id,
        order_id = %order.id,
        lines = order.items.len(),
        total_price = %order.total_price,
        "order placed"
    );
    Ok(order)
}

fn refusal(order: &Order, item_id: Uuid, change: StockChange) -> CheckoutError {
    let line = order.items.iter().find(|l| l.item_id == item_id);
    match (change, line) {
        (StockChange::Insufficient { available }, Some(line)) => CheckoutError::InsufficientStock {
            item: line.name.clone(),
            item_id,
            available,
            requested: line.quantity,
        },
        _ => CheckoutError::ItemNotFound { item_id },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{
        dto::AddToCart, memory::MemoryCartStore, repo::CartStore, repo_types::CartLine,
        services::add_to_cart,
    };
    use crate::catalog::{
        memory::MemoryCatalogStore,
        repo::CatalogStore,
        repo_types::{Item, ItemFilter, ItemPatch, NewItem},
    };
    use crate::orders::repo::OrderStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn new_item(name: &str, cents: i64, stock: i32) -> NewItem {
        NewItem {
            name: name.into(),
            category: "Fruits".into(),
            price: Decimal::new(cents, 2),
            stock,
            description: String::new(),
        }
    }

    fn request(user_id: &str) -> CheckoutRequest {
        CheckoutRequest {
            user_id: user_id.into(),
            delivery_address: "1 Market St".into(),
            contact_phone: "555-0100".into(),
        }
    }

    async fn put_in_cart(state: &AppState, user_id: &str, item_id: Uuid, quantity: i32) {
        add_to_cart(
            state,
            AddToCart {
                user_id: user_id.into(),
                item_id,
                quantity,
            },
        )
        .await
        .expect("add to cart");
    }

    async fn stock_of(state: &AppState, id: Uuid) -> i32 {
        state.catalog.find_by_id(id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn empty_cart_creates_no_order() {
        let state = AppState::fake();
        let err = checkout(&state, request("u1")).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert!(state.orders.list_by_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_checkout_decrements_and_clears() {
        let state = AppState::fake();
        let apples = state.catalog.create(new_item("Apples", 299, 50)).await.unwrap();
        let milk = state.catalog.create(new_item("Milk", 329, 40)).await.unwrap();
        put_in_cart(&state, "u1", apples.id, 5).await;
        put_in_cart(&state, "u1", milk.id, 2).await;

        let order = checkout(&state, request("u1")).await.unwrap();

        assert_eq!(order.total_price, Decimal::new(2153, 2));
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.delivery_address, "1 Market St");
        assert_eq!(stock_of(&state, apples.id).await, 45);
        assert_eq!(stock_of(&state, milk.id).await, 38);
        assert!(state.carts.list_by_user("u1").await.unwrap().is_empty());
        assert_eq!(
            state.orders.find_by_user_and_id("u1", order.id).await.unwrap(),
            Some(order)
        );
    }

    #[tokio::test]
    async fn order_keeps_price_snapshot_after_catalog_edit() {
        let state = AppState::fake();
        let apples = state.catalog.create(new_item("Apples", 299, 50)).await.unwrap();
        put_in_cart(&state, "u1", apples.id, 1).await;
        let order = checkout(&state, request("u1")).await.unwrap();

        state
            .catalog
            .update(
                apples.id,
                ItemPatch {
                    price: Some(Decimal::new(999, 2)),
                    name: Some("Golden Apples".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = state
            .orders
            .find_by_user_and_id("u1", order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.items[0].price, Decimal::new(299, 2));
        assert_eq!(stored.items[0].name, "Apples");
    }

    #[tokio::test]
    async fn insufficient_stock_fails_whole_checkout_without_side_effects() {
        let state = AppState::fake();
        let apples = state.catalog.create(new_item("Apples", 299, 50)).await.unwrap();
        let salmon = state.catalog.create(new_item("Salmon", 1699, 8)).await.unwrap();
        put_in_cart(&state, "u1", apples.id, 5).await;
        put_in_cart(&state, "u1", salmon.id, 6).await;

        // Someone else bought salmon meanwhile.
        state.catalog.decrement_stock(salmon.id, 4).await.unwrap();

        let err = checkout(&state, request("u1")).await.unwrap_err();
        match err {
            CheckoutError::InsufficientStock { item, available, requested, .. } => {
                assert_eq!(item, "Salmon");
                assert_eq!(available, 4);
                assert_eq!(requested, 6);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(stock_of(&state, apples.id).await, 50);
        assert_eq!(state.carts.list_by_user("u1").await.unwrap().len(), 2);
        assert!(state.orders.list_by_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_item_fails_checkout() {
        let state = AppState::fake();
        let ghost = Uuid::new_v4();
        state.carts.add_or_merge("u1", ghost, 1).await.unwrap();

        let err = checkout(&state, request("u1")).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ItemNotFound { item_id } if item_id == ghost));
        assert_eq!(state.carts.list_by_user("u1").await.unwrap().len(), 1);
    }

    /// Catalog whose decrement for one item always reports a sell-out,
    /// standing in for a sale racing in between the two passes.
    struct SoldOutOnCommit {
        inner: MemoryCatalogStore,
        sold_out: std::sync::Mutex<Option<Uuid>>,
    }

    #[async_trait]
    impl CatalogStore for SoldOutOnCommit {
        async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Item>> {
            self.inner.find_by_id(id).await
        }
        async fn search(&self, filter: &ItemFilter) -> anyhow::Result<Vec<Item>> {
            self.inner.search(filter).await
        }
        async fn distinct_categories(&self) -> anyhow::Result<Vec<String>> {
            self.inner.distinct_categories().await
        }
        async fn decrement_stock(&self, id: Uuid, amount: i32) -> anyhow::Result<StockChange> {
            let sold_out = *self.sold_out.lock().unwrap() == Some(id);
            if sold_out {
                return Ok(StockChange::Insufficient { available: 0 });
            }
            self.inner.decrement_stock(id, amount).await
        }
        async fn restock(&self, id: Uuid, amount: i32) -> anyhow::Result<StockChange> {
            self.inner.restock(id, amount).await
        }
        async fn create(&self, item: NewItem) -> anyhow::Result<Item> {
            self.inner.create(item).await
        }
        async fn update(&self, id: Uuid, patch: ItemPatch) -> anyhow::Result<Option<Item>> {
            self.inner.update(id, patch).await
        }
        async fn count(&self) -> anyhow::Result<i64> {
            self.inner.count().await
        }
    }

    #[tokio::test]
    async fn commit_failure_restores_earlier_decrements() {
        let catalog = Arc::new(SoldOutOnCommit {
            inner: MemoryCatalogStore::new(),
            sold_out: std::sync::Mutex::new(None),
        });
        let fake = AppState::fake();
        let state = AppState::from_parts(
            Arc::clone(&fake.config),
            catalog.clone(),
            Arc::clone(&fake.carts),
            Arc::clone(&fake.orders),
        );
        let apples = state.catalog.create(new_item("Apples", 299, 50)).await.unwrap();
        let milk = state.catalog.create(new_item("Milk", 329, 40)).await.unwrap();
        put_in_cart(&state, "u1", apples.id, 5).await;
        put_in_cart(&state, "u1", milk.id, 2).await;
        *catalog.sold_out.lock().unwrap() = Some(milk.id);

        let err = checkout(&state, request("u1")).await.unwrap_err();
        assert!(matches!(err, CheckoutError::InsufficientStock { item_id, .. } if item_id == milk.id));
        assert_eq!(stock_of(&state, apples.id).await, 50);
        assert_eq!(stock_of(&state, milk.id).await, 40);
        assert_eq!(state.carts.list_by_user("u1").await.unwrap().len(), 2);
    }

    struct BrokenOrders;

    #[async_trait]
    impl OrderStore for BrokenOrders {
        async fn insert(&self, _order: &Order) -> anyhow::Result<Uuid> {
            anyhow::bail!("orders table unavailable")
        }
        async fn list_by_user(&self, _user_id: &str) -> anyhow::Result<Vec<Order>> {
            Ok(Vec::new())
        }
        async fn find_by_user_and_id(
            &self,
            _user_id: &str,
            _order_id: Uuid,
        ) -> anyhow::Result<Option<Order>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn order_insert_failure_restores_stock_and_keeps_cart() {
        let fake = AppState::fake();
        let state = AppState::from_parts(
            Arc::clone(&fake.config),
            Arc::clone(&fake.catalog),
            Arc::clone(&fake.carts),
            Arc::new(BrokenOrders),
        );
        let apples = state.catalog.create(new_item("Apples", 299, 50)).await.unwrap();
        put_in_cart(&state, "u1", apples.id, 5).await;

        let err = checkout(&state, request("u1")).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Storage(_)));
        assert!(err.to_string().contains("orders table unavailable"));
        assert_eq!(stock_of(&state, apples.id).await, 50);
        let cart = state.carts.list_by_user("u1").await.unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 5);
    }

    /// Cart store whose `clear` fails while the switch is on.
    struct ClearFails {
        inner: MemoryCartStore,
        failing: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl CartStore for ClearFails {
        async fn add_or_merge(
            &self,
            user_id: &str,
            item_id: Uuid,
            quantity: i32,
        ) -> anyhow::Result<CartLine> {
            self.inner.add_or_merge(user_id, item_id, quantity).await
        }
        async fn find(&self, user_id: &str, item_id: Uuid) -> anyhow::Result<Option<CartLine>> {
            self.inner.find(user_id, item_id).await
        }
        async fn list_by_user(&self, user_id: &str) -> anyhow::Result<Vec<CartLine>> {
            self.inner.list_by_user(user_id).await
        }
        async fn remove_one(&self, user_id: &str, item_id: Uuid) -> anyhow::Result<bool> {
            self.inner.remove_one(user_id, item_id).await
        }
        async fn clear(&self, user_id: &str) -> anyhow::Result<u64> {
            if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                anyhow::bail!("cart_lines table unavailable")
            }
            self.inner.clear(user_id).await
        }
    }

    #[tokio::test]
    async fn cart_clear_failure_places_no_order_and_retry_places_one() {
        let carts = Arc::new(ClearFails {
            inner: MemoryCartStore::new(),
            failing: std::sync::atomic::AtomicBool::new(true),
        });
        let fake = AppState::fake();
        let state = AppState::from_parts(
            Arc::clone(&fake.config),
            Arc::clone(&fake.catalog),
            carts.clone(),
            Arc::clone(&fake.orders),
        );
        let apples = state.catalog.create(new_item("Apples", 299, 50)).await.unwrap();
        put_in_cart(&state, "u1", apples.id, 5).await;

        for _ in 0..2 {
            let err = checkout(&state, request("u1")).await.unwrap_err();
            assert!(matches!(err, CheckoutError::Storage(_)));
        }
        assert!(state.orders.list_by_user("u1").await.unwrap().is_empty());
        assert_eq!(stock_of(&state, apples.id).await, 50);
        assert_eq!(state.carts.list_by_user("u1").await.unwrap().len(), 1);

        carts.failing.store(false, std::sync::atomic::Ordering::SeqCst);
        checkout(&state, request("u1")).await.unwrap();
        assert_eq!(state.orders.list_by_user("u1").await.unwrap().len(), 1);
        assert_eq!(stock_of(&state, apples.id).await, 45);
        assert!(state.carts.list_by_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_checkouts_of_one_cart_place_one_order() {
        let state = Arc::new(AppState::fake());
        let apples = state.catalog.create(new_item("Apples", 299, 50)).await.unwrap();
        put_in_cart(&state, "u1", apples.id, 5).await;

        let a = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { checkout(&state, request("u1")).await })
        };
        let b = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { checkout(&state, request("u1")).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(CheckoutError::EmptyCart))));
        assert_eq!(stock_of(&state, apples.id).await, 45);
        assert_eq!(state.orders.list_by_user("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn competing_users_cannot_drive_stock_negative() {
        let state = Arc::new(AppState::fake());
        let beef = state.catalog.create(new_item("Ground Beef", 1299, 10)).await.unwrap();
        for user in ["a", "b", "c"] {
            put_in_cart(&state, user, beef.id, 4).await;
        }

        let handles: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|user| {
                let state = Arc::clone(&state);
                tokio::spawn(async move { checkout(&state, request(user)).await.is_ok() })
            })
            .collect();
        let mut placed = 0;
        for h in handles {
            if h.await.unwrap() {
                placed += 1;
            }
        }
        assert_eq!(placed, 2);
        assert_eq!(stock_of(&state, beef.id).await, 2);
    }
}
