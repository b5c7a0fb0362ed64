//! Final write step of checkout: take stock, store the order, empty the cart.
//!
//! Either all three happen or none do. Postgres gets this from one
//! transaction; other store combinations get it by compensation, ordered so
//! that no failure leaves both a stored order and a full cart.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use super::repo::{insert_order_tx, OrderStore};
use super::repo_types::{Order, OrderLine};
use crate::cart::{repo::clear_cart_tx, repo::CartStore, repo_types::CartLine};
use crate::catalog::{repo::decrement_stock_tx, repo::CatalogStore, repo_types::StockChange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Placed,
    /// A decrement was refused; nothing was written.
    Refused { item_id: Uuid, change: StockChange },
}

#[async_trait]
pub trait CheckoutCommit: Send + Sync {
    /// `cart` is the user's cart as read under the user lock; `order.items` was built from it.
    async fn commit(&self, order: &Order, cart: &[CartLine]) -> anyhow::Result<CommitOutcome>;
}

#[derive(Clone)]
pub struct PgCheckoutCommit {
    db: PgPool,
}

impl PgCheckoutCommit {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CheckoutCommit for PgCheckoutCommit {
    async fn commit(&self, order: &Order, _cart: &[CartLine]) -> anyhow::Result<CommitOutcome> {
        let mut tx = self.db.begin().await.context("begin checkout")?;

        for line in &order.items {
            match decrement_stock_tx(&mut tx, line.item_id, line.quantity).await? {
                StockChange::Applied { .. } => {}
                change => {
                    tx.rollback().await.context("rollback checkout")?;
                    return Ok(CommitOutcome::Refused {
                        item_id: line.item_id,
                        change,
                    });
                }
            }
        }
        insert_order_tx(&mut tx, order).await?;
        clear_cart_tx(&mut tx, &order.user_id).await?;

        tx.commit().await.context("commit checkout")?;
        Ok(CommitOutcome::Placed)
    }
}

/// Commit over independent stores, undoing earlier steps when a later one fails.
///
/// Order of steps: decrements, cart clear, order insert. A failed clear puts
/// the stock back; a failed insert puts the stock back and refills the cart.
pub struct CompensatingCommit {
    catalog: Arc<dyn CatalogStore>,
    carts: Arc<dyn CartStore>,
    orders: Arc<dyn OrderStore>,
}

impl CompensatingCommit {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        carts: Arc<dyn CartStore>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            catalog,
            carts,
            orders,
        }
    }

    /// Undo decrements of an aborted attempt, newest first.
    async fn restore_stock(&self, applied: &[&OrderLine]) {
        for line in applied.iter().rev() {
            match self.catalog.restock(line.item_id, line.quantity).await {
                Ok(StockChange::Applied { remaining }) => {
                    info!(item_id = %line.item_id, restored = line.quantity, remaining, "stock restored");
                }
                Ok(other) => {
                    error!(item_id = %line.item_id, outcome = ?other, "stock restore found no item");
                }
                Err(e) => {
                    error!(item_id = %line.item_id, quantity = line.quantity, error = %e, "stock restore failed");
                }
            }
        }
    }

    async fn refill_cart(&self, user_id: &str, cart: &[CartLine]) {
        for line in cart {
            if let Err(e) = self.carts.add_or_merge(user_id, line.item_id, line.quantity).await {
                error!(user_id, item_id = %line.item_id, quantity = line.quantity, error = %e, "cart refill failed");
            }
        }
    }
}

#[async_trait]
impl CheckoutCommit for CompensatingCommit {
    async fn commit(&self, order: &Order, cart: &[CartLine]) -> anyhow::Result<CommitOutcome> {
        let mut applied: Vec<&OrderLine> = Vec::with_capacity(order.items.len());
        for line in &order.items {
            match self.catalog.decrement_stock(line.item_id, line.quantity).await {
                Ok(StockChange::Applied { .. }) => applied.push(line),
                Ok(change) => {
                    self.restore_stock(&applied).await;
                    return Ok(CommitOutcome::Refused {
                        item_id: line.item_id,
                        change,
                    });
                }
                Err(e) => {
                    self.restore_stock(&applied).await;
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.carts.clear(&order.user_id).await {
            self.restore_stock(&applied).await;
            return Err(e.context("clear cart at checkout"));
        }

        if let Err(e) = self.orders.insert(order).await {
            self.restore_stock(&applied).await;
            self.refill_cart(&order.user_id, cart).await;
            return Err(e);
        }

        Ok(CommitOutcome::Placed)
    }
}
