use anyhow::Context;
use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{stored_lines, Order, OrderRow};

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: &Order) -> anyhow::Result<Uuid>;

    /// Orders of one user, newest first.
    async fn list_by_user(&self, user_id: &str) -> anyhow::Result<Vec<Order>>;

    /// Only returns the order if it belongs to `user_id`.
    async fn find_by_user_and_id(
        &self,
        user_id: &str,
        order_id: Uuid,
    ) -> anyhow::Result<Option<Order>>;
}

#[derive(Clone)]
pub struct PgOrderStore {
    db: PgPool,
}

impl PgOrderStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Insert an order within a transaction.
pub async fn insert_order_tx(tx: &mut Transaction<'_, Postgres>, order: &Order) -> anyhow::Result<()> {
    tx.execute(
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, user_id, items, total_price, status, order_date, delivery_address, contact_phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id)
        .bind(&order.user_id)
        .bind(stored_lines(&order.items))
        .bind(order.total_price)
        .bind(order.status.as_str())
        .bind(order.order_date)
        .bind(&order.delivery_address)
        .bind(&order.contact_phone),
    )
    .await
    .context("insert order")?;
    Ok(())
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order) -> anyhow::Result<Uuid> {
        let mut tx = self.db.begin().await.context("begin insert order")?;
        insert_order_tx(&mut tx, order).await?;
        tx.commit().await.context("commit insert order")?;
        Ok(order.id)
    }

    async fn list_by_user(&self, user_id: &str) -> anyhow::Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, items, total_price, status, order_date,
                   delivery_address, contact_phone
              FROM orders
             WHERE user_id = $1
             ORDER BY order_date DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list orders by user")?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn find_by_user_and_id(
        &self,
        user_id: &str,
        order_id: Uuid,
    ) -> anyhow::Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, items, total_price, status, order_date,
                   delivery_address, contact_phone
              FROM orders
             WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("find order")?;
        row.map(Order::try_from).transpose()
    }
}
