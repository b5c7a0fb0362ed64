use anyhow::Context;
use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::CartLine;

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Insert a line, or add `quantity` to the existing line for the same (user, item).
    async fn add_or_merge(
        &self,
        user_id: &str,
        item_id: Uuid,
        quantity: i32,
    ) -> anyhow::Result<CartLine>;

    async fn find(&self, user_id: &str, item_id: Uuid) -> anyhow::Result<Option<CartLine>>;

    /// Lines of one user, oldest first.
    async fn list_by_user(&self, user_id: &str) -> anyhow::Result<Vec<CartLine>>;

    /// Returns whether a line was removed.
    async fn remove_one(&self, user_id: &str, item_id: Uuid) -> anyhow::Result<bool>;

    /// Drop every line of the user. Idempotent; returns the number removed.
    async fn clear(&self, user_id: &str) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgCartStore {
    db: PgPool,
}

impl PgCartStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Drop every cart line of the user within a transaction.
pub async fn clear_cart_tx(tx: &mut Transaction<'_, Postgres>, user_id: &str) -> anyhow::Result<u64> {
    let res = tx
        .execute(sqlx::query("DELETE FROM cart_lines WHERE user_id = $1").bind(user_id))
        .await
        .context("clear cart")?;
    Ok(res.rows_affected())
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn add_or_merge(
        &self,
        user_id: &str,
        item_id: Uuid,
        quantity: i32,
    ) -> anyhow::Result<CartLine> {
        anyhow::ensure!(quantity > 0, "cart quantity must be positive, got {quantity}");

        let line = sqlx::query_as::<_, CartLine>(
            r#"
            INSERT INTO cart_lines (id, user_id, item_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, item_id)
            DO UPDATE SET quantity = cart_lines.quantity + EXCLUDED.quantity
            RETURNING id, user_id, item_id, quantity, added_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(item_id)
        .bind(quantity)
        .fetch_one(&self.db)
        .await
        .context("upsert cart line")?;
        Ok(line)
    }

    async fn find(&self, user_id: &str, item_id: Uuid) -> anyhow::Result<Option<CartLine>> {
        let line = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT id, user_id, item_id, quantity, added_at
              FROM cart_lines
             WHERE user_id = $1 AND item_id = $2
            "#,
        )
        .bind(user_id)
        .bind(item_id)
        .fetch_optional(&self.db)
        .await
        .context("find cart line")?;
        Ok(line)
    }

    async fn list_by_user(&self, user_id: &str) -> anyhow::Result<Vec<CartLine>> {
        let rows = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT id, user_id, item_id, quantity, added_at
              FROM cart_lines
             WHERE user_id = $1
             ORDER BY added_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list cart lines")?;
        Ok(rows)
    }

    async fn remove_one(&self, user_id: &str, item_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM cart_lines WHERE user_id = $1 AND item_id = $2")
            .bind(user_id)
            .bind(item_id)
            .execute(&self.db)
            .await
            .context("delete cart line")?;
        Ok(res.rows_affected() > 0)
    }

    async fn clear(&self, user_id: &str) -> anyhow::Result<u64> {
        let mut tx = self.db.begin().await.context("begin clear cart")?;
        let removed = clear_cart_tx(&mut tx, user_id).await?;
        tx.commit().await.context("commit clear cart")?;
        Ok(removed)
    }
}
