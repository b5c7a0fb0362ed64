use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{Item, ItemFilter, ItemPatch, NewItem, StockChange};

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Item>>;

    async fn search(&self, filter: &ItemFilter) -> anyhow::Result<Vec<Item>>;

    /// Distinct categories, sorted.
    async fn distinct_categories(&self) -> anyhow::Result<Vec<String>>;

    /// Take `amount` units out of stock only if at least that many are available.
    async fn decrement_stock(&self, id: Uuid, amount: i32) -> anyhow::Result<StockChange>;

    /// Put `amount` units back; used to undo a decrement.
    async fn restock(&self, id: Uuid, amount: i32) -> anyhow::Result<StockChange>;

    async fn create(&self, item: NewItem) -> anyhow::Result<Item>;

    /// Returns `None` when no item has this id.
    async fn update(&self, id: Uuid, patch: ItemPatch) -> anyhow::Result<Option<Item>>;

    async fn count(&self) -> anyhow::Result<i64>;
}

#[derive(Clone)]
pub struct PgCatalogStore {
    db: PgPool,
}

impl PgCatalogStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const ITEM_COLUMNS: &str = "id, name, category, price, stock, description, created_at";

/// Escape LIKE metacharacters so user input is matched literally.
fn like_pattern(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('%');
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

/// Conditional decrement within a transaction. A refused decrement writes nothing.
pub async fn decrement_stock_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    amount: i32,
) -> anyhow::Result<StockChange> {
    anyhow::ensure!(amount > 0, "decrement amount must be positive, got {amount}");

    let remaining = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE items
           SET stock = stock - $2
         WHERE id = $1 AND stock >= $2
        RETURNING stock
        "#,
    )
    .bind(id)
    .bind(amount)
    .fetch_optional(&mut **tx)
    .await
    .context("decrement stock")?;

    if let Some(remaining) = remaining {
        return Ok(StockChange::Applied { remaining });
    }

    let available = sqlx::query_scalar::<_, i32>("SELECT stock FROM items WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .context("read stock after refused decrement")?;
    Ok(match available {
        Some(available) => StockChange::Insufficient { available },
        None => StockChange::Missing,
    })
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find item by id")?;
        Ok(item)
    }

    async fn search(&self, filter: &ItemFilter) -> anyhow::Result<Vec<Item>> {
        let rows = sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
              FROM items
             WHERE ($1::text IS NULL OR category ILIKE $1)
               AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2)
             ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(filter.category.as_deref().map(like_pattern))
        .bind(filter.text.as_deref().map(like_pattern))
        .fetch_all(&self.db)
        .await
        .context("search items")?;
        Ok(rows)
    }

    async fn distinct_categories(&self) -> anyhow::Result<Vec<String>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM items ORDER BY category",
        )
        .fetch_all(&self.db)
        .await
        .context("list categories")?;
        Ok(rows)
    }

    async fn decrement_stock(&self, id: Uuid, amount: i32) -> anyhow::Result<StockChange> {
        let mut tx = self.db.begin().await.context("begin decrement")?;
        let change = decrement_stock_tx(&mut tx, id, amount).await?;
        tx.commit().await.context("commit decrement")?;
        Ok(change)
    }

    async fn restock(&self, id: Uuid, amount: i32) -> anyhow::Result<StockChange> {
        anyhow::ensure!(amount > 0, "restock amount must be positive, got {amount}");

        let remaining = sqlx::query_scalar::<_, i32>(
            "UPDATE items SET stock = stock + $2 WHERE id = $1 RETURNING stock",
        )
        .bind(id)
        .bind(amount)
        .fetch_optional(&self.db)
        .await
        .context("restock item")?;
        Ok(remaining.map_or(StockChange::Missing, |remaining| StockChange::Applied {
            remaining,
        }))
    }

    async fn create(&self, item: NewItem) -> anyhow::Result<Item> {
        let created = sqlx::query_as::<_, Item>(&format!(
            r#"
            INSERT INTO items (id, name, category, price, stock, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.price)
        .bind(item.stock)
        .bind(&item.description)
        .fetch_one(&self.db)
        .await
        .context("insert item")?;
        Ok(created)
    }

    async fn update(&self, id: Uuid, patch: ItemPatch) -> anyhow::Result<Option<Item>> {
        let updated = sqlx::query_as::<_, Item>(&format!(
            r#"
            UPDATE items
               SET name        = COALESCE($2, name),
                   category    = COALESCE($3, category),
                   price       = COALESCE($4, price),
                   stock       = COALESCE($5, stock),
                   description = COALESCE($6, description)
             WHERE id = $1
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.name)
        .bind(patch.category)
        .bind(patch.price)
        .bind(patch.stock)
        .bind(patch.description)
        .fetch_optional(&self.db)
        .await
        .context("update item")?;
        Ok(updated)
    }

    async fn count(&self) -> anyhow::Result<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM items")
            .fetch_one(&self.db)
            .await
            .context("count items")?;
        Ok(n)
    }
}
