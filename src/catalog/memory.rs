use std::collections::BTreeSet;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::CatalogStore;
use super::repo_types::{Item, ItemFilter, ItemPatch, NewItem, StockChange};

/// Catalog kept in process memory, in insertion order.
#[derive(Default)]
pub struct MemoryCatalogStore {
    items: RwLock<Vec<Item>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Item>> {
        let items = self.items.read().await;
        Ok(items.iter().find(|i| i.id == id).cloned())
    }

    async fn search(&self, filter: &ItemFilter) -> anyhow::Result<Vec<Item>> {
        let items = self.items.read().await;
        Ok(items.iter().filter(|i| filter.matches(i)).cloned().collect())
    }

    async fn distinct_categories(&self) -> anyhow::Result<Vec<String>> {
        let items = self.items.read().await;
        let set: BTreeSet<String> = items.iter().map(|i| i.category.clone()).collect();
        Ok(set.into_iter().collect())
    }

    async fn decrement_stock(&self, id: Uuid, amount: i32) -> anyhow::Result<StockChange> {
        anyhow::ensure!(amount > 0, "decrement amount must be positive, got {amount}");

        let mut items = self.items.write().await;
        let Some(item) = items.iter_mut().find(|i| i.id == id) else {
            return Ok(StockChange::Missing);
        };
        if item.stock < amount {
            return Ok(StockChange::Insufficient {
                available: item.stock,
            });
        }
        item.stock -= amount;
        Ok(StockChange::Applied {
            remaining: item.stock,
        })
    }

    async fn restock(&self, id: Uuid, amount: i32) -> anyhow::Result<StockChange> {
        anyhow::ensure!(amount > 0, "restock amount must be positive, got {amount}");

        let mut items = self.items.write().await;
        let Some(item) = items.iter_mut().find(|i| i.id == id) else {
            return Ok(StockChange::Missing);
        };
        item.stock = item
            .stock
            .checked_add(amount)
            .ok_or_else(|| anyhow::anyhow!("stock overflow for item {id}"))?;
        Ok(StockChange::Applied {
            remaining: item.stock,
        })
    }

    async fn create(&self, item: NewItem) -> anyhow::Result<Item> {
        let created = Item {
            id: Uuid::new_v4(),
            name: item.name,
            category: item.category,
            price: item.price,
            stock: item.stock,
            description: item.description,
            created_at: OffsetDateTime::now_utc(),
        };
        self.items.write().await.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, patch: ItemPatch) -> anyhow::Result<Option<Item>> {
        let mut items = self.items.write().await;
        let Some(item) = items.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        patch.apply(item);
        Ok(Some(item.clone()))
    }

    async fn count(&self) -> anyhow::Result<i64> {
        Ok(self.items.read().await.len() as i64)
    }
}
