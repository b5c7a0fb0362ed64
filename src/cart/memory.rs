use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::CartStore;
use super::repo_types::CartLine;

#[derive(Default)]
pub struct MemoryCartStore {
    lines: RwLock<Vec<CartLine>>,
}

impl MemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn add_or_merge(
        &self,
        user_id: &str,
        item_id: Uuid,
        quantity: i32,
    ) -> anyhow::Result<CartLine> {
        anyhow::ensure!(quantity > 0, "cart quantity must be positive, got {quantity}");

        let mut lines = self.lines.write().await;
        if let Some(line) = lines
            .iter_mut()
            .find(|l| l.user_id == user_id && l.item_id == item_id)
        {
            line.quantity = line
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| anyhow::anyhow!("cart quantity overflow"))?;
            return Ok(line.clone());
        }

        let line = CartLine {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            item_id,
            quantity,
            added_at: OffsetDateTime::now_utc(),
        };
        lines.push(line.clone());
        Ok(line)
    }

    async fn find(&self, user_id: &str, item_id: Uuid) -> anyhow::Result<Option<CartLine>> {
        let lines = self.lines.read().await;
        Ok(lines
            .iter()
            .find(|l| l.user_id == user_id && l.item_id == item_id)
            .cloned())
    }

    async fn list_by_user(&self, user_id: &str) -> anyhow::Result<Vec<CartLine>> {
        let lines = self.lines.read().await;
        Ok(lines.iter().filter(|l| l.user_id == user_id).cloned().collect())
    }

    async fn remove_one(&self, user_id: &str, item_id: Uuid) -> anyhow::Result<bool> {
        let mut lines = self.lines.write().await;
        let before = lines.len();
        lines.retain(|l| !(l.user_id == user_id && l.item_id == item_id));
        Ok(lines.len() < before)
    }

    async fn clear(&self, user_id: &str) -> anyhow::Result<u64> {
        let mut lines = self.lines.write().await;
        let before = lines.len();
        lines.retain(|l| l.user_id != user_id);
        Ok((before - lines.len()) as u64)
    }
}
