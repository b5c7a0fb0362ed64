use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::OrderStore;
use super::repo_types::Order;

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<Vec<Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> anyhow::Result<Uuid> {
        let mut orders = self.orders.write().await;
        anyhow::ensure!(
            orders.iter().all(|o| o.id != order.id),
            "duplicate order id {}",
            order.id
        );
        orders.push(order.clone());
        Ok(order.id)
    }

    async fn list_by_user(&self, user_id: &str) -> anyhow::Result<Vec<Order>> {
        let orders = self.orders.read().await;
        // Newest insert first, so equal timestamps still list latest first.
        let mut mine: Vec<Order> = orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(mine)
    }

    async fn find_by_user_and_id(
        &self,
        user_id: &str,
        order_id: Uuid,
    ) -> anyhow::Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .find(|o| o.id == order_id && o.user_id == user_id)
            .cloned())
    }
}
