use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::catalog::repo_types::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            other => anyhow::bail!("unknown order status {other:?}"),
        }
    }
}

/// Item fields copied into the order at checkout time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: Uuid,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
}

impl OrderLine {
    pub fn snapshot(item: &Item, quantity: i32) -> Self {
        Self {
            item_id: item.id,
            name: item.name.clone(),
            price: item.price,
            quantity,
            subtotal: item.price * Decimal::from(quantity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub items: Vec<OrderLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub status: OrderStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub order_date: OffsetDateTime,
    pub delivery_address: String,
    pub contact_phone: String,
}

impl Order {
    /// New pending order; the total is the sum of line subtotals rounded to cents.
    pub fn pending(
        user_id: String,
        items: Vec<OrderLine>,
        delivery_address: String,
        contact_phone: String,
    ) -> Self {
        let total_price = items
            .iter()
            .map(|l| l.subtotal)
            .sum::<Decimal>()
            .round_dp(2);
        Self {
            id: Uuid::new_v4(),
            user_id,
            items,
            total_price,
            status: OrderStatus::Pending,
            order_date: OffsetDateTime::now_utc(),
            delivery_address,
            contact_phone,
        }
    }
}

/// Order line as kept in the `orders.items` JSONB column. Amounts are strings
/// so the snapshot keeps full decimal precision.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredOrderLine {
    pub item_id: Uuid,
    pub name: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::str")]
    pub subtotal: Decimal,
}

impl From<&OrderLine> for StoredOrderLine {
    fn from(l: &OrderLine) -> Self {
        Self {
            item_id: l.item_id,
            name: l.name.clone(),
            price: l.price,
            quantity: l.quantity,
            subtotal: l.subtotal,
        }
    }
}

impl From<StoredOrderLine> for OrderLine {
    fn from(l: StoredOrderLine) -> Self {
        Self {
            item_id: l.item_id,
            name: l.name,
            price: l.price,
            quantity: l.quantity,
            subtotal: l.subtotal,
        }
    }
}

pub fn stored_lines(items: &[OrderLine]) -> Json<Vec<StoredOrderLine>> {
    Json(items.iter().map(StoredOrderLine::from).collect())
}

#[derive(Debug, FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: String,
    pub items: Json<Vec<StoredOrderLine>>,
    pub total_price: Decimal,
    pub status: String,
    pub order_date: OffsetDateTime,
    pub delivery_address: String,
    pub contact_phone: String,
}

impl TryFrom<OrderRow> for Order {
    type Error = anyhow::Error;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            items: r.items.0.into_iter().map(OrderLine::from).collect(),
            total_price: r.total_price,
            status: r.status.parse()?,
            order_date: r.order_date,
            delivery_address: r.delivery_address,
            contact_phone: r.contact_phone,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(cents: i64) -> Item {
        Item {
            id: Uuid::new_v4(),
            name: "Apples".into(),
            category: "Fruits".into(),
            price: Decimal::new(cents, 2),
            stock: 50,
            description: String::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn snapshot_computes_subtotal() {
        let line = OrderLine::snapshot(&item(299), 5);
        assert_eq!(line.subtotal, Decimal::new(1495, 2));
        assert_eq!(line.name, "Apples");
    }

    #[test]
    fn pending_order_totals_and_rounds() {
        let mut odd = item(0);
        odd.price = Decimal::new(3333, 3); // 3.333
        let order = Order::pending(
            "u1".into(),
            vec![OrderLine::snapshot(&item(299), 5), OrderLine::snapshot(&odd, 1)],
            String::new(),
            String::new(),
        );
        assert_eq!(order.total_price, Decimal::new(1828, 2));
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn stored_lines_keep_full_precision() {
        let mut fine = item(0);
        fine.price = "0.1234567890123456789".parse().unwrap();
        let lines = vec![OrderLine::snapshot(&fine, 3)];

        let json = serde_json::to_string(&stored_lines(&lines)).unwrap();
        let back: Vec<StoredOrderLine> = serde_json::from_str(&json).unwrap();
        let back: Vec<OrderLine> = back.into_iter().map(OrderLine::from).collect();

        assert_eq!(back, lines);
        assert_eq!(back[0].subtotal, "0.3703703670370370367".parse::<Decimal>().unwrap());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&OrderStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!("pending".parse::<OrderStatus>().unwrap(), OrderStatus::Pending);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
