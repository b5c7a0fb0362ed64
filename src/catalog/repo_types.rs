use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Catalog item record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub stock: i32,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields for a new item; already validated (price and stock non-negative).
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub stock: i32,
    pub description: String,
}

/// Partial update; `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub description: Option<String>,
}

impl ItemPatch {
    pub fn apply(self, item: &mut Item) {
        if let Some(name) = self.name {
            item.name = name;
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(stock) = self.stock {
            item.stock = stock;
        }
        if let Some(description) = self.description {
            item.description = description;
        }
    }
}

/// Search filters. Both are case-insensitive substring matches and combine with AND.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Matched against `category`.
    pub category: Option<String>,
    /// Matched against `name` or `description`.
    pub text: Option<String>,
}

impl ItemFilter {
    pub fn matches(&self, item: &Item) -> bool {
        let category_ok = self
            .category
            .as_deref()
            .map_or(true, |c| contains_ci(&item.category, c));
        let text_ok = self.text.as_deref().map_or(true, |t| {
            contains_ci(&item.name, t) || contains_ci(&item.description, t)
        });
        category_ok && text_ok
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Outcome of a conditional stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChange {
    Applied { remaining: i32 },
    Insufficient { available: i32 },
    Missing,
}
