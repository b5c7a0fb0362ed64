use std::str::FromStr;

use rust_decimal::{prelude::FromPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::repo_types::{Item, ItemFilter, ItemPatch, NewItem};
use crate::error::AppError;

/// `GET /items?category=..&search=..`
#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub category: Option<String>,
    pub search: Option<String>,
}

impl From<ItemQuery> for ItemFilter {
    fn from(q: ItemQuery) -> Self {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            category: non_blank(q.category),
            text: non_blank(q.search),
        }
    }
}

/// `POST /admin/items`. Price and stock accept numbers or numeric strings.
#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<Value>,
    pub stock: Option<Value>,
    pub description: Option<String>,
}

impl CreateItemRequest {
    pub fn into_new_item(self) -> Result<NewItem, AppError> {
        let (Some(name), Some(category), Some(price), Some(stock)) =
            (self.name, self.category, self.price, self.stock)
        else {
            return Err(AppError::Validation("Missing required fields".into()));
        };
        Ok(NewItem {
            name,
            category,
            price: coerce_price(&price)?,
            stock: coerce_stock(&stock)?,
            description: self.description.unwrap_or_default(),
        })
    }
}

/// `PUT /admin/items/:id`; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<Value>,
    pub stock: Option<Value>,
    pub description: Option<String>,
}

impl UpdateItemRequest {
    pub fn into_patch(self) -> Result<ItemPatch, AppError> {
        Ok(ItemPatch {
            name: self.name,
            category: self.category,
            price: self.price.as_ref().map(coerce_price).transpose()?,
            stock: self.stock.as_ref().map(coerce_stock).transpose()?,
            description: self.description,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedItemResponse {
    pub message: String,
    pub item_id: Uuid,
    pub item: Item,
}

fn coerce_price(raw: &Value) -> Result<Decimal, AppError> {
    let invalid = || AppError::Validation("price must be a non-negative number".into());
    let price = match raw {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Value::String(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
        }
        _ => None,
    }
    .ok_or_else(invalid)?;

    if price.is_sign_negative() && !price.is_zero() {
        return Err(invalid());
    }
    Ok(price.normalize())
}

fn coerce_stock(raw: &Value) -> Result<i32, AppError> {
    let invalid = || AppError::Validation("stock must be a non-negative integer".into());
    let stock = match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(invalid)?;

    i32::try_from(stock)
        .ok()
        .filter(|s| *s >= 0)
        .ok_or_else(invalid)
}
