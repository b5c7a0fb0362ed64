use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{parse_id, AppError};

/// `POST /cart`
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub user_id: String,
    pub item_id: String,
    pub quantity: i64,
}

/// Checked form of [`AddToCartRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct AddToCart {
    pub user_id: String,
    pub item_id: Uuid,
    pub quantity: i32,
}

impl TryFrom<AddToCartRequest> for AddToCart {
    type Error = AppError;

    fn try_from(req: AddToCartRequest) -> Result<Self, Self::Error> {
        let user_id = req.user_id.trim().to_string();
        if user_id.is_empty() {
            return Err(AppError::Validation("User ID required".into()));
        }
        let item_id = parse_id(&req.item_id, "item")?;
        let quantity = i32::try_from(req.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| AppError::Validation("quantity must be a positive integer".into()))?;
        Ok(Self {
            user_id,
            item_id,
            quantity,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub cart_id: Uuid,
    pub item_id: Uuid,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub user_id: String,
    pub items: Vec<CartLineView>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub item_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(user_id: &str, item_id: &str, quantity: i64) -> AddToCartRequest {
        AddToCartRequest {
            user_id: user_id.into(),
            item_id: item_id.into(),
            quantity,
        }
    }

    #[test]
    fn accepts_well_formed_request() {
        let id = Uuid::new_v4();
        let add = AddToCart::try_from(req(" u1 ", &id.to_string(), 3)).unwrap();
        assert_eq!(
            add,
            AddToCart {
                user_id: "u1".into(),
                item_id: id,
                quantity: 3
            }
        );
    }

    #[test]
    fn rejects_bad_fields() {
        let id = Uuid::new_v4().to_string();
        assert!(AddToCart::try_from(req("", &id, 1)).is_err());
        assert!(AddToCart::try_from(req("u1", "abc", 1)).is_err());
        assert!(AddToCart::try_from(req("u1", &id, 0)).is_err());
        assert!(AddToCart::try_from(req("u1", &id, -2)).is_err());
        assert!(AddToCart::try_from(req("u1", &id, i64::from(i32::MAX) + 1)).is_err());
    }
}
