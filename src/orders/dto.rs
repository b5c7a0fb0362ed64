use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::services::CheckoutRequest;
use crate::error::AppError;

/// `POST /orders`
#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: Option<String>,
    pub delivery_address: Option<String>,
    pub contact_phone: Option<String>,
}

impl TryFrom<PlaceOrderRequest> for CheckoutRequest {
    type Error = AppError;

    fn try_from(req: PlaceOrderRequest) -> Result<Self, Self::Error> {
        let user_id = req
            .user_id
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::Validation("User ID required".into()))?;
        Ok(Self {
            user_id,
            delivery_address: req.delivery_address.unwrap_or_default(),
            contact_phone: req.contact_phone.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PlaceOrderResponse {
    pub message: String,
    pub order_id: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
}
