use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::dto::{AddToCart, CartLineView, CartView};
use super::repo_types::CartLine;
use crate::{error::AppError, state::AppState};

#[derive(Debug, Error)]
pub enum CartError {
    #[error("Item not found")]
    ItemNotFound,

    #[error("Insufficient stock for {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: String,
        available: i32,
        requested: i32,
    },

    #[error("Item not found in cart")]
    LineNotFound,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<CartError> for AppError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::ItemNotFound | CartError::LineNotFound => AppError::NotFound(e.to_string()),
            CartError::InsufficientStock { .. } => AppError::InsufficientStock(e.to_string()),
            CartError::Storage(inner) => AppError::Internal(inner),
        }
    }
}

/// Add to a user's cart, checking the request against current catalog stock.
///
/// The stock check and the write run under the user's lock, so two concurrent
/// adds for the same user cannot both pass the check. Stock is checked, not reserved.
pub async fn add_to_cart(st: &AppState, req: AddToCart) -> Result<CartLine, CartError> {
    let _guard = st.user_locks.acquire(&req.user_id).await;

    let item = st
        .catalog
        .find_by_id(req.item_id)
        .await?
        .ok_or(CartError::ItemNotFound)?;

    let existing = st
        .carts
        .find(&req.user_id, req.item_id)
        .await?
        .map_or(0, |l| l.quantity);
    let wanted = existing.saturating_add(req.quantity);

    if req.quantity > item.stock || wanted > item.stock {
        warn!(
            user_id = %req.user_id,
            item_id = %item.id,
            stock = item.stock,
            in_cart = existing,
            requested = req.quantity,
            "add to cart refused: insufficient stock"
        );
        return Err(CartError::InsufficientStock {
            item: item.name,
            available: item.stock,
            requested: wanted,
        });
    }

    let line = st
        .carts
        .add_or_merge(&req.user_id, req.item_id, req.quantity)
        .await?;
    debug!(user_id = %line.user_id, item_id = %line.item_id, quantity = line.quantity, "cart line stored");
    Ok(line)
}

/// Current cart with live catalog prices. Lines whose item no longer exists are left out.
pub async fn cart_view(st: &AppState, user_id: &str) -> Result<CartView, CartError> {
    let lines = st.carts.list_by_user(user_id).await?;

    let mut items = Vec::with_capacity(lines.len());
    let mut total = Decimal::ZERO;
    for line in lines {
        let Some(item) = st.catalog.find_by_id(line.item_id).await? else {
            debug!(user_id, item_id = %line.item_id, "cart line references a missing item");
            continue;
        };
        let subtotal = item.price * Decimal::from(line.quantity);
        total += subtotal;
        items.push(CartLineView {
            cart_id: line.id,
            item_id: line.item_id,
            name: item.name,
            price: item.price,
            quantity: line.quantity,
            subtotal,
        });
    }

    Ok(CartView {
        user_id: user_id.to_string(),
        item_count: items.len(),
        items,
        total_price: total.round_dp(2),
    })
}

pub async fn remove_line(st: &AppState, user_id: &str, item_id: Uuid) -> Result<(), CartError> {
    let _guard = st.user_locks.acquire(user_id).await;
    if st.carts.remove_one(user_id, item_id).await? {
        Ok(())
    } else {
        Err(CartError::LineNotFound)
    }
}

pub async fn clear_cart(st: &AppState, user_id: &str) -> Result<u64, CartError> {
    let _guard = st.user_locks.acquire(user_id).await;
    Ok(st.carts.clear(user_id).await?)
}
