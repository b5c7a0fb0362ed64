use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{AddToCart, AddToCartRequest, CartView};
use super::services;
use crate::{
    dto::MessageResponse,
    error::{parse_id, ApiJson, AppResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", post(add_to_cart))
        .route("/cart/:user_id", get(get_cart).delete(clear_cart))
        .route("/cart/:user_id/:item_id", delete(remove_from_cart))
}

#[instrument(skip(state, body))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AddToCartRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let req = AddToCart::try_from(body)?;
    let line = services::add_to_cart(&state, req).await?;

    info!(user_id = %line.user_id, item_id = %line.item_id, quantity = line.quantity, "item added to cart");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Item added to cart successfully")),
    ))
}

#[instrument(skip(state))]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<CartView>> {
    Ok(Json(services::cart_view(&state, &user_id).await?))
}

#[instrument(skip(state))]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    Path((user_id, item_id)): Path<(String, String)>,
) -> AppResult<Json<MessageResponse>> {
    let item_id = parse_id(&item_id, "item")?;
    services::remove_line(&state, &user_id, item_id).await?;
    Ok(Json(MessageResponse::new("Item removed from cart")))
}

#[instrument(skip(state))]
pub async fn clear_cart(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let removed = services::clear_cart(&state, &user_id).await?;
    info!(%user_id, removed, "cart cleared");
    Ok(Json(MessageResponse::new("Cart cleared successfully")))
}
