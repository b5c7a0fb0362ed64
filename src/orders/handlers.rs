use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::dto::{PlaceOrderRequest, PlaceOrderResponse};
use super::repo_types::Order;
use super::services::{self, CheckoutRequest};
use crate::{
    error::{parse_id, ApiJson, AppError, AppResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(place_order))
        .route("/orders/:user_id", get(list_orders))
        .route("/orders/:user_id/:order_id", get(get_order))
}

#[instrument(skip(state, body))]
pub async fn place_order(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PlaceOrderRequest>,
) -> AppResult<(StatusCode, Json<PlaceOrderResponse>)> {
    let req = CheckoutRequest::try_from(body)?;
    let order = services::checkout(&state, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(PlaceOrderResponse {
            message: "Order placed successfully".into(),
            order_id: order.id,
            total_price: order.total_price,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<Order>>> {
    Ok(Json(state.orders.list_by_user(&user_id).await?))
}

#[instrument(skip(state))]
pub async fn get_order(
    State(state): State<AppState>,
    Path((user_id, order_id)): Path<(String, String)>,
) -> AppResult<Json<Order>> {
    let order_id = parse_id(&order_id, "order")?;
    state
        .orders
        .find_by_user_and_id(&user_id, order_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order not found".into()))
}
