use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{CreateItemRequest, CreatedItemResponse, ItemQuery, UpdateItemRequest};
use super::repo_types::{Item, ItemFilter};
use crate::{
    dto::MessageResponse,
    error::{parse_id, ApiJson, AppError, AppResult},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items))
        .route("/items/:id", get(get_item))
        .route("/categories", get(list_categories))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/items", post(create_item))
        .route("/admin/items/:id", put(update_item))
}

#[instrument(skip(state))]
pub async fn list_items(
    State(state): State<AppState>,
    Query(q): Query<ItemQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let filter = ItemFilter::from(q);
    let items = state.catalog.search(&filter).await?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Item>> {
    let id = parse_id(&id, "item")?;
    state
        .catalog
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Item not found".into()))
}

#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.catalog.distinct_categories().await?))
}

#[instrument(skip(state, body))]
pub async fn create_item(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateItemRequest>,
) -> AppResult<(StatusCode, Json<CreatedItemResponse>)> {
    let new_item = body.into_new_item().inspect_err(|e| {
        warn!(error = %e, "rejected item create");
    })?;
    let item = state.catalog.create(new_item).await?;

    info!(item_id = %item.id, name = %item.name, "item created");
    Ok((
        StatusCode::CREATED,
        Json(CreatedItemResponse {
            message: "Item added successfully".into(),
            item_id: item.id,
            item,
        }),
    ))
}

#[instrument(skip(state, body))]
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateItemRequest>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, "item")?;
    let patch = body.into_patch()?;
    match state.catalog.update(id, patch).await? {
        Some(item) => {
            info!(item_id = %item.id, stock = item.stock, "item updated");
            Ok(Json(MessageResponse::new("Item updated successfully")))
        }
        None => Err(AppError::NotFound("Item not found".into())),
    }
}
