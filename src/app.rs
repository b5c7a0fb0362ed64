use std::net::SocketAddr;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::state::AppState;
use crate::{cart, catalog, orders};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "ok" }))
        .merge(catalog::router())
        .merge(cart::router())
        .merge(orders::router())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency_millis(latency);
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the grocery ordering API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /items": "List items, filter with ?category= and ?search=",
            "GET /items/:id": "Get one item",
            "GET /categories": "List categories",
            "POST /cart": "Add an item to a cart",
            "GET /cart/:user_id": "Get a user's cart",
            "DELETE /cart/:user_id/:item_id": "Remove an item from a cart",
            "DELETE /cart/:user_id": "Clear a cart",
            "POST /orders": "Place an order from the cart",
            "GET /orders/:user_id": "Order history, newest first",
            "GET /orders/:user_id/:order_id": "Get one order",
            "POST /admin/items": "Create an item",
            "PUT /admin/items/:id": "Update an item"
        }
    }))
}

pub async fn serve(app: Router, server: &ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", server.host, server.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn latency_millis(latency: std::time::Duration) -> u64 {
    u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
