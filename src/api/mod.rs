use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    api::response::{success_response, ApiResponse},
    app_state::AppState,
    error::AppError,
};

pub mod response; // 统一响应格式
pub mod wallet_api;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    /// `None` when the ledger is not backed by Postgres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_ok: Option<bool>,
    pub version: &'static str,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/currencies", get(wallet_api::list_currencies))
        .nest("/wallets", wallet_api::routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// GET /health
pub async fn health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Health>>, AppError> {
    let db_ok = match &state.pool {
        Some(pool) => Some(crate::infrastructure::db::health_check(pool).await.is_ok()),
        None => None,
    };
    let status = if db_ok.unwrap_or(true) {
        "ok"
    } else {
        "degraded"
    };

    success_response(Health {
        status,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}
