// src/handlers/mod.rs
pub mod package_handler;
pub mod pickup_handler;

use axum::{
    Json, Router,
    routing::{get, patch, post, put},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/packages", get(package_handler::get_board))
        .route("/packages/refresh", post(package_handler::refresh_board))
        .route("/packages/filters", put(package_handler::apply_filters))
        .route(
            "/packages/selection",
            post(package_handler::select_all).delete(package_handler::clear_selection),
        )
        .route("/packages/selection/:id", post(package_handler::toggle_selection))
        .route(
            "/packages/:id",
            patch(package_handler::edit_package).delete(package_handler::delete_package),
        )
        .route("/packages/:id/status", post(package_handler::update_status))
        .route("/packages/:id/driver", post(package_handler::assign_driver))
        .route("/packages/:id/return", post(package_handler::mark_for_return))
        .route("/packages/:id/return/confirm", post(package_handler::confirm_return))
        .route("/drivers", get(pickup_handler::list_drivers))
        .route("/pickup-runs", get(pickup_handler::get_pickup_runs))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
