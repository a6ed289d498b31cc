// src/handlers/package_handler.rs
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    errors::DeskResult,
    models::{DriverAssignment, Package, PackageEdit, PackageFilter, PackageStatusUpdate, Pagination},
    services::package_board::BoardSnapshot,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    #[serde(flatten)]
    pub filter: PackageFilter,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnRequest {
    pub details: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub selected: bool,
    pub selected_ids: Vec<String>,
}

pub async fn get_board(State(state): State<Arc<AppState>>) -> Json<BoardSnapshot> {
    Json(state.board.snapshot().await)
}

pub async fn refresh_board(State(state): State<Arc<AppState>>) -> DeskResult<Json<BoardSnapshot>> {
    state.board.refresh().await?;
    Ok(Json(state.board.snapshot().await))
}

pub async fn apply_filters(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FilterRequest>,
) -> DeskResult<Json<BoardSnapshot>> {
    let pagination = if request.page.is_some() || request.page_size.is_some() {
        let current = state.board.snapshot().await;
        Some(Pagination {
            page: request.page.unwrap_or(1),
            page_size: request.page_size.unwrap_or(current.page_size),
        })
    } else {
        None
    };

    state.board.apply_filters(request.filter, pagination).await?;
    Ok(Json(state.board.snapshot().await))
}

pub async fn toggle_selection(
    State(state): State<Arc<AppState>>,
    Path(package_id): Path<String>,
) -> DeskResult<Json<SelectionResponse>> {
    let selected = state.board.toggle_selection(&package_id).await?;
    Ok(Json(SelectionResponse {
        selected,
        selected_ids: state.board.selected_ids().await,
    }))
}

pub async fn select_all(State(state): State<Arc<AppState>>) -> Json<SelectionResponse> {
    state.board.select_all_visible().await;
    Json(SelectionResponse {
        selected: true,
        selected_ids: state.board.selected_ids().await,
    })
}

pub async fn clear_selection(State(state): State<Arc<AppState>>) -> StatusCode {
    state.board.clear_selection().await;
    StatusCode::NO_CONTENT
}

pub async fn edit_package(
    State(state): State<Arc<AppState>>,
    Path(package_id): Path<String>,
    Json(edit): Json<PackageEdit>,
) -> DeskResult<Json<Package>> {
    let package = state.board.edit_package(&package_id, edit).await?;
    Ok(Json(package))
}

pub async fn delete_package(
    State(state): State<Arc<AppState>>,
    Path(package_id): Path<String>,
) -> DeskResult<StatusCode> {
    state.board.delete_package(&package_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(package_id): Path<String>,
    Json(update): Json<PackageStatusUpdate>,
) -> DeskResult<Json<Package>> {
    let package = state
        .board
        .update_status(&package_id, update.status, update.metadata)
        .await?;
    Ok(Json(package))
}

pub async fn assign_driver(
    State(state): State<Arc<AppState>>,
    Path(package_id): Path<String>,
    Json(assignment): Json<DriverAssignment>,
) -> DeskResult<Json<Package>> {
    let package = state
        .board
        .assign_driver(&package_id, &assignment.driver_id, assignment.date)
        .await?;
    Ok(Json(package))
}

pub async fn mark_for_return(
    State(state): State<Arc<AppState>>,
    Path(package_id): Path<String>,
    request: Option<Json<ReturnRequest>>,
) -> DeskResult<Json<Package>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let package = state.board.mark_for_return(&package_id, request.details).await?;
    Ok(Json(package))
}

pub async fn confirm_return(
    State(state): State<Arc<AppState>>,
    Path(package_id): Path<String>,
    request: Option<Json<ReturnRequest>>,
) -> DeskResult<Json<Package>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let package = state.board.confirm_return(&package_id, request.details).await?;
    Ok(Json(package))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::{PackageStatus, StatusChange};
    use crate::services::memory_backend::{InMemoryPackageApi, demo_data};
    use axum::response::IntoResponse;

    async fn app_state() -> Arc<AppState> {
        let (packages, drivers, pickups) = demo_data();
        let api = Arc::new(InMemoryPackageApi::with_data(packages, drivers, pickups));
        let state = Arc::new(AppState::with_api(api, AppConfig::default()));
        state.board.refresh().await.unwrap();
        state
    }

    #[tokio::test]
    async fn test_filters_with_explicit_page_size() {
        let state = app_state().await;
        let request = FilterRequest {
            filter: PackageFilter::default(),
            page: None,
            page_size: Some(3),
        };

        let Json(snapshot) = apply_filters(State(state), Json(request)).await.unwrap();
        assert_eq!(snapshot.page, 1);
        assert_eq!(snapshot.items.len(), 3);
        assert_eq!(snapshot.total_pages, 3);
    }

    #[tokio::test]
    async fn test_refused_delete_maps_to_conflict() {
        let state = app_state().await;
        let err = delete_package(State(state), Path("pkg-1002".to_string())).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_status_update_round_trip() {
        let state = app_state().await;
        let update = PackageStatusUpdate {
            status: PackageStatus::InTransit,
            metadata: StatusChange {
                location: Some("Tema depot".to_string()),
                ..Default::default()
            },
        };

        let Json(package) = update_status(State(state.clone()), Path("pkg-1007".to_string()), Json(update))
            .await
            .unwrap();
        assert_eq!(package.status, PackageStatus::InTransit);
        assert_eq!(package.latest_event().and_then(|e| e.location.as_deref()), Some("Tema depot"));

        let Json(snapshot) = get_board(State(state)).await;
        let row = snapshot.items.iter().find(|row| row.package.id == "pkg-1007").unwrap();
        assert_eq!(row.package.status, PackageStatus::InTransit);
    }

    #[tokio::test]
    async fn test_return_without_body() {
        let state = app_state().await;
        let Json(package) = mark_for_return(State(state), Path("pkg-1003".to_string()), None)
            .await
            .unwrap();
        assert_eq!(package.status, PackageStatus::ReturnPending);
    }

    #[tokio::test]
    async fn test_selection_endpoints() {
        let state = app_state().await;
        let Json(response) = toggle_selection(State(state.clone()), Path("pkg-1001".to_string()))
            .await
            .unwrap();
        assert!(response.selected);
        assert_eq!(response.selected_ids, vec!["pkg-1001".to_string()]);

        let Json(response) = select_all(State(state.clone())).await;
        assert_eq!(response.selected_ids.len(), 7);

        assert_eq!(clear_selection(State(state.clone())).await, StatusCode::NO_CONTENT);
        assert!(state.board.selected_ids().await.is_empty());
    }
}
