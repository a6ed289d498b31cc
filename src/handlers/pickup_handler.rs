// src/handlers/pickup_handler.rs
use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    errors::{DeskError as AppError, DeskResult},
    models::{Driver, PickupRun},
    services::pickup_runs::group_pickup_runs,
    state::AppState,
};

const DEFAULT_WINDOW_DAYS: i64 = 7;
const MAX_WINDOW_DAYS: i64 = 62;

#[derive(Debug, Default, Deserialize)]
pub struct PickupRunQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl PickupRunQuery {
    /// Resolves the requested window, defaulting to the coming week.
    pub fn window(&self, today: NaiveDate) -> DeskResult<(NaiveDate, NaiveDate)> {
        let from = self.from.unwrap_or(today);
        let to = match self.to {
            Some(to) => to,
            None => from
                .checked_add_signed(Duration::days(DEFAULT_WINDOW_DAYS - 1))
                .ok_or_else(|| AppError::validation_error("from", "Start date is out of range"))?,
        };

        if from > to {
            return Err(AppError::validation_error("from", "Start date must not be after end date"));
        }
        if (to - from).num_days() >= MAX_WINDOW_DAYS {
            return Err(AppError::validation_error(
                "to",
                format!("Date range cannot exceed {} days", MAX_WINDOW_DAYS),
            ));
        }
        Ok((from, to))
    }
}

pub async fn list_drivers(State(state): State<Arc<AppState>>) -> DeskResult<Json<Vec<Driver>>> {
    let drivers = state.api.list_drivers().await?;
    Ok(Json(drivers))
}

pub async fn get_pickup_runs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PickupRunQuery>,
) -> DeskResult<Json<Vec<PickupRun>>> {
    let (from, to) = query.window(Utc::now().date_naive())?;
    tracing::debug!("Loading pickup runs from {} to {}", from, to);

    let pickups = state.api.list_pickups(from, to).await?;
    Ok(Json(group_pickup_runs(&pickups)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::services::memory_backend::{InMemoryPackageApi, demo_data};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, day).unwrap()
    }

    #[test]
    fn test_default_window() {
        let query = PickupRunQuery::default();
        assert_eq!(query.window(date(1)).unwrap(), (date(1), date(7)));
    }

    #[test]
    fn test_invalid_windows() {
        let reversed = PickupRunQuery {
            from: Some(date(10)),
            to: Some(date(2)),
        };
        assert!(reversed.window(date(1)).is_err());

        let too_long = PickupRunQuery {
            from: Some(date(1)),
            to: Some(date(1) + Duration::days(90)),
        };
        assert!(too_long.window(date(1)).is_err());

        let query: PickupRunQuery = serde_json::from_str(r#"{"from":"+262142-12-31"}"#).unwrap();
        assert!(matches!(query.window(date(1)), Err(AppError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn test_runs_from_demo_backend() {
        let (packages, drivers, pickups) = demo_data();
        let api = Arc::new(InMemoryPackageApi::with_data(packages, drivers, pickups));
        let state = Arc::new(AppState::with_api(api, AppConfig::default()));

        let Json(runs) = get_pickup_runs(State(state.clone()), Query(PickupRunQuery::default()))
            .await
            .unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].driver_id.as_deref(), Some("drv-kwame"));
        assert_eq!(runs[0].total_packages, 16);
        assert_eq!(runs[0].completed_stops, 1);
        assert!(runs[1].driver_id.is_none());

        let Json(drivers) = list_drivers(State(state)).await.unwrap();
        assert_eq!(drivers.len(), 3);
    }
}
