// src/state.rs
use std::sync::Arc;

use crate::{
    config::AppConfig,
    errors::DeskResult,
    services::{
        backend_client::{BackendConfig, HttpPackageApi, PackageApi},
        memory_backend::{InMemoryPackageApi, demo_data},
        package_board::PackageBoard,
    },
};

pub struct AppState {
    pub api: Arc<dyn PackageApi>,
    pub board: Arc<PackageBoard>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> DeskResult<Self> {
        let api: Arc<dyn PackageApi> = match &config.backend_url {
            Some(base_url) => Arc::new(HttpPackageApi::new(BackendConfig {
                base_url: base_url.clone(),
                request_timeout: config.request_timeout,
            })?),
            None => {
                tracing::warn!("PARCEL_DESK_BACKEND_URL not set, using in-memory demo backend");
                let (packages, drivers, pickups) = demo_data();
                Arc::new(InMemoryPackageApi::with_data(packages, drivers, pickups))
            }
        };

        Ok(Self::with_api(api, config))
    }

    pub fn with_api(api: Arc<dyn PackageApi>, config: AppConfig) -> Self {
        let board = Arc::new(PackageBoard::new(api.clone(), config.page_size));
        Self { api, board, config }
    }
}
