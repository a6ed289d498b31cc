// src/services/backend_client.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing;
use uuid::Uuid;

use crate::{
    errors::{DeskError as AppError, ValidationError},
    models::{
        Driver, DriverAssignment, Package, PackageEdit, PackageFilter, PackagePage, PackageStatus,
        PackageStatusUpdate, Pagination, PickupRequest, StatusChange,
    },
};

/// Operations the platform backend exposes to the package board.
#[async_trait]
pub trait PackageApi: Send + Sync {
    async fn list_packages(&self, filter: &PackageFilter, pagination: Pagination) -> Result<PackagePage, AppError>;
    async fn update_package_status(&self, package_id: &str, status: PackageStatus, metadata: StatusChange) -> Result<Package, AppError>;
    async fn assign_driver(&self, package_id: &str, driver_id: &str, date: NaiveDate) -> Result<Package, AppError>;
    async fn update_package(&self, package_id: &str, edit: PackageEdit) -> Result<Package, AppError>;
    async fn delete_package(&self, package_id: &str) -> Result<(), AppError>;
    async fn list_drivers(&self) -> Result<Vec<Driver>, AppError>;
    async fn list_pickups(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<PickupRequest>, AppError>;
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

#[derive(Deserialize)]
struct BackendErrorBody {
    #[serde(alias = "error")]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ValidationError>,
}

pub struct HttpPackageApi {
    config: BackendConfig,
    client: reqwest::Client,
}

impl HttpPackageApi {
    pub fn new(config: BackendConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let request_id = Uuid::new_v4();
        tracing::debug!("{} {} (request {})", method, path, request_id);
        self.client
            .request(method, self.url(path))
            .header("x-request-id", request_id.to_string())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, AppError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Self::map_status(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, AppError> {
        let response = self.send(request).await?;
        Ok(response.json::<T>().await?)
    }

    fn map_status(status: reqwest::StatusCode, body: &str) -> AppError {
        let parsed: Option<BackendErrorBody> = serde_json::from_str(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|b| b.message.clone())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

        match status.as_u16() {
            404 => AppError::NotFound(message),
            409 => AppError::Conflict(message),
            400 | 422 => match parsed {
                Some(body) if !body.errors.is_empty() => AppError::ValidationFailed(body.errors),
                _ => AppError::BadRequest(message),
            },
            502..=504 => AppError::ServiceUnavailable(message),
            code => AppError::UpstreamStatus { status: code, message },
        }
    }
}

#[async_trait]
impl PackageApi for HttpPackageApi {
    async fn list_packages(&self, filter: &PackageFilter, pagination: Pagination) -> Result<PackagePage, AppError> {
        let mut query = filter.to_query();
        query.push(("page", pagination.page.to_string()));
        query.push(("page_size", pagination.page_size.to_string()));

        let request = self.request(reqwest::Method::GET, "packages").query(&query);
        self.send_json(request).await
    }

    async fn update_package_status(&self, package_id: &str, status: PackageStatus, metadata: StatusChange) -> Result<Package, AppError> {
        let body = PackageStatusUpdate { status, metadata };
        let request = self
            .request(reqwest::Method::PATCH, &format!("packages/{}/status", package_id))
            .json(&body);
        self.send_json(request).await
    }

    async fn assign_driver(&self, package_id: &str, driver_id: &str, date: NaiveDate) -> Result<Package, AppError> {
        let body = DriverAssignment {
            driver_id: driver_id.to_string(),
            date,
        };
        let request = self
            .request(reqwest::Method::PUT, &format!("packages/{}/driver", package_id))
            .json(&body);
        self.send_json(request).await
    }

    async fn update_package(&self, package_id: &str, edit: PackageEdit) -> Result<Package, AppError> {
        let request = self
            .request(reqwest::Method::PATCH, &format!("packages/{}", package_id))
            .json(&edit);
        self.send_json(request).await
    }

    async fn delete_package(&self, package_id: &str) -> Result<(), AppError> {
        let request = self.request(reqwest::Method::DELETE, &format!("packages/{}", package_id));
        self.send(request).await?;
        Ok(())
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, AppError> {
        let request = self.request(reqwest::Method::GET, "drivers");
        self.send_json(request).await
    }

    async fn list_pickups(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<PickupRequest>, AppError> {
        let request = self
            .request(reqwest::Method::GET, "pickups")
            .query(&[("from", from.to_string()), ("to", to.to_string())]);
        self.send_json(request).await
    }
}
