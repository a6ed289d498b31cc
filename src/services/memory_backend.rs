// src/services/memory_backend.rs
//! In-memory stand-in for the platform backend.
//!
//! Used when no backend URL is configured and throughout the tests. It keeps
//! the backend's contract: status changes follow the lifecycle, every change
//! appends to the package history, and list results are filtered and paged
//! server-side.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::{
    errors::DeskError as AppError,
    models::{
        Driver, HistoryEntry, Package, PackageEdit, PackageFilter, PackagePage, PackageStatus, Pagination,
        PickupRequest, PickupStatus, ShippingType, StatusChange,
    },
    services::{backend_client::PackageApi, lifecycle},
};

#[derive(Default)]
pub struct InMemoryPackageApi {
    packages: RwLock<HashMap<String, Package>>,
    drivers: RwLock<Vec<Driver>>,
    pickups: RwLock<Vec<PickupRequest>>,
    fail_next: AtomicUsize,
}

impl InMemoryPackageApi {
    pub fn with_data(packages: Vec<Package>, drivers: Vec<Driver>, pickups: Vec<PickupRequest>) -> Self {
        Self {
            packages: RwLock::new(packages.into_iter().map(|p| (p.id.clone(), p)).collect()),
            drivers: RwLock::new(drivers),
            pickups: RwLock::new(pickups),
            fail_next: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` calls fail with a service-unavailable error.
    pub fn fail_next_calls(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub async fn package(&self, package_id: &str) -> Option<Package> {
        self.packages.read().await.get(package_id).cloned()
    }

    fn check_outage(&self) -> Result<(), AppError> {
        let outage = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if outage {
            return Err(AppError::ServiceUnavailable("package backend".to_string()));
        }
        Ok(())
    }

    async fn mutate<F>(&self, package_id: &str, updater: F) -> Result<Package, AppError>
    where
        F: FnOnce(&mut Package) -> Result<(), AppError>,
    {
        self.check_outage()?;
        let mut packages = self.packages.write().await;
        let package = packages
            .get_mut(package_id)
            .ok_or_else(|| AppError::package_not_found(package_id))?;

        let mut updated = package.clone();
        updater(&mut updated)?;
        updated.updated_at = Utc::now();
        *package = updated.clone();
        Ok(updated)
    }
}

#[async_trait]
impl PackageApi for InMemoryPackageApi {
    async fn list_packages(&self, filter: &PackageFilter, pagination: Pagination) -> Result<PackagePage, AppError> {
        self.check_outage()?;
        let packages = self.packages.read().await;

        let mut matching: Vec<Package> = packages.values().filter(|p| filter.matches(p)).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let total_count = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.page_size as usize)
            .collect();

        Ok(PackagePage { items, total_count })
    }

    async fn update_package_status(&self, package_id: &str, status: PackageStatus, metadata: StatusChange) -> Result<Package, AppError> {
        self.mutate(package_id, |package| {
            lifecycle::check_transition(package.status, status, metadata.admin_override)?;
            package.status = status;
            package.history.push(HistoryEntry {
                timestamp: Utc::now(),
                status,
                location: metadata.location,
                details: metadata.details,
            });
            Ok(())
        })
        .await
    }

    async fn assign_driver(&self, package_id: &str, driver_id: &str, date: NaiveDate) -> Result<Package, AppError> {
        let known = self.drivers.read().await.iter().any(|d| d.id == driver_id && d.active);
        if !known {
            return Err(AppError::validation_error("driver_id", format!("Unknown or inactive driver: {}", driver_id)));
        }

        self.mutate(package_id, |package| {
            if package.status.is_terminal() {
                return Err(AppError::Conflict(format!("Package is already {}", package.status)));
            }
            package.driver_id = Some(driver_id.to_string());
            package.history.push(HistoryEntry {
                timestamp: Utc::now(),
                status: package.status,
                location: None,
                details: Some(format!("Assigned to {} for {}", driver_id, date)),
            });
            Ok(())
        })
        .await
    }

    async fn update_package(&self, package_id: &str, edit: PackageEdit) -> Result<Package, AppError> {
        self.mutate(package_id, |package| {
            if package.status != PackageStatus::Pending {
                return Err(AppError::Conflict(format!("Package is already {}", package.status)));
            }
            edit.apply_to(package);
            Ok(())
        })
        .await
    }

    async fn delete_package(&self, package_id: &str) -> Result<(), AppError> {
        self.check_outage()?;
        let mut packages = self.packages.write().await;
        match packages.get(package_id) {
            None => Err(AppError::package_not_found(package_id)),
            Some(package) if package.status != PackageStatus::Pending => {
                Err(AppError::Conflict(format!("Package is already {}", package.status)))
            }
            Some(_) => {
                packages.remove(package_id);
                Ok(())
            }
        }
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, AppError> {
        self.check_outage()?;
        Ok(self.drivers.read().await.clone())
    }

    async fn list_pickups(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<PickupRequest>, AppError> {
        self.check_outage()?;
        Ok(self
            .pickups
            .read()
            .await
            .iter()
            .filter(|p| from <= p.scheduled_for && p.scheduled_for <= to)
            .cloned()
            .collect())
    }
}

/// Sample board used in demo mode.
pub fn demo_data() -> (Vec<Package>, Vec<Driver>, Vec<PickupRequest>) {
    let now = Utc::now();
    let today = now.date_naive();

    let drivers = vec![
        Driver {
            id: "drv-kwame".to_string(),
            name: "Kwame Asante".to_string(),
            phone: "+233201234567".to_string(),
            active: true,
        },
        Driver {
            id: "drv-efua".to_string(),
            name: "Efua Owusu".to_string(),
            phone: "+233247654321".to_string(),
            active: true,
        },
        Driver {
            id: "drv-yaw".to_string(),
            name: "Yaw Darko".to_string(),
            phone: "+233551112223".to_string(),
            active: false,
        },
    ];

    let sample = [
        ("pkg-1001", PackageStatus::Pending, ShippingType::Express, None, 5),
        ("pkg-1002", PackageStatus::InTransit, ShippingType::NextDay, Some("drv-kwame"), 40),
        ("pkg-1003", PackageStatus::Problem, ShippingType::SameDay, Some("drv-efua"), 90),
        ("pkg-1004", PackageStatus::Delivered, ShippingType::NextDay, Some("drv-kwame"), 300),
        ("pkg-1005", PackageStatus::ReturnPending, ShippingType::NextDay, Some("drv-efua"), 200),
        ("pkg-1006", PackageStatus::Pending, ShippingType::NextDay, None, 15),
        ("pkg-1007", PackageStatus::PickedUp, ShippingType::SameDay, Some("drv-kwame"), 25),
    ];

    let packages = sample
        .into_iter()
        .enumerate()
        .map(|(index, (id, status, shipping_type, driver, minutes_ago))| {
            let updated_at = now - Duration::minutes(minutes_ago);
            Package {
                id: id.to_string(),
                tracking_number: format!("PD{:06}", 1001 + index),
                client_id: format!("cli-{}", 10 + index % 3),
                recipient_name: format!("Recipient {}", index + 1),
                recipient_address: format!("{} Oxford Street, Osu", 10 + index),
                status,
                shipping_type,
                driver_id: driver.map(str::to_string),
                created_at: now - Duration::hours(6),
                updated_at,
                history: vec![HistoryEntry {
                    timestamp: updated_at,
                    status,
                    location: None,
                    details: None,
                }],
            }
        })
        .collect();

    let pickups = vec![
        PickupRequest {
            id: "pu-1".to_string(),
            client_id: "cli-10".to_string(),
            client_name: "Makola Textiles".to_string(),
            address: "Makola Market, Accra".to_string(),
            driver_id: Some("drv-kwame".to_string()),
            scheduled_for: today,
            package_count: 12,
            status: PickupStatus::Completed,
        },
        PickupRequest {
            id: "pu-2".to_string(),
            client_id: "cli-11".to_string(),
            client_name: "Osu Books".to_string(),
            address: "Cantonments Road, Osu".to_string(),
            driver_id: Some("drv-kwame".to_string()),
            scheduled_for: today,
            package_count: 4,
            status: PickupStatus::Scheduled,
        },
        PickupRequest {
            id: "pu-3".to_string(),
            client_id: "cli-12".to_string(),
            client_name: "Labone Pharmacy".to_string(),
            address: "Labone Crescent".to_string(),
            driver_id: None,
            scheduled_for: today + Duration::days(1),
            package_count: 3,
            status: PickupStatus::Scheduled,
        },
    ];

    (packages, drivers, pickups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryPackageApi {
        let (packages, drivers, pickups) = demo_data();
        InMemoryPackageApi::with_data(packages, drivers, pickups)
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let api = seeded();

        let all = api.list_packages(&PackageFilter::default(), Pagination::default()).await.unwrap();
        assert_eq!(all.total_count, 7);
        assert_eq!(all.items.len(), 7);

        let page = api
            .list_packages(&PackageFilter::default(), Pagination { page: 2, page_size: 5 })
            .await
            .unwrap();
        assert_eq!(page.total_count, 7);
        assert_eq!(page.items.len(), 2);

        let pending = PackageFilter {
            status: Some(PackageStatus::Pending),
            ..Default::default()
        };
        let result = api.list_packages(&pending, Pagination::default()).await.unwrap();
        assert_eq!(result.total_count, 2);
        assert!(result.items.iter().all(|p| p.status == PackageStatus::Pending));
    }

    #[tokio::test]
    async fn test_status_update_appends_history() {
        let api = seeded();
        let updated = api
            .update_package_status(
                "pkg-1002",
                PackageStatus::Delivered,
                StatusChange {
                    location: Some("Osu".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, PackageStatus::Delivered);
        assert_eq!(updated.history.len(), 2);
        assert_eq!(updated.check_history(), Ok(()));
    }

    #[tokio::test]
    async fn test_status_update_rejects_invalid_transition() {
        let api = seeded();
        let err = api
            .update_package_status("pkg-1004", PackageStatus::InTransit, StatusChange::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert_eq!(api.package("pkg-1004").await.unwrap().status, PackageStatus::Delivered);
    }

    #[tokio::test]
    async fn test_assign_requires_active_driver() {
        let api = seeded();
        let today = Utc::now().date_naive();

        let err = api.assign_driver("pkg-1001", "drv-yaw", today).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));

        let updated = api.assign_driver("pkg-1001", "drv-efua", today).await.unwrap();
        assert_eq!(updated.driver_id.as_deref(), Some("drv-efua"));
        assert_eq!(updated.check_history(), Ok(()));
    }

    #[tokio::test]
    async fn test_injected_outage() {
        let api = seeded();
        api.fail_next_calls(1);
        assert!(api.list_drivers().await.is_err());
        assert!(api.list_drivers().await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_only_pending() {
        let api = seeded();
        assert!(api.delete_package("pkg-1002").await.is_err());
        api.delete_package("pkg-1006").await.unwrap();
        assert!(api.package("pkg-1006").await.is_none());
    }
}
