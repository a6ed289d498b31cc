// src/services/refresh.rs
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing;

use crate::services::package_board::PackageBoard;

/// Handle to the background auto-refresh task.
pub struct RefreshHandle {
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        if let Err(err) = self.task.await {
            tracing::error!("Auto-refresh task ended abnormally: {}", err);
        }
    }
}

/// Starts re-fetching the board on a fixed timer.
///
/// Ticks that land while a mutation is in flight are skipped; the mutation
/// re-fetches on its own when it completes. Refresh failures are logged and
/// the timer keeps running.
pub fn spawn_auto_refresh(board: Arc<PackageBoard>, every: Duration) -> RefreshHandle {
    let (stop_tx, stop_rx) = mpsc::channel(1);
    let task = tokio::spawn(refresh_loop(board, every, stop_rx));
    RefreshHandle { stop_tx, task }
}

async fn refresh_loop(board: Arc<PackageBoard>, every: Duration, mut stop_rx: mpsc::Receiver<()>) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately
    interval.tick().await;

    tracing::info!("Auto-refresh every {:?}", every);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if board.is_mutating() {
                    tracing::debug!("Skipping auto-refresh while an update is pending");
                    continue;
                }
                if let Err(err) = board.refresh().await {
                    tracing::error!("Auto-refresh failed: {}", err);
                }
            }
            _ = stop_rx.recv() => {
                tracing::info!("Stopping auto-refresh");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DeskError, DeskResult};
    use crate::models::{
        Driver, Package, PackageEdit, PackageFilter, PackagePage, PackageStatus, Pagination, PickupRequest,
        StatusChange,
    };
    use crate::services::backend_client::PackageApi;
    use crate::services::memory_backend::{InMemoryPackageApi, demo_data};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_picks_up_backend_changes() {
        let (packages, drivers, pickups) = demo_data();
        let api = Arc::new(InMemoryPackageApi::with_data(packages, drivers, pickups));
        let board = Arc::new(PackageBoard::new(api.clone(), 25));
        board.refresh().await.unwrap();

        let handle = spawn_auto_refresh(board.clone(), Duration::from_millis(20));

        // A change made behind the board's back
        api.update_package_status("pkg-1007", PackageStatus::InTransit, StatusChange::default())
            .await
            .unwrap();

        let mut seen = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let snapshot = board.snapshot().await;
            if snapshot
                .items
                .iter()
                .any(|row| row.package.id == "pkg-1007" && row.package.status == PackageStatus::InTransit)
            {
                seen = true;
                break;
            }
        }
        handle.stop().await;
        assert!(seen, "auto-refresh never applied the backend change");
    }

    #[tokio::test]
    async fn test_survives_backend_outage() {
        let (packages, drivers, pickups) = demo_data();
        let api = Arc::new(InMemoryPackageApi::with_data(packages, drivers, pickups));
        let board = Arc::new(PackageBoard::new(api.clone(), 25));

        api.fail_next_calls(2);
        let handle = spawn_auto_refresh(board.clone(), Duration::from_millis(10));

        let mut loaded = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if board.snapshot().await.total_count == 7 {
                loaded = true;
                break;
            }
        }
        handle.stop().await;
        assert!(loaded);
    }

    /// Counts list calls and holds every status update until released.
    struct HeldUpdateApi {
        inner: InMemoryPackageApi,
        lists: AtomicUsize,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl PackageApi for HeldUpdateApi {
        async fn list_packages(&self, filter: &PackageFilter, pagination: Pagination) -> DeskResult<PackagePage> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            self.inner.list_packages(filter, pagination).await
        }

        async fn update_package_status(&self, id: &str, status: PackageStatus, metadata: StatusChange) -> DeskResult<Package> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.update_package_status(id, status, metadata).await
        }

        async fn assign_driver(&self, id: &str, driver_id: &str, date: NaiveDate) -> DeskResult<Package> {
            self.inner.assign_driver(id, driver_id, date).await
        }

        async fn update_package(&self, id: &str, edit: PackageEdit) -> DeskResult<Package> {
            self.inner.update_package(id, edit).await
        }

        async fn delete_package(&self, id: &str) -> DeskResult<()> {
            self.inner.delete_package(id).await
        }

        async fn list_drivers(&self) -> DeskResult<Vec<Driver>> {
            self.inner.list_drivers().await
        }

        async fn list_pickups(&self, from: NaiveDate, to: NaiveDate) -> DeskResult<Vec<PickupRequest>> {
            self.inner.list_pickups(from, to).await
        }
    }

    #[tokio::test]
    async fn test_pending_mutation_blocks_refresh_and_second_mutation() {
        let (packages, drivers, pickups) = demo_data();
        let api = Arc::new(HeldUpdateApi {
            inner: InMemoryPackageApi::with_data(packages, drivers, pickups),
            lists: AtomicUsize::new(0),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let board = Arc::new(PackageBoard::new(api.clone(), 25));
        board.refresh().await.unwrap();
        assert_eq!(api.lists.load(Ordering::SeqCst), 1);

        let update = tokio::spawn({
            let board = board.clone();
            async move {
                board
                    .update_status("pkg-1002", PackageStatus::Delivered, StatusChange::default())
                    .await
            }
        });
        api.entered.notified().await;
        assert!(board.snapshot().await.mutation_pending);

        let err = board.delete_package("pkg-1001").await.unwrap_err();
        assert!(matches!(err, DeskError::MutationInProgress));

        let handle = spawn_auto_refresh(board.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(api.lists.load(Ordering::SeqCst), 1);

        api.release.notify_one();
        let updated = update.await.unwrap().unwrap();
        assert_eq!(updated.status, PackageStatus::Delivered);
        handle.stop().await;

        assert!(api.lists.load(Ordering::SeqCst) >= 2);
        let snapshot = board.snapshot().await;
        assert!(!snapshot.mutation_pending);
        let row = snapshot.items.iter().find(|row| row.package.id == "pkg-1002").unwrap();
        assert_eq!(row.package.status, PackageStatus::Delivered);
    }
}
