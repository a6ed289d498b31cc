// src/services/package_board.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing;

use crate::{
    errors::{DeskError as AppError, DeskResult, ValidationError},
    models::{
        MAX_PAGE_SIZE, Package, PackageEdit, PackageFilter, PackagePage, PackageStatus, Pagination, StatusChange,
    },
    services::{
        backend_client::PackageApi,
        lifecycle::{self, ActionAvailability, PackageAction},
        ordering,
    },
};

/// Operator's view of the package list.
///
/// The board owns the filters, the current page snapshot (already in display
/// order) and the selection. It never changes a package itself: every action
/// goes to the backend and is followed by a full re-fetch.
pub struct PackageBoard {
    api: Arc<dyn PackageApi>,
    state: RwLock<BoardState>,
    fetch_seq: AtomicU64,
    mutating: AtomicBool,
}

#[derive(Debug, Default)]
struct BoardState {
    filter: PackageFilter,
    pagination: Pagination,
    packages: Vec<Package>,
    total_count: u64,
    selected: HashSet<String>,
    last_error: Option<String>,
    last_refreshed: Option<DateTime<Utc>>,
}

impl BoardState {
    /// Replaces the rows with a fetched page and returns the ids whose history
    /// breaks the backend's invariants. Such rows are still shown.
    fn apply_page(&mut self, page: PackagePage) -> Vec<String> {
        let mut inconsistent = Vec::new();
        for package in &page.items {
            if let Err(err) = package.check_history() {
                tracing::warn!("Package {} has inconsistent history: {}", package.id, err);
                inconsistent.push(package.id.clone());
            }
        }

        self.packages = ordering::sort_for_display(page.items);
        self.total_count = page.total_count;

        let visible: HashSet<&str> = self.packages.iter().map(|p| p.id.as_str()).collect();
        self.selected.retain(|id| visible.contains(id.as_str()));

        self.last_error = None;
        self.last_refreshed = Some(Utc::now());
        inconsistent
    }

    fn find(&self, package_id: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.id == package_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageRow {
    #[serde(flatten)]
    pub package: Package,
    pub urgent: bool,
    pub actions: ActionAvailability,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardSnapshot {
    pub items: Vec<PackageRow>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub filter: PackageFilter,
    pub selected_count: usize,
    pub mutation_pending: bool,
    pub last_error: Option<String>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

struct MutationGuard<'a>(&'a AtomicBool);

impl<'a> MutationGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> DeskResult<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| AppError::MutationInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub fn validate_query(filter: &PackageFilter, pagination: &Pagination) -> Result<(), AppError> {
    let mut errors = Vec::new();

    if let Some(range) = &filter.created {
        if range.start > range.end {
            errors.push(ValidationError {
                field: "created".to_string(),
                message: "Start date must not be after end date".to_string(),
            });
        }
    }
    if pagination.page < 1 {
        errors.push(ValidationError {
            field: "page".to_string(),
            message: "Page must be at least 1".to_string(),
        });
    }
    if pagination.page_size < 1 || pagination.page_size > MAX_PAGE_SIZE {
        errors.push(ValidationError {
            field: "page_size".to_string(),
            message: format!("Page size must be between 1 and {}", MAX_PAGE_SIZE),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::ValidationFailed(errors))
    }
}

impl PackageBoard {
    pub fn new(api: Arc<dyn PackageApi>, page_size: u32) -> Self {
        let state = BoardState {
            pagination: Pagination { page: 1, page_size },
            ..Default::default()
        };

        Self {
            api,
            state: RwLock::new(state),
            fetch_seq: AtomicU64::new(0),
            mutating: AtomicBool::new(false),
        }
    }

    pub fn is_mutating(&self) -> bool {
        self.mutating.load(Ordering::SeqCst)
    }

    /// Re-fetches the current page. Returns `Ok(false)` when a newer fetch was
    /// issued while this one was in flight; its response is then dropped.
    pub async fn refresh(&self) -> DeskResult<bool> {
        let ticket = self.next_ticket();
        let (filter, pagination) = {
            let state = self.state.read().await;
            (state.filter.clone(), state.pagination)
        };

        self.load(ticket, &filter, pagination, None).await
    }

    /// Replaces the filters and re-fetches. Without an explicit page a changed
    /// filter starts again from page 1. If the fetch fails the previous filters
    /// are restored, so the snapshot never pairs new filters with old rows.
    pub async fn apply_filters(&self, filter: PackageFilter, pagination: Option<Pagination>) -> DeskResult<bool> {
        let (ticket, filter, pagination, previous) = {
            let mut state = self.state.write().await;
            let pagination = match pagination {
                Some(pagination) => pagination,
                None if filter != state.filter => Pagination {
                    page: 1,
                    ..state.pagination
                },
                None => state.pagination,
            };

            validate_query(&filter, &pagination)?;
            tracing::info!("Applying package filters: {:?}, page {}", filter, pagination.page);
            let previous = (
                std::mem::replace(&mut state.filter, filter.clone()),
                std::mem::replace(&mut state.pagination, pagination),
            );
            (self.next_ticket(), filter, pagination, previous)
        };

        self.load(ticket, &filter, pagination, Some(previous)).await
    }

    fn next_ticket(&self) -> u64 {
        self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn load(
        &self,
        ticket: u64,
        filter: &PackageFilter,
        pagination: Pagination,
        restore_on_error: Option<(PackageFilter, Pagination)>,
    ) -> DeskResult<bool> {
        tracing::debug!("Fetching packages (ticket {}, page {})", ticket, pagination.page);
        let result = self.api.list_packages(filter, pagination).await;

        let mut state = self.state.write().await;
        if self.fetch_seq.load(Ordering::SeqCst) != ticket {
            tracing::debug!("Discarding stale package response (ticket {})", ticket);
            return Ok(false);
        }

        match result {
            Ok(page) => {
                tracing::debug!("Loaded {} of {} packages", page.items.len(), page.total_count);
                state.apply_page(page);
                Ok(true)
            }
            Err(err) => {
                if let Some((filter, pagination)) = restore_on_error {
                    state.filter = filter;
                    state.pagination = pagination;
                }
                state.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub async fn snapshot(&self) -> BoardSnapshot {
        let state = self.state.read().await;
        let items = state
            .packages
            .iter()
            .map(|package| PackageRow {
                urgent: ordering::is_urgent(package),
                actions: ActionAvailability::for_package(package),
                selected: state.selected.contains(&package.id),
                package: package.clone(),
            })
            .collect();

        BoardSnapshot {
            items,
            total_count: state.total_count,
            page: state.pagination.page,
            page_size: state.pagination.page_size,
            total_pages: state.pagination.total_pages(state.total_count),
            filter: state.filter.clone(),
            selected_count: state.selected.len(),
            mutation_pending: self.is_mutating(),
            last_error: state.last_error.clone(),
            last_refreshed: state.last_refreshed,
        }
    }

    // Selection

    /// Flips the selection of a visible package and reports whether it is now
    /// selected.
    pub async fn toggle_selection(&self, package_id: &str) -> DeskResult<bool> {
        let mut state = self.state.write().await;
        if state.find(package_id).is_none() {
            return Err(AppError::stale(package_id));
        }

        if state.selected.remove(package_id) {
            Ok(false)
        } else {
            state.selected.insert(package_id.to_string());
            Ok(true)
        }
    }

    pub async fn select_all_visible(&self) -> usize {
        let mut state = self.state.write().await;
        let ids: Vec<String> = state.packages.iter().map(|p| p.id.clone()).collect();
        state.selected.extend(ids);
        state.selected.len()
    }

    pub async fn clear_selection(&self) {
        self.state.write().await.selected.clear();
    }

    pub async fn selected_ids(&self) -> Vec<String> {
        let state = self.state.read().await;
        // Keep display order
        state
            .packages
            .iter()
            .filter(|p| state.selected.contains(&p.id))
            .map(|p| p.id.clone())
            .collect()
    }

    // Gated actions

    pub async fn update_status(&self, package_id: &str, status: PackageStatus, metadata: StatusChange) -> DeskResult<Package> {
        let package = self.gate(package_id, PackageAction::UpdateStatus).await?;
        if let Err(err) = lifecycle::check_transition(package.status, status, metadata.admin_override) {
            return Err(self.surface(err.into()).await);
        }

        let api = Arc::clone(&self.api);
        self.run_mutation(package_id, PackageAction::UpdateStatus, async move {
            api.update_package_status(&package.id, status, metadata).await
        })
        .await
    }

    pub async fn assign_driver(&self, package_id: &str, driver_id: &str, date: NaiveDate) -> DeskResult<Package> {
        let driver_id = driver_id.trim();
        if driver_id.is_empty() {
            return Err(self.surface(AppError::validation_error("driver_id", "A driver must be selected")).await);
        }
        if date < Utc::now().date_naive() {
            return Err(self.surface(AppError::validation_error("date", "Assignment date cannot be in the past")).await);
        }

        let package = self.gate(package_id, PackageAction::ReassignDriver).await?;
        let api = Arc::clone(&self.api);
        let driver_id = driver_id.to_string();
        self.run_mutation(package_id, PackageAction::ReassignDriver, async move {
            api.assign_driver(&package.id, &driver_id, date).await
        })
        .await
    }

    pub async fn edit_package(&self, package_id: &str, edit: PackageEdit) -> DeskResult<Package> {
        let mut errors = Vec::new();
        if edit.is_empty() {
            errors.push(ValidationError {
                field: "edit".to_string(),
                message: "Nothing to update".to_string(),
            });
        }
        for (field, value) in [
            ("recipient_name", &edit.recipient_name),
            ("recipient_address", &edit.recipient_address),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: "Must not be blank".to_string(),
                });
            }
        }
        if !errors.is_empty() {
            return Err(self.surface(AppError::ValidationFailed(errors)).await);
        }

        let package = self.gate(package_id, PackageAction::Edit).await?;
        let api = Arc::clone(&self.api);
        self.run_mutation(package_id, PackageAction::Edit, async move {
            api.update_package(&package.id, edit).await
        })
        .await
    }

    pub async fn delete_package(&self, package_id: &str) -> DeskResult<()> {
        let package = self.gate(package_id, PackageAction::Delete).await?;
        let api = Arc::clone(&self.api);
        self.run_mutation(package_id, PackageAction::Delete, async move {
            api.delete_package(&package.id).await
        })
        .await
    }

    /// Sends a problem package back to its sender.
    pub async fn mark_for_return(&self, package_id: &str, details: Option<String>) -> DeskResult<Package> {
        let package = self.gate(package_id, PackageAction::MarkForReturn).await?;
        let api = Arc::clone(&self.api);
        let metadata = StatusChange {
            location: None,
            details,
            admin_override: true,
        };
        self.run_mutation(package_id, PackageAction::MarkForReturn, async move {
            api.update_package_status(&package.id, PackageStatus::ReturnPending, metadata).await
        })
        .await
    }

    pub async fn confirm_return(&self, package_id: &str, details: Option<String>) -> DeskResult<Package> {
        let package = self.gate(package_id, PackageAction::ConfirmReturn).await?;
        let api = Arc::clone(&self.api);
        let metadata = StatusChange {
            location: None,
            details,
            admin_override: false,
        };
        self.run_mutation(package_id, PackageAction::ConfirmReturn, async move {
            api.update_package_status(&package.id, PackageStatus::Returned, metadata).await
        })
        .await
    }

    /// Looks the package up in the current snapshot and checks the action
    /// against its status.
    async fn gate(&self, package_id: &str, action: PackageAction) -> DeskResult<Package> {
        let package = {
            let state = self.state.read().await;
            state.find(package_id).cloned()
        };

        let result = match package {
            Some(package) => lifecycle::ensure_allowed(action, &package).map(|_| package),
            None => Err(AppError::stale(package_id)),
        };

        match result {
            Ok(package) => Ok(package),
            Err(err) => Err(self.surface(err).await),
        }
    }

    async fn run_mutation<T, Fut>(&self, package_id: &str, action: PackageAction, call: Fut) -> DeskResult<T>
    where
        Fut: Future<Output = DeskResult<T>>,
    {
        let outcome = {
            let _guard = match MutationGuard::acquire(&self.mutating) {
                Ok(guard) => guard,
                Err(err) => return Err(self.surface(err).await),
            };
            tracing::info!("Requesting {} for package {}", action, package_id);
            call.await
        };

        match outcome {
            Ok(value) => {
                tracing::info!("{} succeeded for package {}", action, package_id);
                if let Err(err) = self.refresh().await {
                    tracing::warn!("Refresh after {} failed: {}", action, err);
                }
                Ok(value)
            }
            Err(err) => {
                tracing::warn!("{} failed for package {}: {}", action, package_id, err);
                Err(self.surface(err).await)
            }
        }
    }

    /// Records a failure as the message shown to the operator.
    async fn surface(&self, err: AppError) -> AppError {
        self.state.write().await.last_error = Some(err.to_string());
        err
    }
}
