// src/models/package.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageStatus {
    Pending,       // Registered, waiting for pickup
    PickedUp,      // Collected from the client
    InTransit,     // On the way to the recipient
    Delivered,     // Handed over to the recipient
    Delayed,       // Flagged late by the backend
    Problem,       // Delivery attempt failed or package damaged
    ReturnPending, // Approved for return to sender
    Returned,      // Back with the sender
}

impl PackageStatus {
    pub const ALL: [PackageStatus; 8] = [
        PackageStatus::Pending,
        PackageStatus::PickedUp,
        PackageStatus::InTransit,
        PackageStatus::Delivered,
        PackageStatus::Delayed,
        PackageStatus::Problem,
        PackageStatus::ReturnPending,
        PackageStatus::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Pending => "Pending",
            PackageStatus::PickedUp => "PickedUp",
            PackageStatus::InTransit => "InTransit",
            PackageStatus::Delivered => "Delivered",
            PackageStatus::Delayed => "Delayed",
            PackageStatus::Problem => "Problem",
            PackageStatus::ReturnPending => "ReturnPending",
            PackageStatus::Returned => "Returned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PackageStatus::Delivered | PackageStatus::Returned)
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShippingType {
    SameDay,
    Express,
    NextDay,
}

impl ShippingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingType::SameDay => "SameDay",
            ShippingType::Express => "Express",
            ShippingType::NextDay => "NextDay",
        }
    }

    /// Same-day and express shipments are time critical while unassigned.
    pub fn is_time_critical(&self) -> bool {
        matches!(self, ShippingType::SameDay | ShippingType::Express)
    }
}

impl fmt::Display for ShippingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub status: PackageStatus,
    pub location: Option<String>,
    pub details: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Package {
    pub id: String,
    pub tracking_number: String,
    pub client_id: String,
    pub recipient_name: String,
    pub recipient_address: String,
    pub status: PackageStatus,
    pub shipping_type: ShippingType,
    pub driver_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Error, PartialEq)]
pub enum HistoryError {
    #[error("history entry {index} is older than the entry before it")]
    OutOfOrder { index: usize },

    #[error("latest history status {recorded} does not match current status {current}")]
    StatusMismatch {
        recorded: PackageStatus,
        current: PackageStatus,
    },
}

impl Package {
    pub fn is_assigned(&self) -> bool {
        self.driver_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn latest_event(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    /// Checks the backend-owned history invariants: timestamps never go
    /// backwards and the newest entry agrees with `status`. An empty history
    /// is accepted.
    pub fn check_history(&self) -> Result<(), HistoryError> {
        for (index, pair) in self.history.windows(2).enumerate() {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(HistoryError::OutOfOrder { index: index + 1 });
            }
        }

        match self.history.last() {
            Some(last) if last.status != self.status => Err(HistoryError::StatusMismatch {
                recorded: last.status,
                current: self.status,
            }),
            _ => Ok(()),
        }
    }
}

// Request models

/// Metadata sent along with a status change.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct StatusChange {
    pub location: Option<String>,
    pub details: Option<String>,
    #[serde(default)]
    pub admin_override: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PackageStatusUpdate {
    pub status: PackageStatus,
    #[serde(flatten)]
    pub metadata: StatusChange,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DriverAssignment {
    pub driver_id: String,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct PackageEdit {
    pub recipient_name: Option<String>,
    pub recipient_address: Option<String>,
    pub shipping_type: Option<ShippingType>,
}

impl PackageEdit {
    pub fn is_empty(&self) -> bool {
        self.recipient_name.is_none()
            && self.recipient_address.is_none()
            && self.shipping_type.is_none()
    }

    pub fn apply_to(&self, package: &mut Package) {
        if let Some(name) = &self.recipient_name {
            package.recipient_name = name.clone();
        }
        if let Some(address) = &self.recipient_address {
            package.recipient_address = address.clone();
        }
        if let Some(shipping_type) = self.shipping_type {
            package.shipping_type = shipping_type;
        }
    }
}

// Search and filter models

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct PackageFilter {
    pub status: Option<PackageStatus>,
    pub shipping_type: Option<ShippingType>,
    pub driver_id: Option<String>,
    #[serde(default)]
    pub unassigned_only: bool,
    pub search: Option<String>,
    pub created: Option<DateRange>,
}

impl PackageFilter {
    /// Backend-side matching, used by the in-memory collaborator.
    pub fn matches(&self, package: &Package) -> bool {
        if self.status.is_some_and(|status| status != package.status) {
            return false;
        }
        if self
            .shipping_type
            .is_some_and(|shipping_type| shipping_type != package.shipping_type)
        {
            return false;
        }
        if let Some(driver_id) = &self.driver_id {
            if package.driver_id.as_ref() != Some(driver_id) {
                return false;
            }
        }
        if self.unassigned_only && package.is_assigned() {
            return false;
        }
        if let Some(range) = &self.created {
            if !range.contains(package.created_at.date_naive()) {
                return false;
            }
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let haystacks = [
                &package.id,
                &package.tracking_number,
                &package.recipient_name,
                &package.recipient_address,
            ];
            if !haystacks.iter().any(|h| h.to_lowercase().contains(&term)) {
                return false;
            }
        }
        true
    }

    /// Query parameters understood by the backend's list endpoint.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(status) = self.status {
            query.push(("status", status.to_string()));
        }
        if let Some(shipping_type) = self.shipping_type {
            query.push(("shipping_type", shipping_type.to_string()));
        }
        if let Some(driver_id) = &self.driver_id {
            query.push(("driver_id", driver_id.clone()));
        }
        if self.unassigned_only {
            query.push(("unassigned", "true".to_string()));
        }
        if let Some(search) = &self.search {
            query.push(("search", search.clone()));
        }
        if let Some(range) = &self.created {
            query.push(("from", range.start.to_string()));
            query.push(("to", range.end.to_string()));
        }
        query
    }
}

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.page_size as usize
    }

    pub fn total_pages(&self, total_count: u64) -> u32 {
        if self.page_size == 0 {
            return 0;
        }
        total_count.div_ceil(self.page_size as u64) as u32
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PackagePage {
    pub items: Vec<Package>,
    pub total_count: u64,
}
