// src/models/pickup.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PickupStatus {
    Scheduled,
    Completed,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PickupRequest {
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    pub address: String,
    pub driver_id: Option<String>,
    pub scheduled_for: NaiveDate,
    pub package_count: u32,
    pub status: PickupStatus,
}

/// All pickups one driver (or nobody, when unassigned) handles on one date.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PickupRun {
    pub driver_id: Option<String>,
    pub date: NaiveDate,
    pub stops: Vec<PickupRequest>,
    pub total_packages: u64,
    pub completed_stops: usize,
    pub pending_stops: usize,
}
