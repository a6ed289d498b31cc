// src/services/ordering.rs
use std::cmp::Ordering;

use crate::models::{Package, PackageStatus};

/// A package needs attention first when it is a time-critical shipment still
/// waiting for a driver, or when a return has been approved.
pub fn is_urgent(package: &Package) -> bool {
    let unassigned_rush = package.shipping_type.is_time_critical()
        && package.status == PackageStatus::Pending
        && !package.is_assigned();

    unassigned_rush || package.status == PackageStatus::ReturnPending
}

/// Lower ranks are shown earlier.
pub fn status_priority(status: PackageStatus) -> u8 {
    match status {
        PackageStatus::Problem => 1,
        PackageStatus::ReturnPending => 2,
        PackageStatus::Pending => 3,
        PackageStatus::Delayed => 4,
        PackageStatus::PickedUp => 5,
        PackageStatus::InTransit => 6,
        PackageStatus::Delivered => 7,
        PackageStatus::Returned => 8,
    }
}

/// Urgent before non-urgent, then by status priority, then most recently
/// updated first.
pub fn compare_for_display(a: &Package, b: &Package) -> Ordering {
    is_urgent(b)
        .cmp(&is_urgent(a))
        .then_with(|| status_priority(a.status).cmp(&status_priority(b.status)))
        .then_with(|| b.updated_at.cmp(&a.updated_at))
}

/// Reorders a snapshot for display. Nothing is added or removed and the sort
/// is stable, so fully equal rows keep the backend's order.
pub fn sort_for_display(mut packages: Vec<Package>) -> Vec<Package> {
    packages.sort_by(compare_for_display);
    packages
}
