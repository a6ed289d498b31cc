// src/services/pickup_runs.rs
use std::collections::BTreeMap;

use crate::models::{PickupRequest, PickupRun, PickupStatus};

/// Groups scheduled pickups into runs, one per driver and date.
///
/// Cancelled pickups are dropped. Runs come out by date, then driver id, with
/// the unassigned run last for its date. Stops are listed by client name.
pub fn group_pickup_runs(pickups: &[PickupRequest]) -> Vec<PickupRun> {
    // `Option<String>` orders None first; the flag puts unassigned runs last
    let mut runs: BTreeMap<_, Vec<PickupRequest>> = BTreeMap::new();
    for pickup in pickups.iter().filter(|p| p.status != PickupStatus::Cancelled) {
        // An empty driver id means unassigned, as for packages
        let driver_id = pickup.driver_id.clone().filter(|id| !id.is_empty());
        let key = (pickup.scheduled_for, driver_id.is_none(), driver_id);
        runs.entry(key).or_default().push(pickup.clone());
    }

    runs.into_iter()
        .map(|((date, _, driver_id), mut stops)| {
            stops.sort_by(|a, b| a.client_name.cmp(&b.client_name).then_with(|| a.id.cmp(&b.id)));
            let completed_stops = stops.iter().filter(|s| s.status == PickupStatus::Completed).count();

            PickupRun {
                driver_id,
                date,
                total_packages: stops.iter().map(|s| u64::from(s.package_count)).sum(),
                completed_stops,
                pending_stops: stops.len() - completed_stops,
                stops,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn pickup(id: &str, client: &str, driver: Option<&str>, day: u32, count: u32, status: PickupStatus) -> PickupRequest {
        PickupRequest {
            id: id.to_string(),
            client_id: format!("cli-{}", id),
            client_name: client.to_string(),
            address: "Spintex Road".to_string(),
            driver_id: driver.map(str::to_string),
            scheduled_for: NaiveDate::from_ymd_opt(2026, 6, day).unwrap(),
            package_count: count,
            status,
        }
    }

    #[test]
    fn test_grouping_and_totals() {
        let runs = group_pickup_runs(&[
            pickup("1", "Zenith Crafts", Some("drv-b"), 2, 5, PickupStatus::Scheduled),
            pickup("2", "Adom Foods", Some("drv-b"), 2, 3, PickupStatus::Completed),
            pickup("3", "Kente House", None, 2, 7, PickupStatus::Scheduled),
            pickup("4", "Bead Works", Some("drv-a"), 2, 2, PickupStatus::Scheduled),
            pickup("5", "Cancelled Co", Some("drv-a"), 2, 9, PickupStatus::Cancelled),
            pickup("6", "Early Bird", Some("drv-b"), 1, 1, PickupStatus::Completed),
        ]);

        let keys: Vec<(u32, Option<&str>)> = runs
            .iter()
            .map(|r| (chrono::Datelike::day(&r.date), r.driver_id.as_deref()))
            .collect();
        assert_eq!(keys, vec![(1, Some("drv-b")), (2, Some("drv-a")), (2, Some("drv-b")), (2, None)]);

        let run = &runs[2];
        assert_eq!(run.total_packages, 8);
        assert_eq!(run.completed_stops, 1);
        assert_eq!(run.pending_stops, 1);
        assert_eq!(run.stops[0].client_name, "Adom Foods");

        assert_eq!(runs[1].total_packages, 2);
        assert_eq!(runs[3].total_packages, 7);
    }

    #[test]
    fn test_blank_driver_joins_unassigned_run() {
        let runs = group_pickup_runs(&[
            pickup("1", "Adom Foods", None, 3, u32::MAX, PickupStatus::Scheduled),
            pickup("2", "Bead Works", Some(""), 3, u32::MAX, PickupStatus::Scheduled),
        ]);

        assert_eq!(runs.len(), 1);
        assert!(runs[0].driver_id.is_none());
        assert_eq!(runs[0].stops.len(), 2);
        assert_eq!(runs[0].total_packages, 2 * u64::from(u32::MAX));
    }

    #[test]
    fn test_empty_input() {
        assert!(group_pickup_runs(&[]).is_empty());
    }
}
