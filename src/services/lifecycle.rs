// src/services/lifecycle.rs
//! Package status lifecycle and the action gates derived from it.
//!
//! The backend performs every transition. This module only decides which
//! actions the board may offer for a package in its current state, so an
//! invalid request is refused before it leaves the service.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::errors::DeskError;
use crate::models::{Package, PackageStatus};

#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("Invalid status transition from {from} to {to}")]
    NotAllowed { from: PackageStatus, to: PackageStatus },

    #[error("Transition from {from} to {to} requires an admin override")]
    AdminRequired { from: PackageStatus, to: PackageStatus },

    #[error("Package is already {0}")]
    Unchanged(PackageStatus),
}

/// Operator actions that are gated on package state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageAction {
    Edit,
    Delete,
    ReassignDriver,
    MarkForReturn,
    ConfirmReturn,
    UpdateStatus,
}

impl fmt::Display for PackageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackageAction::Edit => "edit",
            PackageAction::Delete => "delete",
            PackageAction::ReassignDriver => "reassign driver",
            PackageAction::MarkForReturn => "mark for return",
            PackageAction::ConfirmReturn => "confirm return",
            PackageAction::UpdateStatus => "update status",
        };
        f.write_str(name)
    }
}

/// Statuses reachable from `from` in one step.
pub fn next_statuses(from: PackageStatus) -> &'static [PackageStatus] {
    use PackageStatus::*;

    match from {
        Pending => &[PickedUp, Problem, ReturnPending],
        PickedUp => &[InTransit],
        InTransit => &[Delivered, Problem],
        Problem => &[ReturnPending, InTransit],
        ReturnPending => &[Returned],
        Delayed | Delivered | Returned => &[],
    }
}

/// Edges that only an administrator may take.
pub fn requires_admin(from: PackageStatus, to: PackageStatus) -> bool {
    matches!(
        (from, to),
        (PackageStatus::Pending, PackageStatus::ReturnPending)
            | (PackageStatus::Problem, PackageStatus::ReturnPending)
    )
}

pub fn can_transition(from: PackageStatus, to: PackageStatus) -> bool {
    next_statuses(from).contains(&to)
}

pub fn check_transition(
    from: PackageStatus,
    to: PackageStatus,
    admin_override: bool,
) -> Result<(), TransitionError> {
    if from == to {
        return Err(TransitionError::Unchanged(from));
    }
    if !can_transition(from, to) {
        return Err(TransitionError::NotAllowed { from, to });
    }
    if requires_admin(from, to) && !admin_override {
        return Err(TransitionError::AdminRequired { from, to });
    }
    Ok(())
}

pub fn can_edit(package: &Package) -> bool {
    package.status == PackageStatus::Pending
}

pub fn can_delete(package: &Package) -> bool {
    package.status == PackageStatus::Pending
}

pub fn can_reassign_driver(package: &Package) -> bool {
    !package.status.is_terminal()
}

pub fn can_mark_for_return(package: &Package) -> bool {
    package.status == PackageStatus::Problem
}

pub fn can_confirm_return(package: &Package) -> bool {
    package.status == PackageStatus::ReturnPending
}

pub fn is_allowed(action: PackageAction, package: &Package) -> bool {
    match action {
        PackageAction::Edit => can_edit(package),
        PackageAction::Delete => can_delete(package),
        PackageAction::ReassignDriver => can_reassign_driver(package),
        PackageAction::MarkForReturn => can_mark_for_return(package),
        PackageAction::ConfirmReturn => can_confirm_return(package),
        PackageAction::UpdateStatus => !next_statuses(package.status).is_empty(),
    }
}

pub fn ensure_allowed(action: PackageAction, package: &Package) -> Result<(), DeskError> {
    if is_allowed(action, package) {
        Ok(())
    } else {
        tracing::warn!("Refusing {} for package {} in status {}", action, package.id, package.status);
        Err(DeskError::ActionNotAllowed {
            action,
            status: package.status,
        })
    }
}

/// Per-row flags the front end uses to enable or hide controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionAvailability {
    pub edit: bool,
    pub delete: bool,
    pub reassign_driver: bool,
    pub mark_for_return: bool,
    pub confirm_return: bool,
}

impl ActionAvailability {
    pub fn for_package(package: &Package) -> Self {
        Self {
            edit: can_edit(package),
            delete: can_delete(package),
            reassign_driver: can_reassign_driver(package),
            mark_for_return: can_mark_for_return(package),
            confirm_return: can_confirm_return(package),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShippingType;
    use chrono::Utc;

    fn package(status: PackageStatus) -> Package {
        Package {
            id: "pkg-1".to_string(),
            tracking_number: "TRK-001".to_string(),
            client_id: "cli-1".to_string(),
            recipient_name: "Kofi Boateng".to_string(),
            recipient_address: "4 Liberation Ave".to_string(),
            status,
            shipping_type: ShippingType::NextDay,
            driver_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            history: Vec::new(),
        }
    }

    #[test]
    fn test_edit_and_delete_only_while_pending() {
        for status in PackageStatus::ALL {
            let pkg = package(status);
            let expected = status == PackageStatus::Pending;
            assert_eq!(can_edit(&pkg), expected, "edit for {}", status);
            assert_eq!(can_delete(&pkg), expected, "delete for {}", status);
        }
    }

    #[test]
    fn test_reassign_blocked_for_terminal_states() {
        for status in PackageStatus::ALL {
            let expected = !matches!(status, PackageStatus::Delivered | PackageStatus::Returned);
            assert_eq!(can_reassign_driver(&package(status)), expected, "reassign for {}", status);
        }
    }

    #[test]
    fn test_return_gates() {
        assert!(can_mark_for_return(&package(PackageStatus::Problem)));
        assert!(!can_mark_for_return(&package(PackageStatus::InTransit)));
        assert!(can_confirm_return(&package(PackageStatus::ReturnPending)));
        assert!(!can_confirm_return(&package(PackageStatus::Problem)));
    }

    #[test]
    fn test_transition_table() {
        assert!(check_transition(PackageStatus::Pending, PackageStatus::PickedUp, false).is_ok());
        assert!(check_transition(PackageStatus::PickedUp, PackageStatus::InTransit, false).is_ok());
        assert!(check_transition(PackageStatus::InTransit, PackageStatus::Delivered, false).is_ok());
        assert!(check_transition(PackageStatus::Problem, PackageStatus::InTransit, false).is_ok());
        assert!(check_transition(PackageStatus::ReturnPending, PackageStatus::Returned, false).is_ok());

        assert_eq!(
            check_transition(PackageStatus::Pending, PackageStatus::Delivered, false),
            Err(TransitionError::NotAllowed {
                from: PackageStatus::Pending,
                to: PackageStatus::Delivered,
            })
        );
        assert!(check_transition(PackageStatus::Delivered, PackageStatus::Returned, true).is_err());
        assert_eq!(
            check_transition(PackageStatus::InTransit, PackageStatus::InTransit, false),
            Err(TransitionError::Unchanged(PackageStatus::InTransit))
        );
    }

    #[test]
    fn test_admin_override_required_for_returns() {
        assert_eq!(
            check_transition(PackageStatus::Pending, PackageStatus::ReturnPending, false),
            Err(TransitionError::AdminRequired {
                from: PackageStatus::Pending,
                to: PackageStatus::ReturnPending,
            })
        );
        assert!(check_transition(PackageStatus::Pending, PackageStatus::ReturnPending, true).is_ok());
        assert!(check_transition(PackageStatus::Problem, PackageStatus::ReturnPending, true).is_ok());
    }

    #[test]
    fn test_ensure_allowed_error() {
        let err = ensure_allowed(PackageAction::Delete, &package(PackageStatus::InTransit)).unwrap_err();
        assert!(matches!(
            err,
            DeskError::ActionNotAllowed {
                action: PackageAction::Delete,
                status: PackageStatus::InTransit
            }
        ));
    }

    #[test]
    fn test_availability_flags() {
        let flags = ActionAvailability::for_package(&package(PackageStatus::Problem));
        assert!(!flags.edit);
        assert!(flags.reassign_driver);
        assert!(flags.mark_for_return);
        assert!(!flags.confirm_return);
    }
}
