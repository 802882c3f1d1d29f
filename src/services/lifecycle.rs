use barberbook::models::AppointmentStatus;
use barberbook::store::AppointmentStore;
use barberbook::ResolveOutcome;
use serde::Serialize;
use std::sync::Arc;

use super::{validation, with_store, ServiceError};
use crate::channels::{DeliveryReport, Notifier};
use crate::observability::METRICS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Confirm,
    Reject,
}

impl AdminAction {
    pub fn parse(s: &str) -> Option<AdminAction> {
        match s {
            "confirm" => Some(AdminAction::Confirm),
            "reject" => Some(AdminAction::Reject),
            _ => None,
        }
    }

    pub fn target_status(&self) -> AppointmentStatus {
        match self {
            AdminAction::Confirm => AppointmentStatus::Confirmed,
            AdminAction::Reject => AppointmentStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub status: AppointmentStatus,
    pub notifications: DeliveryReport,
}

/// Moves pending appointments to a terminal status and tells the client.
#[derive(Clone)]
pub struct LifecycleController {
    store: Arc<dyn AppointmentStore>,
    notifier: Notifier,
}

impl LifecycleController {
    pub fn new(store: Arc<dyn AppointmentStore>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    pub fn parse_action(raw: Option<&str>) -> Result<AdminAction, ServiceError> {
        let raw = raw.map(str::trim).filter(|a| !a.is_empty());
        match raw {
            None => Err(validation("Missing id or action")),
            Some(a) => AdminAction::parse(a).ok_or_else(|| validation("Invalid action")),
        }
    }

    /// The status change is committed before any notification is attempted,
    /// and notification failures never undo it.
    pub async fn apply_action(&self, id: i32, action: AdminAction) -> Result<ActionOutcome, ServiceError> {
        let status = action.target_status();

        let resolved = with_store(&self.store, move |store| store.resolve_pending(id, status)).await?;

        let appointment = match resolved {
            ResolveOutcome::Resolved(appointment) => appointment,
            ResolveOutcome::NotFound => {
                return Err(ServiceError::NotFound("Appointment not found".into()))
            }
            ResolveOutcome::AlreadyResolved(current) => {
                return Err(ServiceError::Conflict(format!(
                    "Appointment already {}",
                    current.as_str()
                )))
            }
        };

        METRICS.increment_resolved(status.as_str());
        tracing::info!("Appointment {} is now {}", id, status.as_str());

        let notifications = match action {
            AdminAction::Confirm => self.notifier.confirm(&appointment).await,
            AdminAction::Reject => self.notifier.reject(&appointment).await,
        };

        Ok(ActionOutcome {
            status,
            notifications,
        })
    }
}
