//! Process-wide counters and admin alerting.

pub mod alerts;
pub mod metrics;
pub mod startup;
pub mod telegram_errors;

use alerts::AlertManager;
use lazy_static::lazy_static;
use metrics::Metrics;

lazy_static! {
    /// Counters exposed on `/api/health`.
    pub static ref METRICS: Metrics = Metrics::new();
    /// Rate-limited admin alerts, off unless `ADMIN_LOGS=ACTIVE`.
    pub static ref ALERTS: AlertManager = AlertManager::new();
}
