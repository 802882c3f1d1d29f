use barberbook::catalog::BusinessCatalog;
use barberbook::store::AppointmentStore;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;

use crate::channels::Notifier;
use crate::services::admin::AdminService;
use crate::services::auth::{AdminAuth, AdminCredentials, SESSION_TTL};
use crate::services::booking::BookingService;
use crate::services::lifecycle::LifecycleController;
use crate::services::reminder_scheduler::ReminderScheduler;

pub struct ReminderSettings {
    pub timezone: Tz,
    pub lead_minutes: i64,
    pub interval: Duration,
}

/// Services shared by every HTTP worker. Built once in `main`.
pub struct AppContext {
    pub catalog: Arc<BusinessCatalog>,
    pub notifier: Notifier,
    pub booking: BookingService,
    pub lifecycle: LifecycleController,
    pub admin: AdminService,
    pub auth: AdminAuth,
    pub scheduler: Arc<ReminderScheduler>,
}

impl AppContext {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        catalog: Arc<BusinessCatalog>,
        notifier: Notifier,
        reminders: ReminderSettings,
        admin_credentials: Option<AdminCredentials>,
    ) -> Self {
        let booking = BookingService::new(store.clone(), catalog.clone(), notifier.clone());
        let lifecycle = LifecycleController::new(store.clone(), notifier.clone());
        let admin = AdminService::new(
            store.clone(),
            catalog.clone(),
            notifier.clone(),
            reminders.timezone,
        );
        let scheduler = Arc::new(ReminderScheduler::new(
            store,
            notifier.clone(),
            reminders.timezone,
            reminders.lead_minutes,
            reminders.interval,
        ));

        Self {
            catalog,
            notifier,
            booking,
            lifecycle,
            admin,
            auth: AdminAuth::new(admin_credentials, SESSION_TTL),
            scheduler,
        }
    }

    pub fn language(&self) -> &str {
        self.catalog.language()
    }
}
