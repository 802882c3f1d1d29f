use barberbook::catalog::BusinessCatalog;
use barberbook::models::{Appointment, BlockedPhone, BookingStats};
use barberbook::store::AppointmentStore;
use barberbook::validation::{normalize_phone, parse_iso_date, sanitize_name};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::{validation, ServiceError};
use crate::channels::Notifier;

const SEARCH_LIMIT: i64 = 100;
const NOTIFICATION_LIMIT: i64 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub visits: u32,
    pub total_spent: i64,
    pub last_visit: NaiveDate,
}

/// Confirmed visits grouped per normalized phone, most loyal first. Name and
/// email follow the latest visit.
pub fn aggregate_clients(appointments: &[Appointment], country_code: &str) -> Vec<ClientSummary> {
    let mut clients: HashMap<String, ClientSummary> = HashMap::new();

    for appointment in appointments {
        let phone = normalize_phone(&appointment.client_phone, country_code);
        if phone.is_empty() {
            continue;
        }

        let entry = clients
            .entry(phone.clone())
            .or_insert_with(|| ClientSummary {
                name: appointment.client_name.clone(),
                phone,
                email: appointment.email().map(str::to_string),
                visits: 0,
                total_spent: 0,
                last_visit: appointment.date,
            });

        entry.visits += 1;
        entry.total_spent += i64::from(appointment.price);

        if appointment.date > entry.last_visit {
            entry.name = appointment.client_name.clone();
            entry.last_visit = appointment.date;
            if let Some(email) = appointment.email() {
                entry.email = Some(email.to_string());
            }
        }
    }

    let mut summaries: Vec<ClientSummary> = clients.into_values().collect();
    summaries.sort_by(|a, b| {
        b.visits
            .cmp(&a.visits)
            .then(b.total_spent.cmp(&a.total_spent))
            .then(a.phone.cmp(&b.phone))
    });
    summaries
}

#[derive(Debug, Clone, Serialize)]
pub struct TelegramStatus {
    pub enabled: bool,
    pub subscribers: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailStatus {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationStatus {
    pub telegram: TelegramStatus,
    pub email: EmailStatus,
}

/// Back-office queries and edits.
#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn AppointmentStore>,
    catalog: Arc<BusinessCatalog>,
    notifier: Notifier,
    timezone: Tz,
}

impl AdminService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        catalog: Arc<BusinessCatalog>,
        notifier: Notifier,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            timezone,
        }
    }

    fn normalize(&self, phone: Option<&str>, missing: &str) -> Result<String, ServiceError> {
        let phone = phone.map(str::trim).filter(|p| !p.is_empty()).ok_or_else(|| validation(missing))?;
        Ok(normalize_phone(phone, self.catalog.country_code()))
    }

    pub fn search(&self, search: Option<&str>) -> Result<Vec<Appointment>, ServiceError> {
        Ok(self.store.search_appointments(search, SEARCH_LIMIT)?)
    }

    pub fn stats(&self) -> Result<BookingStats, ServiceError> {
        let today = Utc::now().with_timezone(&self.timezone).date_naive();
        Ok(self.store.stats(today)?)
    }

    pub fn pending_notifications(&self) -> Result<Vec<Appointment>, ServiceError> {
        Ok(self.store.recent_pending(NOTIFICATION_LIMIT)?)
    }

    pub fn rename_appointment(&self, id: Option<i32>, client_name: Option<&str>) -> Result<(), ServiceError> {
        let (id, name) = match (id, client_name.map(sanitize_name).filter(|n| !n.is_empty())) {
            (Some(id), Some(name)) => (id, name),
            _ => return Err(validation("Missing id or clientName")),
        };

        if !self.store.rename_appointment(id, &name)? {
            return Err(ServiceError::NotFound("Appointment not found".into()));
        }
        Ok(())
    }

    pub fn rename_client(&self, phone: Option<&str>, client_name: Option<&str>) -> Result<usize, ServiceError> {
        let name = client_name
            .map(sanitize_name)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| validation("Missing phone or clientName"))?;
        let phone = self.normalize(phone, "Missing phone or clientName")?;

        match self.store.rename_client(&phone, &name)? {
            0 => Err(ServiceError::NotFound(
                "No appointments found for this phone".into(),
            )),
            updated => Ok(updated),
        }
    }

    pub fn clients(&self) -> Result<Vec<ClientSummary>, ServiceError> {
        let confirmed = self.store.confirmed_appointments()?;
        Ok(aggregate_clients(&confirmed, self.catalog.country_code()))
    }

    pub fn schedule(&self, date: Option<&str>) -> Result<Vec<Appointment>, ServiceError> {
        let date = date
            .and_then(|d| parse_iso_date(d.trim()))
            .ok_or_else(|| validation("Valid date required (YYYY-MM-DD)"))?;
        Ok(self.store.day_schedule(date)?)
    }

    pub fn notification_status(&self) -> NotificationStatus {
        let subscribers = self.store.count_subscribers().unwrap_or_else(|e| {
            tracing::error!("Failed to count subscribers: {}", e);
            0
        });

        NotificationStatus {
            telegram: TelegramStatus {
                enabled: self.notifier.telegram_enabled(),
                subscribers,
            },
            email: EmailStatus {
                enabled: self.notifier.email_enabled(),
            },
        }
    }

    pub fn block_phone(&self, phone: Option<&str>, reason: Option<&str>) -> Result<String, ServiceError> {
        let phone = self.normalize(phone, "Missing phone number")?;
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());

        self.store.block_phone(&phone, reason)?;
        tracing::info!("Blocked phone {}", phone);
        Ok(phone)
    }

    pub fn unblock_phone(&self, phone: Option<&str>) -> Result<String, ServiceError> {
        let phone = self.normalize(phone, "Missing phone number")?;

        if self.store.unblock_phone(&phone)? {
            tracing::info!("Unblocked phone {}", phone);
        }
        Ok(phone)
    }

    pub fn blocked_phones(&self) -> Result<Vec<BlockedPhone>, ServiceError> {
        Ok(self.store.blocked_phones()?)
    }
}
