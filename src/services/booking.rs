use barberbook::catalog::BusinessCatalog;
use barberbook::models::{AppointmentStatus, NewAppointment};
use barberbook::store::AppointmentStore;
use barberbook::validation::{
    generate_confirmation_code, normalize_phone, parse_iso_date, sanitize_email, sanitize_name,
    strip_phone,
};
use barberbook::BookingOutcome;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::{validation, ServiceError};
use crate::channels::Notifier;
use crate::observability::METRICS;

const MAX_CODE_ATTEMPTS: usize = 5;
const MIN_CODE_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Free,
    Pending,
    Confirmed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub time: String,
    pub status: SlotState,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingRequest {
    pub date: Option<String>,
    pub time: Option<String>,
    pub service: Option<String>,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub client_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub id: i32,
    pub confirmation_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLookup {
    pub found: bool,
    pub status: String,
    pub date: String,
    pub time: String,
    pub service: String,
    pub name: String,
}

fn required(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Public booking flow: slot availability, reservations and status lookups.
#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn AppointmentStore>,
    catalog: Arc<BusinessCatalog>,
    notifier: Notifier,
}

impl BookingService {
    pub fn new(store: Arc<dyn AppointmentStore>, catalog: Arc<BusinessCatalog>, notifier: Notifier) -> Self {
        Self {
            store,
            catalog,
            notifier,
        }
    }

    /// One entry per catalog slot, in catalog order.
    pub fn query_day_slots(&self, date: &str) -> Result<Vec<SlotStatus>, ServiceError> {
        if date.trim().is_empty() {
            return Err(validation("Date required"));
        }
        let date = parse_iso_date(date.trim())
            .ok_or_else(|| validation("Invalid date format. Use YYYY-MM-DD"))?;

        let booked: HashMap<String, SlotState> = self
            .store
            .day_bookings(date)?
            .into_iter()
            .filter_map(|(time, status)| {
                let state = match AppointmentStatus::parse(&status)? {
                    AppointmentStatus::Pending => SlotState::Pending,
                    AppointmentStatus::Confirmed => SlotState::Confirmed,
                    AppointmentStatus::Rejected => return None,
                };
                Some((time, state))
            })
            .collect();

        Ok(self
            .catalog
            .slots()
            .iter()
            .map(|time| SlotStatus {
                time: time.clone(),
                status: booked.get(time).copied().unwrap_or(SlotState::Free),
            })
            .collect())
    }

    fn validate(&self, request: &BookingRequest) -> Result<NewAppointment, ServiceError> {
        let (date, time, service, client_name, client_phone) = match (
            required(&request.date),
            required(&request.time),
            required(&request.service),
            required(&request.client_name),
            required(&request.client_phone),
        ) {
            (Some(d), Some(t), Some(s), Some(n), Some(p)) => (d, t, s, n, p),
            _ => return Err(validation("Missing required fields")),
        };

        let date = parse_iso_date(date).ok_or_else(|| validation("Invalid date format"))?;

        if !self.catalog.is_slot(time) {
            return Err(validation("Invalid time slot"));
        }

        let price = self
            .catalog
            .price_of(service)
            .ok_or_else(|| validation("Invalid service"))?;

        if !self.catalog.phone_matches(&strip_phone(client_phone)) {
            return Err(validation("Invalid phone number format"));
        }

        let client_email = sanitize_email(request.client_email.as_deref());
        if matches!(&client_email, Some(email) if !email.contains('@')) {
            return Err(validation("Invalid email format"));
        }

        let client_name = sanitize_name(client_name);
        if client_name.is_empty() {
            return Err(validation("Missing required fields"));
        }

        Ok(NewAppointment {
            date,
            time: time.to_string(),
            service: service.to_string(),
            price,
            client_name,
            client_phone: normalize_phone(client_phone, self.catalog.country_code()),
            client_email,
            confirmation_code: String::new(),
        })
    }

    pub fn book_slot(&self, request: &BookingRequest) -> Result<BookingConfirmation, ServiceError> {
        let mut new_appointment = self.validate(request)?;

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            new_appointment.confirmation_code =
                generate_confirmation_code(self.catalog.confirmation_prefix());

            match self.store.create_booking(&new_appointment)? {
                BookingOutcome::Created(appointment) => {
                    METRICS.increment_bookings();
                    tracing::info!(
                        "Booked {} {} for {} ({})",
                        appointment.date,
                        appointment.time,
                        appointment.client_phone,
                        appointment.confirmation_code
                    );

                    let confirmation = BookingConfirmation {
                        id: appointment.id,
                        confirmation_code: appointment.confirmation_code.clone(),
                    };
                    self.notifier.announce_new_booking(appointment);
                    return Ok(confirmation);
                }
                BookingOutcome::PhoneBlocked => {
                    METRICS.increment_blocked();
                    tracing::info!("Rejected booking from blocked phone {}", new_appointment.client_phone);
                    return Err(ServiceError::Blocked);
                }
                BookingOutcome::SlotTaken => {
                    METRICS.increment_conflicts();
                    return Err(ServiceError::Conflict("Slot already taken".into()));
                }
                BookingOutcome::DuplicateCode => {
                    tracing::warn!(
                        "Confirmation code {} collided (attempt {})",
                        new_appointment.confirmation_code,
                        attempt
                    );
                }
            }
        }

        Err(ServiceError::Internal(
            "Could not allocate a unique confirmation code".into(),
        ))
    }

    pub fn lookup_status(&self, code: &str) -> Result<StatusLookup, ServiceError> {
        let code = code.trim();
        if code.chars().count() < MIN_CODE_LEN {
            return Err(validation("Invalid code"));
        }

        let appointment = self
            .store
            .find_by_code(&code.to_uppercase())?
            .ok_or_else(|| ServiceError::NotFound("Appointment not found".into()))?;

        Ok(StatusLookup {
            found: true,
            status: appointment.status,
            date: appointment.date.format("%Y-%m-%d").to_string(),
            time: appointment.time,
            service: appointment.service,
            name: appointment.client_name,
        })
    }

    pub fn is_phone_blocked(&self, phone: &str) -> Result<bool, ServiceError> {
        if phone.trim().is_empty() {
            return Err(validation("Missing phone"));
        }
        let normalized = normalize_phone(phone, self.catalog.country_code());
        Ok(self.store.is_phone_blocked(&normalized)?)
    }
}
