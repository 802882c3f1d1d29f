use crate::schema::{appointments, blocked_phones, telegram_subscribers};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<AppointmentStatus> {
        match s {
            "pending" => Some(AppointmentStatus::Pending),
            "confirmed" => Some(AppointmentStatus::Confirmed),
            "rejected" => Some(AppointmentStatus::Rejected),
            _ => None,
        }
    }

    /// Confirmed and rejected appointments never change status again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppointmentStatus::Pending)
    }

    /// Statuses that hold their slot.
    pub fn occupies_slot(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed
        )
    }

    pub fn active() -> [&'static str; 2] {
        [
            AppointmentStatus::Pending.as_str(),
            AppointmentStatus::Confirmed.as_str(),
        ]
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = appointments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i32,
    pub date: NaiveDate,
    pub time: String,
    pub service: String,
    pub price: i32,
    pub client_name: String,
    pub client_phone: String,
    pub client_email: Option<String>,
    pub confirmation_code: String,
    pub status: String,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn status_enum(&self) -> Option<AppointmentStatus> {
        AppointmentStatus::parse(&self.status)
    }

    pub fn email(&self) -> Option<&str> {
        self.client_email.as_deref().filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = appointments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewAppointment {
    pub date: NaiveDate,
    pub time: String,
    pub service: String,
    pub price: i32,
    pub client_name: String,
    pub client_phone: String,
    pub client_email: Option<String>,
    pub confirmation_code: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = blocked_phones)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct BlockedPhone {
    pub id: i32,
    pub phone: String,
    pub reason: Option<String>,
    pub blocked_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = blocked_phones)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewBlockedPhone<'a> {
    pub phone: &'a str,
    pub reason: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = telegram_subscribers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subscriber {
    pub id: i32,
    pub chat_id: i64,
    pub phone: String,
    pub name: String,
    pub subscribed_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = telegram_subscribers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewSubscriber<'a> {
    pub chat_id: i64,
    pub phone: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingStats {
    pub total: i64,
    pub pending: i64,
    pub revenue: i64,
    pub today_pending: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_strings() {
        for status in [
            AppointmentStatus::Pending,
            AppointmentStatus::Confirmed,
            AppointmentStatus::Rejected,
        ] {
            assert_eq!(AppointmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AppointmentStatus::parse("cancelled"), None);
    }

    #[test]
    fn test_terminal_statuses_release_or_keep_slot() {
        assert!(!AppointmentStatus::Pending.is_terminal());
        assert!(AppointmentStatus::Confirmed.is_terminal());
        assert!(AppointmentStatus::Rejected.is_terminal());

        assert!(AppointmentStatus::Pending.occupies_slot());
        assert!(AppointmentStatus::Confirmed.occupies_slot());
        assert!(!AppointmentStatus::Rejected.occupies_slot());
    }
}
