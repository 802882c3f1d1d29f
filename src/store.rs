use chrono::NaiveDate;

use crate::db::{DbError, DbPool};
use crate::models::{Appointment, AppointmentStatus, BlockedPhone, BookingStats, NewAppointment, Subscriber};
use crate::{BookingOutcome, ResolveOutcome};

/// Persistence seam used by the services. Phones passed in are already
/// normalized.
pub trait AppointmentStore: Send + Sync {
    /// `(time, status)` of every appointment holding a slot on `date`.
    fn day_bookings(&self, date: NaiveDate) -> Result<Vec<(String, String)>, DbError>;

    /// Blocklist check, slot check and insert as one atomic step.
    fn create_booking(&self, new_appointment: &NewAppointment) -> Result<BookingOutcome, DbError>;

    fn find_by_id(&self, id: i32) -> Result<Option<Appointment>, DbError>;
    fn find_by_code(&self, code: &str) -> Result<Option<Appointment>, DbError>;

    /// Only a pending appointment can be resolved.
    fn resolve_pending(&self, id: i32, status: AppointmentStatus) -> Result<ResolveOutcome, DbError>;

    fn due_for_reminder(&self, date: NaiveDate, time: &str) -> Result<Vec<Appointment>, DbError>;
    fn mark_reminder_sent(&self, id: i32) -> Result<bool, DbError>;

    fn is_phone_blocked(&self, phone: &str) -> Result<bool, DbError>;
    fn block_phone(&self, phone: &str, reason: Option<&str>) -> Result<(), DbError>;
    fn unblock_phone(&self, phone: &str) -> Result<bool, DbError>;
    fn blocked_phones(&self) -> Result<Vec<BlockedPhone>, DbError>;

    fn upsert_subscriber(&self, chat_id: i64, phone: &str, name: &str) -> Result<Subscriber, DbError>;
    fn find_subscriber_by_phone(&self, phone: &str) -> Result<Option<Subscriber>, DbError>;
    fn count_subscribers(&self) -> Result<i64, DbError>;

    fn search_appointments(&self, search: Option<&str>, limit: i64) -> Result<Vec<Appointment>, DbError>;
    fn stats(&self, today: NaiveDate) -> Result<BookingStats, DbError>;
    fn recent_pending(&self, limit: i64) -> Result<Vec<Appointment>, DbError>;
    fn day_schedule(&self, date: NaiveDate) -> Result<Vec<Appointment>, DbError>;
    fn confirmed_appointments(&self) -> Result<Vec<Appointment>, DbError>;

    fn rename_appointment(&self, id: i32, name: &str) -> Result<bool, DbError>;
    fn rename_client(&self, phone: &str, name: &str) -> Result<usize, DbError>;
}

/// PostgreSQL store backed by the shared r2d2 pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl AppointmentStore for PgStore {
    fn day_bookings(&self, date: NaiveDate) -> Result<Vec<(String, String)>, DbError> {
        crate::find_active_slots_by_date(&self.pool, date)
    }

    fn create_booking(&self, new_appointment: &NewAppointment) -> Result<BookingOutcome, DbError> {
        crate::create_booking(&self.pool, new_appointment)
    }

    fn find_by_id(&self, id: i32) -> Result<Option<Appointment>, DbError> {
        crate::find_appointment_by_id(&self.pool, id)
    }

    fn find_by_code(&self, code: &str) -> Result<Option<Appointment>, DbError> {
        crate::find_appointment_by_code(&self.pool, code)
    }

    fn resolve_pending(&self, id: i32, status: AppointmentStatus) -> Result<ResolveOutcome, DbError> {
        crate::resolve_pending_appointment(&self.pool, id, status)
    }

    fn due_for_reminder(&self, date: NaiveDate, time: &str) -> Result<Vec<Appointment>, DbError> {
        crate::find_due_reminders(&self.pool, date, time)
    }

    fn mark_reminder_sent(&self, id: i32) -> Result<bool, DbError> {
        crate::mark_reminder_sent(&self.pool, id)
    }

    fn is_phone_blocked(&self, phone: &str) -> Result<bool, DbError> {
        crate::is_phone_blocked(&self.pool, phone)
    }

    fn block_phone(&self, phone: &str, reason: Option<&str>) -> Result<(), DbError> {
        crate::block_phone(&self.pool, phone, reason)
    }

    fn unblock_phone(&self, phone: &str) -> Result<bool, DbError> {
        crate::unblock_phone(&self.pool, phone)
    }

    fn blocked_phones(&self) -> Result<Vec<BlockedPhone>, DbError> {
        crate::get_blocked_phones(&self.pool)
    }

    fn upsert_subscriber(&self, chat_id: i64, phone: &str, name: &str) -> Result<Subscriber, DbError> {
        crate::upsert_subscriber(&self.pool, chat_id, phone, name)
    }

    fn find_subscriber_by_phone(&self, phone: &str) -> Result<Option<Subscriber>, DbError> {
        crate::find_subscriber_by_phone(&self.pool, phone)
    }

    fn count_subscribers(&self) -> Result<i64, DbError> {
        crate::count_subscribers(&self.pool)
    }

    fn search_appointments(&self, search: Option<&str>, limit: i64) -> Result<Vec<Appointment>, DbError> {
        crate::search_appointments(&self.pool, search, limit)
    }

    fn stats(&self, today: NaiveDate) -> Result<BookingStats, DbError> {
        crate::get_booking_stats(&self.pool, today)
    }

    fn recent_pending(&self, limit: i64) -> Result<Vec<Appointment>, DbError> {
        crate::find_recent_pending(&self.pool, limit)
    }

    fn day_schedule(&self, date: NaiveDate) -> Result<Vec<Appointment>, DbError> {
        crate::find_day_schedule(&self.pool, date)
    }

    fn confirmed_appointments(&self) -> Result<Vec<Appointment>, DbError> {
        crate::find_confirmed_appointments(&self.pool)
    }

    fn rename_appointment(&self, id: i32, name: &str) -> Result<bool, DbError> {
        crate::rename_appointment_client(&self.pool, id, name)
    }

    fn rename_client(&self, phone: &str, name: &str) -> Result<usize, DbError> {
        crate::rename_client_by_phone(&self.pool, phone, name)
    }
}
