use async_trait::async_trait;
use barberbook::catalog::BusinessCatalog;
use barberbook::db::DbError;
use barberbook::models::{
    Appointment, AppointmentStatus, BlockedPhone, BookingStats, NewAppointment, Subscriber,
};
use barberbook::store::AppointmentStore;
use barberbook::validation::{generate_confirmation_code, parse_iso_date};
use barberbook::{BookingOutcome, ResolveOutcome};
use chrono::{NaiveDate, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::channels::{ChannelError, ChannelKind, DisabledChannel, NotificationChannel, Notifier};
use crate::services::booking::BookingRequest;

pub fn sample_catalog() -> BusinessCatalog {
    BusinessCatalog::from_json(include_str!("../business.json")).unwrap()
}

pub fn sample_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

pub fn sample_appointment(id: i32, status: &str) -> Appointment {
    Appointment {
        id,
        date: sample_date(),
        time: "10:00".into(),
        service: "Haircut".into(),
        price: 25,
        client_name: "Georgi".into(),
        client_phone: "0888123456".into(),
        client_email: None,
        confirmation_code: "EB-ABC123".into(),
        status: status.into(),
        reminder_sent: false,
        created_at: Utc::now(),
    }
}

pub fn booking_request(date: &str, time: &str) -> BookingRequest {
    BookingRequest {
        date: Some(date.into()),
        time: Some(time.into()),
        service: Some("Haircut".into()),
        client_name: Some("Georgi".into()),
        client_phone: Some("0888123456".into()),
        client_email: None,
    }
}

/// Inserts a pending appointment for 0888123456 on 2024-06-01.
pub fn insert_appointment(store: &MemoryStore, time: &str, email: Option<&str>) -> i32 {
    let new_appointment = NewAppointment {
        date: sample_date(),
        time: time.into(),
        service: "Haircut".into(),
        price: 25,
        client_name: "Georgi".into(),
        client_phone: "0888123456".into(),
        client_email: email.map(str::to_string),
        confirmation_code: generate_confirmation_code("EB"),
    };

    match store.create_booking(&new_appointment).unwrap() {
        BookingOutcome::Created(appointment) => appointment.id,
        other => panic!("could not insert test appointment: {:?}", other),
    }
}

pub fn disabled_notifier() -> Notifier {
    Notifier::new(
        Arc::new(DisabledChannel(ChannelKind::Telegram)),
        Arc::new(DisabledChannel(ChannelKind::Email)),
        Duration::from_secs(10),
    )
}

fn test_store_error() -> DbError {
    DbError::DieselError(diesel::result::Error::BrokenTransactionManager)
}

#[derive(Default)]
struct MemoryState {
    appointments: Vec<Appointment>,
    blocked: Vec<BlockedPhone>,
    subscribers: Vec<Subscriber>,
    next_id: i32,
    code_collisions: usize,
    failing_reads: usize,
}

/// In-memory store with the same atomicity as the database: every operation
/// runs under one lock.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn all_appointments(&self) -> Vec<Appointment> {
        self.state().appointments.clone()
    }

    /// The next `n` bookings report a confirmation code collision.
    pub fn force_code_collisions(&self, n: usize) {
        self.state().code_collisions = n;
    }

    /// The next `n` reminder queries fail.
    pub fn fail_next_reads(&self, n: usize) {
        self.state().failing_reads = n;
    }
}

fn status_rank(status: &str) -> u8 {
    match AppointmentStatus::parse(status) {
        Some(AppointmentStatus::Pending) => 0,
        Some(AppointmentStatus::Confirmed) => 1,
        _ => 2,
    }
}

fn occupies_slot(appointment: &Appointment) -> bool {
    appointment
        .status_enum()
        .map(|s| s.occupies_slot())
        .unwrap_or(false)
}

impl AppointmentStore for MemoryStore {
    fn day_bookings(&self, date: NaiveDate) -> Result<Vec<(String, String)>, DbError> {
        Ok(self
            .state()
            .appointments
            .iter()
            .filter(|a| a.date == date && occupies_slot(a))
            .map(|a| (a.time.clone(), a.status.clone()))
            .collect())
    }

    fn create_booking(&self, new_appointment: &NewAppointment) -> Result<BookingOutcome, DbError> {
        let mut state = self.state();

        if state.code_collisions > 0 {
            state.code_collisions -= 1;
            return Ok(BookingOutcome::DuplicateCode);
        }

        if state.blocked.iter().any(|b| b.phone == new_appointment.client_phone) {
            return Ok(BookingOutcome::PhoneBlocked);
        }

        let taken = state.appointments.iter().any(|a| {
            a.date == new_appointment.date && a.time == new_appointment.time && occupies_slot(a)
        });
        if taken {
            return Ok(BookingOutcome::SlotTaken);
        }

        if state
            .appointments
            .iter()
            .any(|a| a.confirmation_code == new_appointment.confirmation_code)
        {
            return Ok(BookingOutcome::DuplicateCode);
        }

        state.next_id += 1;
        let appointment = Appointment {
            id: state.next_id,
            date: new_appointment.date,
            time: new_appointment.time.clone(),
            service: new_appointment.service.clone(),
            price: new_appointment.price,
            client_name: new_appointment.client_name.clone(),
            client_phone: new_appointment.client_phone.clone(),
            client_email: new_appointment.client_email.clone(),
            confirmation_code: new_appointment.confirmation_code.clone(),
            status: AppointmentStatus::Pending.as_str().to_string(),
            reminder_sent: false,
            created_at: Utc::now(),
        };
        state.appointments.push(appointment.clone());

        Ok(BookingOutcome::Created(appointment))
    }

    fn find_by_id(&self, id: i32) -> Result<Option<Appointment>, DbError> {
        Ok(self.state().appointments.iter().find(|a| a.id == id).cloned())
    }

    fn find_by_code(&self, code: &str) -> Result<Option<Appointment>, DbError> {
        Ok(self
            .state()
            .appointments
            .iter()
            .find(|a| a.confirmation_code == code)
            .cloned())
    }

    fn resolve_pending(&self, id: i32, status: AppointmentStatus) -> Result<ResolveOutcome, DbError> {
        let mut state = self.state();

        let appointment = match state.appointments.iter_mut().find(|a| a.id == id) {
            Some(appointment) => appointment,
            None => return Ok(ResolveOutcome::NotFound),
        };

        match appointment.status_enum() {
            Some(AppointmentStatus::Pending) => {
                appointment.status = status.as_str().to_string();
                Ok(ResolveOutcome::Resolved(appointment.clone()))
            }
            Some(current) => Ok(ResolveOutcome::AlreadyResolved(current)),
            None => Ok(ResolveOutcome::NotFound),
        }
    }

    fn due_for_reminder(&self, date: NaiveDate, time: &str) -> Result<Vec<Appointment>, DbError> {
        let mut state = self.state();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(test_store_error());
        }

        Ok(state
            .appointments
            .iter()
            .filter(|a| {
                a.date == date
                    && a.time == time
                    && a.status == AppointmentStatus::Confirmed.as_str()
                    && !a.reminder_sent
            })
            .cloned()
            .collect())
    }

    fn mark_reminder_sent(&self, id: i32) -> Result<bool, DbError> {
        let mut state = self.state();
        match state.appointments.iter_mut().find(|a| a.id == id) {
            Some(appointment) => {
                appointment.reminder_sent = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn is_phone_blocked(&self, phone: &str) -> Result<bool, DbError> {
        Ok(self.state().blocked.iter().any(|b| b.phone == phone))
    }

    fn block_phone(&self, phone: &str, reason: Option<&str>) -> Result<(), DbError> {
        let mut state = self.state();
        if !state.blocked.iter().any(|b| b.phone == phone) {
            let id = state.blocked.len() as i32 + 1;
            state.blocked.push(BlockedPhone {
                id,
                phone: phone.to_string(),
                reason: reason.map(str::to_string),
                blocked_at: Utc::now(),
            });
        }
        Ok(())
    }

    fn unblock_phone(&self, phone: &str) -> Result<bool, DbError> {
        let mut state = self.state();
        let before = state.blocked.len();
        state.blocked.retain(|b| b.phone != phone);
        Ok(state.blocked.len() < before)
    }

    fn blocked_phones(&self) -> Result<Vec<BlockedPhone>, DbError> {
        let mut blocked = self.state().blocked.clone();
        blocked.sort_by(|a, b| b.blocked_at.cmp(&a.blocked_at));
        Ok(blocked)
    }

    fn upsert_subscriber(&self, chat_id: i64, phone: &str, name: &str) -> Result<Subscriber, DbError> {
        let mut state = self.state();
        state
            .subscribers
            .retain(|s| s.chat_id != chat_id && s.phone != phone);

        let subscriber = Subscriber {
            id: state.subscribers.len() as i32 + 1,
            chat_id,
            phone: phone.to_string(),
            name: name.to_string(),
            subscribed_at: Utc::now(),
        };
        state.subscribers.push(subscriber.clone());
        Ok(subscriber)
    }

    fn find_subscriber_by_phone(&self, phone: &str) -> Result<Option<Subscriber>, DbError> {
        Ok(self
            .state()
            .subscribers
            .iter()
            .find(|s| s.phone == phone)
            .cloned())
    }

    fn count_subscribers(&self) -> Result<i64, DbError> {
        Ok(self.state().subscribers.len() as i64)
    }

    fn search_appointments(&self, search: Option<&str>, limit: i64) -> Result<Vec<Appointment>, DbError> {
        let term = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let day = term.as_deref().and_then(parse_iso_date);

        let mut found: Vec<Appointment> = self
            .state()
            .appointments
            .iter()
            .filter(|a| match &term {
                None => true,
                Some(term) => {
                    a.client_name.to_lowercase().contains(term)
                        || a.client_phone.contains(term.as_str())
                        || a.confirmation_code.to_lowercase().contains(term)
                        || a.email().map(|e| e.contains(term.as_str())).unwrap_or(false)
                        || Some(a.date) == day
                }
            })
            .cloned()
            .collect();

        found.sort_by(|a, b| {
            status_rank(&a.status)
                .cmp(&status_rank(&b.status))
                .then(b.date.cmp(&a.date))
                .then(b.time.cmp(&a.time))
        });
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    fn stats(&self, today: NaiveDate) -> Result<BookingStats, DbError> {
        let state = self.state();
        let pending = |a: &&Appointment| a.status == AppointmentStatus::Pending.as_str();

        Ok(BookingStats {
            total: state.appointments.len() as i64,
            pending: state.appointments.iter().filter(pending).count() as i64,
            revenue: state
                .appointments
                .iter()
                .filter(|a| a.status == AppointmentStatus::Confirmed.as_str())
                .map(|a| i64::from(a.price))
                .sum(),
            today_pending: state
                .appointments
                .iter()
                .filter(pending)
                .filter(|a| a.date == today)
                .count() as i64,
        })
    }

    fn recent_pending(&self, limit: i64) -> Result<Vec<Appointment>, DbError> {
        let mut pending: Vec<Appointment> = self
            .state()
            .appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Pending.as_str())
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    fn day_schedule(&self, date: NaiveDate) -> Result<Vec<Appointment>, DbError> {
        let mut day: Vec<Appointment> = self
            .state()
            .appointments
            .iter()
            .filter(|a| a.date == date && occupies_slot(a))
            .cloned()
            .collect();
        day.sort_by(|a, b| a.time.cmp(&b.time));
        Ok(day)
    }

    fn confirmed_appointments(&self) -> Result<Vec<Appointment>, DbError> {
        Ok(self
            .state()
            .appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Confirmed.as_str())
            .cloned()
            .collect())
    }

    fn rename_appointment(&self, id: i32, name: &str) -> Result<bool, DbError> {
        let mut state = self.state();
        match state.appointments.iter_mut().find(|a| a.id == id) {
            Some(appointment) => {
                appointment.client_name = name.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn rename_client(&self, phone: &str, name: &str) -> Result<usize, DbError> {
        let mut state = self.state();
        let mut updated = 0;
        for appointment in state.appointments.iter_mut().filter(|a| a.client_phone == phone) {
            appointment.client_name = name.to_string();
            updated += 1;
        }
        Ok(updated)
    }
}

/// Channel double that records what it was asked to deliver.
pub struct RecordingChannel {
    kind: ChannelKind,
    fail: bool,
    sent: Mutex<Vec<(String, i32)>>,
    alerts: Mutex<Vec<String>>,
}

impl RecordingChannel {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            fail: false,
            sent: Mutex::new(Vec::new()),
            alerts: Mutex::new(Vec::new()),
        }
    }

    /// Every delivery attempt errors.
    pub fn failing(kind: ChannelKind) -> Self {
        Self {
            fail: true,
            ..Self::new(kind)
        }
    }

    pub fn sent(&self) -> Vec<(String, i32)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }

    fn record(&self, what: &str, appointment: &Appointment) -> Result<bool, ChannelError> {
        if self.fail {
            return Err(ChannelError::Message("unavailable".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((what.to_string(), appointment.id));
        Ok(true)
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn send_confirmation(&self, _target: &str, appointment: &Appointment) -> Result<bool, ChannelError> {
        self.record("confirmation", appointment)
    }

    async fn send_rejection(&self, _target: &str, appointment: &Appointment) -> Result<bool, ChannelError> {
        if self.kind == ChannelKind::Telegram {
            return Ok(false);
        }
        self.record("rejection", appointment)
    }

    async fn send_reminder(&self, _target: &str, appointment: &Appointment) -> Result<bool, ChannelError> {
        self.record("reminder", appointment)
    }

    async fn notify_new_booking(&self, appointment: &Appointment) -> Result<bool, ChannelError> {
        self.record("new_booking", appointment)
    }

    async fn send_admin_alert(&self, text: &str) -> Result<bool, ChannelError> {
        self.alerts.lock().unwrap().push(text.to_string());
        Ok(true)
    }
}

/// Chat channel that answers only after `delay`.
pub struct SlowChannel {
    delay: Duration,
}

impl SlowChannel {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    async fn wait(&self) -> Result<bool, ChannelError> {
        tokio::time::sleep(self.delay).await;
        Ok(true)
    }
}

#[async_trait]
impl NotificationChannel for SlowChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn send_confirmation(&self, _target: &str, _appointment: &Appointment) -> Result<bool, ChannelError> {
        self.wait().await
    }

    async fn send_reminder(&self, _target: &str, _appointment: &Appointment) -> Result<bool, ChannelError> {
        self.wait().await
    }

    async fn notify_new_booking(&self, _appointment: &Appointment) -> Result<bool, ChannelError> {
        self.wait().await
    }

    async fn send_admin_alert(&self, _text: &str) -> Result<bool, ChannelError> {
        self.wait().await
    }
}
