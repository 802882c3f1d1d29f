use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub struct Metrics {
    pub bookings_created: AtomicU64,
    pub booking_conflicts: AtomicU64,
    pub bookings_blocked: AtomicU64,
    pub appointments_confirmed: AtomicU64,
    pub appointments_rejected: AtomicU64,
    pub notifications_sent: AtomicU64,
    pub notifications_failed: AtomicU64,
    pub reminders_sent: AtomicU64,
    pub subscribers_registered: AtomicU64,
    pub errors: AtomicU64,
    pub start_time: Instant,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub bookings_created: u64,
    pub booking_conflicts: u64,
    pub bookings_blocked: u64,
    pub appointments_confirmed: u64,
    pub appointments_rejected: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub reminders_sent: u64,
    pub subscribers_registered: u64,
    pub errors: u64,
    pub uptime_secs: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            bookings_created: AtomicU64::new(0),
            booking_conflicts: AtomicU64::new(0),
            bookings_blocked: AtomicU64::new(0),
            appointments_confirmed: AtomicU64::new(0),
            appointments_rejected: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            notifications_failed: AtomicU64::new(0),
            reminders_sent: AtomicU64::new(0),
            subscribers_registered: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn increment_bookings(&self) {
        self.bookings_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_conflicts(&self) {
        self.booking_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_blocked(&self) {
        self.bookings_blocked.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a status transition; `pending` is ignored.
    pub fn increment_resolved(&self, status: &str) {
        match status {
            "confirmed" => self.appointments_confirmed.fetch_add(1, Ordering::Relaxed),
            "rejected" => self.appointments_rejected.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };
    }

    pub fn increment_notifications_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_notifications_failed(&self) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reminders(&self) {
        self.reminders_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_subscribers(&self) {
        self.subscribers_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bookings_created: self.bookings_created.load(Ordering::Relaxed),
            booking_conflicts: self.booking_conflicts.load(Ordering::Relaxed),
            bookings_blocked: self.bookings_blocked.load(Ordering::Relaxed),
            appointments_confirmed: self.appointments_confirmed.load(Ordering::Relaxed),
            appointments_rejected: self.appointments_rejected.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            reminders_sent: self.reminders_sent.load(Ordering::Relaxed),
            subscribers_registered: self.subscribers_registered.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}
