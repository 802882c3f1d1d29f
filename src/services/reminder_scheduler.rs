use barberbook::store::AppointmentStore;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::with_store;
use crate::channels::Notifier;
use crate::observability::alerts::Severity;
use crate::observability::{ALERTS, METRICS};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub due: usize,
    pub reminded: usize,
    pub skipped: usize,
}

impl SweepReport {
    fn absorb(&mut self, other: SweepReport) {
        self.due += other.due;
        self.reminded += other.reminded;
        self.skipped += other.skipped;
    }
}

/// Longest gap the loop makes up for after a stall.
const MAX_CATCH_UP_MINUTES: i64 = 15;

fn start_of_minute(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

/// Time until the next whole minute, so ticks land just after `:00`.
fn until_next_minute(now: DateTime<Utc>) -> Duration {
    let next = start_of_minute(now) + ChronoDuration::minutes(1);
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Every whole minute after `last_swept` up to the minute of `now`. Sweeps
/// match one exact `HH:MM`, so a late tick must still cover the minutes it
/// jumped over.
pub fn minutes_to_sweep(last_swept: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let current = start_of_minute(now);

    let first = match last_swept {
        None => current,
        Some(last) if last >= current => return Vec::new(),
        Some(last) => std::cmp::max(
            last + ChronoDuration::minutes(1),
            current - ChronoDuration::minutes(MAX_CATCH_UP_MINUTES - 1),
        ),
    };

    let mut minutes = Vec::new();
    let mut minute = first;
    while minute <= current {
        minutes.push(minute);
        minute += ChronoDuration::minutes(1);
    }
    minutes
}

/// Date and `HH:MM` slot that starts `lead_minutes` after `now`, in the
/// shop's time zone.
pub fn reminder_target(now: DateTime<Utc>, timezone: Tz, lead_minutes: i64) -> (NaiveDate, String) {
    let target = (now + ChronoDuration::minutes(lead_minutes)).with_timezone(&timezone);
    (
        target.date_naive(),
        format!("{:02}:{:02}", target.hour(), target.minute()),
    )
}

pub struct ReminderScheduler {
    store: Arc<dyn AppointmentStore>,
    notifier: Notifier,
    timezone: Tz,
    lead_minutes: i64,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        notifier: Notifier,
        timezone: Tz,
        lead_minutes: i64,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            timezone,
            lead_minutes,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    fn task_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("ReminderScheduler mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_slot()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Starts the periodic sweep. Calling it while running does nothing.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task_slot();
        if task.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
            tracing::debug!("Reminder scheduler already running");
            return;
        }

        self.shutdown.store(false, Ordering::Relaxed);
        let scheduler = Arc::clone(self);

        *task = Some(tokio::spawn(async move {
            tracing::info!(
                "Starting reminder scheduler (every {:?}, {} min lead)",
                scheduler.interval,
                scheduler.lead_minutes
            );

            let start = Instant::now() + until_next_minute(Utc::now());
            let mut ticker = tokio::time::interval_at(start, scheduler.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let mut last_swept = None;
            loop {
                if scheduler.shutdown.load(Ordering::Relaxed) {
                    tracing::info!("Reminder scheduler shutting down");
                    break;
                }

                let (_, swept) = scheduler.catch_up(last_swept, Utc::now()).await;
                last_swept = swept;
                ALERTS.clear_expired();

                ticker.tick().await;
            }
        }));
    }

    /// Stops the sweep. Safe to call when not running.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.task_slot().take() {
            handle.abort();
            tracing::info!("Reminder scheduler stopped");
        }
    }

    pub async fn trigger_now(&self) -> SweepReport {
        self.run_at(Utc::now()).await
    }

    /// Sweeps every minute `minutes_to_sweep` yields and returns the summed
    /// report with the last minute swept.
    pub async fn catch_up(
        &self,
        last_swept: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> (SweepReport, Option<DateTime<Utc>>) {
        let minutes = minutes_to_sweep(last_swept, now);
        if minutes.len() > 1 {
            tracing::debug!("Reminder sweep catching up {} minutes", minutes.len());
        }

        let mut report = SweepReport::default();
        let mut swept = last_swept;
        for minute in minutes {
            report.absorb(self.run_at(minute).await);
            swept = Some(minute);
        }

        (report, swept)
    }

    /// One sweep as if the clock read `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> SweepReport {
        if !self.notifier.any_enabled() {
            return SweepReport::default();
        }

        let (date, time) = reminder_target(now, self.timezone, self.lead_minutes);

        let lookup = time.clone();
        let due = match with_store(&self.store, move |store| store.due_for_reminder(date, &lookup)).await {
            Ok(due) => due,
            Err(e) => {
                tracing::error!("Failed to fetch due reminders: {}", e);
                METRICS.increment_errors();
                ALERTS
                    .send_alert(
                        &self.notifier.channels(),
                        Severity::Error,
                        "ReminderScheduler",
                        &format!("Failed to fetch due reminders: {}", e),
                    )
                    .await;
                return SweepReport::default();
            }
        };

        let mut report = SweepReport {
            due: due.len(),
            ..SweepReport::default()
        };

        if due.is_empty() {
            return report;
        }

        tracing::info!("Found {} appointments due for a reminder at {} {}", due.len(), date, time);

        for appointment in due {
            let delivery = self.notifier.remind(&appointment).await;

            if !delivery.any() {
                tracing::info!(
                    "No reminder delivered for appointment {}, will retry next sweep",
                    appointment.id
                );
                report.skipped += 1;
                continue;
            }

            let id = appointment.id;
            match with_store(&self.store, move |store| store.mark_reminder_sent(id)).await {
                Ok(_) => {
                    METRICS.increment_reminders();
                    report.reminded += 1;
                }
                Err(e) => {
                    tracing::error!(
                        "Sent reminder for appointment {} but failed to mark it: {}",
                        appointment.id,
                        e
                    );
                    METRICS.increment_errors();
                    ALERTS
                        .send_alert(
                            &self.notifier.channels(),
                            Severity::Warning,
                            "ReminderScheduler",
                            &format!(
                                "Reminder for appointment {} sent but not marked, it may be sent again",
                                appointment.id
                            ),
                        )
                        .await;
                    report.skipped += 1;
                }
            }
        }

        report
    }
}
