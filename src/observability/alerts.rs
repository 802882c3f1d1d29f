use html_escape::encode_text;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::channels::NotificationChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Critical => "🚨",
            Severity::Error => "❌",
            Severity::Warning => "⚠️",
            Severity::Info => "ℹ️",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub severity: Severity,
    pub category: String,
}

/// Admin alerts, rate limited per severity and category. Disabled until
/// `set_enabled(true)` (driven by `ADMIN_LOGS=ACTIVE`).
pub struct AlertManager {
    rate_limit: Duration,
    enabled: AtomicBool,
    last_alerts: Mutex<HashMap<AlertKey, Instant>>,
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertManager {
    pub fn new() -> Self {
        Self::with_rate_limit(Duration::from_secs(60))
    }

    pub fn with_rate_limit(rate_limit: Duration) -> Self {
        Self {
            rate_limit,
            enabled: AtomicBool::new(false),
            last_alerts: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn should_alert(&self, severity: Severity, category: &str) -> bool {
        let key = AlertKey {
            severity,
            category: category.to_string(),
        };

        let mut last_alerts = match self.last_alerts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("AlertManager mutex poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let now = Instant::now();

        if let Some(last_time) = last_alerts.get(&key) {
            if now.duration_since(*last_time) < self.rate_limit {
                return false;
            }
        }

        last_alerts.insert(key, now);
        true
    }

    pub fn format_alert(&self, severity: Severity, category: &str, message: &str) -> String {
        format!(
            "{} <b>[{}]</b> {}\n{}",
            severity.emoji(),
            severity.label(),
            category,
            encode_text(message)
        )
    }

    pub fn clear_expired(&self) {
        let mut last_alerts = match self.last_alerts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("AlertManager mutex poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let now = Instant::now();

        last_alerts.retain(|_, last_time| now.duration_since(*last_time) < self.rate_limit);
    }

    /// Sends the alert over every enabled channel. Returns whether any
    /// channel accepted it.
    pub async fn send_alert(
        &self,
        channels: &[Arc<dyn NotificationChannel>],
        severity: Severity,
        category: &str,
        message: &str,
    ) -> bool {
        if !self.is_enabled() {
            return false;
        }

        if !self.should_alert(severity, category) {
            tracing::debug!("Alert rate-limited: {} - {}", category, message);
            return false;
        }

        let formatted = self.format_alert(severity, category, message);
        let mut delivered = false;

        for channel in channels.iter().filter(|c| c.is_enabled()) {
            match channel.send_admin_alert(&formatted).await {
                Ok(sent) => delivered |= sent,
                Err(e) => tracing::error!("Failed to send alert over {}: {}", channel.kind(), e),
            }
        }

        delivered
    }
}
