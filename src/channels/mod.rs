pub mod email;
pub mod telegram;

use async_trait::async_trait;
use barberbook::db::DbError;
use barberbook::models::Appointment;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::observability::METRICS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Telegram,
    Email,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Telegram => "telegram",
            ChannelKind::Email => "email",
        }
    }

    /// Where this channel reaches the client of `appointment`, if anywhere.
    pub fn target_for<'a>(&self, appointment: &'a Appointment) -> Option<&'a str> {
        match self {
            ChannelKind::Telegram => Some(appointment.client_phone.as_str()),
            ChannelKind::Email => appointment.email(),
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum ChannelError {
    Telegram(teloxide::RequestError),
    Smtp(lettre::transport::smtp::Error),
    Message(String),
    Lookup(DbError),
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::Telegram(e) => write!(f, "Telegram error: {}", e),
            ChannelError::Smtp(e) => write!(f, "SMTP error: {}", e),
            ChannelError::Message(e) => write!(f, "Message not sent: {}", e),
            ChannelError::Lookup(e) => write!(f, "Recipient lookup failed: {}", e),
        }
    }
}

impl std::error::Error for ChannelError {}

impl From<teloxide::RequestError> for ChannelError {
    fn from(err: teloxide::RequestError) -> Self {
        ChannelError::Telegram(err)
    }
}

impl From<lettre::transport::smtp::Error> for ChannelError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        ChannelError::Smtp(err)
    }
}

impl From<DbError> for ChannelError {
    fn from(err: DbError) -> Self {
        ChannelError::Lookup(err)
    }
}

/// An outbound notification transport. `Ok(false)` means the message had no
/// deliverable recipient, which is not an error.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    fn is_enabled(&self) -> bool;

    async fn send_confirmation(&self, target: &str, appointment: &Appointment) -> Result<bool, ChannelError>;

    async fn send_rejection(&self, _target: &str, _appointment: &Appointment) -> Result<bool, ChannelError> {
        Ok(false)
    }

    async fn send_reminder(&self, target: &str, appointment: &Appointment) -> Result<bool, ChannelError>;

    async fn notify_new_booking(&self, appointment: &Appointment) -> Result<bool, ChannelError>;

    async fn send_admin_alert(&self, text: &str) -> Result<bool, ChannelError>;
}

/// Stand-in for a channel whose configuration is absent.
pub struct DisabledChannel(pub ChannelKind);

#[async_trait]
impl NotificationChannel for DisabledChannel {
    fn kind(&self) -> ChannelKind {
        self.0
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn send_confirmation(&self, _target: &str, _appointment: &Appointment) -> Result<bool, ChannelError> {
        Ok(false)
    }

    async fn send_reminder(&self, _target: &str, _appointment: &Appointment) -> Result<bool, ChannelError> {
        Ok(false)
    }

    async fn notify_new_booking(&self, _appointment: &Appointment) -> Result<bool, ChannelError> {
        Ok(false)
    }

    async fn send_admin_alert(&self, _text: &str) -> Result<bool, ChannelError> {
        Ok(false)
    }
}

/// Runs one channel call under `timeout` and reduces it to "delivered or not".
pub async fn deliver<F>(kind: ChannelKind, what: &str, timeout: Duration, call: F) -> bool
where
    F: Future<Output = Result<bool, ChannelError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(true)) => {
            METRICS.increment_notifications_sent();
            tracing::info!("{} {} delivered", kind, what);
            true
        }
        Ok(Ok(false)) => {
            tracing::debug!("{} {} skipped: no recipient", kind, what);
            false
        }
        Ok(Err(e)) => {
            METRICS.increment_notifications_failed();
            tracing::warn!("{} {} failed: {}", kind, what, e);
            false
        }
        Err(_) => {
            METRICS.increment_notifications_failed();
            tracing::warn!("{} {} timed out after {:?}", kind, what, timeout);
            false
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub telegram: bool,
    pub email: bool,
}

impl DeliveryReport {
    pub fn any(&self) -> bool {
        self.telegram || self.email
    }
}

#[derive(Debug, Clone, Copy)]
enum ClientMessage {
    Confirmation,
    Rejection,
    Reminder,
}

impl ClientMessage {
    fn label(&self) -> &'static str {
        match self {
            ClientMessage::Confirmation => "confirmation",
            ClientMessage::Rejection => "rejection",
            ClientMessage::Reminder => "reminder",
        }
    }
}

/// Fans client messages out to the chat and email channels.
#[derive(Clone)]
pub struct Notifier {
    telegram: Arc<dyn NotificationChannel>,
    email: Arc<dyn NotificationChannel>,
    timeout: Duration,
}

impl Notifier {
    pub fn new(
        telegram: Arc<dyn NotificationChannel>,
        email: Arc<dyn NotificationChannel>,
        timeout: Duration,
    ) -> Self {
        Self {
            telegram,
            email,
            timeout,
        }
    }

    pub fn telegram_enabled(&self) -> bool {
        self.telegram.is_enabled()
    }

    pub fn email_enabled(&self) -> bool {
        self.email.is_enabled()
    }

    pub fn any_enabled(&self) -> bool {
        self.telegram_enabled() || self.email_enabled()
    }

    pub fn channels(&self) -> [Arc<dyn NotificationChannel>; 2] {
        [self.telegram.clone(), self.email.clone()]
    }

    async fn send_to(
        &self,
        channel: &dyn NotificationChannel,
        message: ClientMessage,
        appointment: &Appointment,
    ) -> bool {
        if !channel.is_enabled() {
            return false;
        }

        let target = match channel.kind().target_for(appointment) {
            Some(target) => target,
            None => {
                tracing::debug!(
                    "{} {} skipped for appointment {}: no contact",
                    channel.kind(),
                    message.label(),
                    appointment.id
                );
                return false;
            }
        };

        let call = match message {
            ClientMessage::Confirmation => channel.send_confirmation(target, appointment),
            ClientMessage::Rejection => channel.send_rejection(target, appointment),
            ClientMessage::Reminder => channel.send_reminder(target, appointment),
        };

        deliver(channel.kind(), message.label(), self.timeout, call).await
    }

    async fn send_both(&self, message: ClientMessage, appointment: &Appointment) -> DeliveryReport {
        let (telegram, email) = tokio::join!(
            self.send_to(self.telegram.as_ref(), message, appointment),
            self.send_to(self.email.as_ref(), message, appointment),
        );

        DeliveryReport { telegram, email }
    }

    pub async fn confirm(&self, appointment: &Appointment) -> DeliveryReport {
        self.send_both(ClientMessage::Confirmation, appointment).await
    }

    pub async fn reject(&self, appointment: &Appointment) -> DeliveryReport {
        self.send_both(ClientMessage::Rejection, appointment).await
    }

    pub async fn remind(&self, appointment: &Appointment) -> DeliveryReport {
        self.send_both(ClientMessage::Reminder, appointment).await
    }

    /// Tells the shop about a new request on a detached task.
    pub fn announce_new_booking(&self, appointment: Appointment) {
        if !self.any_enabled() {
            return;
        }

        let notifier = self.clone();

        tokio::spawn(async move {
            for channel in notifier.channels() {
                if !channel.is_enabled() {
                    continue;
                }
                deliver(
                    channel.kind(),
                    "new booking notice",
                    notifier.timeout,
                    channel.notify_new_booking(&appointment),
                )
                .await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_appointment, RecordingChannel, SlowChannel};

    fn notifier(telegram: Arc<dyn NotificationChannel>, email: Arc<dyn NotificationChannel>) -> Notifier {
        Notifier::new(telegram, email, Duration::from_secs(10))
    }

    #[test]
    fn test_target_for() {
        let mut appointment = sample_appointment(1, "confirmed");
        assert_eq!(
            ChannelKind::Telegram.target_for(&appointment),
            Some("0888123456")
        );
        assert_eq!(ChannelKind::Email.target_for(&appointment), None);

        appointment.client_email = Some("georgi@mail.bg".into());
        assert_eq!(
            ChannelKind::Email.target_for(&appointment),
            Some("georgi@mail.bg")
        );
    }

    #[tokio::test]
    async fn test_confirm_reaches_both_channels() {
        let telegram = Arc::new(RecordingChannel::new(ChannelKind::Telegram));
        let email = Arc::new(RecordingChannel::new(ChannelKind::Email));
        let mut appointment = sample_appointment(7, "confirmed");
        appointment.client_email = Some("georgi@mail.bg".into());

        let report = notifier(telegram.clone(), email.clone()).confirm(&appointment).await;

        assert_eq!(report, DeliveryReport { telegram: true, email: true });
        assert_eq!(telegram.sent(), vec![("confirmation".to_string(), 7)]);
        assert_eq!(email.sent(), vec![("confirmation".to_string(), 7)]);
    }

    #[tokio::test]
    async fn test_missing_email_skips_email_channel() {
        let telegram = Arc::new(RecordingChannel::new(ChannelKind::Telegram));
        let email = Arc::new(RecordingChannel::new(ChannelKind::Email));
        let appointment = sample_appointment(7, "rejected");

        let report = notifier(telegram, email.clone()).reject(&appointment).await;

        assert!(!report.any());
        assert!(email.sent().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_and_failing_channels_report_false() {
        let telegram = Arc::new(DisabledChannel(ChannelKind::Telegram));
        let email = Arc::new(RecordingChannel::failing(ChannelKind::Email));
        let mut appointment = sample_appointment(3, "confirmed");
        appointment.client_email = Some("georgi@mail.bg".into());

        let report = notifier(telegram, email).remind(&appointment).await;

        assert_eq!(report, DeliveryReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_channel_is_cut_off_by_timeout() {
        let telegram = Arc::new(SlowChannel::new(Duration::from_secs(60)));
        let email = Arc::new(RecordingChannel::new(ChannelKind::Email));
        let mut appointment = sample_appointment(3, "confirmed");
        appointment.client_email = Some("georgi@mail.bg".into());

        let report = notifier(telegram, email).confirm(&appointment).await;

        assert_eq!(report, DeliveryReport { telegram: false, email: true });
    }
}
