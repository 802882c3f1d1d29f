use async_trait::async_trait;
use barberbook::catalog::BusinessCatalog;
use barberbook::i18n::{format_date, t_with_args};
use barberbook::models::Appointment;
use barberbook::store::AppointmentStore;
use barberbook::validation::normalize_phone;
use html_escape::encode_text;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ParseMode;

use super::{ChannelError, ChannelKind, NotificationChannel};
use crate::observability::telegram_errors::log_telegram_error;
use crate::services::with_store;

/// Chat channel. Clients are reached through the chat id they registered
/// with the subscriber bot.
pub struct TelegramChannel {
    bot: Bot,
    admin_chat_id: Option<i64>,
    store: Arc<dyn AppointmentStore>,
    catalog: Arc<BusinessCatalog>,
    lead_minutes: i64,
}

impl TelegramChannel {
    pub fn new(
        bot: Bot,
        admin_chat_id: Option<i64>,
        store: Arc<dyn AppointmentStore>,
        catalog: Arc<BusinessCatalog>,
        lead_minutes: i64,
    ) -> Self {
        Self {
            bot,
            admin_chat_id,
            store,
            catalog,
            lead_minutes,
        }
    }

    fn language(&self) -> &str {
        self.catalog.language()
    }

    async fn chat_for_phone(&self, phone: &str) -> Result<Option<i64>, ChannelError> {
        let normalized = normalize_phone(phone, self.catalog.country_code());
        let lookup = normalized.clone();
        let subscriber =
            with_store(&self.store, move |store| store.find_subscriber_by_phone(&lookup)).await?;

        if subscriber.is_none() {
            tracing::info!("Telegram: no subscriber for phone {}", normalized);
        }

        Ok(subscriber.map(|s| s.chat_id))
    }

    async fn send_html(&self, chat_id: i64, text: String, context: &str) -> Result<(), ChannelError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(|e| {
                log_telegram_error(&e, chat_id, context);
                ChannelError::Telegram(e)
            })
    }

    pub fn confirmation_text(&self, appointment: &Appointment) -> String {
        let address = &self.catalog.business().address;
        let lang = self.language();

        t_with_args(
            lang,
            "telegram.confirmation",
            &[
                &format_date(lang, appointment.date),
                &appointment.time,
                &encode_text(&appointment.service),
                &appointment.price.to_string(),
                &encode_text(&address.street),
                &encode_text(&address.district),
                &encode_text(&address.city),
                &appointment.confirmation_code,
                &self.lead_minutes.to_string(),
            ],
        )
    }

    pub fn reminder_text(&self, appointment: &Appointment) -> String {
        let business = self.catalog.business();

        t_with_args(
            self.language(),
            "telegram.reminder",
            &[
                &encode_text(&business.name),
                &self.lead_minutes.to_string(),
                &appointment.time,
                &encode_text(&appointment.service),
                &encode_text(&business.address.street),
                &encode_text(&business.address.district),
                &encode_text(&business.address.city),
            ],
        )
    }

    pub fn new_booking_text(&self, appointment: &Appointment) -> String {
        let lang = self.language();

        t_with_args(
            lang,
            "telegram.new_booking",
            &[
                &encode_text(&appointment.client_name),
                &appointment.client_phone,
                &format_date(lang, appointment.date),
                &appointment.time,
                &encode_text(&appointment.service),
                &appointment.price.to_string(),
            ],
        )
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn send_confirmation(&self, target: &str, appointment: &Appointment) -> Result<bool, ChannelError> {
        let chat_id = match self.chat_for_phone(target).await? {
            Some(id) => id,
            None => return Ok(false),
        };

        self.send_html(chat_id, self.confirmation_text(appointment), "sending confirmation")
            .await?;
        Ok(true)
    }

    async fn send_reminder(&self, target: &str, appointment: &Appointment) -> Result<bool, ChannelError> {
        let chat_id = match self.chat_for_phone(target).await? {
            Some(id) => id,
            None => return Ok(false),
        };

        self.send_html(chat_id, self.reminder_text(appointment), "sending reminder")
            .await?;
        Ok(true)
    }

    async fn notify_new_booking(&self, appointment: &Appointment) -> Result<bool, ChannelError> {
        let admin_chat_id = match self.admin_chat_id {
            Some(id) => id,
            None => {
                tracing::debug!("Telegram: TELEGRAM_ADMIN_CHAT_ID not configured");
                return Ok(false);
            }
        };

        self.send_html(admin_chat_id, self.new_booking_text(appointment), "notifying admin")
            .await?;
        Ok(true)
    }

    async fn send_admin_alert(&self, text: &str) -> Result<bool, ChannelError> {
        let admin_chat_id = match self.admin_chat_id {
            Some(id) => id,
            None => return Ok(false),
        };

        self.send_html(admin_chat_id, text.to_string(), "sending alert").await?;
        Ok(true)
    }
}
