use async_trait::async_trait;
use barberbook::catalog::BusinessCatalog;
use barberbook::i18n::{format_date, t, t_with_args};
use barberbook::models::Appointment;
use html_escape::encode_text;
use lettre::address::AddressError;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;

use super::{ChannelError, ChannelKind, NotificationChannel};
use crate::config::EmailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Hands a finished email to the mail server.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), ChannelError>;
}

fn parse_address(raw: &str) -> Result<Address, ChannelError> {
    raw.parse()
        .map_err(|e: AddressError| ChannelError::Message(format!("invalid address {}: {}", raw, e)))
}

pub fn build_message(from: &Mailbox, email: &OutgoingEmail) -> Result<Message, ChannelError> {
    let to = Mailbox::new(None, parse_address(&email.to)?);

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_HTML)
        .body(email.html.clone())
        .map_err(|e| ChannelError::Message(e.to_string()))
}

/// SMTP submission with the shop's account.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig, sender_name: &str) -> Result<Self, ChannelError> {
        let from = Mailbox::new(Some(sender_name.to_string()), parse_address(&config.from)?);

        let builder = if config.implicit_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        tracing::info!("Email via {}:{} as {}", config.host, config.port, from);
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), ChannelError> {
        let message = build_message(&self.from, &email)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

/// Email channel. Clients are reached at the address they booked with.
pub struct EmailChannel {
    mailer: Arc<dyn MailTransport>,
    admin_email: Option<String>,
    catalog: Arc<BusinessCatalog>,
    lead_minutes: i64,
}

impl EmailChannel {
    pub fn new(
        mailer: Arc<dyn MailTransport>,
        admin_email: Option<String>,
        catalog: Arc<BusinessCatalog>,
        lead_minutes: i64,
    ) -> Self {
        Self {
            mailer,
            admin_email,
            catalog,
            lead_minutes,
        }
    }

    fn language(&self) -> &str {
        self.catalog.language()
    }

    async fn post(&self, to: &str, subject: &str, html: &str) -> Result<bool, ChannelError> {
        if !to.contains('@') {
            tracing::info!("Email: skipping invalid address {}", to);
            return Ok(false);
        }

        self.mailer
            .send(OutgoingEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                html: html.to_string(),
            })
            .await?;

        Ok(true)
    }

    fn details(&self, appointment: &Appointment, with_client: bool) -> String {
        let lang = self.language();
        let label = |key: &str| t(lang, &format!("email.labels.{}", key));

        let mut rows = Vec::new();
        if with_client {
            rows.push((label("client"), encode_text(&appointment.client_name).to_string()));
            rows.push((label("phone"), encode_text(&appointment.client_phone).to_string()));
        }
        rows.push((label("date"), format_date(lang, appointment.date)));
        rows.push((label("time"), encode_text(&appointment.time).to_string()));
        rows.push((label("service"), encode_text(&appointment.service).to_string()));
        rows.push((
            label("price"),
            format!("{} {}", appointment.price, t(lang, "email.currency")),
        ));
        rows.push((label("code"), encode_text(&appointment.confirmation_code).to_string()));

        rows.iter()
            .map(|(name, value)| format!("<tr><td>{}</td><td><b>{}</b></td></tr>", name, value))
            .collect()
    }

    pub fn render(&self, badge: &str, text: &str, details: &str) -> String {
        format!(
            "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"></head><body>\
             <h1>💈 {}</h1><p><b>{}</b></p><p>{}</p><table>{}</table></body></html>",
            encode_text(&self.catalog.business().name),
            badge,
            text,
            details
        )
    }

    fn schedule_subject(&self, key: &str, appointment: &Appointment) -> String {
        let lang = self.language();
        t_with_args(
            lang,
            key,
            &[&format_date(lang, appointment.date), &appointment.time],
        )
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn send_confirmation(&self, target: &str, appointment: &Appointment) -> Result<bool, ChannelError> {
        let lang = self.language();
        let html = self.render(
            &t(lang, "email.confirmation_badge"),
            &t_with_args(lang, "email.confirmation_text", &[&self.lead_minutes.to_string()]),
            &self.details(appointment, false),
        );

        self.post(
            target,
            &self.schedule_subject("email.confirmation_subject", appointment),
            &html,
        )
        .await
    }

    async fn send_rejection(&self, target: &str, appointment: &Appointment) -> Result<bool, ChannelError> {
        let lang = self.language();
        let html = self.render(
            &t(lang, "email.rejection_badge"),
            &t(lang, "email.rejection_text"),
            &self.details(appointment, false),
        );

        self.post(
            target,
            &self.schedule_subject("email.rejection_subject", appointment),
            &html,
        )
        .await
    }

    async fn send_reminder(&self, target: &str, appointment: &Appointment) -> Result<bool, ChannelError> {
        let lang = self.language();
        let lead = self.lead_minutes.to_string();
        let business_name = encode_text(&self.catalog.business().name).to_string();
        let html = self.render(
            &t(lang, "email.reminder_badge"),
            &t_with_args(lang, "email.reminder_text", &[&business_name, &lead]),
            &self.details(appointment, false),
        );

        self.post(
            target,
            &t_with_args(lang, "email.reminder_subject", &[&lead]),
            &html,
        )
        .await
    }

    async fn notify_new_booking(&self, appointment: &Appointment) -> Result<bool, ChannelError> {
        let admin_email = match &self.admin_email {
            Some(address) => address,
            None => return Ok(false),
        };

        let lang = self.language();
        let subject = t_with_args(
            lang,
            "email.new_booking_subject",
            &[
                &appointment.client_name,
                &format_date(lang, appointment.date),
                &appointment.time,
            ],
        );
        let html = self.render(
            &t(lang, "email.new_booking_badge"),
            "",
            &self.details(appointment, true),
        );

        self.post(admin_email, &subject, &html).await
    }

    async fn send_admin_alert(&self, text: &str) -> Result<bool, ChannelError> {
        let admin_email = match &self.admin_email {
            Some(address) => address,
            None => return Ok(false),
        };

        let subject = t_with_args(
            self.language(),
            "email.alert_subject",
            &[&self.catalog.business().name],
        );
        let html = self.render("", &text.replace('\n', "<br>"), "");

        self.post(admin_email, &subject, &html).await
    }
}
