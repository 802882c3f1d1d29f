use actix_web::web;
use anyhow::Context;
use barberbook::catalog::BusinessCatalog;
use barberbook::db::{create_pool, run_migrations};
use barberbook::store::{AppointmentStore, PgStore};
use dotenv::dotenv;
use std::sync::Arc;
use teloxide::Bot;
use tracing_subscriber::EnvFilter;

mod bots;
mod channels;
mod config;
mod context;
mod handlers;
mod http_server;
mod observability;
mod services;

#[cfg(test)]
mod test_support;

use crate::bots::subscriber_bot::{SubscriberBot, SubscriberState};
use crate::channels::email::{EmailChannel, SmtpMailer};
use crate::channels::telegram::TelegramChannel;
use crate::channels::{ChannelKind, DisabledChannel, NotificationChannel, Notifier};
use crate::config::AppConfig;
use crate::context::{AppContext, ReminderSettings};
use crate::http_server::run_http_server;
use crate::observability::{startup, ALERTS};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env().context("invalid configuration")?;
    ALERTS.set_enabled(config.is_admin_logs_active());
    let telegram_config = config.telegram.as_ref();

    let catalog = Arc::new(
        BusinessCatalog::load(&config.business_config_path)
            .with_context(|| format!("failed to load {}", config.business_config_path))?,
    );
    tracing::info!(
        "Loaded catalog for {} ({} services, {} slots)",
        catalog.business().name,
        catalog.public_view().services.len(),
        catalog.slots().len()
    );

    let pool = match create_pool(&config.database_url) {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            startup::alert_database_error(telegram_config, &e.to_string()).await;
            return Err(e).context("failed to create database pool");
        }
    };

    if let Err(e) = run_migrations(&pool) {
        startup::alert_migration_error(telegram_config, &e.to_string()).await;
        return Err(e).context("failed to run migrations");
    }

    let store: Arc<dyn AppointmentStore> = Arc::new(PgStore::new(pool));
    let lead_minutes = config.reminder_lead_minutes;

    let telegram: Arc<dyn NotificationChannel> = match &config.telegram {
        Some(tg) => Arc::new(TelegramChannel::new(
            Bot::new(&tg.bot_token),
            tg.admin_chat_id,
            store.clone(),
            catalog.clone(),
            lead_minutes,
        )),
        None => {
            tracing::warn!("TELEGRAM_BOT_TOKEN not set, Telegram notifications disabled");
            Arc::new(DisabledChannel(ChannelKind::Telegram))
        }
    };

    let email: Arc<dyn NotificationChannel> = match &config.email {
        Some(email) => match SmtpMailer::new(email, &catalog.business().name) {
            Ok(mailer) => Arc::new(EmailChannel::new(
                Arc::new(mailer),
                email.admin_email.clone(),
                catalog.clone(),
                lead_minutes,
            )),
            Err(e) => {
                tracing::error!("SMTP setup failed, email notifications disabled: {}", e);
                Arc::new(DisabledChannel(ChannelKind::Email))
            }
        },
        None => {
            tracing::warn!("SMTP_USER or SMTP_PASS not set, email notifications disabled");
            Arc::new(DisabledChannel(ChannelKind::Email))
        }
    };

    if config.admin.is_none() {
        tracing::warn!("ADMIN_USERNAME or ADMIN_PASSWORD not set, admin API is locked");
    }

    let notifier = Notifier::new(telegram, email, config.notification_timeout);
    let ctx = web::Data::new(AppContext::new(
        store.clone(),
        catalog.clone(),
        notifier,
        ReminderSettings {
            timezone: config.timezone,
            lead_minutes,
            interval: config.reminder_interval,
        },
        config.admin.clone(),
    ));

    ctx.scheduler.start();

    let subscriber_bot = config.telegram.as_ref().map(|tg| {
        let bot = SubscriberBot::new(
            Bot::new(&tg.bot_token),
            SubscriberState::new(store.clone(), catalog.clone(), lead_minutes),
        );
        bot.start();
        bot
    });

    startup::alert_startup_success(telegram_config).await;

    let served = run_http_server(ctx.clone(), config.port).await;

    ctx.scheduler.stop();
    if let Some(bot) = &subscriber_bot {
        bot.stop().await;
    }

    if let Err(e) = served {
        startup::alert_http_server_error(telegram_config, &e.to_string()).await;
        return Err(e).context("HTTP server failed");
    }

    tracing::info!("Shut down cleanly");
    Ok(())
}
