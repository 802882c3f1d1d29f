use super::alerts::Severity;
use super::ALERTS;
use crate::config::TelegramConfig;
use teloxide::prelude::*;
use teloxide::types::ParseMode;

/// Start-up failures happen before the notification channels exist, so the
/// alert goes straight to the admin chat with a throwaway bot.
pub async fn send_startup_alert(
    telegram: Option<&TelegramConfig>,
    severity: Severity,
    category: &str,
    message: &str,
) {
    if !ALERTS.is_enabled() {
        return;
    }

    let (token, admin_chat_id) = match telegram {
        Some(TelegramConfig {
            bot_token,
            admin_chat_id: Some(chat_id),
        }) => (bot_token.clone(), *chat_id),
        _ => {
            tracing::error!("Cannot send startup alert: Telegram admin chat not configured");
            return;
        }
    };

    if !ALERTS.should_alert(severity, category) {
        return;
    }

    let bot = Bot::new(token);
    let formatted = ALERTS.format_alert(severity, category, message);

    if let Err(e) = bot
        .send_message(ChatId(admin_chat_id), formatted)
        .parse_mode(ParseMode::Html)
        .await
    {
        tracing::error!("Failed to send startup alert: {}", e);
    }
}

pub async fn alert_database_error(telegram: Option<&TelegramConfig>, error: &str) {
    tracing::error!("Database startup error: {}", error);
    send_startup_alert(
        telegram,
        Severity::Critical,
        "Startup-Database",
        &format!("Database initialization failed: {}", error),
    )
    .await;
}

pub async fn alert_migration_error(telegram: Option<&TelegramConfig>, error: &str) {
    tracing::error!("Migration error: {}", error);
    send_startup_alert(
        telegram,
        Severity::Critical,
        "Startup-Migration",
        &format!("Database migration failed: {}", error),
    )
    .await;
}

pub async fn alert_http_server_error(telegram: Option<&TelegramConfig>, error: &str) {
    tracing::error!("HTTP server error: {}", error);
    send_startup_alert(
        telegram,
        Severity::Critical,
        "Startup-HTTP",
        &format!("HTTP server failed to start: {}", error),
    )
    .await;
}

pub async fn alert_startup_success(telegram: Option<&TelegramConfig>) {
    send_startup_alert(
        telegram,
        Severity::Info,
        "Startup",
        "Booking service started successfully",
    )
    .await;
}
