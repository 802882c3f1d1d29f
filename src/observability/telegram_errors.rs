use super::METRICS;
use teloxide::RequestError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelegramErrorKind {
    RateLimited,
    BotBlocked,
    ChatNotFound,
    NetworkError,
    Other,
}

pub fn classify_telegram_error(error: &RequestError) -> TelegramErrorKind {
    match error {
        RequestError::RetryAfter(_) => TelegramErrorKind::RateLimited,
        RequestError::Api(api_error) => {
            let error_str = api_error.to_string().to_lowercase();
            if error_str.contains("blocked") || error_str.contains("bot was blocked") {
                TelegramErrorKind::BotBlocked
            } else if error_str.contains("chat not found")
                || error_str.contains("chat_not_found")
                || error_str.contains("user not found")
            {
                TelegramErrorKind::ChatNotFound
            } else {
                TelegramErrorKind::Other
            }
        }
        RequestError::Network(_) => TelegramErrorKind::NetworkError,
        _ => TelegramErrorKind::Other,
    }
}

pub fn get_retry_after_seconds(error: &RequestError) -> Option<u64> {
    match error {
        RequestError::RetryAfter(duration) => Some(duration.as_secs()),
        _ => None,
    }
}

/// Logs a failed send with a level that fits its cause. A subscriber who
/// blocked the bot is routine, a network failure is not.
pub fn log_telegram_error(error: &RequestError, chat_id: i64, context: &str) -> TelegramErrorKind {
    let error_kind = classify_telegram_error(error);
    METRICS.increment_errors();

    match error_kind {
        TelegramErrorKind::RateLimited => {
            let retry_after = get_retry_after_seconds(error).unwrap_or(0);
            tracing::warn!(
                "Telegram rate limit hit while {} for chat {}: retry after {}s",
                context,
                chat_id,
                retry_after
            );
        }
        TelegramErrorKind::BotBlocked => {
            tracing::info!("Bot blocked by user in chat {} while {}", chat_id, context);
        }
        TelegramErrorKind::ChatNotFound => {
            tracing::warn!("Chat {} not found on Telegram while {}", chat_id, context);
        }
        TelegramErrorKind::NetworkError => {
            tracing::error!("Network error while {} to chat {}: {}", context, chat_id, error);
        }
        TelegramErrorKind::Other => {
            tracing::error!("Telegram error while {} to chat {}: {}", context, chat_id, error);
        }
    }

    error_kind
}
