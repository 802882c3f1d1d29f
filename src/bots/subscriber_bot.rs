use barberbook::catalog::BusinessCatalog;
use barberbook::i18n::{t, t_with_args};
use barberbook::store::AppointmentStore;
use barberbook::validation::{normalize_phone, strip_phone};
use html_escape::encode_text;
use std::sync::{Arc, Mutex};
use teloxide::dispatching::{Dispatcher, ShutdownToken, UpdateFilterExt};
use teloxide::dptree;
use teloxide::utils::command::BotCommands;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tokio::task::JoinHandle;

use crate::observability::METRICS;
use crate::services::with_store;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "register for booking notifications")]
    Start,
    #[command(description = "show this chat's id")]
    Admin,
}

/// Everything the update handlers need, shared across them.
pub struct SubscriberState {
    store: Arc<dyn AppointmentStore>,
    catalog: Arc<BusinessCatalog>,
    lead_minutes: i64,
}

impl SubscriberState {
    pub fn new(store: Arc<dyn AppointmentStore>, catalog: Arc<BusinessCatalog>, lead_minutes: i64) -> Self {
        Self {
            store,
            catalog,
            lead_minutes,
        }
    }

    fn language(&self) -> &str {
        self.catalog.language()
    }

    pub fn command_reply(&self, command: &Command, chat_id: i64, first_name: &str) -> String {
        match command {
            Command::Start => t_with_args(
                self.language(),
                "telegram.start",
                &[
                    &encode_text(first_name),
                    &encode_text(&self.catalog.business().name),
                ],
            ),
            Command::Admin => {
                let id = chat_id.to_string();
                t_with_args(self.language(), "telegram.admin_chat_id", &[&id, &id])
            }
        }
    }

    /// A canonical phone if `text` is one the shop accepts.
    pub fn parse_opt_in(&self, text: &str) -> Option<String> {
        let stripped = strip_phone(text);
        if stripped.is_empty() || !self.catalog.phone_matches(&stripped) {
            return None;
        }
        Some(normalize_phone(&stripped, self.catalog.country_code()))
    }

    /// Registers the chat if `text` is a phone number, otherwise explains
    /// what to send.
    pub async fn text_reply(&self, chat_id: i64, first_name: &str, text: &str) -> String {
        let lang = self.language();

        let phone = match self.parse_opt_in(text) {
            Some(phone) => phone,
            None => return t(lang, "telegram.invalid_phone"),
        };

        let name = if first_name.trim().is_empty() {
            "Unknown".to_string()
        } else {
            first_name.to_string()
        };

        let saved_phone = phone.clone();
        let saved = with_store(&self.store, move |store| {
            store.upsert_subscriber(chat_id, &saved_phone, &name)
        })
        .await;

        match saved {
            Ok(_) => {
                METRICS.increment_subscribers();
                tracing::info!("Registered Telegram subscriber {} for {}", chat_id, phone);
                t_with_args(
                    lang,
                    "telegram.subscribed",
                    &[&phone, &self.lead_minutes.to_string()],
                )
            }
            Err(e) => {
                tracing::error!("Failed to save subscriber {}: {}", chat_id, e);
                METRICS.increment_errors();
                t(lang, "telegram.subscribe_failed")
            }
        }
    }
}

fn first_name(msg: &Message) -> String {
    msg.from()
        .map(|user| user.first_name.clone())
        .unwrap_or_default()
}

async fn command_handler(bot: Bot, msg: Message, cmd: Command, state: Arc<SubscriberState>) -> ResponseResult<()> {
    let reply = state.command_reply(&cmd, msg.chat.id.0, &first_name(&msg));

    bot.send_message(msg.chat.id, reply)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn message_handler(bot: Bot, msg: Message, state: Arc<SubscriberState>) -> ResponseResult<()> {
    let text = match msg.text() {
        Some(text) => text,
        None => return Ok(()),
    };

    tracing::debug!("Telegram: message from {}", msg.chat.id);
    let reply = state.text_reply(msg.chat.id.0, &first_name(&msg), text).await;

    bot.send_message(msg.chat.id, reply)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

struct Running {
    shutdown: ShutdownToken,
    handle: JoinHandle<()>,
}

/// Long-polling bot that lets clients link their phone to a chat.
pub struct SubscriberBot {
    bot: Bot,
    state: Arc<SubscriberState>,
    running: Mutex<Option<Running>>,
}

impl SubscriberBot {
    pub fn new(bot: Bot, state: SubscriberState) -> Self {
        Self {
            bot,
            state: Arc::new(state),
            running: Mutex::new(None),
        }
    }

    fn running_slot(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("SubscriberBot mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_slot()
            .as_ref()
            .map(|r| !r.handle.is_finished())
            .unwrap_or(false)
    }

    /// Starts polling on a background task. Does nothing when already running.
    pub fn start(&self) {
        let mut running = self.running_slot();
        if running.as_ref().map(|r| !r.handle.is_finished()).unwrap_or(false) {
            tracing::debug!("Subscriber bot already running");
            return;
        }

        tracing::info!("Starting subscriber bot...");

        let state = self.state.clone();
        let handler = dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint({
                        let state = state.clone();
                        move |bot: Bot, msg: Message, cmd: Command| {
                            let state = state.clone();
                            async move { command_handler(bot, msg, cmd, state).await }
                        }
                    }),
            )
            .branch(Update::filter_message().endpoint({
                let state = state.clone();
                move |bot: Bot, msg: Message| {
                    let state = state.clone();
                    async move { message_handler(bot, msg, state).await }
                }
            }));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|_| async {})
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the subscriber bot",
            ))
            .build();
        let shutdown = dispatcher.shutdown_token();

        let handle = tokio::spawn(async move {
            dispatcher.dispatch().await;
            tracing::info!("Subscriber bot stopped polling");
        });

        *running = Some(Running { shutdown, handle });
    }

    /// Stops polling and waits for in-flight updates. Safe to call when idle.
    pub async fn stop(&self) {
        let running = self.running_slot().take();

        let Some(Running { shutdown, handle }) = running else {
            return;
        };

        match shutdown.shutdown() {
            Ok(wait) => {
                wait.await;
                if let Err(e) = handle.await {
                    tracing::warn!("Subscriber bot task ended abnormally: {}", e);
                }
            }
            Err(_) => handle.abort(),
        };
    }
}
