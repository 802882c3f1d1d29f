use chrono_tz::Tz;
use std::env;
use std::time::Duration;

use crate::services::auth::AdminCredentials;

const TELEGRAM_TOKEN_PLACEHOLDER: &str = "your-telegram-bot-token-here";
const SMTP_USER_PLACEHOLDER: &str = "your-email@gmail.com";

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub admin_chat_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address, the SMTP user unless `EMAIL_FROM` overrides it.
    pub from: String,
    pub admin_email: Option<String>,
}

impl EmailConfig {
    /// Port 465 speaks TLS from the first byte, every other port upgrades
    /// with STARTTLS.
    pub fn implicit_tls(&self) -> bool {
        self.port == 465
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub business_config_path: String,
    pub timezone: Tz,
    pub telegram: Option<TelegramConfig>,
    pub email: Option<EmailConfig>,
    pub admin: Option<AdminCredentials>,
    pub reminder_interval: Duration,
    pub reminder_lead_minutes: i64,
    pub notification_timeout: Duration,
    pub admin_logs: String,
}

#[derive(Debug)]
pub struct ConfigError {
    pub missing_vars: Vec<String>,
    pub invalid_vars: Vec<(String, String)>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.missing_vars.is_empty() {
            writeln!(f, "Missing required environment variables:")?;
            for var in &self.missing_vars {
                writeln!(f, "  - {}", var)?;
            }
        }
        if !self.invalid_vars.is_empty() {
            writeln!(f, "Invalid environment variables:")?;
            for (var, err) in &self.invalid_vars {
                writeln!(f, "  - {}: {}", var, err)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

struct Vars<F: Fn(&str) -> Option<String>> {
    lookup: F,
    missing: Vec<String>,
    invalid: Vec<(String, String)>,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&mut self, name: &str) -> Option<String> {
        let value = self.optional(name);
        if value.is_none() {
            self.missing.push(name.to_string());
        }
        value
    }

    fn parsed<T>(&mut self, name: &str, default: T) -> T
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => match raw.parse::<T>() {
                Ok(value) => value,
                Err(e) => {
                    self.invalid.push((name.to_string(), e.to_string()));
                    default
                }
            },
            None => default,
        }
    }

    fn invalid(&mut self, name: &str, reason: impl Into<String>) {
        self.invalid.push((name.to_string(), reason.into()));
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let mut vars = Vars {
            lookup,
            missing: Vec::new(),
            invalid: Vec::new(),
        };

        let database_url = vars.required("DATABASE_URL");

        let port = vars.parsed::<u16>("PORT", 3000);
        let business_config_path = vars
            .optional("BUSINESS_CONFIG")
            .unwrap_or_else(|| "business.json".into());

        let timezone_name = vars
            .optional("BUSINESS_TIMEZONE")
            .unwrap_or_else(|| "Europe/Sofia".into());
        let timezone = match timezone_name.parse::<Tz>() {
            Ok(tz) => tz,
            Err(e) => {
                vars.invalid("BUSINESS_TIMEZONE", e.to_string());
                chrono_tz::Europe::Sofia
            }
        };

        let admin_chat_id = match vars.optional("TELEGRAM_ADMIN_CHAT_ID") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) => Some(id),
                Err(e) => {
                    vars.invalid("TELEGRAM_ADMIN_CHAT_ID", e.to_string());
                    None
                }
            },
            None => None,
        };

        let telegram = vars
            .optional("TELEGRAM_BOT_TOKEN")
            .filter(|token| token != TELEGRAM_TOKEN_PLACEHOLDER)
            .map(|bot_token| TelegramConfig {
                bot_token,
                admin_chat_id,
            });

        let smtp_port = vars.parsed::<u16>("SMTP_PORT", 587);
        let smtp_user = vars
            .optional("SMTP_USER")
            .filter(|user| user != SMTP_USER_PLACEHOLDER);
        let email = match (smtp_user, vars.optional("SMTP_PASS")) {
            (Some(username), Some(password)) => Some(EmailConfig {
                host: vars
                    .optional("SMTP_HOST")
                    .unwrap_or_else(|| "smtp.gmail.com".into()),
                port: smtp_port,
                from: vars.optional("EMAIL_FROM").unwrap_or_else(|| username.clone()),
                username,
                password,
                admin_email: vars.optional("ADMIN_EMAIL"),
            }),
            _ => None,
        };

        let admin = match (vars.optional("ADMIN_USERNAME"), vars.optional("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminCredentials { username, password }),
            _ => None,
        };

        let reminder_interval_secs = vars.parsed::<u64>("REMINDER_INTERVAL_SECS", 60);
        let reminder_lead_minutes = vars.parsed::<i64>("REMINDER_LEAD_MINUTES", 30);
        let notification_timeout_secs = vars.parsed::<u64>("NOTIFICATION_TIMEOUT_SECS", 10);

        if reminder_interval_secs == 0 {
            vars.invalid("REMINDER_INTERVAL_SECS", "must be positive");
        }

        let admin_logs = vars.optional("ADMIN_LOGS").unwrap_or_default();

        let database_url = match database_url {
            Some(url) if vars.invalid.is_empty() => url,
            _ => {
                return Err(ConfigError {
                    missing_vars: vars.missing,
                    invalid_vars: vars.invalid,
                })
            }
        };

        Ok(Self {
            database_url,
            port,
            business_config_path,
            timezone,
            telegram,
            email,
            admin,
            reminder_interval: Duration::from_secs(reminder_interval_secs),
            reminder_lead_minutes,
            notification_timeout: Duration::from_secs(notification_timeout_secs),
            admin_logs,
        })
    }

    pub fn is_admin_logs_active(&self) -> bool {
        self.admin_logs == "ACTIVE"
    }
}
