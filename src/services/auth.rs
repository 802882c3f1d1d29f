use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

const TOKEN_LEN: usize = 48;

/// A day, matching the lifetime of the session cookie.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

/// In-memory admin sessions. Tokens are random and expire after `ttl`;
/// a restart logs every admin out.
pub struct AdminAuth {
    credentials: Option<AdminCredentials>,
    ttl: Duration,
    sessions: Mutex<HashMap<String, Instant>>,
}

impl AdminAuth {
    pub fn new(credentials: Option<AdminCredentials>, ttl: Duration) -> Self {
        Self {
            credentials,
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("AdminAuth mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// A fresh session token when the credentials match.
    pub fn login(&self, username: &str, password: &str) -> Option<String> {
        let credentials = match &self.credentials {
            Some(credentials) => credentials,
            None => {
                tracing::warn!("Admin login attempted but ADMIN_USERNAME/ADMIN_PASSWORD are not set");
                return None;
            }
        };

        if credentials.username != username || credentials.password != password {
            tracing::info!("Rejected admin login for {:?}", username);
            return None;
        }

        let token: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();

        let now = Instant::now();
        let mut sessions = self.sessions();
        sessions.retain(|_, expires| *expires > now);
        sessions.insert(token.clone(), now + self.ttl);

        tracing::info!("Admin logged in ({} active sessions)", sessions.len());
        Some(token)
    }

    pub fn is_valid(&self, token: &str) -> bool {
        let mut sessions = self.sessions();

        match sessions.get(token) {
            Some(expires) if *expires > Instant::now() => true,
            Some(_) => {
                sessions.remove(token);
                false
            }
            None => false,
        }
    }

    pub fn logout(&self, token: &str) -> bool {
        self.sessions().remove(token).is_some()
    }
}
