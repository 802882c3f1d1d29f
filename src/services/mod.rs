pub mod admin;
pub mod auth;
pub mod booking;
pub mod lifecycle;
pub mod reminder_scheduler;

use barberbook::db::DbError;
use barberbook::store::AppointmentStore;
use std::sync::Arc;

#[derive(Debug)]
pub enum ServiceError {
    Validation(String),
    Unauthorized(String),
    Conflict(String),
    Blocked,
    NotFound(String),
    Store(DbError),
    Internal(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Validation(msg) => write!(f, "Validation failed: {}", msg),
            ServiceError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ServiceError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ServiceError::Blocked => write!(f, "Phone number is blocked"),
            ServiceError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ServiceError::Store(e) => write!(f, "{}", e),
            ServiceError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        ServiceError::Store(err)
    }
}

pub(crate) fn validation(msg: &str) -> ServiceError {
    ServiceError::Validation(msg.to_string())
}

/// Runs a store call on tokio's blocking pool. diesel is synchronous and must
/// not hold an async worker while it waits on Postgres.
pub(crate) async fn with_store<T, F>(store: &Arc<dyn AppointmentStore>, call: F) -> Result<T, DbError>
where
    F: FnOnce(&dyn AppointmentStore) -> Result<T, DbError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);

    match tokio::task::spawn_blocking(move || call(store.as_ref())).await {
        Ok(result) => result,
        Err(e) => Err(DbError::TaskFailed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;

    #[tokio::test]
    async fn test_with_store_runs_the_call() {
        let store: Arc<dyn AppointmentStore> = Arc::new(MemoryStore::new());
        with_store(&store, |s| s.block_phone("0888123456", None)).await.unwrap();

        let blocked = with_store(&store, |s| s.is_phone_blocked("0888123456")).await.unwrap();
        assert!(blocked);
    }

    #[tokio::test]
    async fn test_with_store_reports_a_panicking_call() {
        let store: Arc<dyn AppointmentStore> = Arc::new(MemoryStore::new());

        let result: Result<(), DbError> = with_store(&store, |_| panic!("connection lost")).await;
        assert!(matches!(result, Err(DbError::TaskFailed(_))));
    }
}
