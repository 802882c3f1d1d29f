pub mod admin;
pub mod auth;
pub mod error;
pub mod public;

use actix_web::web;

use crate::services::ServiceError;
use error::ApiError;

/// Body and query parse failures answer in the same JSON shape as every
/// other client error.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req| {
        tracing::debug!("Rejected body on {}: {}", req.path(), err);
        ApiError::from(ServiceError::Validation("Invalid request body".into())).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, req| {
        tracing::debug!("Rejected query on {}: {}", req.path(), err);
        ApiError::from(ServiceError::Validation("Invalid query string".into())).into()
    })
}

/// Mounts every route under `/api`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(json_config())
            .app_data(query_config())
            .service(public::health)
            .service(public::public_config)
            .service(public::slots)
            .service(public::book)
            .service(public::status)
            .service(public::check_phone)
            .service(
                web::scope("/admin")
                    .service(auth::login)
                    .service(auth::logout)
                    .service(auth::check_auth)
                    .service(admin::action)
                    .service(admin::trigger_reminders)
                    .service(admin::appointments)
                    .service(admin::stats)
                    .service(admin::notifications)
                    .service(admin::edit)
                    .service(admin::edit_client)
                    .service(admin::clients)
                    .service(admin::schedule)
                    .service(admin::notification_status)
                    .service(admin::block_phone)
                    .service(admin::unblock_phone)
                    .service(admin::blocked_phones),
            ),
    );
}

/// Runs a store-bound service call off the async worker.
pub(crate) async fn blocking<T, F>(call: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    web::block(call)
        .await
        .map_err(|e| ApiError::internal(format!("blocking task failed: {}", e)))?
        .map_err(ApiError::from)
}
