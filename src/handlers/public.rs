use actix_web::{get, post, web, HttpResponse};
use barberbook::i18n::t;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::blocking;
use super::error::ApiError;
use crate::context::AppContext;
use crate::observability::METRICS;
use crate::services::booking::BookingRequest;

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PhoneBody {
    pub phone: Option<String>,
}

fn enabled_label(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}

#[get("/health")]
pub async fn health(ctx: web::Data<AppContext>) -> HttpResponse {
    tracing::debug!("Health check");
    let metrics = METRICS.snapshot();

    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime": metrics.uptime_secs,
        "notifications": {
            "telegram": enabled_label(ctx.notifier.telegram_enabled()),
            "email": enabled_label(ctx.notifier.email_enabled()),
        },
        "metrics": metrics,
    }))
}

#[get("/config")]
pub async fn public_config(ctx: web::Data<AppContext>) -> HttpResponse {
    HttpResponse::Ok().json(ctx.catalog.public_view())
}

#[get("/slots")]
pub async fn slots(
    ctx: web::Data<AppContext>,
    query: web::Query<DateQuery>,
) -> Result<HttpResponse, ApiError> {
    let date = query.into_inner().date.unwrap_or_default();
    let booking = ctx.booking.clone();

    let day = blocking(move || booking.query_day_slots(&date)).await?;
    Ok(HttpResponse::Ok().json(day))
}

#[post("/book")]
pub async fn book(
    ctx: web::Data<AppContext>,
    request: web::Json<BookingRequest>,
) -> Result<HttpResponse, ApiError> {
    let booking = ctx.booking.clone();
    let request = request.into_inner();

    let confirmation = blocking(move || booking.book_slot(&request))
        .await
        .map_err(|e| e.in_language(ctx.language()))?;

    Ok(HttpResponse::Ok().json(json!({
        "id": confirmation.id,
        "confirmationCode": confirmation.confirmation_code,
        "message": t(ctx.language(), "booking.request_sent"),
    })))
}

#[get("/status/{code}")]
pub async fn status(
    ctx: web::Data<AppContext>,
    code: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let booking = ctx.booking.clone();
    let code = code.into_inner();

    let found = blocking(move || booking.lookup_status(&code)).await?;
    Ok(HttpResponse::Ok().json(found))
}

#[post("/check-phone")]
pub async fn check_phone(
    ctx: web::Data<AppContext>,
    body: web::Json<PhoneBody>,
) -> Result<HttpResponse, ApiError> {
    let booking = ctx.booking.clone();
    let phone = body.into_inner().phone.unwrap_or_default();

    let blocked = blocking(move || booking.is_phone_blocked(&phone)).await?;
    Ok(HttpResponse::Ok().json(json!({ "blocked": blocked })))
}
