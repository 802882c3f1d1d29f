use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use super::auth::AdminSession;
use super::blocking;
use super::error::ApiError;
use super::public::{DateQuery, PhoneBody};
use crate::context::AppContext;
use crate::services::lifecycle::LifecycleController;
use crate::services::ServiceError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ActionBody {
    pub id: Option<i32>,
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditBody {
    pub id: Option<i32>,
    pub client_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditClientBody {
    pub phone: Option<String>,
    pub client_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BlockBody {
    pub phone: Option<String>,
    pub reason: Option<String>,
}

#[post("/action")]
pub async fn action(
    _session: AdminSession,
    ctx: web::Data<AppContext>,
    body: web::Json<ActionBody>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let id = body
        .id
        .ok_or_else(|| ServiceError::Validation("Missing id or action".into()))?;
    let requested = LifecycleController::parse_action(body.action.as_deref())?;

    tracing::info!("Admin action {:?} for appointment {}", requested, id);
    let outcome = ctx.lifecycle.apply_action(id, requested).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "status": outcome.status,
        "notifications": outcome.notifications,
    })))
}

#[post("/reminders/trigger")]
pub async fn trigger_reminders(
    _session: AdminSession,
    ctx: web::Data<AppContext>,
) -> HttpResponse {
    let report = ctx.scheduler.trigger_now().await;
    tracing::info!("Manual reminder sweep: {:?}", report);
    HttpResponse::Ok().json(report)
}

#[get("/appointments")]
pub async fn appointments(
    _session: AdminSession,
    ctx: web::Data<AppContext>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let admin = ctx.admin.clone();
    let search = query.into_inner().search;

    let rows = blocking(move || admin.search(search.as_deref())).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[get("/stats")]
pub async fn stats(
    _session: AdminSession,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, ApiError> {
    let admin = ctx.admin.clone();
    let totals = blocking(move || admin.stats()).await?;
    Ok(HttpResponse::Ok().json(totals))
}

#[get("/notifications")]
pub async fn notifications(
    _session: AdminSession,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, ApiError> {
    let admin = ctx.admin.clone();
    let pending = blocking(move || admin.pending_notifications()).await?;
    Ok(HttpResponse::Ok().json(pending))
}

#[post("/edit")]
pub async fn edit(
    _session: AdminSession,
    ctx: web::Data<AppContext>,
    body: web::Json<EditBody>,
) -> Result<HttpResponse, ApiError> {
    let admin = ctx.admin.clone();
    let body = body.into_inner();

    blocking(move || admin.rename_appointment(body.id, body.client_name.as_deref())).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[post("/edit-client")]
pub async fn edit_client(
    _session: AdminSession,
    ctx: web::Data<AppContext>,
    body: web::Json<EditClientBody>,
) -> Result<HttpResponse, ApiError> {
    let admin = ctx.admin.clone();
    let body = body.into_inner();

    let updated = blocking(move || {
        admin.rename_client(body.phone.as_deref(), body.client_name.as_deref())
    })
    .await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "updated": updated })))
}

#[get("/clients")]
pub async fn clients(
    _session: AdminSession,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, ApiError> {
    let admin = ctx.admin.clone();
    let summaries = blocking(move || admin.clients()).await?;
    Ok(HttpResponse::Ok().json(summaries))
}

#[get("/schedule")]
pub async fn schedule(
    _session: AdminSession,
    ctx: web::Data<AppContext>,
    query: web::Query<DateQuery>,
) -> Result<HttpResponse, ApiError> {
    let admin = ctx.admin.clone();
    let date = query.into_inner().date;

    let rows = blocking(move || admin.schedule(date.as_deref())).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[get("/notification-status")]
pub async fn notification_status(
    _session: AdminSession,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, ApiError> {
    let admin = ctx.admin.clone();
    let status = blocking(move || Ok(admin.notification_status())).await?;
    Ok(HttpResponse::Ok().json(status))
}

#[post("/block-phone")]
pub async fn block_phone(
    _session: AdminSession,
    ctx: web::Data<AppContext>,
    body: web::Json<BlockBody>,
) -> Result<HttpResponse, ApiError> {
    let admin = ctx.admin.clone();
    let body = body.into_inner();

    let phone = blocking(move || admin.block_phone(body.phone.as_deref(), body.reason.as_deref())).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "blocked": phone })))
}

#[post("/unblock-phone")]
pub async fn unblock_phone(
    _session: AdminSession,
    ctx: web::Data<AppContext>,
    body: web::Json<PhoneBody>,
) -> Result<HttpResponse, ApiError> {
    let admin = ctx.admin.clone();
    let phone = body.into_inner().phone;

    let phone = blocking(move || admin.unblock_phone(phone.as_deref())).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "unblocked": phone })))
}

#[get("/blocked-phones")]
pub async fn blocked_phones(
    _session: AdminSession,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse, ApiError> {
    let admin = ctx.admin.clone();
    let phones = blocking(move || admin.blocked_phones()).await?;
    Ok(HttpResponse::Ok().json(phones))
}

#[cfg(test)]
mod tests {
    use crate::channels::{ChannelKind, NotificationChannel, Notifier};
    use crate::handlers::configure;
    use crate::handlers::testing::{admin_header, context, context_with};
    use crate::test_support::{insert_appointment, MemoryStore, RecordingChannel};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use barberbook::store::AppointmentStore;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    #[actix_web::test]
    async fn test_confirm_reports_notifications() {
        let store = Arc::new(MemoryStore::new());
        let telegram = Arc::new(RecordingChannel::new(ChannelKind::Telegram));
        let email = Arc::new(RecordingChannel::new(ChannelKind::Email));
        let notifier = Notifier::new(
            telegram.clone() as Arc<dyn NotificationChannel>,
            email.clone() as Arc<dyn NotificationChannel>,
            Duration::from_secs(10),
        );
        let id = insert_appointment(&store, "10:00", None);
        let ctx = context_with(store.clone(), notifier);
        let auth = admin_header(&ctx);
        let app = test::init_service(App::new().app_data(ctx).configure(configure)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/admin/action")
                .insert_header(auth.clone())
                .set_json(json!({ "id": id, "action": "confirm" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body,
            json!({
                "success": true,
                "status": "confirmed",
                "notifications": { "telegram": true, "email": false },
            })
        );

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/admin/action")
                .insert_header(auth.clone())
                .set_json(json!({ "id": id, "action": "reject" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(store.find_by_id(id).unwrap().unwrap().status, "confirmed");
        assert_eq!(telegram.sent().len(), 1);
    }

    #[actix_web::test]
    async fn test_action_validation() {
        let store = Arc::new(MemoryStore::new());
        let id = insert_appointment(&store, "10:00", None);
        let ctx = context(store);
        let auth = admin_header(&ctx);
        let app = test::init_service(App::new().app_data(ctx).configure(configure)).await;

        let cases = [
            (json!({ "action": "confirm" }), StatusCode::BAD_REQUEST, "Missing id or action"),
            (json!({ "id": id }), StatusCode::BAD_REQUEST, "Missing id or action"),
            (json!({ "id": id, "action": "delete" }), StatusCode::BAD_REQUEST, "Invalid action"),
            (json!({ "id": 999, "action": "confirm" }), StatusCode::NOT_FOUND, "Appointment not found"),
        ];

        for (payload, expected_status, expected_error) in cases {
            let resp = test::call_service(
                &app,
                test::TestRequest::post()
                    .uri("/api/admin/action")
                    .insert_header(auth.clone())
                    .set_json(payload)
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), expected_status);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["error"], expected_error);
        }
    }

    #[actix_web::test]
    async fn test_mistyped_action_body_is_a_json_error() {
        let ctx = context(Arc::new(MemoryStore::new()));
        let auth = admin_header(&ctx);
        let app = test::init_service(App::new().app_data(ctx).configure(configure)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/admin/action")
                .insert_header(auth.clone())
                .set_json(json!({ "id": "5", "action": "confirm" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Invalid request body" }));
    }

    #[actix_web::test]
    async fn test_reminder_trigger_returns_report() {
        let ctx = context(Arc::new(MemoryStore::new()));
        let auth = admin_header(&ctx);
        let app = test::init_service(App::new().app_data(ctx).configure(configure)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/admin/reminders/trigger")
                .insert_header(auth.clone())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "due": 0, "reminded": 0, "skipped": 0 }));
    }

    #[actix_web::test]
    async fn test_block_and_unblock_phone() {
        let store = Arc::new(MemoryStore::new());
        let ctx = context(store.clone());
        let auth = admin_header(&ctx);
        let app = test::init_service(App::new().app_data(ctx).configure(configure)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/admin/block-phone")
                .insert_header(auth.clone())
                .set_json(json!({ "phone": "+359 888 123 456", "reason": "no-show" }))
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "success": true, "blocked": "0888123456" }));
        assert!(store.is_phone_blocked("0888123456").unwrap());

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/admin/blocked-phones")
                .insert_header(auth.clone())
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body[0]["phone"], "0888123456");
        assert_eq!(body[0]["reason"], "no-show");

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/admin/unblock-phone")
                .insert_header(auth.clone())
                .set_json(json!({ "phone": "0888123456" }))
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "success": true, "unblocked": "0888123456" }));
        assert!(!store.is_phone_blocked("0888123456").unwrap());

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/admin/block-phone")
                .insert_header(auth.clone())
                .set_json(json!({}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_edit_client_reports_updated_rows() {
        let store = Arc::new(MemoryStore::new());
        insert_appointment(&store, "10:00", None);
        insert_appointment(&store, "11:00", None);
        let ctx = context(store.clone());
        let auth = admin_header(&ctx);
        let app = test::init_service(App::new().app_data(ctx).configure(configure)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/admin/edit-client")
                .insert_header(auth.clone())
                .set_json(json!({ "phone": "+359888123456", "clientName": "Georgi <b>Ivanov</b>" }))
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "success": true, "updated": 2 }));
        assert!(store
            .all_appointments()
            .iter()
            .all(|a| a.client_name == "Georgi bIvanov/b"));

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/admin/edit-client")
                .insert_header(auth.clone())
                .set_json(json!({ "phone": "0877000111", "clientName": "Nobody" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_schedule_and_search() {
        let store = Arc::new(MemoryStore::new());
        insert_appointment(&store, "11:00", None);
        insert_appointment(&store, "10:00", Some("georgi@mail.bg"));
        let ctx = context(store);
        let auth = admin_header(&ctx);
        let app = test::init_service(App::new().app_data(ctx).configure(configure)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/admin/schedule?date=2024-06-01")
                .insert_header(auth.clone())
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        let times: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["time"].as_str().unwrap())
            .collect();
        assert_eq!(times, vec!["10:00", "11:00"]);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/admin/schedule?date=tomorrow")
                .insert_header(auth.clone())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/admin/appointments?search=MAIL.BG")
                .insert_header(auth.clone())
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["clientEmail"], "georgi@mail.bg");
    }

    #[actix_web::test]
    async fn test_notification_status_counts_subscribers() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_subscriber(555, "0888123456", "Georgi").unwrap();
        let ctx = context(store);
        let auth = admin_header(&ctx);
        let app = test::init_service(App::new().app_data(ctx).configure(configure)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/admin/notification-status")
                .insert_header(auth.clone())
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body,
            json!({
                "telegram": { "enabled": false, "subscribers": 1 },
                "email": { "enabled": false },
            })
        );
    }
}
