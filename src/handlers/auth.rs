use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{get, post, web, FromRequest, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::future::{ready, Ready};

use super::error::ApiError;
use crate::context::AppContext;
use crate::services::auth::SESSION_TTL;
use crate::services::ServiceError;

pub const SESSION_COOKIE: &str = "barberbook_admin";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

/// Session token from `Authorization: Bearer` or the session cookie.
fn session_token(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());

    bearer.or_else(|| req.cookie(SESSION_COOKIE).map(|c| c.value().to_string()))
}

fn session_cookie(token: &str, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token.to_string())
        .path("/api/admin")
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(max_age)
        .finish()
}

/// Proof that the request carries a live admin session. Taking it as a
/// handler argument guards the route.
#[derive(Debug)]
pub struct AdminSession;

impl FromRequest for AdminSession {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let authorized = match req.app_data::<web::Data<AppContext>>() {
            Some(ctx) => session_token(req)
                .map(|token| ctx.auth.is_valid(&token))
                .unwrap_or(false),
            None => {
                tracing::error!("AppContext missing while authorizing {}", req.path());
                false
            }
        };

        ready(if authorized {
            Ok(AdminSession)
        } else {
            Err(ServiceError::Unauthorized("Unauthorized".into()).into())
        })
    }
}

#[post("/login")]
pub async fn login(
    ctx: web::Data<AppContext>,
    body: web::Json<LoginBody>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    let token = ctx
        .auth
        .login(&body.username, &body.password)
        .ok_or_else(|| ServiceError::Unauthorized("Invalid credentials".into()))?;

    let max_age = time::Duration::seconds(SESSION_TTL.as_secs() as i64);
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(&token, max_age))
        .json(json!({
            "success": true,
            "message": "Login successful",
            "token": token,
        })))
}

#[post("/logout")]
pub async fn logout(ctx: web::Data<AppContext>, req: HttpRequest) -> HttpResponse {
    if let Some(token) = session_token(&req) {
        ctx.auth.logout(&token);
    }

    HttpResponse::Ok()
        .cookie(session_cookie("", time::Duration::ZERO))
        .json(json!({ "success": true, "message": "Logged out" }))
}

#[get("/check-auth")]
pub async fn check_auth(ctx: web::Data<AppContext>, req: HttpRequest) -> HttpResponse {
    let authenticated = session_token(&req)
        .map(|token| ctx.auth.is_valid(&token))
        .unwrap_or(false);

    HttpResponse::Ok().json(json!({ "authenticated": authenticated }))
}
