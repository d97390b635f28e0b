/// Authentication Routes
///
/// Login, access-token refresh and refresh-token revocation.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;

use crate::auth::{LoginRequest, SessionService};
use crate::error::{AppError, ErrorContext};

#[derive(Serialize)]
pub struct RefreshResponse {
    pub token: String,
}

/// POST /api/login
///
/// Authenticate with email and password. Returns the user's profile with an
/// access token (`token`) and a refresh token.
///
/// # Errors
/// - 400: Body is not a valid login payload
/// - 401: Unknown email or wrong password (indistinguishable)
/// - 500: Internal server error
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let response = sessions.login(&form).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %response.user.id,
        "Login succeeded"
    );

    Ok(HttpResponse::Ok().json(response))
}

/// POST /api/refresh
///
/// Exchange `Authorization: Bearer <refresh_token>` for a new access token.
/// The refresh token is not rotated.
///
/// # Errors
/// - 401: Missing, unknown, expired or revoked refresh token
pub async fn refresh(
    req: HttpRequest,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let token = sessions.refresh(req.headers()).await?;

    Ok(HttpResponse::Ok().json(RefreshResponse { token }))
}

/// POST /api/revoke
///
/// Revoke `Authorization: Bearer <refresh_token>`. Repeating the call is fine.
///
/// # Errors
/// - 401: Missing or unknown refresh token
pub async fn revoke(
    req: HttpRequest,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    sessions.revoke(req.headers()).await?;

    Ok(HttpResponse::NoContent().finish())
}
