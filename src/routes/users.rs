use actix_web::{web, HttpResponse};

use crate::auth::{CredentialsRequest, SessionService};
use crate::error::{AppError, ErrorContext};
use crate::middleware::AuthenticatedUser;

/// POST /api/users
///
/// # Errors
/// - 400: Missing or blank email/password
/// - 409: Email already registered
pub async fn create_user(
    form: web::Json<CredentialsRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let profile = sessions.register(&form).await?;

    Ok(HttpResponse::Created().json(profile))
}

/// PUT /api/users
///
/// Replace the caller's email and password. Requires a valid access token,
/// checked by `JwtMiddleware`.
pub async fn update_user(
    user: web::ReqData<AuthenticatedUser>,
    form: web::Json<CredentialsRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    let AuthenticatedUser(user_id) = user.into_inner();
    let context = ErrorContext::new("update_credentials").with_user_id(user_id.to_string());

    let profile = sessions
        .update_credentials(user_id, &form)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(HttpResponse::Ok().json(profile))
}
