use actix_web::{web, HttpRequest, HttpResponse};

use crate::auth::SessionService;
use crate::error::AppError;

/// POST /api/polka/webhooks
///
/// Payment provider callback, authenticated with `Authorization: ApiKey <key>`.
/// The body is taken raw so the key is checked before any decoding.
///
/// # Errors
/// - 401: Missing or wrong API key, whatever the body
/// - 400: Body is not an event
/// - 404: `user.upgraded` for an unknown user
pub async fn upgrade_webhook(
    req: HttpRequest,
    body: web::Bytes,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    sessions.handle_upgrade_event(req.headers(), &body).await?;

    Ok(HttpResponse::NoContent().finish())
}
