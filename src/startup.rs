use actix_web::dev::Server;
use actix_web::{guard, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{RefreshTokenStore, SessionService};
use crate::configuration::{JwtSettings, WebhookSettings};
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    create_user, health_check, login, refresh, revoke, update_user, upgrade_webhook,
};
use crate::store::{RefreshTokenRepository, UserRepository};

/// Wire the session service from its collaborators and configuration
pub fn build_session_service(
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
    jwt: JwtSettings,
    webhook: WebhookSettings,
) -> SessionService {
    let store = RefreshTokenStore::new(refresh_tokens, jwt.refresh_token_lifetime());
    SessionService::new(users, store, jwt, webhook.api_key)
}

/// JSON bodies that fail to decode are rejected with 400 before the handler runs
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::Validation(ValidationError::InvalidPayload(err.to_string())).into()
    })
}

pub fn run(listener: TcpListener, sessions: SessionService) -> Result<Server, std::io::Error> {
    let sessions_data = web::Data::new(sessions.clone());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(sessions_data.clone())
            .app_data(json_config())
            .service(
                web::scope("/api")
                    // Protected: the resource guard lets POST /users fall through
                    .service(
                        web::resource("/users")
                            .guard(guard::Put())
                            .wrap(JwtMiddleware::new(sessions.clone()))
                            .to(update_user),
                    )
                    .route("/healthz", web::get().to(health_check))
                    .route("/users", web::post().to(create_user))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/revoke", web::post().to(revoke))
                    .route("/polka/webhooks", web::post().to(upgrade_webhook)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
