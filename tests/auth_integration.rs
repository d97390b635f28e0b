use std::net::TcpListener;
use std::sync::Arc;

use chirpy::auth::{validate_access_token, Claims};
use chirpy::configuration::{JwtSettings, WebhookSettings};
use chirpy::startup::{build_session_service, run};
use chirpy::store::{InMemoryRefreshTokenRepository, InMemoryUserRepository};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{json, Value};

const SECRET: &str = "test-secret-key-at-least-32-characters-long";
const API_KEY: &str = "f271c81ff7084ee5b99a5091b42d486e";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let sessions = build_session_service(
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(InMemoryRefreshTokenRepository::new()),
        JwtSettings {
            secret: SECRET.to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 60 * 24 * 3600,
        },
        WebhookSettings {
            api_key: API_KEY.to_string(),
        },
    );
    let server = run(listener, sessions).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn post_with_auth(&self, path: &str, authorization: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .header("Authorization", authorization)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn register(&self, email: &str, password: &str) -> Value {
        let response = self
            .post_json("/api/users", &json!({"email": email, "password": password}))
            .await;
        assert_eq!(201, response.status().as_u16());
        response.json().await.expect("Failed to parse response")
    }

    async fn login(&self, email: &str, password: &str) -> Value {
        let response = self
            .post_json("/api/login", &json!({"email": email, "password": password}))
            .await;
        assert_eq!(200, response.status().as_u16());
        response.json().await.expect("Failed to parse response")
    }
}

fn str_field<'a>(body: &'a Value, field: &str) -> &'a str {
    body.get(field)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("missing {} in {}", field, body))
}

// --- Registration ---

#[tokio::test]
async fn register_returns_201_with_public_profile() {
    let app = spawn_app();

    let body = app.register("a@b.com", "pw123").await;

    assert_eq!(str_field(&body, "email"), "a@b.com");
    assert_eq!(body["is_chirpy_red"], json!(false));
    assert!(body.get("id").is_some());
    assert!(body.get("hashed_password").is_none());
}

#[tokio::test]
async fn register_returns_409_for_duplicate_email() {
    let app = spawn_app();
    app.register("a@b.com", "pw123").await;

    let response = app
        .post_json("/api/users", &json!({"email": "a@b.com", "password": "other"}))
        .await;

    assert_eq!(409, response.status().as_u16());
}

#[tokio::test]
async fn register_returns_400_for_bad_payloads() {
    let app = spawn_app();

    let test_cases = vec![
        (json!({"password": "pw123"}), "missing email"),
        (json!({"email": "a@b.com"}), "missing password"),
        (json!({"email": "", "password": "pw123"}), "blank email"),
        (json!({"email": 42, "password": "pw123"}), "wrong type"),
    ];

    for (body, reason) in test_cases {
        let response = app.post_json("/api/users", &body).await;
        assert_eq!(400, response.status().as_u16(), "Should reject: {}", reason);
    }
}

// --- Login ---

#[tokio::test]
async fn login_returns_tokens_for_valid_credentials() {
    let app = spawn_app();
    let user = app.register("a@b.com", "pw123").await;

    let body = app.login("a@b.com", "pw123").await;

    assert_eq!(body["id"], user["id"]);
    assert_eq!(str_field(&body, "email"), "a@b.com");

    let user_id = validate_access_token(str_field(&body, "token"), SECRET)
        .expect("Access token should validate");
    assert_eq!(user_id.to_string(), str_field(&user, "id"));

    let refresh_token = str_field(&body, "refresh_token");
    assert_eq!(refresh_token.len(), 64);
}

#[tokio::test]
async fn login_ignores_client_supplied_expiry() {
    let app = spawn_app();
    app.register("a@b.com", "pw123").await;

    let response = app
        .post_json(
            "/api/login",
            &json!({
                "email": "a@b.com",
                "password": "pw123",
                "expires_in_seconds": 31_536_000
            }),
        )
        .await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();

    let claims = decode::<Claims>(
        str_field(&body, "token"),
        &DecodingKey::from_secret(SECRET.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .expect("Failed to decode token")
    .claims;
    assert_eq!(claims.exp - claims.iat, 3600);
}

#[tokio::test]
async fn login_failures_look_the_same() {
    let app = spawn_app();
    app.register("a@b.com", "pw123").await;

    let wrong_password = app
        .post_json("/api/login", &json!({"email": "a@b.com", "password": "nope"}))
        .await;
    let unknown_email = app
        .post_json("/api/login", &json!({"email": "x@b.com", "password": "pw123"}))
        .await;

    assert_eq!(401, wrong_password.status().as_u16());
    assert_eq!(401, unknown_email.status().as_u16());

    let first: Value = wrong_password.json().await.unwrap();
    let second: Value = unknown_email.json().await.unwrap();
    assert_eq!(first["message"], second["message"]);
    assert_eq!(first["code"], second["code"]);
}

#[tokio::test]
async fn login_returns_400_for_malformed_body() {
    let app = spawn_app();

    let response = app
        .client
        .post(&format!("{}/api/login", app.address))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
}

// --- Refresh / Revoke ---

#[tokio::test]
async fn refresh_returns_new_access_token_repeatedly() {
    let app = spawn_app();
    let user = app.register("a@b.com", "pw123").await;
    let login = app.login("a@b.com", "pw123").await;
    let authorization = format!("Bearer {}", str_field(&login, "refresh_token"));

    for _ in 0..2 {
        let response = app.post_with_auth("/api/refresh", &authorization).await;
        assert_eq!(200, response.status().as_u16());

        let body: Value = response.json().await.unwrap();
        let user_id = validate_access_token(str_field(&body, "token"), SECRET).unwrap();
        assert_eq!(user_id.to_string(), str_field(&user, "id"));
    }
}

#[tokio::test]
async fn refresh_returns_401_for_unknown_token() {
    let app = spawn_app();

    let response = app
        .post_with_auth("/api/refresh", "Bearer 0123456789abcdef")
        .await;

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], json!("Unauthorized"));
}

#[tokio::test]
async fn refresh_returns_401_without_header() {
    let app = spawn_app();

    let response = app
        .client
        .post(&format!("{}/api/refresh", app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn revoked_token_cannot_refresh() {
    let app = spawn_app();
    app.register("a@b.com", "pw123").await;
    let login = app.login("a@b.com", "pw123").await;
    let authorization = format!("Bearer {}", str_field(&login, "refresh_token"));

    let response = app.post_with_auth("/api/revoke", &authorization).await;
    assert_eq!(204, response.status().as_u16());

    let response = app.post_with_auth("/api/refresh", &authorization).await;
    assert_eq!(401, response.status().as_u16());

    // revoking again is not an error
    let response = app.post_with_auth("/api/revoke", &authorization).await;
    assert_eq!(204, response.status().as_u16());
}

#[tokio::test]
async fn revoke_returns_401_for_unknown_token() {
    let app = spawn_app();

    let response = app.post_with_auth("/api/revoke", "Bearer deadbeef").await;

    assert_eq!(401, response.status().as_u16());
}

// --- Credential update ---

#[tokio::test]
async fn update_user_requires_access_token() {
    let app = spawn_app();
    app.register("a@b.com", "pw123").await;
    let login = app.login("a@b.com", "pw123").await;
    let body = json!({"email": "new@b.com", "password": "newpw"});

    let missing = app
        .client
        .put(&format!("{}/api/users", app.address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(401, missing.status().as_u16());

    let with_refresh_token = app
        .client
        .put(&format!("{}/api/users", app.address))
        .bearer_auth(str_field(&login, "refresh_token"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(401, with_refresh_token.status().as_u16());
}

#[tokio::test]
async fn update_user_changes_credentials() {
    let app = spawn_app();
    let user = app.register("a@b.com", "pw123").await;
    let login = app.login("a@b.com", "pw123").await;

    let response = app
        .client
        .put(&format!("{}/api/users", app.address))
        .bearer_auth(str_field(&login, "token"))
        .json(&json!({"email": "new@b.com", "password": "newpw"}))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], user["id"]);
    assert_eq!(str_field(&body, "email"), "new@b.com");

    let old = app
        .post_json("/api/login", &json!({"email": "a@b.com", "password": "pw123"}))
        .await;
    assert_eq!(401, old.status().as_u16());
    app.login("new@b.com", "newpw").await;
}

// --- Upgrade webhook ---

#[tokio::test]
async fn webhook_rejects_wrong_api_key() {
    let app = spawn_app();
    let user = app.register("a@b.com", "pw123").await;

    let response = app
        .client
        .post(&format!("{}/api/polka/webhooks", app.address))
        .header("Authorization", "ApiKey wrong")
        .json(&json!({"event": "user.upgraded", "data": {"user_id": user["id"]}}))
        .send()
        .await
        .unwrap();

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn webhook_upgrades_user() {
    let app = spawn_app();
    let user = app.register("a@b.com", "pw123").await;
    let authorization = format!("ApiKey {}", API_KEY);

    let response = app
        .client
        .post(&format!("{}/api/polka/webhooks", app.address))
        .header("Authorization", &authorization)
        .json(&json!({"event": "user.payment_failed", "data": {"user_id": user["id"]}}))
        .send()
        .await
        .unwrap();
    assert_eq!(204, response.status().as_u16());
    assert_eq!(app.login("a@b.com", "pw123").await["is_chirpy_red"], json!(false));

    let response = app
        .client
        .post(&format!("{}/api/polka/webhooks", app.address))
        .header("Authorization", &authorization)
        .json(&json!({"event": "user.upgraded", "data": {"user_id": user["id"]}}))
        .send()
        .await
        .unwrap();
    assert_eq!(204, response.status().as_u16());
    assert_eq!(app.login("a@b.com", "pw123").await["is_chirpy_red"], json!(true));
}

#[tokio::test]
async fn webhook_returns_404_for_unknown_user() {
    let app = spawn_app();

    let response = app
        .client
        .post(&format!("{}/api/polka/webhooks", app.address))
        .header("Authorization", format!("ApiKey {}", API_KEY))
        .json(&json!({
            "event": "user.upgraded",
            "data": {"user_id": "3311741c-680c-4546-99f3-fc9efac2036c"}
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
async fn webhook_checks_api_key_before_decoding_body() {
    let app = spawn_app();
    let send = |authorization: Option<String>| {
        let mut request = app
            .client
            .post(&format!("{}/api/polka/webhooks", app.address))
            .header("Content-Type", "application/json")
            .body("{garbage");
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }
        request.send()
    };

    let response = send(Some("ApiKey wrong".to_string())).await.unwrap();
    assert_eq!(401, response.status().as_u16());

    let response = send(None).await.unwrap();
    assert_eq!(401, response.status().as_u16());

    let response = send(Some(format!("ApiKey {}", API_KEY))).await.unwrap();
    assert_eq!(400, response.status().as_u16());
}
