//! Integration tests for `ApiClient` against a real HTTP server.
//!
//! Each test binds an axum backend on 127.0.0.1:0 whose answers are keyed
//! off the bearer credential, so one router covers every status path.

use std::time::Duration;

use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use evently_api::{ApiClient, LoginError};
use evently_protocol::{Credential, PrincipalKind};
use evently_session::{Verifier, VerifyError};
use serde_json::{Value, json};

// =========================================================================
// Mock backend
// =========================================================================

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn user_profile(headers: HeaderMap) -> Response {
    match bearer(&headers) {
        Some("abc.def.ghi") => Json(json!({
            "_id": "u1",
            "name": "Alice",
            "email": "alice@example.com",
            "profilePicture": "https://cdn.example.com/alice.png",
        }))
        .into_response(),
        // The profile arrives as a JSON-encoded string.
        Some("str.ing.ify") => {
            Json(Value::String(r#"{"_id":"u2","name":"Bob"}"#.into())).into_response()
        }
        Some("for.bid.den") => StatusCode::FORBIDDEN.into_response(),
        Some("bro.ken.aaa") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Some("gar.bag.eee") => "<html>oops</html>".into_response(),
        Some("nob.ody.aaa") => Json(json!({"email": "x@example.com"})).into_response(),
        Some("slo.wwa.aaa") => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK.into_response()
        }
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"message": "jwt expired"})))
            .into_response(),
    }
}

async fn organizer_profile(headers: HeaderMap) -> Response {
    match bearer(&headers) {
        Some("org.ani.zer") => Json(json!({
            "organizer": {
                "_doc": {
                    "_id": {"$oid": "o1"},
                    "name": "Venue Co",
                    "role": "organizer",
                }
            }
        }))
        .into_response(),
        // A user credential presented to the organizer endpoint.
        Some("abc.def.ghi") => Json(json!({
            "_id": "u1",
            "name": "Alice",
            "role": "user",
        }))
        .into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn user_login(Json(body): Json<Value>) -> Response {
    match (body["email"].as_str(), body["password"].as_str()) {
        (Some("alice@example.com"), Some("secret")) => Json(json!({
            "token": "abc.def.ghi",
            "user": {"_id": "u1", "firstName": "Alice", "lastName": "Liddell"},
        }))
        .into_response(),
        (Some("weird@example.com"), _) => Json(json!({
            "token": "not-a-credential",
            "user": {"_id": "u9", "name": "Weird"},
        }))
        .into_response(),
        (Some("down@example.com"), _) => StatusCode::BAD_GATEWAY.into_response(),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"message": "bad credentials"})))
            .into_response(),
    }
}

async fn organizer_login(Json(body): Json<Value>) -> Response {
    match body["email"].as_str() {
        Some("venue@example.com") => Json(json!({
            "token": "org.ani.zer",
            "organizer": {"_id": "o1", "name": "Venue Co"},
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Starts the mock backend and returns its API base URL.
async fn spawn_backend() -> String {
    let api = Router::new()
        .route("/users/profile", get(user_profile))
        .route("/users/login", post(user_login))
        .route("/organizer/profile", get(organizer_profile))
        .route("/organizer/login", post(organizer_login));
    let app = Router::new().nest("/api", api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}/api")
}

fn cred(raw: &str) -> Credential {
    Credential::parse(raw).unwrap()
}

async fn verify(kind: PrincipalKind, raw: &str) -> Result<evently_protocol::Identity, VerifyError> {
    let client = ApiClient::new(spawn_backend().await).unwrap();
    client.verify(kind, &cred(raw)).await
}

// =========================================================================
// Verify
// =========================================================================

#[tokio::test]
async fn test_verify_user_returns_normalized_identity() {
    let identity = verify(PrincipalKind::User, "abc.def.ghi").await.unwrap();

    assert_eq!(identity.id, "u1");
    assert_eq!(identity.display_name, "Alice");
    assert_eq!(identity.kind, PrincipalKind::User);
    assert_eq!(identity.email.as_deref(), Some("alice@example.com"));
    assert_eq!(
        identity.picture.as_deref(),
        Some("https://cdn.example.com/alice.png")
    );
}

#[tokio::test]
async fn test_verify_stringified_profile_is_decoded() {
    let identity = verify(PrincipalKind::User, "str.ing.ify").await.unwrap();
    assert_eq!(identity.id, "u2");
    assert_eq!(identity.display_name, "Bob");
}

#[tokio::test]
async fn test_verify_organizer_unwraps_envelope_and_doc() {
    let identity = verify(PrincipalKind::Organizer, "org.ani.zer").await.unwrap();
    assert_eq!(identity.id, "o1");
    assert_eq!(identity.display_name, "Venue Co");
    assert_eq!(identity.kind, PrincipalKind::Organizer);
}

#[tokio::test]
async fn test_verify_401_is_unauthorized() {
    let err = verify(PrincipalKind::User, "exp.ire.ddd").await.unwrap_err();
    assert_eq!(err, VerifyError::Unauthorized { status: 401 });
}

#[tokio::test]
async fn test_verify_403_is_unauthorized() {
    let err = verify(PrincipalKind::User, "for.bid.den").await.unwrap_err();
    assert_eq!(err, VerifyError::Unauthorized { status: 403 });
}

#[tokio::test]
async fn test_verify_500_is_network() {
    let err = verify(PrincipalKind::User, "bro.ken.aaa").await.unwrap_err();
    assert!(matches!(err, VerifyError::Network(msg) if msg.contains("500")));
}

#[tokio::test]
async fn test_verify_non_json_body_is_malformed() {
    let err = verify(PrincipalKind::User, "gar.bag.eee").await.unwrap_err();
    assert!(matches!(err, VerifyError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_verify_record_without_id_is_malformed() {
    let err = verify(PrincipalKind::User, "nob.ody.aaa").await.unwrap_err();
    assert!(matches!(err, VerifyError::MalformedResponse(msg) if msg.contains("id")));
}

#[tokio::test]
async fn test_verify_record_for_other_principal_is_malformed() {
    let err = verify(PrincipalKind::Organizer, "abc.def.ghi").await.unwrap_err();
    assert!(matches!(err, VerifyError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_verify_timeout_is_network() {
    let client =
        ApiClient::with_timeout(spawn_backend().await, Duration::from_millis(200)).unwrap();

    let err = client
        .verify(PrincipalKind::User, &cred("slo.wwa.aaa"))
        .await
        .unwrap_err();

    assert!(matches!(err, VerifyError::Network(_)));
}

#[tokio::test]
async fn test_verify_unreachable_backend_is_network() {
    // Bind then release a port so nothing is listening on it.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(format!("http://{addr}/api")).unwrap();
    let err = client
        .verify(PrincipalKind::User, &cred("abc.def.ghi"))
        .await
        .unwrap_err();

    assert!(matches!(err, VerifyError::Network(_)));
}

// =========================================================================
// Login
// =========================================================================

#[tokio::test]
async fn test_login_user_returns_grant() {
    let client = ApiClient::new(spawn_backend().await).unwrap();

    let grant = client
        .login(PrincipalKind::User, "alice@example.com", "secret")
        .await
        .unwrap();

    assert_eq!(grant.credential.as_str(), "abc.def.ghi");
    assert_eq!(grant.identity.id, "u1");
    assert_eq!(grant.identity.display_name, "Alice Liddell");
}

#[tokio::test]
async fn test_login_organizer_reads_organizer_key() {
    let client = ApiClient::new(spawn_backend().await).unwrap();

    let grant = client
        .login(PrincipalKind::Organizer, "venue@example.com", "pw")
        .await
        .unwrap();

    assert_eq!(grant.credential.as_str(), "org.ani.zer");
    assert_eq!(grant.identity.kind, PrincipalKind::Organizer);
}

#[tokio::test]
async fn test_login_wrong_password_is_rejected() {
    let client = ApiClient::new(spawn_backend().await).unwrap();

    let err = client
        .login(PrincipalKind::User, "alice@example.com", "wrong")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        LoginError::Rejected {
            kind: PrincipalKind::User,
            status: 401,
        }
    );
}

#[tokio::test]
async fn test_login_any_client_error_is_rejected() {
    let client = ApiClient::new(spawn_backend().await).unwrap();
    let err = client
        .login(PrincipalKind::Organizer, "nobody@example.com", "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, LoginError::Rejected { status: 404, .. }));
}

#[tokio::test]
async fn test_login_gateway_error_is_network() {
    let client = ApiClient::new(spawn_backend().await).unwrap();
    let err = client
        .login(PrincipalKind::User, "down@example.com", "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, LoginError::Network(_)));
}

#[tokio::test]
async fn test_login_invalid_token_is_malformed() {
    let client = ApiClient::new(spawn_backend().await).unwrap();
    let err = client
        .login(PrincipalKind::User, "weird@example.com", "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, LoginError::MalformedResponse(_)));
}
