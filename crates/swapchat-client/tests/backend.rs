//! REST client against an in-process fake backend.

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};
use swapchat_client::{BackendClient, ClientConfig, ClientError};
use tokio::net::TcpListener;

const TOKEN: &str = "eyJhbGciOi.test.token";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|cookie| cookie.contains(&format!("SubjectSwapLoginJWT={TOKEN}")))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Not authenticated" }))).into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["email"] == "ada@example.org" && body["password"] == "hunter2" {
        let cookie = format!("SubjectSwapLoginJWT={TOKEN}; Path=/; HttpOnly");
        ([(header::SET_COOKIE, cookie)], Json(json!({ "email": "ada@example.org", "username": "ada" }))).into_response()
    } else {
        (StatusCode::BAD_REQUEST, Json(json!({ "message": "Incorrect email or password" }))).into_response()
    }
}

async fn verify_user(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "email": "ada@example.org", "username": "ada", "uuid": "u-ada" })).into_response()
}

async fn user_info(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    match body["uuid"].as_str() {
        Some("u-bob") => Json(json!({ "name": "Bob", "profilePic": "https://cdn.example.org/bob.png" })).into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({ "message": "User not found" }))).into_response(),
    }
}

async fn previous_chats(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!([
        { "convo_id": "u-bob", "name": "Bob", "profilePic": null },
        { "convo_id": "u-cy", "name": "Cy" },
    ]))
    .into_response()
}

async fn logout() -> StatusCode {
    StatusCode::OK
}

async fn create_account(Json(body): Json<Value>) -> Response {
    if body["email"] == "taken@example.org" {
        return (StatusCode::CONFLICT, Json(json!({ "message": "Email already registered" }))).into_response();
    }
    Json(json!({ "message": "Verification email sent" })).into_response()
}

async fn spawn_backend() -> ClientConfig {
    let app = Router::new()
        .route("/login", post(login))
        .route("/verify-user", post(verify_user))
        .route("/logout", post(logout))
        .route("/create-account", post(create_account))
        .route("/chat/get_user_info", post(user_info))
        .route("/chat/previous_chats", post(previous_chats));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    ClientConfig::parse(&format!("http://{addr}")).unwrap()
}

#[tokio::test]
async fn login_stores_token_for_later_requests() {
    let client = BackendClient::new(spawn_backend().await).unwrap();
    assert_eq!(client.bearer_token(), "");

    let user = client.login("ada@example.org", "hunter2").await.unwrap();
    assert_eq!(user.username, "ada");
    assert_eq!(client.bearer_token(), TOKEN);

    let verified = client.verify_user().await.unwrap();
    assert_eq!(verified.uuid.as_deref(), Some("u-ada"));
    assert!(verified.is_complete());
}

#[tokio::test]
async fn failed_login_surfaces_backend_message() {
    let client = BackendClient::new(spawn_backend().await).unwrap();
    let err = client.login("ada@example.org", "wrong").await.unwrap_err();
    assert_eq!(err, ClientError::Status { status: 400, message: "Incorrect email or password".into() });
    assert_eq!(client.bearer_token(), "");
}

#[tokio::test]
async fn anonymous_requests_are_unauthorized() {
    let client = BackendClient::new(spawn_backend().await).unwrap();
    let err = client.verify_user().await.unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn seeded_token_authenticates_lookups() {
    let client = BackendClient::new(spawn_backend().await).unwrap().with_token(TOKEN);

    let info = client.user_info("u-bob").await.unwrap();
    assert_eq!(info.name, "Bob");
    assert_eq!(info.profile_pic.as_deref(), Some("https://cdn.example.org/bob.png"));

    let chats = client.previous_chats().await.unwrap();
    let ids: Vec<_> = chats.iter().map(|c| c.convo_id.as_str()).collect();
    assert_eq!(ids, ["u-bob", "u-cy"]);
    assert_eq!(chats[1].profile_pic, None);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let client = BackendClient::new(spawn_backend().await).unwrap().with_token(TOKEN);
    let err = client.user_info("u-nobody").await.unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 404, .. }));
}

#[tokio::test]
async fn cookie_header_seeding_and_relay_auth() {
    let config = spawn_backend().await;
    let client = BackendClient::new(config).unwrap().with_cookie(&format!("theme=dark; SubjectSwapLoginJWT={TOKEN}"));

    let auth = client.relay_auth().unwrap();
    assert_eq!(auth.token, TOKEN);
    assert_eq!(auth.namespace, "/private_chat");
    assert!(auth.url.starts_with("ws://127.0.0.1:"));
    assert!(auth.url.ends_with("/socket.io/?EIO=4&transport=websocket"));
}

#[tokio::test]
async fn register_and_logout() {
    let client = BackendClient::new(spawn_backend().await).unwrap();

    let ack = client.register("ada", "ada@example.org", "hunter2").await.unwrap();
    assert_eq!(ack.message.as_deref(), Some("Verification email sent"));

    let err = client.register("ada", "taken@example.org", "hunter2").await.unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 409, .. }));

    client.logout().await.unwrap();
}
