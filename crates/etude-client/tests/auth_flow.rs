use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::{Value, json};

use etude_client::session::{sign_in, sign_out};
use etude_client::{ApiClient, ClientConfig, ClientError, CredentialProvider, MemoryTokenStore};
use etude_types::api::{RegisterData, UpdateProfileData};
use etude_types::models::UserType;

const GOOD_TOKEN: &str = "tok-123";

/// Authorization header seen on every request, in arrival order.
#[derive(Clone, Default)]
struct Seen(Arc<Mutex<Vec<(String, Option<String>)>>>);

impl Seen {
    fn take(&self) -> Vec<(String, Option<String>)> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

fn user_json() -> Value {
    json!({
        "id": "6f1c2a5e-0f59-4a4e-9a53-0b4a8d7f0e11",
        "firstName": "Hugo",
        "lastName": "Lefebvre",
        "email": "a@b.com",
        "userType": "entrepreneur",
        "createdAt": "2026-01-05T10:00:00.000000Z",
    })
}

async fn record(State(seen): State<Seen>, req: Request, next: Next) -> Response {
    let auth = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    seen.0.lock().unwrap().push((req.uri().path().to_string(), auth));
    next.run(req).await
}

fn is_authorized(req: &Request) -> bool {
    req.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some("Bearer tok-123")
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] == "secret" {
        Json(json!({"user": user_json(), "token": GOOD_TOKEN})).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "UNAUTHORIZED", "message": "invalid email or password"})),
        )
            .into_response()
    }
}

async fn register(Json(_): Json<Value>) -> Response {
    (StatusCode::CREATED, Json(json!({"user": user_json(), "token": GOOD_TOKEN}))).into_response()
}

async fn me(req: Request) -> Response {
    if is_authorized(&req) {
        Json(user_json()).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn profile(Json(body): Json<Value>) -> Response {
    let mut user = user_json();
    if let Some(last_name) = body.get("lastName") {
        user["lastName"] = last_name.clone();
    }
    Json(user).into_response()
}

async fn change_password(Json(body): Json<Value>) -> Response {
    if body["currentPassword"] == "secret" {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "VALIDATION_ERROR", "message": "current password is incorrect", "field": "currentPassword"})),
        )
            .into_response()
    }
}

/// Start a loopback API and return its base URL.
async fn spawn_server(seen: Seen) -> String {
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/me", get(me))
        .route("/api/auth/profile", put(profile))
        .route("/api/auth/change-password", put(change_password))
        .layer(middleware::from_fn_with_state(seen, record));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api")
}

fn register_data() -> RegisterData {
    RegisterData {
        first_name: "Hugo".into(),
        last_name: "Lefebvre".into(),
        email: "a@b.com".into(),
        password: "secret".into(),
        user_type: UserType::Entrepreneur,
    }
}

async fn call_every_operation(client: &ApiClient) {
    let _ = client.login("a@b.com", "secret").await;
    let _ = client.register(&register_data()).await;
    let _ = client.get_current_user().await;
    let _ = client
        .update_profile(&UpdateProfileData {
            last_name: Some("Roux".into()),
            ..Default::default()
        })
        .await;
    let _ = client.change_password("secret", "nouveau-secret").await;
}

#[tokio::test]
async fn test_every_request_carries_stored_token() {
    let seen = Seen::default();
    let base = spawn_server(seen.clone()).await;
    let client = ApiClient::new(ClientConfig::new(base), Arc::new(MemoryTokenStore::with_token(GOOD_TOKEN)));

    call_every_operation(&client).await;

    let requests = seen.take();
    assert_eq!(requests.len(), 5);
    for (path, auth) in requests {
        assert_eq!(auth.as_deref(), Some("Bearer tok-123"), "missing bearer on {path}");
    }
}

#[tokio::test]
async fn test_no_header_without_stored_token() {
    let seen = Seen::default();
    let base = spawn_server(seen.clone()).await;
    let client = ApiClient::new(ClientConfig::new(base), Arc::new(MemoryTokenStore::new()));

    call_every_operation(&client).await;

    let requests = seen.take();
    assert_eq!(requests.len(), 5);
    for (path, auth) in requests {
        assert!(auth.is_none(), "unexpected Authorization on {path}");
    }
}

#[tokio::test]
async fn test_token_is_read_fresh_for_each_request() {
    let seen = Seen::default();
    let base = spawn_server(seen.clone()).await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = ApiClient::new(ClientConfig::new(base), store.clone());

    let err = client.get_current_user().await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));

    sign_in(&client, store.as_ref(), "a@b.com", "secret").await.unwrap();
    let user = client.get_current_user().await.unwrap();
    assert_eq!(user.email, "a@b.com");
    assert_eq!(user.user_type, UserType::Entrepreneur);

    sign_out(store.as_ref()).unwrap();
    assert!(client.get_current_user().await.is_err());
}

#[tokio::test]
async fn test_failed_login_is_surfaced_without_retry_or_token() {
    let seen = Seen::default();
    let base = spawn_server(seen.clone()).await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = ApiClient::new(ClientConfig::new(base), store.clone());

    let err = sign_in(&client, store.as_ref(), "a@b.com", "wrong").await.unwrap_err();

    match &err {
        ClientError::Api { status, .. } => assert_eq!(*status, StatusCode::UNAUTHORIZED),
        other => panic!("expected Api error, got {other:?}"),
    }
    assert_eq!(err.error_body().unwrap().message, "invalid email or password");
    assert_eq!(seen.take().len(), 1, "login must not be retried");
    assert_eq!(store.token(), None);
}

#[tokio::test]
async fn test_server_validation_errors_pass_through() {
    let seen = Seen::default();
    let base = spawn_server(seen.clone()).await;
    let client = ApiClient::new(ClientConfig::new(base), Arc::new(MemoryTokenStore::with_token(GOOD_TOKEN)));

    let err = client.change_password("wrong", "nouveau-secret").await.unwrap_err();
    let body = err.error_body().unwrap();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    assert_eq!(body.field.as_deref(), Some("currentPassword"));

    let updated = client
        .update_profile(&UpdateProfileData {
            last_name: Some("Roux".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updated.last_name, "Roux");
}

#[tokio::test]
async fn test_unreachable_server_is_a_transport_error() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(
        ClientConfig::new(format!("http://{addr}/api")),
        Arc::new(MemoryTokenStore::new()),
    );
    let err = client.login("a@b.com", "secret").await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}

#[tokio::test]
async fn test_truncated_error_body_is_a_transport_error() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Promises 100 bytes of error body, sends 5, then hangs up
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 100\r\n\r\nshort")
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });

    let client = ApiClient::new(
        ClientConfig::new(format!("http://{addr}/api")),
        Arc::new(MemoryTokenStore::new()),
    );
    let err = client.get_current_user().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
}
