//! api-server — HTTP front-end for the users collection.
//!
//! Endpoints:
//! - `POST /addUser` stores a `{name, email}` record under a store-assigned id.
//! - `GET /getUser?id=<id>` fetches one record.
//! - `GET /listUsers` returns every record in the collection.
//! - `GET /` (and any other unbound path) serves a small HTML landing page.
//!
//! Storage is chosen with `STORAGE_PROVIDER`: Firestore (default), SQLite or
//! in-memory. The store client is built once at startup and injected into the
//! handlers through `AppState`.
//!
//! Run:
//! ```bash
//! # against the Firestore emulator
//! FIRESTORE_EMULATOR_HOST=localhost:8080 FIRESTORE_PROJECT_ID=demo \
//!   cargo run -p api-server
//!
//! # local file storage, JSON logs
//! STORAGE_PROVIDER=sqlite LOG_FORMAT=json cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use domain::adapters::memory_repo::InMemoryRepo;
use domain::service::UserService;
use domain::{CoreError, StoredUser, UserId, UserRecord, UserRepository};
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type SharedUsers = Arc<UserService<Arc<dyn UserRepository>>>;

#[derive(Clone)]
struct AppState {
    users: SharedUsers,
}

impl AppState {
    fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self {
            users: Arc::new(UserService::new(repo)),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_ephemeral();

    let repo = match build_repo(&cfg) {
        Ok(r) => r,
        Err(e) => {
            error!(provider = ?cfg.storage_provider, err = %e, "failed to initialize user store");
            std::process::exit(1);
        }
    };

    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let app = router(AppState::new(repo))
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .layer(cors_layer(&cfg));

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, err = %e, "failed to bind listener");
            std::process::exit(1);
        }
    };
    info!(%addr, "api-server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(err = %e, "server error");
        std::process::exit(1);
    }
    info!("api-server stopped");
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", any(home))
        .route("/addUser", post(add_user).fallback(method_not_allowed))
        // axum's `get` also answers HEAD; these endpoints accept GET only
        .route(
            "/getUser",
            get(get_user)
                .head(method_not_allowed)
                .fallback(method_not_allowed),
        )
        .route(
            "/listUsers",
            get(list_users)
                .head(method_not_allowed)
                .fallback(method_not_allowed),
        )
        .fallback(home)
        .with_state(state)
}

// CORS - origin already validated in Config::from_env()
fn cors_layer(cfg: &config::Config) -> CorsLayer {
    if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin.clone()]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    }
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct the store client selected by config and enabled features.
fn build_repo(cfg: &config::Config) -> Result<Arc<dyn UserRepository>, CoreError> {
    match cfg.storage_provider {
        config::StorageProvider::Memory => Ok(Arc::new(InMemoryRepo::new())),
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => {
            let repo = sqlite_adapter::SqliteRepo::from_env()?;
            info!("sqlite user store ready");
            Ok(Arc::new(repo))
        }
        #[cfg(feature = "firestore")]
        config::StorageProvider::Firestore => {
            let repo = gcp_firestore::FirestoreRepo::from_env()?;
            info!(collection = repo.collection(), "firestore user store ready");
            Ok(Arc::new(repo))
        }
        #[allow(unreachable_patterns)]
        _ => Err(CoreError::Repository(format!(
            "storage provider {:?} is not compiled into this build",
            cfg.storage_provider
        ))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(err = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(err = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

// ============================================================================
// Request / response bodies
// ============================================================================

/// User payload, both as accepted by `/addUser` and as returned in responses.
///
/// Decoding is lenient about keys: `name`/`email` match in any letter case,
/// a repeated key keeps its last value, unknown keys and `null` values are
/// ignored. Values that are present must be strings.
#[derive(Debug, Default, Serialize, PartialEq)]
struct UserBody {
    name: String,
    email: String,
}

impl<'de> Deserialize<'de> for UserBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct UserBodyVisitor;

        impl<'de> Visitor<'de> for UserBodyVisitor {
            type Value = UserBody;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a JSON object with name and email")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<UserBody, A::Error> {
                let mut body = UserBody::default();
                while let Some(key) = map.next_key::<String>()? {
                    let slot = if key.eq_ignore_ascii_case("name") {
                        &mut body.name
                    } else if key.eq_ignore_ascii_case("email") {
                        &mut body.email
                    } else {
                        map.next_value::<IgnoredAny>()?;
                        continue;
                    };
                    if let Some(v) = map.next_value::<Option<String>>()? {
                        *slot = v;
                    }
                }
                Ok(body)
            }
        }

        deserializer.deserialize_map(UserBodyVisitor)
    }
}

/// Decode the first JSON value of an `/addUser` body. A top-level `null` is
/// an empty user; bytes after the first value are not inspected.
fn decode_user_body(body: &[u8]) -> Result<UserBody, serde_json::Error> {
    let mut values = serde_json::Deserializer::from_slice(body).into_iter::<Option<UserBody>>();
    match values.next() {
        Some(Ok(user)) => Ok(user.unwrap_or_default()),
        Some(Err(e)) => Err(e),
        None => Err(de::Error::custom("empty request body")),
    }
}

impl From<UserRecord> for UserBody {
    fn from(r: UserRecord) -> Self {
        Self {
            name: r.name,
            email: r.email,
        }
    }
}

impl From<UserBody> for UserRecord {
    fn from(b: UserBody) -> Self {
        UserRecord::new(b.name, b.email)
    }
}

#[derive(Serialize)]
struct AddUserOut {
    message: &'static str,
    id: String,
    user: UserBody,
}

#[derive(Serialize)]
struct GetUserOut {
    id: String,
    user: UserBody,
}

#[derive(Serialize)]
struct UserEntryOut {
    id: String,
    user: UserBody,
}

impl From<StoredUser> for UserEntryOut {
    fn from(u: StoredUser) -> Self {
        Self {
            id: u.id.as_str().to_string(),
            user: u.record.into(),
        }
    }
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(http_common::json_error_with_message(code, message)),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

async fn method_not_allowed() -> Response {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "method_not_allowed",
        "Invalid request method",
    )
}

async fn add_user(State(state): State<AppState>, body: Bytes) -> Response {
    let input = match decode_user_body(&body) {
        Ok(b) => b,
        Err(e) => {
            warn!(err = %e, "add user: malformed body");
            return error_response(StatusCode::BAD_REQUEST, "bad_request", "Invalid request body");
        }
    };

    match state.users.add(input.into()) {
        Ok(stored) => {
            info!(id = %stored.id, "user added");
            Json(AddUserOut {
                message: "User added successfully",
                id: stored.id.as_str().to_string(),
                user: stored.record.into(),
            })
            .into_response()
        }
        Err(e) => {
            error!(err = %e, "add user failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "Error adding user",
            )
        }
    }
}

async fn get_user(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let raw_id = match http_common::parse_query_param(query.as_deref(), "id") {
        Some(id) if !id.is_empty() => id,
        _ => {
            warn!("get user: missing id");
            return error_response(StatusCode::BAD_REQUEST, "bad_request", "User ID required");
        }
    };

    let result = UserId::new(raw_id.as_str()).and_then(|id| state.users.get(&id));
    match result {
        Ok(record) => {
            info!(id = %raw_id, "user fetched");
            Json(GetUserOut {
                id: raw_id,
                user: record.into(),
            })
            .into_response()
        }
        Err(e) => {
            // Every lookup failure is a 404 to the client; keep the cause in the logs.
            match &e {
                CoreError::NotFound | CoreError::InvalidId(_) => {
                    warn!(id = %raw_id, err = %e, "user not found")
                }
                CoreError::Repository(_) => error!(id = %raw_id, err = %e, "user lookup failed"),
            }
            error_response(StatusCode::NOT_FOUND, "not_found", "User not found")
        }
    }
}

async fn list_users(State(state): State<AppState>) -> Response {
    let outcome = state.users.list();
    let count = outcome.users.len();
    match &outcome.interrupted {
        Some(e) => warn!(count, err = %e, "user scan interrupted; returning partial list"),
        None => info!(count, "users listed"),
    }
    let out: Vec<UserEntryOut> = outcome.users.into_iter().map(UserEntryOut::from).collect();
    Json(out).into_response()
}

async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

const HOME_PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Users API</title>
    <style>
        body { font-family: sans-serif; text-align: center; padding: 20px; }
        main { max-width: 640px; margin: auto; padding: 20px; border-radius: 8px; background: #f4f4f4; }
        ul { text-align: left; }
        code, a { color: #2471a3; }
    </style>
</head>
<body>
    <main>
        <h1>Users API</h1>
        <p>Store and retrieve user records backed by a hosted document database.</p>
        <h3>Endpoints</h3>
        <ul>
            <li><strong>POST</strong> <code>/addUser</code> - add a user from a JSON body <code>{"name": "...", "email": "..."}</code></li>
            <li><strong>GET</strong> <a href="/listUsers">/listUsers</a> - list all users</li>
            <li><strong>GET</strong> <a href="/getUser?id=yourUserID">/getUser?id=yourUserID</a> - fetch one user by id</li>
        </ul>
    </main>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use domain::UserScan;
    use tower::util::ServiceExt;

    fn app() -> Router {
        router(AppState::new(Arc::new(InMemoryRepo::new())))
    }

    async fn send(router: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn json(bytes: &[u8]) -> serde_json::Value {
        serde_json::from_slice(bytes).unwrap()
    }

    /// Store whose writes and reads always fail.
    struct BrokenRepo;

    impl UserRepository for BrokenRepo {
        fn create(&self, _record: UserRecord) -> Result<UserId, CoreError> {
            Err(CoreError::Repository("backend down".into()))
        }
        fn get(&self, _id: &UserId) -> Result<Option<UserRecord>, CoreError> {
            Err(CoreError::Repository("backend down".into()))
        }
        fn scan(&self) -> UserScan<'_> {
            Box::new(std::iter::once(Err(CoreError::Repository(
                "backend down".into(),
            ))))
        }
    }

    /// Store whose scan yields two users and then fails.
    struct TruncatingRepo;

    impl UserRepository for TruncatingRepo {
        fn create(&self, _record: UserRecord) -> Result<UserId, CoreError> {
            Err(CoreError::Repository("read only".into()))
        }
        fn get(&self, _id: &UserId) -> Result<Option<UserRecord>, CoreError> {
            Ok(None)
        }
        fn scan(&self) -> UserScan<'_> {
            let users = ["a", "b"].into_iter().map(|id| {
                Ok::<_, CoreError>(StoredUser {
                    id: UserId::new(id).unwrap(),
                    record: UserRecord::new(id, format!("{id}@example.com")),
                })
            });
            let tail = std::iter::once(Err(CoreError::Repository("page 2 failed".into())));
            let never = std::iter::once(Ok(StoredUser {
                id: UserId::new("c").unwrap(),
                record: UserRecord::new("c", "c@example.com"),
            }));
            Box::new(users.chain(tail).chain(never))
        }
    }

    #[tokio::test]
    async fn add_then_get_flow() {
        let router = app();

        let (status, body) = send(
            &router,
            "POST",
            "/addUser",
            r#"{"name":"Ada Lovelace","email":"ada@example.com"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let added = json(&body);
        assert_eq!(added["message"], "User added successfully");
        assert_eq!(
            added["user"],
            serde_json::json!({"name": "Ada Lovelace", "email": "ada@example.com"})
        );
        let id = added["id"].as_str().unwrap().to_string();
        assert!(!id.is_empty());

        let (status, body) = send(&router, "GET", &format!("/getUser?id={id}"), "").await;
        assert_eq!(status, StatusCode::OK);
        let got = json(&body);
        assert_eq!(got["id"], id.as_str());
        assert_eq!(got["user"], added["user"]);
    }

    #[tokio::test]
    async fn add_user_defaults_missing_fields() {
        let (status, body) = send(&app(), "POST", "/addUser", r#"{"name":"Solo"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json(&body)["user"],
            serde_json::json!({"name": "Solo", "email": ""})
        );
    }

    async fn added_user(router: &Router, body: &str) -> serde_json::Value {
        let (status, resp) = send(router, "POST", "/addUser", body).await;
        assert_eq!(status, StatusCode::OK, "body {body:?}");
        json(&resp)["user"].clone()
    }

    #[tokio::test]
    async fn add_user_null_body_is_empty_user() {
        let user = added_user(&app(), "null").await;
        assert_eq!(user, serde_json::json!({"name": "", "email": ""}));
    }

    #[tokio::test]
    async fn add_user_repeated_keys_keep_last_value() {
        let router = app();
        let user = added_user(&router, r#"{"name":"a","name":"b","email":"e"}"#).await;
        assert_eq!(user, serde_json::json!({"name": "b", "email": "e"}));

        let user = added_user(&router, r#"{"name":"a","Name":"b"}"#).await;
        assert_eq!(user, serde_json::json!({"name": "b", "email": ""}));
    }

    #[tokio::test]
    async fn add_user_matches_keys_in_any_case() {
        let router = app();
        let user = added_user(&router, r#"{"NAME":"a","eMaIl":"e"}"#).await;
        assert_eq!(user, serde_json::json!({"name": "a", "email": "e"}));
    }

    #[tokio::test]
    async fn add_user_ignores_unknown_keys_null_fields_and_trailing_data() {
        let router = app();
        let user = added_user(&router, r#"{"name":"a","age":3,"tags":[1,{"x":null}]}"#).await;
        assert_eq!(user, serde_json::json!({"name": "a", "email": ""}));

        let user = added_user(&router, r#"{"name":"a","name":null,"email":"e"}"#).await;
        assert_eq!(user, serde_json::json!({"name": "a", "email": "e"}));

        let user = added_user(&router, r#"{"name":"a"} {"name":"b"}"#).await;
        assert_eq!(user, serde_json::json!({"name": "a", "email": ""}));
    }

    #[tokio::test]
    async fn add_user_rejects_malformed_body() {
        let router = app();
        for bad in [
            "",
            "   ",
            "not json",
            "[1,2]",
            r#"["a","b"]"#,
            "42",
            r#""name""#,
            r#"{"name": 5}"#,
            r#"{"email": {"a": 1}}"#,
            r#"{"name":"x""#,
        ] {
            let (status, body) = send(&router, "POST", "/addUser", bad).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {bad:?}");
            assert_eq!(
                json(&body),
                serde_json::json!({"error": {"code": "bad_request", "message": "Invalid request body"}})
            );
        }
    }

    #[tokio::test]
    async fn add_user_store_failure_is_500() {
        let router = router(AppState::new(Arc::new(BrokenRepo)));
        let (status, body) = send(
            &router,
            "POST",
            "/addUser",
            r#"{"name":"a","email":"a@example.com"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let err = json(&body);
        assert_eq!(err["error"]["code"], "internal");
        assert_eq!(err["error"]["message"], "Error adding user");
        // Backend detail stays out of the response
        assert!(!String::from_utf8_lossy(&body).contains("backend down"));
    }

    #[tokio::test]
    async fn get_user_requires_id() {
        let router = app();
        for uri in [
            "/getUser",
            "/getUser?id=",
            "/getUser?other=1",
            "/getUser?id=%zz",
            "/getUser?id=a;b",
        ] {
            let (status, body) = send(&router, "GET", uri, "").await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "uri {uri}");
            assert_eq!(json(&body)["error"]["message"], "User ID required");
        }
    }

    #[tokio::test]
    async fn get_user_not_found_cases() {
        let router = app();
        for uri in [
            "/getUser?id=doesNotExist",
            "/getUser?id=a%2Fb",
            "/getUser?id=__reserved__",
            "/getUser?id=..",
        ] {
            let (status, body) = send(&router, "GET", uri, "").await;
            assert_eq!(status, StatusCode::NOT_FOUND, "uri {uri}");
            assert_eq!(
                json(&body),
                serde_json::json!({"error": {"code": "not_found", "message": "User not found"}})
            );
        }
    }

    #[tokio::test]
    async fn get_user_backend_failure_is_404() {
        let router = router(AppState::new(Arc::new(BrokenRepo)));
        let (status, _) = send(&router, "GET", "/getUser?id=abc", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_users_empty_then_filled() {
        let router = app();
        let (status, body) = send(&router, "GET", "/listUsers", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body), serde_json::json!([]));

        let mut ids = Vec::new();
        for i in 0..3 {
            let payload = format!(r#"{{"name":"u{i}","email":"u{i}@example.com"}}"#);
            let (_, body) = send(&router, "POST", "/addUser", &payload).await;
            ids.push(json(&body)["id"].as_str().unwrap().to_string());
        }

        let (status, body) = send(&router, "GET", "/listUsers", "").await;
        assert_eq!(status, StatusCode::OK);
        let list = json(&body);
        let entries = list.as_array().unwrap();
        assert_eq!(entries.len(), 3);
        for (i, id) in ids.iter().enumerate() {
            let entry = entries
                .iter()
                .find(|e| e["id"] == id.as_str())
                .expect("added user listed");
            assert_eq!(entry["user"]["name"], format!("u{i}"));
            assert_eq!(entry["user"]["email"], format!("u{i}@example.com"));
        }
    }

    #[tokio::test]
    async fn list_users_truncates_silently_on_scan_error() {
        let repo: Arc<dyn UserRepository> = Arc::new(TruncatingRepo);

        let outcome = UserService::new(repo.clone()).list();
        assert_eq!(outcome.users.len(), 2);
        assert!(!outcome.is_complete());

        let router = router(AppState::new(repo));
        let (status, body) = send(&router, "GET", "/listUsers", "").await;
        assert_eq!(status, StatusCode::OK);
        let list = json(&body);
        let ids: Vec<_> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn list_users_failing_first_read_is_empty() {
        let router = router(AppState::new(Arc::new(BrokenRepo)));
        let (status, body) = send(&router, "GET", "/listUsers", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body), serde_json::json!([]));
    }

    #[tokio::test]
    async fn wrong_methods_are_405() {
        let router = app();
        for (method, uri) in [
            ("GET", "/addUser"),
            ("PUT", "/addUser"),
            ("POST", "/getUser?id=x"),
            ("DELETE", "/getUser"),
            ("POST", "/listUsers"),
            ("PATCH", "/listUsers"),
            ("HEAD", "/listUsers"),
            ("HEAD", "/getUser?id=x"),
            ("HEAD", "/addUser"),
        ] {
            let (status, body) = send(&router, method, uri, "").await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method} {uri}");
            if method == "HEAD" {
                // HEAD responses carry no body
                continue;
            }
            assert_eq!(
                json(&body),
                serde_json::json!({"error": {"code": "method_not_allowed", "message": "Invalid request method"}})
            );
        }
    }

    #[tokio::test]
    async fn home_page_lists_endpoints() {
        let resp = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let ct = resp.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(ct.to_str().unwrap().starts_with("text/html"));
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        for path in ["/addUser", "/getUser", "/listUsers"] {
            assert!(html.contains(path), "missing {path}");
        }
    }

    #[tokio::test]
    async fn unbound_paths_serve_home_page() {
        let router = app();
        for (method, uri) in [("GET", "/nope"), ("POST", "/"), ("GET", "/users/1")] {
            let (status, body) = send(&router, method, uri, "").await;
            assert_eq!(status, StatusCode::OK, "{method} {uri}");
            assert!(String::from_utf8_lossy(&body).contains("/listUsers"));
        }
    }

    #[test]
    fn user_body_decoding() {
        let b = decode_user_body(br#"{"Name":"A","Email":"a@e.com"}"#).unwrap();
        assert_eq!(b, UserBody { name: "A".into(), email: "a@e.com".into() });
        assert_eq!(decode_user_body(b" null ").unwrap(), UserBody::default());
        assert!(decode_user_body(b"").is_err());
        assert!(decode_user_body(b"true").is_err());
    }
}
