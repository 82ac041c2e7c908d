//! In-memory emulation of the Parse REST API, mounted under `/1`.
//!
//! Covers the endpoints the client library talks to: classes, users,
//! login, roles, files, analytics events, push and batch. Every call must
//! carry the configured application id.

pub mod store;

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

use store::{codes, new_object_id, Object, ParseError, QuerySpec, Store, StoredFile, ROLE_CLASS, USER_CLASS};

pub const API_PREFIX: &str = "/1";
pub const APPLICATION_ID_HEADER: &str = "x-parse-application-id";
pub const MASTER_KEY_HEADER: &str = "x-parse-master-key";
pub const SESSION_TOKEN_HEADER: &str = "x-parse-session-token";

const MAX_BATCH_SIZE: usize = 50;

#[derive(Clone, Debug)]
pub struct MockConfig {
    pub application_id: String,
    pub master_key: String,
    pub file_host: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            application_id: "mock-app-id".to_string(),
            master_key: "mock-master-key".to_string(),
            file_host: "http://files.parse.test".to_string(),
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Arc<MockConfig>,
}

impl AppState {
    pub fn new(config: MockConfig) -> Self {
        Self {
            db: Arc::new(RwLock::new(Store::default())),
            config: Arc::new(config),
        }
    }
}

type ApiResult = Result<(StatusCode, Json<Value>), ParseError>;

pub fn app() -> Router {
    router(AppState::new(MockConfig::default()))
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/classes/{class}", get(query_objects).post(create_object))
        .route(
            "/classes/{class}/{id}",
            get(get_object).put(update_object).delete(delete_object),
        )
        .route("/users", get(query_users).post(sign_up))
        .route("/users/me", get(current_user))
        .route("/users/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/login", get(log_in))
        .route("/requestPasswordReset", post(request_password_reset))
        .route("/roles", get(query_roles).post(create_role))
        .route("/roles/{id}", get(get_role).put(update_role).delete(delete_role))
        .route("/files/{name}", post(upload_file).delete(delete_file))
        .route("/events/{name}", post(track_event))
        .route("/push", post(send_push))
        .route("/batch", post(batch))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_application_id))
        .with_state(state);
    Router::new().nest(API_PREFIX, api)
}

pub async fn run_with(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, router(AppState::new(config))).await
}

async fn require_application_id(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if header(request.headers(), APPLICATION_ID_HEADER) != Some(state.config.application_id.as_str()) {
        debug!(uri = %request.uri(), "rejecting request without application id");
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"}))).into_response();
    }
    next.run(request).await
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn is_master(headers: &HeaderMap, state: &AppState) -> bool {
    header(headers, MASTER_KEY_HEADER) == Some(state.config.master_key.as_str())
}

fn ok(value: Value) -> ApiResult {
    Ok((StatusCode::OK, Json(value)))
}

fn created(value: Value) -> ApiResult {
    Ok((StatusCode::CREATED, Json(value)))
}

fn public_user(mut user: Object) -> Value {
    user.remove("password");
    Value::Object(user)
}

// --- classes ---

async fn query_objects(
    State(state): State<AppState>,
    Path(class): Path<String>,
    Query(pairs): Query<HashMap<String, String>>,
) -> ApiResult {
    let query = QuerySpec::from_pairs(&pairs)?;
    ok(state.db.read().await.query(&class, &query)?)
}

async fn create_object(
    State(state): State<AppState>,
    Path(class): Path<String>,
    Json(body): Json<Object>,
) -> ApiResult {
    created(state.db.write().await.create(&class, body)?)
}

async fn get_object(State(state): State<AppState>, Path((class, id)): Path<(String, String)>) -> ApiResult {
    ok(Value::Object(state.db.read().await.get(&class, &id)?))
}

async fn update_object(
    State(state): State<AppState>,
    Path((class, id)): Path<(String, String)>,
    Json(body): Json<Object>,
) -> ApiResult {
    ok(state.db.write().await.update(&class, &id, body)?)
}

async fn delete_object(State(state): State<AppState>, Path((class, id)): Path<(String, String)>) -> ApiResult {
    ok(state.db.write().await.delete(&class, &id)?)
}

// --- users ---

async fn sign_up(State(state): State<AppState>, Json(body): Json<Object>) -> ApiResult {
    let mut db = state.db.write().await;

    if body.contains_key("authData") && !body.contains_key("username") {
        return social_log_in(&mut db, body);
    }

    let username = match body.get("username").and_then(Value::as_str) {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => return Err(ParseError::bad_request(codes::USERNAME_MISSING, "bad or missing username")),
    };
    if !matches!(body.get("password").and_then(Value::as_str), Some(p) if !p.is_empty()) {
        return Err(ParseError::bad_request(codes::PASSWORD_MISSING, "password is required"));
    }
    if db.find_first(USER_CLASS, "username", &Value::from(username.clone())).is_some() {
        return Err(ParseError::bad_request(
            codes::USERNAME_TAKEN,
            format!("Account already exists for this username: {username}"),
        ));
    }

    let mut reply = db.create(USER_CLASS, body)?;
    let object_id = reply["objectId"].as_str().unwrap_or_default().to_string();
    reply["sessionToken"] = Value::from(db.open_session(&object_id));
    created(reply)
}

/// Log in an existing user by `authData`, or create one.
fn social_log_in(db: &mut Store, body: Object) -> ApiResult {
    let (provider, id) = match body.get("authData").and_then(Value::as_object) {
        Some(auth) if auth.len() == 1 => {
            let (provider, data) = auth.iter().next().map(|(k, v)| (k.clone(), v.clone())).unwrap_or_default();
            match data.get("id") {
                Some(id) => (provider, id.clone()),
                None => return Err(ParseError::bad_request(codes::MISSING_REQUIRED_FIELD, "authData needs an id")),
            }
        }
        _ => {
            return Err(ParseError::bad_request(
                codes::INVALID_JSON,
                "authData must hold exactly one provider",
            ))
        }
    };

    if let Some(user) = db.find_by_auth_data(&provider, &id) {
        let object_id = user.get("objectId").and_then(Value::as_str).unwrap_or_default().to_string();
        let mut reply = public_user(user);
        reply["sessionToken"] = Value::from(db.open_session(&object_id));
        return ok(reply);
    }

    let mut data = body;
    let username = new_object_id();
    data.insert("username".into(), Value::from(username.clone()));
    let mut reply = db.create(USER_CLASS, data)?;
    let object_id = reply["objectId"].as_str().unwrap_or_default().to_string();
    reply["username"] = Value::from(username);
    reply["sessionToken"] = Value::from(db.open_session(&object_id));
    created(reply)
}

async fn log_in(State(state): State<AppState>, Query(pairs): Query<HashMap<String, String>>) -> ApiResult {
    let invalid = || ParseError::new(StatusCode::NOT_FOUND, codes::OBJECT_NOT_FOUND, "Invalid username/password.");
    let (Some(username), Some(password)) = (pairs.get("username"), pairs.get("password")) else {
        return Err(invalid());
    };

    let mut db = state.db.write().await;
    let user = db
        .find_first(USER_CLASS, "username", &Value::from(username.as_str()))
        .filter(|u| u.get("password").and_then(Value::as_str) == Some(password.as_str()))
        .ok_or_else(invalid)?;
    let object_id = user.get("objectId").and_then(Value::as_str).unwrap_or_default().to_string();
    let mut reply = public_user(user);
    reply["sessionToken"] = Value::from(db.open_session(&object_id));
    ok(reply)
}

async fn current_user(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    let db = state.db.read().await;
    header(&headers, SESSION_TOKEN_HEADER)
        .and_then(|token| db.session_user(token))
        .map(|user| ok(public_user(user)))
        .unwrap_or_else(|| Err(ParseError::bad_request(codes::INVALID_SESSION_TOKEN, "invalid session token")))
}

async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    ok(public_user(state.db.read().await.get(USER_CLASS, &id)?))
}

async fn query_users(State(state): State<AppState>, Query(pairs): Query<HashMap<String, String>>) -> ApiResult {
    let query = QuerySpec::from_pairs(&pairs)?;
    let mut body = state.db.read().await.query(USER_CLASS, &query)?;
    if let Some(results) = body.get_mut("results").and_then(Value::as_array_mut) {
        for user in results.iter_mut() {
            if let Some(user) = user.as_object_mut() {
                user.remove("password");
            }
        }
    }
    ok(body)
}

/// Users may only be changed by themselves or with the master key.
fn authorize_user_change(db: &Store, headers: &HeaderMap, state: &AppState, id: &str) -> Result<(), ParseError> {
    if is_master(headers, state) {
        return Ok(());
    }
    let owner = header(headers, SESSION_TOKEN_HEADER)
        .and_then(|token| db.session_user(token))
        .and_then(|user| user.get("objectId").and_then(Value::as_str).map(str::to_string));
    if owner.as_deref() == Some(id) {
        Ok(())
    } else {
        Err(ParseError::bad_request(codes::SESSION_MISSING, "cannot modify user"))
    }
}

async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(mut body): Json<Object>,
) -> ApiResult {
    let mut db = state.db.write().await;
    authorize_user_change(&db, &headers, &state, &id)?;

    if let Some(Value::Object(changes)) = body.remove("authData") {
        let existing = db.get(USER_CLASS, &id)?;
        let mut auth = existing
            .get("authData")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        for (provider, data) in changes {
            if data.is_null() {
                auth.remove(&provider);
            } else {
                auth.insert(provider, data);
            }
        }
        body.insert("authData".into(), Value::Object(auth));
    }

    ok(db.update(USER_CLASS, &id, body)?)
}

async fn delete_user(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<String>) -> ApiResult {
    let mut db = state.db.write().await;
    authorize_user_change(&db, &headers, &state, &id)?;
    ok(db.delete(USER_CLASS, &id)?)
}

async fn request_password_reset(State(state): State<AppState>, Json(body): Json<Object>) -> ApiResult {
    let email = body.get("email").and_then(Value::as_str).unwrap_or_default().to_string();
    let mut db = state.db.write().await;
    if db.find_first(USER_CLASS, "email", &Value::from(email.clone())).is_none() {
        return Err(ParseError::bad_request(
            codes::EMAIL_NOT_FOUND,
            format!("no user found with email {email}"),
        ));
    }
    db.password_resets.push(email);
    ok(json!({}))
}

// --- roles ---

async fn create_role(State(state): State<AppState>, Json(body): Json<Object>) -> ApiResult {
    let name = match body.get("name").and_then(Value::as_str) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => return Err(ParseError::bad_request(codes::MISSING_REQUIRED_FIELD, "A role must have a name")),
    };
    let mut db = state.db.write().await;
    if db.find_first(ROLE_CLASS, "name", &Value::from(name.clone())).is_some() {
        return Err(ParseError::bad_request(
            codes::DUPLICATE_VALUE,
            format!("A duplicate value for a field with unique values was provided: {name}"),
        ));
    }
    created(db.create(ROLE_CLASS, body)?)
}

async fn get_role(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    ok(Value::Object(state.db.read().await.get(ROLE_CLASS, &id)?))
}

async fn query_roles(State(state): State<AppState>, Query(pairs): Query<HashMap<String, String>>) -> ApiResult {
    let query = QuerySpec::from_pairs(&pairs)?;
    ok(state.db.read().await.query(ROLE_CLASS, &query)?)
}

async fn update_role(State(state): State<AppState>, Path(id): Path<String>, Json(body): Json<Object>) -> ApiResult {
    ok(state.db.write().await.update(ROLE_CLASS, &id, body)?)
}

async fn delete_role(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    ok(state.db.write().await.delete(ROLE_CLASS, &id)?)
}

// --- files ---

async fn upload_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let content_type = header(&headers, "content-type")
        .unwrap_or("application/octet-stream")
        .to_string();
    let stored = state.db.write().await.put_file(
        &name,
        StoredFile {
            content_type,
            bytes: body.to_vec(),
        },
    );
    let url = format!("{}/{stored}", state.config.file_host);
    created(json!({"name": stored, "url": url}))
}

async fn delete_file(State(state): State<AppState>, headers: HeaderMap, Path(name): Path<String>) -> ApiResult {
    if !is_master(&headers, &state) {
        return Err(ParseError::new(
            StatusCode::FORBIDDEN,
            codes::OPERATION_FORBIDDEN,
            "unauthorized: master key is required",
        ));
    }
    state
        .db
        .write()
        .await
        .remove_file(&name)
        .map(|_| json!({}))
        .ok_or_else(|| ParseError::new(StatusCode::NOT_FOUND, codes::FILE_DELETE_ERROR, "file not found"))
        .and_then(ok)
}

// --- analytics & push ---

async fn track_event(State(state): State<AppState>, Path(name): Path<String>, Json(body): Json<Value>) -> ApiResult {
    state.db.write().await.events.push((name, body));
    ok(json!({}))
}

async fn send_push(State(state): State<AppState>, Json(body): Json<Object>) -> ApiResult {
    if !matches!(body.get("data"), Some(Value::Object(_))) {
        return Err(ParseError::bad_request(codes::PUSH_MISCONFIGURED, "Missing the push data."));
    }
    state.db.write().await.pushes.push(Value::Object(body));
    ok(json!({"result": true}))
}

// --- batch ---

async fn batch(State(state): State<AppState>, Json(body): Json<Object>) -> ApiResult {
    let requests = match body.get("requests") {
        Some(Value::Array(requests)) => requests.clone(),
        _ => return Err(ParseError::bad_request(codes::INVALID_JSON, "requests must be an array")),
    };
    if requests.len() > MAX_BATCH_SIZE {
        return Err(ParseError::bad_request(
            codes::INVALID_JSON,
            format!("too many operations in batch (max {MAX_BATCH_SIZE})"),
        ));
    }

    let mut db = state.db.write().await;
    let results: Vec<Value> = requests
        .iter()
        .map(|request| match run_batch_entry(&mut db, request) {
            Ok(success) => json!({ "success": success }),
            Err(error) => json!({ "error": error.to_json() }),
        })
        .collect();
    ok(Value::Array(results))
}

/// Sub-request paths are absolute, e.g. `/1/classes/GameScore/abc`.
fn run_batch_entry(db: &mut Store, request: &Value) -> Result<Value, ParseError> {
    let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
    let path = request.get("path").and_then(Value::as_str).unwrap_or_default();
    let body = match request.get("body") {
        Some(Value::Object(body)) => body.clone(),
        Some(_) => return Err(ParseError::bad_request(codes::INVALID_JSON, "body must be an object")),
        None => Object::new(),
    };

    let relative = path
        .strip_prefix(API_PREFIX)
        .filter(|rest| rest.starts_with('/'))
        .ok_or_else(|| ParseError::bad_request(codes::INVALID_JSON, format!("cannot route batch path {path}")))?;
    let segments: Vec<&str> = relative.trim_start_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        ("POST", ["classes", class]) => db.create(class, body),
        ("PUT", ["classes", class, id]) => db.update(class, id, body),
        ("DELETE", ["classes", class, id]) => db.delete(class, id),
        _ => Err(ParseError::bad_request(
            codes::INVALID_JSON,
            format!("cannot route batch request {method} {path}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_entry_requires_absolute_path() {
        let mut db = Store::default();
        let err = run_batch_entry(
            &mut db,
            &json!({"method": "POST", "path": "/classes/GameScore", "body": {}}),
        )
        .unwrap_err();
        assert_eq!(err.code, codes::INVALID_JSON);
    }

    #[test]
    fn batch_entry_routes_class_operations() {
        let mut db = Store::default();
        let created = run_batch_entry(
            &mut db,
            &json!({"method": "POST", "path": "/1/classes/GameScore", "body": {"score": 1}}),
        )
        .unwrap();
        let id = created["objectId"].as_str().unwrap().to_string();

        run_batch_entry(
            &mut db,
            &json!({"method": "PUT", "path": format!("/1/classes/GameScore/{id}"), "body": {"score": 2}}),
        )
        .unwrap();
        assert_eq!(db.get("GameScore", &id).unwrap()["score"], 2);

        run_batch_entry(&mut db, &json!({"method": "DELETE", "path": format!("/1/classes/GameScore/{id}")})).unwrap();
        assert!(db.get("GameScore", &id).is_err());
    }

    #[test]
    fn batch_entry_rejects_unknown_routes() {
        let mut db = Store::default();
        let err = run_batch_entry(&mut db, &json!({"method": "GET", "path": "/1/users"})).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn public_user_hides_password() {
        let user: Object = serde_json::from_value(json!({"username": "a", "password": "p"})).unwrap();
        let user = public_user(user);
        assert!(user.get("password").is_none());
        assert_eq!(user["username"], "a");
    }

    #[test]
    fn default_config_values() {
        let config = MockConfig::default();
        assert_eq!(config.application_id, "mock-app-id");
        assert_eq!(config.master_key, "mock-master-key");
    }
}
