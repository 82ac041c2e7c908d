//! In-memory object store with the subset of Parse query semantics the
//! client exercises.

use std::cmp::Ordering;
use std::collections::HashMap;

use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

pub type Object = Map<String, Value>;

pub const USER_CLASS: &str = "_User";
pub const ROLE_CLASS: &str = "_Role";

const DEFAULT_LIMIT: usize = 100;

/// Parse error codes used by the mock.
pub mod codes {
    pub const OBJECT_NOT_FOUND: i64 = 101;
    pub const INVALID_QUERY: i64 = 102;
    pub const INVALID_JSON: i64 = 107;
    pub const INCORRECT_TYPE: i64 = 111;
    pub const PUSH_MISCONFIGURED: i64 = 115;
    pub const OPERATION_FORBIDDEN: i64 = 119;
    pub const MISSING_REQUIRED_FIELD: i64 = 135;
    pub const DUPLICATE_VALUE: i64 = 137;
    pub const FILE_DELETE_ERROR: i64 = 153;
    pub const USERNAME_MISSING: i64 = 200;
    pub const PASSWORD_MISSING: i64 = 201;
    pub const USERNAME_TAKEN: i64 = 202;
    pub const EMAIL_NOT_FOUND: i64 = 205;
    pub const SESSION_MISSING: i64 = 206;
    pub const INVALID_SESSION_TOKEN: i64 = 209;
}

/// An error body in Parse's `{"code", "error"}` shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub status: StatusCode,
    pub code: i64,
    pub message: String,
}

impl ParseError {
    pub fn new(status: StatusCode, code: i64, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::OBJECT_NOT_FOUND, "Object not found.")
    }

    pub fn bad_request(code: i64, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn to_json(&self) -> Value {
        json!({"code": self.code, "error": self.message})
    }
}

impl IntoResponse for ParseError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.to_json())).into_response()
    }
}

/// Stored uploaded file.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Query options decoded from the query string.
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    pub filter: Object,
    pub order: Option<String>,
    pub limit: Option<usize>,
    pub skip: usize,
    pub count: bool,
}

impl QuerySpec {
    pub fn from_pairs(pairs: &HashMap<String, String>) -> Result<Self, ParseError> {
        let filter = match pairs.get("where") {
            Some(raw) => match serde_json::from_str(raw) {
                Ok(Value::Object(map)) => map,
                _ => return Err(ParseError::bad_request(codes::INVALID_JSON, "invalid JSON in where")),
            },
            None => Object::new(),
        };
        let limit = parse_number(pairs, "limit")?;
        let skip = parse_number(pairs, "skip")?.unwrap_or(0);
        let count = pairs.get("count").map(|c| c == "1" || c == "true").unwrap_or(false);
        Ok(Self {
            filter,
            order: pairs.get("order").cloned(),
            limit,
            skip,
            count,
        })
    }
}

fn parse_number(pairs: &HashMap<String, String>, key: &str) -> Result<Option<usize>, ParseError> {
    pairs
        .get(key)
        .map(|raw| {
            raw.parse()
                .map_err(|_| ParseError::bad_request(codes::INVALID_QUERY, format!("invalid {key}")))
        })
        .transpose()
}

#[derive(Debug, Default)]
pub struct Store {
    classes: HashMap<String, HashMap<String, Object>>,
    sessions: HashMap<String, String>,
    files: HashMap<String, StoredFile>,
    pub events: Vec<(String, Value)>,
    pub pushes: Vec<Value>,
    pub password_resets: Vec<String>,
}

pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn new_object_id() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_string()
}

impl Store {
    pub fn create(&mut self, class: &str, mut data: Object) -> Result<Value, ParseError> {
        strip_reserved(&mut data);
        let object_id = new_object_id();
        let created_at = now();
        let mut stored = Object::new();
        apply_operations(&mut stored, &data)?;
        stored.insert("objectId".into(), Value::from(object_id.clone()));
        stored.insert("createdAt".into(), Value::from(created_at.clone()));
        stored.insert("updatedAt".into(), Value::from(created_at.clone()));
        self.classes
            .entry(class.to_string())
            .or_default()
            .insert(object_id.clone(), stored);
        Ok(json!({"objectId": object_id, "createdAt": created_at}))
    }

    pub fn get(&self, class: &str, object_id: &str) -> Result<Object, ParseError> {
        self.classes
            .get(class)
            .and_then(|objects| objects.get(object_id))
            .cloned()
            .ok_or_else(ParseError::not_found)
    }

    /// Apply `data` to an existing object. The reply carries `updatedAt` and
    /// the resulting value of every field touched by an `Increment`.
    pub fn update(&mut self, class: &str, object_id: &str, mut data: Object) -> Result<Value, ParseError> {
        strip_reserved(&mut data);
        let stored = self
            .classes
            .get_mut(class)
            .and_then(|objects| objects.get_mut(object_id))
            .ok_or_else(ParseError::not_found)?;
        let touched = apply_operations(stored, &data)?;
        let updated_at = now();
        stored.insert("updatedAt".into(), Value::from(updated_at.clone()));

        let mut reply = Object::new();
        for field in touched {
            if let Some(value) = stored.get(&field) {
                reply.insert(field, value.clone());
            }
        }
        reply.insert("updatedAt".into(), Value::from(updated_at));
        Ok(Value::Object(reply))
    }

    pub fn delete(&mut self, class: &str, object_id: &str) -> Result<Value, ParseError> {
        self.classes
            .get_mut(class)
            .and_then(|objects| objects.remove(object_id))
            .map(|_| json!({}))
            .ok_or_else(ParseError::not_found)
    }

    pub fn query(&self, class: &str, query: &QuerySpec) -> Result<Value, ParseError> {
        let mut matched: Vec<Object> = match self.classes.get(class) {
            Some(objects) => {
                let mut matched = Vec::new();
                for object in objects.values() {
                    if matches_filter(object, &query.filter)? {
                        matched.push(object.clone());
                    }
                }
                matched
            }
            None => Vec::new(),
        };

        match query.order.as_deref() {
            Some(order) => {
                let (field, descending) = match order.strip_prefix('-') {
                    Some(field) => (field, true),
                    None => (order, false),
                };
                matched.sort_by(|a, b| {
                    let ord = compare(a.get(field), b.get(field)).unwrap_or(Ordering::Equal);
                    if descending { ord.reverse() } else { ord }
                });
            }
            None => matched.sort_by(|a, b| compare(a.get("createdAt"), b.get("createdAt")).unwrap_or(Ordering::Equal)),
        }

        let total = matched.len();
        let results: Vec<Value> = matched
            .into_iter()
            .skip(query.skip)
            .take(query.limit.unwrap_or(DEFAULT_LIMIT))
            .map(Value::Object)
            .collect();

        let mut body = json!({ "results": results });
        if query.count {
            body["count"] = Value::from(total);
        }
        Ok(body)
    }

    pub fn find_first(&self, class: &str, field: &str, value: &Value) -> Option<Object> {
        self.classes
            .get(class)?
            .values()
            .find(|o| o.get(field) == Some(value))
            .cloned()
    }

    pub fn find_by_auth_data(&self, provider: &str, id: &Value) -> Option<Object> {
        self.classes.get(USER_CLASS)?.values().find(|o| {
            o.get("authData")
                .and_then(|a| a.get(provider))
                .and_then(|p| p.get("id"))
                == Some(id)
        }).cloned()
    }

    pub fn open_session(&mut self, user_id: &str) -> String {
        let token = format!("r:{}", Uuid::new_v4().simple());
        self.sessions.insert(token.clone(), user_id.to_string());
        token
    }

    pub fn session_user(&self, token: &str) -> Option<Object> {
        let user_id = self.sessions.get(token)?;
        self.get(USER_CLASS, user_id).ok()
    }

    pub fn put_file(&mut self, name: &str, file: StoredFile) -> String {
        let stored_name = format!("tfss-{}-{name}", Uuid::new_v4().simple());
        self.files.insert(stored_name.clone(), file);
        stored_name
    }

    pub fn file(&self, name: &str) -> Option<&StoredFile> {
        self.files.get(name)
    }

    pub fn remove_file(&mut self, name: &str) -> Option<StoredFile> {
        self.files.remove(name)
    }
}

/// Fields the server owns.
fn strip_reserved(data: &mut Object) {
    for key in ["objectId", "createdAt", "updatedAt", "sessionToken"] {
        data.remove(key);
    }
}

/// Apply field values and `__op` operations to `target`, returning the
/// names of fields whose resulting value the client cannot know.
fn apply_operations(target: &mut Object, data: &Object) -> Result<Vec<String>, ParseError> {
    let mut touched = Vec::new();
    for (field, value) in data {
        match value.get("__op").and_then(Value::as_str) {
            Some("Increment") => {
                let amount = value
                    .get("amount")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| ParseError::bad_request(codes::INVALID_JSON, "Increment needs a numeric amount"))?;
                let current = match target.get(field) {
                    None | Some(Value::Null) => 0.0,
                    Some(v) => v.as_f64().ok_or_else(|| {
                        ParseError::bad_request(codes::INCORRECT_TYPE, format!("cannot increment non-number field {field}"))
                    })?,
                };
                target.insert(field.clone(), number(current + amount));
                touched.push(field.clone());
            }
            Some("Delete") => {
                target.remove(field);
            }
            Some(op) => {
                return Err(ParseError::bad_request(codes::INVALID_JSON, format!("unsupported operation {op}")));
            }
            None => {
                target.insert(field.clone(), value.clone());
            }
        }
    }
    Ok(touched)
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

fn matches_filter(object: &Object, filter: &Object) -> Result<bool, ParseError> {
    for (field, constraint) in filter {
        let actual = object.get(field);
        let ok = match constraint {
            Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
                let mut ok = true;
                for (op, expected) in ops {
                    ok &= match op.as_str() {
                        "$gt" => compare(actual, Some(expected)) == Some(Ordering::Greater),
                        "$gte" => matches!(compare(actual, Some(expected)), Some(Ordering::Greater | Ordering::Equal)),
                        "$lt" => compare(actual, Some(expected)) == Some(Ordering::Less),
                        "$lte" => matches!(compare(actual, Some(expected)), Some(Ordering::Less | Ordering::Equal)),
                        "$ne" => actual != Some(expected),
                        "$in" => expected.as_array().map(|a| actual.map(|v| a.contains(v)).unwrap_or(false)).unwrap_or(false),
                        "$exists" => actual.is_some() == expected.as_bool().unwrap_or(true),
                        other => {
                            return Err(ParseError::bad_request(codes::INVALID_QUERY, format!("unsupported operator {other}")));
                        }
                    };
                }
                ok
            }
            expected => actual == Some(expected),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Option<Ordering> {
    match (a?, b?) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
