//! Request dispatcher for the Parse REST API.
//!
//! # Design
//! `ParseClient` holds only immutable configuration and a shared transport.
//! Every call is described by an `ApiCall` and goes through three steps:
//! `build_request` (pure), `Transport::execute` (I/O), `parse_response`
//! (pure). The pure halves are public so callers can drive their own I/O.
//!
//! A transport failure is an `Err`. Any HTTP response, successful or not, is
//! an `Ok(Reply)` carrying the normalized body and a `success` flag; turning
//! an unsuccessful reply into an error is left to the caller.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::resources::{Analytics, Files, Objects, Push, Roles, Users};
use crate::transport::{Transport, UreqTransport};

pub const APPLICATION_ID_HEADER: &str = "X-Parse-Application-Id";
pub const SESSION_TOKEN_HEADER: &str = "X-Parse-Session-Token";
pub const MASTER_KEY_HEADER: &str = "X-Parse-Master-Key";
pub const REST_API_KEY_HEADER: &str = "X-Parse-REST-API-Key";

/// JSON object used for parameters, request bodies and opaque entities.
pub type Params = Map<String, Value>;

/// One call against the API, before it is turned into an `HttpRequest`.
#[derive(Debug, Clone)]
pub struct ApiCall {
    pub method: HttpMethod,
    /// Fixed route appended to the base URL, e.g. `/classes`.
    pub path: String,
    /// Caller-supplied segments (class names, ids, file names) appended
    /// after `path`, each percent-encoded as a single segment.
    pub segments: Vec<String>,
    pub params: Option<Params>,
    /// Raw body, used only when `params` is absent.
    pub body: Option<Vec<u8>>,
    pub headers: Vec<(String, String)>,
}

impl ApiCall {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            segments: Vec::new(),
            params: None,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }

    pub fn maybe_params(mut self, params: Option<Params>) -> Self {
        self.params = params;
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// A count request carries a truthy `count` parameter; its body keeps
    /// the `results` field instead of being unwrapped.
    pub fn is_count_request(&self) -> bool {
        self.params
            .as_ref()
            .and_then(|p| p.get("count"))
            .map(is_truthy)
            .unwrap_or(false)
    }
}

/// A normalized response.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Parsed JSON for JSON responses, with `results` unwrapped for
    /// non-count calls. Non-JSON bodies are kept as a string, or `Null` when
    /// empty.
    pub body: Value,
    /// Status was 200/201 and the body had no `error` field.
    pub success: bool,
}

impl Reply {
    /// Convert into the body on success, or an `ApiError` describing the
    /// refusal.
    pub fn into_result(self) -> Result<Value, ApiError> {
        if self.success {
            return Ok(self.body);
        }
        if self.status == 404 {
            return Err(ApiError::NotFound);
        }
        let code = self.body.get("code").and_then(Value::as_i64);
        let message = match self.body.get("error") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => match &self.body {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            },
        };
        Err(ApiError::Api {
            status: self.status,
            code,
            message,
        })
    }

    /// Deserialize a successful body into `T`.
    pub fn json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let body = self.into_result()?;
        serde_json::from_value(body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

/// One entry of a `/batch` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRequest {
    pub method: &'static str,
    /// Relative to the base URL; prefixed with the base URL's path when sent.
    pub path: String,
    #[serde(skip)]
    pub segments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl BatchRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method: method.as_str(),
            path: path.into(),
            segments: Vec::new(),
            body,
        }
    }

    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }
}

/// Client for the Parse REST API.
///
/// Cheap to clone; clones share configuration and transport.
#[derive(Clone)]
pub struct ParseClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ParseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseClient")
            .field("base_url", &self.config.base_url)
            .field("application_id", &self.config.application_id)
            .finish_non_exhaustive()
    }
}

impl ParseClient {
    /// Build a client using the default blocking transport.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Self::with_transport(config, Arc::new(UreqTransport::new()))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self, ApiError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            transport,
        })
    }

    /// Same transport, different session token.
    pub fn with_session_token(&self, token: impl Into<String>) -> Self {
        let config = ClientConfig::clone(&self.config).with_session_token(token);
        Self {
            config: Arc::new(config),
            transport: Arc::clone(&self.transport),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn users(&self) -> Users<'_> {
        Users::new(self)
    }

    pub fn objects(&self, class_name: impl Into<String>) -> Objects<'_> {
        Objects::new(self, class_name.into())
    }

    pub fn roles(&self) -> Roles<'_> {
        Roles::new(self)
    }

    pub fn files(&self) -> Files<'_> {
        Files::new(self)
    }

    pub fn analytics(&self) -> Analytics<'_> {
        Analytics::new(self)
    }

    pub fn push(&self) -> Push<'_> {
        Push::new(self)
    }

    /// Build, send and normalize one call.
    pub fn dispatch(&self, call: ApiCall) -> Result<Reply, ApiError> {
        let request = self.build_request(&call)?;
        debug!(method = %request.method, url = %request.url_without_query(), "dispatching parse request");
        let response = self.transport.execute(request)?;
        let reply = self.parse_response(&call, response)?;
        debug!(status = reply.status, success = reply.success, "parse request completed");
        Ok(reply)
    }

    /// Relay `requests` to `/batch`, rewriting each relative path to the
    /// absolute path the server expects.
    pub fn batch(&self, requests: Vec<BatchRequest>) -> Result<Reply, ApiError> {
        self.dispatch(self.build_batch(requests)?)
    }

    pub fn build_batch(&self, requests: Vec<BatchRequest>) -> Result<ApiCall, ApiError> {
        let requests = requests
            .into_iter()
            .map(|mut r| {
                r.path = self.endpoint(&r.path, &r.segments)?.path().to_string();
                r.segments.clear();
                Ok(r)
            })
            .collect::<Result<Vec<BatchRequest>, ApiError>>()?;
        let requests =
            serde_json::to_value(requests).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut params = Params::new();
        params.insert("requests".to_string(), requests);
        Ok(ApiCall::post("/batch").params(params))
    }

    /// Base URL extended with the fixed `route` and then `segments`.
    ///
    /// Segments are pushed one at a time, so `/ ? # %` inside them are
    /// percent-encoded and can never change the route. Dot segments are
    /// refused outright.
    fn endpoint(&self, route: &str, segments: &[String]) -> Result<url::Url, ApiError> {
        let base = self.config.trimmed_base_url();
        let mut url = url::Url::parse(base).map_err(|e| ApiError::Config(format!("{base:?}: {e}")))?;
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::Config(format!("{base:?} cannot carry a path")))?;
            path.pop_if_empty();
            path.extend(route.split('/').filter(|s| !s.is_empty()));
            for segment in segments {
                if is_dot_segment(segment) {
                    return Err(ApiError::InvalidPath(segment.clone()));
                }
                path.push(segment);
            }
        }
        Ok(url)
    }

    pub fn build_request(&self, call: &ApiCall) -> Result<HttpRequest, ApiError> {
        let mut headers = self.auth_headers();
        let mut query: Vec<(String, String)> = Vec::new();
        let mut body = None;

        match &call.params {
            Some(params) if call.method.carries_json_body() => {
                let json =
                    serde_json::to_vec(params).map_err(|e| ApiError::Serialization(e.to_string()))?;
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                body = Some(json);
            }
            Some(params) if !params.is_empty() => {
                query = stringify_param_values(params);
            }
            Some(_) => {}
            None => body = call.body.clone(),
        }

        for (name, value) in &call.headers {
            headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }

        let mut url = self.endpoint(&call.path, &call.segments)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }

        Ok(HttpRequest {
            method: call.method,
            url: url.into(),
            headers,
            body,
        })
    }

    pub fn parse_response(&self, call: &ApiCall, response: HttpResponse) -> Result<Reply, ApiError> {
        let mut success = response.status == 200 || response.status == 201;

        let body = if response.is_json() {
            let body: Value = serde_json::from_str(&response.body)
                .map_err(|e| ApiError::Deserialization(e.to_string()))?;
            if body.get("error").map(is_truthy).unwrap_or(false) {
                success = false;
                body
            } else {
                match body {
                    Value::Object(mut map)
                        if matches!(map.get("results"), Some(Value::Array(_)))
                            && !call.is_count_request() =>
                    {
                        map.remove("results").unwrap_or(Value::Null)
                    }
                    other => other,
                }
            }
        } else if response.body.is_empty() {
            Value::Null
        } else {
            Value::String(response.body)
        };

        Ok(Reply {
            status: response.status,
            headers: response.headers,
            body,
            success,
        })
    }

    fn auth_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![(APPLICATION_ID_HEADER.to_string(), self.config.application_id.clone())];
        let optional = [
            (SESSION_TOKEN_HEADER, &self.config.session_token),
            (MASTER_KEY_HEADER, &self.config.master_key),
            (REST_API_KEY_HEADER, &self.config.rest_api_key),
        ];
        for (name, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                headers.push((name.to_string(), value.to_string()));
            }
        }
        headers
    }
}

/// Render params as query pairs. Objects and arrays become JSON text so they
/// survive query-string encoding.
fn stringify_param_values(params: &Params) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}

/// Empty, `.` or `..` once the URL parser has dropped tabs and newlines and
/// trimmed control characters and spaces.
fn is_dot_segment(segment: &str) -> bool {
    let visible: String = segment
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect();
    matches!(visible.trim_matches(|c: char| c <= ' '), "" | "." | "..")
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Shallow merge: `submitted` fields first, then `returned` fields on top.
/// Non-object bodies are returned unchanged.
pub(crate) fn merge_submitted(submitted: &Params, returned: Value) -> Value {
    match returned {
        Value::Object(returned) => {
            let mut merged = submitted.clone();
            merged.extend(returned);
            Value::Object(merged)
        }
        other => other,
    }
}
