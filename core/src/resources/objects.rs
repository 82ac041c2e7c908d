use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::merge_on_success;
use crate::client::{merge_submitted, ApiCall, BatchRequest, ParseClient, Reply};
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::Params;

/// One entry for `Objects::update_many`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectUpdate {
    #[serde(rename = "objectId")]
    pub object_id: String,
    pub data: Params,
}

/// `/classes/{className}`.
#[derive(Debug, Clone)]
pub struct Objects<'a> {
    client: &'a ParseClient,
    class_name: String,
}

impl<'a> Objects<'a> {
    pub(crate) fn new(client: &'a ParseClient, class_name: String) -> Self {
        Self { client, class_name }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    fn collection(&self, method: HttpMethod) -> ApiCall {
        ApiCall::new(method, "/classes").segment(&self.class_name)
    }

    fn object(&self, method: HttpMethod, object_id: &str) -> ApiCall {
        self.collection(method).segment(object_id)
    }

    fn batch_entry(&self, method: HttpMethod, object_id: Option<&str>, body: Option<Value>) -> BatchRequest {
        let entry = BatchRequest::new(method, "/classes", body).segment(&self.class_name);
        match object_id {
            Some(id) => entry.segment(id),
            None => entry,
        }
    }

    pub fn create(&self, data: Params) -> Result<Reply, ApiError> {
        let result = self
            .client
            .dispatch(self.collection(HttpMethod::Post).params(data.clone()));
        merge_on_success(&data, result)
    }

    pub fn get(&self, object_id: &str, params: Option<Params>) -> Result<Reply, ApiError> {
        self.client
            .dispatch(self.object(HttpMethod::Get, object_id).maybe_params(params))
    }

    pub fn update(&self, object_id: &str, data: Params) -> Result<Reply, ApiError> {
        self.client
            .dispatch(self.object(HttpMethod::Put, object_id).params(data))
    }

    pub fn delete(&self, object_id: &str) -> Result<Reply, ApiError> {
        self.client.dispatch(self.object(HttpMethod::Delete, object_id))
    }

    pub fn get_all(&self, params: Option<Params>) -> Result<Reply, ApiError> {
        self.client
            .dispatch(self.collection(HttpMethod::Get).maybe_params(params))
    }

    /// Count matching objects. `count=1` and `limit=0` are forced; the reply
    /// body keeps its `count` and `results` fields.
    pub fn count(&self, params: Option<Params>) -> Result<Reply, ApiError> {
        let mut params = params.unwrap_or_default();
        params.insert("count".to_string(), Value::from(1));
        params.insert("limit".to_string(), Value::from(0));
        self.client
            .dispatch(self.collection(HttpMethod::Get).params(params))
    }

    /// Atomically add `amount` (may be negative) to a numeric field.
    pub fn update_counter(&self, object_id: &str, field: &str, amount: i64) -> Result<Reply, ApiError> {
        let mut params = Params::new();
        params.insert(field.to_string(), json!({"__op": "Increment", "amount": amount}));
        self.client
            .dispatch(self.object(HttpMethod::Put, object_id).params(params))
    }

    /// Create several objects in one `/batch` call. On success, each
    /// `success` entry of the reply is merged over the object submitted at
    /// the same index.
    pub fn create_many(&self, objects: Vec<Params>) -> Result<Reply, ApiError> {
        let requests = objects
            .iter()
            .map(|o| self.batch_entry(HttpMethod::Post, None, Some(Value::Object(o.clone()))))
            .collect();
        let mut reply = self.client.batch(requests)?;
        if reply.success {
            if let Value::Array(entries) = &mut reply.body {
                for (entry, submitted) in entries.iter_mut().zip(&objects) {
                    if let Some(created) = entry.get_mut("success") {
                        *created = merge_submitted(submitted, std::mem::take(created));
                    }
                }
            }
        }
        Ok(reply)
    }

    pub fn update_many(&self, updates: Vec<ObjectUpdate>) -> Result<Reply, ApiError> {
        let requests = updates
            .into_iter()
            .map(|u| self.batch_entry(HttpMethod::Put, Some(u.object_id.as_str()), Some(Value::Object(u.data))))
            .collect();
        self.client.batch(requests)
    }

    pub fn delete_many<I, S>(&self, object_ids: I) -> Result<Reply, ApiError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requests = object_ids
            .into_iter()
            .map(|id| self.batch_entry(HttpMethod::Delete, Some(id.as_ref()), None))
            .collect();
        self.client.batch(requests)
    }
}
