use super::merge_on_success;
use crate::client::{ApiCall, ParseClient, Reply};
use crate::error::ApiError;
use crate::Params;

/// `/roles`.
#[derive(Debug, Clone, Copy)]
pub struct Roles<'a> {
    client: &'a ParseClient,
}

impl<'a> Roles<'a> {
    pub(crate) fn new(client: &'a ParseClient) -> Self {
        Self { client }
    }

    pub fn create(&self, data: Params) -> Result<Reply, ApiError> {
        let result = self.client.dispatch(ApiCall::post("/roles").params(data.clone()));
        merge_on_success(&data, result)
    }

    pub fn get(&self, object_id: &str, params: Option<Params>) -> Result<Reply, ApiError> {
        self.client
            .dispatch(ApiCall::get("/roles").segment(object_id).maybe_params(params))
    }

    pub fn update(&self, object_id: &str, data: Params) -> Result<Reply, ApiError> {
        self.client
            .dispatch(ApiCall::put("/roles").segment(object_id).params(data))
    }

    pub fn delete(&self, object_id: &str) -> Result<Reply, ApiError> {
        self.client.dispatch(ApiCall::delete("/roles").segment(object_id))
    }

    pub fn get_all(&self, params: Option<Params>) -> Result<Reply, ApiError> {
        self.client.dispatch(ApiCall::get("/roles").maybe_params(params))
    }
}
