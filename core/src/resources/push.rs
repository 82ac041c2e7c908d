use super::merge_on_success;
use crate::client::{ApiCall, ParseClient, Reply};
use crate::error::ApiError;
use crate::Params;

/// `/push`. Delivery happens server-side.
#[derive(Debug, Clone, Copy)]
pub struct Push<'a> {
    client: &'a ParseClient,
}

impl<'a> Push<'a> {
    pub(crate) fn new(client: &'a ParseClient) -> Self {
        Self { client }
    }

    pub fn send_notification(&self, data: Params) -> Result<Reply, ApiError> {
        let result = self.client.dispatch(ApiCall::post("/push").params(data.clone()));
        merge_on_success(&data, result)
    }
}
