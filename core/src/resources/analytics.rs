use crate::client::{ApiCall, ParseClient, Reply};
use crate::error::ApiError;
use crate::Params;

/// `/events/{eventName}`.
#[derive(Debug, Clone, Copy)]
pub struct Analytics<'a> {
    client: &'a ParseClient,
}

impl<'a> Analytics<'a> {
    pub(crate) fn new(client: &'a ParseClient) -> Self {
        Self { client }
    }

    /// Record a custom event. Without dimensions an empty object is posted.
    pub fn send_event(&self, event_name: &str, dimensions: Option<Params>) -> Result<Reply, ApiError> {
        self.client.dispatch(
            ApiCall::post("/events").segment(event_name).params(dimensions.unwrap_or_default()),
        )
    }
}
