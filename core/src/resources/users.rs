use serde_json::{json, Value};

use super::merge_on_success;
use crate::client::{ApiCall, ParseClient, Reply};
use crate::error::ApiError;
use crate::Params;

/// `/users` and the login / password-reset endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Users<'a> {
    client: &'a ParseClient,
}

impl<'a> Users<'a> {
    pub(crate) fn new(client: &'a ParseClient) -> Self {
        Self { client }
    }

    /// On success the submitted fields are merged under the server's reply,
    /// since sign-up only echoes `objectId`, `createdAt` and `sessionToken`.
    pub fn sign_up(&self, user: Params) -> Result<Reply, ApiError> {
        let result = self.client.dispatch(ApiCall::post("/users").params(user.clone()));
        merge_on_success(&user, result)
    }

    pub fn log_in(&self, username: &str, password: &str) -> Result<Reply, ApiError> {
        let mut params = Params::new();
        params.insert("username".to_string(), Value::from(username));
        params.insert("password".to_string(), Value::from(password));
        self.client.dispatch(ApiCall::get("/login").params(params))
    }

    pub fn get(&self, object_id: &str, params: Option<Params>) -> Result<Reply, ApiError> {
        self.client
            .dispatch(ApiCall::get("/users").segment(object_id).maybe_params(params))
    }

    /// Fetch the user owning the configured session token. Also serves to
    /// validate that token.
    pub fn get_current(&self) -> Result<Reply, ApiError> {
        self.client.dispatch(ApiCall::get("/users/me"))
    }

    pub fn update(&self, object_id: &str, data: Params) -> Result<Reply, ApiError> {
        self.client
            .dispatch(ApiCall::put("/users").segment(object_id).params(data))
    }

    pub fn delete(&self, object_id: &str) -> Result<Reply, ApiError> {
        self.client.dispatch(ApiCall::delete("/users").segment(object_id))
    }

    pub fn get_all(&self, params: Option<Params>) -> Result<Reply, ApiError> {
        self.client.dispatch(ApiCall::get("/users").maybe_params(params))
    }

    pub fn request_password_reset(&self, email: &str) -> Result<Reply, ApiError> {
        let mut params = Params::new();
        params.insert("email".to_string(), Value::from(email));
        self.client
            .dispatch(ApiCall::post("/requestPasswordReset").params(params))
    }

    /// Sign up or log in with third-party `authData`, e.g.
    /// `{"facebook": {"id": .., "access_token": .., "expiration_date": ..}}`.
    pub fn log_in_social(&self, auth_data: Value) -> Result<Reply, ApiError> {
        self.client
            .dispatch(ApiCall::post("/users").params(auth_data_params(auth_data)))
    }

    pub fn link_with_social(&self, object_id: &str, auth_data: Value) -> Result<Reply, ApiError> {
        self.client.dispatch(
            ApiCall::put("/users").segment(object_id).params(auth_data_params(auth_data)),
        )
    }

    /// Unlink by nulling the provider's entry in `authData`.
    pub fn unlink_with_social(&self, object_id: &str, provider: &str) -> Result<Reply, ApiError> {
        self.client.dispatch(
            ApiCall::put("/users").segment(object_id)
                .params(auth_data_params(json!({ provider: null }))),
        )
    }
}

fn auth_data_params(auth_data: Value) -> Params {
    let mut params = Params::new();
    params.insert("authData".to_string(), auth_data);
    params
}
