use std::path::Path;

use crate::client::{ApiCall, ParseClient, Reply};
use crate::error::ApiError;

/// `/files/{name}`.
#[derive(Debug, Clone, Copy)]
pub struct Files<'a> {
    client: &'a ParseClient,
}

impl<'a> Files<'a> {
    pub(crate) fn new(client: &'a ParseClient) -> Self {
        Self { client }
    }

    /// Upload a file from disk. The content type is guessed from the
    /// extension; `name` defaults to the path's file name.
    pub fn upload(&self, path: impl AsRef<Path>, name: Option<&str>) -> Result<Reply, ApiError> {
        let path = path.as_ref();
        let content_type = mime_guess::from_path(path).first_or_octet_stream();
        let name = match name {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| ApiError::Config(format!("{} has no file name", path.display())))?,
        };
        let bytes = std::fs::read(path)?;
        self.upload_bytes(bytes, content_type.essence_str(), &name)
    }

    pub fn upload_bytes(&self, bytes: Vec<u8>, content_type: &str, name: &str) -> Result<Reply, ApiError> {
        self.client.dispatch(
            ApiCall::post("/files").segment(name)
                .body(bytes)
                .header("Content-Type", content_type),
        )
    }

    /// Deleting files requires the master key.
    pub fn delete(&self, name: &str) -> Result<Reply, ApiError> {
        self.client.dispatch(ApiCall::delete("/files").segment(name))
    }
}
