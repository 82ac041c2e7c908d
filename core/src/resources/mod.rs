//! Per-resource convenience methods.
//!
//! Each resource borrows a `ParseClient`, builds a path and delegates to
//! `ParseClient::dispatch`. None of them hold state of their own.

mod analytics;
mod files;
mod objects;
mod push;
mod roles;
mod users;

pub use analytics::Analytics;
pub use files::Files;
pub use objects::{ObjectUpdate, Objects};
pub use push::Push;
pub use roles::Roles;
pub use users::Users;

use crate::client::{merge_submitted, Reply};
use crate::error::ApiError;
use crate::Params;

/// Merge the submitted fields into a successful create-style reply.
fn merge_on_success(submitted: &Params, result: Result<Reply, ApiError>) -> Result<Reply, ApiError> {
    let mut reply = result?;
    if reply.success {
        reply.body = merge_submitted(submitted, std::mem::take(&mut reply.body));
    }
    Ok(reply)
}
