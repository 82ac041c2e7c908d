//! Blocking client for the Parse REST API.
//!
//! # Overview
//! Maps method calls onto HTTP requests: arguments become a path, a query
//! string or a JSON body, the Parse authentication headers are attached, and
//! the response is normalized into a `Reply`.
//!
//! # Design
//! - `ParseClient` holds only immutable configuration and a shared
//!   `Transport`; every call is independent.
//! - Each call is split into `build_request` (pure), `Transport::execute`
//!   (I/O) and `parse_response` (pure), so the I/O boundary is explicit and
//!   the request/response logic is testable without a network.
//! - Entities are opaque JSON objects; nothing is validated or cached.
//!
//! ```no_run
//! use parse_rest::{ClientConfig, ParseClient};
//!
//! # fn main() -> Result<(), parse_rest::ApiError> {
//! let client = ParseClient::new(ClientConfig::from_env()?)?;
//! let scores = client.objects("GameScore").get_all(None)?.into_result()?;
//! println!("{scores}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod resources;
pub mod transport;

pub use client::{ApiCall, BatchRequest, Params, ParseClient, Reply};
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use resources::{Analytics, Files, ObjectUpdate, Objects, Push, Roles, Users};
pub use transport::{Transport, UreqTransport};
