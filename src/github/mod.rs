//! GitHub API access for handlers.

mod api;
mod client;
mod error;

pub use api::GitHubApi;
pub use client::GitHubClient;
pub use error::{ClientError, ClientErrorKind};
