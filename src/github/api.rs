//! Read access to the GitHub REST API, abstracted so lookups built on it can
//! run against canned responses in tests.

use std::future::Future;

use serde_json::Value;

use super::client::GitHubClient;
use super::error::ClientError;

/// Fetches JSON documents from relative API routes.
pub trait GitHubApi {
    /// GETs `route` and returns the decoded body. Non-2xx answers are errors
    /// carrying the status code.
    fn get(&self, route: &str) -> impl Future<Output = Result<Value, ClientError>> + Send;
}

impl GitHubApi for GitHubClient {
    fn get(&self, route: &str) -> impl Future<Output = Result<Value, ClientError>> + Send {
        GitHubClient::get(self, route)
    }
}
