//! Shared test utilities and arbitrary generators for property-based testing.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use serde_json::{Value, json};

use crate::github::{ClientError, GitHubApi};
use crate::webhooks::Event;

/// Builds an event from a JSON object literal.
pub fn event(event_type: &str, payload: Value) -> Event {
    let payload = payload.as_object().cloned().unwrap_or_default();
    Event::new(event_type, payload, "delivery-1")
}

/// A newly created comment on issue #1.
pub fn issue_comment(body: &str) -> Event {
    event(
        "issue_comment",
        json!({
            "action": "created",
            "comment": {"body": body},
            "issue": {"number": 1},
            "repository": {"name": "repo", "owner": {"login": "owner"}, "full_name": "owner/repo"}
        }),
    )
}

/// A newly created conversation comment on pull request #2.
pub fn pull_request_comment(body: &str) -> Event {
    event(
        "issue_comment",
        json!({
            "action": "created",
            "comment": {"body": body},
            "issue": {"number": 2, "pull_request": {"url": "https://api.github.com/repos/owner/repo/pulls/2"}},
            "repository": {"name": "repo", "owner": {"login": "owner"}, "full_name": "owner/repo"}
        }),
    )
}

/// A client stand-in that records what handlers did with it.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

/// Canned GitHub API answers by route. Routes without an answer get a 404.
#[derive(Debug, Clone, Default)]
pub struct StubApi {
    responses: HashMap<String, Result<Value, u16>>,
    requests: Recorder,
}

impl StubApi {
    pub fn new() -> Self {
        StubApi::default()
    }

    pub fn respond(mut self, route: &str, body: Value) -> Self {
        self.responses.insert(route.to_string(), Ok(body));
        self
    }

    pub fn fail(mut self, route: &str, status: u16) -> Self {
        self.responses.insert(route.to_string(), Err(status));
        self
    }

    /// Routes requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.calls()
    }
}

impl GitHubApi for StubApi {
    fn get(&self, route: &str) -> impl Future<Output = Result<Value, ClientError>> + Send {
        self.requests.record(route);
        let answer = match self.responses.get(route) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(ClientError::from_status(*status, "stubbed failure")),
            None => Err(ClientError::from_status(404, "Not Found")),
        };
        async move { answer }
    }
}

pub fn arb_app_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,20}".prop_map(String::from)
}

pub fn arb_command_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}".prop_map(String::from)
}

/// Argument text that cannot contain a newline or another mention.
pub fn arb_args() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,:#/]{0,40}".prop_map(String::from)
}
