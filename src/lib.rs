//! GitHub App Router - webhook routing and @mention commands for GitHub Apps.
//!
//! This library provides the event envelope, the router registry that
//! dispatches events to handlers, mention command extraction, lazy handler
//! loading, collaborator permission lookups and the HTTP surface that ties
//! them together.

pub mod builtin;
pub mod commands;
pub mod config;
pub mod github;
pub mod permissions;
pub mod routing;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;
