//! `@app` command mentions in comments.
//!
//! Users address a GitHub App by mentioning it in an issue, pull request or
//! commit comment, followed by a command and optional arguments:
//!
//! ```text
//! @my-app deploy staging
//! ```
//!
//! This module extracts those mentions and describes where a comment was made
//! ([`CommentContext`]) and where a command handler applies ([`CommandScope`]).
//!
//! # Example
//!
//! ```
//! use github_app_router::commands::extract_commands;
//!
//! let comment = "Looks good.\n\n@my-app deploy staging";
//! let found = extract_commands(comment, "my-app");
//! assert_eq!(found[0].command, "deploy");
//! assert_eq!(found[0].args, "staging");
//! ```

mod parser;
mod types;

pub use parser::{commands_in_event, comment_body, extract_commands};
pub use types::{CommandMention, CommandScope, CommentContext};
