//! Types for `@app` command mentions and their scopes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::webhooks::Event;

/// One `@app <command> [args]` occurrence extracted from a comment body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMention {
    /// The command token, lower-cased.
    pub command: String,

    /// Text following the command on the same line, trimmed. Original case.
    pub args: String,

    /// Byte offset of the `@` in the comment body.
    pub position: usize,

    /// 1-based line number of the mention.
    pub line: usize,
}

/// Where a comment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentContext {
    /// A comment on a plain issue.
    Issue,
    /// A comment or review on a pull request.
    PullRequest,
    /// A comment on a commit.
    Commit,
}

impl CommentContext {
    /// Determines the comment context of an event.
    ///
    /// GitHub delivers pull request conversation comments as `issue_comment`
    /// events; they are told apart by a non-null `issue.pull_request` field.
    /// Returns `None` for events that are not comment-style events.
    pub fn from_event(event: &Event) -> Option<Self> {
        match event.event_type() {
            "issue_comment" => {
                let on_pull_request = event
                    .get_path(&["issue", "pull_request"])
                    .is_some_and(|pr| !pr.is_null());
                Some(if on_pull_request {
                    CommentContext::PullRequest
                } else {
                    CommentContext::Issue
                })
            }
            "pull_request_review_comment" | "pull_request_review" => {
                Some(CommentContext::PullRequest)
            }
            "commit_comment" => Some(CommentContext::Commit),
            _ => None,
        }
    }

    /// Like [`CommentContext::from_event`], but only for deliveries announcing
    /// a new comment (`created`) or a newly submitted review (`submitted`).
    ///
    /// Edits and deletions never trigger commands.
    pub fn from_new_comment(event: &Event) -> Option<Self> {
        let expected_action = match event.event_type() {
            "pull_request_review" => "submitted",
            _ => "created",
        };
        if event.action() != Some(expected_action) {
            return None;
        }
        CommentContext::from_event(event)
    }
}

impl fmt::Display for CommentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentContext::Issue => write!(f, "issue"),
            CommentContext::PullRequest => write!(f, "pull_request"),
            CommentContext::Commit => write!(f, "commit"),
        }
    }
}

/// The comment contexts a command handler applies to.
///
/// Flags combine with OR: a handler runs if any flag matching the comment's
/// context is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandScope {
    pub issue: bool,
    pub pull_request: bool,
    pub commit: bool,
}

impl CommandScope {
    pub const ISSUE: CommandScope = CommandScope {
        issue: true,
        pull_request: false,
        commit: false,
    };

    pub const PULL_REQUEST: CommandScope = CommandScope {
        issue: false,
        pull_request: true,
        commit: false,
    };

    pub const COMMIT: CommandScope = CommandScope {
        issue: false,
        pull_request: false,
        commit: true,
    };

    pub const ISSUE_OR_PULL_REQUEST: CommandScope = CommandScope {
        issue: true,
        pull_request: true,
        commit: false,
    };

    pub const ANY: CommandScope = CommandScope {
        issue: true,
        pull_request: true,
        commit: true,
    };

    /// Returns true if a handler with this scope should see a comment made in `context`.
    pub fn applies_to(&self, context: CommentContext) -> bool {
        match context {
            CommentContext::Issue => self.issue,
            CommentContext::PullRequest => self.pull_request,
            CommentContext::Commit => self.commit,
        }
    }
}

impl Default for CommandScope {
    fn default() -> Self {
        CommandScope::ANY
    }
}
