//! Handlers shipped with the binary.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::info;

use crate::commands::CommandScope;
use crate::github::GitHubClient;
use crate::routing::{DispatchContext, Handler, HandlerError, HandlerResult, Router};
use crate::webhooks::Event;

/// A router answering `@app ping` on issues and pull requests with a `pong`
/// comment.
pub fn ping_router() -> Router<GitHubClient> {
    let mut router = Router::new("builtin");
    router.command(
        "ping",
        CommandScope::ISSUE_OR_PULL_REQUEST,
        Handler::suspendable(reply_pong),
    );
    router
}

async fn reply_pong(event: Arc<Event>, client: GitHubClient, ctx: DispatchContext) -> HandlerResult {
    let route = comments_route(&event)
        .ok_or_else(|| HandlerError::failed("ping: payload has no repository or issue number"))?;
    let body = pong_body(&ctx);

    client.post(&route, &json!({ "body": body })).await?;
    info!(delivery_id = %event.delivery_id(), %route, "Answered ping");
    Ok(())
}

/// The issue comments route for the issue or pull request an event is about.
///
/// Pull request conversation comments live on the issue with the same number.
fn comments_route(event: &Event) -> Option<String> {
    let repo = event.repository()?;
    let number = event
        .get_path(&["issue", "number"])
        .or_else(|| event.get_path(&["pull_request", "number"]))
        .and_then(Value::as_u64)?;
    Some(format!(
        "/repos/{}/{}/issues/{}/comments",
        repo.owner, repo.repo, number
    ))
}

fn pong_body(ctx: &DispatchContext) -> String {
    match ctx.command.as_ref().map(|command| command.args.as_str()) {
        Some(args) if !args.is_empty() => format!("pong: {args}"),
        _ => "pong".to_string(),
    }
}
