//! Handlers and the context they are invoked with.
//!
//! A [`Handler`] is tagged with its calling convention when it is built:
//! blocking handlers are plain functions, suspendable handlers return a future.
//! Nothing is inferred from the callable at dispatch time.

use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::commands::CommentContext;
use crate::github::ClientError;
use crate::webhooks::Event;

/// How a handler is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallingConvention {
    /// Called directly; runs to completion on the caller's thread.
    Blocking,
    /// Returns a future that the dispatcher awaits.
    Suspendable,
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallingConvention::Blocking => write!(f, "blocking"),
            CallingConvention::Suspendable => write!(f, "suspendable"),
        }
    }
}

/// Errors a handler can report.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A GitHub API call made by the handler failed.
    #[error("GitHub API call failed: {0}")]
    Api(#[from] ClientError),

    /// The handler gave up with a message.
    #[error("{0}")]
    Failed(String),

    /// Any other error.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

/// What a handler returns.
pub type HandlerResult = Result<(), HandlerError>;

/// The command that caused a command handler to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Lower-cased command name.
    pub name: String,
    /// Trimmed argument text, original case.
    pub args: String,
    /// Where the comment was made.
    pub context: CommentContext,
}

/// Per-invocation context handed to every handler.
///
/// `extra` carries free-form values supplied by whoever called dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchContext {
    pub command: Option<CommandInvocation>,
    pub extra: Map<String, Value>,
}

type BlockingFn<C> = dyn Fn(&Event, &C, &DispatchContext) -> HandlerResult + Send + Sync;

type SuspendableFn<C> =
    dyn Fn(Arc<Event>, C, DispatchContext) -> BoxFuture<'static, HandlerResult> + Send + Sync;

pub(crate) enum HandlerKind<C> {
    Blocking(Arc<BlockingFn<C>>),
    Suspendable(Arc<SuspendableFn<C>>),
}

/// A registered callback, tagged with its calling convention.
///
/// `C` is the API client handle passed through to the handler untouched.
pub struct Handler<C> {
    name: &'static str,
    pub(crate) kind: HandlerKind<C>,
}

impl<C: 'static> Handler<C> {
    /// Wraps a blocking function.
    ///
    /// ```
    /// use github_app_router::routing::{DispatchContext, Handler, HandlerResult};
    /// use github_app_router::webhooks::Event;
    ///
    /// fn log_push(event: &Event, _client: &(), _ctx: &DispatchContext) -> HandlerResult {
    ///     println!("push {}", event.delivery_id());
    ///     Ok(())
    /// }
    ///
    /// let handler = Handler::blocking(log_push);
    /// assert!(handler.name().ends_with("log_push"));
    /// ```
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(&Event, &C, &DispatchContext) -> HandlerResult + Send + Sync + 'static,
    {
        Handler {
            name: type_name::<F>(),
            kind: HandlerKind::Blocking(Arc::new(f)),
        }
    }

    /// Wraps a function returning a future.
    ///
    /// The handler receives owned copies of the event, client and context so
    /// its future can outlive the dispatcher's borrows.
    pub fn suspendable<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<Event>, C, DispatchContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let call = move |event: Arc<Event>, client: C, ctx: DispatchContext| {
            f(event, client, ctx).boxed()
        };
        Handler {
            name: type_name::<F>(),
            kind: HandlerKind::Suspendable(Arc::new(call)),
        }
    }
}

impl<C> Handler<C> {
    /// The type name of the wrapped callable, for logs and errors.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn convention(&self) -> CallingConvention {
        match self.kind {
            HandlerKind::Blocking(_) => CallingConvention::Blocking,
            HandlerKind::Suspendable(_) => CallingConvention::Suspendable,
        }
    }
}

impl<C> Clone for Handler<C> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            HandlerKind::Blocking(f) => HandlerKind::Blocking(Arc::clone(f)),
            HandlerKind::Suspendable(f) => HandlerKind::Suspendable(Arc::clone(f)),
        };
        Handler {
            name: self.name,
            kind,
        }
    }
}

impl<C> fmt::Debug for Handler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("convention", &self.convention())
            .finish()
    }
}
