//! Event routing.
//!
//! Handlers are grouped into [`Router`]s, routers are registered with a
//! [`Registry`], and the registry dispatches each [`Event`](crate::webhooks::Event)
//! to every matching event route and mention command. A [`HandlerLoader`]
//! defers handler registration until the first dispatch that needs it.

mod handler;
mod loader;
mod registry;
mod router;

pub use handler::{
    CallingConvention, CommandInvocation, DispatchContext, Handler, HandlerError, HandlerResult,
};
pub use loader::HandlerLoader;
pub use registry::{DispatchError, Invocation, Registry};
pub use router::{EventFilter, Router};
