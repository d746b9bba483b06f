//! The registry: every registered router, and dispatch across them.
//!
//! Dispatch of one event runs in two phases. First a plan is built: the
//! handlers of every matching event route (routers in registration order,
//! routes in insertion order), followed by the command handlers for each
//! mention in the comment body (mentions in body order). Then the plan is
//! executed sequentially. The first handler to fail aborts the rest.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::handler::{
    CommandInvocation, DispatchContext, Handler, HandlerError, HandlerKind, HandlerResult,
};
use super::router::Router;
use crate::commands::{CommentContext, commands_in_event};
use crate::types::DeliveryId;
use crate::webhooks::Event;

/// Errors that can occur while dispatching an event.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A handler returned an error; later handlers did not run.
    #[error("handler {handler} failed on {event_type} delivery {delivery_id}: {source}")]
    Handler {
        handler: &'static str,
        event_type: String,
        delivery_id: DeliveryId,
        #[source]
        source: HandlerError,
    },

    /// A blocking dispatch found a suspendable handler in its plan.
    /// Nothing was invoked.
    #[error("handler {handler} is suspendable and cannot run under blocking dispatch")]
    ConventionMismatch { handler: &'static str },
}

/// One planned handler call.
#[derive(Debug)]
pub struct Invocation<C> {
    pub handler: Handler<C>,
    /// Set for command handlers.
    pub command: Option<CommandInvocation>,
}

/// The set of registered routers.
///
/// Registration is append-only and safe from any thread. Dispatch works on a
/// snapshot of the routers taken when it starts, so a router registered
/// mid-dispatch only sees later events.
pub struct Registry<C> {
    app_name: String,
    routers: RwLock<Vec<Arc<Router<C>>>>,
}

impl<C> Registry<C> {
    /// Creates an empty registry for the app whose mentions (`@app_name`)
    /// trigger commands.
    pub fn new(app_name: impl Into<String>) -> Self {
        Registry {
            app_name: app_name.into(),
            routers: RwLock::new(Vec::new()),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Adds a router. Its routes take part in every dispatch that starts
    /// afterwards.
    pub fn register(&self, router: Router<C>) {
        info!(router = %router.name(), routes = router.len(), "Registering router");
        self.routers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(router));
    }

    /// A snapshot of the registered routers, in registration order.
    pub fn routers(&self) -> Vec<Arc<Router<C>>> {
        self.routers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Total number of routes across all routers.
    pub fn handler_count(&self) -> usize {
        self.routers().iter().map(|router| router.len()).sum()
    }

    /// Builds the ordered list of handler calls for `event` without
    /// invoking anything.
    pub fn plan(&self, event: &Event) -> Vec<Invocation<C>> {
        let routers = self.routers();
        let mut plan = Vec::new();

        for router in &routers {
            plan.extend(router.fetch(event).into_iter().map(|handler| Invocation {
                handler: handler.clone(),
                command: None,
            }));
        }

        if let Some(context) = CommentContext::from_new_comment(event) {
            for mention in commands_in_event(event, &self.app_name) {
                let invocation = CommandInvocation {
                    name: mention.command,
                    args: mention.args,
                    context,
                };
                let before = plan.len();
                for router in &routers {
                    plan.extend(
                        router
                            .fetch_command(&invocation.name, context)
                            .into_iter()
                            .map(|handler| Invocation {
                                handler: handler.clone(),
                                command: Some(invocation.clone()),
                            }),
                    );
                }
                if plan.len() == before {
                    debug!(
                        command = %invocation.name,
                        %context,
                        "No handler for command; ignoring"
                    );
                }
            }
        }

        plan
    }

    /// Dispatches `event` to blocking handlers on the current thread.
    ///
    /// If the plan contains a suspendable handler, returns
    /// [`DispatchError::ConventionMismatch`] without invoking anything.
    pub fn dispatch(
        &self,
        event: &Event,
        client: &C,
        extra: Map<String, Value>,
    ) -> Result<(), DispatchError> {
        let plan = self
            .plan(event)
            .into_iter()
            .map(|invocation| {
                let name = invocation.handler.name();
                match invocation.handler.kind {
                    HandlerKind::Blocking(call) => Ok((name, call, invocation.command)),
                    HandlerKind::Suspendable(_) => {
                        Err(DispatchError::ConventionMismatch { handler: name })
                    }
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let total = plan.len();
        for (name, call, command) in plan {
            let ctx = DispatchContext {
                command,
                extra: extra.clone(),
            };
            debug!(handler = name, delivery_id = %event.delivery_id(), "Invoking handler");
            check(event, name, call(event, client, &ctx))?;
        }

        info!(
            delivery_id = %event.delivery_id(),
            event_type = %event.event_type(),
            handlers = total,
            "Dispatched event"
        );
        Ok(())
    }
}

impl<C> Registry<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Dispatches `event`, awaiting suspendable handlers and calling blocking
    /// ones inline.
    pub async fn dispatch_async(
        &self,
        event: Arc<Event>,
        client: C,
        extra: Map<String, Value>,
    ) -> Result<(), DispatchError> {
        let plan = self.plan(&event);
        let total = plan.len();

        for invocation in plan {
            let name = invocation.handler.name();
            let ctx = DispatchContext {
                command: invocation.command,
                extra: extra.clone(),
            };
            debug!(handler = name, delivery_id = %event.delivery_id(), "Invoking handler");
            let result = match invocation.handler.kind {
                HandlerKind::Blocking(call) => call(event.as_ref(), &client, &ctx),
                HandlerKind::Suspendable(call) => {
                    call(Arc::clone(&event), client.clone(), ctx).await
                }
            };
            check(&event, name, result)?;
        }

        info!(
            delivery_id = %event.delivery_id(),
            event_type = %event.event_type(),
            handlers = total,
            "Dispatched event"
        );
        Ok(())
    }
}

fn check(event: &Event, handler: &'static str, result: HandlerResult) -> Result<(), DispatchError> {
    result.map_err(|source| {
        warn!(
            handler,
            delivery_id = %event.delivery_id(),
            error = %source,
            "Handler failed; aborting dispatch"
        );
        DispatchError::Handler {
            handler,
            event_type: event.event_type().to_string(),
            delivery_id: event.delivery_id().clone(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandScope;
    use crate::test_utils::{Recorder, event, issue_comment, pull_request_comment};
    use serde_json::json;

    fn recording(label: &'static str) -> Handler<Recorder> {
        Handler::blocking(move |_, client: &Recorder, ctx| {
            match &ctx.command {
                Some(command) => client.record(format!("{label}:{}", command.args)),
                None => client.record(label),
            }
            Ok(())
        })
    }

    fn recording_async(label: &'static str) -> Handler<Recorder> {
        Handler::suspendable(move |_, client: Recorder, _| async move {
            tokio::task::yield_now().await;
            client.record(label);
            Ok(())
        })
    }

    fn failing(label: &'static str) -> Handler<Recorder> {
        Handler::blocking(move |_, client: &Recorder, _| {
            client.record(label);
            Err(HandlerError::failed("boom"))
        })
    }

    mod planning {
        use super::*;

        #[test]
        fn empty_registry_plans_nothing() {
            let registry = Registry::<Recorder>::new("bot");
            assert!(registry.plan(&issue_comment("@bot test")).is_empty());
            assert_eq!(registry.handler_count(), 0);
        }

        #[test]
        fn event_routes_precede_command_routes() {
            let registry = Registry::new("bot");
            let mut commands = Router::new("commands");
            commands.command("test", CommandScope::ANY, recording("command"));
            let mut events = Router::new("events");
            events.on("issue_comment", recording("event"));
            registry.register(commands);
            registry.register(events);

            let plan = registry.plan(&issue_comment("@bot test"));
            assert_eq!(plan.len(), 2);
            assert!(plan[0].command.is_none());
            assert_eq!(plan[1].command.as_ref().map(|c| c.name.as_str()), Some("test"));
        }

        #[test]
        fn commands_follow_body_order() {
            let registry = Registry::new("bot");
            let mut router = Router::new("commands");
            router
                .command("b", CommandScope::ANY, recording("b"))
                .command("a", CommandScope::ANY, recording("a"));
            registry.register(router);

            let plan = registry.plan(&issue_comment("@bot a first\n@bot b second"));
            let args: Vec<_> = plan
                .iter()
                .filter_map(|i| i.command.as_ref().map(|c| c.args.as_str()))
                .collect();
            assert_eq!(args, vec!["first", "second"]);
        }

        #[test]
        fn edited_comments_do_not_trigger_commands() {
            let registry = Registry::new("bot");
            let mut router = Router::new("commands");
            router.command("test", CommandScope::ANY, recording("command"));
            registry.register(router);

            let edited = event(
                "issue_comment",
                json!({"action": "edited", "comment": {"body": "@bot test"}, "issue": {}}),
            );
            assert!(registry.plan(&edited).is_empty());
        }

        #[test]
        fn unknown_commands_are_ignored() {
            let registry = Registry::new("bot");
            let mut router = Router::new("commands");
            router.command("test", CommandScope::ANY, recording("command"));
            registry.register(router);

            assert!(registry.plan(&issue_comment("@bot deploy now")).is_empty());
        }

        #[test]
        fn handler_count_sums_routers() {
            let registry = Registry::new("bot");
            let mut first = Router::new("first");
            first
                .on("push", recording("push"))
                .command("help", CommandScope::ANY, recording("help"));
            let mut second = Router::new("second");
            second.on("issues", recording("issues"));
            registry.register(first);
            registry.register(second);

            assert_eq!(registry.handler_count(), 3);
            assert_eq!(registry.routers().len(), 2);
        }
    }

    mod blocking {
        use super::*;

        #[test]
        fn issue_command_receives_its_arguments() {
            let registry = Registry::new("bot");
            let mut router = Router::new("commands");
            router.command("test", CommandScope::ISSUE, recording("test"));
            registry.register(router);

            let event = event(
                "issue_comment",
                json!({"action": "created", "comment": {"body": "@bot test arg1 arg2"}, "issue": {}}),
            );
            let client = Recorder::default();
            registry.dispatch(&event, &client, Map::new()).unwrap();

            assert_eq!(client.calls(), vec!["test:arg1 arg2"]);
        }

        #[test]
        fn scope_excludes_other_contexts() {
            let registry = Registry::new("bot");
            let mut router = Router::new("commands");
            router.command("test", CommandScope::ISSUE, recording("test"));
            registry.register(router);

            let client = Recorder::default();
            registry
                .dispatch(&pull_request_comment("@bot test"), &client, Map::new())
                .unwrap();

            assert!(client.calls().is_empty());
        }

        #[test]
        fn handlers_run_in_registration_order() {
            let registry = Registry::new("bot");
            let mut first = Router::new("first");
            first
                .on("push", recording("one"))
                .on("push", recording("two"));
            let mut second = Router::new("second");
            second.on("push", recording("three"));
            registry.register(first);
            registry.register(second);

            let client = Recorder::default();
            registry
                .dispatch(&event("push", json!({})), &client, Map::new())
                .unwrap();

            assert_eq!(client.calls(), vec!["one", "two", "three"]);
        }

        #[test]
        fn first_failure_aborts_remaining_handlers() {
            let registry = Registry::new("bot");
            let mut router = Router::new("events");
            router
                .on("push", recording("before"))
                .on("push", failing("fails"))
                .on("push", recording("after"));
            registry.register(router);

            let client = Recorder::default();
            let err = registry
                .dispatch(&event("push", json!({})), &client, Map::new())
                .unwrap_err();

            assert!(matches!(err, DispatchError::Handler { .. }));
            assert_eq!(client.calls(), vec!["before", "fails"]);
        }

        #[test]
        fn refuses_suspendable_handlers_before_invoking_any() {
            let registry = Registry::new("bot");
            let mut router = Router::new("events");
            router
                .on("push", recording("blocking"))
                .on("push", recording_async("suspendable"));
            registry.register(router);

            let client = Recorder::default();
            let err = registry
                .dispatch(&event("push", json!({})), &client, Map::new())
                .unwrap_err();

            assert!(matches!(err, DispatchError::ConventionMismatch { .. }));
            assert!(client.calls().is_empty());
        }

        #[test]
        fn extra_context_reaches_handlers() {
            let registry = Registry::new("bot");
            let mut router = Router::new("events");
            router.on(
                "push",
                Handler::blocking(|_, client: &Recorder, ctx| {
                    let source = ctx.extra.get("source").and_then(Value::as_str).unwrap_or("");
                    client.record(source);
                    Ok(())
                }),
            );
            registry.register(router);

            let mut extra = Map::new();
            extra.insert("source".to_string(), json!("replay"));
            let client = Recorder::default();
            registry
                .dispatch(&event("push", json!({})), &client, extra)
                .unwrap();

            assert_eq!(client.calls(), vec!["replay"]);
        }
    }

    mod suspendable {
        use super::*;

        #[tokio::test]
        async fn runs_both_conventions_in_plan_order() {
            let registry = Registry::new("bot");
            let mut router = Router::new("events");
            router
                .on("push", recording_async("first"))
                .on("push", recording("second"))
                .on("push", recording_async("third"));
            registry.register(router);

            let client = Recorder::default();
            registry
                .dispatch_async(Arc::new(event("push", json!({}))), client.clone(), Map::new())
                .await
                .unwrap();

            assert_eq!(client.calls(), vec!["first", "second", "third"]);
        }

        #[tokio::test]
        async fn failure_aborts_remaining_handlers() {
            let registry = Registry::new("bot");
            let mut router = Router::new("commands");
            router
                .command("deploy", CommandScope::ANY, failing("deploy"))
                .command("deploy", CommandScope::ANY, recording_async("never"));
            registry.register(router);

            let client = Recorder::default();
            let err = registry
                .dispatch_async(
                    Arc::new(issue_comment("@bot deploy")),
                    client.clone(),
                    Map::new(),
                )
                .await
                .unwrap_err();

            match err {
                DispatchError::Handler {
                    event_type, source, ..
                } => {
                    assert_eq!(event_type, "issue_comment");
                    assert_eq!(source.to_string(), "boom");
                }
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(client.calls(), vec!["deploy"]);
        }

        #[tokio::test]
        async fn later_registrations_apply_to_later_dispatches() {
            let registry = Registry::new("bot");
            let client = Recorder::default();
            let push = Arc::new(event("push", json!({})));

            registry
                .dispatch_async(Arc::clone(&push), client.clone(), Map::new())
                .await
                .unwrap();
            let mut router = Router::new("late");
            router.on("push", recording_async("late"));
            registry.register(router);
            registry
                .dispatch_async(push, client.clone(), Map::new())
                .await
                .unwrap();

            assert_eq!(client.calls(), vec!["late"]);
        }
    }

    mod properties {
        use super::*;
        use crate::test_utils::{arb_app_name, arb_args, arb_command_name};
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn mentioned_command_reaches_its_handler(
                app in arb_app_name(),
                command in arb_command_name(),
                args in arb_args(),
            ) {
                let registry = Registry::new(app.clone());
                let mut router = Router::new("commands");
                router.command(command.clone(), CommandScope::ANY, recording("cmd"));
                registry.register(router);

                let client = Recorder::default();
                let comment = issue_comment(&format!("@{app} {command} {args}"));
                registry.dispatch(&comment, &client, Map::new()).unwrap();

                prop_assert_eq!(client.calls(), vec![format!("cmd:{}", args.trim())]);
            }
        }
    }
}
