//! Routers: named groups of event and command routes.

use serde_json::Value;
use tracing::trace;

use super::handler::Handler;
use crate::commands::{CommandScope, CommentContext};
use crate::webhooks::Event;

/// Selects the events an event route applies to.
///
/// Every condition must hold: the event type, the action when one is given,
/// and each top-level payload key equal to its expected value.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFilter {
    event_type: String,
    action: Option<String>,
    conditions: Vec<(String, Value)>,
}

impl EventFilter {
    /// Matches every event of `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        EventFilter {
            event_type: event_type.into(),
            action: None,
            conditions: Vec::new(),
        }
    }

    /// Also requires the payload's `action`.
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Also requires the top-level payload `key` to equal `value`.
    ///
    /// ```
    /// use github_app_router::routing::EventFilter;
    /// use github_app_router::webhooks::Event;
    /// use serde_json::json;
    ///
    /// let filter = EventFilter::new("pull_request").action("closed").when("merged", true);
    /// let payload = json!({"action": "closed", "merged": true});
    /// let event = Event::new("pull_request", payload.as_object().unwrap().clone(), "d");
    /// assert!(filter.matches(&event));
    /// ```
    pub fn when(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((key.into(), value.into()));
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.event_type == event.event_type()
            && self
                .action
                .as_deref()
                .is_none_or(|action| event.action() == Some(action))
            && self
                .conditions
                .iter()
                .all(|(key, value)| event.get(key) == Some(value))
    }
}

struct EventRoute<C> {
    filter: EventFilter,
    handler: Handler<C>,
}

struct CommandRoute<C> {
    name: String,
    scope: CommandScope,
    handler: Handler<C>,
}

/// A named collection of handlers.
///
/// Routes are kept in the order they were added and are fetched in that
/// order. A router does nothing until it is registered with a
/// [`Registry`](super::Registry).
pub struct Router<C> {
    name: String,
    events: Vec<EventRoute<C>>,
    commands: Vec<CommandRoute<C>>,
}

impl<C> Router<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Router {
            name: name.into(),
            events: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Routes every event of `event_type` to `handler`.
    pub fn on(&mut self, event_type: impl Into<String>, handler: Handler<C>) -> &mut Self {
        self.add(EventFilter::new(event_type), handler)
    }

    /// Routes events of `event_type` with the given `action` to `handler`.
    pub fn on_action(
        &mut self,
        event_type: impl Into<String>,
        action: impl Into<String>,
        handler: Handler<C>,
    ) -> &mut Self {
        self.add(EventFilter::new(event_type).action(action), handler)
    }

    /// Routes events selected by `filter` to `handler`.
    pub fn add(&mut self, filter: EventFilter, handler: Handler<C>) -> &mut Self {
        self.events.push(EventRoute { filter, handler });
        self
    }

    /// Routes the mention command `name` to `handler` in the comment contexts
    /// allowed by `scope`.
    ///
    /// Command names are matched case-insensitively.
    pub fn command(
        &mut self,
        name: impl Into<String>,
        scope: CommandScope,
        handler: Handler<C>,
    ) -> &mut Self {
        let name = name.into().to_lowercase();
        self.commands.push(CommandRoute {
            name,
            scope,
            handler,
        });
        self
    }

    /// Handlers of all event routes matching `event`, in insertion order.
    pub fn fetch(&self, event: &Event) -> Vec<&Handler<C>> {
        let handlers: Vec<_> = self
            .events
            .iter()
            .filter(|route| route.filter.matches(event))
            .map(|route| &route.handler)
            .collect();
        trace!(
            router = %self.name,
            event_type = %event.event_type(),
            matched = handlers.len(),
            "Fetched event routes"
        );
        handlers
    }

    /// Handlers of all command routes for `command` whose scope admits
    /// `context`, in insertion order.
    pub fn fetch_command(&self, command: &str, context: CommentContext) -> Vec<&Handler<C>> {
        self.commands
            .iter()
            .filter(|route| route.name == command && route.scope.applies_to(context))
            .map(|route| &route.handler)
            .collect()
    }

    /// Registered command names with their scopes.
    pub fn commands(&self) -> impl Iterator<Item = (&str, CommandScope)> {
        self.commands
            .iter()
            .map(|route| (route.name.as_str(), route.scope))
    }

    /// Total number of routes, event and command.
    pub fn len(&self) -> usize {
        self.events.len() + self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{DispatchContext, HandlerResult};
    use serde_json::json;

    fn event(event_type: &str, payload: Value) -> Event {
        let payload = payload.as_object().cloned().unwrap_or_default();
        Event::new(event_type, payload, "delivery-1")
    }

    fn first(_: &Event, _: &(), _: &DispatchContext) -> HandlerResult {
        Ok(())
    }

    fn second(_: &Event, _: &(), _: &DispatchContext) -> HandlerResult {
        Ok(())
    }

    mod filters {
        use super::*;

        #[test]
        fn event_type_alone_matches_any_action() {
            let filter = EventFilter::new("issues");
            assert!(filter.matches(&event("issues", json!({"action": "opened"}))));
            assert!(filter.matches(&event("issues", json!({}))));
            assert!(!filter.matches(&event("push", json!({}))));
        }

        #[test]
        fn action_must_match_when_given() {
            let filter = EventFilter::new("issues").action("opened");
            assert!(filter.matches(&event("issues", json!({"action": "opened"}))));
            assert!(!filter.matches(&event("issues", json!({"action": "closed"}))));
            assert!(!filter.matches(&event("issues", json!({}))));
        }

        #[test]
        fn conditions_compare_top_level_values() {
            let filter = EventFilter::new("pull_request")
                .action("closed")
                .when("merged", true);
            assert!(filter.matches(&event(
                "pull_request",
                json!({"action": "closed", "merged": true})
            )));
            assert!(!filter.matches(&event(
                "pull_request",
                json!({"action": "closed", "merged": false})
            )));
            assert!(!filter.matches(&event("pull_request", json!({"action": "closed"}))));
        }
    }

    mod routes {
        use super::*;

        #[test]
        fn fetch_returns_matching_handlers_in_insertion_order() {
            let mut router = Router::new("test");
            router
                .on("issues", Handler::blocking(first))
                .on_action("issues", "opened", Handler::blocking(second))
                .on("push", Handler::blocking(first));

            let names: Vec<_> = router
                .fetch(&event("issues", json!({"action": "opened"})))
                .iter()
                .map(|h| h.name())
                .collect();
            assert_eq!(names.len(), 2);
            assert!(names[0].ends_with("first"));
            assert!(names[1].ends_with("second"));

            assert_eq!(
                router
                    .fetch(&event("issues", json!({"action": "closed"})))
                    .len(),
                1
            );
        }

        #[test]
        fn fetch_of_unknown_event_is_empty() {
            let mut router = Router::new("test");
            router.on("issues", Handler::blocking(first));
            assert!(router.fetch(&event("star", json!({}))).is_empty());
        }

        #[test]
        fn commands_are_lowercased_and_scoped() {
            let mut router = Router::new("test");
            router.command("Deploy", CommandScope::PULL_REQUEST, Handler::blocking(first));

            assert_eq!(
                router.fetch_command("deploy", CommentContext::PullRequest).len(),
                1
            );
            assert!(router.fetch_command("deploy", CommentContext::Issue).is_empty());
            assert!(router.fetch_command("Deploy", CommentContext::PullRequest).is_empty());
            assert_eq!(
                router.commands().collect::<Vec<_>>(),
                vec![("deploy", CommandScope::PULL_REQUEST)]
            );
        }

        #[test]
        fn len_counts_both_kinds_of_route() {
            let mut router = Router::<()>::new("test");
            assert!(router.is_empty());
            router
                .on("issues", Handler::blocking(first))
                .command("help", CommandScope::ANY, Handler::blocking(second));
            assert_eq!(router.len(), 2);
            assert_eq!(router.name(), "test");
        }
    }
}
