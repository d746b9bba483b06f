//! Deferred, once-only handler registration.
//!
//! Handler modules register their routers through initialisers attached to a
//! [`HandlerLoader`]. Nothing runs until the first dispatch that needs a given
//! calling convention calls [`HandlerLoader::ensure_loaded`]. Each convention
//! has its own gate, so blocking and suspendable handler sets load
//! independently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use super::handler::CallingConvention;
use super::registry::Registry;

type Initialiser<C> = Box<dyn Fn(&Registry<C>) + Send + Sync>;

struct LoadGate<C> {
    loaded: AtomicBool,
    lock: Mutex<()>,
    initialisers: Vec<Initialiser<C>>,
}

impl<C> LoadGate<C> {
    fn new() -> Self {
        LoadGate {
            loaded: AtomicBool::new(false),
            lock: Mutex::new(()),
            initialisers: Vec::new(),
        }
    }
}

/// Runs registration code at most once per calling convention.
pub struct HandlerLoader<C> {
    blocking: LoadGate<C>,
    suspendable: LoadGate<C>,
}

impl<C> HandlerLoader<C> {
    pub fn new() -> Self {
        HandlerLoader {
            blocking: LoadGate::new(),
            suspendable: LoadGate::new(),
        }
    }

    /// Adds an initialiser to run the first time `convention` is loaded.
    ///
    /// Initialisers run under a blocking lock, possibly on an async runtime
    /// worker thread, so they must not block: register routers and return.
    ///
    /// ```
    /// use github_app_router::routing::{CallingConvention, HandlerLoader, Registry, Router};
    ///
    /// let registry = Registry::<()>::new("bot");
    /// let loader = HandlerLoader::new().on_load(CallingConvention::Blocking, |registry| {
    ///     registry.register(Router::new("issues"));
    /// });
    ///
    /// assert!(loader.ensure_loaded(CallingConvention::Blocking, &registry));
    /// assert!(!loader.ensure_loaded(CallingConvention::Blocking, &registry));
    /// assert_eq!(registry.routers().len(), 1);
    /// ```
    pub fn on_load<F>(mut self, convention: CallingConvention, init: F) -> Self
    where
        F: Fn(&Registry<C>) + Send + Sync + 'static,
    {
        let gate = match convention {
            CallingConvention::Blocking => &mut self.blocking,
            CallingConvention::Suspendable => &mut self.suspendable,
        };
        gate.initialisers.push(Box::new(init));
        self
    }

    pub fn is_loaded(&self, convention: CallingConvention) -> bool {
        self.gate(convention).loaded.load(Ordering::Acquire)
    }

    /// Runs the initialisers for `convention` unless they have already run.
    ///
    /// Returns true for the one call that performed the load. Concurrent
    /// callers block until that load finishes and then return false.
    pub fn ensure_loaded(&self, convention: CallingConvention, registry: &Registry<C>) -> bool {
        let gate = self.gate(convention);
        if gate.loaded.load(Ordering::Acquire) {
            return false;
        }

        let _guard = gate.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if gate.loaded.load(Ordering::Acquire) {
            return false;
        }

        debug!(%convention, initialisers = gate.initialisers.len(), "Loading handlers");
        for init in &gate.initialisers {
            init(registry);
        }
        gate.loaded.store(true, Ordering::Release);

        info!(
            %convention,
            routes = registry.handler_count(),
            "Handlers loaded"
        );
        true
    }

    fn gate(&self, convention: CallingConvention) -> &LoadGate<C> {
        match convention {
            CallingConvention::Blocking => &self.blocking,
            CallingConvention::Suspendable => &self.suspendable,
        }
    }
}

impl<C> Default for HandlerLoader<C> {
    fn default() -> Self {
        Self::new()
    }
}
