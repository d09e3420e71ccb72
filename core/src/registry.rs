//! Dispatch tables keyed by [`ErrorKind`].
//!
//! Deployment tooling registers behaviour for specific kinds of failure
//! without touching the publish loop:
//!
//! - [`ReRaiseRegistry`]: in raw mode, whether a failure the exception hook
//!   already handled must still propagate to the caller
//! - [`SideEffectsRegistry`]: persistent side effects of a failure, applied
//!   by publications from their exception hook

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ErrorKind, PublishError};
use crate::object::Object;
use crate::request::Request;

/// Decides whether an absorbed failure must still propagate.
pub trait ReRaisePolicy: Send + Sync {
    /// `true` to propagate, `false` to suppress.
    fn should_reraise(&self, error: &PublishError) -> bool;
}

impl<F> ReRaisePolicy for F
where
    F: Fn(&PublishError) -> bool + Send + Sync,
{
    fn should_reraise(&self, error: &PublishError) -> bool {
        self(error)
    }
}

/// Policy that always suppresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoNotReRaise;

impl ReRaisePolicy for DoNotReRaise {
    fn should_reraise(&self, _error: &PublishError) -> bool {
        false
    }
}

/// Persistent side effects of a failure.
pub trait ExceptionSideEffects: Send + Sync {
    /// Apply the side effects for `error`, raised while publishing `object`.
    fn apply(&self, object: Option<&Object>, request: &mut dyn Request, error: &PublishError);
}

/// A map from [`ErrorKind`] to a shared handler.
pub struct KindRegistry<P: ?Sized> {
    entries: HashMap<ErrorKind, Arc<P>>,
}

/// Re-raise policies by kind.
pub type ReRaiseRegistry = KindRegistry<dyn ReRaisePolicy>;

/// Exception side effects by kind.
pub type SideEffectsRegistry = KindRegistry<dyn ExceptionSideEffects>;

impl<P: ?Sized> KindRegistry<P> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a handler for `kind`.
    ///
    /// Returns `true` if a previous handler was replaced.
    pub fn register(&mut self, kind: ErrorKind, handler: Arc<P>) -> bool {
        self.entries.insert(kind, handler).is_some()
    }

    /// Builder-style [`KindRegistry::register`].
    #[must_use]
    pub fn with(mut self, kind: ErrorKind, handler: Arc<P>) -> Self {
        self.register(kind, handler);
        self
    }

    /// Remove the handler for `kind`.
    ///
    /// Returns `true` if there was one.
    pub fn unregister(&mut self, kind: ErrorKind) -> bool {
        self.entries.remove(&kind).is_some()
    }

    /// The handler registered for `error`'s kind.
    #[must_use]
    pub fn lookup(&self, error: &PublishError) -> Option<&Arc<P>> {
        self.entries.get(&error.kind())
    }

    /// Registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<ErrorKind> {
        let mut kinds: Vec<ErrorKind> = self.entries.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Number of registered kinds
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ReRaiseRegistry {
    /// Whether `error` must propagate in raw mode.
    ///
    /// Kinds without a registered policy propagate.
    #[must_use]
    pub fn should_reraise(&self, error: &PublishError) -> bool {
        self.lookup(error)
            .is_none_or(|policy| policy.should_reraise(error))
    }
}

impl SideEffectsRegistry {
    /// Apply the side effects registered for `error`'s kind, if any.
    pub fn apply(&self, object: Option<&Object>, request: &mut dyn Request, error: &PublishError) {
        if let Some(effects) = self.lookup(error) {
            tracing::debug!(kind = %error.kind(), "Applying exception side effects");
            effects.apply(object, request, error);
        }
    }
}

impl<P: ?Sized> Default for KindRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ?Sized> Clone for KindRegistry<P> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<P: ?Sized> fmt::Debug for KindRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
