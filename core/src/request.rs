//! Request-side collaborator contracts.
//!
//! A protocol adapter builds a [`Request`]; the publish loop drives it. The
//! request owns its [`Response`] and any [`Held`] resources, which are
//! released when the request is closed.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{PublishError, Result};
use crate::mapply::ArgumentSource;
use crate::object::Object;
use crate::publication::Publication;

/// A resource kept alive until the request holding it is closed.
pub trait Held: Send {
    /// Release the resource. Called exactly once, on close.
    fn release(&mut self);
}

/// The outcome being accumulated for a request.
///
/// A response holds either a result or a captured failure.
pub trait Response: Send {
    /// Store the result of the published call.
    fn set_result(&mut self, result: Value);

    /// Render or capture a failure.
    fn handle_exception(&mut self, error: &PublishError);

    /// Mark the response as an internal error (the exception hook itself failed).
    fn internal_error(&mut self);

    /// Discard anything accumulated so far.
    fn reset(&mut self);

    /// A fresh response of the same kind, for a retried request.
    fn retry(&self) -> Box<dyn Response>;

    /// The accumulated result.
    ///
    /// # Errors
    ///
    /// Responses that capture failures surface them here, every time this is
    /// called.
    fn get_result(&self) -> Result<Option<Value>>;
}

/// A publishing request.
///
/// After [`Request::close`] no further mutation is valid.
pub trait Request: Send {
    /// Protocol-specific parsing done before traversal.
    ///
    /// # Errors
    ///
    /// Malformed input.
    fn process_inputs(&mut self) -> Result<()> {
        Ok(())
    }

    /// The response owned by this request.
    fn response(&self) -> &dyn Response;

    /// Mutable access to the response.
    fn response_mut(&mut self) -> &mut dyn Response;

    /// Resolve the traversal stack starting from `root`.
    ///
    /// Implementations call the publication's `call_traversal_hooks` before
    /// each step and once after the last one, and `traverse_name` for each
    /// step.
    ///
    /// # Errors
    ///
    /// Whatever the publication raises while traversing.
    fn traverse(&mut self, root: Object) -> Result<Object>;

    /// Remaining names, last-to-first (the next name is at the end).
    fn traversal_stack(&self) -> Vec<String>;

    /// Replace the remaining names.
    fn set_traversal_stack(&mut self, stack: Vec<String>);

    /// Positional arguments passed to the published callable.
    fn positional_arguments(&self) -> &[Value];

    /// Authenticated principal, if any.
    fn principal(&self) -> Option<&str>;

    /// Set by the publication once the principal is known.
    fn set_principal(&mut self, principal: Option<String>);

    /// Whether [`Request::retry`] may be called.
    fn supports_retry(&self) -> bool {
        false
    }

    /// A fresh copy able to re-run the whole attempt.
    ///
    /// Must not invalidate `self`; the loop closes `self` afterwards.
    ///
    /// # Errors
    ///
    /// The request cannot be retried.
    fn retry(&self) -> Result<Self>
    where
        Self: Sized,
    {
        Err(PublishError::application("Retry is not supported"))
    }

    /// Release held objects and drop per-request state.
    fn close(&mut self);

    /// Keep `held` alive until the request is closed.
    fn hold(&mut self, held: Box<dyn Held>);

    /// The publication driving this request.
    fn publication(&self) -> Option<Arc<dyn Publication>>;

    /// Attach the publication.
    fn set_publication(&mut self, publication: Arc<dyn Publication>);

    /// This request as the binder's fallback source.
    fn as_argument_source(&self) -> &dyn ArgumentSource;
}
