//! The publication: the strategy that parameterizes one request's lifecycle.
//!
//! The publish loop calls the hooks in this order for a successful attempt:
//!
//! ```text
//! before_traversal → get_application → (call_traversal_hooks / traverse_name)* →
//! after_traversal → call_object → after_call → end_request
//! ```
//!
//! On failure `handle_exception` replaces the remaining hooks and
//! `end_request` still runs.

use serde_json::Value;

use crate::error::{PublishError, Result};
use crate::object::Object;
use crate::request::Request;

/// What `call_object` produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    /// A value to store as the response result
    Value(Value),
    /// The callable populated the response itself
    Responded,
}

impl From<Value> for CallResult {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Lifecycle hooks for publishing a request.
///
/// Implementations are shared between requests and must not keep per-request
/// state.
pub trait Publication: Send + Sync {
    /// Called once, before traversal.
    ///
    /// # Errors
    ///
    /// Aborts the attempt.
    fn before_traversal(&self, request: &mut dyn Request) -> Result<()>;

    /// The root object traversal starts from.
    ///
    /// # Errors
    ///
    /// Aborts the attempt.
    fn get_application(&self, request: &mut dyn Request) -> Result<Object>;

    /// Called for each new object reached by traversal, including the root
    /// and the final target.
    ///
    /// # Errors
    ///
    /// Aborts the attempt.
    fn call_traversal_hooks(&self, request: &mut dyn Request, object: &Object) -> Result<()>;

    /// Resolve one traversal step.
    ///
    /// # Errors
    ///
    /// Typically [`PublishError::NotFound`].
    fn traverse_name(&self, request: &mut dyn Request, object: &Object, name: &str) -> Result<Object>;

    /// Called once the target is resolved.
    ///
    /// # Errors
    ///
    /// Aborts the attempt.
    fn after_traversal(&self, request: &mut dyn Request, object: &Object) -> Result<()>;

    /// Invoke the target.
    ///
    /// # Errors
    ///
    /// Whatever the target raises.
    fn call_object(&self, request: &mut dyn Request, object: &Object) -> Result<CallResult>;

    /// Called after a successful call.
    ///
    /// # Errors
    ///
    /// Aborts the attempt.
    fn after_call(&self, request: &mut dyn Request, object: &Object) -> Result<()>;

    /// Render a failure into the response.
    ///
    /// `object` is the last object reached, or `None` if the root was never
    /// obtained.
    ///
    /// # Errors
    ///
    /// Raise [`PublishError::Retry`] to ask for a fresh attempt. Any other
    /// error, or a retry raised when `retry_allowed` is false, is a handler
    /// failure.
    fn handle_exception(
        &self,
        object: Option<&Object>,
        request: &mut dyn Request,
        error: &PublishError,
        retry_allowed: bool,
    ) -> Result<()>;

    /// Called at the end of every attempt, successful or not.
    ///
    /// # Errors
    ///
    /// Treated like a failing exception hook.
    fn end_request(&self, request: &mut dyn Request, object: Option<&Object>) -> Result<()>;
}
