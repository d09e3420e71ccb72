//! Publications for driving the publish loop in tests.
//!
//! - [`RecordingPublication`]: wraps any publication and logs every hook
//! - [`ScriptedPublication`]: serves an object graph, fails where told to
//!   and reacts to failures as scripted

use std::fmt;
use std::sync::Arc;

use publisher_core::{
    CallResult, Object, Publication, PublishError, Request, Result, mapply,
};

use crate::mocks::CallLog;

/// A publication hook that a [`ScriptedPublication`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// `before_traversal`
    BeforeTraversal,
    /// `get_application`
    GetApplication,
    /// `call_traversal_hooks`
    CallTraversalHooks,
    /// `traverse_name`
    TraverseName,
    /// `after_traversal`
    AfterTraversal,
    /// `call_object`
    CallObject,
    /// `after_call`
    AfterCall,
}

/// How a [`ScriptedPublication`] reacts in `handle_exception`.
#[derive(Debug, Clone)]
pub enum ExceptionBehavior {
    /// Reset the response and let it handle the failure
    Render,
    /// Raise `Retry(original)` while retry is allowed, render otherwise
    RetryWhenAllowed,
    /// Raise `Retry` without an original while retry is allowed, render
    /// otherwise
    RetryWithoutOriginal,
    /// Raise this error
    Fail(PublishError),
}

/// Publication that serves `app` and follows a script.
///
/// Every hook is logged into its [`CallLog`]: hook names as-is,
/// `traverse_name:{name}`, `handle_exception:{retry_allowed}`.
#[derive(Clone)]
pub struct ScriptedPublication {
    app: Object,
    log: CallLog,
    fail_at: Option<(Hook, PublishError)>,
    on_exception: ExceptionBehavior,
    end_request_error: Option<PublishError>,
}

impl ScriptedPublication {
    /// Serve `app`; render failures.
    #[must_use]
    pub fn new(app: impl Into<Object>) -> Self {
        Self {
            app: app.into(),
            log: CallLog::new(),
            fail_at: None,
            on_exception: ExceptionBehavior::Render,
            end_request_error: None,
        }
    }

    /// Log into `log` instead of a private log.
    #[must_use]
    pub fn with_log(mut self, log: &CallLog) -> Self {
        self.log = log.clone();
        self
    }

    /// Raise `error` from `hook`.
    #[must_use]
    pub fn fail_at(mut self, hook: Hook, error: PublishError) -> Self {
        self.fail_at = Some((hook, error));
        self
    }

    /// Script the exception hook.
    #[must_use]
    pub fn on_exception(mut self, behavior: ExceptionBehavior) -> Self {
        self.on_exception = behavior;
        self
    }

    /// Raise `error` from `end_request`.
    #[must_use]
    pub fn fail_end_request(mut self, error: PublishError) -> Self {
        self.end_request_error = Some(error);
        self
    }

    /// The call log
    #[must_use]
    pub const fn log(&self) -> &CallLog {
        &self.log
    }

    fn enter(&self, hook: Hook, entry: impl Into<String>) -> Result<()> {
        self.log.record(entry);
        match &self.fail_at {
            Some((failing, error)) if *failing == hook => Err(error.clone()),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for ScriptedPublication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedPublication")
            .field("app", &self.app)
            .field("fail_at", &self.fail_at)
            .field("on_exception", &self.on_exception)
            .field("end_request_error", &self.end_request_error)
            .finish_non_exhaustive()
    }
}

fn render(request: &mut dyn Request, error: &PublishError) {
    let response = request.response_mut();
    response.reset();
    response.handle_exception(error);
}

impl Publication for ScriptedPublication {
    fn before_traversal(&self, _request: &mut dyn Request) -> Result<()> {
        self.enter(Hook::BeforeTraversal, "before_traversal")
    }

    fn get_application(&self, _request: &mut dyn Request) -> Result<Object> {
        self.enter(Hook::GetApplication, "get_application")?;
        Ok(self.app.clone())
    }

    fn call_traversal_hooks(&self, _request: &mut dyn Request, _object: &Object) -> Result<()> {
        self.enter(Hook::CallTraversalHooks, "call_traversal_hooks")
    }

    fn traverse_name(&self, _request: &mut dyn Request, object: &Object, name: &str) -> Result<Object> {
        self.enter(Hook::TraverseName, format!("traverse_name:{name}"))?;
        object
            .child(name)
            .ok_or_else(|| PublishError::not_found(object, name))
    }

    fn after_traversal(&self, _request: &mut dyn Request, _object: &Object) -> Result<()> {
        self.enter(Hook::AfterTraversal, "after_traversal")
    }

    fn call_object(&self, request: &mut dyn Request, object: &Object) -> Result<CallResult> {
        self.enter(Hook::CallObject, "call_object")?;
        match object {
            Object::Callable(_) => {
                let value = mapply(
                    object,
                    request.positional_arguments(),
                    request.as_argument_source(),
                )?;
                Ok(CallResult::Value(value))
            }
            Object::Value(value) => Ok(CallResult::Value(value.clone())),
            Object::Folder(_) => Ok(CallResult::Responded),
        }
    }

    fn after_call(&self, _request: &mut dyn Request, _object: &Object) -> Result<()> {
        self.enter(Hook::AfterCall, "after_call")
    }

    fn handle_exception(
        &self,
        _object: Option<&Object>,
        request: &mut dyn Request,
        error: &PublishError,
        retry_allowed: bool,
    ) -> Result<()> {
        self.log.record(format!("handle_exception:{retry_allowed}"));
        match &self.on_exception {
            ExceptionBehavior::Fail(raised) => Err(raised.clone()),
            ExceptionBehavior::RetryWhenAllowed if retry_allowed => {
                Err(PublishError::retry(Some(error.clone())))
            }
            ExceptionBehavior::RetryWithoutOriginal if retry_allowed => {
                Err(PublishError::retry(None))
            }
            _ => {
                render(request, error);
                Ok(())
            }
        }
    }

    fn end_request(&self, _request: &mut dyn Request, _object: Option<&Object>) -> Result<()> {
        self.log.record("end_request");
        self.end_request_error.clone().map_or(Ok(()), Err)
    }
}

/// Wraps a publication and logs every hook before delegating.
pub struct RecordingPublication<P> {
    inner: P,
    log: CallLog,
}

impl<P: Publication> RecordingPublication<P> {
    /// Wrap `inner`, logging into `log`.
    #[must_use]
    pub fn new(inner: P, log: &CallLog) -> Self {
        Self {
            inner,
            log: log.clone(),
        }
    }

    /// Wrap `inner` and share it as a publication.
    #[must_use]
    pub fn shared(inner: P, log: &CallLog) -> Arc<dyn Publication>
    where
        P: 'static,
    {
        Arc::new(Self::new(inner, log))
    }

    /// The wrapped publication
    #[must_use]
    pub const fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: Publication> Publication for RecordingPublication<P> {
    fn before_traversal(&self, request: &mut dyn Request) -> Result<()> {
        self.log.record("before_traversal");
        self.inner.before_traversal(request)
    }

    fn get_application(&self, request: &mut dyn Request) -> Result<Object> {
        self.log.record("get_application");
        self.inner.get_application(request)
    }

    fn call_traversal_hooks(&self, request: &mut dyn Request, object: &Object) -> Result<()> {
        self.log.record("call_traversal_hooks");
        self.inner.call_traversal_hooks(request, object)
    }

    fn traverse_name(&self, request: &mut dyn Request, object: &Object, name: &str) -> Result<Object> {
        self.log.record(format!("traverse_name:{name}"));
        self.inner.traverse_name(request, object, name)
    }

    fn after_traversal(&self, request: &mut dyn Request, object: &Object) -> Result<()> {
        self.log.record("after_traversal");
        self.inner.after_traversal(request, object)
    }

    fn call_object(&self, request: &mut dyn Request, object: &Object) -> Result<CallResult> {
        self.log.record("call_object");
        self.inner.call_object(request, object)
    }

    fn after_call(&self, request: &mut dyn Request, object: &Object) -> Result<()> {
        self.log.record("after_call");
        self.inner.after_call(request, object)
    }

    fn handle_exception(
        &self,
        object: Option<&Object>,
        request: &mut dyn Request,
        error: &PublishError,
        retry_allowed: bool,
    ) -> Result<()> {
        self.log.record(format!("handle_exception:{retry_allowed}"));
        self.inner.handle_exception(object, request, error, retry_allowed)
    }

    fn end_request(&self, request: &mut dyn Request, object: Option<&Object>) -> Result<()> {
        self.log.record("end_request");
        self.inner.end_request(request, object)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::test_request;
    use publisher_core::{Folder, Value};

    #[test]
    fn test_scripted_failure_is_logged_then_raised() {
        let publication = ScriptedPublication::new(Folder::new("root"))
            .fail_at(Hook::AfterTraversal, PublishError::bad_request("late"));
        let mut request = test_request("/");

        let err = publication
            .after_traversal(&mut request, &Object::Value(Value::Null))
            .unwrap_err();

        assert_eq!(err.to_string(), "late");
        assert_eq!(publication.log().entries(), vec!["after_traversal"]);
    }

    #[test]
    fn test_retry_behaviour_renders_once_retry_is_disallowed() {
        let publication = ScriptedPublication::new(Folder::new("root"))
            .on_exception(ExceptionBehavior::RetryWhenAllowed);
        let mut request = test_request("/");
        let failure = PublishError::bad_request("flaky");

        let raised = publication
            .handle_exception(None, &mut request, &failure, true)
            .unwrap_err();
        assert_eq!(raised.original().map(ToString::to_string), Some("flaky".into()));

        publication
            .handle_exception(None, &mut request, &failure, false)
            .unwrap();
        assert_eq!(
            request.response().get_result().unwrap(),
            Some(Value::from("bad_request: flaky"))
        );
    }
}
