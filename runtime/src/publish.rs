//! The publish loop.
//!
//! One call to [`Publisher::publish`] runs attempts until one completes:
//!
//! ```text
//! process_inputs → before_traversal → get_application → traverse →
//! after_traversal → call_object → after_call → end_request
//! ```
//!
//! A failure in any step goes to the publication's exception hook, then
//! `end_request` runs. A [`PublishError::Retry`] coming out of that either
//! starts a fresh attempt on [`Request::retry`] or surfaces. A failure of the
//! exception hook itself (or of `end_request`, or of `retry`) is a handler
//! failure: in absorbed mode the response is marked as an internal error and
//! the failure is returned after cleanup; in raw mode it returns at once.
//!
//! Whatever happens, the request active at the end is closed exactly once
//! before `publish` returns.

use std::time::Instant;

use publisher_core::{CallResult, Object, Publication, PublishError, Request, Result};

use crate::PublisherConfig;
use crate::metrics::PublishMetrics;
use crate::retry::{RetryCoordinator, RetryDecision};

/// Closes the request on every exit path, unwinding included.
struct CloseGuard<'a, R: Request> {
    request: &'a mut R,
}

impl<R: Request> Drop for CloseGuard<'_, R> {
    fn drop(&mut self) {
        self.request.close();
    }
}

/// What one attempt left behind.
struct Attempt {
    /// Last object reached: the root, the target, or nothing.
    object: Option<Object>,
    /// Error that escaped the attempt.
    pending: Option<PublishError>,
}

/// How the loop proceeds after an attempt.
enum Step {
    Continue,
    Done,
    /// Finish, then return this error after cleanup.
    Raise(PublishError),
}

/// Drives requests through their publication.
///
/// The publisher holds no per-request state and can be shared between
/// threads.
#[derive(Debug, Clone, Default)]
pub struct Publisher {
    config: PublisherConfig,
}

impl Publisher {
    /// Create a publisher with the given configuration.
    #[must_use]
    pub const fn new(config: PublisherConfig) -> Self {
        Self { config }
    }

    /// The active configuration
    #[must_use]
    pub const fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Publish `request`.
    ///
    /// Returns the request that completed, which is a retried copy of the
    /// one passed in if retries occurred. That request has been closed.
    ///
    /// # Errors
    ///
    /// In absorbed mode, only handler failures and a request without a
    /// publication. In raw mode, also the original failure (unless the
    /// re-raise registry suppresses it) and a surfaced retry signal.
    #[tracing::instrument(
        skip(self, request),
        name = "publish",
        fields(handle_errors = self.config.handle_errors)
    )]
    pub fn publish<R: Request>(&self, mut request: R) -> Result<R> {
        let started = Instant::now();

        let outcome = {
            let mut guard = CloseGuard {
                request: &mut request,
            };
            self.drive(&mut *guard.request)
        };

        PublishMetrics::record_request(started.elapsed());
        outcome.map(|()| request)
    }

    fn drive<R: Request>(&self, request: &mut R) -> Result<()> {
        let mut retry = RetryCoordinator::new(&self.config.retry_policy);
        let mut to_raise = None;

        loop {
            tracing::debug!(attempt = retry.retries() + 1, "Starting attempt");
            let attempt = self.attempt(request);

            let step = match attempt.pending {
                None => Ok(Step::Done),
                Some(signal) if signal.is_retry() => {
                    self.handle_retry(request, &mut retry, attempt.object.as_ref(), signal)
                }
                Some(error) => Err(error),
            };

            match step {
                Ok(Step::Continue) => {}
                Ok(Step::Done) => break,
                Ok(Step::Raise(error)) => {
                    to_raise = Some(error);
                    break;
                }
                Err(error) if self.config.handle_errors => {
                    tracing::error!(kind = %error.kind(), error = %error, "Exception handler failed");
                    PublishMetrics::record_handler_failure();
                    request.response_mut().internal_error();
                    to_raise = Some(error);
                    break;
                }
                Err(error) => return Err(error),
            }
        }

        if retry.retries() > 0 && to_raise.is_none() {
            tracing::info!(retries = retry.retries(), "Request completed after retries");
        }

        to_raise.map_or(Ok(()), Err)
    }

    fn attempt<R: Request>(&self, request: &mut R) -> Attempt {
        PublishMetrics::record_attempt();

        let Some(publication) = request.publication() else {
            return Attempt {
                object: None,
                pending: Some(PublishError::NoPublication),
            };
        };

        let mut object = None;
        let mut pending = None;

        if let Err(error) = run_hooks(publication.as_ref(), request, &mut object) {
            pending = self.handle_failure(publication.as_ref(), request, object.as_ref(), error);
        }

        if let Err(error) = publication.end_request(request, object.as_ref()) {
            tracing::warn!(kind = %error.kind(), error = %error, "end_request failed");
            pending = Some(error);
        }

        Attempt { object, pending }
    }

    /// Route a failed attempt through the exception hook.
    ///
    /// Returns the error that escapes the attempt, if any.
    fn handle_failure<R: Request>(
        &self,
        publication: &dyn Publication,
        request: &mut R,
        object: Option<&Object>,
        error: PublishError,
    ) -> Option<PublishError> {
        PublishMetrics::record_failure(error.kind());
        tracing::debug!(kind = %error.kind(), error = %error, "Attempt failed");

        match publication.handle_exception(object, request, &error, true) {
            Ok(()) if self.config.handle_errors => None,
            Ok(()) => self.config.reraise.should_reraise(&error).then_some(error),
            Err(raised) => Some(raised),
        }
    }

    fn handle_retry<R: Request>(
        &self,
        request: &mut R,
        retry: &mut RetryCoordinator<'_>,
        object: Option<&Object>,
        signal: PublishError,
    ) -> Result<Step> {
        match retry.decide(&*request) {
            RetryDecision::FreshAttempt { delay } => {
                let fresh = request.retry()?;
                let mut previous = std::mem::replace(request, fresh);
                previous.close();

                tracing::warn!(retries = retry.retries(), reason = %signal, "Retrying request");
                PublishMetrics::record_retry();
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                Ok(Step::Continue)
            }
            RetryDecision::Surface if self.config.handle_errors => {
                let publication = request.publication().ok_or(PublishError::NoPublication)?;
                let original = match signal {
                    PublishError::Retry {
                        original: Some(original),
                    } => *original,
                    signal => signal,
                };
                publication.handle_exception(object, request, &original, false)?;
                Ok(Step::Done)
            }
            RetryDecision::Surface => match signal {
                PublishError::Retry {
                    original: Some(original),
                } => Ok(Step::Raise(*original)),
                signal => Err(signal),
            },
        }
    }
}

/// The hooks of one attempt, up to `after_call`.
///
/// `object` tracks the last object reached, for the exception hook and
/// `end_request`.
fn run_hooks<R: Request>(
    publication: &dyn Publication,
    request: &mut R,
    object: &mut Option<Object>,
) -> Result<()> {
    request.process_inputs()?;
    publication.before_traversal(request)?;

    let root = publication.get_application(request)?;
    *object = Some(root.clone());
    let target = request.traverse(root)?;
    *object = Some(target.clone());

    publication.after_traversal(request, &target)?;
    match publication.call_object(request, &target)? {
        CallResult::Value(value) => request.response_mut().set_result(value),
        CallResult::Responded => {}
    }
    publication.after_call(request, &target)
}

/// Publish `request` with the default configuration.
///
/// `handle_errors` selects absorbed (`true`) or raw (`false`) mode.
///
/// # Errors
///
/// See [`Publisher::publish`].
pub fn publish<R: Request>(request: R, handle_errors: bool) -> Result<R> {
    Publisher::new(PublisherConfig::default().with_handle_errors(handle_errors)).publish(request)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::base::{BaseRequest, Environment};
    use crate::default_publication::DefaultPublication;
    use publisher_core::{Folder, Function, Signature};
    use serde_json::json;
    use std::sync::Arc;

    fn request(path: &str) -> BaseRequest {
        let app = Folder::new("root").with_doc("Root").with_child(
            "add",
            Function::new(Signature::new("add", ["a", "b"]).unwrap(), |args| {
                let a = args[0].as_value().and_then(serde_json::Value::as_i64).unwrap_or(0);
                let b = args[1].as_value().and_then(serde_json::Value::as_i64).unwrap_or(0);
                Ok(json!(a + b))
            })
            .with_doc("Adds two numbers"),
        );

        let mut environment = Environment::new();
        environment.insert("PATH_INFO".into(), json!(path));
        environment.insert("a".into(), json!(2));
        environment.insert("b".into(), json!(3));
        let mut request = BaseRequest::new(environment)
            .with_publication(Arc::new(DefaultPublication::new(app)));
        request.setup_path("PATH_INFO");
        request
    }

    #[test]
    fn test_successful_publish_stores_result_and_closes() {
        let request = publish(request("/add"), true).unwrap();

        assert_eq!(request.response().get_result().unwrap(), Some(json!(5)));
        assert!(request.is_closed());
    }

    #[test]
    fn test_absorbed_failure_is_rendered() {
        let request = publish(request("/missing"), true).unwrap();

        let result = request.response().get_result().unwrap().unwrap();
        assert!(result.as_str().unwrap().starts_with("not_found: Object: <Folder root>"));
        assert!(request.is_closed());
    }

    #[test]
    fn test_raw_failure_propagates() {
        let err = publish(request("/missing"), false).unwrap_err();
        assert!(matches!(err, PublishError::NotFound { ref name, .. } if name == "missing"));
    }

    #[test]
    fn test_missing_publication_is_a_handler_failure() {
        let request = BaseRequest::new(Environment::new());
        let err = publish(request, true).unwrap_err();
        assert!(matches!(err, PublishError::NoPublication));
    }
}
