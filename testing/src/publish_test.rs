//! Ergonomic testing utilities for the publish loop
//!
//! This module provides a fluent API for publishing one request with
//! readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // PublishTest is the natural name

use std::sync::Arc;

use publisher_core::{Publication, PublishError, Request};
use publisher_runtime::{Publisher, PublisherConfig};

/// Type alias for request assertion functions
type RequestAssertion<R> = Box<dyn FnOnce(&R)>;

/// Type alias for error assertion functions
type ErrorAssertion = Box<dyn FnOnce(&PublishError)>;

/// Fluent API for testing a publish call
///
/// Request assertions run when `publish` succeeds, error assertions when it
/// fails. Registering one kind and getting the other outcome fails the test.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use publisher_core::{Folder, PublishError};
/// use publisher_runtime::PublisherConfig;
/// use publisher_testing::{PublishTest, ScriptedPublication, test_request};
///
/// PublishTest::new(test_request("/missing"))
///     .with_publication(Arc::new(ScriptedPublication::new(Folder::new("root"))))
///     .with_config(PublisherConfig::default().with_handle_errors(false))
///     .then_error(|error| {
///         assert!(matches!(error, PublishError::NotFound { .. }));
///     })
///     .run();
/// ```
pub struct PublishTest<R: Request> {
    request: R,
    config: PublisherConfig,
    request_assertions: Vec<RequestAssertion<R>>,
    error_assertions: Vec<ErrorAssertion>,
}

impl<R: Request> PublishTest<R> {
    /// Create a new publish test for `request` (Given)
    #[must_use]
    pub fn new(request: R) -> Self {
        Self {
            request,
            config: PublisherConfig::default(),
            request_assertions: Vec::new(),
            error_assertions: Vec::new(),
        }
    }

    /// Attach the publication that drives the request
    #[must_use]
    pub fn with_publication(mut self, publication: Arc<dyn Publication>) -> Self {
        self.request.set_publication(publication);
        self
    }

    /// Set the publisher configuration (When)
    #[must_use]
    pub fn with_config(mut self, config: PublisherConfig) -> Self {
        self.config = config;
        self
    }

    /// Add an assertion about the request that completed (Then)
    #[must_use]
    pub fn then_request<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&R) + 'static,
    {
        self.request_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the error `publish` returned (Then)
    #[must_use]
    pub fn then_error<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&PublishError) + 'static,
    {
        self.error_assertions.push(Box::new(assertion));
        self
    }

    /// Publish the request and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if the outcome does not match the kind of assertions
    /// registered, or if any assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    pub fn run(self) {
        let publisher = Publisher::new(self.config);

        match publisher.publish(self.request) {
            Ok(request) => {
                assert!(
                    self.error_assertions.is_empty(),
                    "Expected publish to fail, but it succeeded"
                );
                for assertion in self.request_assertions {
                    assertion(&request);
                }
            }
            Err(error) => {
                assert!(
                    self.request_assertions.is_empty(),
                    "Expected publish to succeed, but it failed: {error}"
                );
                for assertion in self.error_assertions {
                    assertion(&error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::{ScriptedPublication, test_request};
    use publisher_core::{Folder, Value};

    #[test]
    fn test_publish_test_success() {
        let app = Folder::new("root").with_child("n", Value::from(7));

        PublishTest::new(test_request("/n"))
            .with_publication(Arc::new(ScriptedPublication::new(app)))
            .then_request(|request| {
                assert_eq!(request.response().get_result().unwrap(), Some(Value::from(7)));
                assert!(request.is_closed());
            })
            .run();
    }

    #[test]
    #[should_panic(expected = "Expected publish to fail")]
    fn test_publish_test_reports_unexpected_success() {
        PublishTest::new(test_request("/"))
            .with_publication(Arc::new(ScriptedPublication::new(Folder::new("root"))))
            .then_error(|_| {})
            .run();
    }
}
