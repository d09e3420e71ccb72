//! # Publisher Testing
//!
//! Testing utilities and helpers for the publisher.
//!
//! This crate provides:
//! - A shared [`CallLog`] that publications and requests append to, so a
//!   test can assert the exact hook order
//! - [`RecordingPublication`] and [`ScriptedPublication`] for driving the
//!   loop through success, failure and retry paths
//! - [`CountingRequest`], which counts closes per retry generation
//! - [`PublishTest`], a fluent harness in Given-When-Then style
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use publisher_core::{Folder, Request, Value};
//! use publisher_testing::{PublishTest, ScriptedPublication, test_request};
//!
//! let app = Folder::new("root").with_child("answer", Value::from(42));
//!
//! PublishTest::new(test_request("/answer"))
//!     .with_publication(Arc::new(ScriptedPublication::new(app)))
//!     .then_request(|request| {
//!         assert_eq!(request.response().get_result().unwrap(), Some(Value::from(42)));
//!     })
//!     .run();
//! ```

use publisher_runtime::base::{BaseRequest, Environment};
use publisher_core::Value;

/// Mock implementations of collaborator traits.
pub mod mocks {
    use std::sync::{Arc, Mutex};

    use publisher_core::Held;

    /// Ordered record of calls, shared between collaborators.
    ///
    /// # Example
    ///
    /// ```
    /// use publisher_testing::mocks::CallLog;
    ///
    /// let log = CallLog::new();
    /// let shared = log.clone();
    /// shared.record("before_traversal");
    /// assert_eq!(log.entries(), vec!["before_traversal"]);
    /// ```
    #[derive(Debug, Clone, Default)]
    pub struct CallLog {
        entries: Arc<Mutex<Vec<String>>>,
    }

    impl CallLog {
        /// Create an empty log
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Append an entry.
        #[allow(clippy::unwrap_used)] // Test infrastructure
        pub fn record(&self, entry: impl Into<String>) {
            self.entries.lock().unwrap().push(entry.into());
        }

        /// All entries, in call order.
        #[must_use]
        #[allow(clippy::unwrap_used)] // Test infrastructure
        pub fn entries(&self) -> Vec<String> {
            self.entries.lock().unwrap().clone()
        }

        /// Number of entries equal to `entry`.
        #[must_use]
        pub fn count(&self, entry: &str) -> usize {
            self.entries().iter().filter(|e| *e == entry).count()
        }

        /// Whether `entry` was recorded at all.
        #[must_use]
        pub fn contains(&self, entry: &str) -> bool {
            self.count(entry) > 0
        }

        /// Forget everything recorded so far.
        #[allow(clippy::unwrap_used)] // Test infrastructure
        pub fn clear(&self) {
            self.entries.lock().unwrap().clear();
        }
    }

    /// A held resource that records its release as `release:{label}`.
    #[derive(Debug, Clone)]
    pub struct TrackedHeld {
        label: String,
        log: CallLog,
    }

    impl TrackedHeld {
        /// Create a held resource reporting into `log`
        #[must_use]
        pub fn new(label: impl Into<String>, log: &CallLog) -> Self {
            Self {
                label: label.into(),
                log: log.clone(),
            }
        }

        /// Boxed, ready for [`Request::hold`](publisher_core::Request::hold)
        #[must_use]
        pub fn boxed(label: impl Into<String>, log: &CallLog) -> Box<dyn Held> {
            Box::new(Self::new(label, log))
        }
    }

    impl Held for TrackedHeld {
        fn release(&mut self) {
            self.log.record(format!("release:{}", self.label));
        }
    }
}

/// Test helpers and utilities.
pub mod helpers {
    /// Install a `fmt` subscriber writing to the test output.
    ///
    /// Honours `RUST_LOG`; safe to call from every test.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn,publisher_runtime=debug".into()),
            )
            .with_test_writer()
            .try_init();
    }
}

mod publication_mocks;
mod publish_test;
mod request_mocks;

// Re-export commonly used items
pub use helpers::init_test_tracing;
pub use mocks::{CallLog, TrackedHeld};
pub use publication_mocks::{ExceptionBehavior, Hook, RecordingPublication, ScriptedPublication};
pub use publish_test::PublishTest;
pub use request_mocks::{CloseTracker, CountingRequest};

/// A [`BaseRequest`] for `path`, stored under `PATH_INFO`.
///
/// The path is already split into the traversal stack.
#[must_use]
pub fn test_request(path: &str) -> BaseRequest {
    test_request_with(path, std::iter::empty::<(&str, Value)>())
}

/// Like [`test_request`], with extra environment entries.
#[must_use]
pub fn test_request_with<K, I>(path: &str, entries: I) -> BaseRequest
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    let mut environment: Environment = entries
        .into_iter()
        .map(|(key, value)| (key.into(), value))
        .collect();
    environment.insert("PATH_INFO".to_string(), Value::from(path));

    let mut request = BaseRequest::new(environment);
    request.setup_path("PATH_INFO");
    request
}
