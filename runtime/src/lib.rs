//! # Publisher Runtime
//!
//! The publish loop and the generic request machinery built on
//! [`publisher_core`].
//!
//! ## Core Components
//!
//! - **Publisher**: drives a request through its publication, handles
//!   failures and retries, and closes the request on every path
//! - **Retry**: the retry policy and the per-call retry coordinator
//! - **Base request/response**: environment-backed request with traversal,
//!   held objects and retry support
//! - **Default publication**: serves an object graph with the classic
//!   private-name and docstring checks
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use publisher_core::{Folder, Function, Request, Value, signature};
//! use publisher_runtime::base::{BaseRequest, Environment};
//! use publisher_runtime::{DefaultPublication, Publisher, PublisherConfig};
//!
//! let hello = Function::new(signature!(hello(name = "world"))?, |args| {
//!     Ok(Value::from(format!("Hello, {}!", args[0].as_str().unwrap_or("?"))))
//! })
//! .with_doc("Greets someone");
//! let app = Folder::new("root").with_doc("Root").with_child("hello", hello);
//!
//! let mut environment = Environment::new();
//! environment.insert("PATH_INFO".into(), Value::from("/hello"));
//! let mut request = BaseRequest::new(environment)
//!     .with_publication(Arc::new(DefaultPublication::new(app)));
//! request.setup_path("PATH_INFO");
//!
//! let publisher = Publisher::new(PublisherConfig::default());
//! let request = publisher.publish(request)?;
//!
//! assert_eq!(
//!     request.response().get_result()?,
//!     Some(Value::from("Hello, world!"))
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;

use publisher_core::{ErrorKind, ReRaisePolicy, ReRaiseRegistry};

/// Retry policy and coordination
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

/// Base request and response
pub mod base;

/// Path cleaning for traversal stacks
pub mod path;

mod default_publication;
mod publish;

pub use default_publication::DefaultPublication;
pub use publish::{Publisher, publish};
pub use retry::{RetryCoordinator, RetryDecision, RetryPolicy};

/// Configuration for the [`Publisher`]
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use publisher_core::{DoNotReRaise, ErrorKind};
/// use publisher_runtime::{PublisherConfig, RetryPolicy};
///
/// let config = PublisherConfig::default()
///     .with_handle_errors(false)
///     .with_retry_policy(RetryPolicy::builder().max_retries(3).build())
///     .with_reraise(ErrorKind::NotFound, Arc::new(DoNotReRaise));
///
/// assert!(!config.handle_errors);
/// ```
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Absorb failures into the response (`true`) or let them propagate
    /// (`false`, raw mode)
    pub handle_errors: bool,
    /// Retry policy applied to retry signals
    pub retry_policy: RetryPolicy,
    /// Raw-mode re-raise policies by error kind
    pub reraise: ReRaiseRegistry,
}

impl PublisherConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(handle_errors: bool, retry_policy: RetryPolicy, reraise: ReRaiseRegistry) -> Self {
        Self {
            handle_errors,
            retry_policy,
            reraise,
        }
    }

    /// Select absorbed or raw mode
    #[must_use]
    pub fn with_handle_errors(mut self, handle_errors: bool) -> Self {
        self.handle_errors = handle_errors;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Register a re-raise policy for `kind`
    #[must_use]
    pub fn with_reraise(mut self, kind: ErrorKind, policy: Arc<dyn ReRaisePolicy>) -> Self {
        self.reraise.register(kind, policy);
        self
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            handle_errors: true,
            retry_policy: RetryPolicy::default(),
            reraise: ReRaiseRegistry::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use publisher_core::{DoNotReRaise, PublishError};

    #[test]
    fn test_default_config_absorbs_and_reraises_everything() {
        let config = PublisherConfig::default();

        assert!(config.handle_errors);
        assert_eq!(config.retry_policy, RetryPolicy::default());
        assert!(config.reraise.should_reraise(&PublishError::bad_request("x")));
    }

    #[test]
    fn test_with_reraise_registers_policy() {
        let config = PublisherConfig::default().with_reraise(ErrorKind::Redirect, Arc::new(DoNotReRaise));

        assert!(!config.reraise.should_reraise(&PublishError::redirect("/")));
        assert_eq!(config.reraise.kinds(), vec![ErrorKind::Redirect]);
    }
}
