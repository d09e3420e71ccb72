//! Error taxonomy for the publisher.
//!
//! Every hook returns [`PublishError`]. The publish loop treats
//! [`PublishError::Retry`] as a control-flow signal; every other variant is
//! "publication failed" and is routed to the exception hook.
//!
//! ```text
//! PublishError
//! ├── traversal failures   NotFound, DebugError
//! ├── BadRequest
//! ├── Redirect
//! ├── Retry                (optional original failure)
//! ├── Unauthorized
//! ├── Binding              (argument binding)
//! ├── NoPublication
//! └── Application          (anything a handler raised)
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used by hooks and callables.
pub type Result<T> = std::result::Result<T, PublishError>;

/// Failure raised while publishing a request.
///
/// The type is `Clone` so a response can hold a captured failure and surface
/// it any number of times.
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    /// The object we want to traverse to cannot be found.
    #[error("Object: {object}, name: {name:?}")]
    NotFound {
        /// Description of the object that was being traversed
        object: String,
        /// The name that could not be resolved
        name: String,
    },

    /// Traversal reached an object that must not be published.
    #[error("{message}")]
    DebugError {
        /// Description of the offending object
        object: String,
        /// Debug message
        message: String,
    },

    /// The request is malformed.
    #[error("{0}")]
    BadRequest(String),

    /// The client should be sent elsewhere.
    #[error("Location: {location}")]
    Redirect {
        /// Target location
        location: String,
        /// Whether the location may point outside the application
        trusted: bool,
    },

    /// Abandon this attempt and, if possible, start over on a fresh request.
    #[error("{}", retry_message(.original))]
    Retry {
        /// The failure that caused the retry, if any
        original: Option<Box<PublishError>>,
    },

    /// Access to a name was refused.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A resolved callable could not be invoked with the available arguments.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// The request has no publication to drive it.
    #[error("Request has no publication")]
    NoPublication,

    /// Any other failure raised by a handler or collaborator.
    #[error("{0}")]
    Application(Arc<anyhow::Error>),
}

fn plural(count: &usize) -> &'static str {
    if *count > 1 { "s" } else { "" }
}

fn retry_message(original: &Option<Box<PublishError>>) -> String {
    original
        .as_ref()
        .map_or_else(|| "None".to_string(), ToString::to_string)
}

impl PublishError {
    /// Build a [`PublishError::NotFound`].
    #[must_use]
    pub fn not_found(object: impl fmt::Debug, name: impl Into<String>) -> Self {
        Self::NotFound {
            object: format!("{object:?}"),
            name: name.into(),
        }
    }

    /// Build a [`PublishError::DebugError`].
    #[must_use]
    pub fn debug_error(object: impl fmt::Debug, message: impl Into<String>) -> Self {
        Self::DebugError {
            object: format!("{object:?}"),
            message: message.into(),
        }
    }

    /// Build a [`PublishError::BadRequest`].
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Build an untrusted [`PublishError::Redirect`].
    #[must_use]
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
            trusted: false,
        }
    }

    /// Build a [`PublishError::Retry`] wrapping the failure that caused it.
    #[must_use]
    pub fn retry(original: Option<Self>) -> Self {
        Self::Retry {
            original: original.map(Box::new),
        }
    }

    /// Build a [`PublishError::Application`] from a message.
    #[must_use]
    pub fn application(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self::Application(Arc::new(anyhow::Error::msg(message)))
    }

    /// The kind used for registry dispatch.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::DebugError { .. } => ErrorKind::DebugError,
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::Redirect { .. } => ErrorKind::Redirect,
            Self::Retry { .. } => ErrorKind::Retry,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Binding(_) => ErrorKind::Binding,
            Self::NoPublication => ErrorKind::NoPublication,
            Self::Application(_) => ErrorKind::Application,
        }
    }

    /// Whether this is a traversal failure.
    #[must_use]
    pub const fn is_traversal(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::DebugError { .. })
    }

    /// Whether this is the retry signal.
    #[must_use]
    pub const fn is_retry(&self) -> bool {
        matches!(self, Self::Retry { .. })
    }

    /// The failure wrapped by a retry signal.
    ///
    /// Returns `None` for non-retry errors and for a retry without an original.
    #[must_use]
    pub fn original(&self) -> Option<&Self> {
        match self {
            Self::Retry { original } => original.as_deref(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for PublishError {
    fn from(err: anyhow::Error) -> Self {
        Self::Application(Arc::new(err))
    }
}

/// Discriminant of [`PublishError`], the key of the dispatch registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// [`PublishError::NotFound`]
    NotFound,
    /// [`PublishError::DebugError`]
    DebugError,
    /// [`PublishError::BadRequest`]
    BadRequest,
    /// [`PublishError::Redirect`]
    Redirect,
    /// [`PublishError::Retry`]
    Retry,
    /// [`PublishError::Unauthorized`]
    Unauthorized,
    /// [`PublishError::Binding`]
    Binding,
    /// [`PublishError::NoPublication`]
    NoPublication,
    /// [`PublishError::Application`]
    Application,
}

impl ErrorKind {
    /// Stable label, used for metrics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::DebugError => "debug_error",
            Self::BadRequest => "bad_request",
            Self::Redirect => "redirect",
            Self::Retry => "retry",
            Self::Unauthorized => "unauthorized",
            Self::Binding => "binding",
            Self::NoPublication => "no_publication",
            Self::Application => "application",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to bind a callable's parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// More positional values than declared parameters.
    #[error("{callable}() takes at most {max} argument{} ({given} given)", plural(.max))]
    TooManyArguments {
        /// Name of the callable
        callable: String,
        /// Maximum accepted, counting a bound receiver
        max: usize,
        /// Number supplied, counting a bound receiver
        given: usize,
    },

    /// A required parameter had no value.
    #[error("Missing argument to {callable}(): {parameter}")]
    MissingArgument {
        /// Name of the callable
        callable: String,
        /// First unsatisfied parameter
        parameter: String,
    },

    /// The object cannot be called at all.
    #[error("mapply() can not call {0}")]
    NotCallable(String),

    /// Wrapper layers were not exhausted within the unwrap limit.
    #[error("couldn't find callable metadata, mapply() error on {0}")]
    NoMetadata(String),

    /// A signature was declared inconsistently.
    #[error("invalid signature for {callable}(): {reason}")]
    InvalidSignature {
        /// Name of the callable
        callable: String,
        /// What is wrong with it
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_retry_display_uses_original() {
        let retry = PublishError::retry(Some(PublishError::bad_request("nope")));
        assert_eq!(retry.to_string(), "nope");
        assert_eq!(PublishError::retry(None).to_string(), "None");
    }

    #[test]
    fn test_traversal_branch() {
        assert!(PublishError::not_found("root", "x").is_traversal());
        assert!(PublishError::debug_error("root", "no doc").is_traversal());
        assert!(!PublishError::bad_request("x").is_traversal());
        assert!(!PublishError::retry(None).is_traversal());
    }

    #[test]
    fn test_arity_message_pluralises() {
        let err = BindingError::TooManyArguments {
            callable: "f".into(),
            max: 2,
            given: 3,
        };
        assert_eq!(err.to_string(), "f() takes at most 2 arguments (3 given)");

        let err = BindingError::TooManyArguments {
            callable: "g".into(),
            max: 1,
            given: 2,
        };
        assert_eq!(err.to_string(), "g() takes at most 1 argument (2 given)");
    }

    #[test]
    fn test_kind_labels_match_serde_names() {
        for kind in [ErrorKind::DebugError, ErrorKind::NotFound, ErrorKind::NoPublication] {
            let encoded = serde_json::to_value(kind).unwrap();
            assert_eq!(encoded, serde_json::Value::String(kind.as_str().to_string()));
        }
    }

    #[test]
    fn test_anyhow_converts_to_application() {
        let err: PublishError = anyhow::anyhow!("boom").into();
        assert_eq!(err.kind(), ErrorKind::Application);
        assert_eq!(err.to_string(), "boom");
    }
}
