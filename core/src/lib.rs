//! # Publisher Core
//!
//! Core traits and types for publishing a request through a fixed lifecycle,
//! independent of the wire protocol that produced it.
//!
//! ## Core Concepts
//!
//! - **Request**: protocol-neutral request state, owning its response and a
//!   traversal stack
//! - **Publication**: the nine lifecycle hooks that parameterize one request
//! - **Object**: what traversal walks over and what finally gets called
//! - **mapply**: binds a callable's declared parameters from positional
//!   values and the request
//! - **PublishError**: the failure taxonomy the publish loop reacts to
//!
//! The loop that drives these lives in the runtime crate.
//!
//! ## Example
//!
//! ```
//! use publisher_core::{mapply, signature, Function, Object, Value};
//! use std::collections::HashMap;
//!
//! let add = Object::from(Function::new(signature!(add(a, b = 1)).unwrap(), |args| {
//!     let a = args[0].as_value().and_then(Value::as_i64).unwrap_or(0);
//!     let b = args[1].as_value().and_then(Value::as_i64).unwrap_or(0);
//!     Ok(Value::from(a + b))
//! }));
//!
//! let mut form = HashMap::new();
//! form.insert("a".to_string(), Value::from(41));
//!
//! assert_eq!(mapply(&add, &[], &form).unwrap(), Value::from(42));
//! ```

pub use serde_json::Value;

/// Failure taxonomy
pub mod error;

/// Callables and their signatures
pub mod callable;

/// The published object graph
pub mod object;

/// Argument binding
pub mod mapply;

/// Request, response and held-resource contracts
pub mod request;

/// Lifecycle hooks
pub mod publication;

/// Dispatch tables keyed by error kind
pub mod registry;

mod signature_macros;

pub use callable::{Argument, Callable, Function, Layer, Method, Parameter, Proxy, Signature};
pub use error::{BindingError, ErrorKind, PublishError, Result};
pub use mapply::{bind, mapply, ArgumentSource, MAX_UNWRAP_DEPTH, REQUEST_PARAMETER};
pub use object::{Folder, Object};
pub use publication::{CallResult, Publication};
pub use registry::{
    DoNotReRaise, ExceptionSideEffects, KindRegistry, ReRaisePolicy, ReRaiseRegistry,
    SideEffectsRegistry,
};
pub use request::{Held, Request, Response};
