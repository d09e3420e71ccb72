//! Callables that the publisher can invoke.
//!
//! A handler declares its parameter names up front in a [`Signature`]. The
//! binder ([`crate::mapply`]) uses those names as lookup keys into the
//! request, so handlers never have to accept an opaque request object.
//!
//! Three shapes are provided:
//!
//! - [`Function`]: a terminal callable with a signature and a body
//! - [`Method`]: a callable bound to a receiver, which fills its first parameter
//! - [`Proxy`]: a transparent wrapper (security, location) around another callable
//!
//! Wrappers expose their next layer through [`Callable::unwrap_layer`]; only
//! terminal callables expose a [`Signature`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{BindingError, Result};
use crate::mapply::ArgumentSource;
use crate::object::Object;

/// A bound argument handed to a callable.
#[derive(Clone)]
pub enum Argument<'a> {
    /// A plain value (positional, looked up, or defaulted)
    Value(Value),
    /// An object, such as the receiver of a method
    Object(Object),
    /// The fallback source itself, injected for the `REQUEST` parameter
    Source(&'a dyn ArgumentSource),
}

impl<'a> Argument<'a> {
    /// The plain value, if this argument is one.
    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The string value, if this argument is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    /// The object, if this argument is one.
    #[must_use]
    pub const fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The injected fallback source, if this argument is one.
    #[must_use]
    pub fn as_source(&self) -> Option<&'a dyn ArgumentSource> {
        match self {
            Self::Source(source) => Some(*source),
            _ => None,
        }
    }
}

impl fmt::Debug for Argument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Object(object) => f.debug_tuple("Object").field(object).finish(),
            Self::Source(_) => write!(f, "Source(<request>)"),
        }
    }
}

/// One step inward from a wrapper.
#[derive(Clone)]
pub enum Layer {
    /// A transparent wrapper; the inner callable has the same parameters.
    Transparent(Arc<dyn Callable>),
    /// A binding; the inner callable's first parameter is already satisfied.
    Bound(Arc<dyn Callable>),
}

/// Something the publisher can call.
pub trait Callable: Send + Sync {
    /// Name used in binding errors and logs.
    fn name(&self) -> &str;

    /// Declared parameters. `None` for wrappers.
    fn signature(&self) -> Option<&Signature> {
        None
    }

    /// The next layer inward. `None` for terminal callables.
    fn unwrap_layer(&self) -> Option<Layer> {
        None
    }

    /// Documentation string, consulted by publications that require one.
    fn doc(&self) -> Option<&str> {
        None
    }

    /// Invoke with fully bound arguments.
    ///
    /// # Errors
    ///
    /// Whatever the callable raises; the binder propagates it unchanged.
    fn call(&self, args: &[Argument<'_>]) -> Result<Value>;
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    default: Option<Value>,
}

impl Parameter {
    /// A parameter that must be supplied.
    #[must_use]
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// A parameter with a default value.
    #[must_use]
    pub fn optional(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
        }
    }

    /// Parameter name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<&str> for Parameter {
    fn from(name: &str) -> Self {
        Self::required(name)
    }
}

impl From<String> for Parameter {
    fn from(name: String) -> Self {
        Self::required(name)
    }
}

/// The ordered parameter list of a callable.
///
/// Defaults are aligned to the trailing parameters. A signature is validated
/// when it is built: names are unique and no required parameter follows an
/// optional one.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    name: String,
    parameters: Vec<String>,
    defaults: Vec<Value>,
}

impl Signature {
    /// Build and validate a signature.
    ///
    /// # Errors
    ///
    /// [`BindingError::InvalidSignature`] on duplicate names or on a required
    /// parameter declared after an optional one.
    pub fn new<P>(name: impl Into<String>, parameters: impl IntoIterator<Item = P>) -> std::result::Result<Self, BindingError>
    where
        P: Into<Parameter>,
    {
        let name = name.into();
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        let mut defaults = Vec::new();

        for parameter in parameters {
            let Parameter {
                name: parameter,
                default,
            } = parameter.into();

            if !seen.insert(parameter.clone()) {
                return Err(BindingError::InvalidSignature {
                    callable: name,
                    reason: format!("duplicate parameter '{parameter}'"),
                });
            }

            match default {
                Some(value) => defaults.push(value),
                None if !defaults.is_empty() => {
                    return Err(BindingError::InvalidSignature {
                        callable: name,
                        reason: format!("required parameter '{parameter}' follows an optional one"),
                    });
                }
                None => {}
            }
            names.push(parameter);
        }

        Ok(Self {
            name,
            parameters: names,
            defaults,
        })
    }

    /// Callable name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All parameter names, in declaration order.
    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Default values of the trailing optional parameters.
    #[must_use]
    pub fn defaults(&self) -> &[Value] {
        &self.defaults
    }
}

type Body = dyn Fn(&[Argument<'_>]) -> Result<Value> + Send + Sync;

/// A terminal callable: a signature plus a body.
pub struct Function {
    signature: Signature,
    doc: Option<String>,
    body: Box<Body>,
}

impl Function {
    /// Create a function from its signature and body.
    #[must_use]
    pub fn new<F>(signature: Signature, body: F) -> Self
    where
        F: Fn(&[Argument<'_>]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            signature,
            doc: None,
            body: Box::new(body),
        }
    }

    /// Attach a documentation string.
    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("signature", &self.signature)
            .field("doc", &self.doc)
            .finish_non_exhaustive()
    }
}

impl Callable for Function {
    fn name(&self) -> &str {
        self.signature.name()
    }

    fn signature(&self) -> Option<&Signature> {
        Some(&self.signature)
    }

    fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    fn call(&self, args: &[Argument<'_>]) -> Result<Value> {
        (self.body)(args)
    }
}

/// A callable bound to a receiver.
///
/// The receiver is passed as the first argument of the inner callable.
pub struct Method {
    receiver: Object,
    function: Arc<dyn Callable>,
}

impl Method {
    /// Bind `function` to `receiver`.
    #[must_use]
    pub fn new(receiver: Object, function: Arc<dyn Callable>) -> Self {
        Self { receiver, function }
    }

    /// The bound receiver
    #[must_use]
    pub const fn receiver(&self) -> &Object {
        &self.receiver
    }
}

impl Callable for Method {
    fn name(&self) -> &str {
        self.function.name()
    }

    fn unwrap_layer(&self) -> Option<Layer> {
        Some(Layer::Bound(Arc::clone(&self.function)))
    }

    fn doc(&self) -> Option<&str> {
        self.function.doc()
    }

    fn call(&self, args: &[Argument<'_>]) -> Result<Value> {
        let mut bound = Vec::with_capacity(args.len() + 1);
        bound.push(Argument::Object(self.receiver.clone()));
        bound.extend(args.iter().cloned());
        self.function.call(&bound)
    }
}

/// A transparent wrapper that hides the real signature.
pub struct Proxy {
    label: String,
    inner: Arc<dyn Callable>,
}

impl Proxy {
    /// Wrap `inner`; `label` names the kind of wrapper (for logs).
    #[must_use]
    pub fn new(label: impl Into<String>, inner: Arc<dyn Callable>) -> Self {
        Self {
            label: label.into(),
            inner,
        }
    }

    /// Kind of wrapper
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Callable for Proxy {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn unwrap_layer(&self) -> Option<Layer> {
        Some(Layer::Transparent(Arc::clone(&self.inner)))
    }

    fn doc(&self) -> Option<&str> {
        self.inner.doc()
    }

    fn call(&self, args: &[Argument<'_>]) -> Result<Value> {
        self.inner.call(args)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn test_signature_rejects_duplicates() {
        let err = Signature::new("f", ["a", "a"]).unwrap_err();
        assert!(matches!(err, BindingError::InvalidSignature { .. }));
    }

    #[test]
    fn test_signature_rejects_required_after_optional() {
        let err = Signature::new(
            "f",
            [Parameter::optional("a", 1), Parameter::required("b")],
        )
        .unwrap_err();
        assert!(err.to_string().contains("'b' follows an optional one"));
    }

    #[test]
    fn test_signature_aligns_defaults_to_tail() {
        let sig = Signature::new(
            "f",
            [
                Parameter::required("a"),
                Parameter::optional("b", 2),
                Parameter::optional("c", "three"),
            ],
        )
        .unwrap();
        assert_eq!(sig.parameters(), ["a", "b", "c"]);
        assert_eq!(sig.defaults(), [json!(2), json!("three")]);
    }

    #[test]
    fn test_method_prepends_receiver() {
        let sig = Signature::new("who", ["this"]).unwrap();
        let function: Arc<dyn Callable> = Arc::new(Function::new(sig, |args| {
            let receiver = args[0].as_object().unwrap();
            Ok(json!(format!("{receiver:?}")))
        }));
        let method = Method::new(Object::Value(json!("me")), function);

        assert_eq!(method.call(&[]).unwrap(), json!("\"me\""));
        assert!(matches!(method.unwrap_layer(), Some(Layer::Bound(_))));
    }

    #[test]
    fn test_proxy_forwards_call_and_doc() {
        let sig = Signature::new("hello", Vec::<Parameter>::new()).unwrap();
        let function = Function::new(sig, |_| Ok(json!("hi"))).with_doc("Says hi");
        let proxy = Proxy::new("security", Arc::new(function));

        assert_eq!(proxy.name(), "hello");
        assert_eq!(proxy.doc(), Some("Says hi"));
        assert!(proxy.signature().is_none());
        assert_eq!(proxy.call(&[]).unwrap(), json!("hi"));
    }
}
