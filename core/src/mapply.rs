//! Argument binding ("mapply").
//!
//! Binds a callable's declared parameters from an explicit list of positional
//! values and a name-keyed fallback source (normally the request):
//!
//! 1. Strip wrapper layers until a [`Signature`] is found (at most
//!    [`MAX_UNWRAP_DEPTH`] layers). Each [`Layer::Bound`] layer satisfies one
//!    leading parameter.
//! 2. Reject more positional values than remaining parameters.
//! 3. Fill each remaining parameter from the source by name, else inject the
//!    source itself for [`REQUEST_PARAMETER`], else use its default, else fail.
//! 4. Call the outermost callable with the assembled arguments.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

use crate::callable::{Argument, Callable, Layer, Signature};
use crate::error::{BindingError, Result};
use crate::object::Object;

/// Maximum number of wrapper layers removed before giving up.
pub const MAX_UNWRAP_DEPTH: usize = 10;

/// Parameter name that receives the fallback source itself.
pub const REQUEST_PARAMETER: &str = "REQUEST";

/// A name-keyed source of argument values.
pub trait ArgumentSource {
    /// Value stored under `name`, if any.
    fn lookup(&self, name: &str) -> Option<Value>;
}

impl ArgumentSource for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl ArgumentSource for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl ArgumentSource for serde_json::Map<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Call `target` with arguments bound from `positional` and `source`.
///
/// # Errors
///
/// A [`BindingError`] if `target` is not callable or its parameters cannot be
/// satisfied; otherwise whatever the callable itself returns.
pub fn mapply(target: &Object, positional: &[Value], source: &dyn ArgumentSource) -> Result<Value> {
    let Some(callable) = target.as_callable() else {
        return Err(BindingError::NotCallable(format!("{target:?}")).into());
    };
    let args = bind(callable, positional, source)?;
    tracing::trace!(callable = callable.name(), args = args.len(), "Calling published object");
    callable.call(&args)
}

/// Bind arguments for `callable` without calling it.
///
/// # Errors
///
/// See [`mapply`].
pub fn bind<'a>(
    callable: &Arc<dyn Callable>,
    positional: &[Value],
    source: &'a dyn ArgumentSource,
) -> std::result::Result<Vec<Argument<'a>>, BindingError> {
    let (signature, bound) = resolve(callable)?;

    let names = signature.parameters().get(bound..).unwrap_or_default();
    // Defaults belong to the trailing parameters; drop those of bound ones.
    let all_defaults = signature.defaults();
    let defaults = &all_defaults[all_defaults.len().saturating_sub(names.len())..];
    let required = names.len() - defaults.len();

    if positional.len() > names.len() {
        return Err(BindingError::TooManyArguments {
            callable: signature.name().to_string(),
            max: signature.parameters().len(),
            given: positional.len() + bound,
        });
    }

    let mut args: Vec<Argument<'a>> = positional.iter().cloned().map(Argument::Value).collect();

    for (index, name) in names.iter().enumerate().skip(positional.len()) {
        let arg = match source.lookup(name) {
            Some(value) => Argument::Value(value),
            None if name == REQUEST_PARAMETER => Argument::Source(source),
            None if index < required => {
                return Err(BindingError::MissingArgument {
                    callable: signature.name().to_string(),
                    parameter: name.clone(),
                });
            }
            None => match defaults.get(index - required) {
                Some(default) => Argument::Value(default.clone()),
                None => {
                    return Err(BindingError::MissingArgument {
                        callable: signature.name().to_string(),
                        parameter: name.clone(),
                    });
                }
            },
        };
        args.push(arg);
    }

    Ok(args)
}

/// Walk wrapper layers down to a signature, counting bound layers.
fn resolve(callable: &Arc<dyn Callable>) -> std::result::Result<(Signature, usize), BindingError> {
    let mut current = Arc::clone(callable);
    let mut bound = 0;

    for _ in 0..MAX_UNWRAP_DEPTH {
        if let Some(signature) = current.signature() {
            return Ok((signature.clone(), bound));
        }
        match current.unwrap_layer() {
            Some(Layer::Transparent(inner)) => current = inner,
            Some(Layer::Bound(inner)) => {
                bound += 1;
                current = inner;
            }
            None => return Err(BindingError::NotCallable(callable.name().to_string())),
        }
    }

    Err(BindingError::NoMetadata(callable.name().to_string()))
}
