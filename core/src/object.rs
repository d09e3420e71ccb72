//! Objects reachable by traversal.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::callable::{Callable, Function, Layer};
use crate::mapply::MAX_UNWRAP_DEPTH;

/// A node in the published object graph.
///
/// Shared nodes are reference counted, so cloning an `Object` is cheap and
/// keeps its identity (see [`Object::is_same`]).
#[derive(Clone)]
pub enum Object {
    /// Plain data
    Value(Value),
    /// A container of named children
    Folder(Arc<Folder>),
    /// Something that can be called
    Callable(Arc<dyn Callable>),
}

impl Object {
    /// Wrap a callable.
    #[must_use]
    pub fn callable(callable: impl Callable + 'static) -> Self {
        Self::Callable(Arc::new(callable))
    }

    /// Documentation string, if the object carries one.
    #[must_use]
    pub fn doc(&self) -> Option<&str> {
        match self {
            Self::Value(_) => None,
            Self::Folder(folder) => folder.doc.as_deref(),
            Self::Callable(callable) => callable.doc(),
        }
    }

    /// The callable, if this object is one.
    #[must_use]
    pub const fn as_callable(&self) -> Option<&Arc<dyn Callable>> {
        match self {
            Self::Callable(callable) => Some(callable),
            _ => None,
        }
    }

    /// Look up a direct child by name.
    ///
    /// Folders look up their children, JSON objects their keys and JSON
    /// arrays their indices. Callables have no children.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<Self> {
        match self {
            Self::Folder(folder) => folder.children.get(name).cloned(),
            Self::Value(Value::Object(map)) => map.get(name).cloned().map(Self::Value),
            Self::Value(Value::Array(items)) => name
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .cloned()
                .map(Self::Value),
            Self::Value(_) | Self::Callable(_) => None,
        }
    }

    /// Identity comparison.
    ///
    /// Shared nodes compare by pointer after transparent wrappers are
    /// removed; plain values compare by equality.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Folder(a), Self::Folder(b)) => Arc::ptr_eq(a, b),
            (Self::Callable(a), Self::Callable(b)) => {
                let a = remove_proxies(a);
                let b = remove_proxies(b);
                std::ptr::addr_eq(Arc::as_ptr(&a), Arc::as_ptr(&b))
            }
            _ => false,
        }
    }
}

/// Strip transparent wrappers, stopping at bindings and terminal callables.
fn remove_proxies(callable: &Arc<dyn Callable>) -> Arc<dyn Callable> {
    let mut current = Arc::clone(callable);
    for _ in 0..MAX_UNWRAP_DEPTH {
        match current.unwrap_layer() {
            Some(Layer::Transparent(inner)) => current = inner,
            _ => break,
        }
    }
    current
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value}"),
            Self::Folder(folder) => write!(f, "<Folder {}>", folder.name),
            Self::Callable(callable) => write!(f, "<callable {}>", callable.name()),
        }
    }
}

impl From<Value> for Object {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Folder> for Object {
    fn from(folder: Folder) -> Self {
        Self::Folder(Arc::new(folder))
    }
}

impl From<Function> for Object {
    fn from(function: Function) -> Self {
        Self::callable(function)
    }
}

/// A named container.
#[derive(Debug, Clone, Default)]
pub struct Folder {
    name: String,
    doc: Option<String>,
    children: BTreeMap<String, Object>,
}

impl Folder {
    /// Create an empty folder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            children: BTreeMap::new(),
        }
    }

    /// Attach a documentation string.
    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Add a child.
    #[must_use]
    pub fn with_child(mut self, name: impl Into<String>, child: impl Into<Object>) -> Self {
        self.children.insert(name.into(), child.into());
        self
    }

    /// Folder name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }
}
