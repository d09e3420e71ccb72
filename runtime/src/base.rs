//! Base request and response.
//!
//! [`BaseRequest`] implements the generic parts of [`Request`]: an
//! environment mapping, positional arguments, the traversal stack, held
//! objects and retry bookkeeping. Protocol adapters wrap it and add their own
//! parsing.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use publisher_core::{
    ArgumentSource, Held, Object, Publication, PublishError, Request, Response, Result, Value,
};

use crate::path::{TraversalStack, clean_path};

/// Request environment: name to value.
pub type Environment = BTreeMap<String, Value>;

/// Response that renders failures as text into its result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseResponse {
    result: Option<Value>,
    internal_error: bool,
}

impl BaseResponse {
    /// Create an empty response.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            result: None,
            internal_error: false,
        }
    }

    /// The stored result
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Whether the exception hook itself failed
    #[must_use]
    pub const fn is_internal_error(&self) -> bool {
        self.internal_error
    }
}

impl Response for BaseResponse {
    fn set_result(&mut self, result: Value) {
        self.result = Some(result);
    }

    fn handle_exception(&mut self, error: &PublishError) {
        self.result = Some(Value::String(format!("{}: {error}", error.kind())));
    }

    fn internal_error(&mut self) {
        tracing::error!("Response marked as internal error");
        self.internal_error = true;
    }

    fn reset(&mut self) {
        self.result = None;
    }

    fn retry(&self) -> Box<dyn Response> {
        Box::new(Self::new())
    }

    fn get_result(&self) -> Result<Option<Value>> {
        Ok(self.result.clone())
    }
}

/// Generic request.
pub struct BaseRequest {
    environment: Environment,
    body: Option<Vec<u8>>,
    positional: Vec<Value>,
    response: Box<dyn Response>,
    traversal_stack: TraversalStack,
    initial_stack: TraversalStack,
    traversed_names: Vec<String>,
    last_traversed: Option<Object>,
    principal: Option<String>,
    publication: Option<Arc<dyn Publication>>,
    held: Vec<Box<dyn Held>>,
    retry_count: usize,
    max_retries: usize,
    ends_with_slash: bool,
    closed: bool,
}

impl BaseRequest {
    /// Create a request over `environment`, answered by a [`BaseResponse`].
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            body: Some(Vec::new()),
            positional: Vec::new(),
            response: Box::new(BaseResponse::new()),
            traversal_stack: TraversalStack::new(),
            initial_stack: TraversalStack::new(),
            traversed_names: Vec::new(),
            last_traversed: None,
            principal: None,
            publication: None,
            held: Vec::new(),
            retry_count: 0,
            max_retries: 0,
            ends_with_slash: false,
            closed: false,
        }
    }

    /// Set the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Use a protocol-specific response.
    #[must_use]
    pub fn with_response(mut self, response: Box<dyn Response>) -> Self {
        self.response = response;
        self
    }

    /// Set the positional arguments for the published callable.
    #[must_use]
    pub fn with_positional(mut self, positional: Vec<Value>) -> Self {
        self.positional = positional;
        self
    }

    /// Allow up to `max_retries` fresh attempts.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Attach a publication.
    #[must_use]
    pub fn with_publication(mut self, publication: Arc<dyn Publication>) -> Self {
        self.publication = Some(publication);
        self
    }

    /// Seed the traversal stack, last-to-first. Retries start from it.
    #[must_use]
    pub fn with_traversal_stack<I>(mut self, stack: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.traversal_stack = stack.into_iter().collect();
        self.initial_stack.clone_from(&self.traversal_stack);
        self
    }

    /// Build the traversal stack from the path stored under `key`.
    ///
    /// A missing or non-string entry is treated as `/`.
    pub fn setup_path(&mut self, key: &str) {
        let path = self
            .environment
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("/");
        let clean = clean_path(path);
        self.ends_with_slash = clean.ends_with_slash;
        self.initial_stack.clone_from(&clean.stack);
        self.traversal_stack = clean.stack;
    }

    /// Value of an environment entry
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.environment.get(name)
    }

    /// Environment keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.environment.keys().map(String::as_str)
    }

    /// The request environment
    #[must_use]
    pub const fn environment(&self) -> &Environment {
        &self.environment
    }

    /// The request body, until the request is closed.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Names popped from the traversal stack so far.
    #[must_use]
    pub fn traversed_names(&self) -> &[String] {
        &self.traversed_names
    }

    /// The object traversal reached last.
    #[must_use]
    pub const fn last_traversed(&self) -> Option<&Object> {
        self.last_traversed.as_ref()
    }

    /// Whether the path ended with `/`.
    #[must_use]
    pub const fn ends_with_slash(&self) -> bool {
        self.ends_with_slash
    }

    /// How many times this request's lineage was retried.
    #[must_use]
    pub const fn retry_count(&self) -> usize {
        self.retry_count
    }

    /// Whether [`Request::close`] has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

impl fmt::Debug for BaseRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseRequest")
            .field("environment", &self.environment)
            .field("traversal_stack", &self.traversal_stack)
            .field("traversed_names", &self.traversed_names)
            .field("principal", &self.principal)
            .field("held", &self.held.len())
            .field("retry_count", &self.retry_count)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl ArgumentSource for BaseRequest {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.environment.get(name).cloned()
    }
}

impl Request for BaseRequest {
    fn process_inputs(&mut self) -> Result<()> {
        self.initial_stack.clone_from(&self.traversal_stack);
        Ok(())
    }

    fn response(&self) -> &dyn Response {
        self.response.as_ref()
    }

    fn response_mut(&mut self) -> &mut dyn Response {
        self.response.as_mut()
    }

    fn traverse(&mut self, root: Object) -> Result<Object> {
        let publication = self.publication.clone().ok_or(PublishError::NoPublication)?;
        let mut object = root;
        let mut previous: Option<Object> = None;

        loop {
            self.last_traversed = Some(object.clone());

            // Hooks run at most once per object.
            if !previous.as_ref().is_some_and(|prev| prev.is_same(&object)) {
                publication.call_traversal_hooks(self, &object)?;
            }

            let Some(name) = self.traversal_stack.pop() else {
                break;
            };

            tracing::trace!(name = %name, "Traversing");
            self.traversed_names.push(name.clone());
            let next = publication.traverse_name(self, &object, &name)?;
            previous = Some(std::mem::replace(&mut object, next));
        }

        Ok(object)
    }

    fn traversal_stack(&self) -> Vec<String> {
        self.traversal_stack.to_vec()
    }

    fn set_traversal_stack(&mut self, stack: Vec<String>) {
        self.traversal_stack = TraversalStack::from_vec(stack);
    }

    fn positional_arguments(&self) -> &[Value] {
        &self.positional
    }

    fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    fn set_principal(&mut self, principal: Option<String>) {
        self.principal = principal;
    }

    fn supports_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    fn retry(&self) -> Result<Self> {
        if self.closed {
            return Err(PublishError::application("Cannot retry a closed request"));
        }

        Ok(Self {
            environment: self.environment.clone(),
            body: self.body.clone(),
            positional: self.positional.clone(),
            response: self.response.retry(),
            traversal_stack: self.initial_stack.clone(),
            initial_stack: self.initial_stack.clone(),
            traversed_names: Vec::new(),
            last_traversed: None,
            principal: None,
            publication: self.publication.clone(),
            held: Vec::new(),
            retry_count: self.retry_count + 1,
            max_retries: self.max_retries,
            ends_with_slash: self.ends_with_slash,
            closed: false,
        })
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }

        let held = std::mem::take(&mut self.held);
        tracing::debug!(held = held.len(), "Closing request");
        for mut object in held {
            object.release();
        }

        self.body = None;
        self.publication = None;
        self.closed = true;
    }

    fn hold(&mut self, mut held: Box<dyn Held>) {
        if self.closed {
            tracing::warn!("Hold on a closed request, releasing immediately");
            held.release();
            return;
        }
        self.held.push(held);
    }

    fn publication(&self) -> Option<Arc<dyn Publication>> {
        self.publication.clone()
    }

    fn set_publication(&mut self, publication: Arc<dyn Publication>) {
        self.publication = Some(publication);
    }

    fn as_argument_source(&self) -> &dyn ArgumentSource {
        self
    }
}
