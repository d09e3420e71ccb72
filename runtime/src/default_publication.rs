//! A stock publication over an object graph.
//!
//! Rejects names starting with `_`, resolves children through
//! [`Object::child`], refuses to publish undocumented objects, and calls the
//! target through [`mapply`]. Both refusals can be switched off.

use std::sync::Arc;

use publisher_core::{
    CallResult, ErrorKind, ExceptionSideEffects, Object, Publication, PublishError, Request, Result,
    SideEffectsRegistry, mapply,
};

/// Publication that serves a fixed application root.
#[derive(Clone)]
pub struct DefaultPublication {
    app: Object,
    require_docstrings: bool,
    check_private_names: bool,
    side_effects: SideEffectsRegistry,
}

impl DefaultPublication {
    /// Publish `app`.
    #[must_use]
    pub fn new(app: impl Into<Object>) -> Self {
        Self {
            app: app.into(),
            require_docstrings: true,
            check_private_names: true,
            side_effects: SideEffectsRegistry::new(),
        }
    }

    /// Whether traversal refuses objects without a documentation string.
    #[must_use]
    pub fn require_docstrings(mut self, require: bool) -> Self {
        self.require_docstrings = require;
        self
    }

    /// Whether traversal refuses names starting with `_`.
    ///
    /// Turn both checks off for a publication that serves test fixtures.
    #[must_use]
    pub fn check_private_names(mut self, check: bool) -> Self {
        self.check_private_names = check;
        self
    }

    /// Register side effects applied when a failure of `kind` is handled.
    #[must_use]
    pub fn with_side_effects(
        mut self,
        kind: ErrorKind,
        effects: Arc<dyn ExceptionSideEffects>,
    ) -> Self {
        self.side_effects.register(kind, effects);
        self
    }

    /// The application root
    #[must_use]
    pub const fn app(&self) -> &Object {
        &self.app
    }
}

impl std::fmt::Debug for DefaultPublication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultPublication")
            .field("app", &self.app)
            .field("require_docstrings", &self.require_docstrings)
            .field("check_private_names", &self.check_private_names)
            .field("side_effects", &self.side_effects)
            .finish()
    }
}

impl Publication for DefaultPublication {
    fn before_traversal(&self, request: &mut dyn Request) -> Result<()> {
        // The stack is stored last-to-first.
        let mut stack = request.traversal_stack();
        while stack.last().is_some_and(String::is_empty) {
            stack.pop();
        }
        let leading = stack.iter().take_while(|name| name.is_empty()).count();
        stack.drain(..leading);
        request.set_traversal_stack(stack);
        Ok(())
    }

    fn get_application(&self, _request: &mut dyn Request) -> Result<Object> {
        Ok(self.app.clone())
    }

    fn call_traversal_hooks(&self, _request: &mut dyn Request, _object: &Object) -> Result<()> {
        Ok(())
    }

    fn traverse_name(&self, _request: &mut dyn Request, object: &Object, name: &str) -> Result<Object> {
        if self.check_private_names && name.starts_with('_') {
            return Err(PublishError::Unauthorized(name.to_string()));
        }

        let child = object
            .child(name)
            .ok_or_else(|| PublishError::not_found(object, name))?;

        if self.require_docstrings && child.doc().is_none_or(str::is_empty) {
            return Err(PublishError::debug_error(&child, "Missing or empty doc string"));
        }

        Ok(child)
    }

    fn after_traversal(&self, _request: &mut dyn Request, _object: &Object) -> Result<()> {
        Ok(())
    }

    fn call_object(&self, request: &mut dyn Request, object: &Object) -> Result<CallResult> {
        let result = mapply(
            object,
            request.positional_arguments(),
            request.as_argument_source(),
        )?;
        Ok(CallResult::Value(result))
    }

    fn after_call(&self, _request: &mut dyn Request, _object: &Object) -> Result<()> {
        Ok(())
    }

    fn handle_exception(
        &self,
        object: Option<&Object>,
        request: &mut dyn Request,
        error: &PublishError,
        _retry_allowed: bool,
    ) -> Result<()> {
        self.side_effects.apply(object, request, error);

        let response = request.response_mut();
        response.reset();
        response.handle_exception(error);
        Ok(())
    }

    fn end_request(&self, _request: &mut dyn Request, _object: Option<&Object>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::base::{BaseRequest, Environment};
    use publisher_core::{Folder, Function, Signature, Value};
    use serde_json::json;

    fn app() -> Object {
        let hello = Function::new(Signature::new("hello", ["name"]).unwrap(), |args| {
            Ok(json!(format!("Hello, {}", args[0].as_str().unwrap_or("?"))))
        })
        .with_doc("Greets someone");
        let bare = Function::new(Signature::new("bare", Vec::<&str>::new()).unwrap(), |_| {
            Ok(json!("bare"))
        });

        Folder::new("root")
            .with_doc("Root")
            .with_child("hello", hello)
            .with_child("bare", bare)
            .with_child("_secret", json!("hidden"))
            .into()
    }

    fn request() -> BaseRequest {
        let mut environment = Environment::new();
        environment.insert("name".into(), json!("bob"));
        BaseRequest::new(environment)
    }

    #[test]
    fn test_before_traversal_trims_empty_names() {
        let publication = DefaultPublication::new(app());
        let mut request = request();
        request.set_traversal_stack(vec![String::new(), "b".into(), "a".into(), String::new()]);

        publication.before_traversal(&mut request).unwrap();

        assert_eq!(request.traversal_stack(), vec!["b", "a"]);
    }

    #[test]
    fn test_private_names_are_unauthorized() {
        let publication = DefaultPublication::new(app());
        let err = publication
            .traverse_name(&mut request(), &app(), "_secret")
            .unwrap_err();
        assert!(matches!(err, PublishError::Unauthorized(ref name) if name == "_secret"));
    }

    #[test]
    fn test_private_names_are_served_when_unchecked() {
        let publication = DefaultPublication::new(app())
            .check_private_names(false)
            .require_docstrings(false);

        let child = publication
            .traverse_name(&mut request(), &app(), "_secret")
            .unwrap();

        assert!(child.is_same(&Object::Value(json!("hidden"))));
    }

    #[test]
    fn test_missing_children_are_not_found() {
        let publication = DefaultPublication::new(app());
        let err = publication
            .traverse_name(&mut request(), &app(), "nope")
            .unwrap_err();
        assert_eq!(err.to_string(), "Object: <Folder root>, name: \"nope\"");
    }

    #[test]
    fn test_undocumented_objects_are_refused_unless_allowed() {
        let strict = DefaultPublication::new(app());
        let err = strict.traverse_name(&mut request(), &app(), "bare").unwrap_err();
        assert!(matches!(err, PublishError::DebugError { ref message, .. } if message == "Missing or empty doc string"));

        let lenient = DefaultPublication::new(app()).require_docstrings(false);
        assert!(lenient.traverse_name(&mut request(), &app(), "bare").is_ok());
    }

    #[test]
    fn test_call_object_binds_from_request() {
        let publication = DefaultPublication::new(app());
        let target = app().child("hello").unwrap();

        let result = publication.call_object(&mut request(), &target).unwrap();

        assert_eq!(result, CallResult::Value(Value::from("Hello, bob")));
    }

    #[test]
    fn test_handle_exception_resets_and_renders() {
        let publication = DefaultPublication::new(app());
        let mut request = request();
        request.response_mut().set_result(json!("partial"));

        publication
            .handle_exception(None, &mut request, &PublishError::bad_request("broken"), true)
            .unwrap();

        assert_eq!(
            request.response().get_result().unwrap(),
            Some(json!("bad_request: broken"))
        );
    }
}
