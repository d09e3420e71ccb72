//! Request built from an FTP command environment.

use std::fmt;
use std::sync::Arc;

use publisher_core::{
    ArgumentSource, Held, Object, Publication, PublishError, Request, Response, Result, Value,
};
use publisher_runtime::base::{BaseRequest, Environment};
use serde::Deserialize;

use crate::response::FtpResponse;

/// Environment key of the command's path.
pub const PATH_KEY: &str = "path";

/// Environment key of the login; removed before the request is built.
pub const CREDENTIALS_KEY: &str = "credentials";

/// Login supplied with an FTP command.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "CredentialsRepr")]
pub struct Credentials {
    user: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CredentialsRepr {
    Pair(String, String),
    Named { user: String, password: String },
}

impl From<CredentialsRepr> for Credentials {
    fn from(repr: CredentialsRepr) -> Self {
        match repr {
            CredentialsRepr::Pair(user, password) | CredentialsRepr::Named { user, password } => {
                Self { user, password }
            }
        }
    }
}

impl Credentials {
    /// Create credentials from a user name and password.
    #[must_use]
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// The user name
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// The password
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A publishing request for one FTP command.
///
/// Wraps a [`BaseRequest`] whose response is an [`FtpResponse`].
#[derive(Debug)]
pub struct FtpRequest {
    base: BaseRequest,
    credentials: Option<Credentials>,
    challenges: Vec<String>,
}

impl FtpRequest {
    /// Build a request from the command's body and environment.
    ///
    /// `credentials` is taken out of the environment. `path` has its
    /// leading `/` removed and is split on `/` into the traversal stack; an
    /// empty path leaves the stack empty.
    ///
    /// # Errors
    ///
    /// [`PublishError::BadRequest`] if `path` is missing or not a string, or
    /// if `credentials` is present but malformed.
    pub fn new(body: impl Into<Vec<u8>>, mut environment: Environment) -> Result<Self> {
        let credentials = environment
            .remove(CREDENTIALS_KEY)
            .map(serde_json::from_value::<Credentials>)
            .transpose()
            .map_err(|err| PublishError::bad_request(format!("Malformed credentials: {err}")))?;

        let path = match environment.get(PATH_KEY) {
            Some(Value::String(path)) => path.clone(),
            Some(_) => return Err(PublishError::bad_request("FTP path must be a string")),
            None => return Err(PublishError::bad_request("FTP request without a path")),
        };

        let path = path.strip_prefix('/').unwrap_or(&path);
        let stack: Vec<String> = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/').rev().map(str::to_owned).collect()
        };

        let base = BaseRequest::new(environment)
            .with_body(body)
            .with_response(Box::new(FtpResponse::new()))
            .with_traversal_stack(stack);

        tracing::debug!(
            path = %path,
            user = credentials.as_ref().map(Credentials::user),
            "FTP request"
        );

        Ok(Self {
            base,
            credentials,
            challenges: Vec::new(),
        })
    }

    /// The login, if one was supplied
    #[must_use]
    pub const fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Acknowledge an authentication challenge.
    ///
    /// FTP has no way to send a challenge mid-command; the challenge is only
    /// recorded.
    pub fn unauthorized(&mut self, challenge: impl Into<String>) {
        let challenge = challenge.into();
        tracing::debug!(challenge = %challenge, "Unauthorized FTP command");
        self.challenges.push(challenge);
    }

    /// Challenges acknowledged so far
    #[must_use]
    pub fn challenges(&self) -> &[String] {
        &self.challenges
    }

    /// The wrapped base request
    #[must_use]
    pub const fn base(&self) -> &BaseRequest {
        &self.base
    }
}

impl Request for FtpRequest {
    fn process_inputs(&mut self) -> Result<()> {
        self.base.process_inputs()
    }

    fn response(&self) -> &dyn Response {
        self.base.response()
    }

    fn response_mut(&mut self) -> &mut dyn Response {
        self.base.response_mut()
    }

    fn traverse(&mut self, root: Object) -> Result<Object> {
        self.base.traverse(root)
    }

    fn traversal_stack(&self) -> Vec<String> {
        self.base.traversal_stack()
    }

    fn set_traversal_stack(&mut self, stack: Vec<String>) {
        self.base.set_traversal_stack(stack);
    }

    fn positional_arguments(&self) -> &[Value] {
        self.base.positional_arguments()
    }

    fn principal(&self) -> Option<&str> {
        self.base.principal()
    }

    fn set_principal(&mut self, principal: Option<String>) {
        self.base.set_principal(principal);
    }

    fn supports_retry(&self) -> bool {
        self.base.supports_retry()
    }

    fn retry(&self) -> Result<Self> {
        Ok(Self {
            base: self.base.retry()?,
            credentials: self.credentials.clone(),
            challenges: Vec::new(),
        })
    }

    fn close(&mut self) {
        self.base.close();
    }

    fn hold(&mut self, held: Box<dyn Held>) {
        self.base.hold(held);
    }

    fn publication(&self) -> Option<Arc<dyn Publication>> {
        self.base.publication()
    }

    fn set_publication(&mut self, publication: Arc<dyn Publication>) {
        self.base.set_publication(publication);
    }

    fn as_argument_source(&self) -> &dyn ArgumentSource {
        self.base.as_argument_source()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    fn environment(path: &str) -> Environment {
        let mut environment = Environment::new();
        environment.insert(PATH_KEY.into(), json!(path));
        environment.insert(CREDENTIALS_KEY.into(), json!(["bob", "123"]));
        environment.insert("command".into(), json!("foo"));
        environment
    }

    #[test]
    fn test_path_becomes_reversed_stack() {
        let request = FtpRequest::new(Vec::new(), environment("/a/b/c")).unwrap();
        assert_eq!(request.traversal_stack(), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_credentials_are_removed_from_environment() {
        let request = FtpRequest::new(Vec::new(), environment("/")).unwrap();

        assert_eq!(request.credentials(), Some(&Credentials::new("bob", "123")));
        assert!(request.base().get(CREDENTIALS_KEY).is_none());
        assert_eq!(request.base().get("command"), Some(&json!("foo")));
        assert!(request.traversal_stack().is_empty());
    }

    #[test]
    fn test_named_credentials() {
        let mut env = environment("/a");
        env.insert(CREDENTIALS_KEY.into(), json!({"user": "ann", "password": "pw"}));

        let request = FtpRequest::new(Vec::new(), env).unwrap();

        assert_eq!(request.credentials().map(Credentials::user), Some("ann"));
        assert_eq!(request.credentials().map(Credentials::password), Some("pw"));
    }

    #[test]
    fn test_malformed_credentials_are_rejected() {
        let mut env = environment("/a");
        env.insert(CREDENTIALS_KEY.into(), json!(42));

        let err = FtpRequest::new(Vec::new(), env).unwrap_err();
        assert!(matches!(err, PublishError::BadRequest(_)));
    }

    #[test]
    fn test_missing_path_is_rejected() {
        let mut env = environment("/a");
        env.remove(PATH_KEY);

        let err = FtpRequest::new(Vec::new(), env).unwrap_err();
        assert_eq!(err.to_string(), "FTP request without a path");
    }

    #[test]
    fn test_password_is_not_logged() {
        let debug = format!("{:?}", Credentials::new("bob", "hunter2"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_unauthorized_is_recorded() {
        let mut request = FtpRequest::new(Vec::new(), environment("/a")).unwrap();
        request.unauthorized("basic realm=\"ftp\"");
        assert_eq!(request.challenges(), ["basic realm=\"ftp\""]);
    }
}
