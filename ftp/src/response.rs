//! Response that captures failures for the FTP server to inspect.

use publisher_core::{PublishError, Response, Result, Value};

/// Holds either a result or a captured failure.
///
/// [`Response::get_result`] returns the captured failure as an error on
/// every call.
#[derive(Debug, Clone, Default)]
pub struct FtpResponse {
    result: Option<Value>,
    failure: Option<PublishError>,
    internal_error: bool,
}

impl FtpResponse {
    /// Create an empty response
    #[must_use]
    pub const fn new() -> Self {
        Self {
            result: None,
            failure: None,
            internal_error: false,
        }
    }

    /// The captured failure, if any
    #[must_use]
    pub const fn failure(&self) -> Option<&PublishError> {
        self.failure.as_ref()
    }

    /// Whether the exception handler itself failed
    #[must_use]
    pub const fn is_internal_error(&self) -> bool {
        self.internal_error
    }
}

impl Response for FtpResponse {
    fn set_result(&mut self, result: Value) {
        self.failure = None;
        self.result = Some(result);
    }

    fn handle_exception(&mut self, error: &PublishError) {
        tracing::debug!(kind = %error.kind(), "Capturing failure");
        self.result = None;
        self.failure = Some(error.clone());
    }

    fn internal_error(&mut self) {
        self.internal_error = true;
    }

    fn reset(&mut self) {
        self.result = None;
        self.failure = None;
    }

    fn retry(&self) -> Box<dyn Response> {
        Box::new(Self::new())
    }

    fn get_result(&self) -> Result<Option<Value>> {
        match &self.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(self.result.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_result_then_failure() {
        let mut response = FtpResponse::new();
        response.set_result(Value::from(123.456));
        assert_eq!(response.get_result().unwrap(), Some(Value::from(123.456)));

        response.handle_exception(&PublishError::application("spam"));

        for _ in 0..2 {
            let err = response.get_result().unwrap_err();
            assert_eq!(err.to_string(), "spam");
        }
    }

    #[test]
    fn test_reset_clears_failure() {
        let mut response = FtpResponse::new();
        response.handle_exception(&PublishError::bad_request("no"));
        response.reset();

        assert!(response.failure().is_none());
        assert_eq!(response.get_result().unwrap(), None);
    }
}
