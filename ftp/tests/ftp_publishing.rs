//! FTP requests published end to end
//!
//! Path-to-stack conversion, captured failures and retries through the
//! publish loop.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::sync::Arc;

use proptest::prelude::*;
use publisher_core::{Folder, Function, PublishError, Request, signature};
use publisher_ftp::{CREDENTIALS_KEY, FtpRequest, PATH_KEY};
use publisher_runtime::DefaultPublication;
use publisher_runtime::base::Environment;
use publisher_testing::{ExceptionBehavior, Hook, PublishTest, ScriptedPublication};
use serde_json::json;

// ============================================================================
// Test Fixtures
// ============================================================================

fn environment(path: &str) -> Environment {
    let mut environment = Environment::new();
    environment.insert(PATH_KEY.into(), json!(path));
    environment.insert(CREDENTIALS_KEY.into(), json!(["bob", "123"]));
    environment.insert("command".into(), json!("size"));
    environment.insert("name".into(), json!("readme.txt"));
    environment
}

fn site() -> Folder {
    let size = Function::new(signature!(size(command, name)).unwrap(), |args| {
        let name = args[1].as_str().unwrap_or_default();
        Ok(json!({"command": args[0].as_value(), "size": name.len()}))
    })
    .with_doc("Size of a file");

    Folder::new("root").with_doc("Site").with_child(
        "docs",
        Folder::new("docs").with_doc("Documents").with_child("size", size),
    )
}

// ============================================================================
// Publishing
// ============================================================================

#[test]
fn test_ftp_request_publishes_to_target() {
    let request = FtpRequest::new(Vec::new(), environment("/docs/size")).unwrap();

    PublishTest::new(request)
        .with_publication(Arc::new(DefaultPublication::new(site())))
        .then_request(|request| {
            assert_eq!(
                request.response().get_result().unwrap(),
                Some(json!({"command": "size", "size": 10}))
            );
            assert_eq!(request.base().traversed_names(), ["docs", "size"]);
        })
        .run();
}

#[test]
fn test_captured_failure_is_raised_on_every_read() {
    let request = FtpRequest::new(Vec::new(), environment("/docs/missing")).unwrap();

    PublishTest::new(request)
        .with_publication(Arc::new(DefaultPublication::new(site())))
        .then_request(|request| {
            for _ in 0..3 {
                let err = request.response().get_result().unwrap_err();
                assert!(matches!(err, PublishError::NotFound { ref name, .. } if name == "missing"));
            }
        })
        .run();
}

#[test]
fn test_retried_ftp_request_keeps_credentials_and_stack() {
    let request = FtpRequest::new(Vec::new(), environment("/docs/size")).unwrap();
    let mut retried = request.retry().unwrap();
    retried.process_inputs().unwrap();

    assert_eq!(retried.traversal_stack(), vec!["size", "docs"]);
    assert_eq!(retried.credentials().map(|c| c.user()), Some("bob"));
    assert_eq!(retried.response().get_result().unwrap(), None);
}

#[test]
fn test_retry_surfaces_original_into_ftp_response() {
    let request = FtpRequest::new(Vec::new(), environment("/docs/size")).unwrap();

    PublishTest::new(request)
        .with_publication(Arc::new(
            ScriptedPublication::new(site())
                .fail_at(Hook::CallObject, PublishError::application("locked"))
                .on_exception(ExceptionBehavior::RetryWhenAllowed),
        ))
        .then_request(|request| {
            let err = request.response().get_result().unwrap_err();
            assert_eq!(err.to_string(), "locked");
        })
        .run();
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn path_segments_are_stacked_last_to_first(
        segments in prop::collection::vec("[a-z0-9_.]{1,8}", 1..8)
    ) {
        let path = format!("/{}", segments.join("/"));
        let request = FtpRequest::new(Vec::new(), environment(&path)).unwrap();

        let mut expected = segments.clone();
        expected.reverse();
        prop_assert_eq!(request.traversal_stack(), expected);
        prop_assert!(request.base().get(CREDENTIALS_KEY).is_none());
    }
}
