//! FTP adapter for the publisher.
//!
//! An FTP front end hands the publisher a flat environment per command:
//!
//! - `path`: the file system path the command acts on
//! - `credentials`: the login, as `["user", "password"]` or
//!   `{"user": ..., "password": ...}`
//! - anything else the command needs (`command`, `name`, ...)
//!
//! [`FtpRequest`] turns the path into a traversal stack and keeps the
//! credentials out of the environment the published objects can see.
//! [`FtpResponse`] captures failures instead of rendering them, so the
//! server can map them to FTP reply codes when it asks for the result.
//!
//! # Example
//!
//! ```
//! use publisher_core::{Request, Value};
//! use publisher_ftp::FtpRequest;
//! use publisher_runtime::base::Environment;
//!
//! let mut environment = Environment::new();
//! environment.insert("path".into(), Value::from("/a/b/c"));
//! environment.insert("credentials".into(), serde_json::json!(["bob", "123"]));
//!
//! let request = FtpRequest::new(Vec::new(), environment)?;
//! assert_eq!(request.traversal_stack(), vec!["c", "b", "a"]);
//! assert_eq!(request.credentials().map(|c| c.user()), Some("bob"));
//! # Ok::<(), publisher_core::PublishError>(())
//! ```

mod request;
mod response;

pub use request::{CREDENTIALS_KEY, Credentials, FtpRequest, PATH_KEY};
pub use response::FtpResponse;
