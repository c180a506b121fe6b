//! In-process HTTP request simulation for tests.
//!
//! The harness builds a synthetic transport environment for a request, turns it
//! into request and response values, registers the application's routes, resets
//! the process-wide [`Application`](app::Application) and drives the request
//! through its handler pipeline. The response comes back with its body rewound,
//! ready for assertions.
//!
//! ```rust
//! use http_harness::{ResponseAssertions as _, RouteManifest, StatusCode, TestSuite};
//!
//! # fn main() -> Result<(), http_harness::Error> {
//! let manifest = RouteManifest::new().with_default(|router| {
//!     router.get("/widgets/{id}", |req, resp| {
//!         Ok(resp.with_body(req.attribute("id").unwrap_or_default().to_string()))
//!     });
//! });
//!
//! let suite = TestSuite::builder().with_manifest(manifest).build()?;
//! let test = suite.set_up();
//! test.get("/widgets/42")?
//!     .assert_status(StatusCode::Ok)
//!     .assert_text_equals("42");
//! # Ok(())
//! # }
//! ```

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

pub mod app;
pub mod assertions;
pub mod body;
pub mod config;
pub mod container;
pub mod dispatch;
pub mod environment;
#[cfg(feature = "faker")]
pub mod faker;
pub mod fixture;
pub mod message;
pub mod routing;
pub mod uri;

pub use http_harness_models::{Headers, Method, StatusCode};

pub use app::{App, Application, Middleware, Next};
pub use assertions::ResponseAssertions;
pub use config::HarnessConfig;
pub use container::{Container, Logger};
pub use environment::{EnvValue, Environment};
pub use fixture::{ModelTest, TestCase, TestSuite};
pub use message::{Payload, SyntheticRequest, SyntheticResponse};
pub use routing::{Route, RouteManifest, RoutePattern, Router};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A structured request payload could not be encoded.
    #[error("Failed to encode request payload: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A handler failed and no error middleware was installed.
    #[error("Handler for {method} {path} failed: {source}")]
    Handler {
        method: Method,
        path: String,
        #[source]
        source: HandlerError,
    },
    #[error("Service not registered: {0}")]
    ServiceNotFound(&'static str),
}

/// Failure returned by a route handler or middleware.
///
/// The optional status is used by the error middleware when rendering the
/// failure as a response; errors without one become `500 Internal Server Error`.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct HandlerError {
    status: Option<StatusCode>,
    source: BoxError,
}

impl HandlerError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            status: None,
            source: source.into(),
        }
    }

    #[must_use]
    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn bad_request(source: impl Into<BoxError>) -> Self {
        Self::new(source).with_status(StatusCode::BadRequest)
    }

    pub fn not_found(source: impl Into<BoxError>) -> Self {
        Self::new(source).with_status(StatusCode::NotFound)
    }

    pub fn internal_server_error(source: impl Into<BoxError>) -> Self {
        Self::new(source).with_status(StatusCode::InternalServerError)
    }

    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

/// Malformed request bodies are the client's fault.
impl From<serde_json::Error> for HandlerError {
    fn from(value: serde_json::Error) -> Self {
        Self::bad_request(value)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn handler_error_constructors_carry_status() {
        assert_eq!(HandlerError::new("boom").status(), None);
        assert_eq!(
            HandlerError::bad_request("nope").status(),
            Some(StatusCode::BadRequest)
        );
        assert_eq!(
            HandlerError::not_found("gone").status(),
            Some(StatusCode::NotFound)
        );
        assert_eq!(
            HandlerError::internal_server_error("boom").to_string(),
            "boom"
        );
    }

    #[test_log::test]
    fn json_errors_are_bad_requests() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(HandlerError::from(err).status(), Some(StatusCode::BadRequest));
    }

    #[test_log::test]
    fn handler_failure_names_the_route() {
        let err = Error::Handler {
            method: Method::Get,
            path: "/widgets/1".to_string(),
            source: HandlerError::new("database offline"),
        };

        assert_eq!(
            err.to_string(),
            "Handler for GET /widgets/1 failed: database offline"
        );
    }
}
