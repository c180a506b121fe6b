//! Assertion helpers for dispatched responses.
//!
//! Bodies are read from the cursor, which [`dispatch`](crate::dispatch::dispatch)
//! leaves at offset 0.

use http_harness_models::StatusCode;
use serde::de::DeserializeOwned;

use crate::message::SyntheticResponse;

pub trait ResponseAssertions {
    /// # Panics
    ///
    /// * If the status code doesn't match
    fn assert_status(&self, expected: StatusCode) -> &Self;

    /// # Panics
    ///
    /// * If the status is not in the 2xx range
    fn assert_success(&self) -> &Self;

    /// # Panics
    ///
    /// * If the status is not in the 4xx range
    fn assert_client_error(&self) -> &Self;

    /// # Panics
    ///
    /// * If the status is not in the 5xx range
    fn assert_server_error(&self) -> &Self;

    /// Assert that the response has a header with exactly this value. The
    /// name is matched case-insensitively.
    ///
    /// # Panics
    ///
    /// * If the header is missing or has another value
    fn assert_header(&self, name: &str, expected: &str) -> &Self;

    /// # Panics
    ///
    /// * If the header is missing or doesn't contain `expected`
    ///   (case-insensitive)
    fn assert_header_contains(&self, name: &str, expected: &str) -> &Self;

    /// # Panics
    ///
    /// * If the body is not valid UTF-8 or doesn't contain `expected`
    fn assert_text_contains(&self, expected: &str) -> &Self;

    /// # Panics
    ///
    /// * If the body is not valid UTF-8 or doesn't equal `expected`
    fn assert_text_equals(&self, expected: &str) -> &Self;

    /// # Panics
    ///
    /// * If JSON parsing fails
    /// * If the parsed JSON doesn't equal the expected value
    fn assert_json_equals<T: DeserializeOwned + PartialEq + std::fmt::Debug>(
        &self,
        expected: &T,
    ) -> &Self;

    /// Assert that every field of `expected` is present with the same value.
    /// Objects are compared recursively; everything else must be equal.
    ///
    /// # Panics
    ///
    /// * If JSON parsing fails
    /// * If an expected field is missing or differs
    fn assert_json_contains(&self, expected: &serde_json::Value) -> &Self;
}

fn contains_value(actual: &serde_json::Value, expected: &serde_json::Value) -> bool {
    match (actual, expected) {
        (serde_json::Value::Object(actual_obj), serde_json::Value::Object(expected_obj)) => {
            expected_obj.iter().all(|(key, expected_val)| {
                actual_obj
                    .get(key)
                    .is_some_and(|actual_val| contains_value(actual_val, expected_val))
            })
        }
        (actual_val, expected_val) => actual_val == expected_val,
    }
}

impl ResponseAssertions for SyntheticResponse {
    fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status(),
            expected,
            "Expected status {expected}, got {}",
            self.status()
        );
        self
    }

    fn assert_success(&self) -> &Self {
        assert!(
            self.status().is_success(),
            "Expected successful status (2xx), got {}",
            self.status()
        );
        self
    }

    fn assert_client_error(&self) -> &Self {
        assert!(
            self.status().is_client_error(),
            "Expected client error status (4xx), got {}",
            self.status()
        );
        self
    }

    fn assert_server_error(&self) -> &Self {
        assert!(
            self.status().is_server_error(),
            "Expected server error status (5xx), got {}",
            self.status()
        );
        self
    }

    fn assert_header(&self, name: &str, expected: &str) -> &Self {
        let actual = self
            .header(name)
            .unwrap_or_else(|| panic!("Header '{name}' not found"));
        assert_eq!(
            actual, expected,
            "Expected header '{name}' to be '{expected}', got '{actual}'"
        );
        self
    }

    fn assert_header_contains(&self, name: &str, expected: &str) -> &Self {
        let actual = self
            .header(name)
            .unwrap_or_else(|| panic!("Header '{name}' not found"));
        assert!(
            actual.to_lowercase().contains(&expected.to_lowercase()),
            "Expected header '{name}' to contain '{expected}', got '{actual}'"
        );
        self
    }

    fn assert_text_contains(&self, expected: &str) -> &Self {
        let text = self.text().expect("Response body is not valid UTF-8");
        assert!(
            text.contains(expected),
            "Expected response body to contain '{expected}', got: {text}"
        );
        self
    }

    fn assert_text_equals(&self, expected: &str) -> &Self {
        let text = self.text().expect("Response body is not valid UTF-8");
        assert_eq!(
            text, expected,
            "Expected response body to equal '{expected}', got: {text}"
        );
        self
    }

    fn assert_json_equals<T: DeserializeOwned + PartialEq + std::fmt::Debug>(
        &self,
        expected: &T,
    ) -> &Self {
        let actual: T = self.json().expect("Failed to parse response body as JSON");
        assert_eq!(
            &actual, expected,
            "Expected JSON to equal {expected:?}, got {actual:?}"
        );
        self
    }

    fn assert_json_contains(&self, expected: &serde_json::Value) -> &Self {
        let actual: serde_json::Value =
            self.json().expect("Failed to parse response body as JSON");
        assert!(
            contains_value(&actual, expected),
            "Expected JSON to contain {expected}, got {actual}"
        );
        self
    }
}
