//! Request and response messages, and the factory that builds them from a
//! synthetic environment.

use std::collections::BTreeMap;

use bytes::Bytes;
use http_harness_models::{Headers, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

use crate::{Error, body::Body, environment::Environment, uri::Uri};

pub const APPLICATION_JSON: &str = "application/json";

/// Environment keys that become headers even without the `HTTP_` prefix.
const SPECIAL_HEADER_KEYS: [&str; 6] = [
    "CONTENT_TYPE",
    "CONTENT_LENGTH",
    "PHP_AUTH_USER",
    "PHP_AUTH_PW",
    "PHP_AUTH_DIGEST",
    "AUTH_TYPE",
];

/// Request payload handed to [`create`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Written verbatim.
    Raw(Bytes),
    /// Serialized to JSON before writing.
    Json(serde_json::Value),
}

impl Payload {
    #[must_use]
    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Self::Raw(bytes.into())
    }

    /// Create a structured payload from any serializable value.
    ///
    /// # Errors
    ///
    /// * If `value` cannot be represented as JSON (e.g. a map with non-string keys)
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Encode the payload into body bytes. Empty raw payloads, `null`, and
    /// empty arrays or objects produce no body at all.
    ///
    /// # Errors
    ///
    /// * If JSON serialization fails
    pub fn encode(&self) -> Result<Option<Vec<u8>>, Error> {
        Ok(match self {
            Self::Raw(bytes) if bytes.is_empty() => None,
            Self::Raw(bytes) => Some(bytes.to_vec()),
            Self::Json(serde_json::Value::Null) => None,
            Self::Json(serde_json::Value::Array(x)) if x.is_empty() => None,
            Self::Json(serde_json::Value::Object(x)) if x.is_empty() => None,
            Self::Json(value) => Some(serde_json::to_vec(value)?),
        })
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Raw(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Raw(Bytes::from(value))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self::Raw(Bytes::from(value))
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Self::Raw(value)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// A fully formed inbound request.
///
/// Requests are values: the `with_*` methods return a modified copy and leave
/// `self` untouched.
#[derive(Debug, Clone)]
pub struct SyntheticRequest {
    method: Method,
    uri: Uri,
    headers: Headers,
    cookies: BTreeMap<String, String>,
    server_params: Environment,
    body: Body,
    attributes: BTreeMap<String, String>,
}

impl SyntheticRequest {
    #[must_use]
    pub const fn new(
        method: Method,
        uri: Uri,
        headers: Headers,
        cookies: BTreeMap<String, String>,
        server_params: Environment,
        body: Body,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            cookies,
            server_params,
            body,
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[must_use]
    pub const fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    /// Snapshot of the environment the request was built from.
    #[must_use]
    pub const fn server_params(&self) -> &Environment {
        &self.server_params
    }

    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Route arguments captured while matching, e.g. `id` for `/widgets/{id}`.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Deserialize the body, read from the cursor, as JSON.
    ///
    /// # Errors
    ///
    /// * If the body is not valid JSON for `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(self.body.contents())
    }

    /// Copy of this request with one header added or replaced.
    #[must_use]
    pub fn with_header(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut request = self.clone();
        request.headers.insert(name, value);
        request
    }

    /// Copy of this request with the given route arguments.
    #[must_use]
    pub fn with_attributes(&self, attributes: BTreeMap<String, String>) -> Self {
        let mut request = self.clone();
        request.attributes.extend(attributes);
        request
    }
}

/// Outbound response, populated by the application pipeline.
#[derive(Debug, Clone)]
pub struct SyntheticResponse {
    status: StatusCode,
    headers: Headers,
    body: Body,
}

impl Default for SyntheticResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticResponse {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: StatusCode::Ok,
            headers: Headers::new(),
            body: Body::new(),
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    pub const fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    #[must_use]
    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Append `bytes` to the body.
    #[must_use]
    pub fn with_body(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.body.append(bytes);
        self
    }

    /// Append `body` as JSON and set the content type.
    ///
    /// # Errors
    ///
    /// * If `body` cannot be serialized
    pub fn with_json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(body)?;
        Ok(self
            .with_header("Content-Type", APPLICATION_JSON)
            .with_body(bytes))
    }

    /// Body from the cursor to the end as UTF-8.
    ///
    /// # Errors
    ///
    /// * If the body is not valid UTF-8
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(self.body.contents())
    }

    /// Body from the cursor to the end parsed as JSON.
    ///
    /// # Errors
    ///
    /// * If the body is not valid JSON for `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(self.body.contents())
    }
}

/// Extract the request headers declared by an environment: every `HTTP_*` key
/// (except `HTTP_CONTENT_LENGTH`) and the special CGI keys. Names are
/// normalized, so `HTTP_ACCEPT_LANGUAGE` becomes `Accept-Language`.
#[must_use]
pub fn headers_from_environment(env: &Environment) -> Headers {
    env.iter()
        .filter_map(|(key, value)| {
            let upper = key.to_ascii_uppercase();
            if upper == "HTTP_CONTENT_LENGTH" {
                return None;
            }
            let name = upper.strip_prefix("HTTP_").or_else(|| {
                SPECIAL_HEADER_KEYS
                    .contains(&upper.as_str())
                    .then_some(upper.as_str())
            })?;
            Some((normalize_header_name(name), value.to_string()))
        })
        .collect()
}

fn normalize_header_name(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Build the request/response pair for one simulated call.
///
/// URI and headers come strictly from `env`. When `json` is set, every entry
/// of `extra_headers` is applied to the request and then `Content-type` and
/// `Accept` are forced to `application/json`.
///
/// # Errors
///
/// * If the payload cannot be encoded
pub fn create(
    method: Method,
    env: &Environment,
    extra_headers: &Headers,
    payload: Option<&Payload>,
    json: bool,
) -> Result<(SyntheticRequest, SyntheticResponse), Error> {
    let uri = Uri::from_environment(env);
    let env_headers = headers_from_environment(env);

    let mut body = Body::new();
    if let Some(bytes) = payload.map(Payload::encode).transpose()?.flatten() {
        body.append(bytes);
    }
    body.rewind();

    let mut request = SyntheticRequest::new(
        method,
        uri,
        env_headers,
        BTreeMap::new(),
        env.clone(),
        body,
    );

    if json {
        for (name, value) in extra_headers.iter() {
            request = request.with_header(name, value);
        }
        request = request
            .with_header("Content-type", APPLICATION_JSON)
            .with_header("Accept", APPLICATION_JSON);
    }

    log::trace!(
        "create: {method} {} headers={} body={}B",
        request.uri(),
        request.headers().len(),
        request.body().len(),
    );

    Ok((request, SyntheticResponse::new()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::environment::{self, REQUEST_URI, SCRIPT_NAME};

    fn env_for(method: Method, path: &str, headers: &Headers) -> Environment {
        let defaults = Environment::from_iter([(SCRIPT_NAME, "/index.php")]);
        environment::build(&defaults, headers, method, path)
    }

    #[test_log::test]
    fn absent_payload_gives_empty_body() {
        let env = env_for(Method::Get, "/widgets", &Headers::new());
        let (request, response) = create(Method::Get, &env, &Headers::new(), None, true).unwrap();

        assert!(request.body().is_empty());
        assert_eq!(request.body().position(), 0);
        assert_eq!(response.status(), StatusCode::Ok);
        assert!(response.body().is_empty());
    }

    #[test_log::test]
    fn raw_payload_is_written_verbatim_and_rewound() {
        let env = env_for(Method::Post, "/upload", &Headers::new());
        let payload = Payload::from("name=foo&size=3");

        let (request, _) =
            create(Method::Post, &env, &Headers::new(), Some(&payload), false).unwrap();

        assert_eq!(request.body().position(), 0);
        assert_eq!(request.body().contents(), b"name=foo&size=3");
    }

    #[test_log::test]
    fn structured_payload_is_json_encoded() {
        let env = env_for(Method::Post, "/widgets", &Headers::new());
        let payload = Payload::json(&json!({"name": "foo"})).unwrap();

        let (request, _) =
            create(Method::Post, &env, &Headers::new(), Some(&payload), true).unwrap();

        assert_eq!(request.body().contents(), br#"{"name":"foo"}"#);
        assert_eq!(request.body().position(), 0);
        assert_eq!(request.json::<serde_json::Value>().unwrap(), json!({"name": "foo"}));
    }

    #[test_log::test]
    fn empty_containers_and_strings_produce_no_body() {
        for payload in [
            Payload::from(""),
            Payload::Json(json!([])),
            Payload::Json(json!({})),
            Payload::Json(serde_json::Value::Null),
        ] {
            assert_eq!(payload.encode().unwrap(), None, "{payload:?}");
        }
    }

    #[test_log::test]
    fn unrepresentable_structured_payload_is_a_serialization_error() {
        let mut map = BTreeMap::new();
        map.insert(vec![1_u8], "tuple keys are not JSON");

        let err = Payload::json(&map).unwrap_err();

        assert!(matches!(err, Error::Serialization(_)), "{err:?}");
    }

    #[test_log::test]
    fn json_mode_forces_content_negotiation_headers() {
        let extra = Headers::from([
            ("Content-Type", "text/plain"),
            ("accept", "text/html"),
            ("X-Request-Id", "abc"),
        ]);
        let env = env_for(Method::Post, "/widgets", &extra);

        let (request, _) = create(Method::Post, &env, &extra, None, true).unwrap();

        assert_eq!(request.header("content-type"), Some(APPLICATION_JSON));
        assert_eq!(request.header("Accept"), Some(APPLICATION_JSON));
        assert_eq!(request.header("X-Request-Id"), Some("abc"));
    }

    #[test_log::test]
    fn without_json_mode_plain_header_names_stay_in_the_environment() {
        let extra = Headers::from([("X-Request-Id", "abc"), ("HTTP_X_TRACE", "t-1")]);
        let env = env_for(Method::Get, "/widgets", &extra);

        let (request, _) = create(Method::Get, &env, &extra, None, false).unwrap();

        assert_eq!(request.header("X-Request-Id"), None);
        assert_eq!(
            request.server_params().get_string("X-Request-Id").as_deref(),
            Some("abc")
        );
        assert_eq!(request.header("X-Trace"), Some("t-1"));
        assert_eq!(request.header("Host"), Some("localhost"));
    }

    #[test_log::test]
    fn headers_from_environment_normalizes_names() {
        let env = Environment::from_iter([
            ("HTTP_ACCEPT_LANGUAGE", "en"),
            ("CONTENT_TYPE", "text/csv"),
            ("HTTP_CONTENT_LENGTH", "10"),
            (REQUEST_URI, "/"),
        ]);

        let headers = headers_from_environment(&env);

        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec![("Content-Type", "text/csv"), ("Accept-Language", "en")]
        );
    }

    #[test_log::test]
    fn with_header_is_copy_on_write() {
        let env = env_for(Method::Get, "/", &Headers::new());
        let (original, _) = create(Method::Get, &env, &Headers::new(), None, false).unwrap();

        let modified = original.with_header("X-Flag", "1");

        assert_eq!(modified.header("X-Flag"), Some("1"));
        assert_eq!(original.header("X-Flag"), None);
    }

    #[test_log::test]
    fn response_builders() {
        let response = SyntheticResponse::new()
            .with_status(StatusCode::Created)
            .with_json(&json!({"id": 42}))
            .unwrap();

        assert_eq!(response.status(), StatusCode::Created);
        assert_eq!(response.header("content-type"), Some(APPLICATION_JSON));
        // written but not yet rewound
        assert_eq!(response.text().unwrap(), "");
        assert_eq!(response.body().as_bytes(), br#"{"id":42}"#);
    }
}
