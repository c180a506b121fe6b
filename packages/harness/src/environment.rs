//! Synthetic transport environment.
//!
//! An [`Environment`] is the set of server variables a real front controller
//! would receive for a request (`REQUEST_METHOD`, `REQUEST_URI`, `HTTP_*`
//! headers, ...). The harness assembles one per simulated request by layering
//! the per-test defaults, the request headers, and finally the method and URI.

use std::{
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

use http_harness_models::{Headers, Method};
use rand::Rng;

use crate::config::HarnessConfig;

pub const SCRIPT_NAME: &str = "SCRIPT_NAME";
pub const RAND: &str = "RAND";
pub const REQUEST_URI: &str = "REQUEST_URI";
pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
pub const QUERY_STRING: &str = "QUERY_STRING";
pub const SERVER_NAME: &str = "SERVER_NAME";
pub const SERVER_PORT: &str = "SERVER_PORT";
pub const HTTP_HOST: &str = "HTTP_HOST";
pub const HTTPS: &str = "HTTPS";

/// A single environment value. Transport metadata is either textual or numeric.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvValue {
    String(String),
    Number(i64),
    Float(f64),
}

impl EnvValue {
    /// `true` for the values a front controller treats as unset: the empty
    /// string and `"0"`/`0`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::String(s) => s.is_empty() || s == "0",
            Self::Number(n) => *n == 0,
            Self::Float(f) => f.abs() < f64::EPSILON,
        }
    }
}

impl std::fmt::Display for EnvValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<&str> for EnvValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for EnvValue {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<i64> for EnvValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for EnvValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<u32> for EnvValue {
    fn from(value: u32) -> Self {
        Self::Number(value.into())
    }
}

impl From<u16> for EnvValue {
    fn from(value: u16) -> Self {
        Self::Number(value.into())
    }
}

impl From<f64> for EnvValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Ordered mapping of server variable names to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    vars: BTreeMap<String, EnvValue>,
}

impl Environment {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vars: BTreeMap::new(),
        }
    }

    /// Complete `overrides` with the transport defaults of a plain HTTP/1.1
    /// request to `localhost`. Every key present in `overrides` wins.
    #[must_use]
    pub fn mock(overrides: Self) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        let mut env = Self::new();
        env.set("SERVER_PROTOCOL", "HTTP/1.1");
        env.set(REQUEST_METHOD, "GET");
        env.set(SCRIPT_NAME, "");
        env.set(REQUEST_URI, "");
        env.set(QUERY_STRING, "");
        env.set(SERVER_NAME, "localhost");
        env.set(SERVER_PORT, 80_u16);
        env.set(HTTP_HOST, "localhost");
        env.set(
            "HTTP_ACCEPT",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        );
        env.set("HTTP_ACCEPT_LANGUAGE", "en-US,en;q=0.8");
        env.set("HTTP_ACCEPT_CHARSET", "ISO-8859-1,utf-8;q=0.7,*;q=0.3");
        env.set("HTTP_USER_AGENT", "HTTP Harness");
        env.set("REMOTE_ADDR", "127.0.0.1");
        env.set(
            "REQUEST_TIME",
            i64::try_from(now.as_secs()).unwrap_or(i64::MAX),
        );
        env.set("REQUEST_TIME_FLOAT", now.as_secs_f64());

        env.extend(overrides);
        env
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&EnvValue> {
        self.vars.get(key)
    }

    /// Get a value rendered as a string.
    #[must_use]
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(ToString::to_string)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<EnvValue>) -> Option<EnvValue> {
        self.vars.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<EnvValue> {
        self.vars.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvValue)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// The full mapping.
    #[must_use]
    pub const fn all(&self) -> &BTreeMap<String, EnvValue> {
        &self.vars
    }
}

impl<K: Into<String>, V: Into<EnvValue>> Extend<(K, V)> for Environment {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<EnvValue>> FromIterator<(K, V)> for Environment {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut env = Self::new();
        env.extend(iter);
        env
    }
}

impl IntoIterator for Environment {
    type Item = (String, EnvValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, EnvValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.into_iter()
    }
}

/// The built-in per-test defaults: the application entry path and a fresh
/// random nonce in `[0, config.nonce_max]`.
#[must_use]
pub fn default_environment(config: &HarnessConfig, rng: &mut impl Rng) -> Environment {
    let mut env = Environment::new();
    env.set(SCRIPT_NAME, config.script_name.as_str());
    env.set(RAND, rng.random_range(0..=config.nonce_max));
    env
}

/// Merge the environment for a single request.
///
/// Later layers win: `defaults` (built-ins plus test overrides), then
/// `headers` as plain entries, then `REQUEST_URI` and `REQUEST_METHOD` from the
/// call itself. The result is completed with [`Environment::mock`].
#[must_use]
pub fn build(defaults: &Environment, headers: &Headers, method: Method, path: &str) -> Environment {
    let mut env = defaults.clone();
    env.extend(headers.iter());
    env.set(REQUEST_URI, path);
    env.set(REQUEST_METHOD, method.as_ref());

    log::trace!("build: {method} {path} with {} variables", env.len());

    Environment::mock(env)
}
