//! Test fixture lifecycle and the public request surface.
//!
//! A [`TestSuite`] is set up once per group of tests (one per test module,
//! usually held in a `LazyLock`). Each test then calls [`TestSuite::set_up`]
//! to get a [`TestCase`] with fresh default environment and header state.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use http_harness_models::{Headers, Method};
use rand::{SeedableRng as _, rngs::StdRng};
use serde::Serialize;

use crate::{
    Error,
    app::{Application, SharedApplication, lock},
    config::HarnessConfig,
    container::Logger,
    dispatch,
    environment::{self, EnvValue, Environment},
    message::{self, Payload, SyntheticResponse},
    routing::{RouteManifest, Router},
};
#[cfg(feature = "faker")]
use crate::faker::Faker;

/// Declares the domain model a group of tests targets. Route loading uses the
/// routes registered for [`ModelTest::MODEL_NAME`] in the [`RouteManifest`].
pub trait ModelTest {
    const MODEL_NAME: &'static str;
}

pub struct TestSuiteBuilder {
    application: SharedApplication,
    router: Arc<Mutex<Router>>,
    manifest: RouteManifest,
    model_name: Option<String>,
    config: HarnessConfig,
}

impl Default for TestSuiteBuilder {
    fn default() -> Self {
        Self {
            application: Application::instance(),
            router: Router::instance(),
            manifest: RouteManifest::default(),
            model_name: None,
            config: HarnessConfig::from_env(),
        }
    }
}

impl TestSuiteBuilder {
    /// Use a dedicated application instead of the process-wide one.
    #[must_use]
    pub fn with_application(mut self, application: SharedApplication) -> Self {
        self.application = application;
        self
    }

    /// Use a dedicated router instead of the process-wide one.
    #[must_use]
    pub fn with_router(mut self, router: Arc<Mutex<Router>>) -> Self {
        self.router = router;
        self
    }

    #[must_use]
    pub fn with_manifest(mut self, manifest: RouteManifest) -> Self {
        self.manifest = manifest;
        self
    }

    #[must_use]
    pub fn with_model<T: ModelTest>(self) -> Self {
        self.with_model_name(T::MODEL_NAME)
    }

    #[must_use]
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = Some(model_name.into());
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Finish the suite: seed the generators and fetch the logger from the
    /// application's container.
    ///
    /// # Errors
    ///
    /// * [`Error::ServiceNotFound`] if the application has no [`Logger`]
    pub fn build(self) -> Result<TestSuite, Error> {
        let logger = lock(&self.application).container().get::<Logger>()?;

        log::debug!(
            "build: model={:?} seed={:?}",
            self.model_name,
            self.config.seed
        );

        Ok(TestSuite {
            #[cfg(feature = "faker")]
            faker: Faker::new(self.config.seed),
            logger,
            rng: Mutex::new(
                self.config
                    .seed
                    .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64),
            ),
            application: self.application,
            router: self.router,
            manifest: self.manifest,
            model_name: self.model_name,
            config: self.config,
        })
    }
}

/// Per-group fixture state.
pub struct TestSuite {
    application: SharedApplication,
    router: Arc<Mutex<Router>>,
    manifest: RouteManifest,
    model_name: Option<String>,
    config: HarnessConfig,
    #[cfg(feature = "faker")]
    faker: Faker,
    logger: Arc<Logger>,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for TestSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSuite")
            .field("manifest", &self.manifest)
            .field("model_name", &self.model_name)
            .field("config", &self.config)
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}

impl TestSuite {
    #[must_use]
    pub fn builder() -> TestSuiteBuilder {
        TestSuiteBuilder::default()
    }

    #[must_use]
    pub fn application(&self) -> &SharedApplication {
        &self.application
    }

    #[must_use]
    pub fn router(&self) -> &Arc<Mutex<Router>> {
        &self.router
    }

    #[must_use]
    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    #[cfg(feature = "faker")]
    #[must_use]
    pub const fn faker(&self) -> &Faker {
        &self.faker
    }

    #[must_use]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Start a test: the default environment is reset to the script name and
    /// a fresh nonce, the default headers are emptied and the clock starts.
    #[must_use]
    pub fn set_up(&self) -> TestCase<'_> {
        let environment = environment::default_environment(&self.config, &mut *lock(&self.rng));
        log::trace!("set_up: {environment:?}");

        TestCase {
            suite: self,
            environment,
            headers: Headers::new(),
            started: Instant::now(),
        }
    }
}

/// State of a single test.
#[derive(Debug)]
pub struct TestCase<'a> {
    suite: &'a TestSuite,
    environment: Environment,
    headers: Headers,
    started: Instant,
}

impl TestCase<'_> {
    #[must_use]
    pub const fn suite(&self) -> &TestSuite {
        self.suite
    }

    /// Default environment for every request of this test.
    #[must_use]
    pub const fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Default headers for every request of this test.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn set_environment_variable(
        &mut self,
        key: impl Into<String>,
        value: impl Into<EnvValue>,
    ) -> &mut Self {
        self.environment.set(key, value);
        self
    }

    pub fn set_request_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    /// Simulate a request against the application.
    ///
    /// `extra_headers` override the test's default headers in the
    /// environment. With `is_json_request`, the request also carries
    /// `extra_headers` directly and `Content-type`/`Accept` of
    /// `application/json`.
    ///
    /// # Errors
    ///
    /// * [`Error::Serialization`] if `post` cannot be encoded
    /// * [`Error::Handler`] if a handler fails and the application has no
    ///   error middleware
    pub fn request(
        &self,
        method: Method,
        path: &str,
        post: Option<&Payload>,
        is_json_request: bool,
        extra_headers: &Headers,
    ) -> Result<SyntheticResponse, Error> {
        let headers = self.headers.merged(extra_headers);
        let env = environment::build(&self.environment, &headers, method, path);
        let (request, response) =
            message::create(method, &env, extra_headers, post, is_json_request)?;

        let router = {
            let mut router = lock(&self.suite.router);
            let loaded = self
                .suite
                .manifest
                .load(self.suite.model_name.as_deref(), &mut router);
            log::trace!("request: loaded route sources {loaded:?}");
            router
        };

        let mut application = lock(&self.suite.application);
        let app = application.make_clean().app_mut();
        router.populate_routes(app);
        drop(router);

        dispatch::dispatch(app, request, response)
    }

    /// # Errors
    ///
    /// * See [`TestCase::request`]
    pub fn get(&self, path: &str) -> Result<SyntheticResponse, Error> {
        self.request(Method::Get, path, None, true, &Headers::new())
    }

    /// # Errors
    ///
    /// * See [`TestCase::request`]
    pub fn delete(&self, path: &str) -> Result<SyntheticResponse, Error> {
        self.request(Method::Delete, path, None, true, &Headers::new())
    }

    /// # Errors
    ///
    /// * See [`TestCase::request`]
    pub fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<SyntheticResponse, Error> {
        self.request(Method::Post, path, Some(&Payload::json(body)?), true, &Headers::new())
    }

    /// # Errors
    ///
    /// * See [`TestCase::request`]
    pub fn put<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<SyntheticResponse, Error> {
        self.request(Method::Put, path, Some(&Payload::json(body)?), true, &Headers::new())
    }

    /// # Errors
    ///
    /// * See [`TestCase::request`]
    pub fn patch<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<SyntheticResponse, Error> {
        self.request(Method::Patch, path, Some(&Payload::json(body)?), true, &Headers::new())
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Print the time since set up, e.g. `[12] after login`.
    pub fn waypoint(&self, label: &str) {
        println!("{}", format_waypoint(self.elapsed(), label));
    }
}

/// `[<seconds, rounded, thousands-grouped>] label`
#[must_use]
pub fn format_waypoint(elapsed: Duration, label: &str) -> String {
    let secs = elapsed.as_secs() + u64::from(elapsed.subsec_millis() >= 500);
    format!("[{}] {label}", group_thousands(secs))
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
