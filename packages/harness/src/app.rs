//! The application under test: routes, middleware and the handler pipeline,
//! plus the process-wide [`Application`] that owns it.
//!
//! # Execution order
//!
//! Middleware added last runs first:
//!
//! ```text
//! Request → last added → ... → first added → routing → handler
//! ```

use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use http_harness_models::StatusCode;

use crate::{
    Error, HandlerError,
    container::{Container, Logger},
    message::{APPLICATION_JSON, SyntheticRequest, SyntheticResponse},
    routing::{self, Route},
};

pub const LOGGER_NAME: &str = "http_harness::app";

pub type SharedApplication = Arc<Mutex<Application>>;

/// A layer wrapped around route dispatch.
pub trait Middleware: Send + Sync {
    /// Handle the request, usually by calling `next.run(..)` and adjusting
    /// the result.
    ///
    /// # Errors
    ///
    /// * If the middleware or any inner layer fails
    fn handle(
        &self,
        request: &SyntheticRequest,
        response: SyntheticResponse,
        next: Next<'_>,
    ) -> Result<SyntheticResponse, HandlerError>;
}

impl<F> Middleware for F
where
    F: Fn(&SyntheticRequest, SyntheticResponse, Next<'_>) -> Result<SyntheticResponse, HandlerError>
        + Send
        + Sync,
{
    fn handle(
        &self,
        request: &SyntheticRequest,
        response: SyntheticResponse,
        next: Next<'_>,
    ) -> Result<SyntheticResponse, HandlerError> {
        self(request, response, next)
    }
}

type Endpoint<'a> =
    &'a dyn Fn(&SyntheticRequest, SyntheticResponse) -> Result<SyntheticResponse, HandlerError>;

/// The remaining layers of the pipeline.
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    endpoint: Endpoint<'a>,
}

impl Next<'_> {
    /// Run the next layer.
    ///
    /// # Errors
    ///
    /// * If an inner layer fails
    pub fn run(
        self,
        request: &SyntheticRequest,
        response: SyntheticResponse,
    ) -> Result<SyntheticResponse, HandlerError> {
        match self.middleware.split_last() {
            Some((outer, rest)) => outer.handle(
                request,
                response,
                Next {
                    middleware: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => (self.endpoint)(request, response),
        }
    }
}

/// The dispatch-capable application.
#[derive(Default)]
pub struct App {
    routes: Vec<Route>,
    middleware: Vec<Arc<dyn Middleware>>,
    error_handling: bool,
    last_response: Option<SyntheticResponse>,
    request_log: Vec<SyntheticRequest>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes)
            .field("middleware", &self.middleware.len())
            .field("error_handling", &self.error_handling)
            .field("last_response", &self.last_response)
            .field("request_log", &self.request_log.len())
            .finish()
    }
}

impl App {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route, replacing one with the same method and pattern.
    pub fn add_route(&mut self, route: Route) -> &mut Self {
        routing::upsert(&mut self.routes, route);
        self
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn add_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// [`App::add_middleware`] for plain closures.
    pub fn add_middleware_fn<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(
                &SyntheticRequest,
                SyntheticResponse,
                Next<'_>,
            ) -> Result<SyntheticResponse, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.add_middleware(middleware)
    }

    /// Render handler failures as error responses instead of returning them
    /// from [`App::process`].
    pub fn add_error_middleware(&mut self) -> &mut Self {
        self.error_handling = true;
        self
    }

    #[must_use]
    pub const fn has_error_middleware(&self) -> bool {
        self.error_handling
    }

    /// The response produced by the most recent [`App::process`] call.
    #[must_use]
    pub const fn last_response(&self) -> Option<&SyntheticResponse> {
        self.last_response.as_ref()
    }

    /// Every request processed since the last reset.
    #[must_use]
    pub fn request_log(&self) -> &[SyntheticRequest] {
        &self.request_log
    }

    /// Drop per-request state. Routes, middleware and settings are kept.
    pub fn reset_request_state(&mut self) {
        self.last_response = None;
        self.request_log.clear();
    }

    /// Run a request through middleware, routing and the matched handler.
    ///
    /// Unknown paths produce `404 Not Found`; a known path with another
    /// method produces `405 Method Not Allowed` with an `Allow` header.
    ///
    /// # Errors
    ///
    /// * [`Error::Handler`] if a handler or middleware fails and no error
    ///   middleware is installed
    pub fn process(
        &mut self,
        request: SyntheticRequest,
        response: SyntheticResponse,
    ) -> Result<SyntheticResponse, Error> {
        let method = request.method();
        let path = request.path().to_string();
        log::debug!("process: {method} {path}");

        self.request_log.push(request.clone());

        let routes = &self.routes;
        let endpoint = |request: &SyntheticRequest, response: SyntheticResponse| {
            route(routes, request, response)
        };
        let result = Next {
            middleware: &self.middleware,
            endpoint: &endpoint,
        }
        .run(&request, response);

        let response = match result {
            Ok(response) => response,
            Err(e) if self.error_handling => {
                log::warn!("process: {method} {path} failed: {e}");
                error_response(&e)
            }
            Err(source) => {
                return Err(Error::Handler {
                    method,
                    path,
                    source,
                });
            }
        };

        log::debug!("process: {method} {path} -> {}", response.status());
        self.last_response = Some(response.clone());

        Ok(response)
    }
}

fn route(
    routes: &[Route],
    request: &SyntheticRequest,
    response: SyntheticResponse,
) -> Result<SyntheticResponse, HandlerError> {
    let mut allowed = vec![];

    // static routes are tried before patterned ones
    let ordered = routes
        .iter()
        .filter(|route| route.pattern().is_static())
        .chain(routes.iter().filter(|route| !route.pattern().is_static()));

    for route in ordered {
        let Some(params) = route.pattern().matches(request.path()) else {
            continue;
        };
        if route.method() == request.method() {
            log::trace!(
                "route: {} {} matched {}",
                request.method(),
                request.path(),
                route.pattern()
            );
            return route.handle(&request.with_attributes(params), response);
        }
        if !allowed.contains(&route.method()) {
            allowed.push(route.method());
        }
    }

    if allowed.is_empty() {
        return Ok(response
            .with_status(StatusCode::NotFound)
            .with_header("Content-Type", "text/plain")
            .with_body("Not found"));
    }

    allowed.sort();
    let allowed = allowed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    Ok(response
        .with_status(StatusCode::MethodNotAllowed)
        .with_header("Allow", allowed.as_str())
        .with_header("Content-Type", "text/plain")
        .with_body(format!("Method not allowed. Must be one of: {allowed}")))
}

fn error_response(error: &HandlerError) -> SyntheticResponse {
    let status = error.status().unwrap_or(StatusCode::InternalServerError);
    let body = serde_json::json!({
        "status": status.as_u16(),
        "error": error.to_string(),
    });

    SyntheticResponse::new()
        .with_status(status)
        .with_header("Content-Type", APPLICATION_JSON)
        .with_body(body.to_string())
}

static INSTANCE: LazyLock<SharedApplication> =
    LazyLock::new(|| Arc::new(Mutex::new(Application::new())));

/// The application singleton: the [`App`] plus its service container.
#[derive(Debug)]
pub struct Application {
    app: App,
    container: Container,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    /// A fresh application with a [`Logger`] registered in its container.
    #[must_use]
    pub fn new() -> Self {
        let mut container = Container::new();
        container.set(Logger::new(LOGGER_NAME));

        Self {
            app: App::new(),
            container,
        }
    }

    /// The process-wide application.
    #[must_use]
    pub fn instance() -> SharedApplication {
        INSTANCE.clone()
    }

    #[must_use]
    pub const fn app(&self) -> &App {
        &self.app
    }

    pub const fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    #[must_use]
    pub const fn container(&self) -> &Container {
        &self.container
    }

    pub const fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    /// Reset all per-request state so the next dispatch starts from a clean
    /// slate: request-scoped services, the last response and the request log.
    /// Services, routes and middleware survive.
    pub fn make_clean(&mut self) -> &mut Self {
        log::debug!("make_clean");
        self.container.clear_scoped();
        self.app.reset_request_state();
        self
    }
}

/// Lock a shared singleton. A panic in an earlier test must not take every
/// later test down with it, so a poisoned lock is taken over as is; the clean
/// reset before each dispatch restores per-request state.
pub fn lock<T>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use http_harness_models::{Headers, Method};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{environment, message};

    fn request(method: Method, path: &str) -> SyntheticRequest {
        let defaults = environment::Environment::new();
        let env = environment::build(&defaults, &Headers::new(), method, path);
        let (request, _) = message::create(method, &env, &Headers::new(), None, false).unwrap();
        request
    }

    fn widget_app() -> App {
        let mut app = App::new();
        app.add_route(Route::new(Method::Get, "/widgets/{id}", |req, resp| {
            let id = req.attribute("id").unwrap_or_default().to_string();
            Ok(resp.with_body(id))
        }));
        app.add_route(Route::new(Method::Delete, "/widgets/{id}", |_, resp| {
            Ok(resp.with_status(StatusCode::NoContent))
        }));
        app.add_route(Route::new(Method::Get, "/fail", |_, _| {
            Err(HandlerError::not_found("widget 7 does not exist"))
        }));
        app
    }

    #[test_log::test]
    fn route_arguments_reach_the_handler() {
        let mut app = widget_app();

        let response = app
            .process(request(Method::Get, "/widgets/42"), SyntheticResponse::new())
            .unwrap();

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.body().as_bytes(), b"42");
    }

    #[test_log::test]
    fn static_route_wins_over_earlier_placeholder_route() {
        let mut app = widget_app();
        app.add_route(Route::new(Method::Get, "/widgets/new", |_, resp| {
            Ok(resp.with_body("form"))
        }));

        let response = app
            .process(request(Method::Get, "/widgets/new"), SyntheticResponse::new())
            .unwrap();
        assert_eq!(response.body().as_bytes(), b"form");

        let response = app
            .process(request(Method::Get, "/widgets/9"), SyntheticResponse::new())
            .unwrap();
        assert_eq!(response.body().as_bytes(), b"9");
    }

    #[test_log::test]
    fn unknown_path_is_not_found() {
        let mut app = widget_app();

        let response = app
            .process(request(Method::Get, "/gadgets"), SyntheticResponse::new())
            .unwrap();

        assert_eq!(response.status(), StatusCode::NotFound);
    }

    #[test_log::test]
    fn wrong_method_is_not_allowed() {
        let mut app = widget_app();

        let response = app
            .process(request(Method::Post, "/widgets/1"), SyntheticResponse::new())
            .unwrap();

        assert_eq!(response.status(), StatusCode::MethodNotAllowed);
        assert_eq!(response.header("allow"), Some("GET, DELETE"));
    }

    #[test_log::test]
    fn handler_errors_propagate_without_error_middleware() {
        let mut app = widget_app();

        let err = app
            .process(request(Method::Get, "/fail"), SyntheticResponse::new())
            .unwrap_err();

        match err {
            Error::Handler { method, path, source } => {
                assert_eq!(method, Method::Get);
                assert_eq!(path, "/fail");
                assert_eq!(source.status(), Some(StatusCode::NotFound));
            }
            other => panic!("Expected handler error, got {other:?}"),
        }
        assert!(app.last_response().is_none());
    }

    #[test_log::test]
    fn error_middleware_renders_failures() {
        let mut app = widget_app();
        app.add_error_middleware();

        let response = app
            .process(request(Method::Get, "/fail"), SyntheticResponse::new())
            .unwrap();

        assert_eq!(response.status(), StatusCode::NotFound);
        assert_eq!(response.header("Content-Type"), Some(APPLICATION_JSON));
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(response.body().as_bytes()).unwrap(),
            serde_json::json!({"status": 404, "error": "widget 7 does not exist"})
        );
    }

    #[test_log::test]
    fn last_added_middleware_runs_outermost() {
        let mut app = widget_app();
        app.add_middleware_fn(|req, resp, next| next.run(req, resp.with_body("inner>")));
        app.add_middleware_fn(|req, resp, next| next.run(req, resp.with_body("outer>")));

        let response = app
            .process(request(Method::Get, "/widgets/9"), SyntheticResponse::new())
            .unwrap();

        assert_eq!(response.body().as_bytes(), b"outer>inner>9");
    }

    #[test_log::test]
    fn middleware_can_short_circuit() {
        let mut app = widget_app();
        app.add_middleware_fn(|req, resp, next| {
            if req.header("Authorization").is_none() {
                return Ok(resp.with_status(StatusCode::Unauthorized));
            }
            next.run(req, resp)
        });

        let response = app
            .process(request(Method::Get, "/widgets/9"), SyntheticResponse::new())
            .unwrap();

        assert_eq!(response.status(), StatusCode::Unauthorized);
    }

    #[test_log::test]
    fn make_clean_resets_per_request_state_only() {
        #[derive(Debug)]
        struct RequestId(u32);

        let mut application = Application::new();
        application.app_mut().add_route(Route::new(Method::Get, "/", |_, r| Ok(r)));
        application.container_mut().bind_scoped(RequestId(1));
        application
            .app_mut()
            .process(request(Method::Get, "/"), SyntheticResponse::new())
            .unwrap();

        assert_eq!(application.app().request_log().len(), 1);
        assert!(application.app().last_response().is_some());

        application.make_clean();

        assert!(application.app().request_log().is_empty());
        assert!(application.app().last_response().is_none());
        assert!(!application.container().has::<RequestId>());
        assert!(application.container().has::<Logger>());
        assert_eq!(application.app().routes().len(), 1);
    }

    #[test_log::test]
    fn poisoned_lock_is_recovered() {
        let shared = Arc::new(Mutex::new(0_u32));
        let poisoner = shared.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        assert!(shared.is_poisoned());
        *lock(&shared) += 1;
        assert_eq!(*lock(&shared), 1);
    }
}
