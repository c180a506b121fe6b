//! Route patterns, the process-wide route registry and route source loading.
//!
//! Route definitions are declared up front in a [`RouteManifest`]: one
//! registration function per model name, an optional default set and an
//! optional extra set that always applies. [`RouteManifest::load`] picks the
//! applicable sources for a test and registers them into a [`Router`], which in
//! turn populates an [`App`].

use std::{
    collections::BTreeMap,
    sync::{Arc, LazyLock, Mutex},
};

use http_harness_models::Method;

use crate::{
    HandlerError,
    app::App,
    message::{SyntheticRequest, SyntheticResponse},
};

pub type HandlerFn = Arc<
    dyn Fn(&SyntheticRequest, SyntheticResponse) -> Result<SyntheticResponse, HandlerError>
        + Send
        + Sync,
>;

/// A registration function contributing routes to a [`Router`].
pub type RouteSource = Arc<dyn Fn(&mut Router) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// A parsed route pattern such as `/widgets/{id}` or `/assets/*`.
///
/// `{name}` segments capture a single path segment as a route argument. A
/// trailing `*` matches any remainder, including nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if let Some(param) = s.strip_prefix('{').and_then(|x| x.strip_suffix('}')) {
                    Segment::Param(param.to_string())
                } else if s == "*" {
                    Segment::Wildcard
                } else {
                    Segment::Literal(s.to_string())
                }
            })
            .collect();

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether every segment is a literal.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Literal(_)))
    }

    /// Match `path` against the pattern, returning the captured arguments.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let path_segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let has_wildcard = matches!(self.segments.last(), Some(Segment::Wildcard));
        let fixed = if has_wildcard {
            self.segments.len() - 1
        } else {
            self.segments.len()
        };

        if path_segments.len() < fixed || (!has_wildcard && path_segments.len() != fixed) {
            return None;
        }

        let mut params = BTreeMap::new();

        for (segment, actual) in self.segments[..fixed].iter().zip(&path_segments) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != actual {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), (*actual).to_string());
                }
                Segment::Wildcard => return None,
            }
        }

        Some(params)
    }
}

impl std::fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A method, a pattern, and the handler serving them.
#[derive(Clone)]
pub struct Route {
    method: Method,
    pattern: RoutePattern,
    handler: HandlerFn,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

impl Route {
    pub fn new<F>(method: Method, pattern: &str, handler: F) -> Self
    where
        F: Fn(&SyntheticRequest, SyntheticResponse) -> Result<SyntheticResponse, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            method,
            pattern: RoutePattern::parse(pattern),
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub const fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Whether this route and `other` serve the same method and pattern.
    #[must_use]
    pub fn same_key(&self, other: &Self) -> bool {
        self.method == other.method && self.pattern.as_str() == other.pattern.as_str()
    }

    /// Invoke the handler.
    ///
    /// # Errors
    ///
    /// * Whatever the handler returns
    pub fn handle(
        &self,
        request: &SyntheticRequest,
        response: SyntheticResponse,
    ) -> Result<SyntheticResponse, HandlerError> {
        (self.handler)(request, response)
    }
}

/// Insert `route`, replacing an existing route with the same method and
/// pattern in place. Returns `true` when a route was replaced.
pub(crate) fn upsert(routes: &mut Vec<Route>, route: Route) -> bool {
    if let Some(existing) = routes.iter_mut().find(|x| x.same_key(&route)) {
        *existing = route;
        true
    } else {
        routes.push(route);
        false
    }
}

static INSTANCE: LazyLock<Arc<Mutex<Router>>> =
    LazyLock::new(|| Arc::new(Mutex::new(Router::new())));

/// Registry of route definitions.
///
/// Registration is keyed by method and pattern; registering the same pair
/// again replaces the earlier handler, so sources can be loaded any number of
/// times.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    #[must_use]
    pub const fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// The process-wide registry.
    #[must_use]
    pub fn instance() -> Arc<Mutex<Self>> {
        INSTANCE.clone()
    }

    pub fn add_route(&mut self, route: Route) -> &mut Self {
        let method = route.method();
        let pattern = route.pattern().as_str().to_string();
        if upsert(&mut self.routes, route) {
            log::trace!("add_route: replaced {method} {pattern}");
        } else {
            log::debug!("add_route: registered {method} {pattern}");
        }
        self
    }

    pub fn route<F>(&mut self, method: Method, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&SyntheticRequest, SyntheticResponse) -> Result<SyntheticResponse, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.add_route(Route::new(method, pattern, handler))
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&SyntheticRequest, SyntheticResponse) -> Result<SyntheticResponse, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::Get, pattern, handler)
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&SyntheticRequest, SyntheticResponse) -> Result<SyntheticResponse, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::Post, pattern, handler)
    }

    pub fn put<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&SyntheticRequest, SyntheticResponse) -> Result<SyntheticResponse, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::Put, pattern, handler)
    }

    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&SyntheticRequest, SyntheticResponse) -> Result<SyntheticResponse, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::Patch, pattern, handler)
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(&SyntheticRequest, SyntheticResponse) -> Result<SyntheticResponse, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.route(Method::Delete, pattern, handler)
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }

    /// Register every known route into `app`. Safe to call repeatedly.
    pub fn populate_routes(&self, app: &mut App) {
        log::debug!("populate_routes: {} route(s)", self.routes.len());
        for route in &self.routes {
            app.add_route(route.clone());
        }
    }
}

/// Which route source a [`RouteManifest::load`] call applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteSourceKind {
    Model(String),
    Default,
    Extra,
}

/// Declared route sources, looked up by model name.
#[derive(Clone, Default)]
pub struct RouteManifest {
    models: BTreeMap<String, RouteSource>,
    default: Option<RouteSource>,
    extra: Option<RouteSource>,
}

impl std::fmt::Debug for RouteManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteManifest")
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("default", &self.default.is_some())
            .field("extra", &self.extra.is_some())
            .finish()
    }
}

impl RouteManifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes scoped to the model `name`.
    #[must_use]
    pub fn with_model(
        mut self,
        name: impl Into<String>,
        source: impl Fn(&mut Router) + Send + Sync + 'static,
    ) -> Self {
        self.models.insert(name.into(), Arc::new(source));
        self
    }

    #[must_use]
    pub fn with_default(mut self, source: impl Fn(&mut Router) + Send + Sync + 'static) -> Self {
        self.default = Some(Arc::new(source));
        self
    }

    /// Routes registered for every test, after the model or default routes.
    #[must_use]
    pub fn with_extra(mut self, source: impl Fn(&mut Router) + Send + Sync + 'static) -> Self {
        self.extra = Some(Arc::new(source));
        self
    }

    #[must_use]
    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Register the sources that apply to a test into `router`.
    ///
    /// With a model name, the model's routes are used when declared, and the
    /// default routes otherwise. The extra routes are always attempted.
    /// Undeclared sources are skipped.
    pub fn load(&self, model_name: Option<&str>, router: &mut Router) -> Vec<RouteSourceKind> {
        let mut loaded = vec![];

        let model = model_name.and_then(|name| self.models.get(name).map(|source| (name, source)));

        if let Some((name, source)) = model {
            source(router);
            loaded.push(RouteSourceKind::Model(name.to_string()));
        } else if let Some(source) = &self.default {
            if let Some(name) = model_name {
                log::debug!("load: no routes declared for model '{name}', using default routes");
            }
            source(router);
            loaded.push(RouteSourceKind::Default);
        } else {
            log::debug!("load: no model or default routes declared");
        }

        if let Some(source) = &self.extra {
            source(router);
            loaded.push(RouteSourceKind::Extra);
        } else {
            log::debug!("load: no extra routes declared");
        }

        loaded
    }
}
