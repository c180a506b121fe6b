//! Minimal service locator owned by the [`Application`](crate::app::Application).

use std::{
    any::{Any, TypeId, type_name},
    collections::BTreeMap,
    fmt::Display,
    sync::Arc,
};

use crate::Error;

type Service = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct Entry {
    name: &'static str,
    service: Service,
}

/// Services keyed by type.
///
/// Singletons live as long as the container. Scoped bindings belong to a
/// single request and are dropped by [`Container::clear_scoped`]; while bound,
/// they shadow a singleton of the same type.
#[derive(Clone, Default)]
pub struct Container {
    singletons: BTreeMap<TypeId, Entry>,
    scoped: BTreeMap<TypeId, Entry>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field(
                "singletons",
                &self.singletons.values().map(|x| x.name).collect::<Vec<_>>(),
            )
            .field(
                "scoped",
                &self.scoped.values().map(|x| x.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn entry<T: Any + Send + Sync>(service: T) -> Entry {
    Entry {
        name: type_name::<T>(),
        service: Arc::new(service),
    }
}

impl Container {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            singletons: BTreeMap::new(),
            scoped: BTreeMap::new(),
        }
    }

    pub fn set<T: Any + Send + Sync>(&mut self, service: T) -> &mut Self {
        log::trace!("set: {}", type_name::<T>());
        self.singletons.insert(TypeId::of::<T>(), entry(service));
        self
    }

    /// Bind a service for the current request only.
    pub fn bind_scoped<T: Any + Send + Sync>(&mut self, service: T) -> &mut Self {
        log::trace!("bind_scoped: {}", type_name::<T>());
        self.scoped.insert(TypeId::of::<T>(), entry(service));
        self
    }

    /// Look up a service, preferring a scoped binding.
    ///
    /// # Errors
    ///
    /// * If no service of type `T` is registered
    pub fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>, Error> {
        let id = TypeId::of::<T>();
        self.scoped
            .get(&id)
            .or_else(|| self.singletons.get(&id))
            .and_then(|x| x.service.clone().downcast::<T>().ok())
            .ok_or_else(|| Error::ServiceNotFound(type_name::<T>()))
    }

    #[must_use]
    pub fn has<T: Any + Send + Sync>(&self) -> bool {
        let id = TypeId::of::<T>();
        self.scoped.contains_key(&id) || self.singletons.contains_key(&id)
    }

    #[must_use]
    pub fn scoped_len(&self) -> usize {
        self.scoped.len()
    }

    pub fn clear_scoped(&mut self) {
        if !self.scoped.is_empty() {
            log::debug!("clear_scoped: dropping {} binding(s)", self.scoped.len());
        }
        self.scoped.clear();
    }
}

/// Named logging handle handed out by the container.
///
/// Messages go through the `log` facade with the handle's name as target, so
/// they can be filtered with `RUST_LOG=<name>=debug`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    name: String,
}

impl Logger {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self, level: log::Level, message: impl Display) {
        log::log!(target: self.name.as_str(), level, "{message}");
    }

    pub fn error(&self, message: impl Display) {
        self.log(log::Level::Error, message);
    }

    pub fn warn(&self, message: impl Display) {
        self.log(log::Level::Warn, message);
    }

    pub fn info(&self, message: impl Display) {
        self.log(log::Level::Info, message);
    }

    pub fn debug(&self, message: impl Display) {
        self.log(log::Level::Debug, message);
    }

    pub fn trace(&self, message: impl Display) {
        self.log(log::Level::Trace, message);
    }
}
