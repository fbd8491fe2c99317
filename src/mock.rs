//! The mock handed to tests.
//!
//! [`Mock`] owns the pattern registry. Tests register patterns on it and pass
//! [`Mock::get_connection`] to the search client in place of its real
//! transport; connections share the registry, so patterns added or cleared
//! later are seen by requests resolved afterwards.

use crate::config::{GlobalSettings, MockConfig};
use crate::connection::MockConnection;
use crate::error::MockError;
use crate::normalize::NormalizedRequest;
use crate::pattern::{Pattern, Reply, Resolver};
use crate::registry::Registry;
use crate::template::TemplateEngine;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Pattern registry plus the settings its connections answer with.
#[derive(Debug, Clone, Default)]
pub struct Mock {
    registry: Arc<RwLock<Registry>>,
    settings: Arc<GlobalSettings>,
}

impl Mock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: GlobalSettings) -> Self {
        Self {
            registry: Arc::default(),
            settings: Arc::new(settings),
        }
    }

    /// Build a mock from file-declared patterns.
    pub fn from_config(config: &MockConfig) -> Result<Self, MockError> {
        let mock = Self::with_settings(config.settings.clone());
        let engine = Arc::new(TemplateEngine::new());

        for definition in &config.patterns {
            debug!(id = ?definition.id, "Registering configured pattern");
            mock.add_resolver(definition.pattern.clone(), definition.resolver(&engine))?;
        }

        info!(patterns = config.patterns.len(), "Mock initialized from configuration");
        Ok(mock)
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a resolver for a pattern.
    ///
    /// List-valued methods and paths register one pattern per pair.
    pub fn add<F>(&self, pattern: Pattern, resolver: F) -> Result<&Self, MockError>
    where
        F: Fn(&NormalizedRequest) -> Result<Reply, MockError> + Send + Sync + 'static,
    {
        self.add_resolver(pattern, Some(Arc::new(resolver)))
    }

    /// Register an already shared resolver, if any.
    ///
    /// Fails with "The resolver function is not defined" when `resolver` is
    /// `None`, after the method and path checks.
    pub fn add_resolver(&self, pattern: Pattern, resolver: Option<Resolver>) -> Result<&Self, MockError> {
        self.write().register(&pattern, resolver)?;
        Ok(self)
    }

    /// Resolver a request shaped like `pattern` would be answered by.
    pub fn get(&self, pattern: Pattern) -> Result<Option<Resolver>, MockError> {
        let pairs = pattern.expand()?;
        let registry = self.read();

        let resolver = pairs.into_iter().find_map(|(method, path)| {
            let request = NormalizedRequest::new(method, path)
                .with_query(pattern.querystring.clone().unwrap_or_default())
                .with_body(pattern.body.clone());
            registry.resolve(&request).map(|resolution| resolution.resolver)
        });
        Ok(resolver)
    }

    /// Remove every pattern registered for the pattern's methods and paths.
    pub fn clear(&self, pattern: Pattern) -> Result<&Self, MockError> {
        self.write().remove(&pattern)?;
        Ok(self)
    }

    /// Remove every registered pattern.
    pub fn clear_all(&self) -> &Self {
        self.write().clear();
        self
    }

    /// Transport to hand to the search client.
    pub fn get_connection(&self) -> MockConnection {
        MockConnection::new(Arc::clone(&self.registry), Arc::clone(&self.settings))
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }
}
