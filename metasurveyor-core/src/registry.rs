//! Explicit name-to-driver registry.
//!
//! Drivers are registered once at startup on a [`CollectorRegistry`] value
//! that is then passed by reference to whatever needs to resolve a source
//! type. There is no process-wide registration.

use crate::collector::Collector;
use crate::config::ConnectionConfig;
use crate::error::{CollectorError, Result};
use std::collections::HashMap;
use std::sync::Arc;

const REGISTRY_SOURCE: &str = "registry";

/// Builds collectors for one source type.
///
/// Implemented for any `Fn(&ConnectionConfig) -> Result<Box<dyn Collector>>`.
pub trait CollectorFactory: Send + Sync {
    /// Creates an unconnected collector for `config`.
    fn create(&self, config: &ConnectionConfig) -> Result<Box<dyn Collector>>;
}

impl<F> CollectorFactory for F
where
    F: Fn(&ConnectionConfig) -> Result<Box<dyn Collector>> + Send + Sync,
{
    fn create(&self, config: &ConnectionConfig) -> Result<Box<dyn Collector>> {
        self(config)
    }
}

/// Registry of collector factories keyed by lower-cased source type.
#[derive(Default)]
pub struct CollectorRegistry {
    factories: HashMap<String, Arc<dyn CollectorFactory>>,
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("source_types", &self.names())
            .finish()
    }
}

impl CollectorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `source_type`.
    ///
    /// # Errors
    /// `INVALID_CONFIG` if the name is empty or already registered.
    pub fn register(
        &mut self,
        source_type: &str,
        factory: impl CollectorFactory + 'static,
    ) -> Result<()> {
        let key = normalize(source_type);
        if key.is_empty() {
            return Err(CollectorError::invalid_config(
                REGISTRY_SOURCE,
                "register",
                "source type must not be empty",
            ));
        }
        if self.factories.contains_key(&key) {
            return Err(CollectorError::invalid_config(
                REGISTRY_SOURCE,
                "register",
                format!("source type '{key}' is already registered"),
            ));
        }

        tracing::debug!(source_type = %key, "registered collector factory");
        self.factories.insert(key, Arc::new(factory));
        Ok(())
    }

    /// Creates a collector for `source_type`.
    ///
    /// # Errors
    /// `NOT_FOUND` for unknown source types, `INVALID_CONFIG` if `config`
    /// fails validation, or whatever the factory returns.
    pub fn create(&self, source_type: &str, config: &ConnectionConfig) -> Result<Box<dyn Collector>> {
        let key = normalize(source_type);
        let factory = self.factories.get(&key).ok_or_else(|| {
            CollectorError::not_found(
                REGISTRY_SOURCE,
                "create",
                format!("no collector registered for source type '{key}'"),
            )
        })?;

        config.validate()?;
        tracing::debug!(source_type = %key, target = %config, "creating collector");
        factory.create(config)
    }

    /// Whether `source_type` is registered.
    pub fn contains(&self, source_type: &str) -> bool {
        self.factories.contains_key(&normalize(source_type))
    }

    /// Registered source types, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered source types.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

fn normalize(source_type: &str) -> String {
    source_type.trim().to_ascii_lowercase()
}
