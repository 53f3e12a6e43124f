// File: src/registry.rs
// Purpose: Map rule-set identifiers to rule sets and gate them by namespace

use crate::config::Config;
use liveform_rules::{DeclaredRuleSet, RuleParseError, RuleSet};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Why an identifier could not be turned into a rule set. The messages are
/// sent to clients verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Request class is required")]
    Missing,

    #[error("Request class {0} not found")]
    NotFound(String),

    #[error("{0} is not a form request")]
    NotAllowed(String),
}

#[derive(Debug, Error)]
#[error("rule set {id}: {source}")]
pub struct RegistryError {
    pub id: String,
    #[source]
    pub source: RuleParseError,
}

/// Known rule sets, keyed by the identifier clients send as `_request`.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    sets: HashMap<String, Arc<dyn RuleSet>>,
    allowed_namespaces: Vec<String>,
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.sets.keys().collect();
        ids.sort();
        f.debug_struct("RuleRegistry")
            .field("sets", &ids)
            .field("allowed_namespaces", &self.allowed_namespaces)
            .finish()
    }
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only identifiers starting with one of `prefixes` resolve. An empty
    /// list allows every registered identifier.
    pub fn with_allowed_namespaces(mut self, prefixes: Vec<String>) -> Self {
        self.allowed_namespaces = prefixes;
        self
    }

    pub fn register(&mut self, id: impl Into<String>, set: Arc<dyn RuleSet>) {
        self.sets.insert(id.into(), set);
    }

    pub fn with(mut self, id: impl Into<String>, set: impl RuleSet + 'static) -> Self {
        self.register(id, Arc::new(set));
        self
    }

    /// Build declared rule sets from `[rule_sets]` in the config.
    pub fn from_config(config: &Config) -> Result<Self, RegistryError> {
        let mut registry =
            Self::new().with_allowed_namespaces(config.validation.allowed_namespaces.clone());

        for (id, spec) in &config.rule_sets {
            let set = DeclaredRuleSet::from_spec(spec).map_err(|source| RegistryError {
                id: id.clone(),
                source,
            })?;
            registry.register(id.clone(), Arc::new(set));
        }

        tracing::debug!(rule_sets = registry.len(), "rule registry loaded");
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    fn is_allowed(&self, id: &str) -> bool {
        self.allowed_namespaces.is_empty()
            || self
                .allowed_namespaces
                .iter()
                .any(|prefix| id.starts_with(prefix.as_str()))
    }

    /// Look up `id`, checking existence before the namespace gate.
    pub fn resolve(&self, id: Option<&str>) -> Result<Arc<dyn RuleSet>, ResolveError> {
        let id = id.map(str::trim).filter(|id| !id.is_empty()).ok_or(ResolveError::Missing)?;

        let set = self
            .sets
            .get(id)
            .ok_or_else(|| ResolveError::NotFound(id.to_string()))?;

        if !self.is_allowed(id) {
            return Err(ResolveError::NotAllowed(id.to_string()));
        }

        Ok(set.clone())
    }
}
