//! Rule registry keyed by name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};

use super::builtin::{
    Confirmation, Format, LengthRangeRule, Presence, RemoteCheck, CONFIRMATION, IDENTICAL,
};
use super::Rule;

/// Maps rule names (and aliases) to shared [`Rule`] implementations.
///
/// Populated once at startup and read-only afterwards.
#[derive(Clone, Default)]
pub struct RuleCatalog {
    rules: HashMap<String, Arc<dyn Rule>>,
    aliases: HashMap<String, String>,
}

impl RuleCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding every built-in rule plus the `identical` alias.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        let builtins: [Arc<dyn Rule>; 6] = [
            Arc::new(Presence),
            Arc::new(LengthRangeRule),
            Arc::new(Format),
            Arc::new(Confirmation),
            Arc::new(RemoteCheck::unique()),
            Arc::new(RemoteCheck::remote_method()),
        ];
        for rule in builtins {
            let name = rule.name().to_string();
            catalog.rules.insert(name, rule);
        }
        catalog
            .aliases
            .insert(IDENTICAL.to_string(), CONFIRMATION.to_string());
        catalog
    }

    /// Register a rule under its own name.
    pub fn register(&mut self, rule: impl Rule + 'static) -> EngineResult<()> {
        let name = rule.name().to_string();
        if self.contains(&name) {
            return Err(EngineError::DuplicateRule(name));
        }
        tracing::debug!(rule = %name, "Registered validation rule");
        self.rules.insert(name, Arc::new(rule));
        Ok(())
    }

    /// Make `alias` resolve to the already registered rule `target`.
    pub fn alias(&mut self, alias: &str, target: &str) -> EngineResult<()> {
        if self.contains(alias) {
            return Err(EngineError::DuplicateRule(alias.to_string()));
        }
        if !self.rules.contains_key(target) {
            return Err(EngineError::UnknownRule(target.to_string()));
        }
        self.aliases.insert(alias.to_string(), target.to_string());
        Ok(())
    }

    /// Look up a rule by name or alias.
    pub fn get(&self, name: &str) -> EngineResult<Arc<dyn Rule>> {
        let canonical = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.rules
            .get(canonical)
            .cloned()
            .ok_or_else(|| EngineError::UnknownRule(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name) || self.aliases.contains_key(name)
    }

    /// Registered rule names (aliases excluded), sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
