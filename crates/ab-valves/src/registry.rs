//! Name-keyed cache of shared valve configs.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ValveConfig;
use crate::error::{ValveError, ValveResult};
use crate::tables::{self, BUILTIN_NAMES};

/// Valve used when a car asks for a type nobody knows.
pub const DEFAULT_VALVE: &str = "K";

/// Process context owning every valve config handed to brake units.
///
/// Built-in types are built the first time they are asked for and the same `Arc`
/// is returned from then on. Names are case-insensitive.
#[derive(Debug, Default)]
pub struct ValveRegistry {
    configs: HashMap<String, Arc<ValveConfig>>,
}

impl ValveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared config for `name`. Unknown names fall back to [`DEFAULT_VALVE`].
    pub fn get(&mut self, name: &str) -> ValveResult<Arc<ValveConfig>> {
        let key = normalize(name);
        if let Some(cfg) = self.configs.get(&key) {
            return Ok(Arc::clone(cfg));
        }
        match tables::builtin(&key) {
            Some(built) => {
                let cfg = Arc::new(built?);
                debug!(
                    valve = %key,
                    tanks = cfg.tanks().len(),
                    pistons = cfg.pistons().len(),
                    "built valve config"
                );
                self.configs.insert(key, Arc::clone(&cfg));
                Ok(cfg)
            }
            None => {
                warn!(requested = name, fallback = DEFAULT_VALVE, "unknown valve type");
                self.get(DEFAULT_VALVE)
            }
        }
    }

    /// Config for `name` if it has already been built or registered.
    pub fn lookup(&self, name: &str) -> Option<Arc<ValveConfig>> {
        self.configs.get(&normalize(name)).cloned()
    }

    /// Publish a custom valve type under its own name.
    pub fn register(&mut self, config: ValveConfig) -> ValveResult<Arc<ValveConfig>> {
        let key = normalize(config.name());
        if self.configs.contains_key(&key) || BUILTIN_NAMES.contains(&key.as_str()) {
            return Err(ValveError::AlreadyRegistered { name: key });
        }
        let cfg = Arc::new(config);
        debug!(valve = %key, "registered valve config");
        self.configs.insert(key, Arc::clone(&cfg));
        Ok(cfg)
    }

    /// Built-in and registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = BUILTIN_NAMES
            .iter()
            .map(|s| s.to_string())
            .chain(self.configs.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}
