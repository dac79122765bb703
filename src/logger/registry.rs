// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;

use crate::append::lock;
use crate::logger::Logger;
use crate::trap::DefaultTrap;
use crate::trap::Trap;

pub(crate) struct RegistryState {
    loggers: Mutex<HashMap<String, Arc<Logger>>>,
    trap: Arc<dyn Trap>,
}

impl RegistryState {
    pub(crate) fn get(&self, name: &str) -> Option<Arc<Logger>> {
        lock(&self.loggers).get(name).cloned()
    }
}

/// A name to logger mapping with replace-on-recreate semantics.
///
/// Cloning a registry yields another handle to the same mapping. Tests can build isolated
/// registries; [`Registry::global`] is the process-wide one.
#[derive(Clone)]
pub struct Registry {
    state: Arc<RegistryState>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("loggers", &self.names())
            .field("trap", &self.state.trap)
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry whose loggers report failures to stderr.
    pub fn new() -> Self {
        Self::with_trap(DefaultTrap::default())
    }

    /// Creates an empty registry whose loggers report failures to `trap`.
    pub fn with_trap(trap: impl Trap) -> Self {
        Registry {
            state: Arc::new(RegistryState {
                loggers: Mutex::new(HashMap::new()),
                trap: Arc::new(trap),
            }),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Logger>> {
        self.state.get(name)
    }

    /// Returns the logger registered under `name`, creating it if needed.
    pub fn get_or_create(&self, name: &str) -> Arc<Logger> {
        let mut loggers = lock(&self.state.loggers);
        loggers
            .entry(name.to_string())
            .or_insert_with(|| self.new_logger(name))
            .clone()
    }

    /// Evicts whatever is registered under `name` and registers a fresh logger.
    ///
    /// The evicted logger keeps its sinks; whoever still holds it remains responsible for
    /// tearing it down.
    pub fn replace(&self, name: &str) -> Arc<Logger> {
        let logger = self.new_logger(name);
        lock(&self.state.loggers).insert(name.to_string(), logger.clone());
        logger
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Logger>> {
        lock(&self.state.loggers).remove(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names = lock(&self.state.loggers)
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        lock(&self.state.loggers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn new_logger(&self, name: &str) -> Arc<Logger> {
        Arc::new(Logger::with_parts(
            name.to_string(),
            Arc::downgrade(&self.state),
            self.state.trap.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_evicts_previous_logger() {
        let registry = Registry::new();
        let first = registry.replace("svc");
        let second = registry.replace("svc");
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&registry.get("svc").unwrap(), &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_or_create_reuses() {
        let registry = Registry::new();
        let first = registry.get_or_create("svc");
        let second = registry.get_or_create("svc");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_names_and_remove() {
        let registry = Registry::new();
        registry.replace("b");
        registry.replace("a");
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert_eq!(registry.names(), vec!["b"]);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_registries_are_isolated() {
        let one = Registry::new();
        let two = Registry::new();
        one.replace("svc");
        assert!(two.get("svc").is_none());
    }
}
