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

//! Runtime loggers and the registry that names them.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;

use crate::Record;
use crate::Severity;
use crate::sink::Sink;
use crate::trap::DefaultTrap;
use crate::trap::Trap;

mod registry;

pub use self::registry::Registry;
use self::registry::RegistryState;

/// A named logger with an ordered set of sinks.
///
/// Loggers are shared as `Arc<Logger>`; level, propagation and sinks can be changed through a
/// shared reference.
pub struct Logger {
    name: String,
    level: AtomicU8,
    propagate: AtomicBool,
    sinks: RwLock<Vec<Sink>>,
    registry: Weak<RegistryState>,
    trap: Arc<dyn Trap>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("propagate", &self.propagate())
            .field("sinks", &*self.sinks())
            .finish()
    }
}

impl Logger {
    /// Creates a logger outside of any registry.
    ///
    /// Such a logger never propagates, since it has no ancestors to find.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_parts(name.into(), Weak::new(), Arc::new(DefaultTrap::default()))
    }

    fn with_parts(name: String, registry: Weak<RegistryState>, trap: Arc<dyn Trap>) -> Self {
        Logger {
            name,
            level: AtomicU8::new(Severity::NotSet.value()),
            propagate: AtomicBool::new(true),
            sinks: RwLock::new(vec![]),
            registry,
            trap,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Severity {
        Severity::from_value(self.level.load(Ordering::Relaxed)).unwrap_or(Severity::NotSet)
    }

    pub fn set_level(&self, level: Severity) {
        self.level.store(level.value(), Ordering::Relaxed);
    }

    /// Whether records also reach the sinks of registered ancestor loggers.
    pub fn propagate(&self) -> bool {
        self.propagate.load(Ordering::Relaxed)
    }

    pub fn set_propagate(&self, propagate: bool) {
        self.propagate.store(propagate, Ordering::Relaxed);
    }

    /// Attaches a sink after the existing ones.
    pub fn add_sink(&self, sink: Sink) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    /// The attached sinks, in attachment order.
    pub fn sinks(&self) -> RwLockReadGuard<'_, Vec<Sink>> {
        self.sinks.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sink_count(&self) -> usize {
        self.sinks().len()
    }

    /// Removes and returns every attached sink.
    pub fn detach_sinks(&self) -> Vec<Sink> {
        let mut sinks = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *sinks)
    }

    pub fn is_enabled_for(&self, severity: Severity) -> bool {
        severity >= self.level()
    }

    /// Emits a message, recording the caller's location.
    #[track_caller]
    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        if !self.is_enabled_for(severity) {
            return;
        }
        let record =
            Record::new(self.name.as_str(), severity, message).with_location(Location::caller());
        self.log_record(&record);
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(Severity::Debug, message);
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.log(Severity::Info, message);
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) {
        self.log(Severity::Warning, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.log(Severity::Error, message);
    }

    #[track_caller]
    pub fn critical(&self, message: impl Into<String>) {
        self.log(Severity::Critical, message);
    }

    /// Delivers a record to this logger's sinks and, while propagation allows, to the sinks of
    /// its registered ancestors (`a.b.c`, then `a.b`, then `a`).
    ///
    /// The level of this logger gates the record; the levels of ancestors do not, although each
    /// sink still applies its own level and filter.
    pub fn log_record(&self, record: &Record) {
        if !self.is_enabled_for(record.severity()) {
            return;
        }

        self.call_sinks(record);
        if !self.propagate() {
            return;
        }
        let Some(registry) = self.registry.upgrade() else {
            return;
        };

        let mut name = self.name.as_str();
        while let Some((parent, _)) = name.rsplit_once(crate::filter::NAME_SEPARATOR) {
            name = parent;
            if let Some(ancestor) = registry.get(parent) {
                ancestor.call_sinks(record);
                if !ancestor.propagate() {
                    break;
                }
            }
        }
    }

    fn call_sinks(&self, record: &Record) {
        for sink in self.sinks().iter() {
            if let Err(err) = sink.handle(record) {
                self.trap.trap(&err);
            }
        }
    }

    /// Flushes every sink; failures go to the trap.
    pub fn flush(&self) {
        for sink in self.sinks().iter() {
            if let Err(err) = sink.flush() {
                self.trap.trap(&err);
            }
        }
    }
}
