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

//! Compiling logger specs into live loggers, and tearing them down again.

use std::sync::Arc;

use crate::Error;
use crate::ErrorKind;
use crate::config::LoggerSpec;
use crate::logger::Logger;
use crate::logger::Registry;
use crate::sink::SinkBuilder;

/// Builds loggers from [`LoggerSpec`]s against one [`Registry`].
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'a> {
    registry: &'a Registry,
}

impl<'a> Compiler<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Compiler { registry }
    }

    /// Compiles `spec` into a logger.
    ///
    /// A disabled spec returns `existing` untouched. Otherwise `existing`, when given, is
    /// reconfigured in place and keeps the sinks it already has; without it, any logger
    /// registered under the spec's name is evicted and a fresh one registered.
    ///
    /// Handlers are built in order. Skipped handlers leave no trace. The first handler that
    /// fails aborts the call; sinks attached earlier in the same call stay attached to the
    /// logger.
    pub fn compile(
        &self,
        spec: &LoggerSpec,
        existing: Option<Arc<Logger>>,
    ) -> Result<Option<Arc<Logger>>, Error> {
        if !spec.enabled {
            log::debug!("logger spec is disabled");
            return Ok(existing);
        }

        let fallback_id = uuid::Uuid::new_v4().simple().to_string();
        let logger = match existing {
            Some(logger) => logger,
            None => {
                let name = spec.name.as_deref().unwrap_or(&fallback_id);
                self.registry.replace(name)
            }
        };
        logger.set_level(spec.level);
        logger.set_propagate(spec.propagate);

        let builder = SinkBuilder::new(&fallback_id);
        for handler in &spec.handlers {
            if let Some(sink) = builder.build(handler)? {
                logger.add_sink(sink);
            }
        }
        log::debug!(
            "compiled logger '{}' with {} sinks",
            logger.name(),
            logger.sink_count()
        );
        Ok(Some(logger))
    }
}

/// Detaches every sink of `logger` and closes each of them.
///
/// Every sink is closed even if closing an earlier one fails; the failures are then returned
/// together as the sources of one error. Calling this without a logger, or again on a logger
/// that has already been torn down, does nothing.
pub fn teardown(logger: Option<&Logger>) -> Result<(), Error> {
    let Some(logger) = logger else {
        return Ok(());
    };

    let mut failures = vec![];
    for sink in logger.detach_sinks() {
        if let Err(err) = sink.close() {
            failures.push((sink.kind(), err));
        }
    }

    if failures.is_empty() {
        return Ok(());
    }
    let mut err = Error::new(ErrorKind::Io, "failed to close sinks")
        .with_context("logger", logger.name())
        .with_context("failures", failures.len());
    for (kind, failure) in failures {
        err = err.with_source(anyhow::Error::new(failure).context(format!("{kind} sink")));
    }
    Err(err)
}

/// Compiles `spec` against the process-wide registry.
pub fn create_logger(
    spec: &LoggerSpec,
    existing: Option<Arc<Logger>>,
) -> Result<Option<Arc<Logger>>, Error> {
    Compiler::new(Registry::global()).compile(spec, existing)
}

/// Tears down a logger created by [`create_logger`].
pub fn close_logger(logger: Option<&Logger>) -> Result<(), Error> {
    teardown(logger)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::Record;
    use crate::Severity;
    use crate::append::Append;
    use crate::sink::Sink;
    use crate::sink::SinkKind;

    fn spec(value: serde_json::Value) -> LoggerSpec {
        LoggerSpec::from_value(value).unwrap()
    }

    #[derive(Debug, Default)]
    struct CloseCounter(Mutex<usize>);

    impl Append for Arc<CloseCounter> {
        fn append(&self, _: &Record, _: &[u8]) -> Result<(), Error> {
            Ok(())
        }

        fn close(&self) -> Result<(), Error> {
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[derive(Debug)]
    struct FailsToClose;

    impl Append for FailsToClose {
        fn append(&self, _: &Record, _: &[u8]) -> Result<(), Error> {
            Ok(())
        }

        fn close(&self) -> Result<(), Error> {
            Err(Error::new(ErrorKind::Io, "device busy"))
        }
    }

    #[test]
    fn test_disabled_spec_returns_existing() {
        let registry = Registry::new();
        let compiler = Compiler::new(&registry);
        let disabled = spec(json!({"enabled": false, "name": "svc"}));

        assert!(compiler.compile(&disabled, None).unwrap().is_none());
        let existing = Arc::new(Logger::new("mine"));
        let returned = compiler
            .compile(&disabled, Some(existing.clone()))
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&existing, &returned));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_fallback_name_is_generated() {
        let registry = Registry::new();
        let logger = Compiler::new(&registry)
            .compile(&spec(json!({})), None)
            .unwrap()
            .unwrap();
        assert_eq!(logger.name().len(), 32);
        assert!(logger.name().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(registry.names(), vec![logger.name().to_string()]);
    }

    #[test]
    fn test_handlers_do_not_inherit_logger_format() {
        let registry = Registry::new();
        let logger = Compiler::new(&registry)
            .compile(
                &spec(json!({
                    "name": "svc",
                    "format": "%(message)s",
                    "handlers": [
                        {"type": "Stream"},
                        {"type": "Stream", "format": "%(name)s %(message)s"},
                    ],
                })),
                None,
            )
            .unwrap()
            .unwrap();
        let sinks = logger.sinks();
        assert_eq!(sinks[0].format(), crate::layout::DEFAULT_FORMAT);
        assert_eq!(sinks[1].format(), "%(name)s %(message)s");
    }

    #[test]
    fn test_existing_logger_keeps_its_sinks() {
        let registry = Registry::new();
        let compiler = Compiler::new(&registry);
        let existing = Arc::new(Logger::new("mine"));
        existing.add_sink(Sink::new(SinkKind::Stream, FailsToClose));

        let logger = compiler
            .compile(
                &spec(json!({"level": "ERROR", "propagate": true, "handlers": [{"type": "Stream"}]})),
                Some(existing.clone()),
            )
            .unwrap()
            .unwrap();
        assert_eq!(logger.sink_count(), 2);
        assert_eq!(logger.level(), Severity::Error);
        assert!(logger.propagate());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_teardown_closes_everything_and_aggregates() {
        let logger = Logger::new("svc");
        let counter = Arc::new(CloseCounter::default());
        logger.add_sink(Sink::new(SinkKind::Stream, FailsToClose));
        logger.add_sink(Sink::new(SinkKind::Stream, counter.clone()));
        logger.add_sink(Sink::new(SinkKind::Stream, FailsToClose));

        let err = teardown(Some(&logger)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.sources().len(), 2);
        assert_eq!(*counter.0.lock().unwrap(), 1);
        assert_eq!(logger.sink_count(), 0);

        teardown(Some(&logger)).unwrap();
        teardown(None).unwrap();
        assert_eq!(*counter.0.lock().unwrap(), 1);
    }
}
