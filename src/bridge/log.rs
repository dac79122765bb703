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

use std::sync::Arc;

use crate::Error;
use crate::ErrorKind;
use crate::Record;
use crate::Severity;
use crate::logger::Logger;

/// Forwards records of the `log` crate to a [`Logger`].
///
/// The `log` target becomes the record name, so name filters apply to module paths.
#[derive(Debug, Clone)]
pub struct LogBridge(Arc<Logger>);

impl LogBridge {
    pub fn new(logger: Arc<Logger>) -> Self {
        LogBridge(logger)
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.0
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.0.is_enabled_for(Severity::from(metadata.level()))
    }

    fn log(&self, record: &log::Record) {
        if !log::Log::enabled(self, record.metadata()) {
            return;
        }
        self.0.log_record(&Record::from(record));
    }

    fn flush(&self) {
        self.0.flush();
    }
}

/// Installs `logger` as the global logger of the `log` crate.
///
/// The global maximum level is set to `Trace`; the logger's own level does the gating. To
/// override this, call [`log::set_max_level`] afterwards.
///
/// # Errors
///
/// Returns an error if the `log` crate global logger has already been set.
pub fn setup_log_crate(logger: Arc<Logger>) -> Result<(), Error> {
    log::set_boxed_logger(Box::new(LogBridge::new(logger))).map_err(|err| {
        Error::new(ErrorKind::Unexpected, "log crate global logger already set").with_source(err)
    })?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::append::Append;
    use crate::sink::Sink;
    use crate::sink::SinkKind;

    #[derive(Debug, Default)]
    struct Names(Mutex<Vec<String>>);

    impl Append for Arc<Names> {
        fn append(&self, record: &Record, _: &[u8]) -> Result<(), Error> {
            self.0.lock().unwrap().push(record.name().to_string());
            Ok(())
        }
    }

    #[test]
    fn test_bridge_forwards_and_gates() {
        let logger = Arc::new(Logger::new("app"));
        logger.set_level(Severity::Info);
        let names = Arc::new(Names::default());
        logger.add_sink(Sink::new(SinkKind::Stream, names.clone()));

        let bridge = LogBridge::new(logger.clone());
        let debug = log::Record::builder()
            .target("app::db")
            .level(log::Level::Debug)
            .args(format_args!("hidden"))
            .build();
        let info = log::Record::builder()
            .target("app::web")
            .level(log::Level::Info)
            .args(format_args!("shown"))
            .build();
        log::Log::log(&bridge, &debug);
        log::Log::log(&bridge, &info);

        assert_eq!(*names.0.lock().unwrap(), vec!["app::web"]);
    }
}
