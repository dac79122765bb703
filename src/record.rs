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

use std::borrow::Cow;
use std::cell::Cell;
use std::panic::Location;
use std::sync::LazyLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use jiff::Timestamp;
use jiff::Zoned;

use crate::Severity;

static PROCESS_START: LazyLock<Timestamp> = LazyLock::new(Timestamp::now);

fn current_thread_id() -> u64 {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);

    thread_local! {
        static THREAD_ID: Cell<u64> = const { Cell::new(0) };
    }

    THREAD_ID.with(|id| {
        if id.get() == 0 {
            id.set(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        }
        id.get()
    })
}

/// A single log event, as seen by sinks.
#[derive(Clone, Debug)]
pub struct Record {
    name: String,
    severity: Severity,
    message: String,
    time: Zoned,
    module_path: Option<Cow<'static, str>>,
    file: Option<Cow<'static, str>>,
    line: Option<u32>,
    process: u32,
    thread: u64,
    thread_name: Option<String>,
}

impl Record {
    /// Creates a record stamped with the current time and thread.
    pub fn new(name: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        LazyLock::force(&PROCESS_START);
        let current = std::thread::current();

        Record {
            name: name.into(),
            severity,
            message: message.into(),
            time: Zoned::now(),
            module_path: None,
            file: None,
            line: None,
            process: std::process::id(),
            thread: current_thread_id(),
            thread_name: current.name().map(str::to_owned),
        }
    }

    /// Sets the source location from a caller location.
    pub fn with_location(mut self, location: &'static Location<'static>) -> Self {
        self.file = Some(Cow::Borrowed(location.file()));
        self.line = Some(location.line());
        self
    }

    /// Sets the module path the record originates from.
    pub fn with_module_path(mut self, module_path: impl Into<Cow<'static, str>>) -> Self {
        self.module_path = Some(module_path.into());
        self
    }

    /// Sets the source file the record originates from.
    pub fn with_file(mut self, file: impl Into<Cow<'static, str>>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Sets the source line the record originates from.
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Overrides the timestamp.
    pub fn with_time(mut self, time: Zoned) -> Self {
        self.time = time;
        self
    }

    /// The hierarchical name of the record source, e.g. `app.db.pool`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn time(&self) -> &Zoned {
        &self.time
    }

    pub fn module_path(&self) -> Option<&str> {
        self.module_path.as_deref()
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn process(&self) -> u32 {
        self.process
    }

    /// A small per-process identifier of the emitting thread.
    pub fn thread(&self) -> u64 {
        self.thread
    }

    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    /// Seconds since the Unix epoch, with sub-second precision.
    pub fn created(&self) -> f64 {
        let ts = self.time.timestamp();
        ts.as_second() as f64 + f64::from(ts.subsec_nanosecond()) / 1e9
    }

    /// Milliseconds between process start (first record) and this record.
    pub fn relative_created(&self) -> f64 {
        let elapsed = self.time.timestamp().duration_since(*PROCESS_START);
        elapsed.as_secs_f64() * 1000.0
    }
}

impl From<&log::Record<'_>> for Record {
    fn from(record: &log::Record<'_>) -> Self {
        let mut result = Record::new(
            record.target(),
            Severity::from(record.level()),
            record.args().to_string(),
        );
        result.module_path = record
            .module_path_static()
            .map(Cow::Borrowed)
            .or_else(|| record.module_path().map(|s| Cow::Owned(s.to_owned())));
        result.file = record
            .file_static()
            .map(Cow::Borrowed)
            .or_else(|| record.file().map(|s| Cow::Owned(s.to_owned())));
        result.line = record.line();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_ids_differ_between_threads() {
        let here = Record::new("a", Severity::Info, "m").thread();
        let there = std::thread::spawn(|| Record::new("a", Severity::Info, "m").thread())
            .join()
            .unwrap();
        assert_ne!(here, there);
        assert_eq!(here, Record::new("b", Severity::Info, "n").thread());
    }

    #[test]
    fn test_from_log_record() {
        let record = log::Record::builder()
            .target("app.db")
            .level(log::Level::Warn)
            .args(format_args!("pool exhausted"))
            .module_path_static(Some("app::db"))
            .file_static(Some("src/db.rs"))
            .line(Some(42))
            .build();

        let record = Record::from(&record);
        assert_eq!(record.name(), "app.db");
        assert_eq!(record.severity(), Severity::Warning);
        assert_eq!(record.message(), "pool exhausted");
        assert_eq!(record.module_path(), Some("app::db"));
        assert_eq!(record.file(), Some("src/db.rs"));
        assert_eq!(record.line(), Some(42));
    }
}
