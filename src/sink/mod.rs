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

//! Sinks: an appender together with the threshold, layout and filter that decide what reaches it.

use std::fmt;

use crate::Error;
use crate::Record;
use crate::Severity;
use crate::append::Append;
use crate::filter::NameFilter;
use crate::layout::Layout;

mod builder;
mod kind;
mod params;

pub use self::builder::SinkBuilder;
pub use self::kind::SinkKind;

/// One configured output of a logger.
pub struct Sink {
    kind: SinkKind,
    level: Severity,
    layout: Layout,
    filter: Option<NameFilter>,
    append: Box<dyn Append>,
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("kind", &self.kind)
            .field("level", &self.level)
            .field("format", &self.layout.template())
            .field("filter", &self.filter)
            .field("append", &self.append)
            .finish()
    }
}

impl Sink {
    /// Wraps an appender with the `NOTSET` level, the `%(message)s` layout and no filter.
    pub fn new(kind: SinkKind, append: impl Into<Box<dyn Append>>) -> Self {
        Sink {
            kind,
            level: Severity::NotSet,
            layout: Layout::default(),
            filter: None,
            append: append.into(),
        }
    }

    pub fn with_level(mut self, level: Severity) -> Self {
        self.level = level;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_filter(mut self, filter: NameFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    pub fn level(&self) -> Severity {
        self.level
    }

    /// The format template of the layout.
    pub fn format(&self) -> &str {
        self.layout.template()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn filter(&self) -> Option<&NameFilter> {
        self.filter.as_ref()
    }

    /// Whether a record passes the level gate and the name filter of this sink.
    pub fn accepts(&self, record: &Record) -> bool {
        record.severity() >= self.level
            && self
                .filter
                .as_ref()
                .is_none_or(|filter| filter.matches(record.name()))
    }

    /// Formats and writes `record` if the sink accepts it.
    pub fn handle(&self, record: &Record) -> Result<(), Error> {
        if !self.accepts(record) {
            return Ok(());
        }
        let formatted = self.layout.format(record);
        self.append.append(record, &formatted)
    }

    pub fn flush(&self) -> Result<(), Error> {
        self.append.flush()
    }

    /// Releases the resource held by the appender.
    pub fn close(&self) -> Result<(), Error> {
        self.append.close()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::*;
    use crate::append::Stream;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_level_gate() {
        let buffer = Buffer::default();
        let sink =
            Sink::new(SinkKind::Stream, Stream::new(buffer.clone())).with_level(Severity::Warning);

        sink.handle(&Record::new("app", Severity::Info, "quiet"))
            .unwrap();
        sink.handle(&Record::new("app", Severity::Error, "loud"))
            .unwrap();
        assert_eq!(buffer.contents(), "loud\n");
    }

    #[test]
    fn test_filter_gate() {
        let buffer = Buffer::default();
        let filter = NameFilter::from_iter(["app.db", "audit"]);
        let sink = Sink::new(SinkKind::Stream, Stream::new(buffer.clone()))
            .with_layout(Layout::new("%(name)s %(message)s").unwrap())
            .with_filter(filter);

        for name in ["app.db.pool", "app.web", "audit", "auditor"] {
            sink.handle(&Record::new(name, Severity::Info, "x")).unwrap();
        }
        assert_eq!(buffer.contents(), "app.db.pool x\naudit x\n");
        assert_eq!(sink.format(), "%(name)s %(message)s");
    }
}
