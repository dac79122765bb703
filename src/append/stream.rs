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

use std::fmt;
use std::io;
use std::io::Write;
use std::sync::Mutex;

use crate::Error;
use crate::append::Append;
use crate::append::lock;
use crate::record::Record;

enum Target {
    Stdout,
    Stderr,
    Writer(Mutex<Box<dyn Write + Send>>),
}

/// An appender that writes one line per record to stdout, stderr, or any [`Write`].
///
/// Closing a stream only flushes it; the stream itself belongs to whoever created it.
pub struct Stream {
    target: Target,
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match self.target {
            Target::Stdout => "stdout",
            Target::Stderr => "stderr",
            Target::Writer(_) => "writer",
        };
        f.debug_struct("Stream").field("target", &target).finish()
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::stderr()
    }
}

impl Stream {
    /// Creates a stream appender writing to stdout.
    pub fn stdout() -> Self {
        Self {
            target: Target::Stdout,
        }
    }

    /// Creates a stream appender writing to stderr.
    pub fn stderr() -> Self {
        Self {
            target: Target::Stderr,
        }
    }

    /// Creates a stream appender writing to the given writer.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            target: Target::Writer(Mutex::new(Box::new(writer))),
        }
    }

    fn write_line(&self, bytes: &[u8]) -> io::Result<()> {
        match &self.target {
            Target::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(bytes)?;
                stdout.flush()
            }
            Target::Stderr => {
                let mut stderr = io::stderr().lock();
                stderr.write_all(bytes)?;
                stderr.flush()
            }
            Target::Writer(writer) => {
                let mut writer = lock(writer);
                writer.write_all(bytes)?;
                writer.flush()
            }
        }
    }
}

impl Append for Stream {
    fn append(&self, _: &Record, formatted: &[u8]) -> Result<(), Error> {
        let mut bytes = Vec::with_capacity(formatted.len() + 1);
        bytes.extend_from_slice(formatted);
        bytes.push(b'\n');
        self.write_line(&bytes).map_err(Error::from_io_error)
    }

    fn flush(&self) -> Result<(), Error> {
        let result = match &self.target {
            Target::Stdout => io::stdout().flush(),
            Target::Stderr => io::stderr().flush(),
            Target::Writer(writer) => lock(writer).flush(),
        };
        result.map_err(Error::from_io_error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::Severity;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            lock(&self.0).write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writes_one_line_per_record() {
        let buffer = Buffer::default();
        let stream = Stream::new(buffer.clone());
        let record = Record::new("app", Severity::Info, "ignored");

        stream.append(&record, b"first").unwrap();
        stream.append(&record, b"second").unwrap();
        stream.close().unwrap();

        assert_eq!(lock(&buffer.0).as_slice(), b"first\nsecond\n");
    }
}
