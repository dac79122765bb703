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

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::Error;
use crate::append::Append;
use crate::append::FileOptions;
use crate::append::file::FileWriter;
use crate::append::file::with_suffix;
use crate::append::lock;
use crate::record::Record;

#[derive(Debug)]
struct State {
    writer: FileWriter,
    max_bytes: u64,
    backup_count: usize,
    current_size: u64,
}

impl State {
    fn should_rollover(&self, incoming: u64) -> bool {
        self.max_bytes > 0
            && self.backup_count > 0
            && self.current_size > 0
            && self.current_size + incoming >= self.max_bytes
    }

    /// Shifts `name.N-1` to `name.N` down to `name` to `name.1`, dropping the oldest backup.
    fn rollover(&mut self) -> io::Result<()> {
        self.writer.release()?;

        let base = self.writer.path().to_path_buf();
        for i in (1..self.backup_count).rev() {
            let source = with_suffix(&base, i.to_string());
            if source.exists() {
                let target = with_suffix(&base, (i + 1).to_string());
                if target.exists() {
                    fs::remove_file(&target)?;
                }
                fs::rename(&source, &target)?;
            }
        }

        let first = with_suffix(&base, "1");
        if first.exists() {
            fs::remove_file(&first)?;
        }
        if base.exists() {
            fs::rename(&base, &first)?;
        }

        self.writer.open()?;
        self.current_size = 0;
        Ok(())
    }
}

/// A file appender that rolls over once the file reaches a size threshold.
///
/// Backups are named `<file>.1` (newest) up to `<file>.<backup_count>` (oldest). Rollover is
/// disabled unless both `max_bytes` and `backup_count` are positive.
#[derive(Debug)]
pub struct RotatingFile {
    state: Mutex<State>,
}

impl RotatingFile {
    pub fn new(
        path: impl Into<PathBuf>,
        options: FileOptions,
        max_bytes: u64,
        backup_count: usize,
    ) -> Result<Self, Error> {
        let writer = FileWriter::new(path.into(), options)?;
        let current_size = fs::metadata(writer.path()).map(|m| m.len()).unwrap_or(0);

        Ok(RotatingFile {
            state: Mutex::new(State {
                writer,
                max_bytes,
                backup_count,
                current_size,
            }),
        })
    }
}

impl Append for RotatingFile {
    fn append(&self, _: &Record, formatted: &[u8]) -> Result<(), Error> {
        let mut state = lock(&self.state);
        if state.writer.is_closed() {
            return Ok(());
        }

        let incoming = formatted.len() as u64 + 1;
        if state.should_rollover(incoming) {
            if let Err(err) = state.rollover() {
                return Err(state.writer.error("failed to rotate log file", err));
            }
        }

        match state.writer.write_line(formatted) {
            Ok(n) => {
                state.current_size += n as u64;
                Ok(())
            }
            Err(err) => Err(state.writer.error("failed to write log file", err)),
        }
    }

    fn flush(&self) -> Result<(), Error> {
        let mut state = lock(&self.state);
        state
            .writer
            .flush()
            .map_err(|err| state.writer.error("failed to flush log file", err))
    }

    fn close(&self) -> Result<(), Error> {
        let mut state = lock(&self.state);
        state
            .writer
            .close()
            .map_err(|err| state.writer.error("failed to close log file", err))
    }
}
