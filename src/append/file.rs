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

use std::ffi::OsString;
use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Deserialize;

use crate::Error;
use crate::ErrorKind;
use crate::append::Append;
use crate::append::lock;
use crate::record::Record;

/// How a log file is opened the first time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum FileMode {
    /// Keep existing content and append to it.
    #[default]
    #[serde(rename = "a")]
    Append,
    /// Truncate existing content.
    #[serde(rename = "w")]
    Truncate,
}

/// Options shared by the file-backed appenders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileOptions {
    pub mode: FileMode,
    /// Defer opening the file until the first record arrives.
    pub delay: bool,
}

/// An open-on-demand log file.
#[derive(Debug)]
pub(crate) struct FileWriter {
    path: PathBuf,
    truncate: bool,
    file: Option<fs::File>,
    closed: bool,
}

impl FileWriter {
    pub(crate) fn new(path: PathBuf, options: FileOptions) -> Result<Self, Error> {
        let mut writer = FileWriter {
            path,
            truncate: options.mode == FileMode::Truncate,
            file: None,
            closed: false,
        };
        if !options.delay {
            if let Err(err) = writer.open() {
                return Err(writer.error("failed to open log file", err));
            }
        }
        Ok(writer)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Opens the file unless it is already open; only the first open honors truncation.
    pub(crate) fn open(&mut self) -> io::Result<&mut fs::File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                let mut options = fs::OpenOptions::new();
                options.create(true);
                if self.truncate {
                    options.write(true).truncate(true);
                } else {
                    options.append(true);
                }
                let file = options.open(&self.path)?;
                self.truncate = false;
                file
            }
        };
        Ok(self.file.insert(file))
    }

    /// Drops the current handle so the next write opens the path afresh.
    pub(crate) fn release(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(mut file) => file.flush(),
            None => Ok(()),
        }
    }

    pub(crate) fn write_line(&mut self, formatted: &[u8]) -> io::Result<usize> {
        let mut bytes = Vec::with_capacity(formatted.len() + 1);
        bytes.extend_from_slice(formatted);
        bytes.push(b'\n');
        let file = self.open()?;
        file.write_all(&bytes)?;
        Ok(bytes.len())
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    pub(crate) fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        self.release()
    }

    pub(crate) fn error(&self, message: &'static str, err: io::Error) -> Error {
        Error::new(ErrorKind::Io, message)
            .with_context("path", self.path.display())
            .with_source(err)
    }
}

/// Returns `path` with `.suffix` appended to its final component.
pub(crate) fn with_suffix(path: &Path, suffix: impl AsRef<str>) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix.as_ref());
    PathBuf::from(name)
}

/// An appender writing one line per record to a file.
#[derive(Debug)]
pub struct File {
    writer: Mutex<FileWriter>,
}

impl File {
    /// Opens (or, with `delay`, prepares to open) the file at `path`.
    pub fn new(path: impl Into<PathBuf>, options: FileOptions) -> Result<Self, Error> {
        let writer = FileWriter::new(path.into(), options)?;
        Ok(File {
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> PathBuf {
        lock(&self.writer).path().to_path_buf()
    }
}

impl Append for File {
    fn append(&self, _: &Record, formatted: &[u8]) -> Result<(), Error> {
        let mut writer = lock(&self.writer);
        if writer.is_closed() {
            return Ok(());
        }
        match writer.write_line(formatted) {
            Ok(_) => Ok(()),
            Err(err) => Err(writer.error("failed to write log file", err)),
        }
    }

    fn flush(&self) -> Result<(), Error> {
        let mut writer = lock(&self.writer);
        writer
            .flush()
            .map_err(|err| writer.error("failed to flush log file", err))
    }

    fn close(&self) -> Result<(), Error> {
        let mut writer = lock(&self.writer);
        writer
            .close()
            .map_err(|err| writer.error("failed to close log file", err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity(u64, u64);

impl FileIdentity {
    #[cfg(unix)]
    fn of(metadata: &fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        FileIdentity(metadata.dev(), metadata.ino())
    }

    #[cfg(not(unix))]
    fn of(_: &fs::Metadata) -> Self {
        FileIdentity(0, 0)
    }
}

#[derive(Debug)]
struct Watched {
    writer: FileWriter,
    identity: Option<FileIdentity>,
}

impl Watched {
    fn reopen_if_needed(&mut self) -> io::Result<()> {
        let current = fs::metadata(self.writer.path())
            .ok()
            .map(|metadata| FileIdentity::of(&metadata));

        if self.writer.is_open() && current.is_some() && current == self.identity {
            return Ok(());
        }

        self.writer.release()?;
        let metadata = self.writer.open()?.metadata()?;
        self.identity = Some(FileIdentity::of(&metadata));
        Ok(())
    }
}

/// A file appender that notices when its file is moved or deleted.
///
/// Before each write the path is checked again; if the file is gone or has been replaced (for
/// example by an external log rotation tool), the path is reopened and writing continues in the
/// new file.
#[derive(Debug)]
pub struct WatchedFile {
    state: Mutex<Watched>,
}

impl WatchedFile {
    pub fn new(path: impl Into<PathBuf>, options: FileOptions) -> Result<Self, Error> {
        let mut writer = FileWriter::new(path.into(), options)?;
        let identity = if writer.is_open() {
            let metadata = writer
                .open()
                .and_then(|file| file.metadata())
                .map_err(|err| writer.error("failed to stat log file", err))?;
            Some(FileIdentity::of(&metadata))
        } else {
            None
        };

        Ok(WatchedFile {
            state: Mutex::new(Watched { writer, identity }),
        })
    }
}

impl Append for WatchedFile {
    fn append(&self, _: &Record, formatted: &[u8]) -> Result<(), Error> {
        let mut state = lock(&self.state);
        if state.writer.is_closed() {
            return Ok(());
        }
        let result = state
            .reopen_if_needed()
            .and_then(|()| state.writer.write_line(formatted));
        match result {
            Ok(_) => Ok(()),
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
