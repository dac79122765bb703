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

//! Appender for the platform event log.
//!
//! On Linux the platform event log is the systemd journal, reached through its native datagram
//! protocol. Other platforms report [`ErrorKind::Unsupported`] when the appender is created.

use crate::Error;
use crate::ErrorKind;
use crate::Severity;
use crate::append::Append;
use crate::record::Record;

mod field;

/// The default log the events are written to.
pub const DEFAULT_LOG_TYPE: &str = "Application";

#[cfg(target_os = "linux")]
const JOURNALD_PATH: &str = "/run/systemd/journal/socket";

/// Maps a severity to a syslog-style journal priority.
fn priority(severity: Severity) -> &'static [u8] {
    match severity {
        Severity::Critical => b"2",
        Severity::Error => b"3",
        Severity::Warning => b"4",
        Severity::Info => b"6",
        Severity::Debug | Severity::NotSet => b"7",
    }
}

/// Builds the journal entry for one record.
fn encode_entry(appname: &str, logtype: &str, record: &Record, formatted: &[u8]) -> Vec<u8> {
    use field::*;

    let mut buffer = vec![];
    put_field(&mut buffer, "PRIORITY", priority(record.severity()));
    put_length_encoded(&mut buffer, "MESSAGE", formatted);
    put_field(
        &mut buffer,
        "SYSLOG_PID",
        record.process().to_string().as_bytes(),
    );
    if !appname.is_empty() {
        put_field(&mut buffer, "SYSLOG_IDENTIFIER", appname.as_bytes());
    }
    put_field(&mut buffer, "EVENT_LOG", logtype.as_bytes());
    if let Some(file) = record.file() {
        put_field(&mut buffer, "CODE_FILE", file.as_bytes());
    }
    if let Some(line) = record.line() {
        put_field(&mut buffer, "CODE_LINE", line.to_string().as_bytes());
    }
    if let Some(module) = record.module_path() {
        put_field(&mut buffer, "CODE_MODULE", module.as_bytes());
    }
    put_field(&mut buffer, "TARGET", record.name().as_bytes());
    buffer
}

/// An appender writing records to the platform event log.
#[derive(Debug)]
pub struct PlatformEventLog {
    appname: String,
    dllname: Option<String>,
    logtype: String,
    #[cfg(target_os = "linux")]
    socket: std::os::unix::net::UnixDatagram,
}

impl PlatformEventLog {
    /// Opens the event log for `appname`.
    ///
    /// `dllname` names a message resource library on platforms that use one; it is kept for
    /// reference and not otherwise interpreted.
    pub fn new(
        appname: impl Into<String>,
        dllname: Option<String>,
        logtype: impl Into<String>,
    ) -> Result<Self, Error> {
        let appname = appname.into();
        let logtype = logtype.into();
        Self::open(appname, dllname, logtype)
    }

    #[cfg(target_os = "linux")]
    fn open(appname: String, dllname: Option<String>, logtype: String) -> Result<Self, Error> {
        let socket = std::os::unix::net::UnixDatagram::unbound().map_err(Error::from_io_error)?;
        let sink = PlatformEventLog {
            appname,
            dllname,
            logtype,
            socket,
        };

        // journald discards empty payloads, so this only checks that someone is listening
        sink.send_payload(&[]).map_err(|err| {
            Error::new(ErrorKind::Unsupported, "platform event log is not available")
                .with_context("socket", JOURNALD_PATH)
                .with_source(err)
        })?;
        Ok(sink)
    }

    #[cfg(not(target_os = "linux"))]
    fn open(appname: String, _: Option<String>, _: String) -> Result<Self, Error> {
        Err(Error::new(
            ErrorKind::Unsupported,
            "platform event log is not supported on this platform",
        )
        .with_context("appname", appname))
    }

    pub fn appname(&self) -> &str {
        &self.appname
    }

    pub fn dllname(&self) -> Option<&str> {
        self.dllname.as_deref()
    }

    pub fn logtype(&self) -> &str {
        &self.logtype
    }

    #[cfg(target_os = "linux")]
    fn send_payload(&self, payload: &[u8]) -> std::io::Result<usize> {
        self.socket.send_to(payload, JOURNALD_PATH)
    }

    #[cfg(not(target_os = "linux"))]
    fn send_payload(&self, _: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
    }
}

impl Append for PlatformEventLog {
    fn append(&self, record: &Record, formatted: &[u8]) -> Result<(), Error> {
        let entry = encode_entry(&self.appname, &self.logtype, record, formatted);
        self.send_payload(&entry).map_err(|err| {
            Error::new(ErrorKind::Io, "failed to write event log entry").with_source(err)
        })?;
        Ok(())
    }
}
