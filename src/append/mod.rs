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

//! Appenders are the resource-owning half of a sink: they write formatted records somewhere.

use std::fmt;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use crate::Error;
use crate::record::Record;

#[cfg(feature = "append-email")]
mod email;
mod eventlog;
mod file;
mod rotating;
mod socket;
mod stream;
#[cfg(feature = "append-syslog")]
mod syslog;
mod timed;

#[cfg(feature = "append-email")]
pub use self::email::Email;
#[cfg(feature = "append-email")]
pub use self::email::EmailOptions;
#[cfg(feature = "append-email")]
pub use self::email::SMTP_PORT;
pub use self::eventlog::DEFAULT_LOG_TYPE;
pub use self::eventlog::PlatformEventLog;
pub use self::file::File;
pub use self::file::FileMode;
pub use self::file::FileOptions;
pub use self::file::WatchedFile;
pub use self::rotating::RotatingFile;
pub use self::socket::Datagram;
pub use self::socket::Socket;
pub use self::socket::encode_frame;
pub use self::stream::Stream;
#[cfg(feature = "append-syslog")]
pub use self::syslog::Facility;
#[cfg(feature = "append-syslog")]
pub use self::syslog::SYSLOG_PORT;
#[cfg(feature = "append-syslog")]
pub use self::syslog::Syslog;
#[cfg(feature = "append-syslog")]
pub use self::syslog::SyslogAddress;
#[cfg(feature = "append-syslog")]
pub use self::syslog::SyslogTransport;
#[cfg(feature = "append-syslog")]
pub use self::syslog::parse_facility;
pub use self::timed::TimedRotatingFile;
pub use self::timed::TimedRotation;
pub use self::timed::When;

/// An appender writes formatted records to the resource it owns.
pub trait Append: fmt::Debug + Send + Sync + 'static {
    /// Writes one record. `formatted` is the record rendered by the sink's layout, without a
    /// trailing newline.
    fn append(&self, record: &Record, formatted: &[u8]) -> Result<(), Error>;

    /// Flushes any buffered records.
    ///
    /// Default to a no-op.
    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Releases the underlying resource.
    ///
    /// Appenders owning an OS resource drop records appended after close. Closing twice is a
    /// no-op.
    fn close(&self) -> Result<(), Error> {
        self.flush()
    }
}

impl<T: Append> From<T> for Box<dyn Append> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
