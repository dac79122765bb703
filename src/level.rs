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
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::de;

use crate::Error;
use crate::ErrorKind;

/// The severity of a record, and the threshold of loggers and sinks.
///
/// A record passes a threshold when its severity is greater than or equal to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    /// Lets every record through.
    NotSet = 0,
    /// Detailed diagnostic information.
    #[default]
    Debug = 10,
    /// Confirmation that things work as expected.
    Info = 20,
    /// Something unexpected happened, but the program keeps working.
    Warning = 30,
    /// An operation failed.
    Error = 40,
    /// The program may be unable to continue.
    Critical = 50,
}

/// Name to numeric value table of all severities, highest first.
pub const LOG_LEVELS: [(&str, u8); 6] = [
    ("CRITICAL", 50),
    ("ERROR", 40),
    ("WARNING", 30),
    ("INFO", 20),
    ("DEBUG", 10),
    ("NOTSET", 0),
];

impl Severity {
    /// Returns the canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::NotSet => "NOTSET",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Returns the numeric value.
    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Looks up a severity by its numeric value.
    pub fn from_value(value: u8) -> Option<Severity> {
        match value {
            0 => Some(Severity::NotSet),
            10 => Some(Severity::Debug),
            20 => Some(Severity::Info),
            30 => Some(Severity::Warning),
            40 => Some(Severity::Error),
            50 => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(value) = s.parse::<u8>() {
            return Severity::from_value(value).ok_or_else(|| unknown_level(s));
        }

        match s.to_ascii_uppercase().as_str() {
            "NOTSET" => Ok(Severity::NotSet),
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "CRITICAL" | "FATAL" => Ok(Severity::Critical),
            _ => Err(unknown_level(s)),
        }
    }
}

fn unknown_level(s: &str) -> Error {
    Error::new(ErrorKind::InvalidConfig, format!("unknown level: {s}"))
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SeverityVisitor;

        impl de::Visitor<'_> for SeverityVisitor {
            type Value = Severity;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a level name such as \"INFO\" or one of 0, 10, 20, 30, 40, 50")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Severity, E> {
                Severity::from_str(v).map_err(|err| E::custom(err.message()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Severity, E> {
                u8::try_from(v)
                    .ok()
                    .and_then(Severity::from_value)
                    .ok_or_else(|| E::custom(format!("unknown level: {v}")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Severity, E> {
                u8::try_from(v)
                    .ok()
                    .and_then(Severity::from_value)
                    .ok_or_else(|| E::custom(format!("unknown level: {v}")))
            }
        }

        deserializer.deserialize_any(SeverityVisitor)
    }
}

impl From<log::Level> for Severity {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Severity::Error,
            log::Level::Warn => Severity::Warning,
            log::Level::Info => Severity::Info,
            log::Level::Debug => Severity::Debug,
            log::Level::Trace => Severity::NotSet,
        }
    }
}
