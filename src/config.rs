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

//! Declarative logger and handler specifications.

use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;

use crate::Error;
use crate::Severity;
use crate::layout::DEFAULT_FORMAT;

/// The description of one logger and its handlers.
///
/// Every field has a default, so `{}` is a valid (if unexciting) spec.
///
/// # Examples
///
/// ```
/// use logcompose::Severity;
/// use logcompose::config::LoggerSpec;
///
/// let spec = LoggerSpec::from_json(
///     r#"{"name": "svc", "level": "INFO", "handlers": [{"type": "Stream", "level": "WARNING"}]}"#,
/// )
/// .unwrap();
/// assert_eq!(spec.name.as_deref(), Some("svc"));
/// assert_eq!(spec.level, Severity::Info);
/// assert_eq!(spec.handlers[0].level, Severity::Warning);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggerSpec {
    pub enabled: bool,
    /// Defaults to a freshly generated identifier.
    pub name: Option<String>,
    pub level: Severity,
    /// The logger-level format. Handlers without a `format` of their own use
    /// [`DEFAULT_FORMAT`], not this value.
    pub format: String,
    /// Whether records also flow to registered ancestor loggers.
    pub propagate: bool,
    pub handlers: Vec<HandlerSpec>,
}

impl Default for LoggerSpec {
    fn default() -> Self {
        LoggerSpec {
            enabled: true,
            name: None,
            level: Severity::Debug,
            format: DEFAULT_FORMAT.to_string(),
            propagate: false,
            handlers: vec![],
        }
    }
}

impl LoggerSpec {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(Error::from_config_error)
    }

    pub fn from_value(value: Value) -> Result<Self, Error> {
        serde_json::from_value(value).map_err(Error::from_config_error)
    }
}

/// The description of one sink.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HandlerSpec {
    pub enabled: bool,
    /// The sink kind, resolved when the handler is built.
    #[serde(rename = "type")]
    pub kind: String,
    /// The directory of file-backed sinks.
    pub path: Option<String>,
    pub filename: Option<String>,
    pub level: Severity,
    pub format: Option<String>,
    /// Positional constructor values.
    pub args: Vec<Value>,
    /// Named constructor options.
    pub handler_kwargs: Map<String, Value>,
    /// Name prefixes, any of which lets a record through.
    pub filters: Option<Vec<Value>>,
    /// `TCP` or `UDP`, for syslog handlers.
    pub proto: Option<String>,
}

impl Default for HandlerSpec {
    fn default() -> Self {
        HandlerSpec {
            enabled: true,
            kind: "File".to_string(),
            path: None,
            filename: None,
            level: Severity::Debug,
            format: None,
            args: vec![],
            handler_kwargs: Map::new(),
            filters: None,
            proto: None,
        }
    }
}
