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

//! Typed constructor parameters for each sink kind.
//!
//! Handler specs carry loosely typed `args` and `handler_kwargs`. Positional `args` are mapped
//! onto the parameter names of the kind, merged with the keyword options, and the result is
//! deserialized into the parameter struct of the kind. Keys the struct does not know end up in
//! `extra` and are reported, then ignored.

use std::str::FromStr;
use std::time::Duration;

use jiff::civil::Time;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;

use crate::Error;
use crate::ErrorKind;
use crate::append::FileMode;
use crate::append::FileOptions;
use crate::append::TimedRotation;
use crate::append::When;
use crate::sink::SinkKind;

pub(crate) const STREAM_ARGS: &[&str] = &["stream"];
pub(crate) const SOCKET_ARGS: &[&str] = &["host", "port"];
pub(crate) const SYSLOG_ARGS: &[&str] = &["address", "facility"];
pub(crate) const EVENT_LOG_ARGS: &[&str] = &["appname", "dllname", "logtype"];
pub(crate) const EMAIL_ARGS: &[&str] = &[
    "mailhost",
    "fromaddr",
    "toaddrs",
    "subject",
    "credentials",
    "secure",
    "timeout",
];

/// Builds one keyword map from positional `args` and `kwargs`.
pub(crate) fn merge_args(
    kind: SinkKind,
    names: &[&str],
    args: &[Value],
    kwargs: &Map<String, Value>,
) -> Result<Map<String, Value>, Error> {
    if args.len() > names.len() {
        return Err(Error::new(
            ErrorKind::InvalidConfig,
            format!(
                "takes at most {} positional arguments but {} were given",
                names.len(),
                args.len()
            ),
        )
        .with_context("type", kind));
    }

    let mut merged = kwargs.clone();
    for (name, value) in names.iter().zip(args) {
        if merged.contains_key(*name) {
            return Err(Error::new(
                ErrorKind::InvalidConfig,
                format!("got multiple values for argument '{name}'"),
            )
            .with_context("type", kind));
        }
        merged.insert(name.to_string(), value.clone());
    }
    Ok(merged)
}

/// Deserializes the parameter struct of `kind` from a keyword map.
pub(crate) fn parse<T>(kind: SinkKind, options: Map<String, Value>) -> Result<T, Error>
where
    T: DeserializeOwned + Extra,
{
    let params: T = serde_json::from_value(Value::Object(options))
        .map_err(|err| Error::from_config_error(err).with_context("type", kind))?;
    for key in params.extra().keys() {
        log::warn!("ignoring unknown option '{key}' for {kind} handler");
    }
    Ok(params)
}

/// Access to the options a parameter struct did not recognize.
pub(crate) trait Extra {
    fn extra(&self) -> &Map<String, Value>;
}

macro_rules! impl_extra {
    ($($ty:ty),*) => {
        $(impl Extra for $ty {
            fn extra(&self) -> &Map<String, Value> {
                &self.extra
            }
        })*
    };
}

impl_extra!(
    StreamParams,
    FileParams,
    RotatingParams,
    TimedParams,
    SocketParams,
    SyslogParams,
    EventLogParams,
    EmailParams
);

fn check_encoding(kind: SinkKind, encoding: Option<&str>) -> Result<(), Error> {
    match encoding {
        None => Ok(()),
        Some(encoding) => {
            let normalized = encoding.to_ascii_lowercase().replace(['-', '_'], "");
            if normalized == "utf8" {
                Ok(())
            } else {
                Err(Error::new(
                    ErrorKind::InvalidConfig,
                    format!("unsupported encoding: {encoding}"),
                )
                .with_context("type", kind))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub(crate) enum StreamTarget {
    #[default]
    #[serde(rename = "stderr", alias = "ext://sys.stderr")]
    Stderr,
    #[serde(rename = "stdout", alias = "ext://sys.stdout")]
    Stdout,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StreamParams {
    pub(crate) stream: StreamTarget,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct FileParams {
    mode: FileMode,
    delay: bool,
    encoding: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl FileParams {
    pub(crate) fn options(&self, kind: SinkKind) -> Result<FileOptions, Error> {
        check_encoding(kind, self.encoding.as_deref())?;
        Ok(FileOptions {
            mode: self.mode,
            delay: self.delay,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RotatingParams {
    mode: FileMode,
    delay: bool,
    encoding: Option<String>,
    #[serde(rename = "maxBytes", alias = "max_bytes")]
    pub(crate) max_bytes: u64,
    #[serde(rename = "backupCount", alias = "backup_count")]
    pub(crate) backup_count: usize,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl RotatingParams {
    pub(crate) fn options(&self, kind: SinkKind) -> Result<FileOptions, Error> {
        check_encoding(kind, self.encoding.as_deref())?;
        Ok(FileOptions {
            mode: self.mode,
            delay: self.delay,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub(crate) struct TimedParams {
    when: String,
    interval: u32,
    #[serde(rename = "backupCount", alias = "backup_count")]
    backup_count: usize,
    delay: bool,
    utc: bool,
    #[serde(rename = "atTime", alias = "at_time")]
    at_time: Option<String>,
    encoding: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Default for TimedParams {
    fn default() -> Self {
        TimedParams {
            when: "h".to_string(),
            interval: 1,
            backup_count: 0,
            delay: false,
            utc: false,
            at_time: None,
            encoding: None,
            extra: Map::new(),
        }
    }
}

impl TimedParams {
    pub(crate) fn options(&self, kind: SinkKind) -> Result<FileOptions, Error> {
        check_encoding(kind, self.encoding.as_deref())?;
        Ok(FileOptions {
            mode: FileMode::Append,
            delay: self.delay,
        })
    }

    pub(crate) fn rotation(&self) -> Result<TimedRotation, Error> {
        let when = When::from_str(&self.when)?;
        let at_time = match &self.at_time {
            None => None,
            Some(at) => Some(Time::from_str(at).map_err(|err| {
                Error::new(ErrorKind::InvalidConfig, format!("invalid atTime: {at}"))
                    .with_source(err)
            })?),
        };
        Ok(TimedRotation {
            when,
            interval: self.interval,
            backup_count: self.backup_count,
            utc: self.utc,
            at_time,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SocketParams {
    pub(crate) host: String,
    pub(crate) port: u16,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// A syslog address: a unix socket path, or a `[host, port]` sequence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum AddressParam {
    Path(String),
    Pair(String, u16),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum FacilityParam {
    Name(String),
    Code(u8),
}

impl FacilityParam {
    pub(crate) fn as_text(&self) -> String {
        match self {
            FacilityParam::Name(name) => name.clone(),
            FacilityParam::Code(code) => code.to_string(),
        }
    }
}

impl Default for FacilityParam {
    fn default() -> Self {
        FacilityParam::Name("user".to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub(crate) struct SyslogParams {
    pub(crate) address: AddressParam,
    pub(crate) facility: FacilityParam,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Default for SyslogParams {
    fn default() -> Self {
        SyslogParams {
            address: AddressParam::Pair("localhost".to_string(), 514),
            facility: FacilityParam::default(),
            extra: Map::new(),
        }
    }
}

fn default_log_type() -> String {
    crate::append::DEFAULT_LOG_TYPE.to_string()
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventLogParams {
    pub(crate) appname: String,
    #[serde(default)]
    pub(crate) dllname: Option<String>,
    #[serde(default = "default_log_type")]
    pub(crate) logtype: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum HostParam {
    Host(String),
    Pair(String, u16),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RecipientsParam {
    One(String),
    Many(Vec<String>),
}

impl RecipientsParam {
    pub(crate) fn into_vec(self) -> Vec<String> {
        match self {
            RecipientsParam::One(to) => vec![to],
            RecipientsParam::Many(to) => to,
        }
    }
}

fn default_timeout() -> f64 {
    5.0
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmailParams {
    pub(crate) mailhost: HostParam,
    pub(crate) fromaddr: String,
    pub(crate) toaddrs: RecipientsParam,
    pub(crate) subject: String,
    #[serde(default)]
    pub(crate) credentials: Option<(String, String)>,
    #[serde(default)]
    pub(crate) secure: Option<Value>,
    #[serde(default = "default_timeout")]
    pub(crate) timeout: f64,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl EmailParams {
    pub(crate) fn timeout(&self) -> Result<Duration, Error> {
        Duration::try_from_secs_f64(self.timeout).map_err(|err| {
            Error::new(
                ErrorKind::InvalidConfig,
                format!("invalid timeout: {}", self.timeout),
            )
            .with_source(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn kwargs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_merge_positional_and_keyword() {
        let merged = merge_args(
            SinkKind::Socket,
            SOCKET_ARGS,
            &[json!("collector")],
            &kwargs(json!({"port": 9020})),
        )
        .unwrap();
        let params: SocketParams = parse(SinkKind::Socket, merged).unwrap();
        assert_eq!(params.host, "collector");
        assert_eq!(params.port, 9020);
    }

    #[test]
    fn test_merge_rejects_conflicts() {
        let err = merge_args(
            SinkKind::Socket,
            SOCKET_ARGS,
            &[json!("a"), json!(1), json!(2)],
            &Map::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);

        let err = merge_args(
            SinkKind::Socket,
            SOCKET_ARGS,
            &[json!("a")],
            &kwargs(json!({"host": "b"})),
        )
        .unwrap_err();
        assert!(err.message().contains("'host'"), "{err}");
    }

    #[test]
    fn test_missing_required_parameter() {
        let err = parse::<SocketParams>(SinkKind::Socket, kwargs(json!({"host": "h"}))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_unknown_options_are_kept_aside() {
        let params: StreamParams = parse(
            SinkKind::Stream,
            kwargs(json!({"stream": "ext://sys.stdout", "color": true})),
        )
        .unwrap();
        assert_eq!(params.stream, StreamTarget::Stdout);
        assert!(params.extra.contains_key("color"));
    }

    #[test]
    fn test_file_params() {
        let params: RotatingParams = parse(
            SinkKind::RotatingFile,
            kwargs(json!({"mode": "w", "maxBytes": 1024, "backup_count": 3})),
        )
        .unwrap();
        assert_eq!(params.max_bytes, 1024);
        assert_eq!(params.backup_count, 3);
        let options = params.options(SinkKind::RotatingFile).unwrap();
        assert_eq!(options.mode, FileMode::Truncate);

        let params: FileParams =
            parse(SinkKind::File, kwargs(json!({"encoding": "latin-1"}))).unwrap();
        assert!(params.options(SinkKind::File).is_err());
        let params: FileParams =
            parse(SinkKind::File, kwargs(json!({"encoding": "UTF-8"}))).unwrap();
        assert!(params.options(SinkKind::File).is_ok());
    }

    #[test]
    fn test_timed_params() {
        let params: TimedParams = parse(
            SinkKind::TimedRotatingFile,
            kwargs(json!({"when": "midnight", "backupCount": 7, "atTime": "03:30"})),
        )
        .unwrap();
        let rotation = params.rotation().unwrap();
        assert_eq!(rotation.when, When::Midnight);
        assert_eq!(rotation.backup_count, 7);
        assert_eq!(rotation.at_time, Some(Time::constant(3, 30, 0, 0)));

        let params: TimedParams =
            parse(SinkKind::TimedRotatingFile, kwargs(json!({"when": "X"}))).unwrap();
        assert!(params.rotation().is_err());
    }

    #[test]
    fn test_syslog_params() {
        let params: SyslogParams = parse(SinkKind::SysLog, Map::new()).unwrap();
        assert_eq!(params.address, AddressParam::Pair("localhost".to_string(), 514));
        assert_eq!(params.facility.as_text(), "user");

        let params: SyslogParams = parse(
            SinkKind::SysLog,
            kwargs(json!({"address": ["logs.internal", 1514], "facility": 17})),
        )
        .unwrap();
        assert_eq!(
            params.address,
            AddressParam::Pair("logs.internal".to_string(), 1514)
        );
        assert_eq!(params.facility.as_text(), "17");

        let params: SyslogParams =
            parse(SinkKind::SysLog, kwargs(json!({"address": "/dev/log"}))).unwrap();
        assert_eq!(params.address, AddressParam::Path("/dev/log".to_string()));
    }

    #[test]
    fn test_email_params() {
        let merged = merge_args(
            SinkKind::Email,
            EMAIL_ARGS,
            &[
                json!(["smtp.example.com", 587]),
                json!("app@example.com"),
                json!("ops@example.com"),
                json!("alert"),
            ],
            &Map::new(),
        )
        .unwrap();
        let params: EmailParams = parse(SinkKind::Email, merged).unwrap();
        assert!(matches!(params.mailhost, HostParam::Pair(ref h, 587) if h == "smtp.example.com"));
        assert_eq!(params.toaddrs.into_vec(), vec!["ops@example.com"]);
        assert_eq!(params.timeout, 5.0);
    }
}
