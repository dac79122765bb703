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

use std::path::Path;
use std::path::PathBuf;

use crate::Error;
use crate::ErrorKind;
use crate::append;
use crate::append::Append;
use crate::config::HandlerSpec;
use crate::filter::NameFilter;
use crate::layout::DEFAULT_FORMAT;
use crate::layout::Layout;
use crate::sink::Sink;
use crate::sink::SinkKind;
use crate::sink::params;
use crate::sink::params::StreamTarget;

/// Turns [`HandlerSpec`]s into configured [`Sink`]s.
///
/// [`build`](SinkBuilder::build) returns `Ok(Some(sink))` for a usable sink, `Ok(None)` when the
/// handler is skipped (disabled, unknown kind, unsupported syslog transport, appender compiled
/// out) and `Err` when the spec is unusable. Errors of kind [`ErrorKind::PathNotFound`] mean a
/// file-backed handler points at a missing directory; other kinds pass through what the
/// appender constructor reported.
#[derive(Debug, Clone)]
pub struct SinkBuilder<'a> {
    fallback_id: &'a str,
}

impl<'a> SinkBuilder<'a> {
    /// `fallback_id` names the log file of file-backed handlers without a `filename`.
    pub fn new(fallback_id: &'a str) -> Self {
        SinkBuilder { fallback_id }
    }

    pub fn build(&self, spec: &HandlerSpec) -> Result<Option<Sink>, Error> {
        if !spec.enabled {
            log::debug!("skipping disabled {} handler", spec.kind);
            return Ok(None);
        }

        let Some(kind) = SinkKind::parse(&spec.kind) else {
            log::warn!("Bogus log handler '{}'. Skipping", spec.kind);
            return Ok(None);
        };

        let file = if kind.is_file_backed() {
            Some(self.file_path(spec)?)
        } else {
            None
        };

        let format = spec.format.as_deref().unwrap_or(DEFAULT_FORMAT);
        let layout = Layout::new(format)?;

        let append = match file {
            Some(file) => Some(self.file_append(kind, spec, file)?),
            None => self.append(kind, spec)?,
        };
        let Some(append) = append else {
            return Ok(None);
        };
        log::debug!("built {kind} sink at level {}", spec.level);

        let mut sink = Sink::new(kind, append)
            .with_level(spec.level)
            .with_layout(layout);
        if let Some(filters) = spec.filters.as_deref().filter(|f| !f.is_empty()) {
            sink = sink.with_filter(NameFilter::from_values(filters));
        }
        Ok(Some(sink))
    }

    /// Checks that the handler directory exists and joins the log file name onto it.
    fn file_path(&self, spec: &HandlerSpec) -> Result<PathBuf, Error> {
        let path = spec.path.as_deref().unwrap_or_default();
        if path.is_empty() || !Path::new(path).exists() {
            return Err(Error::new(
                ErrorKind::PathNotFound,
                format!("logger path '{path}' doesn't exist"),
            )
            .with_context("type", &spec.kind));
        }

        let filename = match &spec.filename {
            Some(filename) => filename.clone(),
            None => format!("{}.log", self.fallback_id),
        };
        Ok(Path::new(path).join(filename))
    }

    fn file_append(
        &self,
        kind: SinkKind,
        spec: &HandlerSpec,
        file: PathBuf,
    ) -> Result<Box<dyn Append>, Error> {
        if !spec.args.is_empty() {
            log::warn!("ignoring positional args for {kind} handler");
        }
        let kwargs = spec.handler_kwargs.clone();

        let append: Box<dyn Append> = match kind {
            SinkKind::WatchedFile => {
                let params: params::FileParams = params::parse(kind, kwargs)?;
                append::WatchedFile::new(file, params.options(kind)?)?.into()
            }
            SinkKind::RotatingFile => {
                let params: params::RotatingParams = params::parse(kind, kwargs)?;
                let options = params.options(kind)?;
                append::RotatingFile::new(file, options, params.max_bytes, params.backup_count)?
                    .into()
            }
            SinkKind::TimedRotatingFile => {
                let params: params::TimedParams = params::parse(kind, kwargs)?;
                let options = params.options(kind)?;
                append::TimedRotatingFile::new(file, options, params.rotation()?)?.into()
            }
            _ => {
                let params: params::FileParams = params::parse(kind, kwargs)?;
                append::File::new(file, params.options(kind)?)?.into()
            }
        };
        Ok(append)
    }

    fn append(
        &self,
        kind: SinkKind,
        spec: &HandlerSpec,
    ) -> Result<Option<Box<dyn Append>>, Error> {
        let args = &spec.args;
        let kwargs = &spec.handler_kwargs;

        let append: Box<dyn Append> = match kind {
            SinkKind::Stream => {
                let options = params::merge_args(kind, params::STREAM_ARGS, args, kwargs)?;
                let params: params::StreamParams = params::parse(kind, options)?;
                match params.stream {
                    StreamTarget::Stderr => append::Stream::stderr().into(),
                    StreamTarget::Stdout => append::Stream::stdout().into(),
                }
            }
            SinkKind::Socket => {
                let options = params::merge_args(kind, params::SOCKET_ARGS, args, kwargs)?;
                let params: params::SocketParams = params::parse(kind, options)?;
                append::Socket::new(params.host, params.port).into()
            }
            SinkKind::Datagram => {
                let options = params::merge_args(kind, params::SOCKET_ARGS, args, kwargs)?;
                let params: params::SocketParams = params::parse(kind, options)?;
                append::Datagram::new(params.host, params.port).into()
            }
            SinkKind::SysLog => return self.syslog(spec),
            SinkKind::PlatformEventLog => {
                let options = params::merge_args(kind, params::EVENT_LOG_ARGS, args, kwargs)?;
                let params: params::EventLogParams = params::parse(kind, options)?;
                append::PlatformEventLog::new(params.appname, params.dllname, params.logtype)?
                    .into()
            }
            SinkKind::Email => return self.email(spec),
            SinkKind::File
            | SinkKind::WatchedFile
            | SinkKind::RotatingFile
            | SinkKind::TimedRotatingFile => {
                return Err(Error::new(
                    ErrorKind::Unexpected,
                    format!("{kind} handler built without a file path"),
                ));
            }
        };
        Ok(Some(append))
    }

    #[cfg(feature = "append-syslog")]
    fn syslog(&self, spec: &HandlerSpec) -> Result<Option<Box<dyn Append>>, Error> {
        let kind = SinkKind::SysLog;
        let proto = spec.proto.as_deref().unwrap_or("TCP");
        let transport = match proto.parse::<append::SyslogTransport>() {
            Ok(transport) => transport,
            Err(_) => {
                log::warn!("Handling of transport protocol {proto} is not implemented");
                return Ok(None);
            }
        };

        let options =
            params::merge_args(kind, params::SYSLOG_ARGS, &spec.args, &spec.handler_kwargs)?;
        let params: params::SyslogParams = params::parse(kind, options)?;
        let address = match params.address {
            params::AddressParam::Pair(host, port) => append::SyslogAddress::Inet(host, port),
            params::AddressParam::Path(path) => append::SyslogAddress::Unix(PathBuf::from(path)),
        };
        let facility = append::parse_facility(&params.facility.as_text())?;
        let syslog = append::Syslog::connect(address, transport, facility)?;
        Ok(Some(syslog.into()))
    }

    #[cfg(not(feature = "append-syslog"))]
    fn syslog(&self, _: &HandlerSpec) -> Result<Option<Box<dyn Append>>, Error> {
        log::warn!("SysLog handlers are not available in this build. Skipping");
        Ok(None)
    }

    #[cfg(feature = "append-email")]
    fn email(&self, spec: &HandlerSpec) -> Result<Option<Box<dyn Append>>, Error> {
        let kind = SinkKind::Email;
        let options =
            params::merge_args(kind, params::EMAIL_ARGS, &spec.args, &spec.handler_kwargs)?;
        let params: params::EmailParams = params::parse(kind, options)?;

        if params.secure.as_ref().is_some_and(|secure| !secure.is_null()) {
            if params.credentials.is_some() {
                return Err(Error::new(
                    ErrorKind::Unsupported,
                    "secure SMTP connections are not supported",
                )
                .with_context("type", kind));
            }
            log::warn!("ignoring 'secure' for Email handler without credentials");
        }

        let timeout = params.timeout()?;
        let mailhost = match params.mailhost {
            params::HostParam::Host(host) => (host, append::SMTP_PORT),
            params::HostParam::Pair(host, port) => (host, port),
        };
        let email = append::Email::new(append::EmailOptions {
            mailhost,
            fromaddr: params.fromaddr,
            toaddrs: params.toaddrs.into_vec(),
            subject: params.subject,
            credentials: params.credentials,
            timeout,
        })?;
        Ok(Some(email.into()))
    }

    #[cfg(not(feature = "append-email"))]
    fn email(&self, _: &HandlerSpec) -> Result<Option<Box<dyn Append>>, Error> {
        log::warn!("Email handlers are not available in this build. Skipping");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::Severity;

    fn handler(value: serde_json::Value) -> HandlerSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_disabled_and_unknown_are_skipped() {
        let builder = SinkBuilder::new("fallback");
        let disabled = handler(json!({"type": "Stream", "enabled": false}));
        assert!(builder.build(&disabled).unwrap().is_none());
        let bogus = handler(json!({"type": "Bogus"}));
        assert!(builder.build(&bogus).unwrap().is_none());
    }

    #[test]
    fn test_file_backed_kinds_require_path() {
        let builder = SinkBuilder::new("fallback");
        for kind in SinkKind::ALL.iter().filter(|k| k.is_file_backed()) {
            let missing = handler(json!({"type": kind.as_str()}));
            let err = builder.build(&missing).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PathNotFound);

            let nowhere = handler(json!({"type": kind.as_str(), "path": "/does/not/exist"}));
            let err = builder.build(&nowhere).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PathNotFound);
            assert_eq!(err.message(), "logger path '/does/not/exist' doesn't exist");
        }
    }

    #[test]
    fn test_path_is_irrelevant_for_other_kinds() {
        let builder = SinkBuilder::new("fallback");
        let spec = handler(json!({"type": "Stream", "path": "/does/not/exist"}));
        assert!(builder.build(&spec).unwrap().is_some());
        let spec = handler(json!({"type": "Datagram", "args": ["127.0.0.1", 9021]}));
        assert!(builder.build(&spec).unwrap().is_some());
    }

    #[test]
    fn test_file_sink_uses_fallback_filename() {
        let dir = TempDir::new().unwrap();
        let builder = SinkBuilder::new("0123abcd");
        let spec = handler(json!({
            "type": "FileHandler",
            "path": dir.path().to_str().unwrap(),
            "level": "ERROR",
            "format": "%(levelname)s %(message)s",
            "filters": ["app", 42, "audit"],
        }));

        let sink = builder.build(&spec).unwrap().unwrap();
        assert_eq!(sink.kind(), SinkKind::File);
        assert_eq!(sink.level(), Severity::Error);
        assert_eq!(sink.format(), "%(levelname)s %(message)s");
        assert_eq!(sink.filter().unwrap().names(), ["app", "audit"]);
        assert!(dir.path().join("0123abcd.log").exists());
        sink.close().unwrap();
    }

    #[test]
    fn test_handler_format_falls_back_to_default_format() {
        let builder = SinkBuilder::new("fallback");
        let sink = builder
            .build(&handler(json!({"type": "Stream"})))
            .unwrap()
            .unwrap();
        assert_eq!(sink.format(), DEFAULT_FORMAT);
        assert!(sink.filter().is_none());
    }

    #[test]
    fn test_bad_format_is_invalid_config() {
        let builder = SinkBuilder::new("fallback");
        let spec = handler(json!({"type": "Stream", "format": "%(nonsense)s"}));
        let err = builder.build(&spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[cfg(feature = "append-syslog")]
    #[test]
    fn test_unsupported_syslog_proto_is_skipped() {
        let builder = SinkBuilder::new("fallback");
        let spec = handler(json!({"type": "SysLog", "proto": "SCTP"}));
        assert!(builder.build(&spec).unwrap().is_none());
        let spec = handler(json!({"type": "SysLog", "proto": "udp"}));
        assert!(builder.build(&spec).unwrap().is_none());
    }

    #[cfg(feature = "append-syslog")]
    #[test]
    fn test_syslog_udp_address_sequence() {
        let server = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();
        let builder = SinkBuilder::new("fallback");
        let spec = handler(json!({
            "type": "SysLogHandler",
            "proto": "UDP",
            "handler_kwargs": {"address": ["127.0.0.1", port], "facility": "local1"},
        }));
        let sink = builder.build(&spec).unwrap().unwrap();
        assert_eq!(sink.kind(), SinkKind::SysLog);
        sink.close().unwrap();
    }

    #[cfg(feature = "append-email")]
    #[test]
    fn test_email_secure_with_credentials_is_unsupported() {
        let builder = SinkBuilder::new("fallback");
        let spec = handler(json!({
            "type": "Email",
            "args": ["localhost", "a@example.com", ["b@example.com"], "subject"],
            "handler_kwargs": {"credentials": ["u", "p"], "secure": []},
        }));
        let err = builder.build(&spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
