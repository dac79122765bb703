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

//! Appender for writing log records to syslog.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use fasyslog::sender::SyslogSender;

use crate::Error;
use crate::ErrorKind;
use crate::Severity;
use crate::append::Append;
use crate::append::lock;
use crate::record::Record;

// re-exports to avoid version conflicts
mod exported {
    pub use fasyslog::Facility;
    pub use fasyslog::format::SyslogContext;
}
pub use exported::*;

/// The well-known syslog port.
pub const SYSLOG_PORT: u16 = 514;

/// Where syslog messages are delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyslogAddress {
    /// A remote or local daemon reached over the network.
    Inet(String, u16),
    /// A local daemon reached through a Unix domain socket such as `/dev/log`.
    Unix(PathBuf),
}

impl Default for SyslogAddress {
    fn default() -> Self {
        SyslogAddress::Inet("localhost".to_string(), SYSLOG_PORT)
    }
}

impl fmt::Display for SyslogAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyslogAddress::Inet(host, port) => write!(f, "{host}:{port}"),
            SyslogAddress::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// The transport used for network syslog addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyslogTransport {
    #[default]
    Tcp,
    Udp,
}

impl FromStr for SyslogTransport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TCP" => Ok(SyslogTransport::Tcp),
            "UDP" => Ok(SyslogTransport::Udp),
            _ => Err(Error::new(
                ErrorKind::Unsupported,
                format!("unsupported syslog protocol: {s}"),
            )),
        }
    }
}

const FACILITIES: [(&str, u8, Facility); 21] = [
    ("kern", 0, Facility::KERN),
    ("user", 1, Facility::USER),
    ("mail", 2, Facility::MAIL),
    ("daemon", 3, Facility::DAEMON),
    ("auth", 4, Facility::AUTH),
    ("security", 4, Facility::AUTH),
    ("syslog", 5, Facility::SYSLOG),
    ("lpr", 6, Facility::LPR),
    ("news", 7, Facility::NEWS),
    ("uucp", 8, Facility::UUCP),
    ("cron", 9, Facility::CRON),
    ("authpriv", 10, Facility::AUTHPRIV),
    ("ftp", 11, Facility::FTP),
    ("local0", 16, Facility::LOCAL0),
    ("local1", 17, Facility::LOCAL1),
    ("local2", 18, Facility::LOCAL2),
    ("local3", 19, Facility::LOCAL3),
    ("local4", 20, Facility::LOCAL4),
    ("local5", 21, Facility::LOCAL5),
    ("local6", 22, Facility::LOCAL6),
    ("local7", 23, Facility::LOCAL7),
];

/// Resolves a facility from its conventional name (`"local3"`) or numeric code (`19`).
pub fn parse_facility(value: &str) -> Result<Facility, Error> {
    let value = value.trim();
    let found = match value.parse::<u8>() {
        Ok(code) => FACILITIES.iter().find(|(_, c, _)| *c == code),
        Err(_) => FACILITIES
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(value)),
    };
    found.map(|(_, _, facility)| *facility).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("unknown syslog facility: {value}"),
        )
    })
}

fn severity_to_syslog(severity: Severity) -> fasyslog::Severity {
    match severity {
        Severity::Critical => fasyslog::Severity::CRITICAL,
        Severity::Error => fasyslog::Severity::ERROR,
        Severity::Warning => fasyslog::Severity::WARNING,
        Severity::Info => fasyslog::Severity::INFORMATIONAL,
        Severity::Debug | Severity::NotSet => fasyslog::Severity::DEBUG,
    }
}

/// An appender that writes log records to a syslog daemon in RFC 3164 format.
#[derive(Debug)]
pub struct Syslog {
    address: SyslogAddress,
    context: SyslogContext,
    sender: Mutex<Option<SyslogSender>>,
}

impl Syslog {
    /// Connects to the daemon at `address`.
    ///
    /// `transport` applies to network addresses only; Unix socket paths pick stream or datagram
    /// mode by probing the socket.
    pub fn connect(
        address: SyslogAddress,
        transport: SyslogTransport,
        facility: Facility,
    ) -> Result<Self, Error> {
        let sender = open_sender(&address, transport).map_err(|err| {
            Error::new(ErrorKind::Io, "failed to connect to syslog")
                .with_context("address", &address)
                .with_source(err)
        })?;

        let mut context = SyslogContext::default();
        context.facility(facility);

        Ok(Syslog {
            address,
            context,
            sender: Mutex::new(Some(sender)),
        })
    }

    pub fn address(&self) -> &SyslogAddress {
        &self.address
    }
}

fn open_sender(address: &SyslogAddress, transport: SyslogTransport) -> io::Result<SyslogSender> {
    match (address, transport) {
        (SyslogAddress::Inet(host, port), SyslogTransport::Tcp) => {
            fasyslog::sender::tcp((host.as_str(), *port)).map(SyslogSender::Tcp)
        }
        (SyslogAddress::Inet(host, port), SyslogTransport::Udp) => {
            fasyslog::sender::udp("0.0.0.0:0", (host.as_str(), *port)).map(SyslogSender::Udp)
        }
        #[cfg(unix)]
        (SyslogAddress::Unix(path), _) => fasyslog::sender::unix(path),
        #[cfg(not(unix))]
        (SyslogAddress::Unix(_), _) => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix domain sockets are not available on this platform",
        )),
    }
}

impl Append for Syslog {
    fn append(&self, record: &Record, formatted: &[u8]) -> Result<(), Error> {
        let severity = severity_to_syslog(record.severity());
        let message = String::from_utf8_lossy(formatted);
        let message = format!("{}", self.context.format_rfc3164(severity, Some(message)));

        let mut sender = lock(&self.sender);
        match sender.as_mut() {
            Some(sender) => sender.send_formatted(message.as_bytes()).map_err(|err| {
                Error::new(ErrorKind::Io, "failed to send syslog message")
                    .with_context("address", &self.address)
                    .with_source(err)
            }),
            None => Ok(()),
        }
    }

    fn flush(&self) -> Result<(), Error> {
        match lock(&self.sender).as_mut() {
            Some(sender) => sender.flush().map_err(Error::from_io_error),
            None => Ok(()),
        }
    }

    fn close(&self) -> Result<(), Error> {
        match lock(&self.sender).take() {
            Some(mut sender) => sender.flush().map_err(Error::from_io_error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::UdpSocket;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_parse_facility() {
        assert_eq!(parse_facility("local3").unwrap(), Facility::LOCAL3);
        assert_eq!(parse_facility("DAEMON").unwrap(), Facility::DAEMON);
        assert_eq!(parse_facility("1").unwrap(), Facility::USER);
        assert_eq!(parse_facility("security").unwrap(), Facility::AUTH);
        assert!(parse_facility("local9").is_err());
        assert!(parse_facility("99").is_err());
    }

    #[test]
    fn test_transport_names_are_exact() {
        assert_eq!("UDP".parse::<SyslogTransport>().unwrap(), SyslogTransport::Udp);
        assert_eq!("TCP".parse::<SyslogTransport>().unwrap(), SyslogTransport::Tcp);
        for proto in ["udp", "Tcp", "SCTP"] {
            let err = proto.parse::<SyslogTransport>().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unsupported);
        }
    }

    #[test]
    fn test_udp_delivery_and_close() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let port = server.local_addr().unwrap().port();

        let syslog = Syslog::connect(
            SyslogAddress::Inet("127.0.0.1".to_string(), port),
            SyslogTransport::Udp,
            Facility::LOCAL0,
        )
        .unwrap();

        let record = Record::new("app", Severity::Warning, "disk almost full");
        syslog.append(&record, b"disk almost full").unwrap();

        let mut buf = [0u8; 1024];
        let n = server.recv(&mut buf).unwrap();
        let datagram = String::from_utf8_lossy(&buf[..n]);
        // local0 (16) * 8 + warning (4)
        assert!(datagram.starts_with("<132>"), "{datagram}");
        assert!(datagram.contains("disk almost full"), "{datagram}");

        syslog.close().unwrap();
        syslog.close().unwrap();
        syslog.append(&record, b"after close").unwrap();
    }
}
