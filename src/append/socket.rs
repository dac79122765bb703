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

//! Appenders shipping records to a remote collector, one length-prefixed JSON frame per record.
//!
//! Each frame is a 4-byte big-endian length followed by a JSON object carrying the record
//! attributes and the formatted message.

use std::io;
use std::io::Write;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::net::UdpSocket;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use serde::Serialize;

use crate::Error;
use crate::ErrorKind;
use crate::append::Append;
use crate::append::lock;
use crate::record::Record;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const RETRY_START: Duration = Duration::from_secs(1);
const RETRY_MAX: Duration = Duration::from_secs(30);
const RETRY_FACTOR: u32 = 2;

#[derive(Serialize)]
struct Payload<'a> {
    name: &'a str,
    levelname: &'a str,
    levelno: u8,
    msg: &'a str,
    message: &'a str,
    created: f64,
    pathname: Option<&'a str>,
    lineno: Option<u32>,
    module: Option<&'a str>,
    process: u32,
    thread: u64,
    #[serde(rename = "threadName")]
    thread_name: Option<&'a str>,
}

/// Serializes a record into a length-prefixed frame.
pub fn encode_frame(record: &Record, formatted: &[u8]) -> Result<Vec<u8>, Error> {
    let message = String::from_utf8_lossy(formatted);
    let payload = Payload {
        name: record.name(),
        levelname: record.severity().as_str(),
        levelno: record.severity().value(),
        msg: record.message(),
        message: &message,
        created: record.created(),
        pathname: record.file(),
        lineno: record.line(),
        module: record.module_path(),
        process: record.process(),
        thread: record.thread(),
        thread_name: record.thread_name(),
    };

    let body = serde_json::to_vec(&payload).map_err(|err| {
        Error::new(ErrorKind::Unexpected, "failed to encode record").with_source(err)
    })?;
    let len = u32::try_from(body.len())
        .map_err(|_| Error::new(ErrorKind::Unexpected, "record too large to frame"))?;

    let mut frame = Vec::with_capacity(body.len() + 4);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address found for {host}:{port}"),
        )
    })
}

#[derive(Debug)]
struct Connection {
    stream: Option<TcpStream>,
    retry_at: Option<Instant>,
    retry_delay: Duration,
    closed: bool,
}

impl Connection {
    fn connect(&mut self, host: &str, port: u16) -> Option<&mut TcpStream> {
        if self.stream.is_none() {
            let now = Instant::now();
            if self.retry_at.is_some_and(|at| now < at) {
                return None;
            }

            let stream = resolve(host, port)
                .and_then(|addr| TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT));
            match stream {
                Ok(stream) => {
                    self.retry_at = None;
                    self.retry_delay = RETRY_START;
                    self.stream = Some(stream);
                }
                Err(err) => {
                    log::debug!("failed to connect to {host}:{port}: {err}");
                    if self.retry_at.is_some() {
                        self.retry_delay = (self.retry_delay * RETRY_FACTOR).min(RETRY_MAX);
                    }
                    self.retry_at = Some(now + self.retry_delay);
                    return None;
                }
            }
        }
        self.stream.as_mut()
    }
}

/// An appender streaming records to a TCP collector.
///
/// The connection is made lazily. While the collector is unreachable, records are dropped and
/// reconnection is attempted with exponential back-off, starting at one second and capped at
/// thirty seconds.
#[derive(Debug)]
pub struct Socket {
    host: String,
    port: u16,
    connection: Mutex<Connection>,
}

impl Socket {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Socket {
            host: host.into(),
            port,
            connection: Mutex::new(Connection {
                stream: None,
                retry_at: None,
                retry_delay: RETRY_START,
                closed: false,
            }),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Append for Socket {
    fn append(&self, record: &Record, formatted: &[u8]) -> Result<(), Error> {
        let frame = encode_frame(record, formatted)?;

        let mut connection = lock(&self.connection);
        if connection.closed {
            return Ok(());
        }
        let Some(stream) = connection.connect(&self.host, self.port) else {
            return Ok(());
        };
        if let Err(err) = stream.write_all(&frame) {
            log::debug!("dropping connection to {}:{}: {err}", self.host, self.port);
            connection.stream = None;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        match lock(&self.connection).stream.as_mut() {
            Some(stream) => stream.flush().map_err(Error::from_io_error),
            None => Ok(()),
        }
    }

    fn close(&self) -> Result<(), Error> {
        let mut connection = lock(&self.connection);
        connection.closed = true;
        match connection.stream.take() {
            Some(stream) => match stream.shutdown(std::net::Shutdown::Both) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
                Err(err) => Err(Error::new(ErrorKind::Io, "failed to close socket")
                    .with_context("address", format!("{}:{}", self.host, self.port))
                    .with_source(err)),
            },
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
struct Endpoint {
    socket: Option<UdpSocket>,
    closed: bool,
}

/// An appender sending each record as a single UDP datagram.
#[derive(Debug)]
pub struct Datagram {
    host: String,
    port: u16,
    endpoint: Mutex<Endpoint>,
}

impl Datagram {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Datagram {
            host: host.into(),
            port,
            endpoint: Mutex::new(Endpoint {
                socket: None,
                closed: false,
            }),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn send(&self, endpoint: &mut Endpoint, frame: &[u8]) -> io::Result<()> {
        let target = resolve(&self.host, self.port)?;
        let socket = match endpoint.socket.take() {
            Some(socket) => socket,
            None => {
                let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
                UdpSocket::bind(local)?
            }
        };
        let socket = endpoint.socket.insert(socket);
        socket.send_to(frame, target)?;
        Ok(())
    }
}

impl Append for Datagram {
    fn append(&self, record: &Record, formatted: &[u8]) -> Result<(), Error> {
        let frame = encode_frame(record, formatted)?;

        let mut endpoint = lock(&self.endpoint);
        if endpoint.closed {
            return Ok(());
        }
        self.send(&mut endpoint, &frame).map_err(|err| {
            Error::new(ErrorKind::Io, "failed to send datagram")
                .with_context("address", format!("{}:{}", self.host, self.port))
                .with_source(err)
        })
    }

    fn close(&self) -> Result<(), Error> {
        let mut endpoint = lock(&self.endpoint);
        endpoint.closed = true;
        endpoint.socket = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::TcpListener;

    use super::*;
    use crate::Severity;

    fn decode(frame: &[u8]) -> serde_json::Value {
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(frame.len(), len + 4);
        serde_json::from_slice(&frame[4..]).unwrap()
    }

    #[test]
    fn test_frame_layout() {
        let record = Record::new("app.db", Severity::Error, "query failed").with_line(7);
        let frame = encode_frame(&record, b"ERROR query failed").unwrap();
        let value = decode(&frame);
        assert_eq!(value["name"], "app.db");
        assert_eq!(value["levelname"], "ERROR");
        assert_eq!(value["levelno"], 40);
        assert_eq!(value["msg"], "query failed");
        assert_eq!(value["message"], "ERROR query failed");
        assert_eq!(value["lineno"], 7);
    }

    #[test]
    fn test_datagram_delivery() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let port = server.local_addr().unwrap().port();

        let datagram = Datagram::new("127.0.0.1", port);
        let record = Record::new("app", Severity::Info, "hello");
        datagram.append(&record, b"hello").unwrap();

        let mut buf = [0u8; 4096];
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(decode(&buf[..n])["message"], "hello");

        datagram.close().unwrap();
        datagram.append(&record, b"dropped").unwrap();
    }

    #[test]
    fn test_socket_delivery() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let socket = Socket::new("127.0.0.1", port);
        let record = Record::new("app", Severity::Warning, "careful");
        socket.append(&record, b"careful").unwrap();

        let (mut stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let mut header = [0u8; 4];
        stream.read_exact(&mut header).unwrap();
        let mut body = vec![0u8; u32::from_be_bytes(header) as usize];
        stream.read_exact(&mut body).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["levelname"], "WARNING");

        socket.close().unwrap();
        socket.close().unwrap();
    }

    #[test]
    fn test_unreachable_socket_drops_records() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let socket = Socket::new("127.0.0.1", port);
        let record = Record::new("app", Severity::Info, "lost");
        socket.append(&record, b"lost").unwrap();
        socket.append(&record, b"lost again").unwrap();
        socket.close().unwrap();
    }
}
