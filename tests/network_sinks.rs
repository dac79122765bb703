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

use std::io::Read;
use std::net::TcpListener;
use std::net::UdpSocket;
use std::time::Duration;

use logcompose::Compiler;
use logcompose::LoggerSpec;
use logcompose::Registry;
use logcompose::SinkKind;
use logcompose::teardown;
use serde_json::json;

fn decode(frame: &[u8]) -> serde_json::Value {
    let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    serde_json::from_slice(&frame[4..4 + len]).unwrap()
}

#[test]
fn test_datagram_handler_from_positional_args() {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    server
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let port = server.local_addr().unwrap().port();

    let registry = Registry::new();
    let spec = LoggerSpec::from_value(json!({
        "name": "udp",
        "handlers": [{
            "type": "DatagramHandler",
            "format": "%(levelname)s:%(message)s",
            "args": ["127.0.0.1", port],
        }],
    }))
    .unwrap();
    let logger = Compiler::new(&registry).compile(&spec, None).unwrap().unwrap();
    assert_eq!(logger.sinks()[0].kind(), SinkKind::Datagram);

    logger.error("disk full");
    let mut buf = [0u8; 4096];
    let n = server.recv(&mut buf).unwrap();
    let payload = decode(&buf[..n]);
    assert_eq!(payload["name"], "udp");
    assert_eq!(payload["msg"], "disk full");
    assert_eq!(payload["message"], "ERROR:disk full");
    assert_eq!(payload["levelno"], 40);

    teardown(Some(&logger)).unwrap();
}

#[test]
fn test_socket_handler_from_keyword_args() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let registry = Registry::new();
    let spec = LoggerSpec::from_value(json!({
        "name": "tcp",
        "handlers": [{
            "type": "Socket",
            "format": "%(message)s",
            "handler_kwargs": {"host": "127.0.0.1", "port": port},
        }],
    }))
    .unwrap();
    let logger = Compiler::new(&registry).compile(&spec, None).unwrap().unwrap();

    logger.warning("first");
    let (mut stream, _) = listener.accept().unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).unwrap();
    let mut body = vec![0u8; u32::from_be_bytes(header) as usize];
    stream.read_exact(&mut body).unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload["message"], "first");
    assert_eq!(payload["levelname"], "WARNING");

    teardown(Some(&logger)).unwrap();
}

#[test]
fn test_socket_handler_missing_port_is_invalid() {
    let registry = Registry::new();
    let spec = LoggerSpec::from_value(json!({
        "handlers": [{"type": "Socket", "args": ["127.0.0.1"]}],
    }))
    .unwrap();
    let err = Compiler::new(&registry).compile(&spec, None).unwrap_err();
    assert_eq!(err.kind(), logcompose::ErrorKind::InvalidConfig);
}

#[cfg(feature = "append-syslog")]
#[test]
fn test_syslog_handler_over_udp() {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    server
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let port = server.local_addr().unwrap().port();

    let registry = Registry::new();
    let spec = LoggerSpec::from_value(json!({
        "name": "syslog",
        "handlers": [
            {"type": "SysLog", "proto": "QUIC"},
            {
                "type": "SysLogHandler",
                "proto": "UDP",
                "format": "%(name)s: %(message)s",
                "handler_kwargs": {"address": ["127.0.0.1", port], "facility": "local0"},
            },
        ],
    }))
    .unwrap();
    let logger = Compiler::new(&registry).compile(&spec, None).unwrap().unwrap();
    assert_eq!(logger.sink_count(), 1);

    logger.critical("meltdown");
    let mut buf = [0u8; 4096];
    let n = server.recv(&mut buf).unwrap();
    let datagram = String::from_utf8_lossy(&buf[..n]);
    // local0 (16) * 8 + critical (2)
    assert!(datagram.starts_with("<130>"), "{datagram}");
    assert!(datagram.contains("syslog: meltdown"), "{datagram}");

    teardown(Some(&logger)).unwrap();
}
