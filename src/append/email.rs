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

//! Appender sending each record as an email over SMTP.

use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::Error;
use crate::ErrorKind;
use crate::append::Append;
use crate::append::lock;
use crate::record::Record;

/// The default SMTP port.
pub const SMTP_PORT: u16 = 25;

/// How to reach the mail server and address the messages.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailOptions {
    pub mailhost: (String, u16),
    pub fromaddr: String,
    pub toaddrs: Vec<String>,
    pub subject: String,
    /// `(username, password)` for `AUTH PLAIN`.
    pub credentials: Option<(String, String)>,
    pub timeout: Duration,
}

impl Default for EmailOptions {
    fn default() -> Self {
        EmailOptions {
            mailhost: ("localhost".to_string(), SMTP_PORT),
            fromaddr: String::new(),
            toaddrs: vec![],
            subject: String::new(),
            credentials: None,
            timeout: Duration::from_secs(5),
        }
    }
}

/// An appender mailing every record it receives.
///
/// Each record opens a fresh SMTP session, which makes this appender suitable for rare,
/// high-severity records only.
#[derive(Debug)]
pub struct Email {
    options: EmailOptions,
    closed: Mutex<bool>,
}

impl Email {
    pub fn new(options: EmailOptions) -> Result<Self, Error> {
        if options.toaddrs.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidConfig,
                "email sink requires at least one recipient",
            ));
        }
        Ok(Email {
            options,
            closed: Mutex::new(false),
        })
    }

    pub fn options(&self) -> &EmailOptions {
        &self.options
    }

    fn message(&self, record: &Record, formatted: &[u8]) -> String {
        let body = String::from_utf8_lossy(formatted);
        let mut message = format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\n\
             Content-Type: text/plain; charset=\"utf-8\"\r\n\r\n",
            self.options.fromaddr,
            self.options.toaddrs.join(","),
            self.options.subject,
            record.time().strftime("%a, %d %b %Y %H:%M:%S %z"),
        );
        for line in body.lines() {
            if line.starts_with('.') {
                message.push('.');
            }
            message.push_str(line);
            message.push_str("\r\n");
        }
        message.push_str(".\r\n");
        message
    }

    fn send(&self, message: &str) -> io::Result<()> {
        let (host, port) = &self.options.mailhost;
        let addr = (host.as_str(), *port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "mail host not found"))?;
        let stream = TcpStream::connect_timeout(&addr, self.options.timeout)?;
        stream.set_read_timeout(Some(self.options.timeout))?;
        stream.set_write_timeout(Some(self.options.timeout))?;

        let mut session = Session {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
        };
        session.expect(&[220])?;
        if session.command("EHLO localhost", &[250]).is_err() {
            session.command("HELO localhost", &[250])?;
        }
        if let Some((username, password)) = &self.options.credentials {
            let token = STANDARD.encode(format!("\0{username}\0{password}"));
            session.command(&format!("AUTH PLAIN {token}"), &[235])?;
        }
        session.command(&format!("MAIL FROM:<{}>", self.options.fromaddr), &[250])?;
        for to in &self.options.toaddrs {
            session.command(&format!("RCPT TO:<{to}>"), &[250, 251])?;
        }
        session.command("DATA", &[354])?;
        session.writer.write_all(message.as_bytes())?;
        session.expect(&[250])?;
        session.command("QUIT", &[221])
    }
}

struct Session {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Session {
    fn command(&mut self, line: &str, accepted: &[u16]) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        self.expect(accepted)
    }

    /// Reads a possibly multi-line reply and checks its code.
    fn expect(&mut self, accepted: &[u16]) -> io::Result<()> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "mail server closed the connection",
                ));
            }
            let code = line
                .get(..3)
                .and_then(|code| code.parse::<u16>().ok())
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidData, format!("bad reply: {line:?}"))
                })?;
            if line.as_bytes().get(3) == Some(&b'-') {
                continue;
            }
            return if accepted.contains(&code) {
                Ok(())
            } else {
                Err(io::Error::other(format!(
                    "unexpected reply: {}",
                    line.trim_end()
                )))
            };
        }
    }
}

impl Append for Email {
    fn append(&self, record: &Record, formatted: &[u8]) -> Result<(), Error> {
        if *lock(&self.closed) {
            return Ok(());
        }
        let message = self.message(record, formatted);
        self.send(&message).map_err(|err| {
            let (host, port) = &self.options.mailhost;
            Error::new(ErrorKind::Io, "failed to send email")
                .with_context("mailhost", format!("{host}:{port}"))
                .with_source(err)
        })
    }

    fn close(&self) -> Result<(), Error> {
        *lock(&self.closed) = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    use super::*;
    use crate::Severity;

    /// Accepts one session, replies to every command and returns the transcript.
    fn fake_server(listener: TcpListener) -> thread::JoinHandle<String> {
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            let mut transcript = String::new();

            writer.write_all(b"220 localhost ready\r\n").unwrap();
            let mut in_data = false;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 {
                    break;
                }
                transcript.push_str(&line);
                if in_data {
                    if line == ".\r\n" {
                        in_data = false;
                        writer.write_all(b"250 queued\r\n").unwrap();
                    }
                    continue;
                }
                let reply: &[u8] = match line.get(..4).unwrap_or_default() {
                    "EHLO" => b"250-localhost\r\n250 AUTH PLAIN\r\n",
                    "AUTH" => b"235 ok\r\n",
                    "DATA" => {
                        in_data = true;
                        b"354 go ahead\r\n"
                    }
                    "QUIT" => {
                        writer.write_all(b"221 bye\r\n").unwrap();
                        let mut rest = vec![];
                        let _ = reader.read_to_end(&mut rest);
                        break;
                    }
                    _ => b"250 ok\r\n",
                };
                writer.write_all(reply).unwrap();
            }
            transcript
        })
    }

    #[test]
    fn test_sends_one_message_per_record() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = fake_server(listener);

        let email = Email::new(EmailOptions {
            mailhost: ("127.0.0.1".to_string(), port),
            fromaddr: "app@example.com".to_string(),
            toaddrs: vec!["ops@example.com".to_string()],
            subject: "Application error".to_string(),
            credentials: Some(("user".to_string(), "secret".to_string())),
            ..EmailOptions::default()
        })
        .unwrap();

        let record = Record::new("app", Severity::Critical, "down");
        email.append(&record, b"service down\n.hidden").unwrap();

        let transcript = server.join().unwrap();
        let token = STANDARD.encode("\0user\0secret");
        assert!(transcript.contains(&format!("AUTH PLAIN {token}\r\n")));
        assert!(transcript.contains("MAIL FROM:<app@example.com>\r\n"));
        assert!(transcript.contains("RCPT TO:<ops@example.com>\r\n"));
        assert!(transcript.contains("Subject: Application error\r\n"));
        assert!(transcript.contains("service down\r\n..hidden\r\n.\r\n"));
    }

    #[test]
    fn test_requires_recipients() {
        let err = Email::new(EmailOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }
}
