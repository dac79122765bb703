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

/// The closed set of sink kinds a handler spec can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Stream,
    File,
    WatchedFile,
    RotatingFile,
    TimedRotatingFile,
    Socket,
    Datagram,
    SysLog,
    PlatformEventLog,
    Email,
}

impl SinkKind {
    pub const ALL: [SinkKind; 10] = [
        SinkKind::Stream,
        SinkKind::File,
        SinkKind::WatchedFile,
        SinkKind::RotatingFile,
        SinkKind::TimedRotatingFile,
        SinkKind::Socket,
        SinkKind::Datagram,
        SinkKind::SysLog,
        SinkKind::PlatformEventLog,
        SinkKind::Email,
    ];

    /// Resolves a kind from its short name (`"File"`) or its classic handler class name
    /// (`"FileHandler"`). Matching is exact.
    pub fn parse(name: &str) -> Option<SinkKind> {
        let kind = match name {
            "Stream" | "StreamHandler" => SinkKind::Stream,
            "File" | "FileHandler" => SinkKind::File,
            "WatchedFile" | "WatchedFileHandler" => SinkKind::WatchedFile,
            "RotatingFile" | "RotatingFileHandler" => SinkKind::RotatingFile,
            "TimedRotatingFile" | "TimedRotatingFileHandler" => SinkKind::TimedRotatingFile,
            "Socket" | "SocketHandler" => SinkKind::Socket,
            "Datagram" | "DatagramHandler" => SinkKind::Datagram,
            "SysLog" | "SysLogHandler" => SinkKind::SysLog,
            "PlatformEventLog" | "NTEventLogHandler" => SinkKind::PlatformEventLog,
            "Email" | "SMTPHandler" => SinkKind::Email,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether the kind writes to a file under the handler's `path`.
    pub fn is_file_backed(&self) -> bool {
        matches!(
            self,
            SinkKind::File
                | SinkKind::WatchedFile
                | SinkKind::RotatingFile
                | SinkKind::TimedRotatingFile
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Stream => "Stream",
            SinkKind::File => "File",
            SinkKind::WatchedFile => "WatchedFile",
            SinkKind::RotatingFile => "RotatingFile",
            SinkKind::TimedRotatingFile => "TimedRotatingFile",
            SinkKind::Socket => "Socket",
            SinkKind::Datagram => "Datagram",
            SinkKind::SysLog => "SysLog",
            SinkKind::PlatformEventLog => "PlatformEventLog",
            SinkKind::Email => "Email",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_and_classic_names() {
        for kind in SinkKind::ALL {
            assert_eq!(SinkKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SinkKind::parse("SMTPHandler"), Some(SinkKind::Email));
        assert_eq!(
            SinkKind::parse("NTEventLogHandler"),
            Some(SinkKind::PlatformEventLog)
        );
        assert_eq!(SinkKind::parse("Bogus"), None);
        assert_eq!(SinkKind::parse("file"), None);
    }

    #[test]
    fn test_file_backed_kinds() {
        let file_backed = SinkKind::ALL
            .iter()
            .filter(|kind| kind.is_file_backed())
            .count();
        assert_eq!(file_backed, 4);
        assert!(!SinkKind::SysLog.is_file_backed());
    }
}
