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

//! Encoding of fields in the systemd journal native protocol.

/// Writes `NAME\n<u64 le length><value>\n`, the form required for values containing newlines.
pub(super) fn put_length_encoded(buffer: &mut Vec<u8>, name: &str, value: &[u8]) {
    buffer.extend_from_slice(name.as_bytes());
    buffer.push(b'\n');
    buffer.extend_from_slice(&(value.len() as u64).to_le_bytes());
    buffer.extend_from_slice(value);
    buffer.push(b'\n');
}

/// Writes `NAME=value\n`, falling back to length encoding when `value` spans several lines.
pub(super) fn put_field(buffer: &mut Vec<u8>, name: &str, value: &[u8]) {
    if value.contains(&b'\n') {
        put_length_encoded(buffer, name, value);
    } else {
        buffer.extend_from_slice(name.as_bytes());
        buffer.push(b'=');
        buffer.extend_from_slice(value);
        buffer.push(b'\n');
    }
}
