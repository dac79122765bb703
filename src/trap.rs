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

//! Traps receive errors that happen while a record is being written.

use std::fmt;
use std::io;
use std::io::Write;

use crate::Error;

/// A sink for errors raised while emitting records.
///
/// Emitting never returns an error to the code that logs; failures are handed to a trap instead.
pub trait Trap: fmt::Debug + Send + Sync + 'static {
    /// Handles an error that occurred while emitting a record.
    fn trap(&self, err: &Error);
}

/// Writes every trapped error to stderr.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct DefaultTrap {}

impl Trap for DefaultTrap {
    fn trap(&self, err: &Error) {
        let _ = writeln!(io::stderr(), "--- Logging error ---\n{err}");
    }
}
