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

//! Compile declarative logger specifications into live logging pipelines.
//!
//! A [`LoggerSpec`] describes a named logger and an ordered list of handlers: where records go
//! (a stream, a file, a rotating file, a socket, syslog, the platform event log, email), at which
//! severity, in which format, and for which record names. [`Compiler::compile`] turns the spec
//! into a [`Logger`] registered under its name; [`teardown`] closes everything it opened.
//!
//! # Examples
//!
//! ```
//! use logcompose::Compiler;
//! use logcompose::LoggerSpec;
//! use logcompose::Registry;
//! use logcompose::Severity;
//!
//! let spec = LoggerSpec::from_json(
//!     r#"{
//!         "name": "svc",
//!         "level": "INFO",
//!         "handlers": [
//!             {"type": "Bogus"},
//!             {"type": "Stream", "level": "WARNING", "filters": ["svc"]}
//!         ]
//!     }"#,
//! )
//! .unwrap();
//!
//! let registry = Registry::new();
//! let logger = Compiler::new(&registry).compile(&spec, None).unwrap().unwrap();
//! assert_eq!(logger.level(), Severity::Info);
//! assert_eq!(logger.sinks()[0].level(), Severity::Warning);
//!
//! logger.warning("written to stderr");
//! logcompose::teardown(Some(&logger)).unwrap();
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod append;
pub mod bridge;
pub mod compile;
pub mod config;
pub mod filter;
pub mod layout;
pub mod logger;
pub mod sink;
pub mod trap;

mod error;
mod level;
mod record;

pub use self::compile::Compiler;
pub use self::compile::close_logger;
pub use self::compile::create_logger;
pub use self::compile::teardown;
pub use self::config::HandlerSpec;
pub use self::config::LoggerSpec;
pub use self::error::Error;
pub use self::error::ErrorKind;
pub use self::filter::NameFilter;
pub use self::level::LOG_LEVELS;
pub use self::level::Severity;
pub use self::logger::Logger;
pub use self::logger::Registry;
pub use self::record::Record;
pub use self::sink::Sink;
pub use self::sink::SinkBuilder;
pub use self::sink::SinkKind;
