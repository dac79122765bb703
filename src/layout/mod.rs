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

//! Layouts for formatting records into bytes.

pub use self::template::Layout;

mod template;

/// The template used when neither a logger nor a handler specifies one.
pub const DEFAULT_FORMAT: &str =
    "%(asctime)s %(name)s - %(funcName)s [%(levelname)s]: %(message)s";
