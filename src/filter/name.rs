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

/// The separator between segments of a hierarchical record name.
pub const NAME_SEPARATOR: char = '.';

/// Accepts records whose name lies under any of a set of name prefixes.
///
/// The stored prefixes compose as a logical OR: a record name matches when it equals a prefix or
/// extends it past a [`NAME_SEPARATOR`]. With `app` stored, `app` and `app.db.pool` match while
/// `application` does not. An empty filter matches nothing.
///
/// # Examples
///
/// ```
/// use logcompose::filter::NameFilter;
///
/// let mut filter = NameFilter::new();
/// filter.add_name("app");
/// filter.add_name("vendor.http");
///
/// assert!(filter.matches("app.db"));
/// assert!(filter.matches("vendor.http"));
/// assert!(!filter.matches("vendor"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    names: Vec<String>,
}

impl NameFilter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a prefix. Empty or already present names are ignored.
    pub fn add_name(&mut self, name: impl AsRef<str>) {
        let name = name.as_ref();
        if !name.is_empty() && !self.names.iter().any(|n| n == name) {
            self.names.push(name.to_owned());
        }
    }

    /// Removes a prefix if present.
    pub fn remove_name(&mut self, name: impl AsRef<str>) {
        let name = name.as_ref();
        self.names.retain(|n| n != name);
    }

    /// The stored prefixes in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns true if `candidate` equals or hierarchically extends any stored prefix.
    pub fn matches(&self, candidate: &str) -> bool {
        self.names.iter().any(|prefix| {
            candidate
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(NAME_SEPARATOR))
        })
    }

    /// Builds a filter from configuration values, silently skipping anything that is not a string.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a serde_json::Value>) -> Self {
        let mut filter = NameFilter::new();
        for value in values {
            if let Some(name) = value.as_str() {
                filter.add_name(name);
            }
        }
        filter
    }
}

impl<S: AsRef<str>> FromIterator<S> for NameFilter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut filter = NameFilter::new();
        for name in iter {
            filter.add_name(name);
        }
        filter
    }
}
