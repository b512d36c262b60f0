// Copyright 2025 Janek Bevendorff
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

use encoding::all::WINDOWS_1252;
use encoding::{DecoderTrap, Encoding};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::ParseError;
use crate::splitter::LINE_DELIMITER;

/// How header keys are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum KeyCase {
    /// Keys are stored as they appear.
    #[default]
    Sensitive,
    /// Keys are folded to lowercase before insertion.
    Insensitive,
}

impl KeyCase {
    fn fold<'a>(&self, key: &'a str) -> std::borrow::Cow<'a, str> {
        match self {
            KeyCase::Sensitive => key.into(),
            KeyCase::Insensitive => key.to_lowercase().into(),
        }
    }
}

/// Source encoding of header lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HeaderEncoding {
    /// Strict UTF-8. Invalid lines abort the parse.
    #[default]
    Unicode,
    /// Windows-1252, which accepts any byte sequence.
    Latin1,
}

impl HeaderEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeaderEncoding::Unicode => "utf-8",
            HeaderEncoding::Latin1 => "windows-1252",
        }
    }

    fn decode(&self, line: &[u8]) -> Result<String, ParseError> {
        let decoded = match self {
            HeaderEncoding::Unicode => std::str::from_utf8(line).map(str::to_owned).ok(),
            HeaderEncoding::Latin1 => WINDOWS_1252.decode(line, DecoderTrap::Strict).ok(),
        };
        decoded.ok_or_else(|| ParseError::InvalidHeaderEncoding {
            encoding: self.as_str(),
            line: line.to_vec(),
        })
    }
}

/// Ordered multi-valued mapping of WARC header keys to values.
///
/// Keys keep the order of their first appearance and values the order in
/// which they were appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    key_case: KeyCase,
    headers: Vec<(String, Vec<String>)>,
}

impl HeaderMap {
    /// Create an empty header map with the given key case policy.
    pub fn new(key_case: KeyCase) -> Self {
        HeaderMap {
            key_case,
            headers: Vec::new(),
        }
    }

    /// Parse a header block into a new map.
    ///
    /// The block is split on CRLF. Each non-blank line is split on its first
    /// `:` into key and value, both trimmed; a line without `:` becomes a key
    /// with an empty value.
    ///
    /// # Arguments
    ///
    /// * `block` - Header bytes, without the blank line terminating them
    /// * `key_case` - Key case policy
    /// * `encoding` - Header line encoding
    pub fn parse(block: &[u8], key_case: KeyCase, encoding: HeaderEncoding) -> Result<Self, ParseError> {
        let mut map = HeaderMap::new(key_case);
        for raw in split_lines(block) {
            if raw.trim_ascii().is_empty() {
                continue;
            }
            let line = encoding.decode(raw)?;
            let (key, value) = line.split_once(':').unwrap_or((line.as_str(), ""));
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() && value.is_empty() {
                return Err(ParseError::MalformedHeader { line: raw.to_vec() });
            }
            map.append(key, value);
        }
        Ok(map)
    }

    /// Key case policy applied on insertion and lookup.
    pub fn key_case(&self) -> KeyCase {
        self.key_case
    }

    /// Append a value for `key`, creating the key if it is new.
    ///
    /// The key is folded according to the map's [`KeyCase`].
    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        let key = self.key_case.fold(key);
        match self.headers.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value.into()),
            None => self.headers.push((key.into_owned(), vec![value.into()])),
        }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    /// All values for `key` in encounter order (empty if absent).
    pub fn get_all(&self, key: &str) -> &[String] {
        let key = self.key_case.fold(key);
        self.headers
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// First value for `key`, comparing keys ASCII case-insensitively
    /// regardless of the map's policy.
    pub fn get_ignore_case(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .flat_map(|(_, v)| v.first())
            .map(String::as_str)
            .next()
    }

    /// Check if `key` exists.
    pub fn contains_key(&self, key: &str) -> bool {
        !self.get_all(key).is_empty()
    }

    /// Iterator of keys and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Iterator of header keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(|(k, _)| k.as_str())
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if the header map is empty.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl Serialize for HeaderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.headers.len()))?;
        for (key, values) in &self.headers {
            map.serialize_entry(key, values)?;
        }
        map.end()
    }
}

fn split_lines(block: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = Some(block);
    std::iter::from_fn(move || {
        let current = rest?;
        match memchr::memmem::find(current, LINE_DELIMITER) {
            Some(pos) => {
                rest = Some(&current[pos + LINE_DELIMITER.len()..]);
                Some(&current[..pos])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}
