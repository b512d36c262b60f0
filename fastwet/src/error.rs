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

use std::io;

/// Number of body bytes kept in [`RecordError::DecodeFailed`] for diagnostics.
pub const DIAGNOSTIC_PREFIX_LEN: usize = 20;

/// Reasons for rejecting a single record.
///
/// These are the only errors the parser recovers from: the record is logged,
/// counted as skipped and iteration continues with the next record.
///
/// ```text
///   RecordError
///   ├── LowConfidence   ← detector too unsure, body not decoded
///   └── DecodeFailed    ← body invalid for the proposed encoding
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    /// The detector's confidence is below [`MIN_CONFIDENCE`](crate::MIN_CONFIDENCE).
    #[error("low confidence encoding detection: {encoding:?} ({confidence:.2})")]
    LowConfidence { encoding: String, confidence: f32 },

    /// The body bytes could not be decoded with the proposed encoding.
    ///
    /// `prefix` holds the first [`DIAGNOSTIC_PREFIX_LEN`] bytes of the body.
    #[error("failed to decode body as {:?}, partial block: b\"{}\"", .encoding, .prefix.escape_ascii())]
    DecodeFailed { encoding: String, prefix: Vec<u8> },
}

impl RecordError {
    /// Encoding name proposed by the detector for the rejected record.
    pub fn encoding(&self) -> &str {
        match self {
            RecordError::LowConfidence { encoding, .. } => encoding,
            RecordError::DecodeFailed { encoding, .. } => encoding,
        }
    }
}

/// Errors surfaced by the parser.
///
/// Everything except [`ParseError::Record`] ends the parse: it indicates a
/// broken stream or a framing problem rather than an untrustworthy body.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// A record was rejected. Never yielded by [`Entries`](crate::Entries).
    #[error(transparent)]
    Record(#[from] RecordError),

    /// A header line split into an empty key and an empty value.
    #[error("malformed header line: b\"{}\"", .line.escape_ascii())]
    MalformedHeader { line: Vec<u8> },

    /// A header line is not valid in the configured header encoding.
    #[error("header line is not valid {}: b\"{}\"", .encoding, .line.escape_ascii())]
    InvalidHeaderEncoding { encoding: &'static str, line: Vec<u8> },

    /// Reading or decompressing the input failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ParseError {
    /// Whether the parser skips the record instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ParseError::Record(_))
    }
}
