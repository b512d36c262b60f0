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

use serde::Serialize;

use crate::detect::{decode_body, EncodingDetector};
use crate::error::ParseError;
use crate::header::{HeaderEncoding, HeaderMap, KeyCase};
use crate::splitter::LINE_DELIMITER;

/// Blank line separating header block and body.
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// WARC record type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarcRecordType {
    WarcInfo,
    Response,
    Resource,
    Request,
    Metadata,
    Revisit,
    Conversion,
    Continuation,
    Unknown,
}

impl WarcRecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarcRecordType::WarcInfo => "warcinfo",
            WarcRecordType::Response => "response",
            WarcRecordType::Resource => "resource",
            WarcRecordType::Request => "request",
            WarcRecordType::Metadata => "metadata",
            WarcRecordType::Revisit => "revisit",
            WarcRecordType::Conversion => "conversion",
            WarcRecordType::Continuation => "continuation",
            WarcRecordType::Unknown => "unknown",
        }
    }
}

impl TryFrom<&str> for WarcRecordType {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "warcinfo" => Ok(WarcRecordType::WarcInfo),
            "response" => Ok(WarcRecordType::Response),
            "resource" => Ok(WarcRecordType::Resource),
            "request" => Ok(WarcRecordType::Request),
            "metadata" => Ok(WarcRecordType::Metadata),
            "revisit" => Ok(WarcRecordType::Revisit),
            "conversion" => Ok(WarcRecordType::Conversion),
            "continuation" => Ok(WarcRecordType::Continuation),
            "unknown" => Ok(WarcRecordType::Unknown),
            _ => Err("Invalid record type."),
        }
    }
}

/// Header parsing options applied to every record of a parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderOptions {
    pub key_case: KeyCase,
    pub encoding: HeaderEncoding,
}

/// Split a raw record into header block and body.
///
/// The boundary is the first blank line. The header keeps one trailing CRLF;
/// the body starts right after the blank line and may itself contain blank
/// lines. Without a blank line, the whole record is header and the body is
/// empty.
pub fn split_record(record: &[u8]) -> (&[u8], &[u8]) {
    match memchr::memmem::find(record, HEADER_TERMINATOR) {
        Some(pos) => (
            &record[..pos + LINE_DELIMITER.len()],
            &record[pos + HEADER_TERMINATOR.len()..],
        ),
        None => (record, &record[record.len()..]),
    }
}

/// A decoded WET record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WetEntry {
    header: HeaderMap,
    body: String,
    #[serde(skip)]
    encoding: String,
}

impl WetEntry {
    /// Decode one raw record.
    ///
    /// Fails with [`ParseError::Record`] if the body's encoding cannot be
    /// determined confidently or the body is invalid for it. Header errors
    /// are reported as the corresponding fatal [`ParseError`] variants.
    ///
    /// # Arguments
    ///
    /// * `record` - Raw record bytes as cut by the splitter
    /// * `options` - Header parsing options
    /// * `detector` - Body encoding detector
    pub fn from_record<D>(record: &[u8], options: HeaderOptions, detector: &D) -> Result<Self, ParseError>
    where
        D: EncodingDetector + ?Sized,
    {
        let (header_block, body_block) = split_record(record);
        let header = HeaderMap::parse(header_block, options.key_case, options.encoding)?;
        let (body, encoding) = decode_body(body_block, detector)?;
        Ok(WetEntry { header, body, encoding })
    }

    /// Record headers.
    pub fn header(&self) -> &HeaderMap {
        &self.header
    }

    /// Decoded record body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Encoding the body was decoded with.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Record type (from `WARC-Type`, matched regardless of key case).
    pub fn record_type(&self) -> WarcRecordType {
        self.header
            .get_ignore_case("WARC-Type")
            .and_then(|t| WarcRecordType::try_from(t).ok())
            .unwrap_or(WarcRecordType::Unknown)
    }

    /// Record ID (same as `header["WARC-Record-ID"]`).
    pub fn record_id(&self) -> Option<&str> {
        self.header.get_ignore_case("WARC-Record-ID")
    }

    /// Target URI (same as `header["WARC-Target-URI"]`).
    pub fn target_uri(&self) -> Option<&str> {
        self.header.get_ignore_case("WARC-Target-URI")
    }

    /// Consume the entry, returning header, body and encoding.
    pub fn into_parts(self) -> (HeaderMap, String, String) {
        (self.header, self.body, self.encoding)
    }
}
