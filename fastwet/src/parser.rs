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

//! Parser driving the splitter and the record decoder.
//!
//! # Control flow
//!
//! ```text
//!   gzip file ─► MultiGzDecoder ─► RecordSplitter ─► WetEntry::from_record
//!                                                     │
//!                               Ok(entry) ◄───────────┤ loaded += 1
//!                               skip, continue ◄──────┤ RecordError: skipped += 1
//!                               Err(fatal), stop ◄────┘ anything else
//! ```
//!
//! Entries are produced lazily. Nothing is read from the source until the
//! caller pulls the first entry, and at most one raw record is held in
//! memory ahead of the caller.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use flate2::read::MultiGzDecoder;
use parking_lot::RwLock;

use crate::detect::{ChardetDetector, EncodingDetector};
use crate::entry::{HeaderOptions, WetEntry};
use crate::error::{ParseError, RecordError};
use crate::header::{HeaderEncoding, KeyCase};
use crate::splitter::{RecordSplitter, DEFAULT_CHUNK_SIZE};

/// Parser configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Bytes requested from the decompressed stream per read.
    pub chunk_size: usize,
    /// Header key case policy.
    pub key_case: KeyCase,
    /// Header line encoding.
    pub header_encoding: HeaderEncoding,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            key_case: KeyCase::Sensitive,
            header_encoding: HeaderEncoding::Unicode,
        }
    }
}

impl ParserConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_key_case(mut self, key_case: KeyCase) -> Self {
        self.key_case = key_case;
        self
    }

    pub fn with_header_encoding(mut self, header_encoding: HeaderEncoding) -> Self {
        self.header_encoding = header_encoding;
        self
    }

    fn header_options(&self) -> HeaderOptions {
        HeaderOptions {
            key_case: self.key_case,
            encoding: self.header_encoding,
        }
    }
}

/// Counters of a single parse run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Records decoded and yielded.
    pub loaded: u64,
    /// Records rejected for any reason.
    pub skipped: u64,
    /// Records rejected because of a low-confidence detection.
    pub low_confidence: u64,
    /// Records rejected because their body could not be decoded.
    pub decode_failed: u64,
}

impl ParseStats {
    /// Records loaded or skipped so far.
    pub fn attempted(&self) -> u64 {
        self.loaded + self.skipped
    }

    /// Skipped records divided by attempted records, `None` if nothing was attempted.
    pub fn skip_ratio(&self) -> Option<f64> {
        match self.attempted() {
            0 => None,
            n => Some(self.skipped as f64 / n as f64),
        }
    }

    /// Summary line for display.
    pub fn summary(&self) -> String {
        match self.skip_ratio() {
            Some(ratio) => format!(
                "#loaded entries={}, skip entries={} (low confidence={}, decode failed={}), skip ratio={:.4}",
                self.loaded, self.skipped, self.low_confidence, self.decode_failed, ratio
            ),
            None => "#loaded entries=0, skip entries=0, skip ratio=n/a (no records)".to_string(),
        }
    }

    fn record_skip(&mut self, err: &RecordError) {
        self.skipped += 1;
        match err {
            RecordError::LowConfidence { .. } => self.low_confidence += 1,
            RecordError::DecodeFailed { .. } => self.decode_failed += 1,
        }
    }
}

/// WET archive parser.
///
/// Each call to one of the `parse_*` methods starts a new run with fresh
/// counters. The counters of the most recent run can be read through
/// [`Parser::stats`] while its [`Entries`] are being iterated and after.
pub struct Parser<D = ChardetDetector> {
    config: ParserConfig,
    detector: Arc<D>,
    stats: Arc<RwLock<ParseStats>>,
}

impl Default for Parser<ChardetDetector> {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser<ChardetDetector> {
    /// Create a parser with the default configuration and detector.
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    /// Create a parser with the default detector.
    pub fn with_config(config: ParserConfig) -> Self {
        Self::with_detector(config, ChardetDetector)
    }
}

impl<D: EncodingDetector> Parser<D> {
    /// Create a parser using a custom encoding detector.
    pub fn with_detector(config: ParserConfig, detector: D) -> Self {
        Parser {
            config,
            detector: Arc::new(detector),
            stats: Arc::default(),
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Counters of the most recent run.
    pub fn stats(&self) -> ParseStats {
        *self.stats.read()
    }

    /// Number of entries loaded in the most recent run.
    pub fn loaded_count(&self) -> u64 {
        self.stats.read().loaded
    }

    /// Number of records skipped in the most recent run.
    pub fn skip_count(&self) -> u64 {
        self.stats.read().skipped
    }

    /// Parse a gzip-compressed WET file.
    ///
    /// The file is opened immediately and closed when the returned
    /// [`Entries`] are dropped or closed.
    pub fn parse_path(&mut self, path: impl AsRef<Path>) -> Result<Entries<MultiGzDecoder<File>, D>, ParseError> {
        let file = File::open(path.as_ref())?;
        log::debug!("opened {}", path.as_ref().display());
        Ok(self.parse_gzip(file))
    }

    /// Parse a gzip-compressed stream (single or multi-member).
    pub fn parse_gzip<R: Read>(&mut self, reader: R) -> Entries<MultiGzDecoder<R>, D> {
        self.parse_stream(MultiGzDecoder::new(reader))
    }

    /// Parse an already decompressed stream.
    pub fn parse_stream<R: Read>(&mut self, reader: R) -> Entries<R, D> {
        log::debug!("starting parse: {:?}", self.config);
        self.stats = Arc::default();
        Entries {
            splitter: RecordSplitter::with_chunk_size(reader, self.config.chunk_size),
            detector: Arc::clone(&self.detector),
            options: self.config.header_options(),
            stats: Arc::clone(&self.stats),
            finished: false,
        }
    }
}

/// Lazy sequence of decoded entries of one parse run.
///
/// Yields `Ok(entry)` for every decodable record in stream order. Skipped
/// records never appear. A fatal error is yielded once as `Err`, after
/// which the iterator is exhausted. Dropping the iterator releases the
/// source.
pub struct Entries<R, D> {
    splitter: RecordSplitter<R>,
    detector: Arc<D>,
    options: HeaderOptions,
    stats: Arc<RwLock<ParseStats>>,
    finished: bool,
}

impl<R: Read, D: EncodingDetector> Entries<R, D> {
    /// Counters of this run so far.
    pub fn stats(&self) -> ParseStats {
        *self.stats.read()
    }

    /// Stop iterating, release the source and return the final counters.
    pub fn close(self) -> ParseStats {
        let stats = self.stats();
        log::debug!("parse closed: {}", stats.summary());
        stats
    }

    fn next_entry(&mut self) -> Result<Option<WetEntry>, ParseError> {
        loop {
            let Some(record) = self.splitter.next_record()? else {
                return Ok(None);
            };
            match WetEntry::from_record(record, self.options, &*self.detector) {
                Ok(entry) => {
                    self.stats.write().loaded += 1;
                    return Ok(Some(entry));
                }
                Err(ParseError::Record(err)) => {
                    log::warn!("{err}");
                    self.stats.write().record_skip(&err);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<R: Read, D: EncodingDetector> Iterator for Entries<R, D> {
    type Item = Result<WetEntry, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_entry().transpose();
        if !matches!(result, Some(Ok(_))) {
            self.finished = true;
            log::debug!("parse finished: {}", self.stats().summary());
        }
        result
    }
}

impl<R: Read, D: EncodingDetector> std::iter::FusedIterator for Entries<R, D> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;
    use std::io::{self, Cursor};

    fn utf8_detector() -> impl Fn(&[u8]) -> Detection {
        |_: &[u8]| Detection::new("utf-8", 0.99)
    }

    fn wet(records: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for record in records {
            out.extend_from_slice(b"WARC/1.0\r\nWARC-Type: conversion\r\n\r\n");
            out.extend_from_slice(record);
            out.extend_from_slice(b"\r\n\r\n");
        }
        out
    }

    #[test]
    fn skips_undecodable_records_and_continues() {
        let mut parser = Parser::with_detector(ParserConfig::default(), utf8_detector());
        let input = wet(&[b"one", b"\xff\xfe", b"three"]);
        let bodies: Vec<String> = parser
            .parse_stream(Cursor::new(input))
            .map(|e| e.unwrap().body().to_string())
            .collect();

        assert_eq!(bodies, ["one\r\n", "three\r\n\r\n"]);
        assert_eq!(parser.loaded_count(), 2);
        assert_eq!(parser.skip_count(), 1);
        assert_eq!(parser.stats().decode_failed, 1);
        assert_eq!(parser.stats().low_confidence, 0);
    }

    #[test]
    fn counters_visible_during_iteration() {
        let mut parser = Parser::with_detector(ParserConfig::default(), utf8_detector());
        let mut entries = parser.parse_stream(Cursor::new(wet(&[b"a", b"b"])));

        assert!(entries.next().unwrap().is_ok());
        assert_eq!(parser.loaded_count(), 1);
        assert_eq!(entries.stats().loaded, 1);
        assert!(entries.next().unwrap().is_ok());
        assert!(entries.next().is_none());
        assert_eq!(entries.close().loaded, 2);
        assert_eq!(parser.loaded_count(), 2);
    }

    #[test]
    fn each_run_resets_counters() {
        let detector = |bytes: &[u8]| Detection::new("utf-8", if bytes.starts_with(b"?") { 0.1 } else { 0.9 });
        let mut parser = Parser::with_detector(ParserConfig::default(), detector);

        assert_eq!(parser.parse_stream(Cursor::new(wet(&[b"a", b"?", b"?"]))).count(), 1);
        assert_eq!(
            parser.stats(),
            ParseStats { loaded: 1, skipped: 2, low_confidence: 2, decode_failed: 0 }
        );

        assert_eq!(parser.parse_stream(Cursor::new(wet(&[b"x", b"y"]))).count(), 2);
        assert_eq!(parser.stats(), ParseStats { loaded: 2, ..Default::default() });
    }

    #[test]
    fn fatal_error_is_yielded_once() {
        let mut parser = Parser::with_detector(ParserConfig::default(), utf8_detector());
        let mut input = wet(&[b"ok"]);
        input.extend_from_slice(b"WARC/1.0\r\n:\r\n\r\nbad header\r\n\r\n");
        input.extend_from_slice(&wet(&[b"never reached"]));

        let mut entries = parser.parse_stream(Cursor::new(input));
        assert!(entries.next().unwrap().is_ok());
        assert!(matches!(entries.next(), Some(Err(ParseError::MalformedHeader { .. }))));
        assert!(entries.next().is_none());
        assert!(entries.next().is_none());
        assert_eq!(parser.stats(), ParseStats { loaded: 1, ..Default::default() });
    }

    #[test]
    fn io_errors_are_fatal() {
        struct FailAfter {
            data: Cursor<Vec<u8>>,
        }
        impl Read for FailAfter {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                match self.data.read(buf)? {
                    0 => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated gzip member")),
                    n => Ok(n),
                }
            }
        }

        let mut parser = Parser::with_detector(ParserConfig::default(), utf8_detector());
        let results: Vec<_> = parser
            .parse_stream(FailAfter { data: Cursor::new(wet(&[b"a", b"b"])) })
            .collect();

        // The trailing record is never flushed without a clean end of stream.
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(&results[1], Err(ParseError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn empty_input_has_no_records() {
        let mut parser = Parser::with_detector(ParserConfig::default(), utf8_detector());
        assert_eq!(parser.parse_stream(Cursor::new(Vec::new())).count(), 0);
        assert_eq!(parser.stats().attempted(), 0);
        assert_eq!(parser.stats().skip_ratio(), None);
    }

    #[test]
    fn config_reaches_records() {
        let config = ParserConfig::default()
            .with_chunk_size(0)
            .with_key_case(KeyCase::Insensitive)
            .with_header_encoding(HeaderEncoding::Latin1);
        assert_eq!(config.chunk_size, 1);

        let mut parser = Parser::with_detector(config, utf8_detector());
        let entry = parser
            .parse_stream(Cursor::new(b"WARC/1.0\r\nTitle: Caf\xe9\r\n\r\nbody".to_vec()))
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(entry.header().get("title"), Some("Café"));
        assert_eq!(parser.config().key_case, KeyCase::Insensitive);
    }

    #[test]
    fn stats_summary() {
        let stats = ParseStats { loaded: 3, skipped: 1, low_confidence: 1, decode_failed: 0 };
        assert_eq!(stats.attempted(), 4);
        assert_eq!(stats.skip_ratio(), Some(0.25));
        assert_eq!(
            stats.summary(),
            "#loaded entries=3, skip entries=1 (low confidence=1, decode failed=0), skip ratio=0.2500"
        );
        assert!(ParseStats::default().summary().contains("no records"));
    }
}
