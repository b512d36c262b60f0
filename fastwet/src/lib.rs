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

//! Streaming parser for gzip-compressed WET archives.
//!
//! A WET file is a sequence of WARC records holding extracted plain text.
//! The parser decompresses the file on the fly, cuts it into records at the
//! `\r\n\r\nWARC/1.0\r\n` marker, parses each record's header block into a
//! [`HeaderMap`] and decodes its body with the encoding proposed by an
//! [`EncodingDetector`]. Records whose body cannot be decoded with
//! confidence are skipped and counted.
//!
//! ```no_run
//! use fastwet::{Parser, ParserConfig, KeyCase};
//!
//! let mut parser = Parser::with_config(ParserConfig::default().with_key_case(KeyCase::Insensitive));
//! for entry in parser.parse_path("CC-MAIN-example.warc.wet.gz")? {
//!     let entry = entry?;
//!     println!("{:?}: {} chars", entry.target_uri(), entry.body().len());
//! }
//! println!("{}", parser.stats().summary());
//! # Ok::<(), fastwet::ParseError>(())
//! ```

mod buffer;
mod detect;
mod entry;
mod error;
mod header;
mod parser;
mod splitter;

pub use detect::{decode_body, ChardetDetector, Detection, EncodingDetector, MIN_CONFIDENCE};
pub use entry::{split_record, HeaderOptions, WarcRecordType, WetEntry};
pub use error::{ParseError, RecordError, DIAGNOSTIC_PREFIX_LEN};
pub use header::{HeaderEncoding, HeaderMap, KeyCase};
pub use parser::{Entries, ParseStats, Parser, ParserConfig};
pub use splitter::{RecordSplitter, BLOCK_DELIMITER, DEFAULT_CHUNK_SIZE, LINE_DELIMITER};
