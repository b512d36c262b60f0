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

//! Delimiter-driven record splitting over a decompressed byte stream.
//!
//! WET files carry no length framing the splitter trusts. Records are cut at
//! every occurrence of [`BLOCK_DELIMITER`]:
//!
//! ```text
//!   ...body of record n\r\n\r\nWARC/1.0\r\nheaders of record n+1...
//!                      ^   ^   ^
//!                      |   |   next record starts here
//!                      |   record n ends here (one CRLF kept)
//!                      delimiter match
//! ```
//!
//! The bytes after the last delimiter are flushed as the final record once
//! the source is exhausted.

use std::io::{self, Read};

use memchr::memmem::Finder;

use crate::buffer::ChunkBuffer;

/// Line terminator used throughout WARC files.
pub const LINE_DELIMITER: &[u8] = b"\r\n";

/// Marker separating two consecutive records.
pub const BLOCK_DELIMITER: &[u8] = b"\r\n\r\nWARC/1.0\r\n";

/// Default number of bytes requested from the source per read.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Pull-based splitter yielding raw record slices.
///
/// A returned slice borrows the internal buffer and stays valid until the
/// next call to [`next_record`](Self::next_record), which drops it together
/// with the delimiter prefix whether or not the caller could use it.
pub struct RecordSplitter<R> {
    reader: R,
    buf: ChunkBuffer,
    finder: Finder<'static>,
    chunk_size: usize,
    /// Bytes to drop before the next scan (the previously returned record).
    pending: usize,
    /// Prefix of the buffer already known not to contain a delimiter start.
    scanned: usize,
    eof: bool,
}

impl<R: Read> RecordSplitter<R> {
    /// Create a splitter reading [`DEFAULT_CHUNK_SIZE`] bytes at a time.
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    /// Create a splitter reading `chunk_size` bytes at a time (at least 1).
    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        RecordSplitter {
            reader,
            buf: ChunkBuffer::with_capacity(chunk_size * 2),
            finder: Finder::new(BLOCK_DELIMITER),
            chunk_size,
            pending: 0,
            scanned: 0,
            eof: false,
        }
    }

    /// Read size in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Cut the next raw record from the stream.
    ///
    /// Returns `Ok(None)` once the source is exhausted and no bytes remain.
    pub fn next_record(&mut self) -> io::Result<Option<&[u8]>> {
        self.buf.consume(std::mem::take(&mut self.pending));

        loop {
            if let Some(pos) = self.buf.find(&self.finder, self.scanned) {
                self.pending = pos + 2 * LINE_DELIMITER.len();
                self.scanned = 0;
                return Ok(Some(&self.buf.as_slice()[..pos + LINE_DELIMITER.len()]));
            }
            // A match may still start in the last len - 1 bytes.
            self.scanned = self.buf.len().saturating_sub(BLOCK_DELIMITER.len() - 1);

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                self.pending = self.buf.len();
                self.scanned = 0;
                return Ok(Some(self.buf.as_slice()));
            }

            if self.buf.fill_from(&mut self.reader, self.chunk_size)? == 0 {
                self.eof = true;
            }
        }
    }

    /// Release the buffer and return the underlying source.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn split(input: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
        let mut splitter = RecordSplitter::with_chunk_size(Cursor::new(input), chunk_size);
        let mut records = Vec::new();
        while let Some(record) = splitter.next_record().unwrap() {
            records.push(record.to_vec());
        }
        records
    }

    #[test]
    fn cuts_at_every_delimiter() {
        let input = b"WARC/1.0\r\nA: 1\r\n\r\nfirst\r\n\r\nWARC/1.0\r\nA: 2\r\n\r\nsecond\r\n\r\nWARC/1.0\r\nA: 3\r\n\r\nthird";
        let records = split(input, 4096);
        assert_eq!(
            records,
            vec![
                b"WARC/1.0\r\nA: 1\r\n\r\nfirst\r\n".to_vec(),
                b"WARC/1.0\r\nA: 2\r\n\r\nsecond\r\n".to_vec(),
                b"WARC/1.0\r\nA: 3\r\n\r\nthird".to_vec(),
            ]
        );
    }

    #[test]
    fn delimiter_split_across_reads() {
        let input = b"one\r\n\r\nWARC/1.0\r\ntwo";
        for chunk_size in 1..=input.len() {
            assert_eq!(
                split(input, chunk_size),
                vec![b"one\r\n".to_vec(), b"WARC/1.0\r\ntwo".to_vec()],
                "chunk size {chunk_size}"
            );
        }
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(split(b"", 7).is_empty());
    }

    #[test]
    fn trailing_delimiter_leaves_marker_line_as_last_record() {
        let records = split(b"one\r\n\r\nWARC/1.0\r\n", 3);
        assert_eq!(records, vec![b"one\r\n".to_vec(), b"WARC/1.0\r\n".to_vec()]);
    }

    #[test]
    fn nothing_left_after_final_flush() {
        let mut splitter = RecordSplitter::new(Cursor::new(b"only".to_vec()));
        assert_eq!(splitter.next_record().unwrap(), Some(&b"only"[..]));
        assert_eq!(splitter.next_record().unwrap(), None);
        assert_eq!(splitter.next_record().unwrap(), None);
        assert_eq!(splitter.into_inner().position(), 4);
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let splitter = RecordSplitter::with_chunk_size(Cursor::new(Vec::new()), 0);
        assert_eq!(splitter.chunk_size(), 1);
    }

    #[test]
    fn propagates_read_errors() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::InvalidData, "invalid gzip header"))
            }
        }
        let mut splitter = RecordSplitter::new(Broken);
        let err = splitter.next_record().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
