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

//! Accumulation buffer for undelimited stream bytes.

use std::io::{self, Read};

use memchr::memmem::Finder;

/// Growable byte buffer with cheap prefix consumption.
///
/// Consumed bytes are only skipped over by advancing an offset. The dead
/// prefix is compacted away before the next append once it makes up at
/// least half of the allocation, so a record cut never moves the whole tail.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    data: Vec<u8>,
    start: usize,
}

impl ChunkBuffer {
    /// Create an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        ChunkBuffer {
            data: Vec::with_capacity(capacity),
            start: 0,
        }
    }

    /// Unconsumed bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.start..]
    }

    /// Number of unconsumed bytes.
    pub fn len(&self) -> usize {
        self.data.len() - self.start
    }

    /// Whether all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append at most `max` bytes read from `reader` with a single successful read.
    ///
    /// Returns the number of bytes appended; `0` signals end of stream
    /// (or `max == 0`). Interrupted reads are retried.
    pub fn fill_from<R: Read>(&mut self, reader: &mut R, max: usize) -> io::Result<usize> {
        self.compact();
        let len = self.data.len();
        self.data.resize(len + max, 0);
        loop {
            match reader.read(&mut self.data[len..]) {
                Ok(n) => {
                    self.data.truncate(len + n);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.data.truncate(len);
                    return Err(e);
                }
            }
        }
    }

    /// Find the first occurrence of the finder's needle at or after `from`.
    ///
    /// Offsets are relative to the unconsumed bytes.
    pub fn find(&self, finder: &Finder<'_>, from: usize) -> Option<usize> {
        let haystack = self.as_slice();
        if from >= haystack.len() {
            return None;
        }
        finder.find(&haystack[from..]).map(|pos| pos + from)
    }

    /// Drop `n` bytes from the front (clamped to the unconsumed length).
    pub fn consume(&mut self, n: usize) {
        self.start += n.min(self.len());
        if self.start == self.data.len() {
            self.data.clear();
            self.start = 0;
        }
    }

    fn compact(&mut self) {
        if self.start > 0 && self.start * 2 >= self.data.len() {
            self.data.drain(..self.start);
            self.start = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl ChunkBuffer {
        fn extend_from_slice(&mut self, chunk: &[u8]) {
            self.compact();
            self.data.extend_from_slice(chunk);
        }
    }

    /// Reader yielding at most `step` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn consume_and_find_use_relative_offsets() {
        let mut buf = ChunkBuffer::default();
        buf.extend_from_slice(b"abc--def--ghi");
        let finder = Finder::new(b"--");

        assert_eq!(buf.find(&finder, 0), Some(3));
        assert_eq!(buf.find(&finder, 4), Some(8));
        buf.consume(5);
        assert_eq!(buf.as_slice(), b"def--ghi");
        assert_eq!(buf.find(&finder, 0), Some(3));
        assert_eq!(buf.find(&finder, 4), None);
        assert_eq!(buf.find(&finder, 100), None);
    }

    #[test]
    fn consume_everything_resets() {
        let mut buf = ChunkBuffer::with_capacity(8);
        buf.extend_from_slice(b"abcd");
        buf.consume(10);
        assert!(buf.is_empty());
        assert_eq!(buf.start, 0);
        assert!(buf.data.is_empty());
    }

    #[test]
    fn compaction_preserves_unconsumed_bytes() {
        let mut buf = ChunkBuffer::default();
        buf.extend_from_slice(b"0123456789");
        buf.consume(6);
        buf.extend_from_slice(b"ab");
        assert_eq!(buf.start, 0);
        assert_eq!(buf.as_slice(), b"6789ab");

        buf.consume(1);
        buf.extend_from_slice(b"c");
        // Dead prefix too small to be worth moving.
        assert_eq!(buf.start, 1);
        assert_eq!(buf.as_slice(), b"789abc");
    }

    #[test]
    fn fill_from_appends_single_read() {
        let mut reader = Trickle { data: b"hello world", step: 4 };
        let mut buf = ChunkBuffer::default();

        assert_eq!(buf.fill_from(&mut reader, 16).unwrap(), 4);
        assert_eq!(buf.as_slice(), b"hell");
        assert_eq!(buf.fill_from(&mut reader, 2).unwrap(), 2);
        assert_eq!(buf.as_slice(), b"hello ");
        while buf.fill_from(&mut reader, 16).unwrap() > 0 {}
        assert_eq!(buf.as_slice(), b"hello world");
        assert_eq!(buf.fill_from(&mut reader, 16).unwrap(), 0);
        assert_eq!(buf.len(), 11);
    }

    #[test]
    fn fill_from_retries_interrupted_reads() {
        struct Flaky {
            interrupted: bool,
        }
        impl Read for Flaky {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if !self.interrupted {
                    self.interrupted = true;
                    return Err(io::Error::new(io::ErrorKind::Interrupted, "signal"));
                }
                buf[0] = b'x';
                Ok(1)
            }
        }

        let mut buf = ChunkBuffer::default();
        assert_eq!(buf.fill_from(&mut Flaky { interrupted: false }, 4).unwrap(), 1);
        assert_eq!(buf.as_slice(), b"x");
    }

    #[test]
    fn fill_from_error_leaves_buffer_intact() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::InvalidData, "corrupt deflate stream"))
            }
        }

        let mut buf = ChunkBuffer::default();
        buf.extend_from_slice(b"kept");
        assert!(buf.fill_from(&mut Broken, 4).is_err());
        assert_eq!(buf.as_slice(), b"kept");

        buf.consume(4);
        assert!(buf.is_empty());
    }
}
