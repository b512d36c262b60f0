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

//! Body charset detection and confidence-gated decoding.

use encoding::label::encoding_from_whatwg_label;
use encoding::DecoderTrap;

use crate::error::{RecordError, DIAGNOSTIC_PREFIX_LEN};

/// Detections below this confidence are rejected without decoding.
pub const MIN_CONFIDENCE: f32 = 0.5;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Encoding proposed by an [`EncodingDetector`].
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Encoding label, resolvable by the WHATWG label registry.
    pub encoding: String,
    /// Certainty in `[0, 1]`.
    pub confidence: f32,
}

impl Detection {
    pub fn new(encoding: impl Into<String>, confidence: f32) -> Self {
        Detection {
            encoding: encoding.into(),
            confidence,
        }
    }

    /// Whether the detection is certain enough to attempt decoding.
    ///
    /// `NaN` is never confident.
    pub fn is_confident(&self) -> bool {
        self.confidence >= MIN_CONFIDENCE
    }
}

/// Oracle proposing a character encoding for a record body.
pub trait EncodingDetector {
    fn detect(&self, bytes: &[u8]) -> Detection;
}

impl<F> EncodingDetector for F
where
    F: Fn(&[u8]) -> Detection,
{
    fn detect(&self, bytes: &[u8]) -> Detection {
        self(bytes)
    }
}

/// Universal charset detector backed by the `chardet` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChardetDetector;

impl EncodingDetector for ChardetDetector {
    fn detect(&self, bytes: &[u8]) -> Detection {
        if bytes.is_empty() {
            return Detection::new("", 0.0);
        }
        let (charset, confidence, _language) = chardet::detect(&bytes.to_vec());
        let label = chardet::charset2encoding(&charset).to_string();
        Detection::new(label, confidence)
    }
}

/// Run `detector` on `body` and decode it with the proposed encoding.
///
/// Returns the decoded text and the encoding name it was decoded with.
/// Decoding is strict: any byte sequence invalid for the encoding rejects
/// the whole body. A leading UTF-8 byte order mark is dropped.
pub fn decode_body<D>(body: &[u8], detector: &D) -> Result<(String, String), RecordError>
where
    D: EncodingDetector + ?Sized,
{
    let detection = detector.detect(body);
    if !detection.is_confident() {
        let Detection { encoding, confidence } = detection;
        return Err(RecordError::LowConfidence { encoding, confidence });
    }
    let Detection { encoding, confidence } = detection;

    let decoded = encoding_from_whatwg_label(&encoding).and_then(|codec| {
        let bytes = match codec.name() {
            "utf-8" => body.strip_prefix(UTF8_BOM).unwrap_or(body),
            _ => body,
        };
        codec.decode(bytes, DecoderTrap::Strict).ok()
    });
    match decoded {
        Some(text) => Ok((text, encoding)),
        None => {
            log::error!("fail to decode: detected encoding={encoding}, conf={confidence}");
            Err(RecordError::DecodeFailed {
                prefix: body[..body.len().min(DIAGNOSTIC_PREFIX_LEN)].to_vec(),
                encoding,
            })
        }
    }
}
