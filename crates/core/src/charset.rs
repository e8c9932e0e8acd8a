// crates/core/src/charset.rs
//! Character set resolution and strict transcoding.
//!
//! Labels follow the WHATWG encoding standard (`utf-8`, `iso-8859-15`,
//! `windows-1252`, ...). Decoding and encoding never substitute characters:
//! malformed input or unmappable output is an error.

use std::fmt;

use encoding_rs::{Encoding, UTF_8};

use crate::error::CharsetError;

/// A resolved character set.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Charset(&'static Encoding);

impl Charset {
    pub fn utf8() -> Self {
        Charset(UTF_8)
    }

    /// Resolve a charset label. Surrounding whitespace and case are ignored.
    pub fn for_label(label: &str) -> Result<Self, CharsetError> {
        Encoding::for_label(label.trim().as_bytes())
            .map(Charset)
            .ok_or_else(|| CharsetError::Unknown(label.to_string()))
    }

    /// Resolve a label that will be used to write files.
    ///
    /// Some decode-only labels (UTF-16, `replacement`) have no encoder.
    pub fn for_output(label: &str) -> Result<Self, CharsetError> {
        let charset = Self::for_label(label)?;
        if charset.0.output_encoding() != charset.0 {
            return Err(CharsetError::NotWritable(charset.name().to_string()));
        }
        Ok(charset)
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn is_utf8(&self) -> bool {
        self.0 == UTF_8
    }

    /// Decode `bytes`, failing on any malformed sequence. A leading UTF-8
    /// byte order mark is removed.
    pub fn decode_strict(&self, bytes: &[u8]) -> Result<String, CharsetError> {
        let (text, had_errors) = self.0.decode_without_bom_handling(bytes);
        if had_errors {
            return Err(CharsetError::Malformed(self.name().to_string()));
        }
        let text = if self.is_utf8() {
            text.strip_prefix('\u{FEFF}').unwrap_or(&text).to_string()
        } else {
            text.into_owned()
        };
        Ok(text)
    }

    /// Encode `text`, failing if a character has no representation.
    pub fn encode_strict(&self, text: &str) -> Result<Vec<u8>, CharsetError> {
        if self.0.output_encoding() != self.0 {
            return Err(CharsetError::NotWritable(self.name().to_string()));
        }
        if self.is_utf8() {
            return Ok(text.as_bytes().to_vec());
        }
        let (bytes, _, had_unmappable) = self.0.encode(text);
        if had_unmappable {
            return Err(CharsetError::Unmappable(self.name().to_string()));
        }
        Ok(bytes.into_owned())
    }
}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Charset").field(&self.name()).finish()
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
