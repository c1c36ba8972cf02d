use std::str::FromStr;

use crate::error::SortError;

/// Platform line terminator.
#[cfg(windows)]
pub const NEW_LINE: &str = "\r\n";
/// Platform line terminator.
#[cfg(not(windows))]
pub const NEW_LINE: &str = "\n";

const UTF8_PREAMBLE: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Character encoding of record files.
///
/// Only ASCII compatible encodings are supported, so a line terminator is the same byte
/// sequence as its ASCII text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl Encoding {
    /// Byte order mark written at the start of a file, empty when the encoding has none.
    pub fn preamble(&self) -> &'static [u8] {
        match self {
            Encoding::Utf8 => UTF8_PREAMBLE,
            Encoding::Ascii | Encoding::Latin1 => &[],
        }
    }

    pub fn new_line(&self) -> &'static [u8] {
        NEW_LINE.as_bytes()
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String, SortError> {
        match self {
            Encoding::Utf8 => {
                std::str::from_utf8(bytes)
                    .map(|s| s.to_string())
                    .map_err(|e| SortError::format(String::from_utf8_lossy(bytes), format!("invalid UTF-8: {e}")))
            }
            Encoding::Ascii => {
                if let Some(position) = bytes.iter().position(|b| !b.is_ascii()) {
                    Err(SortError::format(String::from_utf8_lossy(bytes), format!("non ASCII byte at {position}")))
                } else {
                    // ASCII is valid UTF-8
                    Ok(bytes.iter().map(|b| *b as char).collect())
                }
            }
            Encoding::Latin1 => Ok(bytes.iter().map(|b| *b as char).collect()),
        }
    }

    /// Append the encoded `text` to `buffer`.
    pub fn encode_into(&self, text: &str, buffer: &mut Vec<u8>) -> Result<(), SortError> {
        match self {
            Encoding::Utf8 => buffer.extend_from_slice(text.as_bytes()),
            Encoding::Ascii => {
                if !text.is_ascii() {
                    return Err(SortError::format(text, "cannot encode as ASCII"));
                }
                buffer.extend_from_slice(text.as_bytes())
            }
            Encoding::Latin1 => {
                for c in text.chars() {
                    let code = c as u32;
                    if code > 0xFF {
                        return Err(SortError::format(text, format!("cannot encode {c:?} as Latin-1")));
                    }
                    buffer.push(code as u8);
                }
            }
        }
        Ok(())
    }
}

impl FromStr for Encoding {
    type Err = SortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "ascii" | "us-ascii" => Ok(Encoding::Ascii),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Encoding::Latin1),
            _ => Err(SortError::format(s, "unsupported encoding")),
        }
    }
}
