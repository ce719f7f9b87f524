//! Record decoders.
//!
//! Turns one source file into an ordered sequence of loosely-typed
//! attribute trees ([`RawRecord`]s). Tokenizing is a library concern
//! (`roxmltree`, `serde_json`); this module owns the *normalization* of
//! decoded trees into records: repeated XML elements fold into arrays,
//! adversary JSON wrappers unwrap, sourcebook tags are extracted.
//!
//! A decoder never yields a partial record: a file either decodes
//! completely or fails with a [`DecodeError`] carrying its path.
//!
//! Export files arrive in a mix of encodings (UTF-8 with and without BOM,
//! Latin-1, Windows-1252), so both decoders run byte-level encoding
//! detection before parsing.

pub mod json;
pub mod xml;

use std::path::Path;

use crate::error::{DecodeError, DecodeResult};
use crate::models::{FileFormat, RawRecord, SourceFile};

/// Decode a source file with the decoder matching its format.
pub fn decode(file: &SourceFile) -> DecodeResult<Vec<RawRecord>> {
    match file.format {
        FileFormat::Xml => xml::decode_file(file),
        FileFormat::Json => json::decode_file(file),
    }
}

/// Detect the encoding of raw bytes.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string, stripping any leading byte-order mark.
///
/// Valid UTF-8 passes through untouched; anything else goes through
/// encoding detection, with Windows-1252 as the single-byte fallback
/// (what the exports actually use when they are not UTF-8).
pub fn decode_bytes(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => match detect_encoding(bytes).as_str() {
            "iso-8859-1" => encoding_rs::ISO_8859_15.decode(bytes).0.to_string(),
            _ => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        },
    };
    text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text)
}

/// Read a file and decode its bytes to text.
pub fn read_file(path: &Path) -> DecodeResult<String> {
    let bytes = std::fs::read(path).map_err(|source| DecodeError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decode_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_utf8() {
        assert_eq!(detect_encoding("hello world".as_bytes()), "utf-8");
    }

    #[test]
    fn test_decode_bytes_strips_bom() {
        let bytes = [0xEF, 0xBB, 0xBF, b'{', b'}'];
        assert_eq!(decode_bytes(&bytes), "{}");
    }

    #[test]
    fn test_decode_latin1_bytes() {
        // "Téra" in ISO-8859-1.
        let bytes = [b'T', 0xE9, b'r', b'a'];
        let text = decode_bytes(&bytes);
        assert!(text.contains('é'), "got: {text}");
    }
}
