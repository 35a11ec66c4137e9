//! ByteRange reservation and patching.
//!
//! A signature dictionary is serialized with two placeholders: a /Contents
//! hex string of zeros sized by the estimator, and a fixed-width /ByteRange
//! array. Once the revision's bytes are final, the real offsets are patched
//! into the ByteRange in place (the replacement is byte-for-byte the same
//! width, so no offset shifts), the covered bytes are hashed, and the DER
//! signature is written into the hex window.

use crate::error::{Error, Result};
use crate::pdf::object::Object;

/// Serialized width matches any patched-in value up to 10 digits per field.
pub const BYTE_RANGE_PLACEHOLDER: &[u8] = b"[0 0000000000 0000000000 0000000000]";

/// The /ByteRange placeholder object.
pub fn byte_range_placeholder() -> Object {
    Object::Raw(BYTE_RANGE_PLACEHOLDER.to_vec())
}

/// The /Contents placeholder: `reserved` zero bytes, hex-serialized.
pub fn contents_placeholder(reserved: usize) -> Object {
    Object::HexString(vec![0u8; reserved])
}

/// Location of the /Contents hex string within serialized output.
#[derive(Debug, Clone, Copy)]
pub struct SignatureWindow {
    /// Offset of the opening `<`.
    pub start: usize,
    /// Offset one past the closing `>`.
    pub end: usize,
}

impl SignatureWindow {
    /// The ByteRange array this window implies for a file of `total` bytes.
    pub fn byte_range(&self, total: usize) -> [i64; 4] {
        [
            0,
            self.start as i64,
            self.end as i64,
            (total - self.end) as i64,
        ]
    }
}

/// Find the reserved /Contents window, scanning forward from `from` (the
/// serialized signature dictionary's offset).
pub fn locate_window(data: &[u8], from: usize, reserved: usize) -> Result<SignatureWindow> {
    let needle: &[u8] = b"/Contents <";
    let region = &data[from..];
    let rel = region
        .windows(needle.len())
        .position(|w| w == needle)
        .ok_or_else(|| Error::SigningFailed("reserved /Contents not found".to_string()))?;
    let start = from + rel + needle.len() - 1;
    let end = start + 1 + reserved * 2 + 1;
    if end > data.len() || data[end - 1] != b'>' {
        return Err(Error::SigningFailed(
            "reserved /Contents window is malformed".to_string(),
        ));
    }
    if !data[start + 1..end - 1].iter().all(|&b| b == b'0') {
        return Err(Error::SigningFailed(
            "reserved /Contents window is not empty".to_string(),
        ));
    }
    Ok(SignatureWindow { start, end })
}

/// Render a ByteRange with the exact placeholder width.
pub fn format_byte_range(range: [i64; 4]) -> Vec<u8> {
    format!(
        "[{} {:010} {:010} {:010}]",
        range[0], range[1], range[2], range[3]
    )
    .into_bytes()
}

/// Patch the /ByteRange placeholder in place. Returns the patched range.
pub fn patch_byte_range(
    data: &mut [u8],
    from: usize,
    window: &SignatureWindow,
) -> Result<[i64; 4]> {
    let total = data.len();
    let range = window.byte_range(total);
    let rendered = format_byte_range(range);
    if rendered.len() != BYTE_RANGE_PLACEHOLDER.len() {
        return Err(Error::SigningFailed(format!(
            "byte range {:?} does not fit the reserved width",
            range
        )));
    }
    let rel = data[from..]
        .windows(BYTE_RANGE_PLACEHOLDER.len())
        .position(|w| w == BYTE_RANGE_PLACEHOLDER)
        .ok_or_else(|| Error::SigningFailed("ByteRange placeholder not found".to_string()))?;
    let at = from + rel;
    data[at..at + rendered.len()].copy_from_slice(&rendered);
    Ok(range)
}

/// Concatenate the bytes a ByteRange covers.
pub fn covered_bytes(data: &[u8], range: &[i64; 4]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for pair in range.chunks(2) {
        let (start, len) = (pair[0], pair[1]);
        if start < 0 || len < 0 {
            return Err(Error::InvalidPdf("negative ByteRange entry".to_string()));
        }
        let (start, len) = (start as usize, len as usize);
        let end = start
            .checked_add(len)
            .filter(|&e| e <= data.len())
            .ok_or_else(|| Error::InvalidPdf("ByteRange exceeds file size".to_string()))?;
        out.extend_from_slice(&data[start..end]);
    }
    Ok(out)
}

/// Write the DER signature into the hex window, zero-padded to the right.
pub fn embed_signature(data: &mut [u8], window: &SignatureWindow, der: &[u8]) -> Result<()> {
    let capacity = (window.end - window.start - 2) / 2;
    if der.len() > capacity {
        return Err(Error::SigningFailed(format!(
            "signature container is {} bytes but only {} were reserved",
            der.len(),
            capacity
        )));
    }
    let mut cursor = window.start + 1;
    for &byte in der {
        let hex = format!("{:02X}", byte);
        data[cursor..cursor + 2].copy_from_slice(hex.as_bytes());
        cursor += 2;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(reserved: usize) -> Vec<u8> {
        let mut data = b"header /SigDict << /ByteRange ".to_vec();
        data.extend_from_slice(BYTE_RANGE_PLACEHOLDER);
        data.extend_from_slice(b" /Contents <");
        data.extend(std::iter::repeat(b'0').take(reserved * 2));
        data.extend_from_slice(b"> >> trailer bytes");
        data
    }

    #[test]
    fn test_locate_and_patch() {
        let mut data = fixture(16);
        let window = locate_window(&data, 0, 16).unwrap();
        assert_eq!(data[window.start], b'<');
        assert_eq!(data[window.end - 1], b'>');

        let range = patch_byte_range(&mut data, 0, &window).unwrap();
        assert_eq!(range[0], 0);
        assert_eq!(range[1] as usize, window.start);
        assert_eq!(range[2] as usize, window.end);
        assert_eq!(range[1] + range[3], data.len() as i64 - (range[2] - range[1]));
        assert!(!data
            .windows(BYTE_RANGE_PLACEHOLDER.len())
            .any(|w| w == BYTE_RANGE_PLACEHOLDER));
        // Same width after patching.
        assert_eq!(data.len(), fixture(16).len());
    }

    #[test]
    fn test_covered_bytes_excludes_window() {
        let mut data = fixture(8);
        let window = locate_window(&data, 0, 8).unwrap();
        let range = patch_byte_range(&mut data, 0, &window).unwrap();
        let covered = covered_bytes(&data, &range).unwrap();
        assert_eq!(covered.len(), data.len() - (window.end - window.start));
        assert!(!covered.windows(2).any(|w| w == b"<0"));
    }

    #[test]
    fn test_embed_signature_fits_and_pads() {
        let mut data = fixture(8);
        let window = locate_window(&data, 0, 8).unwrap();
        embed_signature(&mut data, &window, &[0xDE, 0xAD]).unwrap();
        assert_eq!(&data[window.start + 1..window.start + 5], b"DEAD");
        // Remaining hex digits stay zero.
        assert_eq!(&data[window.start + 5..window.end - 1], b"000000000000");

        let too_big = vec![0u8; 9];
        assert!(embed_signature(&mut data, &window, &too_big).is_err());
    }

    #[test]
    fn test_oversized_byte_range_rejected() {
        let range = [0i64, 10, 20, 5];
        let data = vec![0u8; 12];
        assert!(covered_bytes(&data, &range).is_err());
    }

    #[test]
    fn test_placeholder_width_matches_format() {
        assert_eq!(
            format_byte_range([0, 0, 0, 0]).len(),
            BYTE_RANGE_PLACEHOLDER.len()
        );
        assert_eq!(
            format_byte_range([0, 1234567890, 1234567890, 1234567890]).len(),
            BYTE_RANGE_PLACEHOLDER.len()
        );
    }
}
