//! Certificate usability predicates.
//!
//! Pure checks every backend runs before handing out a credential. A
//! certificate without a key-usage extension is treated as unrestricted:
//! both capability predicates answer true when the extension is absent.

use crate::error::{Error, Result};
use x509_parser::prelude::*;

fn parse(der: &[u8]) -> Result<X509Certificate<'_>> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| Error::KeyStoreInitializationFailed(format!("certificate parse failed: {}", e)))?;
    Ok(cert)
}

/// Whether the certificate's validity window has passed (or not yet begun).
pub fn is_expired(der: &[u8]) -> Result<bool> {
    let cert = parse(der)?;
    Ok(!cert.validity().is_valid_at(ASN1Time::now()))
}

/// Whether the key-usage extension permits digital signatures (bit 0).
pub fn is_digital_signature_capable(der: &[u8]) -> Result<bool> {
    let cert = parse(der)?;
    match cert.key_usage() {
        Ok(Some(usage)) => Ok(usage.value.digital_signature()),
        Ok(None) => Ok(true),
        Err(e) => Err(Error::KeyStoreInitializationFailed(format!(
            "key-usage extension unreadable: {}",
            e
        ))),
    }
}

/// Whether the key-usage extension permits encipherment (bits 2 or 3).
pub fn is_encryption_capable(der: &[u8]) -> Result<bool> {
    let cert = parse(der)?;
    match cert.key_usage() {
        Ok(Some(usage)) => Ok(usage.value.key_encipherment() || usage.value.data_encipherment()),
        Ok(None) => Ok(true),
        Err(e) => Err(Error::KeyStoreInitializationFailed(format!(
            "key-usage extension unreadable: {}",
            e
        ))),
    }
}

/// Hex rendering of the certificate serial, lowercase, no separators.
pub fn serial_hex(der: &[u8]) -> Result<String> {
    let cert = parse(der)?;
    Ok(cert
        .raw_serial()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

/// Subject CN, or "Unknown Signer" when the subject has no parseable CN.
pub fn subject_common_name(der: &[u8]) -> String {
    let cn = match parse(der) {
        Ok(cert) => cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string),
        Err(_) => None,
    };
    cn.unwrap_or_else(|| "Unknown Signer".to_string())
}

/// Issuer and serial for matching a SignerInfo back to its certificate.
pub fn issuer_der_and_serial(der: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let cert = parse(der)?;
    Ok((cert.issuer().as_raw().to_vec(), cert.raw_serial().to_vec()))
}

/// Case-fold and trim a serial for comparison.
pub fn canonical_serial(serial: &str) -> String {
    serial.trim().to_ascii_lowercase()
}

/// Strip leading zero digits, aligning big-integer hex output with what
/// certificate stores report.
pub fn strip_leading_zeros(serial: &str) -> &str {
    let stripped = serial.trim_start_matches('0');
    if stripped.is_empty() {
        "0"
    } else {
        stripped
    }
}

/// Serial comparison used by the hardware and archive backends.
pub fn serials_match(a: &str, b: &str) -> bool {
    canonical_serial(a) == canonical_serial(b)
}

/// Serial comparison used by the platform backend, tolerant of a leading
/// zero introduced by big-integer rendering.
pub fn serials_match_normalized(a: &str, b: &str) -> bool {
    strip_leading_zeros(&canonical_serial(a)) == strip_leading_zeros(&canonical_serial(b))
}
