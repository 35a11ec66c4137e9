//! Error types for the signing and verification engine.
//!
//! Every failure kind a caller can branch on lives here. The taxonomy
//! distinguishes credential problems (store, PIN, certificate) from pipeline
//! problems (pages, TSA, signing) so callers never have to inspect message
//! text.

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during signing or verification.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A key-material backend could not be opened or unlocked.
    #[error("Key store initialization failed: {0}")]
    KeyStoreInitializationFailed(String),

    /// Authentication against a backend was rejected.
    #[error("Invalid PIN: {0}")]
    InvalidPin(String),

    /// No hardware slot matches the requested token serial.
    #[error("Token not found: {0}")]
    TokenNotFound(String),

    /// No certificate with the requested serial exists in the backing store.
    #[error("Certificate not found: {0}")]
    CertificateNotFound(String),

    /// A matching certificate was located but its validity window has passed.
    #[error("Certificate expired: {0}")]
    CertificateExpired(String),

    /// A matching certificate lacks the digital-signature key-usage bit.
    #[error("Not a digital signature certificate: {0}")]
    NotADigitalSignatureCertificate(String),

    /// The object retrieved for a certificate is not a private key.
    #[error("Not a private key: {0}")]
    NotAPrivateKey(String),

    /// Malformed or out-of-range page selector.
    #[error("Invalid page specification: {0}")]
    InvalidPageSpecification(String),

    /// The timestamp authority probe or request failed.
    #[error("Timestamp authority unreachable: {0}")]
    TimestampAuthorityUnreachable(String),

    /// Generic cryptographic or document-assembly failure while signing.
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// An interactive credential operation was aborted by the user.
    /// Callers should not treat this as a retryable error.
    #[error("Signing was cancelled by the user: {0}")]
    UserCancelled(String),

    /// Verification was attempted on a document with no signature fields.
    #[error("No signatures found in the document")]
    NoSignaturesFound,

    /// Signature options failed validation before signing began.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// The input bytes are not a well-formed PDF.
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the failure came from the user dismissing an interactive
    /// credential prompt rather than from the pipeline itself.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::UserCancelled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_detail() {
        let err = Error::CertificateNotFound("serial 0abc12".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Certificate not found"));
        assert!(msg.contains("0abc12"));
    }

    #[test]
    fn test_cancellation_is_distinguished() {
        assert!(Error::UserCancelled("PIN prompt dismissed".to_string()).is_cancelled());
        assert!(!Error::SigningFailed("broken".to_string()).is_cancelled());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
