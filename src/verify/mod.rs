//! Signature verification and its report model.

pub mod report;
pub mod verifier;

pub use report::{
    CertificateReport, CertificationReport, DocumentReport, IntegrityReport, RevocationReport,
    SignatureReport, SummaryReport, VerificationReport,
};
pub use verifier::verify_document;
