//! Incremental PDF signing.
//!
//! The pipeline lives in [`signer`]; the remaining modules are its parts:
//! page-specification parsing, signature-size estimation, the visible
//! appearance, ByteRange bookkeeping, CMS assembly, the timestamp client,
//! and revocation-evidence collection.

pub mod appearance;
pub mod byterange;
pub mod cms;
pub mod estimate;
pub mod pages;
pub mod revocation;
pub mod signer;
pub mod tsa;

pub use estimate::estimate_size;
pub use pages::resolve_pages;
pub use revocation::RevocationMaterial;
pub use signer::{sign_document, SigningRequest};
pub use tsa::{TsaClient, DEFAULT_TSA_URLS};

/// What a signature permits after it is applied.
///
/// Every revision except the last is open so the following revisions do not
/// invalidate it; the last one carries the caller's choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentModificationPolicy {
    /// No certification; later changes are ordinary revisions.
    Open,
    /// DocMDP certification allowing form filling only.
    RestrictedToFormFilling,
}
