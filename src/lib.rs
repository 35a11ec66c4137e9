// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::match_like_matches_macro)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # pdf_signet
//!
//! Digital-signature engine for PDF documents: incremental multi-page CAdES
//! signing with hardware tokens, PFX archives, or the platform certificate
//! store, plus standalone signature verification.
//!
//! ## Core Features
//!
//! ### Signing
//! - **Key material**: PKCS#11 hardware tokens, PKCS#12/PFX archives, and
//!   the operating-system certificate store (Windows)
//! - **Incremental revisions**: one signature per selected page, each
//!   revision appended to the previous one's bytes, never rewriting earlier
//!   signed content
//! - **CAdES detached containers**: SHA-256, signing-certificate-v2, with
//!   optional RFC 3161 timestamps and embedded CRL/OCSP material for
//!   long-term validation
//! - **Visible appearances**: dynamic font fitting inside a caller-supplied
//!   box, with headroom reserved for viewer validity marks
//! - **Certification**: optional DocMDP form-filling-only lockdown on the
//!   final revision
//!
//! ### Verification
//! - **No credential required**: everything needed sits in the document
//! - **Structured reports**: per-signature validity, coverage, certificate
//!   detail and warnings, plus document-level certification and integrity
//!   summaries, serializable to JSON
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_signet::keystore::{KeyMaterialProvider, Pkcs12KeyStore};
//! use pdf_signet::options::SignatureOptions;
//! use pdf_signet::signing::{sign_document, SigningRequest};
//! use pdf_signet::verify::verify_document;
//!
//! let provider = KeyMaterialProvider::SoftwareArchive(
//!     Pkcs12KeyStore::open("signer.pfx".as_ref(), "password")?,
//! );
//! let signed = sign_document(SigningRequest {
//!     document: std::fs::read("contract.pdf")?,
//!     provider: &provider,
//!     certificate_serial: None,
//!     options: SignatureOptions::default(),
//!     apply_watermark: false,
//! })?;
//!
//! let report = verify_document(&signed)?;
//! println!("{}", report.to_json()?);
//! ```

pub mod error;
pub mod geometry;
pub mod keystore;
pub mod options;
pub mod pdf;
pub mod signing;
pub mod verify;

pub use error::{Error, Result};
pub use geometry::Rect;
pub use keystore::{CertificateCredential, KeyMaterialProvider};
pub use options::{SignatureOptions, TimestampOptions};
pub use signing::{sign_document, SigningRequest};
pub use verify::{verify_document, VerificationReport};
