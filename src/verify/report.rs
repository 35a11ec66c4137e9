//! Verification report model.
//!
//! The serialized shape is part of the public contract: external consumers
//! read the JSON form, so field names are stable camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Certification-type labels derived from the document's DocMDP level.
pub const NOT_CERTIFIED: &str = "NOT_CERTIFIED";
pub const CERTIFIED_CHANGES_NOT_ALLOWED: &str = "CERTIFIED_CHANGES_NOT_ALLOWED";
pub const CERTIFIED_FORM_FILLING_ALLOWED: &str = "CERTIFIED_FORM_FILLING_ALLOWED";
pub const CERTIFIED_FORM_FILLING_AND_ANNOTATIONS_ALLOWED: &str =
    "CERTIFIED_FORM_FILLING_AND_ANNOTATIONS_ALLOWED";

/// Map a DocMDP /P value to its label. Zero means no certification.
pub fn certification_label(level: i64) -> &'static str {
    match level {
        1 => CERTIFIED_CHANGES_NOT_ALLOWED,
        2 => CERTIFIED_FORM_FILLING_ALLOWED,
        3 => CERTIFIED_FORM_FILLING_AND_ANNOTATIONS_ALLOWED,
        _ => NOT_CERTIFIED,
    }
}

/// Complete result of one verification pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub document: DocumentReport,
    /// One entry per signature field, in revision order.
    pub signatures: Vec<SignatureReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReport {
    pub total_pages: usize,
    /// Wall clock at verification time, not signing time.
    pub verification_time: DateTime<Utc>,
    pub certification: CertificationReport,
    pub integrity_checks: IntegrityReport,
    pub verification_summary: SummaryReport,
    pub last_signer_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationReport {
    pub is_certified: bool,
    pub certification_type: String,
    pub modification_allowed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// Whether the newest signature covers the whole file.
    pub covers_entire_document: bool,
    pub revision_number: usize,
    pub has_additional_signatures_after: bool,
    pub has_tampering: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub total_signatures: usize,
    pub valid_signatures: usize,
    pub invalid_signatures: usize,
    pub all_signatures_valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureReport {
    /// 1-based position in revision order.
    pub signature_index: usize,
    pub signature_name: String,
    /// 1-based page carrying the widget; 0 when the page link is missing.
    pub page_number: usize,
    /// The /M entry of the signature dictionary, verbatim.
    pub signing_time: Option<String>,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub signature_valid: bool,
    pub covers_entire_document: bool,
    pub certificate: Option<CertificateReport>,
    pub revocation_info: RevocationReport,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateReport {
    #[serde(rename = "subjectDN")]
    pub subject_dn: String,
    #[serde(rename = "issuerDN")]
    pub issuer_dn: String,
    pub valid_from: String,
    pub valid_to: String,
    pub serial_number: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationReport {
    pub is_time_stamp_present: bool,
    pub has_revocation_material: bool,
    pub is_long_term_validation: bool,
}

impl VerificationReport {
    /// Pretty-printed JSON form for external consumption.
    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::error::Error::SigningFailed(format!("report serialization: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certification_labels() {
        assert_eq!(certification_label(0), "NOT_CERTIFIED");
        assert_eq!(certification_label(1), "CERTIFIED_CHANGES_NOT_ALLOWED");
        assert_eq!(certification_label(2), "CERTIFIED_FORM_FILLING_ALLOWED");
        assert_eq!(
            certification_label(3),
            "CERTIFIED_FORM_FILLING_AND_ANNOTATIONS_ALLOWED"
        );
        assert_eq!(certification_label(7), "NOT_CERTIFIED");
    }

    #[test]
    fn test_json_field_names_are_stable() {
        let report = VerificationReport {
            document: DocumentReport {
                total_pages: 2,
                verification_time: Utc::now(),
                certification: CertificationReport {
                    is_certified: false,
                    certification_type: NOT_CERTIFIED.to_string(),
                    modification_allowed: true,
                },
                integrity_checks: IntegrityReport {
                    covers_entire_document: true,
                    revision_number: 1,
                    has_additional_signatures_after: false,
                    has_tampering: false,
                },
                verification_summary: SummaryReport {
                    total_signatures: 1,
                    valid_signatures: 1,
                    invalid_signatures: 0,
                    all_signatures_valid: true,
                },
                last_signer_name: "sig".to_string(),
            },
            signatures: vec![SignatureReport {
                signature_index: 1,
                signature_name: "sig".to_string(),
                page_number: 1,
                signing_time: None,
                reason: None,
                location: None,
                signature_valid: true,
                covers_entire_document: true,
                certificate: Some(CertificateReport {
                    subject_dn: "CN=A".to_string(),
                    issuer_dn: "CN=B".to_string(),
                    valid_from: "2024-01-01".to_string(),
                    valid_to: "2025-01-01".to_string(),
                    serial_number: "0a".to_string(),
                }),
                revocation_info: RevocationReport::default(),
                warnings: Vec::new(),
            }],
        };
        let json = report.to_json().unwrap();
        assert!(json.contains("\"verificationSummary\""));
        assert!(json.contains("\"subjectDN\""));
        assert!(json.contains("\"isTimeStampPresent\""));
        assert!(json.contains("\"lastSignerName\""));
    }
}
