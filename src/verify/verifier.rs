//! Signature verification over signed-document bytes.
//!
//! No credential is needed: everything required sits inside the document.
//! Each signature field is checked cryptographically against its covered
//! byte range, and structural problems degrade to a per-signature invalid
//! entry rather than failing the whole report.

use crate::error::{Error, Result};
use crate::keystore::validator::serial_hex;
use crate::pdf::object::{Dict, Object};
use crate::pdf::Document;
use crate::signing::byterange::covered_bytes;
use crate::signing::cms::{OID_MESSAGE_DIGEST, OID_SIGNED_DATA, OID_TIMESTAMP_TOKEN};
use crate::verify::report::*;
use chrono::Utc;
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use der::asn1::OctetString;
use der::{Decode, Encode, Reader, SliceReader};
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};
use signature::Verifier;
use x509_cert::Certificate;
use x509_parser::prelude::{FromDer, X509Certificate};

const WARN_INVALID: &str = "Signature is invalid";
const WARN_PARTIAL_COVERAGE: &str = "Signature does not cover the entire document";
const WARN_LATER_SIGNATURES: &str =
    "Document has additional signatures after this one - possible tampering!";

/// One signature field pulled out of the form.
struct SignatureField {
    name: String,
    dict: Dict,
    page_number: usize,
    byte_range: [i64; 4],
    contents: Vec<u8>,
}

/// Verify every signature in `data` and build the report.
pub fn verify_document(data: &[u8]) -> Result<VerificationReport> {
    let doc = Document::load(data.to_vec())?;
    let mut fields = collect_signature_fields(&doc)?;
    if fields.is_empty() {
        return Err(Error::NoSignaturesFound);
    }
    // Revision order: each later signature covers more of the file.
    fields.sort_by_key(|f| f.byte_range[2] + f.byte_range[3]);

    let total = fields.len();
    let signatures: Vec<SignatureReport> = fields
        .iter()
        .enumerate()
        .map(|(i, field)| verify_field(data, field, i, total))
        .collect();

    let valid = signatures.iter().filter(|s| s.signature_valid).count();
    let level = certification_level(&doc)?;
    let last = &signatures[total - 1];

    Ok(VerificationReport {
        document: DocumentReport {
            total_pages: doc.page_count(),
            verification_time: Utc::now(),
            certification: CertificationReport {
                is_certified: level != 0,
                certification_type: certification_label(level).to_string(),
                modification_allowed: level != 1,
            },
            integrity_checks: IntegrityReport {
                covers_entire_document: last.covers_entire_document,
                revision_number: total,
                has_additional_signatures_after: total > 1,
                has_tampering: valid < total,
            },
            verification_summary: SummaryReport {
                total_signatures: total,
                valid_signatures: valid,
                invalid_signatures: total - valid,
                all_signatures_valid: valid == total,
            },
            last_signer_name: last.signature_name.clone(),
        },
        signatures,
    })
}

fn string_entry(doc: &Document, dict: &Dict, key: &str) -> Result<Option<String>> {
    match doc.resolve_entry(dict, key)? {
        Object::String(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        _ => Ok(None),
    }
}

/// Walk /AcroForm /Fields for signature fields that carry a value.
fn collect_signature_fields(doc: &Document) -> Result<Vec<SignatureField>> {
    let Some((_, form)) = doc.acro_form()? else {
        return Ok(Vec::new());
    };
    let Object::Array(field_refs) = doc.resolve_entry(&form, "Fields")? else {
        return Ok(Vec::new());
    };

    let mut fields = Vec::new();
    for field_obj in &field_refs {
        let Object::Dictionary(field) = doc.resolve(field_obj)? else {
            continue;
        };
        if doc.resolve_entry(&field, "FT")?.as_name() != Some("Sig") {
            continue;
        }
        let Object::Dictionary(sig) = doc.resolve_entry(&field, "V")? else {
            continue;
        };

        let Object::Array(range) = doc.resolve_entry(&sig, "ByteRange")? else {
            continue;
        };
        let range: Vec<i64> = range.iter().filter_map(Object::as_integer).collect();
        let Ok(byte_range) = <[i64; 4]>::try_from(range) else {
            continue;
        };
        let Object::HexString(contents) = doc.resolve_entry(&sig, "Contents")? else {
            continue;
        };

        let name = string_entry(doc, &field, "T")?.unwrap_or_default();
        let page_number = match field.get("P").and_then(Object::as_reference) {
            Some(page_ref) => doc
                .pages()
                .iter()
                .position(|p| p.obj_ref == page_ref)
                .map(|i| i + 1)
                .unwrap_or(0),
            None => 0,
        };
        fields.push(SignatureField {
            name,
            dict: sig,
            page_number,
            byte_range,
            contents,
        });
    }
    Ok(fields)
}

/// The document's DocMDP level: /Perms /DocMDP -> /Reference /TransformParams
/// /P. Zero when the document is not certified.
fn certification_level(doc: &Document) -> Result<i64> {
    let catalog = doc.catalog()?;
    let Object::Dictionary(perms) = doc.resolve_entry(&catalog, "Perms")? else {
        return Ok(0);
    };
    let Object::Dictionary(sig) = doc.resolve_entry(&perms, "DocMDP")? else {
        return Ok(0);
    };
    let Object::Array(references) = doc.resolve_entry(&sig, "Reference")? else {
        return Ok(0);
    };
    for reference in &references {
        let Object::Dictionary(sig_ref) = doc.resolve(reference)? else {
            continue;
        };
        if doc.resolve_entry(&sig_ref, "TransformMethod")?.as_name() != Some("DocMDP") {
            continue;
        }
        let Object::Dictionary(params) = doc.resolve_entry(&sig_ref, "TransformParams")? else {
            continue;
        };
        // /P defaults to 2 when the transform is present but silent.
        return Ok(doc.resolve_entry(&params, "P")?.as_integer().unwrap_or(2));
    }
    Ok(0)
}

fn verify_field(
    data: &[u8],
    field: &SignatureField,
    index: usize,
    total: usize,
) -> SignatureReport {
    let covers_entire_document =
        field.byte_range[2] + field.byte_range[3] == data.len() as i64;

    let outcome = check_signature(data, field);
    let (signature_valid, certificate, revocation_info) = match outcome {
        Ok(checked) => checked,
        Err(err) => {
            log::debug!("signature '{}' failed verification: {}", field.name, err);
            (false, None, RevocationReport::default())
        }
    };

    let mut warnings = Vec::new();
    if !signature_valid {
        warnings.push(WARN_INVALID.to_string());
    }
    if !covers_entire_document {
        warnings.push(WARN_PARTIAL_COVERAGE.to_string());
    }
    if total > 1 && index < total - 1 {
        warnings.push(WARN_LATER_SIGNATURES.to_string());
    }

    // /M, /Reason and /Location are direct entries in our signatures, but a
    // resolve would need the Document again; direct access keeps this a pure
    // function of the field.
    let direct_string = |key: &str| match field.dict.get(key) {
        Some(Object::String(bytes)) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    };

    SignatureReport {
        signature_index: index + 1,
        signature_name: field.name.clone(),
        page_number: field.page_number,
        signing_time: direct_string("M"),
        reason: direct_string("Reason"),
        location: direct_string("Location"),
        signature_valid,
        covers_entire_document,
        certificate,
        revocation_info,
        warnings,
    }
}

/// Cryptographic check of one signature. Any error means invalid.
fn check_signature(
    data: &[u8],
    field: &SignatureField,
) -> Result<(bool, Option<CertificateReport>, RevocationReport)> {
    let signed_data = decode_signed_data(&field.contents)?;
    let signer_info = signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .ok_or_else(|| Error::InvalidPdf("signature has no signer info".to_string()))?;

    let leaf = find_signer_certificate(&signed_data, signer_info)?;
    let leaf_der = leaf
        .to_der()
        .map_err(|e| Error::InvalidPdf(format!("certificate re-encode failed: {}", e)))?;
    let certificate = Some(describe_certificate(&leaf_der)?);
    let revocation_info = describe_revocation(&signed_data, signer_info);

    let covered = covered_bytes(data, &field.byte_range)?;
    let valid = check_signer_info(signer_info, &leaf, &covered)?;
    Ok((valid, certificate, revocation_info))
}

/// Decode the /Contents DER, tolerating the zero padding that fills the
/// reserved window after the real container.
fn decode_signed_data(contents: &[u8]) -> Result<SignedData> {
    let mut reader = SliceReader::new(contents)
        .map_err(|e| Error::InvalidPdf(format!("signature contents: {}", e)))?;
    let content_info: ContentInfo = reader
        .decode()
        .map_err(|e| Error::InvalidPdf(format!("signature contents: {}", e)))?;
    if content_info.content_type != OID_SIGNED_DATA {
        return Err(Error::InvalidPdf(format!(
            "unexpected signature content type {}",
            content_info.content_type
        )));
    }
    content_info
        .content
        .decode_as::<SignedData>()
        .map_err(|e| Error::InvalidPdf(format!("SignedData: {}", e)))
}

fn find_signer_certificate(
    signed_data: &SignedData,
    signer_info: &SignerInfo,
) -> Result<Certificate> {
    let SignerIdentifier::IssuerAndSerialNumber(isn) = &signer_info.sid else {
        return Err(Error::InvalidPdf(
            "signer identified by key id, expected issuer and serial".to_string(),
        ));
    };
    let certificates = signed_data
        .certificates
        .as_ref()
        .ok_or_else(|| Error::InvalidPdf("signature carries no certificates".to_string()))?;
    for choice in certificates.0.iter() {
        let CertificateChoices::Certificate(cert) = choice else {
            continue;
        };
        if cert.tbs_certificate.issuer == isn.issuer
            && cert.tbs_certificate.serial_number == isn.serial_number
        {
            return Ok(cert.clone());
        }
    }
    Err(Error::InvalidPdf(
        "signing certificate not present in the container".to_string(),
    ))
}

fn describe_certificate(leaf_der: &[u8]) -> Result<CertificateReport> {
    let (_, cert) = X509Certificate::from_der(leaf_der)
        .map_err(|e| Error::InvalidPdf(format!("signing certificate: {}", e)))?;
    Ok(CertificateReport {
        subject_dn: cert.subject().to_string(),
        issuer_dn: cert.issuer().to_string(),
        valid_from: cert.validity().not_before.to_string(),
        valid_to: cert.validity().not_after.to_string(),
        serial_number: serial_hex(leaf_der)?,
    })
}

fn describe_revocation(signed_data: &SignedData, signer_info: &SignerInfo) -> RevocationReport {
    let is_time_stamp_present = signer_info
        .unsigned_attrs
        .as_ref()
        .map_or(false, |attrs| {
            attrs.iter().any(|a| a.oid == OID_TIMESTAMP_TOKEN)
        });
    let has_revocation_material = signed_data
        .crls
        .as_ref()
        .map_or(false, |crls| crls.0.len() > 0);
    RevocationReport {
        is_time_stamp_present,
        has_revocation_material,
        is_long_term_validation: is_time_stamp_present && has_revocation_material,
    }
}

/// Check the signed attributes against the covered bytes and the signature
/// value against the certificate's public key.
fn check_signer_info(
    signer_info: &SignerInfo,
    leaf: &Certificate,
    covered: &[u8],
) -> Result<bool> {
    let Some(signed_attrs) = &signer_info.signed_attrs else {
        return Ok(false);
    };

    // The messageDigest attribute binds the attributes to the document.
    let content_digest = Sha256::digest(covered);
    let digest_attr = signed_attrs
        .iter()
        .find(|a| a.oid == OID_MESSAGE_DIGEST)
        .and_then(|a| a.values.iter().next())
        .and_then(|v| v.decode_as::<OctetString>().ok());
    match digest_attr {
        Some(expected) if expected.as_bytes() == content_digest.as_slice() => {}
        _ => return Ok(false),
    }

    let spki_der = leaf
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::InvalidPdf(format!("public key: {}", e)))?;
    let Ok(public_key) = RsaPublicKey::from_public_key_der(&spki_der) else {
        return Ok(false);
    };
    let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public_key);

    let attrs_der = signed_attrs
        .to_der()
        .map_err(|e| Error::InvalidPdf(format!("signed attributes: {}", e)))?;
    let Ok(signature) = rsa::pkcs1v15::Signature::try_from(signer_info.signature.as_bytes())
    else {
        return Ok(false);
    };
    Ok(verifying_key.verify(&attrs_der, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::build_minimal_pdf;

    #[test]
    fn test_unsigned_document_reports_no_signatures() {
        let data = build_minimal_pdf(2);
        let err = verify_document(&data).unwrap_err();
        assert!(matches!(err, Error::NoSignaturesFound));
    }

    #[test]
    fn test_garbage_contents_is_invalid_not_fatal() {
        let field = SignatureField {
            name: "sig".to_string(),
            dict: Dict::new(),
            page_number: 1,
            byte_range: [0, 4, 8, 4],
            contents: vec![0xFF; 16],
        };
        let data = vec![0u8; 12];
        let report = verify_field(&data, &field, 0, 1);
        assert!(!report.signature_valid);
        assert!(report.warnings.contains(&WARN_INVALID.to_string()));
        assert!(report.covers_entire_document);
    }

    #[test]
    fn test_warning_set_for_middle_signature() {
        let field = SignatureField {
            name: "sig".to_string(),
            dict: Dict::new(),
            page_number: 1,
            byte_range: [0, 4, 8, 2],
            contents: vec![0xFF; 16],
        };
        let data = vec![0u8; 12];
        let report = verify_field(&data, &field, 0, 3);
        assert!(report.warnings.contains(&WARN_PARTIAL_COVERAGE.to_string()));
        assert!(report.warnings.contains(&WARN_LATER_SIGNATURES.to_string()));
    }
}
