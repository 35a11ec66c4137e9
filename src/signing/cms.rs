//! Detached CAdES container assembly.
//!
//! Builds the CMS SignedData that goes into a signature dictionary's
//! /Contents: SHA-256 signed attributes (content type, message digest,
//! signing-certificate-v2), an RSA PKCS#1 v1.5 signature over their DER SET,
//! the certificate chain, optional revocation material for LTV, and an
//! optional RFC 3161 timestamp token as an unsigned attribute.
//!
//! Assembly is manual rather than builder-driven because the private key may
//! be an opaque device handle that only exposes a sign operation.

use crate::error::{Error, Result};
use crate::keystore::CertificateCredential;
use crate::signing::revocation::RevocationMaterial;
use crate::signing::tsa::TsaClient;
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::revocation::{OtherRevocationInfoFormat, RevocationInfoChoice, RevocationInfoChoices};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo, SignerInfos,
};
use der::asn1::{ObjectIdentifier, OctetString, SetOfVec};
use der::{Any, Decode, Encode, Sequence};
use sha2::{Digest, Sha256};
use spki::AlgorithmIdentifierOwned;
use x509_cert::attr::Attribute;
use x509_cert::crl::CertificateList;
use x509_cert::Certificate;

pub(crate) const OID_DATA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
pub(crate) const OID_SIGNED_DATA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
pub(crate) const OID_CONTENT_TYPE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
pub(crate) const OID_MESSAGE_DIGEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
pub(crate) const OID_SIGNING_CERTIFICATE_V2: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.47");
pub(crate) const OID_TIMESTAMP_TOKEN: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.14");
pub(crate) const OID_SHA256: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
pub(crate) const OID_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
pub(crate) const OID_OCSP_RESPONSE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.16.2");

fn cms_error(context: &str, err: impl std::fmt::Display) -> Error {
    Error::SigningFailed(format!("{}: {}", context, err))
}

fn sha256_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: OID_SHA256,
        parameters: None,
    }
}

fn rsa_algorithm() -> Result<AlgorithmIdentifierOwned> {
    Ok(AlgorithmIdentifierOwned {
        oid: OID_RSA_ENCRYPTION,
        parameters: Some(Any::null()),
    })
}

/// ESSCertIDv2 (RFC 5035) restricted to what the signed attribute needs.
#[derive(Clone, Debug, Sequence)]
struct EssCertIdV2 {
    hash_algorithm: AlgorithmIdentifierOwned,
    cert_hash: OctetString,
}

/// SigningCertificateV2 without policies.
#[derive(Clone, Debug, Sequence)]
struct SigningCertificateV2 {
    certs: Vec<EssCertIdV2>,
}

fn attribute(oid: ObjectIdentifier, value: Any) -> Result<Attribute> {
    let values =
        SetOfVec::try_from(vec![value]).map_err(|e| cms_error("attribute value set", e))?;
    Ok(Attribute { oid, values })
}

/// The three CAdES signed attributes over a content digest.
fn signed_attributes(content_digest: &[u8], leaf_der: &[u8]) -> Result<SetOfVec<Attribute>> {
    let content_type = attribute(
        OID_CONTENT_TYPE,
        Any::encode_from(&OID_DATA).map_err(|e| cms_error("content-type attribute", e))?,
    )?;

    let digest_value = OctetString::new(content_digest)
        .map_err(|e| cms_error("message-digest attribute", e))?;
    let message_digest = attribute(
        OID_MESSAGE_DIGEST,
        Any::encode_from(&digest_value).map_err(|e| cms_error("message-digest attribute", e))?,
    )?;

    let cert_hash = OctetString::new(Sha256::digest(leaf_der).to_vec())
        .map_err(|e| cms_error("signing-certificate attribute", e))?;
    let signing_certificate = SigningCertificateV2 {
        certs: vec![EssCertIdV2 {
            hash_algorithm: sha256_algorithm(),
            cert_hash,
        }],
    };
    let signing_certificate = attribute(
        OID_SIGNING_CERTIFICATE_V2,
        Any::encode_from(&signing_certificate)
            .map_err(|e| cms_error("signing-certificate attribute", e))?,
    )?;

    let mut attrs = SetOfVec::new();
    for attr in [content_type, message_digest, signing_certificate] {
        attrs
            .insert(attr)
            .map_err(|e| cms_error("signed attributes", e))?;
    }
    Ok(attrs)
}

fn certificate_set(chain: &[Vec<u8>]) -> Result<CertificateSet> {
    let mut certs = SetOfVec::new();
    for der in chain {
        let cert =
            Certificate::from_der(der).map_err(|e| cms_error("chain certificate", e))?;
        certs
            .insert(CertificateChoices::Certificate(cert))
            .map_err(|e| cms_error("certificate set", e))?;
    }
    Ok(CertificateSet(certs))
}

fn revocation_choices(material: &RevocationMaterial) -> Result<Option<RevocationInfoChoices>> {
    if material.is_empty() {
        return Ok(None);
    }
    let mut choices = SetOfVec::new();
    for crl_der in &material.crls {
        let crl =
            CertificateList::from_der(crl_der).map_err(|e| cms_error("CRL", e))?;
        choices
            .insert(RevocationInfoChoice::Crl(crl))
            .map_err(|e| cms_error("revocation set", e))?;
    }
    for ocsp_der in &material.ocsp_responses {
        let other = OtherRevocationInfoFormat {
            other_format: AlgorithmIdentifierOwned {
                oid: OID_OCSP_RESPONSE,
                parameters: None,
            },
            other: Any::from_der(ocsp_der).map_err(|e| cms_error("OCSP response", e))?,
        };
        choices
            .insert(RevocationInfoChoice::Other(other))
            .map_err(|e| cms_error("revocation set", e))?;
    }
    Ok(Some(RevocationInfoChoices(choices)))
}

/// Produce the DER ContentInfo for a detached signature over `covered`.
///
/// When a TSA client is given, the timestamp is requested over the final
/// signature value and attached as an unsigned attribute, so the token
/// attests the signature itself.
pub fn sign_detached(
    covered: &[u8],
    credential: &CertificateCredential,
    revocation: Option<&RevocationMaterial>,
    timestamp: Option<&TsaClient>,
) -> Result<Vec<u8>> {
    let content_digest = Sha256::digest(covered);
    let leaf = Certificate::from_der(credential.leaf())
        .map_err(|e| cms_error("signing certificate", e))?;

    let signed_attrs = signed_attributes(&content_digest, credential.leaf())?;
    let attrs_der = signed_attrs
        .to_der()
        .map_err(|e| cms_error("signed attributes", e))?;
    let signature = credential.sign_sha256(&attrs_der)?;

    let unsigned_attrs = match timestamp {
        Some(tsa) => {
            let token = tsa.timestamp(&Sha256::digest(&signature))?;
            let value =
                Any::from_der(&token).map_err(|e| cms_error("timestamp token", e))?;
            let mut attrs = SetOfVec::new();
            attrs
                .insert(attribute(OID_TIMESTAMP_TOKEN, value)?)
                .map_err(|e| cms_error("unsigned attributes", e))?;
            Some(attrs)
        }
        None => None,
    };

    let crls = match revocation {
        Some(material) => revocation_choices(material)?,
        None => None,
    };
    let has_other_revocation = revocation.map_or(false, |m| !m.ocsp_responses.is_empty());

    let signer_info = SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: leaf.tbs_certificate.issuer.clone(),
            serial_number: leaf.tbs_certificate.serial_number.clone(),
        }),
        digest_alg: sha256_algorithm(),
        signed_attrs: Some(signed_attrs),
        signature_algorithm: rsa_algorithm()?,
        signature: OctetString::new(signature).map_err(|e| cms_error("signature value", e))?,
        unsigned_attrs,
    };

    let mut digest_algorithms = SetOfVec::new();
    digest_algorithms
        .insert(sha256_algorithm())
        .map_err(|e| cms_error("digest algorithms", e))?;
    let mut signer_infos = SetOfVec::new();
    signer_infos
        .insert(signer_info)
        .map_err(|e| cms_error("signer infos", e))?;

    let signed_data = SignedData {
        // OtherRevocationInfoFormat bumps the SignedData version to 5.
        version: if has_other_revocation {
            CmsVersion::V5
        } else {
            CmsVersion::V1
        },
        digest_algorithms,
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: OID_DATA,
            econtent: None,
        },
        certificates: Some(certificate_set(&credential.chain)?),
        crls,
        signer_infos: SignerInfos(signer_infos),
    };

    let content_info = ContentInfo {
        content_type: OID_SIGNED_DATA,
        content: Any::encode_from(&signed_data).map_err(|e| cms_error("SignedData", e))?,
    };
    content_info
        .to_der()
        .map_err(|e| cms_error("ContentInfo", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_attributes_shape() {
        let digest = Sha256::digest(b"content");
        // Attribute construction does not touch the certificate bytes beyond
        // hashing, so junk input is fine here.
        let attrs = signed_attributes(&digest, b"leaf-der").unwrap();
        assert_eq!(attrs.len(), 3);
        let oids: Vec<_> = attrs.iter().map(|a| a.oid).collect();
        assert!(oids.contains(&OID_CONTENT_TYPE));
        assert!(oids.contains(&OID_MESSAGE_DIGEST));
        assert!(oids.contains(&OID_SIGNING_CERTIFICATE_V2));
    }

    #[test]
    fn test_signed_attributes_der_is_a_set() {
        let digest = Sha256::digest(b"content");
        let attrs = signed_attributes(&digest, b"leaf-der").unwrap();
        let der = attrs.to_der().unwrap();
        // SET OF tag.
        assert_eq!(der[0], 0x31);
    }

    #[test]
    fn test_empty_revocation_material_collapses_to_none() {
        let material = RevocationMaterial::default();
        assert!(revocation_choices(&material).unwrap().is_none());
    }

    #[test]
    fn test_ocsp_material_becomes_an_other_choice() {
        let material = RevocationMaterial {
            crls: Vec::new(),
            // An empty SEQUENCE stands in for a response body; only the
            // envelope shape matters here.
            ocsp_responses: vec![vec![0x30, 0x00]],
        };
        let choices = revocation_choices(&material).unwrap().unwrap();
        assert_eq!(choices.0.len(), 1);
        match choices.0.as_slice() {
            [RevocationInfoChoice::Other(other)] => {
                assert_eq!(other.other_format.oid, OID_OCSP_RESPONSE);
                assert!(other.other_format.parameters.is_none());
            }
            _ => panic!("expected an OtherRevocationInfoFormat choice"),
        }
    }
}
