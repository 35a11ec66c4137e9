//! Revocation-evidence collection for long-term validation.
//!
//! Walks the certificate chain, pulls CRLs from each certificate's
//! distribution points and an OCSP response from its issuer's responder, and
//! bundles the raw DER for embedding in the CMS container. Fetches are
//! synchronous; any network failure aborts the signing pipeline rather than
//! producing a document with partial evidence.

use crate::error::{Error, Result};
use der::asn1::{Int, OctetString};
use der::{Encode, Sequence};
use sha1::{Digest, Sha1};
use spki::AlgorithmIdentifierOwned;
use std::io::Read;
use x509_parser::prelude::*;

const OID_SHA1: der::asn1::ObjectIdentifier =
    der::asn1::ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
const OID_AD_OCSP: &str = "1.3.6.1.5.5.7.48.1";
const MAX_FETCH_BYTES: u64 = 4 << 20;

/// Raw DER revocation evidence for one signature.
#[derive(Debug, Clone, Default)]
pub struct RevocationMaterial {
    /// CRLs, one per reachable distribution point.
    pub crls: Vec<Vec<u8>>,
    /// OCSP responses, one per chain link with a responder.
    pub ocsp_responses: Vec<Vec<u8>>,
}

impl RevocationMaterial {
    /// Whether nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.crls.is_empty() && self.ocsp_responses.is_empty()
    }
}

fn fetch_error(url: &str, detail: impl std::fmt::Display) -> Error {
    Error::SigningFailed(format!("revocation fetch from {} failed: {}", url, detail))
}

/// CRL distribution-point URLs in a certificate.
pub fn crl_urls(cert_der: &[u8]) -> Result<Vec<String>> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| Error::SigningFailed(format!("certificate parse failed: {}", e)))?;
    let mut urls = Vec::new();
    for ext in cert.extensions() {
        if let ParsedExtension::CRLDistributionPoints(points) = ext.parsed_extension() {
            for point in points.iter() {
                if let Some(DistributionPointName::FullName(names)) = &point.distribution_point {
                    for name in names {
                        if let GeneralName::URI(uri) = name {
                            urls.push(uri.to_string());
                        }
                    }
                }
            }
        }
    }
    Ok(urls)
}

/// OCSP responder URL from the authority-information-access extension.
pub fn ocsp_url(cert_der: &[u8]) -> Result<Option<String>> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| Error::SigningFailed(format!("certificate parse failed: {}", e)))?;
    for ext in cert.extensions() {
        if let ParsedExtension::AuthorityInfoAccess(aia) = ext.parsed_extension() {
            for desc in &aia.accessdescs {
                if desc.access_method.to_id_string() == OID_AD_OCSP {
                    if let GeneralName::URI(uri) = &desc.access_location {
                        return Ok(Some(uri.to_string()));
                    }
                }
            }
        }
    }
    Ok(None)
}

// RFC 6960 request structures, unsigned, single CertID.

#[derive(Clone, Debug, Sequence)]
struct CertId {
    hash_algorithm: AlgorithmIdentifierOwned,
    issuer_name_hash: OctetString,
    issuer_key_hash: OctetString,
    serial_number: Int,
}

#[derive(Clone, Debug, Sequence)]
struct SingleRequest {
    req_cert: CertId,
}

#[derive(Clone, Debug, Sequence)]
struct TbsRequest {
    request_list: Vec<SingleRequest>,
}

#[derive(Clone, Debug, Sequence)]
struct OcspRequest {
    tbs_request: TbsRequest,
}

/// Build an unsigned OCSP request for `cert` issued by `issuer`.
///
/// CertID hashes use SHA-1 over the issuer name and key, the profile every
/// public responder accepts.
pub fn build_ocsp_request(cert_der: &[u8], issuer_der: &[u8]) -> Result<Vec<u8>> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| Error::SigningFailed(format!("certificate parse failed: {}", e)))?;
    let (_, issuer) = X509Certificate::from_der(issuer_der)
        .map_err(|e| Error::SigningFailed(format!("issuer parse failed: {}", e)))?;

    let name_hash = Sha1::digest(issuer.subject().as_raw());
    let key_hash = Sha1::digest(&issuer.public_key().subject_public_key.data);

    let cert_id = CertId {
        hash_algorithm: AlgorithmIdentifierOwned {
            oid: OID_SHA1,
            parameters: Some(der::Any::null()),
        },
        issuer_name_hash: OctetString::new(name_hash.to_vec())
            .map_err(|e| Error::SigningFailed(format!("OCSP request: {}", e)))?,
        issuer_key_hash: OctetString::new(key_hash.to_vec())
            .map_err(|e| Error::SigningFailed(format!("OCSP request: {}", e)))?,
        serial_number: Int::new(cert.raw_serial())
            .map_err(|e| Error::SigningFailed(format!("OCSP request: {}", e)))?,
    };
    let request = OcspRequest {
        tbs_request: TbsRequest {
            request_list: vec![SingleRequest { req_cert: cert_id }],
        },
    };
    request
        .to_der()
        .map_err(|e| Error::SigningFailed(format!("OCSP request: {}", e)))
}

fn read_body(response: ureq::Response, url: &str) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    response
        .into_reader()
        .take(MAX_FETCH_BYTES)
        .read_to_end(&mut body)
        .map_err(|e| fetch_error(url, e))?;
    Ok(body)
}

fn fetch_crl(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url).call().map_err(|e| fetch_error(url, e))?;
    let body = read_body(response, url)?;
    parse_x509_crl(&body).map_err(|e| fetch_error(url, format!("not a DER CRL: {}", e)))?;
    Ok(body)
}

fn fetch_ocsp(url: &str, request: &[u8]) -> Result<Vec<u8>> {
    let response = ureq::post(url)
        .set("Content-Type", "application/ocsp-request")
        .send_bytes(request)
        .map_err(|e| fetch_error(url, e))?;
    read_body(response, url)
}

/// Collect CRLs and OCSP responses for every chain link that advertises a
/// source. The root (or a dangling leaf) contributes CRLs only, since OCSP
/// needs the issuer certificate.
pub fn collect_revocation_material(chain: &[Vec<u8>]) -> Result<RevocationMaterial> {
    let mut material = RevocationMaterial::default();
    let mut seen_crl_urls = Vec::new();

    for (i, cert) in chain.iter().enumerate() {
        for url in crl_urls(cert)? {
            if seen_crl_urls.contains(&url) {
                continue;
            }
            log::debug!("fetching CRL from {}", url);
            material.crls.push(fetch_crl(&url)?);
            seen_crl_urls.push(url);
        }

        let Some(issuer) = chain.get(i + 1) else { continue };
        if let Some(url) = ocsp_url(cert)? {
            log::debug!("querying OCSP responder {}", url);
            let request = build_ocsp_request(cert, issuer)?;
            material.ocsp_responses.push(fetch_ocsp(&url, &request)?);
        }
    }
    Ok(material)
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::Decode;

    #[test]
    fn test_empty_material() {
        assert!(RevocationMaterial::default().is_empty());
        let material = RevocationMaterial {
            crls: vec![vec![1]],
            ocsp_responses: Vec::new(),
        };
        assert!(!material.is_empty());
    }

    #[test]
    fn test_malformed_certificate_is_an_error() {
        assert!(crl_urls(b"junk").is_err());
        assert!(ocsp_url(b"junk").is_err());
        assert!(build_ocsp_request(b"junk", b"junk").is_err());
    }

    #[test]
    fn test_ocsp_request_structure_round_trips() {
        let cert_id = CertId {
            hash_algorithm: AlgorithmIdentifierOwned {
                oid: OID_SHA1,
                parameters: Some(der::Any::null()),
            },
            issuer_name_hash: OctetString::new(vec![0u8; 20]).unwrap(),
            issuer_key_hash: OctetString::new(vec![1u8; 20]).unwrap(),
            serial_number: Int::new(&[0x05, 0x39]).unwrap(),
        };
        let request = OcspRequest {
            tbs_request: TbsRequest {
                request_list: vec![SingleRequest { req_cert: cert_id }],
            },
        };
        let der = request.to_der().unwrap();
        let decoded = OcspRequest::from_der(&der).unwrap();
        assert_eq!(decoded.tbs_request.request_list.len(), 1);
    }
}
