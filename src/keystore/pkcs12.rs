//! Software-archive backend (PKCS#12/PFX).
//!
//! The archive is decrypted fully at load time; keys and certificates live
//! in memory for the rest of the run. Every load-time failure, including a
//! wrong password, reports as `KeyStoreInitializationFailed`.
//!
//! Lookup is laxer than the hardware backend on purpose: serial lookup does
//! not re-check expiry (trust in the archive's content is assumed), and the
//! key path carries no usage check of its own.

use super::validator;
use super::{order_chain, CertificateCredential, PrivateKeyHandle};
use crate::error::{Error, Result};
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

fn init_failed(detail: impl std::fmt::Display) -> Error {
    Error::KeyStoreInitializationFailed(detail.to_string())
}

/// A decrypted PFX archive.
pub struct Pkcs12KeyStore {
    keys: Vec<RsaPrivateKey>,
    certs: Vec<Vec<u8>>,
}

impl Pkcs12KeyStore {
    /// Read and decrypt an archive file.
    pub fn open(path: &std::path::Path, password: &str) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| init_failed(format!("could not read '{}': {}", path.display(), e)))?;
        Self::from_bytes(&data, password)
    }

    /// Decrypt an archive already in memory.
    pub fn from_bytes(data: &[u8], password: &str) -> Result<Self> {
        let pfx = p12::PFX::parse(data)
            .map_err(|e| init_failed(format!("not a PKCS#12 archive: {:?}", e)))?;
        if !pfx.verify_mac(password) {
            return Err(init_failed("archive MAC check failed (wrong password?)"));
        }
        let certs = pfx
            .cert_bags(password)
            .map_err(|e| init_failed(format!("certificate bags unreadable: {:?}", e)))?;
        let key_bags = pfx
            .key_bags(password)
            .map_err(|e| init_failed(format!("key bags unreadable: {:?}", e)))?;

        let mut keys = Vec::with_capacity(key_bags.len());
        for bag in &key_bags {
            let key = RsaPrivateKey::from_pkcs8_der(bag)
                .map_err(|e| init_failed(format!("private key unreadable: {}", e)))?;
            keys.push(key);
        }
        if keys.is_empty() || certs.is_empty() {
            return Err(init_failed("archive holds no private key with a certificate"));
        }
        Ok(Self { keys, certs })
    }

    /// Match a private key to the certificate carrying its public half, by
    /// RSA modulus.
    fn key_for_cert(&self, cert_der: &[u8]) -> Option<&RsaPrivateKey> {
        let (_, cert) = X509Certificate::from_der(cert_der).ok()?;
        let PublicKey::RSA(cert_key) = cert.public_key().parsed().ok()? else {
            return None;
        };
        let cert_modulus = strip_leading_zero(cert_key.modulus);
        self.keys.iter().find(|key| {
            let modulus = key.n().to_bytes_be();
            strip_leading_zero(&modulus) == cert_modulus
        })
    }

    fn credential_for(&self, leaf: Vec<u8>, key: RsaPrivateKey) -> CertificateCredential {
        CertificateCredential {
            chain: order_chain(leaf, &self.certs),
            key: PrivateKeyHandle::Software(key),
        }
    }

    /// First certificate in the archive with a matching private key.
    pub fn default_credential(&self) -> Result<CertificateCredential> {
        for cert in &self.certs {
            if let Some(key) = self.key_for_cert(cert) {
                return Ok(self.credential_for(cert.clone(), key.clone()));
            }
        }
        Err(init_failed("no certificate in the archive pairs with a private key"))
    }

    /// Credential whose certificate serial matches `serial`. Usage is
    /// checked; expiry is not.
    pub fn credential_by_serial(&self, serial: &str) -> Result<CertificateCredential> {
        for cert in &self.certs {
            let cert_serial = validator::serial_hex(cert)?;
            if !validator::serials_match(&cert_serial, serial) {
                continue;
            }
            if !validator::is_digital_signature_capable(cert)? {
                return Err(Error::NotADigitalSignatureCertificate(format!(
                    "serial {}",
                    cert_serial
                )));
            }
            let key = self.key_for_cert(cert).ok_or_else(|| {
                Error::NotAPrivateKey(format!("no private key pairs with serial {}", cert_serial))
            })?;
            return Ok(self.credential_for(cert.clone(), key.clone()));
        }
        Err(Error::CertificateNotFound(format!("serial {}", serial.trim())))
    }
}

fn strip_leading_zero(bytes: &[u8]) -> &[u8] {
    let mut slice = bytes;
    while slice.first() == Some(&0) {
        slice = &slice[1..];
    }
    slice
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_fail_initialization() {
        let result = Pkcs12KeyStore::from_bytes(b"definitely not a pfx", "pw");
        assert!(matches!(result, Err(Error::KeyStoreInitializationFailed(_))));
    }

    #[test]
    fn test_missing_file_fails_initialization() {
        let result = Pkcs12KeyStore::open(std::path::Path::new("/no/such/file.pfx"), "pw");
        assert!(matches!(result, Err(Error::KeyStoreInitializationFailed(_))));
    }

    #[test]
    fn test_strip_leading_zero() {
        assert_eq!(strip_leading_zero(&[0, 0, 1, 2]), &[1, 2]);
        assert_eq!(strip_leading_zero(&[1, 0]), &[1, 0]);
        assert!(strip_leading_zero(&[0]).is_empty());
    }
}
