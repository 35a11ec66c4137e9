//! Key-material backends.
//!
//! Three mutually exclusive sources of a signing credential: a PKCS#11
//! hardware token, a PKCS#12/PFX archive, and the operating system's
//! certificate store. Each backend is constructed per signing run, unlocked
//! once, then queried for a credential by serial or by default policy.

pub mod pkcs11;
pub mod pkcs12;
pub mod platform;
pub mod validator;

use crate::error::{Error, Result};
use sha2::Sha256;
use signature::{SignatureEncoding, Signer};

pub use pkcs11::Pkcs11KeyStore;
pub use pkcs12::Pkcs12KeyStore;
pub use platform::PlatformKeyStore;

/// A located certificate chain plus the private key that can sign for it.
///
/// Owned by the signing run that requested it; never persisted.
pub struct CertificateCredential {
    /// DER certificates, leaf first.
    pub chain: Vec<Vec<u8>>,
    /// Opaque signing handle.
    pub key: PrivateKeyHandle,
}

impl CertificateCredential {
    /// The signing certificate.
    pub fn leaf(&self) -> &[u8] {
        &self.chain[0]
    }

    /// Produce a PKCS#1 v1.5 RSA signature with SHA-256 over `data`.
    pub fn sign_sha256(&self, data: &[u8]) -> Result<Vec<u8>> {
        match &self.key {
            PrivateKeyHandle::Software(key) => {
                let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone());
                let signature = signing_key
                    .try_sign(data)
                    .map_err(|e| Error::SigningFailed(format!("RSA signing failed: {}", e)))?;
                Ok(signature.to_vec())
            }
            PrivateKeyHandle::Token { session, key } => {
                // The token hashes internally.
                session
                    .sign(&cryptoki::mechanism::Mechanism::Sha256RsaPkcs, *key, data)
                    .map_err(pkcs11::map_pkcs11_error)
            }
            #[cfg(windows)]
            PrivateKeyHandle::Platform(key) => {
                use sha2::Digest;
                let digest = Sha256::digest(data);
                platform::sign_digest(key, &digest)
            }
        }
    }
}

/// Private-key handle variants, one per backend family.
pub enum PrivateKeyHandle {
    /// In-memory RSA key extracted from a PKCS#12 archive.
    Software(rsa::RsaPrivateKey),
    /// Key object on a hardware token; signing happens on the device.
    Token {
        /// Logged-in PKCS#11 session
        session: std::sync::Arc<cryptoki::session::Session>,
        /// Handle of the private-key object
        key: cryptoki::object::ObjectHandle,
    },
    /// Non-exportable key reached through the platform CNG provider.
    #[cfg(windows)]
    Platform(platform::PlatformKey),
}

/// The selected key-material backend for one signing run.
pub enum KeyMaterialProvider {
    /// PKCS#11 hardware token
    HardwareToken(Pkcs11KeyStore),
    /// PKCS#12/PFX archive file
    SoftwareArchive(Pkcs12KeyStore),
    /// Operating-system certificate store
    PlatformStore(PlatformKeyStore),
}

impl KeyMaterialProvider {
    /// Locate the backend's default credential.
    pub fn default_credential(&self) -> Result<CertificateCredential> {
        match self {
            KeyMaterialProvider::HardwareToken(store) => store.default_credential(),
            KeyMaterialProvider::SoftwareArchive(store) => store.default_credential(),
            KeyMaterialProvider::PlatformStore(store) => store.default_credential(),
        }
    }

    /// Locate a credential whose certificate serial matches `serial` (hex,
    /// case-insensitive).
    pub fn credential_by_serial(&self, serial: &str) -> Result<CertificateCredential> {
        match self {
            KeyMaterialProvider::HardwareToken(store) => store.credential_by_serial(serial),
            KeyMaterialProvider::SoftwareArchive(store) => store.credential_by_serial(serial),
            KeyMaterialProvider::PlatformStore(store) => store.credential_by_serial(serial),
        }
    }
}

/// Order `pool` into an issuer chain starting from `leaf`.
///
/// Follows subject/issuer links until a self-signed certificate or a missing
/// issuer ends the walk. Certificates that are not part of the path are
/// dropped.
pub(crate) fn order_chain(leaf: Vec<u8>, pool: &[Vec<u8>]) -> Vec<Vec<u8>> {
    use x509_parser::prelude::*;

    let mut chain = vec![leaf];
    let mut used = vec![false; pool.len()];
    loop {
        if chain.len() > 16 {
            break;
        }
        let Ok((_, current)) = X509Certificate::from_der(chain.last().map(Vec::as_slice).unwrap_or(&[]))
        else {
            break;
        };
        if current.subject() == current.issuer() {
            break;
        }
        let issuer_raw = current.issuer().as_raw().to_vec();
        let mut found = None;
        for (i, candidate) in pool.iter().enumerate() {
            if used[i] {
                continue;
            }
            if let Ok((_, cert)) = X509Certificate::from_der(candidate) {
                if cert.subject().as_raw() == issuer_raw.as_slice()
                    && candidate.as_slice() != chain.last().map(Vec::as_slice).unwrap_or(&[])
                {
                    found = Some(i);
                    break;
                }
            }
        }
        match found {
            Some(i) => {
                used[i] = true;
                chain.push(pool[i].clone());
            }
            None => break,
        }
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_chain_without_pool() {
        let chain = order_chain(b"leaf-bytes".to_vec(), &[]);
        assert_eq!(chain.len(), 1);
    }
}
