//! Platform certificate-store backend.
//!
//! Backed by the Windows personal ("My") store through schannel, with
//! signing done by the CNG provider that guards the key. Keys are never
//! exported. On other platforms construction fails cleanly so callers can
//! fall back to one of the portable backends.
//!
//! Serial lookup tolerates a leading zero: big-integer rendering of a serial
//! whose high bit is set prepends a zero byte that store UIs do not show.

use crate::error::{Error, Result};

#[cfg(windows)]
use super::validator;
#[cfg(windows)]
use super::{order_chain, CertificateCredential, PrivateKeyHandle};
#[cfg(not(windows))]
use super::CertificateCredential;

/// Handle to a non-exportable CNG private key.
#[cfg(windows)]
pub struct PlatformKey {
    key: schannel::ncrypt_key::NcryptKey,
}

/// The user's personal certificate store, opened read-only.
pub struct PlatformKeyStore {
    #[cfg(windows)]
    certs: Vec<schannel::cert_context::CertContext>,
}

#[cfg(windows)]
impl PlatformKeyStore {
    /// Open the current user's personal store.
    pub fn open() -> Result<Self> {
        let store = schannel::cert_store::CertStore::open_current_user("My").map_err(|e| {
            Error::KeyStoreInitializationFailed(format!("could not open personal store: {}", e))
        })?;
        Ok(Self {
            certs: store.certs().collect(),
        })
    }

    fn private_key_for(
        &self,
        cert: &schannel::cert_context::CertContext,
    ) -> Result<PlatformKey> {
        let key = cert
            .private_key()
            .silent(true)
            .compare_key(true)
            .acquire()
            .map_err(|e| Error::NotAPrivateKey(format!("no private key for certificate: {}", e)))?;
        match key {
            schannel::cert_context::PrivateKey::NcryptKey(key) => Ok(PlatformKey { key }),
            schannel::cert_context::PrivateKey::CryptProv(_) => Err(Error::NotAPrivateKey(
                "certificate key lives in a legacy CAPI provider".to_string(),
            )),
        }
    }

    fn credential_for(
        &self,
        cert: &schannel::cert_context::CertContext,
    ) -> Result<CertificateCredential> {
        let der = cert.to_der().to_vec();
        if validator::is_expired(&der)? {
            let serial = validator::serial_hex(&der)?;
            return Err(Error::CertificateExpired(format!("serial {}", serial)));
        }
        if !validator::is_digital_signature_capable(&der)? {
            let serial = validator::serial_hex(&der)?;
            return Err(Error::NotADigitalSignatureCertificate(format!("serial {}", serial)));
        }
        let key = self.private_key_for(cert)?;
        let pool: Vec<Vec<u8>> = self.certs.iter().map(|c| c.to_der().to_vec()).collect();
        Ok(CertificateCredential {
            chain: order_chain(der, &pool),
            key: PrivateKeyHandle::Platform(key),
        })
    }

    /// First store certificate with an accessible private key.
    pub fn default_credential(&self) -> Result<CertificateCredential> {
        for cert in &self.certs {
            if self.private_key_for(cert).is_ok() {
                return self.credential_for(cert);
            }
        }
        Err(Error::KeyStoreInitializationFailed(
            "personal store holds no certificate with a private key".to_string(),
        ))
    }

    /// Credential whose certificate serial matches `serial`, leading-zero
    /// normalized.
    pub fn credential_by_serial(&self, serial: &str) -> Result<CertificateCredential> {
        for cert in &self.certs {
            let der = cert.to_der().to_vec();
            let cert_serial = validator::serial_hex(&der)?;
            if validator::serials_match_normalized(&cert_serial, serial) {
                return self.credential_for(cert);
            }
        }
        Err(Error::CertificateNotFound(format!("serial {}", serial.trim())))
    }
}

#[cfg(not(windows))]
impl PlatformKeyStore {
    /// Always fails off-Windows; the store variant exists only there.
    pub fn open() -> Result<Self> {
        Err(Error::KeyStoreInitializationFailed(
            "the platform certificate store is only available on Windows".to_string(),
        ))
    }

    /// Unreachable off-Windows; `open` never returns a value.
    pub fn default_credential(&self) -> Result<CertificateCredential> {
        Err(Error::KeyStoreInitializationFailed(
            "the platform certificate store is only available on Windows".to_string(),
        ))
    }

    /// Unreachable off-Windows; `open` never returns a value.
    pub fn credential_by_serial(&self, _serial: &str) -> Result<CertificateCredential> {
        Err(Error::KeyStoreInitializationFailed(
            "the platform certificate store is only available on Windows".to_string(),
        ))
    }
}

/// Sign a precomputed SHA-256 digest through NCrypt with PKCS#1 v1.5
/// padding. A dismissed smart-card PIN prompt maps to `UserCancelled`.
#[cfg(windows)]
pub(crate) fn sign_digest(key: &PlatformKey, digest: &[u8]) -> Result<Vec<u8>> {
    use schannel::RawPointer;
    use windows_sys::Win32::Security::Cryptography::{
        NCryptSignHash, BCRYPT_PKCS1_PADDING_INFO, BCRYPT_SHA256_ALGORITHM, NCRYPT_PAD_PKCS1_FLAG,
    };

    const SCARD_W_CANCELLED_BY_USER: i32 = 0x8010006Eu32 as i32;

    let padding = BCRYPT_PKCS1_PADDING_INFO {
        pszAlgId: BCRYPT_SHA256_ALGORITHM,
    };

    unsafe {
        let handle = key.key.as_ptr() as usize;
        let mut needed: u32 = 0;
        let status = NCryptSignHash(
            handle,
            &padding as *const _ as *const std::ffi::c_void,
            digest.as_ptr(),
            digest.len() as u32,
            std::ptr::null_mut(),
            0,
            &mut needed,
            NCRYPT_PAD_PKCS1_FLAG,
        );
        if status != 0 {
            return Err(map_ncrypt_status(status, SCARD_W_CANCELLED_BY_USER));
        }

        let mut signature = vec![0u8; needed as usize];
        let mut written: u32 = 0;
        let status = NCryptSignHash(
            handle,
            &padding as *const _ as *const std::ffi::c_void,
            digest.as_ptr(),
            digest.len() as u32,
            signature.as_mut_ptr(),
            signature.len() as u32,
            &mut written,
            NCRYPT_PAD_PKCS1_FLAG,
        );
        if status != 0 {
            return Err(map_ncrypt_status(status, SCARD_W_CANCELLED_BY_USER));
        }
        signature.truncate(written as usize);
        Ok(signature)
    }
}

#[cfg(windows)]
fn map_ncrypt_status(status: i32, cancelled: i32) -> Error {
    if status == cancelled {
        Error::UserCancelled("smart-card PIN prompt was dismissed".to_string())
    } else {
        Error::SigningFailed(format!("NCryptSignHash failed with status 0x{:08x}", status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    #[test]
    fn test_open_fails_off_windows() {
        let result = PlatformKeyStore::open();
        assert!(matches!(result, Err(Error::KeyStoreInitializationFailed(msg)) if msg.contains("Windows")));
    }
}
