//! Hardware-token backend (PKCS#11).
//!
//! Loads the vendor middleware library, picks a slot (by token serial when
//! one is given, slot 0 otherwise), logs in with the PIN, and serves
//! credentials whose private keys never leave the device. Signing runs on the
//! token through `CKM_SHA256_RSA_PKCS`.

use super::validator;
use super::{order_chain, CertificateCredential, PrivateKeyHandle};
use crate::error::{Error, Result};
use cryptoki::context::{CInitializeArgs, Pkcs11};
use cryptoki::error::{Error as CkError, RvError};
use cryptoki::object::{Attribute, AttributeType, CertificateType, ObjectClass, ObjectHandle};
use cryptoki::session::{Session, UserType};
use cryptoki::types::AuthPin;
use std::sync::Arc;

/// Translate a PKCS#11 return value into the engine's error taxonomy.
///
/// PIN faults and user-dismissed PIN prompts get their own kinds so callers
/// can branch without reading message text.
pub(crate) fn map_pkcs11_error(err: CkError) -> Error {
    let msg = err.to_string();
    match err {
        CkError::Pkcs11(RvError::PinIncorrect, ..)
        | CkError::Pkcs11(RvError::PinInvalid, ..)
        | CkError::Pkcs11(RvError::PinLocked, ..) => Error::InvalidPin(msg),
        CkError::Pkcs11(RvError::FunctionCanceled, ..) => Error::UserCancelled(msg),
        _ => Error::SigningFailed(msg),
    }
}

fn init_error(err: CkError) -> Error {
    match map_pkcs11_error(err) {
        Error::SigningFailed(msg) => Error::KeyStoreInitializationFailed(msg),
        other => other,
    }
}

/// Token serials are space-padded fixed-width fields; compare trimmed and
/// case-insensitive.
fn token_serial_matches(reported: &str, requested: &str) -> bool {
    reported.trim().eq_ignore_ascii_case(requested.trim())
}

/// An unlocked session on one hardware token.
pub struct Pkcs11KeyStore {
    session: Arc<Session>,
}

impl Pkcs11KeyStore {
    /// Load the middleware at `module_path`, select a slot, and log in.
    pub fn open(module_path: &str, pin: &str, token_serial: Option<&str>) -> Result<Self> {
        let ctx = Pkcs11::new(module_path).map_err(|e| {
            Error::KeyStoreInitializationFailed(format!(
                "could not load PKCS#11 module '{}': {}",
                module_path, e
            ))
        })?;
        // A second initialization in the same process is fine.
        match ctx.initialize(CInitializeArgs::OsThreads) {
            Ok(()) => {}
            Err(CkError::Pkcs11(RvError::CryptokiAlreadyInitialized, ..)) => {}
            Err(e) => return Err(init_error(e)),
        }

        let slots = ctx.get_slots_with_token().map_err(init_error)?;
        let slot = match token_serial {
            Some(requested) => {
                let mut selected = None;
                for slot in &slots {
                    let info = ctx.get_token_info(*slot).map_err(init_error)?;
                    if token_serial_matches(info.serial_number(), requested) {
                        selected = Some(*slot);
                        break;
                    }
                }
                selected.ok_or_else(|| {
                    Error::TokenNotFound(format!("no token with serial '{}'", requested.trim()))
                })?
            }
            None => *slots.first().ok_or_else(|| {
                Error::KeyStoreInitializationFailed("no PKCS#11 slots with a token".to_string())
            })?,
        };

        let session = ctx.open_rw_session(slot).map_err(init_error)?;
        session
            .login(UserType::User, Some(&AuthPin::new(pin.to_string())))
            .map_err(|e| match e {
                CkError::Pkcs11(RvError::UserAlreadyLoggedIn, ..) => {
                    Error::KeyStoreInitializationFailed(e.to_string())
                }
                other => match map_pkcs11_error(other) {
                    Error::SigningFailed(msg) => Error::KeyStoreInitializationFailed(msg),
                    mapped => mapped,
                },
            })?;

        Ok(Self {
            session: Arc::new(session),
        })
    }

    /// All X.509 certificate objects on the token: handle, DER value, CKA_ID.
    fn certificates(&self) -> Result<Vec<(ObjectHandle, Vec<u8>, Option<Vec<u8>>)>> {
        let handles = self
            .session
            .find_objects(&[
                Attribute::Class(ObjectClass::CERTIFICATE),
                Attribute::CertificateType(CertificateType::X_509),
            ])
            .map_err(map_pkcs11_error)?;

        let mut certs = Vec::with_capacity(handles.len());
        for handle in handles {
            let attrs = self
                .session
                .get_attributes(handle, &[AttributeType::Value, AttributeType::Id])
                .map_err(map_pkcs11_error)?;
            let mut value = None;
            let mut id = None;
            for attr in attrs {
                match attr {
                    Attribute::Value(v) => value = Some(v),
                    Attribute::Id(v) => id = Some(v),
                    _ => {}
                }
            }
            if let Some(der) = value {
                certs.push((handle, der, id));
            }
        }
        Ok(certs)
    }

    /// Find the private-key object paired with a certificate's CKA_ID.
    fn private_key_for(&self, id: Option<&[u8]>) -> Result<ObjectHandle> {
        let mut template = vec![Attribute::Class(ObjectClass::PRIVATE_KEY)];
        if let Some(id) = id {
            template.push(Attribute::Id(id.to_vec()));
        }
        let handles = self
            .session
            .find_objects(&template)
            .map_err(map_pkcs11_error)?;
        if let Some(handle) = handles.first() {
            return Ok(*handle);
        }
        // No ID-paired key; fall back to any private key on the token.
        if id.is_some() {
            let handles = self
                .session
                .find_objects(&[Attribute::Class(ObjectClass::PRIVATE_KEY)])
                .map_err(map_pkcs11_error)?;
            if let Some(handle) = handles.first() {
                return Ok(*handle);
            }
        }
        Err(Error::NotAPrivateKey(
            "token holds no private-key object for the selected certificate".to_string(),
        ))
    }

    fn credential_for(
        &self,
        leaf: Vec<u8>,
        id: Option<Vec<u8>>,
        pool: &[Vec<u8>],
    ) -> Result<CertificateCredential> {
        if validator::is_expired(&leaf)? {
            let serial = validator::serial_hex(&leaf)?;
            return Err(Error::CertificateExpired(format!("serial {}", serial)));
        }
        if !validator::is_digital_signature_capable(&leaf)? {
            let serial = validator::serial_hex(&leaf)?;
            return Err(Error::NotADigitalSignatureCertificate(format!("serial {}", serial)));
        }
        let key = self.private_key_for(id.as_deref())?;
        Ok(CertificateCredential {
            chain: order_chain(leaf, pool),
            key: PrivateKeyHandle::Token {
                session: Arc::clone(&self.session),
                key,
            },
        })
    }

    /// First certificate on the token that has a usable private key.
    pub fn default_credential(&self) -> Result<CertificateCredential> {
        let certs = self.certificates()?;
        let pool: Vec<Vec<u8>> = certs.iter().map(|(_, der, _)| der.clone()).collect();
        for (_, der, id) in &certs {
            if self.private_key_for(id.as_deref()).is_ok() {
                return self.credential_for(der.clone(), id.clone(), &pool);
            }
        }
        Err(Error::KeyStoreInitializationFailed(
            "token holds no certificate with a private key".to_string(),
        ))
    }

    /// Credential whose certificate serial matches `serial`.
    pub fn credential_by_serial(&self, serial: &str) -> Result<CertificateCredential> {
        let certs = self.certificates()?;
        let pool: Vec<Vec<u8>> = certs.iter().map(|(_, der, _)| der.clone()).collect();
        for (_, der, id) in &certs {
            let cert_serial = validator::serial_hex(der)?;
            if validator::serials_match(&cert_serial, serial) {
                return self.credential_for(der.clone(), id.clone(), &pool);
            }
        }
        Err(Error::CertificateNotFound(format!("serial {}", serial.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_serial_padding_tolerated() {
        assert!(token_serial_matches("ABC123        ", "abc123"));
        assert!(token_serial_matches(" 0099 ", "0099"));
        assert!(!token_serial_matches("ABC124", "abc123"));
    }
}
