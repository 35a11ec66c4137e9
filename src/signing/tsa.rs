//! RFC 3161 timestamp-authority client.
//!
//! Synchronous HTTP against a configured endpoint or one of a small default
//! pool. The endpoint is probed with a HEAD request (5-second connect/read
//! timeouts, 2xx-3xx counts as reachable) before the real query so an
//! unreachable authority fails fast instead of mid-pipeline.

use crate::error::{Error, Result};
use base64::Engine;
use der::asn1::{Int, ObjectIdentifier, OctetString};
use der::{Any, Decode, Encode, Sequence};
use spki::AlgorithmIdentifierOwned;
use std::io::Read;
use std::time::Duration;

const OID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");

/// Authorities tried when the caller does not configure one.
pub const DEFAULT_TSA_URLS: [&str; 4] = [
    "http://timestamp.digicert.com",
    "http://timestamp.comodoca.com",
    "http://timestamp.entrust.net/TSS/RFC3161sha2TS",
    "http://timestamp.digicert.com",
];

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Responses can be large when the token carries a full chain.
const MAX_RESPONSE_BYTES: u64 = 1 << 20;

/// Pick a pool entry at random.
pub fn random_default_url() -> &'static str {
    let roll = uuid::Uuid::new_v4().as_bytes()[0] as usize;
    DEFAULT_TSA_URLS[roll % DEFAULT_TSA_URLS.len()]
}

fn unreachable(url: &str, detail: impl std::fmt::Display) -> Error {
    Error::TimestampAuthorityUnreachable(format!("{}: {}", url, detail))
}

/// HEAD-probe an authority URL.
pub fn probe(url: &str) -> Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(unreachable(url, "TSA URL must use HTTP or HTTPS"));
    }
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(PROBE_TIMEOUT)
        .timeout_read(PROBE_TIMEOUT)
        .build();
    match agent.head(url).call() {
        // ureq resolves redirects itself, so a response here is 2xx-3xx.
        Ok(_) => Ok(()),
        Err(e) => Err(unreachable(url, e)),
    }
}

// RFC 3161 request/response structures, trimmed to the fields used.

#[derive(Clone, Debug, Sequence)]
struct MessageImprint {
    hash_algorithm: AlgorithmIdentifierOwned,
    hashed_message: OctetString,
}

fn cert_req_default() -> bool {
    false
}

#[derive(Clone, Debug, Sequence)]
struct TimeStampReq {
    version: u8,
    message_imprint: MessageImprint,
    #[asn1(optional = "true")]
    nonce: Option<Int>,
    #[asn1(default = "cert_req_default")]
    cert_req: bool,
}

#[derive(Clone, Debug, Sequence)]
struct PkiStatusInfo {
    status: u32,
    #[asn1(optional = "true")]
    status_string: Option<Any>,
    #[asn1(optional = "true")]
    fail_info: Option<Any>,
}

#[derive(Clone, Debug, Sequence)]
struct TimeStampResp {
    status: PkiStatusInfo,
    #[asn1(optional = "true")]
    time_stamp_token: Option<Any>,
}

/// Client bound to one authority endpoint.
pub struct TsaClient {
    url: String,
    username: Option<String>,
    password: Option<String>,
}

impl TsaClient {
    /// Bind to `url`, probing reachability first.
    pub fn connect(
        url: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self> {
        probe(url)?;
        Ok(Self {
            url: url.to_string(),
            username: username.map(str::to_string),
            password: password.map(str::to_string),
        })
    }

    /// The bound endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_request(digest: &[u8]) -> Result<Vec<u8>> {
        // Random positive nonce.
        let mut nonce_bytes = *uuid::Uuid::new_v4().as_bytes();
        nonce_bytes[0] &= 0x7f;
        let request = TimeStampReq {
            version: 1,
            message_imprint: MessageImprint {
                hash_algorithm: AlgorithmIdentifierOwned {
                    oid: OID_SHA256,
                    parameters: None,
                },
                hashed_message: OctetString::new(digest)
                    .map_err(|e| Error::SigningFailed(format!("timestamp request: {}", e)))?,
            },
            nonce: Some(
                Int::new(&nonce_bytes)
                    .map_err(|e| Error::SigningFailed(format!("timestamp nonce: {}", e)))?,
            ),
            cert_req: true,
        };
        request
            .to_der()
            .map_err(|e| Error::SigningFailed(format!("timestamp request: {}", e)))
    }

    /// Request a token over a SHA-256 digest. Returns the TimeStampToken DER.
    pub fn timestamp(&self, digest: &[u8]) -> Result<Vec<u8>> {
        let body = Self::build_request(digest)?;
        let mut request = ureq::post(&self.url)
            .set("Content-Type", "application/timestamp-query");
        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            let token = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", user, pass));
            request = request.set("Authorization", &format!("Basic {}", token));
        }
        let response = request
            .send_bytes(&body)
            .map_err(|e| unreachable(&self.url, e))?;

        let mut raw = Vec::new();
        response
            .into_reader()
            .take(MAX_RESPONSE_BYTES)
            .read_to_end(&mut raw)
            .map_err(|e| unreachable(&self.url, e))?;
        Self::extract_token(&self.url, &raw)
    }

    fn extract_token(url: &str, raw: &[u8]) -> Result<Vec<u8>> {
        let response = TimeStampResp::from_der(raw)
            .map_err(|e| unreachable(url, format!("malformed response: {}", e)))?;
        // 0 = granted, 1 = grantedWithMods.
        if response.status.status > 1 {
            return Err(unreachable(
                url,
                format!("request rejected with status {}", response.status.status),
            ));
        }
        let token = response.time_stamp_token.ok_or_else(|| {
            unreachable(url, "authority granted the request but returned no token")
        })?;
        token
            .to_der()
            .map_err(|e| unreachable(url, format!("token re-encode failed: {}", e)))
    }
}
