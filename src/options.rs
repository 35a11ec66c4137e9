//! Per-signature options.
//!
//! This is the configuration record callers assemble (usually from a JSON
//! file, deserialized with serde) before handing a document to the signer.
//! `validate` runs once up front; nothing touches the document or the network
//! until the options pass.

use crate::error::{Error, Result};
use crate::geometry::Rect;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    // Same shape the page resolver accepts: A/F/L or a comma list of
    // numbers/F/L tokens and ranges. Out-of-range values are caught later,
    // once the page count is known.
    static ref PAGE_SPEC_RE: Regex = Regex::new(
        r"^(?i)(a|f|l|[1-9]\d*)(?:-(a|f|l|[1-9]\d*))?(?:,(a|f|l|[1-9]\d*)(?:-(a|f|l|[1-9]\d*))?)*$"
    )
    .expect("page spec regex is valid");
}

const MAX_REASON_LEN: usize = 25;
const MAX_LOCATION_LEN: usize = 40;
const MAX_CUSTOM_TEXT_LEN: usize = 60;

/// Timestamping configuration for a signing run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimestampOptions {
    /// Whether to request an RFC 3161 timestamp for each signature.
    pub enabled: bool,
    /// TSA endpoint. When empty, one of the default pool is chosen at random.
    pub url: Option<String>,
    /// Optional HTTP basic-auth username for the TSA.
    pub username: Option<String>,
    /// Optional HTTP basic-auth password for the TSA.
    pub password: Option<String>,
}

/// Options controlling where and how signatures are applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SignatureOptions {
    /// Page specification: `A`, `F`, `L`, or a comma list like `1-3,5,L`.
    pub page: String,
    /// Signature box corners `[llx, lly, urx, ury]`; empty for an invisible
    /// signature.
    pub coord: Vec<i32>,
    /// Reason for signing, at most 25 characters.
    pub reason: String,
    /// Signing location, at most 40 characters.
    pub location: String,
    /// Free-form extra line in the appearance, at most 60 characters.
    pub custom_text: String,
    /// Reserve headroom in the panel for the viewer-drawn validity mark.
    pub green_tick: bool,
    /// Whether form-filling remains allowed after the final signature.
    pub changes_allowed: bool,
    /// Embed CRL/OCSP revocation material for long-term validation.
    pub enable_ltv: bool,
    /// Trusted timestamp configuration.
    pub timestamp: TimestampOptions,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self {
            page: "L".to_string(),
            coord: Vec::new(),
            reason: String::new(),
            location: String::new(),
            custom_text: String::new(),
            green_tick: false,
            changes_allowed: false,
            enable_ltv: false,
            timestamp: TimestampOptions::default(),
        }
    }
}

impl SignatureOptions {
    /// Deserialize options from JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| Error::InvalidOptions(e.to_string()))
    }

    /// Validate every invariant the signer relies on. Called once before any
    /// I/O side effect; an invalid record aborts the run.
    pub fn validate(&self) -> Result<()> {
        if self.page.trim().is_empty() {
            return Err(Error::InvalidOptions("page cannot be empty".to_string()));
        }
        if !PAGE_SPEC_RE.is_match(self.page.trim()) {
            return Err(Error::InvalidOptions(format!(
                "invalid page format '{}'. Examples: '1', 'F', 'L', 'A', '1-5', '1,3,5', 'F,L,2-4'",
                self.page
            )));
        }
        if !self.coord.is_empty() && self.coord.len() != 4 {
            return Err(Error::InvalidOptions(format!(
                "coord must have 0 or 4 elements, got {}",
                self.coord.len()
            )));
        }
        if self.reason.chars().count() > MAX_REASON_LEN {
            return Err(Error::InvalidOptions(format!(
                "reason cannot be longer than {} characters",
                MAX_REASON_LEN
            )));
        }
        if self.location.chars().count() > MAX_LOCATION_LEN {
            return Err(Error::InvalidOptions(format!(
                "location cannot be longer than {} characters",
                MAX_LOCATION_LEN
            )));
        }
        if self.custom_text.chars().count() > MAX_CUSTOM_TEXT_LEN {
            return Err(Error::InvalidOptions(format!(
                "customText cannot be longer than {} characters",
                MAX_CUSTOM_TEXT_LEN
            )));
        }
        Ok(())
    }

    /// The signature box, when a visible signature was requested.
    pub fn signature_rect(&self) -> Option<Rect> {
        if self.coord.len() == 4 {
            Some(Rect::from_coords([
                self.coord[0],
                self.coord[1],
                self.coord[2],
                self.coord[3],
            ]))
        } else {
            None
        }
    }

    /// Whether a visible appearance should be rendered.
    pub fn is_visible(&self) -> bool {
        self.coord.len() == 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let opts = SignatureOptions::default();
        assert!(opts.validate().is_ok());
        assert_eq!(opts.page, "L");
        assert!(!opts.is_visible());
    }

    #[test]
    fn test_page_formats() {
        for page in ["A", "f", "L", "1", "1-5", "1,3,5", "F,L,2-4", "F-L", "2-2"] {
            let opts = SignatureOptions {
                page: page.to_string(),
                ..Default::default()
            };
            assert!(opts.validate().is_ok(), "expected '{}' to validate", page);
        }
        for page in ["", "  ", "0", "1,", "-3", "1--2", "x", "1-5-7"] {
            let opts = SignatureOptions {
                page: page.to_string(),
                ..Default::default()
            };
            assert!(opts.validate().is_err(), "expected '{}' to be rejected", page);
        }
    }

    #[test]
    fn test_length_bounds() {
        let opts = SignatureOptions {
            reason: "x".repeat(26),
            ..Default::default()
        };
        assert!(opts.validate().is_err());

        let opts = SignatureOptions {
            location: "x".repeat(41),
            ..Default::default()
        };
        assert!(opts.validate().is_err());

        let opts = SignatureOptions {
            custom_text: "x".repeat(61),
            ..Default::default()
        };
        assert!(opts.validate().is_err());

        let opts = SignatureOptions {
            reason: "x".repeat(25),
            location: "y".repeat(40),
            custom_text: "z".repeat(60),
            ..Default::default()
        };
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_coord_arity() {
        let opts = SignatureOptions {
            coord: vec![10, 10, 200],
            ..Default::default()
        };
        assert!(opts.validate().is_err());

        let opts = SignatureOptions {
            coord: vec![10, 10, 200, 80],
            ..Default::default()
        };
        assert!(opts.validate().is_ok());
        assert!(opts.is_visible());
        assert_eq!(opts.signature_rect().unwrap().width(), 190.0);
    }

    #[test]
    fn test_json_round_trip() {
        let json = br#"{
            "page": "1-3,5",
            "coord": [36, 36, 236, 106],
            "reason": "Approval",
            "location": "Pune",
            "customText": "",
            "greenTick": true,
            "changesAllowed": false,
            "enableLtv": true,
            "timestamp": {"enabled": true, "url": "http://tsa.example"}
        }"#;
        let opts = SignatureOptions::from_json(json).unwrap();
        assert!(opts.validate().is_ok());
        assert_eq!(opts.page, "1-3,5");
        assert!(opts.green_tick);
        assert!(opts.enable_ltv);
        assert!(opts.timestamp.enabled);
        assert_eq!(opts.timestamp.url.as_deref(), Some("http://tsa.example"));
    }

    #[test]
    fn test_unknown_page_chars_rejected_before_parse() {
        let opts = SignatureOptions {
            page: "1;3".to_string(),
            ..Default::default()
        };
        assert!(matches!(opts.validate(), Err(Error::InvalidOptions(_))));
    }
}
