//! Reserved-space estimation for the signature container.
//!
//! The byte range covered by the document hash has to be fixed before the
//! CMS container exists, so its size is reserved up front. The formula leans
//! generous: running out of room after the TSA and revocation round-trips
//! would waste those calls and abort the revision.

const BASE_SIZE: usize = 8000;
const PER_CERT: usize = 1500;
const TIMESTAMP_TOKEN: usize = 20000;
const LTV_MATERIAL: usize = 400000;
const CMS_OVERHEAD: usize = 2000;
const SAFETY_MARGIN: usize = 2000;

/// Bytes to reserve for the signature container.
pub fn estimate_size(cert_chain_len: usize, timestamp: bool, ltv: bool) -> usize {
    BASE_SIZE
        + cert_chain_len * PER_CERT
        + if timestamp { TIMESTAMP_TOKEN } else { 0 }
        + if ltv { LTV_MATERIAL } else { 0 }
        + CMS_OVERHEAD
        + SAFETY_MARGIN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_signature() {
        assert_eq!(estimate_size(0, false, false), 12000);
    }

    #[test]
    fn test_chain_and_timestamp() {
        assert_eq!(estimate_size(2, true, false), 35000);
    }

    #[test]
    fn test_ltv_dominates() {
        let with_ltv = estimate_size(3, true, true);
        let without = estimate_size(3, true, false);
        assert_eq!(with_ltv - without, 400000);
    }
}
