//! Reserved-size formula checked through the public API.

use pdf_signet::signing::estimate_size;

#[test]
fn test_grows_linearly_with_chain_length() {
    let step = estimate_size(1, false, false) - estimate_size(0, false, false);
    for len in 1..6 {
        assert_eq!(
            estimate_size(len, false, false) - estimate_size(len - 1, false, false),
            step
        );
    }
    assert_eq!(step, 1500);
}

#[test]
fn test_timestamp_and_ltv_are_independent_increments() {
    let base = estimate_size(2, false, false);
    let ts = estimate_size(2, true, false) - base;
    let ltv = estimate_size(2, false, true) - base;
    assert_eq!(ts, 20000);
    assert_eq!(ltv, 400000);
    assert_eq!(estimate_size(2, true, true), base + ts + ltv);
}

#[test]
fn test_minimum_reservation_covers_a_bare_container() {
    // Even with an empty chain there is room for the CMS scaffolding and a
    // 256-byte RSA signature many times over.
    assert!(estimate_size(0, false, false) >= 8000);
}
