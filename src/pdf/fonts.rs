//! Standard-font metrics.
//!
//! Width tables for the built-in Helvetica face, taken from the Adobe AFM
//! files. Widths are expressed in 1/1000 of the font size, so the advance of
//! a string at size `s` is `sum(widths) / 1000 * s`.

/// AFM widths for Helvetica, ASCII 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722,
    667, 611, 722, 667, 944, 667, 667, 611, // 'A'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333,
    500, 278, 556, 500, 722, 500, 500, 500, // 'a'..'z'
    334, 260, 334, 584, // '{'..'~'
];

/// Width of non-ASCII and control characters; the average lowercase advance.
const FALLBACK_WIDTH: u16 = 556;

/// Glyph advance for one character in 1/1000 em units.
pub fn helvetica_char_width(c: char) -> u16 {
    let code = c as u32;
    if (32..=126).contains(&code) {
        HELVETICA_WIDTHS[(code - 32) as usize]
    } else {
        FALLBACK_WIDTH
    }
}

/// Advance of `text` rendered in Helvetica at `size` points.
pub fn helvetica_text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| helvetica_char_width(c) as u32).sum();
    units as f32 / 1000.0 * size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_widths() {
        assert_eq!(helvetica_char_width(' '), 278);
        assert_eq!(helvetica_char_width('W'), 944);
        assert_eq!(helvetica_char_width('i'), 222);
        assert_eq!(helvetica_char_width('@'), 1015);
    }

    #[test]
    fn test_text_width_scales_with_size() {
        let at_10 = helvetica_text_width("Hello", 10.0);
        let at_20 = helvetica_text_width("Hello", 20.0);
        assert!((at_20 - at_10 * 2.0).abs() < 0.001);
        assert!(at_10 > 0.0);
    }

    #[test]
    fn test_non_ascii_uses_fallback() {
        assert_eq!(helvetica_char_width('é'), FALLBACK_WIDTH);
    }
}
