//! Visible-signature appearance.
//!
//! Builds the text block shown in the signature widget and fits a font size
//! to the box. Nothing here can fail: measurement problems degrade to the
//! fallback sizes and the panel always renders.

use crate::geometry::Rect;
use crate::keystore::validator::subject_common_name;
use crate::pdf::fonts::helvetica_text_width;
use crate::pdf::object::{dict, Object, ObjectRef};
use chrono::{DateTime, FixedOffset};

/// Panel background, a near-white gray.
const BACKGROUND: f32 = 252.0 / 255.0;
/// Horizontal and bottom inset of the text region.
const PADDING: f32 = 1.0;
/// Extra top inset so text clears the viewer-drawn validity mark.
const PADDING_TOP: f32 = 20.0;
const MAX_FONT_SIZE: f32 = 16.0;
const MIN_FONT_SIZE: f32 = 4.0;
const FONT_STEP: f32 = 0.5;
/// Size used when there is nothing to lay out.
const EMPTY_FONT_SIZE: f32 = 8.0;
const LINE_SPACING: f32 = 1.2;

/// Composed text block plus its fitted font size.
#[derive(Debug, Clone, PartialEq)]
pub struct AppearancePanel {
    /// Lines top to bottom.
    pub lines: Vec<String>,
    /// Fitted font size in points.
    pub font_size: f32,
}

fn has_text(s: &str) -> bool {
    !s.trim().is_empty()
}

/// Build the line list for a signature panel.
///
/// The "Signed By" line is dropped on a locking signature that already
/// carries more than one of reason/location/custom text, to keep the panel
/// from crowding.
pub fn compose_lines(
    common_name: &str,
    reason: &str,
    location: &str,
    custom_text: &str,
    changes_allowed: bool,
    signed_at: DateTime<FixedOffset>,
) -> Vec<String> {
    let mut lines = Vec::new();
    let non_empty = [reason, location, custom_text]
        .iter()
        .filter(|s| has_text(s))
        .count();
    if changes_allowed || non_empty <= 1 {
        lines.push(format!("Signed By: {}", common_name));
    }
    if has_text(reason) {
        lines.push(format!("Reason: {}", reason));
    }
    if has_text(location) {
        lines.push(format!("Location: {}", location));
    }
    if has_text(custom_text) {
        lines.push(custom_text.to_string());
    }
    lines.push(format!(
        "Date: {}",
        signed_at.format("%b %-d, %Y %-I:%M %p (%:z)")
    ));
    lines
}

/// Largest size in [4, 16] (0.5 steps) where every line fits the width and
/// the stacked block fits the height; 4pt when nothing fits.
pub fn fit_font_size(lines: &[String], width: f32, height: f32) -> f32 {
    if lines.is_empty() {
        return EMPTY_FONT_SIZE;
    }
    let mut size = MAX_FONT_SIZE;
    while size >= MIN_FONT_SIZE {
        let fits_width = lines.iter().all(|line| helvetica_text_width(line, size) <= width);
        let fits_height = lines.len() as f32 * size * LINE_SPACING <= height;
        if fits_width && fits_height {
            return size;
        }
        size -= FONT_STEP;
    }
    MIN_FONT_SIZE
}

/// Compose the full panel for a signing certificate and options.
pub fn compose_panel(
    cert_der: &[u8],
    reason: &str,
    location: &str,
    custom_text: &str,
    changes_allowed: bool,
    rect: Rect,
    signed_at: DateTime<FixedOffset>,
) -> AppearancePanel {
    let common_name = subject_common_name(cert_der);
    let lines = compose_lines(
        &common_name,
        reason,
        location,
        custom_text,
        changes_allowed,
        signed_at,
    );
    let text_width = (rect.width() - 2.0 * PADDING).max(0.0);
    let text_height = (rect.height() - PADDING - PADDING_TOP).max(0.0);
    let font_size = fit_font_size(&lines, text_width, text_height);
    AppearancePanel { lines, font_size }
}

/// Render the panel as the widget's /AP /N form XObject.
///
/// Lines are anchored bottom-up: the block sits on the bottom inset and
/// grows toward the reserved headroom.
pub fn build_form_xobject(panel: &AppearancePanel, rect: Rect, font_ref: ObjectRef) -> Object {
    let width = rect.width();
    let height = rect.height();
    let leading = panel.font_size * LINE_SPACING;

    let mut ops = Vec::new();
    ops.extend_from_slice(
        format!(
            "q\n{b:.3} {b:.3} {b:.3} rg\n0 0 {w:.2} {h:.2} re\nf\nQ\n",
            b = BACKGROUND,
            w = width,
            h = height
        )
        .as_bytes(),
    );
    ops.extend_from_slice(b"BT\n0 0 0 rg\n");
    ops.extend_from_slice(format!("/Helv {} Tf\n", panel.font_size).as_bytes());
    let count = panel.lines.len();
    for (i, line) in panel.lines.iter().enumerate() {
        let y = PADDING + (count - 1 - i) as f32 * leading;
        ops.extend_from_slice(format!("1 0 0 1 {:.2} {:.2} Tm\n", PADDING, y).as_bytes());
        Object::String(line.as_bytes().to_vec()).write_to(&mut ops);
        ops.extend_from_slice(b" Tj\n");
    }
    ops.extend_from_slice(b"ET\n");

    let resources = dict(vec![(
        "Font",
        Object::Dictionary(dict(vec![("Helv", Object::Reference(font_ref))])),
    )]);
    Object::Stream {
        dict: dict(vec![
            ("Type", Object::Name("XObject".to_string())),
            ("Subtype", Object::Name("Form".to_string())),
            (
                "BBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(width as f64),
                    Object::Real(height as f64),
                ]),
            ),
            ("Resources", Object::Dictionary(resources)),
            ("Length", Object::Integer(ops.len() as i64)),
        ]),
        data: ops,
    }
}

/// An empty background layer (`n0`) for the legacy layered appearance.
pub fn build_blank_layer(rect: Rect) -> Object {
    let data = b"% DSBlank\n".to_vec();
    Object::Stream {
        dict: dict(vec![
            ("Type", Object::Name("XObject".to_string())),
            ("Subtype", Object::Name("Form".to_string())),
            (
                "BBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(rect.width() as f64),
                    Object::Real(rect.height() as f64),
                ]),
            ),
            ("Length", Object::Integer(data.len() as i64)),
        ]),
        data,
    }
}

/// A frame form that stacks the `n0` and `n2` layers, the structure viewers
/// recognize when they overlay their own validity mark.
pub fn build_layer_frame(rect: Rect, n0: ObjectRef, n2: ObjectRef) -> Object {
    let data = b"q 1 0 0 1 0 0 cm /n0 Do Q\nq 1 0 0 1 0 0 cm /n2 Do Q\n".to_vec();
    let xobjects = dict(vec![
        ("n0", Object::Reference(n0)),
        ("n2", Object::Reference(n2)),
    ]);
    Object::Stream {
        dict: dict(vec![
            ("Type", Object::Name("XObject".to_string())),
            ("Subtype", Object::Name("Form".to_string())),
            (
                "BBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(rect.width() as f64),
                    Object::Real(rect.height() as f64),
                ]),
            ),
            (
                "Resources",
                Object::Dictionary(dict(vec![("XObject", Object::Dictionary(xobjects))])),
            ),
            ("Length", Object::Integer(data.len() as i64)),
        ]),
        data,
    }
}

/// The standard Helvetica font object referenced by appearance streams.
pub fn helvetica_font_object() -> Object {
    Object::Dictionary(dict(vec![
        ("Type", Object::Name("Font".to_string())),
        ("Subtype", Object::Name("Type1".to_string())),
        ("BaseFont", Object::Name("Helvetica".to_string())),
        ("Encoding", Object::Name("WinAnsiEncoding".to_string())),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_noon() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(5 * 3600 + 1800)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 7, 12, 5, 0)
            .unwrap()
    }

    #[test]
    fn test_date_line_format() {
        let lines = compose_lines("Asha Rao", "", "", "", true, at_noon());
        assert_eq!(lines[0], "Signed By: Asha Rao");
        assert_eq!(lines[1], "Date: Mar 7, 2024 12:05 PM (+05:30)");
    }

    #[test]
    fn test_signed_by_dropped_when_locked_and_crowded() {
        let lines = compose_lines("X", "Approval", "Pune", "", false, at_noon());
        assert!(lines.iter().all(|l| !l.starts_with("Signed By")));
        assert_eq!(lines[0], "Reason: Approval");
        assert_eq!(lines[1], "Location: Pune");

        // One populated field keeps the name.
        let lines = compose_lines("X", "Approval", "", "", false, at_noon());
        assert_eq!(lines[0], "Signed By: X");
    }

    #[test]
    fn test_signed_by_kept_when_changes_allowed() {
        let lines = compose_lines("X", "Approval", "Pune", "note", true, at_noon());
        assert_eq!(lines[0], "Signed By: X");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_custom_text_has_no_prefix() {
        let lines = compose_lines("X", "", "", "Verified copy", true, at_noon());
        assert!(lines.contains(&"Verified copy".to_string()));
    }

    #[test]
    fn test_font_fitting_bounds() {
        assert_eq!(fit_font_size(&[], 100.0, 100.0), 8.0);

        // A huge box takes the maximum.
        let lines = vec!["short".to_string()];
        assert_eq!(fit_font_size(&lines, 1000.0, 1000.0), 16.0);

        // A tiny box bottoms out at 4pt.
        let lines = vec!["an extremely long line that cannot possibly fit".to_string()];
        assert_eq!(fit_font_size(&lines, 10.0, 5.0), 4.0);
    }

    #[test]
    fn test_font_fitting_monotonic_in_box_size() {
        let lines: Vec<String> = vec!["Signed By: Someone".into(), "Date: now".into()];
        let small = fit_font_size(&lines, 80.0, 30.0);
        let large = fit_font_size(&lines, 400.0, 120.0);
        assert!(large >= small);
    }

    #[test]
    fn test_panel_never_fails_on_garbage_cert() {
        let rect = Rect::new(0.0, 0.0, 200.0, 70.0);
        let panel = compose_panel(b"garbage", "", "", "", true, rect, at_noon());
        assert_eq!(panel.lines[0], "Signed By: Unknown Signer");
        assert!(panel.font_size >= 4.0);
    }

    #[test]
    fn test_layer_frame_invokes_both_layers() {
        let rect = Rect::new(0.0, 0.0, 200.0, 70.0);
        let frame = build_layer_frame(rect, ObjectRef::new(7, 0), ObjectRef::new(8, 0));
        let Object::Stream { dict, data } = frame else { panic!("expected stream") };
        let resources = dict.get("Resources").and_then(Object::as_dict).unwrap();
        assert!(resources.get("XObject").is_some());
        let text = String::from_utf8(data).unwrap();
        assert!(text.contains("/n0 Do"));
        assert!(text.contains("/n2 Do"));
    }

    #[test]
    fn test_form_xobject_paints_background_and_text() {
        let rect = Rect::new(0.0, 0.0, 200.0, 70.0);
        let panel = compose_panel(b"garbage", "QA", "", "", true, rect, at_noon());
        let font_ref = ObjectRef::new(9, 0);
        let form = build_form_xobject(&panel, rect, font_ref);
        let Object::Stream { dict, data } = form else { panic!("expected stream") };
        assert_eq!(dict.get("Subtype").and_then(Object::as_name), Some("Form"));
        let text = String::from_utf8(data).unwrap();
        assert!(text.contains("0.988 0.988 0.988 rg"));
        assert!(text.contains("(Reason: QA) Tj"));
    }
}
