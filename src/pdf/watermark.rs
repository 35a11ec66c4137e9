//! Text watermark stamping.
//!
//! Stamps a short line of text over selected pages as an incremental update:
//! each touched page gets an extra content stream appended to its /Contents
//! and a Helvetica entry merged into its font resources. Existing bytes are
//! never rewritten, so prior signatures stay valid for their byte ranges.

use super::document::Document;
use super::fonts::helvetica_text_width;
use super::incremental::IncrementalUpdate;
use super::object::{dict, Dict, Object, ObjectRef};
use crate::error::{Error, Result};
use crate::geometry::Rect;

const FONT_SIZE: f32 = 8.0;
/// Resource name for the stamped font, chosen to avoid collisions.
const FONT_RES_NAME: &str = "SgWm0";
/// Slate gray.
const COLOR_RGB: (f32, f32, f32) = (112.0 / 255.0, 128.0 / 255.0, 144.0 / 255.0);
const PAGE_MARGIN: f32 = 20.0;

/// Stamp `text` over the given zero-based pages and return the new file.
///
/// When `anchor` is given the text is centered horizontally over that box and
/// sits 3 points above its top edge; otherwise it lands in the lower-right
/// corner of each page.
pub fn apply_watermark(
    doc: &Document,
    text: &str,
    anchor: Option<Rect>,
    pages: &[usize],
) -> Result<Vec<u8>> {
    if text.is_empty() {
        return Err(Error::InvalidOptions("watermark text cannot be empty".to_string()));
    }
    for &index in pages {
        if index >= doc.page_count() {
            return Err(Error::InvalidPageSpecification(format!(
                "page {} out of range ({} pages)",
                index + 1,
                doc.page_count()
            )));
        }
    }

    let mut update = IncrementalUpdate::new(doc);
    let font_ref = update.alloc();
    update.set_object(
        font_ref,
        Object::Dictionary(dict(vec![
            ("Type", Object::Name("Font".to_string())),
            ("Subtype", Object::Name("Type1".to_string())),
            ("BaseFont", Object::Name("Helvetica".to_string())),
            ("Encoding", Object::Name("WinAnsiEncoding".to_string())),
        ])),
    );

    for &index in pages {
        let page = doc.page(index)?;
        let content = render_content(text, anchor, page.media_box);
        let content_ref = update.alloc();
        update.set_object(
            content_ref,
            Object::Stream {
                dict: dict(vec![("Length", Object::Integer(content.len() as i64))]),
                data: content,
            },
        );
        stamp_page(doc, &mut update, page.obj_ref, content_ref, font_ref)?;
    }

    Ok(update.finish().data)
}

/// Convenience wrapper covering every page.
pub fn apply_watermark_to_all(doc: &Document, text: &str, anchor: Option<Rect>) -> Result<Vec<u8>> {
    let pages: Vec<usize> = (0..doc.page_count()).collect();
    apply_watermark(doc, text, anchor, &pages)
}

fn render_content(text: &str, anchor: Option<Rect>, media_box: Rect) -> Vec<u8> {
    let width = helvetica_text_width(text, FONT_SIZE);
    let (x, y) = match anchor {
        Some(rect) => (rect.llx + (rect.width() - width) / 2.0, rect.ury + 3.0),
        None => (
            media_box.urx - PAGE_MARGIN - width,
            media_box.lly + PAGE_MARGIN,
        ),
    };

    let mut ops = Vec::new();
    ops.extend_from_slice(b"q\nBT\n");
    ops.extend_from_slice(format!("/{} {} Tf\n", FONT_RES_NAME, FONT_SIZE).as_bytes());
    ops.extend_from_slice(
        format!("{:.3} {:.3} {:.3} rg\n", COLOR_RGB.0, COLOR_RGB.1, COLOR_RGB.2).as_bytes(),
    );
    ops.extend_from_slice(format!("{:.2} {:.2} Td\n", x, y).as_bytes());
    Object::String(text.as_bytes().to_vec()).write_to(&mut ops);
    ops.extend_from_slice(b" Tj\nET\nQ\n");
    ops
}

/// Rewrite one page dictionary so it picks up the extra content stream and
/// the stamped font resource.
fn stamp_page(
    doc: &Document,
    update: &mut IncrementalUpdate<'_>,
    page_ref: ObjectRef,
    content_ref: ObjectRef,
    font_ref: ObjectRef,
) -> Result<()> {
    let mut page = match doc.get_object(page_ref)? {
        Object::Dictionary(d) => d,
        other => {
            return Err(Error::InvalidPdf(format!(
                "page {} is a {}",
                page_ref,
                other.type_name()
            )))
        }
    };

    // Append to /Contents, normalizing to an array.
    let mut contents = match page.get("Contents") {
        None => Vec::new(),
        Some(Object::Array(items)) => items.clone(),
        Some(Object::Reference(r)) => match doc.get_object(*r)? {
            Object::Array(items) => items,
            Object::Stream { .. } => vec![Object::Reference(*r)],
            _ => Vec::new(),
        },
        Some(other) => vec![other.clone()],
    };
    contents.push(Object::Reference(content_ref));
    page.insert("Contents".to_string(), Object::Array(contents));

    // Merge the font into /Resources. A referenced resources dictionary is
    // replaced in this revision under its own object number, so sharing with
    // other pages stays intact.
    match page.get("Resources").cloned() {
        Some(Object::Reference(res_ref)) => {
            let mut resources = match doc.get_object(res_ref)? {
                Object::Dictionary(d) => d,
                _ => Dict::new(),
            };
            insert_font(&mut resources, font_ref);
            update.set_object(res_ref, Object::Dictionary(resources));
        }
        Some(Object::Dictionary(mut resources)) => {
            insert_font(&mut resources, font_ref);
            page.insert("Resources".to_string(), Object::Dictionary(resources));
        }
        _ => {
            let mut resources = Dict::new();
            insert_font(&mut resources, font_ref);
            page.insert("Resources".to_string(), Object::Dictionary(resources));
        }
    }

    update.set_object(page_ref, Object::Dictionary(page));
    Ok(())
}

fn insert_font(resources: &mut Dict, font_ref: ObjectRef) {
    let fonts = match resources.get_mut("Font") {
        Some(Object::Dictionary(d)) => d,
        _ => {
            resources.insert("Font".to_string(), Object::Dictionary(Dict::new()));
            match resources.get_mut("Font") {
                Some(Object::Dictionary(d)) => d,
                _ => unreachable!(),
            }
        }
    };
    fonts.insert(FONT_RES_NAME.to_string(), Object::Reference(font_ref));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::build_minimal_pdf;

    #[test]
    fn test_watermark_appends_revision() {
        let doc = Document::load(build_minimal_pdf(2)).unwrap();
        let original_len = doc.data().len();
        let stamped = apply_watermark_to_all(&doc, "Signed copy", None).unwrap();
        assert_eq!(&stamped[..original_len], doc.data());

        let updated = Document::load(stamped).unwrap();
        assert_eq!(updated.page_count(), 2);
        for page in updated.pages() {
            let dict = updated.get_object(page.obj_ref).unwrap().as_dict().cloned().unwrap();
            let contents = updated.resolve_entry(&dict, "Contents").unwrap();
            assert!(contents.as_array().map_or(false, |a| !a.is_empty()));
            let resources = updated.resolve_entry(&dict, "Resources").unwrap();
            let fonts = resources
                .as_dict()
                .and_then(|d| d.get("Font"))
                .and_then(Object::as_dict)
                .cloned()
                .unwrap();
            assert!(fonts.contains_key(FONT_RES_NAME));
        }
    }

    #[test]
    fn test_watermark_selected_pages_only() {
        let doc = Document::load(build_minimal_pdf(3)).unwrap();
        let stamped = apply_watermark(&doc, "Draft", None, &[1]).unwrap();
        let updated = Document::load(stamped).unwrap();

        let untouched = updated
            .get_object(updated.pages()[0].obj_ref)
            .unwrap()
            .as_dict()
            .cloned()
            .unwrap();
        assert!(!untouched.contains_key("Contents") || {
            let contents = updated.resolve_entry(&untouched, "Contents").unwrap();
            contents.as_array().map_or(true, |a| a.is_empty())
        });

        let touched = updated
            .get_object(updated.pages()[1].obj_ref)
            .unwrap()
            .as_dict()
            .cloned()
            .unwrap();
        let contents = updated.resolve_entry(&touched, "Contents").unwrap();
        assert_eq!(contents.as_array().map(|a| a.len()), Some(1));
    }

    #[test]
    fn test_out_of_range_page_rejected() {
        let doc = Document::load(build_minimal_pdf(1)).unwrap();
        let result = apply_watermark(&doc, "x", None, &[5]);
        assert!(matches!(result, Err(Error::InvalidPageSpecification(_))));
    }

    #[test]
    fn test_anchored_placement_centers_over_box() {
        let rect = Rect::new(100.0, 100.0, 300.0, 160.0);
        let content = render_content("ok", Some(rect), Rect::new(0.0, 0.0, 612.0, 792.0));
        let text = String::from_utf8(content).unwrap();
        // 3 points above the top edge.
        assert!(text.contains("163.00 Td"));
    }
}
