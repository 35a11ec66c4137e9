//! Tests for the document model, incremental writer, and watermark stamping.

use pdf_signet::pdf::{build_minimal_pdf, dict, Document, IncrementalUpdate, Object};

#[test]
fn test_minimal_document_loads() {
    let data = build_minimal_pdf(3);
    let doc = Document::load(data).unwrap();
    assert_eq!(doc.page_count(), 3);
    // Inherited media box.
    let page = doc.page(0).unwrap();
    assert_eq!(page.media_box.width(), 612.0);
    assert_eq!(page.media_box.height(), 792.0);
}

#[test]
fn test_incremental_update_appends_and_reparses() {
    let data = build_minimal_pdf(1);
    let original = data.clone();
    let doc = Document::load(data).unwrap();

    let mut update = IncrementalUpdate::new(&doc);
    let new_ref = update.alloc();
    update.set_object(
        new_ref,
        Object::Dictionary(dict(vec![(
            "Marker",
            Object::Name("RevisionTwo".to_string()),
        )])),
    );
    let output = update.finish();

    // The previous revision's bytes are an untouched prefix.
    assert!(output.data.len() > original.len());
    assert_eq!(&output.data[..original.len()], original.as_slice());

    let reloaded = Document::load(output.data).unwrap();
    assert_eq!(reloaded.page_count(), 1);
    let fetched = reloaded.get_object(new_ref).unwrap();
    let marker = fetched
        .as_dict()
        .and_then(|d| d.get("Marker"))
        .and_then(Object::as_name);
    assert_eq!(marker, Some("RevisionTwo"));
}

#[test]
fn test_incremental_update_replaces_existing_object() {
    let data = build_minimal_pdf(2);
    let doc = Document::load(data).unwrap();
    let catalog_ref = doc.catalog_ref();
    let mut catalog = doc.catalog().unwrap();
    catalog.insert("Lang".to_string(), Object::String(b"en".to_vec()));

    let mut update = IncrementalUpdate::new(&doc);
    update.set_object(catalog_ref, Object::Dictionary(catalog));
    let output = update.finish();

    let reloaded = Document::load(output.data).unwrap();
    let lang = reloaded.catalog().unwrap().get("Lang").cloned();
    assert_eq!(lang, Some(Object::String(b"en".to_vec())));
    // Pages still resolve through the old revision.
    assert_eq!(reloaded.page_count(), 2);
}

#[test]
fn test_watermark_preserves_pages_and_grows_stream() {
    let data = build_minimal_pdf(3);
    let original_len = data.len();
    let doc = Document::load(data).unwrap();

    let stamped =
        pdf_signet::pdf::watermark::apply_watermark(&doc, "Signature Applied", None, &[0, 2])
            .unwrap();
    assert!(stamped.len() > original_len);

    let reloaded = Document::load(stamped).unwrap();
    assert_eq!(reloaded.page_count(), 3);
}

#[test]
fn test_watermark_rejects_out_of_range_page() {
    let data = build_minimal_pdf(2);
    let doc = Document::load(data).unwrap();
    let err = pdf_signet::pdf::watermark::apply_watermark(&doc, "text", None, &[5]).unwrap_err();
    assert!(matches!(
        err,
        pdf_signet::error::Error::InvalidPageSpecification(_)
    ));
}

#[test]
fn test_encrypted_document_rejected() {
    let mut data = build_minimal_pdf(1);
    // Splice an /Encrypt entry into the trailer.
    let needle = b"/Root 1 0 R";
    let pos = data
        .windows(needle.len())
        .position(|w| w == needle)
        .unwrap();
    let mut patched = data[..pos].to_vec();
    patched.extend_from_slice(b"/Encrypt 9 0 R ");
    patched.extend_from_slice(&data[pos..]);
    data = patched;

    let err = Document::load(data).unwrap_err();
    assert!(err.to_string().contains("encrypted"));
}
