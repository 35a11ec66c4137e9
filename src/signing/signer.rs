//! Incremental multi-page signing pipeline.
//!
//! One revision per resolved page, ascending, each built from the previous
//! revision's output bytes. Every page except the last is signed with an
//! open modification policy; the last reflects the caller's changes-allowed
//! flag, optionally certifying the document with a DocMDP transform.

use crate::error::{Error, Result};
use crate::keystore::{CertificateCredential, KeyMaterialProvider};
use crate::options::SignatureOptions;
use crate::pdf::object::{dict, Dict, Object, ObjectRef};
use crate::pdf::{Document, IncrementalUpdate};
use crate::signing::appearance;
use crate::signing::byterange;
use crate::signing::cms;
use crate::signing::estimate::estimate_size;
use crate::signing::pages::resolve_pages;
use crate::signing::revocation::{collect_revocation_material, RevocationMaterial};
use crate::signing::tsa::{random_default_url, TsaClient};
use crate::signing::DocumentModificationPolicy;
use chrono::{DateTime, FixedOffset, Local};

/// Widget flags: print + locked.
const ANNOT_FLAGS: i64 = 132;
/// AcroForm SigFlags: signatures exist + append-only.
const SIG_FLAGS: i64 = 3;
/// Line stamped on each selected page when watermarking is requested.
const WATERMARK_TEXT: &str = "pdf_signet - Signature Applied";

/// Everything one signing run needs.
pub struct SigningRequest<'a> {
    /// Input document bytes.
    pub document: Vec<u8>,
    /// Selected key-material backend.
    pub provider: &'a KeyMaterialProvider,
    /// Certificate serial to sign with; default credential when `None`.
    pub certificate_serial: Option<String>,
    /// Validated per-signature options.
    pub options: SignatureOptions,
    /// Stamp a "Signature Applied" line on the selected pages before signing.
    pub apply_watermark: bool,
}

/// Sign a document per the request and return the final revision's bytes.
pub fn sign_document(request: SigningRequest<'_>) -> Result<Vec<u8>> {
    request.options.validate()?;

    let credential = match &request.certificate_serial {
        Some(serial) => request.provider.credential_by_serial(serial)?,
        None => request.provider.default_credential()?,
    };
    log::info!(
        "credential resolved: {} certificate(s) in chain",
        credential.chain.len()
    );

    // The TSA is only probed when timestamping is actually requested.
    let tsa = if request.options.timestamp.enabled {
        let url = match request.options.timestamp.url.as_deref() {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => random_default_url().to_string(),
        };
        Some(TsaClient::connect(
            &url,
            request.options.timestamp.username.as_deref(),
            request.options.timestamp.password.as_deref(),
        )?)
    } else {
        None
    };

    let revocation = if request.options.enable_ltv {
        let material = collect_revocation_material(&credential.chain)?;
        log::info!(
            "revocation material: {} CRL(s), {} OCSP response(s)",
            material.crls.len(),
            material.ocsp_responses.len()
        );
        Some(material)
    } else {
        None
    };

    let doc = Document::load(request.document)?;
    let pages = resolve_pages(&request.options.page, doc.page_count())?;
    log::info!("signing pages {:?} of {}", pages, doc.page_count());

    let mut data = if request.apply_watermark {
        let zero_based: Vec<usize> = pages.iter().map(|&p| p - 1).collect();
        crate::pdf::watermark::apply_watermark(
            &doc,
            WATERMARK_TEXT,
            request.options.signature_rect(),
            &zero_based,
        )?
    } else {
        doc.data().to_vec()
    };
    drop(doc);

    // Fold the revisions forward, re-parsing each output.
    for (i, &page) in pages.iter().enumerate() {
        let is_last = i + 1 == pages.len();
        let policy = if !is_last || request.options.changes_allowed {
            DocumentModificationPolicy::Open
        } else {
            DocumentModificationPolicy::RestrictedToFormFilling
        };
        data = sign_revision(
            data,
            page,
            &credential,
            &request.options,
            policy,
            tsa.as_ref(),
            revocation.as_ref(),
        )?;
        log::debug!("revision {} of {} complete ({} bytes)", i + 1, pages.len(), data.len());
    }
    Ok(data)
}

/// `D:YYYYMMDDHHmmSS+HH'mm'` per the PDF date syntax.
fn pdf_date(at: DateTime<FixedOffset>) -> String {
    let offset = at.offset().local_minus_utc();
    let (sign, offset) = if offset < 0 { ('-', -offset) } else { ('+', offset) };
    format!(
        "D:{}{}{:02}'{:02}'",
        at.format("%Y%m%d%H%M%S"),
        sign,
        offset / 3600,
        (offset % 3600) / 60
    )
}

/// Field names carry the page and a random suffix so repeated signing of the
/// same document never collides.
fn unique_field_name(page: usize) -> String {
    let suffix = (uuid::Uuid::new_v4().as_u128() % 1_000_000) as u32;
    format!("pdf_signet__P_{}_{:06}", page, suffix)
}

fn append_to_fields(doc: &Document, form: &Dict, field_ref: ObjectRef) -> Result<Vec<Object>> {
    let mut fields = match doc.resolve_entry(form, "Fields")? {
        Object::Array(items) => items,
        _ => Vec::new(),
    };
    fields.push(Object::Reference(field_ref));
    Ok(fields)
}

/// Produce one signature revision over `input` for 1-based `page_no`.
fn sign_revision(
    input: Vec<u8>,
    page_no: usize,
    credential: &CertificateCredential,
    options: &SignatureOptions,
    policy: DocumentModificationPolicy,
    tsa: Option<&TsaClient>,
    revocation: Option<&RevocationMaterial>,
) -> Result<Vec<u8>> {
    let doc = Document::load(input)?;
    let page = doc.page(page_no - 1)?.clone();
    let now: DateTime<FixedOffset> = Local::now().fixed_offset();

    let reserved = estimate_size(credential.chain.len(), tsa.is_some(), revocation.is_some());
    let field_name = unique_field_name(page_no);
    let certify = matches!(policy, DocumentModificationPolicy::RestrictedToFormFilling);

    let mut update = IncrementalUpdate::new(&doc);
    let sig_ref = update.alloc();
    let field_ref = update.alloc();

    // Signature dictionary with reserved windows.
    let mut sig_dict = dict(vec![
        ("Type", Object::Name("Sig".to_string())),
        ("Filter", Object::Name("Adobe.PPKLite".to_string())),
        ("SubFilter", Object::Name("ETSI.CAdES.detached".to_string())),
        ("ByteRange", byterange::byte_range_placeholder()),
        ("Contents", byterange::contents_placeholder(reserved)),
        ("M", Object::String(pdf_date(now).into_bytes())),
        ("Prop_Build", Object::Dictionary(dict(vec![(
            "App",
            Object::Dictionary(dict(vec![("Name", Object::Name("pdf_signet".to_string()))])),
        )]))),
    ]);
    if !options.reason.trim().is_empty() {
        sig_dict.insert("Reason".to_string(), Object::String(options.reason.clone().into_bytes()));
    }
    if !options.location.trim().is_empty() {
        sig_dict.insert(
            "Location".to_string(),
            Object::String(options.location.clone().into_bytes()),
        );
    }
    if certify {
        // DocMDP: form filling stays allowed, everything else is locked.
        sig_dict.insert(
            "Reference".to_string(),
            Object::Array(vec![Object::Dictionary(dict(vec![
                ("Type", Object::Name("SigRef".to_string())),
                ("TransformMethod", Object::Name("DocMDP".to_string())),
                (
                    "TransformParams",
                    Object::Dictionary(dict(vec![
                        ("Type", Object::Name("TransformParams".to_string())),
                        ("P", Object::Integer(2)),
                        ("V", Object::Name("1.2".to_string())),
                    ])),
                ),
            ]))]),
        );
    }
    update.set_object(sig_ref, Object::Dictionary(sig_dict));

    // Widget annotation doubling as the form field.
    let mut field_dict = dict(vec![
        ("Type", Object::Name("Annot".to_string())),
        ("Subtype", Object::Name("Widget".to_string())),
        ("FT", Object::Name("Sig".to_string())),
        ("T", Object::String(field_name.into_bytes())),
        ("V", Object::Reference(sig_ref)),
        ("F", Object::Integer(ANNOT_FLAGS)),
        ("P", Object::Reference(page.obj_ref)),
    ]);
    match options.signature_rect() {
        Some(rect) => {
            field_dict.insert(
                "Rect".to_string(),
                Object::Array(vec![
                    Object::Real(rect.llx as f64),
                    Object::Real(rect.lly as f64),
                    Object::Real(rect.urx as f64),
                    Object::Real(rect.ury as f64),
                ]),
            );
            let font_ref = update.alloc();
            update.set_object(font_ref, appearance::helvetica_font_object());
            let panel = appearance::compose_panel(
                credential.leaf(),
                &options.reason,
                &options.location,
                &options.custom_text,
                options.changes_allowed,
                rect,
                now,
            );
            let form_ref = update.alloc();
            update.set_object(form_ref, appearance::build_form_xobject(&panel, rect, font_ref));
            // The layered frame is what lets viewers overlay their own
            // validity mark in the reserved headroom.
            let normal = if options.green_tick {
                let blank_ref = update.alloc();
                update.set_object(blank_ref, appearance::build_blank_layer(rect));
                let frame_ref = update.alloc();
                update.set_object(
                    frame_ref,
                    appearance::build_layer_frame(rect, blank_ref, form_ref),
                );
                frame_ref
            } else {
                form_ref
            };
            field_dict.insert(
                "AP".to_string(),
                Object::Dictionary(dict(vec![("N", Object::Reference(normal))])),
            );
        }
        None => {
            field_dict.insert(
                "Rect".to_string(),
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(0),
                ]),
            );
        }
    }
    update.set_object(field_ref, Object::Dictionary(field_dict));

    // Hook the widget into the page's /Annots.
    let mut page_dict = match doc.get_object(page.obj_ref)? {
        Object::Dictionary(d) => d,
        other => {
            return Err(Error::InvalidPdf(format!(
                "page {} is a {}",
                page.obj_ref,
                other.type_name()
            )))
        }
    };
    let mut annots = match doc.resolve_entry(&page_dict, "Annots")? {
        Object::Array(items) => items,
        _ => Vec::new(),
    };
    annots.push(Object::Reference(field_ref));
    page_dict.insert("Annots".to_string(), Object::Array(annots));
    update.set_object(page.obj_ref, Object::Dictionary(page_dict));

    // Hook the field into the interactive form, and certify if asked.
    let mut catalog = doc.catalog()?;
    match doc.acro_form()? {
        Some((Some(form_ref), form)) => {
            let mut form = form;
            let fields = append_to_fields(&doc, &form, field_ref)?;
            form.insert("Fields".to_string(), Object::Array(fields));
            form.insert("SigFlags".to_string(), Object::Integer(SIG_FLAGS));
            update.set_object(form_ref, Object::Dictionary(form));
        }
        Some((None, form)) => {
            let mut form = form;
            let fields = append_to_fields(&doc, &form, field_ref)?;
            form.insert("Fields".to_string(), Object::Array(fields));
            form.insert("SigFlags".to_string(), Object::Integer(SIG_FLAGS));
            catalog.insert("AcroForm".to_string(), Object::Dictionary(form));
        }
        None => {
            let form = dict(vec![
                ("Fields", Object::Array(vec![Object::Reference(field_ref)])),
                ("SigFlags", Object::Integer(SIG_FLAGS)),
            ]);
            catalog.insert("AcroForm".to_string(), Object::Dictionary(form));
        }
    }
    if certify {
        catalog.insert(
            "Perms".to_string(),
            Object::Dictionary(dict(vec![("DocMDP", Object::Reference(sig_ref))])),
        );
    }
    update.set_object(doc.catalog_ref(), Object::Dictionary(catalog));

    // Serialize, fix the byte range, sign the covered bytes, embed.
    let output = update.finish();
    let mut data = output.data;
    let sig_offset = output
        .offsets
        .get(&sig_ref.id)
        .copied()
        .ok_or_else(|| Error::SigningFailed("signature dictionary was not serialized".to_string()))?
        as usize;
    let window = byterange::locate_window(&data, sig_offset, reserved)?;
    let range = byterange::patch_byte_range(&mut data, sig_offset, &window)?;
    let covered = byterange::covered_bytes(&data, &range)?;
    let container = cms::sign_detached(&covered, credential, revocation, tsa)?;
    byterange::embed_signature(&mut data, &window, &container)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pdf_date_format() {
        let at = FixedOffset::east_opt(5 * 3600 + 1800)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 7, 9, 8, 7)
            .unwrap();
        assert_eq!(pdf_date(at), "D:20240307090807+05'30'");

        let at = FixedOffset::west_opt(4 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 11, 30, 23, 59, 59)
            .unwrap();
        assert_eq!(pdf_date(at), "D:20241130235959-04'00'");
    }

    #[test]
    fn test_field_names_are_unique_and_tagged() {
        let a = unique_field_name(3);
        let b = unique_field_name(3);
        assert!(a.starts_with("pdf_signet__P_3_"));
        assert_eq!(a.len(), "pdf_signet__P_3_".len() + 6);
        assert_ne!(a, b);
    }
}
