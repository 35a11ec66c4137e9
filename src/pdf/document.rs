//! Loaded-document model.
//!
//! `Document` owns the raw bytes of one revision of a PDF together with its
//! resolved cross-reference data and flattened page list. It is read-only;
//! incremental updates are produced by serializing new objects after the
//! existing bytes, then re-loading the result.

use super::object::{Dict, Object, ObjectRef};
use super::parser::{self, XrefData, XrefEntry};
use crate::error::{Error, Result};
use crate::geometry::Rect;
use std::collections::{HashMap, HashSet};

/// US Letter, the fallback when a page carries no usable /MediaBox.
const DEFAULT_MEDIA_BOX: Rect = Rect {
    llx: 0.0,
    lly: 0.0,
    urx: 612.0,
    ury: 792.0,
};

/// One leaf of the page tree.
#[derive(Debug, Clone)]
pub struct PageInfo {
    /// Indirect reference to the page dictionary.
    pub obj_ref: ObjectRef,
    /// Effective media box, after inheritance.
    pub media_box: Rect,
}

/// A parsed PDF revision.
#[derive(Debug)]
pub struct Document {
    data: Vec<u8>,
    xref: XrefData,
    /// Objects lifted out of object streams during load.
    compressed: HashMap<u32, Object>,
    catalog_ref: ObjectRef,
    pages: Vec<PageInfo>,
}

impl Document {
    /// Parse a document from its full byte content.
    ///
    /// Falls back to a raw object scan when the xref chain is unreadable.
    /// Encrypted documents are rejected.
    pub fn load(data: Vec<u8>) -> Result<Self> {
        let xref = match parser::read_xref(&data) {
            Ok(xref) => xref,
            Err(err) => {
                log::warn!("xref chain unreadable ({}), rebuilding from raw objects", err);
                parser::reconstruct_xref(&data)?
            }
        };

        if xref.trailer.contains_key("Encrypt") {
            return Err(Error::InvalidPdf(
                "encrypted documents are not supported".to_string(),
            ));
        }

        let catalog_ref = xref
            .trailer
            .get("Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("trailer /Root is not a reference".to_string()))?;

        let compressed = Self::inflate_object_streams(&data, &xref)?;

        let mut doc = Self {
            data,
            xref,
            compressed,
            catalog_ref,
            pages: Vec::new(),
        };
        doc.pages = doc.collect_pages()?;
        if doc.pages.is_empty() {
            return Err(Error::InvalidPdf("document has no pages".to_string()));
        }
        Ok(doc)
    }

    /// Pull every object held in an object stream into a flat map, so lookup
    /// never needs to re-inflate a stream.
    fn inflate_object_streams(data: &[u8], xref: &XrefData) -> Result<HashMap<u32, Object>> {
        let mut stream_ids: Vec<u32> = xref
            .entries
            .values()
            .filter_map(|entry| match entry {
                XrefEntry::InStream { stream_id, .. } => Some(*stream_id),
                _ => None,
            })
            .collect();
        stream_ids.sort_unstable();
        stream_ids.dedup();

        let mut compressed = HashMap::new();
        for stream_id in stream_ids {
            let Some(XrefEntry::Offset(offset)) = xref.entries.get(&stream_id) else {
                return Err(Error::InvalidPdf(format!(
                    "object stream {} has no file offset",
                    stream_id
                )));
            };
            let (_, object) = parser::parse_indirect_at(data, *offset as usize)?;
            let Object::Stream { dict, data: raw } = object else {
                return Err(Error::InvalidPdf(format!(
                    "object {} referenced as an object stream but is not a stream",
                    stream_id
                )));
            };
            for (id, obj) in parser::parse_object_stream(&dict, &raw)? {
                // Respect the xref: only keep objects the table actually
                // maps into this stream.
                if matches!(
                    xref.entries.get(&id),
                    Some(XrefEntry::InStream { stream_id: s, .. }) if *s == stream_id
                ) {
                    compressed.insert(id, obj);
                }
            }
        }
        Ok(compressed)
    }

    /// Raw bytes of this revision.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The trailer dictionary (merged across the revision chain).
    pub fn trailer(&self) -> &Dict {
        &self.xref.trailer
    }

    /// Reference to the document catalog.
    pub fn catalog_ref(&self) -> ObjectRef {
        self.catalog_ref
    }

    /// Offset of the newest xref section, for /Prev in the next revision.
    pub fn start_offset(&self) -> u64 {
        self.xref.start_offset
    }

    /// Whether the newest revision used a cross-reference stream.
    pub fn uses_xref_stream(&self) -> bool {
        self.xref.uses_xref_stream
    }

    /// Highest object number in use.
    pub fn max_object_id(&self) -> u32 {
        let from_entries = self.xref.entries.keys().copied().max().unwrap_or(0);
        let from_size = self
            .xref
            .trailer
            .get("Size")
            .and_then(Object::as_integer)
            .unwrap_or(0)
            .saturating_sub(1) as u32;
        from_entries.max(from_size)
    }

    /// Fetch an indirect object by reference.
    pub fn get_object(&self, obj_ref: ObjectRef) -> Result<Object> {
        match self.xref.entries.get(&obj_ref.id) {
            Some(XrefEntry::Offset(offset)) => {
                let (found_ref, object) = parser::parse_indirect_at(&self.data, *offset as usize)?;
                if found_ref.id != obj_ref.id {
                    return Err(Error::InvalidPdf(format!(
                        "xref offset for object {} holds object {}",
                        obj_ref.id, found_ref.id
                    )));
                }
                Ok(object)
            }
            Some(XrefEntry::InStream { .. }) => self
                .compressed
                .get(&obj_ref.id)
                .cloned()
                .ok_or_else(|| {
                    Error::InvalidPdf(format!("object {} missing from its object stream", obj_ref.id))
                }),
            Some(XrefEntry::Free) | None => Ok(Object::Null),
        }
    }

    /// Resolve an object, following one level of indirection if needed.
    pub fn resolve(&self, object: &Object) -> Result<Object> {
        match object {
            Object::Reference(r) => {
                let mut current = self.get_object(*r)?;
                // References to references are rare but legal.
                let mut depth = 0;
                while let Object::Reference(next) = current {
                    depth += 1;
                    if depth > 32 {
                        return Err(Error::InvalidPdf("reference chain too deep".to_string()));
                    }
                    current = self.get_object(next)?;
                }
                Ok(current)
            }
            other => Ok(other.clone()),
        }
    }

    /// Resolve a dictionary entry.
    pub fn resolve_entry(&self, dict: &Dict, key: &str) -> Result<Object> {
        match dict.get(key) {
            Some(object) => self.resolve(object),
            None => Ok(Object::Null),
        }
    }

    /// The document catalog dictionary.
    pub fn catalog(&self) -> Result<Dict> {
        match self.get_object(self.catalog_ref)? {
            Object::Dictionary(d) => Ok(d),
            other => Err(Error::InvalidPdf(format!(
                "catalog is a {}, expected dictionary",
                other.type_name()
            ))),
        }
    }

    /// The interactive-form dictionary, if the document has one.
    pub fn acro_form(&self) -> Result<Option<(Option<ObjectRef>, Dict)>> {
        let catalog = self.catalog()?;
        match catalog.get("AcroForm") {
            None => Ok(None),
            Some(Object::Reference(r)) => match self.get_object(*r)? {
                Object::Dictionary(d) => Ok(Some((Some(*r), d))),
                _ => Ok(None),
            },
            Some(Object::Dictionary(d)) => Ok(Some((None, d.clone()))),
            Some(_) => Ok(None),
        }
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Pages in document order.
    pub fn pages(&self) -> &[PageInfo] {
        &self.pages
    }

    /// Page by zero-based index.
    pub fn page(&self, index: usize) -> Result<&PageInfo> {
        self.pages.get(index).ok_or_else(|| {
            Error::InvalidPdf(format!(
                "page index {} out of range ({} pages)",
                index,
                self.pages.len()
            ))
        })
    }

    fn collect_pages(&self) -> Result<Vec<PageInfo>> {
        let catalog = self.catalog()?;
        let pages_ref = catalog
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("catalog /Pages is not a reference".to_string()))?;

        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        self.walk_page_tree(pages_ref, None, &mut pages, &mut visited, 0)?;
        Ok(pages)
    }

    fn walk_page_tree(
        &self,
        node_ref: ObjectRef,
        inherited_media_box: Option<Rect>,
        pages: &mut Vec<PageInfo>,
        visited: &mut HashSet<ObjectRef>,
        depth: usize,
    ) -> Result<()> {
        if depth > 64 || !visited.insert(node_ref) {
            return Err(Error::InvalidPdf("page tree contains a cycle".to_string()));
        }
        let node = match self.get_object(node_ref)? {
            Object::Dictionary(d) => d,
            other => {
                return Err(Error::InvalidPdf(format!(
                    "page tree node {} is a {}",
                    node_ref,
                    other.type_name()
                )))
            }
        };

        let media_box = self
            .read_media_box(&node)?
            .or(inherited_media_box);

        match node.get("Type").and_then(Object::as_name) {
            Some("Pages") => {
                let kids = self.resolve_entry(&node, "Kids")?;
                let kids = kids
                    .as_array()
                    .ok_or_else(|| Error::InvalidPdf("/Kids is not an array".to_string()))?;
                for kid in kids {
                    let kid_ref = kid.as_reference().ok_or_else(|| {
                        Error::InvalidPdf("page tree kid is not a reference".to_string())
                    })?;
                    self.walk_page_tree(kid_ref, media_box, pages, visited, depth + 1)?;
                }
            }
            // Some writers omit /Type on leaves; a node without /Kids is a page.
            Some("Page") | None => {
                pages.push(PageInfo {
                    obj_ref: node_ref,
                    media_box: media_box.unwrap_or(DEFAULT_MEDIA_BOX),
                });
            }
            Some(other) => {
                return Err(Error::InvalidPdf(format!(
                    "unexpected page tree node type /{}",
                    other
                )))
            }
        }
        Ok(())
    }

    fn read_media_box(&self, node: &Dict) -> Result<Option<Rect>> {
        let value = self.resolve_entry(node, "MediaBox")?;
        let Some(items) = value.as_array() else {
            return Ok(None);
        };
        if items.len() != 4 {
            return Ok(None);
        }
        let mut coords = [0.0f32; 4];
        for (i, item) in items.iter().enumerate() {
            coords[i] = match self.resolve(item)? {
                Object::Integer(v) => v as f32,
                Object::Real(v) => v as f32,
                _ => return Ok(None),
            };
        }
        Ok(Some(Rect::new(coords[0], coords[1], coords[2], coords[3])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::build_minimal_pdf;

    #[test]
    fn test_load_minimal_document() {
        let data = build_minimal_pdf(3);
        let doc = Document::load(data).unwrap();
        assert_eq!(doc.page_count(), 3);
        let catalog = doc.catalog().unwrap();
        assert_eq!(catalog.get("Type").and_then(Object::as_name), Some("Catalog"));
    }

    #[test]
    fn test_media_box_inheritance() {
        let data = build_minimal_pdf(2);
        let doc = Document::load(data).unwrap();
        for page in doc.pages() {
            assert_eq!(page.media_box.width(), 612.0);
            assert_eq!(page.media_box.height(), 792.0);
        }
    }

    #[test]
    fn test_encrypted_document_rejected() {
        let mut data = build_minimal_pdf(1);
        // Splice an /Encrypt key into the trailer.
        let text = String::from_utf8_lossy(&data).to_string();
        let patched = text.replace("/Root 1 0 R", "/Root 1 0 R /Encrypt 9 0 R");
        data = patched.into_bytes();
        // The trailer moved, so offsets in startxref still hold; re-parse.
        let result = Document::load(data);
        match result {
            Err(Error::InvalidPdf(msg)) => assert!(msg.contains("encrypted")),
            other => panic!("expected encryption rejection, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_damaged_xref_reconstruction() {
        let mut data = build_minimal_pdf(2);
        // Point startxref into the middle of nowhere.
        if let Some(pos) = data.windows(9).rposition(|w| w == b"startxref") {
            data.truncate(pos);
            data.extend_from_slice(b"startxref\n999999\n%%EOF\n");
        }
        let doc = Document::load(data).unwrap();
        assert_eq!(doc.page_count(), 2);
    }

    #[test]
    fn test_max_object_id() {
        let data = build_minimal_pdf(1);
        let doc = Document::load(data).unwrap();
        assert!(doc.max_object_id() >= 3);
    }
}
