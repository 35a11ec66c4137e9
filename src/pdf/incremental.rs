//! Append-only revision writer.
//!
//! A signed revision never rewrites existing bytes. New and replacement
//! objects are serialized after the current end of file, followed by a
//! cross-reference section (classic table or xref stream, matching whatever
//! the previous revision used) whose trailer chains back via /Prev.

use super::document::Document;
use super::object::{Dict, Object, ObjectRef};
use std::collections::HashMap;

/// The bytes of a new revision plus the offset of every object written into
/// it, keyed by object number.
pub struct UpdateOutput {
    /// Complete file content including the new revision.
    pub data: Vec<u8>,
    /// Byte offset of each appended object within `data`.
    pub offsets: HashMap<u32, u64>,
}

/// Accumulates objects for one incremental update.
pub struct IncrementalUpdate<'a> {
    doc: &'a Document,
    next_id: u32,
    objects: Vec<(ObjectRef, Object)>,
}

impl<'a> IncrementalUpdate<'a> {
    /// Start an update on top of `doc`.
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            next_id: doc.max_object_id() + 1,
            objects: Vec::new(),
        }
    }

    /// Allocate a fresh object number.
    pub fn alloc(&mut self) -> ObjectRef {
        let obj_ref = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        obj_ref
    }

    /// Queue an object for this revision. Replaces the previous revision's
    /// object when `obj_ref` already exists.
    pub fn set_object(&mut self, obj_ref: ObjectRef, object: Object) {
        if let Some(slot) = self.objects.iter_mut().find(|(r, _)| *r == obj_ref) {
            slot.1 = object;
        } else {
            self.objects.push((obj_ref, object));
        }
    }

    /// Serialize the revision and return the complete new file.
    pub fn finish(mut self) -> UpdateOutput {
        let mut data = self.doc.data().to_vec();
        if data.last() != Some(&b'\n') {
            data.push(b'\n');
        }

        self.objects.sort_by_key(|(r, _)| r.id);
        let mut offsets = HashMap::new();
        for (obj_ref, object) in &self.objects {
            offsets.insert(obj_ref.id, data.len() as u64);
            data.extend_from_slice(format!("{} {} obj\n", obj_ref.id, obj_ref.gen).as_bytes());
            object.write_to(&mut data);
            data.extend_from_slice(b"\nendobj\n");
        }

        let size = self.next_id.max(self.doc.max_object_id() + 1);
        if self.doc.uses_xref_stream() {
            self.write_xref_stream(&mut data, &mut offsets, size);
        } else {
            self.write_xref_table(&mut data, &offsets, size);
        }
        UpdateOutput { data, offsets }
    }

    /// Carry forward the keys a chained trailer must repeat.
    fn trailer_dict(&self, size: u32) -> Dict {
        let mut trailer = Dict::new();
        trailer.insert("Size".to_string(), Object::Integer(size as i64));
        trailer.insert("Prev".to_string(), Object::Integer(self.doc.start_offset() as i64));
        for key in ["Root", "Info", "ID"] {
            if let Some(value) = self.doc.trailer().get(key) {
                trailer.insert(key.to_string(), value.clone());
            }
        }
        trailer
    }

    /// Consecutive-id runs for subsection headers / the /Index array.
    fn subsections(entries: &[(u32, u64, u16)]) -> Vec<Vec<(u32, u64, u16)>> {
        let mut runs: Vec<Vec<(u32, u64, u16)>> = Vec::new();
        for &entry in entries {
            match runs.last_mut() {
                Some(run) if run.last().map(|e| e.0 + 1) == Some(entry.0) => run.push(entry),
                _ => runs.push(vec![entry]),
            }
        }
        runs
    }

    fn sorted_entries(&self, offsets: &HashMap<u32, u64>) -> Vec<(u32, u64, u16)> {
        let mut entries: Vec<(u32, u64, u16)> = self
            .objects
            .iter()
            .map(|(r, _)| (r.id, offsets[&r.id], r.gen))
            .collect();
        entries.sort_by_key(|e| e.0);
        entries
    }

    fn write_xref_table(&self, data: &mut Vec<u8>, offsets: &HashMap<u32, u64>, size: u32) {
        let xref_start = data.len();
        data.extend_from_slice(b"xref\n");
        for run in Self::subsections(&self.sorted_entries(offsets)) {
            data.extend_from_slice(format!("{} {}\n", run[0].0, run.len()).as_bytes());
            for (_, offset, gen) in run {
                data.extend_from_slice(format!("{:010} {:05} n \n", offset, gen).as_bytes());
            }
        }
        data.extend_from_slice(b"trailer\n");
        Object::Dictionary(self.trailer_dict(size)).write_to(data);
        data.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_start).as_bytes());
    }

    fn write_xref_stream(
        &mut self,
        data: &mut Vec<u8>,
        offsets: &mut HashMap<u32, u64>,
        size: u32,
    ) {
        let stream_ref = ObjectRef::new(self.next_id, 0);
        let size = size.max(stream_ref.id + 1);
        let xref_start = data.len() as u64;

        let mut entries = self.sorted_entries(offsets);
        entries.push((stream_ref.id, xref_start, 0));
        entries.sort_by_key(|e| e.0);

        // Fixed widths: type byte, 5-byte offset, 2-byte generation.
        let mut rows = Vec::new();
        let mut index = Vec::new();
        for run in Self::subsections(&entries) {
            index.push(Object::Integer(run[0].0 as i64));
            index.push(Object::Integer(run.len() as i64));
            for (_, offset, gen) in run {
                rows.push(1u8);
                rows.extend_from_slice(&offset.to_be_bytes()[3..]);
                rows.extend_from_slice(&gen.to_be_bytes());
            }
        }

        let mut dict = self.trailer_dict(size);
        dict.insert("Type".to_string(), Object::Name("XRef".to_string()));
        dict.insert(
            "W".to_string(),
            Object::Array(vec![Object::Integer(1), Object::Integer(5), Object::Integer(2)]),
        );
        dict.insert("Index".to_string(), Object::Array(index));
        dict.insert("Length".to_string(), Object::Integer(rows.len() as i64));

        offsets.insert(stream_ref.id, xref_start);
        data.extend_from_slice(format!("{} 0 obj\n", stream_ref.id).as_bytes());
        Object::Stream { dict, data: rows }.write_to(data);
        data.extend_from_slice(b"\nendobj\n");
        data.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_start).as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::build_minimal_pdf;
    use crate::pdf::object::dict;

    #[test]
    fn test_append_new_object() {
        let doc = Document::load(build_minimal_pdf(1)).unwrap();
        let original_len = doc.data().len();

        let mut update = IncrementalUpdate::new(&doc);
        let obj_ref = update.alloc();
        update.set_object(
            obj_ref,
            Object::Dictionary(dict(vec![("Marker", Object::Integer(7))])),
        );
        let output = update.finish();

        // Original bytes are untouched.
        assert_eq!(&output.data[..original_len], doc.data());

        let updated = Document::load(output.data).unwrap();
        assert_eq!(updated.page_count(), 1);
        let fetched = updated.get_object(obj_ref).unwrap();
        assert_eq!(
            fetched.as_dict().and_then(|d| d.get("Marker")).and_then(Object::as_integer),
            Some(7)
        );
    }

    #[test]
    fn test_replace_existing_object() {
        let doc = Document::load(build_minimal_pdf(2)).unwrap();
        let page_ref = doc.pages()[0].obj_ref;
        let mut page_dict = doc.get_object(page_ref).unwrap().as_dict().cloned().unwrap();
        page_dict.insert("Rotate".to_string(), Object::Integer(90));

        let mut update = IncrementalUpdate::new(&doc);
        update.set_object(page_ref, Object::Dictionary(page_dict));
        let output = update.finish();

        let updated = Document::load(output.data).unwrap();
        assert_eq!(updated.page_count(), 2);
        let page = updated.get_object(page_ref).unwrap();
        assert_eq!(
            page.as_dict().and_then(|d| d.get("Rotate")).and_then(Object::as_integer),
            Some(90)
        );
    }

    #[test]
    fn test_chained_revisions() {
        let mut data = build_minimal_pdf(1);
        let mut last_ref = None;
        for i in 0..3 {
            let doc = Document::load(data).unwrap();
            let mut update = IncrementalUpdate::new(&doc);
            let obj_ref = update.alloc();
            update.set_object(
                obj_ref,
                Object::Dictionary(dict(vec![("Rev", Object::Integer(i))])),
            );
            last_ref = Some(obj_ref);
            data = update.finish().data;
        }
        let doc = Document::load(data).unwrap();
        let fetched = doc.get_object(last_ref.unwrap()).unwrap();
        assert_eq!(
            fetched.as_dict().and_then(|d| d.get("Rev")).and_then(Object::as_integer),
            Some(2)
        );
    }

    #[test]
    fn test_offsets_point_at_objects() {
        let doc = Document::load(build_minimal_pdf(1)).unwrap();
        let mut update = IncrementalUpdate::new(&doc);
        let obj_ref = update.alloc();
        update.set_object(obj_ref, Object::Integer(42));
        let output = update.finish();

        let offset = output.offsets[&obj_ref.id] as usize;
        let header = format!("{} 0 obj", obj_ref.id);
        assert!(output.data[offset..].starts_with(header.as_bytes()));
    }
}
