//! Minimal PDF engine for signing workflows.
//!
//! Parsing, object resolution, and append-only writing. The engine reads
//! classic xref tables, xref streams, and object streams, and recovers from a
//! damaged xref chain by scanning. Writing is strictly incremental so earlier
//! signatures keep covering the bytes they signed.

pub mod document;
pub mod fonts;
pub mod incremental;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod watermark;

pub use document::{Document, PageInfo};
pub use incremental::{IncrementalUpdate, UpdateOutput};
pub use object::{dict, Dict, Object, ObjectRef};

/// Build a small single-revision document with `page_count` empty pages.
///
/// Classic xref table, media box inherited from the page tree root. Used as a
/// fixture by the test suite.
pub fn build_minimal_pdf(page_count: usize) -> Vec<u8> {
    let mut data: Vec<u8> = Vec::new();
    let mut offsets: Vec<usize> = Vec::new();
    data.extend_from_slice(b"%PDF-1.7\n");

    offsets.push(data.len());
    data.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

    offsets.push(data.len());
    let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", i + 3)).collect();
    data.extend_from_slice(
        format!(
            "2 0 obj\n<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] >>\nendobj\n",
            kids.join(" "),
            page_count
        )
        .as_bytes(),
    );

    for i in 0..page_count {
        offsets.push(data.len());
        data.extend_from_slice(
            format!("{} 0 obj\n<< /Type /Page /Parent 2 0 R >>\nendobj\n", i + 3).as_bytes(),
        );
    }

    let xref_start = data.len();
    data.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    data.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        data.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    data.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            offsets.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    data
}
