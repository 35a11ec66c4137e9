//! PDF object and cross-reference parsing.
//!
//! Covers the subset of the file format the signing and verification paths
//! need: object syntax, classic xref tables, xref streams (with FlateDecode
//! and PNG predictors), object streams, and a scan-based recovery pass for
//! documents with a damaged xref chain.

use super::lexer::{self, is_whitespace, Token};
use super::object::{Dict, Object, ObjectRef};
use crate::error::{Error, Result};
use flate2::read::ZlibDecoder;
use std::collections::{HashMap, HashSet};
use std::io::Read;

/// Where an indirect object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Byte offset of the object in the file.
    Offset(u64),
    /// Stored inside an object stream.
    InStream {
        /// Object number of the containing stream
        stream_id: u32,
        /// Index within the stream
        index: u32,
    },
    /// Free entry.
    Free,
}

/// Result of walking the cross-reference chain.
#[derive(Debug, Clone)]
pub struct XrefData {
    /// Object number -> location. Newest revision wins.
    pub entries: HashMap<u32, XrefEntry>,
    /// Merged trailer dictionary (newest revision wins per key).
    pub trailer: Dict,
    /// Offset of the newest xref section (the startxref value).
    pub start_offset: u64,
    /// Whether the newest revision used an xref stream rather than a table.
    pub uses_xref_stream: bool,
}

/// Cursor over raw PDF bytes, feeding the nom tokenizer and tracking the
/// absolute position stream slicing and xref offsets need.
pub struct Lexer<'a> {
    data: &'a [u8],
    /// Current read position
    pub pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer starting at `pos`.
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    fn advance_to(&mut self, remaining: &[u8]) {
        self.pos = self.data.len() - remaining.len();
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Skip whitespace and comments.
    pub fn skip_whitespace(&mut self) {
        if let Ok((remaining, _)) = lexer::skip_ws(self.rest()) {
            self.advance_to(remaining);
        }
    }

    /// Consume an expected keyword, returning whether it was present.
    pub fn try_keyword(&mut self, kw: &[u8]) -> bool {
        self.skip_whitespace();
        match lexer::keyword(kw)(self.rest()) {
            Ok((remaining, _)) => {
                self.advance_to(remaining);
                true
            }
            Err(_) => false,
        }
    }

    fn expect(&mut self, kw: &[u8]) -> Result<()> {
        if self.try_keyword(kw) {
            Ok(())
        } else {
            Err(Error::InvalidPdf(format!(
                "expected '{}' at byte {}",
                String::from_utf8_lossy(kw),
                self.pos
            )))
        }
    }

    fn next_token(&mut self) -> Result<Token<'a>> {
        match lexer::token(self.rest()) {
            Ok((remaining, token)) => {
                self.advance_to(remaining);
                Ok(token)
            }
            Err(_) => Err(Error::InvalidPdf(format!("no token at byte {}", self.pos))),
        }
    }

    /// Parse an unsigned integer token.
    pub fn parse_uint(&mut self) -> Result<u64> {
        let start = self.pos;
        match self.next_token() {
            Ok(Token::Integer(n)) if n >= 0 => Ok(n as u64),
            _ => {
                self.pos = start;
                Err(Error::InvalidPdf(format!("expected integer at byte {}", start)))
            }
        }
    }

    /// Parse the next object at the cursor.
    pub fn parse_object(&mut self) -> Result<Object> {
        let token = self.next_token()?;
        self.object_from(token)
    }

    fn object_from(&mut self, token: Token<'a>) -> Result<Object> {
        match token {
            Token::Integer(id) => {
                // "id gen R" lookahead: an unsigned integer may open a
                // reference.
                if id >= 0 {
                    let saved = self.pos;
                    if let Ok(Token::Integer(gen)) = self.next_token() {
                        if (0..=i64::from(u16::MAX)).contains(&gen) && self.try_keyword(b"R") {
                            return Ok(Object::Reference(ObjectRef::new(id as u32, gen as u16)));
                        }
                    }
                    self.pos = saved;
                }
                Ok(Object::Integer(id))
            }
            Token::Real(value) => Ok(Object::Real(value)),
            Token::Name(name) => Ok(Object::Name(name)),
            Token::LiteralString(raw) => Ok(Object::String(decode_literal_string(raw))),
            Token::HexString(raw) => Ok(Object::HexString(decode_hex_nibbles(raw))),
            Token::True => Ok(Object::Boolean(true)),
            Token::False => Ok(Object::Boolean(false)),
            Token::Null => Ok(Object::Null),
            Token::ArrayStart => self.parse_array_body(),
            Token::DictStart => self.parse_dict_body(),
            Token::ArrayEnd | Token::DictEnd | Token::R => Err(Error::InvalidPdf(format!(
                "unexpected token at byte {}",
                self.pos
            ))),
        }
    }

    fn parse_array_body(&mut self) -> Result<Object> {
        let mut items = Vec::new();
        loop {
            let token = self
                .next_token()
                .map_err(|_| Error::InvalidPdf("unterminated array".to_string()))?;
            if token == Token::ArrayEnd {
                return Ok(Object::Array(items));
            }
            items.push(self.object_from(token)?);
        }
    }

    fn parse_dict_body(&mut self) -> Result<Object> {
        let mut dict = Dict::new();
        loop {
            let token = self
                .next_token()
                .map_err(|_| Error::InvalidPdf("unterminated dictionary".to_string()))?;
            match token {
                Token::DictEnd => return Ok(Object::Dictionary(dict)),
                Token::Name(key) => {
                    let value = self.parse_object()?;
                    dict.insert(key, value);
                }
                _ => {
                    return Err(Error::InvalidPdf(format!(
                        "malformed dictionary at byte {}",
                        self.pos
                    )))
                }
            }
        }
    }
}

/// Decode the backslash escapes of a literal string token's raw bytes.
fn decode_literal_string(raw: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        i += 1;
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        let Some(&escaped) = raw.get(i) else { break };
        i += 1;
        match escaped {
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'b' => bytes.push(0x08),
            b'f' => bytes.push(0x0c),
            b'\r' => {
                // Line continuation; swallow a following LF too.
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'\n' => {}
            b'0'..=b'7' => {
                let mut value = (escaped - b'0') as u32;
                // Octal escapes run to at most three digits.
                for _ in 0..2 {
                    match raw.get(i) {
                        Some(&d) if (b'0'..=b'7').contains(&d) => {
                            value = value * 8 + (d - b'0') as u32;
                            i += 1;
                        }
                        _ => break,
                    }
                }
                bytes.push(value as u8);
            }
            other => bytes.push(other),
        }
    }
    bytes
}

/// Pair up the hex digits of a hex string token, padding an odd count.
fn decode_hex_nibbles(raw: &[u8]) -> Vec<u8> {
    let mut nibbles: Vec<u8> = raw
        .iter()
        .filter_map(|&b| match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        })
        .collect();
    if nibbles.len() % 2 == 1 {
        nibbles.push(0);
    }
    nibbles.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect()
}

/// Parse the indirect object starting at `offset` (`id gen obj ... endobj`).
///
/// Stream data is sliced using a direct `/Length` when present and verified
/// against the `endstream` keyword; an indirect or wrong length falls back to
/// scanning for `endstream`.
pub fn parse_indirect_at(data: &[u8], offset: usize) -> Result<(ObjectRef, Object)> {
    if offset >= data.len() {
        return Err(Error::InvalidPdf(format!("object offset {} beyond end of file", offset)));
    }
    let mut lexer = Lexer::new(data, offset);
    let id = lexer.parse_uint()? as u32;
    let gen = lexer.parse_uint()? as u16;
    lexer.expect(b"obj")?;
    let object = lexer.parse_object()?;

    if lexer.try_keyword(b"stream") {
        let dict = match object {
            Object::Dictionary(d) => d,
            _ => return Err(Error::InvalidPdf("stream keyword after non-dictionary".to_string())),
        };
        // EOL after the stream keyword: CRLF or LF.
        if lexer.peek() == Some(b'\r') {
            lexer.pos += 1;
        }
        if lexer.peek() == Some(b'\n') {
            lexer.pos += 1;
        }
        let data_start = lexer.pos;

        let mut data_end = None;
        if let Some(Object::Integer(len)) = dict.get("Length") {
            let end = data_start + *len as usize;
            if end <= data.len() {
                let mut check = Lexer::new(data, end);
                if check.try_keyword(b"endstream") {
                    lexer.pos = check.pos;
                    data_end = Some(end);
                }
            }
        }
        let data_end = match data_end {
            Some(end) => end,
            None => {
                // Indirect or untrustworthy /Length: scan for the keyword.
                let rel = find_subslice(&data[data_start..], b"endstream").ok_or_else(|| {
                    Error::InvalidPdf(format!("unterminated stream for object {}", id))
                })?;
                let mut end = data_start + rel;
                // Drop the EOL that precedes endstream.
                if end > data_start && data[end - 1] == b'\n' {
                    end -= 1;
                }
                if end > data_start && data[end - 1] == b'\r' {
                    end -= 1;
                }
                lexer.pos = data_start + rel + b"endstream".len();
                end
            }
        };
        let stream_data = data[data_start..data_end].to_vec();
        lexer.try_keyword(b"endobj");
        return Ok((
            ObjectRef::new(id, gen),
            Object::Stream {
                dict,
                data: stream_data,
            },
        ));
    }

    lexer.try_keyword(b"endobj");
    Ok((ObjectRef::new(id, gen), object))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn rfind_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

/// Decode a stream's data according to its /Filter entry.
///
/// Only FlateDecode (with optional PNG predictors) is supported; that is the
/// only filter xref and object streams use in practice.
pub fn decode_stream(dict: &Dict, data: &[u8]) -> Result<Vec<u8>> {
    let filters: Vec<&str> = match dict.get("Filter") {
        None => Vec::new(),
        Some(Object::Name(n)) => vec![n.as_str()],
        Some(Object::Array(items)) => items.iter().filter_map(|o| o.as_name()).collect(),
        Some(other) => {
            return Err(Error::InvalidPdf(format!(
                "unsupported /Filter value of type {}",
                other.type_name()
            )))
        }
    };

    let mut decoded = data.to_vec();
    for filter in filters {
        match filter {
            "FlateDecode" | "Fl" => {
                let mut inflated = Vec::new();
                ZlibDecoder::new(&decoded[..])
                    .read_to_end(&mut inflated)
                    .map_err(|e| Error::InvalidPdf(format!("FlateDecode failed: {}", e)))?;
                decoded = inflated;
            }
            other => {
                return Err(Error::InvalidPdf(format!("unsupported stream filter {}", other)))
            }
        }
    }

    if let Some(Object::Dictionary(parms)) = dict.get("DecodeParms") {
        let predictor = parms.get("Predictor").and_then(Object::as_integer).unwrap_or(1);
        if predictor >= 10 {
            let columns = parms.get("Columns").and_then(Object::as_integer).unwrap_or(1) as usize;
            let colors = parms.get("Colors").and_then(Object::as_integer).unwrap_or(1) as usize;
            let bpc = parms.get("BitsPerComponent").and_then(Object::as_integer).unwrap_or(8) as usize;
            let bytes_per_pixel = (colors * bpc + 7) / 8;
            decoded = apply_png_predictor(&decoded, columns * bytes_per_pixel, bytes_per_pixel)?;
        }
    }

    Ok(decoded)
}

/// Reverse PNG row filters (predictors 10-15).
fn apply_png_predictor(data: &[u8], row_len: usize, bpp: usize) -> Result<Vec<u8>> {
    if row_len == 0 {
        return Err(Error::InvalidPdf("predictor with zero columns".to_string()));
    }
    let stride = row_len + 1;
    let mut out: Vec<u8> = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_len];

    for chunk in data.chunks(stride) {
        if chunk.len() < 2 {
            break;
        }
        let filter = chunk[0];
        let row = &chunk[1..];
        let mut current = vec![0u8; row.len()];
        for i in 0..row.len() {
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let up = prev_row.get(i).copied().unwrap_or(0);
            let up_left = if i >= bpp { prev_row.get(i - bpp).copied().unwrap_or(0) } else { 0 };
            let raw = row[i];
            current[i] = match filter {
                0 => raw,
                1 => raw.wrapping_add(left),
                2 => raw.wrapping_add(up),
                3 => raw.wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => {
                    // Paeth
                    let p = left as i16 + up as i16 - up_left as i16;
                    let pa = (p - left as i16).abs();
                    let pb = (p - up as i16).abs();
                    let pc = (p - up_left as i16).abs();
                    let predictor = if pa <= pb && pa <= pc {
                        left
                    } else if pb <= pc {
                        up
                    } else {
                        up_left
                    };
                    raw.wrapping_add(predictor)
                }
                other => {
                    return Err(Error::InvalidPdf(format!("unknown PNG filter type {}", other)))
                }
            };
        }
        out.extend_from_slice(&current);
        prev_row.clear();
        prev_row.extend_from_slice(&current);
        prev_row.resize(row_len, 0);
    }
    Ok(out)
}

/// Walk the cross-reference chain starting from the trailing `startxref`.
pub fn read_xref(data: &[u8]) -> Result<XrefData> {
    let tail_start = data.len().saturating_sub(2048);
    let rel = rfind_subslice(&data[tail_start..], b"startxref")
        .ok_or_else(|| Error::InvalidPdf("startxref not found".to_string()))?;
    let mut lexer = Lexer::new(data, tail_start + rel + b"startxref".len());
    let start_offset = lexer.parse_uint()?;

    let mut entries = HashMap::new();
    let mut trailer = Dict::new();
    let mut uses_xref_stream = false;
    let mut first_section = true;

    let mut pending = vec![start_offset];
    let mut visited = HashSet::new();
    while let Some(offset) = pending.pop() {
        if !visited.insert(offset) {
            continue;
        }
        let mut section_lexer = Lexer::new(data, offset as usize);
        let section_trailer = if section_lexer.try_keyword(b"xref") {
            read_xref_table(&mut section_lexer, &mut entries)?
        } else {
            if first_section {
                uses_xref_stream = true;
            }
            read_xref_stream(data, offset as usize, &mut entries)?
        };
        first_section = false;

        // Hybrid files point at a parallel xref stream.
        if let Some(Object::Integer(xref_stm)) = section_trailer.get("XRefStm") {
            pending.push(*xref_stm as u64);
        }
        if let Some(Object::Integer(prev)) = section_trailer.get("Prev") {
            pending.push(*prev as u64);
        }
        // Newest-first traversal: only adopt keys we have not seen yet.
        for (key, value) in section_trailer {
            trailer.entry(key).or_insert(value);
        }
    }

    if !trailer.contains_key("Root") {
        return Err(Error::InvalidPdf("trailer has no /Root".to_string()));
    }

    Ok(XrefData {
        entries,
        trailer,
        start_offset,
        uses_xref_stream,
    })
}

fn read_xref_table(lexer: &mut Lexer<'_>, entries: &mut HashMap<u32, XrefEntry>) -> Result<Dict> {
    loop {
        if lexer.try_keyword(b"trailer") {
            break;
        }
        let start = lexer.parse_uint()? as u32;
        let count = lexer.parse_uint()? as u32;
        for i in 0..count {
            let offset = lexer.parse_uint()?;
            let _gen = lexer.parse_uint()?;
            lexer.skip_whitespace();
            let kind = lexer.peek().ok_or_else(|| {
                Error::InvalidPdf("truncated xref table".to_string())
            })?;
            lexer.pos += 1;
            let id = start + i;
            let entry = match kind {
                b'n' => XrefEntry::Offset(offset),
                b'f' => XrefEntry::Free,
                other => {
                    return Err(Error::InvalidPdf(format!(
                        "invalid xref entry type '{}'",
                        other as char
                    )))
                }
            };
            entries.entry(id).or_insert(entry);
        }
    }
    match lexer.parse_object()? {
        Object::Dictionary(d) => Ok(d),
        other => Err(Error::InvalidPdf(format!(
            "trailer is a {}, expected dictionary",
            other.type_name()
        ))),
    }
}

fn read_xref_stream(
    data: &[u8],
    offset: usize,
    entries: &mut HashMap<u32, XrefEntry>,
) -> Result<Dict> {
    let (_, object) = parse_indirect_at(data, offset)?;
    let (dict, raw) = match object {
        Object::Stream { dict, data } => (dict, data),
        _ => return Err(Error::InvalidPdf("xref offset does not point at a table or stream".to_string())),
    };
    if dict.get("Type").and_then(Object::as_name) != Some("XRef") {
        return Err(Error::InvalidPdf("xref stream missing /Type /XRef".to_string()));
    }

    let decoded = decode_stream(&dict, &raw)?;
    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .map(|arr| arr.iter().filter_map(Object::as_integer).map(|i| i as usize).collect())
        .ok_or_else(|| Error::InvalidPdf("xref stream missing /W".to_string()))?;
    if widths.len() != 3 {
        return Err(Error::InvalidPdf("xref stream /W must have 3 entries".to_string()));
    }
    let size = dict
        .get("Size")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("xref stream missing /Size".to_string()))?;
    let index: Vec<i64> = dict
        .get("Index")
        .and_then(Object::as_array)
        .map(|arr| arr.iter().filter_map(Object::as_integer).collect())
        .unwrap_or_else(|| vec![0, size]);

    let row_len: usize = widths.iter().sum();
    let mut rows = decoded.chunks(row_len);
    for pair in index.chunks(2) {
        let (start, count) = (pair[0] as u32, pair[1] as u32);
        for i in 0..count {
            let Some(row) = rows.next() else {
                return Err(Error::InvalidPdf("xref stream data shorter than /Index".to_string()));
            };
            if row.len() < row_len {
                return Err(Error::InvalidPdf("truncated xref stream row".to_string()));
            }
            let mut cursor = 0;
            let mut field = |width: usize| -> u64 {
                let mut value = 0u64;
                for &b in &row[cursor..cursor + width] {
                    value = (value << 8) | b as u64;
                }
                cursor += width;
                value
            };
            // A zero-width type field defaults to type 1.
            let kind = if widths[0] == 0 { 1 } else { field(widths[0]) };
            let second = field(widths[1]);
            let third = field(widths[2]);
            let id = start + i;
            let entry = match kind {
                0 => XrefEntry::Free,
                1 => XrefEntry::Offset(second),
                2 => XrefEntry::InStream {
                    stream_id: second as u32,
                    index: third as u32,
                },
                other => {
                    return Err(Error::InvalidPdf(format!("unknown xref entry type {}", other)))
                }
            };
            entries.entry(id).or_insert(entry);
        }
    }

    Ok(dict)
}

/// Extract all objects from an object stream (`/Type /ObjStm`).
pub fn parse_object_stream(dict: &Dict, raw: &[u8]) -> Result<Vec<(u32, Object)>> {
    let n = dict
        .get("N")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /N".to_string()))?;
    let first = dict
        .get("First")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /First".to_string()))? as usize;
    let decoded = decode_stream(dict, raw)?;

    let mut header = Lexer::new(&decoded, 0);
    let mut objects = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let id = header.parse_uint()? as u32;
        let offset = header.parse_uint()? as usize;
        let mut body = Lexer::new(&decoded, first + offset);
        objects.push((id, body.parse_object()?));
    }
    Ok(objects)
}

/// Move `cursor` backwards while the preceding byte matches, reporting
/// whether it moved at all.
fn skip_back(data: &[u8], cursor: &mut usize, pred: fn(u8) -> bool) -> bool {
    let mut any = false;
    while *cursor > 0 && pred(data[*cursor - 1]) {
        *cursor -= 1;
        any = true;
    }
    any
}

/// Rebuild the xref map by scanning the raw bytes for `id gen obj` headers.
///
/// Used when the xref chain is damaged. The last occurrence of an object
/// number wins, matching incremental-update semantics.
pub fn reconstruct_xref(data: &[u8]) -> Result<XrefData> {
    let mut entries: HashMap<u32, XrefEntry> = HashMap::new();
    let mut pos = 0;
    while let Some(rel) = find_subslice(&data[pos..], b"obj") {
        let obj_pos = pos + rel;
        pos = obj_pos + 3;
        // Walk backwards over "id gen " preceding the keyword.
        let mut cursor = obj_pos;
        if !skip_back(data, &mut cursor, is_whitespace) {
            continue;
        }
        if !skip_back(data, &mut cursor, |b| b.is_ascii_digit()) {
            continue;
        }
        if !skip_back(data, &mut cursor, is_whitespace) {
            continue;
        }
        let id_end = cursor;
        if !skip_back(data, &mut cursor, |b| b.is_ascii_digit()) {
            continue;
        }
        let id_start = cursor;
        let id: u32 = match std::str::from_utf8(&data[id_start..id_end]).ok().and_then(|s| s.parse().ok()) {
            Some(id) => id,
            None => continue,
        };
        entries.insert(id, XrefEntry::Offset(id_start as u64));
    }

    if entries.is_empty() {
        return Err(Error::InvalidPdf("no objects found during xref reconstruction".to_string()));
    }

    // Prefer the newest trailer dictionary if one survives.
    let mut trailer = Dict::new();
    if let Some(rel) = rfind_subslice(data, b"trailer") {
        let mut lexer = Lexer::new(data, rel + b"trailer".len());
        if let Ok(Object::Dictionary(d)) = lexer.parse_object() {
            trailer = d;
        }
    }
    if !trailer.contains_key("Root") {
        // Fall back to locating the catalog directly.
        let catalog = entries.iter().find_map(|(&id, &entry)| {
            let XrefEntry::Offset(offset) = entry else { return None };
            let (obj_ref, object) = parse_indirect_at(data, offset as usize).ok()?;
            let dict = object.as_dict()?;
            if dict.get("Type").and_then(Object::as_name) == Some("Catalog") {
                let _ = id;
                Some(obj_ref)
            } else {
                None
            }
        });
        match catalog {
            Some(obj_ref) => {
                trailer.insert("Root".to_string(), Object::Reference(obj_ref));
            }
            None => return Err(Error::InvalidPdf("no catalog found during xref reconstruction".to_string())),
        }
    }
    let max_id = entries.keys().copied().max().unwrap_or(0);
    trailer
        .entry("Size".to_string())
        .or_insert(Object::Integer(max_id as i64 + 1));

    Ok(XrefData {
        entries,
        trailer,
        start_offset: data.len() as u64,
        uses_xref_stream: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalars() {
        let mut lexer = Lexer::new(b" /Name 42 -7 3.14 true null (hi) <414243>", 0);
        assert_eq!(lexer.parse_object().unwrap(), Object::Name("Name".to_string()));
        assert_eq!(lexer.parse_object().unwrap(), Object::Integer(42));
        assert_eq!(lexer.parse_object().unwrap(), Object::Integer(-7));
        assert_eq!(lexer.parse_object().unwrap(), Object::Real(3.14));
        assert_eq!(lexer.parse_object().unwrap(), Object::Boolean(true));
        assert_eq!(lexer.parse_object().unwrap(), Object::Null);
        assert_eq!(lexer.parse_object().unwrap(), Object::String(b"hi".to_vec()));
        assert_eq!(lexer.parse_object().unwrap(), Object::HexString(b"ABC".to_vec()));
    }

    #[test]
    fn test_parse_reference_vs_integers() {
        let mut lexer = Lexer::new(b"[1 0 R 2 3]", 0);
        let Object::Array(items) = lexer.parse_object().unwrap() else {
            panic!("expected array");
        };
        assert_eq!(items[0], Object::Reference(ObjectRef::new(1, 0)));
        assert_eq!(items[1], Object::Integer(2));
        assert_eq!(items[2], Object::Integer(3));
    }

    #[test]
    fn test_parse_nested_dict() {
        let mut lexer = Lexer::new(b"<< /A << /B [1 2] >> /C (x) >>", 0);
        let Object::Dictionary(dict) = lexer.parse_object().unwrap() else {
            panic!("expected dictionary");
        };
        let inner = dict.get("A").and_then(Object::as_dict).unwrap();
        assert_eq!(inner.get("B").and_then(Object::as_array).unwrap().len(), 2);
        assert_eq!(dict.get("C").unwrap().as_string_bytes().unwrap(), b"x");
    }

    #[test]
    fn test_parse_indirect_stream() {
        let data = b"5 0 obj << /Length 4 >> stream\nWXYZ\nendstream endobj";
        let (obj_ref, object) = parse_indirect_at(data, 0).unwrap();
        assert_eq!(obj_ref, ObjectRef::new(5, 0));
        match object {
            Object::Stream { data, .. } => assert_eq!(data, b"WXYZ"),
            other => panic!("expected stream, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_stream_with_wrong_length_recovers() {
        let data = b"5 0 obj << /Length 99 >> stream\nWXYZ\nendstream endobj";
        let (_, object) = parse_indirect_at(data, 0).unwrap();
        match object {
            Object::Stream { data, .. } => assert_eq!(data, b"WXYZ"),
            other => panic!("expected stream, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_literal_string_escapes() {
        let mut lexer = Lexer::new(br"(a\(b\)\\c\101)", 0);
        assert_eq!(lexer.parse_object().unwrap(), Object::String(b"a(b)\\cA".to_vec()));
    }

    #[test]
    fn test_comments_are_skipped() {
        let mut lexer = Lexer::new(b"% a comment\n  7", 0);
        assert_eq!(lexer.parse_object().unwrap(), Object::Integer(7));
    }

    #[test]
    fn test_reconstruct_from_damaged_startxref() {
        let mut data = crate::pdf::build_minimal_pdf(1);
        // Point startxref past the end of the file; the chain walk fails and
        // reconstruction takes over.
        let pos = rfind_subslice(&data, b"startxref").unwrap();
        let tail = format!("startxref\n{}\n%%EOF\n", data.len() * 2);
        data.truncate(pos);
        data.extend_from_slice(tail.as_bytes());

        let xref = reconstruct_xref(&data).unwrap();
        assert!(xref.trailer.contains_key("Root"));
        assert!(!xref.entries.is_empty());
        let offsets: Vec<u64> = xref
            .entries
            .values()
            .filter_map(|e| match e {
                XrefEntry::Offset(o) => Some(*o),
                _ => None,
            })
            .collect();
        // Every recovered offset points at an object header.
        for offset in offsets {
            assert!(parse_indirect_at(&data, offset as usize).is_ok());
        }
    }
}
