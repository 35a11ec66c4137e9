//! PDF object types and serialization.
//!
//! A compact object model covering everything the signing and verification
//! paths touch: the eight basic PDF types plus streams and indirect
//! references. Dictionaries use `BTreeMap` so serialized revisions are
//! byte-stable for a given input.

use std::collections::BTreeMap;

/// Dictionary type used throughout the PDF layer.
pub type Dict = BTreeMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// Literal string (byte array), serialized in parentheses
    String(Vec<u8>),
    /// Hex string, serialized in angle brackets
    HexString(Vec<u8>),
    /// Name (starting with /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dict),
    /// Stream (dictionary + raw data)
    Stream {
        /// Stream dictionary
        dict: Dict,
        /// Stream data as stored in the file
        data: Vec<u8>,
    },
    /// Indirect object reference
    Reference(ObjectRef),
    /// Pre-rendered bytes emitted verbatim. Used for values whose byte width
    /// must stay fixed so they can be patched in place after serialization
    /// (the ByteRange array of a signature dictionary).
    Raw(Vec<u8>),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl Object {
    /// Human-readable type name, without data.
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::HexString(_) => "HexString",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
            Object::Raw(_) => "Raw",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to string bytes (literal or hex).
    pub fn as_string_bytes(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) | Object::HexString(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Serialize this object into `out` using standard PDF syntax.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Object::Null => out.extend_from_slice(b"null"),
            Object::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => {
                // Trim trailing zeros the way most writers do.
                let s = format!("{:.4}", r);
                let s = s.trim_end_matches('0').trim_end_matches('.');
                out.extend_from_slice(s.as_bytes());
            }
            Object::String(s) => {
                out.push(b'(');
                for &byte in s {
                    match byte {
                        b'(' => out.extend_from_slice(b"\\("),
                        b')' => out.extend_from_slice(b"\\)"),
                        b'\\' => out.extend_from_slice(b"\\\\"),
                        b'\n' => out.extend_from_slice(b"\\n"),
                        b'\r' => out.extend_from_slice(b"\\r"),
                        b'\t' => out.extend_from_slice(b"\\t"),
                        _ => out.push(byte),
                    }
                }
                out.push(b')');
            }
            Object::HexString(s) => {
                out.push(b'<');
                for &byte in s {
                    out.extend_from_slice(format!("{:02X}", byte).as_bytes());
                }
                out.push(b'>');
            }
            Object::Name(n) => {
                out.push(b'/');
                out.extend_from_slice(n.as_bytes());
            }
            Object::Array(items) => {
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    item.write_to(out);
                }
                out.push(b']');
            }
            Object::Dictionary(dict) => write_dict(dict, out),
            Object::Stream { dict, data } => {
                write_dict(dict, out);
                out.extend_from_slice(b"\nstream\n");
                out.extend_from_slice(data);
                out.extend_from_slice(b"\nendstream");
            }
            Object::Reference(r) => {
                out.extend_from_slice(format!("{} {} R", r.id, r.gen).as_bytes());
            }
            Object::Raw(bytes) => out.extend_from_slice(bytes),
        }
    }
}

fn write_dict(dict: &Dict, out: &mut Vec<u8>) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict {
        out.push(b'/');
        out.extend_from_slice(key.as_bytes());
        out.push(b' ');
        value.write_to(out);
        out.push(b' ');
    }
    out.extend_from_slice(b">>");
}

/// Convenience constructor for a dictionary from key/value pairs.
pub fn dict(entries: Vec<(&str, Object)>) -> Dict {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(obj: &Object) -> String {
        let mut out = Vec::new();
        obj.write_to(&mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_scalar_serialization() {
        assert_eq!(render(&Object::Null), "null");
        assert_eq!(render(&Object::Boolean(true)), "true");
        assert_eq!(render(&Object::Integer(-42)), "-42");
        assert_eq!(render(&Object::Real(1.5)), "1.5");
        assert_eq!(render(&Object::Name("Sig".to_string())), "/Sig");
        assert_eq!(render(&Object::Reference(ObjectRef::new(7, 0))), "7 0 R");
    }

    #[test]
    fn test_string_escaping() {
        let obj = Object::String(b"a(b)c\\d".to_vec());
        assert_eq!(render(&obj), "(a\\(b\\)c\\\\d)");
    }

    #[test]
    fn test_hex_string() {
        let obj = Object::HexString(vec![0xAB, 0x01]);
        assert_eq!(render(&obj), "<AB01>");
    }

    #[test]
    fn test_dict_and_array() {
        let obj = Object::Dictionary(dict(vec![
            ("Type", Object::Name("Sig".to_string())),
            ("ByteRange", Object::Array(vec![Object::Integer(0), Object::Integer(100)])),
        ]));
        let rendered = render(&obj);
        assert!(rendered.starts_with("<<"));
        assert!(rendered.contains("/Type /Sig"));
        assert!(rendered.contains("/ByteRange [0 100]"));
    }

    #[test]
    fn test_stream_serialization() {
        let obj = Object::Stream {
            dict: dict(vec![("Length", Object::Integer(4))]),
            data: b"ABCD".to_vec(),
        };
        let rendered = render(&obj);
        assert!(rendered.contains("stream\nABCD\nendstream"));
    }

    #[test]
    fn test_raw_passthrough() {
        let obj = Object::Raw(b"[0 0000000000 0000000000 0000000000]".to_vec());
        assert_eq!(render(&obj), "[0 0000000000 0000000000 0000000000]");
    }
}
