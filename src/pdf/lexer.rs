//! PDF tokenizer.
//!
//! nom combinators over raw bytes. Tokens are the atomic units of PDF
//! syntax; `parser` assembles them into objects. String tokens carry raw
//! bytes (escape sequences undecoded); name tokens have their `#XX` escapes
//! decoded here, per the format's name rules.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    sequence::{delimited, preceded},
    IResult,
};

/// Token types recognized by the tokenizer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g. 42, -123)
    Integer(i64),
    /// Real number (e.g. 3.14, -.002)
    Real(f64),
    /// Content of a `(...)` string, escapes not yet decoded
    LiteralString(&'a [u8]),
    /// Content of a `<...>` string, whitespace preserved
    HexString(&'a [u8]),
    /// Name with `#XX` escapes decoded (e.g. "Type" from "/Type")
    Name(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// Reference marker `R`
    R,
}

/// Whitespace per the format: space, tab, CR, LF, NUL, form feed.
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0c)
}

/// Delimiter characters that terminate regular tokens.
pub fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Any byte that can appear inside a name or keyword.
pub fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

fn fail<T>(input: &[u8], kind: nom::error::ErrorKind) -> IResult<&[u8], T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

/// At least one whitespace character.
fn whitespace(input: &[u8]) -> IResult<&[u8], ()> {
    let (remaining, ws) = take_while(is_whitespace)(input)?;
    if ws.is_empty() {
        return fail(input, nom::error::ErrorKind::Space);
    }
    Ok((remaining, ()))
}

/// A `%` comment running to end of line.
fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip any amount of whitespace and comments.
pub fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut remaining = input;
    loop {
        if let Ok((rest, _)) = whitespace(remaining) {
            remaining = rest;
            continue;
        }
        if let Ok((rest, _)) = comment(remaining) {
            remaining = rest;
            continue;
        }
        return Ok((remaining, ()));
    }
}

/// A bare keyword (`obj`, `endstream`, `xref`, ...) that must not run into
/// a longer regular token.
pub fn keyword<'k>(kw: &'k [u8]) -> impl FnMut(&[u8]) -> IResult<&[u8], ()> + 'k {
    move |input| {
        let (remaining, _) = tag(kw)(input)?;
        if remaining.first().map_or(false, |&b| is_regular(b)) {
            return fail(input, nom::error::ErrorKind::Tag);
        }
        Ok((remaining, ()))
    }
}

/// Integer or real, with optional sign and a leading or trailing dot.
fn number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, sign) = opt(one_of("+-"))(input)?;
    let (rest, int_part) = opt(digit1)(rest)?;
    let (rest, frac_part) = opt(preceded(char('.'), opt(digit1)))(rest)?;
    if int_part.is_none() && frac_part.is_none() {
        return fail(input, nom::error::ErrorKind::Digit);
    }

    let negative = sign == Some('-');
    if let Some(frac) = frac_part {
        let mut text = String::new();
        if negative {
            text.push('-');
        }
        text.push_str(int_part.map(as_ascii).unwrap_or("0"));
        text.push('.');
        text.push_str(frac.map(as_ascii).unwrap_or("0"));
        match text.parse::<f64>() {
            Ok(n) => Ok((rest, Token::Real(n))),
            Err(_) => fail(input, nom::error::ErrorKind::Digit),
        }
    } else {
        let digits = int_part.map(as_ascii).unwrap_or("");
        match digits.parse::<i64>() {
            Ok(n) => Ok((rest, Token::Integer(if negative { -n } else { n }))),
            Err(_) => fail(input, nom::error::ErrorKind::Digit),
        }
    }
}

fn as_ascii(bytes: &[u8]) -> &str {
    // digit1 only yields ASCII digits.
    std::str::from_utf8(bytes).unwrap_or("")
}

/// A literal string in balanced parentheses. Backslash escapes are skipped
/// but not decoded; the raw content between the outer parens is returned.
fn literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0;
    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            }
            b')' => {
                depth -= 1;
                pos += 1;
            }
            _ => pos += 1,
        }
    }
    if depth != 0 || pos > remaining.len() {
        return fail(input, nom::error::ErrorKind::Tag);
    }
    Ok((&remaining[pos..], Token::LiteralString(&remaining[..pos - 1])))
}

/// A hex string in angle brackets. `<<` is a dictionary, not a string.
fn hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return fail(input, nom::error::ErrorKind::Tag);
    }
    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode `#XX` escapes in a name; malformed escapes stay literal.
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' {
            if let Some(hex) = raw.get(i + 1..i + 3) {
                if let Ok(code) = u8::from_str_radix(&String::from_utf8_lossy(hex), 16) {
                    result.push(code as char);
                    i += 3;
                    continue;
                }
            }
        }
        result.push(raw[i] as char);
        i += 1;
    }
    result
}

/// A `/Name` token.
fn name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(take_while(is_regular), |bytes| {
            Token::Name(decode_name_escapes(bytes))
        }),
    )(input)
}

/// Reserved words and bracket delimiters. Multi-character forms come first
/// so `<<` is not read as a hex string opener and `endstream` not as
/// `endobj`'s neighbor `stream`.
fn keyword_token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::False, keyword(b"false")),
        value(Token::True, keyword(b"true")),
        value(Token::Null, keyword(b"null")),
        value(Token::R, keyword(b"R")),
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
    ))(input)
}

/// Parse the next token, skipping leading whitespace and comments.
///
/// Keywords are tried before names and numbers; `<<` before `<`.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;
    alt((keyword_token, name, number, literal_string, hex_string))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers() {
        assert_eq!(token(b"42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"-123"), Ok((&b""[..], Token::Integer(-123))));
        assert_eq!(token(b"3.14"), Ok((&b""[..], Token::Real(3.14))));
        assert_eq!(token(b"-.002"), Ok((&b""[..], Token::Real(-0.002))));
        assert_eq!(token(b"5."), Ok((&b""[..], Token::Real(5.0))));
    }

    #[test]
    fn test_strings_are_raw() {
        assert_eq!(
            token(b"(Hello (nested) \\) end)"),
            Ok((&b""[..], Token::LiteralString(b"Hello (nested) \\) end")))
        );
        assert_eq!(
            token(b"<48 65 6C>"),
            Ok((&b""[..], Token::HexString(b"48 65 6C")))
        );
    }

    #[test]
    fn test_names_decode_hash_escapes() {
        assert_eq!(token(b"/Type"), Ok((&b""[..], Token::Name("Type".to_string()))));
        assert_eq!(token(b"/A#20B"), Ok((&b""[..], Token::Name("A B".to_string()))));
        assert_eq!(token(b"/A#ZZ"), Ok((&b""[..], Token::Name("A#ZZ".to_string()))));
    }

    #[test]
    fn test_dict_start_is_not_a_hex_string() {
        assert_eq!(token(b"<<"), Ok((&b""[..], Token::DictStart)));
        assert_eq!(token(b"<ABC>"), Ok((&b""[..], Token::HexString(b"ABC"))));
    }

    #[test]
    fn test_keyword_boundary() {
        let mut obj = keyword(b"obj");
        assert!(obj(b"obj <<").is_ok());
        assert!(obj(b"objection").is_err());
    }

    #[test]
    fn test_whitespace_and_comments_skipped() {
        assert_eq!(
            token(b"  % header\n\t7"),
            Ok((&b""[..], Token::Integer(7)))
        );
    }

    #[test]
    fn test_indirect_header_token_stream() {
        let mut input: &[u8] = b"1 0 obj << /Type /Catalog >>";
        let mut toks = Vec::new();
        while let Ok((rest, tok)) = token(input) {
            toks.push(tok);
            input = rest;
        }
        // "obj" is not a value token; the stream stops before it.
        assert_eq!(toks, vec![Token::Integer(1), Token::Integer(0)]);
        let (rest, _) = skip_ws(input).unwrap();
        assert!(rest.starts_with(b"obj"));
    }
}
