//! Page-specification resolution.
//!
//! Grammar, case-insensitive: `A` (all pages), `F` (first), `L` (last), or a
//! comma list of positive integers, `F`/`L` tokens, and `start-end` ranges.
//! `A` is only legal on its own. The result is 1-based, deduplicated, and
//! ascending.

use crate::error::{Error, Result};

fn invalid(detail: impl Into<String>) -> Error {
    Error::InvalidPageSpecification(detail.into())
}

/// Resolve one token to a page number.
fn resolve_token(token: &str, total_pages: usize) -> Result<usize> {
    match token {
        "F" => Ok(1),
        "L" => Ok(total_pages),
        "A" => Err(invalid("'A' cannot appear inside a list or range")),
        _ => {
            let page: usize = token
                .parse()
                .map_err(|_| invalid(format!("invalid page token '{}'", token)))?;
            if page == 0 || page > total_pages {
                return Err(invalid(format!(
                    "page {} out of range (document has {} pages)",
                    page, total_pages
                )));
            }
            Ok(page)
        }
    }
}

/// Resolve a page spec against a document's page count.
pub fn resolve_pages(spec: &str, total_pages: usize) -> Result<Vec<usize>> {
    if total_pages == 0 {
        return Err(invalid("document has no pages"));
    }
    let spec = spec.trim().to_ascii_uppercase();
    if spec.is_empty() {
        return Err(invalid("page specification cannot be empty"));
    }

    match spec.as_str() {
        "A" => return Ok((1..=total_pages).collect()),
        "F" => return Ok(vec![1]),
        "L" => return Ok(vec![total_pages]),
        _ => {}
    }

    let mut pages = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(invalid("empty entry in page list"));
        }
        match part.split_once('-') {
            Some((start_tok, end_tok)) => {
                let start = resolve_token(start_tok.trim(), total_pages)?;
                let end = resolve_token(end_tok.trim(), total_pages)?;
                if start > end {
                    return Err(invalid(format!(
                        "range '{}' runs backwards ({} > {})",
                        part, start, end
                    )));
                }
                pages.extend(start..=end);
            }
            None => pages.push(resolve_token(part, total_pages)?),
        }
    }

    pages.sort_unstable();
    pages.dedup();
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_letters() {
        assert_eq!(resolve_pages("A", 5).unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(resolve_pages("F", 5).unwrap(), vec![1]);
        assert_eq!(resolve_pages("L", 5).unwrap(), vec![5]);
        assert_eq!(resolve_pages("l", 3).unwrap(), vec![3]);
    }

    #[test]
    fn test_lists_and_ranges() {
        assert_eq!(resolve_pages("1-3,5", 6).unwrap(), vec![1, 2, 3, 5]);
        assert_eq!(resolve_pages("F-L", 4).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(resolve_pages("3,1,2", 5).unwrap(), vec![1, 2, 3]);
        assert_eq!(resolve_pages("2,2,2", 5).unwrap(), vec![2]);
        assert_eq!(resolve_pages("f,l", 7).unwrap(), vec![1, 7]);
    }

    #[test]
    fn test_a_rejected_inside_lists() {
        assert!(resolve_pages("A,2", 5).is_err());
        assert!(resolve_pages("1-A", 5).is_err());
    }

    #[test]
    fn test_backwards_range_rejected() {
        let err = resolve_pages("3-1", 5).unwrap_err();
        assert!(matches!(err, Error::InvalidPageSpecification(_)));
        assert!(err.to_string().contains("3-1"));
    }

    #[test]
    fn test_out_of_range_names_the_token() {
        let err = resolve_pages("7", 5).unwrap_err();
        assert!(err.to_string().contains('7'));
        assert!(resolve_pages("0", 5).is_err());
        assert!(resolve_pages("1,9", 5).is_err());
    }

    #[test]
    fn test_blank_input_rejected() {
        assert!(resolve_pages("", 5).is_err());
        assert!(resolve_pages("   ", 5).is_err());
        assert!(resolve_pages("1,,2", 5).is_err());
    }

    #[test]
    fn test_single_page_document() {
        assert_eq!(resolve_pages("A", 1).unwrap(), vec![1]);
        assert_eq!(resolve_pages("F-L", 1).unwrap(), vec![1]);
    }
}
