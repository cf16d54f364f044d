//! The shared-strings table (`xl/sharedStrings.xml`), §4.5.

use std::io::Read;
use std::rc::Rc;

use crate::arena::Arena;
use crate::error::{Result, XlsxError};
use crate::xml::{Decoder, TagAttrs, Token};

/// All distinct strings referenced by `<c t="s">` cells, in file order.
pub struct SharedStrings {
    table: Vec<Rc<str>>,
}

impl SharedStrings {
    /// The table used when `xl/sharedStrings.xml` is absent from the
    /// archive (legal per §6 — the part is optional).
    pub fn empty() -> Self {
        SharedStrings { table: Vec::new() }
    }

    pub fn get(&self, idx: i64) -> Result<&str> {
        if idx < 0 || idx as usize >= self.table.len() {
            return Err(XlsxError::IncorrectSharedString { index: idx, len: self.table.len() });
        }
        Ok(&self.table[idx as usize])
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Parse `xl/sharedStrings.xml`. Every piece of `<t>` text inside an `<si>`
/// is concatenated in document order, regardless of whether it sits inside
/// a rich-text `<r>` run — unlike the Go original, which only accumulates
/// text found inside `<r>` and otherwise clobbers the running string with
/// the most recent `<t>` alone, silently dropping any plain leading text.
pub fn read_shared_strings<R: Read>(reader: R) -> Result<SharedStrings> {
    let filter = vec![TagAttrs { element: "sst", attrs: &["uniqueCount", "count"] }];
    let mut decoder = Decoder::new(reader, filter);
    let mut arena = Arena::new();

    let mut table: Vec<Rc<str>> = Vec::new();
    let mut in_t = false;
    let mut current = String::new();

    while let Some(token) = decoder.next_token()? {
        match token {
            Token::StartElement(start) => match &*start.name.local {
                "si" => current.clear(),
                "t" => in_t = true,
                "sst" => {
                    let unique_count: usize =
                        start.attr("uniqueCount").and_then(|v| v.parse().ok()).unwrap_or(0);
                    let count: usize =
                        start.attr("count").and_then(|v| v.parse().ok()).unwrap_or(0);
                    let capacity = if unique_count != 0 { unique_count } else { count };
                    table = Vec::with_capacity(capacity);
                }
                _ => {}
            },
            Token::EndElement(end) => match &*end.name.local {
                "si" => table.push(arena.intern(&current)),
                "t" => in_t = false,
                _ => {}
            },
            Token::CharData(data) => {
                if in_t {
                    current.push_str(std::str::from_utf8(data).unwrap_or(""));
                }
            }
            _ => {}
        }
    }

    Ok(SharedStrings { table })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(xml: &str) -> SharedStrings {
        read_shared_strings(Cursor::new(xml.as_bytes().to_vec())).unwrap()
    }

    #[test]
    fn plain_strings() {
        let s = parse(
            r#"<sst count="2" uniqueCount="2"><si><t>hello</t></si><si><t>world</t></si></sst>"#,
        );
        assert_eq!(s.get(0).unwrap(), "hello");
        assert_eq!(s.get(1).unwrap(), "world");
    }

    #[test]
    fn rich_text_runs_concatenate_instead_of_clobbering() {
        let s = parse(
            r#"<sst><si><r><t>foo</t></r><r><t>bar</t></r></si></sst>"#,
        );
        assert_eq!(s.get(0).unwrap(), "foobar");
    }

    #[test]
    fn mixed_plain_and_rich_runs_keep_the_plain_prefix() {
        let s = parse(r#"<sst><si><t>lead-</t><r><t>in</t></r></si></sst>"#);
        assert_eq!(s.get(0).unwrap(), "lead-in");
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let s = parse(r#"<sst><si><t>only</t></si></sst>"#);
        assert!(matches!(s.get(1), Err(XlsxError::IncorrectSharedString { index: 1, len: 1 })));
        assert!(matches!(s.get(-1), Err(XlsxError::IncorrectSharedString { .. })));
    }

    #[test]
    fn capacity_hint_prefers_unique_count() {
        let s = parse(r#"<sst count="50" uniqueCount="2"><si><t>a</t></si><si><t>b</t></si></sst>"#);
        assert_eq!(s.len(), 2);
    }
}
