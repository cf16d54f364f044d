//! The style sheet (`xl/styles.xml`), §4.6: `numFmts`/`cellXfs` plus an
//! on-demand parsed-format cache.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Read;
use std::rc::Rc;

use crate::error::Result;
use crate::format::{self, ParsedNumFormat};
use crate::xml::{Decoder, TagAttrs, Token};

/// `numFmts`/`cellXfs` from `styles.xml`, plus a lazily populated
/// `formatCode -> ParsedNumFormat` cache shared across every cell that uses
/// the same code (§3 "Style sheet").
pub struct StyleSheet {
    num_formats: HashMap<i64, String>,
    cell_xfs: Vec<i64>,
    cache: RefCell<HashMap<String, Rc<ParsedNumFormat>>>,
}

impl StyleSheet {
    /// An empty style sheet, used when `xl/styles.xml` is absent from the
    /// archive: every cell falls back to the built-in `general` format.
    pub fn empty() -> Self {
        StyleSheet { num_formats: HashMap::new(), cell_xfs: Vec::new(), cache: RefCell::new(HashMap::new()) }
    }

    /// Resolve a cell style index (`@s`) to its parsed number format,
    /// amortizing the parse across every cell sharing the same raw code. A
    /// style index out of range, or with no explicit `numFmtId`, resolves
    /// to the built-in `general` format (id 0).
    pub fn format_for_style(&self, style_index: usize) -> Rc<ParsedNumFormat> {
        let num_fmt_id = self.cell_xfs.get(style_index).copied().unwrap_or(0);
        self.format_for_id(num_fmt_id)
    }

    pub fn format_for_id(&self, num_fmt_id: i64) -> Rc<ParsedNumFormat> {
        let code = self.raw_code(num_fmt_id);
        if let Some(cached) = self.cache.borrow().get(code.as_ref()) {
            return cached.clone();
        }
        let parsed = Rc::new(format::parse_full_number_format_string(code.as_ref()));
        self.cache.borrow_mut().insert(code.into_owned(), parsed.clone());
        parsed
    }

    fn raw_code(&self, num_fmt_id: i64) -> std::borrow::Cow<'_, str> {
        if let Some(custom) = self.num_formats.get(&num_fmt_id) {
            return std::borrow::Cow::Borrowed(custom.as_str());
        }
        std::borrow::Cow::Borrowed(format::builtin_num_format(num_fmt_id).unwrap_or("general"))
    }
}

/// Parse `xl/styles.xml`. Only `<numFmts><numFmt>` and `<cellXfs><xf>` are
/// consulted; everything else (fonts, fills, borders, `cellStyleXfs`) is
/// skipped wholesale by the attribute filter.
pub fn read_styles<R: Read>(reader: R) -> Result<StyleSheet> {
    let filter = vec![
        TagAttrs { element: "numFmt", attrs: &["numFmtId", "formatCode"] },
        TagAttrs { element: "xf", attrs: &["numFmtId"] },
    ];
    let mut decoder = Decoder::new(reader, filter);

    let mut num_formats = HashMap::new();
    let mut cell_xfs = Vec::new();
    let mut in_cell_xfs = false;

    while let Some(token) = decoder.next_token()? {
        match token {
            Token::StartElement(start) => match &*start.name.local {
                "cellXfs" => in_cell_xfs = true,
                "numFmt" => {
                    let id: i64 = start.attr("numFmtId").and_then(|v| v.parse().ok()).unwrap_or(0);
                    let code = start.attr("formatCode").unwrap_or("general").to_string();
                    num_formats.insert(id, code);
                }
                "xf" if in_cell_xfs => {
                    let id: i64 = start.attr("numFmtId").and_then(|v| v.parse().ok()).unwrap_or(0);
                    cell_xfs.push(id);
                }
                _ => {}
            },
            Token::EndElement(end) => {
                if &*end.name.local == "cellXfs" {
                    in_cell_xfs = false;
                }
            }
            _ => {}
        }
    }

    Ok(StyleSheet { num_formats, cell_xfs, cache: RefCell::new(HashMap::new()) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(xml: &str) -> StyleSheet {
        read_styles(Cursor::new(xml.as_bytes().to_vec())).unwrap()
    }

    #[test]
    fn builtin_ids_need_no_num_fmts_entry() {
        let s = parse(r#"<styleSheet><cellXfs><xf numFmtId="14"/></cellXfs></styleSheet>"#);
        assert!(s.format_for_style(0).is_time_format);
    }

    #[test]
    fn custom_ids_come_from_num_fmts() {
        let s = parse(
            r#"<styleSheet>
                <numFmts><numFmt numFmtId="164" formatCode="0.000"/></numFmts>
                <cellXfs><xf numFmtId="164"/></cellXfs>
            </styleSheet>"#,
        );
        assert_eq!(s.format_for_style(0).positive_format.reduced_format_string, "0.000");
    }

    #[test]
    fn out_of_range_style_index_falls_back_to_general() {
        let s = parse(r#"<styleSheet><cellXfs><xf numFmtId="0"/></cellXfs></styleSheet>"#);
        assert_eq!(s.format_for_style(99).positive_format.reduced_format_string, "general");
    }

    #[test]
    fn cell_style_xfs_are_not_confused_with_cell_xfs() {
        let s = parse(
            r#"<styleSheet>
                <cellStyleXfs><xf numFmtId="14"/></cellStyleXfs>
                <cellXfs><xf numFmtId="0"/></cellXfs>
            </styleSheet>"#,
        );
        assert!(!s.format_for_style(0).is_time_format);
    }

    #[test]
    fn parsed_format_cache_is_shared_across_identical_codes() {
        let s = parse(
            r#"<styleSheet>
                <numFmts><numFmt numFmtId="164" formatCode="0.000"/></numFmts>
                <cellXfs><xf numFmtId="164"/><xf numFmtId="164"/></cellXfs>
            </styleSheet>"#,
        );
        let a = s.format_for_style(0);
        let b = s.format_for_style(1);
        assert!(Rc::ptr_eq(&a, &b));
    }
}
