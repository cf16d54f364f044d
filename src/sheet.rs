//! The worksheet cursor (§4.8): a pull-style row/cell state machine over
//! one `<sheetData>` stream.

use std::io::Read;
use std::rc::Rc;

use crate::column::column_index;
use crate::error::{Result, XlsxError};
use crate::shared_strings::SharedStrings;
use crate::styles::StyleSheet;
use crate::types::CellType;
use crate::xml::{Decoder, TagAttrs, Token};

/// What comes after the `</row>` we just consumed: either another row
/// (already peeked, its start tag already consumed) or the end of
/// `<sheetData>`. `None` means "not yet peeked" — the cursor is still
/// positioned mid-row, or hasn't started.
enum NextRow {
    Row(i64),
    End,
}

/// A pull cursor over one worksheet part. Walks `<sheetData>` -> `<row>` ->
/// `<c>` -> `<v>|<is><t>`, surfacing one row and one cell at a time.
pub struct Sheet<R> {
    decoder: Decoder<R>,
    shared_strings: Rc<SharedStrings>,
    styles: Rc<StyleSheet>,
    date1904: bool,

    started: bool,
    row_active: bool,
    pending: Option<NextRow>,

    row: i64,
    col: i64,
    cell_type: CellType,
    cell_style: usize,
    value: String,

    err: Option<XlsxError>,
    format_warning: Option<XlsxError>,
}

impl<R: Read> Sheet<R> {
    pub(crate) fn new(
        reader: R,
        shared_strings: Rc<SharedStrings>,
        styles: Rc<StyleSheet>,
        date1904: bool,
    ) -> Self {
        let filter = vec![
            TagAttrs { element: "row", attrs: &["r"] },
            TagAttrs { element: "c", attrs: &["t", "s", "r"] },
        ];
        Sheet {
            decoder: Decoder::new(reader, filter),
            shared_strings,
            styles,
            date1904,
            started: false,
            row_active: false,
            pending: None,
            row: -1,
            col: -1,
            cell_type: CellType::Numeric,
            cell_style: 0,
            value: String::new(),
            err: None,
            format_warning: None,
        }
    }

    /// Zero-based index of the row last returned by [`next_row`](Self::next_row).
    pub fn row(&self) -> i64 {
        self.row
    }

    /// Zero-based index of the column last returned by [`next_cell`](Self::next_cell).
    pub fn col(&self) -> i64 {
        self.col
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// The last error observed, or `XlsxError::Eof` after normal
    /// exhaustion. `None` before any error or EOF has occurred.
    pub fn err(&self) -> Option<&XlsxError> {
        self.err.as_ref()
    }

    /// A non-latching format-parse warning from the most recent
    /// `cell_format_value` call, if the cell's style's format code failed to
    /// parse and fell back to `general` (§9 "format engine fallback"; see
    /// DESIGN.md Open Question 4 — kept out of `err()` so one bad format
    /// doesn't make the whole cursor look terminal).
    pub fn last_format_warning(&self) -> Option<&XlsxError> {
        self.format_warning.as_ref()
    }

    fn latch<T>(&mut self, e: XlsxError) -> Option<T> {
        self.err = Some(e.sticky_clone());
        None
    }

    /// Advance to the next row. Returns `false` on error or normal
    /// exhaustion (check [`err`](Self::err) to tell them apart).
    pub fn next_row(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }
        if let Err(e) = self.reach_row_boundary() {
            self.err = Some(e.sticky_clone());
            return false;
        }
        match self.pending.take() {
            Some(NextRow::Row(r)) => {
                self.row = r;
                self.col = -1;
                self.row_active = true;
                true
            }
            Some(NextRow::End) | None => {
                self.err = Some(XlsxError::Eof);
                false
            }
        }
    }

    /// Advance to the next cell in the current row. Returns `false` at the
    /// end of the row or on error.
    pub fn next_cell(&mut self) -> bool {
        if self.err.is_some() || !self.row_active {
            return false;
        }
        match self.advance_cell() {
            Ok(true) => true,
            Ok(false) => {
                self.row_active = false;
                false
            }
            Err(e) => {
                self.err = Some(e.sticky_clone());
                false
            }
        }
    }

    /// Forward past the current row, consuming all remaining cells.
    pub fn skip_row(&mut self) -> Result<()> {
        if let Some(e) = &self.err {
            return Err(e.sticky_clone());
        }
        if self.row_active {
            self.drain_row()?;
            self.row_active = false;
        }
        Ok(())
    }

    /// Raw cell value: shared-string text resolved for `string` cells,
    /// literal text for everything else.
    pub fn cell_value(&self) -> Result<String> {
        if let Some(e) = &self.err {
            return Err(e.sticky_clone());
        }
        match self.cell_type {
            CellType::String => {
                let idx: i64 = self
                    .value
                    .trim()
                    .parse()
                    .map_err(|_| XlsxError::IncorrectSheet(format!("bad shared-string index {:?}", self.value)))?;
                Ok(self.shared_strings.get(idx)?.to_string())
            }
            _ => Ok(self.value.clone()),
        }
    }

    pub fn cell_float(&self) -> Result<f64> {
        let raw = self.cell_value()?;
        Ok(raw.trim().parse()?)
    }

    pub fn cell_int(&self) -> Result<i64> {
        let raw = self.cell_value()?;
        Ok(raw.trim().parse()?)
    }

    pub fn cell_time(&self) -> Result<chrono::NaiveDateTime> {
        let serial = self.cell_float()?;
        Ok(crate::date::excel_serial_to_timestamp(serial, self.date1904))
    }

    /// Apply the cell's style's parsed number format. `bool` cells render as
    /// `"TRUE"`/`"FALSE"`; any other raw boolean payload is `InvalidBool`.
    pub fn cell_format_value(&mut self) -> Result<String> {
        if let Some(e) = &self.err {
            return Err(e.sticky_clone());
        }
        self.format_warning = None;

        if self.cell_type == CellType::Bool {
            return match self.value.as_str() {
                "1" => Ok("TRUE".to_string()),
                "0" => Ok("FALSE".to_string()),
                other => Err(XlsxError::InvalidBool(other.to_string())),
            };
        }

        let parsed = self.styles.format_for_style(self.cell_style);
        if let Some(err) = &parsed.parse_encountered_error {
            self.format_warning = Some(err.sticky_clone());
        }

        match self.cell_type {
            CellType::String | CellType::Inline | CellType::FormulaString => {
                let text = self.cell_value()?;
                parsed.text(&text)
            }
            // §3: a `date`-typed cell's raw value is literal ISO-8601-ish text, not an
            // Excel serial number, so it passes straight through rather than `parsed.numeric`.
            CellType::Error | CellType::Date => Ok(self.value.clone()),
            CellType::Numeric => parsed.numeric(&self.value, self.date1904),
        }
    }

    // -- internal state machine -------------------------------------------------

    fn reach_row_boundary(&mut self) -> Result<()> {
        if !self.started {
            self.started = true;
            if !self.locate_sheet_data()? {
                self.pending = Some(NextRow::End);
                return Ok(());
            }
        } else if self.row_active {
            self.drain_row()?;
            self.row_active = false;
        }
        if self.pending.is_none() {
            self.pending = Some(self.peek_row_or_end()?);
        }
        Ok(())
    }

    /// Skip tokens until `<sheetData>`'s start tag. Returns `false` if the
    /// stream ends first (an entirely empty/malformed worksheet part).
    fn locate_sheet_data(&mut self) -> Result<bool> {
        while let Some(token) = self.decoder.next_token()? {
            if let Token::StartElement(start) = token {
                if &*start.name.local == "sheetData" {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Called right after `<sheetData>`'s start tag, or right after a
    /// `</row>`: read one token expecting either a fresh `<row>` (whose
    /// start tag is consumed here) or `</sheetData>`.
    fn peek_row_or_end(&mut self) -> Result<NextRow> {
        loop {
            match self.decoder.next_token()? {
                Some(Token::StartElement(start)) if &*start.name.local == "row" => {
                    let r: i64 = start
                        .attr("r")
                        .ok_or(XlsxError::RowMissingR)?
                        .parse()
                        .map_err(|_| XlsxError::RowMissingR)?;
                    return Ok(NextRow::Row(r - 1));
                }
                Some(Token::EndElement(end)) if &*end.name.local == "sheetData" => {
                    return Ok(NextRow::End)
                }
                Some(_) => continue,
                None => return Ok(NextRow::End),
            }
        }
    }

    /// Consume whatever cells remain in the current row, stopping at
    /// `</row>`.
    fn drain_row(&mut self) -> Result<()> {
        loop {
            match self.decoder.next_token()? {
                Some(Token::StartElement(start)) if &*start.name.local == "c" => {
                    self.decoder.skip()?;
                }
                Some(Token::EndElement(end)) if &*end.name.local == "row" => return Ok(()),
                Some(_) => continue,
                None => return Ok(()),
            }
        }
    }

    /// Drive to the next `<c>` within the current row (or `</row>`).
    /// Returns `Ok(true)` with cell state populated, `Ok(false)` at row end.
    fn advance_cell(&mut self) -> Result<bool> {
        loop {
            match self.decoder.next_token()? {
                Some(Token::StartElement(start)) if &*start.name.local == "c" => {
                    let cell_ref = start.attr("r").ok_or_else(|| {
                        XlsxError::IncorrectSheet("cell is missing its @r attribute".into())
                    })?;
                    self.col = column_index(cell_ref)? as i64;
                    self.cell_type = CellType::from_attr(start.attr("t"))?;
                    self.cell_style =
                        start.attr("s").and_then(|v| v.parse().ok()).unwrap_or(0);
                    self.value.clear();
                    self.read_cell_body()?;
                    return Ok(true);
                }
                Some(Token::EndElement(end)) if &*end.name.local == "row" => return Ok(false),
                Some(_) => continue,
                None => return Ok(false),
            }
        }
    }

    /// Accumulate `<v>` or `<is>...<t>` text until `</c>`.
    fn read_cell_body(&mut self) -> Result<()> {
        let mut in_value = false;
        loop {
            match self.decoder.next_token()? {
                Some(Token::StartElement(start)) => match &*start.name.local {
                    "v" | "t" => in_value = true,
                    "is" | "r" => {}
                    _ => self.decoder.skip()?,
                },
                Some(Token::EndElement(end)) => match &*end.name.local {
                    "c" => return Ok(()),
                    "v" | "t" => in_value = false,
                    _ => {}
                },
                Some(Token::CharData(data)) => {
                    if in_value {
                        self.value.push_str(&String::from_utf8_lossy(data));
                    }
                }
                Some(_) => {}
                None => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_strings::read_shared_strings;
    use crate::styles::read_styles;
    use std::io::Cursor;

    fn sheet(xml: &str) -> Sheet<Cursor<Vec<u8>>> {
        let shared = Rc::new(
            read_shared_strings(Cursor::new(
                br#"<sst><si><t>alpha</t></si><si><t>beta</t></si></sst>"#.to_vec(),
            ))
            .unwrap(),
        );
        let styles = Rc::new(StyleSheet::empty());
        Sheet::new(Cursor::new(xml.as_bytes().to_vec()), shared, styles, false)
    }

    const TWO_ROWS: &str = r#"<worksheet><sheetData>
        <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>10</v></c></row>
        <row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2"><v>20</v></c></row>
    </sheetData></worksheet>"#;

    #[test]
    fn walks_rows_and_cells_in_order() {
        let mut s = sheet(TWO_ROWS);
        assert!(s.next_row());
        assert_eq!(s.row(), 0);
        assert!(s.next_cell());
        assert_eq!(s.col(), 0);
        assert_eq!(s.cell_value().unwrap(), "alpha");
        assert!(s.next_cell());
        assert_eq!(s.col(), 1);
        assert_eq!(s.cell_float().unwrap(), 10.0);
        assert!(!s.next_cell());

        assert!(s.next_row());
        assert_eq!(s.row(), 1);
        assert!(s.next_cell());
        assert_eq!(s.cell_value().unwrap(), "beta");

        s.next_cell();
        assert!(!s.next_row());
        assert!(s.err().unwrap().is_eof());
    }

    #[test]
    fn stopping_early_in_a_row_does_not_desync_the_next_row() {
        let mut s = sheet(TWO_ROWS);
        s.next_row();
        s.next_cell(); // only read the first cell of row 0
        assert!(s.next_row());
        assert_eq!(s.row(), 1);
        assert!(s.next_cell());
        assert_eq!(s.cell_value().unwrap(), "beta");
    }

    #[test]
    fn skip_row_forwards_past_remaining_cells() {
        let mut s = sheet(TWO_ROWS);
        s.next_row();
        s.skip_row().unwrap();
        assert!(s.next_row());
        assert_eq!(s.row(), 1);
    }

    #[test]
    fn empty_sheet_is_eof_immediately() {
        let mut s = sheet(r#"<worksheet><sheetData></sheetData></worksheet>"#);
        assert!(!s.next_row());
        assert!(s.err().unwrap().is_eof());
    }

    #[test]
    fn sparse_rows_skip_gaps() {
        let mut s = sheet(
            r#"<worksheet><sheetData>
                <row r="1"><c r="A1"><v>1</v></c></row>
                <row r="5"><c r="A5"><v>5</v></c></row>
            </sheetData></worksheet>"#,
        );
        s.next_row();
        assert_eq!(s.row(), 0);
        assert!(s.next_row());
        assert_eq!(s.row(), 4);
    }

    #[test]
    fn sparse_columns_are_not_reported() {
        let mut s = sheet(
            r#"<worksheet><sheetData>
                <row r="1"><c r="A1"><v>1</v></c><c r="C1"><v>3</v></c></row>
            </sheetData></worksheet>"#,
        );
        s.next_row();
        s.next_cell();
        assert_eq!(s.col(), 0);
        s.next_cell();
        assert_eq!(s.col(), 2);
        assert!(!s.next_cell());
    }

    #[test]
    fn error_once_latched_persists_on_every_later_query() {
        let mut s = sheet(
            r#"<worksheet><sheetData>
                <row r="1"><c t="s"><v>0</v></c></row>
            </sheetData></worksheet>"#,
        );
        s.next_row();
        assert!(!s.next_cell());
        assert!(matches!(s.err(), Some(XlsxError::IncorrectSheet(_))));
        assert!(!s.next_row());
        assert!(matches!(s.err(), Some(XlsxError::IncorrectSheet(_))));
    }

    #[test]
    fn out_of_range_shared_string_index_is_an_error() {
        let mut s = sheet(
            r#"<worksheet><sheetData>
                <row r="1"><c r="A1" t="s"><v>99</v></c></row>
            </sheetData></worksheet>"#,
        );
        s.next_row();
        s.next_cell();
        assert!(matches!(s.cell_value(), Err(XlsxError::IncorrectSharedString { .. })));
    }

    #[test]
    fn inline_rich_text_runs_concatenate() {
        let mut s = sheet(
            r#"<worksheet><sheetData>
                <row r="1"><c r="A1" t="inlineStr"><is><r><t>foo</t></r><r><t>bar</t></r></is></c></row>
            </sheetData></worksheet>"#,
        );
        s.next_row();
        s.next_cell();
        assert_eq!(s.cell_value().unwrap(), "foobar");
    }

    #[test]
    fn bool_cells_render_true_false() {
        let mut s = sheet(
            r#"<worksheet><sheetData>
                <row r="1"><c r="A1" t="b"><v>1</v></c><c r="B1" t="b"><v>0</v></c></row>
            </sheetData></worksheet>"#,
        );
        s.next_row();
        s.next_cell();
        assert_eq!(s.cell_format_value().unwrap(), "TRUE");
        s.next_cell();
        assert_eq!(s.cell_format_value().unwrap(), "FALSE");
    }

    #[test]
    fn date_typed_cells_render_their_iso_text_verbatim() {
        let mut s = sheet(
            r#"<worksheet><sheetData>
                <row r="1"><c r="A1" t="d"><v>2024-03-05T00:00:00Z</v></c></row>
            </sheetData></worksheet>"#,
        );
        s.next_row();
        s.next_cell();
        assert_eq!(s.cell_format_value().unwrap(), "2024-03-05T00:00:00Z");
    }

    #[test]
    fn formula_element_text_is_not_mistaken_for_the_cached_value() {
        let mut s = sheet(
            r#"<worksheet><sheetData>
                <row r="1"><c r="A1"><f>A2+1</f><v>42</v></c></row>
            </sheetData></worksheet>"#,
        );
        s.next_row();
        s.next_cell();
        assert_eq!(s.cell_value().unwrap(), "42");
    }
}
