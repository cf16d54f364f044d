//! The façade (§4.9, C10): opens an archive, wires the shared-strings
//! table, style sheet and workbook/rels loader together, and hands out
//! fresh sheet cursors.

use std::io::{Cursor, Read, Seek};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{Result, XlsxError};
use crate::shared_strings::{self, SharedStrings};
use crate::sheet::Sheet;
use crate::styles::{self, StyleSheet};
use crate::workbook;
use crate::zip_source::ZipSource;

const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const WORKBOOK_PART: &str = "xl/workbook.xml";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const STYLES_PART: &str = "xl/styles.xml";

/// An open `.xlsx` workbook. Shared strings, styles and the sheet list are
/// loaded once at construction and live for the façade's lifetime; each
/// `open_sheet_*` call hands out an independent cursor.
pub struct Xlsx<R> {
    source: ZipSource<R>,
    shared_strings: Rc<SharedStrings>,
    styles: Rc<StyleSheet>,
    date1904: bool,
    sheets: IndexMap<String, String>,
}

impl<R: Read + Seek> Xlsx<R> {
    pub fn new(reader: R) -> Result<Self> {
        let source = ZipSource::new(reader)?;

        if !source.contains(WORKBOOK_RELS_PART) {
            return Err(XlsxError::WorkbookRelsNotExist);
        }
        if !source.contains(WORKBOOK_PART) {
            return Err(XlsxError::WorkbookNotExist);
        }

        let rels = workbook::read_workbook_rels(source.open(WORKBOOK_RELS_PART)?)?;
        let wb = workbook::read_workbook(source.open(WORKBOOK_PART)?, &rels)?;

        let shared_strings = if source.contains(SHARED_STRINGS_PART) {
            shared_strings::read_shared_strings(source.open(SHARED_STRINGS_PART)?)?
        } else {
            SharedStrings::empty()
        };

        let styles = if source.contains(STYLES_PART) {
            styles::read_styles(source.open(STYLES_PART)?)?
        } else {
            StyleSheet::empty()
        };

        let sheets = wb.sheets.into_iter().map(|s| (s.name, s.part)).collect();

        Ok(Xlsx {
            source,
            shared_strings: Rc::new(shared_strings),
            styles: Rc::new(styles),
            date1904: wb.date1904,
            sheets,
        })
    }

    /// Display names of every sheet, in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.keys().cloned().collect()
    }

    pub fn open_sheet_by_name(&self, name: &str) -> Result<Sheet<Cursor<Vec<u8>>>> {
        let part = self
            .sheets
            .get(name)
            .ok_or_else(|| XlsxError::SheetNotFound { name: name.to_string() })?;
        self.open_part(part)
    }

    pub fn open_sheet_by_order(&self, index: usize) -> Result<Sheet<Cursor<Vec<u8>>>> {
        let (_, part) = self.sheets.get_index(index).ok_or(XlsxError::SheetNotExist { index })?;
        self.open_part(part)
    }

    fn open_part(&self, part: &str) -> Result<Sheet<Cursor<Vec<u8>>>> {
        let reader = self.source.open(part)?;
        Ok(Sheet::new(reader, self.shared_strings.clone(), self.styles.clone(), self.date1904))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(parts: &[(&str, &str)]) -> Vec<u8> {
        let buf = Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(buf);
        let options = zip::write::FileOptions::default();
        for (name, content) in parts {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    const RELS: &str = r#"<Relationships>
        <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
        <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
    </Relationships>"#;

    const WORKBOOK: &str = r#"<workbook>
        <workbookPr date1904="0"/>
        <sheets>
            <sheet name="Sheet1" sheetId="1" r:id="rId1"/>
            <sheet name="Sheet2" sheetId="2" r:id="rId2"/>
        </sheets>
    </workbook>"#;

    const SHEET1: &str = r#"<worksheet><sheetData>
        <row r="1"><c r="A1"><v>1</v></c></row>
    </sheetData></worksheet>"#;

    fn two_sheet_archive() -> Vec<u8> {
        zip_with(&[
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", SHEET1),
        ])
    }

    #[test]
    fn lists_sheets_in_workbook_order() {
        let xlsx = Xlsx::new(Cursor::new(two_sheet_archive())).unwrap();
        assert_eq!(xlsx.sheet_names(), vec!["Sheet1", "Sheet2"]);
    }

    #[test]
    fn opens_a_sheet_by_name_and_reads_it() {
        let xlsx = Xlsx::new(Cursor::new(two_sheet_archive())).unwrap();
        let mut sheet = xlsx.open_sheet_by_name("Sheet2").unwrap();
        assert!(sheet.next_row());
        assert!(sheet.next_cell());
        assert_eq!(sheet.cell_float().unwrap(), 1.0);
    }

    #[test]
    fn opens_a_sheet_by_order() {
        let xlsx = Xlsx::new(Cursor::new(two_sheet_archive())).unwrap();
        assert!(xlsx.open_sheet_by_order(0).is_ok());
        assert!(matches!(
            xlsx.open_sheet_by_order(9),
            Err(XlsxError::SheetNotExist { index: 9 })
        ));
    }

    #[test]
    fn unknown_sheet_name_is_an_error() {
        let xlsx = Xlsx::new(Cursor::new(two_sheet_archive())).unwrap();
        assert!(matches!(
            xlsx.open_sheet_by_name("Nope"),
            Err(XlsxError::SheetNotFound { .. })
        ));
    }

    #[test]
    fn missing_workbook_rels_is_fatal_at_open() {
        let bytes = zip_with(&[("xl/workbook.xml", WORKBOOK)]);
        assert!(matches!(
            Xlsx::new(Cursor::new(bytes)),
            Err(XlsxError::WorkbookRelsNotExist)
        ));
    }

    #[test]
    fn missing_workbook_xml_is_fatal_at_open() {
        let bytes = zip_with(&[("xl/_rels/workbook.xml.rels", RELS)]);
        assert!(matches!(Xlsx::new(Cursor::new(bytes)), Err(XlsxError::WorkbookNotExist)));
    }

    #[test]
    fn missing_shared_strings_and_styles_parts_are_tolerated() {
        let bytes = zip_with(&[
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", SHEET1),
        ]);
        let xlsx = Xlsx::new(Cursor::new(bytes)).unwrap();
        let mut sheet = xlsx.open_sheet_by_order(0).unwrap();
        sheet.next_row();
        sheet.next_cell();
        assert_eq!(sheet.cell_format_value().unwrap(), "1");
    }
}
