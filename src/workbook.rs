//! Workbook and relationships loading (§4.7): resolves sheet relationship
//! ids to part paths and reads workbook-level settings (epoch flag).

use std::collections::HashMap;
use std::io::Read;

use crate::error::Result;
use crate::xml::{Decoder, TagAttrs, Token};

const WORKSHEET_RELATIONSHIP_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";

/// One entry in `workbook.xml`'s `<sheets>` list, joined against its
/// relationship target.
#[derive(Debug, Clone)]
pub struct SheetInfo {
    pub name: String,
    pub part: String,
}

/// The workbook-level facts this crate needs: the ordered sheet list (with
/// resolved part paths) and the date epoch in effect.
pub struct Workbook {
    pub sheets: Vec<SheetInfo>,
    pub date1904: bool,
}

/// Parse `xl/_rels/workbook.xml.rels`, keeping only relationship ids whose
/// `Type` is the officedocument `worksheet` relationship (§4.7).
pub fn read_workbook_rels<R: Read>(reader: R) -> Result<HashMap<String, String>> {
    let filter = vec![TagAttrs { element: "Relationship", attrs: &["Id", "Type", "Target"] }];
    let mut decoder = Decoder::new(reader, filter);
    let mut rels = HashMap::new();

    while let Some(token) = decoder.next_token()? {
        if let Token::StartElement(start) = token {
            if &*start.name.local == "Relationship" {
                if start.attr("Type") == Some(WORKSHEET_RELATIONSHIP_TYPE) {
                    if let (Some(id), Some(target)) = (start.attr("Id"), start.attr("Target")) {
                        rels.insert(id.to_string(), resolve_target(target));
                    }
                }
            }
        }
    }
    Ok(rels)
}

/// `/xl/...` targets are archive-absolute (strip the leading slash); any
/// other target is relative to the `xl/` directory.
fn resolve_target(target: &str) -> String {
    if let Some(stripped) = target.strip_prefix("/xl/") {
        stripped.to_string()
    } else if let Some(stripped) = target.strip_prefix('/') {
        stripped.to_string()
    } else {
        format!("xl/{target}")
    }
}

/// Parse `xl/workbook.xml`, joining its `<sheets>` list against the
/// already-parsed relationship map. A sheet whose relationship id is
/// missing or unresolved is skipped with a warning rather than failing the
/// whole load (§4.7's implementer's-discretion clause; this crate documents
/// "skippable").
pub fn read_workbook<R: Read>(reader: R, rels: &HashMap<String, String>) -> Result<Workbook> {
    let filter = vec![
        TagAttrs { element: "workbookPr", attrs: &["date1904"] },
        TagAttrs { element: "sheet", attrs: &["name", "r:id"] },
    ];
    let mut decoder = Decoder::new(reader, filter);

    let mut date1904 = false;
    let mut sheets = Vec::new();

    while let Some(token) = decoder.next_token()? {
        if let Token::StartElement(start) = token {
            match &*start.name.local {
                "workbookPr" => {
                    date1904 = matches!(start.attr("date1904"), Some("1") | Some("true"));
                }
                "sheet" => {
                    let name = start.attr("name").unwrap_or_default().to_string();
                    let rid = start.attr("r:id").or_else(|| start.attr("id"));
                    match rid.and_then(|id| rels.get(id)) {
                        Some(part) => sheets.push(SheetInfo { name, part: part.clone() }),
                        None => {
                            log::warn!(
                                "skipping sheet {name:?}: no resolvable worksheet relationship"
                            );
                        }
                    }
                }
                _ => {}
            }
        }
    }

    Ok(Workbook { sheets, date1904 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const RELS: &str = r#"<Relationships>
        <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
        <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
        <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
    </Relationships>"#;

    #[test]
    fn rels_keeps_only_worksheet_type() {
        let rels = read_workbook_rels(Cursor::new(RELS.as_bytes().to_vec())).unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels["rId1"], "worksheets/sheet1.xml");
        assert_eq!(rels["rId2"], "worksheets/sheet2.xml");
        assert!(!rels.contains_key("rId3"));
    }

    #[test]
    fn workbook_joins_sheets_against_rels_in_order() {
        let rels = read_workbook_rels(Cursor::new(RELS.as_bytes().to_vec())).unwrap();
        let wb_xml = r#"<workbook>
            <workbookPr date1904="0"/>
            <sheets>
                <sheet name="Sheet1" sheetId="1" r:id="rId1"/>
                <sheet name="Sheet2" sheetId="2" r:id="rId2"/>
            </sheets>
        </workbook>"#;
        let wb = read_workbook(Cursor::new(wb_xml.as_bytes().to_vec()), &rels).unwrap();
        assert!(!wb.date1904);
        assert_eq!(wb.sheets.len(), 2);
        assert_eq!(wb.sheets[0].name, "Sheet1");
        assert_eq!(wb.sheets[0].part, "worksheets/sheet1.xml");
        assert_eq!(wb.sheets[1].part, "worksheets/sheet2.xml");
    }

    #[test]
    fn date1904_flag_is_read() {
        let rels = HashMap::new();
        let wb_xml = r#"<workbook><workbookPr date1904="1"/><sheets/></workbook>"#;
        let wb = read_workbook(Cursor::new(wb_xml.as_bytes().to_vec()), &rels).unwrap();
        assert!(wb.date1904);
    }

    #[test]
    fn sheet_with_unresolvable_relationship_is_skipped_not_fatal() {
        let rels = HashMap::new();
        let wb_xml = r#"<workbook><sheets><sheet name="Ghost" r:id="rId9"/></sheets></workbook>"#;
        let wb = read_workbook(Cursor::new(wb_xml.as_bytes().to_vec()), &rels).unwrap();
        assert!(wb.sheets.is_empty());
    }
}
