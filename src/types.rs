//! Cell and row value types surfaced by the sheet cursor (§3 "Cell type").

/// The `t` attribute on `<c>`, mapped to a closed enum (§4.8 cell-type code
/// mapping). `Numeric` is the default when `t` is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    String,
    Inline,
    FormulaString,
    Bool,
    Error,
    Date,
    Numeric,
}

impl CellType {
    /// Map the wire-format `t` attribute value to a cell type. `None` or
    /// `"n"` both mean `Numeric`.
    pub fn from_attr(t: Option<&str>) -> crate::error::Result<Self> {
        Ok(match t {
            None | Some("n") => CellType::Numeric,
            Some("s") => CellType::String,
            Some("inlineStr") => CellType::Inline,
            Some("str") => CellType::FormulaString,
            Some("b") => CellType::Bool,
            Some("e") => CellType::Error,
            Some("d") => CellType::Date,
            Some(other) => {
                return Err(crate::error::XlsxError::UnknownCellType(other.to_string()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_codes() {
        assert_eq!(CellType::from_attr(None).unwrap(), CellType::Numeric);
        assert_eq!(CellType::from_attr(Some("n")).unwrap(), CellType::Numeric);
        assert_eq!(CellType::from_attr(Some("s")).unwrap(), CellType::String);
        assert_eq!(CellType::from_attr(Some("inlineStr")).unwrap(), CellType::Inline);
        assert_eq!(CellType::from_attr(Some("str")).unwrap(), CellType::FormulaString);
        assert_eq!(CellType::from_attr(Some("b")).unwrap(), CellType::Bool);
        assert_eq!(CellType::from_attr(Some("e")).unwrap(), CellType::Error);
        assert_eq!(CellType::from_attr(Some("d")).unwrap(), CellType::Date);
    }

    #[test]
    fn rejects_unknown_codes() {
        assert!(matches!(
            CellType::from_attr(Some("weird")),
            Err(crate::error::XlsxError::UnknownCellType(ref s)) if s == "weird"
        ));
    }
}
