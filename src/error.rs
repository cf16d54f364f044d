//! Error types for the xlsx cursor.

use thiserror::Error;

/// Everything that can go wrong opening an archive, loading a sheet, or
/// decoding a cell.
#[derive(Debug, Error)]
pub enum XlsxError {
    #[error("xl/_rels/workbook.xml.rels does not exist")]
    WorkbookRelsNotExist,

    #[error("xl/workbook.xml does not exist")]
    WorkbookNotExist,

    #[error("sheet not found: {name}")]
    SheetNotFound { name: String },

    #[error("sheet does not exist at index {index}")]
    SheetNotExist { index: usize },

    #[error("cell reference has no column letters")]
    NoColumns,

    #[error("shared string index {index} out of range (table has {len} entries)")]
    IncorrectSharedString { index: i64, len: usize },

    #[error("malformed sheet: {0}")]
    IncorrectSheet(String),

    #[error("row is missing its @r attribute")]
    RowMissingR,

    #[error("XML syntax error: {0}")]
    SyntaxError(String),

    #[error("unterminated quoted literal while splitting format sections")]
    DoubleQuote,

    #[error("number format has more than four sections")]
    ManySections,

    #[error("unclosed bracket expression in number format")]
    InvalidBrackets,

    #[error("malformed currency bracket in number format")]
    InvalidCurrency,

    #[error("unsupported character in number format")]
    UnsupportedCharacters,

    #[error("quoted literal in number format section is never closed")]
    NoClosingQuote,

    #[error("number format section left unparsed characters")]
    InvalidFormat,

    #[error("invalid boolean cell value: {0:?}")]
    InvalidBool(String),

    #[error("unknown cell type code: {0:?}")]
    UnknownCellType(String),

    #[error("could not parse cell value as a number: {0}")]
    ParseNumber(#[from] std::num::ParseFloatError),

    #[error("could not parse cell value as an integer: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    /// Normal end-of-stream for a sheet cursor (§4.8 `</sheetData>`
    /// transition). Mirrors `io.EOF` in the language-neutral spec.
    #[error("EOF")]
    Eof,
}

impl XlsxError {
    /// A structurally-equal copy for re-latching a stored cursor error
    /// (§3 "a cursor that has surfaced an error is terminal"). `XlsxError`
    /// itself isn't `Clone` because it wraps non-`Clone` source errors
    /// (`io::Error`, `zip::result::ZipError`); those are re-wrapped by their
    /// display message instead, which is enough for an error a caller only
    /// ever inspects, never matches on a second time.
    pub fn sticky_clone(&self) -> XlsxError {
        match self {
            XlsxError::WorkbookRelsNotExist => XlsxError::WorkbookRelsNotExist,
            XlsxError::WorkbookNotExist => XlsxError::WorkbookNotExist,
            XlsxError::SheetNotFound { name } => XlsxError::SheetNotFound { name: name.clone() },
            XlsxError::SheetNotExist { index } => XlsxError::SheetNotExist { index: *index },
            XlsxError::NoColumns => XlsxError::NoColumns,
            XlsxError::IncorrectSharedString { index, len } => {
                XlsxError::IncorrectSharedString { index: *index, len: *len }
            }
            XlsxError::IncorrectSheet(s) => XlsxError::IncorrectSheet(s.clone()),
            XlsxError::RowMissingR => XlsxError::RowMissingR,
            XlsxError::SyntaxError(s) => XlsxError::SyntaxError(s.clone()),
            XlsxError::DoubleQuote => XlsxError::DoubleQuote,
            XlsxError::ManySections => XlsxError::ManySections,
            XlsxError::InvalidBrackets => XlsxError::InvalidBrackets,
            XlsxError::InvalidCurrency => XlsxError::InvalidCurrency,
            XlsxError::UnsupportedCharacters => XlsxError::UnsupportedCharacters,
            XlsxError::NoClosingQuote => XlsxError::NoClosingQuote,
            XlsxError::InvalidFormat => XlsxError::InvalidFormat,
            XlsxError::InvalidBool(s) => XlsxError::InvalidBool(s.clone()),
            XlsxError::UnknownCellType(s) => XlsxError::UnknownCellType(s.clone()),
            XlsxError::ParseNumber(e) => XlsxError::ParseNumber(e.clone()),
            XlsxError::ParseInt(e) => XlsxError::ParseInt(e.clone()),
            XlsxError::Io(e) => XlsxError::SyntaxError(format!("io error: {e}")),
            XlsxError::Zip(e) => XlsxError::SyntaxError(format!("zip error: {e}")),
            XlsxError::Eof => XlsxError::Eof,
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, XlsxError::Eof)
    }
}

pub type Result<T> = std::result::Result<T, XlsxError>;
