//! A streaming reader for `.xlsx` workbooks.
//!
//! [`Xlsx::new`] opens a ZIP-backed spreadsheet archive; [`Xlsx::open_sheet_by_name`]
//! and [`Xlsx::open_sheet_by_order`] hand out a [`Sheet`] cursor that walks
//! `<sheetData>` row by row and cell by cell without materializing the
//! whole sheet, resolving each cell's displayed value against the
//! workbook's shared-string table and numeric/date format styles.
//!
//! ```no_run
//! use std::fs::File;
//! use xlsx_cursor::Xlsx;
//!
//! # fn main() -> xlsx_cursor::Result<()> {
//! let file = File::open("report.xlsx")?;
//! let workbook = Xlsx::new(file)?;
//! let mut sheet = workbook.open_sheet_by_order(0)?;
//! while sheet.next_row() {
//!     while sheet.next_cell() {
//!         print!("{}\t", sheet.cell_value()?);
//!     }
//!     println!();
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Writing/modifying workbooks, formula evaluation, charts, images,
//! conditional formatting and pivot tables are out of scope; this crate
//! only reads.

mod arena;
pub mod column;
pub mod date;
pub mod error;
pub mod format;
pub mod shared_strings;
pub mod sheet;
pub mod styles;
pub mod types;
pub mod workbook;
pub mod xlsx;
pub mod xml;
mod zip_source;

pub use error::{Result, XlsxError};
pub use sheet::Sheet;
pub use types::CellType;
pub use xlsx::Xlsx;
