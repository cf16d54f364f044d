//! ZIP container glue (§6 "Input format"): the core's cursor API only
//! requires a map from entry name to a byte-range reader. This module is
//! the one piece of the crate that actually depends on a ZIP implementation
//! (the `zip` crate) to provide that map over a real `.xlsx` archive.

use std::cell::RefCell;
use std::io::{Cursor, Read, Seek};
use std::rc::Rc;

use crate::error::{Result, XlsxError};

/// An open `.xlsx` archive. Entries are read fully into memory on request
/// (a sheet part's XML is at most a few MiB even for large workbooks) and
/// handed back as an owned, independently-seekable reader so a cursor does
/// not need to borrow the archive itself.
#[derive(Clone)]
pub struct ZipSource<R> {
    archive: Rc<RefCell<zip::ZipArchive<R>>>,
}

impl<R: Read + Seek> ZipSource<R> {
    pub fn new(reader: R) -> Result<Self> {
        let archive = zip::ZipArchive::new(reader)?;
        Ok(ZipSource { archive: Rc::new(RefCell::new(archive)) })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.archive.borrow_mut().by_name(name).is_ok()
    }

    /// Read one entry's full contents and hand back an owned `Read`.
    pub fn open(&self, name: &str) -> Result<Cursor<Vec<u8>>> {
        let mut archive = self.archive.borrow_mut();
        let mut entry = archive
            .by_name(name)
            .map_err(|_| XlsxError::SheetNotExist { index: usize::MAX })?;
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        Ok(Cursor::new(buf))
    }
}
