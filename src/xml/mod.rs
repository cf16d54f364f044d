//! A pull-style XML tokenizer tuned for `.xlsx` parts (§4.4).
//!
//! Ported from the selective-attribute-capture decoder in the Go original
//! (`internal/xml/xml.go`), re-expressed as an idiomatic Rust pull parser:
//! `next_token` takes `&mut self` and returns a `Token<'_>` borrowing the
//! decoder's scratch buffers, so the borrow checker enforces the "valid only
//! until the next token" contract instead of leaving it to convention.
//!
//! Full Unicode `NameChar` classification and namespace-URI translation from
//! the Go original are not ported: every element/attribute name this crate
//! ever inspects is ASCII, and nothing downstream needs a resolved namespace
//! URI, only the lenient "keep the prefix as-is" fallback the spec allows.

use std::io::Read;
use std::rc::Rc;

use crate::error::{Result, XlsxError};

/// Which attributes to capture for a given element. Attributes not named
/// here are scanned (for well-formedness) but their values are discarded.
#[derive(Debug, Clone)]
pub struct TagAttrs {
    pub element: &'static str,
    pub attrs: &'static [&'static str],
}

/// An XML qualified name: `local` is the part after any `prefix:`, `space`
/// is the raw prefix text (lenient mode — never resolved to a URI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub space: Rc<str>,
    pub local: Rc<str>,
}

impl Name {
    fn unqualified(local: Rc<str>) -> Self {
        Name { space: Rc::from(""), local }
    }
}

#[derive(Debug)]
pub struct StartElement<'a> {
    pub name: Name,
    pub attrs: Vec<(Name, &'a str)>,
}

impl<'a> StartElement<'a> {
    pub fn attr(&self, local: &str) -> Option<&'a str> {
        self.attrs
            .iter()
            .find(|(name, _)| &*name.local == local)
            .map(|(_, v)| *v)
    }
}

#[derive(Debug)]
pub struct EndElement {
    pub name: Name,
}

#[derive(Debug)]
pub struct ProcInst<'a> {
    pub target: String,
    pub data: &'a [u8],
}

/// One parsed XML event.
#[derive(Debug)]
pub enum Token<'a> {
    StartElement(StartElement<'a>),
    EndElement(EndElement),
    CharData(&'a [u8]),
    ProcInst(ProcInst<'a>),
    Comment(&'a [u8]),
    Directive(&'a [u8]),
}

const MIN_BUF: usize = 4096;

struct AttrSlot {
    element: &'static str,
    name: &'static str,
    buf: Vec<u8>,
}

/// Per-first-byte cache of interned element/attribute local names, mirroring
/// the Go decoder's `names [utf8.RuneSelf][]string` table.
struct NameCache {
    buckets: Vec<Vec<Rc<str>>>,
}

impl NameCache {
    fn new() -> Self {
        NameCache { buckets: (0..128).map(|_| Vec::new()).collect() }
    }

    fn intern(&mut self, s: &str) -> Rc<str> {
        let first = s.as_bytes()[0];
        if first >= 0x80 {
            return Rc::from(s);
        }
        let bucket = &mut self.buckets[first as usize];
        if let Some(existing) = bucket.iter().find(|existing| &***existing == s) {
            return existing.clone();
        }
        let interned: Rc<str> = Rc::from(s);
        bucket.push(interned.clone());
        interned
    }
}

/// A pull parser over a byte stream, with a sliding 4 KiB (minimum) buffer
/// and a well-formedness element stack.
pub struct Decoder<R> {
    reader: R,
    data: Vec<u8>,
    data_r: usize,
    data_w: usize,
    eof: bool,
    err: Option<XlsxError>,

    text_buf: Vec<u8>,
    misc_buf: Vec<u8>,
    start_attrs: Vec<(Name, usize)>, // (name, index into attr_slots whose buf holds the value)

    stack: Vec<Name>,
    names: NameCache,

    tag_attrs: Vec<TagAttrs>,
    attr_slots: Vec<AttrSlot>,

    pending_end: Option<Name>,
    need_close: bool,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R, tag_attrs: Vec<TagAttrs>) -> Self {
        let mut attr_slots = Vec::new();
        for t in &tag_attrs {
            for &attr in t.attrs {
                attr_slots.push(AttrSlot { element: t.element, name: attr, buf: Vec::new() });
            }
        }
        Decoder {
            reader,
            data: vec![0u8; MIN_BUF],
            data_r: 0,
            data_w: 0,
            eof: false,
            err: None,
            text_buf: Vec::new(),
            misc_buf: Vec::new(),
            start_attrs: Vec::new(),
            stack: Vec::new(),
            names: NameCache::new(),
            tag_attrs,
            attr_slots,
            pending_end: None,
            need_close: false,
        }
    }

    pub fn without_filter(reader: R) -> Self {
        Self::new(reader, Vec::new())
    }

    /// Read the next token, or `None` at a well-formed end of stream.
    pub fn next_token(&mut self) -> Result<Option<Token<'_>>> {
        if let Some(err) = &self.err {
            return Err(clone_err(err));
        }

        if let Some(name) = self.pending_end.take() {
            return Ok(Some(Token::EndElement(EndElement { name })));
        }

        let Some(b) = self.getc()? else {
            if !self.stack.is_empty() {
                let err = XlsxError::SyntaxError("unexpected EOF".into());
                self.err = Some(clone_err(&err));
                return Err(err);
            }
            return Ok(None);
        };

        if b != b'<' {
            self.ungetc();
            let data = self.read_text(None)?;
            return Ok(Some(Token::CharData(data)));
        }

        let Some(b) = self.getc()? else {
            return Err(self.unexpected_eof());
        };

        match b {
            b'/' => self.end_element(),
            b'?' => self.proc_inst(),
            b'!' => self.bang(),
            _ => {
                self.ungetc();
                self.start_element()
            }
        }
    }

    /// Skip tokens until the end element matching the most recently
    /// consumed start element (handles nesting).
    pub fn skip(&mut self) -> Result<()> {
        let mut depth: i64 = 0;
        loop {
            match self.next_token()? {
                None => return Ok(()),
                Some(Token::StartElement(_)) => depth += 1,
                Some(Token::EndElement(_)) => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
    }

    fn end_element(&mut self) -> Result<Option<Token<'_>>> {
        let local = self.read_name()?.ok_or_else(|| {
            self.record_err(XlsxError::SyntaxError("expected element name after </".into()))
        })?;
        self.skip_space()?;
        match self.getc()? {
            Some(b'>') => {}
            _ => {
                return Err(self.record_err(XlsxError::SyntaxError(format!(
                    "invalid characters between </{local} and >"
                ))))
            }
        }
        let name = split_name(&local, &mut self.names);
        let open = self.stack.pop().ok_or_else(|| {
            self.record_err(XlsxError::SyntaxError(format!("unexpected end element </{local}>")))
        })?;
        if open.local != name.local {
            return Err(self.record_err(XlsxError::SyntaxError(format!(
                "element <{}> closed by </{}>",
                open.local, name.local
            ))));
        }
        Ok(Some(Token::EndElement(EndElement { name })))
    }

    fn proc_inst(&mut self) -> Result<Option<Token<'_>>> {
        let target = self.read_name()?.ok_or_else(|| {
            self.record_err(XlsxError::SyntaxError("expected target name after <?".into()))
        })?;
        self.skip_space()?;
        self.misc_buf.clear();
        let mut prev = 0u8;
        loop {
            let Some(b) = self.getc()? else { return Err(self.unexpected_eof()) };
            self.misc_buf.push(b);
            if prev == b'?' && b == b'>' {
                break;
            }
            prev = b;
        }
        let len = self.misc_buf.len();
        let data = &self.misc_buf[..len - 2];
        if target == "xml" {
            let content = String::from_utf8_lossy(data).into_owned();
            if let Some(ver) = proc_inst_param("version", &content) {
                if ver != "1.0" {
                    let err = XlsxError::SyntaxError(format!("unsupported XML version {ver:?}"));
                    return Err(self.record_err(err));
                }
            }
            if let Some(enc) = proc_inst_param("encoding", &content) {
                if !enc.eq_ignore_ascii_case("utf-8") {
                    let err = XlsxError::SyntaxError(format!("unsupported encoding {enc:?}"));
                    return Err(self.record_err(err));
                }
            }
        }
        Ok(Some(Token::ProcInst(ProcInst { target, data })))
    }

    fn bang(&mut self) -> Result<Option<Token<'_>>> {
        let Some(b) = self.getc()? else { return Err(self.unexpected_eof()) };
        match b {
            b'-' => {
                match self.getc()? {
                    Some(b'-') => {}
                    _ => {
                        return Err(self.record_err(XlsxError::SyntaxError(
                            "invalid sequence <!- not part of <!--".into(),
                        )))
                    }
                }
                self.misc_buf.clear();
                let (mut b0, mut b1) = (0u8, 0u8);
                loop {
                    let Some(b) = self.getc()? else { return Err(self.unexpected_eof()) };
                    self.misc_buf.push(b);
                    if b0 == b'-' && b1 == b'-' {
                        if b != b'>' {
                            return Err(self.record_err(XlsxError::SyntaxError(
                                "\"--\" not allowed inside a comment".into(),
                            )));
                        }
                        break;
                    }
                    b0 = b1;
                    b1 = b;
                }
                let len = self.misc_buf.len();
                Ok(Some(Token::Comment(&self.misc_buf[..len - 3])))
            }
            b'[' => {
                for expect in b"CDATA[" {
                    match self.getc()? {
                        Some(b) if b == *expect => {}
                        _ => {
                            return Err(self
                                .record_err(XlsxError::SyntaxError("invalid <![ sequence".into())))
                        }
                    }
                }
                let data = self.read_cdata()?;
                Ok(Some(Token::CharData(data)))
            }
            _ => {
                self.misc_buf.clear();
                self.misc_buf.push(b);
                let mut inquote = 0u8;
                let mut depth = 0i64;
                loop {
                    let Some(b) = self.getc()? else { return Err(self.unexpected_eof()) };
                    if inquote == 0 && b == b'>' && depth == 0 {
                        break;
                    }
                    self.misc_buf.push(b);
                    if b == inquote {
                        inquote = 0;
                    } else if inquote != 0 {
                        // inside quotes, no special handling
                    } else if b == b'\'' || b == b'"' {
                        inquote = b;
                    } else if b == b'>' {
                        depth -= 1;
                    } else if b == b'<' {
                        depth += 1;
                    }
                }
                let len = self.misc_buf.len();
                Ok(Some(Token::Directive(&self.misc_buf[..len])))
            }
        }
    }

    fn start_element(&mut self) -> Result<Option<Token<'_>>> {
        let raw_name = self.read_name()?.ok_or_else(|| {
            self.record_err(XlsxError::SyntaxError("expected element name after <".into()))
        })?;
        let name = split_name(&raw_name, &mut self.names);

        self.start_attrs.clear();
        let mut empty = false;
        loop {
            self.skip_space()?;
            let Some(b) = self.getc()? else { return Err(self.unexpected_eof()) };
            if b == b'/' {
                empty = true;
                match self.getc()? {
                    Some(b'>') => break,
                    _ => {
                        return Err(self
                            .record_err(XlsxError::SyntaxError("expected /> in element".into())))
                    }
                }
            }
            if b == b'>' {
                break;
            }
            self.ungetc();

            let attr_name_raw = self.read_name()?.ok_or_else(|| {
                self.record_err(XlsxError::SyntaxError(
                    "expected attribute name in element".into(),
                ))
            })?;
            self.skip_space()?;
            match self.getc()? {
                Some(b'=') => {}
                _ => {
                    return Err(self.record_err(XlsxError::SyntaxError(
                        "attribute name without = in element".into(),
                    )))
                }
            }
            self.skip_space()?;
            let value = self.read_attr_value()?;

            if let Some(slot_idx) = self.attr_slots.iter().position(|slot| {
                slot.element == name.local.as_ref() && slot.name == attr_name_raw.as_str()
            }) {
                self.attr_slots[slot_idx].buf.clear();
                self.attr_slots[slot_idx].buf.extend_from_slice(value);
                let attr_name = split_name(&attr_name_raw, &mut self.names);
                self.start_attrs.push((attr_name, slot_idx));
            }
        }

        self.stack.push(name.clone());
        if empty {
            self.pending_end = Some(name.clone());
        }

        let attrs = self
            .start_attrs
            .iter()
            .map(|(n, idx)| {
                let bytes = &self.attr_slots[*idx].buf;
                // already validated as UTF-8 by read_attr_value/checked text
                (n.clone(), std::str::from_utf8(bytes).unwrap_or(""))
            })
            .collect();

        Ok(Some(Token::StartElement(StartElement { name, attrs })))
    }

    fn read_attr_value(&mut self) -> Result<&[u8]> {
        match self.getc()? {
            Some(q @ (b'"' | b'\'')) => self.read_text(Some(q)),
            _ => Err(self.record_err(XlsxError::SyntaxError(
                "unquoted or missing attribute value".into(),
            ))),
        }
    }

    fn read_name(&mut self) -> Result<Option<String>> {
        self.misc_buf.clear();
        loop {
            if self.data_r == self.data_w {
                self.fill_data()?;
                if self.data_r == self.data_w {
                    break;
                }
            }
            let mut p = self.data_r;
            while p < self.data_w {
                let b = self.data[p];
                if b < 0x80 && !is_name_byte(b) {
                    break;
                }
                p += 1;
            }
            if p > self.data_r {
                self.misc_buf.extend_from_slice(&self.data[self.data_r..p]);
            }
            self.data_r = p;
            if self.data_r < self.data_w {
                break;
            }
        }
        if self.misc_buf.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&self.misc_buf).into_owned()))
    }

    fn skip_space(&mut self) -> Result<()> {
        loop {
            if self.data_r == self.data_w {
                self.fill_data()?;
                if self.data_r == self.data_w {
                    return Ok(());
                }
            }
            let mut p = self.data_r;
            while p < self.data_w {
                let b = self.data[p];
                if b != b' ' && b != b'\r' && b != b'\n' && b != b'\t' {
                    self.data_r = p;
                    return Ok(());
                }
                p += 1;
            }
            self.data_r = self.data_w;
        }
    }

    /// Read character data (quote is `None`) or a quoted attribute value
    /// (`Some(quote_byte)`), expanding entities and normalizing line endings.
    fn read_text(&mut self, quote: Option<u8>) -> Result<&[u8]> {
        self.text_buf.clear();
        let (mut b0, mut b1) = (0u8, 0u8);
        loop {
            if self.data_r == self.data_w {
                self.fill_data()?;
                if self.data_r == self.data_w && self.eof {
                    break;
                }
            }
            if self.data_r == self.data_w {
                continue;
            }

            let mut p = self.data_r;
            let stop: &[u8] = &[b'<', b']', b'>', b'&', b'\r', b'\n'];
            let quote_byte = quote;
            loop {
                if p >= self.data_w {
                    break;
                }
                let b = self.data[p];
                if stop.contains(&b) || Some(b) == quote_byte {
                    break;
                }
                p += 1;
            }
            if p > self.data_r {
                self.text_buf.extend_from_slice(&self.data[self.data_r..p]);
            }
            if p == self.data_w {
                self.data_r = p;
                continue;
            }
            let b = self.data[p];
            self.data_r = p + 1;

            if quote.is_none() && b0 == b']' && b1 == b']' && b == b'>' {
                return Err(
                    self.record_err(XlsxError::SyntaxError("unescaped ]]> in text".into()))
                );
            }

            if b == b'<' {
                if quote.is_some() {
                    return Err(self.record_err(XlsxError::SyntaxError(
                        "unescaped < inside quoted string".into(),
                    )));
                }
                self.data_r -= 1;
                break;
            }
            if let Some(q) = quote {
                if b == q {
                    break;
                }
            }
            if b == b'&' {
                self.read_entity()?;
                b0 = 0;
                b1 = 0;
                continue;
            }

            if b == b'\r' {
                self.text_buf.push(b'\n');
            } else if b1 == b'\r' && b == b'\n' {
                // already wrote the \n for the \r
            } else {
                self.text_buf.push(b);
            }
            b0 = b1;
            b1 = b;
        }
        check_chars(&self.text_buf).map_err(|e| self.record_err(e))?;
        Ok(&self.text_buf)
    }

    fn read_entity(&mut self) -> Result<()> {
        let Some(b) = self.getc()? else {
            return Err(self.unexpected_eof());
        };
        if b == b'#' {
            let mut base = 10u32;
            let Some(mut b) = self.getc()? else { return Err(self.unexpected_eof()) };
            if b == b'x' {
                base = 16;
                let Some(next) = self.getc()? else { return Err(self.unexpected_eof()) };
                b = next;
            }
            let mut digits = Vec::new();
            while b.is_ascii_digit()
                || (base == 16 && (b.is_ascii_hexdigit()))
            {
                digits.push(b);
                let Some(next) = self.getc()? else { return Err(self.unexpected_eof()) };
                b = next;
            }
            if b != b';' {
                return Err(self
                    .record_err(XlsxError::SyntaxError("malformed numeric character reference".into())));
            }
            let s = String::from_utf8_lossy(&digits).into_owned();
            let n = u32::from_str_radix(&s, base).map_err(|_| {
                self.record_err(XlsxError::SyntaxError(format!("invalid numeric entity &#{s};")))
            })?;
            let ch = char::from_u32(n).ok_or_else(|| {
                self.record_err(XlsxError::SyntaxError(format!("numeric entity &#{s}; out of range")))
            })?;
            let mut buf = [0u8; 4];
            self.text_buf.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            return Ok(());
        }

        self.ungetc();
        let name = self.read_name()?.unwrap_or_default();
        match self.getc()? {
            Some(b';') => {}
            _ => {
                return Err(self.record_err(XlsxError::SyntaxError(format!(
                    "invalid character entity &{name} (no semicolon)"
                ))))
            }
        }
        let replacement = match name.as_str() {
            "lt" => "<",
            "gt" => ">",
            "amp" => "&",
            "apos" => "'",
            "quot" => "\"",
            _ => {
                return Err(self
                    .record_err(XlsxError::SyntaxError(format!("unknown entity &{name};"))))
            }
        };
        self.text_buf.extend_from_slice(replacement.as_bytes());
        Ok(())
    }

    fn read_cdata(&mut self) -> Result<&[u8]> {
        self.text_buf.clear();
        let (mut b0, mut b1) = (0u8, 0u8);
        loop {
            let Some(b) = self.getc()? else {
                return Err(self.record_err(XlsxError::SyntaxError(
                    "unexpected EOF in CDATA section".into(),
                )))
            };
            if b0 == b']' && b1 == b']' && b == b'>' {
                break;
            }
            if b == b'\r' {
                self.text_buf.push(b'\n');
            } else if b1 == b'\r' && b == b'\n' {
                // already wrote \n
            } else {
                self.text_buf.push(b);
            }
            b0 = b1;
            b1 = b;
        }
        let len = self.text_buf.len();
        check_chars(&self.text_buf[..len.saturating_sub(0)]).map_err(|e| self.record_err(e))?;
        Ok(&self.text_buf)
    }

    fn getc(&mut self) -> Result<Option<u8>> {
        if self.data_r == self.data_w {
            self.fill_data()?;
            if self.data_r == self.data_w {
                return Ok(None);
            }
        }
        let b = self.data[self.data_r];
        self.data_r += 1;
        Ok(Some(b))
    }

    fn ungetc(&mut self) {
        self.data_r -= 1;
    }

    fn fill_data(&mut self) -> Result<()> {
        if self.eof {
            return Ok(());
        }
        if self.data_r < self.data_w {
            self.data.copy_within(self.data_r..self.data_w, 0);
            self.data_w -= self.data_r;
        } else {
            self.data_w = 0;
        }
        self.data_r = 0;

        if self.data_w == self.data.len() {
            self.data.resize(self.data.len() * 2, 0);
        }

        let n = self.reader.read(&mut self.data[self.data_w..])?;
        self.data_w += n;
        if n == 0 {
            self.eof = true;
        }
        Ok(())
    }

    fn unexpected_eof(&mut self) -> XlsxError {
        self.record_err(XlsxError::SyntaxError("unexpected EOF".into()))
    }

    fn record_err(&mut self, err: XlsxError) -> XlsxError {
        let stored = clone_err(&err);
        self.err = Some(stored);
        err
    }
}

fn clone_err(err: &XlsxError) -> XlsxError {
    // XlsxError is not Clone (it wraps non-Clone source errors); the
    // tokenizer only ever latches SyntaxError variants, so re-wrap those.
    match err {
        XlsxError::SyntaxError(msg) => XlsxError::SyntaxError(msg.clone()),
        other => XlsxError::SyntaxError(other.to_string()),
    }
}

fn split_name(raw: &str, cache: &mut NameCache) -> Name {
    match raw.split_once(':') {
        Some((space, local)) if !space.is_empty() && !local.is_empty() => {
            Name { space: cache.intern(space), local: cache.intern(local) }
        }
        _ => Name::unqualified(cache.intern(raw)),
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b':' || b == b'.' || b == b'-'
}

fn check_chars(data: &[u8]) -> std::result::Result<(), XlsxError> {
    match std::str::from_utf8(data) {
        Ok(s) => {
            for c in s.chars() {
                if !is_in_character_range(c) {
                    return Err(XlsxError::SyntaxError(format!(
                        "illegal character code U+{:04X}",
                        c as u32
                    )));
                }
            }
            Ok(())
        }
        Err(_) => Err(XlsxError::SyntaxError("invalid UTF-8".into())),
    }
}

/// The XML 1.0 `Char` production.
fn is_in_character_range(c: char) -> bool {
    matches!(c as u32,
        0x09 | 0x0A | 0x0D
        | 0x20..=0xD7FF
        | 0xE000..=0xFFFD
        | 0x10000..=0x10FFFF)
}

fn proc_inst_param<'a>(param: &str, content: &'a str) -> Option<&'a str> {
    let needle = format!("{param}=");
    let idx = content.find(&needle)?;
    let rest = &content[idx + needle.len()..];
    let sep = rest.as_bytes().first().copied()?;
    if sep != b'\'' && sep != b'"' {
        return None;
    }
    let rest = &rest[1..];
    let end = rest.find(sep as char)?;
    Some(&rest[..end])
}
