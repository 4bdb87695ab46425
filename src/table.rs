//! Generic zero-copy table access.
//!
//! [`Table`] and [`TableVector`] resolve fields of a buffer that has already
//! passed [`verify`](crate::verify). Each lookup is one vtable read plus one
//! read of the field itself; nothing is decoded ahead of time and returned
//! strings borrow from the buffer.

use crate::layout::{SIZE_UOFFSET, SIZE_VOFFSET};
use crate::scalar::Scalar;

/// A table inside a verified buffer.
#[derive(Clone, Copy)]
pub struct Table<'a> {
    buf: &'a [u8],
    loc: usize,
}

impl<'a> Table<'a> {
    /// `loc` must be the position of a table the verifier accepted.
    pub(crate) fn new(buf: &'a [u8], loc: usize) -> Self {
        Table { buf, loc }
    }

    pub fn buf(&self) -> &'a [u8] {
        self.buf
    }

    /// Byte position of the table in its buffer.
    pub fn loc(&self) -> usize {
        self.loc
    }

    fn vtable(&self) -> usize {
        let soffset = i32::read_le(&self.buf[self.loc..]);
        (self.loc as i64 - soffset as i64) as usize
    }

    /// Position of the field behind `voffset` relative to the table start,
    /// or `None` when the field is absent or the vtable predates it.
    pub fn field_offset(&self, voffset: u16) -> Option<usize> {
        let vtable = self.vtable();
        let vt_len = u16::read_le(&self.buf[vtable..]) as usize;
        let entry = voffset as usize;
        if entry + SIZE_VOFFSET > vt_len {
            return None;
        }
        match u16::read_le(&self.buf[vtable + entry..]) {
            0 => None,
            off => Some(off as usize),
        }
    }

    pub fn get<T: Scalar>(&self, voffset: u16, default: T) -> T {
        self.field_offset(voffset)
            .map(|off| T::read_le(&self.buf[self.loc + off..]))
            .unwrap_or(default)
    }

    fn deref(&self, pos: usize) -> usize {
        pos + u32::read_le(&self.buf[pos..]) as usize
    }

    /// The string behind `voffset`. Text that is not UTF-8 reads as absent;
    /// verified buffers never contain any.
    pub fn get_str(&self, voffset: u16) -> Option<&'a str> {
        let field = self.loc + self.field_offset(voffset)?;
        let start = self.deref(field);
        let len = u32::read_le(&self.buf[start..]) as usize;
        let bytes = &self.buf[start + SIZE_UOFFSET..start + SIZE_UOFFSET + len];
        std::str::from_utf8(bytes).ok()
    }

    pub fn get_table_vector(&self, voffset: u16) -> Option<TableVector<'a>> {
        let field = self.loc + self.field_offset(voffset)?;
        let start = self.deref(field);
        let len = u32::read_le(&self.buf[start..]) as usize;
        Some(TableVector {
            buf: self.buf,
            loc: start + SIZE_UOFFSET,
            len,
        })
    }
}

/// A count-prefixed vector of table references.
#[derive(Clone, Copy)]
pub struct TableVector<'a> {
    buf: &'a [u8],
    loc: usize,
    len: usize,
}

impl<'a> TableVector<'a> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The table at `index`; the index is always bounds-checked.
    pub fn get(&self, index: usize) -> Option<Table<'a>> {
        if index >= self.len {
            return None;
        }
        let elem = self.loc + index * SIZE_UOFFSET;
        let target = elem + u32::read_le(&self.buf[elem..]) as usize;
        Some(Table::new(self.buf, target))
    }
}
