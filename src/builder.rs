//! Buffer writer.
//!
//! The [`Builder`] fills a single `Vec<u8>` from the back towards the front,
//! so everything a table refers to (strings, child vectors, child tables) is
//! already in place, at a higher address, by the time the table is written.
//! Internally every position is measured as a distance from the *end* of the
//! buffer ("used space"); those distances stay valid while the buffer grows,
//! and stored references are derived from them as forward deltas.
//!
//! ## Write order
//! ```text
//! create_string / create_vector_of_tables   (no table open)
//! start_table
//!     push_slot / push_slot_offset ...
//! end_table            -> Offset<TableRef>
//! ...repeat for parents...
//! finish(root)
//! ```
//! Any other order is reported as [`Error::WriterMisuse`].

use crate::error::{Error, Misuse, Result};
use crate::layout::{
    self, FieldKind, SIZE_SOFFSET, SIZE_UOFFSET, SIZE_VOFFSET, VTABLE_HEADER_SIZE,
};
use crate::scalar::{Scalar, padding_bytes};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Largest buffer the format can address with signed 32-bit offsets.
pub const MAX_BUFFER_SIZE: usize = i32::MAX as usize;

// ── Offsets ────────────────────────────────────────────────────────────────

/// Reference to a finished string.
pub enum StrRef {}
/// Reference to a finished vector of table offsets.
pub enum VecRef {}
/// Reference to a finished table.
pub enum TableRef {}

mod private {
    use super::Builder;

    pub trait Sealed {
        /// Ascending used-space positions of every finished object of this kind.
        fn finished(builder: &Builder) -> &[usize];
    }

    impl Sealed for super::StrRef {
        fn finished(builder: &Builder) -> &[usize] {
            &builder.strings_done
        }
    }

    impl Sealed for super::VecRef {
        fn finished(builder: &Builder) -> &[usize] {
            &builder.vectors_done
        }
    }
}

/// Referents that may be stored in a table slot.
pub trait SlotReferent: private::Sealed {
    fn fits(kind: &FieldKind) -> bool;
}

impl SlotReferent for StrRef {
    fn fits(kind: &FieldKind) -> bool {
        matches!(kind, FieldKind::String)
    }
}

impl SlotReferent for VecRef {
    fn fits(kind: &FieldKind) -> bool {
        matches!(kind, FieldKind::VectorOfTables)
    }
}

/// Position of a finished object, measured from the end of the builder's
/// buffer. Only meaningful to the builder that produced it, and only until
/// that builder is [`reset`](Builder::reset).
pub struct Offset<T> {
    value: u32,
    _marker: PhantomData<T>,
}

impl<T> Offset<T> {
    pub(crate) fn new(value: u32) -> Self {
        Offset {
            value,
            _marker: PhantomData,
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }
}

impl<T> Clone for Offset<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Offset<T> {}

impl<T> PartialEq for Offset<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Offset<T> {}

impl<T> fmt::Debug for Offset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Offset({})", self.value)
    }
}

// ── Options ────────────────────────────────────────────────────────────────

/// Builder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderOptions {
    /// Bytes reserved up front; the buffer doubles when it runs out.
    pub initial_capacity: usize,
    /// Share one copy of identical strings.
    pub dedup_strings: bool,
    /// Write scalar slots even when they equal their default.
    pub force_defaults: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        BuilderOptions {
            initial_capacity: 1024,
            dedup_strings: false,
            force_defaults: false,
        }
    }
}

// ── Builder ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct FieldLoc {
    voffset: u16,
    off: usize,
}

/// Writes one scene-graph buffer. Not shareable across threads while building;
/// build independent buffers with independent builders.
#[derive(Debug)]
pub struct Builder {
    buf: Vec<u8>,
    head: usize,
    min_align: usize,
    fields: Vec<FieldLoc>,
    table_start: Option<usize>,
    vtables: Vec<usize>,
    tables: Vec<usize>,
    strings_done: Vec<usize>,
    vectors_done: Vec<usize>,
    strings: HashMap<String, usize>,
    finished: bool,
    opts: BuilderOptions,
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Builder::with_options(BuilderOptions::default())
    }

    pub fn with_capacity(initial_capacity: usize) -> Self {
        Builder::with_options(BuilderOptions {
            initial_capacity,
            ..BuilderOptions::default()
        })
    }

    pub fn with_options(opts: BuilderOptions) -> Self {
        let capacity = opts.initial_capacity.min(MAX_BUFFER_SIZE);
        Builder {
            buf: vec![0u8; capacity],
            head: capacity,
            min_align: 1,
            fields: Vec::new(),
            table_start: None,
            vtables: Vec::new(),
            tables: Vec::new(),
            strings_done: Vec::new(),
            vectors_done: Vec::new(),
            strings: HashMap::new(),
            finished: false,
            opts,
        }
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.opts
    }

    /// Bytes written so far.
    pub fn used_space(&self) -> usize {
        self.buf.len() - self.head
    }

    /// Forget everything written, keeping the allocation for the next buffer.
    pub fn reset(&mut self) {
        self.head = self.buf.len();
        self.min_align = 1;
        self.fields.clear();
        self.table_start = None;
        self.vtables.clear();
        self.tables.clear();
        self.strings_done.clear();
        self.vectors_done.clear();
        self.strings.clear();
        self.finished = false;
    }

    // ── Raw space management ───────────────────────────────────────────────

    fn ensure_space(&mut self, want: usize) -> Result<()> {
        if want <= self.head {
            return Ok(());
        }
        let used = self.used_space();
        let needed = used
            .checked_add(want)
            .filter(|&n| n <= MAX_BUFFER_SIZE)
            .ok_or(Error::BufferTooLarge {
                len: used.saturating_add(want),
                max: MAX_BUFFER_SIZE,
            })?;
        let mut new_len = self.buf.len().max(16);
        while new_len < needed {
            new_len = new_len.saturating_mul(2);
        }
        let new_len = new_len.min(MAX_BUFFER_SIZE);

        let mut grown = vec![0u8; new_len];
        grown[new_len - used..].copy_from_slice(&self.buf[self.head..]);
        self.buf = grown;
        self.head = new_len - used;
        Ok(())
    }

    fn make_space(&mut self, want: usize) -> Result<usize> {
        self.ensure_space(want)?;
        self.head -= want;
        Ok(self.head)
    }

    /// Pad so that, after `len` more bytes, used space is a multiple of `alignment`.
    fn align(&mut self, len: usize, alignment: usize) -> Result<()> {
        self.min_align = self.min_align.max(alignment);
        let pad = padding_bytes(self.used_space().wrapping_add(len), alignment);
        let at = self.make_space(pad)?;
        self.buf[at..at + pad].fill(0);
        Ok(())
    }

    fn push<T: Scalar>(&mut self, value: T) -> Result<usize> {
        self.align(T::SIZE, T::SIZE)?;
        let at = self.make_space(T::SIZE)?;
        value.write_le(&mut self.buf[at..]);
        Ok(self.used_space())
    }

    /// Write a u32 reference to `target`, relative to the reference's own position.
    fn push_uoffset(&mut self, target: usize) -> Result<usize> {
        self.align(SIZE_UOFFSET, SIZE_UOFFSET)?;
        let delta = self.used_space() + SIZE_UOFFSET - target;
        self.push(delta as u32)
    }

    // ── Guards ─────────────────────────────────────────────────────────────

    fn check_writable(&self) -> Result<()> {
        if self.finished {
            return Err(Misuse::AlreadyFinished.into());
        }
        Ok(())
    }

    fn check_outside_table(&self) -> Result<()> {
        self.check_writable()?;
        if self.table_start.is_some() {
            return Err(Misuse::WriteInsideTable.into());
        }
        Ok(())
    }

    fn open_table(&self) -> Result<usize> {
        self.check_writable()?;
        self.table_start.ok_or(Error::WriterMisuse(Misuse::NotInTable))
    }

    fn check_finished_table(&self, off: Offset<TableRef>) -> Result<usize> {
        let off = off.value as usize;
        if self.tables.binary_search(&off).is_err() {
            return Err(Misuse::UnfinishedReference.into());
        }
        Ok(off)
    }

    fn check_unset(&self, slot: u16) -> Result<u16> {
        let voffset = layout::voffset(slot);
        if self.fields.iter().any(|f| f.voffset == voffset) {
            return Err(Misuse::DuplicateSlot(slot).into());
        }
        Ok(voffset)
    }

    fn slot_kind(slot: u16) -> Result<&'static FieldKind> {
        layout::slot(slot)
            .map(|s| &s.kind)
            .ok_or(Error::WriterMisuse(Misuse::UnknownSlot(slot)))
    }

    // ── Objects ────────────────────────────────────────────────────────────

    /// Append a length-prefixed UTF-8 string followed by a zero byte that is
    /// not counted in the length.
    pub fn create_string(&mut self, text: &str) -> Result<Offset<StrRef>> {
        self.check_outside_table()?;
        if self.opts.dedup_strings {
            if let Some(&off) = self.strings.get(text) {
                return Ok(Offset::new(off as u32));
            }
        }

        let bytes = text.as_bytes();
        self.align(bytes.len().saturating_add(1), SIZE_UOFFSET)?;
        let at = self.make_space(1)?;
        self.buf[at] = 0;
        let at = self.make_space(bytes.len())?;
        self.buf[at..at + bytes.len()].copy_from_slice(bytes);
        let off = self.push(bytes.len() as u32)?;
        self.strings_done.push(off);

        if self.opts.dedup_strings {
            self.strings.insert(text.to_owned(), off);
        }
        Ok(Offset::new(off as u32))
    }

    /// Append a count-prefixed vector of references to finished tables, in
    /// the caller's order.
    pub fn create_vector_of_tables(
        &mut self,
        items: &[Offset<TableRef>],
    ) -> Result<Offset<VecRef>> {
        self.check_outside_table()?;
        for &item in items {
            self.check_finished_table(item)?;
        }

        let body = items
            .len()
            .checked_mul(SIZE_UOFFSET)
            .ok_or(Error::BufferTooLarge {
                len: usize::MAX,
                max: MAX_BUFFER_SIZE,
            })?;
        self.align(body, SIZE_UOFFSET)?;
        for item in items.iter().rev() {
            self.push_uoffset(item.value as usize)?;
        }
        let off = self.push(items.len() as u32)?;
        self.vectors_done.push(off);
        Ok(Offset::new(off as u32))
    }

    // ── Tables ─────────────────────────────────────────────────────────────

    pub fn start_table(&mut self) -> Result<()> {
        self.check_writable()?;
        if self.table_start.is_some() {
            return Err(Misuse::NestedTable.into());
        }
        self.fields.clear();
        self.table_start = Some(self.used_space());
        Ok(())
    }

    /// Record a fixed-width field. Values equal to `default` are left out
    /// unless `force_defaults` is set; readers see the default either way.
    /// A slot already written in the open table is rejected.
    pub fn push_slot<T: Scalar>(&mut self, slot: u16, value: T, default: T) -> Result<()> {
        self.open_table()?;
        match Self::slot_kind(slot)? {
            FieldKind::Scalar { width, .. } if *width == T::SIZE => {}
            _ => return Err(Misuse::SlotKind(slot).into()),
        }
        let voffset = self.check_unset(slot)?;
        if value == default && !self.opts.force_defaults {
            return Ok(());
        }
        let off = self.push(value)?;
        self.fields.push(FieldLoc { voffset, off });
        Ok(())
    }

    /// Record a reference to a string or vector this builder finished before
    /// the table was started.
    pub fn push_slot_offset<T: SlotReferent>(
        &mut self,
        slot: u16,
        target: Offset<T>,
    ) -> Result<()> {
        self.open_table()?;
        if !T::fits(Self::slot_kind(slot)?) {
            return Err(Misuse::SlotKind(slot).into());
        }
        let voffset = self.check_unset(slot)?;
        let target = target.value as usize;
        if T::finished(self).binary_search(&target).is_err() {
            return Err(Misuse::UnfinishedReference.into());
        }
        let off = self.push_uoffset(target)?;
        self.fields.push(FieldLoc { voffset, off });
        Ok(())
    }

    /// Close the open table: write its vtable (or reuse an identical one)
    /// and patch the table's leading signed offset to point at it.
    pub fn end_table(&mut self) -> Result<Offset<TableRef>> {
        let start = self.open_table()?;
        let object = self.push(0i32)?;
        let table_len = u16::try_from(object - start).map_err(|_| Error::BufferTooLarge {
            len: object - start,
            max: u16::MAX as usize,
        })?;

        let vt_len = self
            .fields
            .iter()
            .map(|f| f.voffset as usize + SIZE_VOFFSET)
            .max()
            .unwrap_or(VTABLE_HEADER_SIZE)
            .max(VTABLE_HEADER_SIZE);
        let mut vtable = vec![0u8; vt_len];
        (vt_len as u16).write_le(&mut vtable[0..]);
        table_len.write_le(&mut vtable[SIZE_VOFFSET..]);
        for field in &self.fields {
            let pos = field.voffset as usize;
            ((object - field.off) as u16).write_le(&mut vtable[pos..]);
        }

        let total = self.buf.len();
        let existing = self.vtables.iter().copied().find(|&vt| {
            let at = total - vt;
            self.buf.get(at..at + vt_len) == Some(&vtable[..])
        });
        let vt_use = match existing {
            Some(vt) => vt,
            None => {
                let at = self.make_space(vt_len)?;
                self.buf[at..at + vt_len].copy_from_slice(&vtable);
                let vt = self.used_space();
                self.vtables.push(vt);
                vt
            }
        };

        let soffset = (vt_use as i64 - object as i64) as i32;
        let at = self.buf.len() - object;
        soffset.write_le(&mut self.buf[at..at + SIZE_SOFFSET]);

        self.fields.clear();
        self.table_start = None;
        self.tables.push(object);
        Ok(Offset::new(object as u32))
    }

    // ── Finishing ──────────────────────────────────────────────────────────

    /// Write the root reference at the front of the buffer. No further writes
    /// are accepted until [`reset`](Self::reset).
    pub fn finish(&mut self, root: Offset<TableRef>) -> Result<()> {
        self.check_outside_table()?;
        let root = self.check_finished_table(root)?;
        let align = self.min_align.max(SIZE_UOFFSET);
        self.align(SIZE_UOFFSET, align)?;
        self.push_uoffset(root)?;
        self.finished = true;
        tracing::trace!(len = self.used_space(), "scene buffer finished");
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The finished buffer, starting with the root reference.
    pub fn finished_data(&self) -> Result<&[u8]> {
        if !self.finished {
            return Err(Misuse::NotFinished.into());
        }
        Ok(&self.buf[self.head..])
    }

    /// Consume the builder and return the finished buffer.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        if !self.finished {
            return Err(Misuse::NotFinished.into());
        }
        let mut buf = self.buf;
        buf.drain(..self.head);
        Ok(buf)
    }
}
