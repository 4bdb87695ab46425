//! Structural verification of untrusted scene buffers.
//!
//! A single pass walks the root table and every table reachable through
//! `Children`, proving each claim the reader later relies on:
//!
//! - the table's signed vtable offset lands inside the buffer;
//! - the vtable's own length and the table length it declares fit the buffer;
//! - every present field lies inside the declared table length;
//! - every string is fully contained and is UTF-8;
//! - every child vector is fully contained and each element points at a
//!   table that is queued for the same checks.
//!
//! The walk keeps an explicit worklist instead of recursing, and stops at the
//! configured nesting depth and total table count. References only ever point
//! forward, so the offset graph cannot contain cycles, but a small buffer can
//! still name one subtree from many vector slots; the table budget bounds that
//! fan-out.

use crate::builder::MAX_BUFFER_SIZE;
use crate::error::{Error, Result};
use crate::layout::{
    FieldKind, NODE_LAYOUT, SIZE_SOFFSET, SIZE_UOFFSET, SIZE_VOFFSET, VTABLE_HEADER_SIZE,
};
use crate::scalar::{Scalar, read_at};
use serde::{Deserialize, Serialize};

/// Limits applied while verifying a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierOptions {
    /// Deepest accepted table nesting; the root is at depth 1.
    pub max_depth: usize,
    /// Most tables visited across the whole buffer.
    pub max_tables: usize,
    /// Largest accepted buffer.
    pub max_buffer_size: usize,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        VerifierOptions {
            max_depth: 64,
            max_tables: 1_000_000,
            max_buffer_size: MAX_BUFFER_SIZE,
        }
    }
}

/// Verify `buf` with the default limits.
pub fn verify(buf: &[u8]) -> Result<()> {
    verify_with_opts(buf, &VerifierOptions::default())
}

/// Verify `buf`. Either the whole buffer is accepted or an error describing
/// the first inconsistency is returned.
pub fn verify_with_opts(buf: &[u8], opts: &VerifierOptions) -> Result<()> {
    let mut verifier = Verifier {
        buf,
        opts,
        tables: 0,
    };
    let result = verifier.run();
    match &result {
        Ok(()) => tracing::trace!(
            len = buf.len(),
            tables = verifier.tables,
            "scene buffer verified"
        ),
        Err(e) => tracing::debug!(len = buf.len(), error = %e, "scene buffer rejected"),
    }
    result
}

struct Verifier<'a> {
    buf: &'a [u8],
    opts: &'a VerifierOptions,
    tables: usize,
}

impl<'a> Verifier<'a> {
    fn run(&mut self) -> Result<()> {
        if self.buf.len() > self.opts.max_buffer_size {
            return Err(Error::BufferTooLarge {
                len: self.buf.len(),
                max: self.opts.max_buffer_size,
            });
        }
        if self.buf.len() < SIZE_UOFFSET {
            return Err(Error::TruncatedBuffer {
                needed: SIZE_UOFFSET,
                available: self.buf.len(),
            });
        }

        let mut pending = Vec::new();
        let root = self.deref(0)?;
        self.enqueue(&mut pending, root, 1)?;
        while let Some((table, depth)) = pending.pop() {
            self.verify_table(table, depth, &mut pending)?;
        }
        Ok(())
    }

    fn enqueue(
        &mut self,
        pending: &mut Vec<(usize, usize)>,
        table: usize,
        depth: usize,
    ) -> Result<()> {
        if depth > self.opts.max_depth {
            return Err(Error::DepthExceeded {
                limit: self.opts.max_depth,
            });
        }
        self.tables += 1;
        if self.tables > self.opts.max_tables {
            return Err(Error::DepthExceeded {
                limit: self.opts.max_tables,
            });
        }
        pending.push((table, depth));
        Ok(())
    }

    // ── Bounds helpers ─────────────────────────────────────────────────────

    fn bounds_error(&self, pos: usize, len: usize) -> Error {
        if pos >= self.buf.len() {
            Error::OutOfBounds {
                position: pos,
                buffer_len: self.buf.len(),
            }
        } else {
            Error::TruncatedBuffer {
                needed: pos.saturating_add(len),
                available: self.buf.len(),
            }
        }
    }

    fn check_range(&self, pos: usize, len: usize) -> Result<()> {
        match pos.checked_add(len) {
            Some(end) if end <= self.buf.len() => Ok(()),
            _ => Err(self.bounds_error(pos, len)),
        }
    }

    fn read<T: Scalar>(&self, pos: usize) -> Result<T> {
        read_at(self.buf, pos).ok_or_else(|| self.bounds_error(pos, T::SIZE))
    }

    /// Follow the u32 reference stored at `pos`.
    fn deref(&self, pos: usize) -> Result<usize> {
        let delta: u32 = self.read(pos)?;
        let target = pos
            .checked_add(delta as usize)
            .filter(|&t| t < self.buf.len())
            .ok_or(Error::OutOfBounds {
                position: pos.saturating_add(delta as usize),
                buffer_len: self.buf.len(),
            })?;
        Ok(target)
    }

    // ── Structures ─────────────────────────────────────────────────────────

    fn verify_table(
        &mut self,
        table: usize,
        depth: usize,
        pending: &mut Vec<(usize, usize)>,
    ) -> Result<()> {
        let soffset: i32 = self.read(table)?;
        let vtable = usize::try_from(table as i64 - soffset as i64).map_err(|_| {
            Error::MalformedVtable {
                table,
                reason: "vtable offset points before the buffer start",
            }
        })?;

        let vt_len: u16 = self.read(vtable)?;
        let table_len: u16 = self.read(vtable + SIZE_VOFFSET)?;
        let (vt_len, table_len) = (vt_len as usize, table_len as usize);
        if vt_len < VTABLE_HEADER_SIZE || vt_len % SIZE_VOFFSET != 0 {
            return Err(Error::MalformedVtable {
                table,
                reason: "vtable length is not a whole number of entries",
            });
        }
        self.check_range(vtable, vt_len)?;
        if table_len < SIZE_SOFFSET {
            return Err(Error::MalformedVtable {
                table,
                reason: "table shorter than its vtable offset",
            });
        }
        self.check_range(table, table_len)?;

        for slot in NODE_LAYOUT.iter() {
            let entry = slot.voffset() as usize;
            if entry + SIZE_VOFFSET > vt_len {
                continue;
            }
            let field: u16 = self.read(vtable + entry)?;
            if field == 0 {
                continue;
            }
            let field = field as usize;
            if field < SIZE_SOFFSET || field + slot.kind.inline_size() > table_len {
                return Err(Error::MalformedVtable {
                    table,
                    reason: "field lies outside the table",
                });
            }

            let pos = table + field;
            match slot.kind {
                FieldKind::Scalar { .. } => {}
                FieldKind::String => self.verify_string(pos)?,
                FieldKind::VectorOfTables => self.verify_children(pos, depth, pending)?,
            }
        }
        Ok(())
    }

    fn verify_string(&self, field: usize) -> Result<()> {
        let start = self.deref(field)?;
        let len: u32 = self.read(start)?;
        let data = start + SIZE_UOFFSET;
        self.check_range(data, len as usize)?;
        std::str::from_utf8(&self.buf[data..data + len as usize])
            .map(|_| ())
            .map_err(|_| Error::InvalidUtf8 { position: start })
    }

    fn verify_children(
        &mut self,
        field: usize,
        depth: usize,
        pending: &mut Vec<(usize, usize)>,
    ) -> Result<()> {
        let start = self.deref(field)?;
        let count: u32 = self.read(start)?;
        let elements = start + SIZE_UOFFSET;
        let body = (count as usize)
            .checked_mul(SIZE_UOFFSET)
            .ok_or_else(|| self.bounds_error(elements, usize::MAX))?;
        self.check_range(elements, body)?;

        for i in 0..count as usize {
            let child = self.deref(elements + i * SIZE_UOFFSET)?;
            self.enqueue(pending, child, depth + 1)?;
        }
        Ok(())
    }
}
