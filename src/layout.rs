//! Field layout of the `Node` table.
//!
//! The schema is expressed once as data. The builder, the reader and the
//! verifier all consult [`NODE_LAYOUT`]; none of them hard-code a field
//! position.
//!
//! Slot identifiers are append-only. A slot is never renumbered or reused, so
//! a buffer written against an older layout (shorter vtable) reads the
//! missing slots as default/absent, and a buffer from a newer layout (longer
//! vtable) simply has its extra slots ignored.
//!
//! | Slot | Field       | Storage                 | Default |
//! |------|-------------|-------------------------|---------|
//! | 0    | Class       | string offset           | absent  |
//! | 1    | ID          | i32                     | 0       |
//! | 2    | Name        | string offset           | absent  |
//! | 3    | CSS         | string offset           | absent  |
//! | 4    | X           | i32                     | 0       |
//! | 5    | Y           | i32                     | 0       |
//! | 6    | RectangleX  | i32                     | 0       |
//! | 7    | RectangleY  | i32                     | 0       |
//! | 8    | IsVisible   | u8                      | 0       |
//! | 9    | LabelText   | string offset           | absent  |
//! | 10   | Children    | vector of table offsets | absent  |

use serde::Serialize;

/// Byte offset of the first field entry inside a vtable (after the two
/// u16 size entries).
pub const VTABLE_HEADER_SIZE: usize = 4;

/// Width of a relative reference (string, vector, table) on the wire.
pub const SIZE_UOFFSET: usize = 4;

/// Width of the signed table-to-vtable offset at the start of every table.
pub const SIZE_SOFFSET: usize = 4;

/// Width of one vtable entry.
pub const SIZE_VOFFSET: usize = 2;

/// How a slot's value is stored in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Inline fixed-width value, read as `default` when absent.
    Scalar { width: usize, default: i64 },
    /// Relative offset to a length-prefixed UTF-8 string.
    String,
    /// Relative offset to a count-prefixed vector of table offsets.
    VectorOfTables,
}

impl FieldKind {
    /// Bytes the field occupies inside the table itself.
    pub const fn inline_size(&self) -> usize {
        match self {
            FieldKind::Scalar { width, .. } => *width,
            FieldKind::String | FieldKind::VectorOfTables => SIZE_UOFFSET,
        }
    }
}

/// One declared field of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub id: u16,
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Slot {
    /// Byte position of this slot's entry inside a vtable.
    pub const fn voffset(&self) -> u16 {
        voffset(self.id)
    }
}

/// Byte position of slot `id`'s entry inside a vtable.
#[inline]
pub const fn voffset(id: u16) -> u16 {
    (VTABLE_HEADER_SIZE + id as usize * SIZE_VOFFSET) as u16
}

/// Named slots of the `Node` table, in slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u16)]
pub enum NodeField {
    Class = 0,
    Id = 1,
    Name = 2,
    Css = 3,
    X = 4,
    Y = 5,
    RectangleX = 6,
    RectangleY = 7,
    IsVisible = 8,
    LabelText = 9,
    Children = 10,
}

impl NodeField {
    pub const ALL: [NodeField; NODE_SLOT_COUNT] = [
        NodeField::Class,
        NodeField::Id,
        NodeField::Name,
        NodeField::Css,
        NodeField::X,
        NodeField::Y,
        NodeField::RectangleX,
        NodeField::RectangleY,
        NodeField::IsVisible,
        NodeField::LabelText,
        NodeField::Children,
    ];

    #[inline]
    pub const fn id(self) -> u16 {
        self as u16
    }

    #[inline]
    pub fn slot(self) -> &'static Slot {
        &NODE_LAYOUT[self as usize]
    }

    #[inline]
    pub const fn voffset(self) -> u16 {
        voffset(self as u16)
    }
}

pub const NODE_SLOT_COUNT: usize = 11;

const fn i32_slot(id: u16, name: &'static str) -> Slot {
    Slot {
        id,
        name,
        kind: FieldKind::Scalar {
            width: 4,
            default: 0,
        },
    }
}

const fn string_slot(id: u16, name: &'static str) -> Slot {
    Slot {
        id,
        name,
        kind: FieldKind::String,
    }
}

/// The `Node` layout. Index `i` holds slot `i`.
pub static NODE_LAYOUT: [Slot; NODE_SLOT_COUNT] = [
    string_slot(0, "Class"),
    i32_slot(1, "ID"),
    string_slot(2, "Name"),
    string_slot(3, "CSS"),
    i32_slot(4, "X"),
    i32_slot(5, "Y"),
    i32_slot(6, "RectangleX"),
    i32_slot(7, "RectangleY"),
    Slot {
        id: 8,
        name: "IsVisible",
        kind: FieldKind::Scalar {
            width: 1,
            default: 0,
        },
    },
    string_slot(9, "LabelText"),
    Slot {
        id: 10,
        name: "Children",
        kind: FieldKind::VectorOfTables,
    },
];

/// Look up a slot by id, `None` if it is not part of the layout.
pub fn slot(id: u16) -> Option<&'static Slot> {
    NODE_LAYOUT.get(id as usize)
}
