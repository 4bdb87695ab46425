//! # scenegraph-wire
//!
//! A compact, zero-copy, verifiable binary encoding for recursive UI
//! scene-graph nodes.
//!
//! ## Overview
//!
//! A scene is a tree of `Node` tables. The whole tree lives in one contiguous
//! buffer: children are written before their parents, every reference is a
//! relative offset, and the root is reachable from the first four bytes. A
//! buffer can be moved, shared or memory-mapped as-is, and fields are read
//! straight out of it without decoding the tree first.
//!
//! Buffers arriving from elsewhere go through [`verify`] once. Only after it
//! succeeds are accessors used, and they then never fail on malformed data.
//!
//! ## Wire format
//!
//! All integers are little-endian.
//!
//! | Item | Encoding |
//! |------|----------|
//! | Buffer header | u32 offset from byte 0 to the root table |
//! | Table | i32 `soffset`; its vtable lives at `table - soffset` |
//! | Vtable | u16 vtable length, u16 table length, one u16 table offset per slot (`0` = absent) |
//! | `ID`, `X`, `Y`, `RectangleX`, `RectangleY` | 4-byte i32 inside the table |
//! | `IsVisible` | 1 byte inside the table |
//! | String / vector reference | u32 offset relative to the field's own position |
//! | String | u32 byte length + UTF-8 bytes + one zero byte (not counted) |
//! | Vector of tables | u32 count + one u32 offset per element, each relative to itself |
//!
//! The slot table is [`layout::NODE_LAYOUT`].
//!
//! ## Example
//!
//! ```rust
//! use scenegraph_wire::{Builder, NodeArgs, create_node, root};
//!
//! let mut fbb = Builder::new();
//!
//! let leaf_name = fbb.create_string("leaf").unwrap();
//! let leaf = create_node(&mut fbb, &NodeArgs {
//!     id: 1,
//!     name: Some(leaf_name),
//!     ..NodeArgs::default()
//! }).unwrap();
//!
//! let children = fbb.create_vector_of_tables(&[leaf]).unwrap();
//! let root_name = fbb.create_string("root").unwrap();
//! let top = create_node(&mut fbb, &NodeArgs {
//!     id: 42,
//!     name: Some(root_name),
//!     is_visible: true,
//!     children: Some(children),
//!     ..NodeArgs::default()
//! }).unwrap();
//! fbb.finish(top).unwrap();
//!
//! let node = root(fbb.finished_data().unwrap()).unwrap();
//! assert_eq!(node.id(), 42);
//! assert_eq!(node.name(), Some("root"));
//! assert!(node.is_visible());
//!
//! let kid = node.children().unwrap().get(0).unwrap();
//! assert_eq!(kid.name(), Some("leaf"));
//! assert_eq!(kid.class(), None);
//! ```

pub mod builder;
pub mod error;
pub mod layout;
pub mod node;
pub mod scalar;
pub mod table;
pub mod verifier;

pub use builder::{Builder, BuilderOptions, Offset, StrRef, TableRef, VecRef};
pub use error::{Error, Misuse, Result};
pub use layout::NodeField;
pub use node::{
    Children, NodeArgs, NodeBuilder, NodeData, NodeView, create_node, from_bytes, root,
    root_unchecked, root_with_opts, to_bytes,
};
pub use verifier::{VerifierOptions, verify, verify_with_opts};
