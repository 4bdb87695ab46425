#![allow(dead_code)]

use scenegraph_wire::{NodeData, NodeField};

pub fn u16_at(buf: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([buf[pos], buf[pos + 1]])
}

pub fn u32_at(buf: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap())
}

pub fn i32_at(buf: &[u8], pos: usize) -> i32 {
    i32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap())
}

pub fn put_u16(buf: &mut [u8], pos: usize, v: u16) {
    buf[pos..pos + 2].copy_from_slice(&v.to_le_bytes());
}

pub fn put_u32(buf: &mut [u8], pos: usize, v: u32) {
    buf[pos..pos + 4].copy_from_slice(&v.to_le_bytes());
}

pub fn put_i32(buf: &mut [u8], pos: usize, v: i32) {
    buf[pos..pos + 4].copy_from_slice(&v.to_le_bytes());
}

/// Position of the root table.
pub fn root_table(buf: &[u8]) -> usize {
    u32_at(buf, 0) as usize
}

/// Position of the vtable of the table at `table`.
pub fn vtable_of(buf: &[u8], table: usize) -> usize {
    (table as i64 - i32_at(buf, table) as i64) as usize
}

/// Absolute position of `field` inside the table at `table`; panics if absent.
pub fn field_pos(buf: &[u8], table: usize, field: NodeField) -> usize {
    let vt = vtable_of(buf, table);
    let off = u16_at(buf, vt + field.voffset() as usize) as usize;
    assert_ne!(off, 0, "{:?} absent", field);
    table + off
}

/// Follow the u32 reference stored at `pos`.
pub fn deref(buf: &[u8], pos: usize) -> usize {
    pos + u32_at(buf, pos) as usize
}

/// Root `ID=42 "root"` visible, with one invisible child `ID=1 "leaf"`.
pub fn root_and_leaf() -> NodeData {
    NodeData {
        id: 42,
        name: Some("root".into()),
        is_visible: true,
        children: Some(vec![NodeData {
            id: 1,
            name: Some("leaf".into()),
            is_visible: false,
            ..NodeData::default()
        }]),
        ..NodeData::default()
    }
}

/// A chain of `depth` nodes, each the only child of the previous one.
pub fn chain(depth: usize) -> NodeData {
    let mut node = NodeData {
        id: depth as i32,
        ..NodeData::default()
    };
    for id in (1..depth).rev() {
        node = NodeData {
            id: id as i32,
            children: Some(vec![node]),
            ..NodeData::default()
        };
    }
    node
}
