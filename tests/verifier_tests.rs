mod common;

use common::{
    chain, deref, field_pos, put_i32, put_u16, put_u32, root_and_leaf, root_table, u32_at,
    vtable_of,
};
use scenegraph_wire::{
    Builder, Error, NodeArgs, NodeData, NodeField, VerifierOptions, create_node, from_bytes, root,
    root_unchecked, root_with_opts, to_bytes, verify, verify_with_opts,
};

fn valid() -> Vec<u8> {
    to_bytes(&root_and_leaf()).unwrap()
}

/// Run `corrupt` on a fresh valid buffer and return the verification result.
fn corrupted(corrupt: impl FnOnce(&mut Vec<u8>)) -> Result<(), Error> {
    let mut buf = valid();
    corrupt(&mut buf);
    verify(&buf)
}

fn leaf_table(buf: &[u8]) -> usize {
    let children = deref(buf, field_pos(buf, root_table(buf), NodeField::Children));
    deref(buf, children + 4)
}

#[test]
fn test_writer_output_verifies() {
    for node in [NodeData::default(), root_and_leaf(), chain(30)] {
        verify(&to_bytes(&node).unwrap()).unwrap();
    }
}

#[test]
fn test_ten_byte_truncated_buffer() {
    let bytes = to_bytes(&NodeData {
        id: 42,
        ..NodeData::default()
    })
    .unwrap();
    let err = verify(&bytes[..10]).unwrap_err();
    assert!(
        matches!(err, Error::TruncatedBuffer { .. } | Error::OutOfBounds { .. }),
        "{:?}",
        err
    );
}

#[test]
fn test_table_body_cut_off() {
    let bytes = to_bytes(&NodeData {
        id: 42,
        ..NodeData::default()
    })
    .unwrap();
    // root offset, vtable and soffset survive; the ID does not
    assert_eq!(
        verify(&bytes[..18]),
        Err(Error::TruncatedBuffer {
            needed: 20,
            available: 18
        })
    );
}

#[test]
fn test_short_and_empty_buffers() {
    assert_eq!(
        verify(&[]),
        Err(Error::TruncatedBuffer {
            needed: 4,
            available: 0
        })
    );
    assert!(matches!(verify(&[4, 0, 0]), Err(Error::TruncatedBuffer { .. })));
    assert!(matches!(verify(&[4, 0, 0, 0]), Err(Error::OutOfBounds { .. })));
}

#[test]
fn test_every_truncation_is_rejected() {
    let buf = valid();
    // the last four bytes are the terminator and padding of the first string
    let meaningful = buf.len() - 4;
    verify(&buf[..meaningful]).unwrap();
    for cut in 0..meaningful {
        assert!(verify(&buf[..cut]).is_err(), "prefix of {} bytes accepted", cut);
    }
}

#[test]
fn test_trailing_bytes_are_allowed() {
    let mut buf = valid();
    buf.extend_from_slice(&[0xAB; 13]);
    assert_eq!(from_bytes(&buf).unwrap(), root_and_leaf());
}

// ── Corrupted offsets and lengths ──────────────────────────────────────────

#[test]
fn test_root_offset_out_of_range() {
    let len = valid().len() as u32;
    assert!(matches!(
        corrupted(|b| put_u32(b, 0, len)),
        Err(Error::OutOfBounds { .. })
    ));
    assert!(matches!(
        corrupted(|b| put_u32(b, 0, u32::MAX - 2)),
        Err(Error::OutOfBounds { .. })
    ));
}

#[test]
fn test_vtable_before_buffer_start() {
    let result = corrupted(|b| {
        let table = root_table(b);
        put_i32(b, table, i32::MAX);
    });
    assert!(matches!(result, Err(Error::MalformedVtable { .. })));
}

#[test]
fn test_vtable_past_buffer_end() {
    let result = corrupted(|b| {
        let table = root_table(b);
        let len = b.len() as i32;
        put_i32(b, table, -len);
    });
    assert!(matches!(result, Err(Error::OutOfBounds { .. })));
}

#[test]
fn test_vtable_length_inconsistent() {
    for bad in [0u16, 2, 5] {
        let result = corrupted(|b| {
            let vt = vtable_of(b, root_table(b));
            put_u16(b, vt, bad);
        });
        assert!(matches!(result, Err(Error::MalformedVtable { .. })), "{}", bad);
    }
    let result = corrupted(|b| {
        let vt = vtable_of(b, root_table(b));
        put_u16(b, vt, 0xFFFE);
    });
    assert!(result.is_err());
}

#[test]
fn test_table_length_inconsistent() {
    let result = corrupted(|b| {
        let vt = vtable_of(b, root_table(b));
        put_u16(b, vt + 2, 2);
    });
    assert!(matches!(result, Err(Error::MalformedVtable { .. })));

    let result = corrupted(|b| {
        let vt = vtable_of(b, root_table(b));
        put_u16(b, vt + 2, 0xFFFF);
    });
    assert!(matches!(
        result,
        Err(Error::TruncatedBuffer { .. } | Error::OutOfBounds { .. })
    ));
}

#[test]
fn test_field_outside_table() {
    let result = corrupted(|b| {
        let table = root_table(b);
        let vt = vtable_of(b, table);
        let table_len = u16::from_le_bytes([b[vt + 2], b[vt + 3]]);
        put_u16(b, vt + NodeField::Name.voffset() as usize, table_len);
    });
    assert!(matches!(result, Err(Error::MalformedVtable { .. })));

    let result = corrupted(|b| {
        let vt = vtable_of(b, root_table(b));
        put_u16(b, vt + NodeField::Id.voffset() as usize, 2);
    });
    assert!(matches!(result, Err(Error::MalformedVtable { .. })));
}

#[test]
fn test_string_length_past_end() {
    let result = corrupted(|b| {
        let name = deref(b, field_pos(b, root_table(b), NodeField::Name));
        put_u32(b, name, u32::MAX);
    });
    assert!(matches!(result, Err(Error::TruncatedBuffer { .. })));
}

#[test]
fn test_string_offset_past_end() {
    let result = corrupted(|b| {
        let field = field_pos(b, root_table(b), NodeField::Name);
        let len = b.len() as u32;
        put_u32(b, field, len);
    });
    assert!(matches!(result, Err(Error::OutOfBounds { .. })));
}

#[test]
fn test_invalid_utf8_string() {
    let result = corrupted(|b| {
        let name = deref(b, field_pos(b, root_table(b), NodeField::Name));
        b[name + 4] = 0xFF;
    });
    assert!(matches!(result, Err(Error::InvalidUtf8 { .. })));
}

#[test]
fn test_unchecked_reader_never_yields_invalid_text() {
    let mut buf = valid();
    let name = deref(&buf, field_pos(&buf, root_table(&buf), NodeField::Name));
    buf[name + 4] = 0xFF;
    assert!(verify(&buf).is_err());

    let node = root_unchecked(&buf);
    assert_eq!(node.name(), None);
    assert_eq!(node.id(), 42);
}

#[test]
fn test_children_count_past_end() {
    let result = corrupted(|b| {
        let children = deref(b, field_pos(b, root_table(b), NodeField::Children));
        put_u32(b, children, 0x4000_0000);
    });
    assert!(matches!(result, Err(Error::TruncatedBuffer { .. })));

    let result = corrupted(|b| {
        let children = deref(b, field_pos(b, root_table(b), NodeField::Children));
        put_u32(b, children, u32::MAX);
    });
    assert!(result.is_err());
}

#[test]
fn test_child_offset_past_end() {
    let result = corrupted(|b| {
        let children = deref(b, field_pos(b, root_table(b), NodeField::Children));
        put_u32(b, children + 4, 0x7FFF_FFFF);
    });
    assert!(matches!(result, Err(Error::OutOfBounds { .. })));
}

#[test]
fn test_child_offset_mid_structure() {
    // aim the child reference at the characters of the leaf's own name
    let result = corrupted(|b| {
        let leaf = leaf_table(b);
        let text = deref(b, field_pos(b, leaf, NodeField::Name)) + 4;
        let element = deref(b, field_pos(b, root_table(b), NodeField::Children)) + 4;
        put_u32(b, element, (text - element) as u32);
    });
    assert!(matches!(result, Err(Error::MalformedVtable { .. })));
}

#[test]
fn test_corrupted_leaf_is_caught() {
    let result = corrupted(|b| {
        let leaf = leaf_table(b);
        let name = deref(b, field_pos(b, leaf, NodeField::Name));
        put_u32(b, name, 0xFFFF);
    });
    assert!(matches!(result, Err(Error::TruncatedBuffer { .. })));
}

#[test]
fn test_rejection_leaves_buffer_untouched() {
    let mut buf = valid();
    let field = field_pos(&buf, root_table(&buf), NodeField::Name);
    let len = buf.len() as u32;
    put_u32(&mut buf, field, len);
    let before = buf.clone();
    assert!(root(&buf).is_err());
    assert_eq!(buf, before);
}

// ── Budgets ────────────────────────────────────────────────────────────────

#[test]
fn test_depth_within_budget() {
    let opts = VerifierOptions {
        max_depth: 64,
        ..VerifierOptions::default()
    };
    let bytes = to_bytes(&chain(64)).unwrap();
    let node = root_with_opts(&bytes, &opts).unwrap();
    assert_eq!(node.descendants().count(), 64);
}

#[test]
fn test_depth_exceeded() {
    let bytes = to_bytes(&chain(65)).unwrap();
    assert_eq!(verify(&bytes), Err(Error::DepthExceeded { limit: 64 }));

    let opts = VerifierOptions {
        max_depth: 3,
        ..VerifierOptions::default()
    };
    let bytes = to_bytes(&chain(4)).unwrap();
    assert_eq!(
        verify_with_opts(&bytes, &opts),
        Err(Error::DepthExceeded { limit: 3 })
    );
    let opts = VerifierOptions {
        max_depth: 100,
        ..VerifierOptions::default()
    };
    verify_with_opts(&to_bytes(&chain(65)).unwrap(), &opts).unwrap();
}

#[test]
fn test_shared_subtree_fanout_hits_table_budget() {
    // every level lists the level below twice: 2^40 reachable tables in a
    // buffer of a few hundred bytes
    let mut fbb = Builder::new();
    let mut below = create_node(&mut fbb, &NodeArgs::default()).unwrap();
    for id in 0..40 {
        let kids = fbb.create_vector_of_tables(&[below, below]).unwrap();
        below = create_node(
            &mut fbb,
            &NodeArgs {
                id,
                children: Some(kids),
                ..NodeArgs::default()
            },
        )
        .unwrap();
    }
    fbb.finish(below).unwrap();
    let bytes = fbb.finished_data().unwrap();
    assert!(bytes.len() < 2048);

    let opts = VerifierOptions {
        max_tables: 10_000,
        ..VerifierOptions::default()
    };
    assert_eq!(
        verify_with_opts(bytes, &opts),
        Err(Error::DepthExceeded { limit: 10_000 })
    );
}

#[test]
fn test_buffer_size_limit() {
    let bytes = valid();
    let opts = VerifierOptions {
        max_buffer_size: bytes.len() - 1,
        ..VerifierOptions::default()
    };
    assert_eq!(
        verify_with_opts(&bytes, &opts),
        Err(Error::BufferTooLarge {
            len: bytes.len(),
            max: bytes.len() - 1
        })
    );
}

// ── Schema evolution ───────────────────────────────────────────────────────

fn le16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn le32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[test]
fn test_older_shorter_vtable_reads_defaults() {
    // vtable only knows slots 0 (Class) and 1 (ID)
    let mut buf = Vec::new();
    le32(&mut buf, 12); // root
    le16(&mut buf, 8); // vtable length
    le16(&mut buf, 8); // table length
    le16(&mut buf, 0); // Class absent
    le16(&mut buf, 4); // ID at +4
    le32(&mut buf, 8); // soffset
    le32(&mut buf, 42); // ID

    let node = root(&buf).unwrap();
    assert_eq!(node.id(), 42);
    assert_eq!(node.name(), None);
    assert_eq!(node.x(), 0);
    assert!(!node.is_visible());
    assert!(node.children().is_none());
}

#[test]
fn test_newer_unknown_slot_is_ignored() {
    // vtable carries a twelfth slot this layout does not know
    let vt_len = 4 + 2 * 12;
    let mut buf = Vec::new();
    le32(&mut buf, 4 + vt_len as u32); // root
    le16(&mut buf, vt_len as u16);
    le16(&mut buf, 12); // table: soffset, ID, unknown i32
    le16(&mut buf, 0); // Class
    le16(&mut buf, 4); // ID
    for _ in 2..11 {
        le16(&mut buf, 0);
    }
    le16(&mut buf, 8); // slot 11
    le32(&mut buf, vt_len as u32); // soffset
    le32(&mut buf, 7); // ID
    le32(&mut buf, 0xDEAD_BEEF); // unknown field

    let node = root(&buf).unwrap();
    assert_eq!(node.id(), 7);
    assert_eq!(node.to_owned_node().id, 7);
    assert_eq!(u32_at(&buf, buf.len() - 4), 0xDEAD_BEEF);
}
