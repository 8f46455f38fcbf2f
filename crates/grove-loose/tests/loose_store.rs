use std::fs;
use std::io::Read;

use grove_loose::{LooseError, LooseStore};
use grove_object::ObjectKind;
use proptest::prelude::*;

fn store() -> (tempfile::TempDir, LooseStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = LooseStore::new(dir.path().join("objects"));
    (dir, store)
}

#[test]
fn write_read_hello() {
    let (_dir, store) = store();
    let oid = store.write(ObjectKind::Blob, b"hello").unwrap();
    assert_eq!(oid.to_hex(), "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");
    let (kind, data) = store.read(&oid).unwrap().unwrap();
    assert_eq!(kind, ObjectKind::Blob);
    assert_eq!(data, b"hello");
    assert!(store.contains(&oid));
}

#[test]
fn second_write_is_idempotent() {
    let (_dir, store) = store();
    let a = store.write(ObjectKind::Blob, b"same").unwrap();
    let mtime = fs::metadata(store.path_of(&a)).unwrap().modified().unwrap();
    let b = store.write(ObjectKind::Blob, b"same").unwrap();
    assert_eq!(a, b);
    assert_eq!(
        fs::metadata(store.path_of(&a)).unwrap().modified().unwrap(),
        mtime
    );
    assert_eq!(store.list().unwrap(), vec![a]);
}

#[test]
fn missing_object_is_none() {
    let (_dir, store) = store();
    let oid = grove_hash::ObjectId::new([0x42; 20]);
    assert!(store.read(&oid).unwrap().is_none());
    assert!(store.read_header(&oid).unwrap().is_none());
}

#[test]
fn flipped_byte_is_corruption() {
    let (_dir, store) = store();
    let oid = store.write(ObjectKind::Blob, b"precious content").unwrap();
    let path = store.path_of(&oid);
    let mut bytes = fs::read(&path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x01;
    let mut perms = fs::metadata(&path).unwrap().permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);
    fs::set_permissions(&path, perms).unwrap();
    fs::write(&path, &bytes).unwrap();

    let err = store.read(&oid).unwrap_err();
    assert!(err.is_corruption(), "unexpected error: {err}");
}

#[test]
fn swapped_content_is_hash_mismatch() {
    let (_dir, store) = store();
    let a = store.write(ObjectKind::Blob, b"aaa").unwrap();
    let b = store.write(ObjectKind::Blob, b"bbb").unwrap();
    let a_path = store.path_of(&a);
    let mut perms = fs::metadata(&a_path).unwrap().permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);
    fs::set_permissions(&a_path, perms).unwrap();
    fs::copy(store.path_of(&b), &a_path).unwrap();

    match store.read(&a) {
        Err(LooseError::HashMismatch { expected, actual }) => {
            assert_eq!(expected, a);
            assert_eq!(actual, b);
        }
        other => panic!("expected hash mismatch, got {other:?}"),
    }
}

#[test]
fn stream_yields_payload_only() {
    let (_dir, store) = store();
    let payload = vec![7u8; 100_000];
    let oid = store.write(ObjectKind::Blob, &payload).unwrap();
    let (kind, size, mut reader) = store.stream(&oid).unwrap().unwrap();
    assert_eq!((kind, size), (ObjectKind::Blob, payload.len()));
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(out, payload);
}

#[test]
fn remove_then_list() {
    let (_dir, store) = store();
    let a = store.write(ObjectKind::Blob, b"one").unwrap();
    let b = store.write(ObjectKind::Blob, b"two").unwrap();
    store.remove(&a).unwrap();
    store.remove(&a).unwrap();
    assert_eq!(store.list().unwrap(), vec![b]);
}

proptest! {
    #[test]
    fn put_get_round_trip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let (_dir, store) = store();
        let first = store.write(ObjectKind::Blob, &data).unwrap();
        let second = store.write(ObjectKind::Blob, &data).unwrap();
        prop_assert_eq!(first, second);
        let (_, back) = store.read(&first).unwrap().unwrap();
        prop_assert_eq!(back, data);
    }
}
