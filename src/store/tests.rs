use super::*;
use crate::hash::HashComputer;
use std::fs;
use tempfile::TempDir;

fn open_store(temp_dir: &TempDir) -> FileStore {
    FileStore::open(temp_dir.path().join("test_store")).unwrap()
}

#[test]
fn test_store_creation() {
    let temp_dir = TempDir::new().unwrap();
    let store_path = temp_dir.path().join("test_store");
    let store = FileStore::open(store_path.clone()).unwrap();

    assert_eq!(store.base_path(), store_path);
    assert!(store_path.join("objects").is_dir());
    assert!(store_path.join("temp").is_dir());
}

#[test]
fn test_insert_and_lookup() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);

    let entry = store.insert_reader(&b"hello world"[..], Algorithm::Sha1).unwrap();
    let digest = HashComputer::digest_bytes(b"hello world", Algorithm::Sha1);

    // store/
    //   objects/sha1/2a/ae6c35c94fcfb415dbe95f408b9ce91ee846ed
    let hex = digest.to_hex();
    let expected_path = store
        .base_path()
        .join("objects")
        .join("sha1")
        .join(&hex[..2])
        .join(&hex[2..]);
    assert_eq!(entry.location().as_path(), expected_path);
    assert_eq!(fs::read(entry.location()).unwrap(), b"hello world");

    assert!(store.contains(&digest));
    assert_eq!(store.get(&digest), Some(entry.clone()));
    assert_eq!(entry.sha1().unwrap(), digest);

    // Staging area is left empty
    assert_eq!(fs::read_dir(store.base_path().join("temp")).unwrap().count(), 0);
}

#[test]
fn test_insert_deduplicates() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);

    let first = store.insert_reader(&b"same bytes"[..], Algorithm::Sha256).unwrap();
    let second = store.insert_reader(&b"same bytes"[..], Algorithm::Sha256).unwrap();
    assert_eq!(first, second);
    assert_eq!(store.digests(Algorithm::Sha256).unwrap().len(), 1);
    assert_eq!(fs::read_dir(store.base_path().join("temp")).unwrap().count(), 0);

    // Same content under another algorithm is a separate object
    store.insert_reader(&b"same bytes"[..], Algorithm::Sha1).unwrap();
    assert_eq!(store.digests(Algorithm::Sha1).unwrap().len(), 1);
}

#[test]
fn test_insert_file_copies_source() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);
    let source = temp_dir.path().join("source.txt");
    fs::write(&source, "content1").unwrap();

    let entry = store.insert_file(&source, Algorithm::Sha512).unwrap();
    assert_ne!(entry.location().as_path(), source);
    assert!(source.exists());
    assert_eq!(
        entry.current_digest(Algorithm::Sha512).unwrap(),
        FileStoreEntry::new(source.into()).current_digest(Algorithm::Sha512).unwrap()
    );

    let missing = temp_dir.path().join("missing.txt");
    assert!(store.insert_file(&missing, Algorithm::Sha1).unwrap_err().is_unavailable());
}

#[test]
fn test_get_missing() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);
    let digest = HashComputer::digest_bytes(b"never stored", Algorithm::Sha1);

    assert!(store.get(&digest).is_none());
    assert!(!store.contains(&digest));
    assert!(store.verify(&digest).unwrap_err().is_unavailable());
}

#[test]
fn test_verify_detects_corruption() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);
    let entry = store.insert_reader(&b"pristine"[..], Algorithm::Sha256).unwrap();
    let digest = HashComputer::digest_bytes(b"pristine", Algorithm::Sha256);
    assert!(store.verify(&digest).unwrap());

    let path = entry.location().as_path();
    let mut permissions = fs::metadata(path).unwrap().permissions();
    assert!(permissions.readonly());
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions).unwrap();
    fs::write(path, b"tampered").unwrap();

    assert!(!store.verify(&digest).unwrap());
    assert!(!entry.matches(&digest).unwrap());
}

#[test]
fn test_remove_invalidates_entries() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);
    let entry = store.insert_reader(&b"short lived"[..], Algorithm::Sha1).unwrap();
    let digest = entry.sha1().unwrap();

    assert!(store.remove(&digest).unwrap());
    assert!(!store.remove(&digest).unwrap());
    assert!(store.get(&digest).is_none());
    assert!(entry.sha1().unwrap_err().is_unavailable());
}

#[test]
fn test_digests_lists_sorted_and_skips_strays() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);

    let mut expected: Vec<DigestValue> = ["a", "b", "c", "d"]
        .iter()
        .map(|content| {
            store
                .insert_reader(content.as_bytes(), Algorithm::Sha1)
                .unwrap()
                .sha1()
                .unwrap()
        })
        .collect();
    expected.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

    let stray_dir = store.base_path().join("objects").join("sha1").join("zz");
    fs::create_dir_all(&stray_dir).unwrap();
    fs::write(stray_dir.join("not-a-digest"), "junk").unwrap();

    // Valid hex, but not where `object_path` would put it
    let empty = HashComputer::digest_bytes(b"", Algorithm::Sha1);
    let upper_hex = empty.to_hex().to_uppercase();
    let upper_dir = store.base_path().join("objects").join("sha1").join(&upper_hex[..2]);
    fs::create_dir_all(&upper_dir).unwrap();
    fs::write(upper_dir.join(&upper_hex[2..]), "").unwrap();
    let short_dir = store.base_path().join("objects").join("sha1").join("d");
    fs::create_dir_all(&short_dir).unwrap();
    fs::write(short_dir.join(&empty.to_hex()[1..]), "").unwrap();

    let listed = store.digests(Algorithm::Sha1).unwrap();
    assert_eq!(listed, expected);
    assert!(!listed.contains(&empty));
    for digest in &listed {
        assert!(store.contains(digest));
        assert!(store.verify(digest).unwrap());
    }
    assert!(store.digests(Algorithm::Sha512).unwrap().is_empty());
}

/// Yields some bytes and then fails, like a source file that disappears.
struct BrokenSource {
    remaining: usize,
}

impl Read for BrokenSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "source truncated"));
        }
        let n = self.remaining.min(buf.len());
        buf[..n].fill(b'x');
        self.remaining -= n;
        Ok(n)
    }
}

#[test]
fn test_insert_source_failure_is_unavailable() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_store(&temp_dir);

    let err = store
        .insert_reader(BrokenSource { remaining: 10_000 }, Algorithm::Sha256)
        .unwrap_err();
    assert!(err.is_unavailable());
    assert!(!matches!(err, Error::Store { .. }));

    // Nothing stored and nothing left in staging
    assert!(store.digests(Algorithm::Sha256).unwrap().is_empty());
    assert_eq!(fs::read_dir(store.base_path().join("temp")).unwrap().count(), 0);
}
