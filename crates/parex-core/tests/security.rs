//! Root confinement tests.
//!
//! Every case here is an archive that tries to place a node outside the
//! extraction root, or to destroy the root itself.

#![allow(clippy::unwrap_used)]

use parex_core::ExtractionConfig;
use parex_core::ExtractionError;
use parex_core::extraction::Extractor;
use parex_core::formats::ZipSource;
use parex_core::test_utils::MemoryArchive;
use parex_core::test_utils::ZipTestBuilder;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn layout() -> (TempDir, std::path::PathBuf) {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    fs::create_dir(&root).unwrap();
    (temp, root)
}

fn extract(archive: MemoryArchive, root: &Path) -> Result<(), ExtractionError> {
    Extractor::new(archive, root, ExtractionConfig::default().with_concurrency(2))?
        .extract()
        .map(|_| ())
}

#[test]
fn test_parent_traversal_rejected() {
    let malicious = [
        "../outside.txt",
        "../../outside.txt",
        "foo/../../outside.txt",
        "a/b/../../../outside.txt",
    ];

    for name in malicious {
        let (temp, root) = layout();
        let result = extract(MemoryArchive::new().file(name, b"pwned"), &root);

        assert!(
            matches!(result, Err(ExtractionError::PathEscape { .. })),
            "entry should be rejected: {name}"
        );
        assert!(!temp.path().join("outside.txt").exists(), "{name} escaped");
    }
}

#[test]
fn test_escape_creates_nothing_outside() {
    let (temp, root) = layout();
    let result = extract(
        MemoryArchive::new().file("../evil/dir/payload.txt", b"pwned"),
        &root,
    );

    assert!(matches!(result, Err(ExtractionError::PathEscape { .. })));
    assert!(!temp.path().join("evil").exists());
}

#[test]
fn test_sibling_with_shared_prefix_rejected() {
    let (temp, root) = layout();
    fs::create_dir(temp.path().join("root-evil")).unwrap();

    let result = extract(
        MemoryArchive::new().file("../root-evil/payload.txt", b"pwned"),
        &root,
    );

    assert!(matches!(result, Err(ExtractionError::PathEscape { .. })));
    assert!(!temp.path().join("root-evil/payload.txt").exists());
}

#[test]
fn test_escape_error_names_root() {
    let (_temp, root) = layout();
    let result = extract(MemoryArchive::new().file("../x", b""), &root);

    match result {
        Err(ExtractionError::PathEscape { path, root: reported }) => {
            assert_eq!(reported, root.canonicalize().unwrap());
            assert!(!path.starts_with(&reported));
        }
        other => panic!("expected PathEscape, got {other:?}"),
    }
}

#[test]
fn test_escape_after_valid_entries_stops_extraction() {
    let (temp, root) = layout();
    let archive = MemoryArchive::new()
        .file("ok.txt", b"fine")
        .file("../evil.txt", b"pwned")
        .file("never.txt", b"not reached");

    let result = extract(archive, &root);
    assert!(matches!(result, Err(ExtractionError::PathEscape { .. })));
    assert!(!temp.path().join("evil.txt").exists());
    assert!(!root.join("never.txt").exists());
}

#[test]
#[cfg(unix)]
fn test_absolute_name_lands_under_root() {
    let (_temp, root) = layout();
    extract(
        MemoryArchive::new().file("/tmp/parex-absolute-entry.txt", b"inside"),
        &root,
    )
    .unwrap();

    assert_eq!(
        fs::read(root.join("tmp/parex-absolute-entry.txt")).unwrap(),
        b"inside"
    );
}

#[test]
fn test_inner_parent_components_stay_inside() {
    let (_temp, root) = layout();
    extract(MemoryArchive::new().file("a/../b/./c.txt", b"ok"), &root).unwrap();
    assert_eq!(fs::read(root.join("b/c.txt")).unwrap(), b"ok");
}

#[test]
fn test_file_cannot_replace_root() {
    let (_temp, root) = layout();
    fs::write(root.join("keep.txt"), b"keep").unwrap();

    let result = extract(MemoryArchive::new().symlink(".", "/"), &root);
    assert!(matches!(result, Err(ExtractionError::InvalidArchive(_))));
    assert!(root.join("keep.txt").is_file());
}

#[test]
fn test_root_directory_entry_is_accepted() {
    let (_temp, root) = layout();
    let report = Extractor::new(
        MemoryArchive::new().dir("./").file("f.txt", b"x"),
        &root,
        ExtractionConfig::default(),
    )
    .unwrap()
    .extract()
    .unwrap();

    assert_eq!(report.directories_created, 1);
    assert!(root.join("f.txt").is_file());
}

#[test]
fn test_nul_byte_rejected() {
    let (_temp, root) = layout();
    let result = extract(MemoryArchive::new().file("bad\0name", b""), &root);
    assert!(matches!(result, Err(ExtractionError::PathEscape { .. })));
}

#[test]
fn test_zip_traversal_entry_rejected() {
    let (temp, root) = layout();
    let data = ZipTestBuilder::new()
        .add_file("safe.txt", b"ok")
        .add_file("../../zip-slip.txt", b"pwned")
        .build();

    let source = ZipSource::from_bytes(data).unwrap();
    let result = Extractor::new(source, &root, ExtractionConfig::default())
        .unwrap()
        .extract();

    assert!(matches!(result, Err(ExtractionError::PathEscape { .. })));
    assert!(!temp.path().join("zip-slip.txt").exists());
    assert!(!temp.path().parent().unwrap().join("zip-slip.txt").exists());
}

#[test]
#[cfg(unix)]
fn test_file_through_planted_symlink_rejected() {
    let (temp, root) = layout();
    let outside = temp.path().join("outside");
    fs::create_dir(&outside).unwrap();
    fs::write(outside.join("victim.txt"), b"original").unwrap();

    let archive = MemoryArchive::new()
        .symlink("evil", outside.to_str().unwrap())
        .file("evil/victim.txt", b"pwned");
    let result = extract(archive, &root);

    assert!(matches!(result, Err(ExtractionError::PathEscape { .. })));
    assert_eq!(fs::read(outside.join("victim.txt")).unwrap(), b"original");
}

#[test]
#[cfg(unix)]
fn test_directories_through_planted_symlink_rejected() {
    let (temp, root) = layout();
    let outside = temp.path().join("outside");
    fs::create_dir(&outside).unwrap();

    let archive = MemoryArchive::new()
        .symlink("evil", outside.to_str().unwrap())
        .file("evil/new/planted.txt", b"pwned");
    let result = extract(archive, &root);

    assert!(matches!(result, Err(ExtractionError::PathEscape { .. })));
    assert!(!outside.join("new").exists());
}

#[test]
#[cfg(unix)]
fn test_symlink_chain_out_of_root_rejected() {
    let (temp, root) = layout();
    let outside = temp.path().join("outside");
    fs::create_dir(&outside).unwrap();

    let archive = MemoryArchive::new()
        .dir("a/")
        .symlink("outside-link", outside.to_str().unwrap())
        .symlink("a/out", "../outside-link")
        .file("a/out/payload.txt", b"pwned");
    let result = extract(archive, &root);

    assert!(matches!(result, Err(ExtractionError::PathEscape { .. })));
    assert!(!outside.join("payload.txt").exists());
}

#[test]
#[cfg(unix)]
fn test_directory_entry_replaces_planted_symlink() {
    let (temp, root) = layout();
    let outside = temp.path().join("outside");
    fs::create_dir(&outside).unwrap();

    let archive = MemoryArchive::new()
        .symlink("d", outside.to_str().unwrap())
        .dir("d/")
        .file("d/inside.txt", b"kept in root");
    extract(archive, &root).unwrap();

    assert!(fs::symlink_metadata(root.join("d")).unwrap().is_dir());
    assert_eq!(fs::read(root.join("d/inside.txt")).unwrap(), b"kept in root");
    assert!(!outside.join("inside.txt").exists());
}

#[test]
#[cfg(unix)]
fn test_symlink_inside_root_can_be_written_through() {
    let (_temp, root) = layout();
    let archive = MemoryArchive::new()
        .dir("share/")
        .dir("share/doc/")
        .symlink("docs", "share/doc")
        .file("docs/readme.txt", b"via link");
    extract(archive, &root).unwrap();

    assert_eq!(fs::read(root.join("share/doc/readme.txt")).unwrap(), b"via link");
}
