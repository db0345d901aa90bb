use qcarrier::archive::{pack_archive, unpack_archive, ArchiveError, PackOptions};
use qcarrier::embed::{embed_payload, CodecOptions};
use qcarrier::circuit::InstructionStream;
use qcarrier::recovery::recover_payload;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Relative path → contents (`None` for directories).
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            let contents = e.file_type().is_file().then(|| fs::read(e.path()).unwrap());
            (rel, contents)
        })
        .collect()
}

fn populate(root: &Path) -> (PathBuf, PathBuf) {
    let docs = root.join("docs");
    fs::create_dir_all(docs.join("nested/deeper")).unwrap();
    fs::write(docs.join("readme.txt"), b"Hello, carrier!").unwrap();
    fs::write(docs.join("nested/data.bin"), (0u8..=255).cycle().take(10_000).collect::<Vec<_>>()).unwrap();
    fs::write(docs.join("nested/deeper/empty"), b"").unwrap();

    let conf = root.join("conf");
    fs::create_dir_all(&conf).unwrap();
    fs::write(conf.join("settings.toml"), b"level = 3\n").unwrap();
    (docs, conf)
}

/// zstd-compressed tar of regular files stored under raw, unchecked names.
fn crafted_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.as_gnu_mut().unwrap().name[..name.len()].copy_from_slice(name.as_bytes());
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, data.as_bytes()).unwrap();
    }
    let tar_bytes = builder.into_inner().unwrap();
    let mut encoder = zstd::Encoder::new(Vec::new(), 3).unwrap();
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn test_pack_unpack_reproduces_tree() {
    let src = TempDir::new().unwrap();
    let (docs, conf) = populate(src.path());
    let opts = PackOptions::with_candidates([docs, conf, src.path().join("missing")]);

    let bytes = pack_archive(&opts).unwrap();
    assert!(!bytes.is_empty());

    let dst = TempDir::new().unwrap();
    let out = dst.path().join("fresh");
    let report = unpack_archive(&bytes, Some(out.as_path())).unwrap();
    assert_eq!(report.destination, out);
    assert!(report.skipped.is_empty());

    assert_eq!(snapshot(&out), snapshot(src.path()));
}

#[test]
fn test_no_existing_candidates_packs_nothing() {
    let src = TempDir::new().unwrap();
    let opts = PackOptions::with_candidates([src.path().join("a"), src.path().join("b")]);
    assert!(pack_archive(&opts).unwrap().is_empty());
}

#[test]
fn test_parent_traversal_never_escapes() {
    let root = TempDir::new().unwrap();
    let dest = root.path().join("dest");
    let bytes = crafted_archive(&[
        ("ok.txt", "fine"),
        ("../escape.txt", "owned"),
        ("after.txt", "never"),
    ]);

    let err = unpack_archive(&bytes, Some(dest.as_path())).unwrap_err();
    assert!(matches!(err, ArchiveError::UnsafeEntry(ref p) if p == Path::new("../escape.txt")));
    assert!(!root.path().join("escape.txt").exists());
    assert_eq!(fs::read(dest.join("ok.txt")).unwrap(), b"fine");
    assert!(!dest.join("after.txt").exists());
}

#[test]
fn test_absolute_entry_is_rejected() {
    let root = TempDir::new().unwrap();
    let target = root.path().join("abs-target.txt");
    let bytes = crafted_archive(&[(target.to_str().unwrap(), "owned")]);

    let dest = root.path().join("dest");
    let err = unpack_archive(&bytes, Some(dest.as_path())).unwrap_err();
    assert!(matches!(err, ArchiveError::UnsafeEntry(_)));
    assert!(!target.exists());
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_not_materialized() {
    let src = TempDir::new().unwrap();
    let dir = src.path().join("linked");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("real.txt"), b"real").unwrap();
    std::os::unix::fs::symlink("/etc/hostname", dir.join("link")).unwrap();

    let bytes = pack_archive(&PackOptions::with_candidates([&dir])).unwrap();
    let dst = TempDir::new().unwrap();
    let report = unpack_archive(&bytes, Some(dst.path())).unwrap();

    assert_eq!(report.skipped, vec![PathBuf::from("linked/link")]);
    assert!(fs::symlink_metadata(dst.path().join("linked/link")).is_err());
    assert_eq!(fs::read(dst.path().join("linked/real.txt")).unwrap(), b"real");
}

#[test]
fn test_archive_survives_the_carrier() {
    let src = TempDir::new().unwrap();
    let (docs, _) = populate(src.path());
    let bytes = pack_archive(&PackOptions::with_candidates([&docs])).unwrap();

    let options = CodecOptions::default();
    let mut stream = InstructionStream::new(5);
    embed_payload(&bytes, &options).unwrap().append_to(&mut stream, &options.vocabulary);
    let recovered = recover_payload(&stream, &options).unwrap();
    assert_eq!(recovered, bytes);

    let dst = TempDir::new().unwrap();
    unpack_archive(&recovered, Some(dst.path())).unwrap();
    assert_eq!(snapshot(&dst.path().join("docs")), snapshot(&docs));
}

#[test]
fn test_same_named_candidates_both_survive() {
    let src = TempDir::new().unwrap();
    for (dir, text) in [("a", "from a"), ("b", "from b")] {
        let docs = src.path().join(dir).join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("note.txt"), text).unwrap();
    }
    let opts = PackOptions::with_candidates([src.path().join("a/docs"), src.path().join("b/docs")]);
    let bytes = pack_archive(&opts).unwrap();

    let dst = TempDir::new().unwrap();
    unpack_archive(&bytes, Some(dst.path())).unwrap();
    assert_eq!(fs::read(dst.path().join("docs/note.txt")).unwrap(), b"from a");
    assert_eq!(fs::read(dst.path().join("docs-1/note.txt")).unwrap(), b"from b");
}
