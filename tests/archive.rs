use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use res2h::archive::{
    self, find_archive_offset, read_archive_info, write_archive, ArchiveError, Res2h,
    ResourceFile, Width, ARCHIVE_VERSION,
};

fn write_file(dir: &Path, rel: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, bytes).unwrap();
    path
}

fn resource(name: &str, path: PathBuf) -> ResourceFile {
    let size = fs::metadata(&path).unwrap().len();
    ResourceFile {
        name: name.to_string(),
        path,
        size,
    }
}

#[test]
fn single_file_round_trip_has_exact_layout() {
    let dir = TempDir::new().unwrap();
    let src = write_file(dir.path(), "hello", b"Hello!");
    let out = dir.path().join("test.bin");

    write_archive(&[resource(":/hello", src)], &out).unwrap();

    assert_eq!(find_archive_offset(&out).unwrap(), 0);

    let info = read_archive_info(&out).unwrap();
    assert_eq!(info.version, ARCHIVE_VERSION);
    assert_eq!(info.width, Width::W32);
    assert_eq!(info.offset, 0);
    assert_eq!(info.size, 59);
    assert_eq!(info.size, fs::metadata(&out).unwrap().len());

    let mut res2h = Res2h::new();
    res2h.load_archive(&out).unwrap();
    {
        let entries = res2h.resource_info();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, ":/hello");
        assert_eq!(entries[0].data_size, 6);
        assert_eq!(entries[0].data_offset, 49);
    }

    let loaded = res2h.load_resource(":/hello", false, true).unwrap();
    assert_eq!(loaded.data.as_deref(), Some(&b"Hello!"[..]));
}

#[test]
fn directory_round_trip() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input");
    write_file(&input, "a.txt", b"aaaa");
    write_file(&input, "b.txt", b"bbb");
    write_file(&input, "subdir/c.txt", b"cccc");
    let big: Vec<u8> = (0u8..=255).cycle().take(13095).collect();
    write_file(&input, "big.bin", &big);

    let out = dir.path().join("data.bin");
    archive::pack(&input, &out, true).unwrap();

    let mut res2h = Res2h::new();
    res2h.load_archive(&out).unwrap();

    for (name, want) in [
        (":/a.txt", &b"aaaa"[..]),
        (":/b.txt", &b"bbb"[..]),
        (":/subdir/c.txt", &b"cccc"[..]),
        (":/big.bin", &big[..]),
    ] {
        let loaded = res2h.load_resource(name, false, true).unwrap();
        assert_eq!(loaded.data.as_deref(), Some(want), "payload of {name}");
    }

    let err = res2h.load_resource(":/missing.txt", false, true).unwrap_err();
    assert!(matches!(err, ArchiveError::UnknownResource(_)));
}

#[test]
fn directory_order_matches_writer_input_order() {
    let dir = TempDir::new().unwrap();
    let z = write_file(dir.path(), "z", b"zz");
    let a = write_file(dir.path(), "a", b"aa");
    let m = write_file(dir.path(), "m", b"mm");
    let out = dir.path().join("ordered.bin");

    write_archive(
        &[resource(":/z", z), resource(":/a", a), resource(":/m", m)],
        &out,
    )
    .unwrap();

    let mut res2h = Res2h::new();
    res2h.load_archive(&out).unwrap();
    let names: Vec<&str> = res2h
        .resource_info()
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(names, [":/z", ":/a", ":/m"]);

    // payload regions in the same order, non-overlapping
    let entries = res2h.resource_info();
    for pair in entries.windows(2) {
        assert!(pair[0].data_offset + pair[0].data_size <= pair[1].data_offset);
    }
}

#[test]
fn embedded_archive_behaves_like_standalone() {
    let dir = TempDir::new().unwrap();
    let src = write_file(dir.path(), "payload.txt", b"embedded payload");
    let arch = dir.path().join("data.bin");
    write_archive(&[resource(":/payload.txt", src)], &arch).unwrap();

    let host = write_file(dir.path(), "host.exe", &vec![0xAB; 10000]);
    archive::append(&arch, &host).unwrap();

    assert_eq!(find_archive_offset(&host).unwrap(), 10000);

    let info = read_archive_info(&host).unwrap();
    assert_eq!(info.offset, 10000);
    assert_eq!(info.size, fs::metadata(&arch).unwrap().len());

    let mut res2h = Res2h::new();
    res2h.load_archive(&host).unwrap();
    let loaded = res2h.load_resource(":/payload.txt", false, true).unwrap();
    assert_eq!(loaded.data.as_deref(), Some(&b"embedded payload"[..]));
}

#[test]
fn magic_straddling_a_scan_window_is_found() {
    let dir = TempDir::new().unwrap();
    // archive sized so its magic crosses the first backwards-scan window
    // boundary (4096 bytes from EOF) once appended to any host
    let payload: Vec<u8> = (0u8..=255).cycle().take(4050).collect();
    let src = write_file(dir.path(), "pad", &payload);
    let arch = dir.path().join("pad.bin");
    write_archive(&[resource(":/pad", src)], &arch).unwrap();
    assert_eq!(fs::metadata(&arch).unwrap().len(), 4101);

    let host = write_file(dir.path(), "host.bin", &vec![0x5A; 10000]);
    archive::append(&arch, &host).unwrap();
    assert_eq!(find_archive_offset(&host).unwrap(), 10000);
}

#[test]
fn missing_magic_is_no_archive() {
    let dir = TempDir::new().unwrap();
    let plain = write_file(dir.path(), "plain.bin", &vec![0x11; 20000]);
    let err = find_archive_offset(&plain).unwrap_err();
    assert!(matches!(err, ArchiveError::NoArchive(_)));

    // smaller than the magic itself
    let tiny = write_file(dir.path(), "tiny.bin", b"abc");
    let err = find_archive_offset(&tiny).unwrap_err();
    assert!(matches!(err, ArchiveError::NoArchive(_)));
}

#[test]
fn stray_magic_without_header_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut bytes = vec![0x42u8; 5000];
    bytes.extend_from_slice(b"res2hbin");
    bytes.extend_from_slice(&[0xFF; 32]);
    let host = write_file(dir.path(), "stray.bin", &bytes);

    assert_eq!(find_archive_offset(&host).unwrap(), 5000);
    let err = read_archive_info(&host).unwrap_err();
    assert!(matches!(
        err,
        ArchiveError::BadVersion { .. } | ArchiveError::BadChecksum { .. }
    ));
}

#[test]
fn corrupted_payload_fails_both_checksums() {
    let dir = TempDir::new().unwrap();
    let src = write_file(dir.path(), "data.txt", b"some payload worth protecting");
    let out = dir.path().join("data.bin");
    write_archive(&[resource(":/data.txt", src)], &out).unwrap();

    // cache the directory before corrupting, then flip one payload byte
    let mut res2h = Res2h::new();
    res2h.load_archive(&out).unwrap();
    let offset = res2h.resource_info()[0].data_offset;
    let mut bytes = fs::read(&out).unwrap();
    bytes[offset as usize + 2] ^= 0x01;
    fs::write(&out, &bytes).unwrap();

    let err = res2h.load_resource(":/data.txt", false, true).unwrap_err();
    assert!(matches!(err, ArchiveError::BadChecksum { .. }));

    // with verification off the corrupted bytes come back as-is
    let loaded = res2h.load_resource(":/data.txt", false, false).unwrap();
    assert_ne!(
        loaded.data.as_deref(),
        Some(&b"some payload worth protecting"[..])
    );

    // the flipped byte is inside the whole-archive checksum range too
    let err = read_archive_info(&out).unwrap_err();
    assert!(matches!(err, ArchiveError::BadChecksum { .. }));
}

#[test]
fn empty_resource_list_produces_a_wellformed_archive() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("empty.bin");
    write_archive(&[], &out).unwrap();

    let info = read_archive_info(&out).unwrap();
    assert_eq!(info.width, Width::W32);
    assert_eq!(info.size, Width::W32.header_len() + Width::W32.word_len());

    let mut res2h = Res2h::new();
    res2h.load_archive(&out).unwrap();
    assert!(res2h.resource_info().is_empty());
}

#[test]
fn name_length_boundary() {
    let dir = TempDir::new().unwrap();
    let src = write_file(dir.path(), "x", b"x");
    let out = dir.path().join("longname.bin");

    let longest = format!(":/{}", "n".repeat(65533));
    assert_eq!(longest.len(), 65535);
    write_archive(&[resource(&longest, src.clone())], &out).unwrap();
    let mut res2h = Res2h::new();
    res2h.load_archive(&out).unwrap();
    let loaded = res2h.load_resource(&longest, false, true).unwrap();
    assert_eq!(loaded.data.as_deref(), Some(&b"x"[..]));

    let too_long = format!(":/{}", "n".repeat(65534));
    let err = write_archive(&[resource(&too_long, src)], &out).unwrap_err();
    assert!(matches!(err, ArchiveError::NameTooLong { .. }));
}

#[test]
fn short_source_file_aborts_the_write() {
    let dir = TempDir::new().unwrap();
    let src = write_file(dir.path(), "shrinking", &vec![1u8; 100]);
    let out = dir.path().join("short.bin");

    // directory is planned against a stale, larger size
    let mut entry = resource(":/shrinking", src);
    entry.size = 200;
    let err = write_archive(&[entry], &out).unwrap_err();
    assert!(matches!(err, ArchiveError::ShortRead { .. }));
}

#[test]
fn payload_cache_and_release() {
    let dir = TempDir::new().unwrap();
    let src = write_file(dir.path(), "cached.txt", b"cache me");
    let out = dir.path().join("cache.bin");
    write_archive(&[resource(":/cached.txt", src)], &out).unwrap();

    let mut res2h = Res2h::new();
    res2h.load_archive(&out).unwrap();
    assert!(res2h.resource_info()[0].data.is_none());

    // not kept: the cache stays cold
    res2h.load_resource(":/cached.txt", false, true).unwrap();
    assert!(res2h.resource_info()[0].data.is_none());

    // kept: the cache holds the buffer until released
    res2h.load_resource(":/cached.txt", true, true).unwrap();
    assert!(res2h.resource_info()[0].data.is_some());

    res2h.release_data();
    assert!(res2h.resource_info()[0].data.is_none());

    // buffers handed out earlier survive a release
    let held = res2h.load_resource(":/cached.txt", true, true).unwrap();
    res2h.release_data();
    assert_eq!(held.data.as_deref(), Some(&b"cache me"[..]));

    let reloaded = res2h.load_resource(":/cached.txt", false, true).unwrap();
    assert_eq!(reloaded.data.as_deref(), Some(&b"cache me"[..]));
}

#[test]
fn reloading_an_archive_replaces_its_cache_entry() {
    let dir = TempDir::new().unwrap();
    let src = write_file(dir.path(), "one.txt", b"one");
    let out = dir.path().join("reload.bin");
    write_archive(&[resource(":/one.txt", src)], &out).unwrap();

    let mut res2h = Res2h::new();
    res2h.load_archive(&out).unwrap();
    res2h.load_archive(&out).unwrap();
    assert_eq!(res2h.resource_info().len(), 1);
}

#[test]
fn disk_resources_resolve_without_archives() {
    let dir = TempDir::new().unwrap();
    let on_disk = write_file(dir.path(), "loose.txt", b"loose bytes");
    let name = on_disk.to_string_lossy().into_owned();

    let mut res2h = Res2h::new();
    let loaded = res2h.load_resource(&name, true, false).unwrap();
    assert_eq!(loaded.data.as_deref(), Some(&b"loose bytes"[..]));
    assert_eq!(res2h.resource_info().len(), 1);

    let missing = dir.path().join("not-there.txt");
    let err = res2h
        .load_resource(&missing.to_string_lossy(), false, false)
        .unwrap_err();
    assert!(matches!(err, ArchiveError::UnknownResource(_)));
}

#[test]
fn extract_recreates_the_tree() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input");
    write_file(&input, "a.txt", b"alpha");
    write_file(&input, "nested/deep/b.txt", b"beta");

    let out = dir.path().join("tree.bin");
    archive::pack(&input, &out, true).unwrap();
    archive::verify(&out).unwrap();

    let restored = dir.path().join("restored");
    archive::extract(&out, &restored, &[]).unwrap();
    assert_eq!(fs::read(restored.join("a.txt")).unwrap(), b"alpha");
    assert_eq!(fs::read(restored.join("nested/deep/b.txt")).unwrap(), b"beta");

    // filters narrow the extraction
    let filtered = dir.path().join("filtered");
    archive::extract(&out, &filtered, &["b.txt".to_string()]).unwrap();
    assert!(!filtered.join("a.txt").exists());
    assert!(filtered.join("nested/deep/b.txt").exists());
}

#[test]
fn pack_without_recursion_skips_subdirectories() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input");
    write_file(&input, "top.txt", b"top");
    write_file(&input, "sub/below.txt", b"below");

    let out = dir.path().join("flat.bin");
    archive::pack(&input, &out, false).unwrap();

    let mut res2h = Res2h::new();
    res2h.load_archive(&out).unwrap();
    let names: Vec<&str> = res2h
        .resource_info()
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(names, [":/top.txt"]);
}

#[test]
fn pack_accepts_a_single_file() {
    let dir = TempDir::new().unwrap();
    let src = write_file(dir.path(), "only.dat", b"single");
    let out = dir.path().join("single.bin");
    archive::pack(&src, &out, false).unwrap();

    let mut res2h = Res2h::new();
    res2h.load_archive(&out).unwrap();
    let loaded = res2h.load_resource(":/only.dat", false, true).unwrap();
    assert_eq!(loaded.data.as_deref(), Some(&b"single"[..]));
}
