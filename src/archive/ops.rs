#![forbid(unsafe_code)]

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use tracing::info;

use crate::archive::build::write_archive;
use crate::archive::error::ArchiveResult;
use crate::archive::format::INTERNAL_PREFIX;
use crate::archive::path::collect_resources;
use crate::archive::resolver::Res2h;

const APPEND_BLOCK_LEN: usize = 4096;

/// Pack a file or directory into a standalone binary archive.
pub fn pack(input: &Path, output: &Path, recurse: bool) -> ArchiveResult<()> {
    let files = collect_resources(input, recurse)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        entries = files.len(),
        "packing archive"
    );
    write_archive(&files, output)
}

/// Append the raw bytes of `source` to the end of `destination`. Appending
/// an archive to an executable is how embedded archives are produced. On
/// error the destination must be assumed partially written.
pub fn append(source: &Path, destination: &Path) -> ArchiveResult<()> {
    let mut src = File::open(source)?;
    let mut out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(destination)?;
    let mut buf = [0u8; APPEND_BLOCK_LEN];
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
    }
    Ok(())
}

/// List archive entries on stdout.
pub fn list(archive: &Path, verbose: bool) -> ArchiveResult<()> {
    let mut res2h = Res2h::new();
    res2h.load_archive(archive)?;
    for entry in res2h.resource_info() {
        if verbose {
            println!(
                "{}  off={} size={} checksum={:#x}",
                entry.name, entry.data_offset, entry.data_size, entry.checksum
            );
        } else {
            println!("{}", entry.name);
        }
    }
    Ok(())
}

/// Print archive-level metadata on stdout.
pub fn info(archive: &Path) -> ArchiveResult<()> {
    let res2h = Res2h::new();
    let info = res2h.archive_info(archive)?;
    println!("Archive file: {}", info.path.display());
    println!("Data offset: {} bytes", info.offset);
    println!("Size: {} bytes", info.size);
    println!("File version: {}", info.version);
    println!("File format: {:#x}", info.flags);
    println!("Bits: {}", info.width.bits());
    println!("Checksum: {:#x}", info.checksum);
    Ok(())
}

/// Extract entries below `output`, verifying payload checksums and
/// recreating subdirectories from the logical names. An empty `filter`
/// extracts everything; otherwise only names containing one of the given
/// substrings are written.
pub fn extract(archive: &Path, output: &Path, filter: &[String]) -> ArchiveResult<()> {
    let mut res2h = Res2h::new();
    res2h.load_archive(archive)?;
    std::fs::create_dir_all(output)?;

    let names: Vec<String> = res2h
        .resource_info()
        .iter()
        .map(|r| r.name.clone())
        .collect();
    for name in names {
        if !filter.is_empty() && !filter.iter().any(|s| name.contains(s.as_str())) {
            continue;
        }
        let resource = res2h.load_resource(&name, false, true)?;
        let data = resource.data.as_deref().unwrap_or(&[]);

        let rel = name.strip_prefix(INTERNAL_PREFIX).unwrap_or(&name);
        let out_path = output.join(rel);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&out_path, data)?;
        info!(name = %name, path = %out_path.display(), "extracted");
    }
    Ok(())
}

/// Verify the whole-archive checksum and every entry checksum.
pub fn verify(archive: &Path) -> ArchiveResult<()> {
    let mut res2h = Res2h::new();
    // loading validates the archive-level checksum
    res2h.load_archive(archive)?;
    let names: Vec<String> = res2h
        .resource_info()
        .iter()
        .map(|r| r.name.clone())
        .collect();
    for name in &names {
        res2h.load_resource(name, false, true)?;
    }
    println!("ok: {} entries", names.len());
    Ok(())
}
