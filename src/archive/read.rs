#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::archive::checksum::{fletcher, fletcher_stream};
use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::format::{
    ArchiveInfo, ResourceInfo, Width, ARCHIVE_VERSION, MAGIC, OFFSET_FILE_VERSION,
};
use crate::archive::io::{read_u16, read_u32, read_word};

/// Window size for the backwards magic scan.
const SCAN_WINDOW: usize = 4096;

/// Find the offset of the archive magic inside the file at `path`.
///
/// A standalone archive matches at offset 0. Otherwise the file is scanned
/// backwards from EOF in windows that overlap by `magic − 1` bytes, so a
/// magic straddling two windows is still seen as one contiguous match. The
/// rightmost occurrence per window wins: an embedded archive sits at the end
/// of its host, and host bytes further in may contain the pattern by chance.
pub fn find_archive_offset(path: &Path) -> ArchiveResult<u64> {
    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();

    if file_len >= MAGIC.len() as u64 {
        let mut head = [0u8; MAGIC.len()];
        file.read_exact(&mut head)?;
        if head == MAGIC {
            return Ok(0);
        }
    }

    let mut window = vec![0u8; SCAN_WINDOW];
    let mut start = file_len.saturating_sub(SCAN_WINDOW as u64);
    loop {
        let len = (file_len - start).min(SCAN_WINDOW as u64) as usize;
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut window[..len])?;
        if let Some(pos) = rfind_magic(&window[..len]) {
            debug!(host = %path.display(), offset = start + pos as u64, "found embedded archive");
            return Ok(start + pos as u64);
        }
        if start == 0 {
            break;
        }
        start = start.saturating_sub((SCAN_WINDOW - (MAGIC.len() - 1)) as u64);
    }
    Err(ArchiveError::NoArchive(path.to_path_buf()))
}

fn rfind_magic(window: &[u8]) -> Option<usize> {
    if window.len() < MAGIC.len() {
        return None;
    }
    window.windows(MAGIC.len()).rposition(|w| w == MAGIC)
}

/// Parse and validate the archive header and trailer in the file at `path`.
///
/// Checks, in order: magic locatable, version is 2, bit depth is 32 or 64,
/// size is nonzero and inside the file, and the whole-archive Fletcher over
/// `[magic, size − w)` matches the trailing checksum word. The directory is
/// not read here; `resources` comes back empty.
pub fn read_archive_info(path: &Path) -> ArchiveResult<ArchiveInfo> {
    let offset = find_archive_offset(path)?;
    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();

    file.seek(SeekFrom::Start(offset + OFFSET_FILE_VERSION))?;
    let version = read_u32(&mut file)?;
    if version != ARCHIVE_VERSION {
        return Err(ArchiveError::BadVersion {
            path: path.to_path_buf(),
            version,
        });
    }

    let flags = read_u32(&mut file)?;
    let width = Width::from_flags(flags).ok_or(ArchiveError::BadWidth {
        path: path.to_path_buf(),
        bits: flags & 0xFF,
    })?;

    let size = read_word(&mut file, width)?;
    if size == 0 {
        return Err(ArchiveError::EmptyArchive(path.to_path_buf()));
    }
    if offset + size > file_len {
        return Err(ArchiveError::ShortRead {
            subject: path.display().to_string(),
            wanted: size,
            got: file_len - offset,
        });
    }

    file.seek(SeekFrom::Start(offset + size - width.word_len()))?;
    let stored = read_word(&mut file, width)?;

    file.seek(SeekFrom::Start(offset))?;
    let computed = fletcher_stream(width, &mut file, Some(size - width.word_len()))?;
    if stored != computed {
        return Err(ArchiveError::BadChecksum {
            subject: path.display().to_string(),
            stored,
            computed,
        });
    }

    Ok(ArchiveInfo {
        path: path.to_path_buf(),
        offset,
        version,
        flags,
        width,
        size,
        checksum: stored,
        resources: Vec::new(),
    })
}

/// Read the directory of an already validated archive.
pub(crate) fn read_directory(info: &ArchiveInfo) -> ArchiveResult<Vec<ResourceInfo>> {
    let mut file = File::open(&info.path)?;
    // the entry count is the last header field
    file.seek(SeekFrom::Start(info.offset + info.width.header_len() - 4))?;
    let count = read_u32(&mut file)?;

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_len = read_u16(&mut file)? as usize;
        let mut name = vec![0u8; name_len];
        file.read_exact(&mut name)?;
        let name = String::from_utf8(name)
            .map_err(|e| ArchiveError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        let _entry_flags = read_u32(&mut file)?;
        let data_size = read_word(&mut file, info.width)?;
        let data_offset = read_word(&mut file, info.width)?;
        let checksum = read_word(&mut file, info.width)?;
        entries.push(ResourceInfo {
            name,
            data: None,
            data_size,
            data_offset,
            checksum,
        });
    }
    Ok(entries)
}

/// Read one resource's payload out of its archive, optionally verifying the
/// directory checksum against the bytes actually read.
pub(crate) fn read_resource_data(
    archive: &ArchiveInfo,
    entry: &ResourceInfo,
    check_checksum: bool,
) -> ArchiveResult<Arc<[u8]>> {
    let mut file = File::open(&archive.path)?;
    file.seek(SeekFrom::Start(archive.offset + entry.data_offset))?;

    let mut data = vec![0u8; entry.data_size as usize];
    let mut filled = 0;
    while filled < data.len() {
        let n = file.read(&mut data[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    if (filled as u64) < entry.data_size {
        return Err(ArchiveError::ShortRead {
            subject: entry.name.clone(),
            wanted: entry.data_size,
            got: filled as u64,
        });
    }

    if check_checksum {
        let computed = fletcher(archive.width, &data);
        if computed != entry.checksum {
            return Err(ArchiveError::BadChecksum {
                subject: entry.name.clone(),
                stored: entry.checksum,
                computed,
            });
        }
    }

    Ok(Arc::from(data))
}
