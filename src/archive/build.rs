#![forbid(unsafe_code)]

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::archive::checksum::fletcher_file;
use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::format::{ResourceFile, Width, ARCHIVE_VERSION, MAGIC, OFFSET_ARCHIVE_SIZE};
use crate::archive::io::{write_u16, write_u32, write_word};

const COPY_BLOCK_LEN: usize = 4096;

/// Pick the field width for a resource list: 64 bit when any single resource
/// or the worst-case 32 bit archive total would overflow a 32 bit field.
pub fn select_width(files: &[ResourceFile]) -> Width {
    let max_data = files.iter().map(|f| f.size).max().unwrap_or(0);
    let sum_data: u64 = files.iter().map(|f| f.size).sum();
    let name_bytes: u64 = files.iter().map(|f| f.name.len() as u64).sum();

    let worst_case_32 = Width::W32.header_len()
        + name_bytes
        + files.len() as u64 * Width::W32.dir_entry_len()
        + sum_data
        + Width::W32.word_len();

    if max_data > u64::from(u32::MAX) || worst_case_32 > u64::from(u32::MAX) {
        Width::W64
    } else {
        Width::W32
    }
}

/// Write `files` to a standalone archive at `output`, in input order.
///
/// Archive layout (all integers little endian, `w` = width in bytes):
/// - [magic "res2hbin" 8]
/// - [u32 file version = 2]
/// - [u32 format flags, low 8 bits = 32/64]
/// - [uW archive size including the trailing checksum, fixed up at the end]
/// - [u32 entry count]
/// - directory, one record per entry:
///   - [u16 name length][name bytes UTF-8, not null-terminated]
///   - [u32 entry flags = 0]
///   - [uW data size][uW data offset from the magic][uW data checksum]
/// - payload blobs, contiguous, directory order
/// - [uW Fletcher checksum over everything above]
///
/// An empty list produces a well-formed archive with zero entries. On any
/// error the output file is left in an unspecified state and should be
/// deleted by the caller.
pub fn write_archive(files: &[ResourceFile], output: &Path) -> ArchiveResult<()> {
    let width = select_width(files);
    debug!(
        archive = %output.display(),
        bits = width.bits(),
        entries = files.len(),
        "writing archive"
    );

    let mut out = File::create(output)?;
    out.write_all(&MAGIC)?;
    write_u32(&mut out, ARCHIVE_VERSION)?;
    write_u32(&mut out, width.bits())?;
    write_word(&mut out, width, 0)?; // archive size, fixed up below
    write_u32(&mut out, files.len() as u32)?;

    // payload cursor starts right behind the directory
    let mut data_start = width.header_len()
        + files.iter().map(|f| f.name.len() as u64).sum::<u64>()
        + files.len() as u64 * width.dir_entry_len();

    for file in files {
        let name = file.name.as_bytes();
        if name.len() > u16::MAX as usize {
            return Err(ArchiveError::NameTooLong {
                name: file.name.clone(),
                len: name.len(),
            });
        }
        write_u16(&mut out, name.len() as u16)?;
        out.write_all(name)?;
        write_u32(&mut out, 0)?; // entry flags
        let checksum = fletcher_file(width, &file.path, Some(file.size))?;
        write_word(&mut out, width, file.size)?;
        write_word(&mut out, width, data_start)?;
        write_word(&mut out, width, checksum)?;
        debug!(
            name = %file.name,
            size = file.size,
            offset = data_start,
            checksum,
            "directory entry"
        );
        data_start += file.size;
    }

    for file in files {
        copy_payload(&mut out, file)?;
    }

    // the trailing checksum word is not written yet but counts into the size
    let total_size = out.stream_position()? + width.word_len();
    out.seek(SeekFrom::Start(OFFSET_ARCHIVE_SIZE))?;
    write_word(&mut out, width, total_size)?;
    out.flush()?;
    drop(out);

    let checksum = fletcher_file(width, output, Some(total_size - width.word_len()))?;
    let mut out = OpenOptions::new().append(true).open(output)?;
    write_word(&mut out, width, checksum)?;

    debug!(size = total_size, checksum, "archive written");
    Ok(())
}

// The directory is already committed with `file.size`, so the source must
// still yield exactly that many bytes. A grown file is cut off at the
// recorded size; a shrunk one is a fatal error.
fn copy_payload(out: &mut File, file: &ResourceFile) -> ArchiveResult<()> {
    let mut src = File::open(&file.path)?;
    let mut remaining = file.size;
    let mut buf = [0u8; COPY_BLOCK_LEN];
    while remaining > 0 {
        let want = remaining.min(COPY_BLOCK_LEN as u64) as usize;
        let got = src.read(&mut buf[..want])?;
        if got == 0 {
            break;
        }
        out.write_all(&buf[..got])?;
        remaining -= got as u64;
    }
    if remaining > 0 {
        return Err(ArchiveError::ShortRead {
            subject: file.path.display().to_string(),
            wanted: file.size,
            got: file.size - remaining,
        });
    }
    Ok(())
}
