#![forbid(unsafe_code)]

use std::io::{Read, Write};

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::format::Width;

pub fn write_u16(w: &mut dyn Write, v: u16) -> ArchiveResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn write_u32(w: &mut dyn Write, v: u32) -> ArchiveResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn write_u64(w: &mut dyn Write, v: u64) -> ArchiveResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write one size/offset/checksum word at the archive's width. A value that
/// does not fit into a 32 bit field is an internal planning bug; width
/// selection is supposed to have switched to 64 bit before we get here.
pub fn write_word(w: &mut dyn Write, width: Width, v: u64) -> ArchiveResult<()> {
    match width {
        Width::W32 => {
            let v = u32::try_from(v).map_err(|_| ArchiveError::SizeOverflow(v))?;
            write_u32(w, v)
        }
        Width::W64 => write_u64(w, v),
    }
}

pub fn read_exact<const N: usize>(r: &mut dyn Read) -> ArchiveResult<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_u16(r: &mut dyn Read) -> ArchiveResult<u16> {
    Ok(u16::from_le_bytes(read_exact::<2>(r)?))
}

pub fn read_u32(r: &mut dyn Read) -> ArchiveResult<u32> {
    Ok(u32::from_le_bytes(read_exact::<4>(r)?))
}

pub fn read_u64(r: &mut dyn Read) -> ArchiveResult<u64> {
    Ok(u64::from_le_bytes(read_exact::<8>(r)?))
}

/// Read one size/offset/checksum word at the archive's width, zero extended.
pub fn read_word(r: &mut dyn Read, width: Width) -> ArchiveResult<u64> {
    match width {
        Width::W32 => Ok(u64::from(read_u32(r)?)),
        Width::W64 => read_u64(r),
    }
}
