#![forbid(unsafe_code)]

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("no archive found in {}", .0.display())]
    NoArchive(PathBuf),

    #[error("bad archive file version {version} in {}", .path.display())]
    BadVersion { path: PathBuf, version: u32 },

    #[error("bad archive bit depth {bits} in {}", .path.display())]
    BadWidth { path: PathBuf, bits: u32 },

    #[error("archive {} has an internal size of 0", .0.display())]
    EmptyArchive(PathBuf),

    #[error("bad checksum for {subject}: stored {stored:#x}, computed {computed:#x}")]
    BadChecksum {
        subject: String,
        stored: u64,
        computed: u64,
    },

    #[error("short read on {subject}: wanted {wanted} bytes, got {got}")]
    ShortRead {
        subject: String,
        wanted: u64,
        got: u64,
    },

    #[error("resource name is too long ({len} bytes): {name}")]
    NameTooLong { name: String, len: usize },

    #[error("value {0} does not fit into a 32 bit archive field")]
    SizeOverflow(u64),

    #[error("unknown resource: {0}")]
    UnknownResource(String),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
