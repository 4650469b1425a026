#![forbid(unsafe_code)]

//! Pack opaque files into a self-describing `res2hbin` archive, append that
//! archive to an arbitrary host file (typically an executable), and locate,
//! validate and read resources back out of standalone or embedded archives.

pub mod archive;

pub use archive::{ArchiveError, ArchiveResult, Res2h};
