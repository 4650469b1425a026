#![forbid(unsafe_code)]

use std::io;
use std::path::Path;

use walkdir::WalkDir;

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::format::{ResourceFile, INTERNAL_PREFIX};

/// Build the `:/`-prefixed logical name for a file below `root`, with
/// forward slashes regardless of platform.
pub(crate) fn internal_name(root: &Path, file_path: &Path) -> ArchiveResult<String> {
    let rel = file_path.strip_prefix(root).map_err(|_| {
        ArchiveError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is outside {}", file_path.display(), root.display()),
        ))
    })?;

    let mut out = String::from(INTERNAL_PREFIX);
    for (i, comp) in rel.components().enumerate() {
        if i != 0 {
            out.push('/');
        }
        out.push_str(&comp.as_os_str().to_string_lossy());
    }
    Ok(out)
}

/// Collect the resource list for `input`.
///
/// A single file becomes one entry named `:/<file name>`. A directory is
/// scanned (recursing only when asked to) and the entries are sorted by
/// logical name bytes, so the archive layout does not depend on directory
/// iteration order. The sorted list is the order handed to the writer.
pub fn collect_resources(input: &Path, recurse: bool) -> ArchiveResult<Vec<ResourceFile>> {
    let meta = std::fs::metadata(input)?;
    if meta.is_file() {
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Ok(vec![ResourceFile {
            name: format!("{INTERNAL_PREFIX}{file_name}"),
            path: input.to_path_buf(),
            size: meta.len(),
        }]);
    }

    let mut walker = WalkDir::new(input).follow_links(false);
    if !recurse {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for ent in walker {
        let ent = ent.map_err(walk_error)?;
        if !ent.file_type().is_file() {
            continue;
        }
        let name = internal_name(input, ent.path())?;
        let size = ent.metadata().map_err(walk_error)?.len();
        files.push(ResourceFile {
            name,
            path: ent.path().to_path_buf(),
            size,
        });
    }

    files.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
    Ok(files)
}

fn walk_error(e: walkdir::Error) -> ArchiveError {
    let msg = e.to_string();
    let io = e
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, msg));
    ArchiveError::Io(io)
}
