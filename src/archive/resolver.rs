#![forbid(unsafe_code)]

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::debug;

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::format::{ArchiveInfo, ResourceInfo, INTERNAL_PREFIX};
use crate::archive::read;

/// Resolver serving resources out of loaded archives or straight from disk.
///
/// [`load_archive`](Res2h::load_archive) caches an archive's directory;
/// payloads are read on demand and cached only when the caller asks for it.
/// Payload buffers are shared immutable slices, so handing them out is cheap
/// and [`release_data`](Res2h::release_data) cannot pull them out from under
/// a caller that still holds one.
#[derive(Debug, Default)]
pub struct Res2h {
    archives: Vec<ArchiveInfo>,
    disk_resources: Vec<ResourceInfo>,
}

impl Res2h {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of the archive magic inside `path`. Archives already loaded
    /// are answered from the cache without touching the file.
    pub fn find_archive_offset(&self, path: &Path) -> ArchiveResult<u64> {
        for archive in &self.archives {
            if archive.path == path {
                return Ok(archive.offset);
            }
        }
        read::find_archive_offset(path)
    }

    /// Header and trailer metadata for the archive in `path`, validating the
    /// whole-archive checksum. Does not modify the cache.
    pub fn archive_info(&self, path: &Path) -> ArchiveResult<ArchiveInfo> {
        for archive in &self.archives {
            if archive.path == path {
                return Ok(archive.clone());
            }
        }
        read::read_archive_info(path)
    }

    /// Load the directory of the archive in `path` into the cache. Loading
    /// the same path again discards the cached state and reloads from disk.
    pub fn load_archive(&mut self, path: &Path) -> ArchiveResult<()> {
        let mut info = read::read_archive_info(path)?;
        info.resources = read::read_directory(&info)?;
        debug!(
            archive = %path.display(),
            offset = info.offset,
            entries = info.resources.len(),
            "archive loaded"
        );
        self.archives.retain(|a| a.path != path);
        self.archives.push(info);
        Ok(())
    }

    /// Resolve `name` and return its resource with the payload present.
    ///
    /// Names starting with `:/` are looked up in the loaded archives in
    /// insertion order; anything else is read from disk. `keep_in_cache`
    /// retains the payload for later calls; `check_checksum` verifies an
    /// archive payload against its directory checksum. A failed load leaves
    /// the cache untouched.
    pub fn load_resource(
        &mut self,
        name: &str,
        keep_in_cache: bool,
        check_checksum: bool,
    ) -> ArchiveResult<ResourceInfo> {
        if name.starts_with(INTERNAL_PREFIX) {
            return self.load_from_archives(name, keep_in_cache, check_checksum);
        }
        self.load_from_disk(name, keep_in_cache)
    }

    /// All known resources: every directory entry of every loaded archive,
    /// then the cached disk resources, in insertion order.
    pub fn resource_info(&self) -> Vec<&ResourceInfo> {
        self.archives
            .iter()
            .flat_map(|a| a.resources.iter())
            .chain(self.disk_resources.iter())
            .collect()
    }

    /// Drop every cached payload buffer. Directories and archive metadata
    /// stay; the next load re-reads from disk.
    pub fn release_data(&mut self) {
        for archive in &mut self.archives {
            for resource in &mut archive.resources {
                resource.data = None;
            }
        }
        for resource in &mut self.disk_resources {
            resource.data = None;
        }
    }

    fn load_from_archives(
        &mut self,
        name: &str,
        keep_in_cache: bool,
        check_checksum: bool,
    ) -> ArchiveResult<ResourceInfo> {
        for ai in 0..self.archives.len() {
            let Some(ri) = self.archives[ai].resources.iter().position(|r| r.name == name) else {
                continue;
            };
            if self.archives[ai].resources[ri].data.is_some() {
                return Ok(self.archives[ai].resources[ri].clone());
            }
            let data = read::read_resource_data(
                &self.archives[ai],
                &self.archives[ai].resources[ri],
                check_checksum,
            )?;
            let entry = &mut self.archives[ai].resources[ri];
            if keep_in_cache {
                entry.data = Some(Arc::clone(&data));
            }
            let mut out = entry.clone();
            out.data = Some(data);
            return Ok(out);
        }
        Err(ArchiveError::UnknownResource(name.to_string()))
    }

    fn load_from_disk(&mut self, name: &str, keep_in_cache: bool) -> ArchiveResult<ResourceInfo> {
        if let Some(cached) = self
            .disk_resources
            .iter()
            .find(|r| r.name == name && r.data.is_some())
        {
            return Ok(cached.clone());
        }

        let data = match std::fs::read(Path::new(name)) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ArchiveError::UnknownResource(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let info = ResourceInfo {
            name: name.to_string(),
            data_size: data.len() as u64,
            data: Some(Arc::from(data)),
            data_offset: 0,
            checksum: 0,
        };
        if keep_in_cache {
            self.disk_resources.retain(|r| r.name != name);
            self.disk_resources.push(info.clone());
        }
        Ok(info)
    }
}

/// Process-wide resolver for callers that want the singleton convenience.
/// The mutex serialises every cache-mutating call when the instance is
/// shared across threads; a per-instance [`Res2h`] needs no locking.
pub fn global() -> &'static Mutex<Res2h> {
    static GLOBAL: OnceLock<Mutex<Res2h>> = OnceLock::new();
    GLOBAL.get_or_init(|| Mutex::new(Res2h::new()))
}
