// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! On-disk tile cache: content-addressed paths, mtime-based freshness and an
//! advisory, cross-process file lock held for the duration of a tile fetch.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Path of the cached OSM XML for a tile, keyed by `profile_id/z/x/y.osm`.
pub(super) fn tile_path(cache_dir: &Path, profile_id: &str, z: u8, x: u32, y: u32) -> PathBuf {
    cache_dir
        .join(profile_id)
        .join(z.to_string())
        .join(x.to_string())
        .join(format!("{y}.osm"))
}

/// Checks whether a cached tile exists and was last written within `expiry`.
pub(super) fn is_fresh(path: &Path, expiry: Duration) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|mtime| mtime.elapsed().map(|age| age < expiry).unwrap_or(false))
        .unwrap_or(false)
}

/// Holds an advisory lock on a tile path for the lifetime of the guard, via an
/// atomically-created sibling `.lock` file. Released (best-effort) on drop.
pub(super) struct TileLock {
    path: PathBuf,
}

impl TileLock {
    pub(super) fn acquire(tile_path: &Path) -> io::Result<Self> {
        let path = tile_path.with_extension("osm.lock");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Drop for TileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_path_is_content_addressed() {
        let path = tile_path(Path::new("/cache"), "motorcar", 15, 18296, 10787);
        assert_eq!(path, Path::new("/cache/motorcar/15/18296/10787.osm"));
    }

    #[test]
    fn fresh_check_is_false_for_missing_file() {
        assert!(!is_fresh(Path::new("/nonexistent/tile.osm"), Duration::from_secs(60)));
    }

    #[test]
    fn lock_file_exists_while_held_and_is_removed_on_drop() {
        let dir = std::env::temp_dir().join(format!("wayfare-live-lock-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let tile = dir.join("15/1/2.osm");
        let lock_path = dir.join("15/1/2.osm.lock");

        let lock = TileLock::acquire(&tile).unwrap();
        assert!(lock_path.exists());
        drop(lock);
        assert!(!lock_path.exists());

        fs::remove_dir_all(&dir).ok();
    }
}
