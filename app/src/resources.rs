//! Assets loaded through the asset filesystem, shared by reference count.

use surge_core::pool::ResourcePool;
use surge_vfs::{Avfs, VfsError};

/// Raw contents of an asset file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    vpath: String,
    bytes: Vec<u8>,
}

impl Asset {
    pub fn vpath(&self) -> &str {
        &self.vpath
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Loaded assets keyed by vpath.
///
/// Every [`load`](Resources::load) takes a reference that a matching
/// [`release`](Resources::release) gives back. Unreferenced assets are dropped
/// by [`sweep`](Resources::sweep), one per call.
pub struct Resources {
    pool: ResourcePool<Asset>,
}

impl Default for Resources {
    fn default() -> Self {
        Self::new()
    }
}

impl Resources {
    pub fn new() -> Self {
        Self {
            pool: ResourcePool::with_destructor(|vpath, _| log::debug!("Unloaded {vpath}")),
        }
    }

    /// Loads an asset, or takes one more reference to it if already loaded.
    pub fn load(&mut self, avfs: &Avfs, vpath: &str) -> Result<&Asset, VfsError> {
        if !self.pool.contains(vpath) {
            let bytes = avfs.read(vpath)?;
            log::debug!("Loaded {vpath} ({} bytes)", bytes.len());
            self.pool.add(
                vpath,
                Asset {
                    vpath: vpath.to_string(),
                    bytes,
                },
            );
        }
        self.pool.add_ref(vpath);
        self.pool.find(vpath).ok_or_else(|| VfsError::NotFound(vpath.to_string()))
    }

    /// Gives back a reference taken by [`load`](Resources::load).
    pub fn release(&mut self, vpath: &str) -> u32 {
        self.pool.unref(vpath)
    }

    pub fn get(&self, vpath: &str) -> Option<&Asset> {
        self.pool.get(vpath)
    }

    pub fn refcount(&self, vpath: &str) -> u32 {
        self.pool.refcount(vpath)
    }

    /// Drops one unreferenced asset, if any.
    pub fn sweep(&mut self) -> bool {
        self.pool.release_unused()
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Drops every asset, referenced or not.
    pub fn clear(&mut self) {
        if !self.pool.is_empty() {
            log::info!("Releasing {} resources", self.pool.len());
        }
        self.pool.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use surge_vfs::{AvfsConfig, UserRoots};

    fn avfs(dir: &std::path::Path) -> Avfs {
        fs::create_dir_all(dir.join("data/images")).unwrap();
        fs::write(dir.join("data/surge.rocks"), "").unwrap();
        fs::write(dir.join("data/images/title.png"), [1u8, 2, 3]).unwrap();
        Avfs::init(
            AvfsConfig::new("demo")
                .with_datadir(dir.join("data"))
                .with_user_roots(UserRoots {
                    data: dir.join("user/data"),
                    config: dir.join("user/config"),
                    cache: dir.join("user/cache"),
                })
                .with_exe_dir(None),
        )
        .unwrap()
    }

    #[test]
    fn test_load_shares_one_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let avfs = avfs(tmp.path());
        let mut resources = Resources::new();

        assert_eq!(resources.load(&avfs, "images/title.png").unwrap().bytes(), [1, 2, 3]);
        assert_eq!(resources.load(&avfs, "IMAGES/Title.png").unwrap().vpath(), "images/title.png");
        assert_eq!(resources.len(), 1);
        assert_eq!(resources.refcount("images/title.png"), 2);
    }

    #[test]
    fn test_sweep_waits_for_the_last_release() {
        let tmp = tempfile::tempdir().unwrap();
        let avfs = avfs(tmp.path());
        let mut resources = Resources::new();
        resources.load(&avfs, "images/title.png").unwrap();
        resources.load(&avfs, "images/title.png").unwrap();

        assert_eq!(resources.release("images/title.png"), 1);
        assert!(!resources.sweep());
        assert_eq!(resources.release("images/title.png"), 0);
        assert!(resources.sweep());
        assert!(resources.is_empty());
    }

    #[test]
    fn test_missing_asset() {
        let tmp = tempfile::tempdir().unwrap();
        let avfs = avfs(tmp.path());
        let mut resources = Resources::new();
        assert!(resources.load(&avfs, "images/nope.png").is_err());
        assert!(resources.is_empty());
    }
}
