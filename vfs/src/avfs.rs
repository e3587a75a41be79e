use std::fs::{self, OpenOptions};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::VfsError;
use crate::path::{basename, components, has_extension, is_sane, is_valid_gameid, join, miss_marker, normalize};
use crate::roots::{UserRoots, exe_dir};
use crate::scan::{is_asset_folder, mkpath, scan_folder};
use crate::tree::{AssetFile, AssetKind, AssetTree, DirId, Priority};

/// Parameters of [`Avfs::init`].
#[derive(Debug, Clone)]
pub struct AvfsConfig {
    gameid: String,
    basedir: Option<PathBuf>,
    datadir: Option<PathBuf>,
    strict: bool,
    roots: Option<UserRoots>,
    exe_dir: Option<PathBuf>,
    probe_exe_dir: bool,
}

impl AvfsConfig {
    /// Configuration for `gameid` with strict mode on and platform roots.
    pub fn new(gameid: impl Into<String>) -> Self {
        Self {
            gameid: gameid.into(),
            basedir: None,
            datadir: None,
            strict: true,
            roots: None,
            exe_dir: None,
            probe_exe_dir: true,
        }
    }

    /// Directory with the bundled engine assets, used when nothing else provides them.
    pub fn with_basedir(mut self, basedir: impl Into<PathBuf>) -> Self {
        self.basedir = Some(basedir.into());
        self
    }

    /// Sole asset folder, replacing the default roots for reading.
    pub fn with_datadir(mut self, datadir: impl Into<PathBuf>) -> Self {
        let datadir = datadir.into();
        self.datadir = (!datadir.as_os_str().is_empty()).then_some(datadir);
        self
    }

    /// Whether an empty filesystem is an error. On by default.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Overrides the per-user roots instead of resolving them for the platform.
    pub fn with_user_roots(mut self, roots: UserRoots) -> Self {
        self.roots = Some(roots);
        self
    }

    /// Overrides the executable directory probed for bundled assets; `None` skips it.
    pub fn with_exe_dir(mut self, exe_dir: Option<PathBuf>) -> Self {
        self.exe_dir = exe_dir;
        self.probe_exe_dir = false;
        self
    }

    pub fn gameid(&self) -> &str {
        &self.gameid
    }
}

/// The asset virtual filesystem.
///
/// Merges the engine data directory and the per-user data, config and cache
/// directories into one case-insensitive namespace. Reads resolve a vpath to a
/// real path; the typed `create_*` calls hand out writable real paths in the
/// right per-user root.
#[derive(Debug)]
pub struct Avfs {
    gameid: String,
    tree: AssetTree,
    roots: UserRoots,
    strict: bool,
}

impl Avfs {
    /// Builds the tree from the configured sources.
    pub fn init(config: AvfsConfig) -> Result<Avfs, VfsError> {
        if !is_valid_gameid(&config.gameid) {
            return Err(VfsError::InvalidGameId(config.gameid));
        }

        let roots = match config.roots {
            Some(roots) => roots,
            None => UserRoots::resolve(&config.gameid)?,
        };

        log::info!("Initializing the asset filesystem for \"{}\"", config.gameid);
        let mut tree = AssetTree::new();
        let root = tree.root();

        if let Some(datadir) = &config.datadir {
            log::info!("Using the data directory {}", datadir.display());
            if datadir.is_dir() && !is_asset_folder(datadir) {
                log::warn!("{} is either invalid or obsolete", datadir.display());
            }
            scan_source(&mut tree, root, datadir, AssetKind::Data, Priority::Primary, false);
        } else {
            scan_source(&mut tree, root, &roots.config, AssetKind::Config, Priority::Primary, false);
            scan_source(&mut tree, root, &roots.cache, AssetKind::Cache, Priority::Primary, false);

            let exe = match config.probe_exe_dir {
                true => exe_dir(),
                false => config.exe_dir.clone(),
            };
            let bundled = match exe.filter(|dir| is_asset_folder(dir)) {
                Some(dir) => {
                    scan_source(&mut tree, root, &dir, AssetKind::Data, Priority::Primary, true);
                    true
                }
                None => false,
            };

            let user_priority = if bundled {
                Priority::Secondary
            } else {
                Priority::Primary
            };
            scan_source(&mut tree, root, &roots.data, AssetKind::Data, user_priority, false);

            if !bundled {
                if let Some(basedir) = &config.basedir {
                    scan_source(&mut tree, root, basedir, AssetKind::Data, Priority::Secondary, true);
                }
            }
        }

        if tree.is_empty() {
            if config.strict {
                return Err(VfsError::EmptyFilesystem(config.gameid));
            }
            log::warn!("The asset filesystem of \"{}\" is empty", config.gameid);
        }

        tree.sort();
        log::info!(
            "Asset filesystem ready: {} files in {} directories",
            tree.count_files(root),
            tree.dir_count()
        );

        Ok(Avfs {
            gameid: config.gameid,
            tree,
            roots,
            strict: config.strict,
        })
    }

    /// Tears the filesystem down. Paths handed out earlier stay valid on disk
    /// but are no longer tracked.
    pub fn release(self) {
        log::info!("Releasing the asset filesystem of \"{}\"", self.gameid);
    }

    pub fn gameid(&self) -> &str {
        &self.gameid
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn user_roots(&self) -> &UserRoots {
        &self.roots
    }

    pub fn data_dir(&self) -> &Path {
        &self.roots.data
    }

    pub fn config_dir(&self) -> &Path {
        &self.roots.config
    }

    pub fn cache_dir(&self) -> &Path {
        &self.roots.cache
    }

    /// Number of files in the whole tree.
    pub fn file_count(&self) -> usize {
        self.tree.count_files(self.tree.root())
    }

    /// Looks up the file a vpath names.
    pub fn file(&self, vpath: &str) -> Option<&AssetFile> {
        let vpath = normalize(vpath);
        let (name, dir_len) = basename(&vpath);
        let dir = self.tree.find_dir(components(&vpath[..dir_len.unwrap_or(0)]))?;
        self.tree.find_file(dir, name)
    }

    /// Real path of the file a vpath names, if any.
    pub fn resolve(&self, vpath: &str) -> Option<&Path> {
        self.file(vpath).map(AssetFile::path)
    }

    /// Real path of a vpath, or an unresolvable `surge://` marker on a miss.
    pub fn fullpath(&self, vpath: &str) -> PathBuf {
        match self.resolve(vpath) {
            Some(path) => path.to_path_buf(),
            None => {
                log::warn!("Asset not found: \"{vpath}\"");
                PathBuf::from(miss_marker(vpath))
            }
        }
    }

    pub fn exists(&self, vpath: &str) -> bool {
        self.file(vpath).is_some()
    }

    pub fn is_data_file(&self, vpath: &str) -> bool {
        self.file(vpath).is_some_and(|f| f.kind() == AssetKind::Data)
    }

    pub fn is_config_file(&self, vpath: &str) -> bool {
        self.file(vpath).is_some_and(|f| f.kind() == AssetKind::Config)
    }

    pub fn is_cache_file(&self, vpath: &str) -> bool {
        self.file(vpath).is_some_and(|f| f.kind() == AssetKind::Cache)
    }

    /// Reads the whole contents of an asset.
    pub fn read(&self, vpath: &str) -> Result<Vec<u8>, VfsError> {
        let path = self
            .resolve(vpath)
            .ok_or_else(|| VfsError::NotFound(vpath.to_string()))?;
        Ok(fs::read(path)?)
    }

    /// Visits the files below `dir_vpath` whose names end with `extension`.
    ///
    /// Files of a directory are visited in sorted order before its
    /// subdirectories. The callback receives the vpath of each file and may
    /// break to stop the walk. Returns the number of files visited.
    pub fn foreach_file<F>(&self, dir_vpath: &str, extension: Option<&str>, recursive: bool, mut callback: F) -> usize
    where
        F: FnMut(&str, &AssetFile) -> ControlFlow<()>,
    {
        let dir_vpath = normalize(dir_vpath);
        let dir_vpath = dir_vpath.trim_end_matches('/');
        let Some(dir) = self.tree.find_dir(components(dir_vpath)) else {
            return 0;
        };

        let mut count = 0;
        let _ = self.walk(dir, dir_vpath, extension, recursive, &mut callback, &mut count);
        count
    }

    fn walk<F>(
        &self,
        dir: DirId,
        dir_vpath: &str,
        extension: Option<&str>,
        recursive: bool,
        callback: &mut F,
        count: &mut usize,
    ) -> ControlFlow<()>
    where
        F: FnMut(&str, &AssetFile) -> ControlFlow<()>,
    {
        for file in self.tree.files(dir) {
            if extension.is_some_and(|ext| !has_extension(file.name(), ext)) {
                continue;
            }
            *count += 1;
            callback(&join(dir_vpath, file.name()), file)?;
        }

        if recursive {
            for (name, subdir) in self.tree.subdirs(dir) {
                self.walk(subdir, &join(dir_vpath, name), extension, true, callback, count)?;
            }
        }
        ControlFlow::Continue(())
    }

    /// Writable real path for a config file, always in the config root.
    pub fn create_config(&mut self, vpath: &str) -> Result<PathBuf, VfsError> {
        self.create(vpath, AssetKind::Config, true)
    }

    /// Writable real path for a cache file, always in the cache root.
    pub fn create_cache(&mut self, vpath: &str) -> Result<PathBuf, VfsError> {
        self.create(vpath, AssetKind::Cache, true)
    }

    /// Writable real path for a data file.
    ///
    /// An existing file keeps its real path unless `prefer_user_space` is set or
    /// the path is not writable, in which case it moves to the data root.
    pub fn create_data(&mut self, vpath: &str, prefer_user_space: bool) -> Result<PathBuf, VfsError> {
        self.create(vpath, AssetKind::Data, prefer_user_space)
    }

    fn create(&mut self, vpath: &str, kind: AssetKind, prefer_user_space: bool) -> Result<PathBuf, VfsError> {
        if !is_sane(vpath) {
            return Err(VfsError::InsaneVpath(vpath.to_string()));
        }

        let vpath = normalize(vpath);
        let (name, dir_len) = basename(&vpath);
        let dir_vpath = &vpath[..dir_len.unwrap_or(0)];
        let user_path = self.roots.for_kind(kind).join(&vpath);

        let dir = self.tree.make_dirs(components(dir_vpath));
        let Some(file) = self.tree.find_file_mut(dir, name) else {
            make_parent(&user_path)?;
            self.tree
                .insert_sorted(dir, AssetFile::new(name, user_path.clone(), kind, Priority::Primary));
            log::debug!("Created {:?} file \"{vpath}\" at {}", kind, user_path.display());
            return Ok(user_path);
        };

        let mut rewrite = prefer_user_space;
        if file.kind() != kind {
            log::debug!("\"{vpath}\" changes from {:?} to {:?}", file.kind(), kind);
            file.set_kind(kind);
            rewrite |= kind == AssetKind::Cache;
        }
        if !rewrite && !is_writable(file.path()) {
            log::debug!("{} is not writable", file.path().display());
            rewrite = true;
        }

        if rewrite && file.path() != user_path {
            make_parent(&user_path)?;
            log::debug!("Rewriting \"{vpath}\" to {}", user_path.display());
            file.set_path(user_path);
        }
        Ok(file.path().to_path_buf())
    }
}

fn scan_source(tree: &mut AssetTree, root: DirId, dir: &Path, kind: AssetKind, priority: Priority, require_sentinel: bool) {
    if !dir.is_dir() {
        log::debug!("Skipping {}: no such directory", dir.display());
        return;
    }
    if require_sentinel && !is_asset_folder(dir) {
        log::warn!("Skipping {}: not an asset folder", dir.display());
        return;
    }
    log::info!("Scanning {} ({:?}, {:?})", dir.display(), kind, priority);
    scan_folder(tree, root, dir, kind, priority);
}

fn make_parent(path: &Path) -> Result<(), VfsError> {
    if let Some(parent) = path.parent() {
        mkpath(parent)?;
    }
    Ok(())
}

fn is_writable(path: &Path) -> bool {
    OpenOptions::new().read(true).write(true).open(path).is_ok()
}
