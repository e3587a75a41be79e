//! Asset virtual filesystem for the Surge engine.
//!
//! Merges several real directories into one case-insensitive namespace of
//! virtual paths (vpaths) such as `levels/one.lev`:
//!
//! - the per-user config and cache roots,
//! - the bundled assets next to the executable, when they carry the
//!   `surge.rocks` sentinel,
//! - the per-user data root,
//! - a fallback base directory.
//!
//! ```ignore
//! let mut avfs = Avfs::init(AvfsConfig::new("surge").with_basedir("/usr/share/surge"))?;
//! let level = avfs.fullpath("levels/sunshine-1.lev");
//! let prefs = avfs.create_config("surge.prefs")?;
//! ```
//!
//! Reads never fail: a miss yields an unresolvable `surge://` marker path.
//! Writes go through [`Avfs::create_config`], [`Avfs::create_cache`] and
//! [`Avfs::create_data`], which hand out real paths inside the user roots.
//!
//! With the `install` feature (on by default) the crate also installs, builds and
//! uninstalls zipped game packages.

mod avfs;
mod error;
#[cfg(feature = "install")]
pub mod install;
pub mod path;
mod roots;
mod scan;
mod tree;

pub use avfs::{Avfs, AvfsConfig};
pub use error::VfsError;
pub use roots::{BASE_FOLDER, Env, Platform, SystemEnv, UserRoots, exe_dir};
pub use scan::{SENTINEL, ScanStats, is_asset_folder, mkpath, scan_folder};
pub use tree::{AssetFile, AssetKind, AssetTree, DirId, Insert, Priority};
