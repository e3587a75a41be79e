//! Platform-specific per-user roots.
//!
//! | OS | Data | Config | Cache |
//! |---|---|---|---|
//! | Windows | `<exedir>` | `<exedir>` | `<exedir>` |
//! | macOS | `~/Library/opensurge2d/<G>/` | `~/Library/Application Support/opensurge2d/<G>/` | `~/Library/Caches/opensurge2d/<G>/` |
//! | Linux/BSD | `$XDG_DATA_HOME/opensurge2d/<G>/` or `~/.local/share/...` | `$XDG_CONFIG_HOME/...` or `~/.config/...` | `$XDG_CACHE_HOME/...` or `~/.cache/...` |

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::VfsError;
use crate::tree::AssetKind;

/// Name of the engine folder inside each per-user base directory.
pub const BASE_FOLDER: &str = "opensurge2d";

/// Source of environment information used to resolve the roots.
pub trait Env {
    /// Value of an environment variable; empty values count as unset.
    fn var(&self, key: &str) -> Option<OsString>;

    /// The user's home directory.
    fn home_dir(&self) -> Option<PathBuf>;

    /// Directory containing the running executable.
    fn exe_dir(&self) -> Option<PathBuf>;
}

/// Reads the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Env for SystemEnv {
    fn var(&self, key: &str) -> Option<OsString> {
        std::env::var_os(key).filter(|v| !v.is_empty())
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.var("HOME").map(PathBuf::from).or_else(dirs::home_dir)
    }

    fn exe_dir(&self) -> Option<PathBuf> {
        exe_dir()
    }
}

/// Directory containing the running executable.
pub fn exe_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    exe.parent().map(Path::to_path_buf)
}

/// Platform families with distinct directory conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Unix,
}

impl Platform {
    /// The platform this binary was built for, if it is supported.
    pub fn current() -> Result<Platform, VfsError> {
        if cfg!(windows) {
            Ok(Platform::Windows)
        } else if cfg!(target_os = "macos") {
            Ok(Platform::MacOs)
        } else if cfg!(unix) {
            Ok(Platform::Unix)
        } else {
            Err(VfsError::UnsupportedPlatform(std::env::consts::OS))
        }
    }
}

/// The three writable per-user roots of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRoots {
    pub data: PathBuf,
    pub config: PathBuf,
    pub cache: PathBuf,
}

impl UserRoots {
    /// Resolves the roots of `gameid` for the current platform and environment.
    pub fn resolve(gameid: &str) -> Result<UserRoots, VfsError> {
        Self::resolve_with(Platform::current()?, gameid, &SystemEnv)
    }

    /// Resolves the roots of `gameid` for a given platform and environment.
    pub fn resolve_with(platform: Platform, gameid: &str, env: &dyn Env) -> Result<UserRoots, VfsError> {
        let base = Self::base_with(platform, env)?;
        Ok(UserRoots {
            data: join_game(base.data, platform, gameid),
            config: join_game(base.config, platform, gameid),
            cache: join_game(base.cache, platform, gameid),
        })
    }

    /// The engine folders that hold one subfolder per game.
    ///
    /// On Windows these are the executable directory itself.
    pub fn base_with(platform: Platform, env: &dyn Env) -> Result<UserRoots, VfsError> {
        match platform {
            Platform::Windows => {
                let exe = env
                    .exe_dir()
                    .ok_or(VfsError::UnsupportedPlatform("can't find the executable directory"))?;
                Ok(UserRoots {
                    data: exe.clone(),
                    config: exe.clone(),
                    cache: exe,
                })
            }
            Platform::MacOs => {
                let home = home(env)?;
                let library = home.join("Library");
                Ok(UserRoots {
                    data: library.join(BASE_FOLDER),
                    config: library.join("Application Support").join(BASE_FOLDER),
                    cache: library.join("Caches").join(BASE_FOLDER),
                })
            }
            Platform::Unix => {
                let xdg = |key: &str, fallback: &str| -> Result<PathBuf, VfsError> {
                    let dir = match env.var(key) {
                        Some(dir) => PathBuf::from(dir),
                        None => home(env)?.join(fallback),
                    };
                    Ok(dir.join(BASE_FOLDER))
                };
                Ok(UserRoots {
                    data: xdg("XDG_DATA_HOME", ".local/share")?,
                    config: xdg("XDG_CONFIG_HOME", ".config")?,
                    cache: xdg("XDG_CACHE_HOME", ".cache")?,
                })
            }
        }
    }

    /// The root files of the given kind are written to.
    pub fn for_kind(&self, kind: AssetKind) -> &Path {
        match kind {
            AssetKind::Data => &self.data,
            AssetKind::Config => &self.config,
            AssetKind::Cache => &self.cache,
        }
    }
}

fn home(env: &dyn Env) -> Result<PathBuf, VfsError> {
    env.home_dir()
        .ok_or(VfsError::UnsupportedPlatform("can't find the home directory"))
}

fn join_game(base: PathBuf, platform: Platform, gameid: &str) -> PathBuf {
    match platform {
        Platform::Windows => base,
        Platform::MacOs | Platform::Unix => base.join(gameid),
    }
}
