//! Game packages: install from a zip archive, build one from the AVFS, list and
//! uninstall installed games.
//!
//! A game package is a zip archive containing at least one `levels/*.lev` file.
//! Everything below the folder that holds `levels/` is the game's root and is
//! unpacked into the per-user data directory of the game.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::ops::ControlFlow;
use std::path::Path;

use zip::ZipArchive;
use zip::write::SimpleFileOptions;

use crate::path::{has_extension, is_sane, is_valid_gameid};
use crate::roots::UserRoots;
use crate::scan::is_asset_folder;
use crate::tree::AssetKind;
use crate::{Avfs, AvfsConfig, VfsError};

const LEVELS_DIR: &str = "levels/";
const LEVEL_EXT: &str = ".lev";
const GUESSED_GAMEID_MAX: usize = 15;
const FALLBACK_GAMEID: &str = "game";

/// Options of [`install_game`].
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Game id to install as; guessed from the archive name when `None`.
    pub gameid: Option<String>,
    /// Whether an installed game of the same id may be overwritten.
    pub overwrite: bool,
    /// Per-user roots to install into; resolved for the platform when `None`.
    pub roots: Option<UserRoots>,
}

/// Prefix before the first `levels/` of the first `.lev` entry.
///
/// Returns `None` when no entry looks like a level, i.e. the archive is not a
/// game package. The prefix is empty or ends with `/`.
pub fn guess_root_folder<'a>(entries: impl IntoIterator<Item = &'a str>) -> Option<String> {
    entries
        .into_iter()
        .filter(|name| !name.ends_with('/') && has_extension(name, LEVEL_EXT))
        .find_map(|name| name.find(LEVELS_DIR).map(|at| name[..at].to_string()))
}

/// Derives a game id from an archive file name.
///
/// Keeps ASCII letters and digits (lowercased), stops at the first `.`, and
/// truncates to 15 characters; falls back to `"game"`.
pub fn guess_gameid(zip_path: &Path) -> String {
    let name = zip_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let gameid: String = name
        .chars()
        .take_while(|&c| c != '.')
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(GUESSED_GAMEID_MAX)
        .collect();

    if gameid.is_empty() {
        FALLBACK_GAMEID.to_string()
    } else {
        gameid
    }
}

fn open_archive(zip_path: &Path) -> Result<ZipArchive<BufReader<File>>, VfsError> {
    let file = File::open(zip_path)?;
    Ok(ZipArchive::new(BufReader::new(file))?)
}

fn entry_names(archive: &ZipArchive<BufReader<File>>) -> Vec<String> {
    archive.file_names().map(str::to_string).collect()
}

/// Whether the archive at `zip_path` is a game package.
pub fn is_game_package(zip_path: &Path) -> bool {
    match open_archive(zip_path) {
        Ok(archive) => guess_root_folder(entry_names(&archive).iter().map(String::as_str)).is_some(),
        Err(err) => {
            log::debug!("{} is not a readable zip: {err}", zip_path.display());
            false
        }
    }
}

/// Whether a game is installed in the given per-user roots.
pub fn is_installed(roots: &UserRoots) -> bool {
    is_asset_folder(&roots.data)
}

/// Whether `gameid` is installed for the current user.
pub fn is_game_installed(gameid: &str) -> bool {
    is_valid_gameid(gameid) && UserRoots::resolve(gameid).is_ok_and(|roots| is_installed(&roots))
}

/// Game ids installed below a per-user data base folder, sorted.
pub fn installed_games(data_base: &Path) -> Vec<String> {
    let entries = match fs::read_dir(data_base) {
        Ok(entries) => entries,
        Err(err) => {
            log::debug!("Can't list {}: {err}", data_base.display());
            return Vec::new();
        }
    };

    let mut games: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_valid_gameid(name) && is_asset_folder(&data_base.join(name)))
        .collect();
    games.sort();
    games
}

/// Unpacks a game package into the per-user data directory of its game id.
///
/// Returns the game id the package was installed as.
pub fn install_game(zip_path: &Path, options: InstallOptions) -> Result<String, VfsError> {
    let mut archive = open_archive(zip_path)?;
    let names = entry_names(&archive);
    let root = guess_root_folder(names.iter().map(String::as_str)).ok_or_else(|| {
        VfsError::InvalidPackage(format!("{} contains no levels", zip_path.display()))
    })?;

    let gameid = options.gameid.unwrap_or_else(|| guess_gameid(zip_path));
    if !is_valid_gameid(&gameid) {
        return Err(VfsError::InvalidGameId(gameid));
    }

    let roots = match options.roots {
        Some(roots) => roots,
        None => UserRoots::resolve(&gameid)?,
    };
    if is_installed(&roots) && !options.overwrite {
        return Err(VfsError::AlreadyInstalled(gameid));
    }

    log::info!("Installing {gameid} from {}...", zip_path.display());
    let mut avfs = Avfs::init(
        AvfsConfig::new(gameid.clone())
            .with_strict(false)
            .with_user_roots(roots)
            .with_exe_dir(None),
    )?;

    let mut unpacked = 0;
    for (index, name) in names.iter().enumerate() {
        let Some(vpath) = name.strip_prefix(root.as_str()) else {
            continue;
        };
        if vpath.is_empty() || name.ends_with('/') {
            continue;
        }
        if !is_sane(vpath) {
            log::warn!("Skipping unsafe entry \"{name}\"");
            continue;
        }

        match unpack_entry(&mut archive, index, &mut avfs, vpath) {
            Ok(()) => unpacked += 1,
            Err(err) => log::warn!("Can't unpack \"{name}\": {err}"),
        }
    }

    avfs.release();
    log::info!("Installed {gameid}: {unpacked} files");
    Ok(gameid)
}

fn unpack_entry(
    archive: &mut ZipArchive<BufReader<File>>,
    index: usize,
    avfs: &mut Avfs,
    vpath: &str,
) -> Result<(), VfsError> {
    let mut entry = archive.by_index(index)?;
    let path = avfs.create_data(vpath, true)?;
    let mut out = BufWriter::new(File::create(&path)?);
    io::copy(&mut entry, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Whether a data file belongs in a built package.
fn is_packable(vpath: &str) -> bool {
    !vpath.starts_with('.')
        && !vpath.contains("/.")
        && !has_extension(vpath, ".zip")
        && !(vpath.starts_with("screenshots/") && has_extension(vpath, ".png"))
}

/// Packs every data file of the filesystem into a zip archive at `output`.
///
/// Returns the number of files packed.
pub fn build_game(avfs: &Avfs, output: &Path) -> Result<usize, VfsError> {
    let mut vpaths = Vec::new();
    avfs.foreach_file("", None, true, |vpath, file| {
        if file.kind() == AssetKind::Data && is_packable(vpath) {
            vpaths.push((vpath.to_string(), file.path().to_path_buf()));
        }
        ControlFlow::Continue(())
    });

    log::info!("Building {} with {} files...", output.display(), vpaths.len());
    let mut writer = zip::ZipWriter::new(BufWriter::new(File::create(output)?));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut packed = 0;
    for (vpath, path) in vpaths {
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("Can't pack \"{vpath}\": {err}");
                continue;
            }
        };
        writer.start_file(vpath, options)?;
        writer.write_all(&bytes)?;
        packed += 1;
    }

    writer.finish()?.flush()?;
    log::info!("Built {}: {packed} files", output.display());
    Ok(packed)
}

/// Removes the per-user data, config and cache folders of a game.
///
/// Only available where those folders are dedicated to the game; on Windows they
/// are the executable directory and the call fails.
pub fn uninstall_game(gameid: &str, roots: &UserRoots) -> Result<(), VfsError> {
    if cfg!(windows) {
        return Err(VfsError::UnsupportedPlatform("uninstall is not available on Windows"));
    }
    if !is_valid_gameid(gameid) {
        return Err(VfsError::InvalidGameId(gameid.to_string()));
    }

    for dir in [&roots.data, &roots.config, &roots.cache] {
        if dir.file_name().is_none_or(|name| name != gameid) {
            log::warn!("Not removing {}: it isn't a folder of {gameid}", dir.display());
            continue;
        }
        if dir.is_dir() {
            log::info!("Removing {}", dir.display());
            fs::remove_dir_all(dir)?;
        }
    }
    Ok(())
}
