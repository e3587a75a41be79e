//! Launcher commands: install, build, uninstall and list games.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use surge_vfs::install::{self, InstallOptions};
use surge_vfs::{Avfs, AvfsConfig, Platform, SystemEnv, UserRoots, VfsError};

use crate::args::Command;
use crate::error::{EngineError, EngineResult};

/// Asks a yes/no question on `output` and reads the answer from `input`.
///
/// Only an answer starting with `y` counts as yes.
pub fn confirm(question: &str, input: &mut impl BufRead, output: &mut impl Write) -> bool {
    if write!(output, "{question} [y/N] ").and_then(|_| output.flush()).is_err() {
        return false;
    }
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(_) => answer.trim_start().to_ascii_lowercase().starts_with('y'),
        Err(_) => false,
    }
}

fn confirm_on_terminal(question: &str, assume_yes: bool) -> bool {
    assume_yes || confirm(question, &mut io::stdin().lock(), &mut io::stdout())
}

/// Runs a launcher command. Returns `false` for [`Command::Run`], which is
/// the engine's job.
pub fn run_command(command: Command<'_>, assume_yes: bool) -> EngineResult<bool> {
    match command {
        Command::Run => return Ok(false),
        Command::Install(zip) => {
            install_package(zip, assume_yes)?;
        }
        Command::Build(gameid) => {
            let output = PathBuf::from(format!("{gameid}.zip"));
            let packed = build_package(AvfsConfig::new(gameid), &output)?;
            println!("Built {} with {packed} files", output.display());
        }
        Command::Uninstall(gameid) => {
            let roots = UserRoots::resolve(gameid)?;
            if !install::is_installed(&roots) {
                return Err(VfsError::NotFound(format!("game \"{gameid}\"")).into());
            }
            if !confirm_on_terminal(&format!("Uninstall {gameid}?"), assume_yes) {
                return Err(EngineError::Cancelled);
            }
            install::uninstall_game(gameid, &roots)?;
            println!("Uninstalled {gameid}");
        }
        Command::ListGames => {
            let base = UserRoots::base_with(Platform::current()?, &SystemEnv)?;
            for gameid in install::installed_games(&base.data) {
                println!("{gameid}");
            }
        }
    }
    Ok(true)
}

fn install_package(zip: &Path, assume_yes: bool) -> EngineResult<String> {
    if !install::is_game_package(zip) {
        return Err(VfsError::InvalidPackage(format!("{} is not a game package", zip.display())).into());
    }

    let gameid = install::guess_gameid(zip);
    let mut overwrite = false;
    if install::is_game_installed(&gameid) {
        if !confirm_on_terminal(&format!("{gameid} is already installed. Overwrite?"), assume_yes) {
            return Err(EngineError::Cancelled);
        }
        overwrite = true;
    }

    let options = InstallOptions {
        gameid: Some(gameid),
        overwrite,
        roots: None,
    };
    let gameid = install::install_game(zip, options)?;
    println!("Installed {gameid}. Run it with: surge --game-id {gameid}");
    Ok(gameid)
}

/// Packs the data files of the game configured by `config` into `output`.
pub fn build_package(config: AvfsConfig, output: &Path) -> EngineResult<usize> {
    let avfs = Avfs::init(config.with_strict(true))?;
    let packed = install::build_game(&avfs, output)?;
    avfs.release();
    Ok(packed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ask(answer: &str) -> (bool, String) {
        let mut output = Vec::new();
        let yes = confirm("Proceed?", &mut answer.as_bytes(), &mut output);
        (yes, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_confirm() {
        assert_eq!(ask("y\n"), (true, "Proceed? [y/N] ".to_string()));
        assert!(ask("  Yes\n").0);
        assert!(!ask("n\n").0);
        assert!(!ask("\n").0);
        assert!(!ask("").0);
    }

    #[test]
    fn test_run_is_not_a_launcher_command() {
        assert!(!run_command(Command::Run, false).unwrap());
    }
}
