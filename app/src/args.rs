//! Command line arguments trait and default implementation.
//!
//! Uses clap for CLI parsing with:
//! - Help text (`--help`)
//! - Validation and clear error messages
//! - Launcher commands that run instead of the engine loop

use std::path::{Path, PathBuf};

/// Game id used when none is given.
pub const DEFAULT_GAME_ID: &str = "surge";

/// What the binary should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// Start the engine loop.
    Run,
    /// Unpack a zipped game into the per-user data folder.
    Install(&'a Path),
    /// Pack the data files of a game into a zip.
    Build(&'a str),
    /// Remove the per-user folders of a game.
    Uninstall(&'a str),
    /// Print the installed games.
    ListGames,
}

/// Trait for engine configuration.
///
/// Every getter has a default, so an implementation only overrides the
/// options it cares about.
///
/// # Example
///
/// ```ignore
/// use surge_app::EngineArgs;
///
/// struct Headless;
///
/// impl EngineArgs for Headless {
///     fn parse() -> Self {
///         Headless
///     }
///
///     fn max_frames(&self) -> Option<u64> {
///         Some(60)
///     }
/// }
/// ```
pub trait EngineArgs: Sized {
    /// Parse command line arguments.
    fn parse() -> Self;

    /// Game to run.
    ///
    /// Default: `"surge"`
    fn game_id(&self) -> &str {
        DEFAULT_GAME_ID
    }

    /// Single directory to read every asset from, bypassing the user roots.
    ///
    /// Default: `None`
    fn data_dir(&self) -> Option<&Path> {
        None
    }

    /// Fallback directory of the bundled assets.
    ///
    /// Default: `None` (the executable's directory is probed)
    fn base_dir(&self) -> Option<&Path> {
        None
    }

    /// Get the maximum number of frames to process before auto-exit.
    ///
    /// Default: `None` (run indefinitely)
    fn max_frames(&self) -> Option<u64> {
        None
    }

    /// Whether debug messages are logged.
    ///
    /// Default: false
    fn verbose(&self) -> bool {
        false
    }

    /// Whether install and uninstall may proceed without asking.
    ///
    /// Default: false
    fn assume_yes(&self) -> bool {
        false
    }

    /// What to do.
    ///
    /// Default: [`Command::Run`]
    fn command(&self) -> Command<'_> {
        Command::Run
    }
}

// ============================================================================
// Default Engine Args (with clap on native)
// ============================================================================

/// Default engine arguments.
///
/// # Examples
///
/// ```bash
/// # Show help
/// ./surge --help
///
/// # Play an installed game
/// ./surge --game-id mygame
///
/// # Run a game from a folder for 100 frames, then exit
/// ./surge --data-dir ./mygame --max-frames 100
///
/// # Install, then build a package back
/// ./surge --install mygame.zip
/// ./surge --build mygame
/// ```
#[derive(Debug, Clone)]
pub struct DefaultEngineArgs {
    game_id: String,
    data_dir: Option<PathBuf>,
    base_dir: Option<PathBuf>,
    install: Option<PathBuf>,
    build: Option<String>,
    uninstall: Option<String>,
    list_games: bool,
    max_frames: Option<u64>,
    verbose: bool,
    yes: bool,
}

impl Default for DefaultEngineArgs {
    fn default() -> Self {
        Self {
            game_id: DEFAULT_GAME_ID.to_string(),
            data_dir: None,
            base_dir: None,
            install: None,
            build: None,
            uninstall: None,
            list_games: false,
            max_frames: None,
            verbose: false,
            yes: false,
        }
    }
}

impl DefaultEngineArgs {
    /// Create new default args for a game.
    pub fn with_game_id(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            ..Default::default()
        }
    }

    /// Read every asset from a single directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Set the fallback directory of the bundled assets.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Set the maximum number of frames.
    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

// ============================================================================
// Native implementation using clap
// ============================================================================

mod native {
    use super::*;
    use clap::{ArgGroup, Parser};

    /// Surge engine arguments.
    #[derive(Parser, Debug)]
    #[command(
        name = "surge",
        about = "Surge engine",
        long_about = "Runs a game made of levels, scripts and other assets.\n\n\
            Assets are looked up in the per-user data folder of the game, in the\n\
            folder of the executable (when it holds a surge.rocks file) and in the\n\
            base directory.\n\
            \n\
            EXAMPLES:\n\
              # Play a game installed for the current user\n\
              surge --game-id mygame\n\
            \n\
              # Install a zipped game, overwriting a previous install\n\
              surge --install mygame.zip --yes\n\
            \n\
              # Headless smoke test\n\
              surge --data-dir ./mygame --max-frames 10",
        version,
        group(ArgGroup::new("launcher").multiple(false))
    )]
    pub(super) struct CliArgs {
        /// Game id: lowercase letters and digits.
        #[arg(long, default_value = DEFAULT_GAME_ID)]
        pub game_id: String,

        /// Read every asset from this directory only.
        #[arg(long, value_name = "PATH")]
        pub data_dir: Option<PathBuf>,

        /// Fallback directory of the bundled assets.
        #[arg(long, value_name = "PATH")]
        pub base_dir: Option<PathBuf>,

        /// Install a zipped game and exit.
        #[arg(long, value_name = "ZIP", group = "launcher")]
        pub install: Option<PathBuf>,

        /// Pack the data files of a game into <GAMEID>.zip and exit.
        #[arg(long, value_name = "GAMEID", group = "launcher")]
        pub build: Option<String>,

        /// Remove the per-user folders of a game and exit.
        #[arg(long, value_name = "GAMEID", group = "launcher")]
        pub uninstall: Option<String>,

        /// List the installed games and exit.
        #[arg(long, group = "launcher")]
        pub list_games: bool,

        /// Exit after N frames (useful for testing).
        #[arg(long)]
        pub max_frames: Option<u64>,

        /// Log debug messages.
        #[arg(long, short)]
        pub verbose: bool,

        /// Don't ask before overwriting or removing a game.
        #[arg(long, short)]
        pub yes: bool,
    }

    impl From<CliArgs> for DefaultEngineArgs {
        fn from(args: CliArgs) -> Self {
            if args.data_dir.is_some() && args.base_dir.is_some() {
                log::warn!("--base-dir has no effect when --data-dir is given");
            }

            Self {
                game_id: args.game_id,
                data_dir: args.data_dir,
                base_dir: args.base_dir,
                install: args.install,
                build: args.build,
                uninstall: args.uninstall,
                list_games: args.list_games,
                max_frames: args.max_frames,
                verbose: args.verbose,
                yes: args.yes,
            }
        }
    }
}

impl EngineArgs for DefaultEngineArgs {
    fn parse() -> Self {
        use clap::Parser;
        native::CliArgs::parse().into()
    }

    fn game_id(&self) -> &str {
        &self.game_id
    }

    fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    fn max_frames(&self) -> Option<u64> {
        self.max_frames
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    fn assume_yes(&self) -> bool {
        self.yes
    }

    fn command(&self) -> Command<'_> {
        if let Some(zip) = &self.install {
            Command::Install(zip)
        } else if let Some(gameid) = &self.build {
            Command::Build(gameid)
        } else if let Some(gameid) = &self.uninstall {
            Command::Uninstall(gameid)
        } else if self.list_games {
            Command::ListGames
        } else {
            Command::Run
        }
    }
}
