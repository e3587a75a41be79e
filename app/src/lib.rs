//! # Surge App
//!
//! Engine loop and launcher of the Surge engine.
//!
//! ## Overview
//!
//! - [`EngineArgs`] - Trait for the command line configuration
//! - [`Engine`] - Starts the subsystems, runs the scene stack, shuts down
//! - [`EngineContext`] - What scenes see of the engine
//! - [`StageScene`] - The scene that plays the stage
//! - [`fatal`] - Reports an error that stops the engine
//!
//! ## Example
//!
//! ```ignore
//! use surge_app::{DefaultEngineArgs, Engine, EngineArgs};
//!
//! fn main() {
//!     let args = DefaultEngineArgs::parse();
//!     let mut engine = Engine::new(&args).unwrap();
//!     engine.run().unwrap();
//!     engine.shutdown();
//! }
//! ```

mod args;
mod context;
mod engine;
mod error;
mod fatal;
pub mod launcher;
mod resources;
mod scene;

pub use args::{Command, DEFAULT_GAME_ID, DefaultEngineArgs, EngineArgs};
pub use context::EngineContext;
pub use engine::{Engine, FRAME_TIME};
pub use error::{EngineError, EngineResult};
pub use fatal::fatal;
pub use resources::{Asset, Resources};
pub use scene::{GC_INTERVAL, StageScene};

/// App library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the app subsystem.
pub fn init() {
    log::info!("Surge App v{} initialized", VERSION);
}
