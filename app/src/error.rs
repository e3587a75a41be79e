use surge_core::scene::SceneError;
use surge_scripting::{PreloadError, ScriptError};
use surge_vfs::VfsError;
use thiserror::Error;

/// Errors that stop the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Vfs(#[from] VfsError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("can't preload the scripts: {0}")]
    Preload(#[from] PreloadError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("cancelled by the user")]
    Cancelled,
}

pub type EngineResult<T> = Result<T, EngineError>;
