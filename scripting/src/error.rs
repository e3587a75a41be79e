use thiserror::Error;

use crate::object::ObjectHandle;

/// Errors raised by the object runtime and the structures built on it.
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("no such object: {0}")]
    NoSuchObject(ObjectHandle),
    #[error("{object} is not a child of the scene root")]
    NotASceneChild { object: ObjectHandle },
    #[error("can't reparent {object} under {parent}: it would create a cycle")]
    Cycle {
        object: ObjectHandle,
        parent: ObjectHandle,
    },
    #[error("the root object can't be {0}")]
    Root(&'static str),
    #[error("invalid prefs id \"{0}\": use only lowercase letters and digits")]
    InvalidPrefsId(String),
    #[error(transparent)]
    Vfs(#[from] surge_vfs::VfsError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ScriptResult<T> = Result<T, ScriptError>;

/// Failure of the script preload.
#[derive(Error, Debug)]
pub enum PreloadError {
    #[error("script error: {0}")]
    Compile(String),
    #[error("the preload worker panicked: {0}")]
    Panicked(String),
}
