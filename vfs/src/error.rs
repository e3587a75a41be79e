use std::fmt;

/// Errors that can occur during asset filesystem operations.
#[derive(Debug)]
pub enum VfsError {
    /// The game id is empty, too long, or not lowercase alphanumeric.
    InvalidGameId(String),
    /// A write entry point was given a vpath that is not sane.
    InsaneVpath(String),
    /// Strict mode is on and no asset folder contributed any file.
    EmptyFilesystem(String),
    /// The per-user directories cannot be determined on this platform.
    UnsupportedPlatform(&'static str),
    /// The archive is not a valid game package.
    InvalidPackage(String),
    /// The game is already installed and overwriting was not requested.
    AlreadyInstalled(String),
    /// The vpath does not name a known file.
    NotFound(String),
    /// An IO error occurred while accessing a real directory.
    Io(std::io::Error),
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VfsError::InvalidGameId(id) => write!(f, "invalid game id: \"{id}\""),
            VfsError::InsaneVpath(vpath) => write!(f, "unsafe virtual path: \"{vpath}\""),
            VfsError::EmptyFilesystem(gameid) => {
                write!(f, "no assets found for \"{gameid}\": the filesystem is empty")
            }
            VfsError::UnsupportedPlatform(what) => write!(f, "unsupported platform: {what}"),
            VfsError::InvalidPackage(reason) => write!(f, "invalid game package: {reason}"),
            VfsError::AlreadyInstalled(gameid) => {
                write!(f, "\"{gameid}\" is already installed")
            }
            VfsError::NotFound(vpath) => write!(f, "not found: {vpath}"),
            VfsError::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl std::error::Error for VfsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VfsError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for VfsError {
    fn from(err: std::io::Error) -> Self {
        VfsError::Io(err)
    }
}

#[cfg(feature = "install")]
impl From<zip::result::ZipError> for VfsError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(err) => VfsError::Io(err),
            other => VfsError::InvalidPackage(other.to_string()),
        }
    }
}
