use std::process::ExitCode;

use crate::error::EngineError;
use crate::resources::Resources;

/// Reports an error that stops the engine.
///
/// Logs it, drops every loaded resource and returns the failure status that
/// `main` exits with.
pub fn fatal(err: &EngineError, resources: Option<&mut Resources>) -> ExitCode {
    log::error!("FATAL ERROR: {err}");
    if let Some(resources) = resources {
        resources.clear();
    }
    ExitCode::FAILURE
}
