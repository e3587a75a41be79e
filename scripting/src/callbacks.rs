//! Process-wide log and crash callbacks of the scripting runtime.
//!
//! The runtime reports messages through [`log`] and unrecoverable script
//! errors through [`crash`]. Both go to the installed callbacks, or to the
//! `log` crate when none is installed. [`CallbackScope`] swaps a pair in for
//! the duration of a scope.

use std::sync::Arc;

use parking_lot::RwLock;

/// Target of the messages logged on behalf of scripts.
pub const LOG_TARGET: &str = "surge::script";

pub type LogFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Crash callbacks are not expected to return. If one does, [`crash`] panics.
pub type CrashFn = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Default)]
struct Callbacks {
    log: Option<LogFn>,
    crash: Option<CrashFn>,
}

static CALLBACKS: RwLock<Callbacks> = RwLock::new(Callbacks { log: None, crash: None });

/// Installs the log callback and returns the previous one.
pub fn set_log_function(log: Option<LogFn>) -> Option<LogFn> {
    std::mem::replace(&mut CALLBACKS.write().log, log)
}

/// Installs the crash callback and returns the previous one.
pub fn set_crash_function(crash: Option<CrashFn>) -> Option<CrashFn> {
    std::mem::replace(&mut CALLBACKS.write().crash, crash)
}

pub fn log(message: &str) {
    // cloned out so that the callback may install callbacks itself
    let callback = CALLBACKS.read().log.clone();
    match callback {
        Some(callback) => callback(message),
        None => log::info!(target: LOG_TARGET, "{message}"),
    }
}

/// Reports an unrecoverable script error. Never returns.
pub fn crash(message: &str) -> ! {
    let callback = CALLBACKS.read().crash.clone();
    if let Some(callback) = callback {
        callback(message);
    }
    log::error!(target: LOG_TARGET, "{message}");
    panic!("script error: {message}");
}

/// Installs a pair of callbacks and restores the previous pair on drop.
#[must_use = "the previous callbacks are restored when the scope is dropped"]
pub struct CallbackScope {
    previous: Callbacks,
}

impl CallbackScope {
    pub fn new(log: Option<LogFn>, crash: Option<CrashFn>) -> Self {
        let previous = std::mem::replace(&mut *CALLBACKS.write(), Callbacks { log, crash });
        Self { previous }
    }
}

impl Drop for CallbackScope {
    fn drop(&mut self) {
        *CALLBACKS.write() = std::mem::take(&mut self.previous);
    }
}

/// Serializes the tests that touch the process-wide callbacks.
#[cfg(test)]
pub(crate) static TEST_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());
