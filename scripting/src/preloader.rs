//! Script preload.
//!
//! Every `scripts/**/*.ss` file is compiled on a worker thread while the main
//! thread keeps calling its wait callback (to draw a loading screen, say).
//! During the preload the runtime callbacks are redirected: a crash records
//! its message and unwinds the worker, and the main thread turns it into a
//! [`PreloadError`] once the worker is joined.

use std::any::Any;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use surge_vfs::Avfs;

use crate::callbacks::{self, CallbackScope, CrashFn, LogFn};
use crate::error::PreloadError;

pub const SCRIPTS_DIR: &str = "scripts";
pub const SCRIPT_EXTENSION: &str = ".ss";

/// Name of the object that starts the game.
pub const APPLICATION_OBJECT: &str = "Application";

const WAIT_INTERVAL: Duration = Duration::from_millis(10);

/// Compiles script sources into the runtime.
pub trait ScriptCompiler: Send {
    /// Compiles the source of the script at `path`, or describes what is wrong with it.
    fn compile(&mut self, path: &str, source: &[u8]) -> Result<(), String>;

    /// Whether a compiled script declares the object `name`.
    fn declares(&self, name: &str) -> bool;
}

/// A compiler that records the objects declared by each script.
///
/// Declarations are `object "Name"` headers at the start of a line. A script
/// must be UTF-8 and may not declare an object that is already declared.
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    files: Vec<String>,
    objects: HashMap<String, String>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled files, in compilation order.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Path of the script declaring `name`.
    pub fn declared_in(&self, name: &str) -> Option<&str> {
        self.objects.get(name).map(String::as_str)
    }

    /// Number of declared objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

/// Names declared by `object "Name"` headers.
fn declarations(source: &str) -> impl Iterator<Item = &str> {
    source.lines().filter_map(|line| {
        let rest = line.trim_start().strip_prefix("object")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let rest = rest.trim_start().strip_prefix('"')?;
        rest.find('"').map(|end| &rest[..end])
    })
}

impl ScriptCompiler for ScriptRegistry {
    fn compile(&mut self, path: &str, source: &[u8]) -> Result<(), String> {
        let source = std::str::from_utf8(source).map_err(|err| format!("{path} is not valid UTF-8: {err}"))?;

        let mut declared: Vec<&str> = Vec::new();
        for name in declarations(source) {
            if let Some(other) = self.objects.get(name) {
                return Err(format!("{path}: duplicate object \"{name}\", already declared in {other}"));
            }
            if declared.contains(&name) {
                return Err(format!("{path}: object \"{name}\" is declared twice"));
            }
            declared.push(name);
        }

        for name in declared {
            self.objects.insert(name.to_string(), path.to_string());
        }
        self.files.push(path.to_string());
        Ok(())
    }

    fn declares(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }
}

/// Whether the engine must provide its own `Application` object.
pub fn needs_default_application(compiler: &impl ScriptCompiler) -> bool {
    !compiler.declares(APPLICATION_OBJECT)
}

/// Compiles every script of the filesystem on a worker thread.
///
/// `on_wait` runs at least once on the calling thread, then repeatedly until
/// the worker is done.
/// Returns the compiler, or the error that stopped the preload.
pub fn preload_scripts<C, W>(avfs: &Avfs, mut compiler: C, mut on_wait: W) -> Result<C, PreloadError>
where
    C: ScriptCompiler,
    W: FnMut(),
{
    let failure: Arc<Mutex<Option<String>>> = Arc::default();
    let crash_fn: CrashFn = {
        let failure = Arc::clone(&failure);
        Arc::new(move |message: &str| {
            failure.lock().get_or_insert_with(|| message.to_string());
        })
    };
    let log_fn: LogFn = Arc::new(|message: &str| log::debug!(target: callbacks::LOG_TARGET, "{message}"));

    log::info!("Compiling scripts...");
    let scope = CallbackScope::new(Some(log_fn), Some(crash_fn));
    let outcome = thread::scope(|s| {
        let worker = s.spawn(|| compile_scripts(avfs, &mut compiler));
        loop {
            on_wait();
            if worker.is_finished() {
                break;
            }
            thread::sleep(WAIT_INTERVAL);
        }
        worker.join()
    });
    drop(scope);

    match outcome {
        Ok(count) => {
            log::info!("Compiled {count} scripts");
            Ok(compiler)
        }
        Err(payload) => match failure.lock().take() {
            Some(message) => Err(PreloadError::Compile(message)),
            None => Err(PreloadError::Panicked(panic_message(&*payload))),
        },
    }
}

/// Worker body: compiles each script, crashing on the first error.
fn compile_scripts<C: ScriptCompiler>(avfs: &Avfs, compiler: &mut C) -> usize {
    let mut scripts = Vec::new();
    avfs.foreach_file(SCRIPTS_DIR, Some(SCRIPT_EXTENSION), true, |vpath, _| {
        scripts.push(vpath.to_string());
        ControlFlow::Continue(())
    });

    for vpath in &scripts {
        callbacks::log(&format!("Compiling {vpath}..."));
        let source = match avfs.read(vpath) {
            Ok(source) => source,
            Err(err) => callbacks::crash(&format!("Can't read {vpath}: {err}")),
        };
        if let Err(err) = compiler.compile(vpath, &source) {
            callbacks::crash(&err);
        }
    }
    scripts.len()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
