//! Engine context handed to every scene.

use surge_core::timer::TimeManager;
use surge_scripting::{Prefs, ScriptRegistry, Stage, Vec2};
use surge_vfs::Avfs;

use crate::resources::Resources;

/// Everything a scene may touch during a framestep.
///
/// Owned by the [`Engine`](crate::Engine) and lent to the scene stack.
pub struct EngineContext {
    pub(crate) avfs: Avfs,
    pub(crate) prefs: Prefs,
    pub(crate) resources: Resources,
    pub(crate) scripts: ScriptRegistry,
    pub(crate) stage: Stage,
    pub(crate) time: TimeManager,
    pub(crate) camera: Vec2,
}

impl EngineContext {
    /// Get the asset filesystem.
    pub fn avfs(&self) -> &Avfs {
        &self.avfs
    }

    /// Get the user preferences.
    pub fn prefs_mut(&mut self) -> &mut Prefs {
        &mut self.prefs
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Loads an asset through the resource pool.
    pub fn load(&mut self, vpath: &str) -> Option<&[u8]> {
        match self.resources.load(&self.avfs, vpath) {
            Ok(asset) => Some(asset.bytes()),
            Err(err) => {
                log::warn!("Can't load {vpath}: {err}");
                None
            }
        }
    }

    pub fn release(&mut self, vpath: &str) {
        self.resources.release(vpath);
    }

    /// Get the compiled scripts.
    pub fn scripts(&self) -> &ScriptRegistry {
        &self.scripts
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut Stage {
        &mut self.stage
    }

    /// Get the game clock.
    pub fn time(&self) -> &TimeManager {
        &self.time
    }

    pub fn time_mut(&mut self) -> &mut TimeManager {
        &mut self.time
    }

    /// Position the region of interest is centred on.
    pub fn camera(&self) -> Vec2 {
        self.camera
    }

    pub fn set_camera(&mut self, camera: Vec2) {
        self.camera = camera;
    }
}
