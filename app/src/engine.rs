//! Engine start-up, main loop and teardown.

use std::thread;
use std::time::{Duration, Instant};

use surge_core::scene::{SceneEntry, SceneStack};
use surge_core::timer::TimeManager;
use surge_scripting::{Prefs, ScriptRegistry, Stage, Vec2, preload_scripts};
use surge_vfs::{Avfs, AvfsConfig};

use crate::args::EngineArgs;
use crate::context::EngineContext;
use crate::error::EngineResult;
use crate::resources::Resources;
use crate::scene::StageScene;

/// Target duration of a frame.
pub const FRAME_TIME: Duration = Duration::from_micros(16_667);

/// The running engine: its context and the scene stack driving it.
pub struct Engine {
    ctx: EngineContext,
    scenes: SceneStack<EngineContext>,
    max_frames: Option<u64>,
    frame_number: u64,
}

impl Engine {
    /// Starts every subsystem for the game named by `args`.
    pub fn new<A: EngineArgs>(args: &A) -> EngineResult<Self> {
        let mut config = AvfsConfig::new(args.game_id());
        if let Some(dir) = args.data_dir() {
            config = config.with_datadir(dir);
        }
        if let Some(dir) = args.base_dir() {
            config = config.with_basedir(dir);
        }
        Self::with_avfs_config(config, args.max_frames())
    }

    /// Starts every subsystem on an explicit filesystem configuration.
    pub fn with_avfs_config(config: AvfsConfig, max_frames: Option<u64>) -> EngineResult<Self> {
        surge_core::init();
        crate::init();

        let mut avfs = Avfs::init(config)?;
        // an empty prefs id stands for the game id
        let prefs = Prefs::create("", &mut avfs)?;
        let scripts = preload_scripts(&avfs, ScriptRegistry::new(), || {
            log::trace!("Waiting for the script preload...");
        })?;
        let stage = Stage::new()?;

        let mut ctx = EngineContext {
            avfs,
            prefs,
            resources: Resources::new(),
            scripts,
            stage,
            time: TimeManager::new(),
            camera: Vec2::default(),
        };

        let mut scenes = SceneStack::new();
        scenes.push(SceneEntry::new(StageScene::new()), &mut ctx)?;

        log::info!("Engine started");
        Ok(Self {
            ctx,
            scenes,
            max_frames,
            frame_number: 0,
        })
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut EngineContext {
        &mut self.ctx
    }

    pub fn scenes(&self) -> &SceneStack<EngineContext> {
        &self.scenes
    }

    /// Frames run so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Runs a single frame. Returns `false` once the scene stack is empty.
    pub fn step(&mut self) -> EngineResult<bool> {
        self.ctx.time.update();
        self.scenes.update(&mut self.ctx)?;
        if self.scenes.is_empty() {
            return Ok(false);
        }
        self.scenes.render(&mut self.ctx);
        self.ctx.resources.sweep();
        self.frame_number += 1;
        Ok(true)
    }

    /// Runs frames until the scene stack empties or the frame limit is hit.
    pub fn run(&mut self) -> EngineResult<()> {
        loop {
            if let Some(max_frames) = self.max_frames
                && self.frame_number >= max_frames
            {
                log::info!("Reached max frames limit ({}), exiting", max_frames);
                break;
            }

            let started = Instant::now();
            if !self.step()? {
                log::info!("No scenes left, exiting");
                break;
            }
            if let Some(idle) = FRAME_TIME.checked_sub(started.elapsed()) {
                thread::sleep(idle);
            }
        }
        Ok(())
    }

    /// Releases the scenes, saves the preferences and closes the filesystem.
    pub fn shutdown(self) {
        let Self { mut ctx, mut scenes, .. } = self;
        scenes.clear(&mut ctx);

        let EngineContext { avfs, prefs, mut resources, .. } = ctx;
        prefs.destroy();
        resources.clear();
        avfs.release();
        log::info!("Engine stopped");
    }

    /// Resources held by the engine, for the fatal path.
    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.ctx.resources
    }
}
