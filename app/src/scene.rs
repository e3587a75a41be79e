//! The scene that plays the stage.

use surge_core::scene::{Scene, Transition};
use surge_scripting::preloader::{APPLICATION_OBJECT, needs_default_application};
use surge_scripting::stage::{DEFAULT_ROI_HEIGHT, DEFAULT_ROI_WIDTH, camera_roi};
use surge_scripting::{Behavior, ObjectHandle, ObjectManager};

use crate::context::EngineContext;

/// Frames between two garbage collections of the object tree.
pub const GC_INTERVAL: u64 = 60;

/// Stands in for the `Application` object when no script declares one.
struct DefaultApplication {
    announced: bool,
}

impl Behavior for DefaultApplication {
    fn update(&mut self, _this: ObjectHandle, _objects: &mut ObjectManager) {
        if !self.announced {
            log::info!("No script declares \"{APPLICATION_OBJECT}\"; running the default one");
            self.announced = true;
        }
    }
}

/// Updates the stage around the camera every frame.
///
/// The scene quits once the `Application` object is gone.
#[derive(Debug, Default)]
pub struct StageScene {
    application: Option<ObjectHandle>,
    frames: u64,
}

impl StageScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of the `Application` object spawned by [`Scene::init`].
    pub fn application(&self) -> Option<ObjectHandle> {
        self.application
    }
}

impl Scene<EngineContext> for StageScene {
    fn init(&mut self, ctx: &mut EngineContext) {
        let behavior: Option<Box<dyn Behavior>> = if needs_default_application(ctx.scripts()) {
            Some(Box::new(DefaultApplication { announced: false }))
        } else {
            None
        };
        match ctx.stage_mut().spawn_object(APPLICATION_OBJECT, behavior) {
            Ok(handle) => self.application = Some(handle),
            Err(err) => log::error!("Can't spawn \"{APPLICATION_OBJECT}\": {err}"),
        }
        ctx.stage_mut().resume();
    }

    fn update(&mut self, ctx: &mut EngineContext) -> Transition<EngineContext> {
        let Some(application) = self.application else {
            return Transition::Quit;
        };
        if !ctx.stage().objects().is_alive(application) {
            log::info!("\"{APPLICATION_OBJECT}\" is gone, quitting");
            return Transition::Quit;
        }

        if ctx.time().is_paused() {
            ctx.stage_mut().pause();
        } else {
            ctx.stage_mut().resume();
        }

        let roi = camera_roi(ctx.camera(), DEFAULT_ROI_WIDTH, DEFAULT_ROI_HEIGHT);
        let updated = ctx.stage_mut().update(roi);
        log::trace!("Frame {}: {} entities updated", self.frames, updated.len());

        self.frames += 1;
        if self.frames % GC_INTERVAL == 0 {
            let collected = ctx.stage_mut().collect_garbage();
            if collected > 0 {
                log::debug!("Collected {collected} objects");
            }
        }
        Transition::None
    }

    fn render(&mut self, _ctx: &mut EngineContext) {}

    fn release(&mut self, ctx: &mut EngineContext) {
        if let Some(application) = self.application.take() {
            ctx.stage_mut().objects_mut().kill(application);
        }
        ctx.stage_mut().pause();
    }
}
