//! The stage: the scene root of a level and what hangs off it.
//!
//! ```text
//! System
//! └── Level
//!     ├── LevelObjectContainer       ticks the level objects
//!     ├── EntityTree                 parents one container per leaf sector
//!     │   └── PassiveLevelObjectContainer ...
//!     └── level objects and entities (detached, driven by the two above)
//! ```

use crate::container::{ContainerMode, ObjectContainer};
use crate::entity_tree::{DEFAULT_WORLD_HEIGHT, DEFAULT_WORLD_WIDTH, EntityTree, Rect};
use crate::error::ScriptResult;
use crate::object::{Behavior, ObjectHandle, ObjectManager, Vec2};

/// Name of the scene root object.
pub const LEVEL_NAME: &str = "Level";

/// Size of the default region of interest around the camera.
pub const DEFAULT_ROI_WIDTH: i32 = 1024;
pub const DEFAULT_ROI_HEIGHT: i32 = 768;

/// Region of interest of the given size centred on `camera`.
pub fn camera_roi(camera: Vec2, width: i32, height: i32) -> Rect {
    let left = camera.x.floor() as i32 - width / 2;
    let top = camera.y.floor() as i32 - height / 2;
    Rect::new(left, top, left + width - 1, top + height - 1)
}

/// Description of an entity to spawn.
#[derive(Default)]
pub struct EntityDesc {
    name: String,
    position: Vec2,
    tags: Vec<String>,
    persistent: bool,
    behavior: Option<Box<dyn Behavior>>,
}

impl EntityDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Vec2::new(x, y);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Persistent entities return to their spawn point when they leave the
    /// region of interest.
    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn with_behavior<B: Behavior + 'static>(mut self, behavior: B) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }
}

/// A level being played.
#[derive(Debug)]
pub struct Stage {
    objects: ObjectManager,
    level: ObjectHandle,
    container: ObjectContainer,
    entities: EntityTree,
    roi: Rect,
    paused: bool,
}

impl Stage {
    /// Creates a stage with the default world size.
    pub fn new() -> ScriptResult<Stage> {
        Stage::with_world_size(DEFAULT_WORLD_WIDTH, DEFAULT_WORLD_HEIGHT)
    }

    pub fn with_world_size(world_width: i32, world_height: i32) -> ScriptResult<Stage> {
        let mut objects = ObjectManager::new();
        let level = objects.spawn(objects.root(), LEVEL_NAME)?;
        let container = ObjectContainer::spawn(&mut objects, level, level, ContainerMode::Active)?;
        let entities = EntityTree::new(&mut objects, level, world_width, world_height)?;

        log::info!("Stage ready");
        Ok(Stage {
            objects,
            level,
            container,
            entities,
            roi: camera_roi(Vec2::default(), DEFAULT_ROI_WIDTH, DEFAULT_ROI_HEIGHT),
            paused: false,
        })
    }

    pub fn objects(&self) -> &ObjectManager {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut ObjectManager {
        &mut self.objects
    }

    /// The scene root.
    pub fn level(&self) -> ObjectHandle {
        self.level
    }

    /// Container ticking the level objects.
    pub fn container(&self) -> ObjectContainer {
        self.container
    }

    pub fn entity_tree(&self) -> &EntityTree {
        &self.entities
    }

    pub fn entity_tree_mut(&mut self) -> &mut EntityTree {
        &mut self.entities
    }

    /// Region of interest of the last update.
    pub fn roi(&self) -> Rect {
        self.roi
    }

    /// Spawns a level object, ticked every frame by the level container.
    pub fn spawn_object(&mut self, name: &str, behavior: Option<Box<dyn Behavior>>) -> ScriptResult<ObjectHandle> {
        let handle = self.objects.spawn(self.level, name)?;
        if let Some(behavior) = behavior {
            self.objects.set_behavior(handle, behavior)?;
        }
        self.container.add_object(&mut self.objects, handle)?;
        Ok(handle)
    }

    /// Spawns an entity and indexes it in the entity tree.
    pub fn spawn_entity(&mut self, desc: EntityDesc) -> ScriptResult<ObjectHandle> {
        let handle = self.objects.spawn(self.level, desc.name)?;
        if let Some(object) = self.objects.get_mut(handle) {
            object.set_position(desc.position);
            for tag in desc.tags {
                object.add_tag(tag);
            }
        }
        if let Some(behavior) = desc.behavior {
            self.objects.set_behavior(handle, behavior)?;
        }
        self.entities.insert(&mut self.objects, handle)?;
        self.entities.set_persistent(handle, desc.persistent);
        Ok(handle)
    }

    /// Runs one frame. Returns the entities ticked in the region of interest.
    pub fn update(&mut self, roi: Rect) -> Vec<ObjectHandle> {
        self.roi = roi;
        if self.paused {
            return Vec::new();
        }
        self.objects.update_subtree(self.level);
        self.entities.update(&mut self.objects, roi)
    }

    /// Stops ticking the level. Objects stay alive.
    pub fn pause(&mut self) {
        if !self.paused {
            log::debug!("Stage paused");
            self.paused = true;
            self.container.pause(&mut self.objects);
        }
    }

    pub fn resume(&mut self) {
        if self.paused {
            log::debug!("Stage resumed");
            self.paused = false;
            self.container.resume(&mut self.objects);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Deletes unreachable objects. Returns how many were deleted.
    pub fn collect_garbage(&mut self) -> usize {
        self.objects.collect_garbage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counter(Rc<Cell<u32>>);

    impl Behavior for Counter {
        fn update(&mut self, _this: ObjectHandle, _objects: &mut ObjectManager) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn camera_roi_is_centred() {
        let roi = camera_roi(Vec2::new(512.0, 384.0), 1024, 768);
        assert_eq!(roi, Rect::new(0, 0, 1023, 767));
        assert_eq!((roi.width(), roi.height()), (1024, 768));
    }

    #[test]
    fn level_objects_tick_once_per_frame() {
        let mut stage = Stage::new().unwrap();
        let ticks = Rc::new(Cell::new(0));
        let obj = stage.spawn_object("Timer", Some(Box::new(Counter(ticks.clone())))).unwrap();
        assert!(stage.container().has_object(stage.objects(), obj));

        stage.update(stage.roi());
        stage.update(stage.roi());
        assert_eq!(ticks.get(), 2);
    }

    #[test]
    fn pausing_freezes_objects_and_entities() {
        let mut stage = Stage::new().unwrap();
        let ticks = Rc::new(Cell::new(0));
        stage.spawn_object("Timer", Some(Box::new(Counter(ticks.clone())))).unwrap();
        let entity = stage
            .spawn_entity(EntityDesc::new("Coin").with_position(10.0, 10.0).with_behavior(Counter(ticks.clone())))
            .unwrap();

        let roi = Rect::new(0, 0, 1023, 767);
        assert_eq!(stage.update(roi), [entity]);
        assert_eq!(ticks.get(), 2);

        stage.pause();
        assert!(stage.is_paused());
        assert!(stage.update(roi).is_empty());
        assert_eq!(ticks.get(), 2);

        stage.resume();
        stage.update(roi);
        assert_eq!(ticks.get(), 4);
    }

    #[test]
    fn garbage_collection_keeps_the_stage() {
        let mut stage = Stage::new().unwrap();
        let obj = stage.spawn_object("Keeper", None).unwrap();
        let entity = stage.spawn_entity(EntityDesc::new("Coin").with_position(5000.0, 5000.0)).unwrap();
        let level = stage.level();
        let orphan = stage.objects_mut().spawn_detached(level, "Orphan").unwrap();

        assert_eq!(stage.collect_garbage(), 1);
        assert!(stage.objects().exists(obj));
        assert!(stage.objects().exists(entity));
        assert!(!stage.objects().exists(orphan));
    }

    #[test]
    fn entity_description_is_applied() {
        let mut stage = Stage::new().unwrap();
        let entity = stage
            .spawn_entity(
                EntityDesc::new("Spring")
                    .with_position(300.0, 200.0)
                    .with_tag("gimmick")
                    .with_persistent(true),
            )
            .unwrap();

        let object = stage.objects().get(entity).unwrap();
        assert_eq!(object.name(), "Spring");
        assert!(object.has_tag("gimmick"));
        assert_eq!(object.position(), Vec2::new(300.0, 200.0));
        let info = stage.entity_tree().entity_info(entity).unwrap();
        assert!(info.is_persistent());
        assert_eq!(info.spawn_point(), Vec2::new(300.0, 200.0));
    }
}
