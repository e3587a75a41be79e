//! Shadow object containers.
//!
//! A container is an object that keeps handles to selected children of the
//! scene root in its heap. The handles pin those children against the garbage
//! collector, and an active container is what ticks them: the children are
//! detached, so the regular walk from the scene root skips them.
//!
//! Heap layout of the container object:
//!
//! ```text
//! [ index | obj_1 | obj_2 | ... | obj_N ]
//! ```
//!
//! Cell 0 is the rolling scan index used to recycle one dead cell per tick.
//! Cells after it hold handles in insertion order; a removed or dead object
//! leaves a null cell behind until the scan frees it.

use crate::error::{ScriptError, ScriptResult};
use crate::object::{Behavior, ObjectHandle, ObjectManager, Var};

const INDEX_CELL: usize = 0;
const FIRST_STORED_CELL: usize = 1;

/// How a container treats the objects it stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerMode {
    /// Sweeps destroyed objects, recycles memory and ticks the stored objects.
    Active,
    /// Only pins the stored objects and recycles memory.
    Passive,
}

impl ContainerMode {
    fn object_name(self) -> &'static str {
        match self {
            ContainerMode::Active => "LevelObjectContainer",
            ContainerMode::Passive => "PassiveLevelObjectContainer",
        }
    }
}

struct ContainerTick {
    mode: ContainerMode,
}

impl Behavior for ContainerTick {
    fn update(&mut self, this: ObjectHandle, objects: &mut ObjectManager) {
        match self.mode {
            ContainerMode::Active => {
                sweep(objects, this);
                recycle(objects, this);
                traverse(objects, this);
            }
            ContainerMode::Passive => recycle(objects, this),
        }
    }
}

/// Nulls the cells of dead objects and deletes killed ones right away, so
/// their destructors run before the next frame.
fn sweep(objects: &mut ObjectManager, container: ObjectHandle) {
    let stored: Vec<(usize, ObjectHandle)> = stored_cells(objects, container).collect();
    for (cell, handle) in stored {
        let dead = match objects.get(handle) {
            None => true,
            Some(object) if object.is_killed() => {
                let _ = objects.delete(handle);
                true
            }
            Some(_) => false,
        };
        if dead && let Some(object) = objects.get_mut(container) {
            object.heap_mut().set(cell, Var::Null);
        }
    }
}

/// Checks the cell under the rolling index and frees it if it no longer
/// refers to a live object, then advances the index.
fn recycle(objects: &mut ObjectManager, container: ObjectHandle) {
    let Some(heap) = objects.get(container).map(|o| o.heap()) else {
        return;
    };
    let mut index = heap
        .get(INDEX_CELL)
        .and_then(|v| v.as_number())
        .map_or(FIRST_STORED_CELL, |n| n as usize);

    let stale = index >= FIRST_STORED_CELL
        && index < heap.len()
        && match heap.get(index) {
            Some(Var::Handle(h)) => !objects.exists(h),
            Some(_) => true,
            None => false,
        };

    let Some(object) = objects.get_mut(container) else {
        return;
    };
    let heap = object.heap_mut();
    if stale {
        heap.free(index);
    }
    index += 1;
    if index >= heap.len() {
        index = FIRST_STORED_CELL;
    }
    heap.set(INDEX_CELL, Var::Number(index as f64));
}

/// Ticks the subtree of every stored object.
fn traverse(objects: &mut ObjectManager, container: ObjectHandle) {
    let stored: Vec<ObjectHandle> = stored_cells(objects, container).map(|(_, h)| h).collect();
    for handle in stored {
        objects.update_subtree(handle);
    }
}

fn stored_cells(objects: &ObjectManager, container: ObjectHandle) -> impl Iterator<Item = (usize, ObjectHandle)> + '_ {
    objects.get(container).into_iter().flat_map(|object| {
        let heap = object.heap();
        (FIRST_STORED_CELL..heap.len())
            .filter_map(move |cell| heap.get(cell).and_then(|v| v.as_handle()).map(|h| (cell, h)))
    })
}

/// Handle-level view of a container object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectContainer {
    handle: ObjectHandle,
    scene_root: ObjectHandle,
    mode: ContainerMode,
}

impl ObjectContainer {
    /// Spawns a container object under `parent` for children of `scene_root`.
    ///
    /// The container ticks whenever its own object is reached by a walk, so
    /// it pauses together with its parent.
    pub fn spawn(
        objects: &mut ObjectManager,
        parent: ObjectHandle,
        scene_root: ObjectHandle,
        mode: ContainerMode,
    ) -> ScriptResult<ObjectContainer> {
        if !objects.exists(scene_root) {
            return Err(ScriptError::NoSuchObject(scene_root));
        }
        let handle = objects.spawn_with(parent, mode.object_name(), ContainerTick { mode })?;
        if let Some(object) = objects.get_mut(handle) {
            let cell = object.heap_mut().alloc(Var::Number(FIRST_STORED_CELL as f64));
            debug_assert_eq!(cell, INDEX_CELL);
        }
        Ok(ObjectContainer {
            handle,
            scene_root,
            mode,
        })
    }

    /// The container object itself.
    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    pub fn scene_root(&self) -> ObjectHandle {
        self.scene_root
    }

    pub fn mode(&self) -> ContainerMode {
        self.mode
    }

    /// Stores a child of the scene root and detaches it from the regular walk.
    pub fn add_object(&self, objects: &mut ObjectManager, object: ObjectHandle) -> ScriptResult<()> {
        let parent = objects.get(object).ok_or(ScriptError::NoSuchObject(object))?.parent();
        if parent != Some(self.scene_root) {
            return Err(ScriptError::NotASceneChild { object });
        }
        if self.has_object(objects, object) {
            return Ok(());
        }

        objects.set_detached(object, true);
        let container = objects
            .get_mut(self.handle)
            .ok_or(ScriptError::NoSuchObject(self.handle))?;
        let heap = container.heap_mut();
        heap.alloc(Var::Handle(object));
        heap.set(INDEX_CELL, Var::Number(FIRST_STORED_CELL as f64));
        Ok(())
    }

    /// Forgets a stored object, leaving a null cell. Returns whether it was stored.
    ///
    /// The object stays detached from the scene walk. The caller adds it to
    /// another container, clears the flag with [`ObjectManager::set_detached`]
    /// or deletes it.
    pub fn remove_object(&self, objects: &mut ObjectManager, object: ObjectHandle) -> bool {
        let cell = stored_cells(objects, self.handle).find(|&(_, h)| h == object).map(|(cell, _)| cell);
        match (cell, objects.get_mut(self.handle)) {
            (Some(cell), Some(container)) => container.heap_mut().set(cell, Var::Null),
            _ => false,
        }
    }

    pub fn has_object(&self, objects: &ObjectManager, object: ObjectHandle) -> bool {
        stored_cells(objects, self.handle).any(|(_, h)| h == object)
    }

    /// Every stored handle in slot order, including those of killed or
    /// deleted objects whose cells were not cleared yet.
    pub fn handles<'a>(&self, objects: &'a ObjectManager) -> impl Iterator<Item = ObjectHandle> + use<'a> {
        stored_cells(objects, self.handle).map(|(_, h)| h)
    }

    /// Live stored objects, in slot order.
    pub fn iter<'a>(&self, objects: &'a ObjectManager) -> impl Iterator<Item = ObjectHandle> + use<'a> {
        self.handles(objects).filter(move |&h| objects.is_alive(h))
    }

    /// Number of live stored objects.
    pub fn len(&self, objects: &ObjectManager) -> usize {
        self.iter(objects).count()
    }

    pub fn is_empty(&self, objects: &ObjectManager) -> bool {
        self.iter(objects).next().is_none()
    }

    /// Stops ticking the stored objects; they stay alive.
    pub fn pause(&self, objects: &mut ObjectManager) {
        objects.set_active(self.handle, false);
    }

    pub fn resume(&self, objects: &mut ObjectManager) {
        objects.set_active(self.handle, true);
    }

    pub fn is_active(&self, objects: &ObjectManager) -> bool {
        objects.get(self.handle).is_some_and(|o| o.is_active())
    }

    /// Runs one container tick directly, as if the walk had reached it.
    pub fn tick(&self, objects: &mut ObjectManager) {
        objects.update_subtree(self.handle);
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

    struct Scene {
        objects: ObjectManager,
        level: ObjectHandle,
        container: ObjectContainer,
    }

    fn scene(mode: ContainerMode) -> Scene {
        let mut objects = ObjectManager::new();
        let level = objects.spawn(objects.root(), "Level").unwrap();
        let container = ObjectContainer::spawn(&mut objects, level, level, mode).unwrap();
        Scene {
            objects,
            level,
            container,
        }
    }

    #[test]
    fn active_container_ticks_its_objects_once() {
        let mut s = scene(ContainerMode::Active);
        let ticks = Rc::new(Cell::new(0));
        let obj = s.objects.spawn_with(s.level, "Coin", Counter(ticks.clone())).unwrap();
        s.container.add_object(&mut s.objects, obj).unwrap();
        assert!(s.objects.get(obj).unwrap().is_detached());

        // the level walk reaches the container, which ticks the coin
        s.objects.update_subtree(s.level);
        assert_eq!(ticks.get(), 1);
    }

    #[test]
    fn paused_container_does_not_tick() {
        let mut s = scene(ContainerMode::Active);
        let ticks = Rc::new(Cell::new(0));
        let obj = s.objects.spawn_with(s.level, "Coin", Counter(ticks.clone())).unwrap();
        s.container.add_object(&mut s.objects, obj).unwrap();

        s.container.pause(&mut s.objects);
        assert!(!s.container.is_active(&s.objects));
        s.objects.update_subtree(s.level);
        assert_eq!(ticks.get(), 0);
        assert!(s.objects.exists(obj));

        s.container.resume(&mut s.objects);
        s.objects.update_subtree(s.level);
        assert_eq!(ticks.get(), 1);
    }

    #[test]
    fn passive_container_only_pins() {
        let mut s = scene(ContainerMode::Passive);
        let ticks = Rc::new(Cell::new(0));
        let obj = s.objects.spawn_with(s.level, "Coin", Counter(ticks.clone())).unwrap();
        s.container.add_object(&mut s.objects, obj).unwrap();

        s.objects.update_subtree(s.level);
        assert_eq!(ticks.get(), 0);
        assert_eq!(s.objects.collect_garbage(), 0);
        assert!(s.objects.exists(obj));

        // unpinned but still detached: nothing owns it any more
        s.container.remove_object(&mut s.objects, obj);
        assert!(s.objects.get(obj).unwrap().is_detached());
        assert_eq!(s.objects.collect_garbage(), 1);
        assert!(!s.objects.exists(obj));
    }

    #[test]
    fn only_scene_children_are_accepted() {
        let mut s = scene(ContainerMode::Active);
        let other = s.objects.spawn(s.objects.root(), "Elsewhere").unwrap();
        let result = s.container.add_object(&mut s.objects, other);
        assert!(matches!(result, Err(ScriptError::NotASceneChild { .. })));
        assert!(!s.objects.get(other).unwrap().is_detached());
    }

    #[test]
    fn sweep_deletes_killed_objects_and_recycle_frees_cells() {
        let mut s = scene(ContainerMode::Active);
        let a = s.objects.spawn(s.level, "A").unwrap();
        let b = s.objects.spawn(s.level, "B").unwrap();
        s.container.add_object(&mut s.objects, a).unwrap();
        s.container.add_object(&mut s.objects, b).unwrap();
        assert_eq!(s.container.len(&s.objects), 2);

        s.objects.kill(a);
        s.container.tick(&mut s.objects);
        assert!(!s.objects.exists(a));
        assert_eq!(s.container.iter(&s.objects).collect::<Vec<_>>(), [b]);

        // the scan visits every cell within a few ticks
        for _ in 0..4 {
            s.container.tick(&mut s.objects);
        }
        let heap = s.objects.get(s.container.handle()).unwrap().heap();
        assert_eq!(heap.allocated(), 2);

        // a freed cell is reused by the next insertion
        let c = s.objects.spawn(s.level, "C").unwrap();
        s.container.add_object(&mut s.objects, c).unwrap();
        assert_eq!(s.container.iter(&s.objects).collect::<Vec<_>>(), [c, b]);
    }

    #[test]
    fn adding_twice_stores_once() {
        let mut s = scene(ContainerMode::Active);
        let a = s.objects.spawn(s.level, "A").unwrap();
        s.container.add_object(&mut s.objects, a).unwrap();
        s.container.add_object(&mut s.objects, a).unwrap();
        assert_eq!(s.container.len(&s.objects), 1);
        assert!(s.container.has_object(&s.objects, a));
        assert!(s.container.remove_object(&mut s.objects, a));
        assert!(!s.container.remove_object(&mut s.objects, a));
        assert!(s.container.is_empty(&s.objects));
    }
}
