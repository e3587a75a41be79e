//! Object runtime: a tree of named objects stored in a generational arena.
//!
//! Every object has a parent (except the root, named `System`), an ordered
//! list of children, a small heap of variables and an optional [`Behavior`]
//! that receives the per-frame `update` and the `on_reset`/`on_destroy`
//! notifications.
//!
//! Objects are ticked by walking the tree from some object downwards
//! ([`ObjectManager::update_subtree`]). A *detached* object is skipped by that
//! walk when reached through its parent: something else (a shadow container)
//! decides when it runs. Killed objects are deleted the next time the walk
//! reaches them, and [`ObjectManager::collect_garbage`] deletes whatever is
//! no longer reachable from the root.
//!
//! # Example
//!
//! ```
//! use surge_scripting::object::ObjectManager;
//!
//! let mut objects = ObjectManager::new();
//! let level = objects.spawn(objects.root(), "Level").unwrap();
//! let coin = objects.spawn(level, "Coin").unwrap();
//!
//! objects.kill(coin);
//! objects.update();
//! assert!(!objects.exists(coin));
//! ```

use std::fmt;

use crate::error::{ScriptError, ScriptResult};

/// Name of the root object.
pub const ROOT_NAME: &str = "System";

/// Generational handle to an object.
///
/// A handle stays unique after its object is deleted: a recycled slot gets a
/// new generation, so stale handles never alias a newer object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle {
    index: u32,
    generation: u32,
}

impl ObjectHandle {
    /// Slot index of the object in the arena.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({}@{})", self.index, self.generation)
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A heap variable.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Var {
    #[default]
    Null,
    Number(f64),
    Handle(ObjectHandle),
}

impl Var {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Var::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<ObjectHandle> {
        match self {
            Var::Handle(h) => Some(*h),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Var::Null)
    }
}

/// Per-object variable storage.
///
/// Cells are addressed by index. A freed cell is reused by the next
/// allocation; trailing free cells are dropped.
#[derive(Debug, Clone, Default)]
pub struct Heap {
    cells: Vec<Option<Var>>,
}

impl Heap {
    /// Stores `value` in the first free cell and returns its index.
    pub fn alloc(&mut self, value: Var) -> usize {
        match self.cells.iter().position(Option::is_none) {
            Some(cell) => {
                self.cells[cell] = Some(value);
                cell
            }
            None => {
                self.cells.push(Some(value));
                self.cells.len() - 1
            }
        }
    }

    pub fn get(&self, cell: usize) -> Option<Var> {
        self.cells.get(cell).copied().flatten()
    }

    /// Overwrites an allocated cell. Returns `false` if the cell is free.
    pub fn set(&mut self, cell: usize, value: Var) -> bool {
        match self.cells.get_mut(cell) {
            Some(slot @ Some(_)) => {
                *slot = Some(value);
                true
            }
            _ => false,
        }
    }

    /// Frees a cell for reuse. Returns `false` if it was already free.
    pub fn free(&mut self, cell: usize) -> bool {
        let freed = self.cells.get_mut(cell).and_then(Option::take).is_some();
        while self.cells.last().is_some_and(Option::is_none) {
            self.cells.pop();
        }
        freed
    }

    pub fn is_allocated(&self, cell: usize) -> bool {
        self.get(cell).is_some()
    }

    /// Number of cells, free ones included.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of allocated cells.
    pub fn allocated(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Object handles stored anywhere in the heap.
    pub fn handles(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.cells.iter().filter_map(|c| c.and_then(|v| v.as_handle()))
    }
}

/// 2D position in world space; y grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Native code attached to an object.
pub trait Behavior {
    /// Called once per tick while the object is active and reached by a walk.
    fn update(&mut self, _this: ObjectHandle, _objects: &mut ObjectManager) {}

    /// Called when an entity is moved back to its spawn point.
    fn on_reset(&mut self, _this: ObjectHandle, _objects: &mut ObjectManager) {}

    /// Called right before the object is deleted, after its children.
    fn on_destroy(&mut self, _this: ObjectHandle, _objects: &mut ObjectManager) {}
}

/// An object of the tree.
pub struct Object {
    name: String,
    parent: Option<ObjectHandle>,
    children: Vec<ObjectHandle>,
    active: bool,
    killed: bool,
    detached: bool,
    tags: Vec<String>,
    position: Vec2,
    heap: Heap,
    behavior: Option<Box<dyn Behavior>>,
}

impl Object {
    fn new(name: String, parent: Option<ObjectHandle>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            active: true,
            killed: false,
            detached: false,
            tags: Vec::new(),
            position: Vec2::default(),
            heap: Heap::default(),
            behavior: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent object; `None` only for the root.
    pub fn parent(&self) -> Option<ObjectHandle> {
        self.parent
    }

    pub fn children(&self) -> &[ObjectHandle] {
        &self.children
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_killed(&self) -> bool {
        self.killed
    }

    /// Whether the object is skipped when its parent's subtree is updated.
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.has_tag(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("active", &self.active)
            .field("killed", &self.killed)
            .field("detached", &self.detached)
            .field("tags", &self.tags)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

struct Slot {
    generation: u32,
    object: Option<Object>,
}

/// Owner of every object.
pub struct ObjectManager {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    root: ObjectHandle,
    count: usize,
}

impl ObjectManager {
    /// Creates a manager holding only the root object.
    pub fn new() -> Self {
        let mut objects = Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            root: ObjectHandle {
                index: 0,
                generation: 0,
            },
            count: 0,
        };
        objects.root = objects.allocate(Object::new(ROOT_NAME.to_string(), None));
        objects
    }

    pub fn root(&self) -> ObjectHandle {
        self.root
    }

    /// Number of live objects, the root included.
    pub fn count(&self) -> usize {
        self.count
    }

    fn allocate(&mut self, object: Object) -> ObjectHandle {
        self.count += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            ObjectHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                object: Some(object),
            });
            ObjectHandle {
                index,
                generation: 0,
            }
        }
    }

    fn deallocate(&mut self, handle: ObjectHandle) {
        if let Some(slot) = self.slots.get_mut(handle.index as usize)
            && slot.generation == handle.generation
            && slot.object.take().is_some()
        {
            slot.generation = slot.generation.wrapping_add(1);
            self.free_list.push(handle.index);
            self.count -= 1;
        }
    }

    /// Spawns a child of `parent`.
    pub fn spawn(&mut self, parent: ObjectHandle, name: impl Into<String>) -> ScriptResult<ObjectHandle> {
        if !self.exists(parent) {
            return Err(ScriptError::NoSuchObject(parent));
        }
        let handle = self.allocate(Object::new(name.into(), Some(parent)));
        if let Some(parent) = self.get_mut(parent) {
            parent.children.push(handle);
        }
        Ok(handle)
    }

    /// Spawns a child of `parent` driven by `behavior`.
    pub fn spawn_with<B: Behavior + 'static>(
        &mut self,
        parent: ObjectHandle,
        name: impl Into<String>,
        behavior: B,
    ) -> ScriptResult<ObjectHandle> {
        let handle = self.spawn(parent, name)?;
        self.set_behavior(handle, Box::new(behavior))?;
        Ok(handle)
    }

    /// Spawns a detached child: it is not ticked by its parent's walk.
    pub fn spawn_detached(&mut self, parent: ObjectHandle, name: impl Into<String>) -> ScriptResult<ObjectHandle> {
        let handle = self.spawn(parent, name)?;
        self.set_detached(handle, true);
        Ok(handle)
    }

    pub fn set_behavior(&mut self, handle: ObjectHandle, behavior: Box<dyn Behavior>) -> ScriptResult<()> {
        let object = self.get_mut(handle).ok_or(ScriptError::NoSuchObject(handle))?;
        object.behavior = Some(behavior);
        Ok(())
    }

    pub fn exists(&self, handle: ObjectHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<&Object> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_ref())
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut Object> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_mut())
    }

    /// Handles of every live object, in slot order.
    pub fn handles(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.object.as_ref().map(|_| ObjectHandle {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }

    pub fn is_killed(&self, handle: ObjectHandle) -> bool {
        self.get(handle).is_some_and(Object::is_killed)
    }

    /// Whether the object exists and has not been killed.
    pub fn is_alive(&self, handle: ObjectHandle) -> bool {
        self.get(handle).is_some_and(|o| !o.killed)
    }

    pub fn position(&self, handle: ObjectHandle) -> Option<Vec2> {
        self.get(handle).map(Object::position)
    }

    pub fn set_position(&mut self, handle: ObjectHandle, position: Vec2) -> bool {
        match self.get_mut(handle) {
            Some(object) => {
                object.position = position;
                true
            }
            None => false,
        }
    }

    pub fn has_tag(&self, handle: ObjectHandle, tag: &str) -> bool {
        self.get(handle).is_some_and(|o| o.has_tag(tag))
    }

    pub fn set_detached(&mut self, handle: ObjectHandle, detached: bool) -> bool {
        match self.get_mut(handle) {
            Some(object) => {
                object.detached = detached;
                true
            }
            None => false,
        }
    }

    pub fn set_active(&mut self, handle: ObjectHandle, active: bool) -> bool {
        match self.get_mut(handle) {
            Some(object) => {
                object.active = active;
                true
            }
            None => false,
        }
    }

    /// Marks an object for deletion; it is deleted the next time a walk reaches it.
    pub fn kill(&mut self, handle: ObjectHandle) -> bool {
        if handle == self.root {
            log::warn!("Refusing to kill the root object");
            return false;
        }
        match self.get_mut(handle) {
            Some(object) => {
                object.killed = true;
                true
            }
            None => false,
        }
    }

    /// Deletes an object and its subtree now. Destructors run children first.
    pub fn delete(&mut self, handle: ObjectHandle) -> ScriptResult<()> {
        if handle == self.root {
            return Err(ScriptError::Root("deleted"));
        }
        let parent = self.get(handle).ok_or(ScriptError::NoSuchObject(handle))?.parent;
        if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            parent.children.retain(|&c| c != handle);
        }
        self.destroy_subtree(handle);
        Ok(())
    }

    fn destroy_subtree(&mut self, handle: ObjectHandle) {
        let Some(object) = self.get_mut(handle) else {
            return;
        };
        let children = std::mem::take(&mut object.children);
        for child in children {
            self.destroy_subtree(child);
        }

        self.call_behavior(handle, |behavior, objects| behavior.on_destroy(handle, objects));

        // children spawned by the destructor go with their parent
        let late = self
            .get_mut(handle)
            .map(|o| std::mem::take(&mut o.children))
            .unwrap_or_default();
        for child in late {
            self.destroy_subtree(child);
        }
        self.deallocate(handle);
    }

    /// Runs a behavior callback with the behavior taken out of its object.
    ///
    /// If the object was deleted while its own callback ran, its destructor
    /// runs once the callback returns.
    fn call_behavior<F>(&mut self, handle: ObjectHandle, f: F)
    where
        F: FnOnce(&mut dyn Behavior, &mut ObjectManager),
    {
        let Some(mut behavior) = self.get_mut(handle).and_then(|o| o.behavior.take()) else {
            return;
        };
        f(behavior.as_mut(), self);
        match self.get_mut(handle) {
            Some(object) => {
                if object.behavior.is_none() {
                    object.behavior = Some(behavior);
                }
            }
            None => behavior.on_destroy(handle, self),
        }
    }

    /// Moves an object under a new parent.
    pub fn reparent(&mut self, handle: ObjectHandle, new_parent: ObjectHandle) -> ScriptResult<()> {
        if handle == self.root {
            return Err(ScriptError::Root("reparented"));
        }
        if !self.exists(new_parent) {
            return Err(ScriptError::NoSuchObject(new_parent));
        }
        let old_parent = self.get(handle).ok_or(ScriptError::NoSuchObject(handle))?.parent;
        if handle == new_parent || self.is_ancestor_of(handle, new_parent) {
            return Err(ScriptError::Cycle {
                object: handle,
                parent: new_parent,
            });
        }
        if old_parent == Some(new_parent) {
            return Ok(());
        }

        if let Some(old) = old_parent.and_then(|p| self.get_mut(p)) {
            old.children.retain(|&c| c != handle);
        }
        if let Some(parent) = self.get_mut(new_parent) {
            parent.children.push(handle);
        }
        if let Some(object) = self.get_mut(handle) {
            object.parent = Some(new_parent);
        }
        Ok(())
    }

    /// Whether `ancestor` is a strict ancestor of `handle`.
    pub fn is_ancestor_of(&self, ancestor: ObjectHandle, handle: ObjectHandle) -> bool {
        let mut current = self.get(handle).and_then(Object::parent);
        while let Some(h) = current {
            if h == ancestor {
                return true;
            }
            current = self.get(h).and_then(Object::parent);
        }
        false
    }

    pub fn find_child(&self, parent: ObjectHandle, name: &str) -> Option<ObjectHandle> {
        self.get(parent)?
            .children
            .iter()
            .copied()
            .find(|&c| self.get(c).is_some_and(|o| o.name == name))
    }

    /// Nearest strict ancestor named `name`.
    pub fn find_ancestor(&self, handle: ObjectHandle, name: &str) -> Option<ObjectHandle> {
        let mut current = self.get(handle)?.parent;
        while let Some(h) = current {
            let object = self.get(h)?;
            if object.name == name {
                return Some(h);
            }
            current = object.parent;
        }
        None
    }

    /// Ticks the whole tree from the root.
    pub fn update(&mut self) {
        self.update_subtree(self.root);
    }

    /// Ticks `handle` and then its subtree, pre-order.
    ///
    /// Killed objects are deleted when reached. Inactive objects are skipped
    /// together with their subtree, and detached children are left to
    /// whoever drives them.
    pub fn update_subtree(&mut self, handle: ObjectHandle) {
        match self.get(handle) {
            None => return,
            Some(object) if object.killed => {
                let _ = self.delete(handle);
                return;
            }
            Some(object) if !object.active => return,
            Some(_) => {}
        }

        self.call_behavior(handle, |behavior, objects| behavior.update(handle, objects));

        let children = match self.get(handle) {
            Some(object) if object.killed => {
                let _ = self.delete(handle);
                return;
            }
            Some(object) => object.children.clone(),
            None => return,
        };
        for child in children {
            if self.get(child).is_some_and(|c| !c.detached) {
                self.update_subtree(child);
            }
        }
    }

    /// Notifies `handle` and its whole subtree through `on_reset`, pre-order.
    pub fn reset_subtree(&mut self, handle: ObjectHandle) {
        self.call_behavior(handle, |behavior, objects| behavior.on_reset(handle, objects));
        let children = self.get(handle).map(|o| o.children.clone()).unwrap_or_default();
        for child in children {
            self.reset_subtree(child);
        }
    }

    /// Deletes every object unreachable from the root.
    ///
    /// Reachability follows parents, non-detached children and handles stored
    /// in heaps. Returns the number of deleted objects.
    pub fn collect_garbage(&mut self) -> usize {
        let mut marked = vec![false; self.slots.len()];
        let mut stack = vec![self.root];
        while let Some(handle) = stack.pop() {
            let Some(object) = self.get(handle) else {
                continue;
            };
            let index = handle.index as usize;
            if marked[index] {
                continue;
            }
            marked[index] = true;

            stack.extend(object.parent);
            stack.extend(
                object
                    .children
                    .iter()
                    .copied()
                    .filter(|&c| self.get(c).is_some_and(|c| !c.detached)),
            );
            stack.extend(object.heap.handles());
        }

        let garbage: Vec<ObjectHandle> = self.handles().filter(|h| !marked[h.index as usize]).collect();
        let before = self.count;
        for handle in garbage {
            if self.exists(handle) {
                let _ = self.delete(handle);
            }
        }

        let collected = before.saturating_sub(self.count);
        if collected > 0 {
            log::debug!("Garbage collector: deleted {collected} objects");
        }
        collected
    }
}

impl Default for ObjectManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectManager")
            .field("count", &self.count)
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
    }

    impl Behavior for Recorder {
        fn update(&mut self, _this: ObjectHandle, _objects: &mut ObjectManager) {
            self.log.borrow_mut().push(format!("update {}", self.name));
        }

        fn on_reset(&mut self, _this: ObjectHandle, _objects: &mut ObjectManager) {
            self.log.borrow_mut().push(format!("reset {}", self.name));
        }

        fn on_destroy(&mut self, _this: ObjectHandle, _objects: &mut ObjectManager) {
            self.log.borrow_mut().push(format!("destroy {}", self.name));
        }
    }

    fn recorder(name: &'static str, log: &Log) -> Recorder {
        Recorder {
            name,
            log: log.clone(),
        }
    }

    #[test]
    fn root_is_system() {
        let objects = ObjectManager::new();
        let root = objects.get(objects.root()).unwrap();
        assert_eq!(root.name(), ROOT_NAME);
        assert_eq!(root.parent(), None);
        assert_eq!(objects.count(), 1);
    }

    #[test]
    fn stale_handles_do_not_alias() {
        let mut objects = ObjectManager::new();
        let a = objects.spawn(objects.root(), "A").unwrap();
        objects.delete(a).unwrap();
        let b = objects.spawn(objects.root(), "B").unwrap();
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert!(!objects.exists(a));
        assert_eq!(objects.get(b).unwrap().name(), "B");
    }

    #[test]
    fn update_is_pre_order_and_skips_detached_and_inactive() {
        let log = Log::default();
        let mut objects = ObjectManager::new();
        let root = objects.root();
        let a = objects.spawn_with(root, "A", recorder("a", &log)).unwrap();
        objects.spawn_with(a, "A1", recorder("a1", &log)).unwrap();
        let d = objects.spawn_with(root, "D", recorder("d", &log)).unwrap();
        objects.set_detached(d, true);
        let i = objects.spawn_with(root, "I", recorder("i", &log)).unwrap();
        objects.spawn_with(i, "I1", recorder("i1", &log)).unwrap();
        objects.set_active(i, false);

        objects.update();
        assert_eq!(*log.borrow(), ["update a", "update a1"]);

        log.borrow_mut().clear();
        objects.update_subtree(d);
        assert_eq!(*log.borrow(), ["update d"]);
    }

    #[test]
    fn killed_objects_are_deleted_children_first() {
        let log = Log::default();
        let mut objects = ObjectManager::new();
        let a = objects.spawn_with(objects.root(), "A", recorder("a", &log)).unwrap();
        objects.spawn_with(a, "B", recorder("b", &log)).unwrap();

        objects.kill(a);
        objects.update();
        assert_eq!(*log.borrow(), ["destroy b", "destroy a"]);
        assert_eq!(objects.count(), 1);
        assert!(objects.get(objects.root()).unwrap().children().is_empty());
    }

    #[test]
    fn self_deleting_behavior_still_gets_its_destructor() {
        struct SelfDestruct(Log);
        impl Behavior for SelfDestruct {
            fn update(&mut self, this: ObjectHandle, objects: &mut ObjectManager) {
                objects.delete(this).unwrap();
            }
            fn on_destroy(&mut self, _this: ObjectHandle, _objects: &mut ObjectManager) {
                self.0.borrow_mut().push("destroyed".into());
            }
        }

        let log = Log::default();
        let mut objects = ObjectManager::new();
        let h = objects.spawn_with(objects.root(), "Bomb", SelfDestruct(log.clone())).unwrap();
        objects.update();
        assert!(!objects.exists(h));
        assert_eq!(*log.borrow(), ["destroyed"]);
    }

    #[test]
    fn root_cannot_be_killed_or_deleted() {
        let mut objects = ObjectManager::new();
        let root = objects.root();
        assert!(!objects.kill(root));
        assert!(matches!(objects.delete(root), Err(ScriptError::Root(_))));
    }

    #[test]
    fn reparent_rejects_cycles() {
        let mut objects = ObjectManager::new();
        let a = objects.spawn(objects.root(), "A").unwrap();
        let b = objects.spawn(a, "B").unwrap();
        let c = objects.spawn(objects.root(), "C").unwrap();

        assert!(matches!(objects.reparent(a, b), Err(ScriptError::Cycle { .. })));
        assert!(matches!(objects.reparent(a, a), Err(ScriptError::Cycle { .. })));

        objects.reparent(b, c).unwrap();
        assert_eq!(objects.get(b).unwrap().parent(), Some(c));
        assert!(objects.get(a).unwrap().children().is_empty());
        assert_eq!(objects.find_child(c, "B"), Some(b));
    }

    #[test]
    fn find_ancestor_walks_up() {
        let mut objects = ObjectManager::new();
        let level = objects.spawn(objects.root(), "Level").unwrap();
        let a = objects.spawn(level, "A").unwrap();
        let b = objects.spawn(a, "B").unwrap();
        assert_eq!(objects.find_ancestor(b, "Level"), Some(level));
        assert_eq!(objects.find_ancestor(b, ROOT_NAME), Some(objects.root()));
        assert_eq!(objects.find_ancestor(b, "B"), None);
        assert!(objects.is_ancestor_of(level, b));
        assert!(!objects.is_ancestor_of(b, level));
    }

    #[test]
    fn reset_notifies_whole_subtree() {
        let log = Log::default();
        let mut objects = ObjectManager::new();
        let a = objects.spawn_with(objects.root(), "A", recorder("a", &log)).unwrap();
        let b = objects.spawn_with(a, "B", recorder("b", &log)).unwrap();
        objects.set_detached(b, true);
        objects.reset_subtree(a);
        assert_eq!(*log.borrow(), ["reset a", "reset b"]);
    }

    #[test]
    fn garbage_collector_keeps_pinned_detached_objects() {
        let mut objects = ObjectManager::new();
        let root = objects.root();
        let scene = objects.spawn(root, "Level").unwrap();
        let pinned = objects.spawn_detached(scene, "Pinned").unwrap();
        let child_of_pinned = objects.spawn(pinned, "Child").unwrap();
        let loose = objects.spawn_detached(scene, "Loose").unwrap();
        let holder = objects.spawn(scene, "Holder").unwrap();
        objects
            .get_mut(holder)
            .unwrap()
            .heap_mut()
            .alloc(Var::Handle(pinned));

        assert_eq!(objects.collect_garbage(), 1);
        assert!(objects.exists(pinned));
        assert!(objects.exists(child_of_pinned));
        assert!(!objects.exists(loose));
        assert!(objects.exists(holder));
    }

    #[test]
    fn heap_reuses_free_cells() {
        let mut heap = Heap::default();
        assert_eq!(heap.alloc(Var::Number(0.0)), 0);
        assert_eq!(heap.alloc(Var::Null), 1);
        assert_eq!(heap.alloc(Var::Null), 2);
        assert!(heap.free(1));
        assert!(!heap.free(1));
        assert_eq!(heap.alloc(Var::Number(7.0)), 1);
        assert_eq!(heap.get(1), Some(Var::Number(7.0)));

        assert!(heap.free(2));
        assert_eq!(heap.len(), 2);
        assert!(!heap.set(5, Var::Null));
    }
}
