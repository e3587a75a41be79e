//! Entity spatial index.
//!
//! The world rectangle is split by a quaternary tree of constant height
//! [`TREE_HEIGHT`]. Sector `0` is the root, the children of sector `i` are
//! `4i+1 ..= 4i+4` (top-left, top-right, bottom-left, bottom-right) and its
//! parent is `(i-1)/4`, so sectors live in a flat table and need no parent
//! links. Sectors are allocated lazily as entities bubble down into them.
//!
//! Every leaf owns a passive [`ObjectContainer`] holding the entities whose
//! clipped position lies in the leaf's rectangle. The container pins them and
//! keeps them off the regular scene walk; the tree ticks them itself, and only
//! for the leaves that intersect the region of interest.

use std::collections::{HashMap, HashSet};

use crate::container::{ContainerMode, ObjectContainer};
use crate::error::{ScriptError, ScriptResult};
use crate::object::{ObjectHandle, ObjectManager, Vec2};

/// Depth of the leaf sectors.
pub const TREE_HEIGHT: u32 = 5;

/// Number of sectors of a full tree: `(4^(H+1) - 1) / 3`.
pub const SECTOR_COUNT: usize = ((1usize << (2 * (TREE_HEIGHT + 1))) - 1) / 3;

/// Index of the last non-leaf sector: `(4/3) * (4^(H-1) - 1)`.
const LAST_INNER_SECTOR: usize = 4 * (((1usize << (2 * (TREE_HEIGHT - 1))) - 1) / 3);

const ROOT_SECTOR: usize = 0;

/// Smaller worlds are enlarged to this size, so that leaves stay large.
pub const MIN_WORLD_WIDTH: i32 = 8192;
pub const MIN_WORLD_HEIGHT: i32 = 4096;

pub const DEFAULT_WORLD_WIDTH: i32 = 32768;
pub const DEFAULT_WORLD_HEIGHT: i32 = 16384;

/// Entities with this tag are ticked every frame, wherever they are.
pub const AWAKE_TAG: &str = "awake";

/// Entities with this tag are destroyed when they leave the region of interest.
pub const DISPOSABLE_TAG: &str = "disposable";

/// Axis-aligned rectangle with inclusive integer bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left + 1
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top + 1
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.left <= x && x <= self.right && self.top <= y && y <= self.bottom
    }

    /// Point test in world space.
    pub fn contains_point(&self, point: Vec2) -> bool {
        f64::from(self.left) <= point.x
            && point.x <= f64::from(self.right)
            && f64::from(self.top) <= point.y
            && point.y <= f64::from(self.bottom)
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !(other.right < self.left || other.left > self.right || other.bottom < self.top || other.top > self.bottom)
    }
}

/// Position of a sector in the tree.
///
/// `path` holds one base-4 digit per level, the quadrant taken below the root
/// being the least significant one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorAddress {
    pub path: u32,
    pub depth: u32,
}

/// Whether sector `index` is at the bottom of the tree.
pub fn is_leaf(index: usize) -> bool {
    index > LAST_INNER_SECTOR
}

fn parent_of(index: usize) -> usize {
    (index - 1) / 4
}

fn child_of(index: usize, quadrant: usize) -> usize {
    4 * index + 1 + quadrant
}

pub fn sector_address(mut index: usize) -> SectorAddress {
    let mut address = SectorAddress { path: 0, depth: 0 };
    while index > 0 {
        address.path = 4 * address.path + ((index - 1) % 4) as u32;
        address.depth += 1;
        index = (index - 1) / 4;
    }
    address
}

fn clamp_world_size(width: i32, height: i32) -> (i32, i32) {
    (width.max(MIN_WORLD_WIDTH), height.max(MIN_WORLD_HEIGHT))
}

/// Rectangle covered by the sector at `address` in a world of the given size.
///
/// Odd extents give the extra row or column to the top and left halves.
pub fn sector_rect(address: SectorAddress, world_width: i32, world_height: i32) -> Rect {
    let (world_width, world_height) = clamp_world_size(world_width, world_height);
    let mut rect = Rect::new(0, 0, world_width - 1, world_height - 1);
    let mut path = address.path;

    for _ in 0..address.depth {
        let w = rect.width();
        let h = rect.height();
        match path % 4 {
            // top-left
            0 => {
                rect.right = rect.left + (w + 1) / 2 - 1;
                rect.bottom = rect.top + (h + 1) / 2 - 1;
            }
            // top-right
            1 => {
                rect.left = rect.right - w / 2 + 1;
                rect.bottom = rect.top + (h + 1) / 2 - 1;
            }
            // bottom-left
            2 => {
                rect.right = rect.left + (w + 1) / 2 - 1;
                rect.top = rect.bottom - h / 2 + 1;
            }
            // bottom-right
            _ => {
                rect.left = rect.right - w / 2 + 1;
                rect.top = rect.bottom - h / 2 + 1;
            }
        }
        path /= 4;
    }

    rect
}

#[derive(Debug)]
struct Sector {
    rect: Rect,
    container: Option<ObjectContainer>,
}

/// Bookkeeping of an indexed entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityInfo {
    spawn_point: Vec2,
    persistent: bool,
    sleeping: bool,
    leaf: Option<usize>,
}

impl EntityInfo {
    /// Position of the entity when it was inserted.
    pub fn spawn_point(&self) -> Vec2 {
        self.spawn_point
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Whether the entity was sent back to its spawn point and not seen since.
    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Leaf sector holding the entity; `None` for awake entities.
    pub fn leaf(&self) -> Option<usize> {
        self.leaf
    }
}

/// Space-partitioned index of the entities of a scene.
#[derive(Debug)]
pub struct EntityTree {
    node: ObjectHandle,
    scene_root: ObjectHandle,
    world_width: i32,
    world_height: i32,
    sectors: Vec<Option<Sector>>,
    entities: HashMap<ObjectHandle, EntityInfo>,
    awake: ObjectContainer,
}

impl EntityTree {
    /// Creates the tree for entities that are children of `scene_root`.
    ///
    /// The tree's own object, which parents the leaf containers, is spawned
    /// under `scene_root` as well.
    pub fn new(
        objects: &mut ObjectManager,
        scene_root: ObjectHandle,
        world_width: i32,
        world_height: i32,
    ) -> ScriptResult<Self> {
        let node = objects.spawn(scene_root, "EntityTree")?;
        let awake = ObjectContainer::spawn(objects, node, scene_root, ContainerMode::Passive)?;
        let (world_width, world_height) = clamp_world_size(world_width, world_height);

        let mut sectors = Vec::with_capacity(SECTOR_COUNT);
        sectors.resize_with(SECTOR_COUNT, || None);
        sectors[ROOT_SECTOR] = Some(Sector {
            rect: sector_rect(sector_address(ROOT_SECTOR), world_width, world_height),
            container: None,
        });

        log::debug!("Entity tree: height {TREE_HEIGHT}, world {world_width}x{world_height}");
        Ok(Self {
            node,
            scene_root,
            world_width,
            world_height,
            sectors,
            entities: HashMap::new(),
            awake,
        })
    }

    /// The object parenting the leaf containers.
    pub fn node(&self) -> ObjectHandle {
        self.node
    }

    pub fn scene_root(&self) -> ObjectHandle {
        self.scene_root
    }

    /// Container of the entities tagged [`AWAKE_TAG`].
    pub fn awake_container(&self) -> ObjectContainer {
        self.awake
    }

    pub fn world_size(&self) -> (i32, i32) {
        (self.world_width, self.world_height)
    }

    /// Number of sectors allocated so far, the root included.
    pub fn allocated_sectors(&self) -> usize {
        self.sectors.iter().filter(|s| s.is_some()).count()
    }

    /// Rectangle of sector `index` in the current world.
    pub fn rect(&self, index: usize) -> Rect {
        match &self.sectors[index] {
            Some(sector) => sector.rect,
            None => sector_rect(sector_address(index), self.world_width, self.world_height),
        }
    }

    /// Number of indexed entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, entity: ObjectHandle) -> bool {
        self.entities.contains_key(&entity)
    }

    pub fn entity_info(&self, entity: ObjectHandle) -> Option<&EntityInfo> {
        self.entities.get(&entity)
    }

    pub fn leaf_of(&self, entity: ObjectHandle) -> Option<usize> {
        self.entities.get(&entity).and_then(|info| info.leaf)
    }

    /// Marks an entity as persistent: when it leaves the region of interest
    /// it goes back to its spawn point. Returns whether it is indexed.
    pub fn set_persistent(&mut self, entity: ObjectHandle, persistent: bool) -> bool {
        match self.entities.get_mut(&entity) {
            Some(info) => {
                info.persistent = persistent;
                true
            }
            None => false,
        }
    }

    /// Indexes an entity, a child of the scene root, at its current position.
    ///
    /// Inserting an indexed entity again does nothing.
    pub fn insert(&mut self, objects: &mut ObjectManager, entity: ObjectHandle) -> ScriptResult<()> {
        let spawn_point = objects.position(entity).ok_or(ScriptError::NoSuchObject(entity))?;
        if self.entities.contains_key(&entity) {
            return Ok(());
        }

        let leaf = if objects.has_tag(entity, AWAKE_TAG) {
            self.awake.add_object(objects, entity)?;
            None
        } else {
            Some(self.bubble_down(objects, entity, ROOT_SECTOR)?)
        };

        self.entities.insert(
            entity,
            EntityInfo {
                spawn_point,
                persistent: false,
                sleeping: false,
                leaf,
            },
        );
        Ok(())
    }

    /// Unindexes an entity and returns it to the regular scene walk.
    pub fn remove(&mut self, objects: &mut ObjectManager, entity: ObjectHandle) -> bool {
        if !self.forget(objects, entity) {
            return false;
        }
        objects.set_detached(entity, false);
        true
    }

    fn forget(&mut self, objects: &mut ObjectManager, entity: ObjectHandle) -> bool {
        let Some(info) = self.entities.remove(&entity) else {
            return false;
        };
        if let Some(container) = self.container_of(info.leaf) {
            container.remove_object(objects, entity);
        }
        true
    }

    fn container_of(&self, leaf: Option<usize>) -> Option<ObjectContainer> {
        match leaf {
            None => Some(self.awake),
            Some(index) => self.sectors[index].as_ref().and_then(|s| s.container),
        }
    }

    fn clipped_position(&self, objects: &ObjectManager, entity: ObjectHandle) -> (i32, i32) {
        let position = objects.position(entity).unwrap_or_default();
        (
            position.x.clamp(0.0, f64::from(self.world_width - 1)) as i32,
            position.y.clamp(0.0, f64::from(self.world_height - 1)) as i32,
        )
    }

    fn allocate_inner(&mut self, index: usize) {
        if self.sectors[index].is_none() {
            self.sectors[index] = Some(Sector {
                rect: self.rect(index),
                container: None,
            });
        }
    }

    fn leaf_container(&mut self, objects: &mut ObjectManager, index: usize) -> ScriptResult<ObjectContainer> {
        if let Some(container) = self.container_of(Some(index)) {
            return Ok(container);
        }
        let container = ObjectContainer::spawn(objects, self.node, self.scene_root, ContainerMode::Passive)?;
        self.sectors[index] = Some(Sector {
            rect: self.rect(index),
            container: Some(container),
        });
        log::trace!("Entity tree: allocated leaf sector {index}");
        Ok(container)
    }

    /// Walks down from sector `from` to the leaf containing the entity and
    /// stores it there. Returns the leaf.
    fn bubble_down(&mut self, objects: &mut ObjectManager, entity: ObjectHandle, from: usize) -> ScriptResult<usize> {
        let (x, y) = self.clipped_position(objects, entity);
        let mut index = from;
        while !is_leaf(index) {
            let split = self.rect(child_of(index, 0));
            let quadrant = usize::from(x > split.right) + 2 * usize::from(y > split.bottom);
            index = child_of(index, quadrant);
            if !is_leaf(index) {
                self.allocate_inner(index);
            }
        }

        let container = self.leaf_container(objects, index)?;
        container.add_object(objects, entity)?;
        Ok(index)
    }

    /// Moves an entity whose position left its leaf to the right leaf.
    ///
    /// Climbs to the nearest sector that contains the entity and bubbles down
    /// from there.
    pub fn bubble_up(&mut self, objects: &mut ObjectManager, entity: ObjectHandle) -> ScriptResult<()> {
        let Some(leaf) = self.leaf_of(entity) else {
            return Ok(());
        };
        let (x, y) = self.clipped_position(objects, entity);
        let mut index = leaf;
        while index != ROOT_SECTOR && !self.rect(index).contains(x, y) {
            index = parent_of(index);
        }
        if index == leaf {
            return Ok(());
        }

        if let Some(container) = self.container_of(Some(leaf)) {
            container.remove_object(objects, entity);
        }
        let new_leaf = self.bubble_down(objects, entity, index)?;
        if let Some(info) = self.entities.get_mut(&entity) {
            info.leaf = Some(new_leaf);
        }
        Ok(())
    }

    /// Bubbles up every live entity of every allocated leaf.
    pub fn bubble_up_all(&mut self, objects: &mut ObjectManager) {
        let leaves: Vec<usize> = (LAST_INNER_SECTOR + 1..SECTOR_COUNT)
            .filter(|&index| self.sectors[index].is_some())
            .collect();
        for leaf in leaves {
            let Some(container) = self.container_of(Some(leaf)) else {
                continue;
            };
            let stored: Vec<ObjectHandle> = container.iter(objects).collect();
            for entity in stored {
                if let Err(err) = self.bubble_up(objects, entity) {
                    log::warn!("Entity tree: can't bubble up {entity}: {err}");
                }
            }
        }
    }

    /// Changes the size of the world. Returns whether it changed.
    ///
    /// Entities are not moved; the next bubble up of their leaves does it.
    pub fn update_world_size(&mut self, width: i32, height: i32) -> bool {
        let (width, height) = clamp_world_size(width, height);
        if (width, height) == (self.world_width, self.world_height) {
            return false;
        }

        self.world_width = width;
        self.world_height = height;
        for (index, sector) in self.sectors.iter_mut().enumerate() {
            if let Some(sector) = sector {
                sector.rect = sector_rect(sector_address(index), width, height);
            }
        }
        log::debug!("Entity tree: world size is now {width}x{height}");
        true
    }

    /// Allocated leaves whose rectangle intersects `roi`, in tree order.
    pub fn intersecting_leaves(&self, roi: &Rect) -> Vec<usize> {
        let mut leaves = Vec::new();
        self.find_intersecting_leaves(ROOT_SECTOR, roi, &mut leaves);
        leaves
    }

    fn find_intersecting_leaves(&self, index: usize, roi: &Rect, leaves: &mut Vec<usize>) {
        if is_leaf(index) {
            leaves.push(index);
            return;
        }
        for quadrant in 0..4 {
            let child = child_of(index, quadrant);
            if let Some(sector) = &self.sectors[child]
                && sector.rect.intersects(roi)
            {
                self.find_intersecting_leaves(child, roi, leaves);
            }
        }
    }

    /// Runs one frame of the entities around the region of interest.
    ///
    /// Awake entities are ticked first. Then every entity of the leaves that
    /// intersect `roi` is handled: inside the region it is woken up and ticked;
    /// outside it is deactivated, disposable entities are destroyed and
    /// persistent ones are sent back to their spawn point once. Survivors
    /// bubble up afterwards.
    ///
    /// An entity that bubbles into a leaf visited later in the same frame is
    /// not handled twice.
    ///
    /// Returns the entities ticked this frame: the awake ones and those that
    /// are inside `roi` after their tick.
    pub fn update(&mut self, objects: &mut ObjectManager, roi: Rect) -> Vec<ObjectHandle> {
        let mut ticked = Vec::new();
        self.update_awake(objects, &mut ticked);

        let mut handled = HashSet::new();
        for leaf in self.intersecting_leaves(&roi) {
            let Some(container) = self.container_of(Some(leaf)) else {
                continue;
            };
            let stored: Vec<ObjectHandle> = container.handles(objects).collect();
            for entity in stored {
                if !handled.insert(entity) {
                    continue;
                }
                if !self.update_entity(objects, entity, &roi, &mut ticked) {
                    self.forget(objects, entity);
                } else if let Err(err) = self.bubble_up(objects, entity) {
                    log::warn!("Entity tree: can't bubble up {entity}: {err}");
                }
            }
        }

        ticked
    }

    fn update_awake(&mut self, objects: &mut ObjectManager, ticked: &mut Vec<ObjectHandle>) {
        let stored: Vec<ObjectHandle> = self.awake.handles(objects).collect();
        for entity in stored {
            if objects.is_killed(entity) {
                delete_entity(objects, entity);
            }
            if !objects.exists(entity) {
                self.forget(objects, entity);
                continue;
            }

            objects.set_active(entity, true);
            if let Some(info) = self.entities.get_mut(&entity) {
                info.sleeping = false;
            }
            objects.update_subtree(entity);
            if objects.exists(entity) {
                ticked.push(entity);
            } else {
                self.forget(objects, entity);
            }
        }
    }

    /// Handles one entity of a visited leaf. Returns whether it still exists.
    fn update_entity(
        &mut self,
        objects: &mut ObjectManager,
        entity: ObjectHandle,
        roi: &Rect,
        ticked: &mut Vec<ObjectHandle>,
    ) -> bool {
        let Some(object) = objects.get(entity) else {
            return false;
        };
        let killed = object.is_killed();
        let disposable = object.has_tag(DISPOSABLE_TAG);
        let position = object.position();

        if killed {
            delete_entity(objects, entity);
            return false;
        }

        if roi.contains_point(position) {
            objects.set_active(entity, true);
            if let Some(info) = self.entities.get_mut(&entity) {
                info.sleeping = false;
            }
            objects.update_subtree(entity);
            if !objects.exists(entity) {
                return false;
            }
            if objects.position(entity).is_some_and(|p| roi.contains_point(p)) {
                ticked.push(entity);
            }
            return true;
        }

        if disposable {
            log::trace!("Entity tree: disposing of {entity}");
            delete_entity(objects, entity);
            return false;
        }

        if let Some(info) = self.entities.get_mut(&entity)
            && !info.sleeping
            && info.persistent
            && !roi.contains_point(info.spawn_point)
        {
            info.sleeping = true;
            objects.set_position(entity, info.spawn_point);
            objects.reset_subtree(entity);
        }
        objects.set_active(entity, false);
        objects.exists(entity)
    }
}

fn delete_entity(objects: &mut ObjectManager, entity: ObjectHandle) {
    if let Err(err) = objects.delete(entity) {
        log::warn!("Entity tree: can't delete {entity}: {err}");
    }
}
