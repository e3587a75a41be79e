//! # Surge Scripting Runtime
//!
//! The engine side of the scripting runtime:
//!
//! - [`object`]: arena of scriptable objects with a parent/child tree, a
//!   per-object heap, tags and a mark-and-sweep collector
//! - [`container`]: shadow containers that pin and tick detached objects
//! - [`entity_tree`]: quadtree that only wakes the entities near the camera
//! - [`stage`]: the scene root of a level wired to the above
//! - [`prefs`]: persisted typed key/value store
//! - [`preloader`]: compiles every script on a worker thread
//! - [`callbacks`]: process-wide log and crash hooks

pub mod callbacks;
pub mod container;
pub mod entity_tree;
mod error;
pub mod object;
pub mod prefs;
pub mod preloader;
pub mod stage;

pub use container::{ContainerMode, ObjectContainer};
pub use entity_tree::{EntityInfo, EntityTree, Rect};
pub use error::{PreloadError, ScriptError, ScriptResult};
pub use object::{Behavior, Object, ObjectHandle, ObjectManager, Var, Vec2};
pub use prefs::{Prefs, PrefsType, PrefsValue};
pub use preloader::{ScriptCompiler, ScriptRegistry, preload_scripts};
pub use stage::{EntityDesc, Stage};
