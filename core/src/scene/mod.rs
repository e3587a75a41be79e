//! Scene stack driven by the main loop.
//!
//! - [`Scene`]: init / update / render / release callbacks
//! - [`SceneEntry`]: a boxed scene tagged with its type identity
//! - [`SceneStack`]: bounded LIFO with duplicate-entry rejection
//! - [`Transition`]: stack change requested by the top scene

mod stack;
mod types;

pub use stack::{SceneError, SceneStack, MAX_SCENES};
pub use types::{Scene, SceneEntry, Transition};
