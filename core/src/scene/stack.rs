use thiserror::Error;

use super::types::{SceneEntry, Transition};

/// Maximum number of scenes on the stack.
pub const MAX_SCENES: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("scene stack overflow: can't push \"{0}\"")]
    Overflow(&'static str),
    #[error("scene \"{0}\" is already on the stack")]
    Duplicate(&'static str),
}

/// Bounded LIFO of scenes. The top scene receives `update` and `render`.
pub struct SceneStack<C> {
    scenes: Vec<SceneEntry<C>>,
}

impl<C> Default for SceneStack<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> SceneStack<C> {
    pub fn new() -> Self {
        Self {
            scenes: Vec::with_capacity(MAX_SCENES),
        }
    }

    /// Pushes a scene and calls its `init`.
    ///
    /// Fails when the stack is full, or when a scene of the same type is already
    /// stacked and the new one does not allow re-entry.
    pub fn push(&mut self, mut entry: SceneEntry<C>, ctx: &mut C) -> Result<(), SceneError> {
        if self.scenes.len() >= MAX_SCENES {
            return Err(SceneError::Overflow(entry.name()));
        }
        if !entry.allows_reentry() && self.scenes.iter().any(|s| s.id() == entry.id()) {
            return Err(SceneError::Duplicate(entry.name()));
        }

        log::info!("Pushing scene {} (depth {})", entry.name(), self.scenes.len() + 1);
        entry.scene_mut().init(ctx);
        self.scenes.push(entry);
        Ok(())
    }

    /// Pops the top scene, calling its `release`. Returns `None` on an empty stack.
    pub fn pop(&mut self, ctx: &mut C) -> Option<SceneEntry<C>> {
        let mut entry = self.scenes.pop()?;
        log::info!("Popping scene {}", entry.name());
        entry.scene_mut().release(ctx);
        Some(entry)
    }

    /// Name of the top scene.
    pub fn top(&self) -> Option<&'static str> {
        self.scenes.last().map(|s| s.name())
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Pops every scene, top first.
    pub fn clear(&mut self, ctx: &mut C) {
        while self.pop(ctx).is_some() {}
    }

    /// Updates the top scene and applies the transition it requests.
    pub fn update(&mut self, ctx: &mut C) -> Result<(), SceneError> {
        let Some(top) = self.scenes.last_mut() else {
            return Ok(());
        };

        match top.scene_mut().update(ctx) {
            Transition::None => {}
            Transition::Push(entry) => self.push(entry, ctx)?,
            Transition::Pop => {
                self.pop(ctx);
            }
            Transition::Replace(entry) => {
                self.pop(ctx);
                self.push(entry, ctx)?;
            }
            Transition::Quit => self.clear(ctx),
        }
        Ok(())
    }

    /// Renders the top scene.
    pub fn render(&mut self, ctx: &mut C) {
        if let Some(top) = self.scenes.last_mut() {
            top.scene_mut().render(ctx);
        }
    }
}
