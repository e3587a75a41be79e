//! Scene callbacks and the transitions a scene may request.

use std::any::TypeId;

/// A scene driven by the main loop through the [`SceneStack`](super::SceneStack).
///
/// `C` is the engine context handed to every callback. Parameters a scene needs
/// at start-up are carried by the scene value itself and consumed in
/// [`init`](Scene::init).
pub trait Scene<C> {
    /// Called once when the scene is pushed.
    fn init(&mut self, ctx: &mut C);

    /// Advances the scene by one framestep. Only the top of the stack is updated.
    fn update(&mut self, ctx: &mut C) -> Transition<C>;

    /// Draws the scene. Only the top of the stack is rendered.
    fn render(&mut self, ctx: &mut C);

    /// Called once when the scene leaves the stack.
    fn release(&mut self, ctx: &mut C);

    /// Whether another instance of the same scene type may sit on the stack.
    ///
    /// Only scenes that legitimately nest (a quest running a quest) return `true`.
    fn allows_reentry(&self) -> bool {
        false
    }
}

/// Stack change requested by [`Scene::update`], applied after the call returns.
pub enum Transition<C> {
    /// Keep the current scene.
    None,
    /// Push a new scene on top of the current one.
    Push(SceneEntry<C>),
    /// Pop the current scene.
    Pop,
    /// Pop the current scene and push another one.
    Replace(SceneEntry<C>),
    /// Pop every scene and stop the main loop.
    Quit,
}

impl<C> std::fmt::Debug for Transition<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::None => write!(f, "None"),
            Transition::Push(entry) => write!(f, "Push({})", entry.name()),
            Transition::Pop => write!(f, "Pop"),
            Transition::Replace(entry) => write!(f, "Replace({})", entry.name()),
            Transition::Quit => write!(f, "Quit"),
        }
    }
}

/// A boxed scene tagged with the identity of its concrete type.
///
/// Two entries with the same identity are the same kind of scene; the stack uses
/// this to reject accidental re-entry.
pub struct SceneEntry<C> {
    id: TypeId,
    name: &'static str,
    scene: Box<dyn Scene<C>>,
}

impl<C> SceneEntry<C> {
    pub fn new<S: Scene<C> + 'static>(scene: S) -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: short_type_name(std::any::type_name::<S>()),
            scene: Box::new(scene),
        }
    }

    /// Identity of the scene type.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Short type name, for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(super) fn scene_mut(&mut self) -> &mut dyn Scene<C> {
        self.scene.as_mut()
    }

    pub(super) fn allows_reentry(&self) -> bool {
        self.scene.allows_reentry()
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("a::b::TitleScene"), "TitleScene");
        assert_eq!(short_type_name("Plain"), "Plain");
        assert_eq!(short_type_name("a::Wrap<b::Inner>"), "Wrap<b::Inner>");
    }
}
