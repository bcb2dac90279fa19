//! What an action hands back to the store.

use crate::effect::Effect;

/// The result of an action: an optional replacement state plus effects to drive.
///
/// [`Response::none`] means "nothing happened"; the store leaves state alone
/// and schedules nothing.
pub struct Response<S> {
    pub state: Option<S>,
    pub effect: Option<Effect<S>>,
    pub effects: Vec<Effect<S>>,
}

impl<S> Default for Response<S> {
    fn default() -> Self {
        Self {
            state: None,
            effect: None,
            effects: Vec::new(),
        }
    }
}

impl<S> Response<S> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn state(state: S) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn effect(effect: Effect<S>) -> Self {
        Self::none().with_effect(effect)
    }

    pub fn with_effect(mut self, effect: Effect<S>) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect<S>>) -> Self {
        self.effects.extend(effects);
        self
    }

    pub fn is_none(&self) -> bool {
        self.state.is_none() && !self.has_effects()
    }

    pub fn has_effects(&self) -> bool {
        self.effect.is_some() || !self.effects.is_empty()
    }

    /// Every effect to drive, the single `effect` first.
    pub(crate) fn into_parts(self) -> (Option<S>, Vec<Effect<S>>) {
        let mut effects = Vec::with_capacity(self.effects.len() + 1);
        effects.extend(self.effect);
        effects.extend(self.effects);
        (self.state, effects)
    }
}
