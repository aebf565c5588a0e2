//! Timed status effects (invulnerability, paralysis)

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::config::GameConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Invulnerability,
    Paralysis,
}

impl EffectKind {
    pub fn duration_ms(self, config: &GameConfig) -> u64 {
        match self {
            EffectKind::Invulnerability => config.invulnerability_ms,
            EffectKind::Paralysis => config.paralysis_ms,
        }
    }
}

/// Active timed actions, at most one per `(player, kind)`.
/// Applying an effect that is already running restarts it.
#[derive(Debug, Default)]
pub struct TimedActions {
    started: HashMap<(Uuid, EffectKind), u64>,
}

impl TimedActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the effect, or refresh its start time if already active
    pub fn apply(&mut self, player_id: Uuid, kind: EffectKind, now_ms: u64) {
        self.started.insert((player_id, kind), now_ms);
    }

    /// Remove effects that outlived their duration and return them
    pub fn expire(&mut self, now_ms: u64, config: &GameConfig) -> Vec<(Uuid, EffectKind)> {
        let mut expired = Vec::new();
        self.started.retain(|&(player_id, kind), &mut start| {
            let keep = now_ms.saturating_sub(start) <= kind.duration_ms(config);
            if !keep {
                expired.push((player_id, kind));
            }
            keep
        });
        expired
    }

    /// Drop everything belonging to a player
    pub fn forget_player(&mut self, player_id: Uuid) {
        self.started.retain(|&(id, _), _| id != player_id);
    }
}

#[cfg(test)]
impl TimedActions {
    pub fn is_active(&self, player_id: Uuid, kind: EffectKind) -> bool {
        self.started.contains_key(&(player_id, kind))
    }

    pub fn started_at(&self, player_id: Uuid, kind: EffectKind) -> Option<u64> {
        self.started.get(&(player_id, kind)).copied()
    }

    pub fn len(&self) -> usize {
        self.started.len()
    }

    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reapply_refreshes_instead_of_duplicating() {
        let mut actions = TimedActions::new();
        let id = Uuid::new_v4();
        actions.apply(id, EffectKind::Paralysis, 1_000);
        actions.apply(id, EffectKind::Paralysis, 1_500);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions.started_at(id, EffectKind::Paralysis), Some(1_500));
    }

    #[test]
    fn test_kinds_are_tracked_separately() {
        let mut actions = TimedActions::new();
        let id = Uuid::new_v4();
        actions.apply(id, EffectKind::Paralysis, 0);
        actions.apply(id, EffectKind::Invulnerability, 0);
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn test_expire_after_duration() {
        let config = GameConfig::default();
        let mut actions = TimedActions::new();
        let id = Uuid::new_v4();
        actions.apply(id, EffectKind::Paralysis, 0);
        actions.apply(id, EffectKind::Invulnerability, 0);

        // not yet exceeded at exactly the duration
        assert!(actions.expire(config.paralysis_ms, &config).is_empty());

        let expired = actions.expire(config.paralysis_ms + 1, &config);
        assert_eq!(expired, vec![(id, EffectKind::Paralysis)]);
        assert!(actions.is_active(id, EffectKind::Invulnerability));

        let expired = actions.expire(config.invulnerability_ms + 1, &config);
        assert_eq!(expired, vec![(id, EffectKind::Invulnerability)]);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_forget_player() {
        let mut actions = TimedActions::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        actions.apply(a, EffectKind::Paralysis, 0);
        actions.apply(b, EffectKind::Paralysis, 0);
        actions.forget_player(a);
        assert!(!actions.is_active(a, EffectKind::Paralysis));
        assert!(actions.is_active(b, EffectKind::Paralysis));
    }
}
