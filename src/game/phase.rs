//! Match lifecycle: phases, per-phase rules and transition guards

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;

use super::hex::Team;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Waiting for players
    Waiting,
    /// Countdown before start
    Starting,
    /// Match in progress
    Ongoing,
    /// Results shown, next round pending
    Over,
}

/// Where new or relocated players are placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnMode {
    /// The centre cell
    Center,
    /// A random cell in the team's half of the map
    RegionalRandom,
}

/// Rules derived from the current phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseConfig {
    pub spawn_mode: SpawnMode,
    /// New players start with an invulnerability timed action
    pub spawn_protection: bool,
    /// Projectiles may be fired and paint cells
    pub map_interaction: bool,
    /// Projectiles damage players
    pub player_interaction: bool,
}

impl MatchPhase {
    /// Compact form for lock-free mirrors
    pub fn code(self) -> u8 {
        match self {
            MatchPhase::Waiting => 0,
            MatchPhase::Starting => 1,
            MatchPhase::Ongoing => 2,
            MatchPhase::Over => 3,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => MatchPhase::Starting,
            2 => MatchPhase::Ongoing,
            3 => MatchPhase::Over,
            _ => MatchPhase::Waiting,
        }
    }

    pub fn config(self) -> PhaseConfig {
        match self {
            MatchPhase::Waiting | MatchPhase::Starting => PhaseConfig {
                spawn_mode: SpawnMode::Center,
                spawn_protection: false,
                map_interaction: true,
                player_interaction: false,
            },
            MatchPhase::Ongoing => PhaseConfig {
                spawn_mode: SpawnMode::RegionalRandom,
                spawn_protection: true,
                map_interaction: true,
                player_interaction: true,
            },
            MatchPhase::Over => PhaseConfig {
                spawn_mode: SpawnMode::RegionalRandom,
                spawn_protection: false,
                map_interaction: false,
                player_interaction: false,
            },
        }
    }
}

/// Active players per team
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TeamSizes {
    pub red: usize,
    pub blue: usize,
}

impl TeamSizes {
    pub fn join(&mut self, team: Team) {
        match team {
            Team::Red => self.red += 1,
            Team::Blue => self.blue += 1,
        }
    }

    pub fn leave(&mut self, team: Team) {
        match team {
            Team::Red => self.red = self.red.saturating_sub(1),
            Team::Blue => self.blue = self.blue.saturating_sub(1),
        }
    }

    pub fn transfer(&mut self, from: Team, to: Team) {
        self.leave(from);
        self.join(to);
    }

    pub fn total(&self) -> usize {
        self.red + self.blue
    }

    /// Team a newcomer should join; ties go to Red
    pub fn smaller(&self) -> Team {
        if self.blue < self.red {
            Team::Blue
        } else {
            Team::Red
        }
    }

    /// Team with more players; ties go to Red
    pub fn larger(&self) -> Team {
        if self.blue > self.red {
            Team::Blue
        } else {
            Team::Red
        }
    }

    pub fn any_empty(&self) -> bool {
        self.red == 0 || self.blue == 0
    }
}

/// A phase change together with the side effects it requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Waiting -> Starting: restart the timer
    BeginCountdown,
    /// Starting -> Waiting: not enough players any more
    AbortCountdown,
    /// Starting -> Ongoing: clear the map, place teams, shield everyone
    StartMatch,
    /// Ongoing -> Over: a team ran out of players
    EndMatch { winner: Team },
    /// Over -> Waiting
    Reset,
    /// Over -> Starting: rebalance teams and heal everyone
    Restart,
}

impl Transition {
    pub fn target(self) -> MatchPhase {
        match self {
            Transition::BeginCountdown | Transition::Restart => MatchPhase::Starting,
            Transition::AbortCountdown | Transition::Reset => MatchPhase::Waiting,
            Transition::StartMatch => MatchPhase::Ongoing,
            Transition::EndMatch { .. } => MatchPhase::Over,
        }
    }
}

/// Decide which transition, if any, fires from `phase`
pub fn next_transition(
    phase: MatchPhase,
    teams: TeamSizes,
    timer_elapsed_ms: u64,
    config: &GameConfig,
) -> Option<Transition> {
    let enough_players = teams.total() >= config.min_players;

    match phase {
        MatchPhase::Waiting if enough_players => Some(Transition::BeginCountdown),
        MatchPhase::Starting if !enough_players => Some(Transition::AbortCountdown),
        MatchPhase::Starting if timer_elapsed_ms >= config.start_time_ms => {
            Some(Transition::StartMatch)
        }
        MatchPhase::Ongoing if teams.any_empty() => Some(Transition::EndMatch {
            winner: teams.larger(),
        }),
        MatchPhase::Over if timer_elapsed_ms >= config.over_time_ms => Some(if enough_players {
            Transition::Restart
        } else {
            Transition::Reset
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teams(red: usize, blue: usize) -> TeamSizes {
        TeamSizes { red, blue }
    }

    #[test]
    fn test_waiting_needs_min_players() {
        let config = GameConfig::default();
        assert_eq!(next_transition(MatchPhase::Waiting, teams(1, 0), 0, &config), None);
        assert_eq!(
            next_transition(MatchPhase::Waiting, teams(1, 1), 0, &config),
            Some(Transition::BeginCountdown)
        );
    }

    #[test]
    fn test_starting_aborts_before_timing_out() {
        let config = GameConfig::default();
        assert_eq!(
            next_transition(MatchPhase::Starting, teams(1, 0), config.start_time_ms, &config),
            Some(Transition::AbortCountdown)
        );
        assert_eq!(
            next_transition(MatchPhase::Starting, teams(1, 1), config.start_time_ms - 1, &config),
            None
        );
        assert_eq!(
            next_transition(MatchPhase::Starting, teams(1, 1), config.start_time_ms, &config),
            Some(Transition::StartMatch)
        );
    }

    #[test]
    fn test_ongoing_ends_when_a_team_empties() {
        let config = GameConfig::default();
        assert_eq!(next_transition(MatchPhase::Ongoing, teams(2, 1), 0, &config), None);
        assert_eq!(
            next_transition(MatchPhase::Ongoing, teams(0, 3), 0, &config),
            Some(Transition::EndMatch { winner: Team::Blue })
        );
        assert_eq!(
            next_transition(MatchPhase::Ongoing, teams(3, 0), 0, &config),
            Some(Transition::EndMatch { winner: Team::Red })
        );
    }

    #[test]
    fn test_over_waits_then_branches_on_player_count() {
        let config = GameConfig::default();
        assert_eq!(
            next_transition(MatchPhase::Over, teams(2, 0), config.over_time_ms - 1, &config),
            None
        );
        assert_eq!(
            next_transition(MatchPhase::Over, teams(2, 0), config.over_time_ms, &config),
            Some(Transition::Restart)
        );
        assert_eq!(
            next_transition(MatchPhase::Over, teams(1, 0), config.over_time_ms, &config),
            Some(Transition::Reset)
        );
    }

    #[test]
    fn test_phase_rules() {
        assert_eq!(MatchPhase::Waiting.config().spawn_mode, SpawnMode::Center);
        assert!(!MatchPhase::Starting.config().player_interaction);
        let ongoing = MatchPhase::Ongoing.config();
        assert!(ongoing.spawn_protection && ongoing.player_interaction && ongoing.map_interaction);
        assert_eq!(ongoing.spawn_mode, SpawnMode::RegionalRandom);
        assert!(!MatchPhase::Over.config().map_interaction);
    }

    #[test]
    fn test_team_sizes() {
        let mut sizes = TeamSizes::default();
        assert_eq!(sizes.smaller(), Team::Red);
        sizes.join(Team::Red);
        assert_eq!(sizes.smaller(), Team::Blue);
        sizes.join(Team::Blue);
        sizes.join(Team::Blue);
        sizes.transfer(Team::Blue, Team::Red);
        assert_eq!(sizes, teams(2, 1));
        assert_eq!(sizes.total(), 3);
        assert_eq!(sizes.larger(), Team::Red);
        sizes.leave(Team::Blue);
        sizes.leave(Team::Blue);
        assert_eq!(sizes.blue, 0);
        assert!(sizes.any_empty());
    }
}
