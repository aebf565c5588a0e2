//! Room state and authoritative tick loop

use dashmap::DashMap;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::util::time::{unix_millis, MatchTimer};
use crate::ws::protocol::{MoveKey, ServerMsg};

use super::combat::{CombatSystem, Projectile};
use super::effects::{EffectKind, TimedActions};
use super::hex::{AxialCoord, CartCoord, HexGrid, Team};
use super::phase::{next_transition, MatchPhase, SpawnMode, TeamSizes, Transition};
use super::player::{DamageOutcome, Player};
use super::scheduler::{TickDecision, TickScheduler};
use super::snapshot::SnapshotBuilder;

/// Inbound queue depth per room
const COMMAND_BUFFER: usize = 1024;
/// Outbound broadcast depth per room
const EVENT_BUFFER: usize = 256;
/// Upper bound on transitions resolved within one tick
const MAX_CHAINED_TRANSITIONS: usize = 4;
/// Longest accepted player name, in characters
const MAX_NAME_LEN: usize = 20;

/// Commands a session sends into a room
#[derive(Debug)]
pub enum RoomCommand {
    /// Subscribe: reply with the setup snapshot
    Join { reply: oneshot::Sender<ServerMsg> },
    /// Create a player; replies `None` when the room is full
    Spawn {
        name: String,
        reply: oneshot::Sender<Option<Uuid>>,
    },
    Delete { player_id: Uuid },
    MoveKey {
        player_id: Uuid,
        key: MoveKey,
        pressed: bool,
    },
    Attack { player_id: Uuid, target: AxialCoord },
}

/// Why a command was not applied
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown player {0}")]
    UnknownPlayer(Uuid),

    #[error("room is full")]
    RoomFull,

    #[error("cell ({q}, {r}) is not on the map")]
    CellOutOfRange { q: i32, r: i32 },

    #[error("target is {distance} cells away, range is {range}")]
    OutOfAttackRange { distance: u32, range: u32 },

    #[error("weapon is cooling down")]
    Cooldown,

    #[error("player is paralyzed")]
    Paralyzed,

    #[error("map interaction is disabled")]
    InteractionDisabled,
}

/// Handle to communicate with a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: String,
    pub max_players: usize,
    pub command_tx: mpsc::Sender<RoomCommand>,
    pub event_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<AtomicUsize>,
    phase: Arc<AtomicU8>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn phase(&self) -> MatchPhase {
        MatchPhase::from_code(self.phase.load(Ordering::Relaxed))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.event_tx.subscribe()
    }
}

/// Registry of all rooms
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    pub fn insert(&self, handle: RoomHandle) {
        self.rooms.insert(handle.id.clone(), handle);
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }

    /// Every room, sorted by id
    pub fn list(&self) -> Vec<RoomHandle> {
        let mut rooms: Vec<RoomHandle> = self.rooms.iter().map(|r| r.value().clone()).collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative simulation of one room
pub struct GameMatch {
    id: String,
    config: GameConfig,
    ticks_per_second: f64,

    grid: HexGrid,
    players: HashMap<Uuid, Player>,
    projectiles: HashMap<Uuid, Projectile>,
    /// Attacks drained this tick, resolved after the phase update
    pending_attacks: Vec<(Uuid, AxialCoord)>,
    teams: TeamSizes,
    actions: TimedActions,

    phase: MatchPhase,
    timer: MatchTimer,
    winning_team: Option<Team>,
    tick_number: u64,
    rng: ChaCha8Rng,

    snapshots: SnapshotBuilder,
    command_rx: mpsc::Receiver<RoomCommand>,
    commands_closed: bool,
    event_tx: broadcast::Sender<ServerMsg>,
    player_count: Arc<AtomicUsize>,
    phase_mirror: Arc<AtomicU8>,
}

impl GameMatch {
    /// Create a new room in the Waiting phase
    pub fn new(
        id: impl Into<String>,
        config: GameConfig,
        seed: u64,
        now_ms: u64,
    ) -> (Self, RoomHandle) {
        let id = id.into();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let player_count = Arc::new(AtomicUsize::new(0));
        let phase_mirror = Arc::new(AtomicU8::new(MatchPhase::Waiting.code()));

        let handle = RoomHandle {
            id: id.clone(),
            max_players: config.max_players,
            command_tx,
            event_tx: event_tx.clone(),
            player_count: player_count.clone(),
            phase: phase_mirror.clone(),
        };

        let room = Self {
            id,
            ticks_per_second: config.ticks_per_second(),
            grid: HexGrid::generate(config.ring_count, config.edge_length),
            players: HashMap::new(),
            projectiles: HashMap::new(),
            pending_attacks: Vec::new(),
            teams: TeamSizes::default(),
            actions: TimedActions::new(),
            phase: MatchPhase::Waiting,
            timer: MatchTimer::started_at(now_ms),
            winning_team: None,
            tick_number: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            snapshots: SnapshotBuilder::new(&config),
            command_rx,
            commands_closed: false,
            event_tx,
            player_count,
            phase_mirror,
            config,
        };

        (room, handle)
    }

    /// Run the tick loop until every command sender is gone
    pub async fn run(mut self) {
        info!(room_id = %self.id, rings = self.config.ring_count, "Room started");

        let interval = self.config.tick_interval();
        let mut scheduler = TickScheduler::new(interval, self.config.tick_slack(), Instant::now());

        loop {
            let now = Instant::now();
            let boundary = scheduler.next_boundary();
            match scheduler.poll(now) {
                TickDecision::Sleep(d) => tokio::time::sleep(d).await,
                TickDecision::Yield => tokio::task::yield_now().await,
                TickDecision::Tick => {
                    let late = now.saturating_duration_since(boundary);
                    if late >= interval {
                        warn!(
                            room_id = %self.id,
                            late_ms = late.as_millis() as u64,
                            "Tick loop fell behind"
                        );
                    }

                    self.tick(unix_millis());

                    if self.commands_closed {
                        info!(room_id = %self.id, "All room handles dropped, stopping");
                        break;
                    }
                }
            }
        }
    }

    /// Run one simulation step at wall-clock `now_ms`
    pub fn tick(&mut self, now_ms: u64) {
        self.drain_commands(now_ms);
        self.expire_effects(now_ms);
        self.advance_phase(now_ms);
        self.process_attacks(now_ms);
        self.update_projectiles(now_ms);
        self.update_players();

        if let Some(delta) = self.snapshots.take_map_delta() {
            self.broadcast(delta);
        }
        let entities = self.snapshots.entities(self.tick_number, &self.players, &self.projectiles);
        self.broadcast(entities);

        self.tick_number += 1;
    }

    /// Apply everything queued since the last tick. Attacks wait for step 3.
    fn drain_commands(&mut self, now_ms: u64) {
        loop {
            let command = match self.command_rx.try_recv() {
                Ok(command) => command,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.commands_closed = true;
                    break;
                }
            };

            match command {
                RoomCommand::Join { reply } => {
                    let _ = reply.send(self.setup_snapshot());
                }
                RoomCommand::Spawn { name, reply } => {
                    let spawned = self.spawn_player(&name, now_ms).ok();
                    let _ = reply.send(spawned);
                }
                RoomCommand::Delete { player_id } => {
                    if let Err(e) = self.delete_player(player_id) {
                        debug!(room_id = %self.id, error = %e, "Delete rejected");
                    }
                }
                RoomCommand::MoveKey {
                    player_id,
                    key,
                    pressed,
                } => {
                    if let Err(e) = self.set_move_key(player_id, key, pressed) {
                        debug!(room_id = %self.id, error = %e, "Move key rejected");
                    }
                }
                RoomCommand::Attack { player_id, target } => {
                    self.queue_attack(player_id, target);
                }
            }
        }
    }

    pub fn setup_snapshot(&self) -> ServerMsg {
        self.snapshots.setup(
            self.phase,
            self.winning_team,
            &self.grid,
            &self.players,
            &self.projectiles,
        )
    }

    /// Add a player to the smaller team at a spawn point chosen by the phase
    pub fn spawn_player(&mut self, name: &str, now_ms: u64) -> Result<Uuid, CommandError> {
        if self.players.len() >= self.config.max_players {
            debug!(room_id = %self.id, "Spawn rejected, room full");
            return Err(CommandError::RoomFull);
        }

        let id = Uuid::new_v4();
        let team = self.teams.smaller();
        let (cell, position) = self.spawn_point(team);
        let name = sanitize_name(name, id);
        let mut player = Player::new(id, name, team, cell, position, self.config.move_speed);

        if self.phase.config().spawn_protection {
            self.actions.apply(id, EffectKind::Invulnerability, now_ms);
            player.invulnerable = true;
        }

        info!(
            room_id = %self.id,
            player_id = %id,
            name = %player.name,
            team = ?team,
            "Player spawned"
        );

        self.players.insert(id, player);
        self.teams.join(team);
        self.sync_player_count();
        Ok(id)
    }

    pub fn delete_player(&mut self, player_id: Uuid) -> Result<(), CommandError> {
        let player = self
            .players
            .remove(&player_id)
            .ok_or(CommandError::UnknownPlayer(player_id))?;

        self.teams.leave(player.team);
        self.actions.forget_player(player_id);
        self.pending_attacks.retain(|(id, _)| *id != player_id);
        self.sync_player_count();

        info!(room_id = %self.id, player_id = %player_id, "Player deleted");
        Ok(())
    }

    pub fn set_move_key(
        &mut self,
        player_id: Uuid,
        key: MoveKey,
        pressed: bool,
    ) -> Result<(), CommandError> {
        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(CommandError::UnknownPlayer(player_id))?;
        player.set_move_key(key, pressed);
        Ok(())
    }

    /// Buffer an attack until the next attack-resolution step
    pub fn queue_attack(&mut self, player_id: Uuid, target: AxialCoord) {
        self.pending_attacks.push((player_id, target));
    }

    /// Validate an attack and launch its projectile
    pub fn attack(
        &mut self,
        player_id: Uuid,
        target: AxialCoord,
        now_ms: u64,
    ) -> Result<Uuid, CommandError> {
        let map_interaction = self.phase.config().map_interaction;
        let player = self
            .players
            .get_mut(&player_id)
            .ok_or(CommandError::UnknownPlayer(player_id))?;

        if !map_interaction {
            return Err(CommandError::InteractionDisabled);
        }
        if !self.grid.cell_exists(target) {
            return Err(CommandError::CellOutOfRange {
                q: target.q,
                r: target.r,
            });
        }
        if !CombatSystem::in_range(player.cell, target, self.config.attack_range) {
            return Err(CommandError::OutOfAttackRange {
                distance: player.cell.distance(&target),
                range: self.config.attack_range,
            });
        }
        if player.paralyzed {
            return Err(CommandError::Paralyzed);
        }

        let projectile =
            Projectile::launch(player_id, player.team, player.position, target, &self.grid)
                .ok_or(CommandError::CellOutOfRange {
                    q: target.q,
                    r: target.r,
                })?;
        if !player.fire(now_ms, self.config.fire_cooldown_ms) {
            return Err(CommandError::Cooldown);
        }

        let id = projectile.id;
        self.projectiles.insert(id, projectile);
        Ok(id)
    }

    fn process_attacks(&mut self, now_ms: u64) {
        for (player_id, target) in std::mem::take(&mut self.pending_attacks) {
            if let Err(e) = self.attack(player_id, target, now_ms) {
                debug!(room_id = %self.id, player_id = %player_id, error = %e, "Attack rejected");
            }
        }
    }

    fn expire_effects(&mut self, now_ms: u64) {
        for (player_id, kind) in self.actions.expire(now_ms, &self.config) {
            let Some(player) = self.players.get_mut(&player_id) else {
                continue;
            };
            match kind {
                EffectKind::Invulnerability => player.invulnerable = false,
                EffectKind::Paralysis => player.paralyzed = false,
            }
        }
    }

    /// Move every projectile; resolve and remove the ones that arrived
    fn update_projectiles(&mut self, now_ms: u64) {
        let speed = self.config.projectile_speed;
        let tps = self.ticks_per_second;

        let arrived: Vec<Uuid> = self
            .projectiles
            .iter_mut()
            .filter_map(|(id, p)| p.tick(speed, tps).then_some(*id))
            .collect();

        for id in arrived {
            if let Some(projectile) = self.projectiles.remove(&id) {
                self.resolve_impact(&projectile, now_ms);
            }
        }
    }

    fn resolve_impact(&mut self, projectile: &Projectile, now_ms: u64) {
        let mut converted = Vec::new();

        for player in self.players.values_mut() {
            match player.take_damage(projectile, self.phase) {
                DamageOutcome::Converted { from, to } => {
                    player.paralyzed = true;
                    converted.push((player.id, from, to));
                }
                DamageOutcome::Damaged { health } => {
                    debug!(room_id = %self.id, player_id = %player.id, health, "Player hit");
                }
                DamageOutcome::Unaffected => {}
            }
        }

        for (player_id, from, to) in converted {
            self.teams.transfer(from, to);
            self.actions.apply(player_id, EffectKind::Paralysis, now_ms);
            info!(
                room_id = %self.id,
                player_id = %player_id,
                from = ?from,
                to = ?to,
                "Player switched teams"
            );
        }

        if self.phase.config().map_interaction {
            let changes = self
                .grid
                .paint(projectile.target, Some(projectile.team), self.config.paint_radius);
            self.snapshots.record_changes(changes);
        }
    }

    fn update_players(&mut self) {
        for player in self.players.values_mut() {
            player.tick(&self.grid, self.ticks_per_second);
        }
    }

    /// Fire every transition whose guard holds, re-checking after each one
    fn advance_phase(&mut self, now_ms: u64) {
        for _ in 0..MAX_CHAINED_TRANSITIONS {
            let elapsed = self.timer.elapsed(now_ms);
            let next = next_transition(self.phase, self.teams, elapsed, &self.config);
            let Some(transition) = next else {
                break;
            };
            self.apply_transition(transition, now_ms);
        }
    }

    fn apply_transition(&mut self, transition: Transition, now_ms: u64) {
        let from = self.phase;
        self.phase = transition.target();
        self.phase_mirror.store(self.phase.code(), Ordering::Relaxed);

        match transition {
            Transition::BeginCountdown => self.timer.start(now_ms),
            Transition::AbortCountdown => {}
            Transition::StartMatch => {
                self.grid.clear();
                self.snapshots.discard_changes();
                self.projectiles.clear();
                self.winning_team = None;
                self.relocate_all();

                let ids: Vec<Uuid> = self.players.keys().copied().collect();
                for id in ids {
                    self.actions.apply(id, EffectKind::Invulnerability, now_ms);
                    if let Some(player) = self.players.get_mut(&id) {
                        player.invulnerable = true;
                    }
                }
                self.broadcast(ServerMsg::MapCleared);
            }
            Transition::EndMatch { winner } => {
                self.timer.start(now_ms);
                self.winning_team = Some(winner);
            }
            Transition::Reset => {
                self.winning_team = None;
                self.relocate_all();
            }
            Transition::Restart => {
                self.timer.start(now_ms);
                self.winning_team = None;
                self.rebalance_teams();
                for player in self.players.values_mut() {
                    player.heal();
                }
                self.relocate_all();
            }
        }

        info!(
            room_id = %self.id,
            from = ?from,
            to = ?self.phase,
            winner = ?self.winning_team,
            "Match phase changed"
        );
        self.broadcast(ServerMsg::MatchState {
            state: self.phase,
            winning_team: self.winning_team,
        });
    }

    /// Deal players alternately to Red and Blue
    fn rebalance_teams(&mut self) {
        let mut ids: Vec<Uuid> = self.players.keys().copied().collect();
        ids.sort();

        let mut teams = TeamSizes::default();
        for (i, id) in ids.iter().enumerate() {
            let team = if i % 2 == 0 { Team::Red } else { Team::Blue };
            if let Some(player) = self.players.get_mut(id) {
                player.team = team;
                teams.join(team);
            }
        }
        self.teams = teams;
    }

    /// Move every player to a spawn point for the current phase
    fn relocate_all(&mut self) {
        let ids: Vec<(Uuid, Team)> = self.players.values().map(|p| (p.id, p.team)).collect();
        for (id, team) in ids {
            let (cell, position) = self.spawn_point(team);
            if let Some(player) = self.players.get_mut(&id) {
                player.relocate(cell, position);
            }
        }
    }

    fn spawn_point(&mut self, team: Team) -> (AxialCoord, CartCoord) {
        let cell = match self.phase.config().spawn_mode {
            SpawnMode::Center => AxialCoord::ORIGIN,
            SpawnMode::RegionalRandom => self
                .grid
                .spawn_region(team)
                .choose(&mut self.rng)
                .copied()
                .unwrap_or(AxialCoord::ORIGIN),
        };
        let position = self.grid.cartesian_of(cell).unwrap_or(CartCoord::ZERO);
        (cell, position)
    }

    fn sync_player_count(&self) {
        self.player_count.store(self.players.len(), Ordering::Relaxed);
    }

    fn broadcast(&self, msg: ServerMsg) {
        // No subscribers is fine
        let _ = self.event_tx.send(msg);
    }
}

/// Trim and cap a requested name, falling back to a generated one
fn sanitize_name(name: &str, id: Uuid) -> String {
    let trimmed: String = name.trim().chars().take(MAX_NAME_LEN).collect();
    if trimmed.is_empty() {
        format!("Player_{}", &id.simple().to_string()[..6])
    } else {
        trimmed
    }
}

#[cfg(test)]
impl GameMatch {
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn winning_team(&self) -> Option<Team> {
        self.winning_team
    }

    pub fn teams(&self) -> TeamSizes {
        self.teams
    }

    pub fn player(&self, id: Uuid) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }
}
