//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub json_logs: bool,
    /// Allowed client origins for CORS (empty = any origin)
    pub client_origins: Vec<String>,
    /// Rooms created at startup, in listing order
    pub room_ids: Vec<String>,
    /// Gameplay settings shared by every room
    pub game: GameConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        };

        let client_origins = env::var("CLIENT_ORIGIN")
            .map(|v| split_list(&v))
            .unwrap_or_default()
            .into_iter()
            .filter(|origin| origin != "*")
            .collect();

        let mut room_ids = env::var("ROOMS").map(|v| split_list(&v)).unwrap_or_default();
        if room_ids.is_empty() {
            room_ids.push("main".to_string());
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            json_logs: env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
            client_origins,
            room_ids,
            game: GameConfig::from_env()?,
        })
    }
}

/// Static gameplay settings. Never mutated once the server is running.
#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    /// Rings of cells around the centre cell
    pub ring_count: u32,
    /// Hex edge length in pixels
    pub edge_length: f64,
    /// Player speed in pixels per second
    pub move_speed: f64,
    /// Max hex distance between firer and target cell
    pub attack_range: u32,
    /// Minimum time between two shots of one player
    pub fire_cooldown_ms: u64,
    /// Projectile speed in pixels per second
    pub projectile_speed: f64,
    /// Hex radius painted around an impact
    pub paint_radius: u32,
    /// Nominal tick interval
    pub tick_interval_ms: u64,
    /// Window before a tick boundary spent busy-polling instead of sleeping
    pub tick_slack_ms: u64,
    pub min_players: usize,
    pub max_players: usize,
    /// Countdown between Starting and Ongoing
    pub start_time_ms: u64,
    /// Results screen between Over and the next phase
    pub over_time_ms: u64,
    pub invulnerability_ms: u64,
    pub paralysis_ms: u64,
    /// Rendering-only projectile arc parameters, forwarded to clients
    pub gravity: f64,
    pub launch_height: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            ring_count: 5,
            edge_length: 20.0,
            move_speed: 60.0,
            attack_range: 10,
            fire_cooldown_ms: 1000,
            projectile_speed: 200.0,
            paint_radius: 1,
            tick_interval_ms: 50,
            tick_slack_ms: 4,
            min_players: 2,
            max_players: 10,
            start_time_ms: 5000,
            over_time_ms: 5000,
            invulnerability_ms: 3000,
            paralysis_ms: 2000,
            gravity: 400.0,
            launch_height: 30.0,
        }
    }
}

impl GameConfig {
    /// Smallest edge length the renderer can draw
    pub const MIN_EDGE_LENGTH: f64 = 5.0;

    /// Largest map a room will generate
    pub const MAX_RING_COUNT: u32 = 1000;

    /// Load gameplay settings, falling back to defaults for unset variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        let config = Self {
            ring_count: env_or("RING_COUNT", d.ring_count)?,
            edge_length: env_or("EDGE_LENGTH", d.edge_length)?,
            move_speed: env_or("MOVE_SPEED", d.move_speed)?,
            attack_range: env_or("ATTACK_RANGE", d.attack_range)?,
            fire_cooldown_ms: env_or("FIRE_COOLDOWN_MS", d.fire_cooldown_ms)?,
            projectile_speed: env_or("PROJECTILE_SPEED", d.projectile_speed)?,
            paint_radius: env_or("PAINT_RADIUS", d.paint_radius)?,
            tick_interval_ms: env_or("TICK_INTERVAL_MS", d.tick_interval_ms)?,
            tick_slack_ms: env_or("TICK_SLACK_MS", d.tick_slack_ms)?,
            min_players: env_or("MIN_PLAYERS", d.min_players)?,
            max_players: env_or("MAX_PLAYERS", d.max_players)?,
            start_time_ms: env_or("GAME_START_TIME_MS", d.start_time_ms)?,
            over_time_ms: env_or("GAME_OVER_TIME_MS", d.over_time_ms)?,
            invulnerability_ms: env_or("INVULNERABILITY_MS", d.invulnerability_ms)?,
            paralysis_ms: env_or("PARALYSIS_MS", d.paralysis_ms)?,
            gravity: env_or("GRAVITY", d.gravity)?,
            launch_height: env_or("LAUNCH_HEIGHT", d.launch_height)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.edge_length.is_nan() || self.edge_length < Self::MIN_EDGE_LENGTH {
            return Err(ConfigError::Invalid("EDGE_LENGTH", "must be at least 5"));
        }
        if self.ring_count > Self::MAX_RING_COUNT {
            return Err(ConfigError::Invalid("RING_COUNT", "must be at most 1000"));
        }
        // Any splash wider than the map diameter paints nothing more
        if self.paint_radius > 2 * self.ring_count {
            return Err(ConfigError::Invalid("PAINT_RADIUS", "must be at most twice RING_COUNT"));
        }
        if self.tick_interval_ms == 0 || self.tick_interval_ms > 1000 {
            return Err(ConfigError::Invalid("TICK_INTERVAL_MS", "must be in 1..=1000"));
        }
        if self.tick_slack_ms >= self.tick_interval_ms {
            return Err(ConfigError::Invalid("TICK_SLACK_MS", "must be below the tick interval"));
        }
        if self.move_speed.is_nan() || self.move_speed < 0.0 {
            return Err(ConfigError::Invalid("MOVE_SPEED", "must not be negative"));
        }
        if self.projectile_speed.is_nan() || self.projectile_speed <= 0.0 {
            return Err(ConfigError::Invalid("PROJECTILE_SPEED", "must be positive"));
        }
        if self.min_players == 0 || self.max_players < self.min_players {
            return Err(ConfigError::Invalid("MAX_PLAYERS", "must be at least MIN_PLAYERS (>= 1)"));
        }
        Ok(())
    }

    /// Simulation ticks per second derived from the tick interval
    pub fn ticks_per_second(&self) -> f64 {
        1000.0 / self.tick_interval_ms as f64
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn tick_slack(&self) -> Duration {
        Duration::from_millis(self.tick_slack_ms)
    }
}

fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Unparsable(name)),
        Err(_) => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not parse environment variable: {0}")]
    Unparsable(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ticks_per_second(), 20.0);
        assert_eq!(config.tick_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_rejects_tiny_edge_length() {
        let config = GameConfig {
            edge_length: 2.0,
            ..GameConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid("EDGE_LENGTH", _))));
    }

    #[test]
    fn test_rejects_slack_wider_than_tick() {
        let config = GameConfig {
            tick_slack_ms: 50,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_player_limits() {
        let config = GameConfig {
            min_players: 4,
            max_players: 2,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_map_and_splash() {
        let config = GameConfig {
            ring_count: 1_000_000_000,
            ..GameConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid("RING_COUNT", _))));

        let config = GameConfig {
            paint_radius: 1_200_000_000,
            ..GameConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid("PAINT_RADIUS", _))));

        let config = GameConfig {
            ring_count: GameConfig::MAX_RING_COUNT,
            paint_radius: 2 * GameConfig::MAX_RING_COUNT,
            ..GameConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}
