//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Well-known port the match server listens on
pub const DEFAULT_PORT: u16 = 6789;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, any origin when empty
    pub client_origins: Vec<String>,
    /// Per-match tuning
    pub match_settings: MatchSettings,
}

/// Settings every match session is created with
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchSettings {
    /// How long a session may wait for its second seat and both decks
    pub peer_wait_timeout: Duration,
    /// Capacity of each connection's outbound queue
    pub outbound_queue: usize,
    /// Round wins needed to take the match
    pub wins_to_win: u32,
    /// Cards dealt to each seat before mulligans
    pub start_hand: usize,
    /// Cards drawn by each seat at the start of every round
    pub draw_per_turn: usize,
    /// Most cards a hand may hold
    pub hand_cap: usize,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            peer_wait_timeout: Duration::from_secs(60),
            outbound_queue: 256,
            wins_to_win: 5,
            start_hand: 3,
            draw_per_turn: 2,
            hand_cap: 6,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, otherwise fall back to SERVER_ADDR
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| format!("0.0.0.0:{}", DEFAULT_PORT)),
        };

        let client_origins = lookup("CLIENT_ORIGIN")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let defaults = MatchSettings::default();
        let match_settings = MatchSettings {
            peer_wait_timeout: Duration::from_secs(parse_or(
                &lookup,
                "PEER_WAIT_TIMEOUT_SECS",
                defaults.peer_wait_timeout.as_secs(),
            )?),
            outbound_queue: parse_or(&lookup, "OUTBOUND_QUEUE", defaults.outbound_queue)?,
            wins_to_win: parse_or(&lookup, "WINS_TO_WIN", defaults.wins_to_win)?,
            start_hand: parse_or(&lookup, "START_HAND", defaults.start_hand)?,
            draw_per_turn: parse_or(&lookup, "DRAW_PER_TURN", defaults.draw_per_turn)?,
            hand_cap: parse_or(&lookup, "HAND_CAP", defaults.hand_cap)?,
        };

        if match_settings.outbound_queue == 0 {
            return Err(ConfigError::Invalid("OUTBOUND_QUEUE"));
        }
        if match_settings.wins_to_win == 0 {
            return Err(ConfigError::Invalid("WINS_TO_WIN"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origins,
            match_settings,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
