//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{MatchRegistry, TallyRules};
use crate::matchmaking::Lobby;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lobby: Arc<Lobby>,
    pub match_registry: Arc<MatchRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Initialize match registry
        let match_registry = Arc::new(MatchRegistry::new());

        // Every session gets its own rules engine
        let lobby = Arc::new(Lobby::new(
            match_registry.clone(),
            config.match_settings.clone(),
            TallyRules::boxed,
        ));

        Self {
            config,
            lobby,
            match_registry,
        }
    }
}
