//! Lobby - pairs connections two at a time into match sessions

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MatchSettings;
use crate::game::{MatchHandle, MatchRegistry, MatchSession, RulesFactory, Seat, SessionInput};
use crate::ws::protocol::ServerMsg;

/// A session that closes between seat assignment and join is retried this often
const JOIN_ATTEMPTS: usize = 3;

/// Lobby errors
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("no match session accepted the connection")]
    Unavailable,
}

/// Hands out seats: the first connection opens a session as seat 0, the next
/// one fills seat 1 of that session.
pub struct Lobby {
    waiting: Mutex<Option<MatchHandle>>,
    registry: Arc<MatchRegistry>,
    settings: MatchSettings,
    rules: RulesFactory,
}

impl Lobby {
    pub fn new(registry: Arc<MatchRegistry>, settings: MatchSettings, rules: RulesFactory) -> Self {
        Self {
            waiting: Mutex::new(None),
            registry,
            settings,
            rules,
        }
    }

    /// Seat a new connection and attach its outbound queue to the session
    pub async fn join(
        &self,
        mut outbound: mpsc::Sender<ServerMsg>,
    ) -> Result<(MatchHandle, Seat), LobbyError> {
        for _ in 0..JOIN_ATTEMPTS {
            let (handle, seat) = self.assign_seat();

            match handle.input_tx.send(SessionInput::Join { seat, outbound }).await {
                Ok(()) => return Ok((handle, seat)),
                Err(mpsc::error::SendError(SessionInput::Join {
                    outbound: returned, ..
                })) => {
                    warn!(match_id = %handle.id, seat = %seat, "Session closed before join, retrying");
                    outbound = returned;
                }
                Err(_) => break,
            }
        }

        Err(LobbyError::Unavailable)
    }

    /// Whether a session is currently holding seat 0 open
    pub fn waiting_for_peer(&self) -> bool {
        self.waiting
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_closed())
    }

    fn assign_seat(&self) -> (MatchHandle, Seat) {
        let mut waiting = self.waiting.lock();

        match waiting.take() {
            Some(handle) if !handle.is_closed() => (handle, Seat::One),
            _ => {
                let handle = self.open_session();
                *waiting = Some(handle.clone());
                (handle, Seat::Zero)
            }
        }
    }

    /// Create, register and spawn a fresh session
    fn open_session(&self) -> MatchHandle {
        let match_id = Uuid::new_v4();
        let seed = rand::random::<u64>();

        let (session, handle) =
            MatchSession::new(match_id, seed, self.settings.clone(), (self.rules)());
        self.registry.insert(handle.clone());

        info!(match_id = %match_id, "Opened match session");

        let registry = self.registry.clone();
        tokio::spawn(async move {
            session.run().await;

            // Cleanup after the session ends
            registry.remove(&match_id);
            info!(match_id = %match_id, "Match removed from registry");
        });

        handle
    }
}
