//! Client side of the handshake and state stream, free of any I/O

use tracing::{debug, warn};

use crate::ws::protocol::{decode, ClientMsg, ServerMsg};

use super::pass::ResultsLatch;
use super::state::ClientState;
use super::{ClientError, ClientEvent};

/// Connection phase as the client sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    Connecting,
    AwaitingPeer,
    Handshaking,
    InMatch,
    Disconnected,
}

/// What one inbound frame asks the caller to do
#[derive(Debug, Default, PartialEq)]
pub struct Step {
    /// Messages to write to the server, in order
    pub outbound: Vec<ClientMsg>,
    /// Events to hand to presentation, in order
    pub events: Vec<ClientEvent>,
}

impl Step {
    fn event(event: ClientEvent) -> Self {
        Self {
            outbound: Vec::new(),
            events: vec![event],
        }
    }
}

pub struct ClientProtocol {
    phase: ClientPhase,
    deck_code: String,
    results: ResultsLatch,
}

impl ClientProtocol {
    pub fn new(deck_code: impl Into<String>) -> Self {
        Self {
            phase: ClientPhase::Connecting,
            deck_code: deck_code.into(),
            results: ResultsLatch::new(),
        }
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    /// The transport is open
    pub fn on_open(&mut self) -> ClientEvent {
        self.phase = ClientPhase::AwaitingPeer;
        ClientEvent::Connected
    }

    /// The deck went out; the next state push confirms the match
    pub fn init_sent(&mut self) {
        if self.phase == ClientPhase::Handshaking {
            self.phase = ClientPhase::InMatch;
        }
    }

    /// The transport closed or failed
    pub fn on_close(&mut self, reason: Option<String>) -> ClientEvent {
        self.phase = ClientPhase::Disconnected;
        ClientEvent::Disconnected { reason }
    }

    /// Moves only go out while a match is running
    pub fn can_send(&self, msg: &ClientMsg) -> bool {
        match msg {
            ClientMsg::Init(_) => false,
            ClientMsg::ExitMatch => self.phase != ClientPhase::Disconnected,
            _ => self.phase == ClientPhase::InMatch,
        }
    }

    /// Handle one inbound text frame.
    ///
    /// Unknown and malformed messages are dropped. An error means the server
    /// broke the protocol and the connection must be closed.
    pub fn on_message(&mut self, text: &str) -> Result<Step, ClientError> {
        let msg = match decode::<ServerMsg>(text) {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                debug!("Ignoring unknown server message type");
                return Ok(Step::default());
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse server message");
                return Ok(Step::default());
            }
        };

        if self.phase == ClientPhase::Disconnected {
            return Ok(Step::default());
        }

        match msg {
            ServerMsg::BothPlayersConnected(false) => Ok(Step::event(ClientEvent::WaitingForOpponent)),
            ServerMsg::BothPlayersConnected(true) => {
                if self.phase != ClientPhase::AwaitingPeer {
                    debug!(phase = ?self.phase, "Repeated both_players_connected");
                    return Ok(Step::default());
                }
                self.phase = ClientPhase::Handshaking;
                Ok(Step {
                    outbound: vec![ClientMsg::Init(self.deck_code.clone())],
                    events: vec![ClientEvent::BothPlayersConnected],
                })
            }
            ServerMsg::TransmitState(state) => {
                if self.phase != ClientPhase::InMatch {
                    return Err(ClientError::ProtocolViolation(
                        "transmit_state arrived before init was sent",
                    ));
                }
                let state = ClientState::from(state);
                let mut events = Vec::with_capacity(2);
                let winner = self.results.observe(&state);
                events.push(ClientEvent::State(state));
                if let Some(winner) = winner {
                    events.push(ClientEvent::Results { winner });
                }
                Ok(Step {
                    outbound: Vec::new(),
                    events,
                })
            }
            ServerMsg::RoundRecap(recap) => {
                if self.phase != ClientPhase::InMatch {
                    return Err(ClientError::ProtocolViolation(
                        "round_recap arrived before init was sent",
                    ));
                }
                Ok(Step::event(ClientEvent::RoundRecap(recap)))
            }
            ServerMsg::SignalError { code, message } => {
                Ok(Step::event(ClientEvent::ServerError { code, message }))
            }
            ServerMsg::OpponentDisconnected => Ok(Step::event(ClientEvent::OpponentDisconnected)),
            ServerMsg::OpponentEmote(emote) => Ok(Step::event(ClientEvent::OpponentEmote(emote))),
        }
    }
}
