//! WebSocket protocol message definitions
//! These are the wire types for client-server communication
//!
//! Every message is an envelope `{"type": ..., "value": ...}`. Receivers
//! ignore types they do not know so new kinds can be added without breaking
//! older peers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::game::perspective::RelativeState;
use crate::game::recap::RecapView;

/// A closed set of message kinds that travels in the envelope
pub trait Envelope: Serialize + DeserializeOwned {
    /// Every `type` tag this set understands
    const TYPES: &'static [&'static str];

    /// The `type` tag of this message
    fn kind(&self) -> &'static str;
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Encoded deck, sent once after both players are connected
    Init(String),

    /// One flag per opening-hand card, true to redraw it
    Mulligan(Vec<bool>),

    /// Put a card from hand on the story
    PlayCard { card_num: usize, version_no: u64 },

    /// Give up priority
    PassTurn { version_no: u64 },

    /// Show an emote to the opponent
    Emote(u32),

    /// Leave the match
    ExitMatch,
}

impl Envelope for ClientMsg {
    const TYPES: &'static [&'static str] =
        &["init", "mulligan", "play_card", "pass_turn", "emote", "exit_match"];

    fn kind(&self) -> &'static str {
        match self {
            ClientMsg::Init(_) => "init",
            ClientMsg::Mulligan(_) => "mulligan",
            ClientMsg::PlayCard { .. } => "play_card",
            ClientMsg::PassTurn { .. } => "pass_turn",
            ClientMsg::Emote(_) => "emote",
            ClientMsg::ExitMatch => "exit_match",
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ServerMsg {
    /// True once the opposing seat is filled
    BothPlayersConnected(bool),

    /// One state push, relative to the recipient
    TransmitState(RelativeState),

    /// The round that just resolved, relative to the recipient
    RoundRecap(RecapView),

    /// Something the recipient sent was rejected, or the session failed
    SignalError { code: String, message: String },

    /// The other seat left; the match is over
    OpponentDisconnected,

    /// The other seat used an emote
    OpponentEmote(u32),
}

impl ServerMsg {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMsg::SignalError {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl Envelope for ServerMsg {
    const TYPES: &'static [&'static str] = &[
        "both_players_connected",
        "transmit_state",
        "round_recap",
        "signal_error",
        "opponent_disconnected",
        "opponent_emote",
    ];

    fn kind(&self) -> &'static str {
        match self {
            ServerMsg::BothPlayersConnected(_) => "both_players_connected",
            ServerMsg::TransmitState(_) => "transmit_state",
            ServerMsg::RoundRecap(_) => "round_recap",
            ServerMsg::SignalError { .. } => "signal_error",
            ServerMsg::OpponentDisconnected => "opponent_disconnected",
            ServerMsg::OpponentEmote(_) => "opponent_emote",
        }
    }
}

/// Protocol errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
}

/// Decode one message; `Ok(None)` for a type this side does not know
pub fn decode<M: Envelope>(text: &str) -> Result<Option<M>, ProtocolError> {
    let raw: RawEnvelope = serde_json::from_str(text)?;
    if !M::TYPES.contains(&raw.kind.as_str()) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}

/// Encode one message
pub fn encode<M: Envelope>(msg: &M) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}
