//! Client-side materialization of a pushed state

use serde::Deserialize;

use crate::game::{Act, CardId, PerSeat, RelativeState, Seat};

use super::ClientError;

/// The latest state as this client sees it: seat 0 is always "me".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ClientState(RelativeState);

impl ClientState {
    /// Decode a `transmit_state` payload
    pub fn decode(value: serde_json::Value) -> Result<Self, ClientError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn mulligans_complete(&self) -> PerSeat<bool> {
        self.0.mulligans_complete
    }

    /// Both mulligans are done and play can start
    pub fn all_mulligans_complete(&self) -> bool {
        self.0.mulligans_complete.iter().all(|done| *done)
    }

    pub fn score(&self) -> PerSeat<u32> {
        self.0.score
    }

    pub fn wins(&self) -> PerSeat<u32> {
        self.0.wins
    }

    pub fn winner(&self) -> Option<Seat> {
        self.0.winner
    }

    pub fn passes(&self) -> u8 {
        self.0.passes
    }

    pub fn priority(&self) -> Seat {
        self.0.priority
    }

    /// This view is part of a round replay
    pub fn is_recap(&self) -> bool {
        self.0.is_recap
    }

    pub fn version_no(&self) -> u64 {
        self.0.version_no
    }

    pub fn my_hand(&self) -> &[CardId] {
        &self.0.hand[Seat::Zero]
    }

    pub fn opponent_hand_size(&self) -> usize {
        self.0.hand[Seat::One].len()
    }

    pub fn story(&self) -> &[Act] {
        &self.0.story
    }

    pub fn raw(&self) -> &RelativeState {
        &self.0
    }
}

impl From<RelativeState> for ClientState {
    fn from(state: RelativeState) -> Self {
        Self(state)
    }
}
