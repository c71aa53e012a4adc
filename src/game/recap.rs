//! Round recap: play log, running totals and paired snapshots
//!
//! A [`Recap`] is seat-indexed like the canonical state. Seat 0 reads it as
//! is; seat 1 reads [`Recap::get_flipped`].

use serde::{Deserialize, Serialize};

use super::card::CardId;
use super::perspective::{relative_view, RelativeState};
use super::seat::{Flip, PerSeat, Seat};
use super::state::CanonicalState;

/// One resolved play: which card, whose it was, what it did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Play {
    pub card: CardId,
    pub owner: Seat,
    pub text: String,
}

impl Flip for Play {
    fn flip(&self) -> Self {
        Self {
            card: self.card.clone(),
            owner: self.owner.other(),
            text: self.text.clone(),
        }
    }
}

/// Both seats' views of one canonical instant.
///
/// Only [`StatePair::capture`] builds one, so the two halves can never come
/// from different moments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePair(PerSeat<RelativeState>);

impl StatePair {
    pub fn capture(state: &CanonicalState) -> Self {
        Self(PerSeat::from_fn(|seat| relative_view(state, seat, true)))
    }

    pub fn view(&self, seat: Seat) -> &RelativeState {
        &self.0[seat]
    }
}

impl Flip for StatePair {
    fn flip(&self) -> Self {
        Self(self.0.swapped())
    }
}

/// Per-round accumulator of plays, totals and replay snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recap {
    story: Vec<Play>,
    sums: PerSeat<u32>,
    wins: PerSeat<u32>,
    safety: PerSeat<u32>,
    state_list: Vec<StatePair>,
}

impl Recap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn story(&self) -> &[Play] {
        &self.story
    }

    pub fn sums(&self) -> &PerSeat<u32> {
        &self.sums
    }

    pub fn wins(&self) -> &PerSeat<u32> {
        &self.wins
    }

    pub fn safety(&self) -> &PerSeat<u32> {
        &self.safety
    }

    pub fn state_list(&self) -> &[StatePair] {
        &self.state_list
    }

    /// Append a resolved play
    pub fn add(&mut self, card: CardId, owner: Seat, text: impl Into<String>) {
        self.story.push(Play {
            card,
            owner,
            text: text.into(),
        });
    }

    /// Append the paired views of one resolution sub-step
    pub fn add_state(&mut self, pair: StatePair) {
        self.state_list.push(pair);
    }

    /// Fold a round's outcome into the running totals
    pub fn add_total(&mut self, sums: PerSeat<u32>, wins: PerSeat<u32>, safety: PerSeat<u32>) {
        for seat in Seat::BOTH {
            self.sums[seat] += sums[seat];
            self.wins[seat] += wins[seat];
            self.safety[seat] += safety[seat];
        }
    }

    /// Clear the log and zero the totals.
    ///
    /// Totals that must outlive the round have to be folded elsewhere with
    /// [`Recap::add_total`] first.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// An independent copy with every seat index swapped
    pub fn get_flipped(&self) -> Recap {
        Recap {
            story: self.story.iter().map(Play::flip).collect(),
            sums: self.sums.swapped(),
            wins: self.wins.swapped(),
            safety: self.safety.swapped(),
            state_list: self.state_list.iter().map(StatePair::flip).collect(),
        }
    }

    /// The replay feed for one seat, in recorded order
    pub fn get_state_list(&self, seat: Seat) -> Vec<&RelativeState> {
        self.state_list.iter().map(|pair| pair.view(seat)).collect()
    }

    /// Summary sent to the seat 0 side; use on a flipped recap for seat 1
    pub fn view(&self) -> RecapView {
        RecapView {
            story: self.story.clone(),
            sums: self.sums,
            wins: self.wins,
            safety: self.safety,
        }
    }
}

impl Flip for Recap {
    fn flip(&self) -> Self {
        self.get_flipped()
    }
}

/// Wire form of a recap for post-round review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecapView {
    pub story: Vec<Play>,
    pub sums: PerSeat<u32>,
    pub wins: PerSeat<u32>,
    pub safety: PerSeat<u32>,
}
