//! Perspective transform: canonical state to a recipient-relative view
//!
//! In a [`RelativeState`] seat 0 is always the recipient and seat 1 their
//! opponent. [`relative_view`] is the only function that builds one from a
//! [`CanonicalState`], and it rotates the whole snapshot in one step.

use serde::{Deserialize, Serialize};

use super::card::CardId;
use super::seat::{Flip, PerSeat, Seat};
use super::state::{Act, CanonicalState};

/// A snapshot of the match as one recipient sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeState {
    pub priority: Seat,
    pub passes: u8,
    pub mulligans_complete: PerSeat<bool>,
    pub score: PerSeat<u32>,
    pub wins: PerSeat<u32>,
    pub safety: PerSeat<u32>,
    pub winner: Option<Seat>,
    pub hand: PerSeat<Vec<CardId>>,
    pub deck_size: PerSeat<usize>,
    pub round_results: PerSeat<Vec<u32>>,
    pub story: Vec<Act>,
    pub last_player_who_played: Seat,
    pub round_count: u32,
    pub version_no: u64,
    /// Part of a round replay rather than the live state
    pub is_recap: bool,
}

impl Flip for RelativeState {
    fn flip(&self) -> Self {
        // Spelled out field by field so a new field cannot be left unflipped
        Self {
            priority: self.priority.flip(),
            passes: self.passes,
            mulligans_complete: self.mulligans_complete.flip(),
            score: self.score.flip(),
            wins: self.wins.flip(),
            safety: self.safety.flip(),
            winner: self.winner.flip(),
            hand: self.hand.flip(),
            deck_size: self.deck_size.flip(),
            round_results: self.round_results.flip(),
            story: self.story.iter().map(Act::flip).collect(),
            last_player_who_played: self.last_player_who_played.flip(),
            round_count: self.round_count,
            version_no: self.version_no,
            is_recap: self.is_recap,
        }
    }
}

/// The view of `state` for the recipient sitting in `seat`
pub fn relative_view(state: &CanonicalState, seat: Seat, is_recap: bool) -> RelativeState {
    let view = RelativeState {
        priority: state.priority,
        passes: state.passes,
        mulligans_complete: state.mulligans_complete,
        score: state.score,
        wins: state.wins,
        safety: state.safety,
        winner: state.winner,
        hand: state.hand.clone(),
        deck_size: state.deck.map(Vec::len),
        round_results: state.round_results.clone(),
        story: state.story.clone(),
        last_player_who_played: state.last_player_who_played,
        round_count: state.round_count,
        version_no: state.version_no,
        is_recap,
    };

    match seat {
        Seat::Zero => view,
        Seat::One => view.flip(),
    }
}

/// Hide what the recipient is not allowed to know.
///
/// The opponent's hand is always hidden. Their pending story cards are hidden
/// until the round is replayed.
pub fn conceal(mut view: RelativeState) -> RelativeState {
    let opponent = Seat::One;

    for card in view.hand[opponent].iter_mut() {
        *card = CardId::cardback();
    }

    if !view.is_recap {
        for act in view.story.iter_mut().filter(|act| act.owner == opponent) {
            act.card = CardId::cardback();
        }
    }

    view
}
