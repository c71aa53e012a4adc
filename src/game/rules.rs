//! Seam to the card rules engine
//!
//! Card effects and scoring are not part of the match layer. A session asks
//! its [`Rules`] whether a card may be played and what each act of the story
//! is worth when the round resolves.

use super::seat::Seat;
use super::state::{Act, CanonicalState};

/// What resolving a single act produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Points added to the act owner's score this round
    pub points: u32,
    /// Safety gained by the act owner this round
    pub safety: u32,
    /// Text shown for this act in the recap
    pub text: String,
}

pub trait Rules: Send + 'static {
    /// Whether `seat` may put the `card_num`th card of its hand on the story
    fn can_play(&self, state: &CanonicalState, seat: Seat, card_num: usize) -> bool {
        card_num < state.hand(seat).len()
    }

    /// Resolve one act while the story runs
    fn resolve(&mut self, state: &CanonicalState, act: &Act) -> Resolution;
}

/// Builds the rules engine for each new match
pub type RulesFactory = fn() -> Box<dyn Rules>;

/// Flat scoring: every card is worth the same number of points
#[derive(Debug, Clone)]
pub struct TallyRules {
    points_per_card: u32,
}

impl TallyRules {
    pub fn new(points_per_card: u32) -> Self {
        Self { points_per_card }
    }

    pub fn boxed() -> Box<dyn Rules> {
        Box::new(Self::default())
    }
}

impl Default for TallyRules {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Rules for TallyRules {
    fn resolve(&mut self, _state: &CanonicalState, act: &Act) -> Resolution {
        Resolution {
            points: self.points_per_card,
            safety: 0,
            text: format!("{}: +{}", act.card, self.points_per_card),
        }
    }
}
