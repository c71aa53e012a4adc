//! Match modules: canonical state, perspective, recap and the session authority

pub mod card;
pub mod perspective;
pub mod recap;
pub mod rules;
pub mod seat;
pub mod session;
pub mod state;

pub use card::{CardId, Deck, DeckError};
pub use perspective::{conceal, relative_view, RelativeState};
pub use recap::{Play, Recap, RecapView, StatePair};
pub use rules::{Resolution, Rules, RulesFactory, TallyRules};
pub use seat::{Flip, PerSeat, Seat};
pub use session::{MatchHandle, MatchRegistry, MatchSession, SessionInput, SessionPhase};
pub use state::{Act, CanonicalState, MoveError, PassOutcome, RoundOutcome};
