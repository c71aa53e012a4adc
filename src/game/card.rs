//! Card identifiers and the deck code boundary
//!
//! Card definitions and their effects live in the rules engine; inside the
//! match layer a card is only an opaque identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between card identifiers in an encoded deck
pub const DECK_SEPARATOR: char = '™';

/// Opaque card identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    /// Identifier shown in place of a card the recipient may not see
    pub const CARDBACK: &'static str = "Cardback";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn cardback() -> Self {
        Self(Self::CARDBACK.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_cardback(&self) -> bool {
        self.0 == Self::CARDBACK
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A decoded deck, in the order it was submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    pub cards: Vec<CardId>,
}

/// Deck code errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeckError {
    #[error("deck code is empty")]
    Empty,

    #[error("deck code has a blank card at position {0}")]
    BlankCard(usize),
}

/// Decode a deck code into its cards
pub fn decode_deck(code: &str) -> Result<Deck, DeckError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(DeckError::Empty);
    }

    let cards = code
        .split(DECK_SEPARATOR)
        .enumerate()
        .map(|(i, id)| {
            let id = id.trim();
            if id.is_empty() {
                Err(DeckError::BlankCard(i))
            } else {
                Ok(CardId::new(id))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Deck { cards })
}

/// Encode cards into a deck code
pub fn encode_deck(cards: &[CardId]) -> String {
    let mut code = String::new();
    for (i, card) in cards.iter().enumerate() {
        if i > 0 {
            code.push(DECK_SEPARATOR);
        }
        code.push_str(card.as_str());
    }
    code
}
