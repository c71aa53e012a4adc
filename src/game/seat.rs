//! Seats and per-seat pairs
//!
//! A [`Seat`] is one of the two fixed positions in a match. Every
//! player-indexed value is stored in a [`PerSeat`] so that flipping the
//! point of view is a single, total operation.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// One of the two positions at the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Seat {
    Zero,
    One,
}

impl Seat {
    pub const BOTH: [Seat; 2] = [Seat::Zero, Seat::One];

    /// The opposing seat
    pub fn other(self) -> Self {
        match self {
            Seat::Zero => Seat::One,
            Seat::One => Seat::Zero,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Seat::Zero => 0,
            Seat::One => 1,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// A seat index outside {0, 1}
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("seat index {0} is outside {{0, 1}}")]
pub struct InvalidSeat(pub u8);

impl TryFrom<u8> for Seat {
    type Error = InvalidSeat;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Seat::Zero),
            1 => Ok(Seat::One),
            other => Err(InvalidSeat(other)),
        }
    }
}

impl From<Seat> for u8 {
    fn from(seat: Seat) -> Self {
        seat.index() as u8
    }
}

/// Remap every player-indexed part of a value so index 0 and 1 trade places.
///
/// Implementations must be involutions: `x.flip().flip() == x`.
pub trait Flip {
    fn flip(&self) -> Self;
}

impl Flip for Seat {
    fn flip(&self) -> Self {
        self.other()
    }
}

impl Flip for Option<Seat> {
    fn flip(&self) -> Self {
        self.map(Seat::other)
    }
}

/// Exactly one value per seat, serialized as a two element array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerSeat<T>([T; 2]);

impl<T> PerSeat<T> {
    pub fn new(zero: T, one: T) -> Self {
        Self([zero, one])
    }

    /// Build both entries from a function of the seat
    pub fn from_fn(mut f: impl FnMut(Seat) -> T) -> Self {
        Self([f(Seat::Zero), f(Seat::One)])
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerSeat<U> {
        PerSeat([f(&self.0[0]), f(&self.0[1])])
    }

    pub fn into_array(self) -> [T; 2] {
        self.0
    }
}

impl<T: Clone> PerSeat<T> {
    /// Same values with seat 0 and seat 1 exchanged
    pub fn swapped(&self) -> Self {
        Self([self.0[1].clone(), self.0[0].clone()])
    }
}

impl<T: Clone> Flip for PerSeat<T> {
    fn flip(&self) -> Self {
        self.swapped()
    }
}

impl<T> Index<Seat> for PerSeat<T> {
    type Output = T;

    fn index(&self, seat: Seat) -> &T {
        &self.0[seat.index()]
    }
}

impl<T> IndexMut<Seat> for PerSeat<T> {
    fn index_mut(&mut self, seat: Seat) -> &mut T {
        &mut self.0[seat.index()]
    }
}

impl<T> From<[T; 2]> for PerSeat<T> {
    fn from(values: [T; 2]) -> Self {
        Self(values)
    }
}
