//! Seat assignment for incoming connections

mod lobby;

pub use lobby::Lobby;
