//! Celestial match server - authoritative two-player match synchronization
//!
//! The server holds one canonical state per match and pushes each of the two
//! connected clients a view in which that client is always seat 0. The
//! [`client`] module is the other end of the same protocol.

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod matchmaking;
pub mod util;
pub mod ws;
