//! Match session: the single authority for one two-player match

use dashmap::DashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MatchSettings;
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::card::{decode_deck, Deck};
use super::perspective::{conceal, relative_view};
use super::recap::Recap;
use super::rules::Rules;
use super::seat::{PerSeat, Seat};
use super::state::{CanonicalState, MoveError, PassOutcome};

/// Input from a connection task to its match session
#[derive(Debug)]
pub enum SessionInput {
    /// A socket took a seat; its outbound queue is attached
    Join {
        seat: Seat,
        outbound: mpsc::Sender<ServerMsg>,
    },
    /// A decoded message from the seat's socket
    Message { seat: Seat, msg: ClientMsg },
    /// The seat's socket closed
    Leave { seat: Seat },
}

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPhase {
    /// Fewer than two seats are filled
    AwaitingPeer,
    /// Both seats filled, waiting for both decks
    Handshaking,
    /// Canonical state exists and moves are accepted
    InMatch,
    /// Session is finished
    Ended,
}

/// Handle to a running session
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<SessionInput>,
    pub player_count: Arc<AtomicUsize>,
}

impl MatchHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// The session task has returned
    pub fn is_closed(&self) -> bool {
        self.input_tx.is_closed()
    }
}

/// Registry of all active sessions
pub struct MatchRegistry {
    matches: DashMap<Uuid, MatchHandle>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn insert(&self, handle: MatchHandle) {
        self.matches.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.remove(id).map(|(_, h)| h)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn total_players(&self) -> usize {
        self.matches
            .iter()
            .map(|m| m.value().player_count())
            .sum()
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative match session.
///
/// Owns the canonical state and both recaps; every mutation happens on the
/// task running [`MatchSession::run`], so no locking is involved. Outbound
/// queues are never awaited: a seat that stops reading is dropped instead of
/// stalling the match.
pub struct MatchSession {
    id: Uuid,
    settings: MatchSettings,
    phase: SessionPhase,
    seats: PerSeat<Option<mpsc::Sender<ServerMsg>>>,
    decks: PerSeat<Option<Deck>>,
    /// Seats whose outbound queue filled up since the last input
    lagging: PerSeat<bool>,
    state: Option<CanonicalState>,
    rules: Box<dyn Rules>,
    /// The round being resolved; reset at the start of each resolution
    round: Recap,
    /// Match-level totals folded from every round
    totals: Recap,
    rng: ChaCha8Rng,
    input_rx: mpsc::Receiver<SessionInput>,
    player_count: Arc<AtomicUsize>,
}

impl MatchSession {
    /// Create a new session
    pub fn new(
        id: Uuid,
        seed: u64,
        settings: MatchSettings,
        rules: Box<dyn Rules>,
    ) -> (Self, MatchHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = MatchHandle {
            id,
            input_tx,
            player_count: player_count.clone(),
        };

        let session = Self {
            id,
            settings,
            phase: SessionPhase::AwaitingPeer,
            seats: PerSeat::default(),
            decks: PerSeat::default(),
            lagging: PerSeat::default(),
            state: None,
            rules,
            round: Recap::new(),
            totals: Recap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            input_rx,
            player_count,
        };

        (session, handle)
    }

    /// Run until the match ends, a peer never shows up, or the protocol breaks
    pub async fn run(mut self) {
        info!(match_id = %self.id, "Match session opened");

        let handshake_deadline = sleep_until(Instant::now() + self.settings.peer_wait_timeout);
        tokio::pin!(handshake_deadline);

        while self.phase != SessionPhase::Ended {
            tokio::select! {
                input = self.input_rx.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => {
                        debug!(match_id = %self.id, "All match handles dropped");
                        self.phase = SessionPhase::Ended;
                    }
                },
                _ = &mut handshake_deadline, if self.phase < SessionPhase::InMatch => {
                    self.expire();
                }
            }
            self.drop_lagging();
        }

        info!(
            match_id = %self.id,
            rounds = self.state.as_ref().map(|s| s.round_count()).unwrap_or(0),
            wins = ?self.totals.wins(),
            "Match session closed"
        );
    }

    fn handle_input(&mut self, input: SessionInput) {
        match input {
            SessionInput::Join { seat, outbound } => self.handle_join(seat, outbound),
            SessionInput::Message { seat, msg } => self.handle_message(seat, msg),
            SessionInput::Leave { seat } => self.handle_leave(seat),
        }
    }

    /// Handle a socket taking a seat
    fn handle_join(&mut self, seat: Seat, outbound: mpsc::Sender<ServerMsg>) {
        if self.phase != SessionPhase::AwaitingPeer || self.seats[seat].is_some() {
            warn!(match_id = %self.id, seat = %seat, "Seat unavailable, refusing connection");
            // Dropping the queue closes that socket
            return;
        }

        self.seats[seat] = Some(outbound);
        self.update_player_count();
        info!(match_id = %self.id, seat = %seat, "Player took seat");

        if self.seats.iter().all(Option::is_some) {
            self.phase = SessionPhase::Handshaking;
            info!(match_id = %self.id, "Both players connected");
            for seat in Seat::BOTH {
                self.send(seat, ServerMsg::BothPlayersConnected(true));
            }
        } else {
            self.send(seat, ServerMsg::BothPlayersConnected(false));
        }
    }

    fn handle_message(&mut self, seat: Seat, msg: ClientMsg) {
        match msg {
            ClientMsg::Init(code) => self.handle_init(seat, &code),
            ClientMsg::ExitMatch => self.handle_leave(seat),
            ClientMsg::Emote(emote) => {
                debug!(match_id = %self.id, seat = %seat, emote, "Emote");
                self.send(seat.other(), ServerMsg::OpponentEmote(emote));
            }
            msg => {
                if self.phase != SessionPhase::InMatch {
                    self.violation(format!("seat {} moved before the match started", seat));
                    return;
                }
                self.handle_move(seat, msg);
            }
        }
    }

    /// Handle a seat's deck arriving
    fn handle_init(&mut self, seat: Seat, code: &str) {
        if self.phase != SessionPhase::Handshaking || self.decks[seat].is_some() {
            self.violation(format!("unexpected init from seat {}", seat));
            return;
        }

        let deck = match decode_deck(code) {
            Ok(deck) => deck,
            Err(e) => {
                self.violation(format!("seat {} sent an invalid deck: {}", seat, e));
                return;
            }
        };

        info!(match_id = %self.id, seat = %seat, cards = deck.cards.len(), "Deck received");
        self.decks[seat] = Some(deck);

        if !self.decks.iter().all(Option::is_some) {
            return;
        }
        if let (Some(zero), Some(one)) = (self.decks[Seat::Zero].take(), self.decks[Seat::One].take()) {
            self.start_match(PerSeat::new(zero, one));
        }
    }

    fn start_match(&mut self, decks: PerSeat<Deck>) {
        let state = CanonicalState::new(decks, &self.settings, &mut self.rng);
        info!(match_id = %self.id, priority = %state.priority(), "Match started");

        self.state = Some(state);
        self.phase = SessionPhase::InMatch;
        self.push_state(false);
    }

    /// Apply a mulligan, play or pass
    fn handle_move(&mut self, seat: Seat, msg: ClientMsg) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        let result = match msg {
            ClientMsg::Mulligan(choices) => state
                .mulligan(seat, &choices, &self.settings, &mut self.rng)
                .map(|()| false),
            ClientMsg::PlayCard {
                card_num,
                version_no,
            } => match state.play(seat, card_num, version_no, self.rules.as_ref()) {
                Ok(card) => {
                    debug!(match_id = %self.id, seat = %seat, card = %card, "Card played");
                    Ok(false)
                }
                Err(e) => Err(e),
            },
            ClientMsg::PassTurn { version_no } => match state.pass(seat, version_no) {
                Ok(PassOutcome::Continue) => Ok(false),
                Ok(PassOutcome::RoundOver) => {
                    self.resolve_round();
                    Ok(true)
                }
                Err(e) => Err(e),
            },
            ClientMsg::Init(_) | ClientMsg::ExitMatch | ClientMsg::Emote(_) => return,
        };

        match result {
            Ok(resolved) => {
                self.push_state(resolved);
                if self.state.as_ref().and_then(CanonicalState::winner).is_some() {
                    // Final push is queued; dropping the queues closes both sockets after it
                    self.phase = SessionPhase::Ended;
                }
            }
            Err(e) => self.reject(seat, e),
        }
    }

    /// Run the story, fold the round into the match totals and start the next round
    fn resolve_round(&mut self) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        let outcome = state.resolve_round(self.rules.as_mut(), &mut self.round, &self.settings);
        self.totals.add_total(
            *self.round.sums(),
            *self.round.wins(),
            *self.round.safety(),
        );
        info!(
            match_id = %self.id,
            round = state.round_count(),
            round_winner = ?outcome.round_winner,
            wins = ?state.wins(),
            "Round resolved"
        );

        match outcome.match_winner {
            Some(winner) => info!(match_id = %self.id, winner = %winner, "Match won"),
            None => state.upkeep(&self.settings),
        }
    }

    /// Handle a seat's socket going away
    fn handle_leave(&mut self, seat: Seat) {
        if self.seats[seat].take().is_none() {
            return;
        }
        self.lagging[seat] = false;
        self.update_player_count();
        info!(match_id = %self.id, seat = %seat, phase = ?self.phase, "Player left match");

        let remaining = seat.other();
        match self.phase {
            SessionPhase::AwaitingPeer | SessionPhase::Handshaking => {
                self.send(remaining, ServerMsg::OpponentDisconnected);
            }
            SessionPhase::InMatch => {
                if let Some(state) = self.state.as_mut() {
                    if state.winner().is_none() {
                        state.set_winner_via_disconnect(remaining);
                        info!(match_id = %self.id, winner = %remaining, "Match won by disconnect");
                        self.push_state(false);
                        self.send(remaining, ServerMsg::OpponentDisconnected);
                    }
                }
            }
            SessionPhase::Ended => {}
        }
        self.phase = SessionPhase::Ended;
    }

    /// Derive every seat's views, then send them, replay first
    fn push_state(&mut self, resolved: bool) {
        let Some(state) = self.state.as_ref() else {
            return;
        };

        let round = &self.round;
        let batches = PerSeat::from_fn(|seat| {
            let mut batch = Vec::new();
            if resolved {
                batch.extend(
                    round
                        .get_state_list(seat)
                        .into_iter()
                        .map(|view| ServerMsg::TransmitState(conceal(view.clone()))),
                );
                let recap = match seat {
                    Seat::Zero => round.view(),
                    Seat::One => round.get_flipped().view(),
                };
                batch.push(ServerMsg::RoundRecap(recap));
            }
            batch.push(ServerMsg::TransmitState(conceal(relative_view(
                state, seat, false,
            ))));
            batch
        });

        for (seat, batch) in Seat::BOTH.into_iter().zip(batches.into_array()) {
            for msg in batch {
                self.send(seat, msg);
            }
        }
    }

    fn reject(&mut self, seat: Seat, error: MoveError) {
        debug!(match_id = %self.id, seat = %seat, error = %error, "Move rejected");
        self.send(seat, ServerMsg::error(error.code(), error.to_string()));
    }

    /// Tear the session down after a logic error on either side
    fn violation(&mut self, reason: String) {
        warn!(match_id = %self.id, reason = %reason, "Protocol violation, ending match");
        for seat in Seat::BOTH {
            self.send(seat, ServerMsg::error("protocol_violation", reason.clone()));
        }
        self.phase = SessionPhase::Ended;
    }

    /// The second seat or a deck never arrived
    fn expire(&mut self) {
        warn!(match_id = %self.id, phase = ?self.phase, "Timed out waiting for peer");
        for seat in Seat::BOTH {
            self.send(
                seat,
                ServerMsg::error("peer_timeout", "timed out waiting for the other player"),
            );
        }
        self.phase = SessionPhase::Ended;
    }

    /// Queue a message without waiting; a full queue marks the seat as lagging
    fn send(&mut self, seat: Seat, msg: ServerMsg) {
        let Some(tx) = &self.seats[seat] else {
            return;
        };
        match tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                if !self.lagging[seat] {
                    warn!(match_id = %self.id, seat = %seat, "Outbound queue full");
                }
                self.lagging[seat] = true;
            }
            // The reader side reports the disconnect itself
            Err(TrySendError::Closed(_)) => {
                debug!(match_id = %self.id, seat = %seat, "Outbound queue closed");
            }
        }
    }

    /// Treat every seat that stopped reading as gone
    fn drop_lagging(&mut self) {
        while let Some(seat) = Seat::BOTH.into_iter().find(|&seat| self.lagging[seat]) {
            warn!(match_id = %self.id, seat = %seat, "Dropping seat that stopped reading");
            self.lagging[seat] = false;
            self.handle_leave(seat);
        }
    }

    fn update_player_count(&self) {
        let count = self.seats.iter().filter(|s| s.is_some()).count();
        self.player_count.store(count, Ordering::Relaxed);
    }
}
