//! Canonical match state (seat-indexed, authoritative)
//!
//! Nothing in here is relative to a recipient. The only way to turn a
//! [`CanonicalState`] into something a client may see is
//! [`relative_view`](super::perspective::relative_view).

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::MatchSettings;

use super::card::{CardId, Deck};
use super::recap::{Recap, StatePair};
use super::rules::Rules;
use super::seat::{Flip, PerSeat, Seat};

/// A card waiting on the story to resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Act {
    pub card: CardId,
    pub owner: Seat,
}

impl Flip for Act {
    fn flip(&self) -> Self {
        Self {
            card: self.card.clone(),
            owner: self.owner.other(),
        }
    }
}

/// A move that the current state does not allow
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("the match already has a winner")]
    MatchOver,

    #[error("move was made against version {got}, current is {expected}")]
    StaleVersion { expected: u64, got: u64 },

    #[error("seat does not hold priority")]
    NotYourPriority,

    #[error("mulligans are still in progress")]
    MulligansPending,

    #[error("mulligan already completed")]
    MulliganDone,

    #[error("mulligan has {got} choices for a hand of {expected}")]
    MulliganLength { expected: usize, got: usize },

    #[error("card {0} cannot be played")]
    CannotPlay(usize),
}

impl MoveError {
    /// Short machine-readable code sent with `signal_error`
    pub fn code(&self) -> &'static str {
        match self {
            MoveError::MatchOver => "match_over",
            MoveError::StaleVersion { .. } => "stale_version",
            MoveError::NotYourPriority => "not_your_priority",
            MoveError::MulligansPending => "mulligans_pending",
            MoveError::MulliganDone => "mulligan_done",
            MoveError::MulliganLength { .. } => "mulligan_length",
            MoveError::CannotPlay(_) => "cannot_play",
        }
    }
}

/// What a pass led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The other seat now holds priority
    Continue,
    /// Both seats passed in sequence; the round must resolve
    RoundOver,
}

/// Result of resolving one round's story
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub round_winner: Option<Seat>,
    pub match_winner: Option<Seat>,
}

/// The single source of truth for one match
#[derive(Debug, Clone)]
pub struct CanonicalState {
    pub(super) priority: Seat,
    pub(super) passes: u8,
    pub(super) mulligans_complete: PerSeat<bool>,
    pub(super) score: PerSeat<u32>,
    pub(super) wins: PerSeat<u32>,
    pub(super) safety: PerSeat<u32>,
    pub(super) winner: Option<Seat>,
    pub(super) hand: PerSeat<Vec<CardId>>,
    pub(super) deck: PerSeat<Vec<CardId>>,
    pub(super) round_results: PerSeat<Vec<u32>>,
    pub(super) story: Vec<Act>,
    pub(super) last_player_who_played: Seat,
    pub(super) round_count: u32,
    pub(super) version_no: u64,
}

impl CanonicalState {
    /// Shuffle both decks, deal opening hands and pick who acts first
    pub fn new(decks: PerSeat<Deck>, settings: &MatchSettings, rng: &mut impl Rng) -> Self {
        let deck = decks.map(|d| {
            let mut cards = d.cards.clone();
            cards.shuffle(rng);
            cards
        });
        let priority = if rng.gen_bool(0.5) { Seat::Zero } else { Seat::One };

        let mut state = Self {
            priority,
            passes: 0,
            mulligans_complete: PerSeat::new(false, false),
            score: PerSeat::default(),
            wins: PerSeat::default(),
            safety: PerSeat::default(),
            winner: None,
            hand: PerSeat::default(),
            deck,
            round_results: PerSeat::default(),
            story: Vec::new(),
            last_player_who_played: priority,
            round_count: 0,
            version_no: 0,
        };

        for seat in Seat::BOTH {
            state.draw(seat, settings.start_hand, settings.hand_cap);
        }
        state
    }

    pub fn priority(&self) -> Seat {
        self.priority
    }

    pub fn passes(&self) -> u8 {
        self.passes
    }

    pub fn winner(&self) -> Option<Seat> {
        self.winner
    }

    pub fn version_no(&self) -> u64 {
        self.version_no
    }

    pub fn wins(&self) -> &PerSeat<u32> {
        &self.wins
    }

    pub fn score(&self) -> &PerSeat<u32> {
        &self.score
    }

    pub fn hand(&self, seat: Seat) -> &[CardId] {
        &self.hand[seat]
    }

    pub fn deck_size(&self, seat: Seat) -> usize {
        self.deck[seat].len()
    }

    pub fn story(&self) -> &[Act] {
        &self.story
    }

    pub fn mulligans_complete(&self) -> bool {
        self.mulligans_complete.iter().all(|done| *done)
    }

    pub fn round_count(&self) -> u32 {
        self.round_count
    }

    /// Draw up to `count` cards from the top of the deck, stopping at the cap
    fn draw(&mut self, seat: Seat, count: usize, cap: usize) -> usize {
        let mut drawn = 0;
        while drawn < count && self.hand[seat].len() < cap && !self.deck[seat].is_empty() {
            let card = self.deck[seat].remove(0);
            self.hand[seat].push(card);
            drawn += 1;
        }
        drawn
    }

    fn switch_priority(&mut self) {
        self.priority = self.priority.other();
    }

    /// Replace the marked cards of an opening hand
    pub fn mulligan(
        &mut self,
        seat: Seat,
        choices: &[bool],
        settings: &MatchSettings,
        rng: &mut impl Rng,
    ) -> Result<(), MoveError> {
        if self.winner.is_some() {
            return Err(MoveError::MatchOver);
        }
        if self.mulligans_complete[seat] {
            return Err(MoveError::MulliganDone);
        }
        if choices.len() != self.hand[seat].len() {
            return Err(MoveError::MulliganLength {
                expected: self.hand[seat].len(),
                got: choices.len(),
            });
        }

        let (thrown, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.hand[seat])
            .into_iter()
            .zip(choices.iter().copied())
            .partition(|(_, redraw)| *redraw);
        self.hand[seat] = kept.into_iter().map(|(card, _)| card).collect();

        // Replacements come from the deck before the thrown cards go back in
        self.draw(seat, thrown.len(), settings.hand_cap);
        self.deck[seat].extend(thrown.into_iter().map(|(card, _)| card));
        self.deck[seat].shuffle(rng);

        self.mulligans_complete[seat] = true;
        self.version_no += 1;
        Ok(())
    }

    /// Checks shared by every move made in turn
    fn check_turn(&self, seat: Seat, version_no: u64) -> Result<(), MoveError> {
        if self.winner.is_some() {
            return Err(MoveError::MatchOver);
        }
        if version_no != self.version_no {
            return Err(MoveError::StaleVersion {
                expected: self.version_no,
                got: version_no,
            });
        }
        if seat != self.priority {
            return Err(MoveError::NotYourPriority);
        }
        if !self.mulligans_complete() {
            return Err(MoveError::MulligansPending);
        }
        Ok(())
    }

    /// Put the `card_num`th card of the seat's hand on the story
    pub fn play(
        &mut self,
        seat: Seat,
        card_num: usize,
        version_no: u64,
        rules: &dyn Rules,
    ) -> Result<CardId, MoveError> {
        self.check_turn(seat, version_no)?;
        if card_num >= self.hand[seat].len() || !rules.can_play(self, seat, card_num) {
            return Err(MoveError::CannotPlay(card_num));
        }

        let card = self.hand[seat].remove(card_num);
        self.story.push(Act {
            card: card.clone(),
            owner: seat,
        });
        self.passes = 0;
        self.last_player_who_played = seat;
        self.switch_priority();
        self.version_no += 1;
        Ok(card)
    }

    /// Give up priority; two passes in sequence end the round
    pub fn pass(&mut self, seat: Seat, version_no: u64) -> Result<PassOutcome, MoveError> {
        self.check_turn(seat, version_no)?;

        self.passes += 1;
        self.switch_priority();
        self.version_no += 1;

        if self.passes >= 2 {
            Ok(PassOutcome::RoundOver)
        } else {
            Ok(PassOutcome::Continue)
        }
    }

    /// Resolve the story act by act into `recap`, then score the round.
    ///
    /// `recap` is reset first; the caller folds its totals upward before the
    /// next round resets it again.
    pub fn resolve_round(
        &mut self,
        rules: &mut dyn Rules,
        recap: &mut Recap,
        settings: &MatchSettings,
    ) -> RoundOutcome {
        recap.reset();
        self.score = PerSeat::default();

        while !self.story.is_empty() {
            let act = self.story.remove(0);
            let resolution = rules.resolve(self, &act);

            self.score[act.owner] += resolution.points;
            self.safety[act.owner] += resolution.safety;
            recap.add(act.card, act.owner, resolution.text);

            // Both views come from this exact instant
            recap.add_state(StatePair::capture(self));
        }

        let mut round_wins = PerSeat::new(0, 0);
        let round_winner = Seat::BOTH
            .into_iter()
            .find(|&seat| self.score[seat] > self.score[seat.other()] + self.safety[seat.other()]);
        if let Some(seat) = round_winner {
            round_wins[seat] = 1;
            self.wins[seat] += 1;
        }

        for seat in Seat::BOTH {
            self.round_results[seat].push(self.score[seat]);
        }
        self.round_count += 1;
        recap.add_total(self.score, round_wins, self.safety);

        if let Some(seat) = Seat::BOTH
            .into_iter()
            .find(|&seat| self.wins[seat] >= settings.wins_to_win)
        {
            self.winner = Some(seat);
        }

        RoundOutcome {
            round_winner,
            match_winner: self.winner,
        }
    }

    /// Start the next round
    pub fn upkeep(&mut self, settings: &MatchSettings) {
        self.passes = 0;
        self.safety = PerSeat::default();
        self.priority = self.last_player_who_played;

        for seat in [self.priority, self.priority.other()] {
            self.draw(seat, settings.draw_per_turn, settings.hand_cap);
        }
        self.version_no += 1;
    }

    /// End the match in favour of `seat` because the other seat left
    pub fn set_winner_via_disconnect(&mut self, seat: Seat) {
        self.winner = Some(seat);
        self.mulligans_complete = PerSeat::new(true, true);
        self.version_no += 1;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game::card::decode_deck;
    use crate::game::rules::TallyRules;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    pub(crate) fn deck(prefix: &str, size: usize) -> Deck {
        let code = (0..size)
            .map(|i| format!("{prefix}{i}"))
            .collect::<Vec<_>>()
            .join("™");
        decode_deck(&code).unwrap()
    }

    /// A started match with mulligans done and seat 0 holding priority
    pub(crate) fn started(settings: &MatchSettings) -> CanonicalState {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut state =
            CanonicalState::new(PerSeat::new(deck("a", 15), deck("b", 15)), settings, &mut rng);
        for seat in Seat::BOTH {
            let keep = vec![false; state.hand(seat).len()];
            state.mulligan(seat, &keep, settings, &mut rng).unwrap();
        }
        state.priority = Seat::Zero;
        state
    }

    #[test]
    fn deals_opening_hands() {
        let settings = MatchSettings::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let state =
            CanonicalState::new(PerSeat::new(deck("a", 15), deck("b", 15)), &settings, &mut rng);

        for seat in Seat::BOTH {
            assert_eq!(state.hand(seat).len(), 3);
            assert_eq!(state.deck_size(seat), 12);
        }
        assert!(!state.mulligans_complete());
        assert_eq!(state.version_no(), 0);
    }

    #[test]
    fn mulligan_replaces_marked_cards() {
        let settings = MatchSettings::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut state =
            CanonicalState::new(PerSeat::new(deck("a", 15), deck("b", 15)), &settings, &mut rng);
        let before = state.hand(Seat::Zero).to_vec();

        state
            .mulligan(Seat::Zero, &[true, false, false], &settings, &mut rng)
            .unwrap();

        let after = state.hand(Seat::Zero);
        assert_eq!(after.len(), 3);
        assert!(!after.contains(&before[0]));
        assert_eq!(&after[..2], &before[1..]);
        assert_eq!(state.deck_size(Seat::Zero), 12);
        assert_eq!(
            state.mulligan(Seat::Zero, &[false; 3], &settings, &mut rng),
            Err(MoveError::MulliganDone)
        );
        assert_eq!(
            state.mulligan(Seat::One, &[false], &settings, &mut rng),
            Err(MoveError::MulliganLength { expected: 3, got: 1 })
        );
    }

    #[test]
    fn moves_wait_for_mulligans() {
        let settings = MatchSettings::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut state =
            CanonicalState::new(PerSeat::new(deck("a", 15), deck("b", 15)), &settings, &mut rng);
        let seat = state.priority();

        assert_eq!(state.pass(seat, 0), Err(MoveError::MulligansPending));
    }

    #[test]
    fn play_checks_version_and_priority() {
        let settings = MatchSettings::default();
        let mut state = started(&settings);
        let rules = TallyRules::default();
        let version = state.version_no();

        assert_eq!(
            state.play(Seat::One, 0, version, &rules),
            Err(MoveError::NotYourPriority)
        );
        assert_eq!(
            state.play(Seat::Zero, 0, version + 1, &rules),
            Err(MoveError::StaleVersion {
                expected: version,
                got: version + 1
            })
        );
        assert_eq!(
            state.play(Seat::Zero, 9, version, &rules),
            Err(MoveError::CannotPlay(9))
        );

        let card = state.play(Seat::Zero, 0, version, &rules).unwrap();
        assert_eq!(state.story(), &[Act { card, owner: Seat::Zero }]);
        assert_eq!(state.priority(), Seat::One);
        assert_eq!(state.version_no(), version + 1);
    }

    #[test]
    fn two_passes_end_the_round() {
        let settings = MatchSettings::default();
        let mut state = started(&settings);

        let v = state.version_no();
        assert_eq!(state.pass(Seat::Zero, v), Ok(PassOutcome::Continue));
        assert_eq!(state.passes(), 1);
        assert_eq!(state.pass(Seat::One, v + 1), Ok(PassOutcome::RoundOver));
    }

    #[test]
    fn a_play_resets_passes() {
        let settings = MatchSettings::default();
        let mut state = started(&settings);
        let rules = TallyRules::default();

        state.pass(Seat::Zero, state.version_no()).unwrap();
        state.play(Seat::One, 0, state.version_no(), &rules).unwrap();
        assert_eq!(state.passes(), 0);
        assert_eq!(state.priority(), Seat::Zero);
    }

    #[test]
    fn resolving_scores_the_round_and_records_the_recap() {
        let settings = MatchSettings::default();
        let mut state = started(&settings);
        let mut rules = TallyRules::default();
        let mut recap = Recap::new();

        state.play(Seat::Zero, 0, state.version_no(), &rules).unwrap();
        state.play(Seat::One, 0, state.version_no(), &rules).unwrap();
        state.play(Seat::Zero, 0, state.version_no(), &rules).unwrap();
        state.pass(Seat::One, state.version_no()).unwrap();
        state.pass(Seat::Zero, state.version_no()).unwrap();

        let outcome = state.resolve_round(&mut rules, &mut recap, &settings);

        assert_eq!(outcome.round_winner, Some(Seat::Zero));
        assert_eq!(outcome.match_winner, None);
        assert_eq!(*state.wins(), PerSeat::new(1, 0));
        assert_eq!(*state.score(), PerSeat::new(2, 1));
        assert!(state.story().is_empty());
        assert_eq!(recap.story().len(), 3);
        assert_eq!(recap.state_list().len(), 3);
        assert_eq!(*recap.sums(), PerSeat::new(2, 1));
        assert_eq!(*recap.wins(), PerSeat::new(1, 0));
        assert_eq!(recap.story()[1].owner, Seat::One);
    }

    #[test]
    fn upkeep_hands_priority_to_last_player_and_draws() {
        let settings = MatchSettings::default();
        let mut state = started(&settings);
        let mut rules = TallyRules::default();
        let mut recap = Recap::new();

        state.play(Seat::Zero, 0, state.version_no(), &rules).unwrap();
        state.pass(Seat::One, state.version_no()).unwrap();
        state.pass(Seat::Zero, state.version_no()).unwrap();
        state.resolve_round(&mut rules, &mut recap, &settings);
        let resolved_at = state.version_no();
        assert!(recap
            .state_list()
            .iter()
            .all(|pair| pair.view(Seat::Zero).version_no == resolved_at));
        state.upkeep(&settings);

        assert_eq!(state.version_no(), resolved_at + 1);
        assert_eq!(state.priority(), Seat::Zero);
        assert_eq!(state.passes(), 0);
        assert_eq!(state.hand(Seat::Zero).len(), 4);
        assert_eq!(state.hand(Seat::One).len(), 5);
    }

    #[test]
    fn wins_to_win_declares_the_winner() {
        let settings = MatchSettings {
            wins_to_win: 1,
            ..MatchSettings::default()
        };
        let mut state = started(&settings);
        let mut rules = TallyRules::default();
        let mut recap = Recap::new();

        state.play(Seat::Zero, 0, state.version_no(), &rules).unwrap();
        state.pass(Seat::One, state.version_no()).unwrap();
        state.pass(Seat::Zero, state.version_no()).unwrap();
        let outcome = state.resolve_round(&mut rules, &mut recap, &settings);

        assert_eq!(outcome.match_winner, Some(Seat::Zero));
        assert_eq!(
            state.pass(Seat::Zero, state.version_no()),
            Err(MoveError::MatchOver)
        );
    }

    #[test]
    fn disconnect_forces_a_winner() {
        let settings = MatchSettings::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut state =
            CanonicalState::new(PerSeat::new(deck("a", 15), deck("b", 15)), &settings, &mut rng);

        state.set_winner_via_disconnect(Seat::One);
        assert_eq!(state.winner(), Some(Seat::One));
        assert!(state.mulligans_complete());
        assert_eq!(state.version_no(), 1);
    }
}
