//! Priority and pass indicator state, derived from the latest [`ClientState`]

use crate::game::{PerSeat, Seat};

use super::state::ClientState;

/// What the act button shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActControl {
    /// Give up priority
    Pass { enabled: bool },
    /// Leave the finished match; never disabled
    Exit,
}

/// The priority/pass indicator for one state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassDisplay {
    /// Mulligans are still being chosen
    Hidden,
    Shown {
        /// Which sides show "passed", self first
        passed: PerSeat<bool>,
        act: ControlState,
    },
}

/// Act control together with whose turn the indicator points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub control: ActControl,
    pub my_priority: bool,
}

impl PassDisplay {
    pub fn derive(state: &ClientState) -> Self {
        if !state.all_mulligans_complete() {
            return PassDisplay::Hidden;
        }

        let priority = state.priority();
        let passed = match state.passes() {
            0 => PerSeat::new(false, false),
            1 => PerSeat::from_fn(|seat| seat != priority),
            _ => PerSeat::new(true, true),
        };

        let my_priority = priority == Seat::Zero;
        let control = if state.winner().is_some() {
            ActControl::Exit
        } else {
            ActControl::Pass {
                enabled: my_priority && !state.is_recap(),
            }
        };

        PassDisplay::Shown {
            passed,
            act: ControlState {
                control,
                my_priority,
            },
        }
    }

    pub fn act_enabled(&self) -> bool {
        match self {
            PassDisplay::Hidden => false,
            PassDisplay::Shown { act, .. } => match act.control {
                ActControl::Pass { enabled } => enabled,
                ActControl::Exit => true,
            },
        }
    }
}

/// Fires the end-of-match results once per match
#[derive(Debug, Clone, Default)]
pub struct ResultsLatch {
    fired: bool,
}

impl ResultsLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// The relative winner the first time a state carries one, `None` after
    pub fn observe(&mut self, state: &ClientState) -> Option<Seat> {
        let winner = state.winner()?;
        if self.fired {
            return None;
        }
        self.fired = true;
        Some(winner)
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}
