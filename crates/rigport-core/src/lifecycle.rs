//! [`LifecycleStateMachine`] – legal call sequencing for a sensor source.
//!
//! ```text
//!            open            start
//!   Closed ───────▶ Open ───────────▶ Running
//!          ◀───────      ◀───────────
//!            close           stop
//! ```
//!
//! Transitions are two-phase: [`LifecycleStateMachine::check`] validates a
//! transition and names its target state without changing anything, the
//! caller performs its side effects (device handshake, graph construction),
//! and only then [`LifecycleStateMachine::commit`]s.  A failed side effect
//! therefore leaves the state exactly where it was.
//!
//! # Example
//!
//! ```
//! use rigport_core::lifecycle::{LifecycleStateMachine, Transition};
//! use rigport_types::{LifecycleState, SourceError};
//!
//! let mut sm = LifecycleStateMachine::new();
//! assert_eq!(sm.apply(Transition::Start), Err(SourceError::NotOpen));
//!
//! sm.apply(Transition::Open).unwrap();
//! sm.apply(Transition::Start).unwrap();
//! assert_eq!(sm.apply(Transition::Close), Err(SourceError::StillRunning));
//! assert_eq!(sm.state(), LifecycleState::Running);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use rigport_types::{LifecycleState, SourceError};

/// A requested lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Open,
    Start,
    Stop,
    Close,
}

impl Transition {
    pub const ALL: [Transition; 4] = [
        Transition::Open,
        Transition::Start,
        Transition::Stop,
        Transition::Close,
    ];
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transition::Open => "open",
            Transition::Start => "start",
            Transition::Stop => "stop",
            Transition::Close => "close",
        };
        f.write_str(name)
    }
}

/// `Closed → Open → Running → Open → Closed`, nothing else.
#[derive(Debug, Default, Clone)]
pub struct LifecycleStateMachine {
    state: LifecycleState,
}

impl LifecycleStateMachine {
    /// A machine in [`LifecycleState::Closed`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// `true` in `Open` and `Running`.
    pub fn is_open(&self) -> bool {
        matches!(self.state, LifecycleState::Open | LifecycleState::Running)
    }

    /// `true` only in `Running`.
    pub fn is_running(&self) -> bool {
        self.state == LifecycleState::Running
    }

    /// Return the state `transition` would lead to, without changing anything.
    ///
    /// # Errors
    ///
    /// | Transition | From | Error |
    /// |---|---|---|
    /// | `Open` | `Open`, `Running` | [`SourceError::AlreadyOpen`] |
    /// | `Start` | `Closed` | [`SourceError::NotOpen`] |
    /// | `Start` | `Running` | [`SourceError::AlreadyRunning`] |
    /// | `Stop` | `Closed`, `Open` | [`SourceError::NotRunning`] |
    /// | `Close` | `Running` | [`SourceError::StillRunning`] |
    /// | `Close` | `Closed` | [`SourceError::NotOpen`] |
    pub fn check(&self, transition: Transition) -> Result<LifecycleState, SourceError> {
        use LifecycleState::*;
        match (transition, self.state) {
            (Transition::Open, Closed) => Ok(Open),
            (Transition::Open, Open | Running) => Err(SourceError::AlreadyOpen),

            (Transition::Start, Open) => Ok(Running),
            (Transition::Start, Closed) => Err(SourceError::NotOpen),
            (Transition::Start, Running) => Err(SourceError::AlreadyRunning),

            (Transition::Stop, Running) => Ok(Open),
            (Transition::Stop, Closed | Open) => Err(SourceError::NotRunning),

            (Transition::Close, Open) => Ok(Closed),
            (Transition::Close, Running) => Err(SourceError::StillRunning),
            (Transition::Close, Closed) => Err(SourceError::NotOpen),
        }
    }

    /// Re-validate `transition` and move to its target state.
    pub fn commit(&mut self, transition: Transition) -> Result<LifecycleState, SourceError> {
        let next = self.check(transition)?;
        self.state = next;
        Ok(next)
    }

    /// [`check`](Self::check) and [`commit`](Self::commit) in one step, for
    /// transitions with no side effects.
    pub fn apply(&mut self, transition: Transition) -> Result<LifecycleState, SourceError> {
        self.commit(transition)
    }
}

/// Lock-free mirror of a [`LifecycleState`] for readers that must not wait
/// on the transition lock.
#[derive(Debug, Default)]
pub(crate) struct AtomicLifecycleState(AtomicU8);

impl AtomicLifecycleState {
    pub(crate) fn load(&self) -> LifecycleState {
        match self.0.load(Ordering::Acquire) {
            1 => LifecycleState::Open,
            2 => LifecycleState::Running,
            _ => LifecycleState::Closed,
        }
    }

    pub(crate) fn store(&self, state: LifecycleState) {
        let raw = match state {
            LifecycleState::Closed => 0,
            LifecycleState::Open => 1,
            LifecycleState::Running => 2,
        };
        self.0.store(raw, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference model: the legal transition table, nothing more.
    fn legal(state: LifecycleState, transition: Transition) -> Option<LifecycleState> {
        use LifecycleState::*;
        match (state, transition) {
            (Closed, Transition::Open) => Some(Open),
            (Open, Transition::Start) => Some(Running),
            (Running, Transition::Stop) => Some(Open),
            (Open, Transition::Close) => Some(Closed),
            _ => None,
        }
    }

    fn expected_error(state: LifecycleState, transition: Transition) -> SourceError {
        use LifecycleState::*;
        match (transition, state) {
            (Transition::Open, _) => SourceError::AlreadyOpen,
            (Transition::Start, Closed) => SourceError::NotOpen,
            (Transition::Start, _) => SourceError::AlreadyRunning,
            (Transition::Stop, _) => SourceError::NotRunning,
            (Transition::Close, Running) => SourceError::StillRunning,
            (Transition::Close, _) => SourceError::NotOpen,
        }
    }

    fn sequences(len: usize) -> Vec<Vec<Transition>> {
        let mut out = vec![Vec::new()];
        for _ in 0..len {
            out = out
                .into_iter()
                .flat_map(|prefix| {
                    Transition::ALL.into_iter().map(move |t| {
                        let mut next = prefix.clone();
                        next.push(t);
                        next
                    })
                })
                .collect();
        }
        out
    }

    #[test]
    fn starts_closed() {
        let sm = LifecycleStateMachine::new();
        assert_eq!(sm.state(), LifecycleState::Closed);
        assert!(!sm.is_open());
        assert!(!sm.is_running());
    }

    #[test]
    fn full_cycle() {
        let mut sm = LifecycleStateMachine::new();
        assert_eq!(sm.apply(Transition::Open), Ok(LifecycleState::Open));
        assert!(sm.is_open() && !sm.is_running());
        assert_eq!(sm.apply(Transition::Start), Ok(LifecycleState::Running));
        assert!(sm.is_open() && sm.is_running());
        assert_eq!(sm.apply(Transition::Stop), Ok(LifecycleState::Open));
        assert_eq!(sm.apply(Transition::Close), Ok(LifecycleState::Closed));
        assert!(!sm.is_open());
    }

    #[test]
    fn check_does_not_mutate() {
        let sm = LifecycleStateMachine::new();
        assert_eq!(sm.check(Transition::Open), Ok(LifecycleState::Open));
        assert_eq!(sm.state(), LifecycleState::Closed);
    }

    #[test]
    fn every_sequence_matches_the_legal_model() {
        for len in 1..=5 {
            for seq in sequences(len) {
                let mut sm = LifecycleStateMachine::new();
                let mut model = LifecycleState::Closed;
                for &t in &seq {
                    let result = sm.apply(t);
                    match legal(model, t) {
                        Some(next) => {
                            assert_eq!(result, Ok(next), "{seq:?}");
                            model = next;
                        }
                        None => {
                            assert_eq!(result, Err(expected_error(model, t)), "{seq:?}");
                        }
                    }
                    assert_eq!(sm.state(), model, "{seq:?}");
                }
            }
        }
    }

    #[test]
    fn atomic_mirror_round_trips_every_state() {
        let mirror = AtomicLifecycleState::default();
        assert_eq!(mirror.load(), LifecycleState::Closed);
        for state in [
            LifecycleState::Open,
            LifecycleState::Running,
            LifecycleState::Closed,
        ] {
            mirror.store(state);
            assert_eq!(mirror.load(), state);
        }
    }
}
