//! Element lifecycle states and transition policies.

use std::fmt;
use std::time::Duration;

/// Lifecycle state of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum State {
    /// No pending state (only meaningful as the `pending` half of a query).
    VoidPending,
    /// Initial state; no resources held.
    #[default]
    Null,
    /// Resources allocated, not processing.
    Ready,
    /// Pre-rolled and ready to process, clock stopped.
    Paused,
    /// Data is flowing.
    Playing,
}

impl State {
    /// Whether data may be in flight in this state.
    pub fn is_active(&self) -> bool {
        matches!(self, State::Paused | State::Playing)
    }

    /// Name used in logs and bus messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::VoidPending => "VOID_PENDING",
            State::Null => "NULL",
            State::Ready => "READY",
            State::Paused => "PAUSED",
            State::Playing => "PLAYING",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of requesting a state change from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChangeReturn {
    /// The state change completed.
    Success,
    /// The state change failed.
    Failure,
    /// The state change will complete later.
    Async,
    /// Completed, but the element cannot pre-roll (live source).
    NoPreroll,
}

impl StateChangeReturn {
    /// Combine the result of a container with one of its children.
    ///
    /// Failure dominates, then Async, then NoPreroll.
    pub fn combine(self, other: StateChangeReturn) -> StateChangeReturn {
        use StateChangeReturn::*;
        match (self, other) {
            (Failure, _) | (_, Failure) => Failure,
            (Async, _) | (_, Async) => Async,
            (NoPreroll, _) | (_, NoPreroll) => NoPreroll,
            _ => Success,
        }
    }
}

/// What a [`Transition`] policy decides for one state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Commit immediately.
    Success,
    /// Refuse the change.
    Failure,
    /// Commit immediately but report that pre-roll is not possible.
    NoPreroll,
    /// Settle on an engine worker thread after `after`.
    Async {
        /// Delay before the change settles.
        after: Duration,
        /// Whether it settles successfully.
        succeed: bool,
    },
    /// Go asynchronous and never settle.
    Stall,
}

/// Policy deciding the outcome of each state change of an element.
///
/// Real engines decide this from their internals; the built-in engine
/// delegates to a policy so callers can simulate any engine behaviour.
pub trait Transition: Send + Sync + fmt::Debug {
    /// Decide the outcome of changing `element` from `from` to `to`.
    fn begin(&self, element: &str, from: State, to: State) -> TransitionOutcome;
}

/// Every transition succeeds immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Transition for Immediate {
    fn begin(&self, _element: &str, _from: State, _to: State) -> TransitionOutcome {
        TransitionOutcome::Success
    }
}

/// Scripted transition behaviour for tests and dry runs.
///
/// The outcome applies to transitions towards `target` (or to all
/// transitions when no target is set); every other transition succeeds.
#[derive(Debug, Clone, Copy)]
pub struct Simulated {
    target: Option<State>,
    outcome: TransitionOutcome,
}

impl Simulated {
    /// Apply `outcome` to every transition.
    pub fn always(outcome: TransitionOutcome) -> Self {
        Self {
            target: None,
            outcome,
        }
    }

    /// Apply `outcome` only to transitions towards `target`.
    pub fn on(target: State, outcome: TransitionOutcome) -> Self {
        Self {
            target: Some(target),
            outcome,
        }
    }

    /// Fail transitions towards `target`.
    pub fn fail_on(target: State) -> Self {
        Self::on(target, TransitionOutcome::Failure)
    }

    /// Settle transitions towards `target` asynchronously after `after`.
    pub fn async_on(target: State, after: Duration, succeed: bool) -> Self {
        Self::on(target, TransitionOutcome::Async { after, succeed })
    }

    /// Never settle transitions towards `target`.
    pub fn stall_on(target: State) -> Self {
        Self::on(target, TransitionOutcome::Stall)
    }
}

impl Transition for Simulated {
    fn begin(&self, _element: &str, _from: State, to: State) -> TransitionOutcome {
        match self.target {
            Some(target) if target != to => TransitionOutcome::Success,
            _ => self.outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_precedence() {
        use StateChangeReturn::*;
        assert_eq!(Success.combine(Async), Async);
        assert_eq!(Async.combine(Failure), Failure);
        assert_eq!(NoPreroll.combine(Success), NoPreroll);
        assert_eq!(NoPreroll.combine(Async), Async);
        assert_eq!(Success.combine(Success), Success);
    }

    #[test]
    fn test_simulated_targets_one_state() {
        let sim = Simulated::fail_on(State::Playing);
        assert_eq!(
            sim.begin("e", State::Paused, State::Playing),
            TransitionOutcome::Failure
        );
        assert_eq!(
            sim.begin("e", State::Null, State::Ready),
            TransitionOutcome::Success
        );
    }

    #[test]
    fn test_state_ordering() {
        assert!(State::Null < State::Ready);
        assert!(State::Paused < State::Playing);
        assert!(State::Playing.is_active());
        assert!(!State::Ready.is_active());
        assert_eq!(State::Paused.to_string(), "PAUSED");
    }
}
