//! Lifecycle state control.
//!
//! [`StateController`] turns the engine's four-way state-change result into
//! a yes/no answer:
//!
//! | Engine result | Outcome |
//! |---------------|---------|
//! | `Success` | `true` |
//! | `Failure` | `false`, logged |
//! | `NoPreroll` | `false`, logged |
//! | `Async` | wait up to the configured timeout, polling for the final result |
//!
//! A timed-out wait returns `false`. The in-flight transition is not
//! cancelled; callers must not issue a second `set_state` for the same
//! component until the first has returned.

use crate::config::RuntimeConfig;
use crate::engine::{Element, State, StateChangeReturn};
use crate::observability::{record_state_change, trace_state_request};
use std::time::{Duration, Instant};

/// Drives elements through state changes with a bounded wait.
#[derive(Debug, Clone, Default)]
pub struct StateController {
    config: RuntimeConfig,
}

impl StateController {
    /// Create a controller using the timeouts in `config`.
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// Timeouts in use.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Request `target` on `element` and wait for it to settle.
    pub fn set_state(&self, element: &Element, target: State) -> bool {
        let name = element.name();
        let from = element.current_state();
        trace_state_request(name, from.as_str(), target.as_str());

        let start = Instant::now();
        let ok = match element.set_state(target) {
            StateChangeReturn::Success => {
                tracing::info!(component = %name, state = %target, "state change completed synchronously");
                true
            }
            StateChangeReturn::Failure => {
                tracing::error!(component = %name, state = %target, "failed to change state");
                false
            }
            StateChangeReturn::NoPreroll => {
                tracing::error!(
                    component = %name,
                    state = %target,
                    "state change succeeded but element cannot preroll"
                );
                false
            }
            StateChangeReturn::Async => {
                tracing::info!(
                    component = %name,
                    state = %target,
                    timeout_ms = self.config.state_change_timeout_ms,
                    "state change will complete asynchronously"
                );
                self.wait_async(element, target)
            }
        };
        record_state_change(name, target.as_str(), ok, start.elapsed());
        ok
    }

    fn wait_async(&self, element: &Element, target: State) -> bool {
        let deadline = Instant::now() + self.config.state_change_timeout();
        let interval = self.config.state_poll_interval();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let (result, current, pending) = element.get_state(interval.min(remaining));
            match result {
                StateChangeReturn::Success | StateChangeReturn::NoPreroll => {
                    if current == target {
                        tracing::info!(component = %element.name(), state = %target, "asynchronous state change completed");
                        return true;
                    }
                    tracing::error!(
                        component = %element.name(),
                        expected = %target,
                        actual = %current,
                        "state settled on an unexpected state"
                    );
                    return false;
                }
                StateChangeReturn::Failure => {
                    tracing::error!(component = %element.name(), state = %target, "asynchronous state change failed");
                    return false;
                }
                StateChangeReturn::Async => {
                    if remaining.is_zero() {
                        tracing::error!(
                            component = %element.name(),
                            state = %target,
                            current = %current,
                            pending = %pending,
                            "timed out waiting for state change"
                        );
                        return false;
                    }
                }
            }
        }
    }

    /// Current committed state of `element`.
    pub fn state(&self, element: &Element) -> State {
        element.current_state()
    }

    /// Block until `element` has committed `target`, up to the state-change
    /// timeout.
    pub fn wait_for(&self, element: &Element, target: State) -> bool {
        self.wait_for_timeout(element, target, self.config.state_change_timeout())
    }

    /// [`wait_for`](Self::wait_for) with an explicit timeout.
    pub fn wait_for_timeout(&self, element: &Element, target: State, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let interval = self.config.state_poll_interval();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let (result, current, _) = element.get_state(interval.min(remaining));
            if current == target {
                return true;
            }
            if result == StateChangeReturn::Failure || remaining.is_zero() {
                return false;
            }
            if result != StateChangeReturn::Async {
                // settled elsewhere; keep polling in case another request lands
                std::thread::sleep(interval.min(remaining));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ElementKind, Simulated, TransitionOutcome};
    use std::sync::Arc;

    fn controller() -> StateController {
        StateController::new(RuntimeConfig::fast())
    }

    #[test]
    fn test_immediate_success() {
        let element = Element::new(ElementKind::Queue, "q");
        assert!(controller().set_state(&element, State::Playing));
        assert_eq!(element.current_state(), State::Playing);
    }

    #[test]
    fn test_failure_keeps_state() {
        let element = Element::new(ElementKind::Queue, "q");
        element.set_transition(Arc::new(Simulated::fail_on(State::Playing)));
        assert!(!controller().set_state(&element, State::Playing));
        assert_ne!(element.current_state(), State::Playing);
    }

    #[test]
    fn test_no_preroll_is_false() {
        let element = Element::new(ElementKind::Source, "live");
        element.set_transition(Arc::new(Simulated::on(
            State::Paused,
            TransitionOutcome::NoPreroll,
        )));
        assert!(!controller().set_state(&element, State::Paused));
    }

    #[test]
    fn test_async_success() {
        let element = Element::new(ElementKind::Queue, "q");
        element.set_transition(Arc::new(Simulated::async_on(
            State::Playing,
            Duration::from_millis(20),
            true,
        )));
        assert!(controller().set_state(&element, State::Playing));
        assert_eq!(element.current_state(), State::Playing);
    }

    #[test]
    fn test_async_failure() {
        let element = Element::new(ElementKind::Queue, "q");
        element.set_transition(Arc::new(Simulated::async_on(
            State::Playing,
            Duration::from_millis(20),
            false,
        )));
        assert!(!controller().set_state(&element, State::Playing));
        assert_ne!(element.current_state(), State::Playing);
    }

    #[test]
    fn test_async_timeout() {
        let element = Element::new(ElementKind::Queue, "q");
        element.set_transition(Arc::new(Simulated::stall_on(State::Playing)));
        let controller = StateController::new(
            RuntimeConfig::fast().with_state_change_timeout(Duration::from_millis(50)),
        );
        let start = Instant::now();
        assert!(!controller.set_state(&element, State::Playing));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_ne!(controller.state(&element), State::Playing);
    }

    #[test]
    fn test_wait_for() {
        let element = Element::new(ElementKind::Queue, "q");
        let controller = controller();
        assert!(controller.set_state(&element, State::Paused));
        assert!(controller.wait_for(&element, State::Paused));
        assert!(!controller.wait_for_timeout(&element, State::Playing, Duration::from_millis(10)));
    }
}
