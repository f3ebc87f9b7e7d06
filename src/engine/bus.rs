//! Pipeline bus for async message handling.
//!
//! Messages are posted by elements (EOS from sinks, state changes from the
//! top-level container) and can be received synchronously or asynchronously
//! by any number of subscribers.

use super::State;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Messages posted on a bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    /// An element committed a state change.
    StateChanged {
        /// Element that changed state.
        source: String,
        /// Previous state.
        from: State,
        /// New state.
        to: State,
    },

    /// End of stream reached a sink.
    Eos {
        /// Sink that received EOS.
        source: String,
    },

    /// An element reported an error.
    Error {
        /// Element that reported the error.
        source: String,
        /// The error message.
        message: String,
    },

    /// Non-fatal issue.
    Warning {
        /// Element that reported the warning.
        source: String,
        /// The warning message.
        message: String,
    },
}

impl fmt::Display for BusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusMessage::StateChanged { source, from, to } => {
                write!(f, "{}: state changed {} -> {}", source, from, to)
            }
            BusMessage::Eos { source } => write!(f, "{}: end of stream", source),
            BusMessage::Error { source, message } => write!(f, "{}: error: {}", source, message),
            BusMessage::Warning { source, message } => {
                write!(f, "{}: warning: {}", source, message)
            }
        }
    }
}

/// Sending side of a bus. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Bus {
    sender: broadcast::Sender<BusMessage>,
}

impl Bus {
    /// Create a new bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Post a message.
    ///
    /// Returns the number of receivers that got it; zero receivers is fine.
    pub fn post(&self, message: BusMessage) -> usize {
        self.sender.send(message).unwrap_or(0)
    }

    /// Post an EOS message.
    pub fn post_eos(&self, source: impl Into<String>) {
        self.post(BusMessage::Eos {
            source: source.into(),
        });
    }

    /// Post an error message.
    pub fn post_error(&self, source: impl Into<String>, message: impl Into<String>) {
        self.post(BusMessage::Error {
            source: source.into(),
            message: message.into(),
        });
    }

    /// Create a receiver. Only messages posted after this call are seen.
    pub fn subscribe(&self) -> BusReceiver {
        BusReceiver {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_BUS_CAPACITY)
    }
}

/// Receiving side of a bus.
pub struct BusReceiver {
    receiver: broadcast::Receiver<BusMessage>,
}

impl BusReceiver {
    /// Receive the next message.
    ///
    /// Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "bus receiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive a message without blocking.
    pub fn try_recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Block the calling thread until a message matching `filter` arrives
    /// or `timeout` elapses, polling every `interval`.
    ///
    /// Non-matching messages are discarded.
    pub fn pop_filtered(
        &mut self,
        timeout: Duration,
        interval: Duration,
        filter: impl Fn(&BusMessage) -> bool,
    ) -> Option<BusMessage> {
        let deadline = Instant::now() + timeout;
        loop {
            while let Some(message) = self.try_recv() {
                if filter(&message) {
                    return Some(message);
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            std::thread::sleep(interval.min(deadline - now));
        }
    }

    /// Wait for EOS or an error.
    ///
    /// Returns `Ok(())` on EOS, `Err(message)` on error.
    pub async fn wait_eos(&mut self) -> Result<(), String> {
        while let Some(message) = self.recv().await {
            match message {
                BusMessage::Eos { .. } => return Ok(()),
                BusMessage::Error { source, message } => {
                    return Err(format!("Error in {}: {}", source, message));
                }
                _ => continue,
            }
        }
        Err("bus closed unexpectedly".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_recv() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        bus.post_eos("sink");
        assert_eq!(
            rx.recv().await,
            Some(BusMessage::Eos {
                source: "sink".into()
            })
        );
    }

    #[tokio::test]
    async fn test_wait_eos_error() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        bus.post_error("decoder", "bad bitstream");
        let err = rx.wait_eos().await.unwrap_err();
        assert!(err.contains("decoder"));
    }

    #[test]
    fn test_pop_filtered_skips_and_times_out() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        bus.post(BusMessage::Warning {
            source: "q".into(),
            message: "late".into(),
        });
        let got = rx.pop_filtered(Duration::from_millis(20), Duration::from_millis(1), |m| {
            matches!(m, BusMessage::Eos { .. })
        });
        assert!(got.is_none());

        bus.post_eos("sink");
        let got = rx.pop_filtered(Duration::from_millis(20), Duration::from_millis(1), |m| {
            matches!(m, BusMessage::Eos { .. })
        });
        assert!(got.is_some());
    }

    #[test]
    fn test_post_without_receivers() {
        let bus = Bus::default();
        let delivered = bus.post(BusMessage::Eos {
            source: "nobody".into(),
        });
        assert_eq!(delivered, 0);
    }
}
