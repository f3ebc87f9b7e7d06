//! Events and flow results on the data plane.

use std::fmt;

/// Out-of-band events that travel across pads alongside batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Start of a new stream.
    StreamStart {
        /// Stream identifier.
        stream_id: String,
    },
    /// End of stream; no more batches follow.
    Eos,
    /// Begin discarding in-flight data.
    FlushStart,
    /// Resume after a flush.
    FlushStop,
    /// Application-defined event.
    Custom {
        /// Event name.
        name: String,
    },
}

impl Event {
    /// Whether this is end-of-stream.
    pub fn is_eos(&self) -> bool {
        matches!(self, Event::Eos)
    }

    /// Short event name for logs.
    pub fn name(&self) -> &str {
        match self {
            Event::StreamStart { .. } => "stream-start",
            Event::Eos => "eos",
            Event::FlushStart => "flush-start",
            Event::FlushStop => "flush-stop",
            Event::Custom { name } => name,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of pushing a batch across a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowReturn {
    /// Delivered.
    Ok,
    /// Dropped by a probe before delivery.
    Dropped,
    /// The pad has no peer.
    NotLinked,
    /// Downstream is at end of stream.
    Eos,
    /// Downstream failed.
    Error,
}

impl FlowReturn {
    /// Whether upstream may keep pushing.
    pub fn is_ok(&self) -> bool {
        matches!(self, FlowReturn::Ok | FlowReturn::Dropped)
    }
}
