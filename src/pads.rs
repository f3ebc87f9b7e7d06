//! Per-component pad bookkeeping.
//!
//! A component tracks the static pads on its boundary (normally the ghost
//! pads named `sink` and `src`) and the pads it has requested from request
//! capable children, keyed by a caller-chosen name.

use crate::engine::Pad;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Which boundary of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadSide {
    /// The input side.
    Sink,
    /// The output side.
    Src,
}

impl PadSide {
    /// Integer id of the sink side.
    pub const SINK_ID: u32 = 0;
    /// Integer id of the src side.
    pub const SRC_ID: u32 = 1;

    /// Map an integer pad id, as used by foreign bindings, to a side.
    pub fn from_raw(id: u32) -> Option<Self> {
        match id {
            Self::SINK_ID => Some(PadSide::Sink),
            Self::SRC_ID => Some(PadSide::Src),
            _ => None,
        }
    }

    /// Static pad name for this side.
    pub fn pad_name(&self) -> &'static str {
        match self {
            PadSide::Sink => "sink",
            PadSide::Src => "src",
        }
    }
}

impl fmt::Display for PadSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pad_name())
    }
}

/// Static and requested pads of one component.
#[derive(Debug, Default)]
pub struct PadRegistry {
    owner: String,
    static_sink: Option<Pad>,
    static_src: Option<Pad>,
    requested_sink: BTreeMap<String, Pad>,
    requested_src: BTreeMap<String, Pad>,
}

impl PadRegistry {
    /// Create an empty registry for the component named `owner`.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            ..Default::default()
        }
    }

    /// The static pad on `side`.
    pub fn static_pad(&self, side: PadSide) -> Option<&Pad> {
        match side {
            PadSide::Sink => self.static_sink.as_ref(),
            PadSide::Src => self.static_src.as_ref(),
        }
    }

    /// Record the static pad on `side`, returning the previous one.
    pub fn set_static_pad(&mut self, side: PadSide, pad: Pad) -> Option<Pad> {
        let slot = match side {
            PadSide::Sink => &mut self.static_sink,
            PadSide::Src => &mut self.static_src,
        };
        slot.replace(pad)
    }

    /// Forget the static pad on `side`.
    pub fn clear_static_pad(&mut self, side: PadSide) -> Option<Pad> {
        match side {
            PadSide::Sink => self.static_sink.take(),
            PadSide::Src => self.static_src.take(),
        }
    }

    fn requested_map(&self, side: PadSide) -> &BTreeMap<String, Pad> {
        match side {
            PadSide::Sink => &self.requested_sink,
            PadSide::Src => &self.requested_src,
        }
    }

    fn requested_map_mut(&mut self, side: PadSide) -> &mut BTreeMap<String, Pad> {
        match side {
            PadSide::Sink => &mut self.requested_sink,
            PadSide::Src => &mut self.requested_src,
        }
    }

    /// Record a requested pad under `name`. Keys are unique per side.
    pub fn insert_requested(&mut self, side: PadSide, name: &str, pad: Pad) -> Result<()> {
        let owner = self.owner.clone();
        let map = self.requested_map_mut(side);
        if map.contains_key(name) {
            return Err(Error::DuplicatePad {
                pad: name.to_string(),
                element: owner,
            });
        }
        map.insert(name.to_string(), pad);
        Ok(())
    }

    /// Forget the requested pad under `name`.
    pub fn remove_requested(&mut self, side: PadSide, name: &str) -> Option<Pad> {
        self.requested_map_mut(side).remove(name)
    }

    /// The requested pad under `name`.
    pub fn requested(&self, side: PadSide, name: &str) -> Option<&Pad> {
        self.requested_map(side).get(name)
    }

    /// Keys of the requested pads on `side`, sorted.
    pub fn requested_names(&self, side: PadSide) -> Vec<String> {
        self.requested_map(side).keys().cloned().collect()
    }

    /// Number of requested pads on `side`.
    pub fn requested_count(&self, side: PadSide) -> usize {
        self.requested_map(side).len()
    }
}
