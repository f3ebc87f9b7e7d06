//! The built-in media engine.
//!
//! Components are thin management-plane wrappers; the engine is where pads,
//! data flow and state transitions actually happen:
//!
//! - [`Element`]: a native element with pads and a lifecycle state
//! - [`Pad`]: a directional port, optionally a ghost of a child's pad
//! - [`Transition`]: the policy deciding each state change, which makes the
//!   engine usable as a simulator for failure, no-preroll and async cases
//! - [`Bus`]: messages posted by elements to the top-level container
//!
//! # Example
//!
//! ```rust
//! use bintr::batch::Batch;
//! use bintr::engine::{Element, ElementKind, FlowReturn};
//!
//! let src = Element::new(ElementKind::Source, "src");
//! let sink = Element::new(ElementKind::FakeSink, "sink");
//! assert!(src.link(&sink));
//! assert_eq!(src.push(Batch::new(0)), FlowReturn::Ok);
//! assert_eq!(sink.batches_received(), 1);
//! ```

mod bus;
mod element;
mod event;
mod pad;
mod state;

pub use bus::{Bus, BusMessage, BusReceiver};
pub use element::{AppDataHandler, Element, ElementKind, PropertyValue};
pub use event::{Event, FlowReturn};
pub use pad::{Pad, PadDirection, PadLinkReturn, PadPresence, PadTemplate, ProbeId, ProbeReturn};
pub use state::{Immediate, Simulated, State, StateChangeReturn, Transition, TransitionOutcome};
