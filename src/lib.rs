//! # Bintr
//!
//! A runtime for composing named, stateful media-processing components into
//! a pipeline, with per-pad interception of the data batches in flight.
//!
//! - **Components** ([`Bintr`]): containers owning child nodes, linked into
//!   an internal topology and exposed through ghost pads
//! - **Pad probes**: ordered client handlers invoked for every batch that
//!   crosses a component boundary, with continue/drop semantics
//! - **State control**: synchronous and asynchronous state changes with a
//!   bounded wait
//! - **Engine**: the in-process native element model the components drive,
//!   with scriptable transitions for simulating failures
//!
//! ## Quick Start
//!
//! ```rust
//! use bintr::prelude::*;
//!
//! let pipeline = Bintr::pipeline("pipeline");
//! let source = Bintr::source("camera", false).unwrap();
//! let sink = Bintr::fake_sink("sink").unwrap();
//! assert!(source.add_to_parent(&pipeline));
//! assert!(sink.add_to_parent(&pipeline));
//!
//! let counter = handler(|batch: &mut Batch| {
//!     batch.sequence += 1;
//!     ProbeReturn::Ok
//! });
//! assert!(sink.add_batch_meta_handler(PadSide::Sink, counter));
//!
//! assert!(pipeline.play());
//! assert_eq!(source.push(Batch::new(0)), FlowReturn::Ok);
//! assert!(pipeline.stop());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod bintr;
pub mod config;
pub mod engine;
pub mod error;
pub mod node;
pub mod observability;
pub mod pads;
pub mod probe;
pub mod registry;
pub mod state;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::batch::{Batch, BoundingBox, FrameMeta, ObjectMeta};
    pub use crate::bintr::{BinKind, Bintr, Child, MemoryType};
    pub use crate::config::RuntimeConfig;
    pub use crate::engine::{FlowReturn, ProbeReturn, State};
    pub use crate::error::{Error, Result};
    pub use crate::node::{Elementr, Node};
    pub use crate::pads::PadSide;
    pub use crate::probe::{BatchMetaHandler, HandlerRef, handler};
    pub use crate::registry::Registry;
}

pub use bintr::Bintr;
pub use error::{Error, Result};
