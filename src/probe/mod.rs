//! Pad probes and the batch-meta handler registry.
//!
//! A [`PadProbe`] sits on one boundary pad of a component. Every batch that
//! crosses the pad is handed to the probe's handlers, in registration order,
//! on the thread that delivers the batch.
//!
//! # Dispatch order
//!
//! 1. The [`BatchDump`] writer, when enabled.
//! 2. Client handlers, oldest registration first.
//!
//! The first handler returning [`ProbeReturn::Drop`] ends dispatch: handlers
//! registered after it do not see the batch, and the batch is removed from
//! the stream. Registration order therefore doubles as priority. Whether
//! that coupling is wanted is an open point; it is kept as is.
//!
//! # Locking
//!
//! The handler list is locked for the whole of a dispatch. Removing a
//! handler blocks until any in-flight dispatch finishes, so a handler is
//! never invoked after its removal returns. A handler must not add or remove
//! handlers on the probe that is invoking it.

mod dump;
mod handler;

pub use dump::BatchDump;
pub use handler::{BatchMetaHandler, HandlerRef, handler, same_handler};

use crate::batch::Batch;
use crate::engine::{Pad, ProbeId, ProbeReturn};
use crate::observability::ProbeMetrics;
use smallvec::SmallVec;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

struct ProbeShared {
    name: String,
    handlers: Mutex<SmallVec<[HandlerRef; 4]>>,
    dump: Mutex<Option<BatchDump>>,
    metrics: ProbeMetrics,
}

impl ProbeShared {
    fn dispatch(&self, batch: &mut Batch) -> ProbeReturn {
        let start = Instant::now();

        if let Some(dump) = self.dump.lock().unwrap().as_mut() {
            if let Err(err) = dump.write(&self.name, batch) {
                tracing::warn!(probe = %self.name, error = %err, "batch dump write failed");
            }
        }

        let handlers = self.handlers.lock().unwrap();
        for (index, handler) in handlers.iter().enumerate() {
            if handler.handle(batch) == ProbeReturn::Drop {
                tracing::trace!(
                    probe = %self.name,
                    sequence = batch.sequence,
                    handler = index,
                    skipped = handlers.len() - index - 1,
                    "batch dropped by handler"
                );
                self.metrics.record_dropped();
                self.metrics.record_probed(start.elapsed());
                return ProbeReturn::Drop;
            }
        }
        self.metrics.record_probed(start.elapsed());
        ProbeReturn::Ok
    }
}

/// Ordered registry of batch-meta handlers attached to one pad.
pub struct PadProbe {
    shared: Arc<ProbeShared>,
    attachment: Mutex<Option<(Pad, ProbeId)>>,
}

impl PadProbe {
    /// Create an unattached probe.
    ///
    /// Handlers can be registered right away; they start seeing batches once
    /// the probe is attached to a pad.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            shared: Arc::new(ProbeShared {
                metrics: ProbeMetrics::new(&name),
                name,
                handlers: Mutex::new(SmallVec::new()),
                dump: Mutex::new(None),
            }),
            attachment: Mutex::new(None),
        }
    }

    /// Create a probe and attach it to `pad`.
    pub fn on_pad(name: impl Into<String>, pad: &Pad) -> Self {
        let probe = Self::new(name);
        probe.attach(pad);
        probe
    }

    /// Probe name, `<component>-<side>-pad-probe` for component probes.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Attach to `pad`, moving off any pad attached before.
    pub fn attach(&self, pad: &Pad) {
        let mut attachment = self.attachment.lock().unwrap();
        if let Some((old, id)) = attachment.take() {
            old.remove_probe(id);
        }
        let shared = Arc::clone(&self.shared);
        let id = pad.add_buffer_probe(move |_, batch| shared.dispatch(batch));
        tracing::debug!(probe = %self.shared.name, pad = %pad.name(), "probe attached");
        *attachment = Some((pad.clone(), id));
    }

    /// Detach from the current pad. Returns false if not attached.
    pub fn detach(&self) -> bool {
        match self.attachment.lock().unwrap().take() {
            Some((pad, id)) => pad.remove_probe(id),
            None => false,
        }
    }

    /// The pad this probe is attached to.
    pub fn pad(&self) -> Option<Pad> {
        self.attachment
            .lock()
            .unwrap()
            .as_ref()
            .map(|(pad, _)| pad.clone())
    }

    /// Register `handler` after all existing handlers.
    ///
    /// Returns false, with no effect, if the handler is already registered.
    pub fn add_batch_meta_handler(&self, handler: HandlerRef) -> bool {
        let mut handlers = self.shared.handlers.lock().unwrap();
        if handlers.iter().any(|h| same_handler(h, &handler)) {
            tracing::error!(probe = %self.shared.name, "batch-meta handler is not unique");
            return false;
        }
        handlers.push(handler);
        tracing::debug!(probe = %self.shared.name, count = handlers.len(), "batch-meta handler added");
        true
    }

    /// Unregister `handler`.
    ///
    /// Returns false if it was not registered. Once this returns, the
    /// handler is not running and will not be invoked again.
    pub fn remove_batch_meta_handler(&self, handler: &HandlerRef) -> bool {
        let mut handlers = self.shared.handlers.lock().unwrap();
        let Some(index) = handlers.iter().position(|h| same_handler(h, handler)) else {
            tracing::error!(probe = %self.shared.name, "batch-meta handler was not found");
            return false;
        };
        handlers.remove(index);
        tracing::debug!(probe = %self.shared.name, count = handlers.len(), "batch-meta handler removed");
        true
    }

    /// Whether `handler` is registered.
    pub fn contains(&self, handler: &HandlerRef) -> bool {
        self.shared
            .handlers
            .lock()
            .unwrap()
            .iter()
            .any(|h| same_handler(h, handler))
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.shared.handlers.lock().unwrap().len()
    }

    /// Enable or disable per-batch dump output. Returns the previous writer.
    pub fn set_dump(&self, dump: Option<BatchDump>) -> Option<BatchDump> {
        match &dump {
            Some(d) => tracing::info!(probe = %self.shared.name, path = %d.path().display(), "batch dump enabled"),
            None => tracing::info!(probe = %self.shared.name, "batch dump disabled"),
        }
        std::mem::replace(&mut *self.shared.dump.lock().unwrap(), dump)
    }

    /// Whether per-batch dump output is enabled.
    pub fn is_dumping(&self) -> bool {
        self.shared.dump.lock().unwrap().is_some()
    }

    /// Run the dispatch sequence for `batch` without a pad.
    pub fn dispatch(&self, batch: &mut Batch) -> ProbeReturn {
        self.shared.dispatch(batch)
    }
}

impl Drop for PadProbe {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for PadProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PadProbe")
            .field("name", &self.shared.name)
            .field("handlers", &self.handler_count())
            .field("attached", &self.pad().is_some())
            .field("dumping", &self.is_dumping())
            .finish()
    }
}
