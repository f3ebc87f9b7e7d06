//! Pad abstraction for element inputs and outputs.
//!
//! Pads are the connection points of elements. A sink pad receives batches
//! from its peer, a src pad pushes them to its peer. Ghost pads live on a
//! container and forward to a pad of one of its children, hiding the
//! container's internal topology from siblings.
//!
//! Probes attached to a pad run on whatever thread pushes through it, in the
//! order they were attached.

use super::event::{Event, FlowReturn};
use crate::batch::Batch;
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Direction of a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadDirection {
    /// Receives batches from upstream.
    Sink,
    /// Sends batches downstream.
    Src,
}

/// Whether a pad is always present or created on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadPresence {
    /// Pad is always present on the element.
    Always,
    /// Pad is created when requested (e.g. tee outputs).
    Request,
}

/// Template for creating pads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadTemplate {
    /// Name pattern for this pad (e.g. "src", "src_%u").
    pub name: String,
    /// Direction of pads created from this template.
    pub direction: PadDirection,
    /// Presence of pads created from this template.
    pub presence: PadPresence,
}

impl PadTemplate {
    /// Create a new pad template.
    pub fn new(name: impl Into<String>, direction: PadDirection, presence: PadPresence) -> Self {
        Self {
            name: name.into(),
            direction,
            presence,
        }
    }

    /// Template for request src pads named `src_%u`.
    pub fn request_src() -> Self {
        Self::new("src_%u", PadDirection::Src, PadPresence::Request)
    }

    /// Template for request sink pads named `sink_%u`.
    pub fn request_sink() -> Self {
        Self::new("sink_%u", PadDirection::Sink, PadPresence::Request)
    }

    /// Concrete pad name for the `index`-th request.
    pub fn instance_name(&self, index: u32) -> String {
        self.name.replace("%u", &index.to_string())
    }
}

/// Value returned by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeReturn {
    /// Let the batch or event pass.
    Ok,
    /// Drop the batch or event; later probes on this pad do not see it.
    Drop,
}

/// Identifier of a probe attached to a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeId(u64);

/// Result of linking two pads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadLinkReturn {
    /// Link succeeded.
    Ok,
    /// Pads have incompatible directions.
    WrongDirection,
    /// One of the pads already has a peer.
    WasLinked,
}

type BufferProbeFn = Arc<dyn Fn(&Pad, &mut Batch) -> ProbeReturn + Send + Sync>;
type EventProbeFn = Arc<dyn Fn(&Pad, &Event) -> ProbeReturn + Send + Sync>;
pub(crate) type ChainFn = Arc<dyn Fn(&Pad, Batch) -> FlowReturn + Send + Sync>;
pub(crate) type EventFn = Arc<dyn Fn(&Pad, Event) -> bool + Send + Sync>;

#[derive(Clone)]
enum Probe {
    Buffer(BufferProbeFn),
    Event(EventProbeFn),
}

static NEXT_PROBE_ID: AtomicU64 = AtomicU64::new(1);

struct PadInner {
    name: String,
    direction: PadDirection,
    presence: PadPresence,
    owner: Mutex<String>,
    peer: Mutex<Weak<PadInner>>,
    /// Set on ghost pads: the child pad this pad forwards to.
    target: Option<Pad>,
    /// Set on a pad that is the target of a ghost pad.
    ghost: Mutex<Weak<PadInner>>,
    probes: Mutex<SmallVec<[(ProbeId, Probe); 2]>>,
    chain: Mutex<Option<ChainFn>>,
    event: Mutex<Option<EventFn>>,
}

/// A pad instance. Cheap to clone; clones refer to the same pad.
#[derive(Clone)]
pub struct Pad {
    inner: Arc<PadInner>,
}

impl Pad {
    fn build(
        name: impl Into<String>,
        direction: PadDirection,
        presence: PadPresence,
        target: Option<Pad>,
    ) -> Self {
        Self {
            inner: Arc::new(PadInner {
                name: name.into(),
                direction,
                presence,
                owner: Mutex::new(String::new()),
                peer: Mutex::new(Weak::new()),
                target,
                ghost: Mutex::new(Weak::new()),
                probes: Mutex::new(SmallVec::new()),
                chain: Mutex::new(None),
                event: Mutex::new(None),
            }),
        }
    }

    /// Create a new always-present pad.
    pub fn new(name: impl Into<String>, direction: PadDirection) -> Self {
        Self::build(name, direction, PadPresence::Always, None)
    }

    /// Create a pad from a template.
    pub fn from_template(template: &PadTemplate, name: impl Into<String>) -> Self {
        Self::build(name, template.direction, template.presence, None)
    }

    /// Create a standard input pad named "sink".
    pub fn sink() -> Self {
        Self::new("sink", PadDirection::Sink)
    }

    /// Create a standard output pad named "src".
    pub fn src() -> Self {
        Self::new("src", PadDirection::Src)
    }

    /// Create a ghost pad forwarding to `target`.
    ///
    /// The ghost takes the direction of its target.
    pub fn ghost(name: impl Into<String>, target: &Pad) -> Self {
        let pad = Self::build(
            name,
            target.direction(),
            PadPresence::Always,
            Some(target.clone()),
        );
        *target.inner.ghost.lock().unwrap() = Arc::downgrade(&pad.inner);
        pad
    }

    /// Get the pad's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the pad's direction.
    pub fn direction(&self) -> PadDirection {
        self.inner.direction
    }

    /// Get the pad's presence.
    pub fn presence(&self) -> PadPresence {
        self.inner.presence
    }

    /// Check if this is a sink pad.
    pub fn is_sink(&self) -> bool {
        self.inner.direction == PadDirection::Sink
    }

    /// Check if this is a src pad.
    pub fn is_src(&self) -> bool {
        self.inner.direction == PadDirection::Src
    }

    /// Name of the element that owns this pad.
    pub fn owner(&self) -> String {
        self.inner.owner.lock().unwrap().clone()
    }

    pub(crate) fn set_owner(&self, owner: &str) {
        *self.inner.owner.lock().unwrap() = owner.to_string();
    }

    /// The child pad a ghost pad forwards to.
    pub fn target(&self) -> Option<&Pad> {
        self.inner.target.as_ref()
    }

    /// Whether this is a ghost pad.
    pub fn is_ghost(&self) -> bool {
        self.inner.target.is_some()
    }

    /// The peer pad, if linked.
    pub fn peer(&self) -> Option<Pad> {
        self.inner
            .peer
            .lock()
            .unwrap()
            .upgrade()
            .map(|inner| Pad { inner })
    }

    /// Whether this pad has a peer.
    pub fn is_linked(&self) -> bool {
        self.peer().is_some()
    }

    /// Link this src pad to `sink`.
    pub fn link(&self, sink: &Pad) -> PadLinkReturn {
        if !self.is_src() || !sink.is_sink() {
            return PadLinkReturn::WrongDirection;
        }
        if self.is_linked() || sink.is_linked() {
            return PadLinkReturn::WasLinked;
        }
        *self.inner.peer.lock().unwrap() = Arc::downgrade(&sink.inner);
        *sink.inner.peer.lock().unwrap() = Arc::downgrade(&self.inner);
        tracing::trace!(
            src = %format_args!("{}:{}", self.owner(), self.name()),
            sink = %format_args!("{}:{}", sink.owner(), sink.name()),
            "pads linked"
        );
        PadLinkReturn::Ok
    }

    /// Unlink this pad from `peer`. Returns false if they were not linked.
    pub fn unlink(&self, peer: &Pad) -> bool {
        match self.peer() {
            Some(current) if current == *peer => {
                *self.inner.peer.lock().unwrap() = Weak::new();
                *peer.inner.peer.lock().unwrap() = Weak::new();
                true
            }
            _ => false,
        }
    }

    /// Attach a probe invoked for every batch crossing this pad.
    pub fn add_buffer_probe<F>(&self, probe: F) -> ProbeId
    where
        F: Fn(&Pad, &mut Batch) -> ProbeReturn + Send + Sync + 'static,
    {
        self.add_probe(Probe::Buffer(Arc::new(probe)))
    }

    /// Attach a probe invoked for every event crossing this pad.
    pub fn add_event_probe<F>(&self, probe: F) -> ProbeId
    where
        F: Fn(&Pad, &Event) -> ProbeReturn + Send + Sync + 'static,
    {
        self.add_probe(Probe::Event(Arc::new(probe)))
    }

    fn add_probe(&self, probe: Probe) -> ProbeId {
        let id = ProbeId(NEXT_PROBE_ID.fetch_add(1, Ordering::Relaxed));
        self.inner.probes.lock().unwrap().push((id, probe));
        id
    }

    /// Detach a probe. Returns false if it was not attached.
    pub fn remove_probe(&self, id: ProbeId) -> bool {
        let mut probes = self.inner.probes.lock().unwrap();
        let before = probes.len();
        probes.retain(|(probe_id, _)| *probe_id != id);
        probes.len() != before
    }

    /// Number of attached probes.
    pub fn probe_count(&self) -> usize {
        self.inner.probes.lock().unwrap().len()
    }

    pub(crate) fn set_chain_function(&self, chain: ChainFn) {
        *self.inner.chain.lock().unwrap() = Some(chain);
    }

    pub(crate) fn set_event_function(&self, event: EventFn) {
        *self.inner.event.lock().unwrap() = Some(event);
    }

    /// Stop the target of this ghost pad from forwarding out through it.
    pub fn release_target(&self) {
        let Some(target) = self.target() else {
            return;
        };
        let mut ghost = target.inner.ghost.lock().unwrap();
        if std::ptr::eq(ghost.as_ptr(), Arc::as_ptr(&self.inner)) {
            *ghost = Weak::new();
        }
    }

    fn ghost_proxy(&self) -> Option<Pad> {
        self.inner
            .ghost
            .lock()
            .unwrap()
            .upgrade()
            .map(|inner| Pad { inner })
    }

    fn buffer_probes(&self) -> SmallVec<[BufferProbeFn; 4]> {
        self.inner
            .probes
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, probe)| match probe {
                Probe::Buffer(f) => Some(f.clone()),
                Probe::Event(_) => None,
            })
            .collect()
    }

    fn event_probes(&self) -> SmallVec<[EventProbeFn; 4]> {
        self.inner
            .probes
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, probe)| match probe {
                Probe::Event(f) => Some(f.clone()),
                Probe::Buffer(_) => None,
            })
            .collect()
    }

    /// Push a batch across this pad.
    ///
    /// Runs the pad's buffer probes in attach order; the first probe that
    /// returns [`ProbeReturn::Drop`] ends delivery. Otherwise the batch goes
    /// to the ghost target (sink ghosts), the peer (src pads), or the owning
    /// element's chain function (sink pads).
    pub fn push(&self, mut batch: Batch) -> FlowReturn {
        for probe in self.buffer_probes() {
            if probe(self, &mut batch) == ProbeReturn::Drop {
                return FlowReturn::Dropped;
            }
        }

        match self.direction() {
            PadDirection::Sink => {
                if let Some(target) = self.target() {
                    return target.push(batch);
                }
                let chain = self.inner.chain.lock().unwrap().clone();
                match chain {
                    Some(chain) => chain(self, batch),
                    None => FlowReturn::Ok,
                }
            }
            PadDirection::Src => {
                if let Some(peer) = self.peer() {
                    peer.push(batch)
                } else if let Some(ghost) = self.ghost_proxy() {
                    ghost.push(batch)
                } else {
                    FlowReturn::NotLinked
                }
            }
        }
    }

    /// Send an event across this pad in the direction of data flow.
    ///
    /// Returns false when the event could not be delivered.
    pub fn send_event(&self, event: Event) -> bool {
        for probe in self.event_probes() {
            if probe(self, &event) == ProbeReturn::Drop {
                return true;
            }
        }

        match self.direction() {
            PadDirection::Sink => {
                if let Some(target) = self.target() {
                    return target.send_event(event);
                }
                let handler = self.inner.event.lock().unwrap().clone();
                match handler {
                    Some(handler) => handler(self, event),
                    None => true,
                }
            }
            PadDirection::Src => {
                if let Some(peer) = self.peer() {
                    peer.send_event(event)
                } else if let Some(ghost) = self.ghost_proxy() {
                    ghost.send_event(event)
                } else {
                    false
                }
            }
        }
    }
}

impl PartialEq for Pad {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Pad {}

impl fmt::Debug for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pad")
            .field("name", &self.inner.name)
            .field("owner", &self.owner())
            .field("direction", &self.inner.direction)
            .field("ghost", &self.is_ghost())
            .field("linked", &self.is_linked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_pad_creation() {
        let input = Pad::sink();
        assert_eq!(input.name(), "sink");
        assert!(input.is_sink());
        assert!(!input.is_src());

        let output = Pad::src();
        assert_eq!(output.name(), "src");
        assert!(output.is_src());
    }

    #[test]
    fn test_template_instance_name() {
        assert_eq!(PadTemplate::request_src().instance_name(3), "src_3");
        assert_eq!(PadTemplate::request_sink().instance_name(0), "sink_0");
    }

    #[test]
    fn test_link_rules() {
        let src = Pad::src();
        let sink = Pad::sink();
        assert_eq!(sink.link(&src), PadLinkReturn::WrongDirection);
        assert_eq!(src.link(&sink), PadLinkReturn::Ok);
        assert_eq!(src.peer(), Some(sink.clone()));
        assert_eq!(src.link(&Pad::sink()), PadLinkReturn::WasLinked);
        assert!(src.unlink(&sink));
        assert!(!src.unlink(&sink));
        assert!(!sink.is_linked());
    }

    #[test]
    fn test_push_runs_probes_in_order_and_stops_on_drop() {
        let src = Pad::src();
        let sink = Pad::sink();
        src.link(&sink);

        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        src.add_buffer_probe(move |_, _| {
            o1.lock().unwrap().push(1);
            ProbeReturn::Ok
        });
        let o2 = order.clone();
        let dropper = src.add_buffer_probe(move |_, _| {
            o2.lock().unwrap().push(2);
            ProbeReturn::Drop
        });
        let o3 = order.clone();
        src.add_buffer_probe(move |_, _| {
            o3.lock().unwrap().push(3);
            ProbeReturn::Ok
        });

        assert_eq!(src.push(Batch::new(0)), FlowReturn::Dropped);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);

        assert!(src.remove_probe(dropper));
        order.lock().unwrap().clear();
        assert_eq!(src.push(Batch::new(1)), FlowReturn::Ok);
        assert_eq!(*order.lock().unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_unlinked_src_push() {
        assert_eq!(Pad::src().push(Batch::new(0)), FlowReturn::NotLinked);
        assert!(!Pad::src().send_event(Event::Eos));
    }

    #[test]
    fn test_ghost_forwarding() {
        let inner_sink = Pad::sink();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        inner_sink.set_chain_function(Arc::new(move |_, _| {
            s.fetch_add(1, Ordering::SeqCst);
            FlowReturn::Ok
        }));
        let ghost = Pad::ghost("sink", &inner_sink);
        assert!(ghost.is_ghost());
        assert!(ghost.is_sink());

        let upstream = Pad::src();
        upstream.link(&ghost);
        assert_eq!(upstream.push(Batch::new(0)), FlowReturn::Ok);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        // src side: inner src pad without a peer forwards through its ghost
        let inner_src = Pad::src();
        let ghost_src = Pad::ghost("src", &inner_src);
        let downstream = Pad::sink();
        ghost_src.link(&downstream);
        assert_eq!(inner_src.push(Batch::new(1)), FlowReturn::Ok);
    }

    #[test]
    fn test_release_target_stops_forwarding() {
        let inner_src = Pad::src();
        let old = Pad::ghost("src", &inner_src);

        // a newer ghost on the same target is left alone
        let current = Pad::ghost("src", &inner_src);
        old.release_target();
        let downstream = Pad::sink();
        current.link(&downstream);
        assert_eq!(inner_src.push(Batch::new(0)), FlowReturn::Ok);

        current.release_target();
        assert_eq!(inner_src.push(Batch::new(1)), FlowReturn::NotLinked);
        assert!(!inner_src.send_event(Event::Eos));
    }
}
