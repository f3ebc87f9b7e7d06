//! Native elements of the built-in engine.
//!
//! An [`Element`] is a named processing element with pads and a lifecycle
//! state. Containers (`ElementKind::Bin`) hold child elements, propagate
//! state changes to them and expose their pads through ghost pads.
//!
//! State changes are decided by the element's [`Transition`] policy. When a
//! policy goes asynchronous the change settles on an engine worker thread;
//! [`Element::get_state`] waits on a condition variable for it.

use super::bus::{Bus, BusMessage};
use super::event::{Event, FlowReturn};
use super::pad::{ChainFn, EventFn, Pad, PadDirection, PadLinkReturn, PadPresence, PadTemplate};
use super::state::{Immediate, State, StateChangeReturn, Transition, TransitionOutcome};
use crate::batch::Batch;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};

/// The kinds of element the built-in engine can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Produces batches on its `src` pad.
    Source,
    /// Decouples upstream from downstream; forwards `sink` to `src`.
    Queue,
    /// Forwards `sink` to `src` unchanged.
    Identity,
    /// Copies every batch to each requested `src_%u` pad.
    Tee,
    /// Merges every requested `sink_%u` pad into one `src` pad.
    Funnel,
    /// Consumes and discards batches.
    FakeSink,
    /// Hands batches to an application callback.
    AppSink,
    /// Container of other elements.
    Bin,
}

impl ElementKind {
    /// Factory name used to create elements of this kind.
    pub fn factory_name(&self) -> &'static str {
        match self {
            ElementKind::Source => "source",
            ElementKind::Queue => "queue",
            ElementKind::Identity => "identity",
            ElementKind::Tee => "tee",
            ElementKind::Funnel => "funnel",
            ElementKind::FakeSink => "fakesink",
            ElementKind::AppSink => "appsink",
            ElementKind::Bin => "bin",
        }
    }

    /// Look up a kind by factory name.
    pub fn from_factory_name(name: &str) -> Option<Self> {
        Some(match name {
            "source" => ElementKind::Source,
            "queue" => ElementKind::Queue,
            "identity" => ElementKind::Identity,
            "tee" => ElementKind::Tee,
            "funnel" => ElementKind::Funnel,
            "fakesink" => ElementKind::FakeSink,
            "appsink" => ElementKind::AppSink,
            "bin" => ElementKind::Bin,
            _ => return None,
        })
    }

    /// Whether elements of this kind terminate a stream.
    pub fn is_sink(&self) -> bool {
        matches!(self, ElementKind::FakeSink | ElementKind::AppSink)
    }
}

/// A property value set on an element.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Boolean property.
    Bool(bool),
    /// Signed integer property.
    Int(i64),
    /// Unsigned integer property.
    UInt(u64),
    /// String property.
    String(String),
}

/// Callback receiving batches that reach an app sink.
pub type AppDataHandler = Arc<dyn Fn(&Batch) -> FlowReturn + Send + Sync>;

#[derive(Debug)]
struct StateCell {
    current: State,
    pending: State,
    in_flight: bool,
    failed: bool,
    generation: u64,
}

struct ElementInner {
    name: String,
    kind: ElementKind,
    pads: Mutex<Vec<Pad>>,
    templates: Vec<PadTemplate>,
    next_request: AtomicU32,
    state: Mutex<StateCell>,
    settled: Condvar,
    transition: Mutex<Arc<dyn Transition>>,
    children: Mutex<Vec<Element>>,
    parent: Mutex<Weak<ElementInner>>,
    bus: Mutex<Option<Bus>>,
    properties: Mutex<HashMap<String, PropertyValue>>,
    app_handler: Mutex<Option<AppDataHandler>>,
    batches: AtomicU64,
    eos: AtomicBool,
}

/// A native element. Cheap to clone; clones refer to the same element.
#[derive(Clone)]
pub struct Element {
    inner: Arc<ElementInner>,
}

impl Element {
    /// Create an element of the given kind.
    pub fn new(kind: ElementKind, name: impl Into<String>) -> Self {
        let templates = match kind {
            ElementKind::Tee => vec![PadTemplate::request_src()],
            ElementKind::Funnel => vec![PadTemplate::request_sink()],
            _ => Vec::new(),
        };
        let element = Self {
            inner: Arc::new(ElementInner {
                name: name.into(),
                kind,
                pads: Mutex::new(Vec::new()),
                templates,
                next_request: AtomicU32::new(0),
                state: Mutex::new(StateCell {
                    current: State::Null,
                    pending: State::VoidPending,
                    in_flight: false,
                    failed: false,
                    generation: 0,
                }),
                settled: Condvar::new(),
                transition: Mutex::new(Arc::new(Immediate)),
                children: Mutex::new(Vec::new()),
                parent: Mutex::new(Weak::new()),
                bus: Mutex::new(None),
                properties: Mutex::new(HashMap::new()),
                app_handler: Mutex::new(None),
                batches: AtomicU64::new(0),
                eos: AtomicBool::new(false),
            }),
        };
        element.install_pads();
        element
    }

    /// Create an element by factory name.
    pub fn make(factory: &str, name: impl Into<String>) -> Result<Self> {
        let kind = ElementKind::from_factory_name(factory)
            .ok_or_else(|| Error::Element(format!("no element factory named '{}'", factory)))?;
        Ok(Self::new(kind, name))
    }

    fn install_pads(&self) {
        let weak = Arc::downgrade(&self.inner);
        match self.inner.kind {
            ElementKind::Source => {
                self.add_pad(Pad::src());
            }
            ElementKind::Queue | ElementKind::Identity => {
                let sink = Pad::sink();
                let src = Pad::src();
                let out = src.clone();
                let counter = weak.clone();
                let chain: ChainFn = Arc::new(move |_, batch| {
                    if let Some(inner) = counter.upgrade() {
                        inner.batches.fetch_add(1, Ordering::Relaxed);
                    }
                    out.push(batch)
                });
                sink.set_chain_function(chain);
                let out = src.clone();
                let event: EventFn = Arc::new(move |_, event| out.send_event(event));
                sink.set_event_function(event);
                self.add_pad(sink);
                self.add_pad(src);
            }
            ElementKind::Tee => {
                let sink = Pad::sink();
                let owner = weak.clone();
                let chain: ChainFn = Arc::new(move |_, batch| {
                    let Some(inner) = owner.upgrade() else {
                        return FlowReturn::Error;
                    };
                    inner.batches.fetch_add(1, Ordering::Relaxed);
                    let outputs = Element { inner }.request_src_pads();
                    let mut result = FlowReturn::NotLinked;
                    for pad in outputs {
                        match pad.push(batch.clone()) {
                            FlowReturn::Ok | FlowReturn::Dropped => result = FlowReturn::Ok,
                            FlowReturn::NotLinked => {}
                            other if result != FlowReturn::Ok => result = other,
                            _ => {}
                        }
                    }
                    result
                });
                sink.set_chain_function(chain);
                let owner = weak.clone();
                let event: EventFn = Arc::new(move |_, event| {
                    let Some(inner) = owner.upgrade() else {
                        return false;
                    };
                    let mut delivered = false;
                    for pad in (Element { inner }).request_src_pads() {
                        delivered |= pad.send_event(event.clone());
                    }
                    delivered
                });
                sink.set_event_function(event);
                self.add_pad(sink);
            }
            ElementKind::Funnel => {
                self.add_pad(Pad::src());
            }
            ElementKind::FakeSink | ElementKind::AppSink => {
                let sink = Pad::sink();
                let owner = weak.clone();
                let chain: ChainFn = Arc::new(move |_, batch| {
                    let Some(inner) = owner.upgrade() else {
                        return FlowReturn::Error;
                    };
                    if inner.eos.load(Ordering::Acquire) {
                        return FlowReturn::Eos;
                    }
                    inner.batches.fetch_add(1, Ordering::Relaxed);
                    let handler = inner.app_handler.lock().unwrap().clone();
                    match handler {
                        Some(handler) => handler(&batch),
                        None => FlowReturn::Ok,
                    }
                });
                sink.set_chain_function(chain);
                let owner = weak;
                let event: EventFn = Arc::new(move |_, event| {
                    let Some(inner) = owner.upgrade() else {
                        return false;
                    };
                    let element = Element { inner };
                    match event {
                        Event::Eos => {
                            element.inner.eos.store(true, Ordering::Release);
                            tracing::debug!(element = %element.name(), "sink received EOS");
                            if let Some(bus) = element.find_bus() {
                                bus.post_eos(element.name());
                            }
                        }
                        Event::FlushStop | Event::StreamStart { .. } => {
                            element.inner.eos.store(false, Ordering::Release);
                        }
                        _ => {}
                    }
                    true
                });
                sink.set_event_function(event);
                self.add_pad(sink);
            }
            ElementKind::Bin => {}
        }
    }

    /// Get the element's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the element's kind.
    pub fn kind(&self) -> ElementKind {
        self.inner.kind
    }

    /// Whether this element is a container.
    pub fn is_bin(&self) -> bool {
        self.inner.kind == ElementKind::Bin
    }

    // ---------------------------------------------------------------------
    // Pads
    // ---------------------------------------------------------------------

    /// Add a pad. Fails if a pad with the same name exists.
    pub fn add_pad(&self, pad: Pad) -> bool {
        let mut pads = self.inner.pads.lock().unwrap();
        if pads.iter().any(|p| p.name() == pad.name()) {
            return false;
        }
        pad.set_owner(&self.inner.name);
        pads.push(pad);
        true
    }

    /// Remove a pad by name, unlinking it first.
    pub fn remove_pad(&self, name: &str) -> Option<Pad> {
        let mut pads = self.inner.pads.lock().unwrap();
        let index = pads.iter().position(|p| p.name() == name)?;
        let pad = pads.remove(index);
        if let Some(peer) = pad.peer() {
            pad.unlink(&peer);
        }
        Some(pad)
    }

    /// Get an always-present pad by name.
    pub fn static_pad(&self, name: &str) -> Option<Pad> {
        self.inner
            .pads
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.name() == name && p.presence() == PadPresence::Always)
            .cloned()
    }

    /// All pads of this element.
    pub fn pads(&self) -> Vec<Pad> {
        self.inner.pads.lock().unwrap().clone()
    }

    /// Templates for request pads.
    pub fn pad_templates(&self) -> &[PadTemplate] {
        &self.inner.templates
    }

    /// Request a new pad from the template named `template`.
    pub fn request_pad(&self, template: &str) -> Option<Pad> {
        let template = self.inner.templates.iter().find(|t| t.name == template)?;
        let index = self.inner.next_request.fetch_add(1, Ordering::Relaxed);
        let pad = Pad::from_template(template, template.instance_name(index));
        if pad.is_sink() {
            self.install_request_sink(&pad);
        }
        self.add_pad(pad.clone()).then_some(pad)
    }

    fn install_request_sink(&self, pad: &Pad) {
        let Some(out) = self.static_pad("src") else {
            return;
        };
        let counter = Arc::downgrade(&self.inner);
        let forward = out.clone();
        let chain: ChainFn = Arc::new(move |_, batch| {
            if let Some(inner) = counter.upgrade() {
                inner.batches.fetch_add(1, Ordering::Relaxed);
            }
            forward.push(batch)
        });
        pad.set_chain_function(chain);
        let event: EventFn = Arc::new(move |_, event| out.send_event(event));
        pad.set_event_function(event);
    }

    /// Release a pad obtained from [`Element::request_pad`].
    pub fn release_request_pad(&self, pad: &Pad) -> bool {
        if pad.presence() != PadPresence::Request {
            return false;
        }
        self.remove_pad(pad.name()).is_some()
    }

    fn request_src_pads(&self) -> Vec<Pad> {
        self.inner
            .pads
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.presence() == PadPresence::Request && p.direction() == PadDirection::Src)
            .cloned()
            .collect()
    }

    /// Link this element's `src` pad to `sink`'s `sink` pad.
    pub fn link(&self, sink: &Element) -> bool {
        match (self.static_pad("src"), sink.static_pad("sink")) {
            (Some(src_pad), Some(sink_pad)) => src_pad.link(&sink_pad) == PadLinkReturn::Ok,
            _ => false,
        }
    }

    /// Undo [`Element::link`].
    pub fn unlink(&self, sink: &Element) -> bool {
        match (self.static_pad("src"), sink.static_pad("sink")) {
            (Some(src_pad), Some(sink_pad)) => src_pad.unlink(&sink_pad),
            _ => false,
        }
    }

    /// Push a batch out of this element's `src` pad.
    pub fn push(&self, batch: Batch) -> FlowReturn {
        match self.static_pad("src") {
            Some(pad) => pad.push(batch),
            None => FlowReturn::NotLinked,
        }
    }

    // ---------------------------------------------------------------------
    // Containers
    // ---------------------------------------------------------------------

    /// Add a child element. Only containers accept children, and a child can
    /// have one parent at a time.
    pub fn add(&self, child: &Element) -> bool {
        if !self.is_bin() || child == self || child.parent().is_some() {
            return false;
        }
        let mut children = self.inner.children.lock().unwrap();
        if children.iter().any(|c| c.name() == child.name()) {
            return false;
        }
        *child.inner.parent.lock().unwrap() = Arc::downgrade(&self.inner);
        children.push(child.clone());
        true
    }

    /// Remove a child element.
    pub fn remove(&self, child: &Element) -> bool {
        let mut children = self.inner.children.lock().unwrap();
        let Some(index) = children.iter().position(|c| c == child) else {
            return false;
        };
        children.remove(index);
        *child.inner.parent.lock().unwrap() = Weak::new();
        true
    }

    /// Child elements in the order they were added.
    pub fn children(&self) -> Vec<Element> {
        self.inner.children.lock().unwrap().clone()
    }

    /// The containing element, if any.
    pub fn parent(&self) -> Option<Element> {
        self.inner
            .parent
            .lock()
            .unwrap()
            .upgrade()
            .map(|inner| Element { inner })
    }

    /// Give this element its own bus, making it a top-level container.
    pub fn set_bus(&self, bus: Bus) {
        *self.inner.bus.lock().unwrap() = Some(bus);
    }

    /// This element's own bus.
    pub fn bus(&self) -> Option<Bus> {
        self.inner.bus.lock().unwrap().clone()
    }

    /// The nearest bus walking up through the parents.
    pub fn find_bus(&self) -> Option<Bus> {
        let mut current = Some(self.clone());
        while let Some(element) = current {
            if let Some(bus) = element.bus() {
                return Some(bus);
            }
            current = element.parent();
        }
        None
    }

    // ---------------------------------------------------------------------
    // Properties and data
    // ---------------------------------------------------------------------

    /// Set a property.
    pub fn set_property(&self, name: &str, value: PropertyValue) {
        self.inner
            .properties
            .lock()
            .unwrap()
            .insert(name.to_string(), value);
    }

    /// Get a property.
    pub fn property(&self, name: &str) -> Option<PropertyValue> {
        self.inner.properties.lock().unwrap().get(name).cloned()
    }

    /// Install the callback of an app sink.
    pub fn set_app_data_handler(&self, handler: Option<AppDataHandler>) {
        *self.inner.app_handler.lock().unwrap() = handler;
    }

    /// Number of batches this element has accepted.
    pub fn batches_received(&self) -> u64 {
        self.inner.batches.load(Ordering::Relaxed)
    }

    /// Whether a sink has received EOS since it last started.
    pub fn eos_received(&self) -> bool {
        self.inner.eos.load(Ordering::Acquire)
    }

    // ---------------------------------------------------------------------
    // State
    // ---------------------------------------------------------------------

    /// Replace the transition policy.
    pub fn set_transition(&self, transition: Arc<dyn Transition>) {
        *self.inner.transition.lock().unwrap() = transition;
    }

    /// Current committed state.
    pub fn current_state(&self) -> State {
        self.inner.state.lock().unwrap().current
    }

    /// State being transitioned to, or `VoidPending`.
    pub fn pending_state(&self) -> State {
        self.inner.state.lock().unwrap().pending
    }

    /// Request a state change.
    ///
    /// Containers change their children first, last-added first, and
    /// aggregate the results with [`StateChangeReturn::combine`].
    pub fn set_state(&self, target: State) -> StateChangeReturn {
        let mut result = StateChangeReturn::Success;
        for child in self.children().iter().rev() {
            result = result.combine(child.set_state(target));
        }

        let from = self.current_state();
        let transition = self.inner.transition.lock().unwrap().clone();
        let outcome = transition.begin(&self.inner.name, from, target);

        let own = {
            let mut cell = self.inner.state.lock().unwrap();
            cell.generation += 1;
            cell.failed = false;
            cell.in_flight = false;
            match outcome {
                TransitionOutcome::Success => StateChangeReturn::Success,
                TransitionOutcome::NoPreroll => StateChangeReturn::NoPreroll,
                TransitionOutcome::Failure => StateChangeReturn::Failure,
                TransitionOutcome::Async { after, succeed } => {
                    cell.in_flight = true;
                    self.spawn_completion(cell.generation, after, succeed);
                    StateChangeReturn::Async
                }
                TransitionOutcome::Stall => {
                    cell.in_flight = true;
                    StateChangeReturn::Async
                }
            }
        };

        let combined = result.combine(own);
        match combined {
            StateChangeReturn::Success | StateChangeReturn::NoPreroll => self.commit(target),
            StateChangeReturn::Failure => {
                let mut cell = self.inner.state.lock().unwrap();
                cell.failed = true;
                cell.in_flight = false;
                cell.pending = State::VoidPending;
                drop(cell);
                self.inner.settled.notify_all();
            }
            StateChangeReturn::Async => {
                self.inner.state.lock().unwrap().pending = target;
            }
        }
        combined
    }

    fn spawn_completion(&self, generation: u64, after: Duration, succeed: bool) {
        let weak = Arc::downgrade(&self.inner);
        let spawned = std::thread::Builder::new()
            .name(format!("{}-state", self.inner.name))
            .spawn(move || {
                std::thread::sleep(after);
                if let Some(inner) = weak.upgrade() {
                    Element { inner }.complete_async(generation, succeed);
                }
            });
        if let Err(err) = spawned {
            tracing::error!(element = %self.inner.name, error = %err, "failed to spawn state worker");
        }
    }

    fn complete_async(&self, generation: u64, succeed: bool) {
        {
            let mut cell = self.inner.state.lock().unwrap();
            if cell.generation != generation || !cell.in_flight {
                return;
            }
            cell.in_flight = false;
            if !succeed {
                cell.failed = true;
                cell.pending = State::VoidPending;
            }
        }
        self.inner.settled.notify_all();
        if succeed {
            // commits once every child has settled too
            let _ = self.get_state(Duration::ZERO);
        }
    }

    fn commit(&self, target: State) {
        let from = {
            let mut cell = self.inner.state.lock().unwrap();
            let from = cell.current;
            cell.current = target;
            cell.pending = State::VoidPending;
            cell.in_flight = false;
            from
        };
        self.inner.settled.notify_all();
        if from != target {
            tracing::trace!(element = %self.inner.name, %from, to = %target, "state committed");
            if let Some(bus) = self.bus() {
                bus.post(BusMessage::StateChanged {
                    source: self.inner.name.clone(),
                    from,
                    to: target,
                });
            }
        }
    }

    /// Query the state, waiting up to `timeout` for a pending change.
    ///
    /// Returns the outcome (`Async` if still pending at the deadline), the
    /// current state and the pending state.
    pub fn get_state(&self, timeout: Duration) -> (StateChangeReturn, State, State) {
        let deadline = Instant::now() + timeout;
        let pending = {
            let mut cell = self.inner.state.lock().unwrap();
            while cell.in_flight {
                let now = Instant::now();
                if now >= deadline {
                    return (StateChangeReturn::Async, cell.current, cell.pending);
                }
                let (guard, _) = self
                    .inner
                    .settled
                    .wait_timeout(cell, deadline - now)
                    .unwrap();
                cell = guard;
            }
            if cell.failed {
                return (StateChangeReturn::Failure, cell.current, cell.pending);
            }
            if cell.pending == State::VoidPending {
                return (StateChangeReturn::Success, cell.current, State::VoidPending);
            }
            cell.pending
        };

        for child in self.children() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match child.get_state(remaining).0 {
                StateChangeReturn::Failure => {
                    let mut cell = self.inner.state.lock().unwrap();
                    cell.failed = true;
                    cell.pending = State::VoidPending;
                    return (StateChangeReturn::Failure, cell.current, State::VoidPending);
                }
                StateChangeReturn::Async => {
                    return (StateChangeReturn::Async, self.current_state(), pending);
                }
                StateChangeReturn::Success | StateChangeReturn::NoPreroll => {}
            }
        }

        self.commit(pending);
        (StateChangeReturn::Success, pending, State::VoidPending)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("state", &self.current_state())
            .field("children", &self.inner.children.lock().unwrap().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::Simulated;

    #[test]
    fn test_make_unknown_factory() {
        assert!(matches!(
            Element::make("nvinfer", "pgie"),
            Err(Error::Element(_))
        ));
        let q = Element::make("queue", "q").unwrap();
        assert_eq!(q.kind(), ElementKind::Queue);
        assert!(q.static_pad("sink").is_some());
        assert!(q.static_pad("src").is_some());
    }

    #[test]
    fn test_container_single_parent() {
        let a = Element::new(ElementKind::Bin, "a");
        let b = Element::new(ElementKind::Bin, "b");
        let q = Element::new(ElementKind::Queue, "q");
        assert!(a.add(&q));
        assert!(!b.add(&q));
        assert_eq!(q.parent(), Some(a.clone()));
        assert!(a.remove(&q));
        assert!(q.parent().is_none());
        assert!(b.add(&q));
        assert!(!q.add(&a));
    }

    #[test]
    fn test_data_flows_through_chain() {
        let src = Element::new(ElementKind::Source, "src");
        let queue = Element::new(ElementKind::Queue, "q");
        let sink = Element::new(ElementKind::FakeSink, "sink");
        assert!(src.link(&queue));
        assert!(queue.link(&sink));

        assert_eq!(src.push(Batch::new(0)), FlowReturn::Ok);
        assert_eq!(src.push(Batch::new(1)), FlowReturn::Ok);
        assert_eq!(queue.batches_received(), 2);
        assert_eq!(sink.batches_received(), 2);
    }

    #[test]
    fn test_tee_request_pads() {
        let tee = Element::new(ElementKind::Tee, "tee");
        let s1 = Element::new(ElementKind::FakeSink, "s1");
        let s2 = Element::new(ElementKind::FakeSink, "s2");
        let p1 = tee.request_pad("src_%u").unwrap();
        let p2 = tee.request_pad("src_%u").unwrap();
        assert_eq!(p1.name(), "src_0");
        assert_eq!(p2.name(), "src_1");
        p1.link(&s1.static_pad("sink").unwrap());
        p2.link(&s2.static_pad("sink").unwrap());

        let tee_sink = tee.static_pad("sink").unwrap();
        assert_eq!(tee_sink.push(Batch::new(0)), FlowReturn::Ok);
        assert_eq!(s1.batches_received(), 1);
        assert_eq!(s2.batches_received(), 1);

        assert!(tee.release_request_pad(&p1));
        assert!(!tee.release_request_pad(&tee_sink));
        assert!(!s1.static_pad("sink").unwrap().is_linked());
    }

    #[test]
    fn test_eos_posts_on_nearest_bus() {
        let bin = Element::new(ElementKind::Bin, "pipeline");
        let bus = Bus::new(8);
        bin.set_bus(bus.clone());
        let mut rx = bus.subscribe();
        let sink = Element::new(ElementKind::FakeSink, "sink");
        bin.add(&sink);

        assert!(sink.static_pad("sink").unwrap().send_event(Event::Eos));
        assert!(sink.eos_received());
        assert_eq!(
            rx.try_recv(),
            Some(BusMessage::Eos {
                source: "sink".into()
            })
        );
        assert_eq!(
            sink.static_pad("sink").unwrap().push(Batch::new(0)),
            FlowReturn::Eos
        );
    }

    #[test]
    fn test_set_state_immediate() {
        let bin = Element::new(ElementKind::Bin, "bin");
        let q = Element::new(ElementKind::Queue, "q");
        bin.add(&q);
        assert_eq!(bin.set_state(State::Playing), StateChangeReturn::Success);
        assert_eq!(bin.current_state(), State::Playing);
        assert_eq!(q.current_state(), State::Playing);
    }

    #[test]
    fn test_child_failure_fails_container() {
        let bin = Element::new(ElementKind::Bin, "bin");
        let q = Element::new(ElementKind::Queue, "q");
        q.set_transition(Arc::new(Simulated::fail_on(State::Playing)));
        bin.add(&q);
        assert_eq!(bin.set_state(State::Playing), StateChangeReturn::Failure);
        assert_eq!(bin.current_state(), State::Null);
        assert_eq!(
            bin.get_state(Duration::ZERO).0,
            StateChangeReturn::Failure
        );
    }

    #[test]
    fn test_async_child_settles() {
        let bin = Element::new(ElementKind::Bin, "bin");
        let q = Element::new(ElementKind::Queue, "q");
        q.set_transition(Arc::new(Simulated::async_on(
            State::Paused,
            Duration::from_millis(20),
            true,
        )));
        bin.add(&q);
        assert_eq!(bin.set_state(State::Paused), StateChangeReturn::Async);
        assert_eq!(bin.pending_state(), State::Paused);
        let (ret, current, pending) = bin.get_state(Duration::from_secs(2));
        assert_eq!(ret, StateChangeReturn::Success);
        assert_eq!(current, State::Paused);
        assert_eq!(pending, State::VoidPending);
    }

    #[test]
    fn test_stalled_change_times_out() {
        let e = Element::new(ElementKind::Identity, "id");
        e.set_transition(Arc::new(Simulated::stall_on(State::Playing)));
        assert_eq!(e.set_state(State::Playing), StateChangeReturn::Async);
        let (ret, current, pending) = e.get_state(Duration::from_millis(10));
        assert_eq!(ret, StateChangeReturn::Async);
        assert_eq!(current, State::Null);
        assert_eq!(pending, State::Playing);
    }

    #[test]
    fn test_funnel_merges_request_sinks() {
        let funnel = Element::new(ElementKind::Funnel, "funnel");
        let sink = Element::new(ElementKind::FakeSink, "sink");
        assert!(funnel.link(&sink));

        let a = funnel.request_pad("sink_%u").unwrap();
        let b = funnel.request_pad("sink_%u").unwrap();
        assert_eq!(a.name(), "sink_0");
        assert_eq!(b.name(), "sink_1");
        assert_eq!(a.push(Batch::new(0)), FlowReturn::Ok);
        assert_eq!(b.push(Batch::new(1)), FlowReturn::Ok);
        assert_eq!(sink.batches_received(), 2);
        assert_eq!(funnel.batches_received(), 2);
        assert!(funnel.release_request_pad(&a));
        assert!(!funnel.release_request_pad(&a));
    }
}
