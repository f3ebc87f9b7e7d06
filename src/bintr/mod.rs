//! Components.
//!
//! A [`Bintr`] is a container node that exclusively owns an ordered set of
//! child nodes. It exposes internal pads through ghost pads, carries a
//! [`PadProbe`] on each boundary side, and is driven through its lifecycle by
//! a [`StateController`].
//!
//! Components are built detached, attached to at most one parent, linked,
//! run, unlinked and detached again:
//!
//! ```rust
//! use bintr::bintr::Bintr;
//! use bintr::engine::State;
//!
//! let branch = Bintr::branch("branch");
//! let queue = Bintr::queue("queue").unwrap();
//! assert!(queue.add_to_parent(&branch));
//! assert!(queue.is_in_use());
//!
//! assert!(branch.link_all());
//! assert!(branch.set_state(State::Playing));
//! assert!(branch.set_state(State::Null));
//! branch.unlink_all();
//! assert!(queue.remove_from_parent(&branch));
//! ```
//!
//! Operational failures (linking, state changes, rejected setters, handler
//! registration) return `false` and are logged. Structural faults, a ghost
//! pad against a missing pad or a duplicate pad key, return
//! [`Error`](crate::Error) and leave the component needing correction.

mod kind;
mod pipeline;

pub use kind::{BinKind, SinkProperties};

use crate::batch::Batch;
use crate::config::RuntimeConfig;
use crate::engine::{
    Element, ElementKind, Event, FlowReturn, Pad, PadLinkReturn, PropertyValue, State,
};
use crate::error::{Error, Result};
use crate::node::{Elementr, Node, NodeId, ParentLink};
use crate::observability::span_component;
use crate::pads::{PadRegistry, PadSide};
use crate::probe::{BatchDump, HandlerRef, PadProbe};
use crate::state::StateController;
use std::fmt;
use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Buffer memory type assigned to a component's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryType {
    /// Platform default.
    #[default]
    Default,
    /// Pinned host memory.
    Pinned,
    /// Device memory.
    Device,
    /// Unified memory.
    Unified,
}

impl MemoryType {
    fn as_property(&self) -> u64 {
        match self {
            MemoryType::Default => 0,
            MemoryType::Pinned => 1,
            MemoryType::Device => 2,
            MemoryType::Unified => 3,
        }
    }
}

/// A child owned by a component.
#[derive(Clone, Debug)]
pub enum Child {
    /// A single wrapped element.
    Element(Elementr),
    /// A nested component.
    Bin(Bintr),
}

impl Child {
    /// The child's node.
    pub fn node(&self) -> &Node {
        match self {
            Child::Element(e) => e.node(),
            Child::Bin(b) => b.node(),
        }
    }

    /// The child's name.
    pub fn name(&self) -> &str {
        self.node().name()
    }

    /// The nested component, if this child is one.
    pub fn as_bin(&self) -> Option<&Bintr> {
        match self {
            Child::Bin(b) => Some(b),
            Child::Element(_) => None,
        }
    }
}

impl From<Elementr> for Child {
    fn from(e: Elementr) -> Self {
        Child::Element(e)
    }
}

impl From<Bintr> for Child {
    fn from(b: Bintr) -> Self {
        Child::Bin(b)
    }
}

struct BintrInner {
    node: Node,
    kind: BinKind,
    children: Mutex<Vec<Child>>,
    linked: AtomicBool,
    gpu_id: AtomicU32,
    memory_type: Mutex<MemoryType>,
    pads: Mutex<PadRegistry>,
    /// Boundary sides whose ghost pads `link_all` created.
    floated: Mutex<Vec<PadSide>>,
    sink_probe: PadProbe,
    src_probe: PadProbe,
    controller: Mutex<StateController>,
}

impl Drop for BintrInner {
    fn drop(&mut self) {
        let children = std::mem::take(
            self.children
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let pads = self.pads.get_mut().unwrap_or_else(PoisonError::into_inner);
        for side in [PadSide::Sink, PadSide::Src] {
            for key in pads.requested_names(side) {
                let Some(pad) = pads.remove_requested(side, &key) else {
                    continue;
                };
                if let Some(peer) = pad.peer() {
                    pad.unlink(&peer);
                }
                let owner = pad.owner();
                if let Some(child) = children.iter().find(|c| c.name() == owner) {
                    child.node().element().release_request_pad(&pad);
                }
            }
        }
        for child in children {
            child.node().clear_parent();
        }
    }
}

/// A component. Cheap to clone; clones refer to the same component.
#[derive(Clone)]
pub struct Bintr(Arc<BintrInner>);

impl Bintr {
    fn build(name: impl Into<String>, kind: BinKind) -> Self {
        let name = name.into();
        Self(Arc::new(BintrInner {
            node: Node::new(Element::new(ElementKind::Bin, name.clone())),
            kind,
            children: Mutex::new(Vec::new()),
            linked: AtomicBool::new(false),
            gpu_id: AtomicU32::new(0),
            memory_type: Mutex::new(MemoryType::Default),
            pads: Mutex::new(PadRegistry::new(name.clone())),
            floated: Mutex::new(Vec::new()),
            sink_probe: PadProbe::new(format!("{}-sink-pad-probe", name)),
            src_probe: PadProbe::new(format!("{}-src-pad-probe", name)),
            controller: Mutex::new(StateController::default()),
        }))
    }

    /// The component's node.
    pub fn node(&self) -> &Node {
        &self.0.node
    }

    /// Component identity.
    pub fn id(&self) -> NodeId {
        self.0.node.id()
    }

    /// Component name.
    pub fn name(&self) -> &str {
        self.0.node.name()
    }

    /// The component's kind.
    pub fn kind(&self) -> &BinKind {
        &self.0.kind
    }

    /// The native container element.
    pub fn element(&self) -> &Element {
        self.0.node.element()
    }

    /// Replace the timeouts used by [`set_state`](Self::set_state).
    pub fn set_runtime_config(&self, config: RuntimeConfig) {
        *self.0.controller.lock().unwrap() = StateController::new(config);
    }

    /// Timeouts used by [`set_state`](Self::set_state).
    pub fn runtime_config(&self) -> RuntimeConfig {
        *self.0.controller.lock().unwrap().config()
    }

    // ---------------------------------------------------------------------
    // Parent and children
    // ---------------------------------------------------------------------

    /// Attach this component to `parent`.
    ///
    /// Fails if it already has a parent.
    pub fn add_to_parent(&self, parent: &Bintr) -> bool {
        parent.add_child(Child::Bin(self.clone()))
    }

    /// Detach this component from `parent`.
    ///
    /// Fails if `parent` does not hold this component.
    pub fn remove_from_parent(&self, parent: &Bintr) -> bool {
        parent.remove_child(&Child::Bin(self.clone()))
    }

    /// Whether this component is attached to a parent.
    pub fn is_in_use(&self) -> bool {
        self.0.node.has_parent()
    }

    /// The parent, if attached.
    pub fn parent(&self) -> Option<ParentLink> {
        self.0.node.parent()
    }

    /// Add `child` to this component.
    ///
    /// Fails if the child already has a parent, if this kind does not take
    /// that child, or while this component is linked.
    pub fn add_child(&self, child: impl Into<Child>) -> bool {
        let child = child.into();
        if !self.0.kind.accepts(&child) {
            tracing::error!(
                component = %self.name(),
                child = %child.name(),
                kind = self.0.kind.name(),
                "component does not accept this child"
            );
            return false;
        }
        if self.is_linked() {
            tracing::error!(component = %self.name(), child = %child.name(), "cannot add child while linked");
            return false;
        }
        self.adopt(child)
    }

    /// Attach `child` without kind or link checks.
    fn adopt(&self, child: Child) -> bool {
        let cyclic = match &child {
            Child::Bin(bin) => bin.id() == self.id() || bin.contains(self.id()),
            Child::Element(_) => false,
        };
        if cyclic {
            tracing::error!(component = %self.name(), child = %child.name(), "component cannot contain itself");
            return false;
        }
        let link = ParentLink {
            id: self.id(),
            name: self.name().to_string(),
        };
        if !child.node().set_parent(link) {
            let current = child.node().parent().map(|p| p.name).unwrap_or_default();
            tracing::error!(
                component = %self.name(),
                child = %child.name(),
                parent = %current,
                "child is already in use by another component"
            );
            return false;
        }
        if !self.element().add(child.node().element()) {
            child.node().clear_parent();
            tracing::error!(component = %self.name(), child = %child.name(), "failed to add child element");
            return false;
        }
        tracing::debug!(component = %self.name(), child = %child.name(), "child added");
        self.0.children.lock().unwrap().push(child);
        true
    }

    /// Remove `child` from this component.
    ///
    /// Fails if it is not a child, or while this component is linked.
    pub fn remove_child(&self, child: &Child) -> bool {
        if !self.is_child(child) {
            tracing::error!(component = %self.name(), child = %child.name(), "not a child of component");
            return false;
        }
        if self.is_linked() {
            tracing::error!(component = %self.name(), child = %child.name(), "cannot remove child while linked");
            return false;
        }
        let mut children = self.0.children.lock().unwrap();
        let id = child.node().id();
        let Some(index) = children.iter().position(|c| c.node().id() == id) else {
            return false;
        };
        let removed = children.remove(index);
        drop(children);
        self.element().remove(removed.node().element());
        removed.node().clear_parent();
        tracing::debug!(component = %self.name(), child = %removed.name(), "child removed");
        true
    }

    /// Whether `child` is a child of this component.
    pub fn is_child(&self, child: &Child) -> bool {
        child.node().is_child_of(self.id())
    }

    /// Children in the order they were added.
    pub fn children(&self) -> Vec<Child> {
        self.0.children.lock().unwrap().clone()
    }

    /// Whether the node `id` is anywhere below this component.
    pub fn contains(&self, id: NodeId) -> bool {
        self.children().iter().any(|c| {
            c.node().id() == id || c.as_bin().is_some_and(|bin| bin.contains(id))
        })
    }

    /// Child with the given name.
    pub fn child(&self, name: &str) -> Option<Child> {
        self.0
            .children
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    // ---------------------------------------------------------------------
    // Pads
    // ---------------------------------------------------------------------

    /// Expose `child`'s static pad `name` as a ghost pad on this component.
    ///
    /// Ghost pads named `sink` and `src` become the component's static
    /// boundary pads and carry its probes.
    ///
    /// # Errors
    ///
    /// [`Error::PadNotFound`] if `child` has no static pad `name`, and
    /// [`Error::DuplicatePad`] if this component already has a pad `name`.
    pub fn add_ghost_pad(&self, name: &str, child: &Node) -> Result<()> {
        let Some(target) = child.static_pad(name) else {
            tracing::error!(
                component = %self.name(),
                pad = %name,
                child = %child.name(),
                "static pad not found for ghost pad"
            );
            return Err(Error::pad_not_found(name, child.name()));
        };
        if self.element().pads().iter().any(|p| p.name() == name) {
            return Err(Error::DuplicatePad {
                pad: name.to_string(),
                element: self.name().to_string(),
            });
        }
        let ghost = Pad::ghost(name, &target);
        self.element().add_pad(ghost.clone());

        let side = match name {
            "sink" => Some(PadSide::Sink),
            "src" => Some(PadSide::Src),
            _ => None,
        };
        if let Some(side) = side {
            self.0.pads.lock().unwrap().set_static_pad(side, ghost.clone());
            self.probe(side).attach(&ghost);
        }
        tracing::debug!(component = %self.name(), pad = %name, child = %child.name(), "ghost pad added");
        Ok(())
    }

    /// The static boundary pad on `side`.
    pub fn static_pad(&self, side: PadSide) -> Option<Pad> {
        self.0.pads.lock().unwrap().static_pad(side).cloned()
    }

    /// Request a pad on `side` from `from`'s request template and record it
    /// under `key`.
    ///
    /// # Errors
    ///
    /// [`Error::PadNotFound`] if `from` has no request template on that
    /// side, and [`Error::DuplicatePad`] if `key` is already recorded.
    pub fn request_pad(&self, side: PadSide, key: &str, from: &Node) -> Result<Pad> {
        let template = match side {
            PadSide::Sink => "sink_%u",
            PadSide::Src => "src_%u",
        };
        let mut pads = self.0.pads.lock().unwrap();
        if pads.requested(side, key).is_some() {
            return Err(Error::DuplicatePad {
                pad: key.to_string(),
                element: self.name().to_string(),
            });
        }
        let pad = from
            .element()
            .request_pad(template)
            .ok_or_else(|| Error::pad_not_found(template, from.name()))?;
        pads.insert_requested(side, key, pad.clone())?;
        tracing::debug!(
            component = %self.name(),
            key = %key,
            pad = %pad.name(),
            element = %from.name(),
            "pad requested"
        );
        Ok(pad)
    }

    /// Release the pad recorded under `key` on `side`.
    pub fn release_pad(&self, side: PadSide, key: &str) -> bool {
        let Some(pad) = self.0.pads.lock().unwrap().remove_requested(side, key) else {
            tracing::error!(component = %self.name(), key = %key, side = %side, "no requested pad under key");
            return false;
        };
        if let Some(peer) = pad.peer() {
            pad.unlink(&peer);
        }
        let owner = pad.owner();
        match self.find_element(&owner) {
            Some(element) => element.release_request_pad(&pad),
            None => {
                tracing::warn!(component = %self.name(), element = %owner, "owner of requested pad not found");
                false
            }
        }
    }

    /// Keys of the requested pads on `side`.
    pub fn requested_pads(&self, side: PadSide) -> Vec<String> {
        self.0.pads.lock().unwrap().requested_names(side)
    }

    fn find_element(&self, name: &str) -> Option<Element> {
        self.children()
            .iter()
            .map(|c| c.node().element())
            .find(|e| e.name() == name)
            .cloned()
    }

    // ---------------------------------------------------------------------
    // Linking
    // ---------------------------------------------------------------------

    /// Link all children into this component's internal topology.
    ///
    /// Fails if already linked. A failure part way through undoes the links
    /// made so far.
    pub fn link_all(&self) -> bool {
        if self.is_linked() {
            tracing::error!(component = %self.name(), "component is already linked");
            return false;
        }
        let span = span_component(self.name(), "link_all");
        let _guard = span.enter();

        let ok = match &self.0.kind {
            BinKind::Queue { .. } | BinKind::Source { .. } => true,
            BinKind::FakeSink { queue, sink } | BinKind::AppSink { queue, sink } => {
                queue.link_to_sink(sink)
            }
            BinKind::Custom | BinKind::Pipeline => self.link_in_order(),
            BinKind::Branch => self.link_in_order() && self.float_ghost_pads(),
            BinKind::Splitter { tee } => self.link_branches(tee),
        };
        if ok {
            self.0.linked.store(true, Ordering::Release);
            tracing::debug!(component = %self.name(), "linked");
        } else {
            tracing::error!(component = %self.name(), "failed to link");
            self.unlink_internal();
        }
        ok
    }

    /// Undo [`link_all`](Self::link_all). A no-op when not linked.
    pub fn unlink_all(&self) {
        if !self.is_linked() {
            tracing::debug!(component = %self.name(), "component is not linked");
            return;
        }
        let span = span_component(self.name(), "unlink_all");
        let _guard = span.enter();
        self.unlink_internal();
        self.0.linked.store(false, Ordering::Release);
        tracing::debug!(component = %self.name(), "unlinked");
    }

    fn unlink_internal(&self) {
        match &self.0.kind {
            BinKind::Queue { .. } | BinKind::Source { .. } => {}
            BinKind::FakeSink { queue, .. } | BinKind::AppSink { queue, .. } => {
                if queue.is_linked_to_sink() {
                    queue.unlink_from_sink();
                }
            }
            BinKind::Custom | BinKind::Pipeline => self.unlink_in_order(),
            BinKind::Branch => {
                self.unlink_in_order();
                self.remove_floated_ghost_pads();
            }
            BinKind::Splitter { .. } => self.unlink_branches(),
        }
    }

    /// Whether [`link_all`](Self::link_all) has succeeded and not been undone.
    pub fn is_linked(&self) -> bool {
        self.0.linked.load(Ordering::Acquire)
    }

    fn link_in_order(&self) -> bool {
        let children = self.children();
        for child in &children {
            if let Child::Bin(bin) = child {
                if !bin.link_all() {
                    return false;
                }
            }
        }
        children
            .windows(2)
            .all(|pair| pair[0].node().link_to_sink(pair[1].node()))
    }

    fn unlink_in_order(&self) {
        for child in self.children() {
            if child.node().is_linked_to_sink() {
                child.node().unlink_from_sink();
            }
            if let Child::Bin(bin) = child {
                bin.unlink_all();
            }
        }
    }

    fn float_ghost_pads(&self) -> bool {
        let children = self.children();
        let (Some(first), Some(last)) = (children.first(), children.last()) else {
            return true;
        };
        for (side, child) in [(PadSide::Sink, first), (PadSide::Src, last)] {
            if self.static_pad(side).is_some() || child.node().static_pad(side.pad_name()).is_none()
            {
                continue;
            }
            if let Err(err) = self.add_ghost_pad(side.pad_name(), child.node()) {
                tracing::error!(component = %self.name(), error = %err, "failed to float ghost pad");
                return false;
            }
            self.0.floated.lock().unwrap().push(side);
        }
        true
    }

    // Handlers stay registered on the probes and follow the next floated pads.
    fn remove_floated_ghost_pads(&self) {
        let floated = std::mem::take(&mut *self.0.floated.lock().unwrap());
        for side in floated {
            let Some(ghost) = self.0.pads.lock().unwrap().clear_static_pad(side) else {
                continue;
            };
            self.probe(side).detach();
            ghost.release_target();
            self.element().remove_pad(ghost.name());
            tracing::debug!(component = %self.name(), pad = %ghost.name(), "floated ghost pad removed");
        }
    }

    fn link_branches(&self, tee: &Elementr) -> bool {
        for branch in self.children().iter().filter_map(Child::as_bin) {
            if !branch.link_all() {
                return false;
            }
            let Some(branch_sink) = branch.node().static_pad("sink") else {
                tracing::error!(component = %self.name(), branch = %branch.name(), "branch has no sink pad");
                return false;
            };
            let src = match self.request_pad(PadSide::Src, branch.name(), tee.node()) {
                Ok(pad) => pad,
                Err(err) => {
                    tracing::error!(component = %self.name(), error = %err, "failed to request tee pad");
                    return false;
                }
            };
            let result = src.link(&branch_sink);
            if result != PadLinkReturn::Ok {
                tracing::error!(
                    component = %self.name(),
                    branch = %branch.name(),
                    result = ?result,
                    "failed to link branch"
                );
                return false;
            }
        }
        true
    }

    fn unlink_branches(&self) {
        for key in self.requested_pads(PadSide::Src) {
            self.release_pad(PadSide::Src, &key);
        }
        for branch in self.children().iter().filter_map(Child::as_bin) {
            branch.unlink_all();
        }
    }

    // ---------------------------------------------------------------------
    // State
    // ---------------------------------------------------------------------

    /// Change this component's state, waiting for asynchronous changes up to
    /// the configured timeout.
    ///
    /// Returns false on failure, no-preroll or timeout.
    pub fn set_state(&self, target: State) -> bool {
        let controller = self.0.controller.lock().unwrap().clone();
        controller.set_state(self.element(), target)
    }

    /// Current committed state.
    pub fn state(&self) -> State {
        self.element().current_state()
    }

    /// Send end-of-stream into the component's static sink pad.
    ///
    /// Fails unless the component is playing or paused and has a sink pad.
    pub fn send_eos(&self) -> bool {
        let state = self.state();
        if !matches!(state, State::Playing | State::Paused) {
            tracing::error!(component = %self.name(), %state, "component must be playing or paused to send EOS");
            return false;
        }
        let Some(pad) = self.static_pad(PadSide::Sink) else {
            tracing::error!(component = %self.name(), "component has no sink pad for EOS");
            return false;
        };
        tracing::info!(component = %self.name(), "sending EOS");
        pad.send_event(Event::Eos)
    }

    /// Push `batch` into the component: out of the source element for a
    /// source, into the static sink pad otherwise.
    pub fn push(&self, batch: Batch) -> FlowReturn {
        let pad = match &self.0.kind {
            BinKind::Source { source, .. } => source.static_pad("src"),
            _ => self.static_pad(PadSide::Sink),
        };
        match pad {
            Some(pad) => pad.push(batch),
            None => FlowReturn::NotLinked,
        }
    }

    // ---------------------------------------------------------------------
    // Resources
    // ---------------------------------------------------------------------

    /// Assign the GPU. Rejected while in use.
    pub fn set_gpu_id(&self, gpu_id: u32) -> bool {
        if self.is_in_use() {
            tracing::error!(component = %self.name(), "unable to set GPU id while in use");
            return false;
        }
        self.0.gpu_id.store(gpu_id, Ordering::Release);
        self.set_element_property("gpu-id", PropertyValue::UInt(gpu_id as u64));
        tracing::debug!(component = %self.name(), gpu_id, "GPU id set");
        true
    }

    /// Assigned GPU.
    pub fn gpu_id(&self) -> u32 {
        self.0.gpu_id.load(Ordering::Acquire)
    }

    /// Assign the buffer memory type. Rejected while in use.
    pub fn set_memory_type(&self, memory_type: MemoryType) -> bool {
        if self.is_in_use() {
            tracing::error!(component = %self.name(), "unable to set memory type while in use");
            return false;
        }
        *self.0.memory_type.lock().unwrap() = memory_type;
        self.set_element_property("memory-type", PropertyValue::UInt(memory_type.as_property()));
        true
    }

    /// Assigned memory type.
    pub fn memory_type(&self) -> MemoryType {
        *self.0.memory_type.lock().unwrap()
    }

    fn set_element_property(&self, name: &str, value: PropertyValue) {
        for child in self.children() {
            if let Child::Element(e) = child {
                e.element().set_property(name, value.clone());
            }
        }
    }

    // ---------------------------------------------------------------------
    // Probes
    // ---------------------------------------------------------------------

    fn probe(&self, side: PadSide) -> &PadProbe {
        match side {
            PadSide::Sink => &self.0.sink_probe,
            PadSide::Src => &self.0.src_probe,
        }
    }

    /// Register a batch-meta handler on the `side` probe.
    ///
    /// Fails if this kind has no pad on `side` or the handler is already
    /// registered there.
    pub fn add_batch_meta_handler(&self, side: PadSide, handler: HandlerRef) -> bool {
        if !self.0.kind.has_pad(side) {
            tracing::error!(component = %self.name(), %side, "component has no pad on this side");
            return false;
        }
        self.probe(side).add_batch_meta_handler(handler)
    }

    /// [`add_batch_meta_handler`](Self::add_batch_meta_handler) with a raw
    /// pad id, 0 for sink and 1 for src.
    pub fn add_batch_meta_handler_by_id(&self, pad: u32, handler: HandlerRef) -> bool {
        match PadSide::from_raw(pad) {
            Some(side) => self.add_batch_meta_handler(side, handler),
            None => {
                tracing::error!(component = %self.name(), pad, "invalid pad id");
                false
            }
        }
    }

    /// Unregister a batch-meta handler from the `side` probe.
    pub fn remove_batch_meta_handler(&self, side: PadSide, handler: &HandlerRef) -> bool {
        self.probe(side).remove_batch_meta_handler(handler)
    }

    /// [`remove_batch_meta_handler`](Self::remove_batch_meta_handler) with a
    /// raw pad id.
    pub fn remove_batch_meta_handler_by_id(&self, pad: u32, handler: &HandlerRef) -> bool {
        match PadSide::from_raw(pad) {
            Some(side) => self.remove_batch_meta_handler(side, handler),
            None => {
                tracing::error!(component = %self.name(), pad, "invalid pad id");
                false
            }
        }
    }

    /// Number of handlers on the `side` probe.
    pub fn batch_meta_handler_count(&self, side: PadSide) -> usize {
        self.probe(side).handler_count()
    }

    /// Write every batch leaving the src pad to `path` as JSON lines, or
    /// stop doing so with `None`.
    ///
    /// # Errors
    ///
    /// [`Error::PadNotFound`] if this kind has no src pad, or an I/O error
    /// creating the file.
    pub fn set_batch_dump(&self, path: Option<&Path>) -> Result<()> {
        if !self.0.kind.has_pad(PadSide::Src) {
            return Err(Error::pad_not_found("src", self.name()));
        }
        let dump = path.map(BatchDump::create).transpose()?;
        self.0.src_probe.set_dump(dump);
        Ok(())
    }
}

impl Deref for Bintr {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.0.node
    }
}

impl PartialEq for Bintr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Bintr {}

impl fmt::Debug for Bintr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bintr")
            .field("name", &self.name())
            .field("kind", &self.0.kind.name())
            .field("linked", &self.is_linked())
            .field("in_use", &self.is_in_use())
            .field("state", &self.state())
            .field("children", &self.0.children.lock().unwrap().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ProbeReturn;
    use crate::probe::handler;

    #[test]
    fn test_single_parent() {
        let a = Bintr::branch("a");
        let b = Bintr::branch("b");
        let q = Bintr::queue("q").unwrap();
        assert!(q.add_to_parent(&a));
        assert!(!q.add_to_parent(&b));
        assert_eq!(q.parent().unwrap().name, "a");
        assert!(!q.remove_from_parent(&b));
        assert!(q.remove_from_parent(&a));
        assert!(!q.is_in_use());
        assert!(q.add_to_parent(&b));
    }

    #[test]
    fn test_no_cycles() {
        let a = Bintr::custom("a");
        assert!(!a.add_child(a.clone()));
        assert!(!a.is_in_use());

        let b = Bintr::custom("b");
        let c = Bintr::custom("c");
        assert!(b.add_to_parent(&a));
        assert!(c.add_to_parent(&b));
        assert!(a.contains(c.id()));
        assert!(!a.add_to_parent(&c));
        assert!(!a.is_in_use());
    }

    #[test]
    fn test_ghost_pad_missing_is_error() {
        let a = Bintr::custom("a");
        let q = Elementr::of_kind(ElementKind::Queue, "q");
        let err = a.add_ghost_pad("video", &q).unwrap_err();
        assert!(matches!(err, Error::PadNotFound { .. }));
        assert!(err.is_structural());

        a.add_ghost_pad("sink", &q).unwrap();
        assert!(matches!(
            a.add_ghost_pad("sink", &q),
            Err(Error::DuplicatePad { .. })
        ));
        assert!(a.static_pad(PadSide::Sink).is_some());
        assert!(a.static_pad(PadSide::Src).is_none());
    }

    #[test]
    fn test_unlink_is_idempotent() {
        let branch = Bintr::branch("branch");
        Bintr::queue("q1").unwrap().add_to_parent(&branch);
        Bintr::queue("q2").unwrap().add_to_parent(&branch);
        assert!(!branch.is_linked());
        assert!(branch.link_all());
        assert!(branch.is_linked());
        assert!(!branch.link_all());
        branch.unlink_all();
        assert!(!branch.is_linked());
        branch.unlink_all();
        assert!(!branch.is_linked());
        assert!(branch.link_all());
    }

    #[test]
    fn test_children_are_released_on_drop() {
        let q = Bintr::queue("q").unwrap();
        {
            let parent = Bintr::branch("parent");
            assert!(q.add_to_parent(&parent));
        }
        assert!(!q.is_in_use());
        let other = Bintr::branch("other");
        assert!(q.add_to_parent(&other));
    }

    #[test]
    fn test_requested_pads_released_on_drop() {
        let funnel = Elementr::of_kind(ElementKind::Funnel, "funnel");
        {
            let mux = Bintr::custom("mux");
            assert!(mux.add_child(funnel.clone()));
            mux.request_pad(PadSide::Sink, "a", &funnel).unwrap();
            mux.request_pad(PadSide::Sink, "b", &funnel).unwrap();
            assert_eq!(funnel.element().pads().len(), 3);
        }
        assert_eq!(funnel.element().pads().len(), 1);
        assert!(!funnel.has_parent());
    }

    #[test]
    fn test_drop_after_poisoned_locks() {
        let q = Bintr::queue("q").unwrap();
        let parent = Bintr::branch("parent");
        assert!(q.add_to_parent(&parent));

        let holder = parent.clone();
        let result = std::thread::spawn(move || {
            let _children = holder.0.children.lock().unwrap();
            let _pads = holder.0.pads.lock().unwrap();
            panic!("handler panicked under the component locks");
        })
        .join();
        assert!(result.is_err());
        assert!(parent.0.children.is_poisoned());
        assert!(parent.0.pads.is_poisoned());

        drop(parent);
        assert!(!q.is_in_use());
    }

    #[test]
    fn test_gpu_id_only_while_detached() {
        let parent = Bintr::branch("parent");
        let sink = Bintr::fake_sink("sink").unwrap();
        assert!(sink.set_gpu_id(1));
        assert!(sink.set_memory_type(MemoryType::Unified));
        sink.add_to_parent(&parent);
        assert!(!sink.set_gpu_id(2));
        assert!(!sink.set_memory_type(MemoryType::Device));
        assert_eq!(sink.gpu_id(), 1);
        assert_eq!(sink.memory_type(), MemoryType::Unified);
    }

    #[test]
    fn test_handler_side_checks() {
        let sink = Bintr::fake_sink("sink").unwrap();
        let h = handler(|_| ProbeReturn::Ok);
        assert!(!sink.add_batch_meta_handler(PadSide::Src, h.clone()));
        assert!(!sink.add_batch_meta_handler_by_id(7, h.clone()));
        assert!(sink.add_batch_meta_handler_by_id(0, h.clone()));
        assert!(!sink.add_batch_meta_handler(PadSide::Sink, h.clone()));
        assert!(sink.remove_batch_meta_handler_by_id(0, &h));
        assert!(!sink.remove_batch_meta_handler(PadSide::Sink, &h));
    }

    #[test]
    fn test_cannot_add_child_while_linked() {
        let branch = Bintr::branch("branch");
        Bintr::queue("q1").unwrap().add_to_parent(&branch);
        assert!(branch.link_all());
        let q2 = Bintr::queue("q2").unwrap();
        assert!(!q2.add_to_parent(&branch));
        assert!(!q2.is_in_use());
    }
}
