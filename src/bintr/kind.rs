//! The closed set of component kinds and their constructors.

use super::{Bintr, Child};
use crate::engine::{AppDataHandler, ElementKind, PropertyValue};
use crate::error::Result;
use crate::node::Elementr;
use crate::pads::PadSide;

/// What a component is, with the internal elements each kind owns.
///
/// Every kind-specific decision (topology, accepted children, boundary
/// pads) is an exhaustive match over this enum.
#[derive(Debug)]
pub enum BinKind {
    /// A single queue exposed through `sink` and `src`.
    Queue {
        /// The queue element.
        queue: Elementr,
    },
    /// Caller-supplied children linked in the order they were added. Ghost
    /// pads are added by the caller.
    Custom,
    /// Child components linked head to tail; the first child's `sink` and
    /// the last child's `src` float up as ghost pads when linked.
    Branch,
    /// A tee feeding each child branch through its own request pad.
    Splitter {
        /// The tee element.
        tee: Elementr,
    },
    /// Queue into a sink that discards batches.
    FakeSink {
        /// Leading queue, target of the `sink` ghost pad.
        queue: Elementr,
        /// Terminal sink element.
        sink: Elementr,
    },
    /// Queue into a sink that hands batches to a client callback.
    AppSink {
        /// Leading queue, target of the `sink` ghost pad.
        queue: Elementr,
        /// Terminal sink element.
        sink: Elementr,
    },
    /// A batch source exposed through `src`.
    Source {
        /// The source element.
        source: Elementr,
        /// Whether the source is live and skips prerolling.
        live: bool,
    },
    /// Top-level component with its own bus. Never has a parent.
    Pipeline,
}

impl BinKind {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            BinKind::Queue { .. } => "queue",
            BinKind::Custom => "custom",
            BinKind::Branch => "branch",
            BinKind::Splitter { .. } => "splitter",
            BinKind::FakeSink { .. } => "fake-sink",
            BinKind::AppSink { .. } => "app-sink",
            BinKind::Source { .. } => "source",
            BinKind::Pipeline => "pipeline",
        }
    }

    /// Whether components of this kind have a boundary pad on `side`.
    pub fn has_pad(&self, side: PadSide) -> bool {
        match self {
            BinKind::Queue { .. } | BinKind::Custom | BinKind::Branch => true,
            BinKind::Splitter { .. } | BinKind::FakeSink { .. } | BinKind::AppSink { .. } => {
                side == PadSide::Sink
            }
            BinKind::Source { .. } => side == PadSide::Src,
            BinKind::Pipeline => false,
        }
    }

    /// Whether a component of this kind takes `child`.
    pub fn accepts(&self, child: &Child) -> bool {
        if child.as_bin().is_some_and(|bin| bin.kind().is_pipeline()) {
            return false;
        }
        match self {
            BinKind::Queue { .. }
            | BinKind::FakeSink { .. }
            | BinKind::AppSink { .. }
            | BinKind::Source { .. } => false,
            BinKind::Custom => true,
            BinKind::Branch | BinKind::Splitter { .. } | BinKind::Pipeline => {
                matches!(child, Child::Bin(_))
            }
        }
    }

    /// Whether this is a top-level pipeline.
    pub fn is_pipeline(&self) -> bool {
        matches!(self, BinKind::Pipeline)
    }

    /// Whether this kind terminates a stream.
    pub fn is_sink(&self) -> bool {
        matches!(self, BinKind::FakeSink { .. } | BinKind::AppSink { .. })
    }

    fn sink_element(&self) -> Option<&Elementr> {
        match self {
            BinKind::FakeSink { sink, .. } | BinKind::AppSink { sink, .. } => Some(sink),
            BinKind::Queue { .. }
            | BinKind::Custom
            | BinKind::Branch
            | BinKind::Splitter { .. }
            | BinKind::Source { .. }
            | BinKind::Pipeline => None,
        }
    }
}

/// Sink element properties. Only settable while the sink is unlinked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkProperties {
    /// Synchronize rendering to the clock.
    pub sync: bool,
    /// Change state asynchronously.
    pub async_: bool,
    /// Generate quality-of-service events.
    pub qos: bool,
    /// Maximum lateness in nanoseconds, -1 for unlimited.
    pub max_lateness: i64,
}

impl Default for SinkProperties {
    fn default() -> Self {
        Self {
            sync: true,
            async_: false,
            qos: false,
            max_lateness: -1,
        }
    }
}

impl Bintr {
    /// A single queue with `sink` and `src` ghost pads.
    pub fn queue(name: &str) -> Result<Bintr> {
        let queue = Elementr::of_kind(ElementKind::Queue, format!("{}-queue", name));
        let bin = Bintr::build(
            name,
            BinKind::Queue {
                queue: queue.clone(),
            },
        );
        bin.adopt(Child::Element(queue.clone()));
        bin.add_ghost_pad("sink", &queue)?;
        bin.add_ghost_pad("src", &queue)?;
        Ok(bin)
    }

    /// An empty component for caller-supplied children.
    pub fn custom(name: &str) -> Bintr {
        Bintr::build(name, BinKind::Custom)
    }

    /// An empty branch of child components.
    pub fn branch(name: &str) -> Bintr {
        Bintr::build(name, BinKind::Branch)
    }

    /// A tee with a `sink` ghost pad; add branches as children.
    pub fn splitter(name: &str) -> Result<Bintr> {
        let tee = Elementr::of_kind(ElementKind::Tee, format!("{}-tee", name));
        let bin = Bintr::build(name, BinKind::Splitter { tee: tee.clone() });
        bin.adopt(Child::Element(tee.clone()));
        bin.add_ghost_pad("sink", &tee)?;
        Ok(bin)
    }

    /// A sink that discards every batch.
    pub fn fake_sink(name: &str) -> Result<Bintr> {
        let (queue, sink) = Self::sink_elements(name, ElementKind::FakeSink);
        let bin = Bintr::build(
            name,
            BinKind::FakeSink {
                queue: queue.clone(),
                sink: sink.clone(),
            },
        );
        bin.init_sink(&queue, &sink)?;
        Ok(bin)
    }

    /// A sink that hands every batch to `handler`.
    pub fn app_sink(name: &str, handler: AppDataHandler) -> Result<Bintr> {
        let (queue, sink) = Self::sink_elements(name, ElementKind::AppSink);
        sink.element().set_app_data_handler(Some(handler));
        let bin = Bintr::build(
            name,
            BinKind::AppSink {
                queue: queue.clone(),
                sink: sink.clone(),
            },
        );
        bin.init_sink(&queue, &sink)?;
        Ok(bin)
    }

    fn sink_elements(name: &str, kind: ElementKind) -> (Elementr, Elementr) {
        (
            Elementr::of_kind(ElementKind::Queue, format!("{}-queue", name)),
            Elementr::of_kind(kind, format!("{}-sink", name)),
        )
    }

    fn init_sink(&self, queue: &Elementr, sink: &Elementr) -> Result<()> {
        self.adopt(Child::Element(queue.clone()));
        self.adopt(Child::Element(sink.clone()));
        let defaults = SinkProperties::default();
        let element = sink.element();
        element.set_property("sync", PropertyValue::Bool(defaults.sync));
        element.set_property("async", PropertyValue::Bool(defaults.async_));
        element.set_property("qos", PropertyValue::Bool(defaults.qos));
        element.set_property("max-lateness", PropertyValue::Int(defaults.max_lateness));
        self.add_ghost_pad("sink", queue)
    }

    /// A batch source with a `src` ghost pad.
    pub fn source(name: &str, live: bool) -> Result<Bintr> {
        let source = Elementr::of_kind(ElementKind::Source, format!("{}-source", name));
        let bin = Bintr::build(
            name,
            BinKind::Source {
                source: source.clone(),
                live,
            },
        );
        bin.adopt(Child::Element(source.clone()));
        source
            .element()
            .set_property("is-live", PropertyValue::Bool(live));
        bin.add_ghost_pad("src", &source)?;
        Ok(bin)
    }

    // ---------------------------------------------------------------------
    // Sink properties
    // ---------------------------------------------------------------------

    /// Current sink properties, for sink kinds.
    pub fn sink_properties(&self) -> Option<SinkProperties> {
        let element = self.kind().sink_element()?.element();
        let flag = |name: &str, default: bool| match element.property(name) {
            Some(PropertyValue::Bool(value)) => value,
            _ => default,
        };
        let defaults = SinkProperties::default();
        Some(SinkProperties {
            sync: flag("sync", defaults.sync),
            async_: flag("async", defaults.async_),
            qos: flag("qos", defaults.qos),
            max_lateness: match element.property("max-lateness") {
                Some(PropertyValue::Int(value)) => value,
                _ => defaults.max_lateness,
            },
        })
    }

    fn set_sink_property(&self, name: &str, value: PropertyValue) -> bool {
        let Some(sink) = self.kind().sink_element() else {
            tracing::error!(component = %self.name(), property = %name, "component is not a sink");
            return false;
        };
        if self.is_linked() {
            tracing::error!(
                component = %self.name(),
                property = %name,
                "unable to set sink property while linked"
            );
            return false;
        }
        tracing::debug!(component = %self.name(), property = %name, ?value, "sink property set");
        sink.element().set_property(name, value);
        true
    }

    /// Set clock synchronization. Rejected while linked.
    pub fn set_sync(&self, sync: bool) -> bool {
        self.set_sink_property("sync", PropertyValue::Bool(sync))
    }

    /// Set asynchronous state changes. Rejected while linked.
    pub fn set_async(&self, async_: bool) -> bool {
        self.set_sink_property("async", PropertyValue::Bool(async_))
    }

    /// Set quality-of-service events. Rejected while linked.
    pub fn set_qos(&self, qos: bool) -> bool {
        self.set_sink_property("qos", PropertyValue::Bool(qos))
    }

    /// Set maximum lateness in nanoseconds. Rejected while linked.
    pub fn set_max_lateness(&self, max_lateness: i64) -> bool {
        self.set_sink_property("max-lateness", PropertyValue::Int(max_lateness))
    }
}
