//! Top-level pipelines.
//!
//! A pipeline is a branch with its own [`Bus`]. Sinks post end-of-stream on
//! it; committed state changes of the pipeline are posted there too.

use super::{BinKind, Bintr, Child};
use crate::config::RuntimeConfig;
use crate::engine::{Bus, BusMessage, Event, State};
use std::fmt::Write;

impl Bintr {
    /// An empty pipeline with default timeouts.
    pub fn pipeline(name: &str) -> Bintr {
        Self::pipeline_with_config(name, RuntimeConfig::default())
    }

    /// An empty pipeline using `config`.
    pub fn pipeline_with_config(name: &str, config: RuntimeConfig) -> Bintr {
        let bin = Bintr::build(name, BinKind::Pipeline);
        bin.element().set_bus(Bus::new(config.bus_capacity));
        bin.set_runtime_config(config);
        bin
    }

    /// The pipeline's bus.
    pub fn bus(&self) -> Option<Bus> {
        self.element().bus()
    }

    fn sources(&self) -> Vec<Bintr> {
        let mut found = Vec::new();
        for child in self.children() {
            if let Child::Bin(bin) = child {
                if matches!(bin.kind(), BinKind::Source { .. }) {
                    found.push(bin.clone());
                }
                found.extend(bin.sources());
            }
        }
        found
    }

    /// Whether any source in the pipeline is live.
    pub fn is_live(&self) -> bool {
        self.sources()
            .iter()
            .any(|s| matches!(s.kind(), BinKind::Source { live: true, .. }))
    }

    fn send_source_event(&self, event: Event) -> bool {
        let mut delivered = false;
        for source in self.sources() {
            if let BinKind::Source { source: element, .. } = source.kind() {
                if let Some(pad) = element.static_pad("src") {
                    delivered |= pad.send_event(event.clone());
                }
            }
        }
        delivered
    }

    /// Link if needed, preroll non-live pipelines to `Paused`, then play.
    pub fn play(&self) -> bool {
        if !self.kind().is_pipeline() {
            tracing::error!(component = %self.name(), "only pipelines can play");
            return false;
        }
        let state = self.state();
        if matches!(state, State::Null | State::Ready) {
            if !self.is_linked() && !self.link_all() {
                tracing::error!(pipeline = %self.name(), "unable to prepare pipeline for play");
                return false;
            }
            if !self.is_live() && !self.set_state(State::Paused) {
                tracing::error!(pipeline = %self.name(), "failed to preroll non-live sources");
                return false;
            }
        }
        if !self.set_state(State::Playing) {
            return false;
        }
        self.send_source_event(Event::StreamStart {
            stream_id: self.name().to_string(),
        });
        true
    }

    /// Pause a playing pipeline.
    pub fn pause(&self) -> bool {
        let state = self.state();
        if state != State::Playing {
            tracing::warn!(pipeline = %self.name(), %state, "pipeline is not playing");
            return false;
        }
        if !self.set_state(State::Paused) {
            tracing::error!(pipeline = %self.name(), "failed to pause pipeline");
            return false;
        }
        true
    }

    /// Stop the pipeline: end the stream, wait for it to reach the sinks,
    /// drop to `Null` and unlink.
    ///
    /// A pipeline that is not linked is already stopped. A missing EOS
    /// within the configured wait is logged and the stop carries on.
    pub fn stop(&self) -> bool {
        if !self.kind().is_pipeline() {
            tracing::error!(component = %self.name(), "only pipelines can stop");
            return false;
        }
        if !self.is_linked() {
            tracing::warn!(pipeline = %self.name(), "pipeline is not linked");
            return true;
        }
        if self.state() == State::Paused && !self.set_state(State::Playing) {
            tracing::error!(pipeline = %self.name(), "failed to resume pipeline before stopping");
            return false;
        }

        if self.state() == State::Playing {
            let config = self.runtime_config();
            let mut receiver = self.bus().map(|bus| bus.subscribe());
            if self.send_source_event(Event::Eos) {
                let message = receiver.as_mut().and_then(|rx| {
                    rx.pop_filtered(config.eos_timeout(), config.state_poll_interval(), |m| {
                        matches!(m, BusMessage::Eos { .. } | BusMessage::Error { .. })
                    })
                });
                match message {
                    Some(BusMessage::Eos { source }) => {
                        tracing::info!(pipeline = %self.name(), sink = %source, "received final EOS")
                    }
                    other => tracing::warn!(
                        pipeline = %self.name(),
                        message = ?other,
                        "failed to receive final EOS"
                    ),
                }
            }
        }

        let ok = self.set_state(State::Null);
        if !ok {
            tracing::error!(pipeline = %self.name(), "failed to stop pipeline");
        }
        self.unlink_all();
        ok
    }

    /// Graphviz description of the component tree and its links.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", self.name());
        let _ = writeln!(out, "  rankdir=LR;");
        let mut edges = Vec::new();
        self.write_dot_cluster(&mut out, &mut edges, 1);
        for (from, to) in edges {
            let _ = writeln!(out, "  \"{}\" -> \"{}\";", from, to);
        }
        out.push_str("}\n");
        out
    }

    fn write_dot_cluster(&self, out: &mut String, edges: &mut Vec<(String, String)>, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = writeln!(out, "{}subgraph \"cluster_{}\" {{", indent, self.name());
        let _ = writeln!(
            out,
            "{}  label=\"{} ({}, {})\";",
            indent,
            self.name(),
            self.kind().name(),
            self.state()
        );
        for child in self.children() {
            let element = child.node().element();
            for pad in element.pads() {
                if pad.is_src() {
                    if let Some(peer) = pad.peer() {
                        edges.push((element.name().to_string(), peer.owner()));
                    }
                }
            }
            match &child {
                Child::Element(e) => {
                    let _ = writeln!(
                        out,
                        "{}  \"{}\" [label=\"{}\\n{}\"];",
                        indent,
                        e.name(),
                        e.name(),
                        e.element().kind().factory_name()
                    );
                }
                Child::Bin(bin) => bin.write_dot_cluster(out, edges, depth + 1),
            }
        }
        let _ = writeln!(out, "{}}}", indent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Batch;
    use crate::engine::FlowReturn;

    fn pipeline() -> (Bintr, Bintr, Bintr) {
        let pipeline = Bintr::pipeline_with_config("pipeline", RuntimeConfig::fast());
        let source = Bintr::source("camera", false).unwrap();
        let sink = Bintr::fake_sink("sink").unwrap();
        assert!(source.add_to_parent(&pipeline));
        assert!(sink.add_to_parent(&pipeline));
        (pipeline, source, sink)
    }

    #[test]
    fn test_pipeline_has_no_parent() {
        let (pipeline, _, _) = pipeline();
        let other = Bintr::pipeline("other");
        assert!(!pipeline.add_to_parent(&other));
        let branch = Bintr::branch("branch");
        assert!(!pipeline.add_to_parent(&branch));
        assert!(!pipeline.is_in_use());
    }

    #[test]
    fn test_play_pause_stop() {
        let (pipeline, source, _) = pipeline();
        assert!(!pipeline.pause());
        assert!(pipeline.play());
        assert!(pipeline.is_linked());
        assert_eq!(pipeline.state(), State::Playing);
        assert_eq!(source.push(Batch::new(0)), FlowReturn::Ok);

        assert!(pipeline.pause());
        assert_eq!(pipeline.state(), State::Paused);
        assert!(pipeline.stop());
        assert_eq!(pipeline.state(), State::Null);
        assert!(!pipeline.is_linked());
        // stopping a stopped pipeline is a no-op
        assert!(pipeline.stop());
    }

    #[test]
    fn test_is_live() {
        let pipeline = Bintr::pipeline("p");
        assert!(!pipeline.is_live());
        Bintr::source("rtsp", true).unwrap().add_to_parent(&pipeline);
        assert!(pipeline.is_live());
    }

    #[test]
    fn test_to_dot() {
        let (pipeline, _, _) = pipeline();
        assert!(pipeline.link_all());
        let dot = pipeline.to_dot();
        assert!(dot.starts_with("digraph \"pipeline\""));
        assert!(dot.contains("cluster_camera"));
        assert!(dot.contains("\"camera\" -> \"sink\""));
        assert!(dot.contains("\"sink-queue\" -> \"sink-sink\""));
    }
}
