//! Integration tests for batch-meta handler registration and dispatch.

use bintr::batch::{Batch, FrameMeta, ObjectMeta};
use bintr::bintr::Bintr;
use bintr::engine::{FlowReturn, ProbeReturn};
use bintr::pads::PadSide;
use bintr::probe::{HandlerRef, PadProbe, handler};
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn recording(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> HandlerRef {
    let log = Arc::clone(log);
    let tag = tag.to_string();
    handler(move |_| {
        log.lock().unwrap().push(tag.clone());
        ProbeReturn::Ok
    })
}

/// H1 then H2 on the src pad; H1 later starts dropping and H2 stops seeing
/// batches.
#[test]
fn test_order_then_drop() {
    let component = Bintr::queue("c").unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let drop_next = Arc::new(AtomicBool::new(false));

    let h1 = {
        let log = Arc::clone(&log);
        let drop_next = Arc::clone(&drop_next);
        handler(move |_| {
            log.lock().unwrap().push("h1".to_string());
            if drop_next.load(Ordering::SeqCst) {
                ProbeReturn::Drop
            } else {
                ProbeReturn::Ok
            }
        })
    };
    let h2 = recording(&log, "h2");
    assert!(component.add_batch_meta_handler(PadSide::Src, h1));
    assert!(component.add_batch_meta_handler(PadSide::Src, h2));

    // nothing is linked downstream; the src probe still sees the batch
    assert_eq!(component.push(Batch::new(0)), FlowReturn::NotLinked);
    assert_eq!(*log.lock().unwrap(), vec!["h1", "h2"]);

    log.lock().unwrap().clear();
    drop_next.store(true, Ordering::SeqCst);
    assert_eq!(component.push(Batch::new(1)), FlowReturn::Dropped);
    assert_eq!(*log.lock().unwrap(), vec!["h1"]);
}

#[test]
fn test_duplicate_registration() {
    let component = Bintr::queue("c").unwrap();
    let h = handler(|_| ProbeReturn::Ok);

    assert!(component.add_batch_meta_handler(PadSide::Sink, h.clone()));
    assert!(!component.add_batch_meta_handler(PadSide::Sink, h.clone()));
    // the same handler may sit on the other side
    assert!(component.add_batch_meta_handler(PadSide::Src, h.clone()));
    assert_eq!(component.batch_meta_handler_count(PadSide::Sink), 1);

    let unregistered = handler(|_| ProbeReturn::Ok);
    assert!(!component.remove_batch_meta_handler(PadSide::Sink, &unregistered));
    assert!(component.remove_batch_meta_handler(PadSide::Sink, &h));
    assert!(!component.remove_batch_meta_handler(PadSide::Sink, &h));
    assert_eq!(component.batch_meta_handler_count(PadSide::Src), 1);
}

#[test]
fn test_invalid_pad_ids() {
    let component = Bintr::queue("c").unwrap();
    let h = handler(|_| ProbeReturn::Ok);
    for id in [2, 3, u32::MAX] {
        assert!(!component.add_batch_meta_handler_by_id(id, h.clone()));
        assert!(!component.remove_batch_meta_handler_by_id(id, &h));
    }
    assert_eq!(component.batch_meta_handler_count(PadSide::Sink), 0);
    assert_eq!(component.batch_meta_handler_count(PadSide::Src), 0);
    assert!(component.add_batch_meta_handler_by_id(1, h.clone()));
    assert!(component.remove_batch_meta_handler_by_id(1, &h));
}

#[test]
fn test_handlers_see_mutations_of_earlier_handlers() {
    let sink = Bintr::fake_sink("sink").unwrap();
    assert!(sink.link_all());

    let labelled = Arc::new(Mutex::new(Vec::new()));
    sink.add_batch_meta_handler(
        PadSide::Sink,
        handler(|batch: &mut Batch| {
            for frame in &mut batch.frames {
                for object in &mut frame.objects {
                    object.label = Some(format!("class-{}", object.class_id));
                }
            }
            ProbeReturn::Ok
        }),
    );
    let seen = Arc::clone(&labelled);
    sink.add_batch_meta_handler(
        PadSide::Sink,
        handler(move |batch: &mut Batch| {
            for frame in &batch.frames {
                for object in &frame.objects {
                    seen.lock().unwrap().push(object.label.clone());
                }
            }
            ProbeReturn::Ok
        }),
    );

    let frame = FrameMeta::new(0, 1).with_object(ObjectMeta {
        class_id: 2,
        confidence: 0.9,
        ..Default::default()
    });
    assert_eq!(sink.push(Batch::new(0).with_frame(frame)), FlowReturn::Ok);
    assert_eq!(*labelled.lock().unwrap(), vec![Some("class-2".to_string())]);
}

#[test]
fn test_dropped_batch_never_reaches_sink() {
    let pipeline = Bintr::pipeline("pipeline");
    let source = Bintr::source("source", false).unwrap();
    let sink = Bintr::fake_sink("sink").unwrap();
    source.add_to_parent(&pipeline);
    sink.add_to_parent(&pipeline);
    assert!(pipeline.link_all());

    let odd = handler(|batch: &mut Batch| {
        if batch.sequence % 2 == 1 {
            ProbeReturn::Drop
        } else {
            ProbeReturn::Ok
        }
    });
    assert!(source.add_batch_meta_handler(PadSide::Src, odd));
    for sequence in 0..10 {
        source.push(Batch::new(sequence));
    }
    let bintr::bintr::BinKind::FakeSink { sink: element, .. } = sink.kind() else {
        panic!("not a fake sink");
    };
    assert_eq!(element.element().batches_received(), 5);
}

#[test]
fn test_batch_dump_writes_one_line_per_batch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("batches.jsonl");
    let component = Bintr::queue("osd").unwrap();
    component.set_batch_dump(Some(&path)).unwrap();

    for sequence in 0..3 {
        component.push(Batch::new(sequence).with_frame(FrameMeta::new(0, sequence)));
    }
    component.set_batch_dump(None).unwrap();
    component.push(Batch::new(3));

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    for (i, line) in lines.iter().enumerate() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["probe"], "osd-src-pad-probe");
        assert_eq!(value["sequence"], i as u64);
    }
}

#[test]
fn test_batch_dump_needs_src_pad() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Bintr::fake_sink("sink").unwrap();
    assert!(matches!(
        sink.set_batch_dump(Some(&dir.path().join("x.jsonl"))),
        Err(bintr::Error::PadNotFound { .. })
    ));
}

/// Batches flow on a streaming thread while handlers are added and removed
/// from the calling thread. Once removal returns the handler never runs again.
#[test]
fn test_no_invocation_after_removal_under_streaming() {
    let component = Bintr::queue("live").unwrap();
    let running = Arc::new(AtomicBool::new(true));
    let pushed = Arc::new(AtomicU64::new(0));

    let streaming = {
        let component = component.clone();
        let running = Arc::clone(&running);
        let pushed = Arc::clone(&pushed);
        thread::spawn(move || {
            let mut sequence = 0;
            while running.load(Ordering::SeqCst) {
                component.push(Batch::new(sequence));
                sequence += 1;
                pushed.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    for _ in 0..50 {
        let removed = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicU64::new(0));
        let late_calls = Arc::new(AtomicU64::new(0));
        let h = {
            let removed = Arc::clone(&removed);
            let calls = Arc::clone(&calls);
            let late_calls = Arc::clone(&late_calls);
            handler(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                if removed.load(Ordering::SeqCst) {
                    late_calls.fetch_add(1, Ordering::SeqCst);
                }
                ProbeReturn::Ok
            })
        };
        assert!(component.add_batch_meta_handler(PadSide::Src, h.clone()));

        let deadline = Instant::now() + Duration::from_secs(5);
        while calls.load(Ordering::SeqCst) == 0 {
            assert!(Instant::now() < deadline, "handler never invoked");
            thread::yield_now();
        }

        assert!(component.remove_batch_meta_handler(PadSide::Src, &h));
        removed.store(true, Ordering::SeqCst);

        // let more batches through before checking
        let seen = pushed.load(Ordering::SeqCst);
        while pushed.load(Ordering::SeqCst) < seen + 10 {
            assert!(Instant::now() < deadline, "streaming thread stalled");
            thread::yield_now();
        }
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
    }

    running.store(false, Ordering::SeqCst);
    streaming.join().unwrap();
    assert_eq!(component.batch_meta_handler_count(PadSide::Src), 0);
    assert!(pushed.load(Ordering::SeqCst) > 0);
}

proptest! {
    /// Dispatch order equals registration order, and a drop at position k
    /// hides the batch from every later handler.
    #[test]
    fn prop_registration_order(count in 1usize..8, drop_at in proptest::option::of(0usize..8)) {
        let probe = PadProbe::new("prop");
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..count {
            let log = Arc::clone(&log);
            probe.add_batch_meta_handler(handler(move |_| {
                log.lock().unwrap().push(i);
                if Some(i) == drop_at { ProbeReturn::Drop } else { ProbeReturn::Ok }
            }));
        }

        let result = probe.dispatch(&mut Batch::new(0));
        let seen = log.lock().unwrap().clone();
        match drop_at {
            Some(k) if k < count => {
                prop_assert_eq!(result, ProbeReturn::Drop);
                prop_assert_eq!(seen, (0..=k).collect::<Vec<_>>());
            }
            _ => {
                prop_assert_eq!(result, ProbeReturn::Ok);
                prop_assert_eq!(seen, (0..count).collect::<Vec<_>>());
            }
        }
    }
}
