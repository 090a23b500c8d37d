//! # Integration Tests
//!
//! Cross-crate tests exercising the full path from configuration through
//! storage, slicing and surface accumulation.

#[cfg(test)]
mod pipeline_tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{Event, Frame, FrameFormat, PipelineError, Timestamp, TimeWindow};
    use event_store::EventStore;
    use observability::WindowMetricsAggregator;
    use sync_engine::{GapPolicy, MultiStreamSlicer};
    use time_surface::{SpeedInvariantTimeSurface, TimeSurface};

    const PIPELINE_TOML: &str = r#"
[[streams]]
name = "events"
kind = "events"
width = 32
height = 32

[[streams]]
name = "frames"
kind = "frames"
rate_hz = 25.0

[store]
shard_capacity = 64

[surface]
patch_diameter = 4

[slicer]
main_stream = "events"
"#;

    fn make_event(timestamp: Timestamp) -> Event {
        Event::new(timestamp, (timestamp % 32) as i16, ((timestamp / 7) % 32) as i16, true)
    }

    fn store_of(timestamps: impl IntoIterator<Item = Timestamp>) -> EventStore {
        EventStore::from_events(timestamps.into_iter().map(make_event).collect()).unwrap()
    }

    fn make_frame(timestamp: Timestamp) -> Frame {
        Frame {
            timestamp,
            width: 32,
            height: 32,
            format: FrameFormat::Gray8,
            data: bytes::Bytes::from_static(&[0; 4]),
        }
    }

    /// Configuration drives the construction of every engine component.
    #[test]
    fn test_blueprint_wires_the_engine() {
        let blueprint = ConfigLoader::load_from_str(PIPELINE_TOML, ConfigFormat::Toml).unwrap();

        let mut store = EventStore::new();
        store.set_shard_capacity(blueprint.store.shard_capacity);
        assert_eq!(store.shard_capacity(), 64);

        let (rows, cols) = blueprint.surface_shape().unwrap();
        let surface = TimeSurface::new(rows, cols);
        assert_eq!((surface.rows(), surface.cols()), (32, 32));

        let invariant =
            SpeedInvariantTimeSurface::new(rows, cols, blueprint.surface.patch_diameter);
        assert!(invariant.is_ok());

        let slicer = MultiStreamSlicer::<EventStore>::new(blueprint.slicer.main_stream.as_str());
        drop(slicer);
    }

    /// Events flow through the synchronizer into a time surface; the
    /// delivered slices stay aligned with their windows.
    #[test]
    fn test_events_to_surface_pipeline() {
        let mut slicer = MultiStreamSlicer::<EventStore>::new("events");
        slicer.add_stream::<Vec<Frame>>("frames").unwrap();

        let surface = Rc::new(RefCell::new(TimeSurface::new(32, 32)));
        let windows: Rc<RefCell<Vec<TimeWindow>>> = Rc::new(RefCell::new(Vec::new()));

        let surface_sink = Rc::clone(&surface);
        let window_sink = Rc::clone(&windows);
        slicer
            .every_interval(100, move |window, data| {
                let events: &EventStore = data.get("events").unwrap();
                // every delivered record lies inside the window
                assert!(events.iter().all(|e| window.contains(e.timestamp)));
                surface_sink.borrow_mut().accept(events).unwrap();
                window_sink.borrow_mut().push(*window);
            })
            .unwrap();

        // feed in three batches; frames lag behind and gate progress
        slicer.accept("events", store_of(0..150)).unwrap();
        slicer.accept("frames", vec![make_frame(80)]).unwrap();
        slicer.accept("events", store_of(150..260)).unwrap();
        slicer.accept("frames", vec![make_frame(250)]).unwrap();

        let fired = windows.borrow();
        assert_eq!(
            *fired,
            vec![TimeWindow::new(0, 100), TimeWindow::new(100, 200)]
        );

        // the surface saw every event below the last fired window end
        let surface = surface.borrow();
        let newest = surface.at(make_event(199).y, make_event(199).x).unwrap();
        assert_eq!(newest, 199);
    }

    /// The spec scenario: 250 events against a 100-count BACKWARD job fire
    /// exactly twice, and the delivered frame slices tile the covered range
    /// with no duplicates and no gaps.
    #[test]
    fn test_count_job_frame_attribution() {
        let mut slicer = MultiStreamSlicer::<EventStore>::new("events");
        slicer.add_stream::<Vec<Frame>>("frames").unwrap();

        let delivered: Rc<RefCell<Vec<Vec<Timestamp>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&delivered);
        slicer
            .every_count(100, GapPolicy::Backward, move |_, data| {
                let frames: &Vec<Frame> = data.get("frames").unwrap();
                sink.borrow_mut()
                    .push(frames.iter().map(|f| f.timestamp).collect());
            })
            .unwrap();

        slicer.accept("events", store_of(1..=250)).unwrap();
        let all_frames: Vec<Timestamp> = (0..50).map(|i| i * 5 + 3).collect();
        slicer
            .accept("frames", all_frames.iter().map(|&t| make_frame(t)).collect::<Vec<_>>())
            .unwrap();

        let slices = delivered.borrow();
        assert_eq!(slices.len(), 2);

        let union: Vec<Timestamp> = slices.iter().flatten().copied().collect();
        let mut deduped = union.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), union.len(), "no duplicates");

        // every ingested frame below the second window's end arrived once
        let expected: Vec<Timestamp> = all_frames.iter().copied().filter(|&t| t <= 200).collect();
        assert_eq!(deduped, expected);
    }

    /// Slices handed to callbacks share storage shallowly; trimming the
    /// live buffers never mutates data already delivered.
    #[test]
    fn test_delivered_slices_survive_trimming() {
        let mut slicer = MultiStreamSlicer::<EventStore>::new("events");

        let kept: Rc<RefCell<Vec<EventStore>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&kept);
        slicer
            .every_count(10, GapPolicy::Backward, move |_, data| {
                sink.borrow_mut()
                    .push(data.get::<EventStore>("events").unwrap().clone());
            })
            .unwrap();

        for batch in [store_of(0..25), store_of(25..50)] {
            slicer.accept("events", batch).unwrap();
        }

        let kept = kept.borrow();
        assert_eq!(kept.len(), 5);
        for (index, slice) in kept.iter().enumerate() {
            assert_eq!(slice.len(), 10);
            assert_eq!(slice.lowest_time(), index as i64 * 10);
        }
    }

    /// Speed-invariant surface fed from sliced windows matches one fed from
    /// the unsliced stream: slicing is transparent to consumers.
    #[test]
    fn test_surface_invariant_to_slicing() {
        let events = store_of(0..200);

        let mut direct = SpeedInvariantTimeSurface::new(32, 32, 4).unwrap();
        direct.accept(&events).unwrap();

        let sliced_surface = Rc::new(RefCell::new(
            SpeedInvariantTimeSurface::new(32, 32, 4).unwrap(),
        ));
        let sink = Rc::clone(&sliced_surface);

        let mut slicer = MultiStreamSlicer::<EventStore>::new("events");
        slicer
            .every_count(17, GapPolicy::Backward, move |_, data| {
                let events: &EventStore = data.get("events").unwrap();
                sink.borrow_mut().accept(events).unwrap();
            })
            .unwrap();
        slicer.accept("events", events.clone()).unwrap();

        // 11 full windows of 17 records fired, 13 records remain pending;
        // replay the tail to align both surfaces
        let tail = events.slice_from(11 * 17);
        sliced_surface.borrow_mut().accept(&tail).unwrap();

        let sliced_surface = sliced_surface.borrow();
        for y in 0..32 {
            for x in 0..32 {
                assert_eq!(direct.at(y, x).unwrap(), sliced_surface.at(y, x).unwrap());
            }
        }
    }

    /// Ordering violations surface as errors at the engine boundary and
    /// leave the buffers usable.
    #[test]
    fn test_ordering_violation_is_loud_and_recoverable() {
        let mut slicer = MultiStreamSlicer::<EventStore>::new("events");
        slicer.accept("events", store_of([10, 20])).unwrap();

        let err = slicer.accept("events", store_of([5])).unwrap_err();
        assert!(matches!(err, PipelineError::OrderingViolation { .. }));

        // the engine keeps working after the rejected batch
        slicer.accept("events", store_of([30])).unwrap();
    }

    /// The producer and consumer ports carry data in and out of the core
    /// without the core knowing anything about their implementation.
    #[test]
    fn test_ports_frame_the_engine() {
        use std::sync::{Arc, Mutex};

        use contracts::{BatchCallback, BatchSource, StreamKind, WindowSink};

        /// Replays canned event batches through the producer port.
        struct ReplaySource {
            batches: Vec<Vec<Event>>,
            callback: Mutex<Option<BatchCallback<Vec<Event>>>>,
        }

        impl ReplaySource {
            fn emit_all(&self) {
                let callback = self.callback.lock().unwrap();
                if let Some(callback) = callback.as_ref() {
                    for batch in &self.batches {
                        callback(batch.clone());
                    }
                }
            }
        }

        impl BatchSource<Vec<Event>> for ReplaySource {
            fn stream_name(&self) -> &str {
                "events"
            }

            fn kind(&self) -> StreamKind {
                StreamKind::Events
            }

            fn listen(&self, callback: BatchCallback<Vec<Event>>) {
                let mut slot = self.callback.lock().unwrap();
                if slot.is_none() {
                    *slot = Some(callback);
                }
            }

            fn stop(&self) {
                self.callback.lock().unwrap().take();
            }

            fn is_listening(&self) -> bool {
                self.callback.lock().unwrap().is_some()
            }
        }

        /// Collects committed windows through the consumer port.
        #[derive(Default)]
        struct CollectingSink {
            committed: Vec<(TimeWindow, usize)>,
            closed: bool,
        }

        impl WindowSink<EventStore> for CollectingSink {
            fn name(&self) -> &str {
                "collector"
            }

            fn commit(
                &mut self,
                window: &TimeWindow,
                data: EventStore,
            ) -> Result<(), PipelineError> {
                self.committed.push((*window, data.len()));
                Ok(())
            }

            fn flush(&mut self) -> Result<(), PipelineError> {
                Ok(())
            }

            fn close(&mut self) -> Result<(), PipelineError> {
                self.closed = true;
                Ok(())
            }
        }

        let source = ReplaySource {
            batches: vec![
                (0..60).map(make_event).collect(),
                (60..120).map(make_event).collect(),
            ],
            callback: Mutex::new(None),
        };

        let received: Arc<Mutex<Vec<Vec<Event>>>> = Arc::new(Mutex::new(Vec::new()));
        let inbox = Arc::clone(&received);
        source.listen(Arc::new(move |batch| {
            inbox.lock().unwrap().push(batch);
        }));
        assert!(source.is_listening());
        source.emit_all();
        source.stop();
        assert!(!source.is_listening());

        // drain the port deliveries into the engine and commit windows out
        let sink = Rc::new(RefCell::new(CollectingSink::default()));
        let sink_handle = Rc::clone(&sink);

        let mut slicer = MultiStreamSlicer::<EventStore>::new("events");
        slicer
            .every_interval(50, move |window, data| {
                let events: &EventStore = data.get("events").unwrap();
                sink_handle
                    .borrow_mut()
                    .commit(window, events.clone())
                    .unwrap();
            })
            .unwrap();

        for batch in received.lock().unwrap().drain(..) {
            slicer
                .accept("events", EventStore::from_events(batch).unwrap())
                .unwrap();
        }

        let mut sink = sink.borrow_mut();
        assert_eq!(
            sink.committed,
            vec![(TimeWindow::new(0, 50), 50), (TimeWindow::new(50, 100), 50)]
        );
        sink.close().unwrap();
        assert!(sink.closed);
    }

    /// The metrics aggregator consumes fired windows end to end.
    #[test]
    fn test_window_metrics_aggregation() {
        let aggregator = Rc::new(RefCell::new(WindowMetricsAggregator::new()));
        let sink = Rc::clone(&aggregator);

        let mut slicer = MultiStreamSlicer::<EventStore>::new("events");
        slicer
            .every_interval(50, move |window, data| {
                let events: &EventStore = data.get("events").unwrap();
                let mut counts = HashMap::new();
                counts.insert("events".to_string(), events.len());
                sink.borrow_mut().update(window, &counts);
            })
            .unwrap();

        slicer.accept("events", store_of(0..120)).unwrap();

        let summary = aggregator.borrow().summary();
        assert_eq!(summary.total_windows, 2);
        assert_eq!(summary.empty_windows, 0);
        assert_eq!(summary.stream_records.get("events"), Some(&100));
        assert!((summary.window_duration_us.mean - 50.0).abs() < 1e-9);
    }
}
