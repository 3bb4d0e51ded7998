//! # Integration Tests
//!
//! End-to-end tests for the fusion pipeline, no live transports required.
//!
//! Covers:
//! - Contract snapshot checks
//! - Full pipeline runs against mock transports
//! - Correlation protocol behavior under faults

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_blueprint_loads_from_toml() {
        let toml = r#"
            [site]
            id = "site-042"
            zone = "nb-lane-1"

            [correlator]
            camera_timeout_ms = 1500
            max_pending = 100

            [[sinks]]
            name = "log"
            sink_type = "log"
        "#;

        let blueprint =
            config_loader::ConfigLoader::load_from_str(toml, config_loader::ConfigFormat::Toml)
                .unwrap();
        assert_eq!(blueprint.site.zone, "nb-lane-1");
        assert_eq!(blueprint.correlator.camera_timeout_ms, 1500);
        assert_eq!(blueprint.ingest.channel_capacity, 256);
        assert_eq!(blueprint.sinks.len(), 1);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use bytes::Bytes;
    use chrono::Utc;
    use contracts::{
        CameraStatus, Channel, ConsolidatedEvent, CorrelatorConfig, LocalWeather, MessageCallback,
        MessageSource, RadarDetection, SinkConfig, SinkType, TravelDirection, WeatherConfig,
        WeatherSnapshot, UNCLASSIFIED,
    };
    use correlation::{Consolidator, Correlator, WeatherCache};
    use ingestion::{
        BackpressureConfig, MessageIntake, MockCameraConfig, MockCameraResponder,
        NullCameraPublisher,
    };
    use observability::FusionMetricsAggregator;
    use tokio::sync::mpsc;

    /// Radar source that delivers a fixed script of detections on listen.
    struct ScriptedRadarSource {
        payloads: Mutex<Vec<Bytes>>,
        listening: Arc<AtomicBool>,
    }

    impl ScriptedRadarSource {
        fn new(detections: Vec<RadarDetection>) -> Self {
            let payloads = detections
                .iter()
                .map(|d| Bytes::from(serde_json::to_vec(d).unwrap()))
                .collect();
            Self {
                payloads: Mutex::new(payloads),
                listening: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl MessageSource for ScriptedRadarSource {
        fn channel(&self) -> Channel {
            Channel::RadarDetections
        }

        fn listen(&self, callback: MessageCallback) {
            if self.listening.swap(true, Ordering::SeqCst) {
                return;
            }
            for payload in self.payloads.lock().unwrap().drain(..) {
                callback(payload);
            }
        }

        fn stop(&self) {
            self.listening.store(false, Ordering::SeqCst);
        }

        fn is_listening(&self) -> bool {
            self.listening.load(Ordering::Relaxed)
        }
    }

    fn detection(speed: f64) -> RadarDetection {
        RadarDetection {
            speed,
            magnitude: 120.0,
            direction: TravelDirection::Inbound,
            detected_at: Utc::now(),
        }
    }

    /// Wire intake -> correlator -> consolidator with a shared camera
    /// responder, returning the consolidated event stream.
    fn build_pipeline(
        detections: Vec<RadarDetection>,
        camera: Arc<MockCameraResponder>,
        timeout_ms: u64,
        max_pending: usize,
    ) -> (
        MessageIntake,
        Arc<Correlator<MockCameraResponder>>,
        mpsc::Receiver<ConsolidatedEvent>,
    ) {
        let mut intake = MessageIntake::new(BackpressureConfig::default());
        intake.register_source(Box::new(ScriptedRadarSource::new(detections)));

        // The responder also feeds the camera channel
        struct SourceRef(Arc<MockCameraResponder>);
        impl MessageSource for SourceRef {
            fn channel(&self) -> Channel {
                self.0.channel()
            }
            fn listen(&self, callback: MessageCallback) {
                self.0.listen(callback)
            }
            fn stop(&self) {
                self.0.stop()
            }
            fn is_listening(&self) -> bool {
                self.0.is_listening()
            }
        }
        intake.register_source(Box::new(SourceRef(camera.clone())));

        let radar_rx = intake.take_radar_receiver().unwrap();
        let camera_rx = intake.take_camera_receiver().unwrap();

        let config = CorrelatorConfig {
            camera_timeout_ms: timeout_ms,
            max_pending,
        };
        let (outcome_tx, outcome_rx) = mpsc::channel(64);
        let correlator = Arc::new(Correlator::new(&config, "nb-lane-1", camera, outcome_tx));

        {
            let correlator = correlator.clone();
            tokio::spawn(async move { correlator.run(radar_rx, camera_rx).await });
        }

        let weather = Arc::new(WeatherCache::new(8));
        weather.record(WeatherSnapshot {
            local: LocalWeather {
                temperature_c: 17.0,
                humidity_pct: 62.0,
            },
            airport: None,
            // Backdated so the snapshot is at-or-before the detections,
            // which were stamped before this fixture runs.
            observed_at: Utc::now() - chrono::Duration::minutes(1),
        });
        let consolidator = Arc::new(Consolidator::new(weather, &WeatherConfig::default()));
        let (event_tx, event_rx) = mpsc::channel(64);
        tokio::spawn(async move { consolidator.run(outcome_rx, event_tx).await });

        (intake, correlator, event_rx)
    }

    async fn collect_events(
        rx: &mut mpsc::Receiver<ConsolidatedEvent>,
        count: usize,
        deadline: Duration,
    ) -> Vec<ConsolidatedEvent> {
        let mut events = Vec::with_capacity(count);
        let collect = async {
            while events.len() < count {
                match rx.recv().await {
                    Some(event) => events.push(event),
                    None => break,
                }
            }
        };
        let _ = tokio::time::timeout(deadline, collect).await;
        events
    }

    /// Happy path: every radar trigger gets a classified, weather-enriched
    /// event well before the deadline.
    #[tokio::test]
    async fn test_e2e_matched_events() {
        let camera = Arc::new(MockCameraResponder::with_latency(20));
        let (intake, correlator, mut event_rx) = build_pipeline(
            vec![detection(25.5), detection(40.0), detection(90.0)],
            camera.clone(),
            2000,
            100,
        );
        intake.start_all();

        let events = collect_events(&mut event_rx, 3, Duration::from_secs(3)).await;
        assert_eq!(events.len(), 3);

        for event in &events {
            assert_eq!(event.camera_status, CameraStatus::Matched);
            assert_ne!(event.vehicle_type, UNCLASSIFIED);
            let camera_data = event.camera.as_ref().unwrap();
            assert!((0.0..=1.0).contains(&camera_data.confidence));
            assert!(event.weather.is_some());
        }

        // Sequence numbers are strictly increasing.
        let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);

        assert_eq!(camera.requests_seen(), 3);
        assert_eq!(correlator.metrics().snapshot().matched, 3);
    }

    /// Camera offline: every trigger still produces exactly one event, as
    /// radar-only with timed_out status.
    #[tokio::test]
    async fn test_e2e_camera_silent_times_out() {
        let mut intake = MessageIntake::new(BackpressureConfig::default());
        intake.register_source(Box::new(ScriptedRadarSource::new(vec![
            detection(30.0),
            detection(55.0),
        ])));
        let radar_rx = intake.take_radar_receiver().unwrap();
        let camera_rx = intake.take_camera_receiver().unwrap();

        let config = CorrelatorConfig {
            camera_timeout_ms: 100,
            max_pending: 100,
        };
        let (outcome_tx, outcome_rx) = mpsc::channel(64);
        let correlator = Arc::new(Correlator::new(
            &config,
            "nb-lane-1",
            Arc::new(NullCameraPublisher),
            outcome_tx,
        ));
        {
            let correlator = correlator.clone();
            tokio::spawn(async move { correlator.run(radar_rx, camera_rx).await });
        }

        let consolidator = Arc::new(Consolidator::new(
            Arc::new(WeatherCache::new(4)),
            &WeatherConfig::default(),
        ));
        let (event_tx, mut event_rx) = mpsc::channel(64);
        tokio::spawn(async move { consolidator.run(outcome_rx, event_tx).await });

        intake.start_all();

        let events = collect_events(&mut event_rx, 2, Duration::from_secs(2)).await;
        assert_eq!(events.len(), 2);
        for event in &events {
            assert_eq!(event.camera_status, CameraStatus::TimedOut);
            assert_eq!(event.vehicle_type, UNCLASSIFIED);
            assert!(event.camera.is_none());
        }
        assert_eq!(correlator.metrics().snapshot().timed_out, 2);
    }

    /// Duplicate responses resolve nothing twice: one event per trigger,
    /// the second copy is counted as an orphan.
    #[tokio::test]
    async fn test_e2e_duplicate_responses_are_ignored() {
        let camera = Arc::new(MockCameraResponder::new(MockCameraConfig {
            latency_ms: 10,
            duplicate_probability: 1.0,
            ..Default::default()
        }));
        let (intake, correlator, mut event_rx) = build_pipeline(
            vec![detection(20.0), detection(35.0), detection(50.0)],
            camera,
            2000,
            100,
        );
        intake.start_all();

        let events = collect_events(&mut event_rx, 3, Duration::from_secs(3)).await;
        assert_eq!(events.len(), 3);

        // Give the duplicate copies time to land and be discarded.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(
            tokio::time::timeout(Duration::from_millis(100), event_rx.recv())
                .await
                .is_err(),
            "duplicates must not produce extra events"
        );

        let snapshot = correlator.metrics().snapshot();
        assert_eq!(snapshot.matched, 3);
        assert_eq!(snapshot.orphan_responses, 3);
    }

    /// Camera answered but classified nothing: event is emitted with
    /// not_available status and the unclassified fallback label.
    #[tokio::test]
    async fn test_e2e_empty_classification_not_available() {
        let camera = Arc::new(MockCameraResponder::new(MockCameraConfig {
            latency_ms: 10,
            empty_probability: 1.0,
            ..Default::default()
        }));
        let (intake, _correlator, mut event_rx) =
            build_pipeline(vec![detection(45.0)], camera, 2000, 100);
        intake.start_all();

        let events = collect_events(&mut event_rx, 1, Duration::from_secs(2)).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].camera_status, CameraStatus::NotAvailable);
        assert_eq!(events[0].vehicle_type, UNCLASSIFIED);
        assert!(events[0].camera.is_some());
    }

    /// Pending bound: overload force-expires the oldest correlations as
    /// valid timed_out events instead of growing without limit.
    #[tokio::test]
    async fn test_e2e_pending_bound_evicts_oldest() {
        let mut intake = MessageIntake::new(BackpressureConfig::default());
        intake.register_source(Box::new(ScriptedRadarSource::new(
            (1..=5).map(|i| detection(i as f64)).collect(),
        )));
        let radar_rx = intake.take_radar_receiver().unwrap();
        let camera_rx = intake.take_camera_receiver().unwrap();

        let config = CorrelatorConfig {
            camera_timeout_ms: 60_000,
            max_pending: 2,
        };
        let (outcome_tx, outcome_rx) = mpsc::channel(64);
        let correlator = Arc::new(Correlator::new(
            &config,
            "nb-lane-1",
            Arc::new(NullCameraPublisher),
            outcome_tx,
        ));
        {
            let correlator = correlator.clone();
            tokio::spawn(async move { correlator.run(radar_rx, camera_rx).await });
        }

        let consolidator = Arc::new(Consolidator::new(
            Arc::new(WeatherCache::new(4)),
            &WeatherConfig::default(),
        ));
        let (event_tx, mut event_rx) = mpsc::channel(64);
        tokio::spawn(async move { consolidator.run(outcome_rx, event_tx).await });

        intake.start_all();

        // 5 triggers into a table of 2: the 3 oldest are force-expired.
        let events = collect_events(&mut event_rx, 3, Duration::from_secs(2)).await;
        assert_eq!(events.len(), 3);
        for event in &events {
            assert_eq!(event.camera_status, CameraStatus::TimedOut);
        }
        assert_eq!(correlator.pending_len(), 2);
        assert_eq!(correlator.metrics().snapshot().evicted, 3);
    }

    /// Full fan-out: consolidated events reach every configured sink.
    #[tokio::test]
    async fn test_e2e_pipeline_through_dispatcher() {
        let camera = Arc::new(MockCameraResponder::with_latency(10));
        let (intake, _correlator, mut event_rx) = build_pipeline(
            vec![detection(22.0), detection(66.0)],
            camera,
            2000,
            100,
        );

        let sink_configs = vec![SinkConfig {
            name: "test_log".to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 50,
            retry: Default::default(),
            params: Default::default(),
        }];
        let (dispatch_tx, dispatch_rx) = mpsc::channel(64);
        let (dispatcher_handle, sink_metrics) = dispatcher::create_dispatcher(
            dispatcher::DispatcherConfig {
                sinks: sink_configs,
            },
            dispatch_rx,
        )
        .await
        .unwrap();

        intake.start_all();

        let mut aggregator = FusionMetricsAggregator::new();
        let events = collect_events(&mut event_rx, 2, Duration::from_secs(3)).await;
        assert_eq!(events.len(), 2);
        for event in events {
            aggregator.update(&event);
            dispatch_tx.send(event).await.unwrap();
        }

        drop(dispatch_tx);
        dispatcher_handle.await.unwrap();

        assert_eq!(aggregator.total_events, 2);
        assert_eq!(aggregator.matched, 2);
        assert_eq!(sink_metrics[0].1.delivered_count(), 2);
    }
}
