//! Delivery and room feed tests
#![cfg(feature = "server")]

mod common {
    use bytes::Bytes;
    use room_frames::protocol::OutboundMessage;
    use room_frames::{Transport, TransportError};

    /// Records every send attempt; fails the attempt at `fail_at`.
    #[derive(Default)]
    pub struct ScriptedTransport {
        pub attempts: Vec<OutboundMessage>,
        pub fail_at: Option<usize>,
        pub reject: bool,
    }

    impl ScriptedTransport {
        pub fn failing_at(attempt: usize, reject: bool) -> Self {
            Self {
                fail_at: Some(attempt),
                reject,
                ..Default::default()
            }
        }

        pub fn keys(&self) -> Vec<&'static str> {
            self.attempts.iter().map(OutboundMessage::key).collect()
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(&mut self, message: OutboundMessage) -> Result<Option<Bytes>, TransportError> {
            let attempt = self.attempts.len();
            self.attempts.push(message);
            match self.fail_at {
                Some(n) if n == attempt && self.reject => {
                    Err(TransportError::Rejected("device busy".into()))
                }
                Some(n) if n == attempt => Err(TransportError::Failed("link lost".into())),
                _ => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::common::ScriptedTransport;
    use room_frames::error::{BoxError, DeliveryStage, FeedError};
    use room_frames::protocol::{InboundMessage, OutboundMessage};
    use room_frames::{
        deliver, Bitmap, DeliveryError, DiffRecord, FrameBatch, FrameService, HistoryDocument,
        HistorySource, RoomFeed, Terrain, TerrainSource, Tick, TransportError, CELL_COUNT,
    };
    use serde_json::json;
    use tokio::sync::watch;

    fn batch(diffs: u32) -> FrameBatch {
        FrameBatch {
            baseline: Bitmap::from_terrain(&Terrain::filled(213)),
            diffs: (0..diffs)
                .map(|index| DiffRecord {
                    index,
                    changes: vec![],
                })
                .collect(),
        }
    }

    fn frame_index(message: &OutboundMessage) -> Option<u32> {
        match message {
            OutboundMessage::Frame(record) => Some(record.index),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Ordered delivery
    // -----------------------------------------------------------------------

    #[test]
    fn baseline_then_frames_in_index_order() {
        let mut transport = ScriptedTransport::default();
        let report = tokio_test::block_on(deliver(&batch(4), &mut transport)).unwrap();

        assert_eq!(report.acknowledged, 5);
        assert_eq!(
            transport.keys(),
            vec!["TERRAIN", "FRAME", "FRAME", "FRAME", "FRAME"]
        );
        let indices: Vec<u32> = transport.attempts.iter().filter_map(frame_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn failure_on_second_diff_stops_the_batch() {
        // attempt 0 = baseline, 1 = diffs[0], 2 = diffs[1]
        let mut transport = ScriptedTransport::failing_at(2, false);
        let err = tokio_test::block_on(deliver(&batch(5), &mut transport)).unwrap_err();

        assert!(matches!(
            err,
            DeliveryError::Aborted {
                stage: DeliveryStage::Frame(1),
                acknowledged: 2,
                source: TransportError::Failed(_),
            }
        ));
        let indices: Vec<u32> = transport.attempts.iter().filter_map(frame_index).collect();
        assert_eq!(indices, vec![0, 1], "diffs[2..] must never be attempted");
    }

    #[test]
    fn rejected_baseline_sends_nothing_else() {
        let mut transport = ScriptedTransport::failing_at(0, true);
        let err = tokio_test::block_on(deliver(&batch(3), &mut transport)).unwrap_err();

        assert_eq!(err.stage(), DeliveryStage::Baseline);
        assert_eq!(err.acknowledged(), 0);
        assert_eq!(transport.keys(), vec!["TERRAIN"]);
    }

    #[test]
    fn batch_is_redeliverable_after_a_failure() {
        let b = batch(2);
        let mut flaky = ScriptedTransport::failing_at(1, true);
        assert!(tokio_test::block_on(deliver(&b, &mut flaky)).is_err());

        let mut fresh = ScriptedTransport::default();
        let report = tokio_test::block_on(deliver(&b, &mut fresh)).unwrap();
        assert_eq!(report.acknowledged, 3);
    }

    // -----------------------------------------------------------------------
    // Room feed
    // -----------------------------------------------------------------------

    struct FakeSource {
        game_time: Tick,
    }

    impl TerrainSource for FakeSource {
        async fn terrain(&self, room: &str) -> Result<String, BoxError> {
            if room == "broken" {
                return Err("terrain unavailable".into());
            }
            Ok("0".repeat(CELL_COUNT))
        }
    }

    impl HistorySource for FakeSource {
        async fn game_time(&self) -> Result<Tick, BoxError> {
            Ok(self.game_time)
        }

        async fn history(&self, _room: &str, start: Tick) -> Result<HistoryDocument, BoxError> {
            let snapshot = serde_json::from_value(json!({
                "c": {"type": "creep", "x": 1, "y": 1}
            }))?;
            let step = serde_json::from_value(json!({"c": {"x": 2}}))?;
            Ok(HistoryDocument::new(start, snapshot).with_tick(start + 1, step))
        }
    }

    fn make_feed(
        rooms: &[&str],
        transport: ScriptedTransport,
    ) -> (RoomFeed<FakeSource, ScriptedTransport>, watch::Sender<bool>) {
        let (cancel_tx, cancel) = watch::channel(false);
        let source = FakeSource { game_time: 10_135 };
        let rooms = rooms.iter().map(|r| r.to_string()).collect();
        let feed = RoomFeed::new(FrameService::default(), source, transport, rooms, cancel);
        (feed, cancel_tx)
    }

    #[test]
    fn feed_sends_room_header_before_frames() {
        let (mut feed, _cancel) = make_feed(&["W1N1", "W2N2"], ScriptedTransport::default());
        let report = tokio_test::block_on(feed.show_room(5)).unwrap();

        assert_eq!(report.room, "W1N1");
        assert_eq!(report.index, 0);
        assert_eq!(report.delivery.acknowledged, 2);
        assert_eq!(report.stats.ticks_replayed, 1);
        assert_eq!(
            feed.transport().keys(),
            vec!["ROOMNAME", "ROOMCOUNT", "TERRAIN", "FRAME"]
        );
        assert_eq!(
            feed.transport().attempts[1],
            OutboundMessage::RoomCount(2)
        );
    }

    #[test]
    fn feed_requests_the_lagged_history_window() {
        let (mut feed, _cancel) = make_feed(&["W1N1"], ScriptedTransport::default());
        tokio_test::block_on(feed.show_room(0)).unwrap();
        assert_eq!(feed.service().stats().base_tick, 10_000);
    }

    #[test]
    fn source_failure_aborts_after_the_header() {
        let (mut feed, _cancel) = make_feed(&["broken"], ScriptedTransport::default());
        let err = tokio_test::block_on(feed.show_room(0)).unwrap_err();
        assert!(matches!(err, FeedError::Source { what: "terrain", .. }));
    }

    #[test]
    fn empty_room_list_sends_nothing() {
        let (mut feed, _cancel) = make_feed(&[], ScriptedTransport::default());
        let err = tokio_test::block_on(feed.show_room(0)).unwrap_err();
        assert!(matches!(err, FeedError::NoRooms));
    }

    #[test]
    fn cancelled_feed_stops_before_the_baseline() {
        let (mut feed, cancel) = make_feed(&["W1N1"], ScriptedTransport::default());
        cancel.send(true).unwrap();
        let err = tokio_test::block_on(feed.show_room(0)).unwrap_err();
        assert!(matches!(
            err,
            FeedError::Delivery(DeliveryError::Cancelled {
                stage: DeliveryStage::Baseline,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn run_serves_switch_requests_until_inbound_closes() {
        let (transport, mut inbox) = room_frames::delivery::channel();
        let device = tokio::spawn(async move {
            let mut names = Vec::new();
            while let Some(envelope) = inbox.recv().await {
                if let OutboundMessage::RoomName(name) = &envelope.message {
                    names.push(name.clone());
                }
                envelope.accept(None);
            }
            names
        });

        let (_cancel_tx, cancel) = watch::channel(false);
        let rooms = vec!["W1N1".to_string(), "W2N2".to_string()];
        let source = FakeSource { game_time: 10_135 };
        let feed = RoomFeed::new(FrameService::default(), source, transport, rooms, cancel);

        let (switch_tx, switch_rx) = tokio::sync::mpsc::channel(4);
        switch_tx.send(InboundMessage::Switch(1)).await.unwrap();
        drop(switch_tx);
        feed.run(switch_rx).await;

        assert_eq!(device.await.unwrap(), vec!["W1N1", "W2N2"]);
    }
}
