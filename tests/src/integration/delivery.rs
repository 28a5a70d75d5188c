//! # Delivery Tests
//!
//! Every subscriber sees every event published while it was attached, in
//! publish order, regardless of how fast the other subscribers read.

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use pubsub::{BusConfig, EventBus, OverflowPolicy};
    use tokio::time::timeout;

    use crate::integration::{SETTLE, WAIT};

    // =============================================================================
    // COMPLETENESS AND ORDER
    // =============================================================================

    #[tokio::test]
    async fn test_every_subscriber_sees_every_event_in_order() {
        let bus: EventBus<u32> = EventBus::new();
        let mut first = bus.subscribe().await.expect("subscribe");
        let mut second = bus.subscribe().await.expect("subscribe");

        for n in 0..100 {
            bus.publish(n).await.expect("publish");
        }

        for sub in [&mut first, &mut second] {
            for expected in 0..100 {
                let got = timeout(WAIT, sub.recv()).await.expect("timeout");
                assert_eq!(got, Some(expected));
            }
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_only_sees_later_events() {
        let bus: EventBus<&'static str> = EventBus::new();
        bus.publish("before").await.expect("publish");
        tokio::time::sleep(SETTLE).await;

        let mut sub = bus.subscribe().await.expect("subscribe");
        bus.publish("after").await.expect("publish");

        assert_eq!(timeout(WAIT, sub.recv()).await.expect("timeout"), Some("after"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_publishers_keep_per_publisher_order() {
        let bus: EventBus<(u8, u32)> = EventBus::new();
        let mut sub = bus.subscribe().await.expect("subscribe");

        let mut handles = Vec::new();
        for publisher in 0..2u8 {
            let bus = bus.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..50 {
                    bus.publish((publisher, n)).await.expect("publish");
                }
            }));
        }
        for handle in handles {
            handle.await.expect("publisher task");
        }

        let mut next = [0u32; 2];
        for _ in 0..100 {
            let (publisher, n) = timeout(WAIT, sub.recv())
                .await
                .expect("timeout")
                .expect("event");
            assert_eq!(n, next[publisher as usize]);
            next[publisher as usize] += 1;
        }
    }

    // =============================================================================
    // SLOW READERS
    // =============================================================================

    #[tokio::test]
    async fn test_stalled_subscriber_does_not_block_publisher_or_peers() {
        let bus: EventBus<u32> = EventBus::new();
        let _stalled = bus.subscribe().await.expect("subscribe");
        let mut fast = bus.subscribe().await.expect("subscribe");

        timeout(WAIT, async {
            for n in 0..1_000 {
                bus.publish(n).await.expect("publish");
            }
        })
        .await
        .expect("publisher blocked by stalled subscriber");

        for expected in 0..1_000 {
            let got = timeout(WAIT, fast.recv()).await.expect("timeout");
            assert_eq!(got, Some(expected));
        }
    }

    #[tokio::test]
    async fn test_bounded_buffer_drop_newest_keeps_head() {
        let config = BusConfig::default().with_buffer_limit(3, OverflowPolicy::DropNewest);
        let bus: EventBus<u32> = EventBus::with_config(config).expect("config");
        let mut sub = bus.subscribe().await.expect("subscribe");

        for n in 0..10 {
            bus.publish(n).await.expect("publish");
        }
        tokio::time::sleep(SETTLE).await;

        for expected in 0..3 {
            assert_eq!(timeout(WAIT, sub.recv()).await.expect("timeout"), Some(expected));
        }
        bus.publish(99).await.expect("publish");
        assert_eq!(timeout(WAIT, sub.recv()).await.expect("timeout"), Some(99));
    }

    // =============================================================================
    // STREAM ADAPTER
    // =============================================================================

    #[tokio::test]
    async fn test_stream_ends_after_bus_shutdown() {
        let bus: EventBus<u32> = EventBus::new();
        let stream = bus.subscribe().await.expect("subscribe").into_stream();

        for n in 0..3 {
            bus.publish(n).await.expect("publish");
        }

        let collected = timeout(WAIT, stream.take(3).collect::<Vec<_>>())
            .await
            .expect("timeout");
        assert_eq!(collected, vec![0, 1, 2]);

        let stream = bus.subscribe().await.expect("subscribe").into_stream();
        bus.close();
        let rest = timeout(WAIT, stream.collect::<Vec<_>>())
            .await
            .expect("stream did not end");
        assert!(rest.is_empty());
    }
}
