//! # Shutdown Tests
//!
//! Closing a node closes its subtree. `done()` on a node resolves only
//! after every descendant has reached `Done`, and a closed node refuses
//! new work.

#[cfg(test)]
mod tests {
    use pubsub::{BusError, EventBus, NodeStatus};
    use tokio::time::timeout;

    use crate::integration::WAIT;

    #[tokio::test]
    async fn test_bus_close_cascades_to_whole_tree() {
        let bus: EventBus<u32> = EventBus::new();
        let a = bus.subscribe().await.expect("subscribe");
        let b = bus.subscribe().await.expect("subscribe");
        let a1 = a.try_clone().await.expect("clone");
        let a2 = a1.try_clone().await.expect("clone");

        bus.close();
        timeout(WAIT, bus.done()).await.expect("bus done");

        assert_eq!(bus.status(), NodeStatus::Done);
        for sub in [&a, &b, &a1, &a2] {
            assert_eq!(sub.status(), NodeStatus::Done);
        }
    }

    #[tokio::test]
    async fn test_close_marks_shutting_down_immediately() {
        let bus: EventBus<u32> = EventBus::new();
        let _sub = bus.subscribe().await.expect("subscribe");

        bus.close();
        assert_ne!(bus.status(), NodeStatus::Running);
        assert!(!bus.is_running());
        timeout(WAIT, bus.done()).await.expect("bus done");
    }

    #[tokio::test]
    async fn test_closed_bus_rejects_publish_and_subscribe() {
        let bus: EventBus<u32> = EventBus::new();
        bus.close();

        assert!(matches!(bus.publish(1).await, Err(BusError::NotRunning)));
        assert!(matches!(bus.subscribe().await, Err(BusError::NotRunning)));

        // Still rejected after the bus has fully stopped
        timeout(WAIT, bus.done()).await.expect("bus done");
        assert!(matches!(bus.publish(2).await, Err(BusError::NotRunning)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let bus: EventBus<u32> = EventBus::new();
        let sub = bus.subscribe().await.expect("subscribe");

        sub.close();
        sub.close();
        bus.close();
        bus.close();

        timeout(WAIT, bus.shutdown()).await.expect("shutdown");
        assert_eq!(sub.status(), NodeStatus::Done);
    }

    #[tokio::test]
    async fn test_stalled_subscriber_does_not_block_shutdown() {
        let bus: EventBus<u32> = EventBus::new();
        let stalled = bus.subscribe().await.expect("subscribe");
        for n in 0..100 {
            bus.publish(n).await.expect("publish");
        }

        timeout(WAIT, bus.shutdown()).await.expect("shutdown");
        assert_eq!(stalled.status(), NodeStatus::Done);
    }

    #[tokio::test]
    async fn test_pending_recv_wakes_on_close() {
        let bus: EventBus<u32> = EventBus::new();
        let mut sub = bus.subscribe().await.expect("subscribe");

        let reader = tokio::spawn(async move { sub.recv().await });
        tokio::task::yield_now().await;
        bus.close();

        let got = timeout(WAIT, reader).await.expect("timeout").expect("join");
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn test_dropping_last_bus_handle_closes_subscribers() {
        let bus: EventBus<u32> = EventBus::new();
        let sub = bus.subscribe().await.expect("subscribe");
        let clone = bus.clone();

        drop(bus);
        assert!(clone.is_running());

        drop(clone);
        timeout(WAIT, sub.done()).await.expect("subscriber done");
        assert_eq!(sub.status(), NodeStatus::Done);
    }
}
