//! # Broker Flow Tests
//!
//! Two `BrokerBus` instances sharing one `MemoryBroker` stand in for two
//! processes sharing a Redis server. Events cross from one to the other as
//! JSON payloads and are rebuilt through each side's `TypeRegistry`.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pubsub::{
        encode_shape, Broker, BrokerBus, BusError, BusResult, EventBus, EventShape,
        MemoryBroker, TopicEvent, Transport, TypeRegistry,
    };
    use pubsub_telemetry::EVENTS_DROPPED;
    use serde::{Deserialize, Serialize};
    use tokio::time::timeout;

    use crate::integration::{SETTLE, WAIT};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct OrderCreated {
        order_id: u64,
        owner: String,
    }

    impl EventShape for OrderCreated {
        const TOPIC: &'static str = "market.order.created";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct BidPlaced {
        order_id: u64,
        price: u64,
    }

    impl EventShape for BidPlaced {
        const TOPIC: &'static str = "market.bid.placed";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ProviderOnline {
        host: String,
    }

    impl EventShape for ProviderOnline {
        const TOPIC: &'static str = "provider.online";
    }

    #[derive(Debug, Clone, PartialEq)]
    enum MarketEvent {
        Order(OrderCreated),
        Bid(BidPlaced),
        Provider(ProviderOnline),
    }

    impl From<OrderCreated> for MarketEvent {
        fn from(ev: OrderCreated) -> Self {
            Self::Order(ev)
        }
    }

    impl From<BidPlaced> for MarketEvent {
        fn from(ev: BidPlaced) -> Self {
            Self::Bid(ev)
        }
    }

    impl From<ProviderOnline> for MarketEvent {
        fn from(ev: ProviderOnline) -> Self {
            Self::Provider(ev)
        }
    }

    impl TopicEvent for MarketEvent {
        fn topic(&self) -> &str {
            match self {
                Self::Order(_) => OrderCreated::TOPIC,
                Self::Bid(_) => BidPlaced::TOPIC,
                Self::Provider(_) => ProviderOnline::TOPIC,
            }
        }

        fn encode(&self) -> BusResult<Vec<u8>> {
            match self {
                Self::Order(ev) => encode_shape(ev),
                Self::Bid(ev) => encode_shape(ev),
                Self::Provider(ev) => encode_shape(ev),
            }
        }
    }

    fn registry() -> TypeRegistry<MarketEvent> {
        let mut registry = TypeRegistry::new();
        registry.register::<OrderCreated>().expect("register");
        registry.register::<BidPlaced>().expect("register");
        registry.register::<ProviderOnline>().expect("register");
        registry
    }

    fn order(order_id: u64) -> MarketEvent {
        MarketEvent::Order(OrderCreated {
            order_id,
            owner: "akash1owner".to_string(),
        })
    }

    // =============================================================================
    // CROSS-BUS DELIVERY
    // =============================================================================

    #[tokio::test]
    async fn test_events_cross_between_buses() {
        let broker = MemoryBroker::new();
        let producer = BrokerBus::new(broker.clone(), registry());
        let consumer = BrokerBus::new(broker, registry());

        let mut sub = consumer.subscribe().await.expect("subscribe");
        for id in 0..10 {
            producer.publish(order(id)).await.expect("publish");
        }

        for id in 0..10 {
            let got = timeout(WAIT, sub.recv()).await.expect("timeout");
            assert_eq!(got, Some(order(id)));
        }
    }

    #[tokio::test]
    async fn test_topic_filter_selects_events() {
        let broker = MemoryBroker::new();
        let bus = BrokerBus::new(broker, registry());

        let mut market = bus.subscribe_topics(&["market.*"]).await.expect("subscribe");
        let mut bids = bus
            .subscribe_topics(&[BidPlaced::TOPIC])
            .await
            .expect("subscribe");

        let provider = MarketEvent::Provider(ProviderOnline {
            host: "provider.example".to_string(),
        });
        let bid = MarketEvent::Bid(BidPlaced {
            order_id: 1,
            price: 42,
        });

        bus.publish(provider).await.expect("publish");
        bus.publish(order(1)).await.expect("publish");
        bus.publish(bid.clone()).await.expect("publish");

        assert_eq!(timeout(WAIT, market.recv()).await.expect("timeout"), Some(order(1)));
        assert_eq!(timeout(WAIT, market.recv()).await.expect("timeout"), Some(bid.clone()));
        assert_eq!(timeout(WAIT, bids.recv()).await.expect("timeout"), Some(bid));
    }

    #[tokio::test]
    async fn test_foreign_and_corrupt_messages_are_skipped() {
        let dropped = |reason: &str| EVENTS_DROPPED.with_label_values(&[reason]).get();
        let unknown_before = dropped("unknown_topic");
        let decode_before = dropped("decode");

        let broker = MemoryBroker::new();
        let bus = BrokerBus::new(broker.clone(), registry());
        let mut sub = bus.subscribe().await.expect("subscribe");

        broker
            .publish("deployment.closed", b"{}".to_vec())
            .await
            .expect("raw publish");
        broker
            .publish(OrderCreated::TOPIC, b"{\"order_id\":\"nope\"}".to_vec())
            .await
            .expect("raw publish");
        bus.publish(order(5)).await.expect("publish");

        assert_eq!(timeout(WAIT, sub.recv()).await.expect("timeout"), Some(order(5)));

        // Both skipped messages were counted before the good one arrived
        assert!(dropped("unknown_topic") >= unknown_before + 1.0);
        assert!(dropped("decode") >= decode_before + 1.0);
    }

    // =============================================================================
    // CLONING AND SHUTDOWN
    // =============================================================================

    #[tokio::test]
    async fn test_broker_subscriber_clone_inherits_buffer() {
        let bus = BrokerBus::new(MemoryBroker::new(), registry());
        let original = bus.subscribe().await.expect("subscribe");

        bus.publish(order(1)).await.expect("publish");
        tokio::time::sleep(SETTLE).await;

        let mut clone = original.try_clone().await.expect("clone");
        assert_eq!(timeout(WAIT, clone.recv()).await.expect("timeout"), Some(order(1)));
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions_and_rejects_publish() {
        let broker = MemoryBroker::new();
        let bus = BrokerBus::new(broker.clone(), registry());
        let mut sub = bus.subscribe().await.expect("subscribe");
        assert_eq!(broker.subscriber_count(), 1);

        bus.close();
        timeout(WAIT, bus.done()).await.expect("bus done");

        assert!(!bus.is_running());
        assert_eq!(timeout(WAIT, sub.recv()).await.expect("timeout"), None);
        assert!(matches!(bus.publish(order(9)).await, Err(BusError::NotRunning)));
        assert!(matches!(bus.subscribe().await, Err(BusError::NotRunning)));

        // The pump releases its broker stream once the sink is gone
        tokio::time::sleep(SETTLE).await;
        assert_eq!(broker.subscriber_count(), 0);
    }

    // =============================================================================
    // TRANSPORT SEAM
    // =============================================================================

    async fn publish_and_receive(
        transport: Arc<dyn Transport<MarketEvent>>,
    ) -> Option<MarketEvent> {
        let mut sub = transport.subscribe().await.ok()?;
        transport.publish(order(77)).await.ok()?;
        let event = timeout(WAIT, sub.recv()).await.ok()?;
        transport.close();
        transport.done().await;
        event
    }

    #[tokio::test]
    async fn test_both_backends_satisfy_transport() {
        let local: Arc<dyn Transport<MarketEvent>> = Arc::new(EventBus::new());
        let brokered: Arc<dyn Transport<MarketEvent>> =
            Arc::new(BrokerBus::new(MemoryBroker::new(), registry()));

        assert_eq!(publish_and_receive(local).await, Some(order(77)));
        assert_eq!(publish_and_receive(brokered).await, Some(order(77)));
    }
}
