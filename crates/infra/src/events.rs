use domain::{repositories::events::EventDispatcher, value_objects::events::BillingEvent};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Writes every event to the log and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventDispatcher;

impl EventDispatcher for TracingEventDispatcher {
    fn dispatch(&self, event: BillingEvent) {
        match &event {
            BillingEvent::SubscriptionCreated { subscription } => info!(
                event = event.name(),
                subscription_id = %subscription.id,
                package_id = %subscription.package_id,
                status = %subscription.status,
                "events: subscription created"
            ),
            BillingEvent::UsageLimitWarning {
                subscription,
                feature,
                current_usage,
                limit,
            } => warn!(
                event = event.name(),
                subscription_id = %subscription.id,
                feature = %feature.slug,
                current_usage = %current_usage,
                limit = %limit,
                "events: usage limit warning"
            ),
        }
    }
}

/// Fans events out to in-process listeners over a tokio broadcast channel.
/// Slow receivers lag and lose the oldest events; sending never blocks.
#[derive(Debug, Clone)]
pub struct BroadcastEventDispatcher {
    sender: broadcast::Sender<BillingEvent>,
}

impl BroadcastEventDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BillingEvent> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventDispatcher for BroadcastEventDispatcher {
    fn dispatch(&self, event: BillingEvent) {
        let name = event.name();
        if let Err(err) = self.sender.send(event) {
            debug!(event = name, error = %err, "events: no listeners, event dropped");
        }
    }
}

/// Forwards each event to every inner dispatcher in order.
pub struct CompositeEventDispatcher {
    dispatchers: Vec<Box<dyn EventDispatcher + Send + Sync>>,
}

impl CompositeEventDispatcher {
    pub fn new(dispatchers: Vec<Box<dyn EventDispatcher + Send + Sync>>) -> Self {
        Self { dispatchers }
    }
}

impl EventDispatcher for CompositeEventDispatcher {
    fn dispatch(&self, event: BillingEvent) {
        for dispatcher in &self.dispatchers {
            dispatcher.dispatch(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::{
        entities::{features::FeatureEntity, subscriptions::SubscriptionEntity},
        repositories::events::MockEventDispatcher,
    };
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn subscription() -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            subscriber_type: "user".to_string(),
            subscriber_id: Uuid::new_v4(),
            package_id: Uuid::new_v4(),
            status: "active".to_string(),
            starts_at: now,
            ends_at: None,
            trial_ends_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            auto_renew: true,
            metadata: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn feature() -> FeatureEntity {
        let now = Utc::now();
        FeatureEntity {
            id: Uuid::new_v4(),
            slug: "api-calls".to_string(),
            name: "API calls".to_string(),
            description: None,
            feature_type: "consumable".to_string(),
            is_active: true,
            sort_order: 0,
            metadata: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_listener() {
        let dispatcher = BroadcastEventDispatcher::new(8);
        let mut first = dispatcher.subscribe();
        let mut second = dispatcher.subscribe();
        assert_eq!(dispatcher.listener_count(), 2);

        let created = subscription();
        dispatcher.dispatch(BillingEvent::SubscriptionCreated {
            subscription: created.clone(),
        });

        for receiver in [&mut first, &mut second] {
            let event = receiver.recv().await.unwrap();
            assert_eq!(event.name(), "subscription_created");
            assert_eq!(event.subscription().id, created.id);
        }
    }

    #[test]
    fn broadcast_without_listeners_does_not_panic() {
        let dispatcher = BroadcastEventDispatcher::new(0);
        dispatcher.dispatch(BillingEvent::UsageLimitWarning {
            subscription: subscription(),
            feature: feature(),
            current_usage: dec!(85),
            limit: dec!(100),
        });
        assert_eq!(dispatcher.listener_count(), 0);
    }

    #[test]
    fn composite_forwards_to_each_dispatcher() {
        let mut first = MockEventDispatcher::new();
        first
            .expect_dispatch()
            .withf(|event| event.name() == "usage_limit_warning")
            .times(1)
            .return_const(());
        let mut second = MockEventDispatcher::new();
        second.expect_dispatch().times(1).return_const(());

        let composite = CompositeEventDispatcher::new(vec![
            Box::new(TracingEventDispatcher),
            Box::new(first),
            Box::new(second),
        ]);
        composite.dispatch(BillingEvent::UsageLimitWarning {
            subscription: subscription(),
            feature: feature(),
            current_usage: dec!(9),
            limit: dec!(10),
        });
    }
}
