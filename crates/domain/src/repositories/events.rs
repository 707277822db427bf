use mockall::automock;

use crate::value_objects::events::BillingEvent;

/// Delivers domain events to listeners. Delivery is fire-and-forget: a failing
/// listener must not fail the operation that raised the event.
#[automock]
pub trait EventDispatcher {
    fn dispatch(&self, event: BillingEvent);
}
