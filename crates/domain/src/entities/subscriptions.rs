use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::subscriptions;
use crate::value_objects::{
    enums::{subscriber_kinds::SubscriberKind, subscription_statuses::SubscriptionStatus},
    subscribers::SubscriberRef,
};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub subscriber_type: String,
    pub subscriber_id: Uuid,
    pub package_id: Uuid,
    pub status: String,
    pub starts_at: DateTime<Utc>,
    /// `None` for lifetime subscriptions.
    pub ends_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub auto_renew: bool,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SubscriptionEntity {
    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_str(&self.status)
    }

    pub fn subscriber(&self) -> Option<SubscriberRef> {
        SubscriberKind::from_str(&self.subscriber_type)
            .map(|kind| SubscriberRef::new(kind, self.subscriber_id))
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status() == SubscriptionStatus::Active && self.ends_at.is_none_or(|ends| ends > now)
    }

    /// True for `on_trial` status, and also for any status while `trial_ends_at`
    /// is still ahead of `now`.
    pub fn is_on_trial_at(&self, now: DateTime<Utc>) -> bool {
        self.status() == SubscriptionStatus::OnTrial
            || self.trial_ends_at.is_some_and(|trial_ends| trial_ends > now)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status() == SubscriptionStatus::Cancelled || self.cancelled_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status() == SubscriptionStatus::Expired
            || (self.ends_at.is_some_and(|ends| ends < now) && !self.is_cancelled())
    }

    pub fn is_suspended(&self) -> bool {
        self.status() == SubscriptionStatus::Suspended
    }

    pub fn is_past_due(&self) -> bool {
        self.status() == SubscriptionStatus::PastDue
    }

    /// A cancelled subscription keeps `is_valid` false even while `ends_at`
    /// is still in the future.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active_at(now) || self.is_on_trial_at(now)
    }

    pub fn is_resumable_at(&self, now: DateTime<Utc>) -> bool {
        self.status() == SubscriptionStatus::Cancelled && self.ends_at.is_none_or(|ends| ends >= now)
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    pub fn is_on_trial(&self) -> bool {
        self.is_on_trial_at(Utc::now())
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct InsertSubscriptionEntity {
    pub subscriber_type: String,
    pub subscriber_id: Uuid,
    pub package_id: Uuid,
    pub status: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub auto_renew: bool,
    pub metadata: Option<serde_json::Value>,
}

/// Partial update of a subscription row. `None` leaves a column untouched,
/// `Some(None)` writes NULL.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionChangeset {
    pub status: Option<String>,
    pub ends_at: Option<Option<DateTime<Utc>>>,
    pub cancelled_at: Option<Option<DateTime<Utc>>>,
    pub cancellation_reason: Option<Option<String>>,
    pub auto_renew: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionChangeset {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            status: None,
            ends_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            auto_renew: None,
            updated_at: now,
        }
    }

    pub fn status(mut self, status: SubscriptionStatus) -> Self {
        self.status = Some(status.as_str().to_string());
        self
    }

    /// Applies the same changes to an in-memory row.
    pub fn apply(&self, mut entity: SubscriptionEntity) -> SubscriptionEntity {
        if let Some(status) = &self.status {
            entity.status = status.clone();
        }
        if let Some(ends_at) = self.ends_at {
            entity.ends_at = ends_at;
        }
        if let Some(cancelled_at) = self.cancelled_at {
            entity.cancelled_at = cancelled_at;
        }
        if let Some(reason) = &self.cancellation_reason {
            entity.cancellation_reason = reason.clone();
        }
        if let Some(auto_renew) = self.auto_renew {
            entity.auto_renew = auto_renew;
        }
        entity.updated_at = self.updated_at;
        entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subscription(status: SubscriptionStatus) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            subscriber_type: "user".to_string(),
            subscriber_id: Uuid::new_v4(),
            package_id: Uuid::new_v4(),
            status: status.as_str().to_string(),
            starts_at: now,
            ends_at: Some(now + Duration::days(30)),
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

    #[test]
    fn active_without_end_date_never_lapses() {
        let mut sub = subscription(SubscriptionStatus::Active);
        sub.ends_at = None;
        let far_future = Utc::now() + Duration::days(365 * 200);
        assert!(sub.is_active_at(far_future));
        assert!(sub.is_valid_at(far_future));
    }

    #[test]
    fn active_lapses_after_end_date() {
        let sub = subscription(SubscriptionStatus::Active);
        let after = sub.ends_at.unwrap() + Duration::seconds(1);
        assert!(!sub.is_active_at(after));
        assert!(sub.is_expired_at(after));
    }

    #[test]
    fn future_trial_end_reads_as_trial_regardless_of_status() {
        let mut sub = subscription(SubscriptionStatus::Active);
        sub.trial_ends_at = Some(Utc::now() + Duration::days(3));
        assert!(sub.is_on_trial_at(Utc::now()));
    }

    #[test]
    fn grace_period_cancellation_is_not_valid_even_before_end_date() {
        let mut sub = subscription(SubscriptionStatus::Cancelled);
        sub.cancelled_at = Some(Utc::now());
        let now = Utc::now();
        assert!(sub.ends_at.unwrap() > now);
        assert!(sub.is_cancelled());
        assert!(!sub.is_valid_at(now));
        assert!(sub.is_resumable_at(now));
    }

    #[test]
    fn cancelled_subscription_past_end_is_not_expired() {
        let mut sub = subscription(SubscriptionStatus::Cancelled);
        sub.cancelled_at = Some(Utc::now());
        let after = sub.ends_at.unwrap() + Duration::days(1);
        assert!(!sub.is_expired_at(after));
        assert!(!sub.is_resumable_at(after));
    }

    #[test]
    fn externally_set_statuses_are_not_valid() {
        let now = Utc::now();
        for status in [SubscriptionStatus::PastDue, SubscriptionStatus::Suspended] {
            let sub = subscription(status);
            assert!(!sub.is_valid_at(now));
        }
        assert!(subscription(SubscriptionStatus::PastDue).is_past_due());
        assert!(subscription(SubscriptionStatus::Suspended).is_suspended());
    }

    #[test]
    fn changeset_apply_writes_nulls_and_leaves_untouched_columns() {
        let mut sub = subscription(SubscriptionStatus::Cancelled);
        sub.cancelled_at = Some(Utc::now());
        sub.cancellation_reason = Some("too expensive".to_string());
        let original_ends = sub.ends_at;

        let mut changes = SubscriptionChangeset::new(Utc::now()).status(SubscriptionStatus::Active);
        changes.cancelled_at = Some(None);
        changes.cancellation_reason = Some(None);

        let updated = changes.apply(sub);
        assert_eq!(updated.status(), SubscriptionStatus::Active);
        assert_eq!(updated.cancelled_at, None);
        assert_eq!(updated.cancellation_reason, None);
        assert_eq!(updated.ends_at, original_ends);
    }

    #[test]
    fn subscriber_ref_round_trips_from_columns() {
        let sub = subscription(SubscriptionStatus::Active);
        let subscriber = sub.subscriber().unwrap();
        assert_eq!(subscriber, SubscriberRef::user(sub.subscriber_id));
    }
}
