use std::fmt::Display;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::enums::subscriber_kinds::SubscriberKind;

/// Polymorphic owner of a subscription, stored as `subscriber_type` + `subscriber_id`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SubscriberRef {
    pub kind: SubscriberKind,
    pub id: Uuid,
}

impl SubscriberRef {
    pub fn new(kind: SubscriberKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn user(id: Uuid) -> Self {
        Self::new(SubscriberKind::User, id)
    }

    pub fn team(id: Uuid) -> Self {
        Self::new(SubscriberKind::Team, id)
    }

    pub fn organization(id: Uuid) -> Self {
        Self::new(SubscriberKind::Organization, id)
    }
}

impl Display for SubscriberRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
