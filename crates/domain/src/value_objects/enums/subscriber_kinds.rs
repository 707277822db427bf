use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Entity kinds that can own a subscription.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberKind {
    User,
    Team,
    Organization,
}

impl SubscriberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriberKind::User => "user",
            SubscriberKind::Team => "team",
            SubscriberKind::Organization => "organization",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "user" => Some(SubscriberKind::User),
            "team" => Some(SubscriberKind::Team),
            "organization" => Some(SubscriberKind::Organization),
            _ => None,
        }
    }
}

impl Display for SubscriberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
