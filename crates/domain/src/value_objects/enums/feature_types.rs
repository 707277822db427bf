use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    #[default]
    Boolean,
    Limit,
    Consumable,
    Enum,
}

impl FeatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::Boolean => "boolean",
            FeatureType::Limit => "limit",
            FeatureType::Consumable => "consumable",
            FeatureType::Enum => "enum",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "boolean" => Some(FeatureType::Boolean),
            "limit" => Some(FeatureType::Limit),
            "consumable" => Some(FeatureType::Consumable),
            "enum" => Some(FeatureType::Enum),
            _ => None,
        }
    }

    /// Feature types whose item value is a numeric cap on usage.
    pub fn is_metered(&self) -> bool {
        matches!(self, FeatureType::Limit | FeatureType::Consumable)
    }
}

impl Display for FeatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
