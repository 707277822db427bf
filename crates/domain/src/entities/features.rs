use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::features;
use crate::value_objects::enums::feature_types::FeatureType;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = features)]
pub struct FeatureEntity {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub feature_type: String,
    pub is_active: bool,
    pub sort_order: i32,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FeatureEntity {
    pub fn kind(&self) -> Option<FeatureType> {
        FeatureType::from_str(&self.feature_type)
    }

    pub fn is_boolean(&self) -> bool {
        self.kind() == Some(FeatureType::Boolean)
    }

    pub fn is_limit(&self) -> bool {
        self.kind() == Some(FeatureType::Limit)
    }

    pub fn is_consumable(&self) -> bool {
        self.kind() == Some(FeatureType::Consumable)
    }
}

#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = features)]
pub struct InsertFeatureEntity {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub feature_type: String,
    pub is_active: bool,
    pub sort_order: i32,
    pub metadata: Option<serde_json::Value>,
}
