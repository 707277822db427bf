use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::entities::features::FeatureEntity;
use crate::schema::package_features;

/// Per-package configuration of one feature.
#[derive(Debug, Clone, PartialEq, Selectable, Queryable)]
#[diesel(table_name = package_features)]
pub struct PackageFeatureEntity {
    pub package_id: Uuid,
    pub feature_id: Uuid,
    pub value: Option<String>,
    pub is_available: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = package_features)]
pub struct InsertPackageFeatureEntity {
    pub package_id: Uuid,
    pub feature_id: Uuid,
    pub value: Option<String>,
    pub is_available: bool,
    pub sort_order: i32,
}

/// A feature as attached to a package, pivot columns included.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachedFeature {
    pub feature: FeatureEntity,
    pub value: Option<String>,
    pub is_available: bool,
    pub sort_order: i32,
}
