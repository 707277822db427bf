diesel::table! {
    packages (id) {
        id -> Uuid,
        slug -> Text,
        name -> Text,
        description -> Nullable<Text>,
        price -> Numeric,
        original_price -> Nullable<Numeric>,
        currency -> Text,
        billing_period -> Text,
        billing_interval -> Int4,
        trial_days -> Int4,
        is_active -> Bool,
        is_featured -> Bool,
        sort_order -> Int4,
        metadata -> Nullable<Jsonb>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    features (id) {
        id -> Uuid,
        slug -> Text,
        name -> Text,
        description -> Nullable<Text>,
        #[sql_name = "type"]
        feature_type -> Text,
        is_active -> Bool,
        sort_order -> Int4,
        metadata -> Nullable<Jsonb>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    package_features (package_id, feature_id) {
        package_id -> Uuid,
        feature_id -> Uuid,
        value -> Nullable<Text>,
        is_available -> Bool,
        sort_order -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    subscriptions (id) {
        id -> Uuid,
        subscriber_type -> Text,
        subscriber_id -> Uuid,
        package_id -> Uuid,
        status -> Text,
        starts_at -> Timestamptz,
        ends_at -> Nullable<Timestamptz>,
        trial_ends_at -> Nullable<Timestamptz>,
        cancelled_at -> Nullable<Timestamptz>,
        cancellation_reason -> Nullable<Text>,
        auto_renew -> Bool,
        metadata -> Nullable<Jsonb>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    subscription_items (id) {
        id -> Uuid,
        subscription_id -> Uuid,
        feature_id -> Uuid,
        value -> Nullable<Text>,
        usage -> Numeric,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    usage_logs (id) {
        id -> Uuid,
        subscription_id -> Uuid,
        feature_id -> Uuid,
        amount -> Numeric,
        description -> Nullable<Text>,
        metadata -> Nullable<Jsonb>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    invoices (id) {
        id -> Uuid,
        subscription_id -> Uuid,
        invoice_number -> Text,
        amount -> Numeric,
        currency -> Text,
        status -> Text,
        issued_at -> Timestamptz,
        due_date -> Nullable<Timestamptz>,
        paid_at -> Nullable<Timestamptz>,
        notes -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    transactions (id) {
        id -> Uuid,
        invoice_id -> Uuid,
        gateway -> Text,
        transaction_id -> Nullable<Text>,
        amount -> Numeric,
        currency -> Text,
        status -> Text,
        gateway_response -> Nullable<Jsonb>,
        metadata -> Nullable<Jsonb>,
        refunded_amount -> Nullable<Numeric>,
        refunded_at -> Nullable<Timestamptz>,
        refund_reason -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(package_features -> packages (package_id));
diesel::joinable!(package_features -> features (feature_id));
diesel::joinable!(subscriptions -> packages (package_id));
diesel::joinable!(subscription_items -> subscriptions (subscription_id));
diesel::joinable!(subscription_items -> features (feature_id));
diesel::joinable!(usage_logs -> subscriptions (subscription_id));
diesel::joinable!(usage_logs -> features (feature_id));
diesel::joinable!(invoices -> subscriptions (subscription_id));
diesel::joinable!(transactions -> invoices (invoice_id));

diesel::allow_tables_to_appear_in_same_query!(
    packages,
    features,
    package_features,
    subscriptions,
    subscription_items,
    usage_logs,
    invoices,
    transactions,
);
