pub mod config;
pub mod services;

use anyhow::Result;
use application::facade::{BillingRepositories, SubscriptionBilling};
use infra::{
    events::TracingEventDispatcher,
    postgres::{
        postgres_connection::{self, PgPoolSquad},
        repositories::{
            features::FeaturePostgres, invoices::InvoicePostgres, packages::PackagePostgres,
            subscription_items::SubscriptionItemPostgres, subscriptions::SubscriptionPostgres,
            transactions::TransactionPostgres, usage_logs::UsageLogPostgres,
        },
    },
};
use std::{sync::Arc, time::Duration};
use tracing::info;

pub fn postgres_repositories(db_pool: Arc<PgPoolSquad>) -> BillingRepositories {
    BillingRepositories {
        features: Arc::new(FeaturePostgres::new(Arc::clone(&db_pool))),
        packages: Arc::new(PackagePostgres::new(Arc::clone(&db_pool))),
        subscriptions: Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        subscription_items: Arc::new(SubscriptionItemPostgres::new(Arc::clone(&db_pool))),
        usage_logs: Arc::new(UsageLogPostgres::new(Arc::clone(&db_pool))),
        invoices: Arc::new(InvoicePostgres::new(Arc::clone(&db_pool))),
        transactions: Arc::new(TransactionPostgres::new(db_pool)),
        events: Arc::new(TracingEventDispatcher),
    }
}

pub async fn run() -> Result<()> {
    let dotenvy_env = config::config_loader::load()?;
    info!(stage = %dotenvy_env.stage, "worker: ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("worker: Postgres connection has been established");

    let billing = SubscriptionBilling::new(
        postgres_repositories(Arc::new(postgres_pool)),
        dotenvy_env.billing.clone(),
    );
    let usecase = Arc::new(billing.process_subscriptions());

    if let Some(date) = dotenvy_env.processing.date {
        info!(%date, "worker: processing a single date");
        services::worker_loop::process_date(&usecase, date).await?;
        return Ok(());
    }

    let interval = Duration::from_secs(dotenvy_env.processing.interval_secs);
    info!(interval_secs = interval.as_secs(), "worker: started");

    tokio::select! {
        result = services::worker_loop::run_worker_loop(usecase, interval) => result?,
        _ = tokio::signal::ctrl_c() => info!("worker: shutdown signal received"),
    };

    Ok(())
}
