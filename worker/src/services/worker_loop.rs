use anyhow::Result;
use application::usecases::process_subscriptions::{
    ProcessSubscriptionsResult, ProcessSubscriptionsUseCase,
};
use chrono::{NaiveDate, Utc};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

/// Processes each UTC day at most once. The interval only sets how often the
/// date is checked, so a short interval never renews the same day twice.
pub async fn run_worker_loop(
    usecase: Arc<ProcessSubscriptionsUseCase>,
    interval: Duration,
) -> Result<()> {
    let mut schedule = DailySchedule::default();

    loop {
        schedule.tick(&usecase, Utc::now().date_naive()).await;
        tokio::time::sleep(interval).await;
    }
}

/// Tracks the last processed day and a day whose expiration pass still has
/// to be repeated. A day counts as processed as soon as its renewals ran.
#[derive(Debug, Default)]
struct DailySchedule {
    last_processed: Option<NaiveDate>,
    expirations_due: Option<NaiveDate>,
}

impl DailySchedule {
    async fn tick(&mut self, usecase: &ProcessSubscriptionsUseCase, today: NaiveDate) {
        if let Some(day) = self.expirations_due {
            match usecase.run_expirations(day).await {
                Ok(result) => {
                    log_summary(day, &result);
                    self.expirations_due = None;
                }
                Err(e) => error!(
                    date = %day,
                    error = ?e,
                    "worker_loop: expirations failed again, retrying next tick"
                ),
            }
        }

        if !should_process(self.last_processed, today) {
            return;
        }

        match process_date(usecase, today).await {
            Ok(result) => {
                self.last_processed = Some(today);
                if result.expirations_incomplete {
                    self.expirations_due = Some(today);
                }
            }
            Err(e) => error!(
                %today,
                error = ?e,
                "worker_loop: processing failed, retrying next tick"
            ),
        }
    }
}

pub async fn process_date(
    usecase: &ProcessSubscriptionsUseCase,
    date: NaiveDate,
) -> Result<ProcessSubscriptionsResult> {
    let result = usecase.run(date).await?;
    log_summary(date, &result);
    Ok(result)
}

fn should_process(last_processed: Option<NaiveDate>, today: NaiveDate) -> bool {
    last_processed.is_none_or(|last| last < today)
}

fn log_summary(date: NaiveDate, result: &ProcessSubscriptionsResult) {
    if result.failures() > 0 {
        warn!(
            %date,
            failures = result.failures(),
            failed_ids = ?result.failed_ids,
            "worker_loop: some subscriptions were left for the next run"
        );
    }

    info!(
        %date,
        invoices_generated = result.invoices_generated,
        cancelled = result.cancelled_pending_invoice,
        expired = result.expired,
        "worker_loop: day processed"
    );
}
