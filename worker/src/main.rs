use anyhow::Result;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    infra::observability::init_observability("billing-worker")?;

    if let Err(error) = worker::run().await {
        error!(error = ?error, "worker: exited with error");
        std::process::exit(1);
    }
    Ok(())
}
