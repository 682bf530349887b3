mod logs;

use std::sync::Arc;

use biggsmusic::{LogNotifier, MusicService};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = biggsconfig::get_config();
    logs::init_logging(&config);

    info!(directory = %config.directory(), "Biggs starting");

    // ========== Music capability ==========
    let service = match MusicService::start(&config, Arc::new(LogNotifier::new())).await {
        Ok(service) => service,
        Err(e) => {
            error!("music capability failed to start: {}", e);
            return Err(e.into());
        }
    };

    info!("Biggs is ready!");
    info!("Press Ctrl+C to stop...");
    tokio::signal::ctrl_c().await?;

    info!("shutting down");
    service.shutdown().await;
    Ok(())
}
