/*
 * Maelstrom client engine
 * Demo entry point: connect, list pools, log a snapshot
 */

use maelstrom_client::{config::Config, service::PoolService};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Maelstrom pool client");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Configuration loaded successfully");

    let service = PoolService::new(config).await?;

    let total = service.reader().get_total_pools().await?;
    info!(total, "pools deployed");

    if total > 0 {
        let rows = service.get_pools(0, (total - 1).min(9)).await?;
        for row in rows {
            info!(
                token = %row.token.symbol,
                buy_price = %row.buy_price,
                sell_price = %row.sell_price,
                liquidity = %row.total_liquidity,
                "pool"
            );
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "maelstrom_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
