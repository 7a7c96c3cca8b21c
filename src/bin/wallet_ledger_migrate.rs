//! 独立迁移工具：只执行 migrations/ 并退出

use anyhow::{Context, Result};
use wallet_ledger::{
    config::Config,
    infrastructure::{db, logging},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;

    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let pool = db::init_pool(&config.database)
        .await
        .context("failed to connect to database")?;

    db::run_migrations(&pool).await?;

    let currencies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM currencies")
        .fetch_one(&pool)
        .await?;
    tracing::info!(currencies, "Migration runner finished successfully");

    pool.close().await;
    Ok(())
}
