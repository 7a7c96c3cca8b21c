//! wallet-ledger 主入口

use std::sync::Arc;

use anyhow::{Context, Result};
use wallet_ledger::{
    api,
    app_state::AppState,
    config::Config,
    infrastructure::{db, logging},
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量
    dotenvy::dotenv().ok();

    // 2. 加载配置（CONFIG_PATH 指向的 TOML 文件优先）
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;
    config.validate().context("invalid configuration")?;

    // 3. 初始化日志
    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    tracing::info!("Starting wallet ledger v{}", env!("CARGO_PKG_VERSION"));

    // 4. 连接数据库
    let pool = db::init_pool(&config.database)
        .await
        .context("failed to connect to database")?;
    tracing::info!("Database connected");

    // 5. 运行数据库迁移
    if std::env::var("SKIP_MIGRATIONS").is_err() {
        db::run_migrations(&pool).await?;
    } else {
        tracing::info!("Database migrations skipped (SKIP_MIGRATIONS set)");
    }

    // 6. 初始化应用状态
    let config = Arc::new(config);
    let state = Arc::new(AppState::from_config(config.clone(), pool)?);

    // 7. 启动服务器
    let app = api::routes(state);
    let bind_addr = config.server.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
