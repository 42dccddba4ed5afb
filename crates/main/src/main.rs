//! 主应用程序入口
//!
//! 加载配置并启动 WebSocket 中继服务。

use config::AppConfig;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志，未设置 RUST_LOG 时默认 info
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load()?;
    if config.uses_development_secret() {
        tracing::warn!("正在使用开发环境 JWT 密钥，请通过 APP_JWT__SECRET 覆盖");
    }

    tracing::info!(
        reconnect_policy = ?config.relay.reconnect_policy,
        outbound_buffer = config.relay.outbound_buffer,
        prune_on_disconnect = config.relay.prune_subscriptions_on_disconnect,
        "中继配置已加载"
    );

    let state = AppState::from_config(&config);
    let app = router(state);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;

    tracing::info!("中继服务器启动在 http://{}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("中继服务器已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "无法监听退出信号");
        std::future::pending::<()>().await;
    }
    tracing::info!("收到退出信号，开始关闭");
}
