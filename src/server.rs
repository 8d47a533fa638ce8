use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

use crate::config::{Config, ConfigError};
use crate::registry::registry_service_server::RegistryServiceServer;
use crate::services::registry::{LivenessSweeper, RegistryHandler, RegistryStore};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to bind listener: {0}")]
    Io(#[from] std::io::Error),
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

pub async fn start(config: Config) -> Result<(), ServerError> {
    let addr = config.listen_addr()?;

    // 初始化服务注册表
    let store = Arc::new(RegistryStore::new(config.registry_settings()));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        heartbeat_timeout_secs = config.registry.heartbeat_timeout,
        cleanup_interval_secs = config.registry.cleanup_interval,
        "Service registry listening"
    );

    serve(store, listener, shutdown_signal()).await
}

/// 在给定的监听器上提供注册中心服务，直到 `shutdown` 完成
///
/// 清理任务与服务同生命周期：服务停止后等待当前扫描结束再返回。
pub async fn serve<F>(
    store: Arc<RegistryStore>,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send,
{
    let sweeper = LivenessSweeper::spawn(store.clone());
    let handler = RegistryHandler::new(store);

    let result = Server::builder()
        .add_service(RegistryServiceServer::new(handler))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await;

    sweeper.shutdown().await;
    tracing::info!("Service registry stopped");

    result.map_err(Into::into)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
