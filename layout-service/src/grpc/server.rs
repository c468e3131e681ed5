//! gRPC server implementation

use std::any::Any;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::Server;
use tower_http::catch_panic::CatchPanicLayer;

use super::{health::HealthGrpcService, interceptors::request_id_interceptor};
use crate::config::GrpcConfig;
use crate::error::Result;
use crate::health::HealthAggregator;

/// gRPC server builder
///
/// Handles transport settings and registers the health service behind the
/// request ID interceptor.
#[derive(Debug)]
pub struct GrpcServer {
    config: GrpcConfig,
}

impl GrpcServer {
    /// Create a new gRPC server with the given configuration
    pub fn new(config: GrpcConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GrpcConfig {
        &self.config
    }

    /// Build the tonic server with the configured transport limits
    pub fn builder(&self) -> Server {
        Server::builder()
            .timeout(self.config.timeout())
            .tcp_keepalive(Some(self.config.keepalive()))
            .http2_keepalive_interval(Some(self.config.keepalive()))
            .max_concurrent_streams(Some(self.config.max_concurrent_streams))
    }

    /// Serve `health.v1.HealthService` until `shutdown` is cancelled
    pub async fn serve(
        self,
        health: Arc<HealthAggregator>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let addr = self.config.addr;
        let max_message_size = self.config.max_message_size_bytes();

        let service = HealthGrpcService::new(health)
            .with_request_timeout(self.config.timeout())
            .into_server()
            .max_decoding_message_size(max_message_size)
            .max_encoding_message_size(max_message_size);
        let service = InterceptedService::new(service, request_id_interceptor);

        tracing::info!("gRPC server listening on {}", addr);
        tracing::info!("  - Panic recovery: enabled");
        tracing::info!(
            "  - Request timeout: {} seconds, keepalive: {} seconds, max streams: {}",
            self.config.timeout_secs,
            self.config.keepalive_secs,
            self.config.max_concurrent_streams
        );

        self.builder()
            .layer(CatchPanicLayer::custom(panic_response))
            .add_service(service)
            .serve_with_shutdown(addr, shutdown.cancelled_owned())
            .await?;

        tracing::info!("gRPC server shutdown complete");

        Ok(())
    }
}

/// Trailers-only INTERNAL reply for a handler that panicked
fn panic_response(err: Box<dyn Any + Send + 'static>) -> http::Response<String> {
    let detail = err
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| err.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!("gRPC handler panicked: {}", detail);

    tonic::Status::internal("internal server error").into_http()
}
