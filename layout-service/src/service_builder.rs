//! Service builder wiring configuration, probes and servers together
//!
//! ## Example
//!
//! ```rust,no_run
//! use layout_service::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let service = ServiceBuilder::new()
//!         .with_config(Config::load()?)
//!         .with_probe(Probe::new("cache", |_ctx| async { Ok(()) }))
//!         .build()?;
//!
//!     // Runs HTTP (and gRPC when enabled) until SIGINT/SIGTERM
//!     service.serve().await
//! }
//! ```

use axum::Router;
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::Result,
    health::{self, HealthAggregator, Probe, ServiceIdentity},
    server::{shutdown_signal, Server},
    state::AppState,
};

/// Builder for a [`LayoutService`]
///
/// Probes declared in the configuration come first, followed by the ones
/// added with [`ServiceBuilder::with_probe`], in call order.
#[derive(Debug, Default)]
pub struct ServiceBuilder {
    config: Option<Config>,
    probes: Vec<Probe>,
}

impl ServiceBuilder {
    /// Create a new service builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service configuration (optional, defaults to `Config::load()`)
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Register a programmatic probe
    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probes.push(probe);
        self
    }

    /// Validate the configuration and build the health aggregator
    pub fn build(self) -> Result<LayoutService> {
        let config = match self.config {
            Some(config) => config,
            None => Config::load()?,
        };
        config.validate()?;

        let mut probes = config
            .health
            .probes
            .iter()
            .map(health::probes::from_config)
            .collect::<Result<Vec<_>>>()?;
        probes.extend(self.probes);

        let health = HealthAggregator::builder()
            .identity(ServiceIdentity::new(config.service.name.clone()))
            .check_timeout(config.health.check_timeout())
            .probes(probes)
            .build()?;

        Ok(LayoutService {
            state: AppState::new(config, health),
        })
    }
}

/// A fully wired service, ready to serve
#[derive(Debug, Clone)]
pub struct LayoutService {
    state: AppState,
}

impl LayoutService {
    /// Get a reference to the service configuration
    pub fn config(&self) -> &Config {
        self.state.config()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Whether [`LayoutService::serve_until`] starts the gRPC binding
    ///
    /// False when `server.grpc.enabled` is set but the crate was built
    /// without the `grpc` feature.
    pub fn serves_grpc(&self) -> bool {
        cfg!(feature = "grpc") && self.config().server.grpc.enabled
    }

    /// HTTP routes with state attached, without the middleware stack
    pub fn router(&self) -> Router {
        health::routes().with_state(self.state.clone())
    }

    /// Serve until SIGINT or SIGTERM, then drain in-flight requests
    pub async fn serve(self) -> Result<()> {
        let shutdown = CancellationToken::new();
        let on_signal = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            on_signal.cancel();
        });

        self.serve_until(shutdown).await
    }

    /// Serve until `shutdown` is cancelled
    ///
    /// If one server fails the token is cancelled so the other drains too.
    pub async fn serve_until(self, shutdown: CancellationToken) -> Result<()> {
        let config = self.state.config();
        tracing::info!(
            "Starting {} ({})",
            config.service.name,
            config.service.environment
        );

        if config.server.grpc.enabled && !self.serves_grpc() {
            tracing::warn!(
                "server.grpc.enabled is set but this build has no gRPC support \
                 (rebuild with --features grpc); serving HTTP only"
            );
        }

        let http = cancel_on_error(
            "HTTP",
            Server::new(config.server.http.clone()).serve(self.router(), shutdown.clone()),
            &shutdown,
        );

        #[cfg(feature = "grpc")]
        if self.serves_grpc() {
            let grpc = cancel_on_error(
                "gRPC",
                crate::grpc::GrpcServer::new(config.server.grpc.clone())
                    .serve(self.state.health().clone(), shutdown.clone()),
                &shutdown,
            );
            let (http_result, grpc_result) = tokio::join!(http, grpc);
            http_result?;
            grpc_result?;
            return Ok(());
        }

        http.await
    }
}

async fn cancel_on_error(
    kind: &str,
    server: impl Future<Output = Result<()>>,
    shutdown: &CancellationToken,
) -> Result<()> {
    let result = server.await;
    if let Err(ref e) = result {
        tracing::error!("{} server failed: {}", kind, e);
        shutdown.cancel();
    }
    result
}
