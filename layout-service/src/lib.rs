//! # layout-service
//!
//! Runtime for the `app-layout` service template: configuration, structured
//! logging, build metadata, HTTP/gRPC bootstrap and health aggregation.
//!
//! ## Features
//!
//! - **Health aggregation**: liveness, readiness and status over named probes,
//!   each bounded by a per-probe timeout and isolated from panics
//! - **HTTP** (axum): `/health`, `/ready` and `/status` behind request ID,
//!   trace, timeout and panic recovery middleware
//! - **gRPC** (tonic, `grpc` feature): `health.v1.HealthService` on its own port
//! - **Configuration**: defaults, a TOML file and `APP_LAYOUT_*` environment variables
//! - **Graceful shutdown**: SIGINT/SIGTERM drain both servers
//!
//! ## Example
//!
//! ```rust,no_run
//! use layout_service::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     let _guard = init_tracing(&config.log, &config.service.name)?;
//!
//!     ServiceBuilder::new()
//!         .with_config(config)
//!         .build()?
//!         .serve()
//!         .await
//! }
//! ```

pub mod build_info;
pub mod config;
pub mod error;
pub mod health;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod service_builder;
pub mod state;

#[cfg(feature = "grpc")]
pub mod grpc;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::build_info::BuildInfo;
    pub use crate::config::{Config, ProbeConfig, ProbeKind};
    pub use crate::error::{Error, Result};
    pub use crate::health::{
        CheckResult, HealthAggregator, HealthStatus, Probe, ProbeContext, ProbeError,
        RequestContext, StatusReport,
    };
    pub use crate::observability::{init_tracing, LogGuard};
    pub use crate::server::Server;
    pub use crate::service_builder::{LayoutService, ServiceBuilder};
    pub use crate::state::AppState;

    #[cfg(feature = "grpc")]
    pub use crate::grpc::{GrpcServer, HealthGrpcService};

    pub use axum::{routing::get, Json, Router};
    pub use tokio_util::sync::CancellationToken;
}
