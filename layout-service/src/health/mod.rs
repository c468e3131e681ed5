//! Health aggregation
//!
//! A [`HealthAggregator`] owns a fixed list of named [`Probe`]s and answers
//! three questions about the service:
//!
//! - liveness: is the process able to respond at all (never runs probes)
//! - readiness: are all dependencies usable right now
//! - status: a full per-probe report with timings and build metadata
//!
//! ```rust,no_run
//! use layout_service::health::{probes, HealthAggregator, Probe, RequestContext};
//!
//! # async fn example() -> layout_service::error::Result<()> {
//! let health = HealthAggregator::builder()
//!     .service_name("orders")
//!     .probe(probes::tcp("db", "127.0.0.1:5432"))
//!     .probe(Probe::new("cache", |_ctx| async { Ok(()) }))
//!     .build()?;
//!
//! health.readiness(&RequestContext::new()).await?;
//! # Ok(())
//! # }
//! ```

mod aggregator;
pub mod handlers;
mod probe;
pub mod probes;
mod report;

pub use aggregator::{
    HealthAggregator, HealthAggregatorBuilder, RequestContext, DEADLINE_EXCEEDED,
    DEFAULT_CHECK_TIMEOUT,
};
pub use handlers::routes;
pub use probe::{Probe, ProbeContext, ProbeError, ProbeFuture, ProbeResult};
pub use report::{failure_message, CheckResult, HealthStatus, ServiceIdentity, StatusReport};
