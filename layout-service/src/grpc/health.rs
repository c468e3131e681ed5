//! gRPC health service backed by the shared aggregator

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::{CancellationToken, DropGuard};
use tonic::{Request, Response, Status};

use super::proto::{self, health_service_server};
use crate::build_info::BuildInfo;
use crate::health::{CheckResult, HealthAggregator, HealthStatus, RequestContext, StatusReport};

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Upper bound on the head start the sweep deadline gets over the transport
const MAX_DEADLINE_MARGIN: Duration = Duration::from_millis(50);

/// Implementation of `health.v1.HealthService`
#[derive(Debug, Clone)]
pub struct HealthGrpcService {
    health: Arc<HealthAggregator>,
    request_timeout: Option<Duration>,
}

impl HealthGrpcService {
    pub fn new(health: Arc<HealthAggregator>) -> Self {
        Self {
            health,
            request_timeout: None,
        }
    }

    /// Server-side request timeout the transport enforces alongside `grpc-timeout`
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Wrap in the generated tonic server
    pub fn into_server(self) -> health_service_server::HealthServiceServer<Self> {
        health_service_server::HealthServiceServer::new(self)
    }
}

/// Per-call context
///
/// The transport cancels a call once the shorter of `grpc-timeout` and the
/// server timeout elapses and reports it as CANCELLED. The sweep deadline is
/// set slightly earlier so the caller sees DEADLINE_EXCEEDED instead.
fn request_context<T>(
    request: &Request<T>,
    server_timeout: Option<Duration>,
) -> (RequestContext, DropGuard) {
    let token = CancellationToken::new();
    let mut ctx = RequestContext::with_cancellation(token.clone());

    let caller_timeout = request
        .metadata()
        .get(GRPC_TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_grpc_timeout);

    let transport_timeout = match (caller_timeout, server_timeout) {
        (Some(caller), Some(server)) => Some(caller.min(server)),
        (caller, server) => caller.or(server),
    };

    if let Some(timeout) = transport_timeout {
        ctx = ctx.with_timeout(sweep_budget(timeout));
    }

    (ctx, token.drop_guard())
}

/// Time the sweep may use out of a transport timeout
pub fn sweep_budget(timeout: Duration) -> Duration {
    timeout.saturating_sub((timeout / 10).min(MAX_DEADLINE_MARGIN))
}

/// Parse a `grpc-timeout` header value: up to 8 digits and a unit (`H M S m u n`)
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if !value.is_ascii() || value.len() < 2 || value.len() > 9 {
        return None;
    }

    let (digits, unit) = value.split_at(value.len() - 1);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    match unit {
        "H" => Some(Duration::from_secs(amount * 60 * 60)),
        "M" => Some(Duration::from_secs(amount * 60)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}

#[tonic::async_trait]
impl health_service_server::HealthService for HealthGrpcService {
    async fn liveness(
        &self,
        _request: Request<proto::HealthCheckRequest>,
    ) -> Result<Response<()>, Status> {
        self.health.liveness();
        Ok(Response::new(()))
    }

    async fn readiness(
        &self,
        request: Request<proto::HealthCheckRequest>,
    ) -> Result<Response<()>, Status> {
        let (ctx, _guard) = request_context(&request, self.request_timeout);
        self.health.readiness(&ctx).await?;
        Ok(Response::new(()))
    }

    async fn status(
        &self,
        request: Request<proto::StatusRequest>,
    ) -> Result<Response<proto::StatusReply>, Status> {
        let (ctx, _guard) = request_context(&request, self.request_timeout);
        let report = self.health.status(&ctx).await?;
        Ok(Response::new(report.into()))
    }
}

impl From<HealthStatus> for proto::Status {
    fn from(status: HealthStatus) -> Self {
        match status {
            HealthStatus::Up => proto::Status::Up,
            HealthStatus::Down => proto::Status::Down,
        }
    }
}

impl From<BuildInfo> for proto::Version {
    fn from(info: BuildInfo) -> Self {
        Self {
            version: info.version,
            build_time: info.build_time,
            build_user: info.build_user,
            commit_id: info.commit_id,
            toolchain_version: info.toolchain_version,
            toolchain_arch: info.toolchain_arch,
            build_os: info.build_os,
        }
    }
}

impl From<CheckResult> for proto::Check {
    fn from(check: CheckResult) -> Self {
        Self {
            name: check.name,
            status: proto::Status::from(check.status) as i32,
            reason: check.reason,
            latency_ms: i64::try_from(check.latency.as_millis()).unwrap_or(i64::MAX),
            since: Some(timestamp(check.since)),
            metadata: check.metadata.into_iter().collect(),
        }
    }
}

impl From<StatusReport> for proto::StatusReply {
    fn from(report: StatusReport) -> Self {
        Self {
            overall: proto::Status::from(report.overall) as i32,
            service: report.service,
            version_info: Some(report.version_info.into()),
            uptime_seconds: i64::try_from(report.uptime.as_secs()).unwrap_or(i64::MAX),
            now: Some(timestamp(report.now)),
            checks: report.checks.into_iter().map(Into::into).collect(),
        }
    }
}

fn timestamp(time: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: time.timestamp(),
        nanos: time.timestamp_subsec_nanos() as i32,
    }
}
