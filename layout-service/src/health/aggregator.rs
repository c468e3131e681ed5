//! Health aggregation over a fixed probe list
//!
//! One sweep runs every probe concurrently inside the calling task, each under
//! the same per-probe timeout. All results are collected before any verdict is
//! computed and are returned in registration order. Dropping a sweep drops all
//! of its in-flight probes.

use chrono::{DateTime, Utc};
use futures::future::{join_all, FutureExt};
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::probe::{Probe, ProbeContext};
use super::report::{failure_message, CheckResult, HealthStatus, ServiceIdentity, StatusReport};
use crate::error::{Error, Result};

/// Per-probe timeout used when none is configured
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_millis(800);

/// Reason recorded for a probe that outlives its timeout
pub const DEADLINE_EXCEEDED: &str = "deadline exceeded";

const PANIC_REASON: &str = "probe panicked";

/// The caller's side of a sweep: cancellation plus an optional deadline
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context driven by an existing token
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Combines dependency probes into liveness, readiness and status answers
#[derive(Debug)]
pub struct HealthAggregator {
    identity: ServiceIdentity,
    probes: Arc<[Probe]>,
    check_timeout: Duration,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl HealthAggregator {
    /// Create an aggregator; the start time is captured here, once
    ///
    /// Fails when two probes share a name or the timeout is zero.
    pub fn new(
        identity: ServiceIdentity,
        probes: Vec<Probe>,
        check_timeout: Duration,
    ) -> Result<Self> {
        if check_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "health check timeout must be greater than zero".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for probe in &probes {
            if !names.insert(probe.name()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate health probe name: {}",
                    probe.name()
                )));
            }
        }

        tracing::info!(
            service = %identity.name,
            probes = probes.len(),
            timeout_ms = check_timeout.as_millis() as u64,
            "Health aggregator initialized"
        );

        Ok(Self {
            identity,
            probes: probes.into(),
            check_timeout,
            started_at: Utc::now(),
            started: Instant::now(),
        })
    }

    pub fn builder() -> HealthAggregatorBuilder {
        HealthAggregatorBuilder::default()
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    /// Registered probe names in report order
    pub fn probe_names(&self) -> impl Iterator<Item = &str> {
        self.probes.iter().map(Probe::name)
    }

    pub fn check_timeout(&self) -> Duration {
        self.check_timeout
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// The process is scheduled and able to respond
    ///
    /// Never touches a probe and never fails.
    pub fn liveness(&self) -> HealthStatus {
        HealthStatus::Up
    }

    /// `Ok(())` when every probe is UP, otherwise [`Error::Unavailable`]
    /// carrying `name: reason` of each failing probe joined by `"; "`
    pub async fn readiness(&self, ctx: &RequestContext) -> Result<()> {
        let checks = self.sweep(ctx).await?;

        match failure_message(&checks) {
            Some(message) => {
                tracing::error!("readiness not ready: {}", message);
                Err(Error::Unavailable(message))
            }
            None => Ok(()),
        }
    }

    /// Full report of a fresh sweep
    ///
    /// Probe failures show up in the report; only caller cancellation or an
    /// expired caller deadline produce an error.
    pub async fn status(&self, ctx: &RequestContext) -> Result<StatusReport> {
        let checks = self.sweep(ctx).await?;
        Ok(self.report(checks))
    }

    /// Run every probe once and collect the results in registration order
    pub async fn sweep(&self, ctx: &RequestContext) -> Result<Vec<CheckResult>> {
        let cancel = ctx.cancellation_token();
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let checks = join_all(self.probes.iter().map(|probe| self.run_probe(probe, ctx)));
        let caller_deadline = async {
            match ctx.deadline() {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("health sweep cancelled by caller");
                Err(Error::Cancelled)
            }
            _ = caller_deadline => {
                tracing::debug!("health sweep hit the caller deadline");
                Err(Error::DeadlineExceeded)
            }
            results = checks => Ok(results),
        }
    }

    async fn run_probe(&self, probe: &Probe, ctx: &RequestContext) -> CheckResult {
        let start = Instant::now();
        let deadline = match ctx.deadline() {
            Some(caller) => caller.min(start + self.check_timeout),
            None => start + self.check_timeout,
        };
        let probe_ctx = ProbeContext::new(ctx.cancellation_token().child_token(), deadline);

        // The check is invoked inside the guarded future so a panic while
        // building it is caught as well.
        let guarded = AssertUnwindSafe(async move { probe.run(probe_ctx).await }).catch_unwind();
        let outcome = tokio::time::timeout(self.check_timeout, guarded).await;
        let latency = start.elapsed();

        let check = match outcome {
            Ok(Ok(Ok(()))) => CheckResult::up(probe.name(), latency, self.started_at),
            Ok(Ok(Err(err))) => {
                CheckResult::down(probe.name(), err.to_string(), latency, self.started_at)
            }
            Ok(Err(payload)) => CheckResult::down(
                probe.name(),
                panic_message(payload.as_ref()),
                latency,
                self.started_at,
            ),
            Err(_) => CheckResult::down(probe.name(), DEADLINE_EXCEEDED, latency, self.started_at),
        };

        if check.is_up() {
            tracing::debug!(probe = %check.name, latency_ms = latency.as_millis() as u64, "probe up");
        } else {
            tracing::warn!(
                probe = %check.name,
                reason = %check.reason,
                latency_ms = latency.as_millis() as u64,
                "probe down"
            );
        }

        check
    }

    fn report(&self, checks: Vec<CheckResult>) -> StatusReport {
        let overall = if checks.iter().all(CheckResult::is_up) {
            HealthStatus::Up
        } else {
            HealthStatus::Down
        };

        StatusReport {
            overall,
            service: self.identity.name.clone(),
            version_info: self.identity.build.clone(),
            uptime: self.uptime(),
            // A wall clock stepping backwards must not put `now` before `since`
            now: Utc::now().max(self.started_at),
            checks,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        PANIC_REASON.to_string()
    }
}

/// Builder for [`HealthAggregator`]
#[derive(Debug)]
pub struct HealthAggregatorBuilder {
    identity: ServiceIdentity,
    probes: Vec<Probe>,
    check_timeout: Duration,
}

impl Default for HealthAggregatorBuilder {
    fn default() -> Self {
        Self {
            identity: ServiceIdentity::new(env!("CARGO_PKG_NAME")),
            probes: Vec::new(),
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }
}

impl HealthAggregatorBuilder {
    pub fn identity(mut self, identity: ServiceIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.identity.name = name.into();
        self
    }

    pub fn probe(mut self, probe: Probe) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn probes(mut self, probes: impl IntoIterator<Item = Probe>) -> Self {
        self.probes.extend(probes);
        self
    }

    pub fn check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HealthAggregator> {
        HealthAggregator::new(self.identity, self.probes, self.check_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ProbeError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ok_probe(name: &str) -> Probe {
        Probe::new(name, |_ctx| async { Ok(()) })
    }

    fn failing_probe(name: &str, reason: &'static str) -> Probe {
        Probe::new(name, move |_ctx| async move { Err(ProbeError::new(reason)) })
    }

    fn sleeping_probe(name: &str, delay: Duration) -> Probe {
        Probe::new(name, move |_ctx| async move {
            tokio::time::sleep(delay).await;
            Ok(())
        })
    }

    fn hanging_probe(name: &str) -> Probe {
        Probe::new(name, |_ctx| std::future::pending())
    }

    fn counting_probe(name: &str, counter: Arc<AtomicUsize>) -> Probe {
        Probe::new(name, move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
    }

    fn aggregator(probes: Vec<Probe>) -> HealthAggregator {
        HealthAggregator::builder()
            .service_name("test-service")
            .probes(probes)
            .build()
            .unwrap()
    }

    fn names(checks: &[CheckResult]) -> Vec<&str> {
        checks.iter().map(|c| c.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_example_scenario_readiness() {
        let health = aggregator(vec![
            ok_probe("db"),
            failing_probe("cache", "ping failed"),
            ok_probe("queue"),
        ]);

        let err = health.readiness(&RequestContext::new()).await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(ref msg) if msg == "cache: ping failed"));
    }

    #[tokio::test]
    async fn test_example_scenario_status() {
        let health = aggregator(vec![
            ok_probe("db"),
            failing_probe("cache", "ping failed"),
            ok_probe("queue"),
        ]);

        let report = health.status(&RequestContext::new()).await.unwrap();
        assert_eq!(report.overall, HealthStatus::Down);
        assert_eq!(report.service, "test-service");
        assert_eq!(names(&report.checks), vec!["db", "cache", "queue"]);

        assert_eq!(report.checks[0].status, HealthStatus::Up);
        assert_eq!(report.checks[0].reason, "");
        assert_eq!(report.checks[1].status, HealthStatus::Down);
        assert_eq!(report.checks[1].reason, "ping failed");
        assert_eq!(report.checks[2].status, HealthStatus::Up);
    }

    #[tokio::test]
    async fn test_empty_probe_set() {
        let health = aggregator(Vec::new());

        assert!(health.readiness(&RequestContext::new()).await.is_ok());

        let report = health.status(&RequestContext::new()).await.unwrap();
        assert_eq!(report.overall, HealthStatus::Up);
        assert!(report.checks.is_empty());
    }

    #[tokio::test]
    async fn test_multiple_failures_joined_in_registration_order() {
        let health = aggregator(vec![
            failing_probe("queue", "broker gone"),
            ok_probe("db"),
            failing_probe("cache", "ping failed"),
        ]);

        let err = health.readiness(&RequestContext::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "queue: broker gone; cache: ping failed");
    }

    #[tokio::test]
    async fn test_liveness_never_invokes_probes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let health = aggregator(vec![
            counting_probe("db", counter.clone()),
            failing_probe("cache", "ping failed"),
            hanging_probe("queue"),
        ]);

        assert_eq!(health.liveness(), HealthStatus::Up);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_results_are_never_cached() {
        let counter = Arc::new(AtomicUsize::new(0));
        let health = aggregator(vec![counting_probe("db", counter.clone())]);

        health.status(&RequestContext::new()).await.unwrap();
        health.readiness(&RequestContext::new()).await.unwrap();
        health.status(&RequestContext::new()).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_is_registration_order_not_completion_order() {
        let health = aggregator(vec![
            sleeping_probe("slow", Duration::from_millis(300)),
            sleeping_probe("fast", Duration::from_millis(10)),
            sleeping_probe("medium", Duration::from_millis(100)),
        ]);

        let report = health.status(&RequestContext::new()).await.unwrap();
        assert_eq!(names(&report.checks), vec!["slow", "fast", "medium"]);
        assert_eq!(report.checks[0].latency, Duration::from_millis(300));
        assert_eq!(report.checks[1].latency, Duration::from_millis(10));
        assert!(report.is_up());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_times_out_without_delaying_others() {
        let health = aggregator(vec![
            hanging_probe("stuck"),
            sleeping_probe("quick", Duration::from_millis(20)),
        ]);

        let started = Instant::now();
        let report = health.status(&RequestContext::new()).await.unwrap();

        assert_eq!(started.elapsed(), DEFAULT_CHECK_TIMEOUT);
        assert_eq!(report.checks[0].status, HealthStatus::Down);
        assert_eq!(report.checks[0].reason, DEADLINE_EXCEEDED);
        assert_eq!(report.checks[0].latency, DEFAULT_CHECK_TIMEOUT);
        assert_eq!(report.checks[1].status, HealthStatus::Up);
        assert_eq!(report.checks[1].latency, Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_reports_timeout() {
        let health = HealthAggregator::builder()
            .check_timeout(Duration::from_millis(50))
            .probe(hanging_probe("kafka"))
            .build()
            .unwrap();

        let err = health.readiness(&RequestContext::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "kafka: deadline exceeded");
    }

    #[tokio::test]
    async fn test_panicking_probe_is_isolated() {
        let health = aggregator(vec![
            ok_probe("db"),
            Probe::new("boom", |_ctx| async {
                let poisoned = true;
                if poisoned {
                    panic!("connection pool poisoned");
                }
                Ok(())
            }),
            Probe::new("formatted", |_ctx| async {
                let shard = 7;
                if shard > 0 {
                    panic!("bad shard {}", shard);
                }
                Ok(())
            }),
            ok_probe("queue"),
        ]);

        let report = health.status(&RequestContext::new()).await.unwrap();
        assert_eq!(report.overall, HealthStatus::Down);
        assert_eq!(report.checks[1].reason, "connection pool poisoned");
        assert_eq!(report.checks[2].reason, "bad shard 7");
        assert!(report.checks[0].is_up());
        assert!(report.checks[3].is_up());
    }

    #[tokio::test]
    async fn test_panic_while_building_check_is_caught() {
        let health = aggregator(vec![Probe::new(
            "eager",
            |_ctx| -> std::future::Ready<crate::health::ProbeResult> { panic!("no client") },
        )]);

        let report = health.status(&RequestContext::new()).await.unwrap();
        assert_eq!(report.checks[0].reason, "no client");
    }

    #[tokio::test]
    async fn test_cancelled_before_sweep() {
        let counter = Arc::new(AtomicUsize::new(0));
        let health = aggregator(vec![counting_probe("db", counter.clone())]);

        let ctx = RequestContext::new();
        ctx.cancellation_token().cancel();

        assert!(matches!(health.status(&ctx).await, Err(Error::Cancelled)));
        assert!(matches!(health.readiness(&ctx).await, Err(Error::Cancelled)));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_mid_sweep_yields_no_report() {
        let health = aggregator(vec![ok_probe("db"), hanging_probe("stuck")]);

        let token = CancellationToken::new();
        let ctx = RequestContext::with_cancellation(token.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let started = Instant::now();
        assert!(matches!(health.status(&ctx).await, Err(Error::Cancelled)));
        assert_eq!(started.elapsed(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_deadline_yields_no_report() {
        let health = aggregator(vec![hanging_probe("stuck")]);
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(100));

        assert!(matches!(
            health.readiness(&ctx).await,
            Err(Error::DeadlineExceeded)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_context_deadline_is_bounded_by_caller() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen_by_probe = seen.clone();
        let health = aggregator(vec![Probe::new("db", move |ctx: ProbeContext| {
            *seen_by_probe.lock().unwrap() = Some(ctx.remaining());
            async { Ok(()) }
        })]);

        let ctx = RequestContext::new().with_timeout(Duration::from_millis(300));
        health.status(&ctx).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(Duration::from_millis(300)));

        health.status(&RequestContext::new()).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(DEFAULT_CHECK_TIMEOUT));
    }

    #[tokio::test(start_paused = true)]
    async fn test_now_and_uptime() {
        let health = aggregator(vec![ok_probe("db")]);
        tokio::time::advance(Duration::from_secs(5)).await;

        let report = health.status(&RequestContext::new()).await.unwrap();
        assert_eq!(report.uptime, Duration::from_secs(5));
        for check in &report.checks {
            assert_eq!(check.since, health.started_at());
            assert!(report.now >= check.since);
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = HealthAggregator::builder()
            .probe(ok_probe("db"))
            .probe(ok_probe("db"))
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = HealthAggregator::builder()
            .check_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_probe_names_keep_order() {
        let health = aggregator(vec![ok_probe("b"), ok_probe("a"), ok_probe("c")]);
        assert_eq!(health.probe_names().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_panic_message_fallback() {
        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(payload.as_ref()), PANIC_REASON);
    }
}
