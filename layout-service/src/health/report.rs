//! Check results and the aggregated status report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::build_info::BuildInfo;

/// Health of a single check or of the whole service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
}

impl HealthStatus {
    pub fn is_up(self) -> bool {
        self == HealthStatus::Up
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Up => write!(f, "UP"),
            HealthStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// Name and build metadata reported alongside the checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub name: String,
    pub build: BuildInfo,
}

impl ServiceIdentity {
    /// Identity of the running binary under the given service name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            build: BuildInfo::current(),
        }
    }
}

/// Result of running one probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub name: String,
    pub status: HealthStatus,
    /// Empty when the check is UP
    pub reason: String,
    #[serde(rename = "latencyMs", with = "millis")]
    pub latency: Duration,
    /// Aggregator start time
    pub since: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CheckResult {
    pub fn up(name: impl Into<String>, latency: Duration, since: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Up,
            reason: String::new(),
            latency,
            since,
            metadata: BTreeMap::new(),
        }
    }

    pub fn down(
        name: impl Into<String>,
        reason: impl Into<String>,
        latency: Duration,
        since: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Down,
            reason: reason.into(),
            latency,
            since,
            metadata: BTreeMap::new(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status.is_up()
    }
}

/// `name: reason` of every DOWN check joined by `"; "`, or `None` when all are UP
pub fn failure_message(checks: &[CheckResult]) -> Option<String> {
    let failures: Vec<String> = checks
        .iter()
        .filter(|check| !check.is_up())
        .map(|check| format!("{}: {}", check.name, check.reason))
        .collect();

    if failures.is_empty() {
        None
    } else {
        Some(failures.join("; "))
    }
}

/// Full snapshot produced by one status sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// UP iff every check is UP
    pub overall: HealthStatus,
    pub service: String,
    pub version_info: BuildInfo,
    #[serde(rename = "uptimeSeconds", with = "seconds")]
    pub uptime: Duration,
    pub now: DateTime<Utc>,
    /// In probe registration order
    pub checks: Vec<CheckResult>,
}

impl StatusReport {
    pub fn is_up(&self) -> bool {
        self.overall.is_up()
    }

    /// DOWN checks in registration order
    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|check| !check.is_up())
    }
}

/// Whole milliseconds on the wire
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Whole seconds on the wire
mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
