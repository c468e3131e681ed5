//! Build metadata captured at compile time by `build.rs`

use serde::{Deserialize, Serialize};

const UNKNOWN: &str = "unknown";

/// Version and toolchain information for this binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub version: String,
    pub build_time: String,
    pub build_user: String,
    pub commit_id: String,
    pub toolchain_version: String,
    pub toolchain_arch: String,
    pub build_os: String,
}

impl BuildInfo {
    /// Metadata of the running binary
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_time: or_unknown(option_env!("APP_LAYOUT_BUILD_TIME")),
            build_user: or_unknown(option_env!("APP_LAYOUT_BUILD_USER")),
            commit_id: or_unknown(option_env!("APP_LAYOUT_COMMIT_ID")),
            toolchain_version: or_unknown(option_env!("APP_LAYOUT_RUSTC_VERSION")),
            toolchain_arch: or_unknown(option_env!("APP_LAYOUT_TARGET_ARCH")),
            build_os: or_unknown(option_env!("APP_LAYOUT_TARGET_OS")),
        }
    }

    /// One-line banner logged at startup and printed by `version`
    pub fn summary(&self) -> String {
        format!(
            "built with {}[OS: {}, arch: {}] from (version: {}, buildTime: {}, commitID: {}) by {}",
            self.toolchain_version,
            self.build_os,
            self.toolchain_arch,
            self.version,
            self.build_time,
            self.commit_id,
            self.build_user
        )
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::current()
    }
}

fn or_unknown(value: Option<&'static str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

/// Log the build banner at info level
pub fn show_info() {
    tracing::info!("{}", BuildInfo::current().summary());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_has_crate_version() {
        let info = BuildInfo::current();
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert!(!info.build_os.is_empty());
    }

    #[test]
    fn test_build_time_is_a_past_timestamp() {
        let info = BuildInfo::current();
        let built = chrono::DateTime::parse_from_rfc3339(&info.build_time)
            .unwrap_or_else(|e| panic!("bad build time {:?}: {}", info.build_time, e));
        assert!(built <= chrono::Utc::now());
    }

    #[test]
    fn test_summary_format() {
        let info = BuildInfo {
            version: "1.2.3".to_string(),
            build_time: "2026-01-01T00:00:00Z".to_string(),
            build_user: "ci".to_string(),
            commit_id: "abc123".to_string(),
            toolchain_version: "rustc 1.90.0".to_string(),
            toolchain_arch: "x86_64".to_string(),
            build_os: "linux".to_string(),
        };

        assert_eq!(
            info.summary(),
            "built with rustc 1.90.0[OS: linux, arch: x86_64] from (version: 1.2.3, \
             buildTime: 2026-01-01T00:00:00Z, commitID: abc123) by ci"
        );
    }

    #[test]
    fn test_or_unknown() {
        assert_eq!(or_unknown(None), "unknown");
        assert_eq!(or_unknown(Some("  ")), "unknown");
        assert_eq!(or_unknown(Some("v")), "v");
    }

    #[test]
    fn test_camel_case_serialization() {
        let json = serde_json::to_value(BuildInfo::current()).unwrap();
        assert!(json.get("buildTime").is_some());
        assert!(json.get("toolchainArch").is_some());
    }
}
