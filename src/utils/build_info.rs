/// Compile-time build metadata produced by `build.rs`.
#[derive(Debug, Clone, Copy)]
pub struct BuildMetadata {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub git_status: &'static str,
    pub timestamp: &'static str,
    pub target: &'static str,
    pub profile: &'static str,
    pub rustc: &'static str,
}

pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

impl BuildMetadata {
    pub fn current() -> Self {
        Self {
            version: CLI_VERSION,
            git_hash: option_env!("BUDGET_PACING_BUILD_HASH").unwrap_or("unknown"),
            git_status: option_env!("BUDGET_PACING_BUILD_STATUS").unwrap_or("unknown"),
            timestamp: option_env!("BUDGET_PACING_BUILD_TIMESTAMP").unwrap_or("unknown"),
            target: option_env!("BUDGET_PACING_BUILD_TARGET").unwrap_or("unknown"),
            profile: option_env!("BUDGET_PACING_BUILD_PROFILE").unwrap_or("unknown"),
            rustc: option_env!("BUDGET_PACING_BUILD_RUSTC").unwrap_or("unknown"),
        }
    }

    /// One-line summary printed by `pacing_cli version`.
    pub fn summary(&self) -> String {
        format!(
            "budget_pacing {} ({} {}, {} {}, built {})",
            self.version, self.git_hash, self.git_status, self.target, self.profile, self.timestamp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_starts_with_crate_version() {
        let meta = BuildMetadata::current();
        assert!(meta
            .summary()
            .starts_with(&format!("budget_pacing {}", CLI_VERSION)));
    }
}
