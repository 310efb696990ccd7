use std::path::PathBuf;
use std::time::Duration;

use crate::probe::ProbeSettings;

/// Default catalog file, relative to the working directory.
pub const DEFAULT_CATALOG_FILE: &str = "dns_configs.json";

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
	pub catalog_path: PathBuf,
	/// How long a resolver-state read is served from cache
	pub cache_ttl: Duration,
	/// Timeout for netsh and ipconfig invocations
	pub query_timeout: Duration,
	pub probe: ProbeSettings,
	/// Per-lookup timeout during benchmarks
	pub lookup_timeout: Duration,
}

impl Default for EngineConfig {
	fn default() -> Self {
		EngineConfig {
			catalog_path: PathBuf::from(DEFAULT_CATALOG_FILE),
			cache_ttl: Duration::from_secs(5),
			query_timeout: Duration::from_secs(3),
			probe: ProbeSettings::default(),
			lookup_timeout: Duration::from_secs(2),
		}
	}
}
