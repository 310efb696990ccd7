use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{EngineError, Result};

/// Header labels in `netsh interface ip show dns` output; never data rows.
const HEADER_PHRASES: [&str; 2] = [
	"Statically Configured DNS Servers",
	"DNS servers configured through DHCP",
];

/// Parse a dotted-quad IPv4 address.
///
/// Exactly four '.'-separated parts, each an integer in [0, 255]. Leading
/// zeros are accepted, unlike `Ipv4Addr::from_str`.
pub fn parse_ipv4(input: &str) -> Option<Ipv4Addr> {
	let parts: Vec<&str> = input.split('.').collect();
	if parts.len() != 4 {
		return None;
	}
	let mut octets = [0u8; 4];
	for (octet, part) in octets.iter_mut().zip(&parts) {
		*octet = part.trim().parse::<u8>().ok()?;
	}
	Some(Ipv4Addr::from(octets))
}

pub fn is_valid_ipv4(input: &str) -> bool {
	parse_ipv4(input).is_some()
}

/// Parse a required address, mapping failure to `InvalidAddress`.
pub fn require_ipv4(input: &str) -> Result<Ipv4Addr> {
	parse_ipv4(input).ok_or_else(|| EngineError::InvalidAddress(input.to_string()))
}

/// Parse an optional address; blank input means "not given".
pub fn optional_ipv4(input: Option<&str>) -> Result<Option<Ipv4Addr>> {
	match input.map(str::trim) {
		None | Some("") => Ok(None),
		Some(s) => require_ipv4(s).map(Some),
	}
}

/// DNS servers bound to an adapter.
///
/// A secondary server can only exist alongside a primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
	/// Servers are assigned by DHCP.
	Automatic,
	Static {
		primary: Ipv4Addr,
		secondary: Option<Ipv4Addr>,
	},
}

impl ResolverState {
	pub fn primary(&self) -> Option<Ipv4Addr> {
		match self {
			ResolverState::Automatic => None,
			ResolverState::Static { primary, .. } => Some(*primary),
		}
	}

	pub fn secondary(&self) -> Option<Ipv4Addr> {
		match self {
			ResolverState::Automatic => None,
			ResolverState::Static { secondary, .. } => *secondary,
		}
	}

	pub fn is_automatic(&self) -> bool {
		matches!(self, ResolverState::Automatic)
	}
}

impl fmt::Display for ResolverState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ResolverState::Automatic => write!(f, "DHCP (automatic)"),
			ResolverState::Static { primary, secondary: None } => write!(f, "{}", primary),
			ResolverState::Static { primary, secondary: Some(s) } => write!(f, "{}, {}", primary, s),
		}
	}
}

/// Extract resolver state from `netsh interface ip show dns` output.
///
/// Header lines are skipped; the first two valid IPv4 tokens on the
/// remaining lines become primary and secondary.
pub fn parse_dns_output(output: &str) -> ResolverState {
	let mut servers = output
		.lines()
		.filter(|line| !HEADER_PHRASES.iter().any(|h| line.contains(h)))
		.flat_map(str::split_whitespace)
		.filter_map(parse_ipv4);

	match servers.next() {
		None => ResolverState::Automatic,
		Some(primary) => ResolverState::Static {
			primary,
			secondary: servers.next(),
		},
	}
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
	/// None records a failed query; it never counts as a hit.
	state: Option<ResolverState>,
	fetched_at: Instant,
}

/// Cached reads plus a per-adapter write generation.
///
/// Every invalidation bumps the adapter's generation. A read only stores
/// its result if the generation it started under is still current, so a
/// query that overlaps a write can never put pre-write state back.
#[derive(Debug, Default)]
struct StateCache {
	entries: HashMap<String, CacheEntry>,
	generations: HashMap<String, u64>,
}

impl StateCache {
	fn generation(&self, adapter: &str) -> u64 {
		self.generations.get(adapter).copied().unwrap_or(0)
	}
}

/// Reads and writes the DNS servers assigned to adapters.
///
/// Reads go through a per-adapter cache; every write drops the adapter's
/// entry so the next read goes back to the OS.
pub struct ResolverConfigStore<R> {
	runner: Arc<R>,
	cache: Mutex<StateCache>,
	ttl: Duration,
	query_timeout: Duration,
}

impl<R: CommandRunner> ResolverConfigStore<R> {
	pub fn new(runner: Arc<R>, ttl: Duration, query_timeout: Duration) -> Self {
		ResolverConfigStore {
			runner,
			cache: Mutex::new(StateCache::default()),
			ttl,
			query_timeout,
		}
	}

	/// Fresh cached state and the adapter's current generation.
	fn cached(&self, adapter: &str) -> (Option<ResolverState>, u64) {
		let cache = self.cache.lock();
		let state = cache
			.entries
			.get(adapter)
			.filter(|entry| entry.fetched_at.elapsed() < self.ttl)
			.and_then(|entry| entry.state);
		(state, cache.generation(adapter))
	}

	fn remember(&self, adapter: &str, state: Option<ResolverState>, generation: u64) {
		let mut cache = self.cache.lock();
		if cache.generation(adapter) != generation {
			debug!(adapter, "adapter written during query, result not cached");
			return;
		}
		cache.entries.insert(
			adapter.to_string(),
			CacheEntry {
				state,
				fetched_at: Instant::now(),
			},
		);
	}

	pub fn invalidate(&self, adapter: &str) {
		let mut cache = self.cache.lock();
		*cache.generations.entry(adapter.to_string()).or_insert(0) += 1;
		if cache.entries.remove(adapter).is_some() {
			debug!(adapter, "resolver cache entry invalidated");
		}
	}

	/// Current DNS servers for `adapter`.
	pub async fn get_state(&self, adapter: &str, use_cache: bool) -> Result<ResolverState> {
		let (cached, generation) = self.cached(adapter);
		if use_cache {
			if let Some(state) = cached {
				debug!(adapter, "resolver cache hit");
				return Ok(state);
			}
		}

		let spec = CommandSpec::show_dns(adapter);
		let result = match self.runner.run(&spec, self.query_timeout).await {
			Ok(output) => output.check(&spec).map(|o| parse_dns_output(&o.stdout)),
			Err(e) => Err(e),
		};
		self.remember(adapter, result.as_ref().ok().copied(), generation);
		if let Err(e) = &result {
			warn!(adapter, error = %e, "DNS query failed");
		}
		result
	}

	/// Assign static DNS servers to `adapter`.
	///
	/// Both addresses are validated before any command runs.
	pub async fn set_state(&self, adapter: &str, primary: &str, secondary: Option<&str>) -> Result<()> {
		let primary = require_ipv4(primary)?;
		let secondary = optional_ipv4(secondary)?;

		let result = self.apply_static(adapter, primary, secondary).await;
		self.invalidate(adapter);
		result?;

		info!(adapter, %primary, secondary = ?secondary, "DNS servers applied");
		self.flush().await;
		Ok(())
	}

	async fn apply_static(
		&self,
		adapter: &str,
		primary: Ipv4Addr,
		secondary: Option<Ipv4Addr>,
	) -> Result<()> {
		let spec = CommandSpec::set_static_dns(adapter, &primary.to_string());
		self.runner.run(&spec, self.query_timeout).await?.check(&spec)?;

		if let Some(secondary) = secondary {
			let spec = CommandSpec::add_secondary_dns(adapter, &secondary.to_string());
			self.runner.run(&spec, self.query_timeout).await?.check(&spec)?;
		}
		Ok(())
	}

	/// Return `adapter` to DHCP-assigned DNS servers.
	pub async fn reset_state(&self, adapter: &str) -> Result<()> {
		let spec = CommandSpec::set_dhcp_dns(adapter);
		let result = match self.runner.run(&spec, self.query_timeout).await {
			Ok(output) => output.check(&spec).map(|_| ()),
			Err(e) => Err(e),
		};
		self.invalidate(adapter);
		result?;

		info!(adapter, "DNS reset to DHCP");
		self.flush().await;
		Ok(())
	}

	/// Flush the OS resolver cache; failures are logged and ignored.
	async fn flush(&self) {
		let spec = CommandSpec::flush_dns();
		match self.runner.run(&spec, self.query_timeout).await {
			Ok(output) => {
				if let Err(e) = output.check(&spec) {
					warn!(error = %e, "failed to flush resolver cache");
				}
			}
			Err(e) => warn!(error = %e, "failed to flush resolver cache"),
		}
	}
}
