use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use tracing::{debug, info, warn};

use crate::catalog::DnsPreset;
use crate::dns::timed_query;
use crate::error::{EngineError, Result};
use crate::stats::{rank_results, summarize, BenchmarkResult, Measurement};
use crate::targets::ProbeTarget;

/// How each (preset, target) pair is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BenchmarkMode {
	/// Query each preset's primary server directly over UDP
	Direct,
	/// Time hostname resolution through the OS resolver
	System,
}

/// Times one hostname lookup on behalf of a preset.
pub trait LookupTimer: Send + Sync + 'static {
	/// Milliseconds taken to resolve `host`, or None if resolution failed.
	fn time_lookup(&self, preset: &DnsPreset, host: &str) -> impl Future<Output = Option<f64>> + Send;
}

/// Sends an A query straight to the preset's primary server.
#[derive(Debug, Clone)]
pub struct DirectLookup {
	pub timeout: Duration,
}

impl LookupTimer for DirectLookup {
	async fn time_lookup(&self, preset: &DnsPreset, host: &str) -> Option<f64> {
		let server = SocketAddr::new(preset.primary.into(), 53);
		timed_query(server, host, self.timeout)
			.await
			.map(|latency| latency.as_secs_f64() * 1000.0)
	}
}

/// Times resolution through the OS resolver.
///
/// The system resolver is the same for every preset, so this does not
/// measure the preset's servers at all; it only reflects how quickly the
/// machine currently resolves each target.
#[derive(Debug, Clone)]
pub struct SystemLookup {
	pub timeout: Duration,
}

impl LookupTimer for SystemLookup {
	async fn time_lookup(&self, _preset: &DnsPreset, host: &str) -> Option<f64> {
		let start = Instant::now();
		let resolved = match tokio::time::timeout(self.timeout, tokio::net::lookup_host((host, 0))).await {
			Ok(Ok(mut addrs)) => addrs.next().is_some(),
			_ => false,
		};
		resolved.then(|| start.elapsed().as_secs_f64() * 1000.0)
	}
}

/// Rank presets by how quickly the selected targets resolve.
///
/// One task runs per (preset, target) pair; each writes its own slot and a
/// failed lookup only affects that slot. IP-literal targets are skipped
/// since there is nothing to resolve.
pub async fn run_benchmark<T: LookupTimer>(
	timer: Arc<T>,
	presets: &[DnsPreset],
	targets: &[ProbeTarget],
) -> Result<Vec<BenchmarkResult>> {
	let hosts: Vec<&ProbeTarget> = targets.iter()
		.filter(|t| {
			let literal = t.is_ip_literal();
			if literal {
				debug!(target = %t.name, "skipping IP-literal target");
			}
			!literal
		})
		.collect();
	if hosts.is_empty() {
		return Err(EngineError::NoTargetsSelected);
	}
	if presets.is_empty() {
		return Err(EngineError::NoConfigsAvailable);
	}

	info!(presets = presets.len(), targets = hosts.len(), "running benchmark");

	let mut handles = Vec::with_capacity(presets.len());
	for preset in presets {
		let mut row = Vec::with_capacity(hosts.len());
		for target in &hosts {
			let timer = Arc::clone(&timer);
			let preset = preset.clone();
			let host = target.host.clone();
			row.push(tokio::spawn(async move {
				timer.time_lookup(&preset, &host).await
			}));
		}
		handles.push(row);
	}

	let mut results = Vec::with_capacity(presets.len());
	for (preset, row) in presets.iter().zip(handles) {
		let mut measurements = Vec::with_capacity(row.len());
		for (target, handle) in hosts.iter().zip(row) {
			let latency_ms = match handle.await {
				Ok(latency) => latency,
				Err(e) => {
					warn!(preset = %preset.name, target = %target.name, error = %e, "lookup task failed");
					None
				}
			};
			measurements.push(Measurement {
				target: target.name.clone(),
				latency_ms,
			});
		}
		let result = summarize(preset.clone(), measurements);
		debug!(
			preset = %preset.name,
			mean_ms = ?result.mean_ms,
			success = result.success_count,
			total = result.total_count,
			"preset measured"
		);
		results.push(result);
	}

	Ok(rank_results(results))
}
