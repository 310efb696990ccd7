use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::EngineError;
use crate::targets::ProbeTarget;

/// Presentation band for a measured latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyBand {
	/// Under 50 ms
	Good,
	/// 50 to 99 ms
	Moderate,
	/// 100 ms and above
	Poor,
}

impl LatencyBand {
	pub fn classify(latency_ms: f64) -> Self {
		if latency_ms < 50.0 {
			LatencyBand::Good
		} else if latency_ms < 100.0 {
			LatencyBand::Moderate
		} else {
			LatencyBand::Poor
		}
	}
}

/// How a single probe ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
	Latency { ms: f64, band: LatencyBand },
	Timeout,
	Unreachable,
	Error(String),
}

impl ProbeOutcome {
	fn latency(ms: f64) -> Self {
		ProbeOutcome::Latency {
			ms,
			band: LatencyBand::classify(ms),
		}
	}
}

impl fmt::Display for ProbeOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProbeOutcome::Latency { ms, .. } => write!(f, "{:.0}ms", ms),
			ProbeOutcome::Timeout => write!(f, "Timeout"),
			ProbeOutcome::Unreachable => write!(f, "Unreachable"),
			ProbeOutcome::Error(_) => write!(f, "Error"),
		}
	}
}

/// Result of probing one target.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
	pub target: String,
	/// Address that was pinged: the resolved IP, or the raw host if resolution failed
	pub address: String,
	pub outcome: ProbeOutcome,
}

/// Tunables for echo probes.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
	pub count: u32,
	pub timeout: Duration,
	pub stagger: Duration,
}

impl Default for ProbeSettings {
	fn default() -> Self {
		ProbeSettings {
			count: 4,
			timeout: Duration::from_secs(10),
			stagger: Duration::from_millis(100),
		}
	}
}

/// Extract the average round-trip time from ping output.
///
/// Understands the Windows summary (`Minimum = 10ms, Maximum = 12ms,
/// Average = 11ms`) and the Unix one (`rtt min/avg/max/mdev =
/// 10.1/11.2/12.3/0.5 ms`).
pub fn parse_average(output: &str) -> Option<f64> {
	for line in output.lines() {
		let trimmed = line.trim();
		if trimmed.contains("Average") {
			if let Some(value) = trimmed.rsplit('=').next() {
				let value = value.trim().trim_end_matches("ms").trim();
				if let Ok(ms) = value.parse::<f64>() {
					return Some(ms);
				}
			}
		} else if (trimmed.starts_with("rtt") || trimmed.starts_with("round-trip"))
			&& trimmed.contains("avg")
		{
			let avg = trimmed
				.split_once('=')
				.and_then(|(_, values)| values.trim().split('/').nth(1));
			if let Some(Ok(ms)) = avg.map(|v| v.trim().parse::<f64>()) {
				return Some(ms);
			}
		}
	}
	None
}

/// Map finished ping output to an outcome.
pub fn classify_ping_output(output: &CommandOutput) -> ProbeOutcome {
	let text = format!("{}\n{}", output.stdout, output.stderr);
	if let Some(ms) = parse_average(&text) {
		return ProbeOutcome::latency(ms);
	}

	let lowered = text.to_lowercase();
	if lowered.contains("unreachable")
		|| lowered.contains("timed out")
		|| lowered.contains("100% packet loss")
		|| lowered.contains("100% loss")
	{
		return ProbeOutcome::Timeout;
	}
	if lowered.contains("could not find host")
		|| lowered.contains("unknown host")
		|| lowered.contains("name or service not known")
		|| lowered.contains("cannot resolve")
	{
		return ProbeOutcome::Unreachable;
	}

	let detail = text.trim();
	ProbeOutcome::Error(if detail.is_empty() {
		format!("ping exited with {:?}", output.code)
	} else {
		detail.lines().last().unwrap_or(detail).to_string()
	})
}

/// Resolve `host` through the OS resolver, preferring an IPv4 address.
async fn resolve_host(host: &str, timeout: Duration) -> Option<IpAddr> {
	if let Ok(ip) = host.parse::<IpAddr>() {
		return Some(ip);
	}
	let lookup = tokio::net::lookup_host((host, 0));
	let addrs: Vec<IpAddr> = match tokio::time::timeout(timeout, lookup).await {
		Ok(Ok(addrs)) => addrs.map(|a| a.ip()).collect(),
		_ => return None,
	};
	addrs.iter().find(|ip| ip.is_ipv4()).or_else(|| addrs.first()).copied()
}

/// Measures reachability and latency with the OS ping tool.
pub struct ProbeEngine<R> {
	runner: Arc<R>,
	settings: ProbeSettings,
}

impl<R: CommandRunner> ProbeEngine<R> {
	pub fn new(runner: Arc<R>, settings: ProbeSettings) -> Self {
		ProbeEngine { runner, settings }
	}

	pub fn settings(&self) -> &ProbeSettings {
		&self.settings
	}

	/// Probe one target. Never fails; problems land in the outcome.
	///
	/// Resolution and the ping share `settings.timeout`; the ping only gets
	/// what resolution left over.
	pub async fn probe(&self, target: &ProbeTarget) -> ProbeResult {
		let start = Instant::now();
		let address = match resolve_host(&target.host, self.settings.timeout).await {
			Some(ip) => ip.to_string(),
			None => {
				debug!(host = %target.host, "resolution failed, pinging raw host");
				target.host.clone()
			}
		};

		let remaining = self.settings.timeout.saturating_sub(start.elapsed());
		let outcome = if remaining.is_zero() {
			ProbeOutcome::Timeout
		} else {
			let spec = CommandSpec::ping(&address, self.settings.count);
			match self.runner.run(&spec, remaining).await {
				Ok(output) => classify_ping_output(&output),
				Err(EngineError::Timeout { .. }) => ProbeOutcome::Timeout,
				Err(e) => ProbeOutcome::Error(e.to_string()),
			}
		};
		debug!(target = %target.name, %address, outcome = %outcome, "probe finished");

		ProbeResult {
			target: target.name.clone(),
			address,
			outcome,
		}
	}

	/// Start one probe task per target, staggering the starts.
	async fn spawn_all(
		engine: &Arc<Self>,
		targets: &[ProbeTarget],
		sink: Option<mpsc::UnboundedSender<ProbeResult>>,
	) -> Vec<JoinHandle<ProbeResult>> {
		let stagger = engine.settings.stagger;
		let mut handles = Vec::with_capacity(targets.len());
		for (i, target) in targets.iter().enumerate() {
			if i > 0 && !stagger.is_zero() {
				tokio::time::sleep(stagger).await;
			}
			let engine = Arc::clone(engine);
			let target = target.clone();
			let sink = sink.clone();
			handles.push(tokio::spawn(async move {
				let result = engine.probe(&target).await;
				if let Some(sink) = sink {
					// receiver may have gone away; the result is still returned
					let _ = sink.send(result.clone());
				}
				result
			}));
		}
		handles
	}

	/// Probe every target concurrently; results come back in target order.
	pub async fn probe_all(engine: &Arc<Self>, targets: &[ProbeTarget]) -> Vec<ProbeResult> {
		let handles = Self::spawn_all(engine, targets, None).await;
		collect(handles, targets).await
	}

	/// Probe every target in the background, posting each result to `sink`
	/// as soon as it completes.
	///
	/// The returned handle resolves to all results in target order once
	/// the batch is done.
	pub fn spawn_probe_all(
		engine: &Arc<Self>,
		targets: Vec<ProbeTarget>,
		sink: mpsc::UnboundedSender<ProbeResult>,
	) -> JoinHandle<Vec<ProbeResult>> {
		let engine = Arc::clone(engine);
		tokio::spawn(async move {
			let handles = Self::spawn_all(&engine, &targets, Some(sink)).await;
			collect(handles, &targets).await
		})
	}
}

async fn collect(handles: Vec<JoinHandle<ProbeResult>>, targets: &[ProbeTarget]) -> Vec<ProbeResult> {
	let mut results = Vec::with_capacity(handles.len());
	for (handle, target) in handles.into_iter().zip(targets) {
		match handle.await {
			Ok(result) => results.push(result),
			Err(e) => {
				warn!(target = %target.name, error = %e, "probe task failed");
				results.push(ProbeResult {
					target: target.name.clone(),
					address: target.host.clone(),
					outcome: ProbeOutcome::Error(e.to_string()),
				});
			}
		}
	}
	results
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::command::fake::{Reply, ScriptedRunner};

	const WINDOWS_OK: &str = "
Pinging 1.1.1.1 with 32 bytes of data:
Reply from 1.1.1.1: bytes=32 time=11ms TTL=57
Reply from 1.1.1.1: bytes=32 time=12ms TTL=57

Ping statistics for 1.1.1.1:
    Packets: Sent = 4, Received = 4, Lost = 0 (0% loss),
Approximate round trip times in milli-seconds:
    Minimum = 10ms, Maximum = 13ms, Average = 23ms
";

	const UNIX_OK: &str = "
PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.
--- 8.8.8.8 ping statistics ---
4 packets transmitted, 4 received, 0% packet loss, time 3004ms
rtt min/avg/max/mdev = 10.123/64.512/80.001/0.456 ms
";

	const WINDOWS_TIMEOUT: &str = "
Pinging 10.255.255.1 with 32 bytes of data:
Request timed out.
Request timed out.

Ping statistics for 10.255.255.1:
    Packets: Sent = 4, Received = 0, Lost = 4 (100% loss),
";

	fn output(stdout: &str, success: bool) -> CommandOutput {
		CommandOutput {
			success,
			code: Some(if success { 0 } else { 1 }),
			stdout: stdout.to_string(),
			stderr: String::new(),
		}
	}

	fn engine(runner: &Arc<ScriptedRunner>) -> Arc<ProbeEngine<ScriptedRunner>> {
		Arc::new(ProbeEngine::new(runner.clone(), ProbeSettings {
			stagger: Duration::ZERO,
			..ProbeSettings::default()
		}))
	}

	#[test]
	fn test_bands() {
		assert_eq!(LatencyBand::classify(0.0), LatencyBand::Good);
		assert_eq!(LatencyBand::classify(49.9), LatencyBand::Good);
		assert_eq!(LatencyBand::classify(50.0), LatencyBand::Moderate);
		assert_eq!(LatencyBand::classify(99.0), LatencyBand::Moderate);
		assert_eq!(LatencyBand::classify(100.0), LatencyBand::Poor);
	}

	#[test]
	fn test_parse_average_windows() {
		assert_eq!(parse_average(WINDOWS_OK), Some(23.0));
	}

	#[test]
	fn test_parse_average_unix() {
		assert_eq!(parse_average(UNIX_OK), Some(64.512));
	}

	#[test]
	fn test_parse_average_missing() {
		assert_eq!(parse_average(WINDOWS_TIMEOUT), None);
		assert_eq!(parse_average(""), None);
	}

	#[test]
	fn test_classify_outcomes() {
		assert_eq!(
			classify_ping_output(&output(WINDOWS_OK, true)),
			ProbeOutcome::Latency { ms: 23.0, band: LatencyBand::Good }
		);
		assert_eq!(
			classify_ping_output(&output(UNIX_OK, true)),
			ProbeOutcome::Latency { ms: 64.512, band: LatencyBand::Moderate }
		);
		assert_eq!(classify_ping_output(&output(WINDOWS_TIMEOUT, false)), ProbeOutcome::Timeout);
		assert_eq!(
			classify_ping_output(&output("Reply from 192.168.1.1: Destination host unreachable.", false)),
			ProbeOutcome::Timeout
		);
		assert_eq!(
			classify_ping_output(&output("Ping request could not find host nowhere.invalid.", false)),
			ProbeOutcome::Unreachable
		);
		assert!(matches!(
			classify_ping_output(&output("something odd", false)),
			ProbeOutcome::Error(_)
		));
	}

	#[tokio::test]
	async fn test_probe_ip_target() {
		let runner = Arc::new(ScriptedRunner::new());
		runner.reply("ping", &[], Reply::ok(WINDOWS_OK));
		let engine = engine(&runner);

		let result = engine.probe(&ProbeTarget::new("Cloudflare", "1.1.1.1")).await;
		assert_eq!(result.target, "Cloudflare");
		assert_eq!(result.address, "1.1.1.1");
		assert!(matches!(result.outcome, ProbeOutcome::Latency { .. }));
		let calls = runner.calls();
		assert_eq!(calls.len(), 1);
		assert_eq!(calls[0].args.first().map(String::as_str), Some(if cfg!(windows) { "-n" } else { "-c" }));
		assert_eq!(calls[0].args[1], "4");
	}

	#[tokio::test]
	async fn test_ping_gets_remaining_budget() {
		let runner = Arc::new(ScriptedRunner::new());
		runner.reply("ping", &[], Reply::ok(WINDOWS_OK));
		let engine = engine(&runner);

		engine.probe(&ProbeTarget::new("Cloudflare", "1.1.1.1")).await;
		let timeouts = runner.timeouts();
		assert_eq!(timeouts.len(), 1);
		assert!(timeouts[0] <= engine.settings().timeout);
		assert!(timeouts[0] > Duration::ZERO);
	}

	#[tokio::test]
	async fn test_exhausted_budget_skips_ping() {
		let runner = Arc::new(ScriptedRunner::new());
		let engine = ProbeEngine::new(runner.clone(), ProbeSettings {
			timeout: Duration::ZERO,
			..ProbeSettings::default()
		});
		let result = engine.probe(&ProbeTarget::new("Cloudflare", "1.1.1.1")).await;
		assert_eq!(result.outcome, ProbeOutcome::Timeout);
		assert!(runner.calls().is_empty());
	}

	#[tokio::test]
	async fn test_probe_command_timeout() {
		let runner = Arc::new(ScriptedRunner::new());
		runner.reply("ping", &[], Reply::Timeout);
		let engine = engine(&runner);
		let result = engine.probe(&ProbeTarget::new("Google DNS", "8.8.8.8")).await;
		assert_eq!(result.outcome, ProbeOutcome::Timeout);
	}

	#[tokio::test]
	async fn test_probe_all_keeps_order_and_isolates_failures() {
		let runner = Arc::new(ScriptedRunner::new());
		runner.reply("ping", &[], Reply::ok(WINDOWS_OK));
		runner.reply("ping", &["-n", "4", "10.255.255.1"], Reply::fail(WINDOWS_TIMEOUT));
		runner.reply("ping", &["-c", "4", "10.255.255.1"], Reply::fail(WINDOWS_TIMEOUT));
		let engine = engine(&runner);

		let targets = vec![
			ProbeTarget::new("A", "1.1.1.1"),
			ProbeTarget::new("Dead", "10.255.255.1"),
			ProbeTarget::new("B", "8.8.8.8"),
		];
		let results = ProbeEngine::probe_all(&engine, &targets).await;
		let names: Vec<&str> = results.iter().map(|r| r.target.as_str()).collect();
		assert_eq!(names, vec!["A", "Dead", "B"]);
		assert!(matches!(results[0].outcome, ProbeOutcome::Latency { .. }));
		assert_eq!(results[1].outcome, ProbeOutcome::Timeout);
		assert!(matches!(results[2].outcome, ProbeOutcome::Latency { .. }));
	}

	#[tokio::test]
	async fn test_spawn_probe_all_streams_results() {
		let runner = Arc::new(ScriptedRunner::new());
		runner.reply("ping", &[], Reply::ok(UNIX_OK));
		let engine = engine(&runner);
		let targets = vec![ProbeTarget::new("A", "1.1.1.1"), ProbeTarget::new("B", "8.8.8.8")];

		let (tx, mut rx) = mpsc::unbounded_channel();
		let handle = ProbeEngine::spawn_probe_all(&engine, targets, tx);

		let mut streamed = Vec::new();
		while let Some(result) = rx.recv().await {
			streamed.push(result.target);
		}
		streamed.sort();
		assert_eq!(streamed, vec!["A".to_string(), "B".to_string()]);
		assert_eq!(handle.await.unwrap().len(), 2);
	}
}
