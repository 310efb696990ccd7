use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{EngineError, Result};

/// Admin-state tokens that mark an interface as usable.
const ACTIVE_STATES: [&str; 2] = ["Enabled", "Connected"];

/// Name fragments that identify wireless adapters.
pub const WIRELESS_KEYWORDS: [&str; 5] = ["wi-fi", "wifi", "wireless", "wlan", "802.11"];

/// A network interface as reported by the OS at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adapter {
	pub name: String,
	pub admin_state: String,
	pub connected: bool,
}

impl Adapter {
	pub fn is_wireless(&self) -> bool {
		is_wireless_name(&self.name)
	}
}

/// Case-insensitive match of an adapter name against the wireless keyword set.
pub fn is_wireless_name(name: &str) -> bool {
	let lowered = name.to_lowercase();
	WIRELESS_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// Strategy for choosing which adapter a command targets when none is named.
pub trait DefaultAdapterStrategy: Send + Sync {
	/// Index of the preferred adapter, or None to fall back to the first one.
	fn choose(&self, adapters: &[Adapter]) -> Option<usize>;
}

/// Prefer the first adapter whose name looks wireless.
#[derive(Debug, Clone, Copy, Default)]
pub struct WirelessFirst;

impl DefaultAdapterStrategy for WirelessFirst {
	fn choose(&self, adapters: &[Adapter]) -> Option<usize> {
		adapters.iter().position(Adapter::is_wireless)
	}
}

/// Pick the default adapter using `strategy`, falling back to the first entry.
pub fn pick_default<'a>(
	adapters: &'a [Adapter],
	strategy: &dyn DefaultAdapterStrategy,
) -> Result<&'a Adapter> {
	if adapters.is_empty() {
		return Err(EngineError::NoAdaptersFound);
	}
	let index = strategy.choose(adapters).unwrap_or(0);
	adapters.get(index).ok_or(EngineError::NoAdaptersFound)
}

/// Parse the table printed by `netsh interface show interface`.
///
/// Expected layout:
///
///   Admin State    State          Type             Interface Name
///   -------------------------------------------------------------------------
///   Enabled        Connected      Dedicated        Wi-Fi
///
/// Rows after the dashed separator must have at least four columns; the
/// name is everything from the fourth column on. A missing separator or a
/// short row is an anomaly and rejects the whole table.
pub fn parse_interface_table(output: &str) -> std::result::Result<Vec<Adapter>, String> {
	let mut lines = output.lines();
	if !lines.by_ref().any(|line| line.trim_start().starts_with("---")) {
		return Err("interface table has no header separator".to_string());
	}

	let mut adapters = Vec::new();
	for line in lines {
		let parts: Vec<&str> = line.split_whitespace().collect();
		if parts.is_empty() {
			continue;
		}
		if parts.len() < 4 {
			return Err(format!("malformed interface row: {:?}", line.trim()));
		}
		if !ACTIVE_STATES.contains(&parts[0]) {
			continue;
		}
		adapters.push(Adapter {
			name: parts[3..].join(" "),
			admin_state: parts[0].to_string(),
			connected: parts[1] == "Connected",
		});
	}
	Ok(adapters)
}

/// Enumerates active network adapters through the OS.
pub struct AdapterRegistry<R> {
	runner: Arc<R>,
	timeout: Duration,
	strategy: Box<dyn DefaultAdapterStrategy>,
}

impl<R: CommandRunner> AdapterRegistry<R> {
	pub fn new(runner: Arc<R>, timeout: Duration) -> Self {
		AdapterRegistry {
			runner,
			timeout,
			strategy: Box::new(WirelessFirst),
		}
	}

	/// Replace the default-adapter heuristic.
	pub fn with_strategy(mut self, strategy: Box<dyn DefaultAdapterStrategy>) -> Self {
		self.strategy = strategy;
		self
	}

	/// List active adapters in the order the OS reports them.
	pub async fn list_adapters(&self) -> Result<Vec<Adapter>> {
		let spec = CommandSpec::list_interfaces();
		let output = self.runner.run(&spec, self.timeout).await?.check(&spec)?;
		match parse_interface_table(&output.stdout) {
			Ok(adapters) => {
				debug!(count = adapters.len(), "enumerated adapters");
				Ok(adapters)
			}
			Err(detail) => {
				warn!(%detail, "could not parse interface list");
				Err(EngineError::CommandFailed {
					command: spec.to_string(),
					detail,
				})
			}
		}
	}

	pub fn pick_default<'a>(&self, adapters: &'a [Adapter]) -> Result<&'a Adapter> {
		pick_default(adapters, self.strategy.as_ref())
	}

	/// Resolve the adapter a command should act on.
	///
	/// An explicit name must be present in the live list; otherwise the
	/// default strategy picks one.
	pub async fn resolve(&self, requested: Option<&str>) -> Result<Adapter> {
		let adapters = self.list_adapters().await?;
		match requested {
			Some(name) => adapters
				.into_iter()
				.find(|a| a.name.eq_ignore_ascii_case(name))
				.ok_or_else(|| EngineError::AdapterNotFound(name.to_string())),
			None => self.pick_default(&adapters).cloned(),
		}
	}
}
