use std::net::IpAddr;

use anyhow::{anyhow, Result};

/// A named host to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
	pub name: String,
	pub host: String,
}

impl ProbeTarget {
	pub fn new(name: &str, host: &str) -> Self {
		ProbeTarget {
			name: name.to_string(),
			host: host.to_string(),
		}
	}

	/// True when the host is an IP literal and needs no name resolution.
	pub fn is_ip_literal(&self) -> bool {
		self.host.parse::<IpAddr>().is_ok()
	}
}

/// Return the built-in targets: game services, AI services and public resolvers.
pub fn default_targets() -> Vec<ProbeTarget> {
	[
		("Fortnite (NA-East)", "qosping-aws-us-east-1.ol.epicgames.com"),
		("Fortnite (EU)", "qosping-aws-eu-west-1.ol.epicgames.com"),
		("Epic Games", "epicgames.com"),
		("Call of Duty (Activision)", "activision.com"),
		("EA Servers", "ea.com"),
		("Battlefield", "battlefield.com"),
		("Steam", "store.steampowered.com"),
		("Riot Games", "riotgames.com"),
		("Valorant", "playvalorant.com"),
		("League of Legends", "leagueoflegends.com"),
		("Battle.net", "battle.net"),
		("Ubisoft", "ubisoft.com"),
		("Apex Legends", "playapex.com"),
		("ChatGPT", "chat.openai.com"),
		("Gemini (Google)", "gemini.google.com"),
		("Claude", "claude.ai"),
		("Perplexity", "perplexity.ai"),
		("YouTube", "youtube.com"),
		("Cloudflare", "1.1.1.1"),
		("Google DNS", "8.8.8.8"),
	]
	.into_iter()
	.map(|(name, host)| ProbeTarget::new(name, host))
	.collect()
}

/// Parse target definitions, one `name=host` pair per line.
///
/// Blank lines and lines starting with '#' are skipped. A bare host is
/// its own name.
pub fn parse_target_lines(content: &str) -> Result<Vec<ProbeTarget>> {
	let mut targets = Vec::new();
	for (i, line) in content.lines().enumerate() {
		let trimmed = line.trim();
		if trimmed.is_empty() || trimmed.starts_with('#') {
			continue;
		}
		let (name, host) = match trimmed.split_once('=') {
			Some((name, host)) => (name.trim(), host.trim()),
			None => (trimmed, trimmed),
		};
		if name.is_empty() || host.is_empty() || host.contains(char::is_whitespace) {
			return Err(anyhow!("invalid target on line {}: '{}'", i + 1, trimmed));
		}
		targets.push(ProbeTarget::new(name, host));
	}
	Ok(targets)
}

/// Read targets from a file, see `parse_target_lines`.
pub fn read_target_file(path: &str) -> Result<Vec<ProbeTarget>> {
	let content = std::fs::read_to_string(path)
		.map_err(|e| anyhow!("failed to read target file '{}': {}", path, e))?;
	parse_target_lines(&content)
}

/// Append `extra` to `base`; an extra target replaces a base target of the same name.
pub fn merge_targets(base: Vec<ProbeTarget>, extra: Vec<ProbeTarget>) -> Vec<ProbeTarget> {
	let mut merged: Vec<ProbeTarget> = base.into_iter()
		.filter(|t| !extra.iter().any(|e| e.name == t.name))
		.collect();
	merged.extend(extra);
	merged
}

/// Pick targets by name (case-insensitive), preserving the table order.
///
/// Returns the matches and the names that matched nothing.
pub fn select_targets<'a>(
	table: &'a [ProbeTarget],
	names: &[String],
) -> (Vec<&'a ProbeTarget>, Vec<String>) {
	let selected = table.iter()
		.filter(|t| names.iter().any(|n| n.eq_ignore_ascii_case(&t.name)))
		.collect();
	let unknown = names.iter()
		.filter(|n| !table.iter().any(|t| n.eq_ignore_ascii_case(&t.name)))
		.cloned()
		.collect();
	(selected, unknown)
}
