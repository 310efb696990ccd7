use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::adapter::{Adapter, AdapterRegistry};
use crate::bench::{run_benchmark, BenchmarkMode, DirectLookup, SystemLookup};
use crate::catalog::{builtin_presets, ConfigCatalog, DnsPreset};
use crate::command::CommandRunner;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::probe::{ProbeEngine, ProbeResult};
use crate::resolver::{ResolverConfigStore, ResolverState};
use crate::stats::BenchmarkResult;
use crate::targets::{select_targets, ProbeTarget};

/// Command interface over the adapter, resolver, catalog, probe and
/// benchmark components.
pub struct Engine<R> {
	adapters: AdapterRegistry<R>,
	resolver: ResolverConfigStore<R>,
	catalog: ConfigCatalog,
	probes: Arc<ProbeEngine<R>>,
	targets: Vec<ProbeTarget>,
	config: EngineConfig,
}

impl<R: CommandRunner> Engine<R> {
	pub fn new(runner: Arc<R>, config: EngineConfig, targets: Vec<ProbeTarget>) -> Self {
		Engine {
			adapters: AdapterRegistry::new(runner.clone(), config.query_timeout),
			resolver: ResolverConfigStore::new(runner.clone(), config.cache_ttl, config.query_timeout),
			catalog: ConfigCatalog::load(&config.catalog_path),
			probes: Arc::new(ProbeEngine::new(runner, config.probe.clone())),
			targets,
			config,
		}
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub async fn list_adapters(&self) -> Result<Vec<Adapter>> {
		self.adapters.list_adapters().await
	}

	pub fn pick_default<'a>(&self, adapters: &'a [Adapter]) -> Result<&'a Adapter> {
		self.adapters.pick_default(adapters)
	}

	/// The named adapter, or the default one when no name is given.
	pub async fn adapter(&self, requested: Option<&str>) -> Result<Adapter> {
		self.adapters.resolve(requested).await
	}

	pub async fn get_state(&self, adapter: &str) -> Result<ResolverState> {
		self.resolver.get_state(adapter, true).await
	}

	pub async fn refresh_state(&self, adapter: &str) -> Result<ResolverState> {
		self.resolver.get_state(adapter, false).await
	}

	pub async fn set_state(&self, adapter: &str, primary: &str, secondary: Option<&str>) -> Result<()> {
		self.resolver.set_state(adapter, primary, secondary).await
	}

	pub async fn reset_state(&self, adapter: &str) -> Result<()> {
		self.resolver.reset_state(adapter).await
	}

	/// Look up a preset among the saved ones first, then the built-in list.
	pub fn find_preset(&self, name: &str) -> Option<DnsPreset> {
		self.catalog.get(name).cloned().or_else(|| {
			builtin_presets()
				.into_iter()
				.find(|p| p.name.eq_ignore_ascii_case(name))
		})
	}

	/// Apply a saved or built-in preset to `adapter`.
	pub async fn apply_preset(&self, adapter: &str, name: &str) -> Result<DnsPreset> {
		let preset = self.find_preset(name)
			.ok_or_else(|| EngineError::PresetNotFound(name.to_string()))?;
		let primary = preset.primary.to_string();
		let secondary = preset.secondary.map(|s| s.to_string());
		self.resolver.set_state(adapter, &primary, secondary.as_deref()).await?;
		Ok(preset)
	}

	pub fn catalog(&self) -> &ConfigCatalog {
		&self.catalog
	}

	pub fn catalog_mut(&mut self) -> &mut ConfigCatalog {
		&mut self.catalog
	}

	pub fn targets(&self) -> &[ProbeTarget] {
		&self.targets
	}

	/// Targets matching `names`; unknown names are reported and skipped.
	pub fn select_targets(&self, names: &[String]) -> Result<Vec<ProbeTarget>> {
		let (selected, unknown) = select_targets(&self.targets, names);
		for name in &unknown {
			warn!(target = %name, "unknown probe target");
		}
		if selected.is_empty() {
			return Err(EngineError::NoTargetsSelected);
		}
		Ok(selected.into_iter().cloned().collect())
	}

	pub async fn probe(&self, target: &ProbeTarget) -> ProbeResult {
		self.probes.probe(target).await
	}

	pub async fn probe_all(&self, targets: &[ProbeTarget]) -> Vec<ProbeResult> {
		ProbeEngine::probe_all(&self.probes, targets).await
	}

	/// Probe in the background, posting each result to `sink` as it lands.
	pub fn spawn_probe_all(
		&self,
		targets: Vec<ProbeTarget>,
		sink: mpsc::UnboundedSender<ProbeResult>,
	) -> JoinHandle<Vec<ProbeResult>> {
		ProbeEngine::spawn_probe_all(&self.probes, targets, sink)
	}

	/// Rank the saved presets (plus the built-in ones when asked) over the
	/// named targets.
	pub async fn run_benchmark(
		&self,
		target_names: &[String],
		include_builtin: bool,
		mode: BenchmarkMode,
	) -> Result<Vec<BenchmarkResult>> {
		if target_names.is_empty() {
			return Err(EngineError::NoTargetsSelected);
		}
		let targets = self.select_targets(target_names)?;

		let mut presets: Vec<DnsPreset> = self.catalog.presets().cloned().collect();
		if include_builtin {
			for preset in builtin_presets() {
				if self.catalog.get(&preset.name).is_none() {
					presets.push(preset);
				}
			}
		}

		let timeout = self.config.lookup_timeout;
		match mode {
			BenchmarkMode::Direct => {
				run_benchmark(Arc::new(DirectLookup { timeout }), &presets, &targets).await
			}
			BenchmarkMode::System => {
				run_benchmark(Arc::new(SystemLookup { timeout }), &presets, &targets).await
			}
		}
	}
}
