mod cli;
mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use dns_manager::command::SystemRunner;
use dns_manager::config::EngineConfig;
use dns_manager::engine::Engine;
use dns_manager::error::EngineError;
use dns_manager::probe::ProbeSettings;
use dns_manager::{catalog, resolver, targets};

use crate::cli::{Cli, Command, PresetCommand};

fn init_logging(verbose: bool) {
	let default = if verbose { "dns_manager=debug" } else { "dns_manager=warn" };
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(default));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

/// Attach a hint to errors caused by a non-elevated shell.
fn elevation_hint(e: EngineError) -> anyhow::Error {
	match e {
		EngineError::PrivilegeRequired(_) => anyhow::Error::new(e)
			.context("changing DNS servers requires an elevated (Administrator) shell"),
		other => other.into(),
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	init_logging(cli.verbose);

	// Built-in targets, extended or overridden from the target file
	let mut probe_targets = targets::default_targets();
	if let Some(path) = &cli.targets_file {
		probe_targets = targets::merge_targets(probe_targets, targets::read_target_file(path)?);
	}

	let mut config = EngineConfig {
		catalog_path: PathBuf::from(&cli.catalog),
		cache_ttl: Duration::from_secs(cli.cache_ttl),
		query_timeout: Duration::from_millis(cli.query_timeout),
		..EngineConfig::default()
	};
	match &cli.command {
		Command::Ping { count, timeout, stagger, .. } => {
			config.probe = ProbeSettings {
				count: *count,
				timeout: Duration::from_millis(*timeout),
				stagger: Duration::from_millis(*stagger),
			};
		}
		Command::Benchmark { lookup_timeout, .. } => {
			config.lookup_timeout = Duration::from_millis(*lookup_timeout);
		}
		_ => {}
	}

	let mut engine = Engine::new(Arc::new(SystemRunner), config, probe_targets);

	match cli.command {
		Command::Adapters => {
			let adapters = engine.list_adapters().await?;
			let default = engine.pick_default(&adapters).ok().map(|a| a.name.clone());
			output::print_adapters(&adapters, default.as_deref());
		}

		Command::Show { adapter, fresh } => {
			let adapter = engine.adapter(adapter.adapter.as_deref()).await?;
			let state = if fresh {
				engine.refresh_state(&adapter.name).await?
			} else {
				engine.get_state(&adapter.name).await?
			};
			output::print_state(&adapter.name, &state);
		}

		Command::Set { primary, secondary, adapter } => {
			// Reject bad input before touching the OS at all
			resolver::require_ipv4(&primary)?;
			resolver::optional_ipv4(secondary.as_deref())?;

			let adapter = engine.adapter(adapter.adapter.as_deref()).await?;
			engine.set_state(&adapter.name, &primary, secondary.as_deref())
				.await
				.map_err(elevation_hint)?;
			println!("DNS applied successfully.");
			output::print_state(&adapter.name, &engine.get_state(&adapter.name).await?);
		}

		Command::Reset { adapter } => {
			let adapter = engine.adapter(adapter.adapter.as_deref()).await?;
			engine.reset_state(&adapter.name).await.map_err(elevation_hint)?;
			println!("DNS reset to DHCP (automatic).");
			output::print_state(&adapter.name, &engine.get_state(&adapter.name).await?);
		}

		Command::Apply { preset, adapter } => {
			let adapter = engine.adapter(adapter.adapter.as_deref()).await?;
			let applied = engine.apply_preset(&adapter.name, &preset)
				.await
				.map_err(elevation_hint)?;
			println!("Applied preset '{}'.", applied.name);
			output::print_state(&adapter.name, &engine.get_state(&adapter.name).await?);
		}

		Command::Presets(command) => match command {
			PresetCommand::List => output::print_presets(engine.catalog().presets()),
			PresetCommand::Builtin => output::print_presets(&catalog::builtin_presets()),
			PresetCommand::Save { name, primary, secondary } => {
				engine.catalog_mut().put(&name, &primary, secondary.as_deref())?;
				println!("Configuration '{}' saved.", name);
			}
			PresetCommand::Delete { name } => {
				if engine.catalog_mut().delete(&name)? {
					println!("Configuration '{}' deleted.", name);
				} else {
					println!("No saved configuration named '{}'.", name);
				}
			}
			PresetCommand::Import { path } => {
				let count = engine.catalog_mut().import_from(Path::new(&path))?;
				println!("Imported {} configuration(s) from {}.", count, path);
			}
			PresetCommand::Export { path } => {
				engine.catalog().export_to(Path::new(&path))?;
				println!("Exported {} configuration(s) to {}.", engine.catalog().len(), path);
			}
		},

		Command::Targets => output::print_targets(engine.targets()),

		Command::Ping { names, all, .. } => {
			let selected = if all || names.is_empty() {
				engine.targets().to_vec()
			} else {
				engine.select_targets(&names)?
			};
			println!("Probing {} target(s)...", selected.len());

			// Results stream in as each probe finishes
			let (tx, mut rx) = mpsc::unbounded_channel();
			let handle = engine.spawn_probe_all(selected, tx);
			while let Some(result) = rx.recv().await {
				output::print_probe_line(&result);
			}
			let results = handle.await?;
			output::print_probe_table(&results);
		}

		Command::Benchmark { targets, builtin, mode, output: csv_path, .. } => {
			let names: Vec<String> = if targets.is_empty() {
				engine.targets().iter()
					.filter(|t| !t.is_ip_literal())
					.map(|t| t.name.clone())
					.collect()
			} else {
				targets
			};
			println!(
				"Benchmarking {} saved configuration(s){} against {} target(s), mode: {:?}",
				engine.catalog().len(),
				if builtin { " plus built-in presets" } else { "" },
				names.len(),
				mode,
			);

			let results = engine.run_benchmark(&names, builtin, mode).await?;
			output::print_results_table(&results, mode);

			if let Some(path) = &csv_path {
				output::write_csv(path, &results)?;
			}
		}
	}

	Ok(())
}
