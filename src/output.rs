use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use anyhow::Result;

use dns_manager::adapter::Adapter;
use dns_manager::bench::BenchmarkMode;
use dns_manager::catalog::DnsPreset;
use dns_manager::probe::{LatencyBand, ProbeOutcome, ProbeResult};
use dns_manager::resolver::ResolverState;
use dns_manager::stats::BenchmarkResult;
use dns_manager::targets::ProbeTarget;

fn new_table(header: Vec<&str>) -> Table {
	let mut table = Table::new();
	table.load_preset(UTF8_FULL);
	table.set_content_arrangement(ContentArrangement::Dynamic);
	table.set_header(header);
	table
}

fn band_color(band: LatencyBand) -> Color {
	match band {
		LatencyBand::Good => Color::Green,
		LatencyBand::Moderate => Color::Yellow,
		LatencyBand::Poor => Color::Red,
	}
}

fn ms_or_dash(value: Option<f64>) -> String {
	match value {
		Some(ms) => format!("{:.1} ms", ms),
		None => "--".to_string(),
	}
}

fn secondary_or_dash(preset: &DnsPreset) -> String {
	preset.secondary.map(|s| s.to_string()).unwrap_or_else(|| "--".to_string())
}

/// Print active adapters, marking the default pick.
pub fn print_adapters(adapters: &[Adapter], default: Option<&str>) {
	let mut table = new_table(vec!["Adapter", "Admin State", "Connected", "Wireless", "Default"]);
	for a in adapters {
		let is_default = default == Some(a.name.as_str());
		table.add_row(vec![
			a.name.clone(),
			a.admin_state.clone(),
			if a.connected { "yes" } else { "no" }.to_string(),
			if a.is_wireless() { "yes" } else { "no" }.to_string(),
			if is_default { "*" } else { "" }.to_string(),
		]);
	}
	println!("{table}");
}

/// Print the DNS servers bound to an adapter.
pub fn print_state(adapter: &str, state: &ResolverState) {
	println!("Adapter:   {}", adapter);
	match state {
		ResolverState::Automatic => println!("DNS:       DHCP (automatic)"),
		ResolverState::Static { primary, secondary } => {
			println!("Primary:   {}", primary);
			if let Some(secondary) = secondary {
				println!("Secondary: {}", secondary);
			}
		}
	}
}

/// Print presets as a table.
pub fn print_presets<'a>(presets: impl IntoIterator<Item = &'a DnsPreset>) {
	let mut table = new_table(vec!["Name", "Primary", "Secondary"]);
	let mut empty = true;
	for p in presets {
		empty = false;
		table.add_row(vec![p.name.clone(), p.primary.to_string(), secondary_or_dash(p)]);
	}
	if empty {
		println!("No saved configurations yet");
	} else {
		println!("{table}");
	}
}

pub fn print_targets(targets: &[ProbeTarget]) {
	let mut table = new_table(vec!["Target", "Host"]);
	for t in targets {
		table.add_row(vec![t.name.clone(), t.host.clone()]);
	}
	println!("{table}");
}

fn outcome_cell(outcome: &ProbeOutcome) -> Cell {
	let cell = Cell::new(outcome.to_string());
	match outcome {
		ProbeOutcome::Latency { band, .. } => cell.fg(band_color(*band)),
		_ => cell.fg(Color::Red),
	}
}

/// Print one probe result as soon as it arrives.
pub fn print_probe_line(result: &ProbeResult) {
	match &result.outcome {
		ProbeOutcome::Error(detail) => {
			println!("  {:<28} {:<16} Error ({})", result.target, result.address, detail)
		}
		outcome => println!("  {:<28} {:<16} {}", result.target, result.address, outcome),
	}
}

/// Print probe results as a table, in target order.
pub fn print_probe_table(results: &[ProbeResult]) {
	let mut table = new_table(vec!["Target", "Address", "Latency"]);
	for r in results {
		table.add_row(vec![
			Cell::new(&r.target),
			Cell::new(&r.address),
			outcome_cell(&r.outcome),
		]);
	}
	println!("\nProbe Results");
	println!("=============\n");
	println!("{table}");
}

/// Print the benchmark ranking.
pub fn print_results_table(results: &[BenchmarkResult], mode: BenchmarkMode) {
	let mut table = new_table(vec![
		"Rank", "Configuration", "Primary", "Mean", "Median", "Success",
	]);

	for r in results {
		let mean_cell = match r.mean_ms {
			Some(ms) => Cell::new(format!("{:.1} ms", ms)).fg(band_color(LatencyBand::classify(ms))),
			None => Cell::new("--").fg(Color::Red),
		};
		table.add_row(vec![
			Cell::new(r.rank),
			Cell::new(&r.preset.name),
			Cell::new(r.preset.primary),
			mean_cell,
			Cell::new(ms_or_dash(r.p50_ms)),
			Cell::new(format!("{}/{}", r.success_count, r.total_count)),
		]);
	}

	println!("\nBenchmark Results");
	println!("=================\n");
	println!("{table}");
	if mode == BenchmarkMode::System {
		println!(
			"\nNote: system mode times resolution through the current OS resolver. \
			 Every configuration is measured against the same resolver, so the \
			 ranking does not reflect the configured servers."
		);
	}
}

/// Write benchmark results to a CSV file.
pub fn write_csv(path: &str, results: &[BenchmarkResult]) -> Result<()> {
	let mut writer = csv::Writer::from_path(path)?;

	writer.write_record([
		"rank", "configuration", "primary", "secondary",
		"mean_ms", "p50_ms", "success", "total", "success_rate",
	])?;

	for r in results {
		writer.write_record([
			r.rank.to_string(),
			r.preset.name.clone(),
			r.preset.primary.to_string(),
			r.preset.secondary.map(|s| s.to_string()).unwrap_or_default(),
			r.mean_ms.map(|v| format!("{:.2}", v)).unwrap_or_default(),
			r.p50_ms.map(|v| format!("{:.2}", v)).unwrap_or_default(),
			r.success_count.to_string(),
			r.total_count.to_string(),
			format!("{:.1}", r.success_fraction() * 100.0),
		])?;
	}

	writer.flush()?;
	println!("\nResults written to: {}", path);
	Ok(())
}
