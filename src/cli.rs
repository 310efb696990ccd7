use clap::{Args, Parser, Subcommand};

use dns_manager::bench::BenchmarkMode;
use dns_manager::config::DEFAULT_CATALOG_FILE;

/// Manage adapter DNS servers, saved presets, latency probes and benchmarks
#[derive(Parser, Debug)]
#[command(name = "dns-manager")]
#[command(about = "View and change adapter DNS servers, save presets, probe hosts and benchmark resolvers")]
pub struct Cli {
	/// Log debug output to stderr (RUST_LOG overrides)
	#[arg(short = 'v', long = "verbose", global = true)]
	pub verbose: bool,

	/// Saved preset catalog file
	#[arg(long = "catalog", env = "DNS_MANAGER_CATALOG", default_value = DEFAULT_CATALOG_FILE, global = true)]
	pub catalog: String,

	/// Extra probe targets, one `name=host` per line
	#[arg(long = "targets-file", global = true)]
	pub targets_file: Option<String>,

	/// Timeout for netsh and ipconfig calls in milliseconds
	#[arg(long = "query-timeout", default_value = "3000", global = true)]
	pub query_timeout: u64,

	/// Seconds a DNS state read stays cached
	#[arg(long = "cache-ttl", default_value = "5", global = true)]
	pub cache_ttl: u64,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Args, Debug)]
pub struct AdapterArg {
	/// Network adapter name (defaults to the first wireless adapter, else the first active one)
	#[arg(short = 'a', long = "adapter")]
	pub adapter: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// List active network adapters
	Adapters,

	/// Show the DNS servers of an adapter
	Show {
		#[command(flatten)]
		adapter: AdapterArg,

		/// Bypass the state cache
		#[arg(long = "fresh")]
		fresh: bool,
	},

	/// Assign static DNS servers to an adapter
	Set {
		/// Primary DNS server (IPv4)
		primary: String,

		/// Secondary DNS server (IPv4)
		secondary: Option<String>,

		#[command(flatten)]
		adapter: AdapterArg,
	},

	/// Return an adapter to DHCP-assigned DNS servers
	Reset {
		#[command(flatten)]
		adapter: AdapterArg,
	},

	/// Apply a saved or built-in preset to an adapter
	Apply {
		/// Preset name
		preset: String,

		#[command(flatten)]
		adapter: AdapterArg,
	},

	/// Manage saved presets
	#[command(subcommand)]
	Presets(PresetCommand),

	/// List probe targets
	Targets,

	/// Ping targets and report average latency
	Ping {
		/// Target names to probe
		names: Vec<String>,

		/// Probe every target
		#[arg(long = "all", conflicts_with = "names")]
		all: bool,

		/// Echo requests per target
		#[arg(short = 'n', long = "count", default_value = "4")]
		count: u32,

		/// Overall timeout per target in milliseconds
		#[arg(short = 't', long = "timeout", default_value = "10000")]
		timeout: u64,

		/// Delay between probe starts in milliseconds
		#[arg(long = "stagger", default_value = "100")]
		stagger: u64,
	},

	/// Rank presets by how quickly they resolve the selected targets
	Benchmark {
		/// Target names to resolve (defaults to every hostname target)
		#[arg(short = 't', long = "target")]
		targets: Vec<String>,

		/// Include the built-in provider presets
		#[arg(long = "builtin")]
		builtin: bool,

		/// Measurement mode
		#[arg(short = 'm', long = "mode", value_enum, default_value = "direct")]
		mode: BenchmarkMode,

		/// Per-lookup timeout in milliseconds
		#[arg(long = "lookup-timeout", default_value = "2000")]
		lookup_timeout: u64,

		/// Output CSV file path
		#[arg(short = 'o', long = "output")]
		output: Option<String>,
	},
}

#[derive(Subcommand, Debug)]
pub enum PresetCommand {
	/// List saved presets
	List,

	/// List built-in provider presets
	Builtin,

	/// Save a preset, replacing one with the same name
	Save {
		name: String,
		primary: String,
		secondary: Option<String>,
	},

	/// Delete a saved preset
	Delete {
		name: String,
	},

	/// Merge presets from another catalog file
	Import {
		path: String,
	},

	/// Write all saved presets to a file
	Export {
		path: String,
	},
}
