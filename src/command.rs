use std::fmt;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tracing::debug;

use crate::error::{EngineError, Result};

/// Phrases the OS tools print when a change needs an elevated shell.
const PRIVILEGE_MARKERS: [&str; 4] = [
	"access is denied",
	"requires elevation",
	"run as administrator",
	"administrator privilege",
];

/// An external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
	pub program: String,
	pub args: Vec<String>,
}

impl CommandSpec {
	pub fn new<I, S>(program: &str, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		CommandSpec {
			program: program.to_string(),
			args: args.into_iter().map(Into::into).collect(),
		}
	}

	/// `netsh interface show interface`
	pub fn list_interfaces() -> Self {
		Self::new("netsh", ["interface", "show", "interface"])
	}

	/// `netsh interface ip show dns <adapter>`
	pub fn show_dns(adapter: &str) -> Self {
		Self::new("netsh", ["interface", "ip", "show", "dns", adapter])
	}

	/// `netsh interface ip set dns <adapter> static <primary>`
	pub fn set_static_dns(adapter: &str, primary: &str) -> Self {
		Self::new("netsh", ["interface", "ip", "set", "dns", adapter, "static", primary])
	}

	/// `netsh interface ip add dns <adapter> <secondary> index=2`
	pub fn add_secondary_dns(adapter: &str, secondary: &str) -> Self {
		Self::new("netsh", ["interface", "ip", "add", "dns", adapter, secondary, "index=2"])
	}

	/// `netsh interface ip set dns <adapter> dhcp`
	pub fn set_dhcp_dns(adapter: &str) -> Self {
		Self::new("netsh", ["interface", "ip", "set", "dns", adapter, "dhcp"])
	}

	/// `ipconfig /flushdns`
	pub fn flush_dns() -> Self {
		Self::new("ipconfig", ["/flushdns"])
	}

	/// Fixed-count echo request; the count flag differs between Windows and Unix ping.
	pub fn ping(host: &str, count: u32) -> Self {
		let count_flag = if cfg!(windows) { "-n" } else { "-c" };
		Self::new("ping", [count_flag.to_string(), count.to_string(), host.to_string()])
	}
}

impl fmt::Display for CommandSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.program)?;
		for arg in &self.args {
			if arg.contains(' ') {
				write!(f, " \"{}\"", arg)?;
			} else {
				write!(f, " {}", arg)?;
			}
		}
		Ok(())
	}
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
	pub success: bool,
	pub code: Option<i32>,
	pub stdout: String,
	pub stderr: String,
}

impl CommandOutput {
	/// Convert a non-zero exit into the matching engine error.
	///
	/// netsh reports most failures on stdout, so both streams are inspected.
	pub fn check(self, spec: &CommandSpec) -> Result<CommandOutput> {
		if self.success {
			return Ok(self);
		}
		let detail = format!("{} {}", self.stderr.trim(), self.stdout.trim())
			.trim()
			.to_string();
		let lowered = detail.to_lowercase();
		if PRIVILEGE_MARKERS.iter().any(|m| lowered.contains(m)) {
			return Err(EngineError::PrivilegeRequired(detail));
		}
		let detail = if detail.is_empty() {
			match self.code {
				Some(code) => format!("exit code {}", code),
				None => "terminated by signal".to_string(),
			}
		} else {
			detail
		};
		Err(EngineError::CommandFailed {
			command: spec.to_string(),
			detail,
		})
	}
}

/// Runs external programs on behalf of the engine.
pub trait CommandRunner: Send + Sync + 'static {
	/// Run `spec` to completion, failing with `Timeout` once `timeout` elapses.
	fn run(
		&self,
		spec: &CommandSpec,
		timeout: Duration,
	) -> impl Future<Output = Result<CommandOutput>> + Send;
}

/// Runner backed by real OS processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
	async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput> {
		debug!(command = %spec, timeout_ms = timeout.as_millis() as u64, "running command");

		let mut command = tokio::process::Command::new(&spec.program);
		command
			.args(&spec.args)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);
		#[cfg(windows)]
		{
			// CREATE_NO_WINDOW keeps console windows from flashing up
			command.creation_flags(0x0800_0000);
		}

		let output = match tokio::time::timeout(timeout, command.output()).await {
			Ok(Ok(output)) => output,
			Ok(Err(e)) => {
				return Err(EngineError::CommandFailed {
					command: spec.to_string(),
					detail: format!("failed to execute: {}", e),
				});
			}
			Err(_) => {
				return Err(EngineError::Timeout {
					command: spec.to_string(),
					timeout_ms: timeout.as_millis(),
				});
			}
		};

		debug!(command = %spec, code = ?output.status.code(), "command finished");
		Ok(CommandOutput {
			success: output.status.success(),
			code: output.status.code(),
			stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
			stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
		})
	}
}
