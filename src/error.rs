use std::io;

use thiserror::Error;

/// Errors surfaced by the DNS engine.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("invalid IPv4 address: {0:?}")]
	InvalidAddress(String),

	#[error("no active network adapters found")]
	NoAdaptersFound,

	#[error("network adapter not found: {0:?}")]
	AdapterNotFound(String),

	#[error("administrator rights required: {0}")]
	PrivilegeRequired(String),

	#[error("command `{command}` failed: {detail}")]
	CommandFailed { command: String, detail: String },

	#[error("command `{command}` timed out after {timeout_ms} ms")]
	Timeout { command: String, timeout_ms: u128 },

	#[error("failed to write catalog '{path}': {source}")]
	PersistenceFailed {
		path: String,
		#[source]
		source: io::Error,
	},

	#[error("cannot import presets from '{path}': {detail}")]
	ImportFailed { path: String, detail: String },

	#[error("preset name must not be empty")]
	EmptyPresetName,

	#[error("no saved or built-in preset named {0:?}")]
	PresetNotFound(String),

	#[error("no probe targets selected")]
	NoTargetsSelected,

	#[error("no DNS configurations available to benchmark")]
	NoConfigsAvailable,
}

pub type Result<T> = std::result::Result<T, EngineError>;
