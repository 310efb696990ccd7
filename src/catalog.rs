use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::resolver::{optional_ipv4, parse_ipv4, require_ipv4};

/// A named pair of DNS servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsPreset {
	pub name: String,
	pub primary: Ipv4Addr,
	pub secondary: Option<Ipv4Addr>,
}

impl DnsPreset {
	/// Build a preset from user input, validating the name and both addresses.
	pub fn new(name: &str, primary: &str, secondary: Option<&str>) -> Result<Self> {
		let name = name.trim();
		if name.is_empty() {
			return Err(EngineError::EmptyPresetName);
		}
		Ok(DnsPreset {
			name: name.to_string(),
			primary: require_ipv4(primary)?,
			secondary: optional_ipv4(secondary)?,
		})
	}
}

/// On-disk shape of a preset: `{"primary": "..", "secondary": ".."}`.
///
/// An absent secondary is stored as an empty string.
#[derive(Debug, Serialize, Deserialize)]
struct PresetRecord {
	primary: String,
	#[serde(default)]
	secondary: String,
}

impl From<&DnsPreset> for PresetRecord {
	fn from(preset: &DnsPreset) -> Self {
		PresetRecord {
			primary: preset.primary.to_string(),
			secondary: preset.secondary.map(|s| s.to_string()).unwrap_or_default(),
		}
	}
}

impl PresetRecord {
	fn into_preset(self, name: String) -> std::result::Result<DnsPreset, String> {
		if name.trim().is_empty() {
			return Err("empty preset name".to_string());
		}
		let primary = parse_ipv4(self.primary.trim())
			.ok_or_else(|| format!("invalid primary address {:?}", self.primary))?;
		let secondary = match self.secondary.trim() {
			"" => None,
			s => Some(parse_ipv4(s).ok_or_else(|| format!("invalid secondary address {:?}", s))?),
		};
		Ok(DnsPreset { name, primary, secondary })
	}
}

/// Decode a catalog document, skipping entries that do not hold a valid preset.
///
/// Returns None when the document itself is not a JSON object.
fn decode(content: &str) -> Option<BTreeMap<String, DnsPreset>> {
	let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(content).ok()?;
	let mut presets = BTreeMap::new();
	for (name, value) in raw {
		let preset = serde_json::from_value::<PresetRecord>(value)
			.map_err(|e| e.to_string())
			.and_then(|record| record.into_preset(name.clone()));
		match preset {
			Ok(preset) => {
				presets.insert(name, preset);
			}
			Err(reason) => warn!(preset = %name, %reason, "skipping malformed catalog entry"),
		}
	}
	Some(presets)
}

fn encode(presets: &BTreeMap<String, DnsPreset>) -> String {
	let records: BTreeMap<&str, PresetRecord> = presets
		.iter()
		.map(|(name, preset)| (name.as_str(), PresetRecord::from(preset)))
		.collect();
	// a map of plain string records always serializes
	serde_json::to_string_pretty(&records).unwrap_or_else(|_| "{}".to_string())
}

fn write_file(path: &Path, presets: &BTreeMap<String, DnsPreset>) -> Result<()> {
	std::fs::write(path, encode(presets)).map_err(|source| EngineError::PersistenceFailed {
		path: path.display().to_string(),
		source,
	})
}

/// Saved DNS presets, persisted to a JSON file after every change.
#[derive(Debug, Clone)]
pub struct ConfigCatalog {
	path: PathBuf,
	presets: BTreeMap<String, DnsPreset>,
}

impl ConfigCatalog {
	/// Load the catalog at `path`.
	///
	/// A missing or unreadable file yields an empty catalog.
	pub fn load(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let presets = match std::fs::read_to_string(&path) {
			Ok(content) => decode(&content).unwrap_or_else(|| {
				warn!(path = %path.display(), "catalog file is corrupt, starting empty");
				BTreeMap::new()
			}),
			Err(e) => {
				debug!(path = %path.display(), error = %e, "no catalog file, starting empty");
				BTreeMap::new()
			}
		};
		debug!(path = %path.display(), count = presets.len(), "catalog loaded");
		ConfigCatalog { path, presets }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn get(&self, name: &str) -> Option<&DnsPreset> {
		self.presets.get(name)
	}

	pub fn presets(&self) -> impl Iterator<Item = &DnsPreset> {
		self.presets.values()
	}

	pub fn len(&self) -> usize {
		self.presets.len()
	}

	pub fn is_empty(&self) -> bool {
		self.presets.is_empty()
	}

	/// Write the whole catalog to its file.
	pub fn save(&self) -> Result<()> {
		write_file(&self.path, &self.presets)?;
		debug!(path = %self.path.display(), count = self.presets.len(), "catalog saved");
		Ok(())
	}

	/// Persist `next` and only then adopt it, so a failed write leaves memory untouched.
	fn commit(&mut self, next: BTreeMap<String, DnsPreset>) -> Result<()> {
		write_file(&self.path, &next)?;
		self.presets = next;
		Ok(())
	}

	/// Save a preset, replacing any existing preset with the same name.
	pub fn put(&mut self, name: &str, primary: &str, secondary: Option<&str>) -> Result<()> {
		let preset = DnsPreset::new(name, primary, secondary)?;
		let name = preset.name.clone();
		let mut next = self.presets.clone();
		next.insert(name.clone(), preset);
		self.commit(next)?;
		info!(preset = %name, "preset saved");
		Ok(())
	}

	/// Remove a preset. Returns whether it existed; a missing name is a no-op.
	pub fn delete(&mut self, name: &str) -> Result<bool> {
		if !self.presets.contains_key(name) {
			return Ok(false);
		}
		let mut next = self.presets.clone();
		next.remove(name);
		self.commit(next)?;
		info!(preset = name, "preset deleted");
		Ok(true)
	}

	/// Merge presets from another catalog file; imported entries win on name clashes.
	///
	/// The source must exist and hold a JSON object; single malformed
	/// entries are skipped. Returns the number of presets imported.
	pub fn import_from(&mut self, path: &Path) -> Result<usize> {
		let import_error = |detail: String| EngineError::ImportFailed {
			path: path.display().to_string(),
			detail,
		};
		let content = std::fs::read_to_string(path).map_err(|e| import_error(e.to_string()))?;
		let imported = decode(&content)
			.ok_or_else(|| import_error("not a JSON object of presets".to_string()))?;
		let count = imported.len();
		let mut next = self.presets.clone();
		next.extend(imported);
		self.commit(next)?;
		info!(path = %path.display(), count, "presets imported");
		Ok(count)
	}

	/// Write the full catalog to another file.
	pub fn export_to(&self, path: &Path) -> Result<()> {
		write_file(path, &self.presets)?;
		info!(path = %path.display(), count = self.presets.len(), "presets exported");
		Ok(())
	}
}

/// Well-known public resolvers.
pub fn builtin_presets() -> Vec<DnsPreset> {
	[
		("Cloudflare", [1, 1, 1, 1], [1, 0, 0, 1]),
		("Cloudflare Family", [1, 1, 1, 3], [1, 0, 0, 3]),
		("Google", [8, 8, 8, 8], [8, 8, 4, 4]),
		("OpenDNS", [208, 67, 222, 222], [208, 67, 220, 220]),
		("Quad9", [9, 9, 9, 9], [149, 112, 112, 112]),
		("AdGuard", [94, 140, 14, 14], [94, 140, 15, 15]),
		("Comodo Secure", [8, 26, 56, 26], [8, 20, 247, 20]),
		("CleanBrowsing", [185, 228, 168, 9], [185, 228, 169, 9]),
		("Alternate DNS", [76, 76, 19, 19], [76, 223, 122, 150]),
	]
	.into_iter()
	.map(|(name, primary, secondary)| DnsPreset {
		name: name.to_string(),
		primary: Ipv4Addr::from(primary),
		secondary: Some(Ipv4Addr::from(secondary)),
	})
	.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn test_missing_file_is_empty() {
		let dir = tempdir().unwrap();
		let catalog = ConfigCatalog::load(dir.path().join("absent.json"));
		assert!(catalog.is_empty());
	}

	#[test]
	fn test_corrupt_file_is_empty() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("dns_configs.json");
		std::fs::write(&path, "{ not json").unwrap();
		assert!(ConfigCatalog::load(&path).is_empty());
	}

	#[test]
	fn test_round_trip() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("dns_configs.json");

		let mut catalog = ConfigCatalog::load(&path);
		catalog.put("X", "1.1.1.1", Some("1.0.0.1")).unwrap();
		catalog.save().unwrap();

		let reloaded = ConfigCatalog::load(&path);
		let preset = reloaded.get("X").unwrap();
		assert_eq!(preset.primary, Ipv4Addr::new(1, 1, 1, 1));
		assert_eq!(preset.secondary, Some(Ipv4Addr::new(1, 0, 0, 1)));

		catalog.delete("X").unwrap();
		assert!(ConfigCatalog::load(&path).get("X").is_none());
	}

	#[test]
	fn test_file_layout() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("dns_configs.json");
		let mut catalog = ConfigCatalog::load(&path);
		catalog.put("Solo", "9.9.9.9", None).unwrap();

		let value: serde_json::Value =
			serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
		assert_eq!(value["Solo"]["primary"], "9.9.9.9");
		assert_eq!(value["Solo"]["secondary"], "");
	}

	#[test]
	fn test_put_overwrites_and_validates() {
		let dir = tempdir().unwrap();
		let mut catalog = ConfigCatalog::load(dir.path().join("c.json"));
		catalog.put("Home", "1.1.1.1", None).unwrap();
		catalog.put("Home", "8.8.8.8", Some("8.8.4.4")).unwrap();
		assert_eq!(catalog.len(), 1);
		assert_eq!(catalog.get("Home").unwrap().primary, Ipv4Addr::new(8, 8, 8, 8));

		assert!(matches!(
			catalog.put("Bad", "300.1.1.1", None),
			Err(EngineError::InvalidAddress(_))
		));
		assert!(matches!(
			catalog.put("Bad", "1.1.1.1", Some("x")),
			Err(EngineError::InvalidAddress(_))
		));
		assert!(catalog.get("Bad").is_none());
	}

	#[test]
	fn test_delete_missing_is_noop() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("c.json");
		let mut catalog = ConfigCatalog::load(&path);
		assert!(!catalog.delete("nothing").unwrap());
		assert!(!path.exists());
	}

	#[test]
	fn test_malformed_entries_are_skipped() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("c.json");
		std::fs::write(
			&path,
			r#"{
				"Good": {"primary": "1.1.1.1", "secondary": "1.0.0.1"},
				"NoSecondary": {"primary": "9.9.9.9"},
				"BadPrimary": {"primary": "1.1.1", "secondary": ""},
				"BadSecondary": {"primary": "8.8.8.8", "secondary": "nope"},
				"NotAnObject": 42,
				"": {"primary": "1.1.1.1"}
			}"#,
		)
		.unwrap();

		let catalog = ConfigCatalog::load(&path);
		assert_eq!(catalog.len(), 2);
		assert!(catalog.get("Good").is_some());
		assert_eq!(catalog.get("NoSecondary").unwrap().secondary, None);
	}

	#[test]
	fn test_import_overwrites_on_collision() {
		let dir = tempdir().unwrap();
		let mut catalog = ConfigCatalog::load(dir.path().join("main.json"));
		catalog.put("Shared", "1.1.1.1", None).unwrap();
		catalog.put("Local", "9.9.9.9", None).unwrap();

		let other_path = dir.path().join("other.json");
		let mut other = ConfigCatalog::load(&other_path);
		other.put("Shared", "8.8.8.8", Some("8.8.4.4")).unwrap();
		other.put("Remote", "94.140.14.14", None).unwrap();

		assert_eq!(catalog.import_from(&other_path).unwrap(), 2);
		assert_eq!(catalog.len(), 3);
		assert_eq!(catalog.get("Shared").unwrap().primary, Ipv4Addr::new(8, 8, 8, 8));
		assert_eq!(ConfigCatalog::load(catalog.path()).len(), 3);
	}

	#[test]
	fn test_import_rejects_missing_file() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("main.json");
		let mut catalog = ConfigCatalog::load(&path);
		catalog.put("Local", "9.9.9.9", None).unwrap();
		let before = std::fs::read_to_string(&path).unwrap();

		let result = catalog.import_from(&dir.path().join("typo.json"));
		assert!(matches!(result, Err(EngineError::ImportFailed { .. })));
		assert_eq!(catalog.len(), 1);
		assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
	}

	#[test]
	fn test_import_rejects_unreadable_source() {
		let dir = tempdir().unwrap();
		let mut catalog = ConfigCatalog::load(dir.path().join("main.json"));
		// a directory cannot be read as a file
		let result = catalog.import_from(dir.path());
		assert!(matches!(result, Err(EngineError::ImportFailed { .. })));
		assert!(catalog.is_empty());
	}

	#[test]
	fn test_import_rejects_corrupt_or_non_object_json() {
		let dir = tempdir().unwrap();
		let main_path = dir.path().join("main.json");
		let mut catalog = ConfigCatalog::load(&main_path);

		let corrupt = dir.path().join("corrupt.json");
		std::fs::write(&corrupt, "{ not json").unwrap();
		assert!(matches!(catalog.import_from(&corrupt), Err(EngineError::ImportFailed { .. })));

		let list = dir.path().join("list.json");
		std::fs::write(&list, r#"["1.1.1.1"]"#).unwrap();
		assert!(matches!(catalog.import_from(&list), Err(EngineError::ImportFailed { .. })));

		assert!(catalog.is_empty());
		assert!(!main_path.exists());
	}

	#[test]
	fn test_import_skips_malformed_entries() {
		let dir = tempdir().unwrap();
		let mut catalog = ConfigCatalog::load(dir.path().join("main.json"));
		let source = dir.path().join("partial.json");
		std::fs::write(
			&source,
			r#"{"Good": {"primary": "1.1.1.1"}, "Bad": {"primary": "1.1.1"}}"#,
		)
		.unwrap();

		assert_eq!(catalog.import_from(&source).unwrap(), 1);
		assert!(catalog.get("Good").is_some());
		assert!(catalog.get("Bad").is_none());
	}

	#[test]
	fn test_put_rejects_blank_name() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("c.json");
		let mut catalog = ConfigCatalog::load(&path);
		assert!(matches!(catalog.put("", "1.1.1.1", None), Err(EngineError::EmptyPresetName)));
		assert!(matches!(catalog.put("   ", "1.1.1.1", None), Err(EngineError::EmptyPresetName)));
		assert!(catalog.is_empty());
		assert!(!path.exists());

		catalog.put("  Home  ", "1.1.1.1", None).unwrap();
		assert!(catalog.get("Home").is_some());
	}

	#[test]
	fn test_export_writes_full_catalog() {
		let dir = tempdir().unwrap();
		let mut catalog = ConfigCatalog::load(dir.path().join("main.json"));
		catalog.put("A", "1.1.1.1", None).unwrap();
		catalog.put("B", "8.8.8.8", None).unwrap();

		let export_path = dir.path().join("export.json");
		catalog.export_to(&export_path).unwrap();
		assert_eq!(ConfigCatalog::load(&export_path).len(), 2);
	}

	#[test]
	fn test_failed_write_leaves_memory_unchanged() {
		let dir = tempdir().unwrap();
		// a directory path cannot be written as a file
		let mut catalog = ConfigCatalog::load(dir.path());
		let result = catalog.put("X", "1.1.1.1", None);
		assert!(matches!(result, Err(EngineError::PersistenceFailed { .. })));
		assert!(catalog.is_empty());
	}

	#[test]
	fn test_builtin_presets() {
		let presets = builtin_presets();
		assert_eq!(presets.len(), 9);
		let cloudflare = presets.iter().find(|p| p.name == "Cloudflare").unwrap();
		assert_eq!(cloudflare.primary, Ipv4Addr::new(1, 1, 1, 1));
	}
}
