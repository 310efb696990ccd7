//! DNS configuration and reachability-probing engine.
//!
//! Reads and changes the DNS servers bound to network adapters through the
//! OS tools (`netsh`, `ipconfig`), keeps named server presets in a JSON
//! catalog, pings named targets concurrently and ranks presets by how fast
//! they resolve a set of hosts.

pub mod adapter;
pub mod bench;
pub mod catalog;
pub mod command;
pub mod config;
pub mod dns;
pub mod engine;
pub mod error;
pub mod probe;
pub mod resolver;
pub mod stats;
pub mod targets;
