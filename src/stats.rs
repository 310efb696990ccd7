use std::cmp::Ordering;

use crate::catalog::DnsPreset;

/// One target's measurement within a benchmark entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
	pub target: String,
	/// Resolution time in milliseconds; None when the lookup failed
	pub latency_ms: Option<f64>,
}

/// Aggregated benchmark outcome for one preset.
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
	pub rank: usize,
	pub preset: DnsPreset,
	pub measurements: Vec<Measurement>,
	/// Mean over successful measurements
	pub mean_ms: Option<f64>,
	pub p50_ms: Option<f64>,
	pub success_count: usize,
	pub total_count: usize,
}

impl BenchmarkResult {
	/// Share of measurements that succeeded, in [0, 1].
	pub fn success_fraction(&self) -> f64 {
		if self.total_count == 0 {
			0.0
		} else {
			self.success_count as f64 / self.total_count as f64
		}
	}
}

/// Calculate the p-th percentile from a sorted slice using nearest-rank method.
///
/// Args:
///   sorted_values: Pre-sorted slice of f64 values.
///   p: Percentile between 0.0 and 100.0 (e.g. 50.0 for median).
///
/// Returns:
///   None if the slice is empty, otherwise the percentile value.
pub fn percentile(sorted_values: &[f64], p: f64) -> Option<f64> {
	if sorted_values.is_empty() {
		return None;
	}
	if sorted_values.len() == 1 {
		return Some(sorted_values[0]);
	}
	// Nearest-rank: rank = ceil(p/100 * N)
	let n = sorted_values.len();
	let rank = ((p / 100.0) * n as f64).ceil() as usize;
	let rank = rank.clamp(1, n);
	Some(sorted_values[rank - 1])
}

/// Calculate the arithmetic mean of a slice of values.
pub fn mean(values: &[f64]) -> Option<f64> {
	if values.is_empty() {
		return None;
	}
	let sum: f64 = values.iter().sum();
	Some(sum / values.len() as f64)
}

/// Build an unranked result from a preset's measurements.
pub fn summarize(preset: DnsPreset, measurements: Vec<Measurement>) -> BenchmarkResult {
	let mut successes: Vec<f64> = measurements.iter()
		.filter_map(|m| m.latency_ms)
		.collect();
	successes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

	BenchmarkResult {
		rank: 0,
		preset,
		mean_ms: mean(&successes),
		p50_ms: percentile(&successes, 50.0),
		success_count: successes.len(),
		total_count: measurements.len(),
		measurements,
	}
}

/// Order presets by mean latency, ascending.
///
/// Presets without a single successful measurement sort last, keeping
/// their relative order.
pub fn rank_results(mut results: Vec<BenchmarkResult>) -> Vec<BenchmarkResult> {
	results.sort_by(|a, b| match (a.mean_ms, b.mean_ms) {
		(Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => Ordering::Equal,
	});
	for (i, result) in results.iter_mut().enumerate() {
		result.rank = i + 1;
	}
	results
}
