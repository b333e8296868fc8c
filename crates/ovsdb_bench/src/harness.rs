//! Load harness: runs many benchmark clients concurrently and aggregates
//! throughput and latency.
//!
//! Each client owns its own session and row-handle cache and shares nothing
//! with its peers, so clients are driven from independent tokio tasks without
//! any cross-client locking.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use ovsdb_client::Connector;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::client::BenchmarkClient;
use crate::config::ClientConfig;

/// Histogram slots: one per bucket boundary plus a trailing overflow slot.
const LATENCY_SLOTS: usize = 15;

/// Histogram bucket boundaries for request latency (microseconds).
const LATENCY_BUCKETS_US: [u64; LATENCY_SLOTS - 1] = [
    100,       // 0.1ms
    250,       // 0.25ms
    500,       // 0.5ms
    1_000,     // 1ms
    2_000,     // 2ms
    5_000,     // 5ms
    10_000,    // 10ms
    20_000,    // 20ms
    50_000,    // 50ms
    100_000,   // 100ms
    200_000,   // 200ms
    500_000,   // 500ms
    1_000_000, // 1s
    5_000_000, // 5s
];

pub(crate) fn saturating_micros(elapsed: Duration) -> u64 {
    elapsed.as_micros().min(u128::from(u64::MAX)) as u64
}

pub(crate) fn saturating_millis(elapsed: Duration) -> u64 {
    elapsed.as_millis().min(u128::from(u64::MAX)) as u64
}

/// Fixed-bucket latency histogram.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LatencyHistogram {
    buckets: [u64; LATENCY_SLOTS],
    count: u64,
    total_us: u64,
    max_us: u64,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self {
            buckets: [0; LATENCY_SLOTS],
            count: 0,
            total_us: 0,
            max_us: 0,
        }
    }
}

impl LatencyHistogram {
    pub fn record(&mut self, elapsed: Duration) {
        let us = saturating_micros(elapsed);
        let idx = LATENCY_BUCKETS_US
            .iter()
            .position(|bound| us <= *bound)
            .unwrap_or(LATENCY_BUCKETS_US.len());
        self.buckets[idx] += 1;
        self.count += 1;
        self.total_us = self.total_us.saturating_add(us);
        self.max_us = self.max_us.max(us);
    }

    pub fn merge(&mut self, other: &LatencyHistogram) {
        for (dst, src) in self.buckets.iter_mut().zip(other.buckets.iter()) {
            *dst += *src;
        }
        self.count += other.count;
        self.total_us = self.total_us.saturating_add(other.total_us);
        self.max_us = self.max_us.max(other.max_us);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn max_us(&self) -> u64 {
        self.max_us
    }

    pub fn mean_us(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_us / self.count
        }
    }

    /// Upper bound (µs) of the bucket holding the `p`-th percentile.
    ///
    /// Samples in the overflow bucket report the observed maximum.
    pub fn percentile(&self, p: f64) -> u64 {
        if self.count == 0 {
            return 0;
        }
        let rank = ((p.clamp(0.0, 100.0) / 100.0) * self.count as f64).ceil() as u64;
        let rank = rank.max(1);
        let mut seen = 0u64;
        for (idx, n) in self.buckets.iter().enumerate() {
            seen += n;
            if seen >= rank {
                return LATENCY_BUCKETS_US
                    .get(idx)
                    .map_or(self.max_us, |bound| (*bound).min(self.max_us));
            }
        }
        self.max_us
    }
}

/// How a harness run is shaped.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    pub address: String,
    /// Number of concurrent clients (each client uses one session).
    pub clients: usize,
    /// Wall-clock budget for the measured phase.
    pub duration: Duration,
    /// Optional cap on requests issued per client.
    pub max_requests: Option<u64>,
    pub client: ClientConfig,
    /// Number of distinct error messages kept in the report.
    pub error_samples: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            address: "tcp:127.0.0.1:6641".to_string(),
            clients: 1,
            duration: Duration::from_secs(10),
            max_requests: None,
            client: ClientConfig::default(),
            error_samples: 8,
        }
    }
}

/// Outcome of one client's measured loop.
#[derive(Debug, Default)]
struct ClientStats {
    requests: u64,
    failures: u64,
    latency: LatencyHistogram,
    errors: Vec<String>,
}

/// Summary of a harness run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HarnessReport {
    pub op: String,
    pub database: String,
    pub table: String,
    pub clients: usize,
    pub elapsed_ms: u64,
    pub requests: u64,
    pub failures: u64,
    pub throughput: f64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p90_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
    /// First distinct error messages observed, bounded by `error_samples`.
    pub errors: Vec<String>,
}

impl HarnessReport {
    pub fn success_rate(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        (self.requests - self.failures) as f64 / self.requests as f64
    }
}

/// Dial every client, then drive them concurrently until the deadline or the
/// per-client request cap.
///
/// A dial failure on any client aborts the run before the measured phase.
pub async fn run<C>(connector: C, config: HarnessConfig) -> anyhow::Result<HarnessReport>
where
    C: Connector + Clone + 'static,
{
    anyhow::ensure!(config.clients > 0, "clients must be > 0");
    anyhow::ensure!(
        config.max_requests != Some(0),
        "request cap must be > 0 when set"
    );

    let base_seed = config.client.seed;
    let mut clients = Vec::with_capacity(config.clients);
    for client_id in 0..config.clients {
        let mut client_config = config.client.clone();
        // Mix the base seed with the client id for deterministic per-client RNG.
        if base_seed != 0 {
            client_config.seed = base_seed ^ (client_id as u64).wrapping_mul(0x9e3779b97f4a7c15);
        }
        let mut client = BenchmarkClient::new(connector.clone(), client_config);
        client
            .dial(&config.address)
            .await
            .with_context(|| format!("client {client_id} dial"))?;
        clients.push(client);
    }

    let start = Instant::now();
    let deadline = start + config.duration;
    let mut tasks = Vec::with_capacity(clients.len());
    for (client_id, client) in clients.into_iter().enumerate() {
        let max_requests = config.max_requests;
        let error_samples = config.error_samples;
        tasks.push(tokio::spawn(async move {
            run_client(client_id, client, deadline, max_requests, error_samples).await
        }));
    }

    let mut totals = ClientStats::default();
    for task in tasks {
        let stats = task.await.context("client task panicked")?;
        totals.requests += stats.requests;
        totals.failures += stats.failures;
        totals.latency.merge(&stats.latency);
        for error in stats.errors {
            if totals.errors.len() < config.error_samples && !totals.errors.contains(&error) {
                totals.errors.push(error);
            }
        }
    }
    let elapsed = start.elapsed();

    let report = HarnessReport {
        op: config.client.op.to_string(),
        database: config.client.target.database.clone(),
        table: config.client.target.table.clone(),
        clients: config.clients,
        elapsed_ms: saturating_millis(elapsed),
        requests: totals.requests,
        failures: totals.failures,
        throughput: if elapsed.is_zero() {
            0.0
        } else {
            totals.requests as f64 / elapsed.as_secs_f64()
        },
        mean_us: totals.latency.mean_us(),
        p50_us: totals.latency.percentile(50.0),
        p90_us: totals.latency.percentile(90.0),
        p99_us: totals.latency.percentile(99.0),
        max_us: totals.latency.max_us(),
        errors: totals.errors,
    };
    tracing::info!(
        op = %report.op,
        clients = report.clients,
        requests = report.requests,
        failures = report.failures,
        throughput = report.throughput,
        p50_us = report.p50_us,
        p99_us = report.p99_us,
        "benchmark finished"
    );
    Ok(report)
}

/// Run one client's request loop, returning its counters.
async fn run_client<C: Connector>(
    client_id: usize,
    mut client: BenchmarkClient<C>,
    deadline: Instant,
    max_requests: Option<u64>,
    error_samples: usize,
) -> ClientStats {
    let mut stats = ClientStats::default();
    while Instant::now() < deadline && max_requests.map_or(true, |cap| stats.requests < cap) {
        let began = Instant::now();
        let outcome = client.request().await;
        stats.latency.record(began.elapsed());
        stats.requests += 1;

        if let Err(err) = outcome {
            stats.failures += 1;
            // Warn once per client; later failures only show up at debug level.
            if stats.failures == 1 {
                tracing::warn!(client = client_id, error = %err, "request failed");
            } else {
                tracing::debug!(client = client_id, error = %err, "request failed");
            }
            let message = err.to_string();
            if stats.errors.len() < error_samples && !stats.errors.contains(&message) {
                stats.errors.push(message);
            }
        }
        // Keep the scheduler fair when the transport completes synchronously.
        tokio::task::yield_now().await;
    }
    stats
}

/// Serialize and write the report as pretty JSON.
pub fn write_report(path: &Path, report: &HarnessReport) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        // Ensure the output directory exists before writing.
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
    }
    let data = serde_json::to_vec_pretty(report).context("serialize report")?;
    std::fs::write(path, data).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_percentiles_follow_buckets() {
        let mut hist = LatencyHistogram::default();
        for _ in 0..90 {
            hist.record(Duration::from_micros(80));
        }
        for _ in 0..10 {
            hist.record(Duration::from_micros(4_000));
        }
        assert_eq!(hist.count(), 100);
        assert_eq!(hist.percentile(50.0), 100);
        assert_eq!(hist.percentile(90.0), 100);
        assert_eq!(hist.percentile(99.0), 4_000);
        assert_eq!(hist.max_us(), 4_000);
    }

    #[test]
    fn percentile_reports_bucket_bound_below_max() {
        let mut hist = LatencyHistogram::default();
        hist.record(Duration::from_micros(150));
        hist.record(Duration::from_micros(900));
        assert_eq!(hist.percentile(50.0), 250);
        assert_eq!(hist.percentile(100.0), 900);
    }

    #[test]
    fn overflow_bucket_reports_max() {
        let mut hist = LatencyHistogram::default();
        hist.record(Duration::from_secs(9));
        assert_eq!(hist.percentile(50.0), 9_000_000);
    }

    #[test]
    fn empty_histogram_is_zero() {
        let hist = LatencyHistogram::default();
        assert_eq!(hist.percentile(99.0), 0);
        assert_eq!(hist.mean_us(), 0);
    }

    #[test]
    fn duration_conversions_saturate() {
        assert_eq!(saturating_micros(Duration::MAX), u64::MAX);
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
        assert_eq!(saturating_millis(Duration::from_micros(2_500)), 2);
        assert_eq!(saturating_micros(Duration::from_millis(3)), 3_000);

        let mut hist = LatencyHistogram::default();
        hist.record(Duration::MAX);
        assert_eq!(hist.max_us(), u64::MAX);
        assert_eq!(hist.percentile(50.0), u64::MAX);
    }

    #[test]
    fn report_throughput_survives_json_round_trip() {
        let mut report = HarnessReport {
            op: "select".to_string(),
            database: "OVN_Southbound".to_string(),
            table: "DHCP_Options".to_string(),
            clients: 4,
            elapsed_ms: 10_000,
            requests: 0,
            failures: 0,
            throughput: 0.0,
            mean_us: 0,
            p50_us: 0,
            p90_us: 0,
            p99_us: 0,
            max_us: 0,
            errors: Vec::new(),
        };
        for requests in 1..2_000u64 {
            report.requests = requests * 7_919;
            report.throughput = report.requests as f64 / 9.873_421_7;
            let json = serde_json::to_vec(&report).unwrap();
            let decoded: HarnessReport = serde_json::from_slice(&json).unwrap();
            assert_eq!(decoded, report);
        }
    }

    #[test]
    fn merge_sums_counts() {
        let mut a = LatencyHistogram::default();
        a.record(Duration::from_micros(10));
        let mut b = LatencyHistogram::default();
        b.record(Duration::from_micros(30));
        b.record(Duration::from_millis(3));
        a.merge(&b);
        assert_eq!(a.count(), 3);
        assert_eq!(a.max_us(), 3_000);
        assert_eq!(a.mean_us(), (10 + 30 + 3_000) / 3);
    }
}
