use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{NaiveDate, TimeDelta};
use env_logger::{Builder, Env};
use stmtsnap::{
    AtomicProgress, BoundedPool, CaptureOptions, CaptureScheduler, CaptureStatistics,
    ConnectionPool, Credentials, PoolOptions, SessionParams, SnapshotCapture, SnapshotRegistry,
    StatementKey, StatementStatsRow,
    source::memory::{MemoryConnector, MemorySource},
};

/// Benchmark configuration
struct BenchConfig {
    num_statements: usize,
    num_captures: usize,
    pool_size: usize,
    workers: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            num_statements: 20_000,
            num_captures: 64,
            pool_size: 4,
            workers: 4,
        }
    }
}

/// Statistics for a benchmark run
struct BenchStats {
    duration: Duration,
    operations: usize,
    statements: usize,
    latencies: Vec<Duration>,
}

impl BenchStats {
    fn new() -> Self {
        BenchStats {
            duration: Duration::ZERO,
            operations: 0,
            statements: 0,
            latencies: Vec::new(),
        }
    }

    fn ops_per_sec(&self) -> f64 {
        self.operations as f64 / self.duration.as_secs_f64()
    }

    fn statements_per_sec(&self) -> f64 {
        self.statements as f64 / self.duration.as_secs_f64()
    }

    fn avg_latency_ms(&self) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        let sum: u128 = self.latencies.iter().map(|d| d.as_micros()).sum();
        sum as f64 / self.latencies.len() as f64 / 1000.0
    }

    fn percentile_latency_ms(&mut self, percentile: f64) -> f64 {
        if self.latencies.is_empty() {
            return 0.0;
        }
        self.latencies.sort();
        let idx = ((self.latencies.len() as f64 * percentile / 100.0) as usize)
            .min(self.latencies.len() - 1);
        self.latencies[idx].as_micros() as f64 / 1000.0
    }

    fn print_summary(&mut self, name: &str) {
        println!("\n{}", "=".repeat(60));
        println!("Benchmark: {}", name);
        println!("{}", "=".repeat(60));
        println!("Captures:       {:>12}", format_number(self.operations));
        println!("Statements:     {:>12}", format_number(self.statements));
        println!("Duration:       {:>12.2} sec", self.duration.as_secs_f64());
        println!("Throughput:     {:>12.1} captures/sec", self.ops_per_sec());
        println!("Throughput:     {:>12.0} statements/sec", self.statements_per_sec());
        println!("\nLatency (milliseconds):");
        println!("  Average:      {:>12.2}", self.avg_latency_ms());
        println!("  P50:          {:>12.2}", self.percentile_latency_ms(50.0));
        println!("  P95:          {:>12.2}", self.percentile_latency_ms(95.0));
        println!("  P99:          {:>12.2}", self.percentile_latency_ms(99.0));
        println!("{}", "=".repeat(60));
    }
}

fn format_number(n: usize) -> String {
    n.to_string()
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(std::str::from_utf8)
        .collect::<Result<Vec<&str>, _>>()
        .unwrap()
        .join(",")
}

fn populate(source: &MemorySource, num_statements: usize) {
    let mut x = 123456789u64;
    for i in 0..num_statements {
        x = x.wrapping_mul(1103515245).wrapping_add(12345);
        source.upsert(
            StatementStatsRow {
                key: StatementKey::new(format!("{:013x}", x), format!("{:016X}", i), "BENCH"),
                executions: x % 10_000,
                elapsed_micros: x % 50_000_000,
                cpu_micros: x % 20_000_000,
                buffer_gets: x % 1_000_000,
                disk_reads: x % 5_000,
                rows_processed: x % 100_000,
            },
            format!("SELECT /* bench {i} */ col FROM t{} WHERE id = :1", i % 97),
        );
    }
}

/// One capture at a time, each a second apart on the server clock.
fn bench_sequential(
    scheduler: &CaptureScheduler,
    source: &MemorySource,
    config: &BenchConfig,
) -> BenchStats {
    println!("\n📸 Running sequential capture benchmark...");
    let mut stats = BenchStats::new();

    let start = Instant::now();
    for _ in 0..config.num_captures {
        source.advance(TimeDelta::seconds(1));
        let progress = Arc::new(AtomicProgress::new());

        let op_start = Instant::now();
        let handle = scheduler.begin_capture(progress.clone());
        handle.wait().unwrap();
        stats.latencies.push(op_start.elapsed());

        stats.operations += 1;
        stats.statements += progress.current() as usize;
    }
    stats.duration = start.elapsed();

    stats
}

/// All captures queued at once; they collide on the same second.
fn bench_burst(
    scheduler: &CaptureScheduler,
    source: &MemorySource,
    config: &BenchConfig,
) -> BenchStats {
    println!("\n💥 Running burst capture benchmark...");
    let mut stats = BenchStats::new();
    source.advance(TimeDelta::seconds(1));

    let start = Instant::now();
    let handles: Vec<_> = (0..config.num_captures)
        .map(|_| {
            let progress = Arc::new(AtomicProgress::new());
            (Instant::now(), progress.clone(), scheduler.begin_capture(progress))
        })
        .collect();

    for (queued_at, progress, handle) in handles {
        handle.wait().unwrap();
        stats.latencies.push(queued_at.elapsed());
        stats.operations += 1;
        stats.statements += progress.current() as usize;
    }
    stats.duration = start.elapsed();

    stats
}

fn main() {
    Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    println!("\n🚀 stmtsnap Capture Benchmark");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    let config = BenchConfig::default();

    println!("Configuration:");
    println!("  Statements:     {}", format_number(config.num_statements));
    println!("  Captures:       {}", format_number(config.num_captures));
    println!("  Pool size:      {}", config.pool_size);
    println!("  Workers:        {}", config.workers);

    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    let source = MemorySource::new(start);
    populate(&source, config.num_statements);

    let params = SessionParams {
        schema: "BENCH".to_string(),
        ..Default::default()
    };
    let mut credentials = Credentials::new("bench");
    let connector = MemoryConnector::new(source.clone(), "bench");
    let pool = BoundedPool::establish(
        &params,
        &mut credentials,
        &connector,
        PoolOptions {
            max_size: config.pool_size,
            ..Default::default()
        },
    )
    .unwrap();
    let pool: Arc<dyn ConnectionPool> = Arc::new(pool);

    let statistics = Arc::new(CaptureStatistics::new());
    let registry = SnapshotRegistry::new();
    let capture = SnapshotCapture::new(
        Arc::clone(&pool),
        Arc::new(source.clone()),
        registry.clone(),
    )
    .with_statistics(Arc::clone(&statistics));
    let scheduler = CaptureScheduler::new(
        capture,
        CaptureOptions {
            max_concurrent_captures: config.workers,
            ..Default::default()
        },
    )
    .unwrap();

    let mut seq_stats = bench_sequential(&scheduler, &source, &config);
    seq_stats.print_summary("Sequential Capture");

    let mut burst_stats = bench_burst(&scheduler, &source, &config);
    burst_stats.print_summary("Burst Capture (same second)");

    let pool_stats = pool.stats();
    println!("\n📊 Pool Statistics:");
    println!("    Capacity:     {:>12}", pool_stats.capacity);
    println!("    Acquires:     {:>12}", format_number(pool_stats.acquires as usize));
    println!("    Releases:     {:>12}", format_number(pool_stats.releases as usize));
    println!("    Timeouts:     {:>12}", format_number(pool_stats.timeouts as usize));
    println!("    Discarded:    {:>12}", format_number(pool_stats.discarded as usize));

    println!("\n📈 Registry:");
    println!("    Snapshots:    {:>12}", format_number(registry.len()));
    if let Some(latest) = registry.latest() {
        println!("    Latest:       {:>12}", latest.id());
    }

    println!();
    for line in statistics.report().lines() {
        println!("  {}", line);
    }

    println!("\n✅ Benchmark completed!");
}
