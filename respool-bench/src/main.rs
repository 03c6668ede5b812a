//! # Client Benchmark Harness
//!
//! Purpose: Drive a live server through the pooled client from several
//! threads so pool contention, single-command latency and pipelining gains
//! can be compared over time.
//!
//! Usage: `respool-bench [host] [port] [threads] [ops_per_thread] [pipeline_depth] [max_connections]`
//!
//! Set `RUST_LOG=respool_client=debug` to see connection lifecycle events.

use std::env;
use std::hint::black_box;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{ensure, Context, Result};
use respool_client::{commands, ClientConfig, RedisClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 6379;
const DEFAULT_THREADS: usize = 8;
const DEFAULT_OPS_PER_THREAD: usize = 10_000;
const DEFAULT_PIPELINE_DEPTH: usize = 64;
const DEFAULT_MAX_CONNECTIONS: usize = 4;
const VALUE_SIZE: usize = 128;

struct BenchConfig {
    host: String,
    port: u16,
    threads: usize,
    ops_per_thread: usize,
    pipeline_depth: usize,
    max_connections: usize,
}

impl BenchConfig {
    fn from_args() -> Result<Self> {
        let mut args = env::args().skip(1);
        let host = args.next().unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse(args.next(), DEFAULT_PORT).context("invalid port")?;
        let threads = parse(args.next(), DEFAULT_THREADS).context("invalid thread count")?;
        let ops_per_thread = parse(args.next(), DEFAULT_OPS_PER_THREAD).context("invalid op count")?;
        let pipeline_depth =
            parse(args.next(), DEFAULT_PIPELINE_DEPTH).context("invalid pipeline depth")?;
        let max_connections =
            parse(args.next(), DEFAULT_MAX_CONNECTIONS).context("invalid max connections")?;

        ensure!(threads > 0, "thread count must be positive");
        ensure!(pipeline_depth > 0, "pipeline depth must be positive");

        Ok(BenchConfig {
            host,
            port,
            threads,
            ops_per_thread,
            pipeline_depth,
            max_connections,
        })
    }
}

fn parse<T: std::str::FromStr>(value: Option<String>, fallback: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(fallback),
    }
}

fn report(label: &str, ops: usize, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (ops as f64) / secs;
    let micros_per_op = (secs * 1e6) / (ops as f64);
    println!("{label}: {ops} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {micros_per_op:.1} us/op)");
}

/// Runs `work(thread_index)` on every thread and reports combined throughput.
fn run_phase<F>(label: &str, config: &BenchConfig, ops: usize, work: F) -> Result<()>
where
    F: Fn(usize) -> Result<()> + Send + Sync + Clone + 'static,
{
    let start = Instant::now();
    let workers: Vec<_> = (0..config.threads)
        .map(|idx| {
            let work = work.clone();
            thread::spawn(move || work(idx))
        })
        .collect();
    for worker in workers {
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("{label} worker panicked"))??;
    }
    report(label, ops, start.elapsed());
    Ok(())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(err) = run() {
        eprintln!("respool-bench failed: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = BenchConfig::from_args()?;
    let client_config = ClientConfig::new(config.host.clone(), config.port)
        .with_max_connections(config.max_connections);
    let client = RedisClient::with_config(client_config).context("building client")?;
    client.ping().context("initial PING")?;

    info!(
        host = %config.host,
        port = config.port,
        threads = config.threads,
        ops_per_thread = config.ops_per_thread,
        pipeline_depth = config.pipeline_depth,
        max_connections = config.max_connections,
        "Starting benchmark"
    );

    let total = config.threads * config.ops_per_thread;
    let per_thread = config.ops_per_thread;

    let pinger = client.clone();
    run_phase("PING", &config, total, move |_| {
        for _ in 0..per_thread {
            black_box(pinger.ping()?);
        }
        Ok(())
    })?;

    let setter = client.clone();
    run_phase("SET", &config, total, move |idx| {
        let value = vec![b'x'; VALUE_SIZE];
        for op in 0..per_thread {
            setter.set(format!("bench:{}:{}", idx, op % 1024), value.as_slice())?;
        }
        Ok(())
    })?;

    let getter = client.clone();
    run_phase("GET", &config, total, move |idx| {
        for op in 0..per_thread {
            black_box(getter.get_bytes(format!("bench:{}:{}", idx, op % 1024))?);
        }
        Ok(())
    })?;

    let pipeliner = client.clone();
    let depth = config.pipeline_depth;
    run_phase("INCR (pipelined)", &config, total, move |idx| {
        let key = format!("bench:counter:{}", idx);
        let mut remaining = per_thread;
        while remaining > 0 {
            let batch = remaining.min(depth);
            let results = pipeliner.pipeline(|p| {
                for _ in 0..batch {
                    p.send(&commands::incr(key.as_str()))?;
                }
                Ok(())
            })?;
            for result in results {
                black_box(result?);
            }
            remaining -= batch;
        }
        Ok(())
    })?;

    let pool = client.pool();
    info!(
        created = pool.created_count(),
        idle = pool.idle_count(),
        "Benchmark finished"
    );
    pool.close();
    Ok(())
}
