//! HTTP stress run against an in-process server. Not a pass/fail test:
//! prints throughput and latency percentiles per phase.
//!
//!   cargo bench --bench stress

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use aforo::api::{router, AppState};
use aforo::auth::TokenMap;
use aforo::engine::Engine;
use aforo::notify::NotifyHub;

const ADMIN: &str = "bench-admin";

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

async fn spawn_server() -> String {
    let dir = std::env::temp_dir().join("aforo_bench");
    std::fs::create_dir_all(&dir).unwrap();
    let wal = dir.join("stress.wal");
    let _ = std::fs::remove_file(&wal);

    let engine = Arc::new(Engine::new(wal, Arc::new(NotifyHub::new())).unwrap());
    let state = AppState {
        engine,
        tokens: Arc::new(TokenMap::new(Some(ADMIN.into()), None)),
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

async fn setup(base: &str, client: &reqwest::Client) {
    let resp: Value = client
        .post(format!("{base}/api/capacity/bulk"))
        .bearer_auth(ADMIN)
        .json(&json!({
            "excursion_id": "bench-trip",
            "start_date": "2026-01-01",
            "end_date": "2026-12-31",
            "max_capacity": 10_000,
            "is_available": true,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    println!("  opened {} capacity records", resp["created"]);
}

async fn phase1_sequential_checks(base: &str, client: &reqwest::Client) {
    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let day = 1 + (i % 28);
        let date = format!("2026-{:02}-{day:02}", 1 + (i / 28) % 12);
        let t = Instant::now();
        let resp = client
            .get(format!("{base}/api/capacity/check"))
            .query(&[("excursion_id", "bench-trip"), ("date", &date)])
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} checks in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("check latency", &mut latencies);
}

async fn phase2_concurrent_reserves(base: &str) {
    let n_tasks = 10;
    let n_per_task = 200;
    let start = Instant::now();
    let mut handles = Vec::new();

    for i in 0..n_tasks {
        let base = base.to_string();
        handles.push(tokio::spawn(async move {
            let client = reqwest::Client::new();
            // Each task hammers its own date so write locks collide per pair.
            let date = format!("2026-06-{:02}", 1 + (i % 5));
            for _ in 0..n_per_task {
                let resp = client
                    .post(format!("{base}/api/capacity/reserve"))
                    .bearer_auth(ADMIN)
                    .json(&json!({
                        "excursion_id": "bench-trip",
                        "date": date,
                        "seats": 1,
                    }))
                    .send()
                    .await
                    .unwrap();
                assert!(resp.status().is_success());
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} reserves = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_checks_under_write_load(base: &str, client: &reqwest::Client) {
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let writer = {
        let base = base.to_string();
        let stop = stop.clone();
        tokio::spawn(async move {
            let client = reqwest::Client::new();
            while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                let _ = client
                    .post(format!("{base}/api/capacity/reserve"))
                    .bearer_auth(ADMIN)
                    .json(&json!({
                        "excursion_id": "bench-trip",
                        "date": "2026-07-14",
                        "seats": 1,
                    }))
                    .send()
                    .await;
            }
        })
    };

    let n = 1000;
    let mut latencies = Vec::with_capacity(n);
    for _ in 0..n {
        let t = Instant::now();
        let resp = client
            .get(format!("{base}/api/capacity/check"))
            .query(&[("excursion_id", "bench-trip"), ("date", "2026-07-14")])
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        latencies.push(t.elapsed());
    }
    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    writer.await.unwrap();

    print_latency("check latency under writes", &mut latencies);
}

#[tokio::main]
async fn main() {
    println!("aforo stress run");

    println!("[setup]");
    let base = spawn_server().await;
    let client = reqwest::Client::new();
    setup(&base, &client).await;

    println!("[phase 1: sequential checks]");
    phase1_sequential_checks(&base, &client).await;

    println!("[phase 2: concurrent reserves]");
    phase2_concurrent_reserves(&base).await;

    println!("[phase 3: checks under write load]");
    phase3_checks_under_write_load(&base, &client).await;
}
