//! Benchmarks for the segmentation pipeline.
//! Run with: cargo bench -p mece-segmentation

use chrono::{Duration, Utc};
use mece_core::{ResolutionPolicy, SegmentationConfig, UserRecord};
use mece_segmentation::SegmentationEngine;

fn create_population(n: usize) -> Vec<UserRecord> {
    let now = Utc::now();
    (0..n)
        .map(|i| UserRecord {
            user_id: format!("bench-user-{i:07}"),
            cart_abandoned_at: Some(now - Duration::minutes((i % (7 * 24 * 60)) as i64)),
            last_order_at: None,
            avg_order_value: 10.0 + ((i * 7919) % 49_000) as f64 / 100.0,
            sessions_last_30d: (i % 25) as u32,
            num_cart_items: 1 + (i % 6) as u32,
            engagement_score: ((i * 104_729) % 1000) as f64 / 1000.0,
            profitability_score: ((i * 15_485_863) % 1000) as f64 / 1000.0,
        })
        .collect()
}

fn main() {
    let config = SegmentationConfig {
        resolution: ResolutionPolicy::BestEffort,
        ..Default::default()
    };
    let engine = SegmentationEngine::new(config).expect("Failed to create engine");
    let population = create_population(50_000);

    // Warmup
    for _ in 0..3 {
        engine.run(&population, Utc::now()).unwrap();
    }

    // Benchmark
    let iterations = 20;
    let start = std::time::Instant::now();
    let mut segments = 0;
    for _ in 0..iterations {
        segments = engine.run(&population, Utc::now()).unwrap().summaries.len();
    }
    let elapsed = start.elapsed();

    let per_run = elapsed / iterations;
    println!("=== Segmentation Pipeline Benchmark ===");
    println!("Population:    {}", population.len());
    println!("Segments:      {segments}");
    println!("Iterations:    {iterations}");
    println!("Per run:       {:.2}ms", per_run.as_secs_f64() * 1000.0);
    println!(
        "Throughput:    {:.0} records/sec",
        population.len() as f64 / per_run.as_secs_f64()
    );
}
