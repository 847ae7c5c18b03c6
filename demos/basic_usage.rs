// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic allowlist-sync usage example.
//!
//! Demonstrates:
//! 1. Syncing from a legacy (v1.0.0) registry on demand
//! 2. Upgrading the registry to v1.1.0 and syncing in pages
//! 3. Persisting to SQLite and warming a fresh engine from it
//! 4. Running the periodic worker
//! 5. Displaying metrics
//! 6. Clean shutdown
//!
//! The registry is the in-process [`InMemoryRegistry`], so no network or
//! docker environment is needed.
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use allowlist_sync::{
    Address, AllowlistCache, AllowlistConfig, InMemoryRegistry, SqlAllowlistStore, SyncEngine,
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           allowlist-sync: Basic Usage Example                 ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure the engine against a legacy registry
    // ─────────────────────────────────────────────────────────────────────────
    println!("📦 Configuring allowlist-sync...");

    let registry_address = Address::from_low_u64(0xF00);
    let config = AllowlistConfig {
        registry_address,
        block_confirmations: 2,
        update_interval_secs: 2,
        update_timeout_secs: 1,
        onchain_batch_size: 10,
        fetch_delay_ms: 20,
        ..Default::default()
    };

    let db_path = std::env::temp_dir().join("allowlist_sync_demo.db");
    let _ = std::fs::remove_file(&db_path);
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let store = SqlAllowlistStore::new(&db_url, registry_address).await?;

    let alice = Address::from_low_u64(0xA11CE);
    let bob = Address::from_low_u64(0xB0B);
    let mallory = Address::from_low_u64(0x3A1);

    let registry = Arc::new(
        InMemoryRegistry::new("TermsOfServiceAllowList v1.0.0").with_allowed(vec![alice, bob]),
    );
    let cache = Arc::new(AllowlistCache::new());
    let engine = SyncEngine::new(config.clone(), registry.clone(), Arc::new(store.clone()), cache.clone())?;
    println!("   State: {}", engine.state());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. One-shot sync (legacy get-all)
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔄 Syncing from legacy registry...");
    let report = engine.update_from_contract().await?;
    println!(
        "   └─ {} v{} at height {}: {} allowed",
        report.strategy, report.version, report.target_height, report.allowed
    );

    println!("\n🔍 Checking membership...");
    for (name, who) in [("alice", alice), ("bob", bob), ("mallory", mallory)] {
        let start = Instant::now();
        let allowed = engine.allow(&who);
        println!("   └─ allow({}): {} ({:?})", name, allowed, start.elapsed());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Registry upgrade: paged sync with a blocked sender
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n⬆️  Upgrading registry to v1.1.0 (42 senders, bob blocked)...");
    let mut senders: Vec<Address> = (1..=41).map(Address::from_low_u64).collect();
    senders.push(alice);
    registry.set_type_and_version("TermsOfServiceAllowList v1.1.0");
    registry.set_allowed(senders);
    registry.set_blocked(vec![bob]);

    let report = engine.update_from_contract().await?;
    println!(
        "   └─ {} v{}: {} allowed, {} blocked removed, {} persist failures",
        report.strategy, report.version, report.allowed, report.blocked_removed, report.persist_failures
    );
    println!("   └─ allow(bob): {}", engine.allow(&bob));
    println!("   └─ cache size: {}", cache.len());
    drop(engine);

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Warm restart from SQLite, then the periodic worker
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🚀 Starting a fresh engine from the persisted store...");
    let warm_cache = Arc::new(AllowlistCache::new());
    let engine = SyncEngine::new(config, registry.clone(), Arc::new(store.clone()), warm_cache.clone())?;
    engine.start().await?;
    println!("   └─ State: {}", engine.state());
    println!("   └─ Served from store before any sync: {} senders", warm_cache.len());

    registry.set_allowed(vec![alice, mallory]);
    registry.set_blocked(Vec::new());
    println!("\n⏳ Waiting for the worker to pick up a registry change...");
    tokio::time::sleep(Duration::from_millis(2500)).await;
    println!("   └─ allow(mallory): {}", engine.allow(&mallory));
    println!("   └─ cache generation: {}", warm_cache.generation());

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Dump raw metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Raw Metrics:");
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Clean shutdown
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🛑 Shutting down...");
    engine.stop().await?;
    println!("   ✅ Shutdown complete! State: {}", engine.state());

    store.pool().close().await;
    let _ = std::fs::remove_file(&db_path);

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

/// Dump all captured metrics, grouped by kind
fn dump_metrics(snapshotter: &Snapshotter) {
    let snapshot = snapshotter.snapshot();

    let mut counters: Vec<_> = vec![];
    let mut gauges: Vec<_> = vec![];
    let mut histograms: Vec<_> = vec![];

    for (composite_key, _, _, value) in snapshot.into_vec() {
        let (_, key) = composite_key.into_parts();
        let name = key.name().to_string();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        match value {
            DebugValue::Counter(v) => counters.push((name, label_str, v)),
            DebugValue::Gauge(v) => gauges.push((name, label_str, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                let avg = if count > 0 { sum / count as f64 } else { 0.0 };
                histograms.push((name, label_str, count, avg));
            }
        }
    }

    counters.sort();
    gauges.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    histograms.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    if !counters.is_empty() {
        println!("   ┌─ Counters (cumulative)");
        for (name, labels, value) in &counters {
            println!("   │  └─ {}{} = {}", name, labels, value);
        }
    }
    if !gauges.is_empty() {
        println!("   ├─ Gauges (current value)");
        for (name, labels, value) in &gauges {
            println!("   │  └─ {}{} = {:.0}", name, labels, value);
        }
    }
    if !histograms.is_empty() {
        println!("   └─ Histograms");
        for (name, labels, count, avg) in &histograms {
            println!("      └─ {}{} n={} avg={:.4}s", name, labels, count, avg);
        }
    }
}
