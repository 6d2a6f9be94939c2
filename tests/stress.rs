//! Stress tests for EMon
//!
//! Run with: cargo test --release stress -- --ignored

use emon::*;
use std::time::Instant;

fn power_registry() -> (Registry, FixedSource, NodeId) {
    let mut registry = Registry::default();
    let voltage = registry
        .add(
            NodeConfig::new("Voltage", "V"),
            NodeKind::Sampled(Sampled::voltage_divider(0, 30_000.0, 10_000.0).unwrap()),
        )
        .unwrap();
    let current = registry
        .add(
            NodeConfig::new("Current", "A"),
            NodeKind::Sampled(Sampled::voltage_divider(1, 0.0, 1.0).unwrap()),
        )
        .unwrap();
    let power = registry
        .add(
            NodeConfig::new("Power", "W"),
            NodeKind::Product(Product::new(voltage, current)),
        )
        .unwrap();
    let energy = registry
        .add(
            NodeConfig::new("Energy", "Wh"),
            NodeKind::Integral(Integral::hourly(power)),
        )
        .unwrap();

    let mut source = FixedSource::new(2);
    source.set_raw(0, 3000);
    source.set_raw(1, 2000);
    (registry, source, energy)
}

#[test]
#[ignore] // Run manually with --ignored
fn stress_test_refresh() {
    let (mut registry, mut source, _) = power_registry();
    let clock = ManualClock::new(0);

    let iterations = 1_000_000;
    let start = Instant::now();

    for _ in 0..iterations {
        clock.advance(1);
        registry.refresh(&mut source, &clock);
    }

    let elapsed = start.elapsed();
    let rate = iterations as f64 / elapsed.as_secs_f64();

    println!("Refreshed {} times in {:?}", iterations, elapsed);
    println!("Rate: {:.0} passes/second", rate);

    assert!(
        rate > 100_000.0,
        "Should refresh at least 100k passes/s, got {:.0}",
        rate
    );
}

#[test]
#[ignore]
fn stress_test_week_of_energy() {
    let (mut registry, mut source, energy) = power_registry();
    let clock = ManualClock::new(u32::MAX - 1_000);

    // One sample a second for a week, crossing the counter wrap
    let seconds = 7 * 24 * 3_600;
    registry.refresh(&mut source, &clock);
    for _ in 0..seconds {
        clock.advance(1_000);
        registry.refresh(&mut source, &clock);
    }

    let expected = 24.0 * 7.0 * 24.0;
    let total = registry.value(energy);
    println!("Energy after one week: {:.6} Wh", total);
    assert!((total - expected).abs() < 1e-4, "got {}", total);
}
