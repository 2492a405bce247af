use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use netsim::prelude::*;

fn ring_scenario(size: u32) -> ScenarioConfig {
    let mut text = String::from("parameter stop 2000\n");
    text.push_str(&format!("node 0 2 flooding-switch bulk-sender 200 {}\n", size / 2));
    for id in 1..size {
        text.push_str(&format!("node {} 2 flooding-switch empty\n", id));
    }
    for id in 0..size {
        text.push_str(&format!("link {}.1 {}.0 10000000 2 0.01 0.2\n", id, (id + 1) % size));
    }
    ScenarioConfig::parse(&text).expect("ring scenario parses")
}

fn bench_flooding_ring(c: &mut Criterion) {
    let registry = AlgorithmRegistry::new();
    let mut group = c.benchmark_group("flooding_ring");
    for size in [4u32, 16, 64] {
        let config = ring_scenario(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &config, |b, config| {
            b.iter(|| {
                let mut sim = Simulator::from_config(config, &registry).expect("ring builds");
                black_box(sim.run().expect("ring runs"))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_flooding_ring);
criterion_main!(benches);
