// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use criterion::*;
use rand::prelude::*;
use sustained::contract::qf::*;
use sustained::primitives::*;

fn contributions(projects: u32, per_project: usize) -> Vec<Contribution> {
    let mut rng = StdRng::seed_from_u64(42);

    (1..=projects)
        .flat_map(|project_id| {
            (0..per_project)
                .map(|_| {
                    let mut contributor = [0; 32];
                    rng.fill_bytes(&mut contributor);
                    Contribution {
                        amount: rng.gen_range(1..1_000_000_000_000),
                        contributor: AccountId(contributor),
                        project_id,
                        round_id: 1,
                        timestamp: 0,
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn bench_isqrt(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let inputs: Vec<u128> = (0..1_000).map(|_| rng.gen()).collect();

    c.bench_function("isqrt 1000 random u128", |b| {
        b.iter(|| {
            for x in &inputs {
                black_box(isqrt(*x));
            }
        })
    });
}

fn bench_compute_matches(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute matches");

    for (projects, per_project) in [(6, 20), (20, 100), (50, 1_000)] {
        let eligible: Vec<u32> = (1..=projects).collect();
        let contributions = contributions(projects, per_project);

        group.throughput(Throughput::Elements(contributions.len() as u64));
        group.bench_function(format!("{projects} projects x {per_project}"), |b| {
            b.iter(|| {
                let matches = compute_matches(1_000_000_000_000_000, &eligible, &contributions);
                assert!(matches.total_scaled() <= 1_000_000_000_000_000);
            })
        });
    }

    group.finish();
}

fn bench_estimate_impact(c: &mut Criterion) {
    let existing: Vec<Balance> = (1..=500).map(|i| i * 10_000_000_000).collect();

    c.bench_function("estimate impact 500 contributions", |b| {
        b.iter(|| estimate_impact(black_box(&existing), 50_000_000_000, 7_500))
    });
}

pub fn qf_benchmark(c: &mut Criterion) {
    bench_isqrt(c);
    bench_compute_matches(c);
    bench_estimate_impact(c);
}

criterion_group!(benches, qf_benchmark);
criterion_main!(benches);
