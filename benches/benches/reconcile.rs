// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for the commit pass: full versus isolated collections.

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use umbra_shadow::{NodeKind, Schema, Store, StoreConfig, Strategy};
use umbra_value::{Path, Value};

#[derive(Clone)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u32(&mut self) -> u32 {
        // Numerical Recipes LCG parameters.
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 32) as u32
    }

    fn below(&mut self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        (self.next_u32() as usize) % upper
    }
}

fn todo_key(i: usize) -> String {
    format!("t{i:05}")
}

fn todos(n: usize) -> Value {
    Value::record((0..n).map(|i| {
        (
            todo_key(i),
            Value::record([
                ("title", Value::from(format!("todo {i}"))),
                ("done", Value::from(false)),
            ]),
        )
    }))
}

fn build_store(n: usize, strategy: Strategy) -> Store {
    let list = Schema::builder(NodeKind::Record).strategy(strategy).build();
    let root = Schema::builder(NodeKind::Record).child("todos", list).build();
    Store::new(
        StoreConfig::builder()
            .root_schema(root)
            .initial_state(Value::record([("todos", todos(n))]))
            .build(),
    )
}

/// Toggles `writes` random entries, then flushes one tick.
fn toggle_random(store: &mut Store, rng: &mut Lcg, n: usize, writes: usize) {
    for _ in 0..writes {
        let key = todo_key(rng.below(n));
        let path = Path::parse_dotted(&format!("todos.{key}"));
        let Some(entry) = store.shadow().at(&path) else {
            continue;
        };
        let _ = store.edit(&entry).set("done", true);
    }
    black_box(store.flush());
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("umbra_reconcile");
    group.sample_size(30);

    for &n in &[1_000_usize, 10_000] {
        for (label, strategy) in [("full", Strategy::Full), ("isolated", Strategy::Isolated)] {
            group.bench_function(format!("{label}_single_write(n={n})"), |b| {
                b.iter_batched(
                    || (build_store(n, strategy), Lcg::new(0x5AD0_0000_0000_0001)),
                    |(mut store, mut rng)| {
                        toggle_random(&mut store, &mut rng, n, 1);
                        black_box(store);
                    },
                    BatchSize::LargeInput,
                );
            });

            group.bench_function(format!("{label}_sixteen_writes(n={n})"), |b| {
                b.iter_batched(
                    || (build_store(n, strategy), Lcg::new(0x5AD0_0000_0000_0002)),
                    |(mut store, mut rng)| {
                        toggle_random(&mut store, &mut rng, n, 16);
                        black_box(store);
                    },
                    BatchSize::LargeInput,
                );
            });
        }

        group.bench_function(format!("initial_shadow(n={n})"), |b| {
            b.iter(|| black_box(build_store(n, Strategy::Full)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reconcile);
criterion_main!(benches);
