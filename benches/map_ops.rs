use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hugemap::{HugeConfig, StrBytesMap};
use rand::{distributions::Alphanumeric, Rng};

/// Generates key-value pairs mixing slot-sized and overflow-sized values.
fn generate_data(size: usize) -> Vec<(String, Vec<u8>)> {
    let mut rng = rand::thread_rng();
    (0..size)
        .map(|_| {
            let key_len = rng.gen_range(1..=25);
            let val_len = rng.gen_range(1..=250);
            let key: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(key_len)
                .map(char::from)
                .collect();
            let value: Vec<u8> = (&mut rng).sample_iter(&Alphanumeric).take(val_len).collect();
            (key, value)
        })
        .collect()
}

fn config_for(size: usize) -> HugeConfig {
    HugeConfig::default()
        .with_entries_per_segment((size / 16).max(64))
        .with_small_entry_size(128)
}

fn benchmark_map_ops(c: &mut Criterion) {
    for &size in &[10_000, 100_000] {
        let mut group = c.benchmark_group(format!("size={size}"));
        let data = generate_data(size);

        group.bench_function("HugeMap - insert", |b| {
            b.iter_with_setup(
                || StrBytesMap::new(config_for(size)),
                |map| {
                    for (k, v) in data.iter() {
                        map.insert(black_box(k), black_box(v)).unwrap();
                    }
                },
            );
        });

        let map = StrBytesMap::new(config_for(size));
        for (k, v) in data.iter() {
            map.insert(k, v).unwrap();
        }
        group.bench_function("HugeMap - get", |b| {
            b.iter(|| {
                for (k, _) in data.iter() {
                    black_box(map.get(black_box(k)).unwrap());
                }
            });
        });

        group.bench_function("std HashMap - insert", |b| {
            b.iter_with_setup(HashMap::new, |mut map: HashMap<String, Vec<u8>>| {
                for (k, v) in data.iter() {
                    map.insert(black_box(k.clone()), black_box(v.clone()));
                }
            });
        });

        let mut std_map = HashMap::new();
        for (k, v) in data.iter() {
            std_map.insert(k.clone(), v.clone());
        }
        group.bench_function("std HashMap - get", |b| {
            b.iter(|| {
                for (k, _) in data.iter() {
                    black_box(std_map.get(black_box(k)));
                }
            });
        });

        group.finish();
    }
}

criterion_group!(benches, benchmark_map_ops);
criterion_main!(benches);
