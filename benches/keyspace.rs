//! Keyspace Benchmarks
//!
//! Measures the keyspace engine and the generic command layer under the
//! workloads the server sees most: point reads, conditional expiry,
//! renames and pattern scans.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use driftkv::commands::{GenericCommands, Session};
use driftkv::options::{ExpireOption, RenameOption};
use driftkv::pattern::GlobPattern;
use driftkv::storage::{Databases, Keyspace, Value};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

fn string(value: &str) -> Value {
    Value::String(Bytes::from(value.to_string()))
}

fn populated(n: usize) -> Keyspace {
    let keyspace = Keyspace::new();
    for i in 0..n {
        keyspace.insert(Bytes::from(format!("key:{}", i)), string("value"), None);
    }
    keyspace
}

/// Point reads, hits and misses
fn bench_exists(c: &mut Criterion) {
    let keyspace = populated(100_000);

    let mut group = c.benchmark_group("exists");
    group.throughput(Throughput::Elements(1));

    group.bench_function("hit", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(keyspace.exists(key.as_bytes()));
            i += 1;
        });
    });

    group.bench_function("miss", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(keyspace.exists(key.as_bytes()));
            i += 1;
        });
    });

    group.finish();
}

/// EXPIRE with and without conditions
fn bench_expire(c: &mut Criterion) {
    let keyspace = populated(10_000);

    let mut group = c.benchmark_group("expire");
    group.throughput(Throughput::Elements(1));

    group.bench_function("unconditional", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 10_000);
            let option = ExpireOption::at(SystemTime::now() + Duration::from_secs(3600));
            black_box(keyspace.set_ttl(key.as_bytes(), &option));
            i += 1;
        });
    });

    group.bench_function("gt", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 10_000);
            let option = ExpireOption {
                gt: true,
                ..ExpireOption::at(SystemTime::now() + Duration::from_secs(7200))
            };
            black_box(keyspace.set_ttl(key.as_bytes(), &option));
            i += 1;
        });
    });

    group.finish();
}

/// RENAME back and forth, within and across shards
fn bench_rename(c: &mut Criterion) {
    let databases = Arc::new(Databases::new(1));
    let commands = GenericCommands::new(Arc::clone(&databases));
    let session = Session::default();
    let keyspace = databases.get(0).expect("database 0");
    keyspace.insert(Bytes::from("a"), string("value"), None);

    let mut group = c.benchmark_group("rename");
    group.throughput(Throughput::Elements(1));

    group.bench_function("ping_pong", |b| {
        let mut forward = true;
        b.iter(|| {
            let (from, to): (&[u8], &[u8]) = if forward { (b"a", b"b") } else { (b"b", b"a") };
            black_box(commands.rename(&session, from, to, RenameOption::default())).ok();
            forward = !forward;
        });
    });

    group.finish();
}

/// KEYS over a mixed keyspace
fn bench_keys(c: &mut Criterion) {
    let databases = Arc::new(Databases::new(1));
    let commands = GenericCommands::new(Arc::clone(&databases));
    let session = Session::default();
    let keyspace = databases.get(0).expect("database 0");

    for i in 0..1_000 {
        keyspace.insert(Bytes::from(format!("user:{}", i)), string("user"), None);
        keyspace.insert(Bytes::from(format!("session:{}", i)), string("session"), None);
        keyspace.insert(Bytes::from(format!("cache:{}", i)), string("cache"), None);
    }

    let mut group = c.benchmark_group("keys");

    group.bench_function("prefix", |b| {
        b.iter(|| black_box(commands.keys(&session, b"user:*")));
    });

    group.bench_function("all", |b| {
        b.iter(|| black_box(commands.keys(&session, b"*")));
    });

    group.bench_function("compile", |b| {
        b.iter(|| black_box(GlobPattern::new(b"user:?:*.json")));
    });

    group.finish();
}

/// Readers and writers on one keyspace from several threads
fn bench_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let keyspace = Arc::new(Keyspace::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let keyspace = Arc::clone(&keyspace);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = Bytes::from(format!("key:{}:{}", t, i));
                            keyspace.insert(key.clone(), string("value"), None);
                            keyspace.exists(&key);
                            if i % 4 == 0 {
                                keyspace.remove(&key);
                            }
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().expect("worker thread");
            }

            black_box(keyspace.len());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_exists,
    bench_expire,
    bench_rename,
    bench_keys,
    bench_concurrent,
);

criterion_main!(benches);
