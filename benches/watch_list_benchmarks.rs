use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use wallet_risk_scanner::blockchain::{Block, BlockProcessor, RpcClient, Transaction, WatchSet};
use wallet_risk_scanner::database::{AddressPayload, Database};

fn address(id: u64) -> String {
    format!("0x{:040x}", id)
}

fn create_test_transaction(id: u64) -> Transaction {
    Transaction {
        hash: format!("0x{:064x}", id),
        from: Some(address(id)),
        to: Some(address(id + 1_000_000)),
        value: "0xde0b6b3a7640000".to_string(),
        gas: "0x5208".to_string(),
        gas_price: Some("0x6fc23ac00".to_string()),
        input: "0xa9059cbb".to_string(),
        chain_id: None,
        v: Some("0x135".to_string()),
    }
}

fn bench_watch_set_membership(c: &mut Criterion) {
    let mut group = c.benchmark_group("watch_set");

    for size in [10u64, 1_000, 100_000].iter() {
        let set = WatchSet::from_addresses((0..*size).map(address));
        let probe = address(size / 2).to_uppercase().replacen("0X", "0x", 1);

        group.bench_with_input(BenchmarkId::new("contains_mixed_case", size), size, |b, _| {
            b.iter(|| set.contains(black_box(&probe)));
        });
        group.bench_with_input(BenchmarkId::new("build", size), size, |b, &size| {
            b.iter(|| WatchSet::from_addresses((0..size).map(address)));
        });
    }

    group.finish();
}

fn bench_block_matching(c: &mut Criterion) {
    // match_block never touches the chain client
    let chain = Arc::new(RpcClient::new("http://127.0.0.1:8545".to_string(), 1).expect("Failed to build client"));
    let processor = BlockProcessor::new(chain);
    let watch_set = WatchSet::from_addresses((0..1_000).map(|i| address(i * 7)));

    let mut group = c.benchmark_group("block_matching");

    for tx_count in [50u64, 500].iter() {
        let block = Block {
            number: 1,
            timestamp: 1_700_000_000,
            transactions: (0..*tx_count).map(create_test_transaction).collect(),
        };

        group.bench_with_input(BenchmarkId::new("match_block", tx_count), tx_count, |b, _| {
            b.iter(|| processor.match_block(black_box(&block), 137, &watch_set));
        });
    }

    group.finish();
}

fn bench_registry_listing(c: &mut Criterion) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("bench_registry.db");
    let database = Database::new(db_path.to_str().expect("Non UTF-8 temp path")).expect("Failed to create registry");

    for i in 0..1_000 {
        database
            .upsert_address(&AddressPayload {
                address: address(i),
                labels: Some(vec!["bench".to_string()]),
                ..Default::default()
            })
            .expect("Failed to store address");
    }

    let mut group = c.benchmark_group("registry");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("list_addresses_1000", |b| {
        b.iter(|| database.list_addresses());
    });
    group.bench_function("list_and_build_watch_set", |b| {
        b.iter(|| {
            let addresses = database.list_addresses().unwrap_or_default();
            WatchSet::from_addresses(addresses)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_watch_set_membership,
    bench_block_matching,
    bench_registry_listing
);
criterion_main!(benches);
