//! Latency benchmarks for archive lookups and portfolio repricing.
//!
//! Run with: `cargo bench --bench latency`

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use trada_core::{
    Archive, Balance, Clock, CoinBalance, ManualClock, Portfolio, Price, Symbol, SymbolType,
};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap()
}

fn clock() -> Arc<dyn Clock> {
    Arc::new(ManualClock::new(start()))
}

/// Populate `symbol` with `count` five-minute samples in `quote`.
fn fill(symbol: &mut Symbol, quote: &str, count: i64, base_value: f64) {
    for i in 0..count {
        let at = start() + Duration::minutes(5 * i);
        let price = Price::new(
            symbol.symbol_type().clone(),
            quote,
            base_value + i as f64,
            at,
            "bench",
        );
        symbol.add_price(price).unwrap();
    }
}

/// Archive with LTC/BTC, ETH/BTC and BTC/USDT histories of `count` samples.
fn archive_with_history(count: i64) -> Archive {
    let archive = Archive::new(clock());
    for (base, quote, value) in [
        ("LTC", "BTC", 0.018),
        ("ETH", "BTC", 0.08),
        ("BTC", "USDT", 9000.0),
    ] {
        for i in 0..count {
            let at = start() + Duration::minutes(5 * i);
            archive
                .add_price(Price::new(base, quote, value + i as f64 * 1e-4, at, "bench"))
                .unwrap();
        }
    }
    archive
}

/// Benchmark interpolated lookups on a single symbol.
fn bench_symbol_price_as(c: &mut Criterion) {
    let mut group = c.benchmark_group("symbol_price_as");
    let quote = SymbolType::from("USDT");

    for count in [100i64, 1_000, 10_000, 100_000].iter() {
        let mut symbol = Symbol::new(SymbolType::from("BTC"), clock());
        fill(&mut symbol, "USDT", *count, 9000.0);
        let at = start() + Duration::minutes(5 * (count / 2)) + Duration::seconds(90);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("interpolate", count), &symbol, |b, symbol| {
            b.iter(|| black_box(symbol.price_as(black_box(&quote), black_box(at))))
        });
    }

    group.finish();
}

/// Benchmark inserting out-of-order samples.
fn bench_symbol_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("symbol_insert");

    for count in [1_000i64, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("reverse_order", count), count, |b, count| {
            b.iter(|| {
                let mut symbol = Symbol::new(SymbolType::from("BTC"), clock());
                for i in (0..*count).rev() {
                    let at = start() + Duration::minutes(5 * i);
                    symbol
                        .add_price(Price::new("BTC", "USDT", 9000.0, at, "bench"))
                        .unwrap();
                }
                black_box(symbol.price_count(&SymbolType::from("USDT")))
            })
        });
    }

    group.finish();
}

/// Benchmark direct and triangulated archive lookups.
fn bench_archive_lookups(c: &mut Criterion) {
    let mut group = c.benchmark_group("archive_lookups");
    let archive = archive_with_history(10_000);
    let ltc = SymbolType::from("LTC");
    let btc = SymbolType::from("BTC");
    let usdt = SymbolType::from("USDT");
    let at = start() + Duration::days(10) + Duration::seconds(45);

    group.throughput(Throughput::Elements(1));
    group.bench_function("latest_direct", |b| {
        b.iter(|| black_box(archive.latest_price_as(black_box(&ltc), black_box(&btc))))
    });
    group.bench_function("latest_triangulated", |b| {
        b.iter(|| black_box(archive.latest_price_as(black_box(&ltc), black_box(&usdt))))
    });
    group.bench_function("historical_triangulated", |b| {
        b.iter(|| black_box(archive.price_as(black_box(&ltc), black_box(&usdt), black_box(at))))
    });

    group.finish();
}

/// Benchmark repricing a portfolio at a historical instant.
fn bench_portfolio_reprice(c: &mut Criterion) {
    let archive = archive_with_history(10_000);
    let mut portfolio = Portfolio::simulated("bench");
    for (symbol, quote) in [("LTC", "USDT"), ("ETH", "BTC"), ("BTC", "USDT")] {
        portfolio.insert_balance(Balance::from_coin(
            CoinBalance::new(symbol, "bench", 10.0, 0.0),
            quote,
            start(),
        ));
    }
    let at = start() + Duration::days(20);

    c.bench_function("portfolio_reprice_at", |b| {
        b.iter(|| black_box(portfolio.reprice_at(&archive, black_box(at))))
    });
}

criterion_group!(
    benches,
    bench_symbol_price_as,
    bench_symbol_insert,
    bench_archive_lookups,
    bench_portfolio_reprice,
);

criterion_main!(benches);
