//! Integration tests for component interactions.
//!
//! These tests verify that the archive, portfolios, simulations and the
//! server work together correctly.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use backtester::SimulationWindow;
use trada_core::{
    Archive, Balance, Clock, CoinBalance, Config, ErrorKind, ManualClock, Portfolio, Price,
    SimulatedExchange, Strategy, StrategyKind, SymbolType,
};
use trada_server::TradaServer;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 5, 5, 0, 0, 0).unwrap()
}

fn sym(s: &str) -> SymbolType {
    SymbolType::from(s)
}

/// Test that a midpoint query interpolates between two observations.
#[test]
fn test_archive_interpolates_between_days() {
    let archive = Archive::new(Arc::new(ManualClock::new(t0())));
    archive.add_price(Price::new("BTC", "USDT", 10000.0, t0(), "test")).unwrap();
    archive
        .add_price(Price::new("BTC", "USDT", 20000.0, t0() + Duration::hours(24), "test"))
        .unwrap();

    let mid = archive
        .price_as(&sym("BTC"), &sym("USDT"), t0() + Duration::hours(12))
        .unwrap();
    assert_eq!(mid.value, 15000.0);
    assert_eq!(mid.at, t0() + Duration::hours(12));

    let before = archive
        .price_as(&sym("BTC"), &sym("USDT"), t0() - Duration::hours(1))
        .unwrap();
    assert_eq!(before.value, 10000.0);

    let identity = archive
        .price_as(&sym("DOGE"), &sym("DOGE"), t0() - Duration::days(300))
        .unwrap();
    assert_eq!(identity.value, 1.0);
}

/// Test triangulation through the bridge currency and its failure messages.
#[test]
fn test_archive_triangulation() {
    let archive = Archive::new(Arc::new(ManualClock::new(t0())));
    for (base, quote, value) in [("LTC", "BTC", 0.1), ("BTC", "ETH", 20.0), ("BTC", "USDT", 20000.0)] {
        archive.add_price(Price::new(base, quote, value, t0(), "test")).unwrap();
    }

    assert_eq!(archive.latest_price_as(&sym("LTC"), &sym("ETH")).unwrap().value, 2.0);
    assert_eq!(archive.latest_price_as(&sym("LTC"), &sym("USDT")).unwrap().value, 2000.0);

    let err = archive.latest_price_as(&sym("ETH"), &sym("LTC")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("no ETH/BTC prices"), "{}", err);

    let err = archive.latest_price_as(&sym("LTC"), &sym("GBP")).unwrap_err();
    assert!(err.to_string().contains("no BTC/GBP prices"), "{}", err);
}

/// Test that one provider batch creates one symbol per base asset.
#[tokio::test]
async fn test_update_prices_from_exchange() {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
    let exchange = Arc::new(SimulatedExchange::new(Arc::clone(&clock)));
    let archive = Archive::new(Arc::clone(&clock)).with_price_provider(exchange);

    assert_eq!(archive.status().update_count, 0);
    archive.update_prices().await.unwrap();

    let status = archive.status();
    assert_eq!(status.update_count, 1);
    assert_eq!(status.total_symbols, 3);
    assert_eq!(status.last_updated, Some(t0()));

    let symbols = archive.symbol_types();
    assert_eq!(
        symbols.keys().map(|s| s.as_str()).collect::<Vec<_>>(),
        vec!["BTC", "ETH", "LTC"]
    );
}

/// Test that clone then diff is all zeros and that clones are independent.
#[test]
fn test_portfolio_clone_and_diff() {
    let archive = Archive::new(Arc::new(ManualClock::new(t0())));
    archive.add_price(Price::new("ETH", "BTC", 0.08, t0(), "test")).unwrap();

    let mut original = Portfolio::live("LIVE");
    original.insert_balance(Balance::from_coin(
        CoinBalance::new("ETH", "mockexchange", 100.0, 20.0),
        "BTC",
        t0(),
    ));
    original.reprice(&archive).unwrap();

    let mut copy = original.clone_as("copy");
    let diff = copy.diff(&original).unwrap();
    let eth = diff.balance(&sym("ETH")).unwrap();
    assert_eq!(diff.name(), "copy[diff]");
    assert_eq!(eth.total, 0.0);
    assert_eq!(eth.price, 0.0);
    assert_eq!(eth.value, 0.0);
    assert_eq!(eth.exchange, "mockexchange");
    assert_eq!(eth.quote, sym("BTC"));

    copy.balance_mut(&sym("ETH")).unwrap().free = 1.0;
    assert_eq!(original.balance(&sym("ETH")).unwrap().free, 100.0);
}

/// Test the full simulation lifecycle through the server.
#[tokio::test]
async fn test_simulation_lifecycle() {
    let clock = Arc::new(ManualClock::new(t0() + Duration::days(1)));
    let server = TradaServer::simulated(Config::test_config(), clock);
    server.init().await.unwrap();

    let manager = server.simulations();
    let sim = manager.create("sim-1", "last day").await.unwrap();
    assert_eq!(manager.stop("sim-1").unwrap_err().kind(), ErrorKind::StateConflict);

    let strategy = manager
        .set_sell_strategy(
            "sim-1",
            &sym("LTC"),
            Strategy::new("ltc-up", "LTC", "BTC", 50.0, StrategyKind::price_above(0.01)).unwrap(),
        )
        .unwrap();

    let handle = sim.start(SimulationWindow::LastDay).await.unwrap();
    handle.await.unwrap();

    assert!(!sim.is_running());
    let started = sim.started_at().unwrap();
    let stopped = sim.stopped_at().unwrap();
    assert!(stopped >= started);
    assert!(stopped - started < Duration::hours(1));

    let status = sim.status().await;
    assert_eq!(status.samples, 289);
    assert!(status.last_error.is_none());
    assert_eq!(strategy.trigger_count(), 289);
    assert!(!strategy.is_running());

    let diff = sim.last_diff().unwrap();
    assert_eq!(diff.balance(&sym("LTC")).unwrap().value, 0.0);

    // Live portfolio is untouched by the run.
    let live = server.portfolio().await;
    let ltc = live.balance(&sym("LTC")).unwrap();
    assert_eq!(ltc.sell_strategy.as_ref().unwrap().id(), "base-sell");
    assert_eq!(ltc.sell_strategy.as_ref().unwrap().trigger_count(), 0);
}

/// Test that a snapshot directory written by one archive seeds another.
#[tokio::test]
async fn test_snapshot_round_trip_between_archives() {
    let dir = tempfile::tempdir().unwrap();
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
    let exchange = Arc::new(SimulatedExchange::new(Arc::clone(&clock)));

    let recorder = Archive::new(Arc::clone(&clock))
        .with_price_provider(exchange)
        .with_snapshot_dir(dir.path());
    recorder.update_prices().await.unwrap();

    let replayed = Archive::new(Arc::clone(&clock));
    let loaded = replayed.load_prices(dir.path()).unwrap();
    assert_eq!(loaded, 7);
    assert_eq!(
        replayed.latest_price_as(&sym("LTC"), &sym("USDT")).unwrap().value,
        180.0
    );
}
