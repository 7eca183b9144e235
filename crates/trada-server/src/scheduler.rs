//! Background loops driving price updates, portfolio repricing and daily
//! summaries.

use chrono::{DateTime, Days, NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::server::TradaServer;

const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Handle to the running update loops.
pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn the periodic update loop (every `frequency`) and the daily
    /// summary loop (now, then at every UTC midnight).
    pub fn start(server: Arc<TradaServer>, frequency: Duration) -> Self {
        let (shutdown, rx) = watch::channel(false);

        let tick = tokio::spawn(run_updates(Arc::clone(&server), frequency, rx.clone()));
        let daily = tokio::spawn(run_daily(server, rx));

        info!(frequency_secs = frequency.as_secs_f64(), "Scheduler started");
        Self {
            shutdown,
            handles: vec![tick, daily],
        }
    }

    /// Signal both loops and wait for them to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Scheduler task failed");
            }
        }
        info!("Scheduler stopped");
    }
}

async fn run_updates(
    server: Arc<TradaServer>,
    frequency: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + frequency, frequency);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                update_cycle(&server).await;
            }
            _ = shutdown.changed() => {
                debug!("Update loop shutting down");
                break;
            }
        }
    }
}

/// One scheduled cycle. A failed step is reported and the rest still run.
pub async fn update_cycle(server: &TradaServer) {
    if let Err(e) = server.archive().update_prices().await {
        error!(error = %e, "Scheduled price update failed");
        server
            .status_log()
            .log(format!("ERROR: updating prices - {}", e));
    }
    if let Err(e) = server.update_portfolios().await {
        error!(error = %e, "Scheduled portfolio update failed");
        server
            .status_log()
            .log(format!("ERROR: updating portfolios - {}", e));
    }
    if let Err(e) = server.save_metrics().await {
        error!(error = %e, "Saving metrics failed");
        server
            .status_log()
            .log(format!("ERROR: saving metrics - {}", e));
    }
}

async fn run_daily(server: Arc<TradaServer>, mut shutdown: watch::Receiver<bool>) {
    daily_update(&server).await;

    let first = until_next_midnight(server.clock().now());
    let mut ticker = interval_at(Instant::now() + first, ONE_DAY);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                daily_update(&server).await;
            }
            _ = shutdown.changed() => {
                debug!("Daily loop shutting down");
                break;
            }
        }
    }
}

/// Refresh prices, then day summaries. Summaries are skipped when the
/// price update fails.
pub async fn daily_update(server: &TradaServer) {
    if let Err(e) = server.archive().update_prices().await {
        error!(error = %e, "Daily price update failed");
        server
            .status_log()
            .log(format!("ERROR: updating prices - {}", e));
        return;
    }
    match server.archive().update_day_summaries().await {
        Ok(count) => debug!(summaries = count, "Day summaries updated"),
        Err(e) => {
            error!(error = %e, "Day summary update failed");
            server
                .status_log()
                .log(format!("ERROR: updating day summaries - {}", e));
        }
    }
}

/// Time left until the next UTC midnight strictly after `now`.
pub fn until_next_midnight(now: DateTime<Utc>) -> Duration {
    let next = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .map(|day| day.and_time(NaiveTime::MIN).and_utc());
    match next {
        Some(next) => (next - now).to_std().unwrap_or(ONE_DAY),
        None => ONE_DAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use trada_core::{Config, ManualClock, SymbolType, SystemClock};

    #[test]
    fn test_until_next_midnight() {
        let now = Utc.with_ymd_and_hms(2018, 5, 5, 18, 30, 0).unwrap();
        assert_eq!(until_next_midnight(now), Duration::from_secs(5 * 3600 + 1800));

        let midnight = Utc.with_ymd_and_hms(2018, 5, 5, 0, 0, 0).unwrap();
        assert_eq!(until_next_midnight(midnight), ONE_DAY);
    }

    #[tokio::test]
    async fn test_daily_update_loads_summaries() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2018, 5, 5, 12, 0, 0).unwrap(),
        ));
        let server = TradaServer::simulated(Config::test_config(), clock);

        daily_update(&server).await;

        let summary = server
            .archive()
            .day_summary_as(&SymbolType::from("BTC"), &SymbolType::from("USDT"))
            .unwrap();
        assert_eq!(summary.close, 10000.0);
        assert_eq!(server.status().archive.update_count, 1);
    }

    #[tokio::test]
    async fn test_scheduler_runs_until_stopped() {
        let server = Arc::new(TradaServer::simulated(
            Config::test_config(),
            Arc::new(SystemClock),
        ));
        server.init().await.unwrap();

        let scheduler = Scheduler::start(Arc::clone(&server), Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(220)).await;
        scheduler.stop().await;

        let count = server.status().archive.update_count;
        assert!(count >= 3, "expected init, daily and tick updates, got {}", count);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(server.status().archive.update_count, count);
    }
}
