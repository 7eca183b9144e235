//! Metrics sink that emits structured tracing events.

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::portfolio::Portfolio;
use crate::ports::MetricsSink;
use crate::types::Price;

/// Writes price and portfolio metrics to the `metrics` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMetricsSink;

impl LogMetricsSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetricsSink for LogMetricsSink {
    async fn save_price_metrics(&self, prices: &[Price]) -> Result<()> {
        for price in prices {
            info!(
                target: "metrics",
                measurement = "coin_price",
                symbol = %price.base,
                quote = %price.quote,
                price = price.value,
                exchange = %price.source,
                at = %price.at,
                "Price metric"
            );
        }
        Ok(())
    }

    async fn save_portfolio_metrics(&self, portfolio: &Portfolio) -> Result<()> {
        for balance in portfolio.balances().values() {
            info!(
                target: "metrics",
                measurement = "portfolio_balance",
                portfolio = portfolio.name(),
                is_live = portfolio.is_live(),
                symbol = %balance.symbol,
                quote = %balance.quote,
                total = balance.total,
                price = balance.price,
                value = balance.value,
                change_pct_24h = balance.change_pct_24h,
                "Balance metric"
            );
        }
        info!(
            target: "metrics",
            measurement = "portfolio_value",
            portfolio = portfolio.name(),
            value = portfolio.total_value(),
            "Portfolio metric"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_log_sink_accepts_batches() {
        let sink = LogMetricsSink::new();
        let prices = vec![Price::new("BTC", "USDT", 10000.0, Utc::now(), "mock")];

        assert!(sink.save_price_metrics(&prices).await.is_ok());
        assert!(sink.save_price_metrics(&[]).await.is_ok());
        assert!(sink
            .save_portfolio_metrics(&Portfolio::simulated("sim"))
            .await
            .is_ok());
    }
}
