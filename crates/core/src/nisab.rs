//! Gold-denominated nisab threshold with a cached external price feed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::CommerceConfig;
use crate::domain::catalog::ZakatKind;

#[derive(Debug, Error)]
pub enum GoldPriceError {
    #[error("gold price request failed: {0}")]
    Http(String),
    #[error("gold price response has no numeric value at `{0}`")]
    MissingValue(String),
    #[error("gold price must be positive, got {0}")]
    NotPositive(i64),
}

#[async_trait]
pub trait GoldPriceSource: Send + Sync {
    /// Current price of one gram of gold in rupiah.
    async fn price_per_gram(&self) -> Result<i64, GoldPriceError>;
}

/// Reads the price from a JSON document at a configurable pointer.
pub struct HttpGoldPriceFeed {
    client: reqwest::Client,
    url: String,
    pointer: String,
}

impl HttpGoldPriceFeed {
    pub fn new(client: reqwest::Client, url: impl Into<String>, pointer: impl Into<String>) -> Self {
        Self { client, url: url.into(), pointer: pointer.into() }
    }
}

#[async_trait]
impl GoldPriceSource for HttpGoldPriceFeed {
    async fn price_per_gram(&self) -> Result<i64, GoldPriceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| GoldPriceError::Http(error.to_string()))?;
        let body: serde_json::Value =
            response.json().await.map_err(|error| GoldPriceError::Http(error.to_string()))?;
        extract_price(&body, &self.pointer)
    }
}

fn extract_price(body: &serde_json::Value, pointer: &str) -> Result<i64, GoldPriceError> {
    let value = body.pointer(pointer).ok_or_else(|| GoldPriceError::MissingValue(pointer.into()))?;
    let price = match value {
        serde_json::Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float.round() as i64)),
        serde_json::Value::String(text) => text.replace(['.', ','], "").trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| GoldPriceError::MissingValue(pointer.into()))?;

    if price <= 0 {
        return Err(GoldPriceError::NotPositive(price));
    }
    Ok(price)
}

pub struct NisabCalculator {
    source: Option<Arc<dyn GoldPriceSource>>,
    nisab_gold_grams: Decimal,
    default_price_per_gram: i64,
    cache_ttl: Duration,
    cache: Mutex<Option<(i64, Instant)>>,
}

impl NisabCalculator {
    pub fn new(
        source: Option<Arc<dyn GoldPriceSource>>,
        nisab_gold_grams: Decimal,
        default_price_per_gram: i64,
        cache_ttl: Duration,
    ) -> Self {
        Self { source, nisab_gold_grams, default_price_per_gram, cache_ttl, cache: Mutex::new(None) }
    }

    pub fn from_config(config: &CommerceConfig, source: Option<Arc<dyn GoldPriceSource>>) -> Self {
        Self::new(
            source,
            config.nisab_gold_grams,
            config.default_gold_price_per_gram,
            Duration::from_secs(config.gold_price_cache_secs),
        )
    }

    /// Calculator that never leaves the process, priced at `price_per_gram`.
    pub fn fixed(nisab_gold_grams: Decimal, price_per_gram: i64) -> Self {
        Self::new(None, nisab_gold_grams, price_per_gram, Duration::from_secs(3_600))
    }

    pub async fn gold_price_per_gram(&self) -> i64 {
        self.gold_price_per_gram_at(Instant::now()).await
    }

    pub async fn gold_price_per_gram_at(&self, now: Instant) -> i64 {
        let Some(source) = &self.source else {
            return self.default_price_per_gram;
        };

        let mut cache = self.cache.lock().await;
        if let Some((price, fetched_at)) = *cache {
            if now.saturating_duration_since(fetched_at) < self.cache_ttl {
                return price;
            }
        }

        match source.price_per_gram().await {
            Ok(price) => {
                debug!(event_name = "nisab.gold_price.refreshed", price, "gold price refreshed");
                *cache = Some((price, now));
                price
            }
            Err(error) => {
                warn!(
                    event_name = "nisab.gold_price.fallback",
                    error = %error,
                    fallback = self.default_price_per_gram,
                    "gold price feed failed, using stored default"
                );
                cache.map(|(price, _)| price).unwrap_or(self.default_price_per_gram)
            }
        }
    }

    pub async fn annual_threshold(&self) -> i64 {
        self.annual_threshold_at(Instant::now()).await
    }

    pub async fn annual_threshold_at(&self, now: Instant) -> i64 {
        let price = Decimal::from(self.gold_price_per_gram_at(now).await);
        (self.nisab_gold_grams * price)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    /// Threshold the calculated wealth of `kind` is compared against; income
    /// kinds use one twelfth of the annual nisab.
    pub async fn threshold_for(&self, kind: ZakatKind) -> i64 {
        let annual = self.annual_threshold().await;
        if kind.is_monthly() {
            annual / 12
        } else {
            annual
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{extract_price, GoldPriceError, GoldPriceSource, NisabCalculator};
    use crate::domain::catalog::ZakatKind;

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl GoldPriceSource for CountingSource {
        async fn price_per_gram(&self) -> Result<i64, GoldPriceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(GoldPriceError::Http("connection refused".to_string()))
            } else {
                Ok(1_200_000)
            }
        }
    }

    fn calculator(source: Arc<CountingSource>) -> NisabCalculator {
        NisabCalculator::new(
            Some(source),
            Decimal::new(85, 0),
            1_000_000,
            Duration::from_secs(3_600),
        )
    }

    #[tokio::test]
    async fn feed_is_cached_for_the_ttl() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), fail: false });
        let nisab = calculator(source.clone());
        let start = Instant::now();

        assert_eq!(nisab.gold_price_per_gram_at(start).await, 1_200_000);
        assert_eq!(nisab.gold_price_per_gram_at(start + Duration::from_secs(60)).await, 1_200_000);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        nisab.gold_price_per_gram_at(start + Duration::from_secs(3_601)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_feed_falls_back_to_default() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), fail: true });
        let nisab = calculator(source);

        assert_eq!(nisab.gold_price_per_gram().await, 1_000_000);
        assert_eq!(nisab.annual_threshold().await, 85_000_000);
    }

    #[tokio::test]
    async fn income_kinds_use_monthly_threshold() {
        let nisab = NisabCalculator::fixed(Decimal::new(85, 0), 1_200_000);

        assert_eq!(nisab.threshold_for(ZakatKind::Maal).await, 102_000_000);
        assert_eq!(nisab.threshold_for(ZakatKind::Penghasilan).await, 8_500_000);
    }

    #[test]
    fn price_is_read_from_json_pointer() {
        let body = json!({ "data": { "buy": 1_350_500.4, "label": "1.351.000" } });

        assert_eq!(extract_price(&body, "/data/buy").ok(), Some(1_350_500));
        assert_eq!(extract_price(&body, "/data/label").ok(), Some(1_351_000));
        assert!(matches!(
            extract_price(&body, "/data/missing"),
            Err(GoldPriceError::MissingValue(_))
        ));
    }
}
