use chrono::{DateTime, NaiveDate};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::RequestBuilder;
use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::cache::{self, SharedCache};
use crate::calendar::{localize, YearCalendar};
use crate::error::{PriceError, Result};
use crate::model::{FxRecord, PriceRecord};

pub const CACHE_TTL: Duration = Duration::from_secs(60 * 60 * 3);

pub const DEFAULT_BTC_URL: &str = "https://poloniex.com/public";
pub const DEFAULT_FX_URL: &str = "https://www.quandl.com/api/v3/datasets/FRED/DEXJPUS/data.json";

const DAILY_PERIOD_SECS: u32 = 60 * 60 * 24;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub btc_url: String,
    pub fx_url: String,
    pub fx_api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            btc_url: DEFAULT_BTC_URL.to_string(),
            fx_url: DEFAULT_FX_URL.to_string(),
            fx_api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

pub fn btc_cache_key(year: i32) -> String {
    format!("prices:btc-usd:{}", year)
}

pub fn usd_jpy_cache_key(year: i32) -> String {
    format!("prices:usd-jpy:{}", year)
}

/// Fetches the two upstream series, writing through the shared cache.
pub struct PriceFetcher {
    client: reqwest::Client,
    cache: SharedCache,
    config: FetchConfig,
}

impl PriceFetcher {
    pub fn new(config: FetchConfig, cache: SharedCache) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("price_history/0.1"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .gzip(true)
            .build()
            .map_err(|e| PriceError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            cache,
            config,
        })
    }

    pub async fn get_btc_prices(&self, year: i32) -> Result<Vec<PriceRecord>> {
        let started = Instant::now();
        let key = btc_cache_key(year);

        // An empty cached series counts as a miss.
        let cached = cache::get_json::<Vec<PriceRecord>>(self.cache.as_ref(), &key).await;
        let records = match cached.filter(|records| !records.is_empty()) {
            Some(records) => {
                tracing::debug!("BTC prices for {} found in cache", year);
                records
            }
            None => {
                tracing::debug!("BTC prices for {} not cached, fetching from API", year);
                let cal = YearCalendar::new(year)?;
                let request = self.client.get(&self.config.btc_url).query(&[
                    ("command", "returnChartData".to_string()),
                    ("currencyPair", "USDT_BTC".to_string()),
                    ("start", cal.min_unixtime().to_string()),
                    ("end", cal.max_unixtime().to_string()),
                    ("period", DAILY_PERIOD_SECS.to_string()),
                ]);
                let body = fetch_text(request).await?;
                let records = parse_chart_data(&body)?;
                cache::set_json(self.cache.as_ref(), &key, &records, CACHE_TTL).await;
                records
            }
        };

        tracing::debug!(
            "get_btc_prices finished in {:.2} secs",
            started.elapsed().as_secs_f64()
        );
        Ok(records)
    }

    pub async fn get_usd_jpy_prices(&self, year: i32) -> Result<Vec<FxRecord>> {
        let started = Instant::now();
        let key = usd_jpy_cache_key(year);

        // An empty cached series counts as a miss.
        let cached = cache::get_json::<Vec<FxRecord>>(self.cache.as_ref(), &key).await;
        let records = match cached.filter(|records| !records.is_empty()) {
            Some(records) => {
                tracing::debug!("USD/JPY rates for {} found in cache", year);
                records
            }
            None => {
                let api_key = self
                    .config
                    .fx_api_key
                    .as_deref()
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| PriceError::Configuration("QUANDL_API_KEY is not set".to_string()))?;

                tracing::debug!("USD/JPY rates for {} not cached, fetching from API", year);
                let cal = YearCalendar::new(year)?;
                let request = self.client.get(&self.config.fx_url).query(&[
                    ("start_date", cal.start_dash().as_str()),
                    ("end_date", cal.end_dash().as_str()),
                    ("order", "asc"),
                    ("api_key", api_key),
                ]);
                let body = fetch_text(request).await?;
                let records = parse_dataset(&body)?;
                cache::set_json(self.cache.as_ref(), &key, &records, CACHE_TTL).await;
                records
            }
        };

        tracing::debug!(
            "get_usd_jpy_prices finished in {:.2} secs",
            started.elapsed().as_secs_f64()
        );
        Ok(records)
    }
}

async fn fetch_text(request: RequestBuilder) -> Result<String> {
    // Drop the URL from errors: the FX query string carries the API key.
    let body = request
        .send()
        .await
        .and_then(|res| res.error_for_status())
        .map_err(|e| PriceError::from(e.without_url()))?
        .text()
        .await
        .map_err(|e| PriceError::from(e.without_url()))?;
    Ok(body)
}

#[derive(Debug, Deserialize)]
struct ChartBucket {
    date: i64,
    close: f64,
}

/// Parses chart data buckets; each bucket's UTC wall-clock time is read as Tokyo local time.
pub fn parse_chart_data(body: &str) -> Result<Vec<PriceRecord>> {
    let buckets: Vec<ChartBucket> = serde_json::from_str(body)
        .map_err(|e| PriceError::RemoteFetch(format!("malformed chart data: {}", e)))?;

    buckets
        .into_iter()
        .map(|bucket| {
            let date = DateTime::from_timestamp(bucket.date, 0)
                .and_then(|utc| localize(utc.naive_utc()))
                .ok_or_else(|| {
                    PriceError::RemoteFetch(format!("bad bucket timestamp {}", bucket.date))
                })?;
            Ok(PriceRecord::btc(date, bucket.close))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct DatasetResponse {
    dataset_data: DatasetData,
}

#[derive(Debug, Deserialize)]
struct DatasetData {
    data: Vec<(String, Option<f64>)>,
}

/// Parses `[date, rate]` rows. Rows without a rate are skipped.
pub fn parse_dataset(body: &str) -> Result<Vec<FxRecord>> {
    let response: DatasetResponse = serde_json::from_str(body)
        .map_err(|e| PriceError::RemoteFetch(format!("malformed dataset: {}", e)))?;

    let mut out = Vec::with_capacity(response.dataset_data.data.len());
    for (day, rate) in response.dataset_data.data {
        let Some(usd_jpy) = rate else {
            continue;
        };
        let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(localize)
            .ok_or_else(|| PriceError::RemoteFetch(format!("bad dataset date {:?}", day)))?;
        out.push(FxRecord { date, usd_jpy });
    }
    Ok(out)
}
