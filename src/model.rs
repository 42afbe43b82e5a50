use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub const BTC_SYMBOL: &str = "BTC";

/// Daily BTC closing price in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: DateTime<FixedOffset>,
    pub price_usd: f64,
    pub symbol: String,
}

impl PriceRecord {
    pub fn btc(date: DateTime<FixedOffset>, price_usd: f64) -> Self {
        Self {
            date,
            price_usd,
            symbol: BTC_SYMBOL.to_string(),
        }
    }
}

/// Daily USD/JPY rate; business days only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxRecord {
    pub date: DateTime<FixedOffset>,
    pub usd_jpy: f64,
}

/// Output column names, in serialization order.
pub const MERGED_COLUMNS: [&str; 6] = [
    "date",
    "symbol",
    "price_usd",
    "usd_jpy",
    "price_jpy",
    "price_diff_rate",
];

/// One output row. Field order is the JSON column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub date: String,
    pub symbol: String,
    pub price_usd: f64,
    pub usd_jpy: f64,
    pub price_jpy: f64,
    pub price_diff_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
