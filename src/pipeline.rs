//! Joins the BTC and USD/JPY series by date and derives the yen columns.

use chrono::{DateTime, FixedOffset};
use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::fetch::PriceFetcher;
use crate::model::{FxRecord, MergedRow, PriceRecord};

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%z";

#[derive(Debug)]
struct JoinedRow {
    date: DateTime<FixedOffset>,
    price: Option<(f64, String)>,
    usd_jpy: Option<f64>,
}

/// Fetches both series for `year` concurrently and merges them.
pub async fn get_prices(fetcher: &PriceFetcher, year: i32) -> Result<Vec<MergedRow>> {
    let (prices, rates) = futures::try_join!(
        fetcher.get_btc_prices(year),
        fetcher.get_usd_jpy_prices(year)
    )?;

    let rows = merge_series(&prices, &rates);
    tracing::debug!(
        "Merged {} BTC prices and {} USD/JPY rates into {} rows for {}",
        prices.len(),
        rates.len(),
        rows.len(),
        year
    );
    Ok(rows)
}

pub fn merge_series(prices: &[PriceRecord], rates: &[FxRecord]) -> Vec<MergedRow> {
    let mut rows = outer_join(prices, rates);
    rows.sort_by_key(|row| row.date);

    let mut usd_jpy: Vec<Option<f64>> = rows.iter().map(|row| row.usd_jpy).collect();
    fill_gaps(&mut usd_jpy);

    let mut prev_jpy: Option<f64> = None;
    rows.into_iter()
        .zip(usd_jpy)
        .filter_map(|(row, usd_jpy)| {
            let (price_usd, symbol) = row.price?;
            let usd_jpy = usd_jpy.unwrap_or(f64::NAN);
            let price_jpy = price_usd * usd_jpy;
            let price_diff_rate = match prev_jpy {
                Some(prev) => (price_jpy - prev) / prev,
                None => f64::NAN,
            };
            prev_jpy = Some(price_jpy);

            Some(MergedRow {
                date: row.date.format(DATE_FORMAT).to_string(),
                symbol,
                price_usd: finite_or_zero(price_usd),
                usd_jpy: finite_or_zero(usd_jpy),
                price_jpy: finite_or_zero(price_jpy),
                price_diff_rate: finite_or_zero(price_diff_rate),
            })
        })
        .collect()
}

/// One row per price record, plus one per FX-only date. A repeated FX date keeps its first rate.
fn outer_join(prices: &[PriceRecord], rates: &[FxRecord]) -> Vec<JoinedRow> {
    let mut rate_by_date: HashMap<DateTime<FixedOffset>, f64> = HashMap::new();
    for rate in rates {
        rate_by_date.entry(rate.date).or_insert(rate.usd_jpy);
    }

    let mut rows: Vec<JoinedRow> = prices
        .iter()
        .map(|p| JoinedRow {
            date: p.date,
            price: Some((p.price_usd, p.symbol.clone())),
            usd_jpy: rate_by_date.get(&p.date).copied(),
        })
        .collect();

    let price_dates: HashSet<DateTime<FixedOffset>> = prices.iter().map(|p| p.date).collect();
    let mut seen = HashSet::new();
    for rate in rates {
        if !price_dates.contains(&rate.date) && seen.insert(rate.date) {
            rows.push(JoinedRow {
                date: rate.date,
                price: None,
                usd_jpy: Some(rate.usd_jpy),
            });
        }
    }
    rows
}

/// Forward-fills gaps, then backward-fills any leading gap.
pub fn fill_gaps(values: &mut [Option<f64>]) {
    let mut last = None;
    for value in values.iter_mut() {
        match value {
            Some(v) => last = Some(*v),
            None => *value = last,
        }
    }

    let mut next = None;
    for value in values.iter_mut().rev() {
        match value {
            Some(v) => next = Some(*v),
            None => *value = next,
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn day(y: i32, m: u32, d: u32) -> DateTime<FixedOffset> {
        let naive = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .from_local_datetime(&naive)
            .unwrap()
    }

    fn btc(date: DateTime<FixedOffset>, price: f64) -> PriceRecord {
        PriceRecord::btc(date, price)
    }

    fn fx(date: DateTime<FixedOffset>, rate: f64) -> FxRecord {
        FxRecord { date, usd_jpy: rate }
    }

    #[test]
    fn forward_fills_missing_rate() {
        let rows = merge_series(
            &[btc(day(2018, 1, 1), 100.0), btc(day(2018, 1, 3), 102.0)],
            &[fx(day(2018, 1, 1), 110.0)],
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "2018-01-01 00:00:00+0900");
        assert_eq!(rows[0].symbol, "BTC");
        assert_eq!(rows[0].usd_jpy, 110.0);
        assert_eq!(rows[0].price_jpy, 11000.0);
        assert_eq!(rows[0].price_diff_rate, 0.0);

        assert_eq!(rows[1].date, "2018-01-03 00:00:00+0900");
        assert_eq!(rows[1].usd_jpy, 110.0);
        assert_eq!(rows[1].price_jpy, 11220.0);
        assert!((rows[1].price_diff_rate - 0.02).abs() < 1e-12);
    }

    #[test]
    fn backward_fills_leading_gap() {
        let rows = merge_series(
            &[btc(day(2018, 1, 1), 100.0), btc(day(2018, 1, 2), 101.0)],
            &[fx(day(2018, 1, 2), 120.0)],
        );

        assert_eq!(rows[0].usd_jpy, 120.0);
        assert_eq!(rows[0].price_jpy, 12000.0);
        assert_eq!(rows[1].usd_jpy, 120.0);
    }

    #[test]
    fn rows_sorted_and_fx_only_dates_dropped() {
        let rows = merge_series(
            &[btc(day(2018, 1, 5), 105.0), btc(day(2018, 1, 2), 102.0)],
            &[fx(day(2018, 1, 4), 113.0), fx(day(2018, 1, 1), 111.0)],
        );

        let dates: Vec<&str> = rows.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(
            dates,
            vec!["2018-01-02 00:00:00+0900", "2018-01-05 00:00:00+0900"]
        );
        // Jan 2 takes Jan 1's rate, Jan 5 takes Jan 4's.
        assert_eq!(rows[0].usd_jpy, 111.0);
        assert_eq!(rows[1].usd_jpy, 113.0);
    }

    #[test]
    fn price_jpy_is_exact_product() {
        let prices = [
            btc(day(2018, 1, 1), 13444.88),
            btc(day(2018, 1, 2), 14754.13),
            btc(day(2018, 1, 3), 15156.62),
        ];
        let rates = [fx(day(2018, 1, 2), 112.18), fx(day(2018, 1, 3), 112.7)];

        for row in merge_series(&prices, &rates) {
            assert_eq!(row.price_jpy, row.price_usd * row.usd_jpy);
        }
    }

    #[test]
    fn same_date_in_both_series_shares_one_row() {
        let rows = merge_series(
            &[btc(day(2018, 1, 1), 100.0)],
            &[fx(day(2018, 1, 1), 110.0), fx(day(2018, 1, 1), 999.0)],
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].usd_jpy, 110.0);
    }

    #[test]
    fn zero_previous_price_gives_zero_rate() {
        let rows = merge_series(
            &[btc(day(2018, 1, 1), 0.0), btc(day(2018, 1, 2), 100.0)],
            &[fx(day(2018, 1, 1), 110.0)],
        );

        assert_eq!(rows[1].price_jpy, 11000.0);
        assert_eq!(rows[1].price_diff_rate, 0.0);
    }

    #[test]
    fn empty_rate_series_coerces_to_zero() {
        let rows = merge_series(&[btc(day(2018, 1, 1), 100.0), btc(day(2018, 1, 2), 101.0)], &[]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].price_usd, 101.0);
        for row in &rows {
            assert_eq!(row.usd_jpy, 0.0);
            assert_eq!(row.price_jpy, 0.0);
            assert_eq!(row.price_diff_rate, 0.0);
        }
    }

    #[test]
    fn empty_inputs_give_empty_output() {
        assert!(merge_series(&[], &[]).is_empty());
        assert!(merge_series(&[], &[fx(day(2018, 1, 1), 110.0)]).is_empty());
    }

    #[test]
    fn fill_gaps_forward_then_backward() {
        let mut values = vec![None, None, Some(1.0), None, Some(3.0), None];
        fill_gaps(&mut values);
        assert_eq!(
            values,
            vec![Some(1.0), Some(1.0), Some(1.0), Some(1.0), Some(3.0), Some(3.0)]
        );

        let mut empty: Vec<Option<f64>> = vec![None, None];
        fill_gaps(&mut empty);
        assert_eq!(empty, vec![None, None]);
    }

    #[test]
    fn json_columns_in_fixed_order() {
        let rows = merge_series(&[btc(day(2018, 1, 1), 100.0)], &[fx(day(2018, 1, 1), 110.0)]);
        let json = serde_json::to_string(&rows).unwrap();

        assert_eq!(
            json,
            r#"[{"date":"2018-01-01 00:00:00+0900","symbol":"BTC","price_usd":100.0,"usd_jpy":110.0,"price_jpy":11000.0,"price_diff_rate":0.0}]"#
        );
    }
}
