use anyhow::Result;
use price_history::api::routes::parse_year;
use price_history::{
    generate_filename, get_prices, open_cache, save_to_csv, AppConfig, PriceFetcher,
};
use tracing_subscriber::EnvFilter;

/// Prints one year's merged BTC/JPY table and saves it as CSV.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = AppConfig::from_env();
    let year = parse_year(std::env::args().nth(1).as_deref(), config.default_year)?;

    let cache = open_cache(&config.cache_url).await?;
    let fetcher = PriceFetcher::new(config.fetch.clone(), cache)?;
    let rows = get_prices(&fetcher, year).await?;

    println!("{:<26} {:<6} {:>12} {:>9} {:>16} {:>9}", "Date", "Symbol", "Price(USD)", "USD/JPY", "Price(JPY)", "Diff%");
    println!("{}", "-".repeat(83));
    for r in &rows {
        println!(
            "{:<26} {:<6} {:>12.2} {:>9.2} {:>16.0} {:>+9.2}",
            r.date,
            r.symbol,
            r.price_usd,
            r.usd_jpy,
            r.price_jpy,
            r.price_diff_rate * 100.0,
        );
    }

    let filename = generate_filename(year);
    save_to_csv(&rows, &filename)?;
    println!("\n{} rows saved to: {}", rows.len(), filename);

    Ok(())
}
