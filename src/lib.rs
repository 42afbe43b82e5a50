pub mod api;
pub mod cache;
pub mod calendar;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod model;
pub mod pipeline;

pub use cache::{open_cache, MemoryCache, PriceCache, SqliteCache};
pub use calendar::YearCalendar;
pub use config::AppConfig;
pub use error::{PriceError, Result};
pub use export::{generate_filename, save_to_csv};
pub use fetch::{FetchConfig, PriceFetcher};
pub use model::{FxRecord, MergedRow, PriceRecord};
pub use pipeline::{get_prices, merge_series};
