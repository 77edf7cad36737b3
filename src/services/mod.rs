pub mod coingecko;
pub mod database;
pub mod ingestion;
pub mod market_source;
pub mod merger;
pub mod normalizer;
pub mod pacer;
pub mod writer;

pub use coingecko::CoinGeckoClient;
pub use database::SeriesDatabase;
pub use ingestion::{IngestReport, IngestionDriver, WindowOutcome};
pub use market_source::MarketDataSource;
pub use merger::merge;
pub use normalizer::{align_epoch_seconds, normalize};
pub use pacer::Pacer;
pub use writer::{filter_newer, IncrementalWriter};
