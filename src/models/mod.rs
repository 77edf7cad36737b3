mod series;
mod window;
pub mod ingest_config;

pub use ingest_config::{DatabaseConfig, HttpConfig, IngestConfig, PacingPolicy, TimeBasis, WindowTable};
pub use series::{MergedRow, NormalizedPoint, Ohlc, PricePoint, SeriesPoint, VolumePoint};
pub use window::LookbackWindow;
