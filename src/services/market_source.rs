use crate::error::Result;
use crate::models::{LookbackWindow, PricePoint, VolumePoint};
use async_trait::async_trait;

/// Supplier of raw OHLC and volume series for one asset
///
/// One call is one upstream request; implementations neither retry nor pace.
#[async_trait]
pub trait MarketDataSource: Send {
    async fn fetch_ohlc(
        &mut self,
        asset_id: &str,
        currency: &str,
        window: LookbackWindow,
    ) -> Result<Vec<PricePoint>>;

    async fn fetch_volume(
        &mut self,
        asset_id: &str,
        currency: &str,
        window: LookbackWindow,
    ) -> Result<Vec<VolumePoint>>;
}
