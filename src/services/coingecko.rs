//! CoinGecko API Client
//!
//! Fetches historical candles and traded volume for a single coin from the
//! public CoinGecko API (https://api.coingecko.com/api/v3).
//!
//! Two endpoints are used:
//! - `/coins/{id}/ohlc` returns `[[ts_ms, open, high, low, close], ...]`
//! - `/coins/{id}/market_chart` returns an object whose `total_volumes`
//!   member is `[[ts_ms, volume], ...]`
//!
//! Candle width depends on the requested window (see
//! [`LookbackWindow::ohlc_resolution`]). Requests are not retried.

use crate::constants::TOTAL_VOLUMES_KEY;
use crate::error::{AppError, Result};
use crate::models::{HttpConfig, LookbackWindow, PricePoint, VolumePoint};
use crate::services::market_source::MarketDataSource;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// CoinGecko HTTP client
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
}

impl CoinGeckoClient {
    /// Create a new client against `base_url` with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        Self::new(config.base_url.clone(), Duration::from_secs(config.timeout_secs))
    }

    pub fn ohlc_url(&self, asset_id: &str, currency: &str, window: LookbackWindow) -> String {
        format!(
            "{}/coins/{}/ohlc?vs_currency={}&days={}",
            self.base_url,
            asset_id,
            currency,
            window.to_api_token()
        )
    }

    pub fn market_chart_url(&self, asset_id: &str, currency: &str, window: LookbackWindow) -> String {
        format!(
            "{}/coins/{}/market_chart?vs_currency={}&days={}",
            self.base_url,
            asset_id,
            currency,
            window.to_api_token()
        )
    }

    /// GET `url` and return the body, failing on any non-success status
    async fn get_body(&self, url: &str) -> Result<String> {
        debug!("Fetching market data: {}", url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::RemoteFetch {
                status: status.as_u16(),
                endpoint: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn fetch_ohlc(
        &mut self,
        asset_id: &str,
        currency: &str,
        window: LookbackWindow,
    ) -> Result<Vec<PricePoint>> {
        let url = self.ohlc_url(asset_id, currency, window);
        let body = self.get_body(&url).await?;
        let points = parse_ohlc_payload(&body)?;

        info!(
            "Fetched {} OHLC candles for {}/{} ({})",
            points.len(),
            asset_id,
            currency,
            window
        );
        Ok(points)
    }

    async fn fetch_volume(
        &mut self,
        asset_id: &str,
        currency: &str,
        window: LookbackWindow,
    ) -> Result<Vec<VolumePoint>> {
        let url = self.market_chart_url(asset_id, currency, window);
        let body = self.get_body(&url).await?;
        let points = parse_volume_payload(&body)?;

        info!(
            "Fetched {} volume samples for {}/{} ({})",
            points.len(),
            asset_id,
            currency,
            window
        );
        Ok(points)
    }
}

/// Parse the `/ohlc` body: an array of `[ts_ms, open, high, low, close]`
pub fn parse_ohlc_payload(body: &str) -> Result<Vec<PricePoint>> {
    let value = parse_json(body)?;
    let rows = value
        .as_array()
        .ok_or_else(|| AppError::MalformedRecord("OHLC payload is not an array".to_string()))?;

    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            let fields = tuple_fields(row, 5, idx)?;
            Ok(PricePoint::new(
                timestamp_field(&fields[0], idx)?,
                number_field(&fields[1], idx, "open")?,
                number_field(&fields[2], idx, "high")?,
                number_field(&fields[3], idx, "low")?,
                number_field(&fields[4], idx, "close")?,
            ))
        })
        .collect()
}

/// Parse the `/market_chart` body, keeping only `total_volumes`
pub fn parse_volume_payload(body: &str) -> Result<Vec<VolumePoint>> {
    let value = parse_json(body)?;
    let rows = value
        .get(TOTAL_VOLUMES_KEY)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            AppError::MalformedRecord(format!("market_chart payload has no {} array", TOTAL_VOLUMES_KEY))
        })?;

    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            let fields = tuple_fields(row, 2, idx)?;
            Ok(VolumePoint::new(
                timestamp_field(&fields[0], idx)?,
                number_field(&fields[1], idx, "volume")?,
            ))
        })
        .collect()
}

fn parse_json(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        AppError::MalformedRecord(format!("invalid JSON ({}): {}", e, preview))
    })
}

fn tuple_fields(row: &Value, width: usize, idx: usize) -> Result<&Vec<Value>> {
    match row.as_array() {
        Some(fields) if fields.len() >= width => Ok(fields),
        _ => Err(AppError::MalformedRecord(format!(
            "record {}: expected array of {} values, got {}",
            idx, width, row
        ))),
    }
}

fn timestamp_field(value: &Value, idx: usize) -> Result<i64> {
    let ts = match value.as_i64() {
        Some(ts) => Some(ts),
        None => value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| f as i64),
    };

    match ts {
        Some(ts) if ts >= 0 => Ok(ts),
        _ => Err(AppError::MalformedRecord(format!(
            "record {}: invalid timestamp {}",
            idx, value
        ))),
    }
}

fn number_field(value: &Value, idx: usize, name: &str) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        AppError::MalformedRecord(format!("record {}: {} is not a number: {}", idx, name, value))
    })
}
