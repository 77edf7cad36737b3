use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lookback depth of a single upstream request
///
/// The upstream API picks the candle width from the requested depth; nothing
/// here enforces it, the resolutions below are only a precondition callers
/// can rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LookbackWindow {
    /// Last `n` days (n >= 1)
    Days(u32),
    /// Whole available history
    Max,
}

impl LookbackWindow {
    /// Value of the `days` query parameter
    pub fn to_api_token(&self) -> String {
        match self {
            LookbackWindow::Days(n) => n.to_string(),
            LookbackWindow::Max => "max".to_string(),
        }
    }

    /// Parse from string (case-insensitive)
    ///
    /// Accepts "1", "30", "1d", "1 day", "30 days" and "max".
    pub fn from_str(s: &str) -> Result<Self, String> {
        let token = s.trim().to_lowercase();
        if token == "max" {
            return Ok(LookbackWindow::Max);
        }

        let digits = token
            .strip_suffix("days")
            .or_else(|| token.strip_suffix("day"))
            .or_else(|| token.strip_suffix('d'))
            .unwrap_or(&token)
            .trim();

        match digits.parse::<u32>() {
            Ok(n) if n >= 1 => Ok(LookbackWindow::Days(n)),
            _ => Err(format!(
                "Invalid lookback window: {}. Valid options: <days> (>= 1) or max",
                s
            )),
        }
    }

    /// Candle width the upstream OHLC endpoint serves for this depth
    pub fn ohlc_resolution(&self) -> Duration {
        match self {
            LookbackWindow::Days(1..=2) => Duration::from_secs(30 * 60),
            LookbackWindow::Days(3..=30) => Duration::from_secs(4 * 3600),
            _ => Duration::from_secs(4 * 86_400),
        }
    }

    /// Sample spacing the upstream market_chart endpoint serves for this depth
    pub fn volume_resolution(&self) -> Duration {
        match self {
            LookbackWindow::Days(1) => Duration::from_secs(5 * 60),
            LookbackWindow::Days(2..=90) => Duration::from_secs(3600),
            _ => Duration::from_secs(86_400),
        }
    }
}

impl fmt::Display for LookbackWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookbackWindow::Days(1) => write!(f, "1 day"),
            LookbackWindow::Days(n) => write!(f, "{} days", n),
            LookbackWindow::Max => write!(f, "max"),
        }
    }
}

impl TryFrom<String> for LookbackWindow {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        LookbackWindow::from_str(&value)
    }
}

impl From<LookbackWindow> for String {
    fn from(window: LookbackWindow) -> Self {
        window.to_api_token()
    }
}
