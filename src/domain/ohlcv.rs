//! Daily OHLCV bar with derived indicator fields.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub code: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub k: Option<f64>,
    pub d: Option<f64>,
    pub j: Option<f64>,
    pub bbi: Option<f64>,
    pub short_trend: Option<f64>,
}

impl OhlcvBar {
    /// A raw bar with no derived fields.
    pub fn new(
        code: &str,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            code: code.to_string(),
            date,
            open,
            high,
            low,
            close,
            volume,
            k: None,
            d: None,
            j: None,
            bbi: None,
            short_trend: None,
        }
    }

    /// All price and volume fields are finite numbers.
    pub fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }

    /// close / prev_close - 1
    pub fn daily_return(&self, prev_close: f64) -> Option<f64> {
        if prev_close == 0.0 || !prev_close.is_finite() {
            None
        } else {
            Some(self.close / prev_close - 1.0)
        }
    }
}

/// Parses `YYYY-MM-DD` or compact `YYYYMMDD` trade dates.
pub fn parse_trade_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .ok()
}
