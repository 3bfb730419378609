#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use stockscreen::domain::error::ScreenerError;
pub use stockscreen::domain::ohlcv::OhlcvBar;
pub use stockscreen::domain::universe::SecurityInfo;
use stockscreen::ports::data_port::DataPort;

pub struct MockDataPort {
    pub securities: Vec<SecurityInfo>,
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            securities: Vec::new(),
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_security(mut self, code: &str, market: &str, bars: Vec<OhlcvBar>) -> Self {
        self.securities
            .push(SecurityInfo::new(code, &format!("Stock {}", &code[..6]), market));
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, market: &str, reason: &str) -> Self {
        self.securities
            .push(SecurityInfo::new(code, &format!("Stock {}", &code[..6]), market));
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn list_securities(&self) -> Result<Vec<SecurityInfo>, ScreenerError> {
        Ok(self.securities.clone())
    }

    fn load_series(&self, code: &str, end_date: Option<NaiveDate>) -> Result<Vec<OhlcvBar>, ScreenerError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(ScreenerError::DataSource {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(code).ok_or_else(|| ScreenerError::NoData {
            code: code.to_string(),
        })?;
        Ok(bars
            .iter()
            .filter(|b| end_date.is_none_or(|d| b.date <= d))
            .cloned()
            .collect())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn start_date() -> NaiveDate {
    date(2024, 1, 1)
}

pub fn make_bar(code: &str, day: usize, high: f64, low: f64, close: f64, volume: f64) -> OhlcvBar {
    OhlcvBar::new(
        code,
        start_date() + Duration::days(day as i64),
        close,
        high,
        low,
        close,
        volume,
    )
}

/// Close 10 inside a 9.5..10.5 range every day, so RSV stays at 50 and
/// J sits at 50.
pub fn flat_series(code: &str, days: usize) -> Vec<OhlcvBar> {
    (0..days)
        .map(|i| make_bar(code, i, 10.5, 9.5, 10.0, 1000.0))
        .collect()
}

/// Flat history followed by `tail` bars each closing 3% lower at the day's
/// low. Five or more such bars drive J below zero.
pub fn falling_series(code: &str, days: usize, tail: usize) -> Vec<OhlcvBar> {
    let mut bars = flat_series(code, days - tail);
    let mut close = 10.0;
    for i in days - tail..days {
        close *= 0.97;
        bars.push(make_bar(code, i, close * 1.02, close, close, 1000.0));
    }
    bars
}

/// Flat history followed by `tail` bars each closing 3% higher at the
/// day's high, pushing J above 100.
pub fn rising_series(code: &str, days: usize, tail: usize) -> Vec<OhlcvBar> {
    let mut bars = flat_series(code, days - tail);
    let mut close = 10.0;
    for i in days - tail..days {
        close *= 1.03;
        bars.push(make_bar(code, i, close, close * 0.98, close, 1000.0));
    }
    bars
}

/// Writes `bars` as a per-security CSV in the layout the CSV data adapter reads.
pub fn write_series_csv(dir: &Path, code: &str, bars: &[OhlcvBar]) {
    let mut out = String::from("trade_date,open,high,low,close,vol\n");
    for b in bars {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{}",
            b.date.format("%Y%m%d"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        );
    }
    fs::write(dir.join(format!("{}.csv", &code[..6])), out).unwrap();
}

pub fn write_securities_csv(path: &Path, rows: &[(&str, &str, &str)]) {
    let mut out = String::from("ts_code,name,market,list_date\n");
    for (code, name, market) in rows {
        let _ = writeln!(out, "{},{},{},20000101", code, name, market);
    }
    fs::write(path, out).unwrap();
}
