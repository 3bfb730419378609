//! CSV data directory adapter.
//!
//! Layout: one securities list (`ts_code,name,market[,list_date]`) plus one
//! file per security, `<data_dir>/<6-digit code>.csv`, with header
//! `trade_date,open,high,low,close,vol` and optional `K,D,J,BBI` columns.

use crate::domain::error::ScreenerError;
use crate::domain::ohlcv::{OhlcvBar, parse_trade_date};
use crate::domain::universe::{SecurityInfo, short_code};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct SecurityRow {
    ts_code: String,
    name: String,
    market: String,
    #[serde(default)]
    list_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BarRow {
    trade_date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    vol: f64,
    #[serde(rename = "K", default)]
    k: Option<f64>,
    #[serde(rename = "D", default)]
    d: Option<f64>,
    #[serde(rename = "J", default)]
    j: Option<f64>,
    #[serde(rename = "BBI", default)]
    bbi: Option<f64>,
}

pub struct CsvDataAdapter {
    data_dir: PathBuf,
    securities_file: PathBuf,
}

impl CsvDataAdapter {
    pub fn new(data_dir: PathBuf, securities_file: PathBuf) -> Self {
        Self {
            data_dir,
            securities_file,
        }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", short_code(code)))
    }

    fn read(path: &Path) -> Result<String, ScreenerError> {
        fs::read_to_string(path).map_err(|e| ScreenerError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })
    }
}

impl DataPort for CsvDataAdapter {
    fn list_securities(&self) -> Result<Vec<SecurityInfo>, ScreenerError> {
        let content = Self::read(&self.securities_file)?;
        let mut rdr = csv::Reader::from_reader(content.as_bytes());

        rdr.deserialize::<SecurityRow>()
            .map(|row| {
                let row = row.map_err(|e| ScreenerError::DataSource {
                    reason: format!("securities list parse error: {}", e),
                })?;
                Ok(SecurityInfo {
                    list_date: row.list_date.as_deref().and_then(parse_trade_date),
                    ts_code: row.ts_code.trim().to_uppercase(),
                    name: row.name.trim().to_string(),
                    market: row.market.trim().to_string(),
                })
            })
            .collect()
    }

    fn load_series(&self, code: &str, end_date: Option<NaiveDate>) -> Result<Vec<OhlcvBar>, ScreenerError> {
        let path = self.csv_path(code);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ScreenerError::NoData {
                    code: code.to_string(),
                });
            }
            Err(e) => {
                return Err(ScreenerError::DataSource {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.deserialize::<BarRow>() {
            let row = result.map_err(|e| ScreenerError::DataSource {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let date = parse_trade_date(&row.trade_date).ok_or_else(|| ScreenerError::DataSource {
                reason: format!("{}: invalid trade_date '{}'", path.display(), row.trade_date),
            })?;

            if end_date.is_some_and(|end| date > end) {
                continue;
            }

            let mut bar = OhlcvBar::new(code, date, row.open, row.high, row.low, row.close, row.vol);
            bar.k = row.k;
            bar.d = row.d;
            bar.j = row.j;
            bar.bbi = row.bbi;
            bars.push(bar);
        }

        if bars.is_empty() {
            return Err(ScreenerError::NoData {
                code: code.to_string(),
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}
