//! Security universe: code lists, market selection and series loading.
//!
//! Codes are Tushare-style `000001.SZ`; data files are keyed by the
//! 6-digit prefix.

use crate::domain::error::ScreenerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityInfo {
    pub ts_code: String,
    pub name: String,
    pub market: String,
    pub list_date: Option<NaiveDate>,
}

impl SecurityInfo {
    pub fn new(ts_code: &str, name: &str, market: &str) -> Self {
        Self {
            ts_code: ts_code.to_string(),
            name: name.to_string(),
            market: market.to_string(),
            list_date: None,
        }
    }

    pub fn short_code(&self) -> &str {
        short_code(&self.ts_code)
    }

    /// True for the full code (any case) or its 6-digit prefix.
    pub fn matches(&self, code: &str) -> bool {
        let code = code.trim();
        self.ts_code.eq_ignore_ascii_case(code) || self.short_code() == code
    }
}

/// `000001.SZ` -> `000001`; codes without an exchange suffix are returned as is.
pub fn short_code(code: &str) -> &str {
    code.split_once('.').map_or(code, |(head, _)| head)
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

impl From<UniverseError> for ScreenerError {
    fn from(err: UniverseError) -> Self {
        ScreenerError::invalid("analysis", "codes", err.to_string())
    }
}

pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

/// Securities matching `codes`, in the order of `codes`. Unknown codes are skipped.
pub fn select_by_codes(all: &[SecurityInfo], codes: &[String]) -> Vec<SecurityInfo> {
    codes
        .iter()
        .filter_map(|code| {
            let found = all.iter().find(|s| s.matches(code));
            if found.is_none() {
                warn!(code = %code, "code not in securities list, skipping");
            }
            found.cloned()
        })
        .collect()
}

/// Securities listed on any of `markets`; an empty list selects everything.
pub fn select_by_markets(all: &[SecurityInfo], markets: &[String]) -> Vec<SecurityInfo> {
    all.iter()
        .filter(|s| markets.is_empty() || markets.iter().any(|m| m == &s.market))
        .cloned()
        .collect()
}

/// One security with its full bar history.
#[derive(Debug, Clone)]
pub struct SecuritySeries {
    pub info: SecurityInfo,
    pub bars: Vec<OhlcvBar>,
}

#[derive(Debug, Clone)]
pub struct SkippedCode {
    pub code: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { bars: usize },
}

#[derive(Debug, Clone, Default)]
pub struct LoadedUniverse {
    pub series: Vec<SecuritySeries>,
    pub skipped: Vec<SkippedCode>,
}

impl LoadedUniverse {
    pub fn count(&self) -> usize {
        self.series.len()
    }
}

/// Loads every security's series, skipping those with no data or fewer
/// than `min_bars` bars.
///
/// Missing files and unreadable rows are skipped with a warning; only I/O
/// failures of the data source itself abort the load.
pub fn load_universe(
    data_port: &dyn DataPort,
    securities: Vec<SecurityInfo>,
    min_bars: usize,
) -> Result<LoadedUniverse, ScreenerError> {
    let mut loaded = LoadedUniverse::default();

    for info in securities {
        let bars = match data_port.load_series(&info.ts_code, None) {
            Ok(bars) => bars,
            Err(ScreenerError::Io(e)) => return Err(ScreenerError::Io(e)),
            Err(e) => {
                warn!(code = %info.ts_code, error = %e, "skipping security");
                loaded.skipped.push(SkippedCode {
                    code: info.ts_code.clone(),
                    reason: SkipReason::NoData,
                });
                continue;
            }
        };

        if bars.is_empty() {
            debug!(code = %info.ts_code, "skipping security with no bars");
            loaded.skipped.push(SkippedCode {
                code: info.ts_code.clone(),
                reason: SkipReason::NoData,
            });
            continue;
        }

        if bars.len() < min_bars {
            debug!(
                code = %info.ts_code,
                bars = bars.len(),
                minimum = min_bars,
                "skipping security with short history"
            );
            loaded.skipped.push(SkippedCode {
                code: info.ts_code.clone(),
                reason: SkipReason::InsufficientBars { bars: bars.len() },
            });
            continue;
        }

        loaded.series.push(SecuritySeries { info, bars });
    }

    if !loaded.skipped.is_empty() {
        info!(
            loaded = loaded.series.len(),
            skipped = loaded.skipped.len(),
            "universe loaded"
        );
    }
    Ok(loaded)
}
