//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values
//!
//! [`compute_indicators`] runs every calculator over a series and writes the
//! results back into the bars' derived fields.

pub mod ema;
pub mod kdj;
pub mod sma;

use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Stochastic { k: f64, d: f64, j: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    DoubleEma(usize),
    Bbi([usize; 4]),
    Kdj(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub(crate) fn empty(indicator_type: IndicatorType) -> Self {
        Self {
            indicator_type,
            values: Vec::new(),
        }
    }

    /// Value at `index` if the point exists and is past warmup.
    pub fn simple_at(&self, index: usize) -> Option<f64> {
        match self.values.get(index) {
            Some(IndicatorPoint {
                valid: true,
                value: IndicatorValue::Simple(v),
                ..
            }) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(span) => write!(f, "EMA({})", span),
            IndicatorType::DoubleEma(span) => write!(f, "DEMA({})", span),
            IndicatorType::Bbi([a, b, c, d]) => write!(f, "BBI({},{},{},{})", a, b, c, d),
            IndicatorType::Kdj(period) => write!(f, "KDJ({})", period),
        }
    }
}

/// Window parameters for [`compute_indicators`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    pub kdj_period: usize,
    pub bbi_periods: [usize; 4],
    pub trend_span: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            kdj_period: kdj::DEFAULT_PERIOD,
            bbi_periods: sma::DEFAULT_BBI_PERIODS,
            trend_span: ema::DEFAULT_TREND_SPAN,
        }
    }
}

/// Returns a copy of `bars` with K/D/J, BBI and the short trend line filled in.
///
/// The output has the same length and order as the input. Any existing
/// derived values are overwritten, so running this twice gives the same
/// result. An empty series, or one with a non-finite price/volume, comes
/// back with no indicators at all.
pub fn compute_indicators(bars: &[OhlcvBar], params: &IndicatorParams) -> Vec<OhlcvBar> {
    let mut out: Vec<OhlcvBar> = bars.to_vec();
    if bars.is_empty() || !bars.iter().all(OhlcvBar::is_well_formed) {
        return out;
    }

    let kdj = kdj::calculate_kdj(bars, params.kdj_period);
    let bbi = sma::calculate_bbi(bars, params.bbi_periods);
    let trend = ema::calculate_double_ema(bars, params.trend_span);

    for (i, bar) in out.iter_mut().enumerate() {
        (bar.k, bar.d, bar.j) = match kdj.values.get(i) {
            Some(IndicatorPoint {
                valid: true,
                value: IndicatorValue::Stochastic { k, d, j },
                ..
            }) => (Some(*k), Some(*d), Some(*j)),
            _ => (None, None, None),
        };
        bar.bbi = bbi.simple_at(i);
        bar.short_trend = trend.simple_at(i);
    }

    out
}
