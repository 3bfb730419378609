//! J-value oversold strategy.
//!
//! Qualifies a security when the latest J of its KDJ oscillator sits
//! strictly below `max_j_value`. Score falls linearly from 100 (J <= 0) to
//! 10 just under the threshold; at or above the threshold it is 0.

use crate::domain::error::ScreenerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::strategy::helpers::{
    MIN_SERIES_LEN, latest_bar, mean, quantile, sample_std, sorted_by_date, validate_series,
};
use crate::domain::strategy::{Strategy, StrategySettings};
use crate::domain::verdict::{Details, Verdict};
use std::fmt;

pub const NAME: &str = "j_value";
pub const DEFAULT_MAX_J: f64 = 13.0;
pub const DEFAULT_TREND_WINDOW: usize = 10;

/// Summary statistics of every J value in a series.
#[derive(Debug, Clone, PartialEq)]
pub struct JDistribution {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub below_threshold: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrendDirection::Up => "up",
            TrendDirection::Down => "down",
            TrendDirection::Flat => "flat",
        };
        f.write_str(s)
    }
}

/// Linear trend of J over the most recent bars.
#[derive(Debug, Clone, PartialEq)]
pub struct JTrend {
    pub slope: f64,
    pub direction: TrendDirection,
    /// (last - first) / first * 100, or 0 when the first J is 0.
    pub change_rate_pct: f64,
    pub mean: f64,
    pub std: f64,
    pub window: usize,
}

#[derive(Debug, Clone)]
pub struct JValueStrategy {
    settings: StrategySettings,
    max_j_value: f64,
}

impl Default for JValueStrategy {
    fn default() -> Self {
        Self {
            settings: StrategySettings::new(NAME),
            max_j_value: DEFAULT_MAX_J,
        }
    }
}

impl JValueStrategy {
    pub fn new(max_j_value: f64) -> Result<Self, ScreenerError> {
        let mut strategy = Self::default();
        strategy.set_max_j_value(max_j_value)?;
        Ok(strategy)
    }

    pub fn with_settings(mut self, settings: StrategySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn max_j_value(&self) -> f64 {
        self.max_j_value
    }

    pub fn set_max_j_value(&mut self, max_j_value: f64) -> Result<(), ScreenerError> {
        if !(max_j_value > 0.0 && max_j_value.is_finite()) {
            return Err(ScreenerError::invalid(
                &format!("strategy.{}", self.settings.name),
                "max_j_value",
                format!("must be a positive number, got {max_j_value}"),
            ));
        }
        self.max_j_value = max_j_value;
        Ok(())
    }

    pub fn score_for(&self, j: f64) -> f64 {
        if j <= 0.0 {
            100.0
        } else if j >= self.max_j_value {
            0.0
        } else {
            100.0 - j / self.max_j_value * 90.0
        }
    }

    pub fn confidence_for(&self, j: f64) -> f64 {
        if j <= self.max_j_value * 0.5 {
            0.9
        } else if j <= self.max_j_value * 0.8 {
            0.7
        } else {
            0.5
        }
    }

    pub fn j_distribution(&self, bars: &[OhlcvBar]) -> Option<JDistribution> {
        let mut values: Vec<f64> = bars.iter().filter_map(|b| b.j).filter(|j| j.is_finite()).collect();
        let m = mean(&values)?;
        let std = sample_std(&values);
        values.sort_by(f64::total_cmp);

        Some(JDistribution {
            mean: m,
            std,
            min: values[0],
            max: values[values.len() - 1],
            q25: quantile(&values, 0.25)?,
            q50: quantile(&values, 0.50)?,
            q75: quantile(&values, 0.75)?,
            below_threshold: values.iter().filter(|&&j| j < self.max_j_value).count(),
            total: values.len(),
        })
    }

    pub fn j_trend(&self, bars: &[OhlcvBar], window: usize) -> Option<JTrend> {
        if window == 0 || bars.len() < window {
            return None;
        }
        let sorted = sorted_by_date(bars);
        let recent: Vec<f64> = sorted[sorted.len() - window..]
            .iter()
            .filter_map(|b| b.j)
            .filter(|j| j.is_finite())
            .collect();
        if recent.len() < 3 {
            return None;
        }

        let m = mean(&recent)?;
        let x_mean = (recent.len() - 1) as f64 / 2.0;
        let (sxy, sxx) = recent
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(sxy, sxx), (i, &y)| {
                let dx = i as f64 - x_mean;
                (sxy + dx * (y - m), sxx + dx * dx)
            });
        let slope = sxy / sxx;

        let first = recent[0];
        let last = recent[recent.len() - 1];
        let change_rate_pct = if first != 0.0 {
            (last - first) / first * 100.0
        } else {
            0.0
        };

        Some(JTrend {
            slope,
            direction: if slope > 0.0 {
                TrendDirection::Up
            } else if slope < 0.0 {
                TrendDirection::Down
            } else {
                TrendDirection::Flat
            },
            change_rate_pct,
            mean: m,
            std: sample_std(&recent),
            window,
        })
    }
}

impl Strategy for JValueStrategy {
    fn default_name(&self) -> &'static str {
        NAME
    }

    fn analyze(&self, code: &str, name: &str, bars: &[OhlcvBar]) -> Result<Verdict, ScreenerError> {
        if let Err(e) = validate_series(code, bars, MIN_SERIES_LEN) {
            return Ok(self.failed(code, name, &e.to_string()));
        }
        let Some(latest) = latest_bar(bars) else {
            return Ok(self.failed(code, name, "no latest bar"));
        };
        let Some(j) = latest.j.filter(|j| j.is_finite()) else {
            return Ok(self.failed(code, name, "missing J value"));
        };

        let qualified = j < self.max_j_value;
        let reason = if qualified {
            format!("J {j:.2} below threshold {}, oversold", self.max_j_value)
        } else {
            format!("J {j:.2} not below threshold {}", self.max_j_value)
        };

        let mut details = Details::new();
        details.insert("j_value".into(), j.into());
        details.insert("max_j_value".into(), self.max_j_value.into());
        details.insert("j_percentile".into(), (j / self.max_j_value * 100.0).into());

        Ok(Verdict::new(
            code,
            name,
            self.name(),
            qualified,
            self.score_for(j),
            self.confidence_for(j),
        )?
        .with_details(details)
        .with_reason(reason)
        .with_quote(latest.close, latest.date))
    }

    fn settings(&self) -> &StrategySettings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut StrategySettings {
        &mut self.settings
    }

    fn params(&self) -> Details {
        let mut params = Details::new();
        params.insert("max_j_value".into(), self.max_j_value.into());
        params
    }
}
