//! Volume/price divergence strategy.
//!
//! Looks for heavy volume on up days and light volume on down days over the
//! trailing `days` bars. Each bar's volume ratio is its volume over the
//! 5-day mean volume ending on that bar; five extra look-back bars seed the
//! first ratios and returns.

use crate::domain::error::ScreenerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::strategy::helpers::{mean, sorted_by_date, validate_series};
use crate::domain::strategy::{Strategy, StrategySettings};
use crate::domain::verdict::{Details, Verdict};

pub const NAME: &str = "volume_pattern";
pub const DEFAULT_DAYS: usize = 20;
pub const DEFAULT_MIN_PRICE_CHANGE: f64 = 0.01;
pub const DEFAULT_MIN_VOLUME_CONTRAST: f64 = 1.2;

const LOOKBACK: usize = 5;
const VOLUME_MA_WINDOW: usize = 5;
const RECENT_WINDOW: usize = 5;
const MIN_SAMPLES: usize = 3;

/// Intermediate result of the up/down day classification.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeAnalysis {
    pub up_days: usize,
    pub down_days: usize,
    pub avg_ratio_up: f64,
    pub avg_ratio_down: f64,
    /// avg_ratio_up / avg_ratio_down, 0 when the down average is 0.
    pub contrast: f64,
    pub recent_return_pct: f64,
    pub j_value: f64,
    pub contrast_ok: bool,
    pub up_volume_ok: bool,
    pub down_volume_ok: bool,
}

impl VolumeAnalysis {
    pub fn is_qualified(&self) -> bool {
        self.contrast_ok && self.up_volume_ok && self.down_volume_ok
    }

    fn conditions_met(&self) -> usize {
        [self.contrast_ok, self.up_volume_ok, self.down_volume_ok]
            .iter()
            .filter(|&&c| c)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct VolumePatternStrategy {
    settings: StrategySettings,
    days: usize,
    min_price_change: f64,
    min_volume_contrast: f64,
}

impl Default for VolumePatternStrategy {
    fn default() -> Self {
        Self {
            settings: StrategySettings::new(NAME),
            days: DEFAULT_DAYS,
            min_price_change: DEFAULT_MIN_PRICE_CHANGE,
            min_volume_contrast: DEFAULT_MIN_VOLUME_CONTRAST,
        }
    }
}

impl VolumePatternStrategy {
    pub fn new(days: usize, min_price_change: f64, min_volume_contrast: f64) -> Result<Self, ScreenerError> {
        let mut strategy = Self::default();
        strategy.set_params(days, min_price_change, min_volume_contrast)?;
        Ok(strategy)
    }

    pub fn with_settings(mut self, settings: StrategySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn set_params(
        &mut self,
        days: usize,
        min_price_change: f64,
        min_volume_contrast: f64,
    ) -> Result<(), ScreenerError> {
        let section = format!("strategy.{}", self.settings.name);
        if days < RECENT_WINDOW {
            return Err(ScreenerError::invalid(
                &section,
                "days",
                format!("must be at least {RECENT_WINDOW}, got {days}"),
            ));
        }
        if !(min_price_change >= 0.0 && min_price_change.is_finite()) {
            return Err(ScreenerError::invalid(
                &section,
                "min_price_change",
                format!("must be non-negative, got {min_price_change}"),
            ));
        }
        if !(min_volume_contrast > 0.0 && min_volume_contrast.is_finite()) {
            return Err(ScreenerError::invalid(
                &section,
                "min_volume_contrast",
                format!("must be positive, got {min_volume_contrast}"),
            ));
        }
        self.days = days;
        self.min_price_change = min_price_change;
        self.min_volume_contrast = min_volume_contrast;
        Ok(())
    }

    pub fn days(&self) -> usize {
        self.days
    }

    pub fn min_price_change(&self) -> f64 {
        self.min_price_change
    }

    pub fn min_volume_contrast(&self) -> f64 {
        self.min_volume_contrast
    }

    /// Bars needed before a series is analysed at all.
    pub fn required_length(&self) -> usize {
        self.days + LOOKBACK
    }

    /// Classifies the trailing `days` bars of an ascending series.
    ///
    /// Returns `None` when the series is too short or there are fewer than
    /// three up days or three down days.
    pub fn analyze_pattern(&self, bars: &[OhlcvBar]) -> Option<VolumeAnalysis> {
        let window = bars.get(bars.len().checked_sub(self.required_length())?..)?;

        let mut up_ratios = Vec::new();
        let mut down_ratios = Vec::new();
        for i in LOOKBACK..window.len() {
            let Some(ret) = window[i].daily_return(window[i - 1].close) else {
                continue;
            };
            let volumes: Vec<f64> = window[i + 1 - VOLUME_MA_WINDOW..=i]
                .iter()
                .map(|b| b.volume)
                .collect();
            let Some(volume_ma) = mean(&volumes).filter(|m| *m > 0.0) else {
                continue;
            };
            let ratio = window[i].volume / volume_ma;
            if ret > self.min_price_change {
                up_ratios.push(ratio);
            } else if ret < -self.min_price_change {
                down_ratios.push(ratio);
            }
        }

        if up_ratios.len() < MIN_SAMPLES || down_ratios.len() < MIN_SAMPLES {
            return None;
        }

        let avg_ratio_up = mean(&up_ratios)?;
        let avg_ratio_down = mean(&down_ratios)?;
        let contrast = if avg_ratio_down != 0.0 {
            avg_ratio_up / avg_ratio_down
        } else {
            0.0
        };

        let last = &window[window.len() - 1];
        let first_recent = &window[window.len() - RECENT_WINDOW];
        let recent_return_pct = if first_recent.close != 0.0 {
            (last.close / first_recent.close - 1.0) * 100.0
        } else {
            0.0
        };

        Some(VolumeAnalysis {
            up_days: up_ratios.len(),
            down_days: down_ratios.len(),
            avg_ratio_up,
            avg_ratio_down,
            contrast,
            recent_return_pct,
            j_value: last.j.unwrap_or(0.0),
            contrast_ok: contrast >= self.min_volume_contrast,
            up_volume_ok: avg_ratio_up >= 1.0,
            down_volume_ok: avg_ratio_down <= 1.0,
        })
    }

    pub fn score_for(&self, a: &VolumeAnalysis) -> f64 {
        if !a.is_qualified() {
            return 0.0;
        }

        let contrast_points = if a.contrast >= 2.0 {
            40.0
        } else if a.contrast >= 1.5 {
            30.0
        } else if a.contrast >= self.min_volume_contrast {
            20.0
        } else {
            0.0
        };
        let up_points = if a.avg_ratio_up >= 1.5 {
            30.0
        } else if a.avg_ratio_up >= 1.2 {
            20.0
        } else if a.avg_ratio_up >= 1.0 {
            10.0
        } else {
            0.0
        };
        let down_points = if a.avg_ratio_down <= 0.8 {
            20.0
        } else if a.avg_ratio_down <= 0.9 {
            15.0
        } else if a.avg_ratio_down <= 1.0 {
            10.0
        } else {
            0.0
        };
        let return_points = if a.recent_return_pct > 0.0 {
            a.recent_return_pct.min(10.0)
        } else {
            0.0
        };

        f64::min(100.0, contrast_points + up_points + down_points + return_points)
    }

    pub fn confidence_for(&self, a: &VolumeAnalysis) -> f64 {
        if !a.is_qualified() {
            return 0.1;
        }

        let samples = a.up_days + a.down_days;
        let mut confidence = 0.5;
        if samples >= 10 {
            confidence += 0.2;
        } else if samples >= 6 {
            confidence += 0.1;
        }
        if a.contrast >= 2.0 {
            confidence += 0.2;
        } else if a.contrast >= 1.5 {
            confidence += 0.1;
        }
        confidence += a.conditions_met() as f64 * 0.05;
        f64::min(1.0, confidence)
    }

    fn reason_for(&self, a: &VolumeAnalysis) -> String {
        if a.is_qualified() {
            return format!(
                "volume up on rallies, down on declines: contrast {:.1}, up ratio {:.1}, down ratio {:.1}",
                a.contrast, a.avg_ratio_up, a.avg_ratio_down
            );
        }
        let mut failures = Vec::new();
        if !a.contrast_ok {
            failures.push(format!(
                "volume contrast {:.1} below {}",
                a.contrast, self.min_volume_contrast
            ));
        }
        if !a.up_volume_ok {
            failures.push(format!("up-day volume ratio {:.1} not expanding", a.avg_ratio_up));
        }
        if !a.down_volume_ok {
            failures.push(format!(
                "down-day volume ratio {:.1} not contracting",
                a.avg_ratio_down
            ));
        }
        format!("not qualified: {}", failures.join(", "))
    }
}

impl Strategy for VolumePatternStrategy {
    fn default_name(&self) -> &'static str {
        NAME
    }

    fn analyze(&self, code: &str, name: &str, bars: &[OhlcvBar]) -> Result<Verdict, ScreenerError> {
        if let Err(e) = validate_series(code, bars, self.required_length()) {
            return Ok(self.failed(code, name, &e.to_string()));
        }
        let sorted = sorted_by_date(bars);
        let Some(analysis) = self.analyze_pattern(&sorted) else {
            return Ok(self.failed(
                code,
                name,
                &format!("fewer than {MIN_SAMPLES} up days or down days in the last {} bars", self.days),
            ));
        };
        let Some(latest) = sorted.last() else {
            return Ok(self.failed(code, name, "no latest bar"));
        };

        let mut details = Details::new();
        details.insert("up_days_count".into(), analysis.up_days.into());
        details.insert("down_days_count".into(), analysis.down_days.into());
        details.insert("avg_vol_ratio_up".into(), analysis.avg_ratio_up.into());
        details.insert("avg_vol_ratio_down".into(), analysis.avg_ratio_down.into());
        details.insert("volume_contrast".into(), analysis.contrast.into());
        details.insert("recent_return_5d".into(), analysis.recent_return_pct.into());
        details.insert("j_value".into(), analysis.j_value.into());
        details.insert("contrast_ok".into(), analysis.contrast_ok.into());
        details.insert("up_day_volume_ok".into(), analysis.up_volume_ok.into());
        details.insert("down_day_volume_ok".into(), analysis.down_volume_ok.into());

        Ok(Verdict::new(
            code,
            name,
            self.name(),
            analysis.is_qualified(),
            self.score_for(&analysis),
            self.confidence_for(&analysis),
        )?
        .with_details(details)
        .with_reason(self.reason_for(&analysis))
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
        params.insert("days".into(), self.days.into());
        params.insert("min_price_change".into(), self.min_price_change.into());
        params.insert("min_volume_contrast".into(), self.min_volume_contrast.into());
        params
    }
}
