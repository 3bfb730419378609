//! Pluggable per-security evaluation strategies.
//!
//! A [`Strategy`] turns one security's bar series into a [`Verdict`].
//! Shared settings (name, weight, enabled flag, filter role) live in
//! [`StrategySettings`]; concrete strategies only supply the analysis.

pub mod helpers;
pub mod oversold;
pub mod volume_pattern;

pub use oversold::JValueStrategy;
pub use volume_pattern::VolumePatternStrategy;

use crate::domain::error::ScreenerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::verdict::{Details, Verdict};

/// Default minimum score a filter strategy's verdict must reach.
pub const DEFAULT_FILTER_THRESHOLD: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategySettings {
    pub name: String,
    pub weight: f64,
    pub enabled: bool,
    pub filter: bool,
    pub threshold: f64,
}

impl StrategySettings {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            weight: 1.0,
            enabled: true,
            filter: false,
            threshold: DEFAULT_FILTER_THRESHOLD,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Result<Self, ScreenerError> {
        check_weight(weight)?;
        self.weight = weight;
        Ok(self)
    }

    pub fn as_filter(mut self, threshold: f64) -> Self {
        self.filter = true;
        self.threshold = threshold;
        self
    }
}

fn check_weight(weight: f64) -> Result<(), ScreenerError> {
    if weight < 0.0 || weight.is_nan() {
        Err(ScreenerError::NegativeWeight(weight))
    } else {
        Ok(())
    }
}

pub trait Strategy: Send + Sync {
    /// Name used when the settings do not override it.
    fn default_name(&self) -> &'static str;

    /// Evaluates one security.
    ///
    /// Data problems (too few bars, missing J) come back as a disqualified
    /// `Ok` verdict. `Err` is reserved for unexpected failures; the registry
    /// turns [`ScreenerError::Evaluation`] into a disqualified verdict and
    /// propagates [`ScreenerError::InvalidVerdict`].
    fn analyze(&self, code: &str, name: &str, bars: &[OhlcvBar]) -> Result<Verdict, ScreenerError>;

    fn settings(&self) -> &StrategySettings;

    fn settings_mut(&mut self) -> &mut StrategySettings;

    /// Strategy-specific parameters, for display.
    fn params(&self) -> Details {
        Details::new()
    }

    fn name(&self) -> &str {
        &self.settings().name
    }

    fn weight(&self) -> f64 {
        self.settings().weight
    }

    fn is_enabled(&self) -> bool {
        self.settings().enabled
    }

    fn is_filter(&self) -> bool {
        self.settings().filter
    }

    fn threshold(&self) -> f64 {
        self.settings().threshold
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.settings_mut().enabled = enabled;
    }

    fn set_weight(&mut self, weight: f64) -> Result<(), ScreenerError> {
        check_weight(weight)?;
        self.settings_mut().weight = weight;
        Ok(())
    }

    /// Marks the strategy as a filter (or not). `None` keeps the current threshold.
    fn set_filter(&mut self, filter: bool, threshold: Option<f64>) {
        let settings = self.settings_mut();
        settings.filter = filter;
        if let Some(t) = threshold {
            settings.threshold = t;
        }
    }

    /// Non-filters always pass. A filter passes when its verdict qualifies
    /// and scores at least the threshold.
    fn passes_filter(&self, verdict: &Verdict) -> bool {
        !self.is_filter() || (verdict.is_qualified() && verdict.score() >= self.threshold())
    }

    fn failed(&self, code: &str, name: &str, reason: &str) -> Verdict {
        Verdict::failed(code, name, self.name(), reason)
    }
}
