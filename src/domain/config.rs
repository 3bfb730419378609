//! Typed screening configuration.
//!
//! [`ScreenConfig::from_port`] validates a [`ConfigPort`] and copies every
//! value into plain structs, so nothing downstream reads the port again.

use crate::domain::config_validation::{read_flag, read_parsed, require, validate_screen_config};
use crate::domain::error::ScreenerError;
use crate::domain::indicator::IndicatorParams;
use crate::domain::ohlcv::parse_trade_date;
use crate::domain::registry::StrategyRegistry;
use crate::domain::scoring::{AggregationMethod, ScoringEngine, SortKey};
use crate::domain::strategy::{
    oversold, volume_pattern, JValueStrategy, Strategy, StrategySettings, VolumePatternStrategy,
    DEFAULT_FILTER_THRESHOLD,
};
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const STRATEGY_SECTION_PREFIX: &str = "strategy.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    JValue,
    VolumePattern,
}

impl StrategyKind {
    /// Kind from an explicit `kind` key, else from the section's own name.
    pub fn resolve(kind: Option<&str>, section_name: &str) -> Option<Self> {
        kind.unwrap_or(section_name).parse().ok()
    }
}

impl FromStr for StrategyKind {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            oversold::NAME => Ok(Self::JValue),
            volume_pattern::NAME => Ok(Self::VolumePattern),
            other => Err(ScreenerError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::JValue => oversold::NAME,
            Self::VolumePattern => volume_pattern::NAME,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub data_dir: PathBuf,
    pub securities_file: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub markets: Vec<String>,
    pub codes: Option<Vec<String>>,
    pub min_data_length: usize,
    /// Bars dated after this are ignored.
    pub analysis_date: Option<NaiveDate>,
    pub j_value_threshold: f64,
    pub volume_analysis_days: usize,
    pub min_volume_contrast: f64,
    pub min_price_change: f64,
    pub kdj_period: usize,
    pub parallel: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            markets: vec!["Main".to_string(), "ChiNext".to_string()],
            codes: None,
            min_data_length: 30,
            analysis_date: None,
            j_value_threshold: oversold::DEFAULT_MAX_J,
            volume_analysis_days: volume_pattern::DEFAULT_DAYS,
            min_volume_contrast: volume_pattern::DEFAULT_MIN_VOLUME_CONTRAST,
            min_price_change: volume_pattern::DEFAULT_MIN_PRICE_CHANGE,
            kdj_period: IndicatorParams::default().kdj_period,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringSettings {
    pub method: AggregationMethod,
    pub sort_by: SortKey,
    pub min_qualified: usize,
    pub min_score: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            method: AggregationMethod::default(),
            sort_by: SortKey::default(),
            min_qualified: 1,
            min_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    pub max_display_count: usize,
    pub include_details: bool,
    pub log_level: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            max_display_count: 20,
            include_details: false,
            log_level: "info".to_string(),
        }
    }
}

/// One `[strategy.<name>]` section. Unset parameters fall back to the
/// `[analysis]` values.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySection {
    pub name: String,
    pub kind: StrategyKind,
    pub weight: f64,
    pub enabled: bool,
    pub filter: bool,
    pub threshold: f64,
    pub max_j_value: Option<f64>,
    pub days: Option<usize>,
    pub min_price_change: Option<f64>,
    pub min_volume_contrast: Option<f64>,
}

impl StrategySection {
    pub fn new(name: &str, kind: StrategyKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            weight: 1.0,
            enabled: true,
            filter: false,
            threshold: DEFAULT_FILTER_THRESHOLD,
            max_j_value: None,
            days: None,
            min_price_change: None,
            min_volume_contrast: None,
        }
    }

    fn from_port(config: &dyn ConfigPort, section: &str, name: &str) -> Result<Self, ScreenerError> {
        let kind = match config.get_string(section, "kind") {
            Some(kind) => kind.parse()?,
            None => name.parse()?,
        };
        let mut entry = Self::new(name, kind);
        entry.weight = read_parsed(config, section, "weight")?.unwrap_or(entry.weight);
        entry.enabled = read_flag(config, section, "enabled")?.unwrap_or(true);
        entry.filter = read_flag(config, section, "filter")?.unwrap_or(false);
        entry.threshold = read_parsed(config, section, "threshold")?.unwrap_or(entry.threshold);
        entry.max_j_value = read_parsed(config, section, "max_j_value")?;
        entry.days = read_parsed(config, section, "days")?;
        entry.min_price_change = read_parsed(config, section, "min_price_change")?;
        entry.min_volume_contrast = read_parsed(config, section, "min_volume_contrast")?;
        Ok(entry)
    }

    fn settings(&self) -> Result<StrategySettings, ScreenerError> {
        let mut settings = StrategySettings::new(&self.name).with_weight(self.weight)?;
        settings.enabled = self.enabled;
        if self.filter {
            settings = settings.as_filter(self.threshold);
        }
        Ok(settings)
    }

    fn build(&self, analysis: &AnalysisSettings) -> Result<Box<dyn Strategy>, ScreenerError> {
        Ok(match self.kind {
            StrategyKind::JValue => {
                let mut strategy = JValueStrategy::default().with_settings(self.settings()?);
                strategy.set_max_j_value(self.max_j_value.unwrap_or(analysis.j_value_threshold))?;
                Box::new(strategy)
            }
            StrategyKind::VolumePattern => {
                let mut strategy = VolumePatternStrategy::default().with_settings(self.settings()?);
                strategy.set_params(
                    self.days.unwrap_or(analysis.volume_analysis_days),
                    self.min_price_change.unwrap_or(analysis.min_price_change),
                    self.min_volume_contrast.unwrap_or(analysis.min_volume_contrast),
                )?;
                Box::new(strategy)
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenConfig {
    pub data: DataSettings,
    pub analysis: AnalysisSettings,
    pub scoring: ScoringSettings,
    pub output: OutputSettings,
    /// Empty means the two built-in strategies with default settings.
    pub strategies: Vec<StrategySection>,
}

impl ScreenConfig {
    pub fn new(data_dir: impl Into<PathBuf>, securities_file: impl Into<PathBuf>) -> Self {
        Self {
            data: DataSettings {
                data_dir: data_dir.into(),
                securities_file: securities_file.into(),
                output_dir: PathBuf::from("results"),
            },
            analysis: AnalysisSettings::default(),
            scoring: ScoringSettings::default(),
            output: OutputSettings::default(),
            strategies: Vec::new(),
        }
    }

    pub fn from_port(config: &dyn ConfigPort) -> Result<Self, ScreenerError> {
        validate_screen_config(config)?;

        let mut out = Self::new(
            require(config, "data", "data_dir")?.trim(),
            require(config, "data", "securities_file")?.trim(),
        );
        if let Some(dir) = config.get_string("data", "output_dir") {
            out.data.output_dir = PathBuf::from(dir.trim());
        }

        let a = &mut out.analysis;
        if let Some(markets) = config.get_list("analysis", "markets") {
            a.markets = markets;
        }
        a.codes = config
            .get_string("analysis", "codes")
            .map(|codes| parse_codes(&codes))
            .transpose()?;
        a.min_data_length = read_parsed(config, "analysis", "min_data_length")?.unwrap_or(a.min_data_length);
        a.analysis_date = config
            .get_string("analysis", "analysis_date")
            .and_then(|raw| parse_trade_date(&raw));
        a.j_value_threshold = read_parsed(config, "analysis", "j_value_threshold")?.unwrap_or(a.j_value_threshold);
        a.volume_analysis_days =
            read_parsed(config, "analysis", "volume_analysis_days")?.unwrap_or(a.volume_analysis_days);
        a.min_volume_contrast =
            read_parsed(config, "analysis", "min_volume_contrast")?.unwrap_or(a.min_volume_contrast);
        a.min_price_change = read_parsed(config, "analysis", "min_price_change")?.unwrap_or(a.min_price_change);
        a.kdj_period = read_parsed(config, "analysis", "kdj_period")?.unwrap_or(a.kdj_period);
        a.parallel = read_flag(config, "analysis", "parallel")?.unwrap_or(a.parallel);

        let s = &mut out.scoring;
        s.method = read_parsed(config, "scoring", "method")?.unwrap_or(s.method);
        s.sort_by = read_parsed(config, "scoring", "sort_by")?.unwrap_or(s.sort_by);
        s.min_qualified = read_parsed(config, "scoring", "min_qualified_strategies")?.unwrap_or(s.min_qualified);
        s.min_score = read_parsed(config, "scoring", "min_score_threshold")?.unwrap_or(s.min_score);

        let o = &mut out.output;
        o.max_display_count = read_parsed(config, "output", "max_display_count")?.unwrap_or(o.max_display_count);
        o.include_details = read_flag(config, "output", "include_details")?.unwrap_or(o.include_details);
        if let Some(level) = config.get_string("output", "log_level") {
            o.log_level = level.trim().to_lowercase();
        }

        for section in config.sections() {
            if let Some(name) = section.strip_prefix(STRATEGY_SECTION_PREFIX) {
                out.strategies.push(StrategySection::from_port(config, &section, name)?);
            }
        }

        Ok(out)
    }

    pub fn indicator_params(&self) -> IndicatorParams {
        IndicatorParams {
            kdj_period: self.analysis.kdj_period,
            ..IndicatorParams::default()
        }
    }

    pub fn scoring_engine(&self) -> ScoringEngine {
        ScoringEngine::new(self.scoring.method).with_min_qualified(self.scoring.min_qualified)
    }

    /// Registry holding the configured strategies in section order.
    pub fn build_registry(&self) -> Result<StrategyRegistry, ScreenerError> {
        let mut registry = StrategyRegistry::new();
        if self.strategies.is_empty() {
            let a = &self.analysis;
            registry.register(Box::new(JValueStrategy::new(a.j_value_threshold)?));
            registry.register(Box::new(VolumePatternStrategy::new(
                a.volume_analysis_days,
                a.min_price_change,
                a.min_volume_contrast,
            )?));
            return Ok(registry);
        }
        for entry in &self.strategies {
            registry.register(entry.build(&self.analysis)?);
        }
        Ok(registry)
    }
}
