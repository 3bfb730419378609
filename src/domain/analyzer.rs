//! Batch screening over a universe of securities.
//!
//! The [`Analyzer`] resolves which securities to look at, loads their
//! series through a [`DataPort`], runs layered strategy evaluation on each
//! one (in parallel with rayon when enabled), then scores and ranks the
//! results.

use crate::domain::config::{AnalysisSettings, ScoringSettings, ScreenConfig};
use crate::domain::error::ScreenerError;
use crate::domain::indicator::{compute_indicators, IndicatorParams};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::registry::StrategyRegistry;
use crate::domain::scoring::{CompositeScore, RankedEntry, ScoringEngine, StrategyPerformance};
use crate::domain::strategy::helpers::MIN_SERIES_LEN;
use crate::domain::strategy::oversold::{self, JDistribution, JTrend, DEFAULT_TREND_WINDOW};
use crate::domain::strategy::{volume_pattern, JValueStrategy, StrategySettings, VolumePatternStrategy};
use crate::domain::universe::{
    load_universe, select_by_codes, select_by_markets, SecurityInfo, SecuritySeries, SkippedCode,
};
use crate::domain::verdict::VerdictSet;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, info};

pub const PROGRESS_INTERVAL: usize = 100;

const PRESET_J_WEIGHT: f64 = 0.6;
const PRESET_VOLUME_WEIGHT: f64 = 0.4;

/// One row of [`AnalysisResults::summary`], scores rounded to 2 decimals.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub rank: usize,
    pub code: String,
    pub name: String,
    pub weighted_score: f64,
    pub total_score: f64,
    pub confidence: f64,
    pub qualified_count: usize,
    pub qualified_strategies: String,
    pub price: f64,
    pub trade_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct AnalysisResults {
    /// Every evaluated security, in universe order.
    pub scores: Vec<CompositeScore>,
    pub ranked: Vec<RankedEntry>,
    /// Configured cut-off, else the latest trade date seen.
    pub analysis_date: Option<NaiveDate>,
    pub performance: BTreeMap<String, StrategyPerformance>,
    pub enabled_strategies: Vec<String>,
    pub skipped: Vec<SkippedCode>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl AnalysisResults {
    pub fn total(&self) -> usize {
        self.scores.len()
    }

    /// Ranked entries that passed every ranking filter.
    pub fn qualified(&self) -> &[RankedEntry] {
        &self.ranked
    }

    pub fn top(&self, n: usize) -> &[RankedEntry] {
        &self.ranked[..n.min(self.ranked.len())]
    }

    /// Securities qualified by `strategy`, best score for that strategy first.
    pub fn by_strategy(&self, strategy: &str) -> Vec<&CompositeScore> {
        let mut hits: Vec<&CompositeScore> = self
            .scores
            .iter()
            .filter(|s| s.is_qualified_by(strategy))
            .collect();
        let score_of = |s: &CompositeScore| {
            s.verdicts
                .get(strategy)
                .map(|v| v.score())
                .unwrap_or(0.0)
        };
        hits.sort_by(|a, b| score_of(b).total_cmp(&score_of(a)));
        hits
    }

    pub fn summary(&self) -> Vec<SummaryRow> {
        self.ranked
            .iter()
            .map(|entry| {
                let s = &entry.score;
                SummaryRow {
                    rank: entry.rank,
                    code: s.code.clone(),
                    name: s.name.clone(),
                    weighted_score: round2(s.weighted_score),
                    total_score: round2(s.total_score),
                    confidence: round2(s.confidence),
                    qualified_count: s.qualified_count(),
                    qualified_strategies: s.qualified.join(", "),
                    price: round2(s.price),
                    trade_date: s.trade_date,
                }
            })
            .collect()
    }
}

/// Everything known about one security at the analysis date.
#[derive(Debug, Clone)]
pub struct SecurityReport {
    pub info: SecurityInfo,
    pub bars: usize,
    pub latest: OhlcvBar,
    pub verdicts: VerdictSet,
    pub j_distribution: Option<JDistribution>,
    pub j_trend: Option<JTrend>,
}

pub struct Analyzer<'a> {
    data: &'a dyn DataPort,
    registry: StrategyRegistry,
    engine: ScoringEngine,
    indicator_params: IndicatorParams,
    analysis: AnalysisSettings,
    scoring: ScoringSettings,
}

impl<'a> Analyzer<'a> {
    pub fn new(data: &'a dyn DataPort, config: &ScreenConfig) -> Result<Self, ScreenerError> {
        Ok(Self::with_registry(data, config, config.build_registry()?))
    }

    pub fn with_registry(data: &'a dyn DataPort, config: &ScreenConfig, registry: StrategyRegistry) -> Self {
        Self {
            data,
            registry,
            engine: config.scoring_engine(),
            indicator_params: config.indicator_params(),
            analysis: config.analysis.clone(),
            scoring: config.scoring.clone(),
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut StrategyRegistry {
        &mut self.registry
    }

    /// Screens `codes`, the configured codes, or every security of the
    /// configured markets, in that order of preference.
    pub fn run(&self, codes: Option<&[String]>) -> Result<AnalysisResults, ScreenerError> {
        self.run_with(&self.registry, codes, None)
    }

    /// J-value strategy alone.
    pub fn oversold_only(&self, max_j: f64, codes: Option<&[String]>) -> Result<AnalysisResults, ScreenerError> {
        let mut registry = StrategyRegistry::new();
        registry.register(Box::new(JValueStrategy::new(max_j)?));
        self.run_with(&registry, codes, None)
    }

    /// J-value and volume pattern together; only securities qualifying
    /// under both are ranked.
    pub fn oversold_with_volume(
        &self,
        max_j: f64,
        days: usize,
        codes: Option<&[String]>,
    ) -> Result<AnalysisResults, ScreenerError> {
        let mut j = JValueStrategy::default()
            .with_settings(StrategySettings::new(oversold::NAME).with_weight(PRESET_J_WEIGHT)?);
        j.set_max_j_value(max_j)?;

        let mut volume = VolumePatternStrategy::default()
            .with_settings(StrategySettings::new(volume_pattern::NAME).with_weight(PRESET_VOLUME_WEIGHT)?);
        volume.set_params(days, self.analysis.min_price_change, self.analysis.min_volume_contrast)?;

        let mut registry = StrategyRegistry::new();
        registry.register(Box::new(j));
        registry.register(Box::new(volume));
        self.run_with(&registry, codes, Some(2))
    }

    fn resolve_universe(&self, codes: Option<&[String]>) -> Result<(Vec<SecurityInfo>, usize), ScreenerError> {
        let all = self.data.list_securities()?;
        let codes = codes.or(self.analysis.codes.as_deref());
        Ok(match codes {
            Some(codes) => (select_by_codes(&all, codes), 0),
            None => (
                select_by_markets(&all, &self.analysis.markets),
                self.analysis.min_data_length,
            ),
        })
    }

    fn run_with(
        &self,
        registry: &StrategyRegistry,
        codes: Option<&[String]>,
        min_qualified: Option<usize>,
    ) -> Result<AnalysisResults, ScreenerError> {
        let (selected, min_bars) = self.resolve_universe(codes)?;
        info!(
            securities = selected.len(),
            strategies = ?registry.enabled().map(|s| s.name()).collect::<Vec<_>>(),
            "starting screen"
        );
        let universe = load_universe(self.data, selected, min_bars)?;

        let evaluated = evaluate_universe(
            registry,
            &self.indicator_params,
            self.analysis.analysis_date,
            &universe.series,
            self.analysis.parallel,
        )?;

        let weights = registry.weights();
        let scores = self
            .engine
            .score_batch(&evaluated, Some(&weights), &registry.filter_names());
        let ranked = self.engine.rank(
            scores.clone(),
            self.scoring.sort_by,
            self.scoring.min_score,
            min_qualified,
        );
        let performance = self.engine.performance(&scores);
        let analysis_date = self
            .analysis
            .analysis_date
            .or_else(|| scores.iter().filter_map(|s| s.trade_date).max());

        info!(
            evaluated = scores.len(),
            ranked = ranked.len(),
            skipped = universe.skipped.len(),
            "screen finished"
        );

        Ok(AnalysisResults {
            scores,
            ranked,
            analysis_date,
            performance,
            enabled_strategies: registry.enabled().map(|s| s.name().to_string()).collect(),
            skipped: universe.skipped,
        })
    }

    /// Runs every registered strategy on one security with no filter
    /// short-circuit, alongside its J statistics.
    pub fn inspect(&self, code: &str) -> Result<SecurityReport, ScreenerError> {
        let info = self
            .data
            .list_securities()?
            .into_iter()
            .find(|s| s.matches(code))
            .ok_or_else(|| ScreenerError::NoData {
                code: code.to_string(),
            })?;

        let raw = self.data.load_series(&info.ts_code, self.analysis.analysis_date)?;
        let bars = prepare(&raw, None, &self.indicator_params);
        if bars.len() < MIN_SERIES_LEN {
            return Err(ScreenerError::InsufficientData {
                code: info.ts_code,
                bars: bars.len(),
                minimum: MIN_SERIES_LEN,
            });
        }

        let verdicts = self.registry.evaluate_flat(&info.ts_code, &info.name, &bars, None)?;
        let j_stats = JValueStrategy::new(self.analysis.j_value_threshold)?;
        let latest = bars[bars.len() - 1].clone();

        Ok(SecurityReport {
            bars: bars.len(),
            latest,
            verdicts,
            j_distribution: j_stats.j_distribution(&bars),
            j_trend: j_stats.j_trend(&bars, DEFAULT_TREND_WINDOW),
            info,
        })
    }
}

/// Date-ordered copy of `bars` cut at `until`, with indicators computed.
fn prepare(bars: &[OhlcvBar], until: Option<NaiveDate>, params: &IndicatorParams) -> Vec<OhlcvBar> {
    let mut kept: Vec<OhlcvBar> = bars
        .iter()
        .filter(|b| until.is_none_or(|d| b.date <= d))
        .cloned()
        .collect();
    kept.sort_by_key(|b| b.date);
    compute_indicators(&kept, params)
}

fn evaluate_one(
    registry: &StrategyRegistry,
    params: &IndicatorParams,
    until: Option<NaiveDate>,
    series: &SecuritySeries,
) -> Result<Option<(String, VerdictSet)>, ScreenerError> {
    let code = &series.info.ts_code;
    let bars = prepare(&series.bars, until, params);
    if bars.len() < MIN_SERIES_LEN {
        debug!(code = %code, bars = bars.len(), "too few bars at analysis date");
        return Ok(None);
    }
    let verdicts = registry.evaluate(code, &series.info.name, &bars, None)?;
    Ok((!verdicts.is_empty()).then(|| (code.clone(), verdicts)))
}

/// Evaluates every series, keeping input order in the output.
fn evaluate_universe(
    registry: &StrategyRegistry,
    params: &IndicatorParams,
    until: Option<NaiveDate>,
    series: &[SecuritySeries],
    parallel: bool,
) -> Result<Vec<(String, VerdictSet)>, ScreenerError> {
    let total = series.len();
    let done = AtomicUsize::new(0);
    let run = |s: &SecuritySeries| {
        let outcome = evaluate_one(registry, params, until, s);
        if let Err(e) = &outcome {
            error!(code = %s.info.ts_code, error = %e, "evaluation aborted, stopping the screen");
        }
        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
        if n % PROGRESS_INTERVAL == 0 {
            info!(done = n, total, "evaluation progress");
        }
        outcome
    };

    let outcomes: Vec<Option<(String, VerdictSet)>> = if parallel {
        series.par_iter().map(run).collect::<Result<_, _>>()?
    } else {
        series.iter().map(run).collect::<Result<_, _>>()?
    };
    Ok(outcomes.into_iter().flatten().collect())
}
