//! Composite scoring across strategies, ranking and per-strategy statistics.

use crate::domain::error::ScreenerError;
use crate::domain::verdict::VerdictSet;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How the per-strategy scores of one security combine into its weighted score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AggregationMethod {
    /// Σ(score·w) / Σw, falling back to the plain mean when Σw = 0.
    #[default]
    WeightedAverage,
    /// (Π (score/100)^w)^(1/Σw) · 100, or 0 if any score is ≤ 0.
    Multiplicative,
    /// Score of the first strategy carrying the largest weight.
    MaxScore,
}

impl FromStr for AggregationMethod {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "weighted_average" => Ok(Self::WeightedAverage),
            "multiplicative" => Ok(Self::Multiplicative),
            "max_score" => Ok(Self::MaxScore),
            other => Err(ScreenerError::UnknownAggregation(other.to_string())),
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WeightedAverage => "weighted_average",
            Self::Multiplicative => "multiplicative",
            Self::MaxScore => "max_score",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    TotalScore,
    #[default]
    WeightedScore,
    /// Qualified strategy count, then weighted score.
    QualifiedCount,
    Confidence,
}

impl FromStr for SortKey {
    type Err = ScreenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "total_score" => Ok(Self::TotalScore),
            "weighted_score" => Ok(Self::WeightedScore),
            "qualified_count" => Ok(Self::QualifiedCount),
            "confidence" => Ok(Self::Confidence),
            other => Err(ScreenerError::UnknownSortKey(other.to_string())),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TotalScore => "total_score",
            Self::WeightedScore => "weighted_score",
            Self::QualifiedCount => "qualified_count",
            Self::Confidence => "confidence",
        })
    }
}

/// Aggregated result for one security.
///
/// `strategy_scores` and `strategy_weights` cover scoring strategies only;
/// `verdicts` keeps every verdict, filters included, and `qualified` lists
/// every strategy whose verdict qualified.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeScore {
    pub code: String,
    pub name: String,
    pub total_score: f64,
    pub weighted_score: f64,
    pub strategy_scores: Vec<(String, f64)>,
    pub strategy_weights: BTreeMap<String, f64>,
    pub verdicts: VerdictSet,
    pub qualified: Vec<String>,
    pub confidence: f64,
    pub price: f64,
    pub trade_date: Option<NaiveDate>,
}

impl CompositeScore {
    pub fn qualified_count(&self) -> usize {
        self.qualified.len()
    }

    pub fn total_strategies(&self) -> usize {
        self.verdicts.len()
    }

    pub fn qualification_rate(&self) -> f64 {
        match self.total_strategies() {
            0 => 0.0,
            n => self.qualified_count() as f64 / n as f64,
        }
    }

    pub fn strategy_score(&self, strategy: &str) -> Option<f64> {
        self.strategy_scores
            .iter()
            .find(|(name, _)| name == strategy)
            .map(|(_, s)| *s)
    }

    pub fn is_qualified_by(&self, strategy: &str) -> bool {
        self.qualified.iter().any(|q| q == strategy)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    /// 1-based position after sorting.
    pub rank: usize,
    pub score: CompositeScore,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyPerformance {
    pub average_score: f64,
    pub max_score: f64,
    pub min_score: f64,
    pub qualified_count: usize,
    pub total_count: usize,
    pub qualification_rate: f64,
}

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    method: AggregationMethod,
    min_qualified: usize,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(AggregationMethod::default())
    }
}

impl ScoringEngine {
    pub fn new(method: AggregationMethod) -> Self {
        Self {
            method,
            min_qualified: 1,
        }
    }

    pub fn method(&self) -> AggregationMethod {
        self.method
    }

    /// Selects the aggregation by name.
    pub fn set_method(&mut self, name: &str) -> Result<(), ScreenerError> {
        self.method = name.parse()?;
        Ok(())
    }

    pub fn with_min_qualified(mut self, count: usize) -> Self {
        self.min_qualified = count;
        self
    }

    pub fn min_qualified(&self) -> usize {
        self.min_qualified
    }

    pub fn set_min_qualified(&mut self, count: i64) -> Result<(), ScreenerError> {
        self.min_qualified = usize::try_from(count).map_err(|_| ScreenerError::NegativeMinQualified(count))?;
        Ok(())
    }

    /// Combines one security's verdicts.
    ///
    /// Verdicts from strategies in `filter_names` stay in the result but
    /// take no part in the score math. Scoring strategies missing from
    /// `weights` (or all of them when `weights` is `None`) weigh 1.0 in the
    /// weighted score. Confidence is the mean over the strategies `weights`
    /// names, so a missing strategy weighs 0 there.
    pub fn score(
        &self,
        code: &str,
        name: &str,
        verdicts: &VerdictSet,
        weights: Option<&BTreeMap<String, f64>>,
        filter_names: &[String],
    ) -> CompositeScore {
        let scoring: Vec<_> = verdicts
            .iter()
            .filter(|v| !filter_names.iter().any(|f| f == v.strategy()))
            .collect();

        let strategy_scores: Vec<(String, f64)> = scoring
            .iter()
            .map(|v| (v.strategy().to_string(), v.score()))
            .collect();
        let strategy_weights: BTreeMap<String, f64> = scoring
            .iter()
            .map(|v| {
                let w = weights.and_then(|w| w.get(v.strategy())).copied().unwrap_or(1.0);
                (v.strategy().to_string(), w)
            })
            .collect();

        let (total_score, weighted_score) = self.aggregate(&strategy_scores, &strategy_weights);

        // Confidence only counts explicitly weighted strategies.
        let confidence_weight = |strategy: &str| match weights {
            Some(w) => w.get(strategy).copied().unwrap_or(0.0),
            None => 1.0,
        };
        let weight_sum: f64 = scoring.iter().map(|v| confidence_weight(v.strategy())).sum();
        let confidence = if weight_sum > 0.0 {
            scoring
                .iter()
                .map(|v| v.confidence() * confidence_weight(v.strategy()))
                .sum::<f64>()
                / weight_sum
        } else {
            0.0
        };

        let (price, trade_date) = verdicts
            .iter()
            .find(|v| v.price() > 0.0)
            .map(|v| (v.price(), v.trade_date()))
            .unwrap_or((0.0, None));

        CompositeScore {
            code: code.to_string(),
            name: name.to_string(),
            total_score,
            weighted_score,
            strategy_scores,
            strategy_weights,
            verdicts: verdicts.clone(),
            qualified: verdicts
                .iter()
                .filter(|v| v.is_qualified())
                .map(|v| v.strategy().to_string())
                .collect(),
            confidence,
            price,
            trade_date,
        }
    }

    /// Returns (total, weighted). Both are 0 with no scoring strategies.
    fn aggregate(&self, scores: &[(String, f64)], weights: &BTreeMap<String, f64>) -> (f64, f64) {
        if scores.is_empty() {
            return (0.0, 0.0);
        }
        let ws: Vec<f64> = scores
            .iter()
            .map(|(name, _)| weights.get(name).copied().unwrap_or(1.0))
            .collect();
        let total = scores.iter().map(|(_, s)| s).sum::<f64>() / scores.len() as f64;
        let weight_sum: f64 = ws.iter().sum();

        let weighted = match self.method {
            AggregationMethod::WeightedAverage if weight_sum > 0.0 => {
                scores.iter().zip(&ws).map(|((_, s), w)| s * w).sum::<f64>() / weight_sum
            }
            AggregationMethod::WeightedAverage => total,
            AggregationMethod::Multiplicative => {
                if scores.iter().any(|(_, s)| *s <= 0.0) {
                    0.0
                } else if weight_sum > 0.0 {
                    let product: f64 = scores
                        .iter()
                        .zip(&ws)
                        .map(|((_, s), w)| (s / 100.0).powf(*w))
                        .product();
                    product.powf(1.0 / weight_sum) * 100.0
                } else {
                    total
                }
            }
            AggregationMethod::MaxScore => {
                let best = ws
                    .iter()
                    .enumerate()
                    .fold(0, |best, (i, w)| if *w > ws[best] { i } else { best });
                scores[best].1
            }
        };
        (total, weighted)
    }

    /// Scores every security with at least one verdict, in input order.
    /// The security name comes from its first verdict.
    pub fn score_batch(
        &self,
        securities: &[(String, VerdictSet)],
        weights: Option<&BTreeMap<String, f64>>,
        filter_names: &[String],
    ) -> Vec<CompositeScore> {
        securities
            .iter()
            .filter_map(|(code, verdicts)| {
                let first = verdicts.iter().next()?;
                Some(self.score(code, first.name(), verdicts, weights, filter_names))
            })
            .collect()
    }

    /// Filters, sorts (stable, descending) and numbers `scores` from 1.
    ///
    /// `min_score` applies to the sort key's score for the total and
    /// weighted keys only. `min_qualified` defaults to the engine's setting.
    pub fn rank(
        &self,
        scores: Vec<CompositeScore>,
        sort_by: SortKey,
        min_score: f64,
        min_qualified: Option<usize>,
    ) -> Vec<RankedEntry> {
        let min_qualified = min_qualified.unwrap_or(self.min_qualified);
        let mut kept: Vec<CompositeScore> = scores
            .into_iter()
            .filter(|s| match sort_by {
                SortKey::TotalScore => s.total_score >= min_score,
                SortKey::WeightedScore => s.weighted_score >= min_score,
                SortKey::QualifiedCount | SortKey::Confidence => true,
            })
            .filter(|s| s.qualified_count() >= min_qualified)
            .collect();

        match sort_by {
            SortKey::TotalScore => kept.sort_by(|a, b| b.total_score.total_cmp(&a.total_score)),
            SortKey::WeightedScore => kept.sort_by(|a, b| b.weighted_score.total_cmp(&a.weighted_score)),
            SortKey::QualifiedCount => kept.sort_by(|a, b| {
                b.qualified_count()
                    .cmp(&a.qualified_count())
                    .then(b.weighted_score.total_cmp(&a.weighted_score))
            }),
            SortKey::Confidence => kept.sort_by(|a, b| b.confidence.total_cmp(&a.confidence)),
        }

        kept.into_iter()
            .enumerate()
            .map(|(i, score)| RankedEntry { rank: i + 1, score })
            .collect()
    }

    /// Per-strategy score statistics over every security carrying a verdict
    /// for that strategy, filters included.
    pub fn performance(&self, scores: &[CompositeScore]) -> BTreeMap<String, StrategyPerformance> {
        let mut samples: BTreeMap<String, Vec<(f64, bool)>> = BTreeMap::new();
        for verdict in scores.iter().flat_map(|s| s.verdicts.iter()) {
            samples
                .entry(verdict.strategy().to_string())
                .or_default()
                .push((verdict.score(), verdict.is_qualified()));
        }

        samples
            .into_iter()
            .map(|(name, rows)| {
                let total_count = rows.len();
                let qualified_count = rows.iter().filter(|(_, q)| *q).count();
                let sum: f64 = rows.iter().map(|(s, _)| s).sum();
                let stats = StrategyPerformance {
                    average_score: sum / total_count as f64,
                    max_score: rows.iter().map(|(s, _)| *s).fold(f64::NEG_INFINITY, f64::max),
                    min_score: rows.iter().map(|(s, _)| *s).fold(f64::INFINITY, f64::min),
                    qualified_count,
                    total_count,
                    qualification_rate: qualified_count as f64 / total_count as f64,
                };
                (name, stats)
            })
            .collect()
    }
}
