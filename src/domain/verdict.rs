//! Per-strategy evaluation outcome for one security.

use crate::domain::error::ScreenerError;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

/// One entry of a verdict's free-form details.
#[derive(Debug, Clone, PartialEq)]
pub enum Detail {
    Number(f64),
    Count(usize),
    Flag(bool),
    Text(String),
}

impl fmt::Display for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detail::Number(v) => write!(f, "{:.4}", v),
            Detail::Count(n) => write!(f, "{}", n),
            Detail::Flag(b) => write!(f, "{}", b),
            Detail::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Detail {
    fn from(v: f64) -> Self {
        Detail::Number(v)
    }
}

impl From<usize> for Detail {
    fn from(n: usize) -> Self {
        Detail::Count(n)
    }
}

impl From<bool> for Detail {
    fn from(b: bool) -> Self {
        Detail::Flag(b)
    }
}

impl From<&str> for Detail {
    fn from(s: &str) -> Self {
        Detail::Text(s.to_string())
    }
}

pub type Details = BTreeMap<String, Detail>;

/// Structured output of one strategy for one security.
///
/// Score lies in [0, 100] and confidence in [0, 1]; [`Verdict::new`] refuses
/// anything else, NaN included. Fields are read-only after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    code: String,
    name: String,
    strategy: String,
    qualified: bool,
    score: f64,
    confidence: f64,
    details: Details,
    reason: String,
    price: f64,
    trade_date: Option<NaiveDate>,
}

impl Verdict {
    pub fn new(
        code: &str,
        name: &str,
        strategy: &str,
        qualified: bool,
        score: f64,
        confidence: f64,
    ) -> Result<Self, ScreenerError> {
        if !(0.0..=100.0).contains(&score) {
            return Err(ScreenerError::InvalidVerdict {
                field: "score",
                value: score,
            });
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ScreenerError::InvalidVerdict {
                field: "confidence",
                value: confidence,
            });
        }
        Ok(Self {
            code: code.to_string(),
            name: name.to_string(),
            strategy: strategy.to_string(),
            qualified,
            score,
            confidence,
            details: Details::new(),
            reason: String::new(),
            price: 0.0,
            trade_date: None,
        })
    }

    /// Disqualified, zero-score, zero-confidence verdict.
    pub fn failed(code: &str, name: &str, strategy: &str, reason: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            strategy: strategy.to_string(),
            qualified: false,
            score: 0.0,
            confidence: 0.0,
            details: Details::new(),
            reason: reason.into(),
            price: 0.0,
            trade_date: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }

    pub fn with_quote(mut self, price: f64, trade_date: NaiveDate) -> Self {
        self.price = price;
        self.trade_date = Some(trade_date);
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn is_qualified(&self) -> bool {
        self.qualified
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn details(&self) -> &Details {
        &self.details
    }

    pub fn detail(&self, key: &str) -> Option<&Detail> {
        self.details.get(key)
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn trade_date(&self) -> Option<NaiveDate> {
        self.trade_date
    }
}

/// Verdicts for one security keyed by strategy name, in evaluation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerdictSet {
    verdicts: Vec<Verdict>,
}

impl VerdictSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `verdict`, replacing any earlier one from the same strategy in place.
    pub fn insert(&mut self, verdict: Verdict) {
        match self
            .verdicts
            .iter_mut()
            .find(|v| v.strategy == verdict.strategy)
        {
            Some(slot) => *slot = verdict,
            None => self.verdicts.push(verdict),
        }
    }

    pub fn get(&self, strategy: &str) -> Option<&Verdict> {
        self.verdicts.iter().find(|v| v.strategy == strategy)
    }

    pub fn contains(&self, strategy: &str) -> bool {
        self.get(strategy).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.verdicts.iter().map(|v| v.strategy.as_str())
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }
}

impl FromIterator<Verdict> for VerdictSet {
    fn from_iter<I: IntoIterator<Item = Verdict>>(iter: I) -> Self {
        let mut set = VerdictSet::new();
        for verdict in iter {
            set.insert(verdict);
        }
        set
    }
}

impl<'a> IntoIterator for &'a VerdictSet {
    type Item = &'a Verdict;
    type IntoIter = std::slice::Iter<'a, Verdict>;

    fn into_iter(self) -> Self::IntoIter {
        self.verdicts.iter()
    }
}
