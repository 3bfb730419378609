//! Named collection of strategies and the per-security evaluation pipeline.

use crate::domain::error::ScreenerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::strategy::Strategy;
use crate::domain::verdict::{Verdict, VerdictSet};
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

/// Strategies in registration order, unique by name.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `strategy`. A strategy with the same name is replaced in place.
    pub fn register(&mut self, strategy: Box<dyn Strategy>) {
        let name = strategy.name().to_string();
        match self.strategies.iter_mut().find(|s| s.name() == name) {
            Some(slot) => {
                warn!(strategy = %name, "strategy already registered, replacing");
                *slot = strategy;
            }
            None => {
                debug!(strategy = %name, "strategy registered");
                self.strategies.push(strategy);
            }
        }
    }

    pub fn unregister(&mut self, name: &str) -> Option<Box<dyn Strategy>> {
        let idx = self.strategies.iter().position(|s| s.name() == name)?;
        Some(self.strategies.remove(idx))
    }

    pub fn get(&self, name: &str) -> Option<&dyn Strategy> {
        self.strategies.iter().find(|s| s.name() == name).map(|s| &**s)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Box<dyn Strategy>, ScreenerError> {
        self.strategies
            .iter_mut()
            .find(|s| s.name() == name)
            .ok_or_else(|| ScreenerError::UnknownStrategy(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn clear(&mut self) {
        self.strategies.clear();
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &dyn Strategy> {
        self.strategies.iter().map(|s| &**s)
    }

    pub fn enabled(&self) -> impl Iterator<Item = &dyn Strategy> {
        self.all().filter(|s| s.is_enabled())
    }

    /// Enabled filter strategies, in registration order.
    pub fn filters(&self) -> impl Iterator<Item = &dyn Strategy> {
        self.enabled().filter(|s| s.is_filter())
    }

    /// Enabled scoring (non-filter) strategies, in registration order.
    pub fn scorers(&self) -> impl Iterator<Item = &dyn Strategy> {
        self.enabled().filter(|s| !s.is_filter())
    }

    pub fn filter_names(&self) -> Vec<String> {
        self.filters().map(|s| s.name().to_string()).collect()
    }

    pub fn set_weight(&mut self, name: &str, weight: f64) -> Result<(), ScreenerError> {
        self.get_mut(name)?.set_weight(weight)
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), ScreenerError> {
        self.get_mut(name)?.set_enabled(enabled);
        Ok(())
    }

    pub fn set_filter(&mut self, name: &str, filter: bool, threshold: Option<f64>) -> Result<(), ScreenerError> {
        self.get_mut(name)?.set_filter(filter, threshold);
        Ok(())
    }

    /// Sum of the weights of enabled strategies.
    pub fn total_weight(&self) -> f64 {
        self.enabled().map(|s| s.weight()).sum()
    }

    /// Weight of every enabled strategy by name.
    pub fn weights(&self) -> BTreeMap<String, f64> {
        self.enabled()
            .map(|s| (s.name().to_string(), s.weight()))
            .collect()
    }

    /// Strategies to run: explicit names in the given order (unknown names
    /// skipped, enabled flag ignored) or every enabled strategy.
    fn select<'a>(&'a self, names: Option<&[String]>) -> Vec<&'a dyn Strategy> {
        match names {
            Some(names) => names
                .iter()
                .filter_map(|n| {
                    let found = self.get(n);
                    if found.is_none() {
                        debug!(strategy = %n, "skipping unknown strategy");
                    }
                    found
                })
                .collect(),
            None => self.enabled().collect(),
        }
    }

    /// Layered evaluation: filters first, stopping at the first one that
    /// rejects the security, then every scoring strategy.
    ///
    /// A rejected security's set holds the verdicts produced up to and
    /// including the rejecting filter. Recoverable strategy errors become
    /// disqualified verdicts; [`ScreenerError::InvalidVerdict`] propagates.
    pub fn evaluate(
        &self,
        code: &str,
        name: &str,
        bars: &[OhlcvBar],
        names: Option<&[String]>,
    ) -> Result<VerdictSet, ScreenerError> {
        let selected = self.select(names);
        let (filters, scorers): (Vec<&dyn Strategy>, Vec<&dyn Strategy>) =
            selected.into_iter().partition(|s| s.is_filter());

        let mut verdicts = VerdictSet::new();
        for strategy in filters {
            let verdict = run_one(strategy, code, name, bars)?;
            let passed = strategy.passes_filter(&verdict);
            verdicts.insert(verdict);
            if !passed {
                debug!(code, strategy = strategy.name(), "rejected by filter");
                return Ok(verdicts);
            }
        }
        for strategy in scorers {
            verdicts.insert(run_one(strategy, code, name, bars)?);
        }
        Ok(verdicts)
    }

    /// Runs every selected strategy with no filter short-circuit.
    pub fn evaluate_flat(
        &self,
        code: &str,
        name: &str,
        bars: &[OhlcvBar],
        names: Option<&[String]>,
    ) -> Result<VerdictSet, ScreenerError> {
        self.select(names)
            .into_iter()
            .map(|s| run_one(s, code, name, bars))
            .collect()
    }

    /// Flat evaluation of many securities, keyed by code.
    pub fn evaluate_batch(
        &self,
        securities: &[(String, String, Vec<OhlcvBar>)],
        names: Option<&[String]>,
    ) -> Result<BTreeMap<String, VerdictSet>, ScreenerError> {
        securities
            .iter()
            .map(|(code, name, bars)| -> Result<_, ScreenerError> {
                Ok((code.clone(), self.evaluate_flat(code, name, bars, names)?))
            })
            .collect()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

fn run_one(strategy: &dyn Strategy, code: &str, name: &str, bars: &[OhlcvBar]) -> Result<Verdict, ScreenerError> {
    match strategy.analyze(code, name, bars) {
        Ok(verdict) => Ok(verdict),
        Err(e) if e.is_fatal() => {
            error!(code, strategy = strategy.name(), error = %e, "strategy produced an invalid verdict");
            Err(e)
        }
        Err(e) => {
            warn!(code, strategy = strategy.name(), error = %e, "strategy evaluation failed");
            Ok(strategy.failed(code, name, &format!("evaluation error: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::StrategySettings;

    enum Outcome {
        Score(f64),
        Fail,
        Broken,
    }

    struct Stub {
        settings: StrategySettings,
        outcome: Outcome,
    }

    impl Strategy for Stub {
        fn default_name(&self) -> &'static str {
            "stub"
        }

        fn analyze(&self, code: &str, name: &str, _bars: &[OhlcvBar]) -> Result<Verdict, ScreenerError> {
            match self.outcome {
                Outcome::Score(s) => Verdict::new(code, name, self.name(), s > 0.0, s, 0.8),
                Outcome::Fail => Err(ScreenerError::evaluation(self.name(), "boom")),
                Outcome::Broken => Verdict::new(code, name, self.name(), true, 150.0, 0.8),
            }
        }

        fn settings(&self) -> &StrategySettings {
            &self.settings
        }

        fn settings_mut(&mut self) -> &mut StrategySettings {
            &mut self.settings
        }
    }

    fn stub(name: &str, outcome: Outcome) -> Box<dyn Strategy> {
        Box::new(Stub {
            settings: StrategySettings::new(name),
            outcome,
        })
    }

    fn filter(name: &str, outcome: Outcome, threshold: f64) -> Box<dyn Strategy> {
        Box::new(Stub {
            settings: StrategySettings::new(name).as_filter(threshold),
            outcome,
        })
    }

    #[test]
    fn duplicate_name_replaces_in_place() {
        let mut reg = StrategyRegistry::new();
        reg.register(stub("a", Outcome::Score(10.0)));
        reg.register(stub("b", Outcome::Score(20.0)));
        reg.register(stub("a", Outcome::Score(30.0)));

        assert_eq!(reg.len(), 2);
        assert_eq!(reg.names(), vec!["a", "b"]);
        let set = reg.evaluate("X", "x", &[], None).unwrap();
        assert_eq!(set.get("a").unwrap().score(), 30.0);
    }

    #[test]
    fn failing_filter_short_circuits() {
        let mut reg = StrategyRegistry::new();
        reg.register(filter("f", Outcome::Score(40.0), 50.0));
        reg.register(stub("s", Outcome::Score(80.0)));

        let set = reg.evaluate("X", "x", &[], None).unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["f"]);
    }

    #[test]
    fn passing_filter_runs_scorers() {
        let mut reg = StrategyRegistry::new();
        reg.register(stub("s", Outcome::Score(80.0)));
        reg.register(filter("f", Outcome::Score(60.0), 50.0));

        let set = reg.evaluate("X", "x", &[], None).unwrap();
        // filters always run first
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["f", "s"]);
    }

    #[test]
    fn filter_error_counts_as_rejection() {
        let mut reg = StrategyRegistry::new();
        reg.register(filter("f", Outcome::Fail, 0.0));
        reg.register(stub("s", Outcome::Score(80.0)));

        let set = reg.evaluate("X", "x", &[], None).unwrap();
        assert_eq!(set.len(), 1);
        let v = set.get("f").unwrap();
        assert!(!v.is_qualified());
        assert!(v.reason().contains("boom"));
    }

    #[test]
    fn scorer_error_becomes_failed_verdict() {
        let mut reg = StrategyRegistry::new();
        reg.register(stub("bad", Outcome::Fail));
        reg.register(stub("good", Outcome::Score(70.0)));

        let set = reg.evaluate_flat("X", "x", &[], None).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("bad").unwrap().score(), 0.0);
        assert_eq!(set.get("good").unwrap().score(), 70.0);
    }

    #[test]
    fn invalid_verdict_propagates() {
        let mut reg = StrategyRegistry::new();
        reg.register(stub("broken", Outcome::Broken));
        let err = reg.evaluate("X", "x", &[], None).unwrap_err();
        assert!(matches!(err, ScreenerError::InvalidVerdict { .. }));
    }

    #[test]
    fn flat_mode_ignores_filters() {
        let mut reg = StrategyRegistry::new();
        reg.register(filter("f", Outcome::Score(10.0), 100.0));
        reg.register(stub("s", Outcome::Score(80.0)));
        assert_eq!(reg.evaluate_flat("X", "x", &[], None).unwrap().len(), 2);
    }

    #[test]
    fn explicit_names_override_enabled_flag() {
        let mut reg = StrategyRegistry::new();
        reg.register(stub("a", Outcome::Score(10.0)));
        reg.register(stub("b", Outcome::Score(20.0)));
        reg.set_enabled("a", false).unwrap();

        let all = reg.evaluate("X", "x", &[], None).unwrap();
        assert_eq!(all.names().collect::<Vec<_>>(), vec!["b"]);

        let names = vec!["b".to_string(), "missing".to_string(), "a".to_string()];
        let picked = reg.evaluate("X", "x", &[], Some(&names)).unwrap();
        assert_eq!(picked.names().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn weight_and_enable_by_name() {
        let mut reg = StrategyRegistry::new();
        reg.register(stub("a", Outcome::Score(10.0)));
        reg.register(filter("f", Outcome::Score(10.0), 50.0));
        reg.set_weight("a", 0.6).unwrap();
        reg.set_weight("f", 0.4).unwrap();

        assert!((reg.total_weight() - 1.0).abs() < 1e-12);
        assert_eq!(reg.filter_names(), vec!["f".to_string()]);
        assert_eq!(reg.weights().get("a"), Some(&0.6));
        assert!(matches!(
            reg.set_weight("zzz", 1.0),
            Err(ScreenerError::UnknownStrategy(_))
        ));
        assert!(matches!(
            reg.set_weight("a", -1.0),
            Err(ScreenerError::NegativeWeight(_))
        ));

        reg.set_enabled("f", false).unwrap();
        assert!(reg.filter_names().is_empty());
        assert!((reg.total_weight() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn unregister_and_clear() {
        let mut reg = StrategyRegistry::new();
        reg.register(stub("a", Outcome::Score(10.0)));
        reg.register(stub("b", Outcome::Score(10.0)));
        assert!(reg.unregister("a").is_some());
        assert!(reg.unregister("a").is_none());
        assert!(!reg.contains("a"));
        reg.clear();
        assert!(reg.is_empty());
    }

    #[test]
    fn batch_evaluates_each_security() {
        let mut reg = StrategyRegistry::new();
        reg.register(stub("a", Outcome::Score(10.0)));
        let securities = vec![
            ("000001.SZ".to_string(), "PAB".to_string(), Vec::new()),
            ("600000.SH".to_string(), "SPDB".to_string(), Vec::new()),
        ];
        let out = reg.evaluate_batch(&securities, None).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out["600000.SH"].get("a").unwrap().name(), "SPDB");
    }
}
