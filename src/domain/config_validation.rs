//! Configuration validation.
//!
//! Checks every known key of a screening configuration before a run so a
//! typo surfaces as a config error instead of a silently applied default.

use crate::domain::config::{StrategyKind, STRATEGY_SECTION_PREFIX};
use crate::domain::error::ScreenerError;
use crate::domain::ohlcv::parse_trade_date;
use crate::domain::scoring::{AggregationMethod, SortKey};
use crate::domain::universe::parse_codes;
use crate::ports::config_port::{parse_bool, ConfigPort};
use std::str::FromStr;

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_screen_config(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    validate_data(config)?;
    validate_analysis(config)?;
    validate_scoring(config)?;
    validate_output(config)?;
    validate_strategies(config)?;
    Ok(())
}

/// Parses `[section] key` when present; a value that does not parse is an error.
pub(crate) fn read_parsed<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, ScreenerError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            ScreenerError::invalid(section, key, format!("cannot parse '{}'", raw.trim()))
        }),
    }
}

pub(crate) fn read_flag(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<bool>, ScreenerError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| ScreenerError::invalid(section, key, format!("'{}' is not a boolean", raw.trim()))),
    }
}

pub(crate) fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, ScreenerError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ScreenerError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn check_positive(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), ScreenerError> {
    match read_parsed::<f64>(config, section, key)? {
        Some(v) if !(v > 0.0 && v.is_finite()) => Err(ScreenerError::invalid(
            section,
            key,
            format!("{} must be positive", key),
        )),
        _ => Ok(()),
    }
}

fn check_non_negative(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), ScreenerError> {
    match read_parsed::<f64>(config, section, key)? {
        Some(v) if !(v >= 0.0 && v.is_finite()) => Err(ScreenerError::invalid(
            section,
            key,
            format!("{} must be non-negative", key),
        )),
        _ => Ok(()),
    }
}

fn check_min_int(config: &dyn ConfigPort, section: &str, key: &str, min: i64) -> Result<(), ScreenerError> {
    match read_parsed::<i64>(config, section, key)? {
        Some(v) if v < min => Err(ScreenerError::invalid(
            section,
            key,
            format!("{} must be at least {}", key, min),
        )),
        _ => Ok(()),
    }
}

fn check_score_range(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), ScreenerError> {
    match read_parsed::<f64>(config, section, key)? {
        Some(v) if !(0.0..=100.0).contains(&v) => Err(ScreenerError::invalid(
            section,
            key,
            format!("{} must be between 0 and 100", key),
        )),
        _ => Ok(()),
    }
}

fn validate_data(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    require(config, "data", "data_dir")?;
    require(config, "data", "securities_file")?;
    Ok(())
}

fn validate_analysis(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    if let Some(markets) = config.get_list("analysis", "markets") {
        if markets.is_empty() {
            return Err(ScreenerError::invalid(
                "analysis",
                "markets",
                "at least one market is required",
            ));
        }
    }
    if let Some(codes) = config.get_string("analysis", "codes") {
        parse_codes(&codes)?;
    }
    check_min_int(config, "analysis", "min_data_length", 1)?;
    if let Some(raw) = config.get_string("analysis", "analysis_date") {
        if !raw.trim().is_empty() && parse_trade_date(&raw).is_none() {
            return Err(ScreenerError::invalid(
                "analysis",
                "analysis_date",
                "invalid analysis_date format, expected YYYY-MM-DD or YYYYMMDD",
            ));
        }
    }
    check_positive(config, "analysis", "j_value_threshold")?;
    check_min_int(config, "analysis", "volume_analysis_days", 5)?;
    check_positive(config, "analysis", "min_volume_contrast")?;
    check_non_negative(config, "analysis", "min_price_change")?;
    check_min_int(config, "analysis", "kdj_period", 1)?;
    read_flag(config, "analysis", "parallel")?;
    Ok(())
}

fn validate_scoring(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    if let Some(method) = config.get_string("scoring", "method") {
        AggregationMethod::from_str(&method)?;
    }
    if let Some(key) = config.get_string("scoring", "sort_by") {
        SortKey::from_str(&key)?;
    }
    if let Some(count) = read_parsed::<i64>(config, "scoring", "min_qualified_strategies")? {
        if count < 0 {
            return Err(ScreenerError::NegativeMinQualified(count));
        }
    }
    check_score_range(config, "scoring", "min_score_threshold")?;
    Ok(())
}

fn validate_output(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    check_min_int(config, "output", "max_display_count", 0)?;
    read_flag(config, "output", "include_details")?;
    if let Some(level) = config.get_string("output", "log_level") {
        if !LOG_LEVELS.contains(&level.trim().to_lowercase().as_str()) {
            return Err(ScreenerError::invalid(
                "output",
                "log_level",
                format!("unknown log level '{}'", level.trim()),
            ));
        }
    }
    Ok(())
}

fn validate_strategies(config: &dyn ConfigPort) -> Result<(), ScreenerError> {
    for section in config.sections() {
        let Some(name) = section.strip_prefix(STRATEGY_SECTION_PREFIX) else {
            continue;
        };
        if name.trim().is_empty() {
            return Err(ScreenerError::invalid(&section, "kind", "strategy section needs a name"));
        }

        let kind = StrategyKind::resolve(config.get_string(&section, "kind").as_deref(), name)
            .ok_or_else(|| ScreenerError::invalid(&section, "kind", "unknown strategy kind"))?;

        if let Some(weight) = read_parsed::<f64>(config, &section, "weight")? {
            if weight < 0.0 || weight.is_nan() {
                return Err(ScreenerError::NegativeWeight(weight));
            }
        }
        read_flag(config, &section, "enabled")?;
        read_flag(config, &section, "filter")?;
        check_score_range(config, &section, "threshold")?;

        match kind {
            StrategyKind::JValue => check_positive(config, &section, "max_j_value")?,
            StrategyKind::VolumePattern => {
                check_min_int(config, &section, "days", 5)?;
                check_non_negative(config, &section, "min_price_change")?;
                check_positive(config, &section, "min_volume_contrast")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const DATA: &str = "[data]\ndata_dir = /srv/daily\nsecurities_file = /srv/stock_basic.csv\n";

    fn make_config(extra: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(&format!("{}{}", DATA, extra)).unwrap()
    }

    #[test]
    fn full_config_passes() {
        let config = make_config(
            r#"
[analysis]
markets = Main, ChiNext
min_data_length = 30
analysis_date = 2024-06-28
j_value_threshold = 13.0
volume_analysis_days = 20
min_volume_contrast = 1.2
min_price_change = 0.01
kdj_period = 9
parallel = true

[scoring]
method = weighted_average
sort_by = weighted_score
min_qualified_strategies = 1
min_score_threshold = 0

[output]
max_display_count = 20
include_details = false
log_level = info

[strategy.oversold]
kind = j_value
weight = 0.6
max_j_value = 10

[strategy.volume_pattern]
weight = 0.4
days = 30
"#,
        );
        assert!(validate_screen_config(&config).is_ok());
    }

    #[test]
    fn minimal_config_passes() {
        assert!(validate_screen_config(&make_config("")).is_ok());
    }

    #[test]
    fn missing_data_dir_fails() {
        let config = FileConfigAdapter::from_string("[data]\nsecurities_file = s.csv\n").unwrap();
        let err = validate_screen_config(&config).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigMissing { key, .. } if key == "data_dir"));
    }

    #[test]
    fn blank_securities_file_fails() {
        let config = FileConfigAdapter::from_string("[data]\ndata_dir = d\nsecurities_file =\n").unwrap();
        let err = validate_screen_config(&config).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigMissing { key, .. } if key == "securities_file"));
    }

    #[test]
    fn threshold_must_be_positive() {
        let err = validate_screen_config(&make_config("[analysis]\nj_value_threshold = 0\n")).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigInvalid { key, .. } if key == "j_value_threshold"));
    }

    #[test]
    fn unparsable_number_fails() {
        let err = validate_screen_config(&make_config("[analysis]\nkdj_period = nine\n")).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigInvalid { key, .. } if key == "kdj_period"));
    }

    #[test]
    fn short_volume_window_fails() {
        let err = validate_screen_config(&make_config("[analysis]\nvolume_analysis_days = 3\n")).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigInvalid { key, .. } if key == "volume_analysis_days"));
    }

    #[test]
    fn bad_analysis_date_fails() {
        let err = validate_screen_config(&make_config("[analysis]\nanalysis_date = 28/06/2024\n")).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigInvalid { key, .. } if key == "analysis_date"));
        assert!(validate_screen_config(&make_config("[analysis]\nanalysis_date = 20240628\n")).is_ok());
    }

    #[test]
    fn duplicate_codes_fail() {
        let err = validate_screen_config(&make_config("[analysis]\ncodes = 000001.SZ, 000001.sz\n")).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigInvalid { key, .. } if key == "codes"));
    }

    #[test]
    fn empty_market_list_fails() {
        let err = validate_screen_config(&make_config("[analysis]\nmarkets = ,\n")).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigInvalid { key, .. } if key == "markets"));
    }

    #[test]
    fn unknown_method_fails() {
        let err = validate_screen_config(&make_config("[scoring]\nmethod = geometric\n")).unwrap_err();
        assert!(matches!(err, ScreenerError::UnknownAggregation(m) if m == "geometric"));
    }

    #[test]
    fn unknown_sort_key_fails() {
        let err = validate_screen_config(&make_config("[scoring]\nsort_by = price\n")).unwrap_err();
        assert!(matches!(err, ScreenerError::UnknownSortKey(_)));
    }

    #[test]
    fn negative_min_qualified_fails() {
        let err =
            validate_screen_config(&make_config("[scoring]\nmin_qualified_strategies = -1\n")).unwrap_err();
        assert!(matches!(err, ScreenerError::NegativeMinQualified(-1)));
    }

    #[test]
    fn min_score_out_of_range_fails() {
        let err = validate_screen_config(&make_config("[scoring]\nmin_score_threshold = 120\n")).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigInvalid { key, .. } if key == "min_score_threshold"));
    }

    #[test]
    fn bad_boolean_fails() {
        let err = validate_screen_config(&make_config("[output]\ninclude_details = maybe\n")).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigInvalid { key, .. } if key == "include_details"));
    }

    #[test]
    fn unknown_log_level_fails() {
        let err = validate_screen_config(&make_config("[output]\nlog_level = loud\n")).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigInvalid { key, .. } if key == "log_level"));
    }

    #[test]
    fn unknown_strategy_kind_fails() {
        let err = validate_screen_config(&make_config("[strategy.momentum]\nweight = 1\n")).unwrap_err();
        assert!(
            matches!(err, ScreenerError::ConfigInvalid { section, key, .. } if section == "strategy.momentum" && key == "kind")
        );
    }

    #[test]
    fn negative_strategy_weight_fails() {
        let err =
            validate_screen_config(&make_config("[strategy.j_value]\nweight = -0.5\n")).unwrap_err();
        assert!(matches!(err, ScreenerError::NegativeWeight(w) if w == -0.5));
    }

    #[test]
    fn strategy_parameters_are_checked() {
        let err = validate_screen_config(&make_config("[strategy.j_value]\nmax_j_value = -1\n")).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigInvalid { key, .. } if key == "max_j_value"));

        let err = validate_screen_config(&make_config(
            "[strategy.vol]\nkind = volume_pattern\nmin_volume_contrast = 0\n",
        ))
        .unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigInvalid { key, .. } if key == "min_volume_contrast"));
    }

    #[test]
    fn filter_threshold_range_is_checked() {
        let err = validate_screen_config(&make_config(
            "[strategy.j_value]\nfilter = true\nthreshold = 150\n",
        ))
        .unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigInvalid { key, .. } if key == "threshold"));
    }
}
