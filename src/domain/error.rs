//! Domain error types.

/// Top-level error type for stockscreen.
#[derive(Debug, thiserror::Error)]
pub enum ScreenerError {
    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("insufficient data for {code}: have {bars} bars, need {minimum}")]
    InsufficientData {
        code: String,
        bars: usize,
        minimum: usize,
    },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown aggregation method '{0}', expected weighted_average, multiplicative or max_score")]
    UnknownAggregation(String),

    #[error("unknown sort key '{0}', expected total_score, weighted_score, qualified_count or confidence")]
    UnknownSortKey(String),

    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error("strategy weight must be non-negative, got {0}")]
    NegativeWeight(f64),

    #[error("minimum qualified strategy count must be non-negative, got {0}")]
    NegativeMinQualified(i64),

    #[error("strategy '{strategy}' failed: {reason}")]
    Evaluation { strategy: String, reason: String },

    #[error("invalid verdict: {field} = {value} is out of range")]
    InvalidVerdict { field: &'static str, value: f64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScreenerError {
    pub fn evaluation(strategy: &str, reason: impl Into<String>) -> Self {
        ScreenerError::Evaluation {
            strategy: strategy.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        ScreenerError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors that indicate a bug rather than a runtime condition.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScreenerError::InvalidVerdict { .. })
    }
}

impl From<&ScreenerError> for std::process::ExitCode {
    fn from(err: &ScreenerError) -> Self {
        let code: u8 = match err {
            ScreenerError::Io(_) => 1,
            ScreenerError::ConfigParse { .. }
            | ScreenerError::ConfigMissing { .. }
            | ScreenerError::ConfigInvalid { .. }
            | ScreenerError::UnknownAggregation(_)
            | ScreenerError::UnknownSortKey(_)
            | ScreenerError::UnknownStrategy(_)
            | ScreenerError::NegativeWeight(_)
            | ScreenerError::NegativeMinQualified(_) => 2,
            ScreenerError::DataSource { .. } => 3,
            ScreenerError::Evaluation { .. } | ScreenerError::InvalidVerdict { .. } => 4,
            ScreenerError::NoData { .. } | ScreenerError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
