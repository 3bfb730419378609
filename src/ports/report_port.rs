//! Report output port trait.

use crate::domain::error::ScreenerError;
use crate::domain::scoring::{RankedEntry, StrategyPerformance};
use std::collections::BTreeMap;
use std::path::Path;

/// Port for exporting screening results.
pub trait ReportPort {
    fn write_ranking(
        &self,
        entries: &[RankedEntry],
        output_path: &Path,
        include_details: bool,
    ) -> Result<(), ScreenerError>;

    fn write_performance(
        &self,
        stats: &BTreeMap<String, StrategyPerformance>,
        output_path: &Path,
    ) -> Result<(), ScreenerError>;
}
