//! Data access port trait.

use crate::domain::error::ScreenerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::universe::SecurityInfo;
use chrono::NaiveDate;

pub trait DataPort {
    /// Every security the source knows about.
    fn list_securities(&self) -> Result<Vec<SecurityInfo>, ScreenerError>;

    /// Ascending bars for `code`, up to and including `end_date` when given.
    ///
    /// Returns [`ScreenerError::NoData`] when the source has nothing for `code`.
    fn load_series(&self, code: &str, end_date: Option<NaiveDate>) -> Result<Vec<OhlcvBar>, ScreenerError>;
}
