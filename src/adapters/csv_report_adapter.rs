//! CSV export of rankings and per-strategy statistics.

use crate::domain::error::ScreenerError;
use crate::domain::scoring::{RankedEntry, StrategyPerformance};
use crate::ports::report_port::ReportPort;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn writer(output_path: &Path) -> Result<csv::Writer<fs::File>, ScreenerError> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        csv::Writer::from_path(output_path).map_err(csv_error)
    }
}

fn csv_error(e: csv::Error) -> ScreenerError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => ScreenerError::Io(io),
        other => ScreenerError::DataSource {
            reason: format!("CSV write error: {:?}", other),
        },
    }
}

fn fmt2(v: f64) -> String {
    format!("{:.2}", v)
}

impl ReportPort for CsvReportAdapter {
    fn write_ranking(
        &self,
        entries: &[RankedEntry],
        output_path: &Path,
        include_details: bool,
    ) -> Result<(), ScreenerError> {
        // one score column per strategy seen anywhere in the ranking
        let strategies: BTreeSet<&str> = entries
            .iter()
            .flat_map(|e| e.score.strategy_scores.iter().map(|(n, _)| n.as_str()))
            .collect();

        let mut wtr = Self::writer(output_path)?;
        let mut header: Vec<String> = [
            "rank",
            "ts_code",
            "name",
            "weighted_score",
            "total_score",
            "confidence",
            "qualified_count",
            "qualified_strategies",
            "price",
            "trade_date",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        header.extend(strategies.iter().map(|s| format!("{}_score", s)));
        if include_details {
            header.push("details".to_string());
        }
        wtr.write_record(&header).map_err(csv_error)?;

        for entry in entries {
            let s = &entry.score;
            let mut record = vec![
                entry.rank.to_string(),
                s.code.clone(),
                s.name.clone(),
                fmt2(s.weighted_score),
                fmt2(s.total_score),
                format!("{:.3}", s.confidence),
                s.qualified_count().to_string(),
                s.qualified.join(";"),
                fmt2(s.price),
                s.trade_date.map(|d| d.to_string()).unwrap_or_default(),
            ];
            record.extend(
                strategies
                    .iter()
                    .map(|name| s.strategy_score(name).map(fmt2).unwrap_or_default()),
            );
            if include_details {
                let details: Vec<String> = s
                    .verdicts
                    .iter()
                    .flat_map(|v| {
                        v.details()
                            .iter()
                            .map(move |(k, d)| format!("{}.{}={}", v.strategy(), k, d))
                    })
                    .collect();
                record.push(details.join(";"));
            }
            wtr.write_record(&record).map_err(csv_error)?;
        }

        wtr.flush()?;
        info!(path = %output_path.display(), rows = entries.len(), "ranking written");
        Ok(())
    }

    fn write_performance(
        &self,
        stats: &BTreeMap<String, StrategyPerformance>,
        output_path: &Path,
    ) -> Result<(), ScreenerError> {
        let mut wtr = Self::writer(output_path)?;
        wtr.write_record([
            "strategy",
            "average_score",
            "max_score",
            "min_score",
            "qualified_count",
            "total_count",
            "qualification_rate",
        ])
        .map_err(csv_error)?;

        for (name, p) in stats {
            wtr.write_record([
                name.clone(),
                fmt2(p.average_score),
                fmt2(p.max_score),
                fmt2(p.min_score),
                p.qualified_count.to_string(),
                p.total_count.to_string(),
                format!("{:.4}", p.qualification_rate),
            ])
            .map_err(csv_error)?;
        }

        wtr.flush()?;
        Ok(())
    }
}
