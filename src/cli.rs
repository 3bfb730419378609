//! CLI definition and dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvDataAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::analyzer::{AnalysisResults, Analyzer, SecurityReport};
use crate::domain::config::ScreenConfig;
use crate::domain::error::ScreenerError;
use crate::domain::universe::parse_codes;
use crate::logging::init_logging;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "stockscreen", about = "Rule-based stock screener")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// J-value strategy only
    Oversold,
    /// J-value plus volume pattern, both must qualify
    OversoldVolume,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Screen and rank the configured universe
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated codes, full (000001.SZ) or 6-digit
        #[arg(long)]
        codes: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum)]
        preset: Option<Preset>,
    },
    /// Validate a screening configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show indicators and verdicts for one security
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: String,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Screen {
            config,
            codes,
            output,
            preset,
        } => run_screen(&config, codes.as_deref(), output.as_deref(), preset),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, code } => run_info(&config, &code),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_screen_config(path: &Path) -> Result<ScreenConfig, ScreenerError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    ScreenConfig::from_port(&adapter)
}

fn data_adapter(config: &ScreenConfig) -> CsvDataAdapter {
    CsvDataAdapter::new(config.data.data_dir.clone(), config.data.securities_file.clone())
}

/// Runs the analyzer, or one of its presets, over `data`.
pub fn execute_screen(
    config: &ScreenConfig,
    data: &dyn DataPort,
    codes: Option<&[String]>,
    preset: Option<Preset>,
) -> Result<AnalysisResults, ScreenerError> {
    let analyzer = Analyzer::new(data, config)?;
    let a = &config.analysis;
    match preset {
        None => analyzer.run(codes),
        Some(Preset::Oversold) => analyzer.oversold_only(a.j_value_threshold, codes),
        Some(Preset::OversoldVolume) => {
            analyzer.oversold_with_volume(a.j_value_threshold, a.volume_analysis_days, codes)
        }
    }
}

/// `<output_dir>/ranking_<YYYYMMDD>.csv`, or `ranking.csv` with no date.
pub fn default_output_path(config: &ScreenConfig, results: &AnalysisResults) -> PathBuf {
    let name = match results.analysis_date {
        Some(date) => format!("ranking_{}.csv", date.format("%Y%m%d")),
        None => "ranking.csv".to_string(),
    };
    config.data.output_dir.join(name)
}

/// Sibling of `ranking` named `<stem>_performance.csv`.
pub fn performance_path(ranking: &Path) -> PathBuf {
    let stem = ranking
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ranking".to_string());
    ranking.with_file_name(format!("{stem}_performance.csv"))
}

pub fn format_ranking(results: &AnalysisResults, limit: usize) -> String {
    let mut out = String::new();
    let date = results
        .analysis_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(
        out,
        "Screened {} securities as of {} ({} ranked, strategies: {})",
        results.total(),
        date,
        results.ranked.len(),
        results.enabled_strategies.join(", ")
    );
    if results.ranked.is_empty() {
        let _ = writeln!(out, "No securities matched.");
        return out;
    }

    let _ = writeln!(
        out,
        "{:>4}  {:<10} {:<12} {:>8} {:>8} {:>5} {:>4} {:>9}  {:<10}  {}",
        "Rank", "Code", "Name", "Weighted", "Total", "Conf", "Qual", "Price", "Date", "Strategies"
    );
    for row in results.summary().iter().take(limit) {
        let _ = writeln!(
            out,
            "{:>4}  {:<10} {:<12} {:>8.2} {:>8.2} {:>5.2} {:>4} {:>9.2}  {:<10}  {}",
            row.rank,
            row.code,
            row.name,
            row.weighted_score,
            row.total_score,
            row.confidence,
            row.qualified_count,
            row.price,
            row.trade_date.map(|d| d.to_string()).unwrap_or_default(),
            row.qualified_strategies
        );
    }
    if results.ranked.len() > limit {
        let _ = writeln!(out, "... {} more", results.ranked.len() - limit);
    }
    out
}

fn run_screen(
    config_path: &Path,
    codes: Option<&str>,
    output: Option<&Path>,
    preset: Option<Preset>,
) -> Result<(), ScreenerError> {
    let config = load_screen_config(config_path)?;
    init_logging(&config.output.log_level);

    let codes = codes.map(parse_codes).transpose()?;
    let data = data_adapter(&config);
    let results = execute_screen(&config, &data, codes.as_deref(), preset)?;

    print!("{}", format_ranking(&results, config.output.max_display_count));

    let ranking_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(&config, &results));
    let report = CsvReportAdapter::new();
    report.write_ranking(&results.ranked, &ranking_path, config.output.include_details)?;
    report.write_performance(&results.performance, &performance_path(&ranking_path))?;
    eprintln!("\nRanking written to: {}", ranking_path.display());
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), ScreenerError> {
    eprintln!("Validating config: {}", config_path.display());
    let config = load_screen_config(config_path)?;
    let registry = config.build_registry()?;

    eprintln!("\nStrategies:");
    for strategy in registry.all() {
        let role = if strategy.is_filter() {
            format!("filter >= {}", strategy.threshold())
        } else {
            format!("weight {}", strategy.weight())
        };
        let params: Vec<String> = strategy
            .params()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        eprintln!(
            "  {:<16} {:<16} {}{}",
            strategy.name(),
            role,
            params.join(" "),
            if strategy.is_enabled() { "" } else { " (disabled)" }
        );
    }
    eprintln!(
        "\nScoring: {} sorted by {}, min qualified {}",
        config.scoring.method, config.scoring.sort_by, config.scoring.min_qualified
    );
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

pub fn format_report(report: &SecurityReport) -> String {
    let mut out = String::new();
    let bar = &report.latest;
    let fmt_opt = |v: Option<f64>| v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "-".to_string());

    let _ = writeln!(
        out,
        "{} {} [{}] {} bars, latest {}",
        report.info.ts_code, report.info.name, report.info.market, report.bars, bar.date
    );
    let _ = writeln!(
        out,
        "  close {:.2}  volume {:.0}  K {}  D {}  J {}  BBI {}",
        bar.close,
        bar.volume,
        fmt_opt(bar.k),
        fmt_opt(bar.d),
        fmt_opt(bar.j),
        fmt_opt(bar.bbi)
    );
    if let Some(dist) = &report.j_distribution {
        let _ = writeln!(
            out,
            "  J history: mean {:.2} std {:.2} min {:.2} max {:.2}, {} of {} below threshold",
            dist.mean, dist.std, dist.min, dist.max, dist.below_threshold, dist.total
        );
    }
    if let Some(trend) = &report.j_trend {
        let _ = writeln!(
            out,
            "  J trend ({} bars): {} slope {:.3} change {:.1}%",
            trend.window, trend.direction, trend.slope, trend.change_rate_pct
        );
    }
    for verdict in &report.verdicts {
        let _ = writeln!(
            out,
            "  {:<16} {:<4} score {:>6.2} conf {:.2}  {}",
            verdict.strategy(),
            if verdict.is_qualified() { "PASS" } else { "-" },
            verdict.score(),
            verdict.confidence(),
            verdict.reason()
        );
    }
    out
}

fn run_info(config_path: &Path, code: &str) -> Result<(), ScreenerError> {
    let config = load_screen_config(config_path)?;
    init_logging(&config.output.log_level);

    let data = data_adapter(&config);
    let analyzer = Analyzer::new(&data, &config)?;
    print!("{}", format_report(&analyzer.inspect(code)?));
    Ok(())
}
