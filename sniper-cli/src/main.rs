//! Sniper CLI: evaluate a market snapshot or watch a symbol.
//!
//! Commands:
//! - `evaluate`: one evaluation from CSV/TOML files on disk
//! - `watch`: poll a feed on a fixed cadence and print one line per cycle
//! - `config`: print the default configuration, or validate a file

mod logging;

use anyhow::{bail, Context, Result};
use chrono::{Duration as ChronoDuration, Local, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use sniper_core::daily::DailyReport;
use sniper_core::data::{CircuitBreaker, CsvFeed, FeedError, MarketFeed, MarketSnapshot, YahooFeed};
use sniper_core::domain::{Position, RealtimeOverride};
use sniper_core::validity::PriceSource;
use sniper_core::{
    evaluator_for, Evaluation, EvaluationMode, ModeReport, ReportStatus, SignalReport,
    SniperConfig, StopMode, TrailingState,
};

#[derive(Parser)]
#[command(
    name = "sniper",
    about = "Sniper CLI: intraday breakout signal and phased trailing stop"
)]
struct Cli {
    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one snapshot read from a data directory.
    Evaluate {
        /// Directory holding <SYMBOL>.intraday.csv, <SYMBOL>.reference.toml, etc.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Symbol to evaluate (e.g., 2330).
        #[arg(long)]
        symbol: String,

        /// Evaluation mode: intraday or daily.
        #[arg(long, default_value = "intraday")]
        mode: EvaluationMode,

        /// Cost basis of an existing position. Omit for a paper stop.
        #[arg(long)]
        cost: Option<f64>,

        /// Stop shown last time; only used with stop_mode = "ratchet".
        #[arg(long)]
        previous_stop: Option<f64>,

        /// Session-local evaluation time (YYYY-MM-DDTHH:MM). Defaults to now.
        #[arg(long)]
        now: Option<String>,

        /// Real-time price; replaces the last close and any quote file.
        #[arg(long)]
        override_price: Option<f64>,

        /// Path to a TOML config file. Defaults to built-in thresholds.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the evaluation as JSON instead of a report.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Poll a feed and evaluate on a fixed cadence.
    Watch {
        /// Symbol to watch.
        #[arg(long)]
        symbol: String,

        /// Data source.
        #[arg(long, value_enum, default_value_t = Source::Yahoo)]
        source: Source,

        /// Data directory for --source csv.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Evaluation mode: intraday or daily.
        #[arg(long, default_value = "intraday")]
        mode: EvaluationMode,

        /// Seconds between cycles.
        #[arg(long, default_value_t = 60)]
        interval: u64,

        /// Cost basis of an existing position. Omit for a paper stop.
        #[arg(long)]
        cost: Option<f64>,

        /// Stop after this many cycles. Runs until interrupted when omitted.
        #[arg(long)]
        iterations: Option<u64>,

        /// Exchange UTC offset in hours. Defaults to the machine's local time.
        #[arg(long, allow_hyphen_values = true)]
        utc_offset: Option<f64>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the default configuration as TOML.
    Config {
        /// Validate this file and print the effective configuration instead.
        #[arg(long)]
        check: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Source {
    Yahoo,
    Csv,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_json)?;

    match cli.command {
        Commands::Evaluate {
            data_dir,
            symbol,
            mode,
            cost,
            previous_stop,
            now,
            override_price,
            config,
            json,
        } => run_evaluate(EvaluateArgs {
            data_dir,
            symbol,
            mode,
            cost,
            previous_stop,
            now,
            override_price,
            config,
            json,
        }),
        Commands::Watch {
            symbol,
            source,
            data_dir,
            mode,
            interval,
            cost,
            iterations,
            utc_offset,
            config,
        } => run_watch(WatchArgs {
            symbol,
            source,
            data_dir,
            mode,
            interval,
            cost,
            iterations,
            utc_offset,
            config,
        }),
        Commands::Config { check } => run_config(check.as_deref()),
    }
}

struct EvaluateArgs {
    data_dir: PathBuf,
    symbol: String,
    mode: EvaluationMode,
    cost: Option<f64>,
    previous_stop: Option<f64>,
    now: Option<String>,
    override_price: Option<f64>,
    config: Option<PathBuf>,
    json: bool,
}

struct WatchArgs {
    symbol: String,
    source: Source,
    data_dir: PathBuf,
    mode: EvaluationMode,
    interval: u64,
    cost: Option<f64>,
    iterations: Option<u64>,
    utc_offset: Option<f64>,
    config: Option<PathBuf>,
}

fn load_config(path: Option<&Path>) -> Result<SniperConfig> {
    match path {
        Some(path) => SniperConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(SniperConfig::default()),
    }
}

fn parse_now(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in [
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(ts);
        }
    }
    bail!("invalid --now '{raw}', expected YYYY-MM-DDTHH:MM")
}

fn position_from(cost: Option<f64>) -> Result<Option<Position>> {
    match cost {
        Some(c) if !(c.is_finite() && c > 0.0) => bail!("--cost must be a positive number, got {c}"),
        other => Ok(other.map(Position::new)),
    }
}

fn session_now(utc_offset: Option<f64>) -> NaiveDateTime {
    match utc_offset {
        Some(hours) => {
            Utc::now().naive_utc() + ChronoDuration::seconds((hours * 3600.0).round() as i64)
        }
        None => Local::now().naive_local(),
    }
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let position = position_from(args.cost)?;
    let now = match args.now.as_deref() {
        Some(raw) => parse_now(raw)?,
        None => Local::now().naive_local(),
    };
    if !args.data_dir.is_dir() {
        bail!("data directory does not exist: {}", args.data_dir.display());
    }

    let feed = CsvFeed::new(&args.data_dir);
    let mut snapshot = MarketSnapshot::fetch(&feed, &args.symbol, args.mode)?;
    if let Some(price) = args.override_price {
        snapshot.realtime = Some(RealtimeOverride::new(price));
    }

    let evaluator = evaluator_for(args.mode, config);
    let evaluation = evaluator.evaluate(&snapshot.context(position, args.previous_stop, now));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
    } else {
        print_evaluation(&evaluation);
    }
    Ok(())
}

fn run_watch(args: WatchArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let position = position_from(args.cost)?;
    if args.interval == 0 {
        bail!("--interval must be at least 1 second");
    }
    let ratchet = config.trailing.stop_mode == StopMode::Ratchet;

    let feed: Box<dyn MarketFeed> = match args.source {
        Source::Yahoo => Box::new(YahooFeed::new(Arc::new(CircuitBreaker::default_provider()))?),
        Source::Csv => Box::new(CsvFeed::new(&args.data_dir)),
    };
    let evaluator = evaluator_for(args.mode, config);

    info!(
        symbol = %args.symbol,
        feed = feed.name(),
        mode = %args.mode,
        interval_secs = args.interval,
        "watching"
    );

    let mut previous_stop: Option<f64> = None;
    let mut cycle: u64 = 0;
    loop {
        cycle += 1;
        match MarketSnapshot::fetch(feed.as_ref(), &args.symbol, args.mode) {
            Ok(snapshot) => {
                let now = session_now(args.utc_offset);
                let carried = if ratchet { previous_stop } else { None };
                let evaluation = evaluator.evaluate(&snapshot.context(position, carried, now));
                previous_stop = evaluation.trailing.map(|t| t.stop_price);
                println!("{}", summary_line(&evaluation));
            }
            Err(FeedError::CircuitBreakerTripped) => {
                bail!("data provider has blocked requests; stopping watch")
            }
            Err(e) => warn!(cycle, error = %e, "fetch failed; skipping cycle"),
        }

        if args.iterations.is_some_and(|n| cycle >= n) {
            break;
        }
        std::thread::sleep(Duration::from_secs(args.interval));
    }
    Ok(())
}

fn run_config(check: Option<&Path>) -> Result<()> {
    let config = load_config(check)?;
    if let Some(path) = check {
        eprintln!("{} is valid", path.display());
    }
    print!("{}", config.to_toml_string()?);
    Ok(())
}

// ── Rendering ────────────────────────────────────────────────────────

fn summary_line(evaluation: &Evaluation) -> String {
    let head = format!(
        "{} {} {}",
        evaluation.evaluated_at.format("%Y-%m-%d %H:%M:%S"),
        evaluation.symbol,
        evaluation.mode()
    );
    let body = match &evaluation.report {
        ModeReport::Intraday(signal) => match signal.first_failure() {
            None => "SIGNAL".to_string(),
            Some(reason) => format!("no signal ({reason})"),
        },
        ModeReport::Daily(Some(daily)) => {
            let age = daily.age_days(evaluation.evaluated_at.date());
            let stale = if age > 0 {
                format!(" [last bar {}]", daily.last_date)
            } else {
                String::new()
            };
            format!("{} ({}){stale}", daily.action, daily.action.reason())
        }
        ModeReport::Daily(None) => "no daily data".to_string(),
    };
    let stop = evaluation
        .trailing
        .map(|t| format!(" | stop {:.2} [{}]", t.stop_price, t.phase))
        .unwrap_or_default();
    format!("{head} | {body}{stop}")
}

fn print_evaluation(evaluation: &Evaluation) {
    println!();
    println!(
        "=== {} @ {} ({}) ===",
        evaluation.symbol,
        evaluation.evaluated_at.format("%Y-%m-%d %H:%M"),
        evaluation.mode()
    );
    match &evaluation.report {
        ModeReport::Intraday(signal) => print_signal(signal),
        ModeReport::Daily(Some(daily)) => print_daily(daily, evaluation.evaluated_at.date()),
        ModeReport::Daily(None) => println!("No daily bars."),
    }
    match &evaluation.trailing {
        Some(trailing) => print_trailing(trailing),
        None => {
            println!();
            println!("No price available; no stop computed.");
        }
    }
    println!();
}

fn check_mark(ok: bool) -> &'static str {
    if ok {
        "pass"
    } else {
        "FAIL"
    }
}

fn print_signal(signal: &SignalReport) {
    match signal.status {
        ReportStatus::NoData => {
            println!("Status:         no data");
            return;
        }
        ReportStatus::Stale => {
            match signal.stale_since {
                Some(date) => println!("Status:         stale (last bar {date})"),
                None => println!("Status:         stale"),
            }
            println!("Signal:         none (not evaluated on stale data)");
            return;
        }
        ReportStatus::Evaluated => {}
    }

    let source = match signal.price_source {
        Some(PriceSource::Realtime) => "real-time quote",
        Some(PriceSource::LastBar) | None => "last bar",
    };
    println!("Status:         evaluated (price from {source})");

    if let Some(m) = &signal.metrics {
        println!();
        println!("--- Candle ---");
        println!("Close:          {:.2} (prev {:.2})", m.close, m.previous_close);
        println!("Session Open:   {:.2}", m.session_open);
        println!("Trend:          {:.2}%", m.trend_pct);
        println!("Body:           {:.2}%", m.body_pct);
        println!("Shadow Ratio:   {:.3}", m.shadow_ratio);
    }
    if let Some(v) = &signal.volume {
        let required = signal
            .required_volume_ratio_pct
            .map(|r| format!("{r:.0}%"))
            .unwrap_or_else(|| "n/a".into());
        println!(
            "Volume Ratio:   {:.1}% (required {required})",
            v.volume_ratio_pct
        );
    }

    println!();
    println!("--- Checks ---");
    println!("Qualify:        {}", check_mark(signal.qualifies));
    println!("Shadow:         {}", check_mark(signal.shadow_ok));
    println!("Volume:         {}", check_mark(signal.volume_ok));
    println!("Time:           {}", check_mark(signal.time_ok));
    println!();
    match signal.first_failure() {
        None => println!("SIGNAL:         BUY"),
        Some(reason) => println!("Signal:         none ({reason})"),
    }
}

fn print_daily(daily: &DailyReport, today: NaiveDate) {
    let fmt_opt = |v: Option<f64>, precision: usize| {
        v.map(|x| format!("{x:.precision$}"))
            .unwrap_or_else(|| "n/a".into())
    };
    match daily.age_days(today) {
        0 => println!("Last Bar:       {} (today)", daily.last_date),
        age => println!("Last Bar:       {} ({age} days old)", daily.last_date),
    }
    println!("Last Close:     {:.2}", daily.last_close);
    println!("Change:         {}%", fmt_opt(daily.change_pct, 2));
    println!("RSI:            {}", fmt_opt(daily.rsi, 1));
    println!("Moving Average: {}", fmt_opt(daily.moving_average, 2));
    println!(
        "Volume:         {} (mean {})",
        daily.last_volume,
        fmt_opt(daily.volume_mean, 0)
    );
    if let Some(trend) = daily.trend {
        println!("Trend:          {trend:?}");
    }
    println!("Action:         {} ({})", daily.action, daily.action.reason());
}

fn print_trailing(t: &TrailingState) {
    println!();
    println!("--- Trailing Stop ---");
    println!("Phase:          {}", t.phase);
    println!("Stop:           {:.2}", t.stop_price);
    if t.is_paper {
        println!("Position:       none (paper stop from {:.2})", t.current_price);
    } else {
        println!("Cost Basis:     {:.2}", t.cost_basis);
        println!("ROI:            {:.2}%", t.roi_pct);
    }
    if t.held_by_ratchet {
        println!("                (held at previous stop)");
    }
}
