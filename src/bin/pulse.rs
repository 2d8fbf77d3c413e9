//! Pulse CLI - Command-line interface for Synheart Pulse
//!
//! Commands:
//! - decode: Decode one heart-rate-measurement payload
//! - analyze: Replay a recorded beat stream through a monitoring session
//! - baseline: Contextualize daily summaries against rolling baselines
//! - confidence: Score session quality from raw inputs
//! - doctor: Diagnose configuration and environment

use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use synheart_pulse::confidence::{self, ConfidenceInputs};
use synheart_pulse::events::CollectingSink;
use synheart_pulse::schema::{decode_hex, parse_ndjson, sort_for_replay};
use synheart_pulse::types::{DailySummary, PhysiologicalBaseline};
use synheart_pulse::{
    BaselineStore, ManualClock, ManualScheduler, MemoryStore, MonitorConfig,
    MonitoringSession, PacketDecoder, SummaryStore, PRODUCER_NAME, PULSE_VERSION, SCHEMA_VERSION,
};

/// Pulse - On-device HRV analytics for beat-interval streams
#[derive(Parser)]
#[command(name = "pulse")]
#[command(author = "Synheart AI Inc")]
#[command(version = PULSE_VERSION)]
#[command(about = "Analyze heart-rate sensor streams", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode one heart-rate-measurement payload
    Decode {
        /// Payload bytes as hex, e.g. "1048e803"
        #[arg(long)]
        hex: String,

        /// Receipt time (RFC 3339), defaults to now
        #[arg(long)]
        timestamp: Option<String>,
    },

    /// Replay a recorded beat stream through a monitoring session
    Analyze {
        /// Input file path, one pulse.beat_record.v1 per line (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Waking baseline heart rate (bpm)
        #[arg(long, requires = "baseline_rmssd")]
        baseline_hr: Option<f64>,

        /// Waking baseline RMSSD (ms)
        #[arg(long, requires = "baseline_hr")]
        baseline_rmssd: Option<f64>,

        /// Monitoring configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the daily summary instead of the full session report
        #[arg(long)]
        daily: bool,

        /// Output format
        #[arg(long, default_value = "json")]
        format: OutputFormat,
    },

    /// Contextualize daily summaries against rolling baselines
    Baseline {
        /// JSON array of daily summaries (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Rolling window in days
        #[arg(long, default_value = "30")]
        window_days: usize,

        /// Load prior history from file
        #[arg(long)]
        load_history: Option<PathBuf>,

        /// Save history to file after processing
        #[arg(long)]
        save_history: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        format: OutputFormat,
    },

    /// Score session quality
    Confidence {
        #[arg(long, default_value = "0")]
        disconnects: u32,

        #[arg(long)]
        duration_hours: f64,

        /// Interval coverage (0-100)
        #[arg(long)]
        coverage: f64,

        /// Sleep phase transitions
        #[arg(long, default_value = "0")]
        transitions: u32,

        /// Heart-rate samples, comma separated
        #[arg(long, value_delimiter = ',')]
        hr: Vec<f64>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        format: OutputFormat,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose && std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    match cli.command {
        Commands::Decode { hex, timestamp } => cmd_decode(&hex, timestamp.as_deref()),

        Commands::Analyze {
            input,
            output,
            baseline_hr,
            baseline_rmssd,
            config,
            daily,
            format,
        } => {
            let baseline = match (baseline_hr, baseline_rmssd) {
                (Some(hr), Some(rmssd)) => Some(PhysiologicalBaseline::new(hr, rmssd)),
                _ => None,
            };
            cmd_analyze(&input, &output, baseline, config.as_deref(), daily, format)
        }

        Commands::Baseline {
            input,
            window_days,
            load_history,
            save_history,
            format,
        } => cmd_baseline(
            &input,
            window_days,
            load_history.as_deref(),
            save_history.as_deref(),
            format,
        ),

        Commands::Confidence {
            disconnects,
            duration_hours,
            coverage,
            transitions,
            hr,
            format,
        } => {
            let inputs = ConfidenceInputs {
                disconnects,
                session_hours: duration_hours,
                coverage_percent: coverage,
                hr_samples: hr,
                state_transitions: transitions,
            };
            let result = confidence::score(&inputs);
            println!("{}", render(&result, &format)?);
            Ok(())
        }

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_decode(hex: &str, timestamp: Option<&str>) -> Result<(), PulseCliError> {
    let timestamp = match timestamp {
        Some(ts) => parse_timestamp(ts)?,
        None => Utc::now(),
    };
    let payload = decode_hex(hex)?;
    let sample = PacketDecoder::decode(&payload, timestamp)?;
    println!("{}", serde_json::to_string_pretty(&sample)?);
    Ok(())
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    baseline: Option<PhysiologicalBaseline>,
    config_path: Option<&Path>,
    daily: bool,
    format: OutputFormat,
) -> Result<(), PulseCliError> {
    let config = load_config(config_path)?;
    let mut records = parse_ndjson(&read_input(input)?)?;
    // The manual clock only moves forward
    sort_for_replay(&mut records);

    let Some(first) = records.first() else {
        return Err(PulseCliError::NoRecords);
    };
    let start = first.timestamp;

    // Session time follows the recording; ticks fire at recorded time, not wall time
    let clock = ManualClock::new(start);
    let ticks = ManualScheduler::new();
    let sink = Arc::new(CollectingSink::new());
    let tick_period = config.sleep.tick_interval();
    let session = MonitoringSession::new(
        config,
        Arc::new(clock.clone()),
        Box::new(ticks.clone()),
        sink.clone(),
    )?;
    session.start()?;
    if let Some(baseline) = baseline {
        session.set_baseline(baseline)?;
    }

    let mut next_tick = start + tick_period;
    let mut skipped = 0usize;
    for record in &records {
        fire_due_ticks(&clock, &ticks, &mut next_tick, tick_period, record.timestamp);
        clock.set(record.timestamp);

        let sample = match record.to_sample() {
            Ok(sample) => sample,
            Err(e) => {
                log::warn!("skipping record at {}: {}", record.timestamp, e);
                skipped += 1;
                continue;
            }
        };
        session.ingest_sample(sample)?;
    }

    let end = records
        .last()
        .map(|r| r.timestamp)
        .unwrap_or(start);
    fire_due_ticks(&clock, &ticks, &mut next_tick, tick_period, end);
    clock.set(end);
    let report = session.stop();

    log::info!(
        "replayed {} records ({} skipped), {} ticks, {} events",
        records.len(),
        skipped,
        ticks.fired(),
        sink.events().len()
    );

    let output_data = if daily {
        let summary = report.to_daily_summary(start.date_naive())?;
        render(&summary, &format)?
    } else {
        render(&report, &format)?
    };
    write_output(output, &output_data)
}

/// Fire every tick due at or before `until`, advancing the clock to each one
fn fire_due_ticks(
    clock: &ManualClock,
    ticks: &ManualScheduler,
    next_tick: &mut DateTime<Utc>,
    period: Duration,
    until: DateTime<Utc>,
) {
    while *next_tick <= until {
        clock.set(*next_tick);
        ticks.fire();
        *next_tick = *next_tick + period;
    }
}

fn cmd_baseline(
    input: &Path,
    window_days: usize,
    load_history: Option<&Path>,
    save_history: Option<&Path>,
    format: OutputFormat,
) -> Result<(), PulseCliError> {
    let mut summaries: Vec<DailySummary> = serde_json::from_str(&read_input(input)?)?;
    if summaries.is_empty() {
        return Err(PulseCliError::NoRecords);
    }
    summaries.sort_by_key(|s| s.date);

    let mut baselines = match load_history {
        Some(path) => BaselineStore::from_json(&fs::read_to_string(path)?)?,
        None => BaselineStore::new(window_days),
    };

    let store = MemoryStore::new();
    for summary in summaries {
        let contextualized = baselines.contextualize(summary);
        store.save_daily_summary(contextualized)?;
    }

    let (from, to) = date_span(&baselines)?;
    let report = BaselineReport {
        summaries: store.daily_summaries(from, to)?,
        trend_7d: baselines.hrv_trend(),
        physiological_baseline: baselines.physiological_baseline(),
    };

    if let Some(path) = save_history {
        fs::write(path, baselines.to_json()?)?;
    }

    println!("{}", render(&report, &format)?);
    Ok(())
}

fn date_span(store: &BaselineStore) -> Result<(NaiveDate, NaiveDate), PulseCliError> {
    let history = store.history();
    match (history.first(), history.last()) {
        (Some(first), Some(last)) => Ok((first.date, last.date)),
        _ => Err(PulseCliError::NoRecords),
    }
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), PulseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "pulse_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pulse version {}", PULSE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    // Check configuration file if provided
    if let Some(path) = config_path {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match MonitorConfig::from_json(&content) {
                    Ok(config) => checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Config valid (tick {}s, window {}s, buffer {})",
                            config.sleep.tick_interval_secs,
                            config.sleep.window_duration_secs,
                            config.buffer.capacity
                        ),
                    }),
                    Err(e) => checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: e.to_string(),
                    }),
                },
                Err(e) => checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read config file: {}", e),
                }),
            }
        } else {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist, defaults apply".to_string(),
            });
        }
    } else {
        let defaults = MonitorConfig::default();
        checks.push(DoctorCheck {
            name: "config".to_string(),
            status: if defaults.validate().is_ok() {
                CheckStatus::Ok
            } else {
                CheckStatus::Error
            },
            message: "Using built-in defaults".to_string(),
        });
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay input ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PULSE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulse Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig, PulseCliError> {
    match path {
        Some(path) => Ok(MonitorConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(MonitorConfig::default()),
    }
}

fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>, PulseCliError> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PulseCliError::ParseError(format!("Invalid timestamp '{}': {}", ts, e)))
}

fn read_input(input: &Path) -> Result<String, PulseCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), PulseCliError> {
    if output.to_string_lossy() == "-" {
        println!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn render<T: serde::Serialize>(value: &T, format: &OutputFormat) -> Result<String, PulseCliError> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(value)?,
    })
}

// Error types

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Compute(synheart_pulse::ComputeError),
    Json(serde_json::Error),
    NoRecords,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<synheart_pulse::ComputeError> for PulseCliError {
    fn from(e: synheart_pulse::ComputeError) -> Self {
        PulseCliError::Compute(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        use synheart_pulse::ComputeError;

        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::MalformedInput(_) => {
                        ("MALFORMED_INPUT", "Check the payload against the heart-rate-measurement layout")
                    }
                    ComputeError::InvalidConfig(_) => ("INVALID_CONFIG", "Run 'pulse doctor --config <file>'"),
                    ComputeError::InsufficientData(_) => {
                        ("INSUFFICIENT_DATA", "Provide a baseline and at least one full tick of beats")
                    }
                    _ => ("PARSE_ERROR", "Ensure input matches the pulse.beat_record.v1 schema"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            PulseCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct BaselineReport {
    summaries: Vec<DailySummary>,
    trend_7d: f64,
    physiological_baseline: Option<PhysiologicalBaseline>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
