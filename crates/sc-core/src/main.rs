//! Score Calibration Core - batch entry point
//!
//! Reads labelled model outputs from JSON files and emits:
//! - Fitted temperatures and Platt coefficients
//! - Expected Calibration Error with reliability bins
//! - Youden-optimal decision thresholds and ROC curves
//! - Routed decisions for new predictions

use clap::{Args, Parser, Subcommand};
use sc_core::calibrate::{
    expected_calibration_error, fit_platt, fit_temperature, softmax_with_temperature,
    top_class_confidence, CalibrationCurve, CalibrationError, CalibrationQuality,
    TemperatureSearch, BASELINE_TEMPERATURE,
};
use sc_core::config::{load_config, ConfigError, ConfigOptions, ResolvedConfig};
use sc_core::decision::{
    decide, misclassification_probability, score_candidates, Candidate, DecisionThresholds,
    Features, SafetyFlags, ScoringError,
};
use sc_core::exit_codes::ExitCode;
use sc_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};
use sc_core::output::{
    render, ConfigReport, DecisionReport, DecisionRow, EceReport, OutputFormat, PlattReport,
    Render, RocReport, ScoreReport, TemperatureReport, ThresholdReport,
};
use sc_core::threshold::{
    compute_auc, compute_roc_curve, optimize_thresholds_with_metadata, ThresholdError,
    ThresholdResult,
};
use sc_core::log_event;
use sc_math::ScoreMatrix;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Score Calibration Core - calibrate classifier scores and pick decision thresholds
#[derive(Parser)]
#[command(name = "sc-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Explicit config file (overrides SC_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override config directory
    #[arg(long, global = true, env = "SC_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr (human or jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Model version recorded in every log line
    #[arg(long, global = true, env = "SC_MODEL_VERSION")]
    model_version: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a softmax temperature by grid search over NLL
    FitTemperature(FitTemperatureArgs),
    /// Expected Calibration Error with reliability bins
    Ece(EceArgs),
    /// Fit Platt scaling coefficients
    Platt(InputArgs),
    /// Find Youden-optimal auto/escalate thresholds
    OptimizeThresholds(OptimizeArgs),
    /// Compute the ROC curve and AUC
    Roc(InputArgs),
    /// Route predictions into AUTO_RESOLVE / ASK_CLARIFICATION / ESCALATE
    Decide(DecideArgs),
    /// Score candidates from normalized features, then route each request
    Score(ScoreArgs),
    /// Show the resolved configuration
    Config,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// JSON input file ("-" for stdin)
    #[arg(long, short = 'i')]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct FitTemperatureArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Lower end of the temperature grid
    #[arg(long)]
    min: Option<f64>,

    /// Upper end of the temperature grid
    #[arg(long)]
    max: Option<f64>,

    /// Number of grid points
    #[arg(long)]
    steps: Option<usize>,
}

#[derive(Args, Debug)]
struct EceArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Number of equal-width bins
    #[arg(long)]
    bins: Option<usize>,
}

#[derive(Args, Debug)]
struct OptimizeArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Also write the threshold result to this file
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RoutingArgs {
    /// Threshold result written by `optimize-thresholds --output`
    #[arg(long)]
    thresholds: Option<PathBuf>,

    /// Override the auto-resolve threshold
    #[arg(long)]
    auto: Option<f64>,

    /// Override the escalate threshold
    #[arg(long)]
    escalate: Option<f64>,
}

#[derive(Args, Debug)]
struct DecideArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    routing: RoutingArgs,
}

#[derive(Args, Debug)]
struct ScoreArgs {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    routing: RoutingArgs,

    /// Softmax temperature for the candidate scores (overrides config)
    #[arg(long)]
    temperature: Option<f64>,
}

/// `fit-temperature` input.
#[derive(Debug, Deserialize)]
struct TemperatureInput {
    scores: Vec<Vec<f64>>,
    true_indices: Vec<usize>,
}

/// `ece` input.
#[derive(Debug, Deserialize)]
struct EceInput {
    probabilities: Vec<f64>,
    labels: Vec<f64>,
}

/// `platt` input.
#[derive(Debug, Deserialize)]
struct PlattInput {
    scores: Vec<f64>,
    labels: Vec<f64>,
}

/// `optimize-thresholds` and `roc` input.
#[derive(Debug, Deserialize)]
struct ThresholdInput {
    p_mis: Vec<f64>,
    labels: Vec<i32>,
}

/// `decide` input. `p_mis` values are taken as-is; each `probabilities`
/// row is reduced with `1 - max`. `flags` align with the combined sequence.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DecideInput {
    p_mis: Vec<f64>,
    probabilities: Vec<Vec<f64>>,
    flags: Vec<SafetyFlags>,
}

/// One request for `score`.
#[derive(Debug, Deserialize)]
struct ScoreRequest {
    candidates: Vec<Candidate>,
    features: Features,
}

/// `score` input.
#[derive(Debug, Deserialize)]
struct ScoreInput {
    requests: Vec<ScoreRequest>,
}

/// Failure carried back to `main`.
#[derive(Debug)]
struct Failure {
    exit: ExitCode,
    code: u32,
    message: String,
}

impl Failure {
    fn input(message: impl Into<String>) -> Self {
        Self {
            exit: ExitCode::InputError,
            code: 11,
            message: message.into(),
        }
    }

    fn args(message: impl Into<String>) -> Self {
        Self {
            exit: ExitCode::ArgsError,
            code: 10,
            message: message.into(),
        }
    }
}

impl From<CalibrationError> for Failure {
    fn from(err: CalibrationError) -> Self {
        Self {
            exit: ExitCode::from(&err),
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<ScoringError> for Failure {
    fn from(err: ScoringError) -> Self {
        Self {
            exit: ExitCode::from(&err),
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<ThresholdError> for Failure {
    fn from(err: ThresholdError) -> Self {
        Self {
            exit: ExitCode::from(&err),
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<ConfigError> for Failure {
    fn from(err: ConfigError) -> Self {
        Self {
            exit: ExitCode::from(&err),
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<sc_math::MatrixError> for Failure {
    fn from(err: sc_math::MatrixError) -> Self {
        CalibrationError::from(err).into()
    }
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    let log_config = LogConfig::from_env(log_level, cli.global.log_format);
    init_logging(&log_config);

    let mut ctx = LogContext::new(generate_run_id());
    if let Some(version) = &cli.global.model_version {
        ctx = ctx.with_model_version(version.clone());
    }

    let command = command_name(&cli.command);
    log_event!(ctx, INFO, event_names::RUN_STARTED, Stage::Init, "run started", command = command);

    let result = match &cli.command {
        Commands::FitTemperature(args) => run_fit_temperature(&cli.global, &ctx, args),
        Commands::Ece(args) => run_ece(&cli.global, &ctx, args),
        Commands::Platt(args) => run_platt(&cli.global, &ctx, args),
        Commands::OptimizeThresholds(args) => run_optimize(&cli.global, &ctx, args),
        Commands::Roc(args) => run_roc(&cli.global, &ctx, args),
        Commands::Decide(args) => run_decide(&cli.global, &ctx, args),
        Commands::Score(args) => run_score(&cli.global, &ctx, args),
        Commands::Config => run_config(&cli.global, &ctx),
    };

    let exit_code = match result {
        Ok(()) => ExitCode::Clean,
        Err(failure) => output_failure(&cli.global, &ctx, &failure),
    };

    log_event!(
        ctx,
        INFO,
        event_names::RUN_FINISHED,
        Stage::Report,
        "run finished",
        exit_code = exit_code.as_i32()
    );
    std::process::exit(exit_code.as_i32());
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::FitTemperature(_) => "fit-temperature",
        Commands::Ece(_) => "ece",
        Commands::Platt(_) => "platt",
        Commands::OptimizeThresholds(_) => "optimize-thresholds",
        Commands::Roc(_) => "roc",
        Commands::Decide(_) => "decide",
        Commands::Score(_) => "score",
        Commands::Config => "config",
    }
}

fn resolve_config(global: &GlobalOpts, ctx: &LogContext) -> Result<ResolvedConfig, Failure> {
    let options = ConfigOptions {
        config_path: global.config.clone(),
        config_dir: global.config_dir.clone(),
    };
    match load_config(&options) {
        Ok(resolved) => {
            match &resolved.path {
                Some(path) => log_event!(
                    ctx,
                    INFO,
                    event_names::CONFIG_LOADED,
                    Stage::Init,
                    "config loaded",
                    path = display(path.display()),
                    source = display(resolved.source)
                ),
                None => log_event!(
                    ctx,
                    DEBUG,
                    event_names::CONFIG_DEFAULT_USED,
                    Stage::Init,
                    "no config file found, using defaults"
                ),
            }
            Ok(resolved)
        }
        Err(err) => {
            log_event!(
                ctx,
                ERROR,
                event_names::CONFIG_ERROR,
                Stage::Init,
                "config failed to load",
                error = display(&err)
            );
            Err(err.into())
        }
    }
}

fn read_input<T: DeserializeOwned>(path: &Path, ctx: &LogContext) -> Result<T, Failure> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| Failure::input(format!("failed to read stdin: {}", e)))?;
        buf
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| Failure::input(format!("failed to read {}: {}", path.display(), e)))?
    };

    match serde_json::from_str(&content) {
        Ok(value) => {
            log_event!(
                ctx,
                DEBUG,
                event_names::INPUT_LOADED,
                Stage::Load,
                "input loaded",
                path = display(path.display()),
                bytes = content.len()
            );
            Ok(value)
        }
        Err(e) => {
            log_event!(
                ctx,
                WARN,
                event_names::INPUT_INVALID,
                Stage::Load,
                "input rejected",
                path = display(path.display()),
                error = display(&e)
            );
            Err(Failure::input(format!("invalid input {}: {}", path.display(), e)))
        }
    }
}

fn emit<T: Render>(global: &GlobalOpts, ctx: &LogContext, report: &T) -> Result<(), Failure> {
    let text = render(report, global.format).map_err(|e| Failure {
        exit: ExitCode::InternalError,
        code: 20,
        message: format!("failed to render output: {}", e),
    })?;
    println!("{}", text);
    log_event!(
        ctx,
        DEBUG,
        event_names::REPORT_WRITTEN,
        Stage::Report,
        "report written",
        format = display(global.format)
    );
    Ok(())
}

fn run_fit_temperature(
    global: &GlobalOpts,
    ctx: &LogContext,
    args: &FitTemperatureArgs,
) -> Result<(), Failure> {
    let resolved = resolve_config(global, ctx)?;
    let input: TemperatureInput = read_input(&args.input.input, ctx)?;
    let scores = ScoreMatrix::from_rows(input.scores)?;

    let defaults = resolved.config.temperature;
    let search = TemperatureSearch::new(
        args.min.unwrap_or(defaults.min),
        args.max.unwrap_or(defaults.max),
        args.steps.unwrap_or(defaults.steps),
    )?;

    log_event!(
        ctx,
        INFO,
        event_names::CALIBRATE_STARTED,
        Stage::Calibrate,
        "temperature search started",
        samples = scores.n_rows(),
        min = search.min,
        max = search.max,
        steps = search.steps
    );
    let fit = fit_temperature(&scores, &input.true_indices, &search)?;

    let bins = resolved.config.ece_bins;
    let baseline = softmax_with_temperature(&scores, BASELINE_TEMPERATURE)?;
    let (conf_before, correct_before) = top_class_confidence(&baseline, &input.true_indices)?;
    let scaled = softmax_with_temperature(&scores, fit.temperature)?;
    let (conf_after, correct_after) = top_class_confidence(&scaled, &input.true_indices)?;
    let ece_before = expected_calibration_error(&conf_before, &correct_before, bins)?;
    let ece_after = expected_calibration_error(&conf_after, &correct_after, bins)?;

    log_event!(
        ctx,
        INFO,
        event_names::CALIBRATE_FINISHED,
        Stage::Calibrate,
        "temperature fitted",
        temperature = fit.temperature,
        nll_before = fit.nll_before,
        nll_after = fit.nll_after,
        ece_after = ece_after
    );

    let report = TemperatureReport {
        samples: scores.n_rows(),
        candidates: scores.n_cols(),
        fit,
        ece_before,
        ece_after,
        quality: CalibrationQuality::from_ece(ece_after),
    };
    emit(global, ctx, &report)
}

fn run_ece(global: &GlobalOpts, ctx: &LogContext, args: &EceArgs) -> Result<(), Failure> {
    let resolved = resolve_config(global, ctx)?;
    let input: EceInput = read_input(&args.input.input, ctx)?;
    if input.probabilities.is_empty() {
        return Err(CalibrationError::NoData.into());
    }

    let bins = args.bins.unwrap_or(resolved.config.ece_bins);
    if bins == 0 {
        return Err(Failure::args("--bins must be at least 1"));
    }
    let curve = CalibrationCurve::from_probabilities(&input.probabilities, &input.labels, bins)?;
    log_event!(
        ctx,
        INFO,
        event_names::CALIBRATE_FINISHED,
        Stage::Calibrate,
        "ece computed",
        ece = curve.ece,
        mce = curve.mce,
        bins = bins
    );

    let report = EceReport::new(
        input.probabilities.len(),
        curve,
        resolved.config.well_calibrated_ece,
    );
    emit(global, ctx, &report)
}

fn run_platt(global: &GlobalOpts, ctx: &LogContext, args: &InputArgs) -> Result<(), Failure> {
    let resolved = resolve_config(global, ctx)?;
    let input: PlattInput = read_input(&args.input, ctx)?;

    log_event!(
        ctx,
        INFO,
        event_names::CALIBRATE_STARTED,
        Stage::Calibrate,
        "platt fit started",
        samples = input.scores.len()
    );
    let minimizer = resolved.config.platt.minimizer();
    let fit = fit_platt(&input.scores, &input.labels, &minimizer)?;
    if !fit.converged {
        log_event!(
            ctx,
            WARN,
            event_names::CALIBRATE_FINISHED,
            Stage::Calibrate,
            "platt fit hit the iteration cap",
            iterations = fit.iterations
        );
    }

    let report = PlattReport {
        samples: input.scores.len(),
        fit,
    };
    emit(global, ctx, &report)
}

fn run_optimize(global: &GlobalOpts, ctx: &LogContext, args: &OptimizeArgs) -> Result<(), Failure> {
    let input: ThresholdInput = read_input(&args.input.input, ctx)?;

    log_event!(
        ctx,
        INFO,
        event_names::OPTIMIZE_STARTED,
        Stage::Optimize,
        "threshold search started",
        samples = input.p_mis.len()
    );
    let result = optimize_thresholds_with_metadata(&input.p_mis, &input.labels)?;
    let auc = compute_auc(&input.p_mis, &input.labels);

    log_event!(
        ctx,
        INFO,
        event_names::OPTIMIZE_FINISHED,
        Stage::Optimize,
        "thresholds ready",
        threshold_auto = result.threshold_auto,
        threshold_escalate = result.threshold_escalate,
        auc = auc
    );
    let report = ThresholdReport::new(result, auc);
    if !report.ordered {
        log_event!(
            ctx,
            WARN,
            event_names::OPTIMIZE_FINISHED,
            Stage::Optimize,
            "auto threshold exceeds escalate threshold"
        );
    }

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&report.result).map_err(|e| Failure {
            exit: ExitCode::InternalError,
            code: 20,
            message: format!("failed to serialize thresholds: {}", e),
        })?;
        std::fs::write(path, json).map_err(|e| Failure {
            exit: ExitCode::IoError,
            code: 21,
            message: format!("failed to write {}: {}", path.display(), e),
        })?;
        log_event!(
            ctx,
            INFO,
            event_names::REPORT_WRITTEN,
            Stage::Report,
            "thresholds saved",
            path = display(path.display())
        );
    }

    emit(global, ctx, &report)
}

fn run_roc(global: &GlobalOpts, ctx: &LogContext, args: &InputArgs) -> Result<(), Failure> {
    let input: ThresholdInput = read_input(&args.input, ctx)?;
    sc_core::threshold::validate_inputs(&input.p_mis, &input.labels)?;

    let curve = compute_roc_curve(&input.p_mis, &input.labels);
    let auc = compute_auc(&input.p_mis, &input.labels);
    log_event!(
        ctx,
        INFO,
        event_names::OPTIMIZE_FINISHED,
        Stage::Optimize,
        "roc curve built",
        points = curve.len(),
        auc = auc
    );

    let report = RocReport {
        auc,
        curve: curve.sorted_by_fpr(),
    };
    emit(global, ctx, &report)
}

fn resolve_thresholds(
    routing: &RoutingArgs,
    defaults: DecisionThresholds,
    ctx: &LogContext,
) -> Result<DecisionThresholds, Failure> {
    for (flag, value) in [("--auto", routing.auto), ("--escalate", routing.escalate)] {
        if let Some(v) = value {
            if !(0.0..=1.0).contains(&v) {
                return Err(Failure::args(format!("{} must be within [0, 1], got {}", flag, v)));
            }
        }
    }

    let mut thresholds = match &routing.thresholds {
        Some(path) => {
            let result: ThresholdResult = read_input(path, ctx)?;
            DecisionThresholds::from(&result)
        }
        None => defaults,
    };
    if let Some(auto) = routing.auto {
        thresholds.auto = auto;
    }
    if let Some(escalate) = routing.escalate {
        thresholds.escalate = escalate;
    }
    Ok(thresholds)
}

fn run_decide(global: &GlobalOpts, ctx: &LogContext, args: &DecideArgs) -> Result<(), Failure> {
    let resolved = resolve_config(global, ctx)?;
    let thresholds = resolve_thresholds(&args.routing, resolved.config.decision, ctx)?;

    let input: DecideInput = read_input(&args.input.input, ctx)?;
    let p_values: Vec<f64> = input
        .p_mis
        .iter()
        .copied()
        .chain(
            input
                .probabilities
                .iter()
                .map(|row| misclassification_probability(row)),
        )
        .collect();
    if p_values.is_empty() {
        return Err(Failure::input("decide input has no p_mis or probabilities"));
    }

    let rows: Vec<DecisionRow> = p_values
        .iter()
        .enumerate()
        .map(|(i, &p_mis)| {
            let flags = input.flags.get(i).copied().unwrap_or_default();
            DecisionRow {
                p_mis,
                decision: decide(p_mis, &thresholds, &flags),
            }
        })
        .collect();

    let report = DecisionReport::new(thresholds, rows);
    log_event!(
        ctx,
        INFO,
        event_names::DECIDE_FINISHED,
        Stage::Decide,
        "predictions routed",
        auto_resolve = report.auto_resolve,
        ask_clarification = report.ask_clarification,
        escalate = report.escalate
    );
    emit(global, ctx, &report)
}

fn run_score(global: &GlobalOpts, ctx: &LogContext, args: &ScoreArgs) -> Result<(), Failure> {
    let resolved = resolve_config(global, ctx)?;
    let thresholds = resolve_thresholds(&args.routing, resolved.config.decision, ctx)?;
    let mut settings = resolved.config.scoring;
    if let Some(t) = args.temperature {
        settings.temperature = Some(t);
    }

    let input: ScoreInput = read_input(&args.input.input, ctx)?;
    if input.requests.is_empty() {
        return Err(Failure::input("score input has no requests"));
    }

    let results = input
        .requests
        .iter()
        .map(|request| {
            score_candidates(&request.candidates, &request.features, &settings, &thresholds)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let report = ScoreReport::new(thresholds, settings.temperature, results);
    log_event!(
        ctx,
        INFO,
        event_names::SCORE_FINISHED,
        Stage::Decide,
        "requests scored",
        requests = report.results.len(),
        auto_resolve = report.auto_resolve,
        ask_clarification = report.ask_clarification,
        escalate = report.escalate
    );
    emit(global, ctx, &report)
}

fn run_config(global: &GlobalOpts, ctx: &LogContext) -> Result<(), Failure> {
    let resolved = resolve_config(global, ctx)?;
    let report = ConfigReport {
        snapshot: resolved.snapshot(),
        config: resolved.config,
    };
    emit(global, ctx, &report)
}

fn output_failure(global: &GlobalOpts, ctx: &LogContext, failure: &Failure) -> ExitCode {
    if failure.exit.is_internal_error() {
        log_event!(
            ctx,
            ERROR,
            event_names::INTERNAL_ERROR,
            Stage::Report,
            "internal error",
            error_code = failure.code,
            exit_code = failure.exit.as_i32()
        );
    } else {
        log_event!(
            ctx,
            ERROR,
            event_names::RUN_FAILED,
            Stage::Report,
            "command failed",
            error_code = failure.code,
            exit_code = failure.exit.as_i32()
        );
    }

    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "status": "error",
                "run_id": ctx.run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "error": {
                    "code": failure.code,
                    "exit": failure.exit.code_name(),
                    "message": failure.message,
                }
            });
            match serde_json::to_string_pretty(&response) {
                Ok(text) => eprintln!("{}", text),
                Err(_) => eprintln!("error: {}", failure.message),
            }
        }
        OutputFormat::Summary => {
            eprintln!("[{}] {}: {}", ctx.run_id, failure.exit, failure.message);
        }
        OutputFormat::Md => {
            eprintln!("# Error");
            eprintln!();
            eprintln!("{}: {}", failure.exit, failure.message);
        }
    }

    failure.exit
}
