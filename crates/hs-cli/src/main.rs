//! hetstat CLI

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hs_core::Dataset;
use hs_inference::generic_ml::{GenericMlConfig, RepeatedEstimate, SecondStage, repeated_combine};
use hs_inference::learners::LearnerKind;
use hs_inference::simulate::{SimulationConfig, simulate_rct};
use hs_inference::wls::CovarianceType;
use std::path::PathBuf;

mod run;

#[derive(Parser)]
#[command(name = "hetstat")]
#[command(about = "hetstat - Generic ML inference on heterogeneous treatment effects")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a randomized experiment (dataset JSON)
    Simulate {
        /// Number of observations
        #[arg(long, default_value = "1000")]
        n: usize,

        /// Number of covariates
        #[arg(long, default_value = "5")]
        features: usize,

        /// Average treatment effect
        #[arg(long, default_value = "1.0", allow_negative_numbers = true)]
        ate: f64,

        /// Slope of the treatment effect in the first covariate
        #[arg(long, default_value = "1.0", allow_negative_numbers = true)]
        het: f64,

        /// Outcome noise standard deviation
        #[arg(long, default_value = "1.0")]
        noise: f64,

        /// Treatment probability
        #[arg(long, default_value = "0.5")]
        propensity: f64,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Best Linear Predictor of the CATE (ate, het)
    Blp {
        #[command(flatten)]
        common: AnalysisArgs,
    },

    /// Group Average Treatment Effects by proxy quantile group
    Gates {
        /// Number of groups
        #[arg(long, default_value = "10")]
        groups: usize,

        #[command(flatten)]
        common: AnalysisArgs,
    },

    /// Run an analysis from a YAML/JSON config
    Run {
        /// Config file (`.yaml`, `.yml` or `.json`)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print version information
    Version,
}

#[derive(Args)]
struct AnalysisArgs {
    /// Input dataset (JSON with x, y, d, propensity)
    #[arg(short, long)]
    input: PathBuf,

    /// Proxy learner: mean, linear, ridge[:lambda], knn[:k]
    #[arg(long, default_value = "linear")]
    learner: LearnerKind,

    /// Share of each treatment arm in the main sample
    #[arg(long, default_value = "0.5")]
    main_fraction: f64,

    /// Use HC1 heteroskedasticity-robust standard errors
    #[arg(long)]
    robust: bool,

    /// RNG seed (split `s` uses `seed + s`)
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Number of independent sample splits
    #[arg(long, default_value = "1")]
    splits: usize,

    /// Print the regression table of the first split to stderr
    #[arg(long)]
    table: bool,

    /// Output file for results (pretty JSON). Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Threads (0 = auto)
    #[arg(long, default_value = "0")]
    threads: usize,
}

impl AnalysisArgs {
    fn config(&self, second_stage: SecondStage, groups: usize) -> GenericMlConfig {
        GenericMlConfig {
            second_stage,
            groups,
            main_fraction: self.main_fraction,
            covariance: if self.robust { CovarianceType::Hc1 } else { CovarianceType::NonRobust },
            seed: self.seed,
            n_splits: self.splits,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Simulate { n, features, ate, het, noise, propensity, seed, output } => {
            let cfg = SimulationConfig { n, n_features: features, ate, het, noise, propensity };
            cmd_simulate(&cfg, seed, output.as_ref())
        }
        Commands::Blp { common } => {
            let cfg = common.config(SecondStage::Blp, GenericMlConfig::default().groups);
            cmd_analysis(&common, &cfg)
        }
        Commands::Gates { groups, common } => {
            let cfg = common.config(SecondStage::Gates, groups);
            cmd_analysis(&common, &cfg)
        }
        Commands::Run { config } => cmd_run(&config),
        Commands::Version => {
            println!("hetstat {}", hs_core::VERSION);
            Ok(())
        }
    }
}

fn cmd_simulate(cfg: &SimulationConfig, seed: u64, output: Option<&PathBuf>) -> Result<()> {
    let data = simulate_rct(cfg, seed)?;
    tracing::info!(n = data.len(), treated = data.n_treated(), seed, "simulated experiment");
    write_json(output, serde_json::to_value(&data)?)
}

fn cmd_analysis(args: &AnalysisArgs, cfg: &GenericMlConfig) -> Result<()> {
    let data = load_dataset(&args.input, args.threads)?;
    let result = analyze(&data, args.learner, cfg, args.table)?;
    write_json(args.output.as_ref(), result)
}

fn cmd_run(config: &PathBuf) -> Result<()> {
    let run = run::read_run_config(config)?;
    tracing::info!(config = %config.display(), input = %run.input.display(), "run config loaded");
    let data = load_dataset(&run.input, run.threads)?;
    let result = analyze(&data, run.learner, &run.analysis, run.table)?;
    write_json(run.output.as_ref(), result)
}

fn analyze(data: &Dataset, learner: LearnerKind, cfg: &GenericMlConfig, table: bool) -> Result<serde_json::Value> {
    let learner = learner.build();
    let est = repeated_combine(learner.as_ref(), data, cfg)?;
    tracing::info!(
        second_stage = %cfg.second_stage,
        learner = learner.name(),
        splits_ok = est.n_splits_ok,
        splits = est.n_splits,
        "analysis complete"
    );

    if let Some(first) = est.splits.first().filter(|_| table) {
        eprintln!("{}", first.summary());
    }

    result_json(data, cfg, &est).map_err(Into::into)
}

fn result_json(
    data: &Dataset,
    cfg: &GenericMlConfig,
    est: &RepeatedEstimate,
) -> serde_json::Result<serde_json::Value> {
    Ok(serde_json::json!({
        "n_obs": data.len(),
        "n_treated": data.n_treated(),
        "second_stage": cfg.second_stage,
        "learner": est.learner,
        "covariance": cfg.covariance.as_str(),
        "main_fraction": cfg.main_fraction,
        "seed": cfg.seed,
        "n_splits": est.n_splits,
        "n_splits_ok": est.n_splits_ok,
        "aggregate": serde_json::to_value(&est.aggregate)?,
        "splits": serde_json::to_value(&est.splits)?,
    }))
}

fn load_dataset(input: &PathBuf, threads: usize) -> Result<Dataset> {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }

    tracing::info!(path = %input.display(), "loading dataset");
    let json = std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let data: Dataset = serde_json::from_str(&json).with_context(|| format!("parsing {}", input.display()))?;
    tracing::info!(n = data.len(), features = data.x.n_cols(), treated = data.n_treated(), "dataset loaded");
    Ok(data)
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
