#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use pcindex::cohort::output::MODEL_FILE;
use pcindex::cohort::{CohortTable, OutputDir, load_cohort};
use pcindex::config::AnalysisConfig;
use pcindex::interval::{DEFAULT_GRID_POINTS, DEFAULT_PC1_RANGE, ReferenceInterval};
use pcindex::model::ReferenceModel;

#[derive(Args)]
pub struct FitArgs {
    /// CSV of reference ("normal") subjects with kappa and lambda columns
    #[arg(long, value_name = "CSV")]
    pub reference: PathBuf,

    /// CSV of subjects known to be abnormal, used for sensitivity
    #[arg(long, value_name = "CSV")]
    pub abnormal: Option<PathBuf>,

    /// CSV of cases to score against the fitted reference
    #[arg(long, value_name = "CSV")]
    pub cases: Option<PathBuf>,

    /// Lower percentile of the reference PC2 distribution (0-100)
    #[arg(long, value_name = "P")]
    pub lower: Option<f64>,

    /// Upper percentile of the reference PC2 distribution (0-100)
    #[arg(long, value_name = "P")]
    pub upper: Option<f64>,

    /// Lower bound of the fixed kappa/lambda ratio interval
    #[arg(long, value_name = "R")]
    pub ratio_lower: Option<f64>,

    /// Upper bound of the fixed kappa/lambda ratio interval
    #[arg(long, value_name = "R")]
    pub ratio_upper: Option<f64>,

    /// TOML file with analysis settings; flags above take precedence
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Directory that result files are written to
    #[arg(long, default_value = "Output")]
    pub output_dir: PathBuf,

    /// Also write the fitted model to model.toml in the output directory
    #[arg(long)]
    pub save_model: bool,
}

#[derive(Args)]
pub struct ScoreArgs {
    /// Model file written by `fit --save-model`
    #[arg(long, value_name = "TOML")]
    pub model: PathBuf,

    /// CSV of cases to score
    #[arg(long, value_name = "CSV")]
    pub cases: PathBuf,

    /// Directory that result files are written to
    #[arg(long, default_value = "Output")]
    pub output_dir: PathBuf,
}

#[derive(Parser)]
#[command(
    name = "pcindex",
    about = "Principal-component reference intervals for paired serum free light chains",
    long_about = "Fits a log-PCA model to a reference cohort of kappa/lambda measurements, \
                 derives a reference interval on the second principal component and compares \
                 it with the fixed kappa/lambda ratio interval."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a reference model and evaluate it
    #[command(
        about = "Fit the PC2 reference interval (outputs: pc_vars.csv, boundaries.csv, performance.csv, cases_pc2.csv)"
    )]
    Fit(FitArgs),

    /// Score cases against a saved model
    #[command(about = "Score cases against a saved model (outputs: cases_pc2.csv)")]
    Score(ScoreArgs),

    /// Display version information
    #[command(about = "Display version information")]
    Version,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();

    let result = match command {
        Some(Commands::Fit(args)) => fit(args),
        Some(Commands::Score(args)) => score(args),
        Some(Commands::Version) => {
            println!("pcindex {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn resolve_config(args: &FitArgs) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            println!("Loading settings from: {}", path.display());
            AnalysisConfig::load(path)?
        }
        None => AnalysisConfig::default(),
    };

    if let Some(lower) = args.lower {
        config.percentiles.lower = lower;
    }
    if let Some(upper) = args.upper {
        config.percentiles.upper = upper;
    }
    if args.ratio_lower.is_some() || args.ratio_upper.is_some() {
        let current = config.ratio_interval;
        config.ratio_interval = ReferenceInterval::new(
            args.ratio_lower.unwrap_or(current.lower()),
            args.ratio_upper.unwrap_or(current.upper()),
        )?;
    }
    config.validate()?;
    Ok(config)
}

fn load_named(
    label: &str,
    path: &Path,
    config: &AnalysisConfig,
) -> Result<CohortTable, Box<dyn std::error::Error>> {
    println!("Loading {} cohort from: {}", label, path.display());
    let table = load_cohort(path, &config.columns)?;
    println!("Loaded {} subjects", table.n_subjects());
    Ok(table)
}

fn fit(args: FitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(&args)?;

    // Every input is read and every result computed before anything is written.
    let reference = load_named("reference", &args.reference, &config)?;
    let abnormal = args
        .abnormal
        .as_ref()
        .map(|path| load_named("abnormal", path, &config))
        .transpose()?;
    let cases = args
        .cases
        .as_ref()
        .map(|path| load_named("case", path, &config))
        .transpose()?;

    println!("Fitting reference model...");
    let fitted = ReferenceModel::fit(&reference.measurements, &config)?;
    let model = fitted.model;

    let performance = model.evaluate(
        reference.measurements.as_view(),
        abnormal.as_ref().map(|table| table.measurements.as_view()),
    )?;
    let boundaries = model.boundaries(DEFAULT_PC1_RANGE, DEFAULT_GRID_POINTS)?;
    let case_scores = match &cases {
        Some(table) => Some(model.score_cases(&table.measurements)?),
        None => None,
    };

    println!(
        "PC2 reference interval: [{:.4}, {:.4}]",
        model.interval.lower(),
        model.interval.upper()
    );
    for (measure, value) in performance.measures() {
        match value {
            Some(rate) => println!("  {measure}: {rate:.4}"),
            None => println!("  {measure}: undefined"),
        }
    }

    let out = OutputDir::create(&args.output_dir)?;
    out.write_pc_vars(&model.summary())?;
    out.write_performance(&performance)?;
    out.write_boundaries(&boundaries)?;
    if let (Some(table), Some(scores)) = (&cases, &case_scores) {
        out.write_cases(table, scores)?;
        let flagged = scores.iter().filter(|score| score.abnormal).count();
        println!("Scored {} cases, {} outside the interval", scores.len(), flagged);
    }
    if args.save_model {
        model.save(&out.join(MODEL_FILE))?;
    }

    println!("Results written to: {}", out.path().display());
    Ok(())
}

fn score(args: ScoreArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading model from: {}", args.model.display());
    let model = ReferenceModel::load(&args.model)?;
    let cases = load_named("case", &args.cases, &model.config)?;
    let scores = model.score_cases(&cases.measurements)?;

    let out = OutputDir::create(&args.output_dir)?;
    let path = out.write_cases(&cases, &scores)?;
    let flagged = scores.iter().filter(|score| score.abnormal).count();
    println!(
        "Scored {} cases, {} outside the interval. Results written to: {}",
        scores.len(),
        flagged,
        path.display()
    );
    Ok(())
}
