mod display;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use notedx_ai::{BatchRunner, Evaluator, Predictor, Trainer};
use notedx_core::{ClassifierConfig, ClassifierStrategy, Settings, StoreBackend, StoreConfig};
use notedx_store::{open_store, read_corpus_csv};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "notedx",
    version,
    about = "Classify clinical notes into disease labels"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Labelled CSV with `note_text` and `label` columns.
    #[arg(
        long,
        global = true,
        env = "NOTEDX_DATA_PATH",
        default_value = "data/synthetic_notes.csv"
    )]
    data_path: PathBuf,

    #[arg(long, global = true, env = "NOTEDX_MODEL_DIR", default_value = "models")]
    model_dir: PathBuf,

    #[arg(long, global = true, env = "NOTEDX_REPORTS_DIR", default_value = "reports")]
    reports_dir: PathBuf,

    /// Note store backend: `duckdb` or `memory`.
    #[arg(long, global = true, env = "NOTEDX_DB_BACKEND", default_value = "duckdb")]
    db_backend: StoreBackend,

    /// DuckDB database file (`:memory:` for an ephemeral database).
    #[arg(long, global = true, env = "NOTEDX_DB_PATH", default_value = "./local.duckdb")]
    db_path: PathBuf,

    #[arg(
        long,
        global = true,
        env = "NOTEDX_SEED",
        default_value_t = notedx_core::config::DEFAULT_SEED
    )]
    seed: u64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fit a model on the labelled CSV and write the artifact and holdout report
    Train(TrainArgs),
    /// Predict the label of a single note
    Predict {
        #[arg(long)]
        text: String,
    },
    /// Predict every stored note and save the predictions
    Batch {
        /// Maximum number of notes (0 means all)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Load a labelled CSV into the note store
    LoadCsv {
        path: PathBuf,
    },
    /// Score the persisted model on the whole labelled CSV
    Evaluate,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// `logistic` or `svm`
    #[arg(long, env = "NOTEDX_STRATEGY", default_value = "logistic")]
    strategy: ClassifierStrategy,

    /// Skip probability calibration (svm only); the model then has no
    /// probability output.
    #[arg(long)]
    no_calibrate: bool,

    #[arg(long, default_value_t = 10_000)]
    max_features: usize,
}

impl From<&TrainArgs> for ClassifierConfig {
    fn from(args: &TrainArgs) -> Self {
        Self {
            strategy: args.strategy,
            calibrate: !args.no_calibrate,
            max_features: args.max_features,
            ..ClassifierConfig::default()
        }
    }
}

impl GlobalArgs {
    fn settings(&self) -> Settings {
        Settings {
            data_path: self.data_path.clone(),
            model_dir: self.model_dir.clone(),
            reports_dir: self.reports_dir.clone(),
            seed: self.seed,
            store: StoreConfig {
                backend: self.db_backend,
                path: self.db_path.clone(),
            },
            classifier: ClassifierConfig::default(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("notedx=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = cli.global.settings();
    info!("notedx v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Train(args) => {
            settings.classifier = ClassifierConfig::from(&args);
            cmd_train(&settings)
        }
        Commands::Predict { text } => cmd_predict(&settings, &text),
        Commands::Batch { limit } => cmd_batch(&settings, limit),
        Commands::LoadCsv { path } => cmd_load_csv(&settings, &path),
        Commands::Evaluate => cmd_evaluate(&settings),
    }
}

fn cmd_train(settings: &Settings) -> anyhow::Result<()> {
    let corpus = read_corpus_csv(&settings.data_path)
        .with_context(|| format!("reading {}", settings.data_path.display()))?;

    let outcome = Trainer::new(settings.clone())
        .run(&corpus)
        .context("training failed")?;

    println!(
        "Trained {} model on {} notes ({} classes).",
        outcome.model.strategy(),
        outcome.split.train.len(),
        outcome.model.classes().len()
    );
    println!("  Model:  {}", settings.artifact_path().display());
    println!("  Report: {}", settings.report_path().display());
    println!();
    display::print_report(&outcome.report);
    Ok(())
}

fn cmd_predict(settings: &Settings, text: &str) -> anyhow::Result<()> {
    let predictor = Predictor::load(&settings.artifact_path())?;
    let result = predictor.predict_one(text);
    display::print_prediction(&result);
    Ok(())
}

fn cmd_batch(settings: &Settings, limit: Option<usize>) -> anyhow::Result<()> {
    let predictor = Predictor::load(&settings.artifact_path())?;
    let store = open_store(&settings.store).context("opening note store")?;

    let summary = BatchRunner::new(&predictor, store.as_ref())
        .run(limit)
        .context("batch prediction failed")?;

    println!(
        "Predicted {} of {} notes ({} with empty normalized text).",
        summary.saved, summary.fetched, summary.empty_text
    );
    Ok(())
}

fn cmd_load_csv(settings: &Settings, path: &std::path::Path) -> anyhow::Result<()> {
    let notes = read_corpus_csv(path).with_context(|| format!("reading {}", path.display()))?;
    let store = open_store(&settings.store).context("opening note store")?;
    let written = store.insert_notes(&notes).context("inserting notes")?;

    println!(
        "Loaded {written} notes into the {} store ({}).",
        store.backend(),
        settings.store.path.display()
    );
    Ok(())
}

fn cmd_evaluate(settings: &Settings) -> anyhow::Result<()> {
    let predictor = Predictor::load(&settings.artifact_path())?;
    let corpus = read_corpus_csv(&settings.data_path)
        .with_context(|| format!("reading {}", settings.data_path.display()))?;

    let path = settings.eval_report_path();
    let report = Evaluator::new(&predictor)
        .run(&corpus, &path)
        .context("evaluation failed")?;

    println!("Evaluated {} notes. Report: {}", report.n_samples, path.display());
    println!();
    display::print_report(&report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_predict() {
        let cli = Cli::try_parse_from(["notedx", "predict", "--text", "fever and cough"]).unwrap();
        assert!(matches!(cli.command, Commands::Predict { ref text } if text == "fever and cough"));
    }

    #[test]
    fn parses_batch_limit_and_global_flags() {
        let cli = Cli::try_parse_from([
            "notedx",
            "batch",
            "--limit",
            "25",
            "--db-backend",
            "memory",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Batch { limit: Some(25) }));
        assert_eq!(cli.global.settings().store.backend, StoreBackend::Memory);
    }

    #[test]
    fn train_args_build_classifier_config() {
        let cli = Cli::try_parse_from(["notedx", "train", "--strategy", "svm", "--no-calibrate"])
            .unwrap();
        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        let config = ClassifierConfig::from(&args);
        assert_eq!(config.strategy, ClassifierStrategy::LinearSvm);
        assert!(!config.calibrate);
        assert_eq!(config.max_features, 10_000);
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["notedx", "evaluate", "--db-backend", "mysql"]).is_err());
    }
}
