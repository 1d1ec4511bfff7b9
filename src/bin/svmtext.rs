use std::io::{self, Read};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use serde_json::json;
use svmtext::config::{BuildConfig, IngestConfig, ToolConfig};
use svmtext::{BuildSummary, Classification, Classifier, IndexBuilder, IndexLayout, LibSvmTools};

const DEFAULT_INDEX: &str = "index";

#[derive(Parser, Debug)]
#[command(author, version, about = "LIBSVM text classification toolkit", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build vocabulary, label table, scaled partitions and model from a labeled corpus
    Build(BuildArgs),
    /// Classify one text against a built index
    Classify(ClassifyArgs),
    /// Predict the held-out partition and report accuracy
    Evaluate(EvaluateArgs),
    /// Print the build summary of an index
    Info(InfoArgs),
}

#[derive(Args, Debug)]
struct ToolArgs {
    /// Rescaling program
    #[arg(long = "svm-scale", value_name = "PATH", default_value = "svm-scale")]
    scale_program: PathBuf,

    /// Training program
    #[arg(long = "svm-train", value_name = "PATH", default_value = "svm-train")]
    train_program: PathBuf,

    /// Prediction program
    #[arg(long = "svm-predict", value_name = "PATH", default_value = "svm-predict")]
    predict_program: PathBuf,

    /// Lower bound passed to the rescaler
    #[arg(long, value_name = "VALUE", allow_hyphen_values = true)]
    scale_lower: Option<f64>,

    /// Upper bound passed to the rescaler
    #[arg(long, value_name = "VALUE", allow_hyphen_values = true)]
    scale_upper: Option<f64>,

    /// Extra argument for the training program (repeat flag)
    #[arg(long = "train-arg", value_name = "ARG", allow_hyphen_values = true)]
    train_args: Vec<String>,

    /// Kill external programs running longer than this many seconds
    #[arg(long = "tool-timeout", value_name = "SECS")]
    timeout_secs: Option<u64>,
}

impl ToolArgs {
    fn tools(&self) -> Result<LibSvmTools> {
        let cfg = ToolConfig::builder()
            .scale_program(&self.scale_program)
            .train_program(&self.train_program)
            .predict_program(&self.predict_program)
            .scale_bounds(self.scale_lower, self.scale_upper)
            .train_args(self.train_args.iter().cloned())
            .timeout(self.timeout_secs.map(Duration::from_secs))
            .build()?;
        Ok(LibSvmTools::new(cfg))
    }
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Corpus directory containing one sub-directory per label
    corpus: PathBuf,

    /// Index directory to write
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_INDEX)]
    output: PathBuf,

    /// Probability of routing a document to the training partition
    #[arg(long, value_name = "P")]
    train_fraction: Option<f64>,

    /// Seed for the train/test split
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Skip model training
    #[arg(long)]
    no_train: bool,

    /// Disable per-document logging/progress
    #[arg(long)]
    no_progress: bool,

    /// Disable recursive directory traversal
    #[arg(long)]
    no_recursive: bool,

    /// Follow symlinks during traversal
    #[arg(long)]
    follow_symlinks: bool,

    #[command(flatten)]
    tools: ToolArgs,
}

#[derive(Args, Debug)]
struct ClassifyArgs {
    /// Index directory to load
    #[arg(short = 'i', long, value_name = "DIR", default_value = DEFAULT_INDEX)]
    index: PathBuf,

    /// Text to classify; read from stdin when omitted
    text: Option<String>,

    /// Print only the N most probable labels
    #[arg(long, value_name = "N")]
    top: Option<NonZeroUsize>,

    /// Emit JSON instead of tab separated lines
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    tools: ToolArgs,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Index directory to load
    #[arg(short = 'i', long, value_name = "DIR", default_value = DEFAULT_INDEX)]
    index: PathBuf,

    /// Emit machine-readable JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    tools: ToolArgs,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Index directory to inspect
    #[arg(short = 'i', long, value_name = "DIR", default_value = DEFAULT_INDEX)]
    index: PathBuf,

    /// Emit machine-readable JSON
    #[arg(long)]
    json: bool,
}

/// Where the text to classify comes from.
#[derive(Debug)]
enum TextSource {
    Inline(String),
    Stdin,
}

impl TextSource {
    fn from_arg(text: Option<String>) -> Self {
        text.map_or(Self::Stdin, Self::Inline)
    }

    fn read(self) -> Result<Vec<u8>> {
        match self {
            Self::Inline(text) => Ok(text.into_bytes()),
            Self::Stdin => {
                let mut buffer = Vec::new();
                io::stdin()
                    .read_to_end(&mut buffer)
                    .context("failed to read text from stdin")?;
                Ok(buffer)
            }
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Build(args) => run_build(args),
        Commands::Classify(args) => run_classify(args),
        Commands::Evaluate(args) => run_evaluate(args),
        Commands::Info(args) => run_info(args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn run_build(args: BuildArgs) -> Result<()> {
    let mut cfg = BuildConfig::builder()
        .seed(args.seed)
        .train_model(!args.no_train)
        .show_progress(!args.no_progress)
        .ingest(IngestConfig {
            recursive: !args.no_recursive,
            follow_symlinks: args.follow_symlinks,
        });
    if let Some(fraction) = args.train_fraction {
        cfg = cfg.train_fraction(fraction);
    }
    let build_cfg = cfg.build()?;
    let tools = args.tools.tools()?;

    let spinner = if args.no_progress {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} building index... {elapsed}")
            .context("invalid progress template")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    };

    let summary = IndexBuilder::new(build_cfg, tools)
        .build(&args.corpus, &args.output)
        .with_context(|| format!("failed to build index from {}", args.corpus.display()));
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let summary = summary?;

    println!(
        "wrote index to {}: {} documents, vocab {}, {} labels",
        args.output.display(),
        summary.documents,
        summary.vocabulary_size,
        summary.labels.len()
    );
    println!(
        "   train {} | test {} | model {} | duration {:.2?}",
        summary.train_instances,
        summary.test_instances,
        if summary.model_trained { "trained" } else { "skipped" },
        summary.duration
    );
    Ok(())
}

fn run_classify(args: ClassifyArgs) -> Result<()> {
    let tools = args.tools.tools()?;
    let classifier = Classifier::open(&args.index, tools)
        .with_context(|| format!("failed to open index {}", args.index.display()))?;
    let text = TextSource::from_arg(args.text).read()?;

    let classification = classifier
        .classify(&text)
        .context("failed to classify text")?;
    let recognized = !matches!(classification, Classification::NoRecognizedTokens);
    let predictions = classification.predictions();
    let limit = args.top.map_or(predictions.len(), NonZeroUsize::get);
    let shown = &predictions[..limit.min(predictions.len())];

    if args.json {
        let record = json!({
            "recognized": recognized,
            "predictions": shown,
        });
        println!("{}", serde_json::to_string(&record)?);
    } else if !recognized {
        info!("no recognised tokens in input");
    } else {
        for prediction in shown {
            println!("{}\t{:.6}", prediction.label, prediction.probability);
        }
    }
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let tools = args.tools.tools()?;
    let classifier = Classifier::open(&args.index, tools)
        .with_context(|| format!("failed to open index {}", args.index.display()))?;
    let report = classifier.evaluate().context("failed to evaluate test partition")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match report.accuracy {
            Some(accuracy) => println!(
                "Accuracy = {:.2}% ({}/{})",
                accuracy * 100.0,
                report.correct,
                report.instances
            ),
            None => println!("Test partition is empty"),
        }
    }
    Ok(())
}

fn run_info(args: InfoArgs) -> Result<()> {
    let layout = IndexLayout::new(&args.index);
    let summary_path = layout.summary();
    if !summary_path.is_file() {
        return Err(anyhow!("no build summary at {}", summary_path.display()));
    }
    let summary = BuildSummary::load(&summary_path)
        .with_context(|| format!("failed to read {}", summary_path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Documents    : {}", summary.documents);
        println!("Empty docs   : {}", summary.empty_documents);
        println!("Vocab size   : {}", summary.vocabulary_size);
        println!("Train / test : {} / {}", summary.train_instances, summary.test_instances);
        println!("Model trained: {}", summary.model_trained);
        println!("Labels       :");
        for label in &summary.labels {
            println!("  {:>3}  {}  ({} documents)", label.class_id, label.label, label.documents);
        }
    }
    Ok(())
}
