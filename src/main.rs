use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tsnetsv::dimred::{Method, TsneConfig};
use tsnetsv::{CellSeparator, ParseError, PipelineConfig};

/// Exit status for malformed input, the shell's view of -1.
const MALFORMED_INPUT_EXIT: u8 = 255;

#[derive(Parser, Debug)]
#[command(name = "tsnetsv")]
#[command(about = "Generate TSV output for t-SNE")]
#[command(version)]
struct Args {
    /// Input source (default: stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Input cells separated by whitespace (default: tabs)
    #[arg(short, long)]
    whitespace_cells: bool,

    /// Effective number of neighbours per point
    #[arg(long, default_value_t = 30.0)]
    perplexity: f64,

    /// Features are reduced to at most this many dimensions with PCA before t-SNE
    #[arg(long, default_value_t = 30)]
    initial_dims: usize,

    /// Gradient descent iterations
    #[arg(long, default_value_t = 1000)]
    max_iter: usize,

    /// Barnes-Hut accuracy/speed trade-off
    #[arg(long, default_value_t = 0.5)]
    theta: f64,

    /// Seed for the initial embedding (exact method only)
    #[arg(long)]
    seed: Option<u64>,

    /// t-SNE variant: auto, exact or barnes-hut
    #[arg(long, default_value = "auto")]
    method: Method,

    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(log_level: Option<&str>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = log_level {
        builder.parse_filters(level);
    }
    builder.init();
}

fn open_input(path: Option<&PathBuf>) -> anyhow::Result<Box<dyn BufRead>> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Cannot open input {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    })
}

fn open_output(path: Option<&PathBuf>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("Cannot open output {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    })
}

fn run(args: Args) -> anyhow::Result<usize> {
    let tsne = TsneConfig::builder()
        .perplexity(args.perplexity)
        .initial_dims(args.initial_dims)
        .max_iter(args.max_iter)
        .theta(args.theta)
        .seed(args.seed)
        .method(args.method)
        .build()?;
    let config = PipelineConfig {
        separator: CellSeparator::from_whitespace_flag(args.whitespace_cells),
        tsne,
    };

    let input = open_input(args.input.as_ref())?;
    let output = open_output(args.output.as_ref())?;
    tsnetsv::run(input, output, &config)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    match run(args) {
        Ok(written) => {
            log::info!("wrote {} records", written);
            ExitCode::SUCCESS
        }
        Err(err) => match err.downcast_ref::<ParseError>() {
            Some(parse_error) if !matches!(parse_error, ParseError::Io(_)) => {
                eprintln!("ERROR: {}", parse_error);
                if let Some(hint) = parse_error.hint() {
                    eprintln!("ERROR: {}", hint);
                }
                ExitCode::from(MALFORMED_INPUT_EXIT)
            }
            _ => {
                eprintln!("ERROR: {:#}", err);
                ExitCode::FAILURE
            }
        },
    }
}
