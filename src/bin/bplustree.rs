use std::error::Error;
use std::fs;
use std::path::PathBuf;

use bplus_tree::script::Session;
use bplus_tree::BPlusTree;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bplustree", version, about = "Run a B+ tree command script")]
struct Cli {
    #[arg(value_name = "INPUT", help = "Script with one command per line")]
    input: PathBuf,

    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "output_file.txt",
        help = "File receiving one line per search"
    )]
    output: PathBuf,

    #[arg(long, value_name = "N", help = "Create a tree of this order before the script runs")]
    order: Option<usize>,

    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "warn",
        help = "Log filter used when RUST_LOG is not set"
    )]
    log_level: String,

    #[arg(long, help = "Validate the tree after every insert and delete")]
    check: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let script = fs::read_to_string(&cli.input).inspect_err(|err| {
        error!(path = %cli.input.display(), "failed to read input file: {err}");
    })?;

    let session = match cli.order {
        Some(order) => Session::with_tree(BPlusTree::new(order)?),
        None => Session::new(),
    };
    let output = session.validating(cli.check).run(&script)?;

    let mut contents = output.join("\n");
    if !contents.is_empty() {
        contents.push('\n');
    }
    fs::write(&cli.output, contents).inspect_err(|err| {
        error!(path = %cli.output.display(), "failed to write output file: {err}");
    })?;

    info!(lines = output.len(), path = %cli.output.display(), "wrote search results");
    Ok(())
}

fn init_tracing(level: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .try_init()?;
    Ok(())
}
