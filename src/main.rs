use std::fs;
use std::io::{self, Read as _};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use error_trapper::config::{discover_config, load_config};
use error_trapper::{CaptureResult, Position, Trapper, TrapperConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Recover the bindings visible where a JavaScript error was thrown", long_about = None)]
struct Cli {
    /// Config file (defaults to the nearest .error-trapper.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Local directory that trace file references map onto
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, default_value_t = false, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate snapshot code for the first application frame of a trace
    Capture {
        /// File holding the stack trace, `-` for stdin
        #[arg(default_value = "-")]
        trace: String,
    },
    /// List the names in scope at a position of a source file
    Scope {
        file: PathBuf,

        #[arg(long)]
        line: u32,

        #[arg(long, default_value_t = 1)]
        column: u32,
    },
    /// Show the frames parsed from a trace
    Frames {
        /// File holding the stack trace, `-` for stdin
        #[arg(default_value = "-")]
        trace: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default())
        .format_timestamp(None)
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref(), cli.root)?;
    let trapper = Trapper::new(&config);

    match cli.command {
        Commands::Capture { trace } => {
            let stack = read_trace(&trace)?;
            let mut outcome = CaptureResult::failure();
            trapper.capture_context(&stack, |result| outcome = result);
            print_json(&outcome, cli.pretty)?;
        }
        Commands::Scope { file, line, column } => {
            let source = fs::read_to_string(&file)
                .with_context(|| format!("failed to read '{}'", file.display()))?;
            let names = trapper
                .names_at(&source, Position::new(line, column))
                .with_context(|| format!("failed to analyze '{}'", file.display()))?;
            print_json(&names, cli.pretty)?;
        }
        Commands::Frames { trace } => {
            let stack = read_trace(&trace)?;
            print_json(&trapper.frames(&stack), cli.pretty)?;
        }
    }

    Ok(())
}

fn resolve_config(path: Option<&Path>, root: Option<PathBuf>) -> Result<TrapperConfig> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => discover_config(&std::env::current_dir()?)?,
    };
    // CLI overrides config
    if root.is_some() {
        config.source_root = root;
    }
    Ok(config)
}

fn read_trace(trace: &str) -> Result<String> {
    if trace == "-" {
        let mut stack = String::new();
        io::stdin()
            .read_to_string(&mut stack)
            .context("failed to read stack trace from stdin")?;
        Ok(stack)
    } else {
        fs::read_to_string(trace).with_context(|| format!("failed to read trace '{trace}'"))
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}
