mod docs;
mod logging;

use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{LevelFilter, error};

use docs::pipeline;

/// Resolve inherited XML documentation comments.
///
/// Walks the inheritance graph described by reflection data files and
/// replaces every `<inheritdoc/>` directive in the comments files with the
/// documentation it inherits, writing a single merged comments document.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Reflection data file or directory (repeatable)
    #[arg(short, long, required = true)]
    reflection: Vec<PathBuf>,

    /// XML comments file or directory (repeatable)
    #[arg(short, long, required = true)]
    comments: Vec<PathBuf>,

    /// Path for the merged comments document
    #[arg(short, long)]
    output: PathBuf,

    /// Maximum comments files kept parsed in memory (default: all)
    #[arg(long)]
    cache_size: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(e) = logging::init_logger(level) {
        eprintln!("Failed to initialize logger: {}", e);
        process::exit(1);
    }

    match pipeline::run(&cli.reflection, &cli.comments, &cli.output, cli.cache_size).await {
        Ok(summary) => {
            if summary.warnings > 0 {
                log::warn!("{} member(s) left unresolved", summary.warnings);
            }
        }
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
