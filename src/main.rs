use std::error::Error;
use std::io;
use std::path::PathBuf;

use clap::Parser;
use marquee::config::{SessionConfig, FILE_ENV};
use marquee::{DocumentFile, MovieStore, Session};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = "Interactive movie collection manager", long_about = None)]
struct Args {
    /// Collection file, loaded at startup and written by `save`
    #[clap(env = FILE_ENV)]
    file: PathBuf,

    /// Attempts per field when entering a movie (0 = unlimited)
    #[clap(long)]
    max_attempts: Option<u32>,

    /// No prompt and no field hints, for piped input
    #[clap(short, long)]
    quiet: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,marquee=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = SessionConfig::from_env();
    if let Some(attempts) = args.max_attempts {
        config = config.with_max_attempts(attempts);
    }
    if args.quiet {
        config = config.quiet();
    }

    if config.show_prompt {
        print_banner();
    }

    let mut document = DocumentFile::open(&args.file)?;
    let mut store = MovieStore::new();
    match document.load_into(&mut store) {
        Ok(report) if report.skipped > 0 => warn!(
            "{} malformed movies in {} were skipped; the file is copied to {} before the next save",
            report.skipped,
            document.path().display(),
            document.backup_path().display()
        ),
        Ok(_) => {}
        Err(e) => error!(
            "Could not load {}: {}. Starting with an empty collection; the file is copied to {} before the next save.",
            document.path().display(),
            e,
            document.backup_path().display()
        ),
    }

    if config.show_prompt {
        println!("Type 'help' for supported commands or 'exit' to quit.\n");
    }

    let stdin = io::stdin();
    let mut session = Session::new(store, document, config, io::stdout());
    session.run_console(&mut stdin.lock())?;
    drop(session);

    println!("The program terminated.");
    Ok(())
}

fn print_banner() {
    println!("\n==================================================");
    println!("   Marquee - movie collection manager");
    println!("==================================================\n");
}
