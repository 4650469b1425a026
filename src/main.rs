#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

use res2h::archive;

#[derive(Debug, Parser)]
#[command(
    name = "res2h",
    version,
    about = "Pack files into a res2hbin archive, embed it into executables, and read resources back"
)]
struct Cli {
    /// Set the logging level.
    #[arg(long, value_enum, global = true, default_value = "warn")]
    log_level: LogLevel,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pack a file or directory into a binary archive.
    Pack {
        /// Input file or directory.
        input: PathBuf,
        /// Output archive file.
        output: PathBuf,
        /// Recurse into subdirectories below the input directory.
        #[arg(short, long, default_value_t = false)]
        recurse: bool,
    },

    /// Append a file to the end of another file, e.g. an archive to an
    /// executable.
    Append {
        /// File to append (typically a packed archive).
        source: PathBuf,
        /// File to append to.
        destination: PathBuf,
    },

    /// List entries of a standalone or embedded archive.
    List {
        archive: PathBuf,
        /// Print offsets, sizes and checksums too.
        #[arg(long, default_value_t = false)]
        verbose: bool,
    },

    /// Print archive-level metadata.
    Info { archive: PathBuf },

    /// Extract entries below an output directory, verifying checksums.
    Extract {
        archive: PathBuf,
        output: PathBuf,
        /// Only extract entries containing this substring (repeatable).
        #[arg(long)]
        filter: Vec<String>,
    },

    /// Verify the archive checksum and every entry checksum.
    Verify { archive: PathBuf },
}

// Exit codes past clap's usage error (2): bad input paths and failed
// operations are distinguished for scripting.
const EXIT_BAD_INPUT: u8 = 3;
const EXIT_FAILED: u8 = 4;

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .init();

    let input = match &cli.cmd {
        Command::Pack { input, .. } => input,
        Command::Append { source, .. } => source,
        Command::List { archive, .. }
        | Command::Info { archive }
        | Command::Extract { archive, .. }
        | Command::Verify { archive } => archive,
    };
    if !input.exists() {
        eprintln!("error: invalid input path {}", input.display());
        return ExitCode::from(EXIT_BAD_INPUT);
    }

    let res = match cli.cmd {
        Command::Pack {
            input,
            output,
            recurse,
        } => archive::pack(&input, &output, recurse),
        Command::Append {
            source,
            destination,
        } => archive::append(&source, &destination),
        Command::List {
            archive: path,
            verbose,
        } => archive::list(&path, verbose),
        Command::Info { archive: path } => archive::info(&path),
        Command::Extract {
            archive: path,
            output,
            filter,
        } => archive::extract(&path, &output, &filter),
        Command::Verify { archive: path } => archive::verify(&path),
    };

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(EXIT_FAILED)
        }
    }
}
