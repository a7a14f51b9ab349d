//! Vellum CLI: compare document versions and watch collaboration sessions.
//!
//! `compare` exits with 0 when the inputs are identical, 1 when they differ
//! and 2 when an input cannot be read.

mod report;
mod watch;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{error, info};
use vellum_collab::{anonymous_user_id, ReconnectPolicy};

use report::{CompareOptions, OutputFormat};
use watch::WatchOptions;

#[derive(Parser, Debug)]
#[command(name = "vellum")]
#[command(version)]
#[command(about = "Compare compliance document versions and follow live review sessions", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare two versions of a document
    Compare {
        /// Previous version
        old: PathBuf,
        /// Current version
        new: PathBuf,
        /// Diff word and whitespace tokens instead of lines
        #[arg(long)]
        tokens: bool,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Unified)]
        format: OutputFormat,
        /// Append change statistics
        #[arg(long)]
        stats: bool,
        /// Column width for side-by-side output
        #[arg(long, default_value = "40")]
        width: usize,
    },

    /// Join a collaboration session and print inbound events as JSON lines
    Watch {
        /// Server base address (ws:// or wss://)
        #[arg(long)]
        base: String,
        /// Session id
        #[arg(long)]
        session: String,
        /// User id (default: a random anonymous id)
        #[arg(long)]
        user: Option<String>,
        /// Reconnect attempts after a lost connection
        #[arg(long, default_value = "5")]
        max_attempts: u32,
        /// Delay between reconnect attempts in milliseconds
        #[arg(long, default_value = "3000")]
        retry_ms: u64,
        /// Do not reconnect after a lost connection
        #[arg(long)]
        no_reconnect: bool,
        /// Number of events kept in the session history
        #[arg(long, default_value = "100")]
        history: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Commands::Compare { old, new, tokens, format, stats, width } => {
            let options = CompareOptions { tokens, format, stats, width };
            ExitCode::from(compare(&old, &new, &options))
        }
        Commands::Watch {
            base,
            session,
            user,
            max_attempts,
            retry_ms,
            no_reconnect,
            history,
        } => {
            let options = WatchOptions {
                base,
                session,
                user: user.unwrap_or_else(anonymous_user_id),
                policy: ReconnectPolicy {
                    should_reconnect: !no_reconnect,
                    max_attempts,
                    retry_interval_ms: retry_ms,
                },
                history,
            };
            match watch::run(options).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("watch failed: {e:#}");
                    eprintln!("Error: {e:#}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// Run a comparison and return the process exit code.
fn compare(old: &Path, new: &Path, options: &CompareOptions) -> u8 {
    let inputs = read_input(old).and_then(|o| read_input(new).map(|n| (o, n)));
    let (old_text, new_text) = match inputs {
        Ok(texts) => texts,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return 2;
        }
    };

    match report::build(&old_text, &new_text, options) {
        Ok(report) => {
            print!("{}", report.body);
            info!("Compared {} and {}", old.display(), new.display());
            if report.identical {
                0
            } else {
                1
            }
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            2
        }
    }
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compare() {
        let args = Args::try_parse_from([
            "vellum", "compare", "a.txt", "b.txt", "--tokens", "--format", "side-by-side",
        ])
        .unwrap();
        match args.command {
            Commands::Compare { old, tokens, format, stats, width, .. } => {
                assert_eq!(old, PathBuf::from("a.txt"));
                assert!(tokens);
                assert!(!stats);
                assert_eq!(format, OutputFormat::SideBySide);
                assert_eq!(width, 40);
            }
            other => panic!("Expected compare, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_watch_defaults() {
        let args = Args::try_parse_from([
            "vellum", "watch", "--base", "ws://localhost:8000", "--session", "s1",
        ])
        .unwrap();
        match args.command {
            Commands::Watch { user, max_attempts, retry_ms, no_reconnect, history, .. } => {
                assert!(user.is_none());
                assert_eq!(max_attempts, 5);
                assert_eq!(retry_ms, 3000);
                assert!(!no_reconnect);
                assert_eq!(history, 100);
            }
            other => panic!("Expected watch, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_input_is_exit_code_2() {
        let code = compare(
            Path::new("/nonexistent/vellum/old.txt"),
            Path::new("/nonexistent/vellum/new.txt"),
            &CompareOptions::default(),
        );
        assert_eq!(code, 2);
    }
}
