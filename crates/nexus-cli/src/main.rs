#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "nexus: multi-signal document ranking",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Project root holding the `.nexus` directory (default: current directory).
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(next_help_heading = "Ranking")]
    Search(cmd::search::SearchArgs),

    #[command(next_help_heading = "Store")]
    Index(cmd::index::IndexArgs),

    #[command(next_help_heading = "Learning")]
    Feedback(cmd::feedback::FeedbackArgs),

    #[command(next_help_heading = "Learning")]
    Profiles(cmd::profiles::ProfilesArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("NEXUS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "nexus=debug,info"
        } else {
            "nexus=info,warn"
        })
    });

    let format = env::var("NEXUS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = match &cli.root {
        Some(root) => root.clone(),
        None => env::current_dir()?,
    };
    let output = cli.output_mode();

    match cli.command {
        Commands::Search(ref args) => cmd::search::run_search(args, output, &project_root),
        Commands::Index(ref args) => cmd::index::run_index(args, output, &project_root),
        Commands::Feedback(ref args) => cmd::feedback::run_feedback(args, output, &project_root),
        Commands::Profiles(ref args) => cmd::profiles::run_profiles(args, output, &project_root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["nx", "profiles", "--json"]);
        assert!(cli.json);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn root_flag_is_global() {
        let cli = Cli::parse_from(["nx", "search", "ledger", "--root", "/tmp/project"]);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/project")));
    }

    #[test]
    fn search_subcommand_parses_options() {
        let cli = Cli::parse_from([
            "nx", "search", "zero knowledge", "-n", "3", "--profile", "enhanced", "--expand",
        ]);
        let Commands::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.query, "zero knowledge");
        assert_eq!(args.limit, Some(3));
        assert_eq!(args.profile.as_deref(), Some("enhanced"));
        assert!(args.expand);
    }

    #[test]
    fn feedback_query_conflicts_with_domain() {
        let result = Cli::try_parse_from([
            "nx", "feedback", "2", "--query", "ledger", "--domain", "Cryptography",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn reject_flag_parses() {
        let cli = Cli::parse_from(["nx", "feedback", "4", "--reject"]);
        let Commands::Feedback(args) = cli.command else {
            panic!("expected feedback");
        };
        assert!(args.reject);
        assert_eq!(args.id, "4");
    }
}
