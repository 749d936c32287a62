mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::gate::GateSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tddctx",
    about = "Track TDD cycle, test status and quality gates for a project",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: walk up to the nearest .git, package.json, Cargo.toml, ...)
    #[arg(long, global = true, env = "TDDCTX_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check TDD compliance and suggest next steps (read-only)
    Check {
        /// Validate a transition to this gate (implies --validate)
        #[arg(long, value_name = "GATE")]
        gate: Option<String>,

        /// Run the compliance rules
        #[arg(long)]
        validate: bool,

        /// Only report issues, no suggestions
        #[arg(long)]
        issues_only: bool,
    },

    /// Run tests, analyse the codebase and fold the results into the context
    Update {
        /// Set the current development phase
        #[arg(long)]
        phase: Option<String>,

        /// Move to this quality gate (one step at a time unless --force)
        #[arg(long, value_name = "GATE")]
        gate: Option<String>,

        /// Allow skipping gates
        #[arg(long)]
        force: bool,

        /// Only print the saved path
        #[arg(long, short = 'q')]
        quiet: bool,

        /// Skip running the test suite
        #[arg(long)]
        no_tests: bool,
    },

    /// Append an entry to the activity and evidence logs
    Record {
        /// What changed
        description: String,
    },

    /// Manage quality gates
    Gate {
        #[command(subcommand)]
        subcommand: GateSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Check {
            gate,
            validate,
            issues_only,
        } => cmd::check::run(
            &root,
            cmd::check::CheckArgs {
                gate,
                validate,
                issues_only,
            },
            cli.json,
        ),
        Commands::Update {
            phase,
            gate,
            force,
            quiet,
            no_tests,
        } => cmd::update::run(
            &root,
            cmd::update::UpdateArgs {
                phase,
                gate,
                force,
                quiet,
                no_tests,
            },
            cli.json,
        ),
        Commands::Record { description } => cmd::record::run(&root, &description, cli.json),
        Commands::Gate { subcommand } => cmd::gate::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
