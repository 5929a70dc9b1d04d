//! Dossier CLI entry point.
//!
//! Binary name: `dossier`
//!
//! Parses CLI arguments, installs tracing, initializes the database and the
//! user's identity, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, DraftCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity; RUST_LOG overrides.
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,dossier_core=debug,dossier_infra=debug",
        _ => "trace",
    };
    if let Err(err) = dossier_observe::tracing_setup::init_tracing(cli.otel, filter) {
        eprintln!("Warning: tracing setup failed: {err}");
    }

    let result = run(cli).await;
    dossier_observe::tracing_setup::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "dossier", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(cli.user.clone()).await?;
    tracing::debug!(data_dir = %state.data_dir.display(), identity = %state.identity, "state ready");

    match cli.command {
        Commands::Sections => cli::sections::list_sections(&state, cli.json).await?,

        Commands::Draft { action } => match action {
            DraftCommand::Show { section } => {
                cli::draft::show_draft(&state, section.as_deref(), cli.json).await?;
            }
            DraftCommand::List => cli::draft::list_drafts(&state, cli.json).await?,
            DraftCommand::Import { section, file } => {
                cli::draft::import_section(&state, &section, &file, cli.json).await?;
            }
            DraftCommand::Clear { force } => {
                cli::draft::clear_draft(&state, force, cli.json).await?;
            }
        },

        Commands::Review => cli::review::review(&state, cli.json).await?,

        Commands::Submit { yes } => cli::submit::submit(&state, yes, cli.json).await?,

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
