//! CLI command definitions for the `dossier` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod draft;
pub mod review;
pub mod sections;
pub mod submit;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Fill in, review and submit the application questionnaire.
#[derive(Parser)]
#[command(name = "dossier", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    /// User whose draft to work on (falls back to DOSSIER_USER).
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the questionnaire sections and what is saved for them.
    Sections,

    /// Inspect or change the saved draft.
    Draft {
        #[command(subcommand)]
        action: DraftCommand,
    },

    /// Render the saved draft the way the review page shows it.
    Review,

    /// Confirm the declaration and submit the draft.
    Submit {
        /// Confirm the declaration without prompting.
        #[arg(long)]
        yes: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum DraftCommand {
    /// Show the saved draft, or one section of it.
    Show {
        /// Section key (e.g. applicant_details).
        section: Option<String>,
    },

    /// List users with a saved draft.
    #[command(alias = "ls")]
    List,

    /// Save a section record from a JSON file, as an autosave would.
    Import {
        /// Section key (e.g. siblings).
        section: String,

        /// JSON file holding the section record.
        file: PathBuf,
    },

    /// Delete the saved draft.
    #[command(alias = "rm")]
    Clear {
        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },
}
