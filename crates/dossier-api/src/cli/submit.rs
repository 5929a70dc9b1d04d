//! `dossier submit`: declaration, final submission and draft removal.

use anyhow::{bail, Result};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::Instrument;

use dossier_core::orchestrator::StatusEvent;
use dossier_observe::attributes::SPAN_SUBMIT;
use dossier_types::error::SubmissionError;

use super::review::open_review;
use crate::state::{AppState, Session};

const DECLARATION: &str =
    "I declare that the information given in this application is true and complete";

pub async fn submit(state: &AppState, yes: bool, json: bool) -> Result<()> {
    let mut session = state.start_session().await;
    let result = run_submit(state, &mut session, yes, json).await;
    session.shutdown().await?;
    result
}

async fn run_submit(state: &AppState, session: &mut Session, yes: bool, json: bool) -> Result<()> {
    let mut agent = open_review(state, session).await?;
    if agent.draft().is_none_or(|d| d.is_empty()) {
        bail!(SubmissionError::NoData);
    }

    let confirmed = if yes {
        true
    } else if json {
        false
    } else {
        Confirm::new()
            .with_prompt(DECLARATION)
            .default(false)
            .interact()?
    };
    agent.confirm_declaration(confirmed);
    if !agent.can_submit() {
        bail!(SubmissionError::DeclarationUnconfirmed);
    }

    let mut status = session.status.subscribe();

    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message("Submitting application...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let span = tracing::info_span!(SPAN_SUBMIT, identity = %state.identity);
    let outcome = agent.submit().instrument(span).await;
    spinner.finish_and_clear();
    let receipt = outcome?;

    // The review agent asked the orchestrator to drop the draft.
    Session::wait_for(&mut status, |event| {
        matches!(event, StatusEvent::DraftCleared | StatusEvent::SaveFailed { .. })
    })
    .await?;

    if json {
        println!(
            "{}",
            serde_json::json!({"submitted": true, "message": receipt.display_message()})
        );
    } else {
        println!();
        println!(
            "  {} {}",
            style("✓").green().bold(),
            style(receipt.display_message()).bold()
        );
        println!();
    }
    Ok(())
}
