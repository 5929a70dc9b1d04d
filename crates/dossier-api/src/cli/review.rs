//! `dossier review`: render the draft the way the review page shows it.

use std::time::Duration;

use anyhow::{bail, Result};
use console::style;
use tracing::Instrument;

use dossier_core::agent::ReviewAgent;
use dossier_core::frame::BusPort;
use dossier_infra::submission::HttpSubmissionClient;
use dossier_observe::attributes::SPAN_REVIEW;

use crate::state::{AppState, Session};

pub type ConcreteReviewAgent = ReviewAgent<BusPort, HttpSubmissionClient>;

/// How long the review waits for the orchestrator's draft.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Attach a review agent to `session` and fetch the draft through it.
pub async fn open_review(state: &AppState, session: &mut Session) -> Result<ConcreteReviewAgent> {
    let endpoint = HttpSubmissionClient::new(state.config.submission_url.clone())?;
    let mut agent = ReviewAgent::new(
        session.port(),
        endpoint,
        session.parent,
        state.config.expected_origin.clone(),
        state.config.sections.clone(),
    );

    let span = tracing::info_span!(SPAN_REVIEW, identity = %state.identity);
    let received = agent
        .fetch(&mut session.mailbox, FETCH_TIMEOUT)
        .instrument(span)
        .await?
        .is_some();
    if !received {
        bail!("the draft could not be loaded for review");
    }
    Ok(agent)
}

pub async fn review(state: &AppState, json: bool) -> Result<()> {
    let mut session = state.start_session().await;
    let agent = open_review(state, &mut session).await;
    session.shutdown().await?;
    let agent = agent?;

    let Some(document) = agent.render() else {
        bail!("the draft could not be loaded for review");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    if document.is_empty() {
        println!();
        println!(
            "  {} No application data found. Fill in the sections first.",
            style("i").blue().bold()
        );
        println!();
        return Ok(());
    }

    println!();
    print!("{document}");
    Ok(())
}
