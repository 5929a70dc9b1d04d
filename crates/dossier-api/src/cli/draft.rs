//! Draft CLI commands: show, list, import, clear.

use std::path::Path;

use anyhow::{bail, Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use dialoguer::Confirm;
use tracing::Instrument;

use dossier_core::agent::review::{field_label, format_value};
use dossier_core::frame::FramePort;
use dossier_core::orchestrator::StatusEvent;
use dossier_observe::attributes::SPAN_DRAFT_CLEAR;
use dossier_types::protocol::FrameMessage;
use dossier_types::record::{RecordEntry, SectionRecord};
use dossier_types::section::SectionKey;

use crate::state::{AppState, Session};

/// Parse a section key given on the command line and check it is configured.
pub fn known_section(state: &AppState, raw: &str) -> Result<SectionKey> {
    let Some(key) = SectionKey::new(raw.replace('-', "_")) else {
        bail!("'{raw}' is not a valid section key");
    };
    if !state.config.is_known_section(&key) {
        bail!(
            "unknown section '{key}'; see {}",
            style("dossier sections").yellow()
        );
    }
    Ok(key)
}

pub async fn show_draft(state: &AppState, section: Option<&str>, json: bool) -> Result<()> {
    let draft = state.draft_store().load(&state.identity).await?;

    if let Some(raw) = section {
        let key = known_section(state, raw)?;
        let Some(record) = draft.section(&key) else {
            if json {
                println!("null");
            } else {
                println!();
                println!("  {} Nothing saved for '{}'", style("i").blue().bold(), key);
                println!();
            }
            return Ok(());
        };
        if json {
            println!("{}", serde_json::to_string_pretty(&record.to_json())?);
        } else {
            print_record(&key, record);
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&draft)?);
        return Ok(());
    }

    if draft.is_empty() {
        println!();
        println!(
            "  {} No draft saved for {}",
            style("i").blue().bold(),
            style(&state.identity).cyan()
        );
        println!();
        return Ok(());
    }

    for (key, record) in draft.iter() {
        print_record(key, record);
    }
    Ok(())
}

fn print_record(key: &SectionKey, record: &SectionRecord) {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Field").fg(Color::White),
        Cell::new("Value").fg(Color::White),
    ]);

    for (name, entry) in record.entries() {
        match entry {
            RecordEntry::Value(value) => {
                table.add_row(vec![Cell::new(field_label(name)), Cell::new(format_value(value))]);
            }
            RecordEntry::Group(items) => {
                for (i, item) in items.iter().enumerate() {
                    for (field, value) in item {
                        table.add_row(vec![
                            Cell::new(format!("{} {} / {}", field_label(name), i + 1, field_label(field)))
                                .fg(Color::Cyan),
                            Cell::new(format_value(value)),
                        ]);
                    }
                }
            }
        }
    }

    println!();
    println!("  {}", style(key).bold());
    println!("{table}");
}

pub async fn list_drafts(state: &AppState, json: bool) -> Result<()> {
    let identities = state.draft_store().identities().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&identities)?);
        return Ok(());
    }

    if identities.is_empty() {
        println!();
        println!("  {} No drafts saved.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    println!();
    for identity in &identities {
        let marker = if identity == &state.identity { "*" } else { " " };
        println!("  {} {}", style(marker).green().bold(), identity);
    }
    println!();
    Ok(())
}

/// Push a section record through the orchestrator, as an autosave would.
pub async fn import_section(state: &AppState, section: &str, file: &Path, json: bool) -> Result<()> {
    let key = known_section(state, section)?;
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let payload: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;
    SectionRecord::from_json(payload.clone())
        .with_context(|| format!("{} is not a section record", file.display()))?;

    let session = state.start_session().await;
    let mut status = session.status.subscribe();
    session.port().post(
        session.parent,
        FrameMessage::SectionDataChangedAutosave {
            section_key: key.clone(),
            payload,
        },
    )?;

    let outcome = Session::wait_for(&mut status, |event| {
        matches!(event, StatusEvent::AutoSaved { section } if section == &key)
            || matches!(event, StatusEvent::SaveFailed { .. })
    })
    .await;
    session.shutdown().await?;

    match outcome? {
        StatusEvent::SaveFailed { reason } => bail!("draft could not be saved: {reason}"),
        _ if json => println!("{}", serde_json::json!({"saved": true, "section": key})),
        _ => println!(
            "  {} Saved section '{}' for {}",
            style("✓").green().bold(),
            style(&key).bold(),
            style(&state.identity).cyan()
        ),
    }
    Ok(())
}

pub async fn clear_draft(state: &AppState, force: bool, json: bool) -> Result<()> {
    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Permanently delete the saved draft of {}?",
                style(&state.identity).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let span = tracing::info_span!(SPAN_DRAFT_CLEAR, identity = %state.identity);
    state
        .draft_store()
        .clear(&state.identity)
        .instrument(span)
        .await?;

    if json {
        println!("{}", serde_json::json!({"cleared": true, "identity": state.identity}));
    } else {
        println!("  {} Draft cleared.", style("✓").green().bold());
    }
    Ok(())
}
