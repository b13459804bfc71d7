//! `pmos session`: inspect, list, and reset stored sessions.

use pmos_core::context::preview;
use pmos_core::session::SessionId;

use crate::runtime::{self, BoxError};

/// Turns shown by `session show`.
const SHOW_TURNS: usize = 5;

pub async fn show(id: String) -> Result<(), BoxError> {
    let config = runtime::load_config()?;
    let store = runtime::build_store(&config).await?;
    let id = SessionId(id);

    let Some(session) = store.load(&id).await? else {
        return Err(format!("No session '{id}'").into());
    };

    println!();
    println!("  Session:   {}", session.id());
    println!("  Phase:     {}", session.phase());
    println!("  Created:   {}", session.created_at().format("%Y-%m-%d %H:%M"));
    println!("  Updated:   {}", session.updated_at().format("%Y-%m-%d %H:%M"));
    println!("  Turns:     {}", session.turns().len());
    println!("  Decisions: {}", session.decisions().len());

    println!("\n  Artifacts:");
    if session.artifacts().is_empty() {
        println!("    (none)");
    }
    for artifact in session.artifacts().iter() {
        println!("    {:<18} by {:<10} {}", artifact.kind.as_str(), artifact.produced_by.as_str(), artifact.summary());
    }

    let turns = session.turns();
    let skip = turns.len().saturating_sub(SHOW_TURNS);
    if !turns.is_empty() {
        println!("\n  Recent turns:");
    }
    for (i, turn) in turns.iter().enumerate().skip(skip) {
        let agents: Vec<&str> = turn.agents().map(|a| a.as_str()).collect();
        println!(
            "    {:>3}. [{:?}] {} -> {}",
            i + 1,
            turn.outcome,
            preview(&turn.input, 60),
            if agents.is_empty() { "-".to_string() } else { agents.join(" > ") }
        );
    }
    println!();

    Ok(())
}

pub async fn decisions(id: String) -> Result<(), BoxError> {
    let config = runtime::load_config()?;
    let store = runtime::build_store(&config).await?;
    let id = SessionId(id);

    match store.load(&id).await? {
        Some(session) => println!("{}", session.decisions().to_markdown()),
        None => return Err(format!("No session '{id}'").into()),
    }
    Ok(())
}

pub async fn list() -> Result<(), BoxError> {
    let config = runtime::load_config()?;
    let store = runtime::build_store(&config).await?;
    let sessions = store.list().await?;

    if sessions.is_empty() {
        println!("No sessions yet. Start one with `pmos chat`.");
        return Ok(());
    }

    println!("  {:<38} {:<18} {:>5} {:>9}  UPDATED", "ID", "PHASE", "TURNS", "DECISIONS");
    for s in sessions {
        println!(
            "  {:<38} {:<18} {:>5} {:>9}  {}",
            s.id.as_str(),
            s.phase.as_str(),
            s.turns,
            s.decisions,
            s.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub async fn reset(id: String) -> Result<(), BoxError> {
    let config = runtime::load_config()?;
    let service = runtime::build_service(&config).await?;
    let id = SessionId(id);

    match service.reset(&id).await? {
        Some(session) => {
            println!(
                "Reset {id}: phase is {} again; {} turn(s) and {} decision(s) kept.",
                session.phase(),
                session.turns().len(),
                session.decisions().len()
            );
            Ok(())
        }
        None => Err(format!("No session '{id}'").into()),
    }
}
