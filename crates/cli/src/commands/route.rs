//! `pmos route`: show where a message would go. Nothing runs or persists.

use pmos_core::session::SessionId;
use pmos_workflow::Authorization;

use crate::runtime::{self, BoxError};

pub async fn run(session: Option<String>, message: String) -> Result<(), BoxError> {
    let config = runtime::load_config()?;
    runtime::require_api_key(&config)?;
    let service = runtime::build_service(&config).await?;

    let id = session.map(SessionId).unwrap_or_default();
    let decision = service.route(&id, &message).await?;
    let threshold = service.router().settings().confidence_threshold;

    println!();
    println!("  Session:     {}", decision.session_id);
    println!("  Phase:       {}", decision.phase);
    println!(
        "  Classified:  {} (confidence {:.2})",
        decision.classification.label, decision.classification.confidence
    );
    if let Some(rationale) = &decision.classification.rationale {
        println!("  Rationale:   {rationale}");
    }
    if decision.below_threshold {
        println!("  Effective:   {} (below threshold {threshold})", decision.effective);
    } else {
        println!("  Effective:   {}", decision.effective);
    }
    match &decision.authorization {
        Authorization::Allow => println!("  Gate:        allowed"),
        Authorization::Deny(denial) => {
            println!("  Gate:        denied. {}", denial.explanation());
            if let Some(target) = decision.redirect_to {
                println!("  Auto-chain:  would run {target}");
            }
        }
    }
    println!(
        "  Knowledge:   {} snippet(s){}",
        decision.snippets,
        if decision.knowledge_degraded { " (retrieval degraded)" } else { "" }
    );
    println!();

    Ok(())
}
