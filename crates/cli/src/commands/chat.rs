//! `pmos chat`: interactive or single-message session.

use pmos_agents::AgentProfile;
use pmos_core::agent::AgentLabel;
use pmos_core::session::SessionId;
use pmos_router::{RouterResponse, SessionService, Target, TurnRequest};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::runtime::{self, BoxError};

pub async fn run(
    session: Option<String>,
    agent: Option<String>,
    chain: Option<String>,
    message: Option<String>,
) -> Result<(), BoxError> {
    let config = runtime::load_config()?;
    runtime::require_api_key(&config)?;

    let target = parse_target(agent.as_deref(), chain.as_deref())?;
    let service = runtime::build_service(&config).await?;
    let id = session.map(SessionId).unwrap_or_default();

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let response = service.handle_request(&id, TurnRequest { message: msg, target }).await;
        eprint!("\r              \r");
        print_response(&response?);
        return Ok(());
    }

    println!();
    println!("  PM OS - Interactive Session");
    println!("  ===========================");
    println!();
    println!("  Session:   {id}");
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Store:     {}", service.store().name());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Commands: 'agents', 'phase', 'decisions', 'exit'.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "exit" | "quit" => break,
            "agents" => print_agents(),
            "phase" => print_phase(&service, &id).await?,
            "decisions" => match service.decisions(&id).await? {
                Some(log) => println!("\n{}\n", log.to_markdown()),
                None => println!("\n  No turns yet in this session.\n"),
            },
            _ => {
                eprint!("  ...");
                let result = service
                    .handle_request(
                        &id,
                        TurnRequest {
                            message: input.to_string(),
                            target: target.clone(),
                        },
                    )
                    .await;
                eprint!("\r     \r");
                match result {
                    Ok(response) => print_response(&response),
                    // A load failure skips the turn; the session can still continue
                    Err(e) => eprintln!("\n  Error: could not load session: {e}\n"),
                }
            }
        }
    }

    println!("\n  Session saved as {id}. Resume with: pmos chat --session {id}\n");
    Ok(())
}

async fn prompt() -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"  You > ").await?;
    stdout.flush().await
}

/// `--agent` wins over `--chain`; a chain with commas is an explicit agent
/// list, otherwise it names a configured chain.
pub fn parse_target(agent: Option<&str>, chain: Option<&str>) -> Result<Target, BoxError> {
    if let Some(name) = agent {
        return Ok(Target::Agent(parse_agent(name)?));
    }
    match chain {
        None => Ok(Target::Classify),
        Some(spec) if spec.contains(',') => {
            let labels = spec
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(parse_agent)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Target::Chain(labels))
        }
        Some(name) => Ok(Target::NamedChain(name.trim().to_string())),
    }
}

fn parse_agent(name: &str) -> Result<AgentLabel, BoxError> {
    match name.parse::<AgentLabel>() {
        Ok(label) if label.is_agent() => Ok(label),
        _ => Err(format!(
            "unknown agent '{name}'; expected one of: {}",
            AgentLabel::AGENTS.map(|a| a.as_str()).join(", ")
        )
        .into()),
    }
}

fn print_agents() {
    println!();
    for profile in AgentProfile::all() {
        println!("  {:<11} {}", profile.label.as_str(), profile.description);
    }
    println!();
}

async fn print_phase(service: &SessionService, id: &SessionId) -> Result<(), BoxError> {
    match service.get(id).await? {
        Some(session) => {
            let kinds: Vec<&str> = session.artifacts().kinds().map(|k| k.as_str()).collect();
            println!("\n  Phase: {}", session.phase());
            if kinds.is_empty() {
                println!("  Artifacts: none yet\n");
            } else {
                println!("  Artifacts: {}\n", kinds.join(", "));
            }
        }
        None => println!("\n  Phase: problem_discovery (new session)\n"),
    }
    Ok(())
}

pub fn print_response(response: &RouterResponse) {
    let agents: Vec<&str> = response.agents.iter().map(|a| a.as_str()).collect();
    let by = if agents.is_empty() {
        response.agent.as_str().to_string()
    } else {
        agents.join(" > ")
    };

    println!("{}", "-".repeat(60));
    println!("\n  [{by}]\n");
    println!("{}", response.rendered_text);
    println!();
    println!(
        "  phase: {}  |  outcome: {:?}  |  confidence: {:.2}",
        response.phase, response.outcome, response.confidence
    );
    if response.decisions_appended > 0 {
        println!("  Logged {} decision(s)", response.decisions_appended);
    }
    for link in &response.export_links {
        println!("  Exported {} \"{}\": {}", link.kind, link.title, link.location);
    }
    if !response.pending_agents.is_empty() {
        let pending: Vec<&str> = response.pending_agents.iter().map(|a| a.as_str()).collect();
        println!("  Waiting on your answer: {}", pending.join(" > "));
    }
    for note in &response.notes {
        println!("  Note: {note}");
    }
    if let Some(error) = &response.error {
        eprintln!("  Error: {error}");
    }
    println!("{}\n", "-".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_from_flags() {
        assert_eq!(parse_target(None, None).unwrap(), Target::Classify);
        assert_eq!(
            parse_target(Some("Strategist"), None).unwrap(),
            Target::Agent(AgentLabel::Strategist)
        );
        assert_eq!(
            parse_target(None, Some("plan")).unwrap(),
            Target::NamedChain("plan".into())
        );
        assert_eq!(
            parse_target(None, Some("framer, strategist")).unwrap(),
            Target::Chain(vec![AgentLabel::Framer, AgentLabel::Strategist])
        );
    }

    #[test]
    fn unknown_or_unclear_agent_is_rejected() {
        assert!(parse_target(Some("designer"), None).is_err());
        assert!(parse_target(Some("unclear"), None).is_err());
        assert!(parse_target(None, Some("framer,designer")).is_err());
    }
}
