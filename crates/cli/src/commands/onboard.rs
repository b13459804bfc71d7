//! `pmos onboard`: first-time setup.

use pmos_config::AppConfig;

use crate::runtime::BoxError;

/// Starter snippets for the keyword knowledge base, one JSON object per line.
const SAMPLE_KNOWLEDGE: &str = concat!(
    r#"{"source":"frameworks/problem-framing.md","text":"Frame a problem as who is affected, what they are trying to do, what gets in the way, and how you will know it is solved. Separate symptoms (metrics dropping) from causes.","tags":["problem_discovery","framer"]}"#,
    "\n",
    r#"{"source":"frameworks/rice.md","text":"RICE scores an option by Reach x Impact x Confidence / Effort. Use it to compare options on one scale, then sanity-check the top result against strategy.","tags":["decision","strategist"]}"#,
    "\n",
    r#"{"source":"frameworks/stakeholder-map.md","text":"Map stakeholders by influence and interest. Engage high-influence, high-interest stakeholders early and give them a clear decision record to react to.","tags":["decision","aligner"]}"#,
    "\n",
    r#"{"source":"frameworks/mvp-scoping.md","text":"An MVP scope lists the smallest set of user stories that tests the riskiest assumption, with explicit out-of-scope items and a success metric.","tags":["execution","executor"]}"#,
    "\n",
    r#"{"source":"frameworks/exec-summary.md","text":"An executive summary leads with the decision or ask, then the why in two or three bullets, then risks and next steps. Keep it under one page.","tags":["communication","narrator"]}"#,
    "\n",
);

pub async fn run() -> Result<(), BoxError> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("PM OS - First-Time Setup");
    println!("========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    let config = AppConfig::default();

    let knowledge_path = config.knowledge_path();
    if !knowledge_path.exists() {
        std::fs::write(&knowledge_path, SAMPLE_KNOWLEDGE)?;
        println!("Created starter knowledge base: {}", knowledge_path.display());
    }

    let export_dir = config.export_dir();
    if !export_dir.exists() {
        std::fs::create_dir_all(&export_dir)?;
        println!("Created export directory: {}", export_dir.display());
    }

    if config_path.exists() {
        println!("\nConfig already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("Created config.toml at: {}", config_path.display());
        println!("\nNext steps:");
        println!("   1. Set OPENROUTER_API_KEY (or add api_key to {})", config_path.display());
        println!("   2. Run: pmos chat");
        println!("   3. Describe the product problem you are working on\n");
    }

    println!("Setup complete. Run `pmos chat` to start a session.\n");

    Ok(())
}
