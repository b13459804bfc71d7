//! End-to-end tests for a configured PM OS deployment.
//!
//! These wire a TOML config into the real knowledge base, SQLite store,
//! file export sink and HTTP gateway, with only the LLM scripted.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use pmos_agents::AgentRegistry;
use pmos_config::AppConfig;
use pmos_core::agent::AgentLabel;
use pmos_core::error::ProviderError;
use pmos_core::export::ExportKind;
use pmos_core::message::Message;
use pmos_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use pmos_core::session::{Phase, TurnOutcome};
use pmos_gateway::{GatewayState, build_router};
use pmos_router::{
    ContextAssembler, ContextLimits, IntentClassifier, Router, RouterResponse, RouterSettings,
    SequenceExecutor, SessionService,
};
use pmos_store::{KeywordKnowledgeBase, SqliteSessionStore};

// ── Mock Provider ────────────────────────────────────────────────────────

struct ScriptedProvider {
    responses: Mutex<Vec<String>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every message of the `n`th request, joined.
    fn prompt(&self, n: usize) -> String {
        self.requests.lock().unwrap()[n]
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("ScriptedProvider exhausted");
        }
        Ok(ProviderResponse {
            message: Message::assistant(responses.remove(0)),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock".into(),
            metadata: serde_json::Map::new(),
        })
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

const KNOWLEDGE: &str = concat!(
    r#"{"source":"playbooks/onboarding.md","text":"A guided onboarding checklist lifts activation when new users stall in week one.","tags":["problem_discovery"]}"#,
    "\n",
    r#"{"source":"playbooks/pricing.md","text":"Annual plans trade margin for retention.","tags":["decision"]}"#,
    "\n",
);

fn write_config(dir: &Path) -> AppConfig {
    std::fs::write(dir.join("knowledge.jsonl"), KNOWLEDGE).unwrap();
    let toml_text = format!(
        r#"
api_key = "sk-test"
default_model = "mock-model"

[router]
confidence_threshold = 0.6

[router.chains]
plan = ["framer", "strategist", "executor"]

[store]
backend = "sqlite"
path = "{store}"

[knowledge]
backend = "keyword"
path = "{knowledge}"

[export]
sink = "file"
dir = "{exports}"
"#,
        store = dir.join("sessions.db").display(),
        knowledge = dir.join("knowledge.jsonl").display(),
        exports = dir.join("exports").display(),
    );
    toml::from_str(&toml_text).unwrap()
}

async fn deploy(config: &AppConfig, provider: Arc<ScriptedProvider>) -> axum::Router {
    let registry = AgentRegistry::from_config(config, provider.clone());
    let mut router = Router::new(
        ContextAssembler::new(
            Arc::new(KeywordKnowledgeBase::load(&config.knowledge_path())),
            ContextLimits::from(&config.context),
        ),
        IntentClassifier::new(provider, config.classifier_model(), Duration::from_secs(5)),
        SequenceExecutor::new(Arc::new(registry), Duration::from_secs(5)),
        RouterSettings::from(&config.router),
    );
    if let Some(sink) = pmos_export::build_from_config(config) {
        router = router.with_export_sink(sink);
    }
    let store = SqliteSessionStore::new(&config.store_path().display().to_string())
        .await
        .unwrap();
    let service = SessionService::new(router, Arc::new(store));
    build_router(Arc::new(GatewayState::new(service)))
}

fn envelope(rendering: &str, artifact: serde_json::Value, extra: serde_json::Value) -> String {
    let mut value = serde_json::json!({
        "rendering": rendering,
        "artifact": artifact,
        "decisions": [],
        "exports": [],
    });
    if let (Some(obj), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
    value.to_string()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_config_parses_into_a_runnable_deployment() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    assert_eq!(config.store.backend, "sqlite");
    assert_eq!(config.router.confidence_threshold, 0.6);
    assert_eq!(
        config.router.chain("plan"),
        Some(vec![AgentLabel::Framer, AgentLabel::Strategist, AgentLabel::Executor])
    );
    assert_eq!(config.export_dir(), dir.path().join("exports"));

    let app = deploy(&config, ScriptedProvider::new(vec![])).await;
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn e2e_plan_chain_over_http_persists_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let provider = ScriptedProvider::new(vec![
        envelope(
            "## Problem\nNew users stall in week one.",
            serde_json::json!({"summary": "New users stall in week one"}),
            serde_json::json!({}),
        ),
        envelope(
            "Ship a guided onboarding checklist first.",
            serde_json::json!({"summary": "Guided onboarding checklist first"}),
            serde_json::json!({"decisions": [
                {"description": "Guided onboarding checklist first", "impact": 8, "effort": 3}
            ]}),
        ),
        envelope(
            "MVP: five-step checklist, no gamification.",
            serde_json::json!({"summary": "Five-step checklist", "out_of_scope": ["gamification"]}),
            serde_json::json!({"exports": [{"kind": "prd", "title": "Onboarding checklist PRD"}]}),
        ),
    ]);
    let app = deploy(&config, provider.clone()).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/sessions/acme/messages",
            serde_json::json!({"message": "Plan how we fix onboarding for new users", "chain": "plan"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let turn: RouterResponse = json_body(response).await;
    assert_eq!(turn.outcome, TurnOutcome::Answered);
    assert_eq!(
        turn.agents,
        vec![AgentLabel::Framer, AgentLabel::Strategist, AgentLabel::Executor]
    );
    assert_eq!(turn.phase, Phase::Execution);
    assert_eq!(turn.decisions_appended, 1);
    assert!(turn.saved);
    // A named chain skips classification: one call per agent.
    assert_eq!(provider.calls(), 3);
    assert!(provider.prompt(0).contains("playbooks/onboarding.md"));

    assert_eq!(turn.export_links.len(), 1);
    let link = &turn.export_links[0];
    assert_eq!(link.kind, ExportKind::Prd);
    assert!(link.location.starts_with(&dir.path().join("exports").display().to_string()));
    let document = std::fs::read_to_string(&link.location).unwrap();
    assert!(document.starts_with("# Onboarding checklist PRD"));
    assert!(document.contains("Five-step checklist"));

    let response = app.clone().oneshot(get("/v1/sessions/acme/decisions")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let log: serde_json::Value = json_body(response).await;
    assert_eq!(log["count"], 1);
    assert!(log["markdown"].as_str().unwrap().contains("Guided onboarding checklist first"));

    let response = app.oneshot(get("/v1/sessions")).await.unwrap();
    let listing: serde_json::Value = json_body(response).await;
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["sessions"][0]["phase"], "execution");
}

#[tokio::test]
async fn e2e_session_survives_redeploy() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let first = ScriptedProvider::new(vec![envelope(
        "Framed.",
        serde_json::json!({"summary": "Churn after the first invoice"}),
        serde_json::json!({}),
    )]);
    let app = deploy(&config, first).await;
    let response = app
        .oneshot(post_json(
            "/v1/sessions/durable/messages",
            serde_json::json!({"message": "Customers churn after the first invoice", "agent": "framer"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Same config, fresh process state: the strategist is no longer gated.
    let second = ScriptedProvider::new(vec![envelope(
        "Offer annual plans.",
        serde_json::json!({"summary": "Offer annual plans"}),
        serde_json::json!({}),
    )]);
    let app = deploy(&config, second.clone()).await;
    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/sessions/durable/messages",
            serde_json::json!({"message": "What should we do about it?", "agent": "strategist"}),
        ))
        .await
        .unwrap();
    let turn: RouterResponse = json_body(response).await;
    assert_eq!(turn.outcome, TurnOutcome::Answered);
    assert_eq!(turn.agent, AgentLabel::Strategist);
    assert!(second.prompt(0).contains("Churn after the first invoice"));

    let response = app.oneshot(get("/v1/sessions/durable")).await.unwrap();
    let session: serde_json::Value = json_body(response).await;
    assert_eq!(session["turns"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn e2e_route_dry_run_reports_knowledge_without_persisting() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let provider = ScriptedProvider::new(vec![
        serde_json::json!({"intent": "framer", "confidence": 0.55, "reasoning": "vague"}).to_string(),
    ]);
    let app = deploy(&config, provider.clone()).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/sessions/dry/route",
            serde_json::json!({"message": "New users stall during onboarding"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let decision: serde_json::Value = json_body(response).await;
    assert_eq!(decision["classification"]["label"], "framer");
    // 0.55 is under the configured 0.6 threshold.
    assert_eq!(decision["below_threshold"], true);
    assert_eq!(decision["effective"], "unclear");
    assert_eq!(decision["snippets"], 1);
    assert_eq!(provider.calls(), 1);

    let response = app.oneshot(get("/v1/sessions/dry")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
