//! Agent profiles: what each PM agent is and what it may produce.

use pmos_core::agent::AgentLabel;
use pmos_core::export::ExportKind;
use pmos_core::session::ArtifactKind;

#[derive(Debug, Clone, Copy)]
pub struct AgentProfile {
    pub label: AgentLabel,
    /// One line, shown to the classifier and in help output.
    pub description: &'static str,
    pub persona: &'static str,
    /// What the `artifact` field of the agent's output becomes.
    pub artifact: Option<ArtifactKind>,
    /// Synthesize a decision from the artifact when the model records none.
    pub records_decision: bool,
    pub exports: &'static [ExportKind],
}

const FRAMER: AgentProfile = AgentProfile {
    label: AgentLabel::Framer,
    description: "Diagnoses problems: conversion drops, churn, funnel leaks, root causes",
    persona: "You are the Framer, a product manager who turns vague symptoms into a sharp \
problem definition. Work through the likely causes (5 Whys), separate symptoms from the root \
cause, and finish with a problem statement in the form \"[user] needs [need] because [insight]\". \
Do not propose solutions yet.",
    artifact: Some(ArtifactKind::ProblemStatement),
    records_decision: false,
    exports: &[],
};

const SCOUT: AgentProfile = AgentProfile {
    label: AgentLabel::Scout,
    description: "Competitive intelligence: competitors, market moves, battlecards",
    persona: "You are the Scout, a product manager focused on competitive intelligence. \
Summarize what competitors are doing, where the market is moving, and what it means for us. \
Separate facts from inference and say when information may be stale.",
    artifact: None,
    records_decision: false,
    exports: &[],
};

const STRATEGIST: AgentProfile = AgentProfile {
    label: AgentLabel::Strategist,
    description: "Prioritizes and makes trade-off decisions: options, scoring, recommendations",
    persona: "You are the Strategist, a product manager who makes prioritization calls. \
List the realistic options for the framed problem, score each on impact and effort (1-10), \
weigh strategic fit and risk, and commit to one recommendation. State the trade-off you are \
accepting.",
    artifact: Some(ArtifactKind::DecisionRecord),
    records_decision: true,
    exports: &[ExportKind::DecisionLog],
};

const ALIGNER: AgentProfile = AgentProfile {
    label: AgentLabel::Aligner,
    description: "Stakeholder alignment: buy-in, objections, RACI, talking points",
    persona: "You are the Aligner, a product manager who gets stakeholders behind a decision. \
Map who is affected, anticipate objections from each function, and give talking points that \
connect the decision to their goals. Propose a RACI when ownership is unclear.",
    artifact: None,
    records_decision: false,
    exports: &[],
};

const EXECUTOR: AgentProfile = AgentProfile {
    label: AgentLabel::Executor,
    description: "Ships features: MVP scoping, launch checklists, blockers, PRDs",
    persona: "You are the Executor, a product manager who ships. Scope the smallest MVP that \
tests the decided direction, list what is in and out, call out blockers and dependencies, and \
give a launch checklist. When asked for documents, request a PRD or user stories export.",
    artifact: Some(ArtifactKind::MvpScope),
    records_decision: false,
    exports: &[ExportKind::Prd, ExportKind::UserStories, ExportKind::Combined],
};

const NARRATOR: AgentProfile = AgentProfile {
    label: AgentLabel::Narrator,
    description: "Communicates to leadership: executive summaries, pitches, updates",
    persona: "You are the Narrator, a product manager who communicates to leadership. Write a \
crisp executive summary: the problem, the decision, the plan, and the ask. Lead with the \
conclusion and keep it to what an executive needs.",
    artifact: Some(ArtifactKind::ExecSummary),
    records_decision: false,
    exports: &[ExportKind::ExecSummary],
};

impl AgentProfile {
    /// All six agent profiles, in canonical workflow order.
    pub fn all() -> [AgentProfile; 6] {
        [FRAMER, SCOUT, STRATEGIST, ALIGNER, EXECUTOR, NARRATOR]
    }

    pub fn for_label(label: AgentLabel) -> Option<AgentProfile> {
        Self::all().into_iter().find(|p| p.label == label)
    }

    pub fn may_export(&self, kind: ExportKind) -> bool {
        self.exports.contains(&kind)
    }
}
