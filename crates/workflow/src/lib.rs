//! Workflow state machine: phase derivation, agent gating, and redirects.
//!
//! Phases move `problem_discovery → decision → execution → communication`.
//! The phase is never stored independently of the artifacts that unlock it:
//! [`derive_phase`] computes it from the artifact map, and [`commit`] only
//! ever moves a session forward.
//!
//! Gating table:
//!
//! | Requested  | Needs             | Suggested on denial |
//! |------------|-------------------|---------------------|
//! | strategist | `problem_statement` | framer            |
//! | aligner    | `decision_record` | strategist          |
//! | executor   | `decision_record` | strategist          |
//!
//! Every other agent (and the narrator in particular) is always allowed.

use std::fmt;

use pmos_core::agent::AgentLabel;
use pmos_core::session::{Artifact, ArtifactKind, ArtifactMap, Decision, Phase, Session};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Gating ──────────────────────────────────────────────────────────────────

/// A gate denial: what is missing and who can produce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    pub requested: AgentLabel,
    pub required_artifact: ArtifactKind,
    pub suggested_agent: AgentLabel,
}

impl Denial {
    /// User-facing redirect text.
    pub fn explanation(&self) -> String {
        format!(
            "The {} needs {} first; try the {}.",
            self.requested,
            self.required_artifact.describe(),
            self.suggested_agent
        )
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.explanation())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Authorization {
    Allow,
    Deny(Denial),
}

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Self::Allow => None,
            Self::Deny(d) => Some(d),
        }
    }
}

/// The artifact an agent needs and the agent that produces it.
pub fn requirement(label: AgentLabel) -> Option<(ArtifactKind, AgentLabel)> {
    match label {
        AgentLabel::Strategist => Some((ArtifactKind::ProblemStatement, AgentLabel::Framer)),
        AgentLabel::Aligner | AgentLabel::Executor => {
            Some((ArtifactKind::DecisionRecord, AgentLabel::Strategist))
        }
        AgentLabel::Scout | AgentLabel::Framer | AgentLabel::Narrator | AgentLabel::Unclear => None,
    }
}

/// Decide whether `label` may run against `artifacts`.
///
/// Pure: the same artifacts and label always give the same answer.
pub fn authorize(artifacts: &ArtifactMap, label: AgentLabel) -> Authorization {
    match requirement(label) {
        Some((required, suggested)) if !artifacts.contains(required) => {
            debug!(agent = %label, missing = %required, "Workflow gate denied");
            Authorization::Deny(Denial {
                requested: label,
                required_artifact: required,
                suggested_agent: suggested,
            })
        }
        _ => Authorization::Allow,
    }
}

/// Follow suggestions from a denied agent until one is allowed.
///
/// Returns `None` only if the suggestion path cycles, which the gating
/// table never does.
pub fn redirect_target(artifacts: &ArtifactMap, label: AgentLabel) -> Option<AgentLabel> {
    let mut current = label;
    for _ in 0..=AgentLabel::AGENTS.len() {
        match authorize(artifacts, current) {
            Authorization::Allow => return Some(current),
            Authorization::Deny(d) => current = d.suggested_agent,
        }
    }
    None
}

// ── Phase ───────────────────────────────────────────────────────────────────

/// The most advanced phase whose unlocking artifact is present.
pub fn derive_phase(artifacts: &ArtifactMap) -> Phase {
    if artifacts.contains(ArtifactKind::ExecSummary) {
        Phase::Communication
    } else if artifacts.contains(ArtifactKind::DecisionRecord) {
        Phase::Execution
    } else if artifacts.contains(ArtifactKind::ProblemStatement) {
        Phase::Decision
    } else {
        Phase::ProblemDiscovery
    }
}

/// Apply committed results to a session and recompute its phase.
pub fn commit(session: &mut Session, artifacts: Vec<Artifact>, decisions: Vec<Decision>) {
    session.commit(artifacts, decisions);
    let phase = derive_phase(session.artifacts());
    if phase != session.phase() {
        debug!(session_id = %session.id(), from = %session.phase(), to = %phase, "Phase advanced");
    }
    session.advance_phase(phase);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmos_core::session::SessionId;
    use serde_json::json;

    fn artifact(kind: ArtifactKind, by: AgentLabel) -> Artifact {
        Artifact::new(kind, json!({"summary": kind.as_str()}), by)
    }

    fn with(kinds: &[ArtifactKind]) -> ArtifactMap {
        let mut map = ArtifactMap::new();
        for kind in kinds {
            map.insert(artifact(*kind, AgentLabel::Framer));
        }
        map
    }

    #[test]
    fn ungated_agents_always_allowed() {
        let empty = ArtifactMap::new();
        for label in [AgentLabel::Scout, AgentLabel::Framer, AgentLabel::Narrator] {
            assert_eq!(authorize(&empty, label), Authorization::Allow);
        }
    }

    #[test]
    fn executor_without_artifacts_is_redirected_to_strategist() {
        let auth = authorize(&ArtifactMap::new(), AgentLabel::Executor);
        let denial = auth.denial().unwrap();
        assert_eq!(denial.required_artifact, ArtifactKind::DecisionRecord);
        assert_eq!(denial.suggested_agent, AgentLabel::Strategist);
        assert!(denial.explanation().contains("a logged decision"));
        assert!(denial.explanation().contains("strategist"));
    }

    #[test]
    fn strategist_needs_problem_statement() {
        let auth = authorize(&ArtifactMap::new(), AgentLabel::Strategist);
        assert_eq!(auth.denial().unwrap().suggested_agent, AgentLabel::Framer);

        let auth = authorize(&with(&[ArtifactKind::ProblemStatement]), AgentLabel::Strategist);
        assert!(auth.is_allowed());
    }

    #[test]
    fn decision_record_unlocks_aligner_and_executor() {
        // Whatever else is present or missing
        for extra in [&[][..], &[ArtifactKind::ExecSummary], &[ArtifactKind::MvpScope]] {
            let mut kinds = vec![ArtifactKind::DecisionRecord];
            kinds.extend_from_slice(extra);
            let map = with(&kinds);
            assert!(authorize(&map, AgentLabel::Aligner).is_allowed());
            assert!(authorize(&map, AgentLabel::Executor).is_allowed());
        }
    }

    #[test]
    fn redirect_walks_to_first_allowed_agent() {
        let empty = ArtifactMap::new();
        assert_eq!(redirect_target(&empty, AgentLabel::Executor), Some(AgentLabel::Framer));
        let framed = with(&[ArtifactKind::ProblemStatement]);
        assert_eq!(redirect_target(&framed, AgentLabel::Executor), Some(AgentLabel::Strategist));
        assert_eq!(redirect_target(&framed, AgentLabel::Scout), Some(AgentLabel::Scout));
    }

    #[test]
    fn phase_is_most_advanced_unlocked() {
        assert_eq!(derive_phase(&ArtifactMap::new()), Phase::ProblemDiscovery);
        assert_eq!(derive_phase(&with(&[ArtifactKind::ProblemStatement])), Phase::Decision);
        assert_eq!(derive_phase(&with(&[ArtifactKind::DecisionRecord])), Phase::Execution);
        assert_eq!(derive_phase(&with(&[ArtifactKind::MvpScope])), Phase::ProblemDiscovery);
        // Narrator output is reachable from any state
        assert_eq!(derive_phase(&with(&[ArtifactKind::ExecSummary])), Phase::Communication);
    }

    #[test]
    fn commit_recomputes_phase() {
        let mut session = Session::new(SessionId::from("s-1"));
        commit(
            &mut session,
            vec![artifact(ArtifactKind::ProblemStatement, AgentLabel::Framer)],
            vec![],
        );
        assert_eq!(session.phase(), Phase::Decision);

        commit(
            &mut session,
            vec![artifact(ArtifactKind::DecisionRecord, AgentLabel::Strategist)],
            vec![Decision::new(AgentLabel::Strategist, "Fix onboarding first")],
        );
        assert_eq!(session.phase(), Phase::Execution);
        assert_eq!(session.decisions().len(), 1);
    }

    fn orders(kinds: &[ArtifactKind]) -> Vec<Vec<ArtifactKind>> {
        if kinds.len() <= 1 {
            return vec![kinds.to_vec()];
        }
        let mut out = Vec::new();
        for (i, first) in kinds.iter().enumerate() {
            let mut rest = kinds.to_vec();
            rest.remove(i);
            for mut tail in orders(&rest) {
                tail.insert(0, *first);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn committed_phase_matches_derived_phase_in_any_order() {
        let kinds = [
            ArtifactKind::ProblemStatement,
            ArtifactKind::DecisionRecord,
            ArtifactKind::MvpScope,
            ArtifactKind::ExecSummary,
        ];
        let all = orders(&kinds);
        assert_eq!(all.len(), 24);

        for order in all {
            let mut session = Session::new(SessionId::from("s-order"));
            for kind in &order {
                commit(&mut session, vec![artifact(*kind, AgentLabel::Framer)], vec![]);
                assert_eq!(
                    session.phase(),
                    derive_phase(session.artifacts()),
                    "order {order:?} diverged after {kind:?}"
                );
            }
            assert_eq!(session.phase(), Phase::Communication, "order {order:?}");
        }
    }

    #[test]
    fn authorization_serializes_with_tag() {
        let auth = authorize(&ArtifactMap::new(), AgentLabel::Aligner);
        let value = serde_json::to_value(auth).unwrap();
        assert_eq!(value["decision"], "deny");
        assert_eq!(value["suggested_agent"], "strategist");
    }
}
