//! Prompt templates for the deliberation phases

use crate::deliberation::phase::Phase;
use crate::deliberation::records::{Critique, Proposal};
use crate::deliberation::request::{AgentRequest, RequestPayload};

/// Templates for generating prompts at each phase
pub struct PromptTemplate;

impl PromptTemplate {
    /// System prompt for independent proposal generation
    pub fn ideation_system() -> &'static str {
        r#"You are a senior software architect on a design council.
Propose a complete architecture for the question you are given, independently of any other member.
Be concrete about components, technologies and trade-offs, and be honest about risks and uncertainty.
Respond with a single JSON object and nothing else."#
    }

    /// System prompt for critique of other members' proposals
    pub fn critique_system() -> &'static str {
        r#"You are a senior reviewer on a design council.
Critique each proposal you are given on its merits: correctness, operability, cost, and fit with the stated context.
Mark a critique as blocking only when the proposal cannot be accepted without addressing it.
Respond with a single JSON object and nothing else."#
    }

    /// System prompt for the auditor
    pub fn audit_system() -> &'static str {
        r#"You are the auditor of a design council.
Weigh every proposal against the critiques it received, decide whether the council can accept a design,
and say which critiques you consider resolved.
Respond with a single JSON object and nothing else."#
    }

    pub fn system_for(phase: Phase) -> &'static str {
        match phase {
            Phase::Critique => Self::critique_system(),
            Phase::Audit => Self::audit_system(),
            _ => Self::ideation_system(),
        }
    }

    /// Expected reply shape for a phase
    pub fn output_format(phase: Phase) -> &'static str {
        match phase {
            Phase::Critique => {
                r#"{
  "critiques": [
    {
      "target": "<proposal id>",
      "agreement": 0.0-1.0,
      "blocking": true|false,
      "strengths": ["..."],
      "weaknesses": ["..."],
      "concerns": ["..."],
      "suggestions": ["..."]
    }
  ],
  "clarification_needed": "<optional question for the human>"
}
Include exactly one entry per proposal listed above."#
            }
            Phase::Audit => {
                r#"{
  "verdict": "accept" | "revise" | "reject",
  "preferred_proposal": "<proposal id or null>",
  "rationale": "...",
  "synthesis_recommendation": "...",
  "risks": [{"category": "...", "severity": "low|medium|high|critical", "description": "...", "mitigation": "..."}],
  "integration_concerns": ["..."],
  "security_issues": ["..."],
  "resolved_critiques": ["<critique id>"],
  "consensus_level": 0.0-1.0,
  "clarification_needed": "<optional question for the human>"
}"#
            }
            _ => {
                r#"{
  "title": "...",
  "summary": "...",
  "approach": "...",
  "components": [{"name": "...", "type": "...", "technology": "...", "description": "...", "dependencies": ["..."]}],
  "trade_offs": [{"aspect": "...", "choice": "...", "rationale": "...", "alternatives": ["..."]}],
  "risks": [{"category": "...", "severity": "low|medium|high|critical", "description": "...", "mitigation": "..."}],
  "confidence": 0.0-1.0,
  "uncertainties": ["..."],
  "mermaid_diagram": "<optional>",
  "clarification_needed": "<optional question for the human>"
}"#
            }
        }
    }

    /// Render the user prompt for a request.
    pub fn user_prompt(request: &AgentRequest) -> String {
        let mut prompt = String::new();

        if let Some(brief) = &request.brief {
            prompt.push_str(&format!("Your role on the council:\n{}\n\n", brief));
        }

        prompt.push_str(&format!(
            "Design question:\n<user_input>\n{}\n</user_input>\n\nSystem context:\n{}\n",
            request.question, request.context
        ));

        if !request.clarifications.is_empty() {
            prompt.push_str("\nClarifications from the requester:\n");
            for c in &request.clarifications {
                prompt.push_str(&format!("- Q: {}\n  A: {}\n", c.question, c.answer));
            }
        }

        match &request.payload {
            RequestPayload::Ideation => {
                if let Some(audit) = &request.previous_audit {
                    prompt.push_str(&format!(
                        "\nThe audit of round {} concluded '{}': {}\n",
                        audit.round, audit.verdict, audit.rationale
                    ));
                    if let Some(synthesis) = &audit.synthesis_recommendation {
                        prompt.push_str(&format!("Auditor recommendation: {}\n", synthesis));
                    }
                    prompt.push_str("Propose an improved architecture for this round.\n");
                } else {
                    prompt.push_str("\nPropose an architecture.\n");
                }
            }
            RequestPayload::Critique { targets } => {
                prompt.push_str("\nProposals to critique:\n");
                for proposal in targets {
                    prompt.push_str(&Self::proposal_block(proposal));
                }
            }
            RequestPayload::Audit {
                proposals,
                critiques,
            } => {
                prompt.push_str("\nProposals:\n");
                for proposal in proposals {
                    prompt.push_str(&Self::proposal_block(proposal));
                }
                if !critiques.is_empty() {
                    prompt.push_str("\nCritiques:\n");
                    for critique in critiques {
                        prompt.push_str(&Self::critique_block(critique));
                    }
                }
            }
        }

        prompt.push_str(&format!(
            "\nRespond with JSON in this format:\n{}\n\
             If you cannot proceed without more information from the requester, respond with \
             {{\"insufficient_information\": {{\"question\": \"...\"}}}} instead.\n",
            Self::output_format(request.phase())
        ));

        if let Some(correction) = &request.correction {
            prompt.push_str(&format!("\n{}\n", correction));
        }

        prompt
    }

    fn proposal_block(proposal: &Proposal) -> String {
        let c = &proposal.content;
        let mut block = format!(
            "\n--- {} (by {}) ---\nTitle: {}\nSummary: {}\nApproach: {}\nConfidence: {:.0}%\n",
            proposal.id,
            proposal.author,
            c.title,
            c.summary,
            c.approach,
            c.confidence * 100.0
        );
        for component in &c.components {
            block.push_str(&format!(
                "  Component {} ({}): {}\n",
                component.name, component.kind, component.technology
            ));
        }
        for trade_off in &c.trade_offs {
            block.push_str(&format!(
                "  Trade-off {}: {} because {}\n",
                trade_off.aspect, trade_off.choice, trade_off.rationale
            ));
        }
        for risk in &c.risks {
            block.push_str(&format!(
                "  Risk [{}] {}: {}\n",
                risk.severity.as_str(),
                risk.category,
                risk.description
            ));
        }
        block
    }

    fn critique_block(critique: &Critique) -> String {
        let c = &critique.content;
        format!(
            "\n--- {} on {} ---\nAgreement: {:.0}%{}\nWeaknesses: {}\nConcerns: {}\nSuggestions: {}\n",
            critique.id,
            critique.target,
            c.agreement * 100.0,
            if c.blocking { " (BLOCKING)" } else { "" },
            c.weaknesses.join("; "),
            c.concerns.join("; "),
            c.suggestions.join("; ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::{AgentId, RunId};
    use crate::deliberation::records::AnsweredClarification;

    fn request(payload: RequestPayload) -> AgentRequest {
        AgentRequest {
            run_id: RunId::new(),
            agent: AgentId::new("architect"),
            round: 0,
            question: "How do we store audit logs?".to_string(),
            context: "Domain: fintech".to_string(),
            brief: Some("You favour managed services.".to_string()),
            clarifications: vec![AnsweredClarification {
                question: "Retention?".to_string(),
                answer: "7 years".to_string(),
            }],
            previous_audit: None,
            payload,
            correction: None,
        }
    }

    #[test]
    fn test_ideation_prompt_contains_inputs() {
        let prompt = PromptTemplate::user_prompt(&request(RequestPayload::Ideation));
        assert!(prompt.contains("You favour managed services."));
        assert!(prompt.contains("<user_input>\nHow do we store audit logs?\n</user_input>"));
        assert!(prompt.contains("- Q: Retention?\n  A: 7 years"));
        assert!(prompt.contains("\"confidence\""));
        assert!(prompt.contains("insufficient_information"));
    }

    #[test]
    fn test_correction_is_appended() {
        let req = request(RequestPayload::Ideation).with_correction("Fix `confidence`.");
        let prompt = PromptTemplate::user_prompt(&req);
        assert!(prompt.trim_end().ends_with("Fix `confidence`."));
    }

    #[test]
    fn test_system_prompt_per_phase() {
        assert!(PromptTemplate::system_for(Phase::Audit).contains("auditor"));
        assert!(PromptTemplate::system_for(Phase::Critique).contains("reviewer"));
    }
}
