//! Structural validation of raw agent JSON.
//!
//! The validator walks the JSON by hand so that every violation carries the
//! exact path at which it occurred. It never mutates its input.

use serde_json::{Map, Value};

use super::error::{ValidationError, ViolationKind};
use super::output::{
    AuditOutput, AuditVerdict, Component, CritiqueOutput, IdeationOutput, PhaseOutput, Risk,
    RiskSeverity, TargetCritique, TradeOff,
};
use crate::deliberation::phase::Phase;

/// Key an agent uses to say it cannot continue without human input.
pub const INSUFFICIENT_INFORMATION: &str = "insufficient_information";

/// A validated agent reply.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentReply {
    Output(PhaseOutput),
    /// Blocking signal: the agent needs an answer before the phase can run.
    InsufficientInformation { question: String },
}

type Result<T> = std::result::Result<T, ValidationError>;

/// Validate a raw reply for `phase`.
pub fn validate(phase: Phase, raw: &Value) -> Result<AgentReply> {
    let root = Cursor::root(phase, raw);
    if !phase.is_agent_phase() {
        return Err(root.violation(ViolationKind::NotAnAgentPhase));
    }
    let object = root.object()?;

    if object.contains_key(INSUFFICIENT_INFORMATION) {
        let signal = root.required(INSUFFICIENT_INFORMATION)?;
        let question = signal.required("question")?.text()?;
        return Ok(AgentReply::InsufficientInformation { question });
    }

    let output = match phase {
        Phase::Ideation => PhaseOutput::Ideation(ideation(&root)?),
        Phase::Critique => PhaseOutput::Critique(critique(&root)?),
        Phase::Audit => PhaseOutput::Audit(audit(&root)?),
        Phase::ConvergenceCheck => return Err(root.violation(ViolationKind::NotAnAgentPhase)),
    };
    Ok(AgentReply::Output(output))
}

/// Check that a critique output covers exactly the proposals it was given.
pub fn check_targets(output: &CritiqueOutput, expected: &[String]) -> Result<()> {
    let mut seen: Vec<&str> = Vec::new();
    for (i, critique) in output.critiques.iter().enumerate() {
        let path = format!("critiques[{}].target", i);
        let target = critique.target.as_str();
        if !expected.iter().any(|e| e == target) {
            return Err(ValidationError::new(
                Phase::Critique,
                path,
                ViolationKind::UnknownTarget {
                    target: target.to_string(),
                },
            ));
        }
        if seen.contains(&target) {
            return Err(ValidationError::new(
                Phase::Critique,
                path,
                ViolationKind::DuplicateTarget {
                    target: target.to_string(),
                },
            ));
        }
        seen.push(target);
    }
    if let Some(missing) = expected.iter().find(|e| !seen.contains(&e.as_str())) {
        return Err(ValidationError::new(
            Phase::Critique,
            "critiques",
            ViolationKind::MissingTarget {
                target: missing.clone(),
            },
        ));
    }
    Ok(())
}

/// Check that an audit only refers to proposals and critiques of its round.
pub fn check_audit_references(
    output: &AuditOutput,
    proposal_ids: &[String],
    critique_ids: &[String],
) -> Result<()> {
    if let Some(preferred) = &output.preferred_proposal
        && !proposal_ids.contains(preferred)
    {
        return Err(ValidationError::new(
            Phase::Audit,
            "preferred_proposal",
            ViolationKind::UnknownTarget {
                target: preferred.clone(),
            },
        ));
    }
    for (i, resolved) in output.resolved_critiques.iter().enumerate() {
        if !critique_ids.contains(resolved) {
            return Err(ValidationError::new(
                Phase::Audit,
                format!("resolved_critiques[{}]", i),
                ViolationKind::UnknownTarget {
                    target: resolved.clone(),
                },
            ));
        }
    }
    Ok(())
}

// ==================== Phase schemas ====================

fn ideation(root: &Cursor<'_>) -> Result<IdeationOutput> {
    Ok(IdeationOutput {
        title: root.required("title")?.text()?,
        summary: root.required("summary")?.text()?,
        approach: root.required("approach")?.text()?,
        components: root.list("components", component)?,
        trade_offs: root.list("trade_offs", trade_off)?,
        risks: root.list("risks", risk)?,
        confidence: root.required("confidence")?.unit_interval()?,
        uncertainties: root.strings("uncertainties")?,
        mermaid_diagram: root.optional_text("mermaid_diagram")?,
        clarification_needed: root.optional_text("clarification_needed")?,
    })
}

fn critique(root: &Cursor<'_>) -> Result<CritiqueOutput> {
    let entries = root.required("critiques")?;
    let items = entries.array()?;
    if items.is_empty() {
        return Err(entries.violation(ViolationKind::Empty));
    }
    let critiques = items
        .iter()
        .map(target_critique)
        .collect::<Result<Vec<_>>>()?;
    Ok(CritiqueOutput {
        critiques,
        clarification_needed: root.optional_text("clarification_needed")?,
    })
}

fn target_critique(item: &Cursor<'_>) -> Result<TargetCritique> {
    Ok(TargetCritique {
        target: item.required("target")?.text()?,
        agreement: item.required("agreement")?.unit_interval()?,
        blocking: match item.get("blocking")? {
            Some(flag) => flag.boolean()?,
            None => false,
        },
        strengths: item.strings("strengths")?,
        weaknesses: item.strings("weaknesses")?,
        concerns: item.strings("concerns")?,
        suggestions: item.strings("suggestions")?,
    })
}

fn audit(root: &Cursor<'_>) -> Result<AuditOutput> {
    let verdict_at = root.required("verdict")?;
    let verdict_text = verdict_at.text()?;
    let verdict = AuditVerdict::parse(&verdict_text).ok_or_else(|| {
        verdict_at.violation(ViolationKind::InvalidValue {
            allowed: AuditVerdict::ALL.iter().map(|v| v.as_str().to_string()).collect(),
        })
    })?;

    Ok(AuditOutput {
        verdict,
        preferred_proposal: root.optional_text("preferred_proposal")?,
        rationale: root.required("rationale")?.text()?,
        synthesis_recommendation: root.optional_text("synthesis_recommendation")?,
        risks: root.list("risks", risk)?,
        integration_concerns: root.strings("integration_concerns")?,
        security_issues: root.strings("security_issues")?,
        resolved_critiques: root.strings("resolved_critiques")?,
        consensus_level: root.required("consensus_level")?.unit_interval()?,
        clarification_needed: root.optional_text("clarification_needed")?,
    })
}

fn component(item: &Cursor<'_>) -> Result<Component> {
    Ok(Component {
        name: item.required("name")?.text()?,
        kind: item.optional_text("type")?.unwrap_or_default(),
        technology: item.optional_text("technology")?.unwrap_or_default(),
        description: item.optional_text("description")?.unwrap_or_default(),
        dependencies: item.strings("dependencies")?,
    })
}

fn trade_off(item: &Cursor<'_>) -> Result<TradeOff> {
    Ok(TradeOff {
        aspect: item.required("aspect")?.text()?,
        choice: item.required("choice")?.text()?,
        rationale: item.optional_text("rationale")?.unwrap_or_default(),
        alternatives: item.strings("alternatives")?,
    })
}

fn risk(item: &Cursor<'_>) -> Result<Risk> {
    let severity_at = item.required("severity")?;
    let severity_text = severity_at.text()?;
    let severity = RiskSeverity::parse(&severity_text).ok_or_else(|| {
        severity_at.violation(ViolationKind::InvalidValue {
            allowed: RiskSeverity::ALL.iter().map(|v| v.as_str().to_string()).collect(),
        })
    })?;
    Ok(Risk {
        category: item
            .optional_text("category")?
            .unwrap_or_else(|| "general".to_string()),
        severity,
        description: item.required("description")?.text()?,
        mitigation: item.optional_text("mitigation")?.unwrap_or_default(),
    })
}

// ==================== JSON cursor ====================

/// A position in the reply, remembering how we got there.
struct Cursor<'a> {
    phase: Phase,
    path: String,
    value: &'a Value,
}

impl<'a> Cursor<'a> {
    fn root(phase: Phase, value: &'a Value) -> Self {
        Self {
            phase,
            path: String::new(),
            value,
        }
    }

    fn violation(&self, kind: ViolationKind) -> ValidationError {
        ValidationError::new(self.phase, self.path.clone(), kind)
    }

    fn child_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    fn object(&self) -> Result<&'a Map<String, Value>> {
        self.value
            .as_object()
            .ok_or_else(|| self.violation(ViolationKind::NotAnObject))
    }

    /// Field lookup; explicit `null` counts as absent.
    fn get(&self, key: &str) -> Result<Option<Cursor<'a>>> {
        let object = self.object()?;
        Ok(object.get(key).filter(|v| !v.is_null()).map(|value| Cursor {
            phase: self.phase,
            path: self.child_path(key),
            value,
        }))
    }

    fn required(&self, key: &str) -> Result<Cursor<'a>> {
        self.get(key)?.ok_or_else(|| {
            ValidationError::new(self.phase, self.child_path(key), ViolationKind::Missing)
        })
    }

    fn wrong_type(&self, expected: &str) -> ValidationError {
        self.violation(ViolationKind::WrongType {
            expected: expected.to_string(),
        })
    }

    /// Non-empty string, trimmed.
    fn text(&self) -> Result<String> {
        let s = self.value.as_str().ok_or_else(|| self.wrong_type("string"))?;
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(self.violation(ViolationKind::Empty));
        }
        Ok(trimmed.to_string())
    }

    /// Optional string field; blank strings are treated as absent.
    fn optional_text(&self, key: &str) -> Result<Option<String>> {
        match self.get(key)? {
            None => Ok(None),
            Some(field) => {
                let s = field.value.as_str().ok_or_else(|| field.wrong_type("string"))?;
                let trimmed = s.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
        }
    }

    fn boolean(&self) -> Result<bool> {
        self.value.as_bool().ok_or_else(|| self.wrong_type("boolean"))
    }

    fn unit_interval(&self) -> Result<f64> {
        let n = self.value.as_f64().ok_or_else(|| self.wrong_type("number"))?;
        if !(0.0..=1.0).contains(&n) {
            return Err(self.violation(ViolationKind::OutOfRange { min: 0.0, max: 1.0 }));
        }
        Ok(n)
    }

    fn array(&self) -> Result<Vec<Cursor<'a>>> {
        let items = self.value.as_array().ok_or_else(|| self.wrong_type("array"))?;
        Ok(items
            .iter()
            .enumerate()
            .map(|(i, value)| Cursor {
                phase: self.phase,
                path: format!("{}[{}]", self.path, i),
                value,
            })
            .collect())
    }

    /// Optional array of objects parsed with `item`.
    fn list<T>(&self, key: &str, item: fn(&Cursor<'a>) -> Result<T>) -> Result<Vec<T>> {
        match self.get(key)? {
            None => Ok(Vec::new()),
            Some(field) => field.array()?.iter().map(item).collect(),
        }
    }

    /// Optional array of strings; blank entries are dropped.
    fn strings(&self, key: &str) -> Result<Vec<String>> {
        match self.get(key)? {
            None => Ok(Vec::new()),
            Some(field) => {
                let mut out = Vec::new();
                for entry in field.array()? {
                    let s = entry.value.as_str().ok_or_else(|| entry.wrong_type("string"))?;
                    if !s.trim().is_empty() {
                        out.push(s.trim().to_string());
                    }
                }
                Ok(out)
            }
        }
    }
}
