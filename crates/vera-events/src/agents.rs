use serde::Serialize;

const FALLBACK_COLOR: &str = "#6b7280";

// (id, display name, color)
const AGENT_TABLE: &[(&str, &str, &str)] = &[
    ("claim_extractor", "Claim Extractor", "#6366f1"),
    ("claim_router", "Claim Router", "#0ea5e9"),
    ("evidence_researcher", "Evidence Researcher", "#10b981"),
    ("fact_checker", "Fact Checker", "#f59e0b"),
    ("source_auditor", "Source Auditor", "#14b8a6"),
    ("verdict_judge", "Verdict Judge", "#ef4444"),
    ("report_writer", "Report Writer", "#8b5cf6"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Presentation attributes for one pipeline agent.
pub struct AgentDisplay {
    pub name: String,
    pub color: &'static str,
}

/// Looks up how an agent should be labelled; unknown ids get a humanized name.
pub fn agent_display(agent_id: &str) -> AgentDisplay {
    match AGENT_TABLE.iter().find(|(id, _, _)| *id == agent_id) {
        Some(&(_, name, color)) => AgentDisplay {
            name: name.to_string(),
            color,
        },
        None => AgentDisplay {
            name: humanize(agent_id),
            color: FALLBACK_COLOR,
        },
    }
}

/// Agent ids with a dedicated entry in the display table, in pipeline order.
pub fn known_agent_ids() -> impl Iterator<Item = &'static str> {
    AGENT_TABLE.iter().map(|(id, _, _)| *id)
}

fn humanize(agent_id: &str) -> String {
    let words: Vec<String> = agent_id
        .split(['_', '-', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    if words.is_empty() {
        return "Unknown Agent".to_string();
    }
    words.join(" ")
}
