use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quality tier of a synthesized response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisQuality {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for SynthesisQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SynthesisQuality::High => write!(f, "high"),
            SynthesisQuality::Medium => write!(f, "medium"),
            SynthesisQuality::Low => write!(f, "low"),
        }
    }
}

/// Summary figures attached to every synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetadata {
    pub total_agents: usize,
    pub synthesis_quality: SynthesisQuality,
    pub conflicts_resolved: usize,
}

/// One coherent response merged from every worker result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisOutput {
    pub synthesis: String,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Agent name → short summary of what it contributed.
    #[serde(default)]
    pub agent_contributions: BTreeMap<String, String>,
    pub metadata: QualityMetadata,
}

impl SynthesisOutput {
    /// Whether every structured field carries at least one entry.
    pub fn is_complete(&self) -> bool {
        !self.key_insights.is_empty()
            && !self.recommendations.is_empty()
            && !self.agent_contributions.is_empty()
    }
}
