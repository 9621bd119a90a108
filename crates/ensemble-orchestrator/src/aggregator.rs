use crate::parse::{strip_confidence, CONFIDENCE_KEYS};
use crate::synthesizer::{SynthesisInput, Synthesizer};
use ensemble_core::{
    EnsembleError, QualityMetadata, SynthesisOutput, SynthesisQuality, TaskGraph, WorkerResult,
};
use ensemble_workers::WorkerRegistry;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{info, warn};

const MIN_SYNTHESIS_CHARS: usize = 50;
const HIGH_QUALITY_CHARS: usize = 200;
const CONTRIBUTION_SUMMARY_CHARS: usize = 160;

/// One candidate answer inside a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultOption {
    pub task: String,
    pub agent: String,
    pub priority: u32,
    pub confidence: Option<f64>,
    pub output: String,
}

impl From<&WorkerResult> for ResultOption {
    fn from(result: &WorkerResult) -> Self {
        Self {
            task: result.task.clone(),
            agent: result.agent.clone(),
            priority: result.priority,
            confidence: result.confidence,
            output: result.output.clone(),
        }
    }
}

/// How divergent results in one claim category were settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolution {
    pub category: String,
    pub primary: ResultOption,
    /// Every losing result, best first.
    pub alternative_options: Vec<ResultOption>,
}

/// Maps workers to the claim category their results compete in.
///
/// Config overrides come first, then the worker's declared category. A worker
/// with neither competes only with itself.
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    categories: HashMap<String, String>,
}

impl CategoryMap {
    pub fn new(overrides: &HashMap<String, String>, registry: &WorkerRegistry) -> Self {
        let mut categories: HashMap<String, String> = registry
            .list_descriptors()
            .into_iter()
            .filter_map(|d| d.category.clone().map(|c| (d.name.clone(), c)))
            .collect();
        categories.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { categories }
    }

    pub fn category_of(&self, result: &WorkerResult) -> String {
        match self.categories.get(&result.agent) {
            Some(category) => category.clone(),
            None => format!("task:{}", result.task),
        }
    }
}

/// Canonical form of a result's claim, used to decide whether two results disagree.
///
/// Structured output is rendered as sorted JSON without confidence keys;
/// anything else becomes its lower-cased alphanumeric words.
pub fn normalize_output(result: &WorkerResult) -> String {
    if let Some(mut value) = result.parsed.clone() {
        if let Some(object) = value.as_object_mut() {
            for key in CONFIDENCE_KEYS {
                object.remove(*key);
            }
        }
        if let Ok(rendered) = serde_json::to_string(&value) {
            return rendered;
        }
    }
    strip_confidence(&result.output)
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Find every category whose successful results disagree and pick a primary.
///
/// Highest confidence wins, a missing confidence ranks lowest. Ties go to the
/// lower priority, then to the earlier log entry.
pub fn resolve_conflicts(results: &[WorkerResult], categories: &CategoryMap) -> Vec<ConflictResolution> {
    let mut groups: BTreeMap<String, Vec<(usize, &WorkerResult)>> = BTreeMap::new();
    for (index, result) in results.iter().enumerate().filter(|(_, r)| r.success) {
        groups
            .entry(categories.category_of(result))
            .or_default()
            .push((index, result));
    }

    let mut conflicts = Vec::new();
    for (category, mut members) in groups {
        if members.len() < 2 {
            continue;
        }
        let distinct: BTreeSet<String> = members.iter().map(|(_, r)| normalize_output(r)).collect();
        if distinct.len() < 2 {
            continue;
        }

        members.sort_by(|(ia, a), (ib, b)| {
            rank(b)
                .partial_cmp(&rank(a))
                .unwrap_or(Ordering::Equal)
                .then(a.priority.cmp(&b.priority))
                .then(ia.cmp(ib))
        });

        let mut options = members.into_iter().map(|(_, r)| ResultOption::from(r));
        let Some(primary) = options.next() else {
            continue;
        };
        info!(
            category = %category,
            primary = %primary.agent,
            alternatives = options.len(),
            "Resolved conflict"
        );
        conflicts.push(ConflictResolution {
            category,
            primary,
            alternative_options: options.collect(),
        });
    }
    conflicts
}

fn rank(result: &WorkerResult) -> f64 {
    result.confidence.unwrap_or(f64::NEG_INFINITY)
}

/// Quality tier for a synthesis built from `results`.
pub fn quality_tier(output: &SynthesisOutput, results: &[WorkerResult]) -> SynthesisQuality {
    let total = results.len();
    let failed = results.iter().filter(|r| !r.success).count();
    let length = output.synthesis.chars().count();

    if total == 0 || failed * 2 >= total || length < MIN_SYNTHESIS_CHARS {
        SynthesisQuality::Low
    } else if failed == 0 && output.is_complete() && length >= HIGH_QUALITY_CHARS {
        SynthesisQuality::High
    } else {
        SynthesisQuality::Medium
    }
}

fn distinct_agents(results: &[WorkerResult]) -> usize {
    results.iter().map(|r| r.agent.as_str()).collect::<BTreeSet<_>>().len()
}

fn heading(result: &WorkerResult) -> String {
    if result.task == result.agent {
        result.agent.clone()
    } else {
        format!("{} ({})", result.agent, result.task)
    }
}

fn summarize(output: &str) -> String {
    let first_line = output.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let mut summary: String = first_line.chars().take(CONTRIBUTION_SUMMARY_CHARS).collect();
    if first_line.chars().count() > CONTRIBUTION_SUMMARY_CHARS {
        summary.push('…');
    }
    summary
}

/// Build a response from the result log alone.
///
/// Every successful output appears verbatim under its own heading, followed by
/// the list of failed workers. Quality is always low.
pub fn deterministic_synthesis(
    request: &str,
    results: &[WorkerResult],
    conflicts: &[ConflictResolution],
) -> SynthesisOutput {
    let mut text = format!("Results for: {request}");
    let mut contributions = BTreeMap::new();

    let successes: Vec<&WorkerResult> = results.iter().filter(|r| r.success).collect();
    if successes.is_empty() {
        text.push_str("\n\nNo agent produced a result.");
    }
    for result in &successes {
        let _ = write!(text, "\n\n## {}\n{}", heading(result), result.output.trim());
        contributions
            .entry(result.agent.clone())
            .or_insert_with(|| summarize(&result.output));
    }

    let failures: Vec<&WorkerResult> = results.iter().filter(|r| !r.success).collect();
    if !failures.is_empty() {
        text.push_str("\n\n## Failed agents");
        for result in failures {
            let reason = result.error_message().unwrap_or("unknown error");
            let _ = write!(text, "\n- {}: {}", heading(result), reason);
        }
    }

    let key_insights = conflicts
        .iter()
        .map(|c| {
            let others: Vec<&str> = c.alternative_options.iter().map(|o| o.agent.as_str()).collect();
            format!(
                "{}: preferred {} over {}",
                c.category,
                c.primary.agent,
                others.join(", ")
            )
        })
        .collect();

    SynthesisOutput {
        synthesis: text,
        key_insights,
        recommendations: Vec::new(),
        agent_contributions: contributions,
        metadata: QualityMetadata {
            total_agents: distinct_agents(results),
            synthesis_quality: SynthesisQuality::Low,
            conflicts_resolved: conflicts.len(),
        },
    }
}

/// Outcome of aggregation.
#[derive(Debug)]
pub struct Aggregation {
    pub output: SynthesisOutput,
    pub conflicts: Vec<ConflictResolution>,
    /// Whether the deterministic path produced `output`.
    pub deterministic: bool,
    /// Why the synthesis oracle was not used, when it failed.
    pub error: Option<EnsembleError>,
}

/// Resolves conflicts and produces the final synthesis.
pub struct Aggregator {
    synthesizer: Option<Arc<dyn Synthesizer>>,
    categories: CategoryMap,
}

impl Aggregator {
    pub fn new(synthesizer: Option<Arc<dyn Synthesizer>>, categories: CategoryMap) -> Self {
        Self {
            synthesizer,
            categories,
        }
    }

    pub async fn aggregate(
        &self,
        request: &str,
        decomposition: &TaskGraph,
        results: &[WorkerResult],
    ) -> Aggregation {
        let conflicts = resolve_conflicts(results, &self.categories);

        let Some(synthesizer) = &self.synthesizer else {
            return Aggregation {
                output: deterministic_synthesis(request, results, &conflicts),
                conflicts,
                deterministic: true,
                error: None,
            };
        };

        let input = SynthesisInput {
            original_request: request.to_string(),
            decomposition: decomposition.clone(),
            results: results.to_vec(),
            conflicts,
        };

        let attempt = synthesizer.synthesize(&input).await.and_then(|output| {
            if output.synthesis.trim().is_empty() {
                Err(EnsembleError::Synthesis("synthesizer returned empty text".to_string()))
            } else {
                Ok(output)
            }
        });

        match attempt {
            Ok(mut output) => {
                output.metadata = QualityMetadata {
                    total_agents: distinct_agents(results),
                    synthesis_quality: quality_tier(&output, results),
                    conflicts_resolved: input.conflicts.len(),
                };
                Aggregation {
                    output,
                    conflicts: input.conflicts,
                    deterministic: false,
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Synthesis failed, using deterministic synthesis");
                Aggregation {
                    output: deterministic_synthesis(request, results, &input.conflicts),
                    conflicts: input.conflicts,
                    deterministic: true,
                    error: Some(e),
                }
            }
        }
    }
}
