//! Prompt rendering and reply parsing shared by all evaluators.

use std::fmt::Write as _;

use cex_core::{Metric, MetricGroup};
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::types::EvaluationPrompt;

pub const SYSTEM_MESSAGE: &str = "You are a helpful assistant.";

const PROMPT_TEMPLATE: &str = include_str!("../prompts/airport-evaluation.md");

pub fn render_prompt(prompt: &EvaluationPrompt) -> String {
    let criteria = criteria_list();
    fill_placeholders(
        PROMPT_TEMPLATE,
        &[
            ("airport", prompt.airport.as_str()),
            ("iata", prompt.iata.as_str()),
            ("criteria", criteria.as_str()),
        ],
    )
}

/// Numbered criteria, one bold heading per group.
fn criteria_list() -> String {
    let mut out = String::new();
    let mut n = 0;
    for group in MetricGroup::ALL {
        if n > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "**{}**", group.label());
        for metric in group.metrics() {
            n += 1;
            let _ = writeln!(out, "{n}. {} — {}", metric.key(), metric.description());
        }
    }
    out
}

// Single pass: substituted values are never scanned again. Unknown `{...}`
// sequences are copied through.
fn fill_placeholders(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let (head, tail) = rest.split_at(start);
        out.push_str(head);
        let after = tail.strip_prefix('{').unwrap_or(tail);
        let hit = vars.iter().find_map(|(name, value)| {
            let remaining = after.strip_prefix(*name)?.strip_prefix('}')?;
            Some((*value, remaining))
        });
        match hit {
            Some((value, remaining)) => {
                out.push_str(value);
                rest = remaining;
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Pulls the metric object out of a model reply.
///
/// Prefers the first ```` ```json ```` fenced block. When the candidate text
/// does not parse, anything outside the outermost braces is dropped and the
/// parse is retried. Keys other than the twelve metrics are discarded.
pub fn extract_metrics(reply: &str) -> Result<Map<String, Value>, ProviderError> {
    let candidate = fenced_json(reply).unwrap_or(reply);

    let parsed = serde_json::from_str::<Value>(candidate)
        .ok()
        .or_else(|| {
            let start = candidate.find('{')?;
            let end = candidate.rfind('}')?;
            let inner = candidate.get(start..=end)?;
            serde_json::from_str::<Value>(inner).ok()
        })
        .ok_or_else(|| {
            ProviderError::InvalidResponse("failed to parse AI response as JSON".to_string())
        })?;

    let Value::Object(object) = parsed else {
        return Err(ProviderError::InvalidResponse(
            "AI response is not a JSON object".to_string(),
        ));
    };

    Ok(object
        .into_iter()
        .filter(|(k, _)| Metric::from_key(k).is_some())
        .collect())
}

fn fenced_json(reply: &str) -> Option<&str> {
    const FENCE: &str = "```json";
    // ascii lowering keeps byte offsets aligned with `reply`
    let lowered = reply.to_ascii_lowercase();
    let open = lowered.find(FENCE)? + FENCE.len();
    let rest = reply.get(open..)?;
    let close = rest.find("```")?;
    rest.get(..close).map(str::trim)
}
