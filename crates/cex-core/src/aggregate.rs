use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::MetricGroup;
use crate::validation::{validate, EvaluationInput, FieldError, MetricValues};

/// Relative weight of each group in the composite score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CexWeights {
    pub comfort: f64,
    pub efficiency: f64,
    pub aesthetics: f64,
}

pub const CEX_WEIGHTS: CexWeights = CexWeights {
    comfort: 1.0,
    efficiency: 1.0,
    aesthetics: 1.0,
};

/// Caller-facing scores, rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub iata: String,
    pub airport: String,
    #[serde(rename = "C")]
    pub comfort: f64,
    #[serde(rename = "E")]
    pub efficiency: f64,
    #[serde(rename = "X")]
    pub aesthetics: f64,
    #[serde(rename = "CEX")]
    pub cex: f64,
}

/// Unrounded scores handed to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub iata: String,
    pub airport: String,
    pub comfort: f64,
    pub efficiency: f64,
    pub aesthetics: f64,
    pub cex: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreComputation {
    pub result: ScoreResult,
    pub record: ScoreRecord,
}

pub fn group_mean(metrics: &MetricValues, group: MetricGroup) -> f64 {
    let terms = group.metrics().map(|m| (metrics.get(m), 1.0));
    weighted_mean(&terms)
}

/// Mean of `(value, weight)` pairs. Falls back to dividing each term first
/// when the plain sum leaves the finite range.
fn weighted_mean(terms: &[(f64, f64)]) -> f64 {
    let total: f64 = terms.iter().map(|(_, w)| w).sum();
    let direct = terms.iter().map(|(v, w)| v * w).sum::<f64>() / total;
    if direct.is_finite() {
        return direct;
    }
    terms.iter().map(|(v, w)| v * (w / total)).sum()
}

/// Derives C, E, X and CEX. The composite is taken from the unrounded group
/// means; rounding happens last and only on the caller-facing copy.
pub fn compute(input: &EvaluationInput) -> ScoreComputation {
    let w = CEX_WEIGHTS;
    let c = group_mean(&input.metrics, MetricGroup::Comfort);
    let e = group_mean(&input.metrics, MetricGroup::Efficiency);
    let x = group_mean(&input.metrics, MetricGroup::Aesthetics);
    let cex = weighted_mean(&[(c, w.comfort), (e, w.efficiency), (x, w.aesthetics)]);

    ScoreComputation {
        result: ScoreResult {
            iata: input.iata.clone(),
            airport: input.airport.clone(),
            comfort: round2(c),
            efficiency: round2(e),
            aesthetics: round2(x),
            cex: round2(cex),
        },
        record: ScoreRecord {
            iata: input.iata.clone(),
            airport: input.airport.clone(),
            comfort: c,
            efficiency: e,
            aesthetics: x,
            cex,
        },
    }
}

pub fn evaluate(payload: &Map<String, Value>) -> Result<ScoreComputation, FieldError> {
    validate(payload).map(|input| compute(&input))
}

/// Two-decimal rounding, halves away from zero. Magnitudes too large to
/// scale are already integral and come back unchanged.
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if scaled.is_finite() {
        scaled.round() / 100.0
    } else {
        value
    }
}
