use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{Metric, AIRPORT_FIELD, IATA_FIELD, REQUIRED_FIELDS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Missing field: {0}")]
    Missing(&'static str),

    #[error("Field {0} must be a number")]
    InvalidNumber(&'static str),
}

/// The twelve sub-metric values of one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[allow(non_snake_case)]
pub struct MetricValues {
    pub Sp: f64,
    pub Ac: f64,
    pub Da: f64,
    pub Zl: f64,
    pub To: f64,
    pub Ng: f64,
    pub Rt: f64,
    pub Pm: f64,
    pub Va: f64,
    pub Id: f64,
    pub Sc: f64,
    pub Lu: f64,
}

impl MetricValues {
    pub fn uniform(value: f64) -> Self {
        Metric::ALL
            .into_iter()
            .fold(Self::default(), |acc, m| acc.with(m, value))
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Sp => self.Sp,
            Metric::Ac => self.Ac,
            Metric::Da => self.Da,
            Metric::Zl => self.Zl,
            Metric::To => self.To,
            Metric::Ng => self.Ng,
            Metric::Rt => self.Rt,
            Metric::Pm => self.Pm,
            Metric::Va => self.Va,
            Metric::Id => self.Id,
            Metric::Sc => self.Sc,
            Metric::Lu => self.Lu,
        }
    }

    #[must_use]
    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        let slot = match metric {
            Metric::Sp => &mut self.Sp,
            Metric::Ac => &mut self.Ac,
            Metric::Da => &mut self.Da,
            Metric::Zl => &mut self.Zl,
            Metric::To => &mut self.To,
            Metric::Ng => &mut self.Ng,
            Metric::Rt => &mut self.Rt,
            Metric::Pm => &mut self.Pm,
            Metric::Va => &mut self.Va,
            Metric::Id => &mut self.Id,
            Metric::Sc => &mut self.Sc,
            Metric::Lu => &mut self.Lu,
        };
        *slot = value;
        self
    }
}

/// A payload that passed [`validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationInput {
    #[serde(flatten)]
    pub metrics: MetricValues,
    pub iata: String,
    pub airport: String,
}

/// Checks presence of all fourteen fields, then the numeric kind of the
/// twelve metrics. Reports only the first problem found.
pub fn validate(payload: &Map<String, Value>) -> Result<EvaluationInput, FieldError> {
    if let Some(missing) = REQUIRED_FIELDS
        .iter()
        .find(|field| !payload.contains_key(**field))
    {
        return Err(FieldError::Missing(*missing));
    }

    let mut metrics = MetricValues::default();
    for metric in Metric::ALL {
        let value = payload
            .get(metric.key())
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .ok_or(FieldError::InvalidNumber(metric.key()))?;
        metrics = metrics.with(metric, value);
    }

    Ok(EvaluationInput {
        metrics,
        iata: label_text(payload.get(IATA_FIELD)),
        airport: label_text(payload.get(AIRPORT_FIELD)),
    })
}

// Labels are only required to be present; non-string values keep their JSON text.
pub fn label_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
