use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use cex_core::ScoreRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationRecord {
    pub id: String,
    pub iata: String,
    pub airport: String,
    pub comfort: f64,
    pub efficiency: f64,
    pub aesthetics: f64,
    pub cex: f64,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CexOrder {
    Ascending,
    Descending,
}

/// Filter and ordering predicates. Every set field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct EvaluationQuery {
    pub iata: Option<String>,
    /// Inclusive lower bound on `cex`.
    pub min_cex: Option<f64>,
    /// Exclusive upper bound on `cex`.
    pub below_cex: Option<f64>,
    pub airport_contains: Option<String>,
    pub order: Option<CexOrder>,
    pub limit: Option<usize>,
}

impl EvaluationQuery {
    pub fn ordered(order: CexOrder) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }
}

pub trait StorageBackend: Send {
    fn insert(&mut self, record: ScoreRecord) -> Result<EvaluationRecord, StorageError>;
    fn query(&self, query: &EvaluationQuery) -> Vec<EvaluationRecord>;
    fn latest_by_iata(&self, iata: &str) -> Option<EvaluationRecord>;
    fn list(&self, limit: usize) -> Vec<EvaluationRecord>;
    fn stats(&self) -> serde_json::Value;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Persisted {
    entries: Vec<EvaluationRecord>,
}

/// JSON-file backend. Rows are only ever appended; the whole file is
/// rewritten on each insert.
pub struct PersistentEvaluationStore {
    path: PathBuf,
    entries: Vec<EvaluationRecord>,
    next_id: u64,
}

impl PersistentEvaluationStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        if !path.exists() {
            let persisted = Persisted::default();
            let bytes = serde_json::to_vec_pretty(&persisted)?;
            fs::write(&path, bytes)?;
        }

        let bytes = fs::read(&path)?;
        let persisted: Persisted = serde_json::from_slice(&bytes)?;
        let next_id = persisted
            .entries
            .iter()
            .filter_map(|e| e.id.strip_prefix("eval-")?.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;

        Ok(Self {
            path,
            entries: persisted.entries,
            next_id,
        })
    }

    pub fn insert(&mut self, record: ScoreRecord) -> Result<EvaluationRecord, StorageError> {
        if record.iata.trim().is_empty() {
            return Err(StorageError::InvalidInput(
                "iata cannot be empty".to_string(),
            ));
        }
        let scores = [
            record.comfort,
            record.efficiency,
            record.aesthetics,
            record.cex,
        ];
        if scores.iter().any(|v| !v.is_finite()) {
            return Err(StorageError::InvalidInput(
                "scores must be finite numbers".to_string(),
            ));
        }

        let entry = EvaluationRecord {
            id: format!("eval-{}", self.next_id),
            iata: record.iata,
            airport: record.airport,
            comfort: record.comfort,
            efficiency: record.efficiency,
            aesthetics: record.aesthetics,
            cex: record.cex,
            timestamp_ms: now_ms(),
        };

        self.entries.push(entry.clone());
        if let Err(err) = self.persist() {
            self.entries.pop();
            return Err(err);
        }
        self.next_id += 1;

        Ok(entry)
    }

    pub fn query(&self, query: &EvaluationQuery) -> Vec<EvaluationRecord> {
        query_records(&self.entries, query)
    }

    pub fn latest_by_iata(&self, iata: &str) -> Option<EvaluationRecord> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.iata.eq_ignore_ascii_case(iata))
            .cloned()
    }

    pub fn list(&self, limit: usize) -> Vec<EvaluationRecord> {
        let n = limit.max(1);
        self.entries.iter().rev().take(n).cloned().collect()
    }

    pub fn stats(&self) -> serde_json::Value {
        let mut codes: Vec<&str> = self.entries.iter().map(|e| e.iata.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        serde_json::json!({
            "backend": "json",
            "count": self.entries.len(),
            "airports": codes.len(),
            "path": self.path,
        })
    }

    fn persist(&self) -> Result<(), StorageError> {
        let persisted = Persisted {
            entries: self.entries.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&persisted)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }
}

impl StorageBackend for PersistentEvaluationStore {
    fn insert(&mut self, record: ScoreRecord) -> Result<EvaluationRecord, StorageError> {
        Self::insert(self, record)
    }

    fn query(&self, query: &EvaluationQuery) -> Vec<EvaluationRecord> {
        Self::query(self, query)
    }

    fn latest_by_iata(&self, iata: &str) -> Option<EvaluationRecord> {
        Self::latest_by_iata(self, iata)
    }

    fn list(&self, limit: usize) -> Vec<EvaluationRecord> {
        Self::list(self, limit)
    }

    fn stats(&self) -> serde_json::Value {
        Self::stats(self)
    }
}

pub fn query_records(entries: &[EvaluationRecord], query: &EvaluationQuery) -> Vec<EvaluationRecord> {
    let needle = query
        .airport_contains
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut out: Vec<EvaluationRecord> = entries
        .iter()
        .filter(|e| match &query.iata {
            Some(code) => e.iata.eq_ignore_ascii_case(code),
            None => true,
        })
        .filter(|e| query.min_cex.is_none_or(|min| e.cex >= min))
        .filter(|e| query.below_cex.is_none_or(|max| e.cex < max))
        .filter(|e| match &needle {
            Some(n) => e.airport.to_lowercase().contains(n.as_str()),
            None => true,
        })
        .cloned()
        .collect();

    // stable sort keeps insertion order among equal scores
    match query.order {
        Some(CexOrder::Ascending) => out.sort_by(cmp_cex),
        Some(CexOrder::Descending) => out.sort_by(|a, b| cmp_cex(b, a)),
        None => {}
    }

    if let Some(limit) = query.limit {
        out.truncate(limit);
    }
    out
}

fn cmp_cex(a: &EvaluationRecord, b: &EvaluationRecord) -> Ordering {
    a.cex.total_cmp(&b.cex)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
