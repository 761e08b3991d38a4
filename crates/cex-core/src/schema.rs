//! Field schema for evaluation payloads.
//!
//! Twelve numeric sub-metrics split in three groups of four, plus two
//! identifying labels. The order of [`REQUIRED_FIELDS`] is the order in which
//! validation reports problems.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricGroup {
    Comfort,
    Efficiency,
    Aesthetics,
}

impl MetricGroup {
    pub const ALL: [Self; 3] = [Self::Comfort, Self::Efficiency, Self::Aesthetics];

    pub fn label(self) -> &'static str {
        match self {
            Self::Comfort => "Comfort (C)",
            Self::Efficiency => "Efficiency (E)",
            Self::Aesthetics => "Aesthetics (X)",
        }
    }

    pub fn metrics(self) -> [Metric; 4] {
        match self {
            Self::Comfort => [Metric::Sp, Metric::Ac, Metric::Da, Metric::Zl],
            Self::Efficiency => [Metric::To, Metric::Ng, Metric::Rt, Metric::Pm],
            Self::Aesthetics => [Metric::Va, Metric::Id, Metric::Sc, Metric::Lu],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Sp,
    Ac,
    Da,
    Zl,
    To,
    Ng,
    Rt,
    Pm,
    Va,
    Id,
    Sc,
    Lu,
}

impl Metric {
    pub const ALL: [Self; 12] = [
        Self::Sp,
        Self::Ac,
        Self::Da,
        Self::Zl,
        Self::To,
        Self::Ng,
        Self::Rt,
        Self::Pm,
        Self::Va,
        Self::Id,
        Self::Sc,
        Self::Lu,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Sp => "Sp",
            Self::Ac => "Ac",
            Self::Da => "Da",
            Self::Zl => "Zl",
            Self::To => "To",
            Self::Ng => "Ng",
            Self::Rt => "Rt",
            Self::Pm => "Pm",
            Self::Va => "Va",
            Self::Id => "Id",
            Self::Sc => "Sc",
            Self::Lu => "Lu",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Sp => "Average personal space per passenger (m²)",
            Self::Ac => "Accessibility of seating (relative quantity per m²)",
            Self::Da => "Average distance to the boarding gate",
            Self::Zl => "Quality of leisure and waiting areas",
            Self::To => "Average check-in and boarding time",
            Self::Ng => "Number of operating counters",
            Self::Rt => "On-time flight regularity",
            Self::Pm => "Accuracy of monitors and information panels",
            Self::Va => "Internal visibility and spatial amplitude",
            Self::Id => "Integration with the local urban design",
            Self::Sc => "Signage and visual clarity",
            Self::Lu => "Use of natural light",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }
}

pub const IATA_FIELD: &str = "iata";
pub const AIRPORT_FIELD: &str = "airport";

pub const REQUIRED_FIELDS: [&str; 14] = [
    "Sp", "Ac", "Da", "Zl", "To", "Ng", "Rt", "Pm", "Va", "Id", "Sc", "Lu", IATA_FIELD,
    AIRPORT_FIELD,
];
