use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoringRunId(pub String);

impl ScoringRunId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringRunStatus {
    Running,
    Succeeded,
    Failed,
}

impl ScoringRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// History entry for one invocation of the scoring job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoringRun {
    pub id: ScoringRunId,
    pub status: ScoringRunStatus,
    pub as_of: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub products_seeded: u64,
    pub products_scored: u64,
    pub batches: u64,
    pub error: Option<String>,
}

impl ScoringRun {
    pub fn start(as_of: DateTime<Utc>) -> Self {
        Self {
            id: ScoringRunId::generate(),
            status: ScoringRunStatus::Running,
            as_of,
            started_at: Utc::now(),
            finished_at: None,
            products_seeded: 0,
            products_scored: 0,
            batches: 0,
            error: None,
        }
    }

    pub fn succeed(&mut self, products_seeded: u64, products_scored: u64, batches: u64) {
        self.status = ScoringRunStatus::Succeeded;
        self.finished_at = Some(Utc::now());
        self.products_seeded = products_seeded;
        self.products_scored = products_scored;
        self.batches = batches;
        self.error = None;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = ScoringRunStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error.into());
    }
}
