use crate::error::{IndexerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque rebuild identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = IndexerError;

    fn from_str(value: &str) -> Result<Self> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|_| IndexerError::JobNotFound(value.to_string()))
    }
}

/// Outcome of a rebuild. `Cleared` covers both abandoned and failed jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    Pending,
    Succeeded,
    Cleared,
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Cleared => "cleared",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// One rebuild attempt and its append-only status log.
///
/// `Pending` moves to `Succeeded` or `Cleared` exactly once; every mutation
/// after that is refused with [`IndexerError::JobFinalized`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebuildJob {
    id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    initiated_by: Option<String>,
    started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    statuses: Vec<StatusEntry>,
    completion: Completion,
}

impl RebuildJob {
    pub fn create(initiated_by: Option<String>) -> Self {
        Self::create_at(initiated_by, Utc::now())
    }

    pub(crate) fn create_at(initiated_by: Option<String>, started_at: DateTime<Utc>) -> Self {
        let message = format!("Rebuild started at {}.", started_at.format("%Y-%m-%d %H:%M"));
        Self {
            id: JobId::new(),
            initiated_by,
            started_at,
            ended_at: None,
            statuses: vec![StatusEntry {
                at: started_at,
                message,
            }],
            completion: Completion::Pending,
        }
    }

    pub fn append_status(&mut self, message: impl Into<String>) -> Result<()> {
        self.ensure_pending()?;
        self.statuses.push(StatusEntry {
            at: Utc::now(),
            message: message.into(),
        });
        Ok(())
    }

    pub fn mark_succeeded(&mut self) -> Result<()> {
        self.ensure_pending()?;
        self.ended_at = Some(Utc::now());
        self.completion = Completion::Succeeded;
        Ok(())
    }

    /// Abandon the job. The end timestamp stays as recorded.
    pub fn mark_cleared(&mut self) -> Result<()> {
        self.ensure_pending()?;
        self.completion = Completion::Cleared;
        Ok(())
    }

    pub fn mark_failed(&mut self) -> Result<()> {
        self.mark_cleared()
    }

    /// Latest status message, or empty.
    pub fn progress_message(&self) -> &str {
        self.statuses
            .last()
            .map(|entry| entry.message.as_str())
            .unwrap_or_default()
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn initiated_by(&self) -> Option<&str> {
        self.initiated_by.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn statuses(&self) -> &[StatusEntry] {
        &self.statuses
    }

    pub fn completion(&self) -> Completion {
        self.completion
    }

    pub fn is_pending(&self) -> bool {
        self.completion == Completion::Pending
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(IndexerError::JobFinalized {
                id: self.id,
                completion: self.completion,
            })
        }
    }
}
