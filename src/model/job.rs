//! Jobs - tracked asynchronous operations

use crate::config::JobSettings;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-wide unique job id
pub(crate) fn next_job_id() -> u64 {
    NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed)
}

/// Job type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    /// Applying a connection to a port
    ApplySettingData,
}

/// Job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Running,
    FinishedOk,
    Suspended,
    Failed,
    Terminated,
}

impl JobState {
    /// Whether the job can no longer change state
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::FinishedOk | JobState::Failed | JobState::Terminated
        )
    }

    /// Whether moving from `self` to `to` is allowed
    pub fn can_transition(self, to: JobState) -> bool {
        match self {
            JobState::Queued => to != JobState::Queued,
            JobState::Running => to != JobState::Queued,
            JobState::Suspended => !matches!(to, JobState::Queued | JobState::Suspended),
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::FinishedOk => "finished",
            JobState::Suspended => "suspended",
            JobState::Failed => "failed",
            JobState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Entity touched by a job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AffectedElement {
    ActiveConnection(String),
    Port(String),
    Connection(String),
}

/// Client-modifiable job properties
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobChanges {
    pub caption: Option<String>,
    pub delete_on_completion: Option<bool>,
    pub time_before_removal: Option<Duration>,
}

/// Tracked asynchronous operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    pub kind: JobType,
    pub name: String,
    pub caption: Option<String>,
    pub state: JobState,
    pub affected_elements: Vec<AffectedElement>,
    /// Error messages collected while the job ran
    pub errors: Vec<String>,
    /// Whether the job is garbage collected once finished
    pub delete_on_completion: bool,
    /// Retention after the last state change
    pub time_before_removal: Duration,
    pub start_time: DateTime<Utc>,
    pub last_change_time: DateTime<Utc>,
}

impl Job {
    /// Creates a queued job with defaults from `settings`
    pub fn new(kind: JobType, name: impl Into<String>, settings: &JobSettings) -> Self {
        let now = Utc::now();
        Self {
            id: next_job_id(),
            kind,
            name: name.into(),
            caption: None,
            state: JobState::Queued,
            affected_elements: Vec::new(),
            errors: Vec::new(),
            delete_on_completion: settings.delete_on_completion,
            time_before_removal: settings.time_before_removal(),
            start_time: now,
            last_change_time: now,
        }
    }

    /// Moves the job to `state`, returning whether it changed
    pub fn transition(&mut self, state: JobState, now: DateTime<Utc>) -> bool {
        if self.state == state || !self.state.can_transition(state) {
            return false;
        }
        self.state = state;
        self.last_change_time = now;
        true
    }

    /// Id of the first affected active connection
    pub fn active_connection(&self) -> Option<&str> {
        self.affected_elements.iter().find_map(|e| match e {
            AffectedElement::ActiveConnection(id) => Some(id.as_str()),
            _ => None,
        })
    }

    /// Ids of the affected ports
    pub fn ports(&self) -> impl Iterator<Item = &str> {
        self.affected_elements.iter().filter_map(|e| match e {
            AffectedElement::Port(id) => Some(id.as_str()),
            _ => None,
        })
    }

    /// Id of the affected connection
    pub fn connection(&self) -> Option<&str> {
        self.affected_elements.iter().find_map(|e| match e {
            AffectedElement::Connection(id) => Some(id.as_str()),
            _ => None,
        })
    }

    pub fn affects(&self, element: &AffectedElement) -> bool {
        self.affected_elements.contains(element)
    }

    /// Whether garbage collection may remove the job at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if !self.delete_on_completion || !self.state.is_terminal() {
            return false;
        }
        let retention = TimeDelta::from_std(self.time_before_removal).unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(self.last_change_time) > retention
    }

    /// Time spent since the job started
    pub fn elapsed(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.start_time)
    }

    /// Percentage shown to pollers
    pub fn percent_complete(&self) -> u8 {
        if self.state.is_terminal() {
            100
        } else {
            0
        }
    }

    pub(crate) fn apply(&mut self, changes: JobChanges) {
        if let Some(caption) = changes.caption {
            self.caption = Some(caption);
        }
        if let Some(delete) = changes.delete_on_completion {
            self.delete_on_completion = delete;
        }
        if let Some(retention) = changes.time_before_removal {
            self.time_before_removal = retention;
        }
    }
}
