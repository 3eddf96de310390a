//! Job tracking: creation, correlation with active connection state and
//! retention based garbage collection

use super::state::NetworkState;
use crate::error::{NetworkError, NetworkResult};
use crate::model::{
    ActiveConnection, ActiveConnectionStatus, AffectedElement, Job, JobChanges, JobState, JobType,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Error recorded for a port that reported no disconnect reason
const UNKNOWN_ERROR: &str = "Unknown error";

/// Job state an activation reaches when its active connection has `status`
fn activation_state(status: ActiveConnectionStatus) -> JobState {
    match status {
        ActiveConnectionStatus::Activated => JobState::FinishedOk,
        ActiveConnectionStatus::Activating => JobState::Running,
        ActiveConnectionStatus::Deactivating
        | ActiveConnectionStatus::Deactivated
        | ActiveConnectionStatus::Unknown => JobState::Failed,
    }
}

impl NetworkState {
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, id: u64) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Removes expired jobs, then lists the remaining ones
    pub fn enumerate_jobs(&mut self) -> &[Job] {
        self.cleanup_jobs();
        &self.jobs
    }

    /// Changes client-settable job properties
    pub fn modify_job(&mut self, id: u64, changes: JobChanges) -> NetworkResult<()> {
        let index = self.job_index(id)?;
        debug!("Modifying job {}", id);
        self.job_listeners
            .change(&mut self.jobs[index], move |job| job.apply(changes));
        Ok(())
    }

    /// Errors collected by a job
    pub fn job_errors(&self, id: u64) -> NetworkResult<&[String]> {
        self.job(id)
            .map(|job| job.errors.as_slice())
            .ok_or(NetworkError::JobUnknown(id))
    }

    /// Jobs cannot be cancelled
    pub fn kill_job(&self, id: u64) -> NetworkResult<()> {
        self.job_index(id)?;
        Err(NetworkError::NotImplemented("job kill"))
    }

    /// Removes finished jobs whose retention window has passed
    pub fn cleanup_jobs(&mut self) -> usize {
        self.cleanup_jobs_at(Utc::now())
    }

    /// `cleanup_jobs` against an explicit clock
    pub fn cleanup_jobs_at(&mut self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        let mut index = 0;
        while index < self.jobs.len() {
            if !self.jobs[index].is_expired(now) {
                index += 1;
                continue;
            }
            let job = self.jobs.remove(index);
            debug!("Removing job {} ({})", job.id, job.state);
            self.job_listeners.deleted(&job);
            removed += 1;
        }
        removed
    }

    /// Creates a running job and announces it
    pub(crate) fn start_job(
        &mut self,
        kind: JobType,
        name: String,
        affected_elements: Vec<AffectedElement>,
    ) -> u64 {
        let mut job = Job::new(kind, name, &self.job_settings);
        job.affected_elements = affected_elements;
        job.transition(JobState::Running, Utc::now());

        let id = job.id;
        info!("Job {} started: {}", id, job.name);
        let index = self.jobs.len();
        self.jobs.push(job);
        self.job_listeners.added(&self.jobs[index]);
        id
    }

    /// Moves running activation jobs of `active` along with its status
    pub(crate) fn correlate_jobs(&mut self, active: &ActiveConnection) {
        let target = activation_state(active.status);
        let element = AffectedElement::ActiveConnection(active.uuid.clone());
        let now = Utc::now();

        for index in 0..self.jobs.len() {
            let job = &self.jobs[index];
            if job.kind != JobType::ApplySettingData
                || job.state != JobState::Running
                || !job.affects(&element)
                || job.state == target
            {
                continue;
            }

            let errors = match active.status {
                ActiveConnectionStatus::Deactivating | ActiveConnectionStatus::Deactivated => {
                    self.port_errors(active, job)
                }
                _ => Vec::new(),
            };

            let id = job.id;
            self.job_listeners.change(&mut self.jobs[index], move |job| {
                if job.transition(target, now) {
                    job.errors.extend(errors);
                }
            });
            info!("Job {} {} ({})", id, target, active.status);
        }
    }

    /// One error per port involved, from the port's disconnect reason
    fn port_errors(&self, active: &ActiveConnection, job: &Job) -> Vec<String> {
        let ports: Vec<&str> = if active.ports.is_empty() {
            job.ports().collect()
        } else {
            active.ports.iter().map(String::as_str).collect()
        };
        ports
            .into_iter()
            .map(|id| {
                self.port(id)
                    .and_then(|port| port.state_reason.clone())
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
            })
            .collect()
    }

    fn job_index(&self, id: u64) -> NetworkResult<usize> {
        self.jobs
            .iter()
            .position(|j| j.id == id)
            .ok_or(NetworkError::JobUnknown(id))
    }
}
