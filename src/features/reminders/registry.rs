//! # Job Registry
//!
//! Maps each task to the reminder jobs currently armed for it. The DashMap shard
//! lock serializes mutation per task key; different tasks never contend beyond
//! sharing a shard.
//!
//! Every job carries an atomic state cell. Both the timer (firing) and the
//! registry (cancelling) move it out of `Pending` with a compare-and-swap, so a
//! job ends up either `Fired` or `Cancelled`, never both. A cancel that lands
//! before the timer's swap wins.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Added snapshots and pruning of settled entries
//! - 1.0.0: Initial release

use super::dispatcher::SmsMessage;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Opaque task key owned by the task store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        TaskId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        TaskId(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        TaskId(id)
    }
}

/// Lifecycle of one scheduled reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Fired,
    Cancelled,
}

impl JobState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            STATE_FIRED => JobState::Fired,
            STATE_CANCELLED => JobState::Cancelled,
            _ => JobState::Pending,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Fired => write!(f, "fired"),
            JobState::Cancelled => write!(f, "cancelled"),
        }
    }
}

const STATE_PENDING: u8 = 0;
const STATE_FIRED: u8 = 1;
const STATE_CANCELLED: u8 = 2;

/// Shared between a job's timer task and its registry entry
#[derive(Debug, Default)]
pub struct JobStateCell(AtomicU8);

impl JobStateCell {
    pub fn pending() -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(STATE_PENDING)))
    }

    pub fn get(&self) -> JobState {
        JobState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Pending -> Fired. False if the job was already settled.
    pub fn try_fire(&self) -> bool {
        self.transition(STATE_FIRED)
    }

    /// Pending -> Cancelled. False if the job was already settled.
    pub fn try_cancel(&self) -> bool {
        self.transition(STATE_CANCELLED)
    }

    fn transition(&self, to: u8) -> bool {
        self.0
            .compare_exchange(STATE_PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// One armed reminder: the timer handle plus what it will send
#[derive(Debug)]
pub struct ScheduledJob {
    pub id: Uuid,

    /// 1-based position in the task's reminder set
    pub ordinal: usize,

    pub fire_at: DateTime<Utc>,

    pub message: SmsMessage,

    state: Arc<JobStateCell>,
    handle: JoinHandle<()>,
}

impl ScheduledJob {
    pub fn new(
        ordinal: usize,
        fire_at: DateTime<Utc>,
        message: SmsMessage,
        state: Arc<JobStateCell>,
        handle: JoinHandle<()>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ordinal,
            fire_at,
            message,
            state,
            handle,
        }
    }

    pub fn state(&self) -> JobState {
        self.state.get()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == JobState::Pending
    }

    /// Cancel if still pending. Settled jobs are left alone.
    pub fn cancel(&self) -> bool {
        if self.state.try_cancel() {
            self.handle.abort();
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self, task_id: &TaskId) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id,
            task_id: task_id.clone(),
            ordinal: self.ordinal,
            fire_at: self.fire_at,
            state: self.state(),
        }
    }
}

/// Serializable view of a job for inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub task_id: TaskId,
    pub ordinal: usize,
    pub fire_at: DateTime<Utc>,
    pub state: JobState,
}

fn cancel_jobs(jobs: &[ScheduledJob]) -> usize {
    jobs.iter().filter(|job| job.cancel()).count()
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<TaskId, Vec<ScheduledJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `jobs` for `task_id`, cancelling whatever was there before.
    ///
    /// Returns how many previously pending jobs were cancelled.
    pub fn put(&self, task_id: TaskId, jobs: Vec<ScheduledJob>) -> usize {
        match self.jobs.entry(task_id) {
            Entry::Occupied(mut entry) => {
                let cancelled = cancel_jobs(entry.get());
                if cancelled > 0 {
                    debug!(
                        "Replaced {cancelled} pending reminder(s) for task {}",
                        entry.key()
                    );
                }
                entry.insert(jobs);
                cancelled
            }
            Entry::Vacant(entry) => {
                entry.insert(jobs);
                0
            }
        }
    }

    /// Remove the entry for `task_id` and cancel its pending jobs.
    ///
    /// Unknown tasks are a no-op returning 0.
    pub fn take_and_cancel(&self, task_id: &TaskId) -> usize {
        match self.jobs.remove(task_id) {
            Some((_, jobs)) => cancel_jobs(&jobs),
            None => 0,
        }
    }

    /// Drop the entry for `task_id` once none of its jobs is pending
    pub fn prune(&self, task_id: &TaskId) -> bool {
        self.jobs
            .remove_if(task_id, |_, jobs| !jobs.iter().any(ScheduledJob::is_pending))
            .is_some()
    }

    pub fn pending_count(&self, task_id: &TaskId) -> usize {
        self.jobs
            .get(task_id)
            .map(|jobs| jobs.iter().filter(|job| job.is_pending()).count())
            .unwrap_or(0)
    }

    pub fn snapshot(&self, task_id: &TaskId) -> Vec<JobSnapshot> {
        self.jobs
            .get(task_id)
            .map(|jobs| jobs.iter().map(|job| job.snapshot(task_id)).collect())
            .unwrap_or_default()
    }

    /// Number of tasks with a registry entry
    pub fn task_count(&self) -> usize {
        self.jobs.len()
    }

    /// Cancel every pending job and clear the registry
    pub fn cancel_all(&self) -> usize {
        let keys: Vec<TaskId> = self.jobs.iter().map(|entry| entry.key().clone()).collect();
        keys.iter().map(|task_id| self.take_and_cancel(task_id)).sum()
    }
}
