//! # Reminder Scheduler
//!
//! Turns a task's reminder set into armed timer tasks and tracks them in the
//! [`JobRegistry`]. Arranging and cancelling never wait on the timers.
//!
//! Each job is a spawned tokio task that sleeps until its instant, claims the
//! job with `Pending -> Fired`, and calls the dispatcher. Delivery errors are
//! logged and dropped. Instants already in the past at arrange time are
//! skipped.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Fired jobs prune their task entry once all reminders settle
//! - 1.0.0: Initial release

use super::calculator::ReminderSet;
use super::dispatcher::{NotificationDispatcher, SmsMessage};
use super::registry::{JobRegistry, JobSnapshot, JobStateCell, ScheduledJob, TaskId};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;

const DEADLINE_FORMAT: &str = "%a %b %d %Y %H:%M:%S UTC";

/// What a task's reminders say and who receives them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderPayload {
    pub title: String,
    pub deadline: DateTime<Utc>,
    pub recipient: String,
}

impl ReminderPayload {
    pub fn new(
        title: impl Into<String>,
        deadline: DateTime<Utc>,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            deadline,
            recipient: recipient.into(),
        }
    }

    /// SMS body for the reminder at 1-based position `ordinal`
    pub fn body(&self, ordinal: usize) -> String {
        format!(
            "Reminder {} to finish your task: \"{}\" by {}.",
            ordinal,
            self.title,
            self.deadline.format(DEADLINE_FORMAT)
        )
    }

    fn message(&self, ordinal: usize) -> SmsMessage {
        SmsMessage {
            body: self.body(ordinal),
            to: self.recipient.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ReminderScheduler {
    registry: Arc<JobRegistry>,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl ReminderScheduler {
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
            dispatcher,
        }
    }

    /// Track jobs in an existing registry so several schedulers share one view
    pub fn with_registry(mut self, registry: Arc<JobRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn dispatcher_name(&self) -> &'static str {
        self.dispatcher.name()
    }

    /// Arm one job per future instant and make them the task's only jobs.
    ///
    /// Must be called from within a tokio runtime. Returns the number of jobs
    /// armed; elapsed instants are skipped rather than fired late.
    pub fn arrange(
        &self,
        task_id: &TaskId,
        reminders: &ReminderSet,
        payload: &ReminderPayload,
    ) -> usize {
        let now = Utc::now();
        let mut jobs = Vec::with_capacity(reminders.len());

        for (index, fire_at) in reminders.iter().enumerate() {
            let ordinal = index + 1;

            let delay = match (*fire_at - now).to_std() {
                Ok(delay) if !delay.is_zero() => delay,
                _ => {
                    warn!(
                        "Skipping reminder {ordinal} for task {task_id}: {fire_at} has already passed"
                    );
                    continue;
                }
            };

            let message = payload.message(ordinal);
            let state = JobStateCell::pending();
            let handle = tokio::spawn(run_job(
                task_id.clone(),
                ordinal,
                delay,
                message.clone(),
                state.clone(),
                self.dispatcher.clone(),
                self.registry.clone(),
            ));

            jobs.push(ScheduledJob::new(ordinal, *fire_at, message, state, handle));
        }

        let armed = jobs.len();
        if armed == 0 {
            let dropped = self.registry.take_and_cancel(task_id);
            warn!("No future reminders for task {task_id}, {dropped} pending dropped");
            return 0;
        }

        let replaced = self.registry.put(task_id.clone(), jobs);

        info!(
            "⏰ Scheduled {armed} reminder(s) for task {task_id} via {}{}",
            self.dispatcher.name(),
            if replaced > 0 {
                format!(" (replaced {replaced} pending)")
            } else {
                String::new()
            }
        );

        armed
    }

    /// Cancel every pending reminder for the task. Unknown tasks are a no-op.
    pub fn cancel(&self, task_id: &TaskId) -> usize {
        let cancelled = self.registry.take_and_cancel(task_id);
        if cancelled > 0 {
            info!("Cancelled {cancelled} pending reminder(s) for task {task_id}");
        } else {
            debug!("No pending reminders to cancel for task {task_id}");
        }
        cancelled
    }

    pub fn pending_count(&self, task_id: &TaskId) -> usize {
        self.registry.pending_count(task_id)
    }

    pub fn jobs(&self, task_id: &TaskId) -> Vec<JobSnapshot> {
        self.registry.snapshot(task_id)
    }

    /// Cancel everything, e.g. on process shutdown
    pub fn shutdown(&self) -> usize {
        let cancelled = self.registry.cancel_all();
        info!("Reminder scheduler stopped, {cancelled} pending reminder(s) dropped");
        cancelled
    }
}

async fn run_job(
    task_id: TaskId,
    ordinal: usize,
    delay: std::time::Duration,
    message: SmsMessage,
    state: Arc<JobStateCell>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    registry: Arc<JobRegistry>,
) {
    tokio::time::sleep(delay).await;

    if !state.try_fire() {
        debug!("Reminder {ordinal} for task {task_id} was cancelled before firing");
        return;
    }

    match dispatcher.dispatch(&message).await {
        Ok(id) => info!("📨 Sent reminder {ordinal} for task {task_id} ({id})"),
        Err(e) => error!("Failed to send reminder {ordinal} for task {task_id}: {e}"),
    }

    registry.prune(&task_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reminders::calculator::{compute_reminders, ReminderPolicy};
    use crate::features::reminders::registry::JobState;
    use crate::features::reminders::test_support::RecordingDispatcher;
    use chrono::{TimeDelta, TimeZone};
    use std::collections::HashSet;
    use std::time::Duration;

    const PHONE: &str = "+919876543210";

    fn scheduler_with(dispatcher: &RecordingDispatcher) -> ReminderScheduler {
        ReminderScheduler::new(Arc::new(dispatcher.clone()))
    }

    fn plan(deadline_in: TimeDelta) -> (ReminderSet, ReminderPayload) {
        let now = Utc::now();
        let deadline = now + deadline_in;
        let reminders = ReminderPolicy::default().reminders(deadline, now).unwrap();
        (reminders, ReminderPayload::new("Finish the report", deadline, PHONE))
    }

    /// Sleep on the paused clock well past every reminder in `deadline_in`
    async fn let_time_pass(deadline_in: TimeDelta) {
        tokio::time::sleep(deadline_in.to_std().unwrap() + Duration::from_secs(60)).await;
    }

    #[test]
    fn test_body_format() {
        let deadline = Utc.with_ymd_and_hms(2025, 3, 10, 18, 30, 0).unwrap();
        let payload = ReminderPayload::new("Submit taxes", deadline, PHONE);

        assert_eq!(
            payload.body(2),
            "Reminder 2 to finish your task: \"Submit taxes\" by Mon Mar 10 2025 18:30:00 UTC."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_three_fire_in_order() {
        let recorder = RecordingDispatcher::new();
        let scheduler = scheduler_with(&recorder);
        let task = TaskId::from("task-1");
        let (reminders, payload) = plan(TimeDelta::days(10));

        assert_eq!(scheduler.arrange(&task, &reminders, &payload), 3);
        assert_eq!(scheduler.pending_count(&task), 3);

        let sent = recorder.wait_for(3).await;
        assert_eq!(sent.len(), 3);
        for (i, msg) in sent.iter().enumerate() {
            assert!(msg.body.starts_with(&format!("Reminder {} ", i + 1)));
            assert_eq!(msg.to, PHONE);
        }

        // Last job prunes the entry once everything has fired
        tokio::task::yield_now().await;
        assert_eq!(scheduler.registry().task_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_right_after_arrange_sends_nothing() {
        let recorder = RecordingDispatcher::new();
        let scheduler = scheduler_with(&recorder);
        let task = TaskId::from("task-2");
        let (reminders, payload) = plan(TimeDelta::hours(6));

        scheduler.arrange(&task, &reminders, &payload);
        assert_eq!(scheduler.cancel(&task), 3);

        let_time_pass(TimeDelta::hours(6)).await;
        assert!(recorder.sent().is_empty());
        assert_eq!(scheduler.pending_count(&task), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearrange_keeps_only_latest_set() {
        let recorder = RecordingDispatcher::new();
        let scheduler = scheduler_with(&recorder);
        let task = TaskId::from("task-3");

        let (first, first_payload) = plan(TimeDelta::hours(4));
        scheduler.arrange(&task, &first, &first_payload);
        let first_jobs = scheduler.jobs(&task);

        let (second, mut second_payload) = plan(TimeDelta::hours(8));
        second_payload.title = "Renamed task".to_string();
        scheduler.arrange(&task, &second, &second_payload);
        let second_jobs = scheduler.jobs(&task);

        assert_eq!(second_jobs.len(), 3);
        assert!(second_jobs
            .iter()
            .all(|job| first_jobs.iter().all(|old| old.job_id != job.job_id)));
        assert_eq!(scheduler.pending_count(&task), 3);

        let_time_pass(TimeDelta::hours(8)).await;
        let sent = recorder.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|m| m.body.contains("Renamed task")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_unknown_or_finished_task_is_noop() {
        let recorder = RecordingDispatcher::new();
        let scheduler = scheduler_with(&recorder);

        assert_eq!(scheduler.cancel(&TaskId::from("missing")), 0);

        let task = TaskId::from("task-4");
        let (reminders, payload) = plan(TimeDelta::minutes(10));
        scheduler.arrange(&task, &reminders, &payload);
        recorder.wait_for(3).await;

        assert_eq!(scheduler.cancel(&task), 0);
        assert_eq!(scheduler.cancel(&task), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_between_reminders_stops_the_rest() {
        let recorder = RecordingDispatcher::new();
        let scheduler = scheduler_with(&recorder);
        let task = TaskId::from("task-5");
        let (reminders, payload) = plan(TimeDelta::hours(4));

        scheduler.arrange(&task, &reminders, &payload);
        recorder.wait_for(1).await;

        let states: Vec<JobState> = scheduler.jobs(&task).iter().map(|j| j.state).collect();
        assert_eq!(states, vec![JobState::Fired, JobState::Pending, JobState::Pending]);

        assert_eq!(scheduler.cancel(&task), 2);
        let_time_pass(TimeDelta::hours(4)).await;
        assert_eq!(recorder.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_failure_does_not_stop_other_jobs() {
        let recorder = RecordingDispatcher::failing();
        let scheduler = scheduler_with(&recorder);
        let (reminders, payload) = plan(TimeDelta::hours(1));

        scheduler.arrange(&TaskId::from("a"), &reminders, &payload);
        scheduler.arrange(&TaskId::from("b"), &reminders, &payload);

        let sent = recorder.wait_for(6).await;
        assert_eq!(sent.len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_instants_are_skipped() {
        let recorder = RecordingDispatcher::new();
        let scheduler = scheduler_with(&recorder);
        let task = TaskId::from("task-6");

        let now = Utc::now();
        let stale = compute_reminders(now + TimeDelta::minutes(8), now - TimeDelta::minutes(4));
        let payload = ReminderPayload::new("Stale", now + TimeDelta::minutes(8), PHONE);

        // Instants at now-1m, now+2m, now+5m
        assert_eq!(scheduler.arrange(&task, &stale, &payload), 2);

        let sent = recorder.wait_for(2).await;
        assert!(sent[0].body.starts_with("Reminder 2 "));
        assert!(sent[1].body.starts_with("Reminder 3 "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_everything() {
        let recorder = RecordingDispatcher::new();
        let scheduler = scheduler_with(&recorder);
        let (reminders, payload) = plan(TimeDelta::days(1));

        scheduler.arrange(&TaskId::from("a"), &reminders, &payload);
        scheduler.arrange(&TaskId::from("b"), &reminders, &payload);

        assert_eq!(scheduler.shutdown(), 6);
        let_time_pass(TimeDelta::days(1)).await;
        assert!(recorder.sent().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_arrange_and_cancel_leave_one_consistent_set() {
        let recorder = RecordingDispatcher::new();
        let registry = Arc::new(JobRegistry::new());
        let schedulers = [
            scheduler_with(&recorder).with_registry(registry.clone()),
            scheduler_with(&recorder).with_registry(registry.clone()),
        ];
        let task = TaskId::from("contended");

        // Real clock: reminders at +500ms, +1s, +1.5s
        let now = Utc::now();
        let deadline = now + TimeDelta::seconds(2);
        let reminders = compute_reminders(deadline, now);

        let mut handles = Vec::new();
        for i in 0..64 {
            let scheduler = schedulers[i % 2].clone();
            let task = task.clone();
            let reminders = reminders.clone();
            handles.push(tokio::spawn(async move {
                if i % 3 == 0 {
                    scheduler.cancel(&task);
                } else {
                    let payload = ReminderPayload::new(format!("Set {i}"), deadline, PHONE);
                    scheduler.arrange(&task, &reminders, &payload);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let pending = registry.pending_count(&task);
        assert!(pending == 0 || pending == 3, "pending = {pending}");
        let jobs = schedulers[0].jobs(&task);
        assert_eq!(jobs.len(), pending);
        assert!(jobs.iter().all(|job| job.state == JobState::Pending));

        tokio::time::sleep(Duration::from_millis(2500)).await;

        let sent = recorder.sent();
        assert_eq!(sent.len(), pending);
        let titles: HashSet<&str> = sent
            .iter()
            .filter_map(|m| m.body.split('"').nth(1))
            .collect();
        assert!(titles.len() <= 1, "messages from several sets: {titles:?}");
        for (i, msg) in sent.iter().enumerate() {
            assert!(msg.body.starts_with(&format!("Reminder {} ", i + 1)));
        }
        assert_eq!(registry.task_count(), 0);
    }
}
