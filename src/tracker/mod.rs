use std::{future::Future, sync::Arc};

use async_broadcast::{broadcast, InactiveReceiver, Receiver, RecvError, Sender};
use async_std::{
    sync::Mutex,
    task::{self, JoinHandle},
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::{
    api::{
        response::GENERIC_FAILURE,
        tasks::{EventStream, ProgressEvent, TaskEventStatus},
        ApiError, ApiResponse,
    },
    cancel::{CancelHandle, CancelSignal},
};


const NOTIFIER_CAPACITY: usize = 64;

pub const CONNECTION_LOST: &str = "Connection to the server was lost. Please try again.";

/// Next update for a subscriber, skipping over whatever it missed by falling
/// behind. `None` once the tracker is gone.
pub async fn next_update(updates: &mut Receiver<TaskUpdate>) -> Option<TaskUpdate> {
    loop {
        match updates.recv().await {
            Ok(update) => return Some(update),
            Err(RecvError::Overflowed(skipped)) => {
                debug!(skipped, "Subscriber fell behind");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[derive(TS)]
#[ts(export)]
pub enum TaskStatus {
    Idle,
    Loading,
    Processing,
    Completed,
    Error,
    Cancelled,
}

impl TaskStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Loading | TaskStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Error | TaskStatus::Cancelled
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "type", content = "details")]
#[derive(TS)]
#[ts(export)]
pub enum TaskProgress {
    Determinable { percent: f64 },
    Indeterminable,
}

impl TaskProgress {
    pub fn percent(&self) -> Option<f64> {
        match self {
            TaskProgress::Determinable { percent } => Some(*percent),
            TaskProgress::Indeterminable => None,
        }
    }

    /// Never moves backwards; out of range or non-finite reports are clamped or ignored.
    fn advance(self, reported: Option<f64>) -> Self {
        let Some(reported) = reported.filter(|p| p.is_finite()) else {
            return self;
        };

        let current = self.percent().unwrap_or(0.0);
        TaskProgress::Determinable {
            percent: reported.clamp(0.0, 100.0).max(current),
        }
    }
}

#[derive(Error, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[derive(TS)]
#[ts(export)]
pub enum TaskError {
    /// The server reported the task as failed.
    #[error("{message}")]
    Failed { message: String },

    /// Start request, stream or connection failure; `detail` is for logs.
    #[error("{message}")]
    Transport { message: String, detail: String },
}

impl TaskError {
    pub fn message(&self) -> &str {
        match self {
            TaskError::Failed { message } => message,
            TaskError::Transport { message, .. } => message,
        }
    }

    fn disconnected(detail: impl Into<String>) -> Self {
        TaskError::Transport {
            message: CONNECTION_LOST.to_string(),
            detail: detail.into(),
        }
    }
}

impl From<ApiError> for TaskError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Rejected { message, .. } => TaskError::Failed { message },
            other => TaskError::Transport {
                message: GENERIC_FAILURE.to_string(),
                detail: other.to_string(),
            },
        }
    }
}

/// Lightweight change notification sent to subscribers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[derive(TS)]
#[ts(export)]
pub struct TaskUpdate {
    pub status: TaskStatus,
    pub progress: TaskProgress,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TaskState<R> {
    pub status: TaskStatus,
    pub progress: TaskProgress,
    pub message: Option<String>,
    pub stage: Option<String>,
    pub result: Option<R>,
    pub error: Option<TaskError>,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl<R> Default for TaskState<R> {
    fn default() -> Self {
        TaskState {
            status: TaskStatus::Idle,
            progress: TaskProgress::Indeterminable,
            message: None,
            stage: None,
            result: None,
            error: None,
            started_at: None,
            updated_at: Utc::now(),
        }
    }
}

impl<R: ApiResponse> TaskState<R> {
    pub fn loading() -> Self {
        let now = Utc::now();
        TaskState {
            status: TaskStatus::Loading,
            started_at: Some(now),
            updated_at: now,
            ..Self::default()
        }
    }

    pub fn update(&self) -> TaskUpdate {
        TaskUpdate {
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
        }
    }

    /// Applies one stream event. Returns `false` when the event was ignored.
    pub fn apply(&mut self, event: ProgressEvent<R>) -> bool {
        if !self.status.is_active() {
            return false;
        }

        match event.status {
            TaskEventStatus::Queued => {}
            TaskEventStatus::Processing => self.status = TaskStatus::Processing,
            TaskEventStatus::Completed => match event.result {
                Some(result) if !result.is_success() => {
                    self.fail(TaskError::Failed {
                        message: result.failure_message(),
                    });
                }
                result => {
                    self.status = TaskStatus::Completed;
                    self.progress = TaskProgress::Determinable { percent: 100.0 };
                    self.result = result;
                }
            },
            TaskEventStatus::Error => {
                let message = event
                    .error
                    .or(event.message)
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string());
                self.fail(TaskError::Failed { message });
                return true;
            }
            TaskEventStatus::Cancelled => self.status = TaskStatus::Cancelled,
            TaskEventStatus::Unknown => return false,
        }

        if self.status.is_active() {
            self.progress = self.progress.advance(event.progress);
        }
        if event.message.is_some() {
            self.message = event.message;
        }
        if event.stage.is_some() {
            self.stage = event.stage;
        }

        self.updated_at = Utc::now();
        true
    }

    fn fail(&mut self, error: TaskError) {
        self.status = TaskStatus::Error;
        self.result = None;
        self.error = Some(error);
        self.updated_at = Utc::now();
    }
}

struct Slot<R> {
    state: TaskState<R>,
    // Identifies the current run; events and outcomes of older runs are dropped.
    epoch: u64,
    cancel: Option<CancelHandle>,
}

struct Inner<R> {
    slot: Mutex<Slot<R>>,
    notifier: Sender<TaskUpdate>,
    _receiver: InactiveReceiver<TaskUpdate>,
}

/// Drives a long-running server task from its progress stream.
pub struct Tracker<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for Tracker<R> {
    fn clone(&self) -> Self {
        Tracker {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> Default for Tracker<R>
where
    R: ApiResponse + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Tracker<R>
where
    R: ApiResponse + Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (mut tx, rx) = broadcast(NOTIFIER_CAPACITY);
        tx.set_overflow(true);

        Tracker {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot {
                    state: TaskState::default(),
                    epoch: 0,
                    cancel: None,
                }),
                notifier: tx,
                _receiver: rx.deactivate(),
            }),
        }
    }

    /// Starts a task, cancelling the one in flight first.
    ///
    /// The state is `loading` when this returns; the returned handle resolves
    /// once the task reached a terminal state or was cancelled.
    pub async fn start_task<F, Fut>(&self, operation: F) -> JoinHandle<()>
    where
        F: FnOnce(CancelSignal) -> Fut,
        Fut: Future<Output = crate::api::Result<EventStream<R>>> + Send + 'static,
    {
        let (handle, registration) = CancelHandle::new();
        let signal = handle.signal();

        let (epoch, previous, update) = {
            let mut slot = self.inner.slot.lock().await;
            let previous = slot.cancel.replace(handle);
            slot.epoch += 1;
            slot.state = TaskState::loading();
            (slot.epoch, previous, slot.state.update())
        };

        if let Some(previous) = previous {
            info!("Cancelling previous task");
            previous.cancel();
        }

        info!(epoch, "Task started");
        self.notify(update);

        let stream = operation(signal);
        let this = self.clone();
        let driver = CancelHandle::wrap(registration, async move {
            this.drive(epoch, stream).await;
        });

        task::spawn(async move {
            if driver.await.is_err() {
                debug!(epoch, "Task driver aborted");
            }
        })
    }

    async fn drive<Fut>(&self, epoch: u64, stream: Fut)
    where
        Fut: Future<Output = crate::api::Result<EventStream<R>>>,
    {
        let mut events = match stream.await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Task failed to start");
                self.finish(epoch, TaskError::from(e)).await;
                return;
            }
        };

        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    if !self.apply(epoch, event).await {
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Task stream failed");
                    self.finish(epoch, TaskError::disconnected(e.to_string())).await;
                    return;
                }
            }
        }

        warn!(epoch, "Task stream ended without a terminal event");
        self.finish(epoch, TaskError::disconnected("stream closed"))
            .await;
    }

    /// Returns whether the driver should keep reading.
    async fn apply(&self, epoch: u64, event: ProgressEvent<R>) -> bool {
        let update = {
            let mut slot = self.inner.slot.lock().await;
            if slot.epoch != epoch {
                return false;
            }

            if !slot.state.apply(event) {
                return slot.state.status.is_active();
            }

            if slot.state.status.is_terminal() {
                // Finished on its own: nothing left to abort.
                slot.cancel = None;
                info!(status = %slot.state.status, "Task finished");
            }
            slot.state.update()
        };

        let keep_reading = update.status.is_active();
        self.notify(update);
        keep_reading
    }

    async fn finish(&self, epoch: u64, error: TaskError) {
        let update = {
            let mut slot = self.inner.slot.lock().await;
            if slot.epoch != epoch || !slot.state.status.is_active() {
                return;
            }

            slot.state.fail(error);
            slot.cancel = None;
            slot.state.update()
        };

        self.notify(update);
    }

    /// Cancels the task in flight. Returns `false` when there was nothing to cancel.
    pub async fn cancel(&self) -> bool {
        let (handle, update) = {
            let mut slot = self.inner.slot.lock().await;
            if !slot.state.status.is_active() {
                return false;
            }

            slot.epoch += 1;
            slot.state.status = TaskStatus::Cancelled;
            slot.state.updated_at = Utc::now();
            (slot.cancel.take(), slot.state.update())
        };

        if let Some(handle) = handle {
            handle.cancel();
        }

        info!("Task cancelled");
        self.notify(update);
        true
    }

    /// Back to idle, aborting anything still running.
    pub async fn reset(&self) {
        let (handle, update) = {
            let mut slot = self.inner.slot.lock().await;
            slot.epoch += 1;
            slot.state = TaskState::default();
            (slot.cancel.take(), slot.state.update())
        };

        if let Some(handle) = handle {
            handle.cancel();
        }

        debug!("Tracker reset");
        self.notify(update);
    }

    fn notify(&self, update: TaskUpdate) {
        let _ = self.inner.notifier.try_broadcast(update);
    }

    pub fn subscribe(&self) -> Receiver<TaskUpdate> {
        self.inner.notifier.new_receiver()
    }

    pub async fn snapshot(&self) -> TaskState<R> {
        self.inner.slot.lock().await.state.clone()
    }

    pub async fn status(&self) -> TaskStatus {
        self.inner.slot.lock().await.state.status
    }

    pub async fn progress(&self) -> TaskProgress {
        self.inner.slot.lock().await.state.progress
    }

    pub async fn message(&self) -> Option<String> {
        self.inner.slot.lock().await.state.message.clone()
    }

    pub async fn result(&self) -> Option<R> {
        self.inner.slot.lock().await.state.result.clone()
    }

    pub async fn error(&self) -> Option<TaskError> {
        self.inner.slot.lock().await.state.error.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.status().await == TaskStatus::Loading
    }

    pub async fn is_processing(&self) -> bool {
        self.status().await == TaskStatus::Processing
    }

    pub async fn is_completed(&self) -> bool {
        self.status().await == TaskStatus::Completed
    }

    pub async fn is_error(&self) -> bool {
        self.status().await == TaskStatus::Error
    }

    pub async fn is_cancelled(&self) -> bool {
        self.status().await == TaskStatus::Cancelled
    }
}
