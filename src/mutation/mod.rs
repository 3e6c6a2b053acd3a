use std::{future::Future, sync::Arc};

use async_broadcast::{broadcast, InactiveReceiver, Receiver, Sender};
use async_std::{
    sync::Mutex,
    task::{self, JoinHandle},
};
use chrono::{DateTime, Utc};
use futures::{future::BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::api::{response::GENERIC_FAILURE, ApiClient, ApiError, ApiResponse, Endpoint};


const NOTIFIER_CAPACITY: usize = 16;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[derive(TS)]
#[ts(export)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

/// Why an invocation ended in the error state.
#[derive(Error, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[derive(TS)]
#[ts(export)]
pub enum MutationError {
    /// The request never produced a usable answer; `detail` is for logs only.
    #[error("{message}")]
    Transport { message: String, detail: String },

    /// The server answered and refused the operation.
    #[error("{message}")]
    Application { message: String, status: Option<u16> },
}

impl MutationError {
    /// Text meant for the user.
    pub fn message(&self) -> &str {
        match self {
            MutationError::Transport { message, .. } => message,
            MutationError::Application { message, .. } => message,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, MutationError::Transport { .. })
    }
}

impl From<ApiError> for MutationError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Rejected { status, message } => MutationError::Application {
                message,
                status: Some(status),
            },
            other => MutationError::Transport {
                message: GENERIC_FAILURE.to_string(),
                detail: other.to_string(),
            },
        }
    }
}

/// Observable lifecycle of the last invocation.
#[derive(Debug, Clone)]
pub struct MutationState<I, O> {
    pub status: MutationStatus,
    pub input: Option<I>,
    pub data: Option<O>,
    pub error: Option<MutationError>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl<I, O> MutationState<I, O> {
    fn idle() -> Self {
        MutationState {
            status: MutationStatus::Idle,
            input: None,
            data: None,
            error: None,
            submitted_at: None,
            updated_at: Utc::now(),
        }
    }

    fn begin(&mut self, input: I) {
        let now = Utc::now();

        self.status = MutationStatus::Pending;
        self.input = Some(input);
        self.data = None;
        self.error = None;
        self.submitted_at = Some(now);
        self.updated_at = now;
    }

    fn settle(&mut self, outcome: &Result<O, MutationError>)
    where
        O: Clone,
    {
        match outcome {
            Ok(output) => {
                self.status = MutationStatus::Success;
                self.data = Some(output.clone());
                self.error = None;
            }
            Err(e) => {
                self.status = MutationStatus::Error;
                self.data = None;
                self.error = Some(e.clone());
            }
        }
        self.updated_at = Utc::now();
    }
}

pub type Operation<I, O> =
    Arc<dyn Fn(I) -> BoxFuture<'static, crate::api::Result<O>> + Send + Sync>;

struct Slot<I, O> {
    state: MutationState<I, O>,
    // Bumped by every invocation and reset; a settling call only applies
    // its outcome while its generation is still current.
    generation: u64,
}

struct Inner<I, O> {
    operation: Operation<I, O>,
    slot: Mutex<Slot<I, O>>,
    notifier: Sender<MutationStatus>,
    _receiver: InactiveReceiver<MutationStatus>,
}

/// Wraps a single-shot request into an observable operation.
///
/// Overlapping invocations are last-write-wins: only the most recent one
/// may settle the state, older outcomes are returned to their caller and
/// otherwise dropped.
pub struct Mutation<I, O> {
    inner: Arc<Inner<I, O>>,
}

impl<I, O> Clone for Mutation<I, O> {
    fn clone(&self) -> Self {
        Mutation {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I, O> Mutation<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: ApiResponse + Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(operation: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = crate::api::Result<O>> + Send + 'static,
    {
        let operation: Operation<I, O> = Arc::new(move |input: I| operation(input).boxed());

        let (mut tx, rx) = broadcast(NOTIFIER_CAPACITY);
        tx.set_overflow(true);

        Mutation {
            inner: Arc::new(Inner {
                operation,
                slot: Mutex::new(Slot {
                    state: MutationState::idle(),
                    generation: 0,
                }),
                notifier: tx,
                _receiver: rx.deactivate(),
            }),
        }
    }

    /// Mutation bound to one endpoint of `client`.
    pub fn endpoint<E>(client: ApiClient) -> Self
    where
        E: Endpoint<Input = I, Output = O> + 'static,
    {
        Self::new(move |input: I| {
            let client = client.clone();
            async move { client.call::<E>(&input).await }
        })
    }

    /// Runs the operation and returns its outcome.
    pub async fn mutate(&self, input: I) -> Result<O, MutationError> {
        let generation = self.begin(input.clone()).await;
        self.run(generation, input).await
    }

    /// Moves to pending before returning, then settles in the background.
    pub async fn trigger(&self, input: I) -> JoinHandle<()> {
        let generation = self.begin(input.clone()).await;
        let this = self.clone();

        task::spawn(async move {
            let _ = this.run(generation, input).await;
        })
    }

    /// Triggers again with the last submitted input, if there is one.
    pub async fn retry(&self) -> Option<JoinHandle<()>> {
        let input = self.input().await?;
        Some(self.trigger(input).await)
    }

    /// Back to idle. A pending invocation keeps running but its outcome is discarded.
    pub async fn reset(&self) {
        {
            let mut slot = self.inner.slot.lock().await;
            slot.generation += 1;
            slot.state = MutationState::idle();
        }

        debug!("Mutation reset");
        self.notify(MutationStatus::Idle);
    }

    async fn begin(&self, input: I) -> u64 {
        let generation = {
            let mut slot = self.inner.slot.lock().await;
            slot.generation += 1;
            slot.state.begin(input);
            slot.generation
        };

        debug!(generation, "Mutation pending");
        self.notify(MutationStatus::Pending);
        generation
    }

    async fn run(&self, generation: u64, input: I) -> Result<O, MutationError> {
        let outcome = match (self.inner.operation)(input).await {
            Ok(output) if output.is_success() => Ok(output),
            Ok(output) => Err(MutationError::Application {
                message: output.failure_message(),
                status: None,
            }),
            Err(e) => {
                if e.is_transport() {
                    warn!(error = %e, "Request failed");
                }
                Err(MutationError::from(e))
            }
        };

        let status = {
            let mut slot = self.inner.slot.lock().await;
            if slot.generation != generation {
                debug!(generation, current = slot.generation, "Discarding superseded outcome");
                return outcome;
            }

            slot.state.settle(&outcome);
            slot.state.status
        };

        match &outcome {
            Ok(_) => info!("Mutation succeeded"),
            Err(e) => info!(error = %e, "Mutation failed"),
        }
        self.notify(status);

        outcome
    }

    fn notify(&self, status: MutationStatus) {
        // Only inactive receivers is fine; nobody is listening yet.
        let _ = self.inner.notifier.try_broadcast(status);
    }

    /// Receives every status change from now on.
    pub fn subscribe(&self) -> Receiver<MutationStatus> {
        self.inner.notifier.new_receiver()
    }

    pub async fn snapshot(&self) -> MutationState<I, O> {
        self.inner.slot.lock().await.state.clone()
    }

    pub async fn status(&self) -> MutationStatus {
        self.inner.slot.lock().await.state.status
    }

    pub async fn data(&self) -> Option<O> {
        self.inner.slot.lock().await.state.data.clone()
    }

    pub async fn error(&self) -> Option<MutationError> {
        self.inner.slot.lock().await.state.error.clone()
    }

    pub async fn input(&self) -> Option<I> {
        self.inner.slot.lock().await.state.input.clone()
    }

    pub async fn is_idle(&self) -> bool {
        self.status().await == MutationStatus::Idle
    }

    pub async fn is_pending(&self) -> bool {
        self.status().await == MutationStatus::Pending
    }

    pub async fn is_success(&self) -> bool {
        self.status().await == MutationStatus::Success
    }

    pub async fn is_error(&self) -> bool {
        self.status().await == MutationStatus::Error
    }
}
