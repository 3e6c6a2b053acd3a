use async_std::task;
use futures::{future, stream::BoxStream, AsyncBufReadExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum::Display;
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::cancel::CancelSignal;

use super::{
    decode, response::api_response, sse, ApiClient, ApiError, ApiResponse, ApiStatus,
    FileUpload, Form, Payload, RawResponse, Result,
};

/// Status carried by each event of a long-running task's stream.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[derive(TS)]
#[ts(export)]
pub enum TaskEventStatus {
    #[serde(alias = "pending")]
    Queued,
    #[serde(alias = "running")]
    Processing,
    Completed,
    #[serde(alias = "failed")]
    Error,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl TaskEventStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskEventStatus::Completed | TaskEventStatus::Error | TaskEventStatus::Cancelled
        )
    }
}

/// One progress event; `result` is only present on the terminal `completed` event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProgressEvent<R> {
    pub status: TaskEventStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<R>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<R> ProgressEvent<R> {
    pub fn new(status: TaskEventStatus) -> Self {
        ProgressEvent {
            status,
            progress: None,
            message: None,
            stage: None,
            result: None,
            error: None,
        }
    }

    pub fn processing(progress: f64) -> Self {
        ProgressEvent {
            progress: Some(progress),
            ..Self::new(TaskEventStatus::Processing)
        }
    }

    pub fn completed(result: R) -> Self {
        ProgressEvent {
            progress: Some(100.0),
            result: Some(result),
            ..Self::new(TaskEventStatus::Completed)
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        ProgressEvent {
            error: Some(error.into()),
            ..Self::new(TaskEventStatus::Error)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

pub type EventStream<R> = BoxStream<'static, Result<ProgressEvent<R>>>;

/// Parameters for an OCR extraction.
#[derive(Debug, Clone)]
pub struct OcrInput {
    pub file: FileUpload,
    pub language: String,
}

impl OcrInput {
    pub fn new(file: FileUpload, language: impl Into<String>) -> Self {
        OcrInput {
            file,
            language: language.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskTicket {
    #[serde(flatten)]
    pub status: ApiStatus,

    #[serde(default)]
    pub task_id: Option<String>,
}

api_response!(TaskTicket);

pub const OCR_START_PATH: &str = "pdf/ocr-async";

fn stream_path(task_id: &str) -> String {
    format!("tasks/{task_id}/stream")
}

fn cancel_path(task_id: &str) -> String {
    format!("tasks/{task_id}/cancel")
}

/// Sends the server-side cancel request when dropped after its task was
/// cancelled. Held from the moment the server assigned an id.
struct CancelOnDrop {
    client: ApiClient,
    task_id: String,
    signal: CancelSignal,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if !self.signal.is_cancelled() {
            return;
        }

        let client = self.client.clone();
        let task_id = std::mem::take(&mut self.task_id);
        task::spawn(async move {
            if let Err(e) = client.cancel_task(&task_id).await {
                warn!(%task_id, error = %e, "Failed to cancel task on the server");
            }
        });
    }
}

impl ApiClient {
    /// Submits an OCR job and returns the server-assigned task id.
    pub async fn start_ocr(&self, input: &OcrInput) -> Result<String> {
        let form = Form::new()
            .file("file", &input.file)
            .text("language", &input.language);

        let response = self.post(OCR_START_PATH, Payload::Form(form)).await?;
        let ticket: TaskTicket = decode(response).await?;

        if !ticket.is_success() {
            return Err(ApiError::Rejected {
                status: 200,
                message: ticket.failure_message(),
            });
        }

        match ticket.task_id {
            Some(task_id) if !task_id.is_empty() => {
                info!(%task_id, "Task accepted");
                Ok(task_id)
            }
            _ => Err(ApiError::Stream("Task accepted without an id".into())),
        }
    }

    /// Subscribes to the progress stream of a server task.
    pub async fn task_events<R>(&self, task_id: &str) -> Result<EventStream<R>>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let response = self.get_stream(&stream_path(task_id)).await?;
        let lines = response.lines();

        let events = sse::frames(lines).filter_map(|frame| {
            future::ready(match frame {
                Ok(frame) => match serde_json::from_str::<ProgressEvent<R>>(&frame.data) {
                    Ok(event) => Some(Ok(event)),
                    Err(e) => {
                        debug!(error = %e, data = %frame.data, "Skipping undecodable event");
                        None
                    }
                },
                Err(e) => Some(Err(ApiError::Stream(e.to_string()))),
            })
        });

        Ok(events.boxed())
    }

    pub async fn cancel_task(&self, task_id: &str) -> Result<()> {
        let response = self
            .post(&cancel_path(task_id), Payload::Json(serde_json::json!({})))
            .await?;
        let _: RawResponse = decode(response).await?;
        Ok(())
    }

    /// Starts an OCR job and returns its event stream. Dropping the stream after
    /// `signal` fired asks the server to release the task.
    ///
    /// The start request runs detached, so a caller dropped while it is in
    /// flight still releases the task once the server assigned its id.
    pub async fn ocr_task(
        &self,
        input: OcrInput,
        signal: CancelSignal,
    ) -> Result<EventStream<RawResponse>> {
        let client = self.clone();
        let start_signal = signal.clone();
        let guard = task::spawn(async move {
            let task_id = client.start_ocr(&input).await?;
            Ok::<_, ApiError>(CancelOnDrop {
                client,
                task_id,
                signal: start_signal,
            })
        })
        .await?;

        if signal.is_cancelled() {
            info!(task_id = %guard.task_id, "Task cancelled while starting");
            return Err(ApiError::Stream("Task cancelled before streaming".into()));
        }

        let events = self.task_events::<RawResponse>(&guard.task_id).await?;

        Ok(events
            .map(move |event| {
                let _keep_alive = &guard;
                event
            })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Pages {
        pages: u32,
    }

    fn decode_event<R: DeserializeOwned>(data: &str) -> ProgressEvent<R> {
        serde_json::from_str(data).unwrap()
    }

    #[test]
    fn events_decode_with_and_without_result() {
        let event: ProgressEvent<Pages> = decode_event(r#"{"status": "running", "progress": 40}"#);
        assert_eq!(event.status, TaskEventStatus::Processing);
        assert_eq!(event.progress, Some(40.0));
        assert_eq!(event.result, None);

        let event: ProgressEvent<Pages> =
            decode_event(r#"{"status": "completed", "result": {"pages": 3}}"#);
        assert!(event.status.is_terminal());
        assert_eq!(event.result, Some(Pages { pages: 3 }));

        let event: ProgressEvent<Pages> = decode_event(r#"{"status": "paused"}"#);
        assert_eq!(event.status, TaskEventStatus::Unknown);
    }
}
