use std::time::Duration;

use async_std::task;
use futures::{StreamExt, TryStreamExt};
use httpmock::{
    Method::{GET, POST},
    Mock, MockServer,
};
use serde_json::json;

use crate::{
    api::{
        endpoints::{
            codes::{BarcodeInput, BarcodeType, GenerateBarcode},
            units::{ConvertUnits, UnitConversionInput},
            video::{CompressVideo, VideoCompressInput},
            Quality,
        },
        tasks::{OcrInput, TaskEventStatus},
    },
    cancel::{CancelHandle, CancelSignal},
    tracker::{TaskStatus, Tracker},
};

use super::*;

#[test]
fn base_url_gets_api_prefix_once() {
    let client = ApiClient::new("http://localhost:8000").unwrap();
    assert_eq!(client.base_url().as_str(), "http://localhost:8000/api/v1/");

    let client = ApiClient::new("http://localhost:8000/api/v1").unwrap();
    assert_eq!(client.base_url().as_str(), "http://localhost:8000/api/v1/");

    assert!(matches!(
        ApiClient::new("not a url"),
        Err(ApiError::InvalidUrl { .. })
    ));
}

#[test]
fn download_references_resolve_against_host() {
    let client = ApiClient::new("http://localhost:8000").unwrap();

    assert_eq!(
        client.download_url("/api/v1/download/out.mp4").unwrap().as_str(),
        "http://localhost:8000/api/v1/download/out.mp4"
    );
    assert_eq!(
        client.download_url("https://cdn.example.com/a.png").unwrap().as_str(),
        "https://cdn.example.com/a.png"
    );
}

#[async_std::test]
async fn json_endpoints_send_json() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v1/units/convert")
                .json_body(json!({ "value": 1.0, "from_unit": "km", "to_unit": "m" }));
            then.status(200).json_body(json!({
                "success": true,
                "message": "Converted",
                "converted_value": 1000.0,
                "converted_unit": "m",
                "original_value": 1.0,
                "from_unit": "km",
                "conversion_formula": "km * 1000"
            }));
        })
        .await;

    let client = ApiClient::new(&server.base_url()).unwrap();
    let input = UnitConversionInput {
        value: 1.0,
        from_unit: "km".into(),
        to_unit: "m".into(),
    };
    let response = client.call::<ConvertUnits>(&input).await.unwrap();

    mock.assert_async().await;
    assert!(response.is_success());
    assert_eq!(response.converted_value, Some(1000.0));
    assert_eq!(response.original_unit.as_deref(), Some("km"));
}

#[async_std::test]
async fn file_endpoints_send_multipart() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v1/video/compress")
                .header_exists("content-type")
                .body_contains("filename=\"clip.mp4\"")
                .body_contains("name=\"quality\"\r\n\r\nhigh");
            then.status(200).json_body(json!({
                "success": true,
                "download_url": "/api/v1/download/clip_compressed.mp4",
                "filename": "clip_compressed.mp4",
                "original_size": 2048,
                "processed_size": 1024,
                "compression_ratio": 50.0
            }));
        })
        .await;

    let client = ApiClient::new(&server.base_url()).unwrap();
    let input = VideoCompressInput {
        file: FileUpload::new("clip.mp4", b"MP4DATA".to_vec()),
        quality: Quality::High,
    };
    let response = client.call::<CompressVideo>(&input).await.unwrap();

    mock.assert_async().await;
    let result = ProcessingResult::from_response(&response);
    assert!(result.success);
    assert_eq!(result.compression_ratio, Some(50.0));
    assert_eq!(result.filename.as_deref(), Some("clip_compressed.mp4"));
}

#[async_std::test]
async fn success_false_is_returned_not_raised() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/barcode/generate");
            then.status(200).json_body(json!({
                "success": false,
                "message": "Barcode generation failed",
                "error": "EAN-13 needs 12 digits"
            }));
        })
        .await;

    let client = ApiClient::new(&server.base_url()).unwrap();
    let mut input = BarcodeInput::new("123");
    input.barcode_type = BarcodeType::Ean13;

    let response = client.call::<GenerateBarcode>(&input).await.unwrap();

    assert!(!response.is_success());
    assert_eq!(response.failure_message(), "EAN-13 needs 12 digits");
}

#[async_std::test]
async fn validation_errors_become_rejections() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/units/convert");
            then.status(422).json_body(json!({
                "detail": [{ "loc": ["body", "value"], "msg": "value is not a valid float" }]
            }));
        })
        .await;

    let client = ApiClient::new(&server.base_url()).unwrap();
    let input = UnitConversionInput {
        value: 1.0,
        from_unit: "km".into(),
        to_unit: "m".into(),
    };
    let err = client.call::<ConvertUnits>(&input).await.unwrap_err();

    assert!(!err.is_transport());
    assert!(matches!(
        err,
        ApiError::Rejected { status: 422, ref message } if message == "value is not a valid float"
    ));
}

#[async_std::test]
async fn ocr_task_streams_progress_events() {
    let server = MockServer::start_async().await;
    let start = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v1/pdf/ocr-async")
                .body_contains("name=\"language\"\r\n\r\neng");
            then.status(200)
                .json_body(json!({ "success": true, "task_id": "abc123" }));
        })
        .await;
    let stream = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/tasks/abc123/stream");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(concat!(
                    ": connected\n\n",
                    "data: {\"status\": \"processing\", \"progress\": 10}\n\n",
                    "data: not json\n\n",
                    "data: {\"status\": \"processing\", \"progress\": 55, \"message\": \"Page 2 of 3\"}\n\n",
                    "data: {\"status\": \"completed\", \"progress\": 100,\n",
                    "data:  \"result\": {\"success\": true, \"download_url\": \"/ocr.txt\"}}\n\n",
                ));
        })
        .await;

    let client = ApiClient::new(&server.base_url()).unwrap();
    let input = OcrInput::new(FileUpload::new("scan.pdf", b"%PDF".to_vec()), "eng");

    let events: Vec<_> = client
        .ocr_task(input, CancelSignal::never())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    start.assert_async().await;
    stream.assert_async().await;
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].progress, Some(10.0));
    assert_eq!(events[1].message.as_deref(), Some("Page 2 of 3"));
    assert_eq!(events[2].status, TaskEventStatus::Completed);

    let result = events[2].result.as_ref().unwrap();
    assert_eq!(result.download_url(), Some("/ocr.txt"));
}

#[async_std::test]
async fn ocr_start_refusal_is_a_rejection() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/pdf/ocr-async");
            then.status(200)
                .json_body(json!({ "success": false, "error": "Only PDF files are supported" }));
        })
        .await;

    let client = ApiClient::new(&server.base_url()).unwrap();
    let input = OcrInput::new(FileUpload::new("notes.txt", b"hi".to_vec()), "eng");

    match client.ocr_task(input, CancelSignal::never()).await {
        Err(ApiError::Rejected { message, .. }) => {
            assert_eq!(message, "Only PDF files are supported")
        }
        Err(other) => panic!("Expected a rejection, got {other:?}"),
        Ok(_) => panic!("Expected a rejection, got a stream"),
    }
}

#[async_std::test]
async fn cancel_task_posts_to_cancel_endpoint() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/tasks/abc123/cancel");
            then.status(200).json_body(json!({ "success": true }));
        })
        .await;

    let client = ApiClient::new(&server.base_url()).unwrap();
    client.cancel_task("abc123").await.unwrap();

    mock.assert_async().await;
}

/// Waits for the detached cancel request to reach the server.
async fn wait_for_hits(mock: &Mock<'_>, expected: usize) -> usize {
    for _ in 0..40 {
        let hits = mock.hits_async().await;
        if hits >= expected {
            return hits;
        }
        task::sleep(Duration::from_millis(25)).await;
    }
    mock.hits_async().await
}

async fn mock_ocr_start<'a>(server: &'a MockServer, task_id: &str, delay: Duration) -> Mock<'a> {
    let task_id = task_id.to_string();
    server
        .mock_async(move |when, then| {
            when.method(POST).path("/api/v1/pdf/ocr-async");
            then.status(200)
                .delay(delay)
                .json_body(json!({ "success": true, "task_id": task_id }));
        })
        .await
}

async fn mock_cancel<'a>(server: &'a MockServer, task_id: &str) -> Mock<'a> {
    let path = format!("/api/v1/tasks/{task_id}/cancel");
    server
        .mock_async(move |when, then| {
            when.method(POST).path(path);
            then.status(200).json_body(json!({ "success": true }));
        })
        .await
}

fn scan() -> OcrInput {
    OcrInput::new(FileUpload::new("scan.pdf", b"%PDF".to_vec()), "eng")
}

#[async_std::test]
async fn cancel_while_starting_releases_server_task() {
    let server = MockServer::start_async().await;
    let start = mock_ocr_start(&server, "slow1", Duration::from_millis(300)).await;
    let cancel = mock_cancel(&server, "slow1").await;

    let client = ApiClient::new(&server.base_url()).unwrap();
    let tracker: Tracker<RawResponse> = Tracker::new();
    let handle = tracker
        .start_task(move |signal| async move { client.ocr_task(scan(), signal).await })
        .await;

    task::sleep(Duration::from_millis(80)).await;
    assert!(tracker.is_loading().await);
    assert!(tracker.cancel().await);
    handle.await;

    assert_eq!(wait_for_hits(&cancel, 1).await, 1);
    start.assert_async().await;
    assert_eq!(tracker.status().await, TaskStatus::Cancelled);
}

#[async_std::test]
async fn cancel_while_opening_stream_releases_server_task() {
    let server = MockServer::start_async().await;
    mock_ocr_start(&server, "open1", Duration::ZERO).await;
    let stream = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/tasks/open1/stream");
            then.status(200)
                .delay(Duration::from_millis(300))
                .header("content-type", "text/event-stream")
                .body("data: {\"status\": \"processing\", \"progress\": 5}\n\n");
        })
        .await;
    let cancel = mock_cancel(&server, "open1").await;

    let client = ApiClient::new(&server.base_url()).unwrap();
    let tracker: Tracker<RawResponse> = Tracker::new();
    let handle = tracker
        .start_task(move |signal| async move { client.ocr_task(scan(), signal).await })
        .await;

    // Start answers at once; the stream request is still waiting.
    assert_eq!(wait_for_hits(&stream, 1).await, 1);
    assert!(tracker.cancel().await);
    handle.await;

    assert_eq!(wait_for_hits(&cancel, 1).await, 1);
}

#[async_std::test]
async fn dropping_cancelled_stream_releases_server_task() {
    let server = MockServer::start_async().await;
    mock_ocr_start(&server, "busy1", Duration::ZERO).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/tasks/busy1/stream");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body("data: {\"status\": \"processing\", \"progress\": 20}\n\n");
        })
        .await;
    let cancel = mock_cancel(&server, "busy1").await;

    let client = ApiClient::new(&server.base_url()).unwrap();
    let (handle, _registration) = CancelHandle::new();
    let mut events = client.ocr_task(scan(), handle.signal()).await.unwrap();

    let first = events.next().await.unwrap().unwrap();
    assert_eq!(first.status, TaskEventStatus::Processing);

    handle.cancel();
    drop(events);

    assert_eq!(wait_for_hits(&cancel, 1).await, 1);
}

#[async_std::test]
async fn finished_stream_does_not_cancel() {
    let server = MockServer::start_async().await;
    mock_ocr_start(&server, "done1", Duration::ZERO).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/tasks/done1/stream");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body("data: {\"status\": \"completed\", \"result\": {\"success\": true}}\n\n");
        })
        .await;
    let cancel = mock_cancel(&server, "done1").await;

    let client = ApiClient::new(&server.base_url()).unwrap();
    let tracker: Tracker<RawResponse> = Tracker::new();
    let handle = tracker
        .start_task(move |signal| async move { client.ocr_task(scan(), signal).await })
        .await;
    handle.await;

    assert_eq!(tracker.status().await, TaskStatus::Completed);
    task::sleep(Duration::from_millis(100)).await;
    assert_eq!(cancel.hits_async().await, 0);
}
