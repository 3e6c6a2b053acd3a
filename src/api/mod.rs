use serde::de::DeserializeOwned;
use surf::{Response, Url};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

pub mod endpoints;
pub mod payload;
pub mod response;
pub mod sse;
pub mod tasks;
#[cfg(test)]
mod tests;

pub use endpoints::Endpoint;
pub use payload::{FileUpload, Form, Payload};
pub use response::{ApiResponse, ApiStatus, FileResponse, ProcessingResult, RawResponse};

/// Every endpoint lives under this prefix.
pub const API_PREFIX: &str = "api/v1/";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid API url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Failed to build request body: {0}")]
    Payload(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Server responded with HTTP {status}")]
    Http { status: u16 },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Well-formed error body from the server; `message` is meant for the user.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Event stream failed: {0}")]
    Stream(String),
}

impl ApiError {
    /// Whether the failure happened below the application protocol.
    pub fn is_transport(&self) -> bool {
        !matches!(self, ApiError::Rejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// HTTP client bound to one processing service.
///
/// No client-side timeout is configured: a stalled request stays pending
/// until the transport gives up.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: surf::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(api_url: &str) -> Result<Self> {
        let base = api_base(api_url)?;
        let http: surf::Client = surf::Config::new()
            .set_timeout(None)
            .try_into()
            .map_err(|e| ApiError::Client(format!("{e}")))?;

        Ok(ApiClient { http, base })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.api_url())
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn endpoint_url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidUrl {
                url: path.to_string(),
                reason: e.to_string(),
            })
    }

    /// Resolves a `download_url` returned by the server (usually an absolute path).
    pub fn download_url(&self, download_ref: &str) -> Result<Url> {
        self.base
            .join(download_ref)
            .map_err(|e| ApiError::InvalidUrl {
                url: download_ref.to_string(),
                reason: e.to_string(),
            })
    }

    /// Calls a single-shot endpoint and decodes its response.
    ///
    /// A body with `success: false` is returned as `Ok`; it is the caller's
    /// job to branch on it.
    pub async fn call<E: Endpoint>(&self, input: &E::Input) -> Result<E::Output> {
        let payload = E::payload(input)?;
        let response = self.post(E::PATH, payload).await?;
        decode(response).await
    }

    pub async fn post(&self, path: &str, payload: Payload) -> Result<Response> {
        let url = self.endpoint_url(path)?;
        let mut request = self.http.post(url.as_str());

        request = match payload {
            Payload::Json(body) => request
                .body_json(&body)
                .map_err(|e| ApiError::Payload(e.to_string()))?,
            Payload::Form(form) => {
                let (content_type, body) = form.encode()?;
                request.body(body).content_type(content_type)
            }
        };

        debug!(%url, "POST");
        request
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))
    }

    /// Opens a `text/event-stream` response, failing on non-2xx statuses.
    pub async fn get_stream(&self, path: &str) -> Result<Response> {
        let url = self.endpoint_url(path)?;
        debug!(%url, "GET (stream)");

        let response = self
            .http
            .get(url.as_str())
            .header("Accept", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(rejection(response).await)
        }
    }
}

fn api_base(api_url: &str) -> Result<Url> {
    let mut root = api_url.trim().to_string();
    if !root.ends_with('/') {
        root.push('/');
    }

    let url = Url::parse(&root).map_err(|e| ApiError::InvalidUrl {
        url: api_url.to_string(),
        reason: e.to_string(),
    })?;

    if url.cannot_be_a_base() {
        return Err(ApiError::InvalidUrl {
            url: api_url.to_string(),
            reason: "url cannot be used as a base".to_string(),
        });
    }

    // Accept both `http://host` and `http://host/api/v1`.
    if url.path().ends_with(API_PREFIX) {
        Ok(url)
    } else {
        url.join(API_PREFIX).map_err(|e| ApiError::InvalidUrl {
            url: api_url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Decodes a response body; non-2xx statuses become [`ApiError::Rejected`] or [`ApiError::Http`].
pub async fn decode<T: DeserializeOwned>(mut response: Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(rejection(response).await);
    }

    let body = response
        .body_string()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;

    Ok(serde_json::from_str(&body)?)
}

async fn rejection(mut response: Response) -> ApiError {
    let status = u16::from(response.status());

    let body = match response.body_string().await {
        Ok(body) => body,
        Err(e) => return ApiError::Transport(e.to_string()),
    };

    match serde_json::from_str::<ApiStatus>(&body) {
        Ok(envelope) => ApiError::Rejected {
            status,
            message: envelope.failure_message(),
        },
        Err(_) => {
            warn!(status, "Error response without a JSON body");
            ApiError::Http { status }
        }
    }
}
