use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

/// Shown when neither the transport nor the server gave anything usable.
pub const GENERIC_FAILURE: &str = "An unexpected error occurred. Please try again.";

/// Envelope shared by every endpoint response.
///
/// `detail` is what the server's framework emits on HTTP errors: either a
/// plain string or a list of validation errors with a `msg` field each.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[derive(TS)]
#[ts(export)]
pub struct ApiStatus {
    #[serde(default)]
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "unknown")]
    pub detail: Option<Value>,
}

impl ApiStatus {
    pub fn ok() -> Self {
        ApiStatus {
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        ApiStatus {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Message to show for a failed response: `error`, then `detail`, then
    /// `message`, then [`GENERIC_FAILURE`].
    pub fn failure_message(&self) -> String {
        non_empty(self.error.as_deref())
            .map(str::to_owned)
            .or_else(|| self.detail.as_ref().and_then(detail_text))
            .or_else(|| non_empty(self.message.as_deref()).map(str::to_owned))
            .unwrap_or_else(|| GENERIC_FAILURE.to_string())
    }
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

fn detail_text(detail: &Value) -> Option<String> {
    match detail {
        Value::String(s) => non_empty(Some(s)).map(str::to_owned),
        Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();

            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join("; "))
            }
        }
        _ => None,
    }
}

/// Minimal interface every endpoint-specific response provides.
pub trait ApiResponse {
    fn status(&self) -> &ApiStatus;

    fn is_success(&self) -> bool {
        self.status().success
    }

    fn message(&self) -> Option<&str> {
        self.status().message.as_deref()
    }

    fn failure_message(&self) -> String {
        self.status().failure_message()
    }
}

impl ApiResponse for ApiStatus {
    fn status(&self) -> &ApiStatus {
        self
    }
}

/// Responses that reference a produced file on the server.
pub trait FileResponse: ApiResponse {
    fn download_url(&self) -> Option<&str>;
    fn filename(&self) -> Option<&str>;

    fn original_size(&self) -> Option<u64> {
        None
    }

    fn processed_size(&self) -> Option<u64> {
        None
    }

    fn compression_ratio(&self) -> Option<f64> {
        None
    }
}

/// Implements [`ApiResponse`] for structs carrying a flattened `status: ApiStatus`.
macro_rules! api_response {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::api::response::ApiResponse for $ty {
                fn status(&self) -> &$crate::api::response::ApiStatus {
                    &self.status
                }
            }
        )+
    };
}
pub(crate) use api_response;

/// Untyped response, for endpoints whose schema is not modelled.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    #[serde(flatten)]
    pub status: ApiStatus,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

api_response!(RawResponse);

impl FileResponse for RawResponse {
    fn download_url(&self) -> Option<&str> {
        self.fields.get("download_url").and_then(Value::as_str)
    }

    fn filename(&self) -> Option<&str> {
        self.fields.get("filename").and_then(Value::as_str)
    }

    fn original_size(&self) -> Option<u64> {
        self.fields.get("original_size").and_then(Value::as_u64)
    }

    fn processed_size(&self) -> Option<u64> {
        self.fields.get("processed_size").and_then(Value::as_u64)
    }

    fn compression_ratio(&self) -> Option<f64> {
        self.fields.get("compression_ratio").and_then(Value::as_f64)
    }
}

const KNOWN_FIELDS: [&str; 9] = [
    "success",
    "message",
    "error",
    "detail",
    "download_url",
    "filename",
    "original_size",
    "processed_size",
    "compression_ratio",
];

/// Uniform shape a screen renders a file-processing outcome from.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[derive(TS)]
#[ts(export)]
pub struct ProcessingResult {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_size: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    /// Operation-specific fields (page counts, palettes, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    #[ts(type = "Record<string, unknown>")]
    pub extra: Map<String, Value>,
}

impl ProcessingResult {
    pub fn from_response<R: FileResponse>(response: &R) -> Self {
        let success = response.is_success();

        ProcessingResult {
            success,
            message: response.message().map(str::to_owned),
            download_url: non_empty(response.download_url()).map(str::to_owned),
            filename: non_empty(response.filename()).map(str::to_owned),
            original_size: response.original_size(),
            processed_size: response.processed_size(),
            compression_ratio: response.compression_ratio(),
            error_detail: (!success).then(|| response.failure_message()),
            extra: Map::new(),
        }
    }

    /// Builds a result from an arbitrary JSON body, keeping unknown fields in `extra`.
    pub fn from_value(value: &Value) -> Self {
        let raw: RawResponse = serde_json::from_value(value.clone()).unwrap_or_default();
        let mut result = Self::from_response(&raw);

        result.extra = raw
            .fields
            .into_iter()
            .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
            .collect();

        result
    }
}
