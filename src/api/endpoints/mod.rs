use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum::{Display, EnumString};
use ts_rs::TS;

use super::{ApiResponse, Payload, Result};

pub mod codes;
pub mod image;
pub mod pdf;
pub mod security;
pub mod text;
pub mod units;
pub mod video;

/// A single-shot operation of the processing service.
pub trait Endpoint {
    type Input: Send + Sync + 'static;
    type Output: ApiResponse + DeserializeOwned + Send + Sync + 'static;

    /// Path relative to the API root, e.g. `video/compress`.
    const PATH: &'static str;

    fn payload(input: &Self::Input) -> Result<Payload>;

    /// Caller-side guard: whether the input is complete enough to submit.
    fn is_ready(_input: &Self::Input) -> bool {
        true
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[derive(TS)]
#[ts(export)]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}
