use serde::{Deserialize, Serialize};

use crate::api::{
    response::api_response, ApiStatus, FileResponse, FileUpload, Form, Payload, Result,
};

use super::{Endpoint, Quality};

#[derive(Debug, Clone)]
pub struct VideoCompressInput {
    pub file: FileUpload,
    pub quality: Quality,
}

#[derive(Debug, Clone)]
pub struct VideoConvertInput {
    pub file: FileUpload,
    pub output_format: String,
    pub quality: Option<Quality>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct VideoProcessingResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    pub filename: Option<String>,
    pub download_url: Option<String>,
    pub original_size: Option<u64>,
    pub processed_size: Option<u64>,
    pub compression_ratio: Option<f64>,
}

api_response!(VideoProcessingResponse);

impl FileResponse for VideoProcessingResponse {
    fn download_url(&self) -> Option<&str> {
        self.download_url.as_deref()
    }

    fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn original_size(&self) -> Option<u64> {
        self.original_size
    }

    fn processed_size(&self) -> Option<u64> {
        self.processed_size
    }

    fn compression_ratio(&self) -> Option<f64> {
        self.compression_ratio
    }
}

pub struct CompressVideo;

impl Endpoint for CompressVideo {
    type Input = VideoCompressInput;
    type Output = VideoProcessingResponse;

    const PATH: &'static str = "video/compress";

    fn payload(input: &Self::Input) -> Result<Payload> {
        Ok(Form::new()
            .file("file", &input.file)
            .text("quality", input.quality)
            .into())
    }
}

pub struct ConvertVideo;

impl Endpoint for ConvertVideo {
    type Input = VideoConvertInput;
    type Output = VideoProcessingResponse;

    const PATH: &'static str = "video/convert";

    fn payload(input: &Self::Input) -> Result<Payload> {
        Ok(Form::new()
            .file("file", &input.file)
            .text("output_format", &input.output_format)
            .text_opt("quality", input.quality)
            .into())
    }

    fn is_ready(input: &Self::Input) -> bool {
        !input.output_format.trim().is_empty()
    }
}
