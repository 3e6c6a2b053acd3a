use serde::{Deserialize, Serialize};

use crate::api::{
    response::api_response, ApiStatus, FileResponse, FileUpload, Form, Payload, Result,
};

use super::{Endpoint, Quality};

#[derive(Debug, Clone)]
pub struct ImageCompressInput {
    pub file: FileUpload,
    pub quality: Quality,
}

#[derive(Debug, Clone)]
pub struct ImageConvertInput {
    pub file: FileUpload,
    pub output_format: String,
    pub quality: Option<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ImageProcessingResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    pub filename: Option<String>,
    pub download_url: Option<String>,
    pub original_size: Option<u64>,
    pub processed_size: Option<u64>,
    pub compression_ratio: Option<f64>,
    pub dimensions: Option<ImageDimensions>,
}

api_response!(ImageProcessingResponse);

impl FileResponse for ImageProcessingResponse {
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

pub struct CompressImage;

impl Endpoint for CompressImage {
    type Input = ImageCompressInput;
    type Output = ImageProcessingResponse;

    const PATH: &'static str = "image/compress";

    fn payload(input: &Self::Input) -> Result<Payload> {
        Ok(Form::new()
            .file("file", &input.file)
            .text("quality", input.quality)
            .into())
    }
}

pub struct ConvertImage;

impl Endpoint for ConvertImage {
    type Input = ImageConvertInput;
    type Output = ImageProcessingResponse;

    const PATH: &'static str = "image/convert";

    fn payload(input: &Self::Input) -> Result<Payload> {
        Ok(Form::new()
            .file("file", &input.file)
            .text("output_format", &input.output_format)
            .text_opt("quality", input.quality)
            .into())
    }

    fn is_ready(input: &Self::Input) -> bool {
        !input.output_format.trim().is_empty() && input.quality.map_or(true, |q| q <= 100)
    }
}
