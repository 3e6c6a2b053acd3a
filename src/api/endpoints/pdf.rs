use serde::{Deserialize, Serialize};

use crate::api::{
    response::api_response, ApiStatus, FileResponse, FileUpload, Form, Payload, Result,
};

use super::Endpoint;

/// Merging needs at least this many documents.
pub const MIN_MERGE_FILES: usize = 2;

#[derive(Debug, Clone)]
pub struct PdfInput {
    pub file: FileUpload,
}

#[derive(Debug, Clone, Default)]
pub struct PdfMergeInput {
    pub files: Vec<FileUpload>,
}

#[derive(Debug, Clone)]
pub struct PdfSplitInput {
    pub file: FileUpload,
    /// 1-indexed page numbers to extract.
    pub pages: Vec<u32>,
    /// Ranges such as `1-3`.
    pub page_ranges: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PdfReorganizeInput {
    pub file: FileUpload,
    pub page_order: Vec<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PdfProcessingResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    pub filename: Option<String>,
    pub download_url: Option<String>,
    #[serde(default)]
    pub filenames: Vec<String>,
    #[serde(default)]
    pub download_urls: Vec<String>,
    pub total_pages: Option<u32>,
    pub original_size: Option<u64>,
    pub processed_size: Option<u64>,
}

api_response!(PdfProcessingResponse);

impl FileResponse for PdfProcessingResponse {
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
}

fn comma_separated<T: ToString>(items: &[T]) -> Option<String> {
    if items.is_empty() {
        None
    } else {
        Some(
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

pub struct CompressPdf;

impl Endpoint for CompressPdf {
    type Input = PdfInput;
    type Output = PdfProcessingResponse;

    const PATH: &'static str = "pdf/compress";

    fn payload(input: &Self::Input) -> Result<Payload> {
        Ok(Form::new().file("file", &input.file).into())
    }
}

pub struct MergePdf;

impl Endpoint for MergePdf {
    type Input = PdfMergeInput;
    type Output = PdfProcessingResponse;

    const PATH: &'static str = "pdf/merge";

    fn payload(input: &Self::Input) -> Result<Payload> {
        let form = input
            .files
            .iter()
            .fold(Form::new(), |form, file| form.file("files", file));

        Ok(form.into())
    }

    fn is_ready(input: &Self::Input) -> bool {
        input.files.len() >= MIN_MERGE_FILES
    }
}

pub struct SplitPdf;

impl Endpoint for SplitPdf {
    type Input = PdfSplitInput;
    type Output = PdfProcessingResponse;

    const PATH: &'static str = "pdf/split";

    fn payload(input: &Self::Input) -> Result<Payload> {
        Ok(Form::new()
            .file("file", &input.file)
            .text_opt("pages", comma_separated(&input.pages))
            .text_opt("page_ranges", comma_separated(&input.page_ranges))
            .into())
    }
}

pub struct ReorganizePdf;

impl Endpoint for ReorganizePdf {
    type Input = PdfReorganizeInput;
    type Output = PdfProcessingResponse;

    const PATH: &'static str = "pdf/reorganize";

    fn payload(input: &Self::Input) -> Result<Payload> {
        Ok(Form::new()
            .file("file", &input.file)
            .text_opt("page_order", comma_separated(&input.page_order))
            .into())
    }

    fn is_ready(input: &Self::Input) -> bool {
        !input.page_order.is_empty()
    }
}
