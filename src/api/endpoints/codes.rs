use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::api::{response::api_response, ApiStatus, FileResponse, Payload, Result};

use super::Endpoint;

pub const MAX_BARCODE_DATA: usize = 100;
pub const MAX_QR_DATA: usize = 2953;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BarcodeType {
    Ean13,
    Ean8,
    Upca,
    Upce,
    #[default]
    Code128,
    Code39,
    Isbn13,
    Isbn10,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BarcodeInput {
    pub data: String,
    pub barcode_type: BarcodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_checksum: Option<bool>,
}

impl BarcodeInput {
    pub fn new(data: impl Into<String>) -> Self {
        BarcodeInput {
            data: data.into(),
            barcode_type: BarcodeType::default(),
            width: None,
            height: None,
            add_checksum: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BarcodeResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    pub barcode_url: Option<String>,
    pub filename: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ErrorCorrection {
    L,
    #[default]
    M,
    Q,
    H,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QrCodeInput {
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_correction: Option<ErrorCorrection>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct QrCodeResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    pub qr_code_url: Option<String>,
    pub filename: Option<String>,
}

api_response!(BarcodeResponse, QrCodeResponse);

impl FileResponse for BarcodeResponse {
    fn download_url(&self) -> Option<&str> {
        self.barcode_url.as_deref()
    }

    fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }
}

impl FileResponse for QrCodeResponse {
    fn download_url(&self) -> Option<&str> {
        self.qr_code_url.as_deref()
    }

    fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }
}

pub struct GenerateBarcode;

impl Endpoint for GenerateBarcode {
    type Input = BarcodeInput;
    type Output = BarcodeResponse;

    const PATH: &'static str = "barcode/generate";

    fn payload(input: &Self::Input) -> Result<Payload> {
        Payload::json(input)
    }

    fn is_ready(input: &Self::Input) -> bool {
        let len = input.data.trim().chars().count();
        len > 0 && len <= MAX_BARCODE_DATA
    }
}

pub struct GenerateQrCode;

impl Endpoint for GenerateQrCode {
    type Input = QrCodeInput;
    type Output = QrCodeResponse;

    const PATH: &'static str = "qrcode/generate";

    fn payload(input: &Self::Input) -> Result<Payload> {
        Payload::json(input)
    }

    fn is_ready(input: &Self::Input) -> bool {
        let len = input.data.chars().count();
        len > 0 && len <= MAX_QR_DATA
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn barcode_payload_omits_unset_options() {
        let mut input = BarcodeInput::new("5901234123457");
        input.barcode_type = BarcodeType::Ean13;
        input.height = Some(40.0);

        let payload = GenerateBarcode::payload(&input).unwrap();

        assert_eq!(
            payload,
            Payload::Json(json!({
                "data": "5901234123457",
                "barcode_type": "ean13",
                "height": 40.0
            }))
        );
    }

    #[test]
    fn barcode_needs_data() {
        assert!(!GenerateBarcode::is_ready(&BarcodeInput::new("   ")));
        assert!(!GenerateBarcode::is_ready(&BarcodeInput::new("x".repeat(101))));
        assert!(GenerateBarcode::is_ready(&BarcodeInput::new("ABC-123")));
    }

    #[test]
    fn barcode_type_parses_case_insensitively() {
        assert_eq!("EAN13".parse::<BarcodeType>().unwrap(), BarcodeType::Ean13);
        assert_eq!(BarcodeType::Code39.to_string(), "code39");
    }
}
