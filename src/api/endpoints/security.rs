use serde::{Deserialize, Serialize};

use crate::api::{
    response::api_response, ApiStatus, FileResponse, FileUpload, Form, Payload, Result,
};

use super::Endpoint;

#[derive(Clone)]
pub struct FileSecretInput {
    pub file: FileUpload,
    pub password: String,
}

impl std::fmt::Debug for FileSecretInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSecretInput")
            .field("file", &self.file)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EncryptionResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub download_url: String,
    pub original_size: Option<u64>,
    pub processed_size: Option<u64>,
}

api_response!(EncryptionResponse);

impl FileResponse for EncryptionResponse {
    fn download_url(&self) -> Option<&str> {
        Some(self.download_url.as_str())
    }

    fn filename(&self) -> Option<&str> {
        Some(self.filename.as_str())
    }

    fn original_size(&self) -> Option<u64> {
        self.original_size
    }

    fn processed_size(&self) -> Option<u64> {
        self.processed_size
    }
}

fn secret_form(input: &FileSecretInput) -> Payload {
    Form::new()
        .file("file", &input.file)
        .text("password", &input.password)
        .into()
}

pub struct EncryptFile;

impl Endpoint for EncryptFile {
    type Input = FileSecretInput;
    type Output = EncryptionResponse;

    const PATH: &'static str = "security/encrypt";

    fn payload(input: &Self::Input) -> Result<Payload> {
        Ok(secret_form(input))
    }

    fn is_ready(input: &Self::Input) -> bool {
        !input.password.is_empty()
    }
}

pub struct DecryptFile;

impl Endpoint for DecryptFile {
    type Input = FileSecretInput;
    type Output = EncryptionResponse;

    const PATH: &'static str = "security/decrypt";

    fn payload(input: &Self::Input) -> Result<Payload> {
        Ok(secret_form(input))
    }

    fn is_ready(input: &Self::Input) -> bool {
        !input.password.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::api::ProcessingResult;

    use super::*;

    #[test]
    fn debug_output_hides_password() {
        let input = FileSecretInput {
            file: FileUpload::new("notes.txt", b"secret".to_vec()),
            password: "hunter2".into(),
        };

        assert!(!format!("{input:?}").contains("hunter2"));
    }

    #[test]
    fn empty_strings_are_not_download_references() {
        let response: EncryptionResponse = serde_json::from_str(
            r#"{ "success": false, "message": "Wrong password" }"#,
        )
        .unwrap();

        let result = ProcessingResult::from_response(&response);

        assert!(result.download_url.is_none());
        assert!(result.filename.is_none());
        assert_eq!(result.error_detail.as_deref(), Some("Wrong password"));
    }
}
