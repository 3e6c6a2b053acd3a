use std::{fmt, path::Path, str::FromStr, sync::Arc};

use http_types::{mime, Mime};
use serde_json::Value;
use uuid::Uuid;

use crate::utils::file_name_of;

use super::{ApiError, Result};

/// A file selected by the user, held in memory until it is uploaded.
#[derive(Clone, PartialEq)]
pub struct FileUpload {
    name: String,
    bytes: Arc<[u8]>,
    mime: Mime,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let mime = guess_mime(&name);

        FileUpload {
            name,
            bytes: bytes.into().into(),
            mime,
        }
    }

    pub async fn read<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = async_std::fs::read(path).await?;
        let name = file_name_of(path).unwrap_or("upload");

        Ok(FileUpload::new(name, bytes))
    }

    pub fn with_mime(mut self, mime: Mime) -> Self {
        self.mime = mime;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &Mime {
        &self.mime
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

impl fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUpload")
            .field("name", &self.name)
            .field("size", &self.bytes.len())
            .field("mime", &self.mime.essence())
            .finish()
    }
}

fn guess_mime(name: &str) -> Mime {
    let guessed = mime_guess::from_path(name).first_or_octet_stream();
    Mime::from_str(guessed.essence_str()).unwrap_or(mime::BYTE_STREAM)
}

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Text { name: String, value: String },
    File { name: String, file: FileUpload },
}

/// `multipart/form-data` body under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Form {
    parts: Vec<Part>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.parts.push(Part::Text {
            name: name.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn text_opt<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.text(name, value),
            None => self,
        }
    }

    pub fn file(mut self, name: impl Into<String>, file: &FileUpload) -> Self {
        self.parts.push(Part::File {
            name: name.into(),
            file: file.clone(),
        });
        self
    }

    pub fn has_files(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::File { .. }))
    }

    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            Part::Text { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn file_names(&self, name: &str) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::File { name: n, file } if n == name => Some(file.name()),
                _ => None,
            })
            .collect()
    }

    /// Encodes the form, returning the content type (with boundary) and body.
    pub fn encode(&self) -> Result<(Mime, Vec<u8>)> {
        let boundary = format!("taskplex-{}", Uuid::new_v4().simple());
        let content_type = Mime::from_str(&format!("multipart/form-data; boundary={boundary}"))
            .map_err(|e| ApiError::Payload(e.to_string()))?;

        let mut body = Vec::new();
        for part in &self.parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());

            match part {
                Part::Text { name, value } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                            escape_quoted(name)
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File { name, file } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            escape_quoted(name),
                            escape_quoted(file.name()),
                            file.mime()
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(file.bytes());
                }
            }

            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        Ok((content_type, body))
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Request body for an endpoint: JSON for plain parameters, a form once files are involved.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Form(Form),
}

impl Payload {
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self> {
        Ok(Payload::Json(serde_json::to_value(value)?))
    }

    pub fn has_files(&self) -> bool {
        match self {
            Payload::Json(_) => false,
            Payload::Form(form) => form.has_files(),
        }
    }
}

impl From<Form> for Payload {
    fn from(form: Form) -> Self {
        Payload::Form(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_mime_from_extension() {
        assert_eq!(FileUpload::new("photo.PNG", vec![1]).mime().essence(), "image/png");
        assert_eq!(FileUpload::new("clip.mp4", vec![1]).mime().essence(), "video/mp4");
        assert_eq!(FileUpload::new("scan.pdf", vec![1]).mime().essence(), "application/pdf");
        assert_eq!(
            FileUpload::new("archive.unknownext", vec![1]).mime().essence(),
            "application/octet-stream"
        );
    }

    #[test]
    fn encodes_text_and_file_parts() {
        let file = FileUpload::new("a\"b.png", b"PNGDATA".to_vec());
        let form = Form::new().file("file", &file).text("quality", "medium");

        let (content_type, body) = form.encode().unwrap();
        let header = content_type.to_string();
        let boundary = header.split("boundary=").nth(1).unwrap().trim_matches('"');
        let body = String::from_utf8(body).unwrap();

        assert_eq!(content_type.essence(), "multipart/form-data");
        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.contains("name=\"file\"; filename=\"a%22b.png\"\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n"));
        assert!(body.contains("name=\"quality\"\r\n\r\nmedium\r\n"));
        assert!(body.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn form_reports_its_files() {
        let form = Form::new().text("language", "eng");
        assert!(!Payload::from(form.clone()).has_files());

        let form = form
            .file("files", &FileUpload::new("1.pdf", vec![]))
            .file("files", &FileUpload::new("2.pdf", vec![]));
        assert!(form.has_files());
        assert_eq!(form.file_names("files"), vec!["1.pdf", "2.pdf"]);
        assert_eq!(form.text_value("language"), Some("eng"));
    }
}
