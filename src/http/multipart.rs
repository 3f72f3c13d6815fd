//! Multipart form data parsing.

use std::collections::HashMap;

use axum::{
    body::Body,
    http::{header, HeaderMap},
};
use bytes::Bytes;
use multer::{Constraints, Multipart, SizeLimit};

use crate::http::request::AdaptError;

/// An uploaded file from a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub content: Bytes,
}

/// Collected multipart data, keyed by field name. Repeated fields keep their order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    values: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<FormFile>>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// First text value of `name`.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Every text value of `name`.
    pub fn values(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// First file uploaded under `name`.
    pub fn file(&self, name: &str) -> Option<&FormFile> {
        self.files.get(name).and_then(|f| f.first())
    }

    /// Every file uploaded under `name`.
    pub fn files(&self, name: &str) -> &[FormFile] {
        self.files.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Names of all text fields.
    pub fn value_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Names of all file fields.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn insert_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.entry(name.into()).or_default().push(value.into());
    }

    pub fn insert_file(&mut self, name: impl Into<String>, file: FormFile) {
        self.files.entry(name.into()).or_default().push(file);
    }
}

/// Read the whole multipart body into memory, bounded by `max_memory` bytes.
///
/// Parts with a file name become [`FormFile`]s; the rest are text values.
/// Unnamed parts are skipped.
pub async fn parse_multipart(
    headers: &HeaderMap,
    body: Body,
    max_memory: u64,
) -> Result<MultipartForm, AdaptError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let boundary = multer::parse_boundary(content_type).map_err(AdaptError::NotMultipart)?;

    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(max_memory));
    let mut multipart = Multipart::with_constraints(body.into_data_stream(), boundary, constraints);

    let mut form = MultipartForm::new();
    while let Some(field) = multipart.next_field().await.map_err(AdaptError::Multipart)? {
        let Some(name) = field.name().map(String::from) else {
            continue;
        };

        match field.file_name().map(String::from) {
            Some(file_name) => {
                let content_type = field.content_type().map(ToString::to_string);
                let content = field.bytes().await.map_err(AdaptError::Multipart)?;
                form.insert_file(
                    name,
                    FormFile {
                        file_name,
                        content_type,
                        content,
                    },
                );
            }
            None => {
                let text = field.text().await.map_err(AdaptError::Multipart)?;
                form.insert_value(name, text);
            }
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const BOUNDARY: &str = "X-JSONHTTP-BOUNDARY";

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(&format!("multipart/form-data; boundary={BOUNDARY}")).unwrap(),
        );
        headers
    }

    fn body() -> String {
        format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"hi\"\r\n\r\n\
             hello, world!\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"hi\"\r\n\r\n\
             again\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"hi_file\"; filename=\"hi.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             hello, file!\r\n\
             --{b}--\r\n",
            b = BOUNDARY
        )
    }

    #[tokio::test]
    async fn test_parse_values_and_files() {
        let form = parse_multipart(&headers(), Body::from(body()), 1024)
            .await
            .unwrap();

        assert_eq!(form.value("hi"), Some("hello, world!"));
        assert_eq!(form.values("hi"), ["hello, world!", "again"]);
        assert!(form.values("missing").is_empty());

        let file = form.file("hi_file").unwrap();
        assert_eq!(file.file_name, "hi.txt");
        assert_eq!(file.content_type.as_deref(), Some("text/plain"));
        assert_eq!(file.content, Bytes::from_static(b"hello, file!"));
        assert_eq!(form.files("hi_file").len(), 1);
    }

    #[tokio::test]
    async fn test_size_limit() {
        let result = parse_multipart(&headers(), Body::from(body()), 16).await;
        assert!(matches!(result, Err(AdaptError::Multipart(_))));
    }

    #[tokio::test]
    async fn test_not_multipart() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let result = parse_multipart(&headers, Body::from("{}"), 1024).await;
        assert!(matches!(result, Err(AdaptError::NotMultipart(_))));
    }
}
