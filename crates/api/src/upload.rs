//! Multipart form parsing.

use std::collections::HashMap;

use agora_common::{AppError, AppResult, config::MediaConfig};
use agora_core::MediaFile;
use axum::{
    extract::{Multipart, multipart::MultipartError},
    http::StatusCode,
};

/// Room for multipart boundaries and text fields on top of the file bytes.
const FORM_OVERHEAD: usize = 1024 * 1024;

/// Body limit for upload routes: a full batch of maximum-size files plus form overhead.
#[must_use]
pub fn body_limit(media: &MediaConfig) -> usize {
    media
        .max_file_size
        .saturating_mul(media.max_files)
        .saturating_add(FORM_OVERHEAD)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// A multipart body split into text fields and file parts.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: Vec<(String, MediaFile)>,
}

impl MultipartForm {
    /// Read every part of `multipart`.
    ///
    /// Parts carrying a file name are files; the rest are text fields.
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(multipart_error)?
        {
            let name = field.name().unwrap_or("").to_string();

            if let Some(file_name) = field.file_name().map(ToString::to_string) {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(multipart_error)?;

                if !data.is_empty() {
                    form.files
                        .push((name, MediaFile::new(file_name, content_type, data)));
                }
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(multipart_error)?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    /// A non-empty text field.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// A required text field. Missing fields are reported as empty so validation
    /// produces the error.
    #[must_use]
    pub fn text_or_empty(&self, name: &str) -> String {
        self.text(name).unwrap_or_default().to_string()
    }

    /// Remove and return the files sent under any of `names`, in arrival order.
    pub fn take_files(&mut self, names: &[&str]) -> Vec<MediaFile> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(name, _)| names.contains(&name.as_str()));
        self.files = rest;
        taken.into_iter().map(|(_, file)| file).collect()
    }
}
