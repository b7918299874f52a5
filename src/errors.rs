//! Error types for the upload service.
//!
//! `UploadError` is what handlers return; it renders itself as the JSON
//! failure body. Extraction and command errors stay server-side.

use crate::models::UploadResponse;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Message returned for every server-side failure
pub const GENERIC_FAILURE: &str = "Failed to upload file";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid multipart body")]
    InvalidMultipart(#[source] actix_multipart::MultipartError),

    #[error("No file provided")]
    NoFile,

    #[error("Only ZIP files are allowed")]
    NotZip { filename: String },

    #[error("File exceeds the upload size limit")]
    TooLarge { limit: usize },

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Blocking task was canceled")]
    Blocking(#[from] actix_web::error::BlockingError),
}

impl ResponseError for UploadError {
    fn status_code(&self) -> StatusCode {
        match self {
            UploadError::InvalidMultipart(_) | UploadError::NoFile | UploadError::NotZip { .. } => {
                StatusCode::BAD_REQUEST
            }
            UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Extraction(_) | UploadError::Blocking(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Server errors keep their detail in the log
        let message = if status.is_server_error() {
            log::error!("Error uploading file: {}", self);
            GENERIC_FAILURE.to_string()
        } else {
            log::warn!("Rejected upload: {}", self);
            self.to_string()
        };
        HttpResponse::build(status).json(UploadResponse::failure(message))
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid zip archive: {0}")]
    InvalidArchive(#[from] zip::result::ZipError),

    #[error("Refused unsafe archive entry path: {0}")]
    UnsafePath(String),

    #[error("Archive expands to {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> ExtractError {
        let path = path.into();
        move |source| ExtractError::Io { path, source }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}")]
    Failed { command: String, status: String },

    #[error("{command} timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}
