use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UploadResponse {
    pub fn deployed(filename: impl Into<String>) -> UploadResponse {
        UploadResponse {
            success: true,
            filename: Some(filename.into()),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> UploadResponse {
        UploadResponse {
            success: false,
            filename: None,
            message: Some(message.into()),
        }
    }
}
