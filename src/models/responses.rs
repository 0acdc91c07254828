//! JSON bodies returned by the upload and delete endpoints.

use serde::{Deserialize, Serialize};

/// Body of a successful `POST /uploads`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UploadResponse {
    pub ok: bool,

    /// Public URL of the original.
    pub url: String,

    /// Public URL of the thumbnail, only when one was written for this upload.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub thumb_url: Option<String>,

    /// Storage key relative to the storage root.
    pub key: String,

    /// Content type sniffed from the uploaded bytes.
    pub content_type: String,
}

/// Body of a successful `DELETE /uploads/{*reference}`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}
