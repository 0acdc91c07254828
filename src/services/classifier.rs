//! Content sniffing for uploads.
//!
//! The media type of an upload is decided from its leading bytes only; the
//! client's declared `Content-Type` and filename are never consulted.

use std::path::Path;
use thiserror::Error;

/// Number of leading bytes inspected when sniffing.
pub const SNIFF_LEN: usize = 512;

/// Shortest prefix that can carry any image signature `infer` knows.
const MIN_SIGNATURE_LEN: usize = 2;

/// Longest client-supplied extension that is kept as-is.
const MAX_EXTENSION_LEN: usize = 10;

/// Fallback extension when neither filename nor media type yields one.
pub const FALLBACK_EXTENSION: &str = ".bin";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("upload is empty")]
    Empty,
    #[error("unsupported media type `{0}`")]
    Unsupported(String),
}

/// Sniff the media type of `head` and require it to be an image.
///
/// Only the first [`SNIFF_LEN`] bytes are considered. Returns the MIME type
/// string (e.g. `image/png`).
pub fn classify(head: &[u8]) -> Result<String, ClassifyError> {
    let head = &head[..head.len().min(SNIFF_LEN)];
    if head.len() < MIN_SIGNATURE_LEN {
        return Err(ClassifyError::Empty);
    }

    match infer::get(head) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
            Ok(kind.mime_type().to_string())
        }
        Some(kind) => Err(ClassifyError::Unsupported(kind.mime_type().to_string())),
        None => Err(ClassifyError::Unsupported("application/octet-stream".into())),
    }
}

/// Pick the stored extension (with leading dot, lower-cased).
///
/// Prefers the client filename's extension when it is short and plain
/// alphanumeric; otherwise derives it from the sniffed subtype
/// (`image/png` -> `.png`, `image/svg+xml` -> `.svg`).
pub fn derive_extension(file_name: Option<&str>, mime: &str) -> String {
    let from_name = file_name
        .map(str::to_ascii_lowercase)
        .and_then(|name| {
            Path::new(&name)
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_string)
        })
        .filter(|ext| is_plain_extension(ext));
    if let Some(ext) = from_name {
        return format!(".{ext}");
    }

    mime.split_once('/')
        .map(|(_, subtype)| subtype.split('+').next().unwrap_or_default())
        .map(str::to_ascii_lowercase)
        .filter(|subtype| is_plain_extension(subtype))
        .map(|subtype| format!(".{subtype}"))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

fn is_plain_extension(ext: &str) -> bool {
    !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.bytes().all(|b| b.is_ascii_alphanumeric())
}
