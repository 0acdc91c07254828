//! src/services/storage_service.rs
//!
//! StorageService: the upload pipeline and the guarded filesystem access
//! behind the media and delete endpoints. Objects live on local disk under
//! `root/uploads/<id><ext>`, thumbnails beside them as `<id>.thumb.jpg`.
//! There is no metadata store: whether an object exists is answered by
//! trying to open or remove it.

use crate::{
    config::AppConfig,
    models::object::{StoredObject, UPLOADS_DIR},
    services::{
        classifier::{self, ClassifyError, SNIFF_LEN},
        paths::{resolve_reference, resolve_upload_reference},
        thumbnail_service::{self, THUMBNAIL_MAX_DIM, ThumbnailError},
    },
};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, pin_mut, stream};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default ceiling for a single upload (25 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 25 << 20;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload is empty")]
    EmptyFile,
    #[error("unsupported media type `{0}`")]
    UnsupportedType(String),
    #[error("could not create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("could not create file {path}: {source}")]
    CreateFile { path: PathBuf, source: io::Error },
    #[error("upload exceeds the {limit} byte ceiling")]
    TooLarge { limit: u64 },
    #[error("could not save upload: {0}")]
    Save(#[source] io::Error),
    #[error("credential mismatch")]
    Unauthorized,
    #[error("reference `{0}` escapes the storage root")]
    Forbidden(String),
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("could not delete object: {0}")]
    Delete(#[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<ClassifyError> for StorageError {
    fn from(err: ClassifyError) -> Self {
        match err {
            ClassifyError::Empty => StorageError::EmptyFile,
            ClassifyError::Unsupported(mime) => StorageError::UnsupportedType(mime),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Result of a completed upload.
///
/// The original is stored whenever this value exists; `thumbnail` reports
/// the best-effort derivative separately and never affects `object`.
#[derive(Debug)]
pub struct UploadOutcome {
    pub object: StoredObject,

    /// Media type sniffed from the leading bytes.
    pub content_type: String,

    /// Bytes written for the original.
    pub size_bytes: u64,

    /// Thumbnail reference on success.
    pub thumbnail: Result<String, ThumbnailError>,
}

/// StorageService provides the media store's operations:
/// - Ingest an upload (sniff, store, thumbnail)
/// - Resolve a media reference to a servable path
/// - Delete an object (behind the optional shared secret)
///
/// Built once at startup from [`AppConfig`] and cloned into every request;
/// it holds no mutable state.
#[derive(Clone)]
pub struct StorageService {
    /// Absolute storage root.
    pub base_path: PathBuf,

    /// Shared secret required for deletes, when configured.
    backend_secret: Option<Arc<str>>,

    /// URL prefix under which `/media` is published (e.g. `/api/media`).
    public_prefix: Arc<str>,

    /// Ceiling applied to the request body and again to the copy.
    max_upload_bytes: u64,
}

impl StorageService {
    /// Create the service from configuration, making the storage root
    /// absolute and ensuring `root/uploads` exists.
    pub async fn new(cfg: &AppConfig) -> StorageResult<Self> {
        let base_path = std::path::absolute(&cfg.storage_dir)?;
        let uploads = base_path.join(UPLOADS_DIR);
        fs::create_dir_all(&uploads)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: uploads.clone(),
                source,
            })?;

        Ok(Self {
            base_path,
            backend_secret: cfg
                .backend_secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(Arc::from),
            public_prefix: Arc::from(cfg.public_prefix.trim_end_matches('/')),
            max_upload_bytes: cfg.max_upload_bytes,
        })
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Directory that holds originals and thumbnails.
    pub fn uploads_dir(&self) -> PathBuf {
        self.base_path.join(UPLOADS_DIR)
    }

    /// Public URL for an object reference.
    pub fn public_url(&self, reference: &str) -> String {
        format!("{}/{}", self.public_prefix, reference)
    }

    /// Run the upload pipeline over a byte stream.
    ///
    /// - Buffers the first 512 bytes and sniffs them; only images pass.
    /// - Generates a fresh id and streams the whole input to disk.
    /// - Derives a JPEG thumbnail, best-effort.
    ///
    /// `file_name` is only used to pick the extension.
    pub async fn ingest<S>(&self, file_name: Option<&str>, stream: S) -> StorageResult<UploadOutcome>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        pin_mut!(stream);

        let mut head = BytesMut::with_capacity(SNIFF_LEN);
        while head.len() < SNIFF_LEN {
            match stream.next().await {
                Some(Ok(chunk)) => head.extend_from_slice(&chunk),
                Some(Err(err)) => return Err(StorageError::Save(err)),
                None => break,
            }
        }

        let content_type = classifier::classify(&head)?;
        let object = StoredObject::new(classifier::derive_extension(file_name, &content_type));
        let dest = self.uploads_dir().join(object.file_name());

        let body = stream::once(async move { Ok::<_, io::Error>(head.freeze()) }).chain(stream);
        let size_bytes = write_limited(&dest, body, self.max_upload_bytes).await?;
        info!(
            id = %object.id,
            content_type = %content_type,
            size_bytes,
            "stored upload"
        );

        let thumbnail = self.generate_thumbnail(&object, dest).await;
        if let Err(err) = &thumbnail {
            warn!(id = %object.id, error = %err, "thumbnail generation failed");
        }

        Ok(UploadOutcome {
            object,
            content_type,
            size_bytes,
            thumbnail,
        })
    }

    /// Thumbnail `source` on a blocking thread; returns the thumbnail reference.
    async fn generate_thumbnail(
        &self,
        object: &StoredObject,
        source: PathBuf,
    ) -> Result<String, ThumbnailError> {
        let name = object.thumbnail_name();
        let dest = self.uploads_dir().join(&name);

        let (width, height) = tokio::task::spawn_blocking(move || {
            thumbnail_service::create_thumbnail(&source, &dest, THUMBNAIL_MAX_DIM)
        })
        .await
        .map_err(|err| ThumbnailError::Worker(err.to_string()))??;

        debug!(id = %object.id, width, height, "wrote thumbnail");
        Ok(name)
    }

    /// Resolve a media reference to a path that is safe to open.
    pub fn media_path(&self, reference: &str) -> StorageResult<PathBuf> {
        resolve_reference(&self.base_path, reference)
            .into_safe()
            .ok_or_else(|| StorageError::Forbidden(reference.to_string()))
    }

    /// Remove a stored object (original or thumbnail).
    ///
    /// The secret is checked before the reference is even resolved. Removing
    /// an original leaves its thumbnail in place.
    pub async fn delete_object(&self, reference: &str, presented_secret: Option<&str>) -> StorageResult<()> {
        if let Some(expected) = self.backend_secret.as_deref() {
            if presented_secret != Some(expected) {
                return Err(StorageError::Unauthorized);
            }
        }

        let path = resolve_upload_reference(&self.base_path, reference)
            .into_safe()
            .ok_or_else(|| StorageError::Forbidden(reference.to_string()))?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(reference, "deleted object");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(reference.to_string()))
            }
            Err(err) => Err(StorageError::Delete(err)),
        }
    }
}

/// Stream `body` into `dest`, refusing to write more than `limit` bytes.
///
/// - Creates missing parent directories.
/// - Writes into a hidden temporary sibling, fsyncs, then renames it over
///   `dest`, so `dest` never holds a partial copy.
/// - On any failure the temporary file is removed.
pub async fn write_limited<S>(dest: &Path, body: S, limit: u64) -> StorageResult<u64>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let parent = dest.parent().map(Path::to_path_buf).ok_or_else(|| {
        StorageError::CreateDir {
            path: dest.to_path_buf(),
            source: io::Error::new(ErrorKind::Other, "destination has no parent directory"),
        }
    })?;
    fs::create_dir_all(&parent)
        .await
        .map_err(|source| StorageError::CreateDir {
            path: parent.clone(),
            source,
        })?;

    let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
    let mut file = File::create(&tmp_path)
        .await
        .map_err(|source| StorageError::CreateFile {
            path: tmp_path.clone(),
            source,
        })?;

    let copied = copy_into(&mut file, body, limit).await;
    let result = match copied {
        Ok(size) => finish(file, &tmp_path, dest).await.map(|()| size),
        Err(err) => {
            drop(file);
            Err(err)
        }
    };

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path).await;
    }
    result
}

async fn copy_into<S>(file: &mut File, body: S, limit: u64) -> StorageResult<u64>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    pin_mut!(body);
    let mut size_bytes: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(StorageError::Save)?;
        size_bytes += chunk.len() as u64;
        if size_bytes > limit {
            return Err(StorageError::TooLarge { limit });
        }
        file.write_all(&chunk).await.map_err(StorageError::Save)?;
    }
    Ok(size_bytes)
}

async fn finish(mut file: File, tmp_path: &Path, dest: &Path) -> StorageResult<()> {
    file.flush().await.map_err(StorageError::Save)?;
    file.sync_all().await.map_err(StorageError::Save)?;
    drop(file);
    fs::rename(tmp_path, dest).await.map_err(StorageError::Save)
}
