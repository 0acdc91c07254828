//! Names of stored objects and their derived thumbnails.

use std::fmt;
use uuid::Uuid;

/// Sub-directory of the storage root that holds every upload.
pub const UPLOADS_DIR: &str = "uploads";

/// Suffix appended to an object id to name its thumbnail.
pub const THUMBNAIL_SUFFIX: &str = ".thumb.jpg";

/// Opaque, randomly generated identifier of a stored object.
///
/// Backed by a v4 UUID (122 random bits), so ids can be minted from any
/// request without coordination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectId(Uuid);

impl ObjectId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A stored original: `<id><ext>` inside the uploads directory.
///
/// Objects are immutable once written; the only lifecycle event after
/// creation is deletion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// Generated identifier.
    pub id: ObjectId,

    /// Lower-cased extension including the leading dot (e.g. `.png`).
    pub extension: String,
}

impl StoredObject {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            id: ObjectId::generate(),
            extension: extension.into(),
        }
    }

    /// External reference of the original, as used in `/media/<ref>`.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.id, self.extension)
    }

    /// External reference of the derived thumbnail.
    pub fn thumbnail_name(&self) -> String {
        format!("{}{}", self.id, THUMBNAIL_SUFFIX)
    }

    /// Storage key relative to the storage root (`uploads/<id><ext>`).
    pub fn key(&self) -> String {
        format!("{}/{}", UPLOADS_DIR, self.file_name())
    }
}
