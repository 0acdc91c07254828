//! Core data models for the media store.
//!
//! There is no catalog: a stored object is fully described by its generated
//! id and extension, and the filesystem under the storage root is the index.

pub mod object;
pub mod responses;
