//! Image upload and media serving service.
//!
//! Uploads are sniffed, stored under generated names below a storage root,
//! and given a best-effort JPEG thumbnail; stored objects are served back
//! with immutable cache headers and can be deleted behind an optional
//! shared secret.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
