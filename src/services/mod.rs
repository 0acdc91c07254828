//! Storage pipeline: sniffing, path guarding, writing and thumbnailing.

pub mod classifier;
pub mod paths;
pub mod storage_service;
pub mod thumbnail_service;
