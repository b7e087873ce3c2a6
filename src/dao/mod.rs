/// Backend-agnostic document persistence.
pub mod document_store;
/// Persisted entities per service domain.
pub mod models;
/// Storage error types shared by every backend.
pub mod storage;
