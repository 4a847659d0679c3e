use std::path::PathBuf;

/// Configuration for where to keep the metadata cache database.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// File-backed database at the given path. Parent directories are created.
    File(PathBuf),
    /// In-memory database (no filesystem). Useful for tests.
    InMemory,
}
