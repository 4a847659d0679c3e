//! Test kit for remote configuration clients.
//!
//! - [`TestRepository`]: a signing repository that publishes correctly
//!   chained root / timestamp / snapshot / targets documents and can rotate
//!   its root.
//! - [`MockCdn`]: an in-memory CDN with a request counter, for pull clients.

pub mod cdn;
pub mod repository;

pub use cdn::MockCdn;
pub use repository::{PublishedMetas, RepositoryKeys, SignedMeta, TestRepository, TEST_EXPIRES, TEST_NOW_MS};
