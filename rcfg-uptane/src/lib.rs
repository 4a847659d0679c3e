//! rcfg Uptane
//!
//! Secure remote configuration client. Two independently signed TUF
//! repositories are verified against each other before any configuration
//! is served:
//! - the **director** repository says which configurations apply to this host;
//! - the **config** repository vouches for the content of every configuration.
//!
//! [`CoreAgentClient`] consumes pushed [`UpdatePayload`]s; [`CdnClient`]
//! pulls from a CDN. Both share the same verification and persistence logic.

pub mod client;
pub mod error;
pub mod options;
pub mod org;
pub mod payload;
pub mod remote;

pub use client::{CdnClient, Client, CoreAgentClient, VERIFICATION_TTL};
pub use error::UptaneError;
pub use options::ClientOptions;
pub use org::{OrgUuidProvider, SnapshotCustom};
pub use payload::{RepositoryMetas, UpdatePayload, VersionedMeta};
pub use remote::{HttpTransport, RemoteSource, Transport};
