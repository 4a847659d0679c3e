//! Where candidate metadata and targets come from.
//!
//! A [`RemoteSource`] hands the verification engines one [`RemoteStore`] per
//! repository. The push variant serves what the caller supplied with the
//! update; the CDN variant fetches over a [`cdn::Transport`].

pub mod cdn;
pub mod push;

use rcfg_model::{RemoteStore, Repository};
use std::sync::Arc;

pub use cdn::{CdnRemoteStore, CdnSource, HttpTransport, Transport};
pub use push::{PushRemoteStore, PushSource};

pub trait RemoteSource: Send + Sync {
    fn remote(&self, repository: Repository) -> Arc<dyn RemoteStore>;

    /// Whether the snapshot org UUID is checked against the stored binding.
    fn verifies_org(&self) -> bool;

    /// Extra context for a config repository update failure.
    fn config_context(&self) -> Option<String> {
        None
    }

    /// Called once an update finished, successfully or not.
    fn finish(&self) {}

    /// Drop data supplied for a failed update.
    fn reset(&self) {}
}
