use rcfg_model::{Clock, SystemClock};
use std::sync::Arc;

/// Construction options shared by every client variant.
///
/// Trust anchors are the signed root documents the client starts from; a
/// newer root already in the cache takes precedence.
#[derive(Clone)]
pub struct ClientOptions {
    pub(crate) director_root: Vec<u8>,
    pub(crate) config_root: Vec<u8>,
    pub(crate) site: Option<String>,
    pub(crate) org_id: Option<u64>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl ClientOptions {
    pub fn new(director_root: impl Into<Vec<u8>>, config_root: impl Into<Vec<u8>>) -> Self {
        Self {
            director_root: director_root.into(),
            config_root: config_root.into(),
            site: None,
            org_id: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Site the client talks to, e.g. `datadoghq.com`.
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    /// Require every director target to belong to `org_id`. Without it the
    /// per-target ownership check is skipped.
    pub fn with_org_id(mut self, org_id: u64) -> Self {
        self.org_id = Some(org_id);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn site(&self) -> Option<&str> {
        self.site.as_deref()
    }

    pub fn org_id(&self) -> Option<u64> {
        self.org_id
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("site", &self.site)
            .field("org_id", &self.org_id)
            .finish_non_exhaustive()
    }
}
