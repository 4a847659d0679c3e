use rcfg_model::{ConfigPathError, RemoteError, Repository, TransportError};
use rcfg_storage::StoreError;
use rcfg_tuf::TufError;
use thiserror::Error;

/// Errors returned by [`Client`](crate::Client) updates and reads.
#[derive(Error, Debug)]
pub enum UptaneError {
    /// The backend could not be reached.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A repository's metadata chain was rejected during an update.
    #[error("{context}: {source}")]
    Protocol {
        repository: Repository,
        context: String,
        source: TufError,
    },

    /// Director and config repositories disagree about a target.
    #[error("cross-repository mismatch: {0}")]
    Mismatch(String),

    #[error("org identity check failed: {0}")]
    OrgIdentity(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Verification of already stored metadata or targets failed.
    #[error("verification failed: {0}")]
    Verification(TufError),

    #[error(transparent)]
    ConfigPath(#[from] ConfigPathError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("invalid client options: {0}")]
    InvalidOptions(String),

    #[error("update cancelled")]
    Cancelled,
}

impl UptaneError {
    /// Wrap an engine failure during the update of `repository`.
    pub(crate) fn protocol(repository: Repository, context: impl Into<String>, e: TufError) -> Self {
        match e {
            TufError::Remote(RemoteError::Transport(t)) => Self::Transport(t),
            TufError::Remote(RemoteError::Cancelled) => Self::Cancelled,
            source => Self::Protocol {
                repository,
                context: context.into(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::Storage(StoreError::NotFound(_)) => true,
            Self::Protocol { source, .. } | Self::Verification(source) => source.is_not_found(),
            _ => false,
        }
    }

    /// Which repository failed, for protocol errors.
    pub fn repository(&self) -> Option<Repository> {
        match self {
            Self::Protocol { repository, .. } => Some(*repository),
            _ => None,
        }
    }
}

impl From<TufError> for UptaneError {
    fn from(e: TufError) -> Self {
        match e {
            TufError::Remote(RemoteError::Transport(t)) => Self::Transport(t),
            TufError::Remote(RemoteError::Cancelled) => Self::Cancelled,
            e if e.is_not_found() => Self::NotFound(e.to_string()),
            e => Self::Verification(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcfg_model::Role;

    #[test]
    fn test_protocol_keeps_transport_errors_unwrapped() {
        let transport = TransportError::Status {
            status: 503,
            path: "director/timestamp.json".to_string(),
        };
        let err = UptaneError::protocol(
            Repository::Director,
            "failed updating director repository",
            TufError::Remote(RemoteError::Transport(transport.clone())),
        );
        assert!(matches!(err, UptaneError::Transport(ref t) if *t == transport));

        let err = UptaneError::protocol(
            Repository::Config,
            "could not update config repository",
            TufError::MissingMeta(Role::Snapshot),
        );
        assert_eq!(err.repository(), Some(Repository::Config));
        assert!(err.to_string().starts_with("could not update config repository"));
    }

    #[test]
    fn test_not_found_classification() {
        assert!(UptaneError::from(TufError::UnknownTarget("p".into())).is_not_found());
        assert!(UptaneError::Storage(StoreError::NotFound("root".into())).is_not_found());
        assert!(!UptaneError::Mismatch("x".into()).is_not_found());
        assert!(matches!(
            UptaneError::from(TufError::Remote(RemoteError::Cancelled)),
            UptaneError::Cancelled
        ));
    }
}
