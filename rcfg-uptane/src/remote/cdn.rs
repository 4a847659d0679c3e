//! Pull variant: documents and targets fetched from a CDN.
//!
//! Layout under the base URL: `{repository}/{document}` for metadata and
//! `{repository}/targets/{path}` for target bytes.

use super::RemoteSource;
use async_trait::async_trait;
use rcfg_model::{RemoteError, RemoteStore, Repository, TransportError};
use reqwest::{StatusCode, Url};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Fetches raw bytes by path relative to the backend root.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fails with [`RemoteError::NotFound`] when the backend has nothing at `path`.
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, RemoteError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TransportError::Request(format!("invalid base URL '{}': {}", base_url, e)))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: api_key.to_string(),
        })
    }

    /// Transport for the remote configuration CDN of `site`.
    pub fn for_site(site: &str, api_key: &str) -> Result<Self, TransportError> {
        Self::new(&format!("https://remote-config.{}/", site), api_key)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| TransportError::Request(format!("invalid path '{}': {}", path, e)))?;
        let response = self
            .http
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            }
            .into());
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(body.to_vec())
    }
}

/// One repository's view of the CDN. Every fetch races the bound
/// cancellation token.
pub struct CdnRemoteStore {
    repository: Repository,
    transport: Arc<dyn Transport>,
    token: Mutex<CancellationToken>,
}

impl CdnRemoteStore {
    pub fn new(repository: Repository, transport: Arc<dyn Transport>) -> Self {
        Self {
            repository,
            transport,
            token: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn bind(&self, token: CancellationToken) {
        *self.token.lock().unwrap_or_else(|p| p.into_inner()) = token;
    }

    async fn fetch(&self, path: String) -> Result<Vec<u8>, RemoteError> {
        let token = self.token.lock().unwrap_or_else(|p| p.into_inner()).clone();
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(RemoteError::Cancelled),
            result = self.transport.fetch(&path) => result,
        }
    }
}

#[async_trait]
impl RemoteStore for CdnRemoteStore {
    async fn get_meta(&self, name: &str) -> Result<Vec<u8>, RemoteError> {
        self.fetch(format!("{}/{}", self.repository, name)).await
    }

    async fn get_target(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.fetch(format!("{}/targets/{}", self.repository, path)).await
    }
}

/// Both repositories' CDN stores over one transport.
pub struct CdnSource {
    director: Arc<CdnRemoteStore>,
    config: Arc<CdnRemoteStore>,
}

impl CdnSource {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            director: Arc::new(CdnRemoteStore::new(Repository::Director, transport.clone())),
            config: Arc::new(CdnRemoteStore::new(Repository::Config, transport)),
        }
    }

    /// Bind the cancellation token of the update in flight.
    pub fn bind(&self, token: CancellationToken) {
        self.director.bind(token.clone());
        self.config.bind(token);
    }
}

impl RemoteSource for CdnSource {
    fn remote(&self, repository: Repository) -> Arc<dyn RemoteStore> {
        match repository {
            Repository::Director => self.director.clone(),
            Repository::Config => self.config.clone(),
        }
    }

    fn verifies_org(&self) -> bool {
        false
    }

    fn finish(&self) {
        // Reads after the update must not observe its token.
        self.bind(CancellationToken::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct StaticTransport(BTreeMap<String, Vec<u8>>);

    #[async_trait]
    impl Transport for StaticTransport {
        async fn fetch(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| RemoteError::NotFound(path.to_string()))
        }
    }

    fn transport() -> Arc<dyn Transport> {
        Arc::new(StaticTransport(
            [
                ("director/timestamp.json".to_string(), b"ts".to_vec()),
                ("config/targets/employee/ASM/a/config".to_string(), b"cfg".to_vec()),
            ]
            .into(),
        ))
    }

    #[tokio::test]
    async fn test_paths_are_namespaced_by_repository() {
        let source = CdnSource::new(transport());
        let director = source.remote(Repository::Director);
        let config = source.remote(Repository::Config);

        assert_eq!(director.get_meta("timestamp.json").await.unwrap(), b"ts".to_vec());
        assert!(config.get_meta("timestamp.json").await.unwrap_err().is_not_found());
        assert_eq!(config.get_target("employee/ASM/a/config").await.unwrap(), b"cfg".to_vec());
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let source = CdnSource::new(transport());
        let token = CancellationToken::new();
        source.bind(token.clone());
        token.cancel();

        let err = source
            .remote(Repository::Director)
            .get_meta("timestamp.json")
            .await
            .unwrap_err();
        assert_eq!(err, RemoteError::Cancelled);

        source.finish();
        assert!(source
            .remote(Repository::Director)
            .get_meta("timestamp.json")
            .await
            .is_ok());
    }

    #[test]
    fn test_http_transport_urls() {
        let transport = HttpTransport::for_site("datadoghq.eu", "key").unwrap();
        assert_eq!(transport.base_url().as_str(), "https://remote-config.datadoghq.eu/");
        assert_eq!(
            transport.base_url().join("director/3.root.json").unwrap().as_str(),
            "https://remote-config.datadoghq.eu/director/3.root.json"
        );
        assert!(HttpTransport::new("not a url", "key").is_err());
    }
}
