//! Loading lifecycle of the road network.
//!
//! The network is published through a `watch` channel so request handlers can
//! take a non-blocking snapshot, and anything that needs the network can await
//! readiness with a deadline instead of polling.

use std::{path::PathBuf, sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};

use crate::{
    geojson,
    network::{NetworkError, RoadNetwork},
};

pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("failed to download {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decompress {url}: {source}")]
    Decompress {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("loader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("road network not ready after {0:?}")]
    Timeout(Duration),
    #[error("road network failed to load: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkSource {
    Files { nodes: PathBuf, links: PathBuf },
    Urls { nodes: String, links: String },
}

impl NetworkSource {
    /// `http(s)://` locations are downloaded, anything else is read from disk.
    pub fn from_locations(nodes: &str, links: &str) -> Self {
        let is_url = |s: &str| s.starts_with("http://") || s.starts_with("https://");
        if is_url(nodes) && is_url(links) {
            NetworkSource::Urls {
                nodes: nodes.to_string(),
                links: links.to_string(),
            }
        } else {
            NetworkSource::Files {
                nodes: PathBuf::from(nodes),
                links: PathBuf::from(links),
            }
        }
    }

    async fn fetch(&self, http: &reqwest::Client) -> Result<RoadNetwork, LoaderError> {
        match self {
            NetworkSource::Files { nodes, links } => {
                let (nodes, links) = (nodes.clone(), links.clone());
                let network =
                    tokio::task::spawn_blocking(move || RoadNetwork::from_files(nodes, links))
                        .await??;
                Ok(network)
            }
            NetworkSource::Urls { nodes, links } => {
                let (node_bytes, link_bytes) =
                    tokio::try_join!(download(http, nodes), download(http, links))?;
                let network = tokio::task::spawn_blocking(move || {
                    let nodes = geojson::parse_nodes(node_bytes.as_slice()).map_err(NetworkError::from)?;
                    let links = geojson::parse_links(link_bytes.as_slice()).map_err(NetworkError::from)?;
                    RoadNetwork::from_records(nodes.records, links.records)
                })
                .await??;
                Ok(network)
            }
        }
    }
}

async fn download(http: &reqwest::Client, url: &str) -> Result<Vec<u8>, LoaderError> {
    let http_err = |source| LoaderError::Http {
        url: url.to_string(),
        source,
    };
    let bytes = http
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(http_err)?
        .bytes()
        .await
        .map_err(http_err)?;
    geojson::decompress_if_needed(bytes.to_vec()).map_err(|source| LoaderError::Decompress {
        url: url.to_string(),
        source,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(3),
        }
    }
}

#[derive(Clone)]
pub enum LoadState {
    Idle,
    Loading { attempt: u32 },
    Ready(Arc<RoadNetwork>),
    Failed { reason: String },
}

impl LoadState {
    pub fn label(&self) -> &'static str {
        match self {
            LoadState::Idle => "idle",
            LoadState::Loading { .. } => "loading",
            LoadState::Ready(_) => "ready",
            LoadState::Failed { .. } => "failed",
        }
    }
}

impl std::fmt::Debug for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadState::Loading { attempt } => write!(f, "Loading(attempt {attempt})"),
            LoadState::Failed { reason } => write!(f, "Failed({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Shared handle on the road network's load state.
#[derive(Clone)]
pub struct NetworkHandle {
    state: Arc<watch::Sender<LoadState>>,
    http: reqwest::Client,
}

impl Default for NetworkHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LoadState::Idle);
        Self {
            state: Arc::new(tx),
            http: reqwest::Client::new(),
        }
    }

    /// A handle that is already `Ready`.
    pub fn ready(network: RoadNetwork) -> Self {
        let handle = Self::new();
        handle.state.send_replace(LoadState::Ready(Arc::new(network)));
        handle
    }

    pub fn current(&self) -> LoadState {
        self.state.borrow().clone()
    }

    pub fn network(&self) -> Option<Arc<RoadNetwork>> {
        match &*self.state.borrow() {
            LoadState::Ready(network) => Some(Arc::clone(network)),
            _ => None,
        }
    }

    /// Load the network, retrying transient failures per `policy`. The final
    /// state is `Ready` or `Failed`.
    pub async fn load(
        &self,
        source: &NetworkSource,
        policy: RetryPolicy,
    ) -> Result<Arc<RoadNetwork>, LoaderError> {
        let attempts = policy.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            self.state.send_replace(LoadState::Loading { attempt });
            match source.fetch(&self.http).await {
                Ok(network) => {
                    let network = Arc::new(network);
                    let stats = network.stats();
                    tracing::info!(
                        "road network ready: {} nodes, {} links (attempt {attempt})",
                        stats.node_count,
                        stats.link_count
                    );
                    self.state.send_replace(LoadState::Ready(Arc::clone(&network)));
                    return Ok(network);
                }
                Err(err) => {
                    tracing::warn!("road network load attempt {attempt}/{attempts} failed: {err}");
                    last_error = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(policy.backoff).await;
                    }
                }
            }
        }

        let err = last_error.unwrap_or_else(|| LoaderError::Failed("no attempt made".into()));
        tracing::error!("giving up on road network: {err}");
        self.state.send_replace(LoadState::Failed {
            reason: err.to_string(),
        });
        Err(err)
    }

    pub fn spawn_load(&self, source: NetworkSource, policy: RetryPolicy) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            // Outcome is published through the state channel.
            let _ = handle.load(&source, policy).await;
        })
    }

    /// Wait until the network is `Ready`, failing fast on `Failed`.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<Arc<RoadNetwork>, LoaderError> {
        let mut rx = self.state.subscribe();
        let wait = async move {
            loop {
                let state = rx.borrow_and_update().clone();
                match state {
                    LoadState::Ready(network) => return Ok(network),
                    LoadState::Failed { reason } => return Err(LoaderError::Failed(reason)),
                    LoadState::Idle | LoadState::Loading { .. } => {}
                }
                if rx.changed().await.is_err() {
                    return Err(LoaderError::Failed("load state channel closed".into()));
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| LoaderError::Timeout(timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODES: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{"NODE_ID":1},"geometry":{"type":"Point","coordinates":[126.55,33.45]}},
        {"type":"Feature","properties":{"NODE_ID":2},"geometry":{"type":"Point","coordinates":[126.551,33.451]}}
    ]}"#;
    const LINKS: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{"LINK_ID":10,"F_NODE":1,"T_NODE":2},
         "geometry":{"type":"LineString","coordinates":[[126.55,33.45],[126.551,33.451]]}}
    ]}"#;

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(5),
        }
    }

    #[test]
    fn locations_pick_source_kind() {
        assert!(matches!(
            NetworkSource::from_locations("https://x/n.geojson", "https://x/l.geojson"),
            NetworkSource::Urls { .. }
        ));
        assert!(matches!(
            NetworkSource::from_locations("data/NODE_JSON.geojson", "data/LINK_JSON.geojson"),
            NetworkSource::Files { .. }
        ));
    }

    #[tokio::test]
    async fn loads_from_files_and_becomes_ready() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = dir.path().join("NODE_JSON.geojson");
        let links = dir.path().join("LINK_JSON.geojson");
        std::fs::write(&nodes, NODES).unwrap();
        std::fs::write(&links, LINKS).unwrap();

        let handle = NetworkHandle::new();
        assert_eq!(handle.current().label(), "idle");

        let source = NetworkSource::Files { nodes, links };
        let network = handle.load(&source, quick_retry()).await.unwrap();
        assert_eq!(network.stats().link_count, 1);
        assert_eq!(handle.current().label(), "ready");
        assert!(handle.network().is_some());
    }

    #[tokio::test]
    async fn exhausts_retries_then_fails() {
        let handle = NetworkHandle::new();
        let source = NetworkSource::Files {
            nodes: PathBuf::from("/nonexistent/NODE_JSON.geojson"),
            links: PathBuf::from("/nonexistent/LINK_JSON.geojson"),
        };
        let err = handle.load(&source, quick_retry()).await.unwrap_err();
        assert!(matches!(err, LoaderError::Network(NetworkError::GeoJson(_))));
        assert_eq!(handle.current().label(), "failed");

        let waited = handle.wait_ready(Duration::from_millis(50)).await;
        assert!(matches!(waited, Err(LoaderError::Failed(_))));
    }

    #[tokio::test]
    async fn wait_ready_times_out_while_idle() {
        let handle = NetworkHandle::new();
        let err = handle.wait_ready(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, LoaderError::Timeout(_)));
    }

    #[tokio::test]
    async fn wait_ready_observes_background_load() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = dir.path().join("n.geojson");
        let links = dir.path().join("l.geojson");
        std::fs::write(&nodes, NODES).unwrap();
        std::fs::write(&links, LINKS).unwrap();

        let handle = NetworkHandle::new();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_ready(DEFAULT_READY_TIMEOUT).await })
        };
        handle
            .spawn_load(NetworkSource::Files { nodes, links }, quick_retry())
            .await
            .unwrap();

        let network = waiter.await.unwrap().unwrap();
        assert_eq!(network.stats().node_count, 2);
    }
}
