//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests of the pipeline, including:
//! - Building one HTTP client per configured proxy (or a direct one)
//! - Round-robin proxy rotation
//! - Random user agent selection per request
//! - Status classification (only 2xx counts as success)

use crate::config::FetchConfig;
use crate::{HarvestError, Result};
use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, Proxy, RequestBuilder};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Turns a proxy entry into a URL; bare `host:port` entries are HTTP proxies
pub fn proxy_url(entry: &str) -> String {
    let entry = entry.trim();
    if entry.contains("://") {
        entry.to_string()
    } else {
        format!("http://{}", entry)
    }
}

/// Builds an HTTP client with the configured timeouts
///
/// # Arguments
///
/// * `config` - The fetch configuration
/// * `proxy` - Optional proxy entry every request of this client goes through
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig, proxy: Option<&str>) -> Result<Client> {
    let timeout = Duration::from_millis(config.request_timeout_ms);

    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .gzip(true)
        .brotli(true);

    if let Some(entry) = proxy {
        builder = builder.proxy(Proxy::all(proxy_url(entry))?);
    }

    Ok(builder.build()?)
}

/// Pool of user agent strings
#[derive(Debug, Clone)]
pub struct IdentityPool {
    agents: Vec<String>,
}

impl IdentityPool {
    pub fn new(agents: &[String]) -> Self {
        Self {
            agents: agents
                .iter()
                .map(|agent| agent.trim().to_string())
                .filter(|agent| !agent.is_empty())
                .collect(),
        }
    }

    /// Picks a user agent uniformly at random
    pub fn pick(&self) -> Option<&str> {
        self.agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Hands out clients in round-robin order, one client per proxy
#[derive(Debug)]
pub struct ProxyRotator {
    clients: Vec<Client>,
    next: AtomicUsize,
}

impl ProxyRotator {
    /// Builds one client per proxy, or a single direct client if there are none
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let clients = if config.proxies.is_empty() {
            vec![build_http_client(config, None)?]
        } else {
            config
                .proxies
                .iter()
                .map(|proxy| build_http_client(config, Some(proxy)))
                .collect::<Result<Vec<_>>>()?
        };

        Ok(Self {
            clients,
            next: AtomicUsize::new(0),
        })
    }

    /// Returns the index and client for the next request
    pub fn next_client(&self) -> (usize, &Client) {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        (index, &self.clients[index])
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// HTTP fetcher shared by the page and asset stages
#[derive(Debug)]
pub struct HttpFetcher {
    rotator: ProxyRotator,
    identities: IdentityPool,
    accept_language: String,
    asset_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let identities = IdentityPool::new(&config.user_agents);
        if identities.is_empty() {
            return Err(HarvestError::InvalidArgument(
                "user agent pool is empty".to_string(),
            ));
        }

        Ok(Self {
            rotator: ProxyRotator::new(config)?,
            identities,
            accept_language: config.accept_language.clone(),
            asset_timeout: Duration::from_millis(config.asset_timeout_ms),
        })
    }

    fn request(&self, url: &str) -> RequestBuilder {
        let (_, client) = self.rotator.next_client();
        let mut request = client.get(url);
        if let Some(agent) = self.identities.pick() {
            request = request.header(USER_AGENT, agent);
        }
        request
    }

    /// Fetches a page as text in a single attempt
    pub async fn get_page(&self, url: &str) -> Result<String> {
        let response = self
            .request(url)
            .header(ACCEPT, ACCEPT_HTML)
            .header(ACCEPT_LANGUAGE, &self.accept_language)
            .send()
            .await
            .map_err(|source| HarvestError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| HarvestError::Http {
            url: url.to_string(),
            source,
        })
    }

    /// Fetches a binary asset in a single attempt
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .request(url)
            .timeout(self.asset_timeout)
            .send()
            .await
            .map_err(|source| HarvestError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|source| HarvestError::Http {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}
