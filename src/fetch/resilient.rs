use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::affinity::{AffinityStore, InMemoryAffinityStore};
use super::sleeper::{Sleeper, TokioSleeper};
use super::transport::{HttpTransport, ReqwestTransport};
use crate::config::FetchConfig;
use crate::errors::{FetchError, FetchResult};
use crate::utils::UrlUtils;

/// Per-call request options
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Overrides the configured `Accept` value
    pub accept: Option<String>,
    /// Extra headers; `Accept`, `Origin` and `User-Agent` are always replaced
    pub headers: Vec<(String, String)>,
}

impl FetchOptions {
    pub fn accept<S: Into<String>>(accept: S) -> Self {
        Self {
            accept: Some(accept.into()),
            headers: Vec::new(),
        }
    }
}

/// Retrieves a resource directly, then through forwarding proxies, in
/// exponential-backoff rounds
///
/// A round is: the direct URL, the proxy that last worked for this URL (if
/// any), then every configured proxy in order. Attempts never overlap. Only
/// exhaustion or cancellation is reported to the caller.
pub struct ResilientFetcher {
    config: FetchConfig,
    transport: Arc<dyn HttpTransport>,
    sleeper: Arc<dyn Sleeper>,
    affinity: Arc<dyn AffinityStore>,
}

impl ResilientFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            transport: Arc::new(ReqwestTransport::default()),
            sleeper: Arc::new(TokioSleeper),
            affinity: Arc::new(InMemoryAffinityStore::new()),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_affinity_store(mut self, affinity: Arc<dyn AffinityStore>) -> Self {
        self.affinity = affinity;
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch `url`, returning the full body of the first 2xx response
    pub async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> FetchResult<Bytes> {
        let headers = self.normalized_headers(options);
        let rounds = self.config.total_rounds();
        let display_url = UrlUtils::obfuscate_credentials(url);

        for round in 0..rounds {
            if cancel.is_cancelled() {
                return Err(cancelled(url));
            }

            if let Some(body) = self.run_round(url, &headers, cancel).await? {
                return Ok(body);
            }

            if round + 1 < rounds {
                let delay = self.config.backoff_for_round(round);
                warn!(
                    "Fetch round {}/{} failed for {}, retrying in {:?}",
                    round + 1,
                    rounds,
                    display_url,
                    delay
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled(url)),
                    _ = self.sleeper.sleep(delay) => {}
                }
            }
        }

        warn!("All {} fetch rounds failed for {}", rounds, display_url);
        Err(FetchError::Exhausted {
            url: url.to_string(),
            rounds,
        })
    }

    async fn run_round(
        &self,
        url: &str,
        headers: &[(String, String)],
        cancel: &CancellationToken,
    ) -> FetchResult<Option<Bytes>> {
        if let Some(body) = self.attempt(url, url, "direct", headers, cancel).await? {
            return Ok(Some(body));
        }

        let cached = self.affinity.get(url).await;
        if let Some(proxy) = &cached {
            let target = UrlUtils::build_proxy_url(proxy, url);
            match self.attempt(url, &target, proxy, headers, cancel).await? {
                Some(body) => return Ok(Some(body)),
                None => {
                    debug!("Evicting cached proxy {} for {}", proxy, UrlUtils::obfuscate_credentials(url));
                    self.affinity.evict(url).await;
                }
            }
        }

        for proxy in &self.config.proxies {
            if cached.as_deref() == Some(proxy.as_str()) {
                continue;
            }

            let target = UrlUtils::build_proxy_url(proxy, url);
            if let Some(body) = self.attempt(url, &target, proxy, headers, cancel).await? {
                info!("Fetched {} via proxy {}", UrlUtils::obfuscate_credentials(url), proxy);
                self.affinity.insert(url, proxy).await;
                return Ok(Some(body));
            }
        }

        Ok(None)
    }

    /// One bounded request; `Ok(None)` means this route failed
    async fn attempt(
        &self,
        url: &str,
        target: &str,
        route: &str,
        headers: &[(String, String)],
        cancel: &CancellationToken,
    ) -> FetchResult<Option<Bytes>> {
        let request = self.transport.get(target, headers);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(cancelled(url)),
            result = tokio::time::timeout(self.config.request_timeout, request) => {
                let display_url = UrlUtils::obfuscate_credentials(url);
                match result {
                    Ok(Ok(response)) if response.is_success() => Ok(Some(response.body)),
                    Ok(Ok(response)) => {
                        debug!("{} ({}) returned HTTP {}", display_url, route, response.status);
                        Ok(None)
                    }
                    Ok(Err(e)) => {
                        debug!("{} ({}) failed: {}", display_url, route, e);
                        Ok(None)
                    }
                    Err(_) => {
                        debug!(
                            "{} ({}) timed out after {:?}",
                            display_url, route, self.config.request_timeout
                        );
                        Ok(None)
                    }
                }
            }
        }
    }

    fn normalized_headers(&self, options: &FetchOptions) -> Vec<(String, String)> {
        const FORCED: [&str; 3] = ["accept", "origin", "user-agent"];

        let mut headers: Vec<(String, String)> = options
            .headers
            .iter()
            .filter(|(name, _)| !FORCED.contains(&name.to_ascii_lowercase().as_str()))
            .cloned()
            .collect();

        let accept = options
            .accept
            .clone()
            .unwrap_or_else(|| self.config.accept.clone());
        headers.push(("Accept".to_string(), accept));
        headers.push(("Origin".to_string(), self.config.origin.clone()));
        headers.push(("User-Agent".to_string(), self.config.user_agent.clone()));
        headers
    }
}

fn cancelled(url: &str) -> FetchError {
    FetchError::Cancelled {
        url: url.to_string(),
    }
}
