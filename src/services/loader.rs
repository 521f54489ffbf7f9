//! Load sequencing: playlist first (required), then guide (optional)

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::grouping::group_channels;
use super::state_manager::{LoadState, LoadStateManager};
use crate::config::{Config, LoaderConfig, SourcesConfig};
use crate::errors::{AppError, AppResult, FetchError, GuideError};
use crate::fetch::{FetchOptions, ResilientFetcher, Sleeper, TokioSleeper};
use crate::ingestor::{parse_playlist, GuideParser};
use crate::models::{LoadedCatalog, Playlist, Program};
use crate::utils::UrlUtils;

fn from_fetch(e: FetchError) -> AppError {
    match e {
        FetchError::Cancelled { .. } => AppError::Cancelled,
        other => AppError::Retrieval(other),
    }
}

/// Runs load cycles and keeps the last successful catalog
pub struct GuideLoader {
    sources: SourcesConfig,
    settings: LoaderConfig,
    guide_accept: String,
    fetcher: ResilientFetcher,
    guide_parser: GuideParser,
    sleeper: Arc<dyn Sleeper>,
    state: LoadStateManager,
    catalog: RwLock<LoadedCatalog>,
}

impl GuideLoader {
    pub fn new(config: &Config) -> Self {
        Self {
            sources: config.sources.clone(),
            settings: config.loader.clone(),
            guide_accept: config.guide.accept.clone(),
            fetcher: ResilientFetcher::new(config.fetch.clone()),
            guide_parser: GuideParser::new(&config.guide),
            sleeper: Arc::new(TokioSleeper),
            state: LoadStateManager::new(),
            catalog: RwLock::new(LoadedCatalog::default()),
        }
    }

    pub fn with_fetcher(mut self, fetcher: ResilientFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replaces the delay used between playlist attempts and guide parse
    /// attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.guide_parser = self.guide_parser.with_sleeper(sleeper.clone());
        self.sleeper = sleeper;
        self
    }

    pub fn with_state_manager(mut self, state: LoadStateManager) -> Self {
        self.state = state;
        self
    }

    pub fn state_manager(&self) -> &LoadStateManager {
        &self.state
    }

    /// Snapshot of the last completed load
    pub async fn catalog(&self) -> LoadedCatalog {
        self.catalog.read().await.clone()
    }

    /// Run one load cycle
    ///
    /// Only playlist problems fail the load. Guide retrieval failure keeps the
    /// programs from the previous cycle.
    pub async fn load(&self, cancel: &CancellationToken) -> AppResult<LoadedCatalog> {
        let result = self.run(cancel).await;

        match &result {
            Ok(catalog) => info!(
                "Load complete: {} channels in {} groups, {} programs",
                catalog.channels.len(),
                catalog.groups.len(),
                catalog.programs.len()
            ),
            Err(AppError::Cancelled) => info!("Load cancelled"),
            Err(e) => {
                error!("Load failed: {}", e);
                self.publish(
                    cancel,
                    LoadState::Failed {
                        message: e.to_string(),
                        retryable: e.is_retryable(),
                    },
                )
                .await;
            }
        }

        result
    }

    async fn run(&self, cancel: &CancellationToken) -> AppResult<LoadedCatalog> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        self.state.start_load().await;

        let playlist = self.load_playlist(cancel).await?;

        let programs = match self.resolve_guide_url(&playlist) {
            Some(guide_url) if self.settings.guide_enabled => {
                self.publish(cancel, LoadState::LoadingGuide).await;
                self.load_guide(&guide_url, cancel).await?
            }
            _ => {
                info!("Guide disabled or not configured, skipping");
                None
            }
        };

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let catalog = {
            let mut current = self.catalog.write().await;
            let programs = programs.unwrap_or_else(|| current.programs.clone());
            *current = LoadedCatalog {
                groups: group_channels(&playlist.channels),
                channels: playlist.channels,
                programs,
                loaded_at: Some(Utc::now()),
            };
            current.clone()
        };

        self.state
            .update(LoadState::Ready {
                channels: catalog.channels.len(),
                programs: catalog.programs.len(),
            })
            .await;

        Ok(catalog)
    }

    fn resolve_guide_url(&self, playlist: &Playlist) -> Option<String> {
        self.sources
            .guide_url
            .clone()
            .or_else(|| playlist.guide_url.clone())
    }

    async fn load_playlist(&self, cancel: &CancellationToken) -> AppResult<Playlist> {
        let max = self.settings.playlist_retries.saturating_add(1);
        let url = &self.sources.playlist_url;
        let mut last_error = String::new();

        for attempt in 1..=max {
            if attempt > 1 {
                self.publish(cancel, LoadState::LoadingChannels { attempt }).await;
            }
            info!(
                "Loading channels from {} (attempt {}/{})",
                UrlUtils::obfuscate_credentials(url),
                attempt,
                max
            );

            match self.fetch_playlist(url, cancel).await {
                Ok(playlist) => return Ok(playlist),
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => last_error = e.to_string(),
            }

            if attempt < max {
                warn!(
                    "Channel load attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt, max, last_error, self.settings.playlist_retry_delay
                );
                self.publish(
                    cancel,
                    LoadState::RetryingChannels {
                        attempt,
                        max,
                        message: last_error.clone(),
                    },
                )
                .await;

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AppError::Cancelled),
                    _ = self.sleeper.sleep(self.settings.playlist_retry_delay) => {}
                }
            }
        }

        Err(AppError::PlaylistUnavailable {
            attempts: max,
            last_error,
        })
    }

    async fn fetch_playlist(&self, url: &str, cancel: &CancellationToken) -> AppResult<Playlist> {
        let body = self
            .fetcher
            .fetch(url, &FetchOptions::default(), cancel)
            .await
            .map_err(from_fetch)?;

        let text = String::from_utf8_lossy(&body);
        Ok(parse_playlist(&text)?)
    }

    /// `Ok(None)` means the guide could not be retrieved and the previous
    /// programs should be kept
    async fn load_guide(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Option<Vec<Program>>> {
        info!("Loading guide from {}", UrlUtils::obfuscate_credentials(url));

        let body = match self
            .fetcher
            .fetch(url, &FetchOptions::accept(self.guide_accept.clone()), cancel)
            .await
        {
            Ok(body) => body,
            Err(FetchError::Cancelled { .. }) => return Err(AppError::Cancelled),
            Err(e) => {
                warn!("Guide unavailable, keeping previous programs: {}", e);
                return Ok(None);
            }
        };

        let text = String::from_utf8_lossy(&body);
        match self.guide_parser.try_parse(&text, Utc::now(), cancel).await {
            Ok(programs) => Ok(Some(programs)),
            Err(GuideError::Cancelled) => Err(AppError::Cancelled),
            Err(e) => {
                warn!("Guide parsing failed, continuing without programs: {}", e);
                Ok(Some(Vec::new()))
            }
        }
    }

    async fn publish(&self, cancel: &CancellationToken, state: LoadState) {
        if !cancel.is_cancelled() {
            self.state.update(state).await;
        }
    }
}
