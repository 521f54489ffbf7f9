use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

pub type StateSender = broadcast::Sender<LoadProgress>;
pub type StateReceiver = broadcast::Receiver<LoadProgress>;

/// Where a load cycle currently is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadState {
    Idle,
    LoadingChannels { attempt: u32 },
    RetryingChannels { attempt: u32, max: u32, message: String },
    LoadingGuide,
    Ready { channels: usize, programs: usize },
    Failed { message: String, retryable: bool },
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready { .. } | Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadProgress {
    pub state: LoadState,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for LoadProgress {
    fn default() -> Self {
        Self {
            state: LoadState::Idle,
            started_at: None,
            updated_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Latest load state plus a broadcast of every transition
#[derive(Clone)]
pub struct LoadStateManager {
    current: Arc<RwLock<LoadProgress>>,
    progress_tx: StateSender,
}

impl LoadStateManager {
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(64);
        Self {
            current: Arc::new(RwLock::new(LoadProgress::default())),
            progress_tx,
        }
    }

    pub fn subscribe(&self) -> StateReceiver {
        self.progress_tx.subscribe()
    }

    pub async fn start_load(&self) {
        let now = Utc::now();
        let progress = LoadProgress {
            state: LoadState::LoadingChannels { attempt: 1 },
            started_at: Some(now),
            updated_at: now,
            completed_at: None,
        };

        {
            let mut current = self.current.write().await;
            *current = progress.clone();
        }

        let _ = self.progress_tx.send(progress);
    }

    pub async fn update(&self, state: LoadState) {
        let progress = {
            let mut current = self.current.write().await;
            current.updated_at = Utc::now();
            if state.is_terminal() {
                current.completed_at = Some(current.updated_at);
            }
            current.state = state;
            current.clone()
        };

        let _ = self.progress_tx.send(progress);
    }

    pub async fn current(&self) -> LoadProgress {
        self.current.read().await.clone()
    }
}

impl Default for LoadStateManager {
    fn default() -> Self {
        Self::new()
    }
}
