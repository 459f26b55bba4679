//! One-time construction of the shared chat session

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::handle::{ChatSession, SessionFactory};
use crate::core::CoreError;

/// Lifecycle phase of the shared session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl ReadinessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadinessState::Uninitialized => "uninitialized",
            ReadinessState::Initializing => "initializing",
            ReadinessState::Ready => "ready",
            ReadinessState::Failed => "failed",
        }
    }
}

/// Periodic progress signal published while the session is being built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub tick: u64,
    pub elapsed: Duration,
}

/// Serializable view of the lifecycle, used by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleStatus {
    pub state: ReadinessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[derive(Clone)]
enum Phase {
    Uninitialized,
    Initializing {
        started: Instant,
    },
    Ready {
        session: Arc<dyn ChatSession>,
        setup_time: Duration,
    },
    Failed {
        reason: String,
    },
}

impl Phase {
    fn state(&self) -> ReadinessState {
        match self {
            Phase::Uninitialized => ReadinessState::Uninitialized,
            Phase::Initializing { .. } => ReadinessState::Initializing,
            Phase::Ready { .. } => ReadinessState::Ready,
            Phase::Failed { .. } => ReadinessState::Failed,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Phase::Ready { .. } | Phase::Failed { .. })
    }
}

struct Inner {
    factory: Arc<dyn SessionFactory>,
    phase: watch::Sender<Phase>,
    progress: watch::Sender<Progress>,
    progress_interval: Duration,
    constructions: AtomicU64,
}

/// Owns the single shared [`ChatSession`] and drives its construction.
///
/// Cloning is cheap; every clone observes the same lifecycle.
#[derive(Clone)]
pub struct SessionLifecycle {
    inner: Arc<Inner>,
}

impl SessionLifecycle {
    pub fn new(factory: Arc<dyn SessionFactory>, progress_interval: Duration) -> Self {
        let (phase, _) = watch::channel(Phase::Uninitialized);
        let (progress, _) = watch::channel(Progress::default());

        Self {
            inner: Arc::new(Inner {
                factory,
                phase,
                progress,
                progress_interval: progress_interval.max(Duration::from_millis(1)),
                constructions: AtomicU64::new(0),
            }),
        }
    }

    /// Begin building the session in the background.
    ///
    /// Returns true only for the call that moved the lifecycle out of `Uninitialized`. Calls
    /// made while initializing, ready or failed do nothing; a failed lifecycle stays failed
    /// until the process restarts.
    pub fn start_initialization(&self) -> bool {
        let started = Instant::now();
        let claimed = self.inner.phase.send_if_modified(|phase| {
            if matches!(phase, Phase::Uninitialized) {
                *phase = Phase::Initializing { started };
                true
            } else {
                false
            }
        });

        if !claimed {
            debug!(state = self.state().as_str(), "Session initialization already requested");
            return false;
        }

        info!("Starting bot setup...");
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.initialize(started).await });
        true
    }

    /// Wait until the session is ready or construction failed.
    ///
    /// Suspends the calling task only; no worker slot is held while waiting.
    pub async fn await_ready(&self, timeout: Duration) -> Result<Arc<dyn ChatSession>, CoreError> {
        let mut rx = self.inner.phase.subscribe();

        let waited = tokio::time::timeout(timeout, async {
            let phase = rx
                .wait_for(Phase::is_terminal)
                .await
                .map_err(|_| CoreError::SessionInitFailed("session lifecycle dropped".to_string()))?;
            Ok::<Phase, CoreError>((*phase).clone())
        })
        .await;

        match waited {
            Err(_) => Err(CoreError::SessionTimeout(timeout)),
            Ok(Err(e)) => Err(e),
            Ok(Ok(Phase::Ready { session, .. })) => Ok(session),
            Ok(Ok(Phase::Failed { reason })) => Err(CoreError::SessionInitFailed(reason)),
            Ok(Ok(other)) => Err(CoreError::SessionInitFailed(format!(
                "unexpected session state: {}",
                other.state().as_str()
            ))),
        }
    }

    pub fn state(&self) -> ReadinessState {
        self.inner.phase.borrow().state()
    }

    /// Time spent initializing so far, while initialization is running
    pub fn elapsed(&self) -> Option<Duration> {
        match &*self.inner.phase.borrow() {
            Phase::Initializing { started } => Some(started.elapsed()),
            _ => None,
        }
    }

    /// How long construction took, once ready
    pub fn setup_time(&self) -> Option<Duration> {
        match &*self.inner.phase.borrow() {
            Phase::Ready { setup_time, .. } => Some(*setup_time),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<String> {
        match &*self.inner.phase.borrow() {
            Phase::Failed { reason } => Some(reason.clone()),
            _ => None,
        }
    }

    /// Progress ticks published while initializing
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.inner.progress.subscribe()
    }

    /// Number of times the factory has been invoked
    pub fn constructions(&self) -> u64 {
        self.inner.constructions.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> LifecycleStatus {
        let state = self.state();
        LifecycleStatus {
            state,
            elapsed_ms: self.elapsed().map(|d| d.as_millis() as u64),
            setup_ms: self.setup_time().map(|d| d.as_millis() as u64),
            failure: self.failure_reason(),
        }
    }
}

impl Inner {
    async fn initialize(self: Arc<Self>, started: Instant) {
        self.constructions.fetch_add(1, Ordering::SeqCst);

        let factory = self.factory.clone();
        let mut construction = tokio::spawn(async move { factory.create().await });

        let mut ticker = tokio::time::interval(self.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of an interval completes immediately.
        ticker.tick().await;

        let mut tick = 0u64;
        let outcome = loop {
            tokio::select! {
                joined = &mut construction => break joined,
                _ = ticker.tick() => {
                    tick += 1;
                    let elapsed = started.elapsed();
                    self.progress.send_replace(Progress { tick, elapsed });
                    debug!(tick, elapsed_ms = elapsed.as_millis() as u64, "Bot setup in progress");
                }
            }
        };

        let setup_time = started.elapsed();
        let next = match outcome {
            Ok(Ok(session)) => {
                info!(
                    "Chatbot setup completed in {:.2} seconds.",
                    setup_time.as_secs_f64()
                );
                Phase::Ready {
                    session,
                    setup_time,
                }
            }
            Ok(Err(e)) => {
                error!("Error in bot setup: {:#}", e);
                Phase::Failed {
                    reason: format!("{:#}", e),
                }
            }
            Err(e) => {
                error!("Bot setup task ended abnormally: {}", e);
                Phase::Failed {
                    reason: format!("session construction panicked: {}", e),
                }
            }
        };

        self.progress.send_replace(Progress {
            tick,
            elapsed: setup_time,
        });
        self.phase.send_replace(next);
    }
}
