//! Backend session lifecycle
//!
//! A [`TransformationSession`] wraps one [`Backend`] and walks it through
//! availability checking, optional download and initialization before any
//! request is made. States only move forward:
//!
//! ```text
//! Unknown → Checking → Unavailable | Downloadable | Ready
//! Downloadable → Downloading(p) → Ready | Unavailable
//! any → Unavailable, any → Destroyed
//! ```

use crate::backend::{Availability, Backend, BackendRequest, BackendSession, ProgressSink, SessionOptions};
use crate::error::{EngineError, EngineResult};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Download progress observer; receives percentages in `0..=100`
pub type ProgressFn<'a> = dyn Fn(u8) + Send + Sync + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    Unknown,
    Checking,
    Unavailable,
    Downloadable,
    Downloading { percent: u8 },
    Ready,
    Destroyed,
}

impl SessionState {
    fn rank(&self) -> u8 {
        match self {
            SessionState::Unknown => 0,
            SessionState::Checking => 1,
            SessionState::Unavailable | SessionState::Downloadable => 2,
            SessionState::Downloading { .. } => 3,
            SessionState::Ready => 4,
            SessionState::Destroyed => 5,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotone
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        match (self, next) {
            (SessionState::Destroyed, _) => false,
            (_, SessionState::Destroyed) => true,
            (SessionState::Unavailable, _) => false,
            (_, SessionState::Unavailable) => true,
            (SessionState::Downloading { percent: a }, SessionState::Downloading { percent: b }) => b >= a,
            (current, next) => next.rank() > current.rank(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unknown => write!(f, "unknown"),
            SessionState::Checking => write!(f, "checking"),
            SessionState::Unavailable => write!(f, "unavailable"),
            SessionState::Downloadable => write!(f, "downloadable"),
            SessionState::Downloading { percent } => write!(f, "downloading ({}%)", percent),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Destroyed => write!(f, "destroyed"),
        }
    }
}

pub struct TransformationSession {
    backend: Arc<dyn Backend>,
    options: SessionOptions,
    state: SessionState,
    diagnostic: Option<String>,
    handle: Option<Arc<dyn BackendSession>>,
    history: Vec<SessionState>,
}

impl fmt::Debug for TransformationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformationSession")
            .field("backend", &self.backend.name())
            .field("state", &self.state)
            .field("diagnostic", &self.diagnostic)
            .finish()
    }
}

impl TransformationSession {
    pub fn new(backend: Arc<dyn Backend>, options: SessionOptions) -> Self {
        Self {
            backend,
            options,
            state: SessionState::Unknown,
            diagnostic: None,
            handle: None,
            history: vec![SessionState::Unknown],
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Why the backend is unavailable, when it is
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    /// Every state visited so far, oldest first
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn transition(&mut self, next: SessionState) -> EngineResult<()> {
        if !self.state.can_transition_to(&next) {
            return Err(EngineError::InvalidState(format!(
                "cannot move from {} to {}",
                self.state, next
            )));
        }
        debug!(backend = self.backend.name(), from = %self.state, to = %next, "session transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    fn mark_unavailable(&mut self, reason: impl Into<String>) -> EngineResult<()> {
        let reason = reason.into();
        warn!(backend = self.backend.name(), %reason, "backend unavailable");
        self.diagnostic = Some(reason);
        self.transition(SessionState::Unavailable)
    }

    fn unavailable_error(&self) -> EngineError {
        EngineError::BackendUnavailable(
            self.diagnostic
                .clone()
                .unwrap_or_else(|| format!("{} is not available", self.backend.name())),
        )
    }

    /// Check the backend once
    ///
    /// Only acts from `Unknown`; any later state is returned as is.
    pub async fn check_availability(&mut self) -> EngineResult<SessionState> {
        match self.state {
            SessionState::Unknown => {}
            SessionState::Destroyed => {
                return Err(EngineError::InvalidState("session destroyed".to_string()));
            }
            other => return Ok(other),
        }

        self.transition(SessionState::Checking)?;
        match self.backend.availability().await {
            Ok(Availability::Available) => self.open(None, false).await?,
            Ok(Availability::Downloadable) | Ok(Availability::Downloading) => {
                self.transition(SessionState::Downloadable)?
            }
            Ok(Availability::Unavailable) => {
                let reason = format!("{} reports unavailable", self.backend.name());
                self.mark_unavailable(reason)?
            }
            Err(e) => self.mark_unavailable(e.to_string())?,
        }
        Ok(self.state)
    }

    /// Open the backend, downloading it first if needed
    ///
    /// `observer` is told every download percentage. Succeeds once the
    /// session is `Ready`; a failed download leaves it `Unavailable`.
    pub async fn create(
        &mut self,
        options: &SessionOptions,
        observer: Option<&ProgressFn<'_>>,
    ) -> EngineResult<()> {
        if self.state == SessionState::Unknown {
            self.options = options.clone();
            self.check_availability().await?;
        }

        match self.state {
            SessionState::Ready => Ok(()),
            SessionState::Downloadable => {
                self.options = options.clone();
                self.open(observer, true).await?;
                if self.state.is_ready() {
                    Ok(())
                } else {
                    Err(self.unavailable_error())
                }
            }
            SessionState::Unavailable => Err(self.unavailable_error()),
            SessionState::Destroyed => {
                Err(EngineError::InvalidState("session destroyed".to_string()))
            }
            other => Err(EngineError::InvalidState(format!(
                "cannot create a session while {}",
                other
            ))),
        }
    }

    /// Check and create as needed, with the options given at construction
    pub async fn ensure_ready(&mut self, observer: Option<&ProgressFn<'_>>) -> EngineResult<()> {
        if self.state.is_ready() {
            return Ok(());
        }
        let options = self.options.clone();
        self.create(&options, observer).await
    }

    async fn open(&mut self, observer: Option<&ProgressFn<'_>>, announce: bool) -> EngineResult<()> {
        if announce {
            self.record_progress(0.0, observer)?;
        }

        let backend = Arc::clone(&self.backend);
        let options = self.options.clone();
        let (sink, mut progress) = ProgressSink::channel();
        let opening = backend.create(&options, sink);
        tokio::pin!(opening);

        let outcome = loop {
            tokio::select! {
                biased;
                Some(loaded) = progress.recv() => self.record_progress(loaded, observer)?,
                result = &mut opening => break result,
            }
        };
        while let Ok(loaded) = progress.try_recv() {
            self.record_progress(loaded, observer)?;
        }

        match outcome {
            Ok(handle) => {
                self.handle = Some(handle);
                self.diagnostic = None;
                info!(backend = self.backend.name(), "backend session ready");
                self.transition(SessionState::Ready)
            }
            Err(e) => self.mark_unavailable(e.to_string()),
        }
    }

    fn record_progress(&mut self, loaded: f64, observer: Option<&ProgressFn<'_>>) -> EngineResult<()> {
        let reported = (loaded.clamp(0.0, 1.0) * 100.0).round() as u8;
        let percent = match self.state {
            SessionState::Downloading { percent } => percent.max(reported),
            _ => reported,
        };
        let next = SessionState::Downloading { percent };
        if self.state != next {
            self.transition(next)?;
        }
        if let Some(observer) = observer {
            observer(percent);
        }
        Ok(())
    }

    /// Send one request; the state is left unchanged whatever happens
    pub async fn invoke(&self, request: &BackendRequest) -> EngineResult<serde_json::Value> {
        match self.state {
            SessionState::Ready => {}
            SessionState::Destroyed => {
                return Err(EngineError::InvalidState(
                    "invoke after destroy".to_string(),
                ));
            }
            other => {
                return Err(EngineError::InvalidState(format!(
                    "invoke requires a ready session, found {}",
                    other
                )));
            }
        }
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| EngineError::InvalidState("ready session has no handle".to_string()))?;
        handle
            .invoke(request)
            .await
            .map_err(|e| EngineError::InvocationFailure(e.to_string()))
    }

    /// Release the backend handle; calling it again does nothing
    pub async fn destroy(&mut self) {
        if self.state == SessionState::Destroyed {
            return;
        }
        if let Some(handle) = self.handle.take() {
            handle.destroy().await;
        }
        let _ = self.transition(SessionState::Destroyed);
        info!(backend = self.backend.name(), "backend session destroyed");
    }
}
