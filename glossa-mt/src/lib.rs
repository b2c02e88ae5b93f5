//! Remote backends and front-end wiring for glossa
//!
//! The core crate only knows the [`glossa::Backend`] seam. This crate adds a
//! LibreTranslate client and the helpers the command-line and web front ends
//! share to pick a backend and assemble a panel.
//!
//! ```ignore
//! use glossa_mt::{BackendChoice, build_panel};
//!
//! let choice = BackendChoice::from_flags(false, None)?;
//! let panel = build_panel(&choice, &glossa::EngineConfig::default());
//! let result = panel.translate_text("Hello", None, "fr").await?;
//! ```

pub mod libretranslate;

pub use libretranslate::LibreTranslateBackend;

use glossa::backend::{Backend, BackendResult, MockBackend, MockMode, SessionOptions};
use glossa::{EngineConfig, FallbackChain, PanelController};
use std::sync::Arc;
use tracing::info;

/// Which translation backend the front ends talk to
#[derive(Debug, Clone)]
pub enum BackendChoice {
    /// Deterministic mock answering `"{text}_{target}"`
    Mock,
    LibreTranslate(LibreTranslateBackend),
    /// No backend; every request takes the local fallback
    Local,
}

impl BackendChoice {
    /// Resolve command-line style flags
    ///
    /// `--mock` wins. An explicit URL comes next, then the
    /// `GLOSSA_LIBRETRANSLATE_URL` environment variable. With none of them the
    /// local fallback is used.
    pub fn from_flags(mock: bool, url: Option<&str>) -> BackendResult<Self> {
        if mock {
            return Ok(BackendChoice::Mock);
        }
        if let Some(url) = url {
            let api_key = std::env::var(libretranslate::API_KEY_VAR).ok();
            return Ok(BackendChoice::LibreTranslate(LibreTranslateBackend::new(
                url, api_key,
            )?));
        }
        if std::env::var(libretranslate::URL_VAR).is_ok() {
            return Ok(BackendChoice::LibreTranslate(LibreTranslateBackend::from_env()?));
        }
        Ok(BackendChoice::Local)
    }

    pub fn backend(&self) -> Option<Arc<dyn Backend>> {
        match self {
            BackendChoice::Mock => Some(Arc::new(MockBackend::new(MockMode::Suffix))),
            BackendChoice::LibreTranslate(backend) => Some(Arc::new(backend.clone())),
            BackendChoice::Local => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BackendChoice::Mock => "mock",
            BackendChoice::LibreTranslate(_) => "libretranslate",
            BackendChoice::Local => "local",
        }
    }
}

/// Fallback chain for translation requests
pub fn translation_chain(choice: &BackendChoice, config: &EngineConfig) -> FallbackChain {
    match choice.backend() {
        Some(backend) => FallbackChain::new(
            backend,
            SessionOptions {
                source_language: Some(config.source_language.clone()),
                ..SessionOptions::default()
            },
        ),
        None => FallbackChain::local_only(),
    }
}

/// Panel with a translation chain from `choice`
///
/// Proofreading and prompting have no remote backend here, so they always
/// answer through the local fallback.
pub fn build_panel(choice: &BackendChoice, config: &EngineConfig) -> PanelController {
    info!(backend = choice.label(), "assembling panel");
    PanelController::new(
        FallbackChain::local_only(),
        translation_chain(choice, config),
        FallbackChain::local_only(),
    )
}
