//! Glossa: translate, proofread and restore text in a document through
//! backends that may be missing, still downloading, or failing.
//!
//! # Overview
//!
//! 1. **Fragment selection** ([`fragment`]) picks the elements of a
//!    [`dom::Document`] worth transforming.
//! 2. **Sessions** ([`session`]) walk a [`backend::Backend`] through
//!    availability checking, download and initialization.
//! 3. **Fallback** ([`fallback`]) degrades to deterministic local transforms
//!    whenever the backend cannot answer.
//! 4. **The engine** ([`engine`]) transforms fragments in place, remembers
//!    originals ([`store`]) and reverts them on request.
//! 5. **The bridge** ([`bridge`]) carries panel requests to the page and
//!    replies back, at most once per request.
//!
//! # Example
//!
//! ```ignore
//! use glossa::{Document, EngineConfig, MockBackend, MockMode, TransformEngine};
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//!
//! let doc = Arc::new(Mutex::new(Document::from_json(page_json)?));
//! let backend = Arc::new(MockBackend::new(MockMode::Suffix));
//! let engine = TransformEngine::with_backend(doc, backend, EngineConfig::default())?;
//!
//! let summary = engine.transform_tree("fr").await?;
//! println!("{} elements translated", summary.translated_elements);
//! engine.revert().await;
//! ```

pub mod backend;
pub mod bridge;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod fragment;
pub mod limiter;
pub mod locale;
pub mod panel;
pub mod proofread;
pub mod session;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use backend::{
    Availability, Backend, BackendError, BackendRequest, BackendResult, BackendSession,
    MockAvailability, MockBackend, MockMode, ProgressSink, SessionOptions,
};
pub use bridge::{BridgeClient, ContentListener, Dispatch, EditorListener, Endpoint, Listener, WritingListener};
pub use config::EngineConfig;
pub use dom::{Document, DocumentSpec, NodeId, Selector, SharedDocument};
pub use engine::{ElementTranslation, TextTranslation, TransformEngine, TransformSummary};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use fallback::{FallbackChain, TransformMetadata, TransformResult};
pub use fragment::{Fragment, FragmentSelector, PageContent};
pub use panel::{BackendStatus, PanelController, ProofreadReport};
pub use proofread::CorrectionSpan;
pub use session::{ProgressFn, SessionState, TransformationSession};
pub use store::OriginalStore;
