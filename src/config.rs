/// Configuration for the transformation engine
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Elements that may carry translatable text
const DEFAULT_CONTENT_SELECTORS: &[&str] = &[
    "p",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "span",
    "div",
    "li",
    "td",
    "th",
    "a",
    "button",
    "label",
    "[translate=\"yes\"]",
    ".translatable",
];

/// Regions whose text is never content, whatever the configuration says
pub const BUILTIN_EXCLUDED_SELECTORS: &[&str] =
    &["script", "style", "[aria-hidden=\"true\"]", "[hidden]"];

/// Widest fragment length window; configured bounds may only narrow it
pub const MIN_FRAGMENT_CHARS: usize = 1;
pub const MAX_FRAGMENT_CHARS: usize = 1000;

/// Main content regions, in priority order
const DEFAULT_MAIN_CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    ".content",
    ".main-content",
    ".post-content",
    ".entry-content",
    "body",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Selectors for elements considered for per-element transformation
    pub content_selectors: Vec<String>,

    /// Extra regions (and their subtrees) that are never transformed, on top
    /// of [`BUILTIN_EXCLUDED_SELECTORS`]
    pub excluded_selectors: Vec<String>,

    /// Main content regions tried by page extraction, first match wins
    pub main_content_selectors: Vec<String>,

    /// Fragments must be strictly longer than this (in chars, after trimming).
    /// At least [`MIN_FRAGMENT_CHARS`].
    pub min_fragment_chars: usize,

    /// Fragments must be strictly shorter than this (in chars, after trimming).
    /// At most [`MAX_FRAGMENT_CHARS`].
    pub max_fragment_chars: usize,

    /// A main content region is accepted once its text is longer than this
    pub main_content_threshold: usize,

    /// Minimum spacing between two backend invocations of one engine
    pub rate_limit_ms: u64,

    /// Substitute the local deterministic transform when the backend fails.
    /// When disabled, failing fragments are skipped instead.
    pub fallback_enabled: bool,

    /// Source language passed to translation backends
    pub source_language: String,

    /// Languages the proofreading backend should expect
    pub expected_input_languages: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            content_selectors: to_owned(DEFAULT_CONTENT_SELECTORS),
            excluded_selectors: Vec::new(),
            main_content_selectors: to_owned(DEFAULT_MAIN_CONTENT_SELECTORS),
            min_fragment_chars: MIN_FRAGMENT_CHARS,
            max_fragment_chars: MAX_FRAGMENT_CHARS,
            main_content_threshold: 100,
            rate_limit_ms: 100,
            fallback_enabled: true,
            source_language: crate::locale::AUTO_DETECT.to_string(),
            expected_input_languages: vec!["en".to_string()],
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Cannot read {:?}: {}", path, e)))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("Cannot parse {:?}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> EngineResult<()> {
        if self.content_selectors.is_empty() {
            return Err(EngineError::Config(
                "content_selectors cannot be empty".to_string(),
            ));
        }

        if self.main_content_selectors.is_empty() {
            return Err(EngineError::Config(
                "main_content_selectors cannot be empty".to_string(),
            ));
        }

        if self.min_fragment_chars < MIN_FRAGMENT_CHARS {
            return Err(EngineError::Config(format!(
                "min_fragment_chars ({}) must be at least {}",
                self.min_fragment_chars, MIN_FRAGMENT_CHARS
            )));
        }

        if self.max_fragment_chars > MAX_FRAGMENT_CHARS {
            return Err(EngineError::Config(format!(
                "max_fragment_chars ({}) must be at most {}",
                self.max_fragment_chars, MAX_FRAGMENT_CHARS
            )));
        }

        let room = self
            .min_fragment_chars
            .checked_add(1)
            .is_some_and(|floor| self.max_fragment_chars > floor);
        if !room {
            return Err(EngineError::Config(format!(
                "max_fragment_chars ({}) leaves no room above min_fragment_chars ({})",
                self.max_fragment_chars, self.min_fragment_chars
            )));
        }

        crate::locale::validate_locale(&self.source_language)
            .map_err(|e| EngineError::Config(e.to_string()))?;

        Ok(())
    }
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
