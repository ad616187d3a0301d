//! Construction parameters supplied by the naming layer.

use crate::config::StoreConfig;

/// What the naming layer knows about a store when it builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    full_name: String,
    segments_hint: Option<usize>,
    read_only: bool,
}

impl RequestContext {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            segments_hint: None,
            read_only: false,
        }
    }

    pub fn with_segments(mut self, segments: usize) -> Self {
        self.segments_hint = Some(segments);
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Full path of the requested store.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Last component of the path.
    pub fn name(&self) -> &str {
        self.full_name.rsplit('/').next().unwrap_or(&self.full_name)
    }

    pub fn segments_hint(&self) -> Option<usize> {
        self.segments_hint
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Store configuration implied by this request, falling back to the
    /// default preset for anything unspecified.
    pub fn store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::default();
        if let Some(segments) = self.segments_hint {
            config.segments = segments;
        }
        config.read_only = self.read_only;
        config
    }
}
