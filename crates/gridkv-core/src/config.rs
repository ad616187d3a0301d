//! Configuration management for GridKV stores
//!
//! Provides segmentation presets for different contention profiles
//! and validation for custom configurations.

/// Upper bound on segments per store.
pub const MAX_SEGMENTS: usize = 1 << 16;

/// GridKV store configuration with segmentation presets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Number of key-space partitions (each with its own lock)
    pub segments: usize,
    /// Reject every mutation with `StoreError::ReadOnly`
    pub read_only: bool,
}

impl StoreConfig {
    /// Single segment: whole-store locking, deterministic iteration order
    /// across one partition.
    pub fn single_segment() -> Self {
        Self {
            segments: 1,
            read_only: false,
        }
    }

    /// Multi-writer: 16 segments so writers to different keys rarely
    /// contend.
    pub fn concurrent() -> Self {
        Self {
            segments: 16,
            read_only: false,
        }
    }

    /// Same configuration with the read-only flag set.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.segments == 0 {
            return Err("segments must be > 0".into());
        }
        if self.segments > MAX_SEGMENTS {
            return Err(format!("segments must be <= {}", MAX_SEGMENTS));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self { Self::concurrent() }
}
