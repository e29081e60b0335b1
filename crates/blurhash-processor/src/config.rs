//! Configuration for a [`BlurHashProcessor`](crate::BlurHashProcessor).
//!
//! Built with a consuming builder and validated once in [`ProcessorConfig::build`].

use std::time::Duration;

use blurhash_decoder::MAX_DIMENSION;

use crate::error::ProcessError;

/// Default number of decoded buffers kept in the LRU cache.
pub const DEFAULT_CACHE_SIZE: usize = 50;
/// Default number of decodes allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 3;
/// Default ceiling on requested width and height.
pub const DEFAULT_MAX_DIMENSION: u32 = 1000;

/// Settings for a processor instance.
///
/// ```
/// use blurhash_processor::ProcessorConfig;
/// use std::time::Duration;
///
/// let config = ProcessorConfig::new()
///     .cache_size(100)
///     .max_concurrent_jobs(4)
///     .default_timeout(Duration::from_secs(2))
///     .build()
///     .unwrap();
/// assert_eq!(config.get_cache_size(), 100);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorConfig {
    /// Maximum number of decoded buffers kept in memory.
    pub(crate) cache_size: usize,

    /// Maximum number of decodes running simultaneously.
    pub(crate) max_concurrent_jobs: usize,

    /// Largest width or height a request may ask for.
    pub(crate) max_dimension: u32,

    /// Timeout applied by `process` when the caller does not pass one.
    pub(crate) default_timeout: Option<Duration>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            max_dimension: DEFAULT_MAX_DIMENSION,
            default_timeout: None,
        }
    }
}

impl ProcessorConfig {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of decoded buffers kept in the LRU cache.
    pub fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    /// Set how many decodes may run at once. Further requests wait for a slot.
    pub fn max_concurrent_jobs(mut self, jobs: usize) -> Self {
        self.max_concurrent_jobs = jobs;
        self
    }

    /// Set the largest accepted width or height (at most 4096).
    pub fn max_dimension(mut self, max: u32) -> Self {
        self.max_dimension = max;
        self
    }

    /// Set the timeout used by `process`. `Duration::ZERO` disables it.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = if timeout.is_zero() {
            None
        } else {
            Some(timeout)
        };
        self
    }

    /// Validate and return the final configuration.
    ///
    /// # Errors
    ///
    /// [`ProcessError::InvalidConfig`] when the cache size or concurrency is
    /// zero, or the dimension ceiling is outside `1..=4096`.
    pub fn build(self) -> Result<Self, ProcessError> {
        if self.cache_size == 0 {
            return Err(ProcessError::InvalidConfig(
                "cache_size must be positive".to_string(),
            ));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(ProcessError::InvalidConfig(
                "max_concurrent_jobs must be positive".to_string(),
            ));
        }
        if self.max_dimension == 0 || self.max_dimension > MAX_DIMENSION {
            return Err(ProcessError::InvalidConfig(format!(
                "max_dimension must be within 1..={MAX_DIMENSION}, got {}",
                self.max_dimension
            )));
        }
        Ok(self)
    }

    pub fn get_cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn get_max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }

    pub fn get_max_dimension(&self) -> u32 {
        self.max_dimension
    }

    pub fn get_default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }
}
