//! Retry logic for page fetches and downloads

use crate::error::KvsError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Retry executor
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new retry executor
    pub fn new() -> Self {
        Self::with_config(RetryConfig::default())
    }

    /// Create a new retry executor with configuration
    pub fn with_config(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Get retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `func` until it succeeds, fails with a non-retryable error or retries run out
    pub async fn execute<F, Fut, T>(&self, func: F) -> Result<T, KvsError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, KvsError>>,
    {
        self.execute_with_error_handler(func, KvsError::is_retryable)
            .await
    }

    /// Like [`execute`](Self::execute) with a custom retryability check
    pub async fn execute_with_error_handler<F, Fut, T, E>(
        &self,
        mut func: F,
        error_handler: E,
    ) -> Result<T, KvsError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, KvsError>>,
        E: Fn(&KvsError) -> bool,
    {
        let mut delay = self.config.initial_delay;
        let mut attempt = 0;

        loop {
            let error = match func().await {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };

            if !error_handler(&error) || attempt >= self.config.max_retries {
                return Err(error);
            }

            attempt += 1;
            let wait = delay + self.jitter(delay);
            warn!(
                "Attempt {}/{} failed: {}; retrying in {:?}",
                attempt,
                self.config.max_retries + 1,
                error,
                wait
            );
            tokio::time::sleep(wait).await;
            delay = self.next_delay(delay);
        }
    }

    fn jitter(&self, delay: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return Duration::ZERO;
        }
        let jitter_range = delay.as_millis() as f64 * self.config.jitter_factor;
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range;
        Duration::from_millis(jitter.abs() as u64)
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        let next =
            Duration::from_millis((delay.as_millis() as f64 * self.config.backoff_multiplier) as u64);
        if next > self.config.max_delay {
            debug!("Backoff capped at {:?}", self.config.max_delay);
            self.config.max_delay
        } else {
            next
        }
    }
}

/// Retry configuration builder
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    /// Create a new retry configuration builder
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }

    /// Set maximum retries
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Set initial delay
    pub fn initial_delay(mut self, initial_delay: Duration) -> Self {
        self.config.initial_delay = initial_delay;
        self
    }

    /// Set maximum delay
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.config.max_delay = max_delay;
        self
    }

    /// Set backoff multiplier
    pub fn backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.config.backoff_multiplier = backoff_multiplier;
        self
    }

    /// Set jitter factor
    pub fn jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.config.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Build the retry configuration
    pub fn build(self) -> RetryConfig {
        self.config
    }
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
