//! Configuration for the background timer scheduler.
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set via builder methods (`thread_name("x")`)
//! 2. **Environment variables**: values from `RX_MAYBE_*` env vars, applied
//!    by [`TimerConfig::apply_env_overrides`]
//! 3. **Defaults**: [`TimerConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `RX_MAYBE_TIMER_THREAD_NAME` | `String` | `thread_name` |
//! | `RX_MAYBE_TIMER_STACK_SIZE` | `usize` | `thread_stack_size` |

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable name for the timer thread name.
pub const ENV_TIMER_THREAD_NAME: &str = "RX_MAYBE_TIMER_THREAD_NAME";
/// Environment variable name for the timer thread stack size.
pub const ENV_TIMER_STACK_SIZE: &str = "RX_MAYBE_TIMER_STACK_SIZE";

/// Default timer thread name.
pub const DEFAULT_THREAD_NAME: &str = "rx-maybe-timer";
/// Default timer thread stack size in bytes.
pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;

/// Errors produced while resolving configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable was set to an unparseable value.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidEnvVar {
        /// Variable name.
        var: &'static str,
        /// Human-readable expected type.
        expected: &'static str,
        /// The rejected value.
        value: String,
    },
    /// A field holds a value the scheduler cannot use.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

impl From<ConfigError> for crate::error::Error {
    fn from(err: ConfigError) -> Self {
        Self::new(crate::error::ErrorKind::Internal).with_message(err.to_string())
    }
}

/// Settings for [`TimerThreadScheduler`](crate::scheduler::TimerThreadScheduler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Name given to the timer thread.
    pub thread_name: String,
    /// Stack size of the timer thread, in bytes.
    pub thread_stack_size: usize,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            thread_stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl TimerConfig {
    /// Defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timer thread name.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Sets the timer thread stack size.
    #[must_use]
    pub const fn thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Defaults overlaid with environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Applies environment variable overrides.
    ///
    /// Only variables that are set are applied. Returns an error if a
    /// variable is set but contains an unparseable value.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(val) = read_env(ENV_TIMER_THREAD_NAME) {
            self.thread_name = val;
        }
        if let Some(val) = read_env(ENV_TIMER_STACK_SIZE) {
            self.thread_stack_size = parse_usize(ENV_TIMER_STACK_SIZE, &val)?;
        }
        Ok(())
    }

    /// Rejects values the timer thread cannot be spawned with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "thread_name",
                reason: "must not be empty",
            });
        }
        if self.thread_name.contains('\0') {
            return Err(ConfigError::Invalid {
                field: "thread_name",
                reason: "must not contain NUL bytes",
            });
        }
        if self.thread_stack_size == 0 {
            return Err(ConfigError::Invalid {
                field: "thread_stack_size",
                reason: "must be non-zero",
            });
        }
        Ok(())
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_usize(var: &'static str, val: &str) -> Result<usize, ConfigError> {
    val.trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidEnvVar {
            var,
            expected: "unsigned integer",
            value: val.to_string(),
        })
}
